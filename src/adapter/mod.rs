//! 数据库适配器模块
//!
//! 每种存储一个处理器，对外提供统一的增删改查入口，驱动通过连接器trait接入

#[cfg(feature = "mongodb-support")]
pub mod mongodb;
#[cfg(feature = "postgres-support")]
pub mod postgres;

#[cfg(feature = "mongodb-support")]
pub use mongodb::{DocumentEnvelope, MongoHandler};
#[cfg(feature = "postgres-support")]
pub use postgres::{ExecutionMode, HeaderFilter, PostgresHandler, StatementArgs, StatementBuilder};
