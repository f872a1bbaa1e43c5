//! # 配置构建器模块

pub mod database_builder;
pub mod logging_builder;

pub use database_builder::{MongoConfigBuilder, PostgresConfigBuilder};
pub use logging_builder::LoggingConfigBuilder;
