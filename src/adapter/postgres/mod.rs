//! PostgreSQL适配器模块
//!
//! - `query_builder`：语句与参数批次构建
//! - `connection`：连接抽象与sqlx实现
//! - `handler`：对外的处理器
//! - `utils`：参数绑定、行解码和错误分类

pub mod connection;
pub mod handler;
pub mod query_builder;
pub(crate) mod utils;

pub use connection::{PgSqlConnector, PgSqlSession, QueryOutput, SqlConnector, SqlSession};
pub use handler::PostgresHandler;
pub use query_builder::{
    inline_nulls, split_table_name, ExecutionMode, HeaderFilter, Statement, StatementArgs, StatementBuilder,
    DEFAULT_SCHEMA,
};
