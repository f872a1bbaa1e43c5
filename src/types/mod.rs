//! 数据库类型定义和配置
//!
//! 定义支持的数据库类型、连接配置、通用数据类型和结果信封

pub mod data_value;
pub mod database_config;
pub mod envelope;
pub mod query;

// 重新导出所有公共类型
pub use data_value::{json_value_to_data_value, DataValue};
pub use database_config::{DatabaseType, MongoConfig, PostgresConfig};
pub use envelope::{ResultEnvelope, SqlEnvelope, SUCCESS_MESSAGE};
pub use query::{ConditionRule, QueryOperator, Record, ReturnType, SortDirection, SortKey};
