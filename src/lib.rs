//! dualdb - MongoDB与PostgreSQL的统一数据访问层
//!
//! 提供统一的增删改查和列名查询接口、声明式的模式/数据表/索引/枚举定义，
//! 以及带 `$n` 占位符的语句构建。所有处理器操作都以结果信封返回，错误不会越过处理器边界

// 导出所有公共模块
pub mod adapter;
pub mod config;
pub mod error;
pub mod model;
pub mod security;
pub mod types;

// 重新导出常用类型和函数
pub use error::{DualDbError, DualDbResult, ErrorKind};
pub use types::*;

pub use config::{
    init_logging, DualDbConfig, LogLevel, LoggingConfig, LoggingConfigBuilder, MongoConfigBuilder,
    PostgresConfigBuilder,
};
pub use model::{
    array_field, bigint_field, boolean_field, custom_field, enum_field, integer_field,
    jsonb_field, restore_enums, serial_field, text_field, timestamp_field, timestamptz_field,
    uuid_field, varchar_field, EnumDefinition, EnumValue, FieldDefinition, FieldType, InitType,
    ModelBuilder, ModelDefinition, ModelInstance, ModelMeta, ScriptExecutor, SqlAccumulator,
};

#[cfg(feature = "mongodb-support")]
pub use adapter::mongodb::{normalize_id_condition, object_id_encoder, DocumentEnvelope, MongoHandler};
#[cfg(feature = "postgres-support")]
pub use adapter::postgres::{ExecutionMode, HeaderFilter, PostgresHandler, StatementArgs, StatementBuilder};

// 条件编译调试宏 - 只有在 debug 模式下才输出调试信息
#[cfg(debug_assertions)]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        rat_logger::debug!($($arg)*);
    };
}

#[cfg(not(debug_assertions))]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        // 在 release 模式下不输出调试信息
    };
}

/// 库版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 库名称
pub const NAME: &str = env!("CARGO_PKG_NAME");
