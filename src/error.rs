//! 错误类型定义
//!
//! 错误分为两层：
//! - 定义期错误（模型元数据不完整、枚举重复等），由构建器直接返回给调用者
//! - 请求期错误（连接、执行、数据缺失等），在处理器边界被转换为失败的结果信封

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 库统一错误类型
#[derive(Error, Debug)]
pub enum DualDbError {
    /// 模型定义错误（元数据缺失、类型不匹配、渲染类型错误）
    #[error("model definition error ( {model} ): {message}")]
    DefinitionError { model: String, message: String },

    /// 枚举键或值重复
    #[error("duplicate enum ( {model} ): {message}")]
    DuplicateEnum { model: String, message: String },

    /// 数据库连接失败
    #[error("connection failed: {message}")]
    ConnectionError { message: String },

    /// 语句或连接超时
    #[error("timeout: {message}")]
    TimeoutError { message: String },

    /// 约束冲突（唯一键、外键、非空、CHECK）
    #[error("constraint violation: {message}")]
    ConstraintError { message: String },

    /// 请求参数验证失败
    #[error("validation failed: {field} - {message}")]
    ValidationError { field: String, message: String },

    /// 写入数据缺少列
    #[error("missing data ( {table} ): {column}")]
    MissingData { table: String, column: String },

    /// 查询执行失败
    #[error("query failed: {message}")]
    QueryError { message: String },

    /// 配置错误
    #[error("configuration error: {message}")]
    ConfigError { message: String },

    /// 序列化错误
    #[error("serialization failed: {message}")]
    SerializationError { message: String },

    /// 其他错误（调用者提供的钩子或回调）
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// 结果类型别名
pub type DualDbResult<T> = Result<T, DualDbError>;

/// 错误类别，用于结果信封中的失败分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    Definition,
    Connection,
    Timeout,
    Constraint,
    Validation,
    Query,
    Config,
    Serialization,
    Other,
}

impl DualDbError {
    /// 获取错误类别
    pub fn kind(&self) -> ErrorKind {
        match self {
            DualDbError::DefinitionError { .. } | DualDbError::DuplicateEnum { .. } => {
                ErrorKind::Definition
            }
            DualDbError::ConnectionError { .. } => ErrorKind::Connection,
            DualDbError::TimeoutError { .. } => ErrorKind::Timeout,
            DualDbError::ConstraintError { .. } => ErrorKind::Constraint,
            DualDbError::ValidationError { .. } | DualDbError::MissingData { .. } => {
                ErrorKind::Validation
            }
            DualDbError::QueryError { .. } => ErrorKind::Query,
            DualDbError::ConfigError { .. } => ErrorKind::Config,
            DualDbError::SerializationError { .. } => ErrorKind::Serialization,
            DualDbError::Other(_) => ErrorKind::Other,
        }
    }

    /// 是否为定义期错误
    pub fn is_definition_error(&self) -> bool {
        self.kind() == ErrorKind::Definition
    }
}

impl From<serde_json::Error> for DualDbError {
    fn from(err: serde_json::Error) -> Self {
        DualDbError::SerializationError {
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for DualDbError {
    fn from(err: toml::de::Error) -> Self {
        DualDbError::ConfigError {
            message: err.to_string(),
        }
    }
}

/// 快速构造错误的宏
///
/// ```ignore
/// dual_error!(definition, "UserTable", "missing meta: table_name");
/// dual_error!(validation, "conditions", "invalid operator");
/// dual_error!(query, "unexpected result");
/// ```
#[macro_export]
macro_rules! dual_error {
    (definition, $model:expr, $msg:expr) => {
        $crate::error::DualDbError::DefinitionError {
            model: $model.to_string(),
            message: $msg.to_string(),
        }
    };
    (duplicate_enum, $model:expr, $msg:expr) => {
        $crate::error::DualDbError::DuplicateEnum {
            model: $model.to_string(),
            message: $msg.to_string(),
        }
    };
    (validation, $field:expr, $msg:expr) => {
        $crate::error::DualDbError::ValidationError {
            field: $field.to_string(),
            message: $msg.to_string(),
        }
    };
    (missing_data, $table:expr, $column:expr) => {
        $crate::error::DualDbError::MissingData {
            table: $table.to_string(),
            column: $column.to_string(),
        }
    };
    (connection, $msg:expr) => {
        $crate::error::DualDbError::ConnectionError {
            message: $msg.to_string(),
        }
    };
    (timeout, $msg:expr) => {
        $crate::error::DualDbError::TimeoutError {
            message: $msg.to_string(),
        }
    };
    (constraint, $msg:expr) => {
        $crate::error::DualDbError::ConstraintError {
            message: $msg.to_string(),
        }
    };
    (query, $msg:expr) => {
        $crate::error::DualDbError::QueryError {
            message: $msg.to_string(),
        }
    };
    (config, $msg:expr) => {
        $crate::error::DualDbError::ConfigError {
            message: $msg.to_string(),
        }
    };
    (serialization, $msg:expr) => {
        $crate::error::DualDbError::SerializationError {
            message: $msg.to_string(),
        }
    };
}
