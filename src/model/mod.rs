//! 模型定义系统模块
//!
//! 通过构建器声明数据表、模式和枚举类型，
//! 提供字段渲染、建表/建索引/建枚举语句生成和初始化语句累加

pub mod accumulator;
pub mod convenience;
pub mod definition;
pub mod enum_types;
pub mod field_types;
pub mod instance;
pub mod meta;

// 重新导出核心类型
pub use accumulator::{ScriptExecutor, SqlAccumulator};
pub use convenience::*;
pub use definition::{InitHook, ModelBuilder, ModelDefinition};
pub use enum_types::{EnumDefinition, EnumValue};
pub use field_types::{FieldDefinition, FieldType};
pub use instance::{restore_enums, ModelInstance};
pub use meta::{InitType, ModelMeta, DEFAULT_INDEX_PREFIX};
