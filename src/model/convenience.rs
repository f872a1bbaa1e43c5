//! 模型便捷函数模块
//!
//! 提供创建各种字段类型的便捷函数

use crate::model::enum_types::EnumDefinition;
use crate::model::field_types::{FieldDefinition, FieldType};
use std::sync::Arc;

/// 便捷函数：创建自增主键字段
pub fn serial_field() -> FieldDefinition {
    FieldDefinition::new(FieldType::Integer)
        .auto_increment()
        .primary_key()
}

/// 便捷函数：创建整数字段
pub fn integer_field() -> FieldDefinition {
    FieldDefinition::new(FieldType::Integer)
}

/// 便捷函数：创建大整数字段
pub fn bigint_field() -> FieldDefinition {
    FieldDefinition::new(FieldType::BigInt)
}

/// 便捷函数：创建变长字符串字段
pub fn varchar_field(max_length: Option<usize>) -> FieldDefinition {
    FieldDefinition::new(FieldType::Varchar { max_length })
}

/// 便捷函数：创建文本字段
pub fn text_field() -> FieldDefinition {
    FieldDefinition::new(FieldType::Text)
}

/// 便捷函数：创建布尔字段
pub fn boolean_field() -> FieldDefinition {
    FieldDefinition::new(FieldType::Boolean)
}

/// 便捷函数：创建时间戳字段
pub fn timestamp_field() -> FieldDefinition {
    FieldDefinition::new(FieldType::Timestamp)
}

/// 便捷函数：创建带时区的时间戳字段
pub fn timestamptz_field() -> FieldDefinition {
    FieldDefinition::new(FieldType::TimestampTz)
}

/// 便捷函数：创建JSONB字段
pub fn jsonb_field() -> FieldDefinition {
    FieldDefinition::new(FieldType::Jsonb)
}

/// 便捷函数：创建UUID字段
pub fn uuid_field() -> FieldDefinition {
    FieldDefinition::new(FieldType::Uuid)
}

/// 便捷函数：创建数组字段
pub fn array_field(item_type: FieldType) -> FieldDefinition {
    FieldDefinition::new(FieldType::Array {
        item_type: Box::new(item_type),
    })
}

/// 便捷函数：按类型标签创建字段
pub fn custom_field(tag: &str) -> FieldDefinition {
    FieldDefinition::new(FieldType::parse(tag))
}

/// 便捷函数：创建枚举字段，类型由枚举定义推断
pub fn enum_field(definition: &Arc<EnumDefinition>) -> FieldDefinition {
    FieldDefinition::untyped().with_enum(definition)
}
