//! 枚举类型定义模块
//!
//! 每个枚举定义持有一组键和值都唯一的成员，支持按键查找和按存储值反查

use crate::error::DualDbResult;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 枚举成员
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnumValue {
    /// 成员键
    pub key: String,
    /// 存储值
    pub value: String,
    /// 所属模型名
    pub owner: String,
    /// 数据库中的类型名（带模式）
    pub type_name: String,
}

impl EnumValue {
    /// 创建枚举成员
    pub fn new(key: &str, value: &str, owner: &str, type_name: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
            owner: owner.to_string(),
            type_name: type_name.to_string(),
        }
    }
}

/// 枚举定义
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDefinition {
    name: String,
    type_name: String,
    values: Vec<EnumValue>,
}

impl EnumDefinition {
    /// 构建枚举定义，键或值重复时失败
    pub(crate) fn build(
        owner: &str,
        name: &str,
        schema: &str,
        members: &[(String, String)],
    ) -> DualDbResult<Self> {
        let type_name = format!("{}.{}", schema, name);
        let mut seen_keys = HashSet::new();
        let mut seen_values = HashSet::new();
        let mut values = Vec::with_capacity(members.len());

        for (key, value) in members {
            if !seen_keys.insert(key.as_str()) {
                return Err(crate::dual_error!(
                    duplicate_enum,
                    owner,
                    format!("duplicate key {} in enum {}", key, name)
                ));
            }
            if !seen_values.insert(value.as_str()) {
                return Err(crate::dual_error!(
                    duplicate_enum,
                    owner,
                    format!("duplicate value '{}' in enum {}", value, name)
                ));
            }
            values.push(EnumValue::new(key, value, owner, &type_name));
        }

        Ok(Self {
            name: name.to_string(),
            type_name,
            values,
        })
    }

    /// 枚举名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 带模式的类型名
    ///
    /// 枚举声明在多个模式时，每个模式都会创建该类型，但列类型和占位符转换
    /// 统一引用第一个模式中的类型
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// 按键查找
    pub fn by_key(&self, key: &str) -> Option<&EnumValue> {
        self.values.iter().find(|member| member.key == key)
    }

    /// 按存储值反查
    pub fn by_value(&self, value: &str) -> Option<&EnumValue> {
        self.values.iter().find(|member| member.value == value)
    }

    /// 全部键
    pub fn keys(&self) -> Vec<&str> {
        self.values.iter().map(|member| member.key.as_str()).collect()
    }

    /// 渲染 `CREATE TYPE ... AS ENUM` 使用的字面量列表
    pub fn sql_literals(&self) -> String {
        self.values
            .iter()
            .map(|member| format!("'{}'", member.value.replace('\'', "''")))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
