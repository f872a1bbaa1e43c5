//! 模型元数据
//!
//! 元数据的各项都是可选的，缺失项在模型构建时统一检查并报告

use crate::error::{DualDbError, DualDbResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 默认索引名前缀
pub const DEFAULT_INDEX_PREFIX: &str = "idx_";

/// 模型初始化类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitType {
    /// 模式
    Schema,
    /// 数据表
    Table,
    /// 枚举类型
    Enum,
}

impl InitType {
    /// 字符串表示
    pub fn as_str(&self) -> &'static str {
        match self {
            InitType::Schema => "schema",
            InitType::Table => "table",
            InitType::Enum => "enum",
        }
    }
}

impl FromStr for InitType {
    type Err = DualDbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "schema" => Ok(InitType::Schema),
            "table" => Ok(InitType::Table),
            "enum" => Ok(InitType::Enum),
            other => Err(crate::dual_error!(
                definition,
                "meta",
                format!("invalid init_type {}", other)
            )),
        }
    }
}

fn default_init_index() -> bool {
    true
}

fn default_index_prefix() -> String {
    DEFAULT_INDEX_PREFIX.to_string()
}

/// 模型元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMeta {
    /// 初始化类型：schema、table 或 enum
    #[serde(default)]
    pub init_type: Option<String>,
    /// 模式名列表
    #[serde(default)]
    pub schema_name: Option<Vec<String>>,
    /// 表名（数据表模型恰好一个）
    #[serde(default)]
    pub table_name: Option<Vec<String>>,
    /// 枚举名（枚举模型恰好一个）
    #[serde(default)]
    pub enum_name: Option<Vec<String>>,
    /// 模式所有者
    #[serde(default)]
    pub authorization: Option<String>,
    /// 是否按存在性条件初始化
    #[serde(default)]
    pub conditional_init: bool,
    /// 是否生成索引语句
    #[serde(default = "default_init_index")]
    pub init_index: bool,
    /// 索引名前缀
    #[serde(default = "default_index_prefix")]
    pub index_prefix: String,
}

impl Default for ModelMeta {
    fn default() -> Self {
        Self {
            init_type: None,
            schema_name: None,
            table_name: None,
            enum_name: None,
            authorization: None,
            conditional_init: false,
            init_index: default_init_index(),
            index_prefix: default_index_prefix(),
        }
    }
}

impl ModelMeta {
    /// 数据表元数据
    pub fn table(schema_names: &[&str], table_name: &str) -> Self {
        Self {
            init_type: Some(InitType::Table.as_str().to_string()),
            schema_name: Some(schema_names.iter().map(|s| s.to_string()).collect()),
            table_name: Some(vec![table_name.to_string()]),
            ..Self::default()
        }
    }

    /// 模式元数据
    pub fn schema(schema_name: &str, authorization: &str) -> Self {
        Self {
            init_type: Some(InitType::Schema.as_str().to_string()),
            schema_name: Some(vec![schema_name.to_string()]),
            authorization: Some(authorization.to_string()),
            ..Self::default()
        }
    }

    /// 枚举元数据
    pub fn enumeration(schema_names: &[&str], enum_name: &str) -> Self {
        Self {
            init_type: Some(InitType::Enum.as_str().to_string()),
            schema_name: Some(schema_names.iter().map(|s| s.to_string()).collect()),
            enum_name: Some(vec![enum_name.to_string()]),
            ..Self::default()
        }
    }

    /// 开启条件初始化
    pub fn conditional(mut self) -> Self {
        self.conditional_init = true;
        self
    }

    /// 关闭索引生成
    pub fn without_index(mut self) -> Self {
        self.init_index = false;
        self
    }

    /// 设置索引名前缀
    pub fn index_prefix(mut self, prefix: &str) -> Self {
        self.index_prefix = prefix.to_string();
        self
    }

    /// 检查元数据并返回初始化类型
    pub(crate) fn inspect(&self, model: &str) -> DualDbResult<InitType> {
        let init_type = match self.init_type.as_deref() {
            Some(init_type) => InitType::from_str(init_type).map_err(|_| {
                crate::dual_error!(definition, model, format!("invalid init_type {}", init_type))
            })?,
            None => return Err(lack_of_meta(model, &["init_type"])),
        };

        let mut lack = Vec::new();
        if self.schema_name.is_none() {
            lack.push("schema_name");
        }
        match init_type {
            InitType::Table if self.table_name.is_none() => lack.push("table_name"),
            InitType::Enum if self.enum_name.is_none() => lack.push("enum_name"),
            _ => {}
        }
        if !lack.is_empty() {
            return Err(lack_of_meta(model, &lack));
        }

        // table_name 只属于数据表，enum_name 只属于枚举
        let mut unexpected = Vec::new();
        if init_type != InitType::Table && self.table_name.is_some() {
            unexpected.push("table_name");
        }
        if init_type != InitType::Enum && self.enum_name.is_some() {
            unexpected.push("enum_name");
        }
        if !unexpected.is_empty() {
            return Err(crate::dual_error!(
                definition,
                model,
                format!(
                    "unexpected meta for init_type {}: {}",
                    init_type.as_str(),
                    unexpected.join(", ")
                )
            ));
        }

        let schema_names = self.schema_name.as_deref().unwrap_or_default();
        if schema_names.is_empty() {
            return Err(crate::dual_error!(definition, model, "schema_name should not be empty"));
        }
        if init_type == InitType::Schema && schema_names.len() > 1 {
            return Err(crate::dual_error!(
                definition,
                model,
                "schema_name should not be more than one if init_type is schema"
            ));
        }

        match init_type {
            InitType::Table => exactly_one(model, "table_name", self.table_name.as_deref())?,
            InitType::Enum => exactly_one(model, "enum_name", self.enum_name.as_deref())?,
            InitType::Schema => {}
        }

        Ok(init_type)
    }
}

fn lack_of_meta(model: &str, keys: &[&str]) -> DualDbError {
    crate::dual_error!(definition, model, format!("lack of meta: {}", keys.join(", ")))
}

fn exactly_one(model: &str, key: &str, names: Option<&[String]>) -> DualDbResult<()> {
    match names.map(<[String]>::len).unwrap_or(0) {
        0 => Err(crate::dual_error!(
            definition,
            model,
            format!("{} should not be empty", key)
        )),
        1 => Ok(()),
        _ => Err(crate::dual_error!(
            definition,
            model,
            format!("{} should not be more than one", key)
        )),
    }
}
