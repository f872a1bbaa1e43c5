//! 字段类型定义模块
//!
//! 定义模型字段的列类型、约束和渲染规则

use crate::error::DualDbResult;
use crate::model::enum_types::EnumDefinition;
use crate::types::DataValue;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 字段类型枚举
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldType {
    /// 小整数
    SmallInt,
    /// 整数
    Integer,
    /// 大整数
    BigInt,
    /// 单精度浮点数
    Real,
    /// 双精度浮点数
    Double,
    /// 定点数
    Numeric {
        precision: Option<u8>,
        scale: Option<u8>,
    },
    /// 变长字符串
    Varchar { max_length: Option<usize> },
    /// 文本
    Text,
    /// 布尔
    Boolean,
    /// 不带时区的时间戳
    Timestamp,
    /// 带时区的时间戳
    TimestampTz,
    /// 日期
    Date,
    /// 时间
    Time,
    /// UUID
    Uuid,
    /// JSON
    Json,
    /// JSONB
    Jsonb,
    /// 二进制
    Bytea,
    /// 数组
    Array { item_type: Box<FieldType> },
    /// 已声明的枚举类型（保存带模式的类型名）
    Enum(String),
    /// 任意类型标签，按大写渲染
    Custom(String),
}

impl FieldType {
    /// 从类型标签解析
    ///
    /// 未识别的标签保留为 `Custom`
    pub fn parse(tag: &str) -> Self {
        let trimmed = tag.trim();
        if let Some(inner) = trimmed.strip_suffix("[]") {
            return FieldType::Array {
                item_type: Box::new(FieldType::parse(inner)),
            };
        }
        match trimmed.to_uppercase().as_str() {
            "SMALLINT" | "INT2" => FieldType::SmallInt,
            "INTEGER" | "INT" | "INT4" => FieldType::Integer,
            "BIGINT" | "INT8" => FieldType::BigInt,
            "REAL" | "FLOAT4" => FieldType::Real,
            "DOUBLE PRECISION" | "FLOAT8" => FieldType::Double,
            "NUMERIC" | "DECIMAL" => FieldType::Numeric {
                precision: None,
                scale: None,
            },
            "VARCHAR" => FieldType::Varchar { max_length: None },
            "TEXT" => FieldType::Text,
            "BOOLEAN" | "BOOL" => FieldType::Boolean,
            "TIMESTAMP" => FieldType::Timestamp,
            "TIMESTAMPTZ" => FieldType::TimestampTz,
            "DATE" => FieldType::Date,
            "TIME" => FieldType::Time,
            "UUID" => FieldType::Uuid,
            "JSON" => FieldType::Json,
            "JSONB" => FieldType::Jsonb,
            "BYTEA" => FieldType::Bytea,
            _ => FieldType::Custom(trimmed.to_string()),
        }
    }

    /// 渲染为SQL类型文本
    pub fn to_sql(&self) -> String {
        match self {
            FieldType::SmallInt => "SMALLINT".to_string(),
            FieldType::Integer => "INTEGER".to_string(),
            FieldType::BigInt => "BIGINT".to_string(),
            FieldType::Real => "REAL".to_string(),
            FieldType::Double => "DOUBLE PRECISION".to_string(),
            FieldType::Numeric { precision, scale } => match (precision, scale) {
                (Some(p), Some(s)) => format!("NUMERIC({}, {})", p, s),
                (Some(p), None) => format!("NUMERIC({})", p),
                _ => "NUMERIC".to_string(),
            },
            FieldType::Varchar { max_length } => match max_length {
                Some(len) => format!("VARCHAR({})", len),
                None => "VARCHAR".to_string(),
            },
            FieldType::Text => "TEXT".to_string(),
            FieldType::Boolean => "BOOLEAN".to_string(),
            FieldType::Timestamp => "TIMESTAMP".to_string(),
            FieldType::TimestampTz => "TIMESTAMPTZ".to_string(),
            FieldType::Date => "DATE".to_string(),
            FieldType::Time => "TIME".to_string(),
            FieldType::Uuid => "UUID".to_string(),
            FieldType::Json => "JSON".to_string(),
            FieldType::Jsonb => "JSONB".to_string(),
            FieldType::Bytea => "BYTEA".to_string(),
            FieldType::Array { item_type } => format!("{}[]", item_type.to_sql()),
            FieldType::Enum(name) => name.clone(),
            FieldType::Custom(tag) => tag.to_uppercase(),
        }
    }

    /// 自增时对应的序列类型
    fn serial_sql(&self) -> Option<&'static str> {
        match self {
            FieldType::SmallInt => Some("SMALLSERIAL"),
            FieldType::Integer => Some("SERIAL"),
            FieldType::BigInt => Some("BIGSERIAL"),
            _ => None,
        }
    }
}

/// 字段定义
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    /// 字段类型，None 表示由枚举引用或自增推断
    pub field_type: Option<FieldType>,
    /// 是否必填（NOT NULL）
    pub required: bool,
    /// 默认值（字面量或表达式文本）
    pub default: Option<String>,
    /// 是否自增
    pub auto_increment: bool,
    /// 是否主键
    pub primary_key: bool,
    /// 是否唯一
    pub unique: bool,
    /// CHECK 约束表达式
    pub check: Option<String>,
    /// 生成列表达式
    pub generated_as: Option<String>,
    /// 索引方法（BTREE、HASH、GIST、GIN、BRIN、SPGIST）
    pub index_method: Option<String>,
    /// 附加在末尾的自定义子句
    pub custom_clause: Option<String>,
    /// 引用的枚举定义
    pub enum_ref: Option<Arc<EnumDefinition>>,
}

impl FieldDefinition {
    /// 创建新的字段定义
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type: Some(field_type),
            ..Self::untyped()
        }
    }

    /// 创建未指定类型的字段定义
    pub fn untyped() -> Self {
        Self {
            field_type: None,
            required: false,
            default: None,
            auto_increment: false,
            primary_key: false,
            unique: false,
            check: None,
            generated_as: None,
            index_method: None,
            custom_clause: None,
            enum_ref: None,
        }
    }

    /// 设置为必填字段
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// 设置默认值
    pub fn default_value(mut self, expr: &str) -> Self {
        self.default = Some(expr.to_string());
        self
    }

    /// 设置为自增字段
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// 设置为主键
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// 设置为唯一字段
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// 设置CHECK约束
    pub fn check(mut self, expr: &str) -> Self {
        self.check = Some(expr.to_string());
        self
    }

    /// 设置生成列表达式
    pub fn generated_as(mut self, expr: &str) -> Self {
        self.generated_as = Some(expr.to_string());
        self
    }

    /// 设置索引方法
    pub fn indexed(mut self, method: &str) -> Self {
        self.index_method = Some(method.to_string());
        self
    }

    /// 设置自定义子句
    pub fn custom_clause(mut self, clause: &str) -> Self {
        self.custom_clause = Some(clause.to_string());
        self
    }

    /// 引用枚举定义
    pub fn with_enum(mut self, definition: &Arc<EnumDefinition>) -> Self {
        self.enum_ref = Some(Arc::clone(definition));
        self
    }

    /// 是否为自增主键
    pub fn is_serial_primary_key(&self) -> bool {
        self.auto_increment && self.primary_key
    }

    /// 解析字段的最终类型
    ///
    /// 枚举引用要求类型为空或与枚举名一致
    pub(crate) fn resolve(mut self, model: &str, column: &str) -> DualDbResult<Self> {
        if let Some(definition) = &self.enum_ref {
            let matches = match &self.field_type {
                None => true,
                Some(FieldType::Enum(name)) | Some(FieldType::Custom(name)) => {
                    name == definition.name() || name == definition.type_name()
                }
                Some(_) => false,
            };
            if !matches {
                return Err(crate::dual_error!(
                    definition,
                    model,
                    format!(
                        "field {} references enum {} but is declared as {}",
                        column,
                        definition.name(),
                        self.field_type
                            .as_ref()
                            .map(FieldType::to_sql)
                            .unwrap_or_default()
                    )
                ));
            }
            if self.auto_increment {
                return Err(crate::dual_error!(
                    definition,
                    model,
                    format!("enum field {} cannot be auto increment", column)
                ));
            }
            self.field_type = Some(FieldType::Enum(definition.type_name().to_string()));
            return Ok(self);
        }

        match &self.field_type {
            None if self.auto_increment => {
                self.field_type = Some(FieldType::Integer);
            }
            None => {
                return Err(crate::dual_error!(
                    definition,
                    model,
                    format!("field {} has no type", column)
                ));
            }
            Some(FieldType::Enum(name)) => {
                return Err(crate::dual_error!(
                    definition,
                    model,
                    format!("field {} is typed as enum {} without an enum reference", column, name)
                ));
            }
            Some(field_type) if self.auto_increment && field_type.serial_sql().is_none() => {
                return Err(crate::dual_error!(
                    definition,
                    model,
                    format!(
                        "field {} is auto increment but typed as {}",
                        column,
                        field_type.to_sql()
                    )
                ));
            }
            Some(_) => {}
        }
        Ok(self)
    }

    /// 渲染类型部分
    pub fn render_type(&self) -> String {
        match (&self.field_type, self.auto_increment) {
            (Some(field_type), true) => field_type
                .serial_sql()
                .map(str::to_string)
                .unwrap_or_else(|| field_type.to_sql()),
            (Some(field_type), false) => field_type.to_sql(),
            (None, true) => "SERIAL".to_string(),
            (None, false) => self
                .enum_ref
                .as_ref()
                .map(|definition| definition.type_name().to_string())
                .unwrap_or_default(),
        }
    }

    /// 渲染完整的列定义（不含列名）
    pub fn render(&self) -> String {
        let mut sql = self.render_type();
        if let Some(default) = &self.default {
            sql.push_str(&format!(" DEFAULT {}", default));
        }
        if self.required {
            sql.push_str(" NOT NULL");
        }
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        if self.unique {
            sql.push_str(" UNIQUE");
        }
        if let Some(check) = &self.check {
            sql.push_str(&format!(" CHECK ({})", check));
        }
        if let Some(generated) = &self.generated_as {
            sql.push_str(&format!(" GENERATED ALWAYS AS ({}) STORED", generated));
        }
        if let Some(clause) = &self.custom_clause {
            sql.push(' ');
            sql.push_str(clause);
        }
        sql
    }

    /// 将默认值文本转换为行内默认值
    pub fn default_data_value(&self) -> DataValue {
        let Some(default) = self.default.as_deref() else {
            return DataValue::Null;
        };
        let text = default.trim();

        if text.starts_with("ARRAY[]::") {
            return DataValue::Array(Vec::new());
        }
        if text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'') {
            let literal = text[1..text.len() - 1].replace("''", "'");
            if let Some(member) = self
                .enum_ref
                .as_ref()
                .and_then(|definition| definition.by_value(&literal))
            {
                return DataValue::Enum(member.clone());
            }
            return DataValue::String(literal);
        }
        if let Ok(i) = text.parse::<i64>() {
            return DataValue::Int(i);
        }
        if let Ok(f) = text.parse::<f64>() {
            return DataValue::Float(f);
        }
        match text.to_uppercase().as_str() {
            "TRUE" => DataValue::Bool(true),
            "FALSE" => DataValue::Bool(false),
            "NULL" => DataValue::Null,
            _ => DataValue::String(text.to_string()),
        }
    }
}
