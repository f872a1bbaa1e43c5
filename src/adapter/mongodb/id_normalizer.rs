//! 文档过滤条件中的标识符规范化
//!
//! 调用者以十六进制字符串书写 `_id`，存储中保存的是 ObjectId。
//! 规范化返回一份新文档，原条件不变

use crate::error::DualDbResult;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{Bson, Document};

/// 默认标识符字段
pub const DEFAULT_ID_FIELD: &str = "_id";

/// 操作符前缀
pub const OPERATOR_PREFIX: char = '$';

/// 把24位十六进制字符串编码为ObjectId
pub fn object_id_encoder(value: &str) -> DualDbResult<Bson> {
    ObjectId::parse_str(value).map(Bson::ObjectId).map_err(|e| {
        crate::dual_error!(
            validation,
            DEFAULT_ID_FIELD,
            format!("invalid object id '{}': {}", value, e)
        )
    })
}

/// 规范化过滤条件中的标识符
///
/// - 条件含 `id_field` 时，只改写该字段：字符串直接编码；操作符子文档中的字符串编码，
///   数组中的字符串元素编码，嵌套文档递归处理
/// - 不含 `id_field` 时，`$` 开头且值为字符串的键被编码，值为数组时其中每个文档递归规范化
/// - 其余键原样复制
pub fn normalize_id_condition<E>(
    conditions: &Document,
    id_field: &str,
    encoder: &E,
) -> DualDbResult<Document>
where
    E: Fn(&str) -> DualDbResult<Bson>,
{
    let mut normalized = Document::new();

    if conditions.contains_key(id_field) {
        for (key, value) in conditions {
            let value = if key == id_field {
                normalize_id_value(value, id_field, encoder)?
            } else {
                value.clone()
            };
            normalized.insert(key.clone(), value);
        }
        return Ok(normalized);
    }

    for (key, value) in conditions {
        let value = if key.starts_with(OPERATOR_PREFIX) {
            match value {
                Bson::String(s) => encoder(s)?,
                Bson::Array(items) => Bson::Array(
                    items
                        .iter()
                        .map(|item| match item {
                            Bson::Document(doc) => {
                                normalize_id_condition(doc, id_field, encoder).map(Bson::Document)
                            }
                            other => Ok(other.clone()),
                        })
                        .collect::<DualDbResult<Vec<_>>>()?,
                ),
                other => other.clone(),
            }
        } else {
            value.clone()
        };
        normalized.insert(key.clone(), value);
    }
    Ok(normalized)
}

fn normalize_id_value<E>(value: &Bson, id_field: &str, encoder: &E) -> DualDbResult<Bson>
where
    E: Fn(&str) -> DualDbResult<Bson>,
{
    match value {
        Bson::String(s) => encoder(s),
        Bson::Document(operators) => {
            let mut normalized = Document::new();
            for (operator, operand) in operators {
                let operand = match operand {
                    Bson::String(s) => encoder(s)?,
                    Bson::Array(items) => Bson::Array(
                        items
                            .iter()
                            .map(|item| match item {
                                Bson::String(s) => encoder(s),
                                other => Ok(other.clone()),
                            })
                            .collect::<DualDbResult<Vec<_>>>()?,
                    ),
                    Bson::Document(nested) => {
                        Bson::Document(normalize_id_condition(nested, id_field, encoder)?)
                    }
                    other => other.clone(),
                };
                normalized.insert(operator.clone(), operand);
            }
            Ok(Bson::Document(normalized))
        }
        other => Ok(other.clone()),
    }
}
