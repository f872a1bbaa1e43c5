use crate::error::DualDbResult;
use crate::types::data_value::DataValue;
use serde::{Deserialize, Serialize};
use indexmap::IndexMap;

/// 写入/更新/删除使用的一条记录（列名 -> 值）
///
/// 保留调用方给出的列顺序，INSERT 与 UPDATE SET 的列按此顺序生成
pub type Record = IndexMap<String, DataValue>;

/// 关系型查询条件：列名紧接操作符后缀，如 `("lot_id=", 1)`、`("camera_ip LIKE", "192.168%")`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionRule {
    /// 带操作符后缀的列名
    pub rule: String,
    /// 比较值
    pub value: DataValue,
}

impl ConditionRule {
    /// 创建查询条件
    pub fn new(rule: impl Into<String>, value: impl Into<DataValue>) -> Self {
        Self {
            rule: rule.into(),
            value: value.into(),
        }
    }

    /// 拆分出列名和操作符
    pub fn split(&self) -> DualDbResult<(String, QueryOperator)> {
        QueryOperator::split_rule(&self.rule)
    }
}

impl<S, V> From<(S, V)> for ConditionRule
where
    S: Into<String>,
    V: Into<DataValue>,
{
    fn from((rule, value): (S, V)) -> Self {
        ConditionRule::new(rule, value)
    }
}

/// 查询操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryOperator {
    /// 等于
    Eq,
    /// 小于
    Lt,
    /// 大于
    Gt,
    /// 小于等于
    Lte,
    /// 大于等于
    Gte,
    /// 模式匹配，值中应包含 `%`
    Like,
}

impl QueryOperator {
    /// 操作符的SQL文本
    pub fn as_sql(&self) -> &'static str {
        match self {
            QueryOperator::Eq => "=",
            QueryOperator::Lt => "<",
            QueryOperator::Gt => ">",
            QueryOperator::Lte => "<=",
            QueryOperator::Gte => ">=",
            QueryOperator::Like => "LIKE",
        }
    }

    /// 从 `列名+操作符` 文本中拆出列名和操作符
    ///
    /// LIKE 之前必须恰好有一个空格
    pub fn split_rule(rule: &str) -> DualDbResult<(String, QueryOperator)> {
        // 两字符操作符必须先于单字符操作符匹配
        const SUFFIXES: [(&str, QueryOperator); 6] = [
            (" LIKE", QueryOperator::Like),
            ("<=", QueryOperator::Lte),
            (">=", QueryOperator::Gte),
            ("=", QueryOperator::Eq),
            ("<", QueryOperator::Lt),
            (">", QueryOperator::Gt),
        ];

        for (suffix, operator) in SUFFIXES {
            if let Some(column) = rule.strip_suffix(suffix) {
                if column.is_empty() || column.ends_with(' ') || column.trim() != column {
                    return Err(crate::dual_error!(
                        validation,
                        "conditional_rule",
                        format!("invalid column in condition rule '{}'", rule)
                    ));
                }
                if operator != QueryOperator::Like && (column.ends_with('<') || column.ends_with('>')) {
                    return Err(crate::dual_error!(
                        validation,
                        "conditional_rule",
                        format!("invalid operator in condition rule '{}'", rule)
                    ));
                }
                return Ok((column.to_string(), operator));
            }
        }

        Err(crate::dual_error!(
            validation,
            "conditional_rule",
            format!(
                "condition rule '{}' must end with one of =, <, >, <=, >=, ' LIKE'",
                rule
            )
        ))
    }
}

/// 排序方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    /// 升序
    Asc,
    /// 降序
    Desc,
}

impl SortDirection {
    /// SQL关键字
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    /// 文档数据库排序值
    pub fn as_document_order(&self) -> i32 {
        match self {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }
}

/// 排序键
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    /// 字段名
    pub field: String,
    /// 排序方向，None 表示使用数据库默认（升序）
    pub direction: Option<SortDirection>,
}

impl SortKey {
    /// 升序
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Some(SortDirection::Asc),
        }
    }

    /// 降序
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Some(SortDirection::Desc),
        }
    }

    /// 解析SQL排序项：`"roi_id DESC"`、`"roi_id ASC"` 或 `"roi_id"`
    pub fn parse_sql(item: &str) -> DualDbResult<Self> {
        let parts: Vec<&str> = item.split_whitespace().collect();
        let invalid = || {
            crate::dual_error!(
                validation,
                "order_by",
                format!("invalid order by item '{}', expected '<column> [ASC|DESC]'", item)
            )
        };
        match parts.as_slice() {
            [field] => Ok(Self {
                field: field.to_string(),
                direction: None,
            }),
            [field, direction] => {
                let direction = match direction.to_uppercase().as_str() {
                    "ASC" => SortDirection::Asc,
                    "DESC" => SortDirection::Desc,
                    _ => return Err(invalid()),
                };
                Ok(Self {
                    field: field.to_string(),
                    direction: Some(direction),
                })
            }
            _ => Err(invalid()),
        }
    }

    /// 解析前缀排序项：`"-modified_time"` 降序，`"+name"` 或 `"name"` 升序
    pub fn parse_prefixed(item: &str) -> DualDbResult<Self> {
        let (field, direction) = if let Some(field) = item.strip_prefix('-') {
            (field, SortDirection::Desc)
        } else if let Some(field) = item.strip_prefix('+') {
            (field, SortDirection::Asc)
        } else {
            (item, SortDirection::Asc)
        };
        if field.is_empty() {
            return Err(crate::dual_error!(validation, "order_by", "empty sort field"));
        }
        Ok(Self {
            field: field.to_string(),
            direction: Some(direction),
        })
    }

    /// 渲染为SQL排序项
    pub fn to_sql(&self) -> String {
        match self.direction {
            Some(direction) => format!("{} {}", self.field, direction.as_sql()),
            None => self.field.clone(),
        }
    }
}

/// 文档数据库查询结果的返回形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnType {
    /// 不返回数据
    Empty,
    /// 可移植形式：标识符转字符串，时间转纪元秒
    Portable,
    /// 存储原样
    Stored,
}

impl ReturnType {
    /// 从字符串解析
    pub fn parse(s: &str) -> DualDbResult<Self> {
        match s {
            "empty" => Ok(ReturnType::Empty),
            "jsonable" | "portable" => Ok(ReturnType::Portable),
            "original" | "stored" => Ok(ReturnType::Stored),
            _ => Err(crate::dual_error!(
                validation,
                "ret_type",
                format!("invalid ret_type: {}", s)
            )),
        }
    }
}

impl Default for ReturnType {
    fn default() -> Self {
        ReturnType::Stored
    }
}
