//! PostgreSQL辅助工具函数
//!
//! 参数绑定、结果行解码和驱动错误分类

use crate::error::DualDbError;
use crate::types::DataValue;
use rat_logger::debug;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row, TypeInfo, ValueRef};

/// SQLSTATE：语句被取消（statement_timeout 触发）
const SQLSTATE_QUERY_CANCELED: &str = "57014";
/// SQLSTATE 类别：完整性约束冲突
const SQLSTATE_CLASS_INTEGRITY: &str = "23";

/// 绑定单个参数
pub(crate) fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &DataValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        // 会话执行前 inline_nulls 已把空参数内联为字面量 NULL
        DataValue::Null => query.bind(Option::<String>::None),
        DataValue::Bool(b) => query.bind(*b),
        DataValue::Int(i) => query.bind(*i),
        DataValue::Float(f) => query.bind(*f),
        DataValue::String(s) => query.bind(s.clone()),
        DataValue::Bytes(bytes) => query.bind(bytes.clone()),
        DataValue::DateTime(dt) => query.bind(*dt),
        DataValue::Uuid(uuid) => query.bind(*uuid),
        DataValue::Json(json) => query.bind(json.clone()),
        // 枚举成员以文本绑定，由占位符上的类型转换完成转换
        DataValue::Enum(member) => query.bind(member.value.clone()),
        DataValue::Array(items) => bind_array(query, items),
        DataValue::Object(_) => query.bind(value.to_json_value()),
    }
}

/// 同质数组绑定为原生数组，其余按JSON绑定
fn bind_array<'q>(
    query: Query<'q, Postgres, PgArguments>,
    items: &[DataValue],
) -> Query<'q, Postgres, PgArguments> {
    if items.iter().all(|item| matches!(item, DataValue::Int(_))) {
        let ints: Vec<i64> = items
            .iter()
            .filter_map(|item| match item {
                DataValue::Int(i) => Some(*i),
                _ => None,
            })
            .collect();
        return query.bind(ints);
    }
    if items
        .iter()
        .all(|item| matches!(item, DataValue::String(_) | DataValue::Enum(_)))
    {
        let texts: Vec<String> = items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect();
        return query.bind(texts);
    }
    if items.iter().all(|item| matches!(item, DataValue::Float(_))) {
        let floats: Vec<f64> = items
            .iter()
            .filter_map(|item| match item {
                DataValue::Float(f) => Some(*f),
                _ => None,
            })
            .collect();
        return query.bind(floats);
    }
    query.bind(DataValue::Array(items.to_vec()).to_json_value())
}

fn decode<'r, T>(row: &'r PgRow, index: usize) -> Option<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get::<Option<T>, _>(index).ok().flatten()
}

/// 将PostgreSQL行转换为按列顺序排列的值
pub(crate) fn row_to_values(row: &PgRow) -> Vec<DataValue> {
    let mut values = Vec::with_capacity(row.columns().len());

    for column in row.columns() {
        let index = column.ordinal();
        let is_null = row
            .try_get_raw(index)
            .map(|raw| raw.is_null())
            .unwrap_or(true);
        if is_null {
            values.push(DataValue::Null);
            continue;
        }

        let type_name = column.type_info().name();
        let value = match type_name {
            "INT2" => decode::<i16>(row, index).map(|v| DataValue::Int(v as i64)),
            "INT4" => decode::<i32>(row, index).map(|v| DataValue::Int(v as i64)),
            "INT8" => decode::<i64>(row, index).map(DataValue::Int),
            "FLOAT4" => decode::<f32>(row, index).map(|v| DataValue::Float(v as f64)),
            "FLOAT8" => decode::<f64>(row, index).map(DataValue::Float),
            "BOOL" => decode::<bool>(row, index).map(DataValue::Bool),
            "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => {
                decode::<String>(row, index).map(DataValue::String)
            }
            "UUID" => decode::<uuid::Uuid>(row, index).map(DataValue::Uuid),
            "JSON" | "JSONB" => decode::<serde_json::Value>(row, index)
                .map(crate::types::data_value::json_value_to_data_value),
            "TIMESTAMPTZ" => decode::<chrono::DateTime<chrono::Utc>>(row, index).map(DataValue::from),
            "TIMESTAMP" => decode::<chrono::NaiveDateTime>(row, index)
                .map(|ndt| DataValue::from(ndt.and_utc())),
            "DATE" => decode::<chrono::NaiveDate>(row, index)
                .map(|date| DataValue::String(date.to_string())),
            "TIME" => decode::<chrono::NaiveTime>(row, index)
                .map(|time| DataValue::String(time.to_string())),
            "BYTEA" => decode::<Vec<u8>>(row, index).map(DataValue::Bytes),
            "INT2[]" | "INT4[]" | "INT8[]" => decode::<Vec<i64>>(row, index)
                .or_else(|| {
                    decode::<Vec<i32>>(row, index)
                        .map(|items| items.into_iter().map(i64::from).collect())
                })
                .map(|items| DataValue::Array(items.into_iter().map(DataValue::Int).collect())),
            "FLOAT8[]" => decode::<Vec<f64>>(row, index)
                .map(|items| DataValue::Array(items.into_iter().map(DataValue::Float).collect())),
            "BOOL[]" => decode::<Vec<bool>>(row, index)
                .map(|items| DataValue::Array(items.into_iter().map(DataValue::Bool).collect())),
            type_name if type_name.ends_with("[]") => decode::<Vec<String>>(row, index)
                .map(|items| DataValue::Array(items.into_iter().map(DataValue::String).collect())),
            _ => {
                // 枚举等自定义类型以文本形式传输
                row.try_get_unchecked::<Option<String>, _>(index)
                    .ok()
                    .flatten()
                    .map(DataValue::String)
            }
        };

        values.push(value.unwrap_or_else(|| {
            debug!("列 {} 的类型 {} 无法解码，设置为Null", column.name(), type_name);
            DataValue::Null
        }));
    }

    values
}

/// 按失败类别转换sqlx错误
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> DualDbError {
    match &err {
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            Some(SQLSTATE_QUERY_CANCELED) => DualDbError::TimeoutError {
                message: db_err.message().to_string(),
            },
            Some(code) if code.starts_with(SQLSTATE_CLASS_INTEGRITY) => {
                DualDbError::ConstraintError {
                    message: db_err.message().to_string(),
                }
            }
            _ => DualDbError::QueryError {
                message: db_err.message().to_string(),
            },
        },
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => DualDbError::ConnectionError {
            message: err.to_string(),
        },
        sqlx::Error::Configuration(_) => DualDbError::ConfigError {
            message: err.to_string(),
        },
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            DualDbError::SerializationError {
                message: err.to_string(),
            }
        }
        _ => DualDbError::QueryError {
            message: err.to_string(),
        },
    }
}
