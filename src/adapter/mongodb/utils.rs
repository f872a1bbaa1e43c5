//! MongoDB工具函数模块
//!
//! DataValue与BSON的转换、可移植形式转换和驱动错误分类

use crate::error::DualDbError;
use crate::types::*;
use mongodb::bson::{Binary, Bson, Document};
use mongodb::bson::spec::BinarySubtype;

/// 重复键错误码
const DUPLICATE_KEY_CODE: i32 = 11000;

/// 将DataValue转换为BSON值
pub fn data_value_to_bson(value: &DataValue) -> Bson {
    match value {
        DataValue::Null => Bson::Null,
        DataValue::Bool(b) => Bson::Boolean(*b),
        DataValue::Int(i) => Bson::Int64(*i),
        DataValue::Float(f) => Bson::Double(*f),
        DataValue::String(s) => Bson::String(s.clone()),
        DataValue::Bytes(bytes) => Bson::Binary(Binary {
            subtype: BinarySubtype::Generic,
            bytes: bytes.clone(),
        }),
        DataValue::DateTime(dt) => {
            Bson::DateTime(mongodb::bson::DateTime::from_millis(dt.timestamp_millis()))
        }
        DataValue::Uuid(uuid) => Bson::String(uuid.to_string()),
        DataValue::Json(json) => {
            mongodb::bson::to_bson(json).unwrap_or_else(|_| Bson::String(json.to_string()))
        }
        DataValue::Array(items) => Bson::Array(items.iter().map(data_value_to_bson).collect()),
        DataValue::Object(map) => {
            let mut doc = Document::new();
            for (key, value) in map {
                doc.insert(key.clone(), data_value_to_bson(value));
            }
            Bson::Document(doc)
        }
        // 枚举成员按值存储
        DataValue::Enum(member) => Bson::String(member.value.clone()),
    }
}

/// 将一条记录转换为文档
pub fn record_to_document(record: &Record) -> Document {
    record
        .iter()
        .map(|(key, value)| (key.clone(), data_value_to_bson(value)))
        .collect()
}

/// 转换为可移植形式：ObjectId 转十六进制字符串，时间转纪元秒，嵌套结构递归处理
pub fn to_portable(document: &Document) -> Document {
    document
        .iter()
        .map(|(key, value)| (key.clone(), portable_value(value)))
        .collect()
}

fn portable_value(value: &Bson) -> Bson {
    match value {
        Bson::ObjectId(oid) => Bson::String(oid.to_hex()),
        Bson::DateTime(dt) => Bson::Double(dt.timestamp_millis() as f64 / 1000.0),
        Bson::Document(doc) => Bson::Document(to_portable(doc)),
        Bson::Array(items) => Bson::Array(items.iter().map(portable_value).collect()),
        other => other.clone(),
    }
}

/// 按失败类别转换MongoDB驱动错误
pub(crate) fn map_mongo_error(err: mongodb::error::Error) -> DualDbError {
    use mongodb::error::{ErrorKind, WriteFailure};

    let message = err.to_string();
    match err.kind.as_ref() {
        ErrorKind::ServerSelection { .. }
        | ErrorKind::Io(_)
        | ErrorKind::ConnectionPoolCleared { .. }
        | ErrorKind::DnsResolve { .. }
        | ErrorKind::Authentication { .. } => DualDbError::ConnectionError { message },
        ErrorKind::Write(WriteFailure::WriteError(write_error))
            if write_error.code == DUPLICATE_KEY_CODE =>
        {
            DualDbError::ConstraintError { message }
        }
        ErrorKind::BulkWrite(failure)
            if failure
                .write_errors
                .as_ref()
                .is_some_and(|errors| errors.iter().any(|e| e.code == DUPLICATE_KEY_CODE)) =>
        {
            DualDbError::ConstraintError { message }
        }
        ErrorKind::Command(command_error) if command_error.code == DUPLICATE_KEY_CODE => {
            DualDbError::ConstraintError { message }
        }
        ErrorKind::InvalidArgument { .. } => DualDbError::ValidationError {
            field: "argument".to_string(),
            message,
        },
        ErrorKind::BsonDeserialization(_) | ErrorKind::BsonSerialization(_) => {
            DualDbError::SerializationError { message }
        }
        _ => DualDbError::QueryError { message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mongodb::bson::doc;
    use mongodb::bson::oid::ObjectId;

    #[test]
    fn test_portable_conversion_is_recursive() {
        let oid = ObjectId::parse_str("65f1c0a2b3d4e5f601234567").unwrap();
        let at = mongodb::bson::DateTime::from_millis(1_700_000_000_500);
        let document = doc! {
            "_id": oid,
            "created": at,
            "nested": { "ref": oid },
            "history": [at, "x"],
        };

        let portable = to_portable(&document);
        assert_eq!(portable.get_str("_id").unwrap(), "65f1c0a2b3d4e5f601234567");
        assert_eq!(portable.get_f64("created").unwrap(), 1_700_000_000.5);
        assert_eq!(
            portable.get_document("nested").unwrap().get_str("ref").unwrap(),
            "65f1c0a2b3d4e5f601234567"
        );
        assert_eq!(
            portable.get_array("history").unwrap()[0],
            Bson::Double(1_700_000_000.5)
        );
    }

    #[test]
    fn test_data_value_to_bson() {
        let member = crate::model::EnumValue::new("HAPPY", "happy", "Mood", "public.mood");
        assert_eq!(data_value_to_bson(&DataValue::Enum(member)), Bson::String("happy".into()));
        assert_eq!(data_value_to_bson(&DataValue::Int(3)), Bson::Int64(3));

        let at = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            data_value_to_bson(&DataValue::from(at)),
            Bson::DateTime(mongodb::bson::DateTime::from_millis(at.timestamp_millis()))
        );

        let record = Record::from([("name".to_string(), DataValue::from("x"))]);
        assert_eq!(record_to_document(&record), doc! { "name": "x" });
    }
}
