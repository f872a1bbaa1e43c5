//! PostgreSQL处理器集成测试
//!
//! 使用内存连接器执行处理器生成的语句，验证往返、幂等和失败路径

mod common;

use common::{postgres_config, MemoryPostgres};
use dualdb::*;
use std::sync::Arc;

fn record(pairs: &[(&str, DataValue)]) -> Record {
    pairs
        .iter()
        .map(|(column, value)| (column.to_string(), value.clone()))
        .collect()
}

fn person_db() -> MemoryPostgres {
    MemoryPostgres::new().with_table("person", &["id", "name", "age"], &["id"])
}

fn handler(db: &MemoryPostgres) -> PostgresHandler {
    PostgresHandler::with_connector(postgres_config(), Arc::new(db.clone()))
}

#[tokio::test]
async fn test_add_then_get_round_trip() {
    let db = person_db();
    let handler = handler(&db);

    let added = handler
        .add_data(
            "person",
            &[
                record(&[("name", "alice".into()), ("age", 30.into())]),
                record(&[("name", "bob".into()), ("age", 25.into())]),
            ],
            &[],
            false,
            true,
            None,
        )
        .await;
    assert!(added.indicator, "{}", added.message);
    assert_eq!(added.affected_rows, 2);

    let fetched = handler
        .get_data(
            "person",
            &[],
            &[ConditionRule::new("name=", "alice")],
            &[],
            -1,
            None,
        )
        .await;
    assert!(fetched.indicator, "{}", fetched.message);
    assert_eq!(fetched.header, vec!["id", "name", "age"]);
    assert_eq!(fetched.formatted_data.len(), 1);
    let row = &fetched.formatted_data[0];
    assert_eq!(row["id"], DataValue::Int(1));
    assert_eq!(row["name"], DataValue::from("alice"));
    assert_eq!(row["age"], DataValue::Int(30));

    // 每次调用都新建并关闭连接
    let (opened, closed) = db.connections();
    assert_eq!(opened, closed);
}

#[tokio::test]
async fn test_insert_excludes_serial_column() {
    let db = MemoryPostgres::new().with_table("person", &["id", "name"], &["id"]);
    let handler = handler(&db);

    let envelope = handler
        .add_data("person", &[record(&[("name", "carol".into())])], &[], false, true, None)
        .await;
    assert!(envelope.indicator, "{}", envelope.message);

    let log = db.log();
    assert!(log[0].contains("information_schema.columns"));
    assert!(log[0].contains("nextval"));
    assert!(log.contains(&"INSERT INTO person (name) VALUES ($1);".to_string()));
    assert_eq!(db.rows("person")[0]["id"], DataValue::Int(1));
}

#[tokio::test]
async fn test_missing_column_fails_before_any_write() {
    let db = person_db();
    let handler = handler(&db);

    let envelope = handler
        .add_data(
            "person",
            &[
                record(&[("name", "dave".into()), ("age", 41.into())]),
                record(&[("age", 19.into())]),
            ],
            &["name".to_string(), "age".to_string()],
            false,
            false,
            None,
        )
        .await;

    assert!(!envelope.indicator);
    assert_eq!(envelope.message, "missing data ( person ): name");
    assert_eq!(envelope.error_kind, Some(ErrorKind::Validation));
    assert!(envelope.data.is_empty());
    assert!(db.log().is_empty());
    assert_eq!(db.connections(), (0, 0));
    assert!(db.rows("person").is_empty());
}

#[tokio::test]
async fn test_missing_column_written_as_null() {
    let db = person_db();
    let handler = handler(&db);

    let envelope = handler
        .add_data(
            "person",
            &[record(&[("name", "erin".into())])],
            &["name".to_string(), "age".to_string()],
            true,
            false,
            None,
        )
        .await;
    assert!(envelope.indicator, "{}", envelope.message);
    assert_eq!(db.rows("person")[0]["age"], DataValue::Null);
}

#[tokio::test]
async fn test_update_is_idempotent() {
    let db = person_db();
    let handler = handler(&db);
    handler
        .add_data(
            "person",
            &[record(&[("name", "frank".into()), ("age", 50.into())])],
            &[],
            false,
            true,
            None,
        )
        .await;

    let edits = [record(&[
        ("id", 1.into()),
        ("name", "frank".into()),
        ("age", 51.into()),
    ])];
    let reference = ["id".to_string()];

    let first = handler.update_data("person", &edits, &reference, None).await;
    let after_first = db.rows("person");
    let second = handler.update_data("person", &edits, &reference, None).await;

    assert!(first.indicator && second.indicator);
    assert_eq!(first.affected_rows, 1);
    assert_eq!(second.affected_rows, 1);
    assert_eq!(after_first, db.rows("person"));
    assert_eq!(after_first[0]["age"], DataValue::Int(51));

    let log = db.log();
    assert!(log.contains(&"UPDATE person SET id=$1, name=$2, age=$3 WHERE id=$4;".to_string()));
    assert_eq!(log.iter().filter(|sql| *sql == "COMMIT").count(), 3);
}

#[tokio::test]
async fn test_update_without_reference_fails() {
    let db = person_db();
    let envelope = handler(&db)
        .update_data("person", &[record(&[("age", 1.into())])], &[], None)
        .await;
    assert!(!envelope.indicator);
    assert!(envelope.message.contains("No reference."));
    assert_eq!(db.connections(), (0, 0));
}

#[tokio::test]
async fn test_delete_without_match_succeeds() {
    let db = person_db();
    let handler = handler(&db);

    let envelope = handler
        .delete_data("person", &[record(&[("id", 99.into())])], &["id".to_string()], None)
        .await;
    assert!(envelope.indicator, "{}", envelope.message);
    assert_eq!(envelope.affected_rows, 0);
    assert!(db.log().contains(&"DELETE FROM person WHERE id=$1;".to_string()));
}

#[tokio::test]
async fn test_empty_inputs_skip_connection() {
    let db = person_db();
    let handler = handler(&db);

    assert_eq!(handler.add_data("person", &[], &[], false, false, None).await.message, "Nothing to add.");
    assert_eq!(handler.update_data("person", &[], &[], None).await.message, "Nothing to update.");
    assert_eq!(handler.delete_data("person", &[], &[], None).await.message, "Nothing to delete.");
    assert_eq!(db.connections(), (0, 0));
}

#[tokio::test]
async fn test_headers_are_cached_until_forced() {
    let db = person_db();
    let handler = handler(&db);
    let filter = HeaderFilter::default();

    let first = handler.get_headers("person", false, filter).await;
    let second = handler.get_headers("person", false, filter).await;
    assert_eq!(first.header, vec!["id", "name", "age"]);
    assert_eq!(first.header, second.header);
    assert_eq!(db.log().len(), 1);

    handler.get_headers("person", true, filter).await;
    assert_eq!(db.log().len(), 2);

    // 不存在的表返回空列名且不缓存
    let missing = handler.get_headers("ghost", false, filter).await;
    assert!(missing.indicator);
    assert!(missing.header.is_empty());
    handler.get_headers("ghost", false, filter).await;
    assert_eq!(db.log().len(), 4);
}

#[tokio::test]
async fn test_statement_timeout_resolution() {
    let db = person_db();
    let handler = handler(&db);

    handler.get_data("person", &[], &[], &[], -1, Some(3)).await;
    assert_eq!(db.state.lock().unwrap().last_timeout_ms, Some(3000));

    handler.get_data("person", &[], &[], &[], -1, None).await;
    assert_eq!(db.state.lock().unwrap().last_timeout_ms, None);

    handler.get_data("person", &[], &[], &[], -1, Some(0)).await;
    assert_eq!(db.state.lock().unwrap().last_timeout_ms, None);
}

#[tokio::test]
async fn test_huge_statement_timeout_is_capped() {
    let db = person_db();
    let handler = handler(&db);

    let envelope = handler
        .get_data("person", &[], &[], &[], -1, Some(i64::MAX / 10))
        .await;
    assert!(envelope.indicator, "{}", envelope.message);
    assert_eq!(
        db.state.lock().unwrap().last_timeout_ms,
        Some(i32::MAX as u64)
    );

    handler.get_data("person", &[], &[], &[], -1, Some(i64::MIN)).await;
    assert_eq!(db.state.lock().unwrap().last_timeout_ms, None);
}

#[tokio::test]
async fn test_table_list() {
    let db = person_db().with_table("lot_table", &["id"], &[]);
    let envelope = handler(&db).get_table_list().await;
    assert!(envelope.indicator);
    assert_eq!(
        envelope.data,
        vec![vec![DataValue::from("lot_table")], vec![DataValue::from("person")]]
    );
}

#[tokio::test]
async fn test_enum_column_round_trip() {
    let mood_model = ModelBuilder::new("Mood", ModelMeta::enumeration(&["public"], "mood"))
        .enum_value("HAPPY", "happy")
        .enum_value("SAD", "sad")
        .build()
        .unwrap();
    let mood = mood_model.enum_definition().unwrap().clone();
    let person = ModelBuilder::new("Person", ModelMeta::table(&["public"], "person"))
        .field("id", serial_field())
        .field("name", text_field().required())
        .field("mood", enum_field(&mood))
        .build()
        .unwrap();

    let db = MemoryPostgres::new().with_table("person", &["id", "name", "mood"], &["id"]);
    let handler = handler(&db);
    let sad = mood.by_key("SAD").unwrap().clone();

    let mut instance = ModelInstance::new(&person);
    instance.set("name", "gina").unwrap();
    instance.set("mood", sad.clone()).unwrap();

    let added = handler
        .add_data("person", &[instance.to_table_format()], &[], false, true, None)
        .await;
    assert!(added.indicator, "{}", added.message);
    assert!(db
        .log()
        .contains(&"INSERT INTO person (name, mood) VALUES ($1, $2::public.mood);".to_string()));

    let mut fetched = handler
        .get_data(
            "person",
            &["name", "mood"],
            &[ConditionRule::new("mood=", sad.clone())],
            &[],
            1,
            None,
        )
        .await;
    assert!(fetched.indicator, "{}", fetched.message);
    assert_eq!(fetched.formatted_data[0]["mood"], DataValue::from("sad"));

    restore_enums(&person, &mut fetched.formatted_data, None).unwrap();
    assert_eq!(fetched.formatted_data[0]["mood"], DataValue::Enum(sad));
    assert_eq!(fetched.formatted_data[0]["name"], DataValue::from("gina"));
}

#[tokio::test]
async fn test_accumulator_applies_through_handler() {
    let db = person_db();
    let handler = handler(&db);

    let mood_model = ModelBuilder::new("Mood", ModelMeta::enumeration(&["public"], "mood"))
        .enum_value("HAPPY", "happy")
        .build()
        .unwrap();
    let lot = ModelBuilder::new("LotTable", ModelMeta::table(&["public", "backup"], "lot_table"))
        .field("id", serial_field())
        .field("camera_ip", text_field().required().indexed("hash"))
        .build()
        .unwrap();

    let mut accumulator = SqlAccumulator::new();
    let nothing = accumulator.apply_all(&handler).await;
    assert_eq!(nothing.message, "Nothing to apply.");
    assert_eq!(db.connections(), (0, 0));

    accumulator.register_for_creation(&lot).unwrap();
    accumulator.register_for_creation(&mood_model).unwrap();
    let envelope = accumulator.apply_all(&handler).await;
    assert!(envelope.indicator, "{}", envelope.message);

    let log = db.log();
    assert_eq!(log.len(), 1);
    let script = &log[0];
    let enum_at = script.find("CREATE TYPE public.mood").unwrap();
    let table_at = script.find("CREATE TABLE IF NOT EXISTS public.lot_table").unwrap();
    let index_at = script.find("CREATE INDEX IF NOT EXISTS").unwrap();
    assert!(enum_at < table_at && table_at < index_at);
    assert!(script.contains("CREATE TABLE IF NOT EXISTS backup.lot_table"));
    assert!(script.contains("USING HASH (camera_ip);"));
}
