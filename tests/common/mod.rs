//! 集成测试共用的内存连接器
//!
//! `MemoryPostgres` 解析本库生成的语句文本，在内存表上执行；
//! `MemoryMongo` 在内存集合上执行简单的过滤、写入、更新和删除

#![allow(dead_code)]

use async_trait::async_trait;
use dualdb::adapter::mongodb::{DocumentConnector, DocumentSession};
use dualdb::adapter::postgres::{QueryOutput, SqlConnector, SqlSession};
use dualdb::{DataValue, DualDbResult, MongoConfig, PostgresConfig};
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{Bson, Document};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

pub fn postgres_config() -> PostgresConfig {
    PostgresConfig::builder()
        .host("127.0.0.1")
        .port(5432)
        .database("parking")
        .username("postgres")
        .password("postgres")
        .build()
        .unwrap()
}

pub fn mongo_config() -> MongoConfig {
    MongoConfig::builder()
        .alias("default")
        .host("127.0.0.1")
        .port(27017)
        .database("vpgs")
        .build()
        .unwrap()
}

// ---------------------------------------------------------------------------
// PostgreSQL
// ---------------------------------------------------------------------------

type Row = BTreeMap<String, DataValue>;

#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    pub columns: Vec<String>,
    pub serial: Vec<String>,
    pub rows: Vec<Row>,
    next_id: i64,
}

#[derive(Debug, Default)]
pub struct PgState {
    pub tables: HashMap<String, MemoryTable>,
    /// 执行过的语句（含 BEGIN/COMMIT/ROLLBACK 和脚本）
    pub log: Vec<String>,
    pub opened: usize,
    pub closed: usize,
    pub last_timeout_ms: Option<u64>,
    snapshot: Option<HashMap<String, MemoryTable>>,
}

#[derive(Clone, Default)]
pub struct MemoryPostgres {
    pub state: Arc<Mutex<PgState>>,
}

impl MemoryPostgres {
    pub fn new() -> Self {
        Self::default()
    }

    /// 声明一张表，`serial` 中的列写入时自动编号
    pub fn with_table(self, name: &str, columns: &[&str], serial: &[&str]) -> Self {
        self.state.lock().unwrap().tables.insert(
            name.to_string(),
            MemoryTable {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                serial: serial.iter().map(|c| c.to_string()).collect(),
                rows: Vec::new(),
                next_id: 1,
            },
        );
        self
    }

    pub fn log(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.state.lock().unwrap().tables[table].rows.clone()
    }

    pub fn connections(&self) -> (usize, usize) {
        let state = self.state.lock().unwrap();
        (state.opened, state.closed)
    }
}

#[async_trait]
impl SqlConnector for MemoryPostgres {
    async fn connect(&self, statement_timeout_ms: Option<u64>) -> DualDbResult<Box<dyn SqlSession>> {
        let mut state = self.state.lock().unwrap();
        state.opened += 1;
        state.last_timeout_ms = statement_timeout_ms;
        Ok(Box::new(MemoryPgSession {
            state: self.state.clone(),
        }))
    }
}

struct MemoryPgSession {
    state: Arc<Mutex<PgState>>,
}

/// `$3::public.mood` -> 2
fn arg_index(placeholder: &str) -> usize {
    let digits = placeholder
        .trim_start_matches('$')
        .split("::")
        .next()
        .unwrap_or_default();
    digits.parse::<usize>().unwrap() - 1
}

/// 枚举成员以文本存储
fn stored(value: &DataValue) -> DataValue {
    match value {
        DataValue::Enum(member) => DataValue::String(member.value.clone()),
        other => other.clone(),
    }
}

fn cut<'a>(text: &'a str, markers: &[&str]) -> &'a str {
    markers
        .iter()
        .filter_map(|marker| text.find(marker))
        .min()
        .map(|at| &text[..at])
        .unwrap_or(text)
}

/// `a=$1 AND b=$2` 或 `a = $1 AND b = $2`
fn parse_equalities(clause: &str, args: &[DataValue]) -> Vec<(String, DataValue)> {
    clause
        .split(" AND ")
        .map(|item| {
            let item = item.replace(" = ", "=");
            let (column, placeholder) = item.split_once('=').unwrap();
            (column.trim().to_string(), stored(&args[arg_index(placeholder.trim())]))
        })
        .collect()
}

fn matches(row: &Row, conditions: &[(String, DataValue)]) -> bool {
    conditions
        .iter()
        .all(|(column, value)| row.get(column).unwrap_or(&DataValue::Null) == value)
}

#[async_trait]
impl SqlSession for MemoryPgSession {
    async fn query(&mut self, sql: &str, args: &[DataValue]) -> DualDbResult<QueryOutput> {
        let mut state = self.state.lock().unwrap();
        state.log.push(sql.to_string());

        if sql.contains("information_schema.columns") {
            let table_name = args[1].as_str().unwrap().to_string();
            let exclude_serial = sql.contains("nextval");
            let table = state.tables.get(&table_name).cloned().unwrap_or_default();
            let rows = table
                .columns
                .iter()
                .filter(|column| !(exclude_serial && table.serial.contains(column)))
                .map(|column| vec![DataValue::from(column.as_str())])
                .collect();
            return Ok(QueryOutput {
                header: vec!["column_name".to_string()],
                rows,
            });
        }

        if sql.contains("pg_catalog.pg_tables") {
            let mut names: Vec<String> = state.tables.keys().cloned().collect();
            names.sort();
            return Ok(QueryOutput {
                header: vec!["tablename".to_string()],
                rows: names.into_iter().map(|n| vec![DataValue::from(n)]).collect(),
            });
        }

        let body = sql.trim_end_matches(';').trim_start_matches("SELECT ");
        let (columns, rest) = body.split_once(" FROM ").unwrap();
        let table_name = cut(rest, &[" WHERE ", " ORDER BY ", " LIMIT "]).to_string();
        let conditions = match rest.split_once(" WHERE ") {
            Some((_, clause)) => parse_equalities(cut(clause, &[" ORDER BY ", " LIMIT "]), args),
            None => Vec::new(),
        };
        let table = &state.tables[&table_name];
        let header: Vec<String> = if columns == "*" {
            table.columns.clone()
        } else {
            columns.split(", ").map(str::to_string).collect()
        };
        let rows = table
            .rows
            .iter()
            .filter(|row| matches(row, &conditions))
            .map(|row| {
                header
                    .iter()
                    .map(|column| row.get(column).cloned().unwrap_or(DataValue::Null))
                    .collect()
            })
            .collect();
        Ok(QueryOutput { header, rows })
    }

    async fn execute(&mut self, sql: &str, args: &[DataValue]) -> DualDbResult<u64> {
        let mut state = self.state.lock().unwrap();
        state.log.push(sql.to_string());
        let body = sql.trim_end_matches(';');

        if let Some(rest) = body.strip_prefix("INSERT INTO ") {
            let (table_name, rest) = rest.split_once(" (").unwrap();
            let (columns, _) = rest.split_once(')').unwrap();
            let table = state.tables.get_mut(table_name).unwrap();
            let mut row = Row::new();
            for (i, column) in columns.split(", ").enumerate() {
                row.insert(column.to_string(), stored(&args[i]));
            }
            for column in table.serial.clone() {
                if !row.contains_key(&column) {
                    row.insert(column, DataValue::Int(table.next_id));
                    table.next_id += 1;
                }
            }
            table.rows.push(row);
            return Ok(1);
        }

        if let Some(rest) = body.strip_prefix("UPDATE ") {
            let (table_name, rest) = rest.split_once(" SET ").unwrap();
            let (assignments, clause) = rest.split_once(" WHERE ").unwrap();
            let updates = assignments
                .split(", ")
                .map(|item| {
                    let (column, placeholder) = item.split_once('=').unwrap();
                    (column.to_string(), stored(&args[arg_index(placeholder)]))
                })
                .collect::<Vec<_>>();
            let conditions = parse_equalities(clause, args);
            let table = state.tables.get_mut(table_name).unwrap();
            let mut affected = 0;
            for row in table.rows.iter_mut().filter(|row| matches(row, &conditions)) {
                for (column, value) in &updates {
                    row.insert(column.clone(), value.clone());
                }
                affected += 1;
            }
            return Ok(affected);
        }

        if let Some(rest) = body.strip_prefix("DELETE FROM ") {
            let (table_name, clause) = rest.split_once(" WHERE ").unwrap();
            let conditions = parse_equalities(clause, args);
            let table = state.tables.get_mut(table_name).unwrap();
            let before = table.rows.len();
            table.rows.retain(|row| !matches(row, &conditions));
            return Ok((before - table.rows.len()) as u64);
        }

        panic!("unsupported statement: {}", sql);
    }

    async fn execute_script(&mut self, sql: &str) -> DualDbResult<u64> {
        self.state.lock().unwrap().log.push(sql.to_string());
        Ok(0)
    }

    async fn begin(&mut self) -> DualDbResult<()> {
        let mut state = self.state.lock().unwrap();
        state.log.push("BEGIN".to_string());
        state.snapshot = Some(state.tables.clone());
        Ok(())
    }

    async fn commit(&mut self) -> DualDbResult<()> {
        let mut state = self.state.lock().unwrap();
        state.log.push("COMMIT".to_string());
        state.snapshot = None;
        Ok(())
    }

    async fn rollback(&mut self) -> DualDbResult<()> {
        let mut state = self.state.lock().unwrap();
        state.log.push("ROLLBACK".to_string());
        if let Some(snapshot) = state.snapshot.take() {
            state.tables = snapshot;
        }
        Ok(())
    }

    async fn close(self: Box<Self>) -> DualDbResult<()> {
        self.state.lock().unwrap().closed += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MongoDB
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MongoState {
    pub collections: HashMap<String, Vec<Document>>,
    /// 驱动收到的过滤条件（已规范化）
    pub filters: Vec<Document>,
    pub opened: usize,
    pub closed: usize,
}

#[derive(Clone, Default)]
pub struct MemoryMongo {
    pub state: Arc<Mutex<MongoState>>,
}

impl MemoryMongo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.state
            .lock()
            .unwrap()
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn filters(&self) -> Vec<Document> {
        self.state.lock().unwrap().filters.clone()
    }

    pub fn connections(&self) -> (usize, usize) {
        let state = self.state.lock().unwrap();
        (state.opened, state.closed)
    }
}

fn numeric(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(i) => Some(*i as f64),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(f) => Some(*f),
        _ => None,
    }
}

fn same(left: &Bson, right: &Bson) -> bool {
    match (numeric(left), numeric(right)) {
        (Some(l), Some(r)) => l == r,
        _ => left == right,
    }
}

fn document_matches(document: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, condition)| match key.as_str() {
        "$or" => match condition {
            Bson::Array(items) => items.iter().any(|item| match item {
                Bson::Document(sub) => document_matches(document, sub),
                _ => false,
            }),
            _ => false,
        },
        _ => {
            let value = document.get(key).cloned().unwrap_or(Bson::Null);
            match condition {
                Bson::Document(operators) if operators.keys().all(|k| k.starts_with('$')) => {
                    operators.iter().all(|(operator, operand)| match operator.as_str() {
                        "$eq" => same(&value, operand),
                        "$ne" => !same(&value, operand),
                        "$in" => match operand {
                            Bson::Array(items) => items.iter().any(|item| same(&value, item)),
                            _ => false,
                        },
                        "$gt" => numeric(&value) > numeric(operand),
                        "$lt" => numeric(&value) < numeric(operand),
                        other => panic!("unsupported operator {}", other),
                    })
                }
                expected => same(&value, expected),
            }
        }
    })
}

#[async_trait]
impl DocumentConnector for MemoryMongo {
    async fn connect(&self) -> DualDbResult<Box<dyn DocumentSession>> {
        self.state.lock().unwrap().opened += 1;
        Ok(Box::new(MemoryMongoSession {
            state: self.state.clone(),
        }))
    }
}

struct MemoryMongoSession {
    state: Arc<Mutex<MongoState>>,
}

#[async_trait]
impl DocumentSession for MemoryMongoSession {
    async fn find(
        &mut self,
        collection: &str,
        filter: Document,
        _sort: Option<Document>,
    ) -> DualDbResult<Vec<Document>> {
        let mut state = self.state.lock().unwrap();
        state.filters.push(filter.clone());
        Ok(state
            .collections
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|document| document_matches(document, &filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert_many(&mut self, collection: &str, documents: Vec<Document>) -> DualDbResult<Vec<Bson>> {
        let mut state = self.state.lock().unwrap();
        let target = state.collections.entry(collection.to_string()).or_default();
        let mut ids = Vec::new();
        for mut document in documents {
            if !document.contains_key("_id") {
                document.insert("_id", ObjectId::new());
            }
            ids.push(document.get("_id").cloned().unwrap());
            target.push(document);
        }
        Ok(ids)
    }

    async fn update_many(&mut self, collection: &str, filter: Document, update: Document) -> DualDbResult<u64> {
        let mut state = self.state.lock().unwrap();
        state.filters.push(filter.clone());
        let set = update.get_document("$set").cloned().unwrap_or_default();
        let mut matched = 0;
        if let Some(documents) = state.collections.get_mut(collection) {
            for document in documents.iter_mut().filter(|d| document_matches(d, &filter)) {
                for (key, value) in &set {
                    document.insert(key.clone(), value.clone());
                }
                matched += 1;
            }
        }
        Ok(matched)
    }

    async fn delete_many(&mut self, collection: &str, filter: Document) -> DualDbResult<u64> {
        let mut state = self.state.lock().unwrap();
        state.filters.push(filter.clone());
        let Some(documents) = state.collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = documents.len();
        documents.retain(|document| !document_matches(document, &filter));
        Ok((before - documents.len()) as u64)
    }

    async fn ping(&mut self) -> DualDbResult<()> {
        Ok(())
    }

    async fn close(self: Box<Self>) -> DualDbResult<()> {
        self.state.lock().unwrap().closed += 1;
        Ok(())
    }
}
