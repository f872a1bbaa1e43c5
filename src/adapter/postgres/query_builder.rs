//! SQL语句构建器模块
//!
//! 把表名、列、条件、排序和记录列表转换为带 `$n` 占位符的语句文本和参数批次

use crate::error::{DualDbError, DualDbResult};
use crate::security::DatabaseSecurityValidator;
use crate::types::*;
use serde::{Deserialize, Serialize};

/// 默认模式名
pub const DEFAULT_SCHEMA: &str = "public";

/// 语句参数
#[derive(Debug, Clone, PartialEq)]
pub enum StatementArgs {
    /// 无参数
    None,
    /// 单行参数
    Single(Vec<DataValue>),
    /// 多行参数，同一语句按行重复执行
    Many(Vec<Vec<DataValue>>),
}

impl StatementArgs {
    /// 是否没有参数
    pub fn is_none(&self) -> bool {
        matches!(self, StatementArgs::None)
    }

    /// 参数行数
    pub fn row_count(&self) -> usize {
        match self {
            StatementArgs::None => 0,
            StatementArgs::Single(_) => 1,
            StatementArgs::Many(rows) => rows.len(),
        }
    }
}

/// 构建完成的语句
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// 语句文本
    pub sql: String,
    /// 参数
    pub args: StatementArgs,
}

impl Statement {
    fn plain(sql: String) -> Self {
        Self {
            sql,
            args: StatementArgs::None,
        }
    }
}

/// 执行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionMode {
    /// 普通语句，无参数无返回
    Normal,
    /// 带参数，无返回
    WithArgs,
    /// 无参数，返回结果行
    WithReturn,
    /// 带参数，返回结果行
    WithReturnAndArgs,
}

impl ExecutionMode {
    /// 是否返回结果行
    pub fn returns_rows(&self) -> bool {
        matches!(self, ExecutionMode::WithReturn | ExecutionMode::WithReturnAndArgs)
    }

    /// 是否需要参数
    pub fn takes_args(&self) -> bool {
        matches!(self, ExecutionMode::WithArgs | ExecutionMode::WithReturnAndArgs)
    }

    /// 检查参数与模式是否匹配
    pub fn check_args(&self, args: &StatementArgs) -> DualDbResult<()> {
        match (self.takes_args(), args.is_none()) {
            (true, true) => Err(crate::dual_error!(
                validation,
                "args",
                format!("execution mode {:?} requires arguments", self)
            )),
            (false, false) => Err(crate::dual_error!(
                validation,
                "args",
                format!("execution mode {:?} does not accept arguments", self)
            )),
            _ => Ok(()),
        }
    }
}

/// 列信息查询的过滤选项
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HeaderFilter {
    /// 排除自增列（默认值为 nextval 或标识列）
    pub no_ser_pk: bool,
    /// 排除生成列
    pub no_generated: bool,
}

/// 拆分 `schema.table`，未指定模式时使用 public
pub fn split_table_name(table: &str) -> (&str, &str) {
    match table.split_once('.') {
        Some((schema, table)) => (schema, table),
        None => (DEFAULT_SCHEMA, table),
    }
}

/// 参数占位符，枚举成员附带类型转换
fn placeholder(index: usize, cast: Option<&str>) -> String {
    match cast {
        Some(type_name) => format!("${}::{}", index, type_name),
        None => format!("${}", index),
    }
}

fn enum_cast(value: &DataValue) -> Option<&str> {
    match value {
        DataValue::Enum(member) => Some(member.type_name.as_str()),
        _ => None,
    }
}

/// 在所有行中查找某列的枚举类型
fn column_cast<'a>(rows: &'a [Vec<DataValue>], position: usize) -> Option<&'a str> {
    rows.iter()
        .filter_map(|row| row.get(position))
        .find_map(enum_cast)
}

/// 把取值为 NULL 的参数内联为字面量 `NULL`，其余占位符按原顺序重新编号
///
/// 空参数只能以某个具体类型绑定，写入其他类型的列会被服务器拒绝；
/// 内联后的 `NULL` 由服务器按列类型推断。单引号字面量内的 `$` 不做处理
pub fn inline_nulls(sql: &str, args: &[DataValue]) -> (String, Vec<DataValue>) {
    if !args.iter().any(DataValue::is_null) {
        return (sql.to_string(), args.to_vec());
    }

    let mut kept = Vec::with_capacity(args.len());
    let renumbered: Vec<Option<usize>> = args
        .iter()
        .map(|arg| {
            if arg.is_null() {
                None
            } else {
                kept.push(arg.clone());
                Some(kept.len())
            }
        })
        .collect();

    let mut rendered = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut in_literal = false;
    while let Some(ch) = chars.next() {
        if ch == '\'' {
            in_literal = !in_literal;
        }
        if ch != '$' || in_literal {
            rendered.push(ch);
            continue;
        }
        let mut digits = String::new();
        while let Some(digit) = chars.peek().copied().filter(char::is_ascii_digit) {
            digits.push(digit);
            chars.next();
        }
        let target = digits
            .parse::<usize>()
            .ok()
            .and_then(|index| index.checked_sub(1))
            .and_then(|index| renumbered.get(index));
        match target {
            Some(Some(index)) => {
                rendered.push('$');
                rendered.push_str(&index.to_string());
            }
            Some(None) => rendered.push_str("NULL"),
            None => {
                rendered.push('$');
                rendered.push_str(&digits);
            }
        }
    }
    (rendered, kept)
}

fn mismatch(reference: &str) -> DualDbError {
    crate::dual_error!(
        validation,
        "reference_column_list",
        format!("Mismatch between reference_column_list and {}.", reference)
    )
}

/// SQL语句构建器
pub struct StatementBuilder {
    security_validator: DatabaseSecurityValidator,
}

impl Default for StatementBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementBuilder {
    /// 创建新的语句构建器
    pub fn new() -> Self {
        Self {
            security_validator: DatabaseSecurityValidator::new(DatabaseType::PostgreSQL),
        }
    }

    fn check_columns<S: AsRef<str>>(&self, columns: &[S]) -> DualDbResult<()> {
        for column in columns {
            self.security_validator.validate_field_name(column.as_ref())?;
        }
        Ok(())
    }

    /// 构建SELECT语句
    ///
    /// `limit` 小于0时不加 LIMIT
    pub fn build_select(
        &self,
        table: &str,
        columns: &[&str],
        conditions: &[ConditionRule],
        order_by: &[&str],
        limit: i64,
    ) -> DualDbResult<Statement> {
        self.security_validator.validate_table_name(table)?;
        self.check_columns(columns)?;

        let mut sql = format!(
            "SELECT {} FROM {}",
            if columns.is_empty() {
                "*".to_string()
            } else {
                columns.join(", ")
            },
            table
        );

        let mut args = Vec::with_capacity(conditions.len());
        if !conditions.is_empty() {
            let mut clauses = Vec::with_capacity(conditions.len());
            for (i, condition) in conditions.iter().enumerate() {
                let (column, operator) = condition.split()?;
                self.security_validator.validate_field_name(&column)?;
                clauses.push(format!(
                    "{} {} {}",
                    column,
                    operator.as_sql(),
                    placeholder(i + 1, enum_cast(&condition.value))
                ));
                args.push(condition.value.clone());
            }
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        if !order_by.is_empty() {
            let mut items = Vec::with_capacity(order_by.len());
            for item in order_by {
                let key = SortKey::parse_sql(item)?;
                self.security_validator.validate_field_name(&key.field)?;
                items.push(key.to_sql());
            }
            sql.push_str(" ORDER BY ");
            sql.push_str(&items.join(", "));
        }

        if limit >= 0 {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        sql.push(';');

        Ok(Statement {
            sql,
            args: if args.is_empty() {
                StatementArgs::None
            } else {
                StatementArgs::Single(args)
            },
        })
    }

    /// 构建批量INSERT语句
    ///
    /// 记录缺少某列时，`to_null` 为真则以 NULL 填充，否则失败
    pub fn build_insert(
        &self,
        table: &str,
        header: &[String],
        records: &[Record],
        to_null: bool,
    ) -> DualDbResult<Statement> {
        self.security_validator.validate_table_name(table)?;
        if header.is_empty() {
            return Err(crate::dual_error!(validation, "header", format!("no column to insert into {}", table)));
        }
        self.check_columns(header)?;

        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let mut row = Vec::with_capacity(header.len());
            for column in header {
                match record.get(column) {
                    Some(value) => row.push(value.clone()),
                    None if to_null => row.push(DataValue::Null),
                    None => return Err(crate::dual_error!(missing_data, table, column)),
                }
            }
            rows.push(row);
        }

        let placeholders = (0..header.len())
            .map(|i| placeholder(i + 1, column_cast(&rows, i)))
            .collect::<Vec<_>>();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({});",
            table,
            header.join(", "),
            placeholders.join(", ")
        );

        Ok(Statement {
            sql,
            args: StatementArgs::Many(rows),
        })
    }

    /// 构建批量UPDATE语句
    ///
    /// SET 列的顺序取自第一条记录，每行参数为 SET 值在前、参考列值在后
    pub fn build_update(
        &self,
        table: &str,
        records: &[Record],
        reference_columns: &[String],
    ) -> DualDbResult<Statement> {
        self.security_validator.validate_table_name(table)?;
        if reference_columns.is_empty() {
            return Err(crate::dual_error!(validation, "reference_column_list", "No reference."));
        }
        self.check_columns(reference_columns)?;
        let Some(first) = records.first() else {
            return Err(crate::dual_error!(validation, "editing_list", "Nothing to update."));
        };

        let set_columns: Vec<String> = first.keys().cloned().collect();
        self.check_columns(&set_columns)?;

        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            if record.len() != set_columns.len()
                || !set_columns.iter().all(|column| record.contains_key(column))
                || !reference_columns.iter().all(|column| record.contains_key(column))
            {
                return Err(mismatch("editing_list"));
            }
            let row = set_columns
                .iter()
                .chain(reference_columns.iter())
                .filter_map(|column| record.get(column).cloned())
                .collect::<Vec<_>>();
            rows.push(row);
        }

        let set_clause = set_columns
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{}={}", column, placeholder(i + 1, column_cast(&rows, i))))
            .collect::<Vec<_>>()
            .join(", ");
        let offset = set_columns.len();
        let where_clause = reference_columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                format!(
                    "{}={}",
                    column,
                    placeholder(offset + i + 1, column_cast(&rows, offset + i))
                )
            })
            .collect::<Vec<_>>()
            .join(" AND ");

        Ok(Statement {
            sql: format!("UPDATE {} SET {} WHERE {};", table, set_clause, where_clause),
            args: StatementArgs::Many(rows),
        })
    }

    /// 构建批量DELETE语句
    pub fn build_delete(
        &self,
        table: &str,
        filters: &[Record],
        reference_columns: &[String],
    ) -> DualDbResult<Statement> {
        self.security_validator.validate_table_name(table)?;
        if reference_columns.is_empty() {
            return Err(crate::dual_error!(validation, "reference_column_list", "No reference."));
        }
        self.check_columns(reference_columns)?;

        let mut rows = Vec::with_capacity(filters.len());
        for filter in filters {
            let row = reference_columns
                .iter()
                .map(|column| filter.get(column).cloned().ok_or_else(|| mismatch("filter_list")))
                .collect::<DualDbResult<Vec<_>>>()?;
            rows.push(row);
        }

        let where_clause = reference_columns
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{}={}", column, placeholder(i + 1, column_cast(&rows, i))))
            .collect::<Vec<_>>()
            .join(" AND ");

        Ok(Statement {
            sql: format!("DELETE FROM {} WHERE {};", table, where_clause),
            args: StatementArgs::Many(rows),
        })
    }

    /// 构建列名查询，按列序号排序
    pub fn build_headers_query(&self, table: &str, filter: HeaderFilter) -> DualDbResult<Statement> {
        self.security_validator.validate_table_name(table)?;
        let (schema, table) = split_table_name(table);

        let mut sql = String::from(
            "SELECT column_name::text FROM information_schema.columns WHERE table_schema = $1 AND table_name = $2",
        );
        if filter.no_ser_pk {
            sql.push_str(" AND (column_default IS NULL OR column_default NOT LIKE 'nextval%') AND is_identity = 'NO'");
        }
        if filter.no_generated {
            sql.push_str(" AND is_generated = 'NEVER'");
        }
        sql.push_str(" ORDER BY ordinal_position;");

        Ok(Statement {
            sql,
            args: StatementArgs::Single(vec![DataValue::from(schema), DataValue::from(table)]),
        })
    }

    /// 构建用户表列表查询
    pub fn build_table_list_query(&self) -> Statement {
        Statement::plain(
            "SELECT pg_tables.tablename::text FROM pg_catalog.pg_tables WHERE schemaname != 'pg_catalog' AND schemaname != 'information_schema';"
                .to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EnumValue;

    fn record(pairs: &[(&str, DataValue)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_select_full() {
        let builder = StatementBuilder::new();
        let statement = builder
            .build_select(
                "lot_table",
                &["camera_ip", "roi_id"],
                &[
                    ConditionRule::new("camera_ip LIKE", "192.168%"),
                    ConditionRule::new("number<", 100),
                ],
                &["roi_id DESC", "camera_ip"],
                10,
            )
            .unwrap();
        assert_eq!(
            statement.sql,
            "SELECT camera_ip, roi_id FROM lot_table WHERE camera_ip LIKE $1 AND number < $2 ORDER BY roi_id DESC, camera_ip LIMIT 10;"
        );
        assert_eq!(
            statement.args,
            StatementArgs::Single(vec![DataValue::from("192.168%"), DataValue::Int(100)])
        );
    }

    #[test]
    fn test_select_minimal() {
        let builder = StatementBuilder::new();
        let statement = builder.build_select("public.lot_table", &[], &[], &[], -1).unwrap();
        assert_eq!(statement.sql, "SELECT * FROM public.lot_table;");
        assert!(statement.args.is_none());

        assert!(builder
            .build_select("lot_table", &[], &[ConditionRule::new("roi_idLIKE", "x")], &[], -1)
            .is_err());
        assert!(builder
            .build_select("lot_table", &[], &[], &["roi_id; DROP TABLE x"], -1)
            .is_err());
    }

    #[test]
    fn test_select_enum_condition_is_cast() {
        let member = EnumValue::new("HAPPY", "happy", "Mood", "public.mood");
        let statement = StatementBuilder::new()
            .build_select("person", &[], &[ConditionRule::new("mood=", member)], &[], -1)
            .unwrap();
        assert_eq!(statement.sql, "SELECT * FROM person WHERE mood = $1::public.mood;");
    }

    #[test]
    fn test_insert_rows_and_missing_data() {
        let builder = StatementBuilder::new();
        let header = vec!["name".to_string()];
        let statement = builder
            .build_insert("person", &header, &[record(&[("name", DataValue::from("x"))])], false)
            .unwrap();
        assert_eq!(statement.sql, "INSERT INTO person (name) VALUES ($1);");
        assert_eq!(statement.args, StatementArgs::Many(vec![vec![DataValue::from("x")]]));

        let records = vec![record(&[("name", DataValue::from("x"))]), record(&[])];
        let err = builder.build_insert("person", &header, &records, false).unwrap_err();
        assert_eq!(err.to_string(), "missing data ( person ): name");

        let statement = builder.build_insert("person", &header, &records, true).unwrap();
        assert_eq!(
            statement.args,
            StatementArgs::Many(vec![vec![DataValue::from("x")], vec![DataValue::Null]])
        );
    }

    #[test]
    fn test_update_orders_set_then_reference() {
        let builder = StatementBuilder::new();
        let records = vec![
            record(&[("_id", DataValue::Int(1)), ("roi_id", DataValue::Int(2))]),
            record(&[("_id", DataValue::Int(2)), ("roi_id", DataValue::Int(3))]),
        ];
        let statement = builder
            .build_update("unique_test", &records, &["_id".to_string()])
            .unwrap();
        assert_eq!(
            statement.sql,
            "UPDATE unique_test SET _id=$1, roi_id=$2 WHERE _id=$3;"
        );
        assert_eq!(
            statement.args,
            StatementArgs::Many(vec![
                vec![DataValue::Int(1), DataValue::Int(2), DataValue::Int(1)],
                vec![DataValue::Int(2), DataValue::Int(3), DataValue::Int(2)],
            ])
        );
    }

    #[test]
    fn test_update_keeps_caller_column_order() {
        let records = vec![record(&[
            ("name", DataValue::from("x")),
            ("age", DataValue::Int(3)),
            ("id", DataValue::Int(1)),
        ])];
        let statement = StatementBuilder::new()
            .build_update("person", &records, &["id".to_string()])
            .unwrap();
        assert_eq!(statement.sql, "UPDATE person SET name=$1, age=$2, id=$3 WHERE id=$4;");
    }

    #[test]
    fn test_null_arguments_are_inlined() {
        let (sql, args) = inline_nulls(
            "INSERT INTO person (name, age, mood) VALUES ($1, $2, $3::public.mood);",
            &[DataValue::from("x"), DataValue::Null, DataValue::Null],
        );
        assert_eq!(sql, "INSERT INTO person (name, age, mood) VALUES ($1, NULL, NULL::public.mood);");
        assert_eq!(args, vec![DataValue::from("x")]);

        let (sql, args) = inline_nulls(
            "UPDATE person SET age=$1, name=$2 WHERE id=$3;",
            &[DataValue::Null, DataValue::from("y"), DataValue::Int(7)],
        );
        assert_eq!(sql, "UPDATE person SET age=NULL, name=$1 WHERE id=$2;");
        assert_eq!(args, vec![DataValue::from("y"), DataValue::Int(7)]);

        // 两位数序号和引号内的 `$` 不受影响
        let values: Vec<DataValue> = (1..=11)
            .map(|i| if i == 2 { DataValue::Null } else { DataValue::Int(i) })
            .collect();
        let placeholders: Vec<String> = (1..=11).map(|i| format!("${}", i)).collect();
        let (sql, args) = inline_nulls(
            &format!("SELECT '$2' AS tag, {};", placeholders.join(", ")),
            &values,
        );
        assert_eq!(
            sql,
            "SELECT '$2' AS tag, $1, NULL, $2, $3, $4, $5, $6, $7, $8, $9, $10;"
        );
        assert_eq!(args.len(), 10);
    }

    #[test]
    fn test_arguments_without_null_are_unchanged() {
        let sql = "DELETE FROM person WHERE id=$1;";
        let (rendered, args) = inline_nulls(sql, &[DataValue::Int(1)]);
        assert_eq!(rendered, sql);
        assert_eq!(args, vec![DataValue::Int(1)]);
    }

    #[test]
    fn test_update_rejects_mismatch() {
        let builder = StatementBuilder::new();
        let records = vec![record(&[("roi_id", DataValue::Int(2))])];
        assert!(builder.build_update("t", &records, &["_id".to_string()]).is_err());
        assert!(builder.build_update("t", &records, &[]).is_err());
    }

    #[test]
    fn test_delete() {
        let builder = StatementBuilder::new();
        let filters = vec![record(&[
            ("username", DataValue::from("linga")),
            ("lastupdatetime", DataValue::Int(456789)),
        ])];
        let statement = builder
            .build_delete(
                "login_table",
                &filters,
                &["username".to_string(), "lastupdatetime".to_string()],
            )
            .unwrap();
        assert_eq!(
            statement.sql,
            "DELETE FROM login_table WHERE username=$1 AND lastupdatetime=$2;"
        );
        assert_eq!(statement.args.row_count(), 1);
    }

    #[test]
    fn test_headers_query_filters() {
        let builder = StatementBuilder::new();
        let statement = builder
            .build_headers_query(
                "lot.lot_table",
                HeaderFilter {
                    no_ser_pk: true,
                    no_generated: true,
                },
            )
            .unwrap();
        assert!(statement.sql.contains("NOT LIKE 'nextval%'"));
        assert!(statement.sql.contains("is_generated = 'NEVER'"));
        assert!(statement.sql.ends_with("ORDER BY ordinal_position;"));
        assert_eq!(
            statement.args,
            StatementArgs::Single(vec![DataValue::from("lot"), DataValue::from("lot_table")])
        );
        assert_eq!(split_table_name("lot_table"), ("public", "lot_table"));
    }

    #[test]
    fn test_execution_mode_args() {
        assert!(ExecutionMode::Normal.check_args(&StatementArgs::None).is_ok());
        assert!(ExecutionMode::WithArgs.check_args(&StatementArgs::None).is_err());
        assert!(ExecutionMode::WithReturn
            .check_args(&StatementArgs::Single(vec![DataValue::Int(1)]))
            .is_err());
        assert!(ExecutionMode::WithReturnAndArgs.returns_rows());
    }
}
