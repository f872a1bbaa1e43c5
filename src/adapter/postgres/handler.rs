//! PostgreSQL处理器
//!
//! 对外的增删改查入口。每次调用新建连接、执行、关闭连接，
//! 所有结果（包括失败）都以 [`SqlEnvelope`] 返回

use crate::adapter::postgres::connection::{PgSqlConnector, SqlConnector, SqlSession};
use crate::adapter::postgres::query_builder::{
    ExecutionMode, HeaderFilter, Statement, StatementArgs, StatementBuilder,
};
use crate::error::DualDbResult;
use crate::model::ScriptExecutor;
use crate::types::*;
use async_trait::async_trait;
use dashmap::DashMap;
use rat_logger::{debug, info, warn};
use std::sync::Arc;

/// statement_timeout 的上限（毫秒），PostgreSQL 以 int4 保存该设置
const MAX_STATEMENT_TIMEOUT_MS: u64 = i32::MAX as u64;

/// PostgreSQL处理器
pub struct PostgresHandler {
    config: PostgresConfig,
    connector: Arc<dyn SqlConnector>,
    builder: StatementBuilder,
    /// 列名缓存，键为 (表名, 过滤选项)
    header_cache: DashMap<(String, HeaderFilter), Vec<String>>,
}

impl PostgresHandler {
    /// 使用sqlx连接器创建处理器
    pub fn new(config: PostgresConfig) -> Self {
        let connector = Arc::new(PgSqlConnector::new(config.clone()));
        Self::with_connector(config, connector)
    }

    /// 使用自定义连接器创建处理器
    pub fn with_connector(config: PostgresConfig, connector: Arc<dyn SqlConnector>) -> Self {
        Self {
            config,
            connector,
            builder: StatementBuilder::new(),
            header_cache: DashMap::new(),
        }
    }

    /// 连接配置
    pub fn config(&self) -> &PostgresConfig {
        &self.config
    }

    /// 检查数据库是否可连接
    pub async fn check_connection(&self) -> bool {
        match self.connector.connect(None).await {
            Ok(session) => {
                if let Err(e) = session.close().await {
                    warn!("[PostgresHandler] 关闭连接失败: {}", e);
                }
                info!(
                    "[PostgresHandler] 连接检查成功: {}:{}/{}",
                    self.config.host, self.config.port, self.config.database
                );
                true
            }
            Err(e) => {
                warn!(
                    "[PostgresHandler] 连接检查失败: {}:{}/{}: {}",
                    self.config.host, self.config.port, self.config.database, e
                );
                false
            }
        }
    }

    /// 执行任意语句
    ///
    /// `statement_timeout` 单位为秒，None 时使用配置值，不大于0表示不限制
    pub async fn execute_sql(
        &self,
        mode: ExecutionMode,
        sql: &str,
        args: StatementArgs,
        statement_timeout: Option<i64>,
    ) -> SqlEnvelope {
        self.respond(
            "execute_sql",
            self.try_execute(mode, sql, &args, statement_timeout).await,
        )
    }

    /// 列出所有用户表
    pub async fn get_table_list(&self) -> SqlEnvelope {
        let statement = self.builder.build_table_list_query();
        let result = self
            .try_execute(ExecutionMode::WithReturn, &statement.sql, &statement.args, None)
            .await;
        self.respond("get_table_list", result)
    }

    /// 查询表的列名，结果放在信封的 `header` 中
    ///
    /// 结果按 (表名, 过滤选项) 缓存，`force` 为真时跳过缓存重新查询
    pub async fn get_headers(&self, table: &str, force: bool, filter: HeaderFilter) -> SqlEnvelope {
        let result = self
            .fetch_headers(table, force, filter)
            .await
            .map(|header| SqlEnvelope::success(SUCCESS_MESSAGE).with_header(header));
        self.respond("get_headers", result)
    }

    async fn fetch_headers(
        &self,
        table: &str,
        force: bool,
        filter: HeaderFilter,
    ) -> DualDbResult<Vec<String>> {
        let key = (table.to_string(), filter);
        if !force {
            if let Some(cached) = self.header_cache.get(&key) {
                debug!("[PostgresHandler] 列名缓存命中: {}", table);
                return Ok(cached.clone());
            }
        }

        let statement = self.builder.build_headers_query(table, filter)?;
        let envelope = self
            .try_execute(
                ExecutionMode::WithReturnAndArgs,
                &statement.sql,
                &statement.args,
                None,
            )
            .await?;
        let header = envelope
            .data
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .filter_map(|value| value.as_str().map(str::to_string))
            .collect::<Vec<_>>();

        // 表不存在时不缓存，避免建表后仍拿到空结果
        if !header.is_empty() {
            self.header_cache.insert(key, header.clone());
        }
        Ok(header)
    }

    /// 清空列名缓存
    pub fn clear_header_cache(&self) {
        self.header_cache.clear();
    }

    /// 查询数据
    ///
    /// `columns` 为空时查询全部列，`limit` 小于0时不限制行数
    pub async fn get_data(
        &self,
        table: &str,
        columns: &[&str],
        conditions: &[ConditionRule],
        order_by: &[&str],
        limit: i64,
        statement_timeout: Option<i64>,
    ) -> SqlEnvelope {
        let result: DualDbResult<SqlEnvelope> = async {
            let statement = self
                .builder
                .build_select(table, columns, conditions, order_by, limit)?;
            let mode = if statement.args.is_none() {
                ExecutionMode::WithReturn
            } else {
                ExecutionMode::WithReturnAndArgs
            };
            self.run_statement(mode, &statement, statement_timeout).await
        }
        .await;
        self.respond("get_data", result)
    }

    /// 批量写入记录
    ///
    /// `header` 为空时查询表的列名作为写入列（排除生成列，`no_ser_pk` 为真时再排除自增列）。
    /// 记录缺少某列时，`to_null` 为真则写入 NULL，否则整批失败且不执行任何写入
    pub async fn add_data(
        &self,
        table: &str,
        records: &[Record],
        header: &[String],
        to_null: bool,
        no_ser_pk: bool,
        statement_timeout: Option<i64>,
    ) -> SqlEnvelope {
        if records.is_empty() {
            return SqlEnvelope::success("Nothing to add.");
        }
        let result: DualDbResult<SqlEnvelope> = async {
            let header = if header.is_empty() {
                let filter = HeaderFilter {
                    no_ser_pk,
                    no_generated: true,
                };
                let fetched = self.fetch_headers(table, false, filter).await?;
                if fetched.is_empty() {
                    return Err(crate::dual_error!(
                        validation,
                        "header",
                        format!("no column found for table {}", table)
                    ));
                }
                fetched
            } else {
                header.to_vec()
            };
            let statement = self.builder.build_insert(table, &header, records, to_null)?;
            self.run_statement(ExecutionMode::WithArgs, &statement, statement_timeout)
                .await
        }
        .await;
        self.respond("add_data", result)
    }

    /// 批量更新记录，`reference_columns` 中的列作为 WHERE 条件
    pub async fn update_data(
        &self,
        table: &str,
        records: &[Record],
        reference_columns: &[String],
        statement_timeout: Option<i64>,
    ) -> SqlEnvelope {
        if records.is_empty() {
            return SqlEnvelope::success("Nothing to update.");
        }
        let result: DualDbResult<SqlEnvelope> = async {
            let statement = self.builder.build_update(table, records, reference_columns)?;
            self.run_statement(ExecutionMode::WithArgs, &statement, statement_timeout)
                .await
        }
        .await;
        self.respond("update_data", result)
    }

    /// 批量删除记录，每条过滤记录按 `reference_columns` 匹配
    pub async fn delete_data(
        &self,
        table: &str,
        filters: &[Record],
        reference_columns: &[String],
        statement_timeout: Option<i64>,
    ) -> SqlEnvelope {
        if filters.is_empty() {
            return SqlEnvelope::success("Nothing to delete.");
        }
        let result: DualDbResult<SqlEnvelope> = async {
            let statement = self.builder.build_delete(table, filters, reference_columns)?;
            self.run_statement(ExecutionMode::WithArgs, &statement, statement_timeout)
                .await
        }
        .await;
        self.respond("delete_data", result)
    }

    async fn run_statement(
        &self,
        mode: ExecutionMode,
        statement: &Statement,
        statement_timeout: Option<i64>,
    ) -> DualDbResult<SqlEnvelope> {
        self.try_execute(mode, &statement.sql, &statement.args, statement_timeout)
            .await
    }

    fn timeout_ms(&self, statement_timeout: Option<i64>) -> Option<u64> {
        let secs = statement_timeout.unwrap_or(self.config.statement_timeout_secs);
        u64::try_from(secs)
            .ok()
            .filter(|secs| *secs > 0)
            .map(|secs| secs.saturating_mul(1000).min(MAX_STATEMENT_TIMEOUT_MS))
    }

    async fn try_execute(
        &self,
        mode: ExecutionMode,
        sql: &str,
        args: &StatementArgs,
        statement_timeout: Option<i64>,
    ) -> DualDbResult<SqlEnvelope> {
        mode.check_args(args)?;
        debug!("[PostgresHandler] {:?}: {} args: {:?}", mode, sql, args);

        let mut session = self.connector.connect(self.timeout_ms(statement_timeout)).await?;
        let result = run_on_session(session.as_mut(), mode, sql, args).await;
        if let Err(e) = session.close().await {
            warn!("[PostgresHandler] 关闭连接失败: {}", e);
        }
        result
    }

    fn respond(&self, operation: &str, result: DualDbResult<SqlEnvelope>) -> SqlEnvelope {
        match result {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("[PostgresHandler] {} 失败: {}", operation, e);
                SqlEnvelope::from_error(&e)
            }
        }
    }
}

async fn run_on_session(
    session: &mut dyn SqlSession,
    mode: ExecutionMode,
    sql: &str,
    args: &StatementArgs,
) -> DualDbResult<SqlEnvelope> {
    match (mode, args) {
        (ExecutionMode::Normal, StatementArgs::None) => {
            let affected = session.execute_script(sql).await?;
            Ok(SqlEnvelope::success(SUCCESS_MESSAGE).with_affected_rows(affected))
        }
        (ExecutionMode::WithReturn, StatementArgs::None) => {
            let output = session.query(sql, &[]).await?;
            Ok(SqlEnvelope::with_rows(output.header, output.rows))
        }
        (ExecutionMode::WithArgs, StatementArgs::Single(row)) => {
            let affected = session.execute(sql, row).await?;
            Ok(SqlEnvelope::success(SUCCESS_MESSAGE).with_affected_rows(affected))
        }
        (ExecutionMode::WithReturnAndArgs, StatementArgs::Single(row)) => {
            let output = session.query(sql, row).await?;
            Ok(SqlEnvelope::with_rows(output.header, output.rows))
        }
        (ExecutionMode::WithArgs, StatementArgs::Many(rows)) => {
            session.begin().await?;
            let outcome = execute_batch(session, sql, rows).await;
            let affected = finish_transaction(session, outcome).await?;
            Ok(SqlEnvelope::success(SUCCESS_MESSAGE).with_affected_rows(affected))
        }
        (ExecutionMode::WithReturnAndArgs, StatementArgs::Many(rows)) => {
            session.begin().await?;
            let outcome = query_batch(session, sql, rows).await;
            let (header, data) = finish_transaction(session, outcome).await?;
            Ok(SqlEnvelope::with_rows(header, data))
        }
        (mode, args) => Err(crate::dual_error!(
            validation,
            "args",
            format!("execution mode {:?} cannot run with {} argument rows", mode, args.row_count())
        )),
    }
}

async fn execute_batch(
    session: &mut dyn SqlSession,
    sql: &str,
    rows: &[Vec<DataValue>],
) -> DualDbResult<u64> {
    let mut affected = 0;
    for row in rows {
        affected += session.execute(sql, row).await?;
    }
    Ok(affected)
}

async fn query_batch(
    session: &mut dyn SqlSession,
    sql: &str,
    rows: &[Vec<DataValue>],
) -> DualDbResult<(Vec<String>, Vec<Vec<DataValue>>)> {
    let mut header = Vec::new();
    let mut data = Vec::new();
    for row in rows {
        let output = session.query(sql, row).await?;
        if header.is_empty() {
            header = output.header;
        }
        data.extend(output.rows);
    }
    Ok((header, data))
}

/// 成功则提交，失败则回滚并返回原错误
async fn finish_transaction<T>(
    session: &mut dyn SqlSession,
    outcome: DualDbResult<T>,
) -> DualDbResult<T> {
    match outcome {
        Ok(value) => {
            session.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = session.rollback().await {
                warn!("[PostgresHandler] 回滚失败: {}", rollback_err);
            }
            Err(e)
        }
    }
}

#[async_trait]
impl ScriptExecutor for PostgresHandler {
    async fn execute_script(&self, sql: &str) -> SqlEnvelope {
        self.execute_sql(ExecutionMode::Normal, sql, StatementArgs::None, None)
            .await
    }
}

impl std::fmt::Debug for PostgresHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresHandler")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("database", &self.config.database)
            .finish()
    }
}
