//! PostgreSQL连接抽象
//!
//! 处理器只通过 [`SqlConnector`] / [`SqlSession`] 访问数据库，每次调用都新建连接，
//! 用完即关闭。默认实现基于 `sqlx::PgConnection`

use crate::adapter::postgres::query_builder::inline_nulls;
use crate::adapter::postgres::utils::{bind_value, map_sqlx_error, row_to_values};
use crate::error::DualDbResult;
use crate::types::{DataValue, PostgresConfig};
use async_trait::async_trait;
use rat_logger::debug;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{Column, Connection, Executor, Statement as _};
use std::time::Duration;

/// 查询结果：列名和按列顺序排列的行
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutput {
    /// 列名
    pub header: Vec<String>,
    /// 结果行
    pub rows: Vec<Vec<DataValue>>,
}

/// 单个数据库会话
#[async_trait]
pub trait SqlSession: Send {
    /// 执行查询并返回结果行
    async fn query(&mut self, sql: &str, args: &[DataValue]) -> DualDbResult<QueryOutput>;

    /// 执行带参数的语句，返回影响行数
    async fn execute(&mut self, sql: &str, args: &[DataValue]) -> DualDbResult<u64>;

    /// 执行不带参数的脚本，允许包含多条语句
    async fn execute_script(&mut self, sql: &str) -> DualDbResult<u64>;

    /// 开启事务
    async fn begin(&mut self) -> DualDbResult<()>;

    /// 提交事务
    async fn commit(&mut self) -> DualDbResult<()>;

    /// 回滚事务
    async fn rollback(&mut self) -> DualDbResult<()>;

    /// 关闭会话
    async fn close(self: Box<Self>) -> DualDbResult<()>;
}

/// 会话工厂
#[async_trait]
pub trait SqlConnector: Send + Sync {
    /// 建立新会话，`statement_timeout_ms` 为 None 表示不限制语句执行时间
    async fn connect(&self, statement_timeout_ms: Option<u64>) -> DualDbResult<Box<dyn SqlSession>>;
}

/// 基于sqlx的连接器
pub struct PgSqlConnector {
    config: PostgresConfig,
}

impl PgSqlConnector {
    /// 创建连接器
    pub fn new(config: PostgresConfig) -> Self {
        Self { config }
    }

    fn connect_options(&self, statement_timeout_ms: Option<u64>) -> PgConnectOptions {
        let options = PgConnectOptions::new()
            .host(&self.config.host)
            .port(self.config.port)
            .database(&self.config.database)
            .username(&self.config.username)
            .password(&self.config.password);
        match statement_timeout_ms {
            Some(ms) => options.options([("statement_timeout", ms.to_string())]),
            None => options,
        }
    }
}

#[async_trait]
impl SqlConnector for PgSqlConnector {
    async fn connect(&self, statement_timeout_ms: Option<u64>) -> DualDbResult<Box<dyn SqlSession>> {
        let options = self.connect_options(statement_timeout_ms);
        let timeout = Duration::from_secs(self.config.connect_timeout_secs);

        let conn = tokio::time::timeout(timeout, PgConnection::connect_with(&options))
            .await
            .map_err(|_| {
                crate::dual_error!(
                    connection,
                    format!(
                        "connecting to {}:{} timed out after {}s",
                        self.config.host, self.config.port, self.config.connect_timeout_secs
                    )
                )
            })?
            .map_err(map_sqlx_error)?;

        debug!(
            "已连接PostgreSQL: {}:{}/{}",
            self.config.host, self.config.port, self.config.database
        );
        Ok(Box::new(PgSqlSession { conn }))
    }
}

/// 基于sqlx的会话
pub struct PgSqlSession {
    conn: PgConnection,
}

#[async_trait]
impl SqlSession for PgSqlSession {
    async fn query(&mut self, sql: &str, args: &[DataValue]) -> DualDbResult<QueryOutput> {
        let (sql, args) = inline_nulls(sql, args);
        let mut query = sqlx::query(&sql);
        for arg in &args {
            query = bind_value(query, arg);
        }
        let rows = query.fetch_all(&mut self.conn).await.map_err(map_sqlx_error)?;

        let header = match rows.first() {
            Some(row) => sqlx::Row::columns(row)
                .iter()
                .map(|column| column.name().to_string())
                .collect(),
            None => {
                // 没有结果行时从预备语句中取列名
                let statement = (&mut self.conn).prepare(&sql).await.map_err(map_sqlx_error)?;
                statement
                    .columns()
                    .iter()
                    .map(|column| column.name().to_string())
                    .collect()
            }
        };

        Ok(QueryOutput {
            header,
            rows: rows.iter().map(row_to_values).collect(),
        })
    }

    async fn execute(&mut self, sql: &str, args: &[DataValue]) -> DualDbResult<u64> {
        let (sql, args) = inline_nulls(sql, args);
        let mut query = sqlx::query(&sql);
        for arg in &args {
            query = bind_value(query, arg);
        }
        let result = query.execute(&mut self.conn).await.map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn execute_script(&mut self, sql: &str) -> DualDbResult<u64> {
        let conn: &mut PgConnection = &mut self.conn;
        let result = conn
            .execute(sqlx::raw_sql(sql))
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn begin(&mut self) -> DualDbResult<()> {
        self.execute_script("BEGIN").await.map(|_| ())
    }

    async fn commit(&mut self) -> DualDbResult<()> {
        self.execute_script("COMMIT").await.map(|_| ())
    }

    async fn rollback(&mut self) -> DualDbResult<()> {
        self.execute_script("ROLLBACK").await.map(|_| ())
    }

    async fn close(self: Box<Self>) -> DualDbResult<()> {
        self.conn.close().await.map_err(map_sqlx_error)
    }
}
