//! # 数据库配置构建器模块
//!
//! 提供连接配置的构建器实现，支持链式调用和严格验证

use crate::error::DualDbResult;
use crate::types::*;
use rat_logger::info;

/// PostgreSQL配置构建器
///
/// 主机、端口、数据库名、用户名和密码必须显式设置；超时项可省略
#[derive(Debug, Default)]
pub struct PostgresConfigBuilder {
    host: Option<String>,
    port: Option<u16>,
    database: Option<String>,
    username: Option<String>,
    password: Option<String>,
    connect_timeout_secs: Option<u64>,
    statement_timeout_secs: Option<i64>,
}

impl PostgresConfig {
    /// 创建PostgreSQL配置构建器
    pub fn builder() -> PostgresConfigBuilder {
        PostgresConfigBuilder::new()
    }
}

impl PostgresConfigBuilder {
    /// 创建新的构建器
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置主机地址
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = Some(host.into());
        self
    }

    /// 设置端口号
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// 设置数据库名
    pub fn database<S: Into<String>>(mut self, database: S) -> Self {
        self.database = Some(database.into());
        self
    }

    /// 设置用户名
    pub fn username<S: Into<String>>(mut self, username: S) -> Self {
        self.username = Some(username.into());
        self
    }

    /// 设置密码
    pub fn password<S: Into<String>>(mut self, password: S) -> Self {
        self.password = Some(password.into());
        self
    }

    /// 设置建立连接的超时（秒）
    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = Some(secs);
        self
    }

    /// 设置默认语句超时（秒），非正数表示不限制
    pub fn statement_timeout_secs(mut self, secs: i64) -> Self {
        self.statement_timeout_secs = Some(secs);
        self
    }

    /// 构建PostgreSQL配置
    ///
    /// # 错误
    ///
    /// 任何必需的配置项未设置时返回配置错误
    pub fn build(self) -> DualDbResult<PostgresConfig> {
        let host = self
            .host
            .ok_or_else(|| crate::dual_error!(config, "PostgreSQL主机地址必须设置"))?;
        let port = self
            .port
            .ok_or_else(|| crate::dual_error!(config, "PostgreSQL端口必须设置"))?;
        let database = self
            .database
            .ok_or_else(|| crate::dual_error!(config, "PostgreSQL数据库名必须设置"))?;
        let username = self
            .username
            .ok_or_else(|| crate::dual_error!(config, "PostgreSQL用户名必须设置"))?;
        let password = self
            .password
            .ok_or_else(|| crate::dual_error!(config, "PostgreSQL密码必须设置"))?;

        if host.is_empty() {
            return Err(crate::dual_error!(config, "PostgreSQL主机地址不能为空"));
        }
        let connect_timeout_secs = self.connect_timeout_secs.unwrap_or(5);
        if connect_timeout_secs == 0 {
            return Err(crate::dual_error!(config, "连接超时不能为零"));
        }

        info!("创建PostgreSQL配置: {}:{}/{}", host, port, database);
        Ok(PostgresConfig {
            host,
            port,
            database,
            username,
            password,
            connect_timeout_secs,
            statement_timeout_secs: self.statement_timeout_secs.unwrap_or(-1),
        })
    }
}

/// MongoDB配置构建器
///
/// 别名、主机、端口和数据库名必须显式设置；用户名和密码必须同时设置或同时省略
#[derive(Debug, Default)]
pub struct MongoConfigBuilder {
    alias: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    database: Option<String>,
    username: Option<String>,
    password: Option<String>,
    auth_source: Option<String>,
    timeout_ms: Option<u64>,
}

impl MongoConfig {
    /// 创建MongoDB配置构建器
    pub fn builder() -> MongoConfigBuilder {
        MongoConfigBuilder::new()
    }
}

impl MongoConfigBuilder {
    /// 创建新的构建器
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置连接别名
    pub fn alias<S: Into<String>>(mut self, alias: S) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// 设置主机地址
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = Some(host.into());
        self
    }

    /// 设置端口号
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// 设置数据库名
    pub fn database<S: Into<String>>(mut self, database: S) -> Self {
        self.database = Some(database.into());
        self
    }

    /// 设置用户名和密码
    pub fn credentials<U: Into<String>, P: Into<String>>(mut self, username: U, password: P) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// 设置认证源数据库
    pub fn auth_source<S: Into<String>>(mut self, auth_source: S) -> Self {
        self.auth_source = Some(auth_source.into());
        self
    }

    /// 设置服务器选择超时（毫秒）
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// 构建MongoDB配置
    pub fn build(self) -> DualDbResult<MongoConfig> {
        let alias = self
            .alias
            .ok_or_else(|| crate::dual_error!(config, "MongoDB连接别名必须设置"))?;
        let host = self
            .host
            .ok_or_else(|| crate::dual_error!(config, "MongoDB主机地址必须设置"))?;
        let port = self
            .port
            .ok_or_else(|| crate::dual_error!(config, "MongoDB端口必须设置"))?;
        let database = self
            .database
            .ok_or_else(|| crate::dual_error!(config, "MongoDB数据库名必须设置"))?;

        let timeout_ms = self.timeout_ms.unwrap_or(5000);
        if timeout_ms == 0 {
            return Err(crate::dual_error!(config, "服务器选择超时不能为零"));
        }

        info!("创建MongoDB配置: {} -> {}:{}/{}", alias, host, port, database);
        Ok(MongoConfig {
            alias,
            host,
            port,
            database,
            username: self.username,
            password: self.password,
            auth_source: self.auth_source,
            timeout_ms,
        })
    }
}
