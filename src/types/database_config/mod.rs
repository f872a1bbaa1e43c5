use serde::{Deserialize, Serialize};

/// 支持的数据库类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatabaseType {
    /// PostgreSQL 关系型数据库
    PostgreSQL,
    /// MongoDB 文档数据库
    MongoDB,
}

impl DatabaseType {
    /// 获取数据库类型的字符串表示
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseType::PostgreSQL => "postgres",
            DatabaseType::MongoDB => "mongo",
        }
    }

    /// 从字符串解析数据库类型
    pub fn parse(s: &str) -> Result<Self, crate::error::DualDbError> {
        match s.to_lowercase().as_str() {
            "postgresql" | "postgres" | "pg" => Ok(DatabaseType::PostgreSQL),
            "mongodb" | "mongo" => Ok(DatabaseType::MongoDB),
            _ => Err(crate::dual_error!(config, format!("unsupported database type: {}", s))),
        }
    }
}

/// 默认连接超时（秒）
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
/// 默认服务器选择超时（毫秒）
pub const DEFAULT_SERVER_SELECTION_TIMEOUT_MS: u64 = 5000;

fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_statement_timeout_secs() -> i64 {
    -1
}

fn default_server_selection_timeout_ms() -> u64 {
    DEFAULT_SERVER_SELECTION_TIMEOUT_MS
}

/// PostgreSQL 连接配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostgresConfig {
    /// 主机地址
    pub host: String,
    /// 端口号
    pub port: u16,
    /// 数据库名
    pub database: String,
    /// 用户名
    pub username: String,
    /// 密码
    pub password: String,
    /// 建立连接的超时（秒）
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// 默认语句超时（秒），非正数表示不限制；单次调用可覆盖
    #[serde(default = "default_statement_timeout_secs")]
    pub statement_timeout_secs: i64,
}

/// MongoDB 连接配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MongoConfig {
    /// 连接别名
    pub alias: String,
    /// 主机地址（支持IP或域名）
    pub host: String,
    /// 端口号
    pub port: u16,
    /// 数据库名
    pub database: String,
    /// 用户名（可选）
    #[serde(default)]
    pub username: Option<String>,
    /// 密码（可选）
    #[serde(default)]
    pub password: Option<String>,
    /// 认证源数据库（可选，提供凭据时默认为admin）
    #[serde(default)]
    pub auth_source: Option<String>,
    /// 服务器选择超时（毫秒）
    #[serde(default = "default_server_selection_timeout_ms")]
    pub timeout_ms: u64,
}

impl MongoConfig {
    /// 生成MongoDB连接URI
    #[doc(hidden)]
    pub fn build_uri(&self) -> String {
        let mut uri = String::from("mongodb://");

        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            uri.push_str(&urlencoding::encode(username));
            uri.push(':');
            uri.push_str(&urlencoding::encode(password));
            uri.push('@');
        }

        uri.push_str(&self.host);
        uri.push(':');
        uri.push_str(&self.port.to_string());
        uri.push('/');
        uri.push_str(&self.database);

        let mut params = Vec::new();
        if self.username.is_some() {
            let auth_source = self.auth_source.as_deref().unwrap_or("admin");
            params.push(format!("authSource={}", urlencoding::encode(auth_source)));
        }
        params.push(format!("serverSelectionTimeoutMS={}", self.timeout_ms));

        uri.push('?');
        uri.push_str(&params.join("&"));
        uri
    }
}
