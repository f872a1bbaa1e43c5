//! # 配置管理模块 - 核心配置类型
//!
//! 连接配置和日志配置，可从TOML文件整体加载

use crate::error::{DualDbError, DualDbResult};
use crate::types::*;
use rat_logger::handler::term::TermConfig;
use rat_logger::{info, LevelFilter, LoggerBuilder};
use serde::{Deserialize, Serialize};

/// 全局配置
///
/// 对应配置文件中的 `[postgres]`、`[mongodb]`、`[logging]` 三个段，均可省略
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DualDbConfig {
    /// PostgreSQL连接配置
    #[serde(default)]
    pub postgres: Option<PostgresConfig>,
    /// MongoDB连接配置
    #[serde(default)]
    pub mongodb: Option<MongoConfig>,
    /// 日志配置
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: LogLevel,
    /// 是否输出到控制台
    pub console: bool,
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// 错误级别
    Error,
    /// 警告级别
    Warn,
    /// 信息级别
    Info,
    /// 调试级别
    Debug,
    /// 跟踪级别
    Trace,
}

impl LogLevel {
    /// 转换为rat_logger的级别过滤器
    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

impl DualDbConfig {
    /// 从TOML文本加载配置
    pub fn from_toml_str(content: &str) -> DualDbResult<Self> {
        let config: DualDbConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// 从TOML文件加载配置
    pub fn from_file<P: AsRef<std::path::Path>>(config_path: P) -> DualDbResult<Self> {
        let content = std::fs::read_to_string(config_path.as_ref()).map_err(|e| {
            crate::dual_error!(
                config,
                format!("读取配置文件失败 {:?}: {}", config_path.as_ref(), e)
            )
        })?;
        let config = Self::from_toml_str(&content)?;
        info!("从文件加载配置: {:?}", config_path.as_ref());
        Ok(config)
    }

    /// 取出PostgreSQL配置，未配置时返回错误
    pub fn require_postgres(&self) -> DualDbResult<&PostgresConfig> {
        self.postgres
            .as_ref()
            .ok_or_else(|| crate::dual_error!(config, "缺少 [postgres] 配置段"))
    }

    /// 取出MongoDB配置，未配置时返回错误
    pub fn require_mongodb(&self) -> DualDbResult<&MongoConfig> {
        self.mongodb
            .as_ref()
            .ok_or_else(|| crate::dual_error!(config, "缺少 [mongodb] 配置段"))
    }
}

/// 按配置初始化日志系统
///
/// 库本身不会自动初始化日志，调用者可以自行初始化，也可以调用本函数
pub fn init_logging(config: &LoggingConfig) -> DualDbResult<()> {
    if !config.console {
        return Ok(());
    }
    LoggerBuilder::new()
        .with_level(config.level.to_level_filter())
        .add_terminal_with_config(TermConfig::default())
        .init()
        .map_err(|e| -> DualDbError {
            crate::dual_error!(config, format!("日志初始化失败: {:?}", e))
        })?;
    info!("日志系统已初始化: 级别={:?}", config.level);
    Ok(())
}
