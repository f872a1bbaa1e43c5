//! # 配置管理模块
//!
//! 提供统一的配置管理系统，支持构建器模式和链式配置
//! 必需的配置项必须显式设置，缺失时返回配置错误

pub mod builders;
pub mod core;

pub use builders::{LoggingConfigBuilder, MongoConfigBuilder, PostgresConfigBuilder};
pub use core::{init_logging, DualDbConfig, LogLevel, LoggingConfig};
