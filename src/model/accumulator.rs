//! 初始化SQL累加器
//!
//! 由调用者持有，按模型名收集枚举、模式、数据表和索引的初始化语句，
//! 最后拼接成一个脚本交给处理器执行

use crate::error::{DualDbError, DualDbResult};
use crate::model::definition::ModelDefinition;
use crate::model::meta::InitType;
use crate::types::SqlEnvelope;
use async_trait::async_trait;
use rat_logger::{debug, info};

/// 能够执行一段SQL脚本的对象
#[async_trait]
pub trait ScriptExecutor: Send + Sync {
    /// 以普通模式执行脚本，结果以信封返回
    async fn execute_script(&self, sql: &str) -> SqlEnvelope;
}

/// 按注册顺序保存、同名覆盖的语句表
#[derive(Debug, Clone, Default)]
struct EntryMap {
    entries: Vec<(String, String)>,
}

impl EntryMap {
    fn insert(&mut self, model: &str, sql: String) {
        match self.entries.iter_mut().find(|(name, _)| name == model) {
            Some(entry) => entry.1 = sql,
            None => self.entries.push((model.to_string(), sql)),
        }
    }

    fn render(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .map(|(_, sql)| sql.as_str())
            .filter(|sql| !sql.is_empty())
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn is_empty(&self) -> bool {
        self.entries.iter().all(|(_, sql)| sql.is_empty())
    }
}

/// 初始化SQL累加器
#[derive(Debug, Clone, Default)]
pub struct SqlAccumulator {
    enums: EntryMap,
    schemas: EntryMap,
    tables: EntryMap,
    indexes: EntryMap,
}

impl SqlAccumulator {
    /// 创建空的累加器
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记模型的初始化语句
    ///
    /// 同名模型再次登记时覆盖之前的语句
    pub fn register_for_creation(&mut self, model: &ModelDefinition) -> DualDbResult<()> {
        match model.init_type() {
            InitType::Enum => {
                self.enums.insert(model.name(), model.form_enum_sql()?);
            }
            InitType::Schema => {
                self.schemas.insert(model.name(), model.form_schema_sql(None)?);
            }
            InitType::Table => {
                let table_sql = if model.meta().conditional_init {
                    model.form_table_conditional_sql()?
                } else {
                    model.form_table_sql()?
                };
                self.tables.insert(model.name(), table_sql);
                if model.meta().init_index {
                    self.indexes.insert(model.name(), model.form_index_sql()?);
                }
            }
        }
        debug!("登记初始化语句: {} ({})", model.name(), model.init_type().as_str());
        Ok(())
    }

    /// 按 枚举、模式、数据表、索引 的顺序拼接全部语句
    pub fn render(&self) -> String {
        self.enums
            .render()
            .chain(self.schemas.render())
            .chain(self.tables.render())
            .chain(self.indexes.render())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// 执行累加的全部语句
    pub async fn apply_all<E>(&self, executor: &E) -> SqlEnvelope
    where
        E: ScriptExecutor + ?Sized,
    {
        if self.is_empty() {
            return SqlEnvelope::success("Nothing to apply.");
        }
        let sql = self.render();
        info!("执行初始化脚本，共 {} 字节", sql.len());
        crate::debug_log!("初始化脚本:\n{}", sql);
        executor.execute_script(&sql).await
    }

    /// 执行回调生成的语句，代替累加的内容
    ///
    /// 回调失败属于定义期错误，直接返回给调用者
    pub async fn apply_with<E, F>(&self, executor: &E, callback: F) -> DualDbResult<SqlEnvelope>
    where
        E: ScriptExecutor + ?Sized,
        F: FnOnce() -> DualDbResult<String>,
    {
        let sql = callback()?;
        if sql.trim().is_empty() {
            return Err(DualDbError::ValidationError {
                field: "sql".to_string(),
                message: "callback produced no statement".to_string(),
            });
        }
        Ok(executor.execute_script(&sql).await)
    }

    /// 清空累加的语句
    pub fn reset(&mut self) {
        self.enums.clear();
        self.schemas.clear();
        self.tables.clear();
        self.indexes.clear();
    }

    /// 是否没有任何语句
    pub fn is_empty(&self) -> bool {
        self.enums.is_empty()
            && self.schemas.is_empty()
            && self.tables.is_empty()
            && self.indexes.is_empty()
    }
}
