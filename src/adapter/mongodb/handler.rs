//! MongoDB处理器
//!
//! 对外的增删改查入口。过滤条件先经过标识符规范化；
//! 注册过模型的集合在写入前应用默认值并检查必填字段和枚举值

use crate::adapter::mongodb::connection::{DocumentConnector, DocumentSession, MongoDocumentConnector};
use crate::adapter::mongodb::id_normalizer::{normalize_id_condition, object_id_encoder, DEFAULT_ID_FIELD};
use crate::adapter::mongodb::utils::{data_value_to_bson, to_portable};
use crate::error::DualDbResult;
use crate::model::{InitType, ModelDefinition};
use crate::security::DatabaseSecurityValidator;
use crate::types::*;
use dashmap::DashMap;
use mongodb::bson::{doc, Bson, Document};
use rat_logger::{debug, info, warn};
use std::sync::Arc;

/// 文档存储的结果信封
pub type DocumentEnvelope = ResultEnvelope<Document, Document>;

/// MongoDB处理器
pub struct MongoHandler {
    config: MongoConfig,
    connector: Arc<dyn DocumentConnector>,
    /// 集合名 -> 模型
    models: DashMap<String, Arc<ModelDefinition>>,
    security_validator: DatabaseSecurityValidator,
}

impl MongoHandler {
    /// 使用官方驱动创建处理器
    pub fn new(config: MongoConfig) -> Self {
        let connector = Arc::new(MongoDocumentConnector::new(config.clone()));
        Self::with_connector(config, connector)
    }

    /// 使用自定义连接器创建处理器
    pub fn with_connector(config: MongoConfig, connector: Arc<dyn DocumentConnector>) -> Self {
        Self {
            config,
            connector,
            models: DashMap::new(),
            security_validator: DatabaseSecurityValidator::new(DatabaseType::MongoDB),
        }
    }

    /// 连接配置
    pub fn config(&self) -> &MongoConfig {
        &self.config
    }

    /// 为集合注册模型，只接受数据表类型的模型
    pub fn register_model(&self, collection: &str, model: &Arc<ModelDefinition>) -> DualDbResult<()> {
        self.security_validator.validate_table_name(collection)?;
        if model.init_type() != InitType::Table {
            return Err(crate::dual_error!(
                definition,
                model.name(),
                format!("only table models can back a collection, got {}", model.init_type().as_str())
            ));
        }
        debug!("[MongoHandler] 注册模型 {} -> {}", model.name(), collection);
        self.models.insert(collection.to_string(), model.clone());
        Ok(())
    }

    fn model(&self, collection: &str) -> Option<Arc<ModelDefinition>> {
        self.models.get(collection).map(|entry| entry.value().clone())
    }

    /// 检查数据库是否可连接
    pub async fn check_connection(&self) -> bool {
        let result: DualDbResult<()> = async {
            let mut session = self.connector.connect().await?;
            let result = session.ping().await;
            close_session(session).await;
            result
        }
        .await;

        match result {
            Ok(()) => {
                info!(
                    "[MongoHandler] 连接检查成功: {}:{}/{}",
                    self.config.host, self.config.port, self.config.database
                );
                true
            }
            Err(e) => {
                warn!(
                    "[MongoHandler] 连接检查失败: {}:{}/{}: {}",
                    self.config.host, self.config.port, self.config.database, e
                );
                false
            }
        }
    }

    /// 已注册模型的列名，结果放在信封的 `header` 中
    pub fn get_headers(&self, collection: &str) -> DocumentEnvelope {
        match self.model(collection) {
            Some(model) => DocumentEnvelope::success("Get headers from MongoDB successfully")
                .with_header(model.headers()),
            None => respond(
                "get_headers",
                Err(crate::dual_error!(
                    validation,
                    "collection",
                    format!("no model registered for collection {}", collection)
                )),
            ),
        }
    }

    /// 查询文档
    ///
    /// `ret_type` 不能为 [`ReturnType::Empty`]
    pub async fn get_data(
        &self,
        collection: &str,
        conditions: &Document,
        sort: &[SortKey],
        ret_type: ReturnType,
    ) -> DocumentEnvelope {
        let result: DualDbResult<DocumentEnvelope> = async {
            if ret_type == ReturnType::Empty {
                return Err(crate::dual_error!(
                    validation,
                    "ret_type",
                    "ret_type cannot be 'empty' for get_data"
                ));
            }
            self.security_validator.validate_table_name(collection)?;
            let filter = normalize(conditions)?;
            let sort = self.sort_document(sort)?;
            debug!("[MongoHandler] find {}: {} sort: {:?}", collection, filter, sort);

            let mut session = self.connector.connect().await?;
            let documents = session.find(collection, filter, sort).await;
            close_session(session).await;

            let documents = documents?;
            let count = documents.len() as u64;
            Ok(shape(documents, ret_type, "Get data from MongoDB successfully").with_affected_rows(count))
        }
        .await;
        respond("get_data", result)
    }

    /// 批量写入文档，写入后按 `_id` 重新读取
    pub async fn add_data(
        &self,
        collection: &str,
        documents: &[Document],
        ret_type: ReturnType,
    ) -> DocumentEnvelope {
        if documents.is_empty() {
            return DocumentEnvelope::success("Nothing to add.");
        }
        let result: DualDbResult<DocumentEnvelope> = async {
            self.security_validator.validate_table_name(collection)?;
            let prepared = match self.model(collection) {
                Some(model) => documents
                    .iter()
                    .map(|document| prepare_document(&model, collection, document))
                    .collect::<DualDbResult<Vec<_>>>()?,
                None => documents.to_vec(),
            };
            debug!("[MongoHandler] insert {}: {} 条", collection, prepared.len());

            let mut session = self.connector.connect().await?;
            let result: DualDbResult<DocumentEnvelope> = async {
                let ids = session.insert_many(collection, prepared).await?;
                let count = ids.len() as u64;
                let stored = if ret_type == ReturnType::Empty {
                    Vec::new()
                } else {
                    session
                        .find(collection, doc! { "_id": { "$in": ids } }, None)
                        .await?
                };
                Ok(shape(stored, ret_type, "Add data to MongoDB successfully").with_affected_rows(count))
            }
            .await;
            close_session(session).await;
            result
        }
        .await;
        respond("add_data", result)
    }

    /// 以 `$set` 更新匹配的文档，更新后重新读取
    ///
    /// 先取出匹配文档的 `_id`，更新和重新读取都按 `_id` 进行，更新条件中的字段被改写后仍能读回
    pub async fn update_data(
        &self,
        collection: &str,
        conditions: &Document,
        update: &Document,
        ret_type: ReturnType,
    ) -> DocumentEnvelope {
        if update.is_empty() {
            return DocumentEnvelope::success("Nothing to update.");
        }
        let result: DualDbResult<DocumentEnvelope> = async {
            self.security_validator.validate_table_name(collection)?;
            if let Some(model) = self.model(collection) {
                check_fields(&model, collection, update)?;
            }
            let filter = normalize(conditions)?;
            debug!("[MongoHandler] update {}: {} set: {}", collection, filter, update);

            let mut session = self.connector.connect().await?;
            let result: DualDbResult<DocumentEnvelope> = async {
                let ids = session
                    .find(collection, filter, None)
                    .await?
                    .into_iter()
                    .filter_map(|document| document.get(DEFAULT_ID_FIELD).cloned())
                    .collect::<Vec<_>>();
                if ids.is_empty() {
                    return Ok(DocumentEnvelope::success("Update data in MongoDB successfully"));
                }

                let by_id = doc! { "_id": { "$in": ids } };
                let matched = session
                    .update_many(collection, by_id.clone(), doc! { "$set": update.clone() })
                    .await?;
                let stored = if ret_type == ReturnType::Empty {
                    Vec::new()
                } else {
                    session.find(collection, by_id, None).await?
                };
                Ok(shape(stored, ret_type, "Update data in MongoDB successfully").with_affected_rows(matched))
            }
            .await;
            close_session(session).await;
            result
        }
        .await;
        respond("update_data", result)
    }

    /// 删除匹配的文档，返回 `[{deleted_count, conditions}]`
    pub async fn delete_data(&self, collection: &str, conditions: &Document) -> DocumentEnvelope {
        let result: DualDbResult<DocumentEnvelope> = async {
            self.security_validator.validate_table_name(collection)?;
            let filter = normalize(conditions)?;
            debug!("[MongoHandler] delete {}: {}", collection, filter);

            let mut session = self.connector.connect().await?;
            let deleted = session.delete_many(collection, filter).await;
            close_session(session).await;

            let deleted = deleted?;
            let summary = doc! {
                "deleted_count": deleted as i64,
                "conditions": conditions.clone(),
            };
            let mut envelope = DocumentEnvelope::success("Delete data from MongoDB successfully")
                .with_affected_rows(deleted);
            envelope.data = vec![summary.clone()];
            envelope.formatted_data = vec![summary];
            Ok(envelope)
        }
        .await;
        respond("delete_data", result)
    }

    fn sort_document(&self, sort: &[SortKey]) -> DualDbResult<Option<Document>> {
        if sort.is_empty() {
            return Ok(None);
        }
        let mut document = Document::new();
        for key in sort {
            self.security_validator.validate_field_name(&key.field)?;
            let direction = key.direction.unwrap_or(SortDirection::Asc);
            document.insert(key.field.clone(), direction.as_document_order());
        }
        Ok(Some(document))
    }
}

fn normalize(conditions: &Document) -> DualDbResult<Document> {
    normalize_id_condition(conditions, DEFAULT_ID_FIELD, &object_id_encoder)
}

async fn close_session(session: Box<dyn DocumentSession>) {
    if let Err(e) = session.close().await {
        warn!("[MongoHandler] 关闭连接失败: {}", e);
    }
}

fn respond(operation: &str, result: DualDbResult<DocumentEnvelope>) -> DocumentEnvelope {
    match result {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("[MongoHandler] {} 失败: {}", operation, e);
            DocumentEnvelope::from_error(&e)
        }
    }
}

/// 按返回形式组装信封：`data` 为存储原样，`formatted_data` 按 `ret_type` 转换
fn shape(documents: Vec<Document>, ret_type: ReturnType, message: &str) -> DocumentEnvelope {
    let mut envelope = DocumentEnvelope::success(message);
    match ret_type {
        ReturnType::Empty => {}
        ReturnType::Stored => {
            envelope.formatted_data = documents.clone();
            envelope.data = documents;
        }
        ReturnType::Portable => {
            envelope.formatted_data = documents.iter().map(to_portable).collect();
            envelope.data = documents;
        }
    }
    envelope
}

/// 字段必须属于模型，枚举列的值必须是枚举成员的值
fn check_fields(model: &ModelDefinition, collection: &str, document: &Document) -> DualDbResult<()> {
    let enum_columns = model.enum_columns();
    for (key, value) in document {
        if key == DEFAULT_ID_FIELD {
            continue;
        }
        if model.field(key).is_none() {
            return Err(crate::dual_error!(
                validation,
                key,
                format!("field {} is not declared for collection {}", key, collection)
            ));
        }
        if let Some((_, definition)) = enum_columns.iter().find(|(column, _)| column == key) {
            let valid = match value {
                Bson::String(s) => definition.by_value(s).is_some(),
                Bson::Null => true,
                _ => false,
            };
            if !valid {
                return Err(crate::dual_error!(
                    validation,
                    key,
                    format!("{} is not a value of enum {}", value, definition.name())
                ));
            }
        }
    }
    Ok(())
}

/// 应用默认值并检查必填字段
fn prepare_document(model: &ModelDefinition, collection: &str, document: &Document) -> DualDbResult<Document> {
    check_fields(model, collection, document)?;

    let mut prepared = document.clone();
    for (column, default) in model.headers_default() {
        if !prepared.contains_key(&column) && !default.is_null() {
            prepared.insert(column, data_value_to_bson(&default));
        }
    }
    for column in model.required_headers() {
        match prepared.get(&column) {
            None | Some(Bson::Null) => return Err(crate::dual_error!(missing_data, collection, column)),
            Some(_) => {}
        }
    }
    Ok(prepared)
}
