//! MongoDB连接抽象
//!
//! 与PostgreSQL一侧相同，每次调用新建客户端，用完即关闭

use crate::adapter::mongodb::utils::map_mongo_error;
use crate::error::DualDbResult;
use crate::types::MongoConfig;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::{ClientOptions, FindOptions};
use mongodb::{Client, Database};
use rat_logger::debug;

/// 单个文档数据库会话
#[async_trait]
pub trait DocumentSession: Send {
    /// 查询文档
    async fn find(
        &mut self,
        collection: &str,
        filter: Document,
        sort: Option<Document>,
    ) -> DualDbResult<Vec<Document>>;

    /// 批量写入，按写入顺序返回生成的 `_id`
    async fn insert_many(&mut self, collection: &str, documents: Vec<Document>) -> DualDbResult<Vec<Bson>>;

    /// 批量更新，返回匹配的文档数
    async fn update_many(&mut self, collection: &str, filter: Document, update: Document) -> DualDbResult<u64>;

    /// 批量删除，返回删除的文档数
    async fn delete_many(&mut self, collection: &str, filter: Document) -> DualDbResult<u64>;

    /// 探测服务器是否可达
    async fn ping(&mut self) -> DualDbResult<()>;

    /// 关闭会话
    async fn close(self: Box<Self>) -> DualDbResult<()>;
}

/// 会话工厂
#[async_trait]
pub trait DocumentConnector: Send + Sync {
    /// 建立新会话
    async fn connect(&self) -> DualDbResult<Box<dyn DocumentSession>>;
}

/// 基于官方驱动的连接器
pub struct MongoDocumentConnector {
    config: MongoConfig,
}

impl MongoDocumentConnector {
    /// 创建连接器
    pub fn new(config: MongoConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DocumentConnector for MongoDocumentConnector {
    async fn connect(&self) -> DualDbResult<Box<dyn DocumentSession>> {
        let mut options = ClientOptions::parse(self.config.build_uri())
            .await
            .map_err(map_mongo_error)?;
        options.app_name = Some(self.config.alias.clone());

        let client = Client::with_options(options).map_err(map_mongo_error)?;
        let database = client.database(&self.config.database);
        debug!(
            "已创建MongoDB客户端: {}:{}/{}",
            self.config.host, self.config.port, self.config.database
        );
        Ok(Box::new(MongoDocumentSession { client, database }))
    }
}

/// 基于官方驱动的会话
pub struct MongoDocumentSession {
    client: Client,
    database: Database,
}

#[async_trait]
impl DocumentSession for MongoDocumentSession {
    async fn find(
        &mut self,
        collection: &str,
        filter: Document,
        sort: Option<Document>,
    ) -> DualDbResult<Vec<Document>> {
        let options = FindOptions::builder().sort(sort).build();
        let cursor = self
            .database
            .collection::<Document>(collection)
            .find(filter, options)
            .await
            .map_err(map_mongo_error)?;
        cursor.try_collect().await.map_err(map_mongo_error)
    }

    async fn insert_many(&mut self, collection: &str, documents: Vec<Document>) -> DualDbResult<Vec<Bson>> {
        let result = self
            .database
            .collection::<Document>(collection)
            .insert_many(documents, None)
            .await
            .map_err(map_mongo_error)?;

        let mut ids: Vec<(usize, Bson)> = result.inserted_ids.into_iter().collect();
        ids.sort_by_key(|(index, _)| *index);
        Ok(ids.into_iter().map(|(_, id)| id).collect())
    }

    async fn update_many(&mut self, collection: &str, filter: Document, update: Document) -> DualDbResult<u64> {
        let result = self
            .database
            .collection::<Document>(collection)
            .update_many(filter, update, None)
            .await
            .map_err(map_mongo_error)?;
        Ok(result.matched_count)
    }

    async fn delete_many(&mut self, collection: &str, filter: Document) -> DualDbResult<u64> {
        let result = self
            .database
            .collection::<Document>(collection)
            .delete_many(filter, None)
            .await
            .map_err(map_mongo_error)?;
        Ok(result.deleted_count)
    }

    async fn ping(&mut self) -> DualDbResult<()> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map(|_| ())
            .map_err(map_mongo_error)
    }

    async fn close(self: Box<Self>) -> DualDbResult<()> {
        self.client.shutdown().await;
        Ok(())
    }
}
