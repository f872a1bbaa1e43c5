//! MongoDB适配器模块

pub mod connection;
pub mod handler;
pub mod id_normalizer;
pub mod utils;

pub use connection::{DocumentConnector, DocumentSession, MongoDocumentConnector, MongoDocumentSession};
pub use handler::{DocumentEnvelope, MongoHandler};
pub use id_normalizer::{normalize_id_condition, object_id_encoder, DEFAULT_ID_FIELD, OPERATOR_PREFIX};
pub use utils::{data_value_to_bson, record_to_document, to_portable};
