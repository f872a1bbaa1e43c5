//! 结果信封
//!
//! 每个公共操作的唯一返回契约：成功或失败都通过信封返回，错误不会越过处理器边界

use crate::error::{DualDbError, ErrorKind};
use crate::types::DataValue;
use serde::Serialize;
use std::collections::HashMap;

/// 默认成功消息
pub const SUCCESS_MESSAGE: &str = "operation succeed";

/// 统一结果信封
///
/// `R` 为原始行的类型，`F` 为格式化行的类型
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultEnvelope<R, F> {
    /// 操作是否成功
    pub indicator: bool,
    /// 提示信息，失败时为错误原因
    pub message: String,
    /// 失败类别，成功时为 None
    pub error_kind: Option<ErrorKind>,
    /// 列名（仅关系型存储）
    pub header: Vec<String>,
    /// 原始行
    pub data: Vec<R>,
    /// 格式化后的行
    pub formatted_data: Vec<F>,
    /// 写操作影响的行数/文档数
    pub affected_rows: u64,
}

/// 关系型存储的结果信封
pub type SqlEnvelope = ResultEnvelope<Vec<DataValue>, HashMap<String, DataValue>>;

impl<R, F> ResultEnvelope<R, F> {
    /// 创建成功信封
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            indicator: true,
            message: message.into(),
            error_kind: None,
            header: Vec::new(),
            data: Vec::new(),
            formatted_data: Vec::new(),
            affected_rows: 0,
        }
    }

    /// 创建失败信封，数据字段全部为空
    pub fn failure(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            indicator: false,
            message: message.into(),
            error_kind: Some(kind),
            header: Vec::new(),
            data: Vec::new(),
            formatted_data: Vec::new(),
            affected_rows: 0,
        }
    }

    /// 由错误创建失败信封
    pub fn from_error(err: &DualDbError) -> Self {
        Self::failure(err.to_string(), err.kind())
    }

    /// 设置影响行数
    pub fn with_affected_rows(mut self, affected_rows: u64) -> Self {
        self.affected_rows = affected_rows;
        self
    }

    /// 设置列名
    pub fn with_header(mut self, header: Vec<String>) -> Self {
        self.header = header;
        self
    }
}

impl SqlEnvelope {
    /// 以列名和原始行构建成功信封，同时生成格式化行
    pub fn with_rows(header: Vec<String>, rows: Vec<Vec<DataValue>>) -> Self {
        let formatted_data = rows
            .iter()
            .map(|row| {
                header
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect::<HashMap<String, DataValue>>()
            })
            .collect();
        Self {
            indicator: true,
            message: SUCCESS_MESSAGE.to_string(),
            error_kind: None,
            header,
            data: rows,
            formatted_data,
            affected_rows: 0,
        }
    }
}
