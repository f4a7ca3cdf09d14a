pub mod docs;
pub mod query;

use serde::{Deserialize, Serialize};

pub use docs::{DocChunk, DocChunksResponse, DocListItem, DocListResponse};
pub use query::{
    DocumentQuery, QueryRequest, QueryResponse, QueryResponseBody, QueryResultItem, QueryTarget,
    TextQuery,
};

/// 服务端分配的切片标识，可能是字符串（如 `doc_3`）也可能是数字
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChunkId {
    Index(i64),
    Text(String),
}

impl ChunkId {
    /// 切片在文档中的序号：数字本身，或文本 id 最后一个 `_` 之后的整数
    pub fn ordinal(&self) -> Option<i64> {
        match self {
            ChunkId::Index(n) => Some(*n),
            ChunkId::Text(s) => s
                .rsplit_once('_')
                .and_then(|(_, tail)| tail.parse::<i64>().ok()),
        }
    }
}

impl std::fmt::Display for ChunkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChunkId::Index(n) => write!(f, "{}", n),
            ChunkId::Text(s) => f.write_str(s),
        }
    }
}

/// 拼接全文时的排序键，没有序号的切片排在最后
pub(crate) fn ordinal_key(id: Option<&ChunkId>) -> i64 {
    id.and_then(ChunkId::ordinal).unwrap_or(i64::MAX)
}

/// 入库结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IngestResult {
    /// 仅在服务端接受内容后存在
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension: Option<usize>,
}

/// `/api/v1/hello` 的响应
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HelloResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// 待上传的文件
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub mime: Option<String>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
            mime: None,
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    pub fn mime_or_default(&self) -> &str {
        self.mime.as_deref().unwrap_or("text/plain")
    }
}
