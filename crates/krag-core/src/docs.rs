use crate::{ordinal_key, ChunkId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocListItem {
    pub doc_id: String,
    pub chunks: u64,
}

/// 文档分页列表。`total` 是总数，与本页 `items` 数量无关。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocListResponse {
    pub tenant_id: String,
    pub kb_id: String,
    pub page: u32,
    pub size: u32,
    pub total: u64,
    pub items: Vec<DocListItem>,
}

impl DocListResponse {
    pub fn total_pages(&self) -> u64 {
        if self.size == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.size))
    }

    /// 页码从 1 开始
    pub fn has_next_page(&self) -> bool {
        u64::from(self.page) < self.total_pages()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocChunk {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<ChunkId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// 单个文档的切片列表，按需附带嵌入向量
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocChunksResponse {
    pub tenant_id: String,
    pub kb_id: String,
    pub doc_id: String,
    pub chunks: Vec<DocChunk>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vectors: Option<Vec<Vec<f32>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension: Option<usize>,
}

impl DocChunksResponse {
    /// 丢弃嵌入向量及其维度
    pub fn without_vectors(mut self) -> Self {
        self.vectors = None;
        self.dimension = None;
        self
    }

    pub fn has_vectors(&self) -> bool {
        self.vectors.is_some()
    }

    /// 按切片序号拼接全文，空白切片跳过，切片之间以空行分隔
    pub fn document_text(&self) -> String {
        let mut ordered: Vec<&DocChunk> = self.chunks.iter().collect();
        ordered.sort_by_key(|c| ordinal_key(c.chunk_id.as_ref()));
        ordered
            .into_iter()
            .filter_map(|c| c.text.as_deref())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
