use crate::ChunkId;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// 一条检索命中
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryResultItem {
    pub doc_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<ChunkId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// 按文本做向量检索
#[derive(Debug, Clone, PartialEq)]
pub struct TextQuery {
    pub query: String,
    pub top_k: Option<u32>,
    pub min_score: Option<f32>,
}

impl TextQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top_k: None,
            min_score: None,
        }
    }

    pub fn top_k(mut self, top_k: u32) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn min_score(mut self, min_score: f32) -> Self {
        self.min_score = Some(min_score);
        self
    }
}

/// 按文档 id 取回切片，`full` 时由服务端拼接全文
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentQuery {
    pub doc_id: String,
    pub full: Option<bool>,
}

impl DocumentQuery {
    pub fn new(doc_id: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            full: None,
        }
    }

    pub fn full(mut self, full: bool) -> Self {
        self.full = Some(full);
        self
    }
}

/// 查询目标：自由文本或单个文档，二者只能取其一
#[derive(Debug, Clone, PartialEq)]
pub enum QueryTarget {
    Text(TextQuery),
    Document(DocumentQuery),
}

impl From<TextQuery> for QueryTarget {
    fn from(q: TextQuery) -> Self {
        QueryTarget::Text(q)
    }
}

impl From<DocumentQuery> for QueryTarget {
    fn from(q: DocumentQuery) -> Self {
        QueryTarget::Document(q)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub tenant_id: String,
    pub kb_id: String,
    pub target: QueryTarget,
}

impl QueryRequest {
    pub fn new(
        tenant_id: impl Into<String>,
        kb_id: impl Into<String>,
        target: impl Into<QueryTarget>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            kb_id: kb_id.into(),
            target: target.into(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryBody<'a> {
    tenant_id: &'a str,
    kb_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    query: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    min_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    doc_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    full: Option<bool>,
}

// 线上格式是扁平的 JSON 对象
impl Serialize for QueryRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut body = QueryBody {
            tenant_id: &self.tenant_id,
            kb_id: &self.kb_id,
            query: None,
            top_k: None,
            min_score: None,
            doc_id: None,
            full: None,
        };
        match &self.target {
            QueryTarget::Text(q) => {
                body.query = Some(&q.query);
                body.top_k = q.top_k;
                body.min_score = q.min_score;
            }
            QueryTarget::Document(q) => {
                body.doc_id = Some(&q.doc_id);
                body.full = q.full;
            }
        }
        body.serialize(serializer)
    }
}

/// `/api/v1/query` 的原始响应，所有字段均可缺省
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryResponseBody {
    pub tenant_id: Option<String>,
    pub kb_id: Option<String>,
    pub doc_id: Option<String>,
    pub model: Option<String>,
    pub top_k: Option<u32>,
    pub results: Option<Vec<QueryResultItem>>,
    pub document_text: Option<String>,
    pub chunks: Option<Vec<QueryResultItem>>,
    pub message: Option<String>,
}

/// 查询结果。服务端每种查询模式只填充其中一种形态。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum QueryResponse {
    /// 文本查询的排序命中
    Results { results: Vec<QueryResultItem> },
    /// `full` 文档查询返回的全文
    FullDocument {
        doc_id: Option<String>,
        text: String,
    },
    /// 未请求 `full` 时返回的文档切片
    DocumentChunks {
        doc_id: Option<String>,
        chunks: Vec<QueryResultItem>,
    },
    Empty { message: Option<String> },
}

impl From<QueryResponseBody> for QueryResponse {
    fn from(body: QueryResponseBody) -> Self {
        if let Some(text) = body.document_text {
            return QueryResponse::FullDocument {
                doc_id: body.doc_id,
                text,
            };
        }
        if let Some(results) = body.results {
            return QueryResponse::Results { results };
        }
        if let Some(chunks) = body.chunks {
            return QueryResponse::DocumentChunks {
                doc_id: body.doc_id,
                chunks,
            };
        }
        QueryResponse::Empty {
            message: body.message,
        }
    }
}

impl Default for QueryResponse {
    fn default() -> Self {
        QueryResponse::Empty { message: None }
    }
}

impl<'de> Deserialize<'de> for QueryResponse {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        QueryResponseBody::deserialize(deserializer).map(QueryResponse::from)
    }
}

impl QueryResponse {
    /// 排序命中；其他形态返回空切片
    pub fn results(&self) -> &[QueryResultItem] {
        match self {
            QueryResponse::Results { results } => results.as_slice(),
            _ => &[],
        }
    }

    pub fn document_text(&self) -> Option<&str> {
        match self {
            QueryResponse::FullDocument { text, .. } => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            QueryResponse::Empty { message } => message.as_deref(),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            QueryResponse::Results { results } => results.is_empty(),
            QueryResponse::FullDocument { text, .. } => text.is_empty(),
            QueryResponse::DocumentChunks { chunks, .. } => chunks.is_empty(),
            QueryResponse::Empty { .. } => true,
        }
    }
}
