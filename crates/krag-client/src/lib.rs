pub mod config;

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, multipart, Client, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use tracing::{debug, instrument};

pub use config::ClientConfig;
pub use krag_core::{
    ChunkId, DocChunk, DocChunksResponse, DocListItem, DocListResponse, DocumentQuery,
    HelloResponse, IngestResult, QueryRequest, QueryResponse, QueryResultItem, QueryTarget,
    TextQuery, UploadFile,
};
pub use krag_error::{ErrorMetadataBuilder, KragError, Result};

const COMPONENT: &str = "krag-client";

/// 知识库服务的调用接口。每个方法对应一次 HTTP 请求，不重试、不缓存。
#[async_trait]
pub trait KnowledgeBaseApi: Send + Sync {
    async fn hello(&self) -> Result<HelloResponse>;

    async fn ingest_text(
        &self,
        tenant_id: &str,
        kb_id: &str,
        filename: &str,
        text: &str,
    ) -> Result<IngestResult>;

    async fn ingest_file(
        &self,
        tenant_id: &str,
        kb_id: &str,
        file: UploadFile,
    ) -> Result<IngestResult>;

    /// 返回值的形态由查询模式决定，调用方按形态分支处理
    async fn query_vector(&self, req: &QueryRequest) -> Result<QueryResponse>;

    async fn list_docs(
        &self,
        tenant_id: &str,
        kb_id: &str,
        page: Option<u32>,
        size: Option<u32>,
    ) -> Result<DocListResponse>;

    /// 仅当 `include_vectors` 为真时返回嵌入向量
    async fn get_doc_chunks(
        &self,
        tenant_id: &str,
        kb_id: &str,
        doc_id: &str,
        include_vectors: bool,
    ) -> Result<DocChunksResponse>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScopeParams<'a> {
    tenant_id: &'a str,
    kb_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    filename: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    doc_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    include_vectors: Option<bool>,
}

impl<'a> ScopeParams<'a> {
    fn new(tenant_id: &'a str, kb_id: &'a str) -> Self {
        Self {
            tenant_id,
            kb_id,
            filename: None,
            doc_id: None,
            page: None,
            size: None,
            include_vectors: None,
        }
    }
}

#[derive(Clone)]
pub struct KragClient {
    http: Client,
    cfg: ClientConfig,
}

impl KragClient {
    pub fn new(cfg: ClientConfig) -> Result<Self> {
        cfg.validate()?;
        let mut builder = Client::builder();
        if let Some(timeout) = cfg.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|e| KragError::Configuration {
            key: "http_client".to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { http, cfg })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.cfg
    }

    async fn execute<T>(
        &self,
        operation: &str,
        scope: Option<(&str, &str)>,
        req: RequestBuilder,
    ) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        let out = self.send(operation, req).await;
        if let Err(err) = &out {
            let mut meta = ErrorMetadataBuilder::new(COMPONENT)
                .operation(operation)
                .context("base_url", &self.cfg.base_url);
            if let Some((tenant_id, kb_id)) = scope {
                meta = meta.tenant_id(tenant_id).kb_id(kb_id);
            }
            err.log(&meta.build(err));
        }
        out
    }

    async fn send<T>(&self, operation: &str, req: RequestBuilder) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        let timeout_ms = self.cfg.timeout_ms();
        let resp = req
            .send()
            .await
            .map_err(|e| KragError::from_transport(operation, &e, timeout_ms))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(KragError::Status {
                operation: operation.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| KragError::from_transport(operation, &e, timeout_ms))?;
        debug!(operation, status = status.as_u16(), bytes = bytes.len(), "response received");
        decode_body(&bytes)
    }
}

/// 空响应体或 `null` 视为所有字段缺省；非 JSON 响应体是错误
fn decode_body<T>(bytes: &[u8]) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    let value: serde_json::Value = serde_json::from_slice(bytes)?;
    if value.is_null() {
        return Ok(T::default());
    }
    Ok(serde_json::from_value(value)?)
}

/// 从磁盘读取待上传文件，文件名取路径最后一段
pub async fn read_upload_file(path: impl AsRef<Path>) -> Result<UploadFile> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await.map_err(|e| KragError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload.txt".to_string());
    Ok(UploadFile::new(file_name, bytes))
}

#[async_trait]
impl KnowledgeBaseApi for KragClient {
    #[instrument(skip(self))]
    async fn hello(&self) -> Result<HelloResponse> {
        let req = self.http.get(self.cfg.endpoint("/api/v1/hello"));
        self.execute("hello", None, req).await
    }

    #[instrument(skip(self, text), fields(text_len = text.len()))]
    async fn ingest_text(
        &self,
        tenant_id: &str,
        kb_id: &str,
        filename: &str,
        text: &str,
    ) -> Result<IngestResult> {
        let params = ScopeParams {
            filename: Some(filename),
            ..ScopeParams::new(tenant_id, kb_id)
        };
        let req = self
            .http
            .post(self.cfg.endpoint("/api/v1/ingest/text"))
            .query(&params)
            .header(CONTENT_TYPE, "text/plain")
            .body(text.to_string());
        self.execute("ingest_text", Some((tenant_id, kb_id)), req).await
    }

    #[instrument(skip(self, file), fields(file_name = %file.file_name, bytes = file.bytes.len()))]
    async fn ingest_file(
        &self,
        tenant_id: &str,
        kb_id: &str,
        file: UploadFile,
    ) -> Result<IngestResult> {
        let mime = file.mime_or_default().to_string();
        let part = multipart::Part::bytes(file.bytes)
            .file_name(file.file_name)
            .mime_str(&mime)
            .map_err(|e| KragError::Configuration {
                key: "mime".to_string(),
                reason: e.to_string(),
            })?;
        let form = multipart::Form::new().part("file", part);
        let req = self
            .http
            .post(self.cfg.endpoint("/api/v1/ingest/txt"))
            .query(&ScopeParams::new(tenant_id, kb_id))
            .multipart(form);
        self.execute("ingest_file", Some((tenant_id, kb_id)), req).await
    }

    #[instrument(skip(self, req), fields(tenant_id = %req.tenant_id, kb_id = %req.kb_id))]
    async fn query_vector(&self, req: &QueryRequest) -> Result<QueryResponse> {
        let http_req = self.http.post(self.cfg.endpoint("/api/v1/query")).json(req);
        self.execute(
            "query",
            Some((req.tenant_id.as_str(), req.kb_id.as_str())),
            http_req,
        )
        .await
    }

    #[instrument(skip(self))]
    async fn list_docs(
        &self,
        tenant_id: &str,
        kb_id: &str,
        page: Option<u32>,
        size: Option<u32>,
    ) -> Result<DocListResponse> {
        let params = ScopeParams {
            page,
            size,
            ..ScopeParams::new(tenant_id, kb_id)
        };
        let req = self
            .http
            .get(self.cfg.endpoint("/api/v1/docs"))
            .query(&params);
        self.execute("list_docs", Some((tenant_id, kb_id)), req).await
    }

    #[instrument(skip(self))]
    async fn get_doc_chunks(
        &self,
        tenant_id: &str,
        kb_id: &str,
        doc_id: &str,
        include_vectors: bool,
    ) -> Result<DocChunksResponse> {
        let params = ScopeParams {
            doc_id: Some(doc_id),
            include_vectors: include_vectors.then_some(true),
            ..ScopeParams::new(tenant_id, kb_id)
        };
        let req = self
            .http
            .get(self.cfg.endpoint("/api/v1/doc/chunks"))
            .query(&params);
        let resp: DocChunksResponse = self
            .execute("doc_chunks", Some((tenant_id, kb_id)), req)
            .await?;
        if include_vectors {
            return Ok(resp);
        }
        if resp.has_vectors() {
            debug!(doc_id, "dropping vectors that were not requested");
        }
        Ok(resp.without_vectors())
    }
}
