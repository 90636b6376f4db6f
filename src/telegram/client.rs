// Bot API 客户端实现

use crate::telegram::{FilePart, Operation, TransportError, STICKER_FILE_FIELD};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// 默认 Bot API 地址
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// 传输层：一次 multipart 提交
///
/// 只负责把请求发出去并拿回原始响应体，不解释响应内容
#[async_trait]
pub trait Transport: Send + Sync {
    /// 提交表单字段和一个文件
    ///
    /// # 参数
    /// * `url` - 完整的方法地址
    /// * `fields` - 有序的表单字段，先于文件部分写入
    /// * `file` - 本地文件，放在 `sticker_file` 字段下
    async fn post_multipart(
        &self,
        url: &str,
        fields: &[(String, String)],
        file: &FilePart,
    ) -> std::result::Result<String, TransportError>;
}

/// Bot API 方法地址
///
/// 地址里带着 token，`Debug` 输出时会隐藏
#[derive(Clone)]
pub struct BotEndpoint {
    api_base: String,
    token: String,
}

impl BotEndpoint {
    pub fn new(api_base: &str, token: &str) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    /// 生成方法地址: {api_base}/bot{token}/{method}
    pub fn url(&self, operation: Operation) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, operation.method())
    }
}

impl std::fmt::Debug for BotEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotEndpoint")
            .field("api_base", &self.api_base)
            .field("token", &"***")
            .finish()
    }
}

/// 基于 reqwest 的 Bot API 客户端
#[derive(Debug, Clone)]
pub struct BotApiClient {
    client: Client,
}

impl BotApiClient {
    /// 创建客户端
    ///
    /// # 参数
    /// * `request_timeout` - 单次请求超时，超时按网络错误处理
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(15))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for BotApiClient {
    async fn post_multipart(
        &self,
        url: &str,
        fields: &[(String, String)],
        file: &FilePart,
    ) -> std::result::Result<String, TransportError> {
        // 每次尝试都重新读取文件，句柄在 read 返回时已经关闭
        let data = tokio::fs::read(&file.path)
            .await
            .map_err(|source| TransportError::LocalFile {
                path: file.path.clone(),
                source,
            })?;
        let size = data.len();

        let mut form = multipart::Form::new();
        for (name, value) in fields {
            form = form.text(name.clone(), value.clone());
        }

        let part = multipart::Part::bytes(data)
            .file_name(file.display_name.clone())
            .mime_str(mime_for(&file.path))
            .map_err(TransportError::from_reqwest)?;
        form = form.part(STICKER_FILE_FIELD, part);

        debug!(
            "提交 multipart: file={}, size={}, fields={}",
            file.display_name,
            size,
            fields.len()
        );

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(TransportError::from_reqwest)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(TransportError::from_reqwest)?;

        debug!("Bot API 响应: status={}, body={}", status, body);

        Ok(body)
    }
}

/// 按扩展名推断文件部分的 MIME 类型
fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("webm") => "video/webm",
        Some("webp") => "image/webp",
        Some("png") => "image/png",
        Some("tgs") => "application/x-tgsticker",
        _ => "application/octet-stream",
    }
}
