// Bot API 类型定义

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// multipart 中文件部分的固定字段名
pub const STICKER_FILE_FIELD: &str = "sticker_file";

/// 贴纸描述里引用文件部分的地址
pub const STICKER_ATTACH_REF: &str = "attach://sticker_file";

/// 解析失败时使用的描述
pub const MALFORMED_RESPONSE: &str = "malformed response";

/// 贴纸集操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// 创建贴纸集（每组第一个文件）
    CreateCollection,
    /// 向已创建的贴纸集追加贴纸
    AppendItem,
}

impl Operation {
    /// 对应的 Bot API 方法名
    pub fn method(&self) -> &'static str {
        match self {
            Operation::CreateCollection => "createNewStickerSet",
            Operation::AppendItem => "addStickerToSet",
        }
    }
}

/// 贴纸格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StickerFormat {
    /// 静态贴纸（.webp/.png）
    Static,
    /// 动画贴纸（.tgs）
    Animated,
    /// 视频贴纸（.webm）
    Video,
}

impl StickerFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            StickerFormat::Static => "static",
            StickerFormat::Animated => "animated",
            StickerFormat::Video => "video",
        }
    }
}

impl Default for StickerFormat {
    fn default() -> Self {
        StickerFormat::Video
    }
}

/// InputSticker 描述（以 JSON 字符串放入表单字段）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StickerDescriptor {
    /// 文件引用，始终指向 multipart 里的文件部分
    pub sticker: String,
    /// 关联的 emoji 列表
    pub emoji_list: Vec<String>,
    /// 贴纸格式
    pub format: StickerFormat,
}

impl StickerDescriptor {
    pub fn attached(emoji: &str, format: StickerFormat) -> Self {
        Self {
            sticker: STICKER_ATTACH_REF.to_string(),
            emoji_list: vec![emoji.to_string()],
            format,
        }
    }
}

/// 待上传的本地文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    /// 本地文件路径
    pub path: PathBuf,
    /// multipart 中使用的文件名
    pub display_name: String,
}

/// 响应中的附加参数
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseParameters {
    /// 限流时服务器要求等待的秒数
    #[serde(default)]
    pub retry_after: Option<i64>,
}

/// Bot API 通用响应
///
/// 只解析重试状态机需要的字段，`result` 等其余字段忽略
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiResponse {
    /// 请求是否成功
    pub ok: bool,
    /// 错误描述
    #[serde(default)]
    pub description: Option<String>,
    /// 错误码（仅用于日志）
    #[serde(default)]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub parameters: Option<ResponseParameters>,
}

impl ApiResponse {
    /// 正数的限流等待秒数
    pub fn retry_after(&self) -> Option<u64> {
        self.parameters
            .as_ref()
            .and_then(|p| p.retry_after)
            .filter(|secs| *secs > 0)
            .map(|secs| secs as u64)
    }

    /// 人类可读的错误描述
    pub fn error_message(&self) -> String {
        match (&self.description, self.error_code) {
            (Some(desc), Some(code)) => format!("{} (error_code={})", desc, code),
            (Some(desc), None) => desc.clone(),
            (None, Some(code)) => format!("error_code={}", code),
            (None, None) => "未知错误".to_string(),
        }
    }
}

/// 传输层错误（未经解释的失败）
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// 连接、超时、DNS、读写中断等
    #[error("网络错误: {0}")]
    Network(String),
    /// 本地文件无法读取
    #[error("读取本地文件失败: {path:?}: {source}")]
    LocalFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TransportError {
    /// 从 reqwest 错误转换，保留错误类别便于日志排查
    pub fn from_reqwest(error: reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            "timeout"
        } else if error.is_connect() {
            "connect"
        } else if error.is_body() || error.is_decode() {
            "body"
        } else if error.is_request() {
            "request"
        } else {
            "other"
        };
        TransportError::Network(format!("[{}] {}", kind, error))
    }
}

/// 畸形响应的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedPolicy {
    /// 视为致命错误，停止全部上传
    #[default]
    Fatal,
    /// 视为网络错误，按固定间隔重试
    Retry,
}

/// 单次尝试的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    /// 服务器要求等待的秒数
    RetryAfter(u64),
    /// 不可恢复的拒绝
    Fatal(String),
    TransportError,
}

/// 将一次请求的原始结果分类
///
/// 与具体操作无关，创建和追加使用同一套逻辑
pub fn classify(
    result: &Result<String, TransportError>,
    malformed: MalformedPolicy,
) -> AttemptOutcome {
    let body = match result {
        Ok(body) => body,
        // 本地文件读不出来，重试也不会好
        Err(TransportError::LocalFile { path, source }) => {
            return AttemptOutcome::Fatal(format!("无法读取本地文件 {:?}: {}", path, source));
        }
        Err(TransportError::Network(_)) => return AttemptOutcome::TransportError,
    };

    let response: ApiResponse = match serde_json::from_str(body) {
        Ok(response) => response,
        Err(_) => {
            return match malformed {
                MalformedPolicy::Fatal => AttemptOutcome::Fatal(MALFORMED_RESPONSE.to_string()),
                MalformedPolicy::Retry => AttemptOutcome::TransportError,
            };
        }
    };

    if response.ok {
        AttemptOutcome::Success
    } else if let Some(secs) = response.retry_after() {
        AttemptOutcome::RetryAfter(secs)
    } else {
        AttemptOutcome::Fatal(response.error_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(s: &str) -> Result<String, TransportError> {
        Ok(s.to_string())
    }

    #[test]
    fn test_classify_success() {
        let outcome = classify(&body(r#"{"ok":true,"result":true}"#), MalformedPolicy::Fatal);
        assert_eq!(outcome, AttemptOutcome::Success);
    }

    #[test]
    fn test_classify_rate_limited() {
        let raw = r#"{"ok":false,"error_code":429,"description":"Too Many Requests: retry after 7","parameters":{"retry_after":7}}"#;
        assert_eq!(
            classify(&body(raw), MalformedPolicy::Fatal),
            AttemptOutcome::RetryAfter(7)
        );
    }

    #[test]
    fn test_classify_rejection_without_hint() {
        let raw = r#"{"ok":false,"error_code":400,"description":"Bad Request: sticker set name is already occupied"}"#;
        match classify(&body(raw), MalformedPolicy::Fatal) {
            AttemptOutcome::Fatal(msg) => {
                assert!(msg.contains("already occupied"));
                assert!(msg.contains("400"));
            }
            other => panic!("应为致命错误，实际: {:?}", other),
        }
    }

    #[test]
    fn test_classify_non_positive_hint_is_fatal() {
        let zero = r#"{"ok":false,"description":"x","parameters":{"retry_after":0}}"#;
        let negative = r#"{"ok":false,"description":"x","parameters":{"retry_after":-3}}"#;
        assert_eq!(
            classify(&body(zero), MalformedPolicy::Fatal),
            AttemptOutcome::Fatal("x".to_string())
        );
        assert_eq!(
            classify(&body(negative), MalformedPolicy::Fatal),
            AttemptOutcome::Fatal("x".to_string())
        );
    }

    #[test]
    fn test_classify_transport_error() {
        let result = Err(TransportError::Network("connection refused".to_string()));
        assert_eq!(
            classify(&result, MalformedPolicy::Fatal),
            AttemptOutcome::TransportError
        );
    }

    #[test]
    fn test_classify_local_file_error_is_fatal() {
        let result = Err(TransportError::LocalFile {
            path: PathBuf::from("missing.webm"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        });
        assert!(matches!(
            classify(&result, MalformedPolicy::Retry),
            AttemptOutcome::Fatal(_)
        ));
    }

    #[test]
    fn test_classify_malformed_follows_policy() {
        let raw = body("<html>502 Bad Gateway</html>");
        assert_eq!(
            classify(&raw, MalformedPolicy::Fatal),
            AttemptOutcome::Fatal(MALFORMED_RESPONSE.to_string())
        );
        assert_eq!(
            classify(&raw, MalformedPolicy::Retry),
            AttemptOutcome::TransportError
        );
    }

    #[test]
    fn test_classify_is_idempotent() {
        let samples = [
            r#"{"ok":true}"#,
            r#"{"ok":false,"parameters":{"retry_after":12}}"#,
            r#"{"ok":false,"description":"PEER_ID_INVALID"}"#,
            "not json",
        ];
        for raw in samples {
            let first = classify(&body(raw), MalformedPolicy::Fatal);
            let second = classify(&body(raw), MalformedPolicy::Fatal);
            assert_eq!(first, second, "同一响应分类结果应一致: {}", raw);
        }
    }

    #[test]
    fn test_operation_method_names() {
        assert_eq!(Operation::CreateCollection.method(), "createNewStickerSet");
        assert_eq!(Operation::AppendItem.method(), "addStickerToSet");
    }

    #[test]
    fn test_descriptor_serialization() {
        let descriptor = StickerDescriptor::attached("🔥", StickerFormat::Video);
        let json = serde_json::to_string(&descriptor).unwrap();
        assert_eq!(
            json,
            r#"{"sticker":"attach://sticker_file","emoji_list":["🔥"],"format":"video"}"#
        );
    }
}
