// 测试辅助：按脚本返回结果的传输层和只记录时长的等待器

use crate::telegram::{FilePart, Transport, TransportError};
use crate::uploader::Sleeper;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// 一次被记录的调用
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub url: String,
    pub fields: Vec<(String, String)>,
    pub file_name: String,
}

/// 按脚本依次返回结果；脚本用完后一律返回成功
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<String, TransportError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Result<String, TransportError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post_multipart(
        &self,
        url: &str,
        fields: &[(String, String)],
        file: &FilePart,
    ) -> Result<String, TransportError> {
        self.calls.lock().unwrap().push(RecordedCall {
            url: url.to_string(),
            fields: fields.to_vec(),
            file_name: file.display_name.clone(),
        });
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(ok_body)
    }
}

/// 记录每次等待时长，立即返回
#[derive(Default)]
pub struct RecordingSleeper {
    recorded: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn recorded(&self) -> Vec<Duration> {
        self.recorded.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.recorded.lock().unwrap().push(duration);
    }
}

pub fn ok_body() -> Result<String, TransportError> {
    Ok(r#"{"ok":true,"result":true}"#.to_string())
}

pub fn rate_limited_body(secs: u64) -> Result<String, TransportError> {
    Ok(format!(
        r#"{{"ok":false,"error_code":429,"description":"Too Many Requests: retry after {secs}","parameters":{{"retry_after":{secs}}}}}"#
    ))
}

pub fn rejected_body(description: &str) -> Result<String, TransportError> {
    Ok(serde_json::json!({
        "ok": false,
        "error_code": 400,
        "description": description,
    })
    .to_string())
}

pub fn network_error() -> Result<String, TransportError> {
    Err(TransportError::Network("[connect] connection refused".to_string()))
}
