// 重试引擎
//
// 核心功能：
// 1. 调用传输层提交一次请求
// 2. 对响应分类（成功 / 限流 / 网络错误 / 致命拒绝）
// 3. 网络错误按固定间隔重试，限流严格按服务器给出的秒数等待
// 4. 致命拒绝立即返回，由编排器停止全部上传
//
// 默认不限重试次数；最大尝试次数、截止时间和取消令牌都是可选的加固手段

use crate::telegram::{
    classify, AttemptOutcome, FilePart, MalformedPolicy, Operation, Transport,
};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

// =====================================================
// 重试配置
// =====================================================

/// 网络错误后的固定等待时间（秒）
pub const DEFAULT_TRANSIENT_DELAY_SECS: u64 = 5;

/// 重试策略
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 网络错误后的固定等待
    pub transient_delay: Duration,
    /// 最大尝试次数，None 表示不限
    pub max_attempts: Option<u32>,
    /// 单个条目从首次尝试起的截止时间，None 表示不限
    pub deadline: Option<Duration>,
    /// 畸形响应的处理方式
    pub malformed: MalformedPolicy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            transient_delay: Duration::from_secs(DEFAULT_TRANSIENT_DELAY_SECS),
            max_attempts: None,
            deadline: None,
            malformed: MalformedPolicy::Fatal,
        }
    }
}

/// 上传错误
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// 服务器拒绝且没有重试提示，不可恢复
    #[error("Bot API 拒绝请求: {message}")]
    Rejected { message: String },
    /// 达到配置的最大尝试次数
    #[error("已达最大尝试次数 ({attempts})")]
    AttemptsExhausted { attempts: u32 },
    /// 超过配置的截止时间
    #[error("重试超过截止时间: 已尝试 {attempts} 次, 耗时 {elapsed:?}")]
    DeadlineExceeded { attempts: u32, elapsed: Duration },
    /// 收到取消信号
    #[error("上传已取消")]
    Cancelled,
}

impl UploadError {
    /// 进程退出码：取消为 130，其余均为 1
    pub fn exit_code(&self) -> u8 {
        match self {
            UploadError::Cancelled => 130,
            _ => 1,
        }
    }
}

/// 等待抽象，测试中替换为只记录时长的实现
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// 基于 tokio 定时器的等待
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// 一次完整的请求（可重复提交）
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub operation: Operation,
    /// 完整地址（含 token，不写日志）
    pub url: String,
    pub fields: Vec<(String, String)>,
    pub file: FilePart,
}

/// 成功时的统计
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptReport {
    /// 总尝试次数（含最后成功的一次）
    pub attempts: u32,
    /// 重试前累计等待的时长
    pub waited: Duration,
}

// =====================================================
// 重试引擎
// =====================================================

/// 重试引擎
///
/// 状态机：Attempting 在网络错误或限流后回到自身，
/// 直到 Success 或 Fatal 终止
pub struct RetryEngine<T, S = TokioSleeper> {
    transport: T,
    sleeper: S,
    policy: RetryPolicy,
    cancel_token: CancellationToken,
}

impl<T: Transport> RetryEngine<T, TokioSleeper> {
    /// 使用 tokio 定时器创建引擎
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self::with_sleeper(transport, TokioSleeper, policy)
    }
}

impl<T: Transport, S: Sleeper> RetryEngine<T, S> {
    pub fn with_sleeper(transport: T, sleeper: S, policy: RetryPolicy) -> Self {
        Self {
            transport,
            sleeper,
            policy,
            cancel_token: CancellationToken::new(),
        }
    }

    /// 绑定外部取消令牌（例如 Ctrl+C）
    pub fn with_cancel_token(mut self, cancel_token: CancellationToken) -> Self {
        self.cancel_token = cancel_token;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    /// 执行请求直到成功或遇到不可恢复的结果
    ///
    /// 每次尝试都会重新读取本地文件，文件句柄不会跨越等待
    pub async fn execute(&self, request: &UploadRequest) -> Result<AttemptReport, UploadError> {
        let method = request.operation.method();
        let started = Instant::now();
        let mut attempts: u32 = 0;
        let mut waited = Duration::ZERO;

        loop {
            if self.cancel_token.is_cancelled() {
                return Err(UploadError::Cancelled);
            }

            attempts += 1;
            debug!(
                "[{}] 第 {} 次尝试: {}",
                method, attempts, request.file.display_name
            );

            let result = tokio::select! {
                result = self.transport.post_multipart(&request.url, &request.fields, &request.file) => result,
                _ = self.cancel_token.cancelled() => return Err(UploadError::Cancelled),
            };

            let delay = match classify(&result, self.policy.malformed) {
                AttemptOutcome::Success => {
                    return Ok(AttemptReport { attempts, waited });
                }
                AttemptOutcome::Fatal(message) => {
                    error!(
                        "[{}] Bot API 返回错误: {} (文件: {})",
                        method, message, request.file.display_name
                    );
                    return Err(UploadError::Rejected { message });
                }
                AttemptOutcome::TransportError => {
                    let delay = self.policy.transient_delay;
                    match &result {
                        Err(e) => warn!("[{}] {}，{} 秒后重试", method, e, delay.as_secs()),
                        Ok(_) => warn!(
                            "[{}] 响应无法解析，{} 秒后重试",
                            method,
                            delay.as_secs()
                        ),
                    }
                    delay
                }
                AttemptOutcome::RetryAfter(secs) => {
                    warn!("[{}] 触发限流，等待 {} 秒后重试", method, secs);
                    Duration::from_secs(secs)
                }
            };

            if let Some(max_attempts) = self.policy.max_attempts {
                if attempts >= max_attempts {
                    error!("[{}] 已达最大尝试次数 ({})", method, max_attempts);
                    return Err(UploadError::AttemptsExhausted { attempts });
                }
            }

            if let Some(deadline) = self.policy.deadline {
                let elapsed = started.elapsed();
                if elapsed + delay > deadline {
                    error!(
                        "[{}] 下一次重试将超过截止时间 {:?}，放弃",
                        method, deadline
                    );
                    return Err(UploadError::DeadlineExceeded { attempts, elapsed });
                }
            }

            tokio::select! {
                _ = self.sleeper.sleep(delay) => {}
                _ = self.cancel_token.cancelled() => return Err(UploadError::Cancelled),
            }
            waited += delay;
        }
    }
}
