// 配置管理模块

use crate::telegram::{MalformedPolicy, StickerFormat, DEFAULT_API_BASE};
use crate::uploader::{
    CollectionNaming, RetryPolicy, ScanOptions, StickerStyle, DEFAULT_TRANSIENT_DELAY_SECS,
    MAX_GROUP_SIZE,
};
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config/app.toml";

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Bot 配置
    #[serde(default)]
    pub bot: BotConfig,
    /// 上传配置
    #[serde(default)]
    pub upload: UploadConfig,
    /// 贴纸配置
    #[serde(default)]
    pub sticker: StickerConfig,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// Bot 配置
#[derive(Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Bot token（也可以通过 STICKER_BOT_TOKEN 环境变量提供）
    #[serde(default)]
    pub token: String,
    /// 贴纸集所有者的用户 ID
    #[serde(default)]
    pub owner_id: String,
    /// Bot 用户名（不含 @）
    #[serde(default)]
    pub bot_username: String,
    /// Bot API 地址
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            owner_id: String::new(),
            bot_username: String::new(),
            api_base: default_api_base(),
        }
    }
}

impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("token", &if self.token.is_empty() { "" } else { "***" })
            .field("owner_id", &self.owner_id)
            .field("bot_username", &self.bot_username)
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// 上传配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// 源文件目录
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,
    /// 文件扩展名过滤（空字符串表示不过滤）
    #[serde(default = "default_extension")]
    pub extension: String,
    /// 每组最大文件数（1..=100）
    #[serde(default = "default_max_group_size")]
    pub max_group_size: usize,
    /// 网络错误后的重试间隔（秒）
    #[serde(default = "default_transient_retry_delay_secs")]
    pub transient_retry_delay_secs: u64,
    /// 单次请求超时（秒）
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// 单个文件最大尝试次数，不设置表示无限重试
    #[serde(default)]
    pub max_attempts: Option<u32>,
    /// 单个文件的重试截止时间（秒），不设置表示不限
    #[serde(default)]
    pub deadline_secs: Option<u64>,
    /// 无法解析的响应按致命错误（fatal）还是网络错误（retry）处理
    #[serde(default)]
    pub malformed_response: MalformedPolicy,
}

fn default_source_dir() -> PathBuf {
    PathBuf::from("./output")
}

fn default_extension() -> String {
    "webm".to_string()
}

fn default_max_group_size() -> usize {
    MAX_GROUP_SIZE
}

fn default_transient_retry_delay_secs() -> u64 {
    DEFAULT_TRANSIENT_DELAY_SECS
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            extension: default_extension(),
            max_group_size: default_max_group_size(),
            transient_retry_delay_secs: default_transient_retry_delay_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            max_attempts: None,
            deadline_secs: None,
            malformed_response: MalformedPolicy::default(),
        }
    }
}

impl UploadConfig {
    /// 转换为重试策略
    pub fn to_retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            transient_delay: Duration::from_secs(self.transient_retry_delay_secs),
            max_attempts: self.max_attempts,
            deadline: self.deadline_secs.map(Duration::from_secs),
            malformed: self.malformed_response,
        }
    }

    /// 转换为扫描配置
    pub fn to_scan_options(&self) -> ScanOptions {
        let extension = self.extension.trim().trim_start_matches('.');
        ScanOptions {
            extension: if extension.is_empty() {
                None
            } else {
                Some(extension.to_string())
            },
            skip_hidden: true,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// 贴纸配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StickerConfig {
    /// 每个贴纸关联的 emoji
    #[serde(default = "default_emoji")]
    pub emoji: String,
    /// 贴纸格式
    #[serde(default)]
    pub format: StickerFormat,
    /// 贴纸集名称前缀
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,
    /// 贴纸集标题前缀（后面跟从 1 开始的组号）
    #[serde(default = "default_title_prefix")]
    pub title_prefix: String,
}

fn default_emoji() -> String {
    "🔥".to_string()
}

fn default_name_prefix() -> String {
    "gif_pack".to_string()
}

fn default_title_prefix() -> String {
    "GIF Pack Part".to_string()
}

impl Default for StickerConfig {
    fn default() -> Self {
        Self {
            emoji: default_emoji(),
            format: StickerFormat::default(),
            name_prefix: default_name_prefix(),
            title_prefix: default_title_prefix(),
        }
    }
}

impl StickerConfig {
    pub fn to_style(&self) -> StickerStyle {
        StickerStyle {
            emoji: self.emoji.clone(),
            format: self.format,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用日志文件持久化
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志保留天数（默认 7 天）
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u32,
    /// 日志级别（默认 info）
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 单个日志文件最大大小（字节，默认 10MB）
    #[serde(default = "default_log_max_file_size")]
    pub max_file_size: u64,
}

fn default_log_enabled() -> bool {
    true
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_retention_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_max_file_size() -> u64 {
    10 * 1024 * 1024
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            log_dir: default_log_dir(),
            retention_days: default_log_retention_days(),
            level: default_log_level(),
            max_file_size: default_log_max_file_size(),
        }
    }
}

impl AppConfig {
    /// 从文件加载配置
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: AppConfig = toml::from_str(&content).context("Failed to parse config file")?;

        Ok(config)
    }

    /// 文件存在时加载，不存在时使用默认配置
    ///
    /// 文件存在但内容有误时返回错误，不会静默回退
    pub async fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if fs::try_exists(path).await.unwrap_or(false) {
            Self::load_from_file(path).await
        } else {
            Ok(Self::default())
        }
    }

    /// 贴纸集命名规则
    pub fn naming(&self) -> CollectionNaming {
        CollectionNaming {
            name_prefix: self.sticker.name_prefix.clone(),
            title_prefix: self.sticker.title_prefix.clone(),
            owner_id: self.bot.owner_id.trim().to_string(),
            bot_username: self.bot.bot_username.trim().trim_start_matches('@').to_string(),
        }
    }

    /// 校验上传所需的配置
    ///
    /// `require_token` 为 false 时（如 dry-run）不检查 token
    pub fn validate(&self, require_token: bool) -> Result<()> {
        if require_token && self.bot.token.trim().is_empty() {
            anyhow::bail!("未配置 Bot token（bot.token 或环境变量 STICKER_BOT_TOKEN）");
        }

        let owner_id = self.bot.owner_id.trim();
        if owner_id.is_empty() {
            anyhow::bail!("未配置贴纸集所有者 ID（bot.owner_id）");
        }
        if owner_id.parse::<i64>().is_err() {
            anyhow::bail!("bot.owner_id 必须是数字用户 ID: {}", owner_id);
        }

        let bot_username = self.bot.bot_username.trim().trim_start_matches('@');
        if bot_username.is_empty() {
            anyhow::bail!("未配置 Bot 用户名（bot.bot_username）");
        }
        let username_re = Regex::new(r"^[A-Za-z0-9_]+$").context("无效的用户名正则")?;
        if !username_re.is_match(bot_username) {
            anyhow::bail!("Bot 用户名只能包含字母、数字和下划线: {}", bot_username);
        }

        let prefix_re = Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").context("无效的前缀正则")?;
        if !prefix_re.is_match(&self.sticker.name_prefix) {
            anyhow::bail!(
                "贴纸集名称前缀必须以字母开头，且只能包含字母、数字和下划线: {}",
                self.sticker.name_prefix
            );
        }

        if self.sticker.emoji.trim().is_empty() {
            anyhow::bail!("sticker.emoji 不能为空");
        }

        if self.upload.max_group_size == 0 || self.upload.max_group_size > MAX_GROUP_SIZE {
            anyhow::bail!(
                "upload.max_group_size 必须在 1 到 {} 之间: {}",
                MAX_GROUP_SIZE,
                self.upload.max_group_size
            );
        }

        if self.upload.max_attempts == Some(0) {
            anyhow::bail!("upload.max_attempts 不能为 0");
        }

        Ok(())
    }
}
