// Sticker Pack Uploader Library
// 贴纸集批量上传核心库

// 命令行参数
pub mod cli;

// 配置管理模块
pub mod config;

// 日志模块
pub mod logging;

// Bot API 模块
pub mod telegram;

// 上传引擎模块
pub mod uploader;

// 导出常用类型
pub use config::AppConfig;
pub use telegram::{AttemptOutcome, BotApiClient, BotEndpoint, Operation, Transport};
pub use uploader::{
    FolderScanner, GroupPlanner, Item, RetryEngine, RetryPolicy, RunSummary, UploadError,
    UploadOrchestrator,
};
