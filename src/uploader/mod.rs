// 上传模块
//
// 流程：
// - 扫描目录得到有序文件列表
// - 按 100 个一组切分，每组对应一个贴纸集
// - 组内第一个文件创建贴纸集，其余文件依次追加
// - 每个请求都通过重试引擎提交（网络错误固定间隔重试，限流按服务器要求等待）

pub mod engine;
pub mod folder;
pub mod orchestrator;
pub mod planner;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::{
    AttemptReport, RetryEngine, RetryPolicy, Sleeper, TokioSleeper, UploadError, UploadRequest,
    DEFAULT_TRANSIENT_DELAY_SECS,
};
pub use folder::{FolderScanner, ScanOptions};
pub use orchestrator::{LogProgressSink, ProgressSink, RunSummary, UploadEvent, UploadOrchestrator};
pub use planner::{
    partition, CollectionNaming, Group, GroupPlan, GroupPlanner, Item, PlanEntry, StickerStyle,
    MAX_GROUP_SIZE,
};
