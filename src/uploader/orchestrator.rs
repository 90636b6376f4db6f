//! 上传编排
//!
//! 按组序号、组内位置严格顺序执行计划条目：
//! 每个条目都要在重试引擎里跑到成功，才会开始下一个条目。
//! 任何条目遇到致命错误时立即停止，后续条目和组都不再提交。

use crate::telegram::{BotEndpoint, FilePart, Transport};
use crate::uploader::{
    GroupPlan, GroupPlanner, Item, PlanEntry, RetryEngine, Sleeper, UploadError, UploadRequest,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

/// 上传进度事件
///
/// 只用于展示，不影响控制流
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum UploadEvent {
    /// 没有可上传的文件
    NothingToDo,
    /// 开始处理一个组
    GroupStarted {
        group_index: usize,
        group_count: usize,
        collection_name: String,
        title: String,
        item_count: usize,
    },
    /// 组内一个文件上传完成
    ItemCompleted {
        group_index: usize,
        /// 组内序号（从 1 开始）
        position: usize,
        item_count: usize,
        file_name: String,
        attempts: u32,
    },
    /// 组处理完成
    GroupCompleted {
        group_index: usize,
        collection_name: String,
        link: String,
    },
    /// 上传中止
    Halted {
        group_index: usize,
        position: usize,
        file_name: String,
        error: String,
    },
}

/// 进度输出
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: &UploadEvent);
}

/// 把进度写到日志
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgressSink;

impl ProgressSink for LogProgressSink {
    fn emit(&self, event: &UploadEvent) {
        match event {
            UploadEvent::NothingToDo => info!("没有找到可上传的文件"),
            UploadEvent::GroupStarted {
                group_index,
                group_count,
                collection_name,
                title,
                item_count,
            } => info!(
                "--- 创建贴纸集 ({}/{}): {} [{}], {} 个文件 ---",
                group_index + 1,
                group_count,
                title,
                collection_name,
                item_count
            ),
            UploadEvent::ItemCompleted {
                position,
                item_count,
                file_name,
                attempts,
                ..
            } => {
                if *attempts > 1 {
                    info!(
                        "[{}/{}] 已添加: {} (尝试 {} 次)",
                        position, item_count, file_name, attempts
                    );
                } else {
                    info!("[{}/{}] 已添加: {}", position, item_count, file_name);
                }
            }
            UploadEvent::GroupCompleted { link, .. } => info!("✓ 完成！贴纸集链接: {}", link),
            UploadEvent::Halted {
                group_index,
                position,
                file_name,
                error,
            } => error!(
                "上传中止: 第 {} 组第 {} 个文件 {}: {}",
                group_index + 1,
                position,
                file_name,
                error
            ),
        }
    }
}

/// 一次完整运行的统计
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub groups: usize,
    pub items: usize,
    /// 所有条目的尝试次数之和
    pub attempts: u64,
    /// 已完成贴纸集的链接
    pub links: Vec<String>,
}

/// 上传编排器
pub struct UploadOrchestrator<T, S> {
    engine: RetryEngine<T, S>,
    endpoint: BotEndpoint,
    planner: GroupPlanner,
    sink: Box<dyn ProgressSink>,
}

impl<T: Transport, S: Sleeper> UploadOrchestrator<T, S> {
    pub fn new(engine: RetryEngine<T, S>, endpoint: BotEndpoint, planner: GroupPlanner) -> Self {
        Self {
            engine,
            endpoint,
            planner,
            sink: Box::new(LogProgressSink),
        }
    }

    /// 替换进度输出
    pub fn with_sink(mut self, sink: Box<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn engine(&self) -> &RetryEngine<T, S> {
        &self.engine
    }

    /// 上传全部文件
    ///
    /// 空列表直接返回空统计；任何条目失败都会立刻返回错误
    pub async fn run(&self, items: &[Item]) -> Result<RunSummary, UploadError> {
        let plans = self.planner.plan(items);
        let mut summary = RunSummary {
            run_id: Uuid::new_v4().to_string(),
            groups: 0,
            items: 0,
            attempts: 0,
            links: Vec::new(),
        };

        if plans.is_empty() {
            self.sink.emit(&UploadEvent::NothingToDo);
            return Ok(summary);
        }

        info!(
            "开始上传: run_id={}, 文件 {} 个, 共 {} 组",
            summary.run_id,
            items.len(),
            plans.len()
        );

        let group_count = plans.len();
        for plan in &plans {
            self.run_group(plan, group_count, &mut summary).await?;
        }

        Ok(summary)
    }

    async fn run_group(
        &self,
        plan: &GroupPlan,
        group_count: usize,
        summary: &mut RunSummary,
    ) -> Result<(), UploadError> {
        let item_count = plan.entries.len();
        self.sink.emit(&UploadEvent::GroupStarted {
            group_index: plan.index,
            group_count,
            collection_name: plan.collection_name.clone(),
            title: plan.title.clone(),
            item_count,
        });

        for entry in &plan.entries {
            let request = self.request_for(entry);
            match self.engine.execute(&request).await {
                Ok(report) => {
                    summary.items += 1;
                    summary.attempts += report.attempts as u64;
                    self.sink.emit(&UploadEvent::ItemCompleted {
                        group_index: plan.index,
                        position: entry.position + 1,
                        item_count,
                        file_name: entry.item.display_name.clone(),
                        attempts: report.attempts,
                    });
                }
                Err(e) => {
                    self.sink.emit(&UploadEvent::Halted {
                        group_index: plan.index,
                        position: entry.position + 1,
                        file_name: entry.item.display_name.clone(),
                        error: e.to_string(),
                    });
                    return Err(e);
                }
            }
        }

        let link = plan.link();
        self.sink.emit(&UploadEvent::GroupCompleted {
            group_index: plan.index,
            collection_name: plan.collection_name.clone(),
            link: link.clone(),
        });
        summary.groups += 1;
        summary.links.push(link);

        Ok(())
    }

    fn request_for(&self, entry: &PlanEntry) -> UploadRequest {
        UploadRequest {
            operation: entry.operation,
            url: self.endpoint.url(entry.operation),
            fields: entry.fields.clone(),
            file: FilePart::from(&entry.item),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telegram::{StickerFormat, TransportError};
    use crate::uploader::testing::{
        network_error, ok_body, rate_limited_body, rejected_body, RecordingSleeper,
        ScriptedTransport,
    };
    use crate::uploader::{CollectionNaming, RetryPolicy, StickerStyle};
    use std::sync::{Arc, Mutex};

    /// 收集事件用于断言
    #[derive(Clone, Default)]
    struct CollectingSink {
        events: Arc<Mutex<Vec<UploadEvent>>>,
    }

    impl CollectingSink {
        fn events(&self) -> Vec<UploadEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl ProgressSink for CollectingSink {
        fn emit(&self, event: &UploadEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn items(n: usize) -> Vec<Item> {
        (0..n)
            .map(|i| Item::from_path(format!("output/{:04}.webm", i)))
            .collect()
    }

    fn orchestrator(
        script: Vec<Result<String, TransportError>>,
    ) -> (
        UploadOrchestrator<ScriptedTransport, RecordingSleeper>,
        CollectingSink,
    ) {
        let engine = RetryEngine::with_sleeper(
            ScriptedTransport::new(script),
            RecordingSleeper::default(),
            RetryPolicy::default(),
        );
        let planner = GroupPlanner::new(
            CollectionNaming {
                name_prefix: "gif_pack".to_string(),
                title_prefix: "GIF Pack Part".to_string(),
                owner_id: "42".to_string(),
                bot_username: "testbot".to_string(),
            },
            StickerStyle {
                emoji: "🔥".to_string(),
                format: StickerFormat::Video,
            },
            100,
        );
        let sink = CollectingSink::default();
        let orchestrator = UploadOrchestrator::new(
            engine,
            BotEndpoint::new("http://mock", "token"),
            planner,
        )
        .with_sink(Box::new(sink.clone()));
        (orchestrator, sink)
    }

    #[tokio::test]
    async fn test_empty_input_is_noop() {
        let (orchestrator, sink) = orchestrator(Vec::new());

        let summary = orchestrator.run(&[]).await.unwrap();

        assert_eq!(summary.groups, 0);
        assert_eq!(summary.items, 0);
        assert_eq!(orchestrator.engine().transport().call_count(), 0);
        assert_eq!(sink.events(), vec![UploadEvent::NothingToDo]);
    }

    #[tokio::test]
    async fn test_250_items_run_in_order() {
        let (orchestrator, sink) = orchestrator(Vec::new());
        let input = items(250);

        let summary = orchestrator.run(&input).await.unwrap();

        assert_eq!(summary.groups, 3);
        assert_eq!(summary.items, 250);
        assert_eq!(summary.attempts, 250);

        let calls = orchestrator.engine().transport().calls();
        assert_eq!(calls.len(), 250);

        // 提交顺序与输入顺序一致
        let submitted: Vec<_> = calls.iter().map(|c| c.file_name.clone()).collect();
        let expected: Vec<_> = input.iter().map(|i| i.display_name.clone()).collect();
        assert_eq!(submitted, expected);

        // 每组第一个调用创建贴纸集
        let creates: Vec<_> = calls
            .iter()
            .enumerate()
            .filter(|(_, c)| c.url.ends_with("/createNewStickerSet"))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(creates, vec![0, 100, 200]);
        assert!(calls[101].url.ends_with("/addStickerToSet"));
        assert!(calls[101]
            .fields
            .contains(&("name".to_string(), "gif_pack_1_42_by_testbot".to_string())));

        let completed_links: Vec<_> = sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                UploadEvent::GroupCompleted { link, .. } => Some(link),
                _ => None,
            })
            .collect();
        assert_eq!(completed_links, summary.links);
        assert_eq!(
            completed_links[2],
            "https://t.me/addstickers/gif_pack_2_42_by_testbot"
        );
    }

    #[tokio::test]
    async fn test_fatal_rejection_halts_remaining_entries() {
        // 第 2 个文件被拒绝
        let (orchestrator, sink) =
            orchestrator(vec![ok_body(), rejected_body("Bad Request: STICKER_VIDEO_LONG")]);

        let err = orchestrator.run(&items(150)).await.unwrap_err();

        assert!(matches!(err, UploadError::Rejected { .. }));
        let calls = orchestrator.engine().transport().calls();
        assert_eq!(calls.len(), 2, "失败条目之后不应再有任何请求");
        assert_eq!(calls[1].file_name, "0001.webm");

        let events = sink.events();
        assert!(!events
            .iter()
            .any(|e| matches!(e, UploadEvent::GroupCompleted { .. })));
        match events.last().unwrap() {
            UploadEvent::Halted {
                group_index,
                position,
                error,
                ..
            } => {
                assert_eq!(*group_index, 0);
                assert_eq!(*position, 2);
                assert!(error.contains("STICKER_VIDEO_LONG"));
            }
            other => panic!("最后一个事件应为 Halted，实际: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_retries_do_not_skip_or_duplicate_entries() {
        let (orchestrator, _sink) = orchestrator(vec![
            ok_body(),
            network_error(),
            rate_limited_body(3),
            ok_body(),
            ok_body(),
        ]);

        let summary = orchestrator.run(&items(3)).await.unwrap();

        assert_eq!(summary.items, 3);
        assert_eq!(summary.attempts, 5);

        let names: Vec<_> = orchestrator
            .engine()
            .transport()
            .calls()
            .into_iter()
            .map(|c| c.file_name)
            .collect();
        assert_eq!(
            names,
            vec!["0000.webm", "0001.webm", "0001.webm", "0001.webm", "0002.webm"]
        );

        // 创建只发生一次
        let create_count = orchestrator
            .engine()
            .transport()
            .calls()
            .iter()
            .filter(|c| c.url.ends_with("/createNewStickerSet"))
            .count();
        assert_eq!(create_count, 1);
    }

    #[test]
    fn test_event_serialization() {
        let event = UploadEvent::GroupCompleted {
            group_index: 1,
            collection_name: "gif_pack_1_42_by_testbot".to_string(),
            link: "https://t.me/addstickers/gif_pack_1_42_by_testbot".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "group_completed");
        assert_eq!(json["group_index"], 1);
    }
}
