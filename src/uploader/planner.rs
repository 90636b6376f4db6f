//! 分组规划
//!
//! 把有序的文件列表切成固定大小的组，每组对应一个贴纸集，
//! 并为组内每个位置生成要调用的操作和表单字段。纯计算，不做任何 I/O。

use crate::telegram::{FilePart, Operation, StickerDescriptor, StickerFormat};
use serde_json::json;
use std::path::{Path, PathBuf};

/// 单个贴纸集最多容纳的文件数
pub const MAX_GROUP_SIZE: usize = 100;

/// 贴纸集公开链接前缀
pub const ADD_STICKERS_LINK: &str = "https://t.me/addstickers/";

/// 待上传的本地文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// 本地文件路径
    pub path: PathBuf,
    /// 显示名称（文件名）
    pub display_name: String,
}

impl Item {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self { path, display_name }
    }
}

impl From<&Item> for FilePart {
    fn from(item: &Item) -> Self {
        FilePart {
            path: item.path.clone(),
            display_name: item.display_name.clone(),
        }
    }
}

/// 一组连续的文件
#[derive(Debug, Clone)]
pub struct Group {
    /// 组序号（从 0 开始）
    pub index: usize,
    pub items: Vec<Item>,
}

/// 按最大组大小连续切分
///
/// 第 g 组包含 `[g*M, min((g+1)*M, N))`，空列表得到零个组
pub fn partition(items: &[Item], max_group_size: usize) -> Vec<Group> {
    let size = max_group_size.clamp(1, MAX_GROUP_SIZE);
    items
        .chunks(size)
        .enumerate()
        .map(|(index, chunk)| Group {
            index,
            items: chunk.to_vec(),
        })
        .collect()
}

/// 贴纸集命名规则
#[derive(Debug, Clone)]
pub struct CollectionNaming {
    /// 名称前缀，如 gif_pack
    pub name_prefix: String,
    /// 标题前缀，如 "GIF Pack Part"
    pub title_prefix: String,
    /// 贴纸集所有者的用户 ID
    pub owner_id: String,
    /// Bot 用户名（Bot API 要求名称以 `_by_<bot>` 结尾）
    pub bot_username: String,
}

impl CollectionNaming {
    /// 贴纸集名称: {prefix}_{index}_{owner}_by_{bot}
    ///
    /// 只依赖组序号和配置，同一组的每次重试得到相同名称
    pub fn collection_name(&self, group_index: usize) -> String {
        format!(
            "{}_{}_{}_by_{}",
            self.name_prefix, group_index, self.owner_id, self.bot_username
        )
    }

    /// 标题使用从 1 开始的组号
    pub fn title(&self, group_index: usize) -> String {
        format!("{} {}", self.title_prefix, group_index + 1)
    }
}

/// 贴纸样式
#[derive(Debug, Clone)]
pub struct StickerStyle {
    pub emoji: String,
    pub format: StickerFormat,
}

/// 计划条目：组内一个位置要执行的操作
#[derive(Debug, Clone)]
pub struct PlanEntry {
    /// 组内位置（从 0 开始）
    pub position: usize,
    pub operation: Operation,
    /// 有序表单字段
    pub fields: Vec<(String, String)>,
    pub item: Item,
}

/// 一个组的完整计划
#[derive(Debug, Clone)]
pub struct GroupPlan {
    pub index: usize,
    pub collection_name: String,
    pub title: String,
    pub entries: Vec<PlanEntry>,
}

impl GroupPlan {
    /// 贴纸集公开链接
    pub fn link(&self) -> String {
        format!("{}{}", ADD_STICKERS_LINK, self.collection_name)
    }
}

/// 分组规划器
#[derive(Debug, Clone)]
pub struct GroupPlanner {
    naming: CollectionNaming,
    style: StickerStyle,
    max_group_size: usize,
}

impl GroupPlanner {
    /// 组大小会被限制在 1..=100
    pub fn new(naming: CollectionNaming, style: StickerStyle, max_group_size: usize) -> Self {
        Self {
            naming,
            style,
            max_group_size: max_group_size.clamp(1, MAX_GROUP_SIZE),
        }
    }

    pub fn max_group_size(&self) -> usize {
        self.max_group_size
    }

    /// 生成全部组的计划
    pub fn plan(&self, items: &[Item]) -> Vec<GroupPlan> {
        partition(items, self.max_group_size)
            .into_iter()
            .map(|group| self.plan_group(group))
            .collect()
    }

    /// 生成单个组的计划：位置 0 创建贴纸集，其余位置追加
    pub fn plan_group(&self, group: Group) -> GroupPlan {
        let collection_name = self.naming.collection_name(group.index);
        let title = self.naming.title(group.index);

        let entries = group
            .items
            .into_iter()
            .enumerate()
            .map(|(position, item)| {
                let (operation, fields) = if position == 0 {
                    (
                        Operation::CreateCollection,
                        self.create_fields(&collection_name, &title),
                    )
                } else {
                    (Operation::AppendItem, self.append_fields(&collection_name))
                };
                PlanEntry {
                    position,
                    operation,
                    fields,
                    item,
                }
            })
            .collect();

        GroupPlan {
            index: group.index,
            collection_name,
            title,
            entries,
        }
    }

    fn descriptor(&self) -> StickerDescriptor {
        StickerDescriptor::attached(&self.style.emoji, self.style.format)
    }

    fn create_fields(&self, collection_name: &str, title: &str) -> Vec<(String, String)> {
        let stickers = json!([self.descriptor()]).to_string();
        vec![
            ("user_id".to_string(), self.naming.owner_id.clone()),
            ("name".to_string(), collection_name.to_string()),
            ("title".to_string(), title.to_string()),
            ("stickers".to_string(), stickers),
            (
                "sticker_format".to_string(),
                self.style.format.as_str().to_string(),
            ),
        ]
    }

    fn append_fields(&self, collection_name: &str) -> Vec<(String, String)> {
        let sticker = json!(self.descriptor()).to_string();
        vec![
            ("user_id".to_string(), self.naming.owner_id.clone()),
            ("name".to_string(), collection_name.to_string()),
            ("sticker".to_string(), sticker),
        ]
    }
}
