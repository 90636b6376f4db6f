//! 源目录扫描
//!
//! 负责:
//! - 扫描源目录下的一层文件（不递归）
//! - 按扩展名过滤
//! - 按文件名字典序排序，决定上传顺序

use crate::uploader::Item;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;

/// 扫描配置
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// 只保留该扩展名的文件（不区分大小写，不含点），None 表示全部
    pub extension: Option<String>,
    /// 跳过隐藏文件（以.开头）
    pub skip_hidden: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            extension: Some("webm".to_string()),
            skip_hidden: true,
        }
    }
}

/// 目录扫描器
pub struct FolderScanner {
    options: ScanOptions,
}

impl FolderScanner {
    pub fn new() -> Self {
        Self {
            options: ScanOptions::default(),
        }
    }

    pub fn with_options(options: ScanOptions) -> Self {
        Self { options }
    }

    /// 扫描目录
    ///
    /// # 返回
    /// 按文件名排序的文件列表；目录为空时返回空列表
    pub fn scan<P: AsRef<Path>>(&self, root_path: P) -> Result<Vec<Item>> {
        let root_path = root_path.as_ref();

        if !root_path.exists() {
            anyhow::bail!("扫描路径不存在: {}", root_path.display());
        }

        if !root_path.is_dir() {
            anyhow::bail!("扫描路径不是文件夹: {}", root_path.display());
        }

        let mut items = Vec::new();
        let walker = WalkDir::new(root_path)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name();

        for entry in walker {
            let entry =
                entry.with_context(|| format!("读取目录条目失败: {}", root_path.display()))?;

            if !entry.file_type().is_file() {
                debug!("跳过非常规文件: {}", entry.path().display());
                continue;
            }

            let name = entry.file_name().to_string_lossy();
            if self.options.skip_hidden && name.starts_with('.') {
                debug!("跳过隐藏文件: {}", entry.path().display());
                continue;
            }

            if !self.matches_extension(entry.path()) {
                continue;
            }

            items.push(Item::from_path(entry.path()));
        }

        info!(
            "目录扫描完成: {} 个文件 ({})",
            items.len(),
            root_path.display()
        );

        Ok(items)
    }

    fn matches_extension(&self, path: &Path) -> bool {
        match &self.options.extension {
            None => true,
            Some(wanted) => path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case(wanted.trim_start_matches('.')))
                .unwrap_or(false),
        }
    }
}

impl Default for FolderScanner {
    fn default() -> Self {
        Self::new()
    }
}
