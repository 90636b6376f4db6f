// 命令行参数

use crate::config::{AppConfig, DEFAULT_CONFIG_PATH};
use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// 把目录中的贴纸文件批量上传为 Telegram 贴纸集
#[derive(Debug, Parser)]
#[command(name = "sticker-uploader", version, about)]
pub struct Cli {
    /// 配置文件路径
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// 源文件目录（覆盖 upload.source_dir）
    #[arg(short, long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Bot token（覆盖 bot.token）
    #[arg(long, env = "STICKER_BOT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// 贴纸集所有者的用户 ID（覆盖 bot.owner_id）
    #[arg(long)]
    pub owner_id: Option<String>,

    /// Bot 用户名（覆盖 bot.bot_username）
    #[arg(long)]
    pub bot_username: Option<String>,

    /// 每组最大文件数（覆盖 upload.max_group_size）
    #[arg(long, value_name = "N")]
    pub group_size: Option<usize>,

    /// 只打印上传计划，不发送任何请求
    #[arg(long)]
    pub dry_run: bool,

    /// 提高日志详细程度（-v, -vv）
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// 用命令行参数覆盖配置文件中的值
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(dir) = &self.dir {
            config.upload.source_dir = dir.clone();
        }
        if let Some(token) = &self.token {
            config.bot.token = token.clone();
        }
        if let Some(owner_id) = &self.owner_id {
            config.bot.owner_id = owner_id.clone();
        }
        if let Some(bot_username) = &self.bot_username {
            config.bot.bot_username = bot_username.clone();
        }
        if let Some(group_size) = self.group_size {
            config.upload.max_group_size = group_size;
        }
    }
}
