// Bot API 模块

pub mod client;
pub mod types;

pub use client::{BotApiClient, BotEndpoint, Transport, DEFAULT_API_BASE};
pub use types::*;
