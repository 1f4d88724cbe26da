//! `txt` writer: a human-readable log per account

use crate::output::traits::{SinkResult, Writer};
use crate::record::{AccountMetadata, Record};
use async_trait::async_trait;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

const POST_URL_PREFIX: &str = "https://weibo.cn/comment/";

/// Appends to `<account-dir>/<id>.txt`
pub struct TxtWriter {
    path: PathBuf,
}

impl TxtWriter {
    pub fn new(account_dir: &Path, user: &AccountMetadata) -> Self {
        Self {
            path: account_dir.join(format!("{}.txt", user.id)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, text: &str) -> SinkResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(text.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

fn format_user(user: &AccountMetadata) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "用户昵称: {}", user.nickname);
    let _ = writeln!(text, "用户id: {}", user.id);
    let _ = writeln!(text, "微博数: {}", user.post_count);
    let _ = writeln!(text, "关注数: {}", user.following);
    let _ = writeln!(text, "粉丝数: {}", user.followers);
    text.push('\n');
    text
}

fn format_record(record: &Record) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "{}", record.content);
    let _ = writeln!(text, "微博发布位置：{}", record.publish_place);
    let _ = writeln!(text, "发布时间：{}", record.publish_time.format("%Y-%m-%d %H:%M"));
    let _ = writeln!(text, "发布工具：{}", record.publish_tool);
    let _ = writeln!(text, "点赞数：{}", record.up_num);
    let _ = writeln!(text, "转发数：{}", record.retweet_num);
    let _ = writeln!(text, "评论数：{}", record.comment_num);
    let _ = writeln!(text, "url：{}{}", POST_URL_PREFIX, record.id);
    for media in &record.saved_media {
        let _ = writeln!(text, "本地文件：{}", media.path.display());
    }
    text.push('\n');
    text
}

#[async_trait]
impl Writer for TxtWriter {
    fn name(&self) -> &str {
        "txt"
    }

    async fn write_account(&self, user: &AccountMetadata) -> SinkResult<()> {
        self.append(&format_user(user)).await
    }

    async fn write_records(&self, records: &[Record]) -> SinkResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        let text: String = records.iter().map(format_record).collect();
        self.append(&text).await
    }
}
