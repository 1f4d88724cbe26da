//! `csv` writer: one row per post, spreadsheet friendly

use crate::output::traits::{SinkResult, Writer};
use crate::record::{AccountMetadata, MediaKind, Record, NO_MEDIA};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Column titles, in row order
pub const CSV_HEADER: &[&str] = &[
    "微博id",
    "微博正文",
    "原始图片url",
    "被转发微博原始图片url",
    "是否为原创微博",
    "微博视频url",
    "发布位置",
    "发布时间",
    "发布工具",
    "点赞数",
    "转发数",
    "评论数",
];

/// Appends to `<account-dir>/<id>.csv`
///
/// The header row is written when the file is created or empty. Posts are
/// appended as they arrive, so a re-harvested post shows up again.
pub struct CsvWriter {
    path: PathBuf,
}

impl CsvWriter {
    pub fn new(account_dir: &Path, user: &AccountMetadata) -> Self {
        Self {
            path: account_dir.join(format!("{}.csv", user.id)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn needs_header(&self) -> SinkResult<bool> {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) => Ok(meta.len() == 0),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(e.into()),
        }
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

/// Quotes a field if it holds a separator, a quote or a line break
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn join_row<I, S>(fields: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut row = fields
        .into_iter()
        .map(|f| escape_field(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",");
    row.push_str("\r\n");
    row
}

/// Comma-joined URLs of one media kind, or the "no media" sentinel
fn media_urls(record: &Record, kind: MediaKind, retweet: bool) -> String {
    let urls: Vec<&str> = record
        .media_refs
        .iter()
        .filter(|m| m.kind == kind && m.retweet == retweet)
        .flat_map(|m| m.urls())
        .collect();
    if urls.is_empty() {
        NO_MEDIA.to_string()
    } else {
        urls.join(",")
    }
}

fn format_record(record: &Record) -> String {
    join_row([
        record.id.clone(),
        record.content.clone(),
        media_urls(record, MediaKind::Image, false),
        media_urls(record, MediaKind::Image, true),
        record.original.to_string(),
        media_urls(record, MediaKind::Video, false),
        record.publish_place.clone(),
        record.publish_time.format("%Y-%m-%d %H:%M").to_string(),
        record.publish_tool.clone(),
        record.up_num.to_string(),
        record.retweet_num.to_string(),
        record.comment_num.to_string(),
    ])
}

#[async_trait]
impl Writer for CsvWriter {
    fn name(&self) -> &str {
        "csv"
    }

    async fn write_account(&self, _user: &AccountMetadata) -> SinkResult<()> {
        if self.needs_header().await? {
            self.append(&join_row(CSV_HEADER)).await?;
        }
        Ok(())
    }

    async fn write_records(&self, records: &[Record]) -> SinkResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut text = String::new();
        if self.needs_header().await? {
            text.push_str(&join_row(CSV_HEADER));
        }
        text.extend(records.iter().map(format_record));
        self.append(&text).await?;
        tracing::debug!("{} posts written to {}", records.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MediaRef;
    use chrono::NaiveDate;

    fn user() -> AccountMetadata {
        AccountMetadata {
            id: "55".to_string(),
            nickname: "rows".to_string(),
            ..Default::default()
        }
    }

    fn post(id: &str, content: &str) -> Record {
        let time = NaiveDate::from_ymd_opt(2024, 4, 2)
            .unwrap()
            .and_hms_opt(9, 15, 0)
            .unwrap();
        Record::new(id, "55", content, time)
    }

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_field("two\nlines"), "\"two\nlines\"");
    }

    #[tokio::test]
    async fn test_header_once_then_rows() {
        let dir = tempfile::tempdir().unwrap();
        let writer = CsvWriter::new(dir.path(), &user());

        writer.write_account(&user()).await.unwrap();
        writer.write_records(&[post("a", "first")]).await.unwrap();
        writer.write_account(&user()).await.unwrap();
        writer.write_records(&[post("b", "second")]).await.unwrap();

        let text = tokio::fs::read_to_string(writer.path()).await.unwrap();
        let lines: Vec<&str> = text.split("\r\n").filter(|l| !l.is_empty()).collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER.join(","));
        assert_eq!(
            lines[1],
            "a,first,无,无,true,无,,2024-04-02 09:15,,0,0,0"
        );
        assert!(lines[2].starts_with("b,second,"));
    }

    #[tokio::test]
    async fn test_records_without_account_still_get_header() {
        let dir = tempfile::tempdir().unwrap();
        let writer = CsvWriter::new(dir.path(), &user());

        writer.write_records(&[post("a", "x")]).await.unwrap();

        let text = tokio::fs::read_to_string(writer.path()).await.unwrap();
        assert!(text.starts_with("微博id,"));
        assert_eq!(text.matches("微博id").count(), 1);
    }

    #[tokio::test]
    async fn test_media_and_quoting_in_row() {
        let dir = tempfile::tempdir().unwrap();
        let writer = CsvWriter::new(dir.path(), &user());
        let mut record = post("m", "hello, \"world\"");
        record.original = false;
        record.publish_tool = "iPhone".to_string();
        record.up_num = 4;
        record.media_refs = vec![
            MediaRef::new("https://img/1.jpg,https://img/2.jpg", MediaKind::Image),
            MediaRef::new("https://img/r.jpg", MediaKind::Image).from_retweet(),
            MediaRef::new(NO_MEDIA, MediaKind::Video),
        ];

        writer.write_records(&[record]).await.unwrap();

        let text = tokio::fs::read_to_string(writer.path()).await.unwrap();
        let row = text.split("\r\n").nth(1).unwrap();
        assert_eq!(
            row,
            "m,\"hello, \"\"world\"\"\",\"https://img/1.jpg,https://img/2.jpg\",\
             https://img/r.jpg,false,无,,2024-04-02 09:15,iPhone,4,0,0"
        );
    }
}
