//! `json` writer: one `{ "user": ..., "weibo": [...] }` document per account

use crate::media::write_atomic;
use crate::output::traits::{SinkResult, Writer};
use crate::record::{AccountMetadata, Record};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Serialize, Deserialize)]
struct JsonDocument {
    #[serde(default)]
    user: Value,
    #[serde(default)]
    weibo: Vec<Value>,
}

/// Keeps `<account-dir>/<id>.json` up to date
///
/// Posts already in the file are replaced in place by id; new posts are
/// appended. Every write replaces the whole file through a temp file.
pub struct JsonWriter {
    path: PathBuf,
}

impl JsonWriter {
    pub fn new(account_dir: &Path, user: &AccountMetadata) -> Self {
        Self {
            path: account_dir.join(format!("{}.json", user.id)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> SinkResult<JsonDocument> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(JsonDocument::default()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(JsonDocument::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn store(&self, document: &JsonDocument) -> SinkResult<()> {
        let bytes = serde_json::to_vec_pretty(document)?;
        write_atomic(&self.path, &bytes).await?;
        Ok(())
    }
}

fn merge_records(existing: &mut Vec<Value>, records: &[Record]) -> SinkResult<()> {
    for record in records {
        let value = serde_json::to_value(record)?;
        let slot = existing
            .iter_mut()
            .find(|old| old.get("id").and_then(Value::as_str) == Some(record.id.as_str()));
        match slot {
            Some(old) => *old = value,
            None => existing.push(value),
        }
    }
    Ok(())
}

#[async_trait]
impl Writer for JsonWriter {
    fn name(&self) -> &str {
        "json"
    }

    async fn write_account(&self, user: &AccountMetadata) -> SinkResult<()> {
        let mut document = self.load().await?;
        document.user = serde_json::to_value(user)?;
        self.store(&document).await
    }

    async fn write_records(&self, records: &[Record]) -> SinkResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut document = self.load().await?;
        merge_records(&mut document.weibo, records)?;
        self.store(&document).await?;
        tracing::debug!("{} posts written to {}", records.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn post(id: &str, content: &str) -> Record {
        let time = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(7, 0, 0)
            .unwrap();
        Record::new(id, "77", content, time)
    }

    fn user() -> AccountMetadata {
        AccountMetadata {
            id: "77".to_string(),
            nickname: "poster".to_string(),
            ..Default::default()
        }
    }

    async fn read(path: &Path) -> Value {
        serde_json::from_str(&tokio::fs::read_to_string(path).await.unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_replace_in_place_and_append() {
        let dir = tempfile::tempdir().unwrap();
        let writer = JsonWriter::new(dir.path(), &user());

        writer.write_account(&user()).await.unwrap();
        writer
            .write_records(&[post("a", "first"), post("b", "second")])
            .await
            .unwrap();
        writer
            .write_records(&[post("b", "edited"), post("c", "third")])
            .await
            .unwrap();

        let doc = read(writer.path()).await;
        assert_eq!(doc["user"]["nickname"], "poster");
        let ids: Vec<&str> = doc["weibo"]
            .as_array()
            .unwrap()
            .iter()
            .map(|w| w["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(doc["weibo"][1]["content"], "edited");
    }

    #[tokio::test]
    async fn test_account_rewrite_keeps_posts() {
        let dir = tempfile::tempdir().unwrap();
        let writer = JsonWriter::new(dir.path(), &user());
        writer.write_records(&[post("a", "kept")]).await.unwrap();

        let mut renamed = user();
        renamed.nickname = "renamed".to_string();
        writer.write_account(&renamed).await.unwrap();

        let doc = read(writer.path()).await;
        assert_eq!(doc["user"]["nickname"], "renamed");
        assert_eq!(doc["weibo"][0]["content"], "kept");
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let writer = JsonWriter::new(dir.path(), &user());
        tokio::fs::write(writer.path(), "{not json").await.unwrap();

        assert!(writer.write_records(&[post("a", "x")]).await.is_err());
    }
}
