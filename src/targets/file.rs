//! Line-oriented target-list file
//!
//! Each line reads `<id> [<nickname>] [<since-date> [<HH:MM>]]`. The file is
//! both an input (which accounts, from when) and an output (the resume cursor
//! is written back into the third field once an account finishes).

use crate::dates::{is_valid_date, str_to_time};
use crate::ConfigError;
use chrono::NaiveDateTime;
use std::path::Path;

/// One parsed line of a target-list file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetLine {
    pub id: String,
    pub nickname: Option<String>,
    pub since: Option<NaiveDateTime>,
}

/// Parses file content into target lines
///
/// Lines whose first field is not all digits are ignored, and repeated ids
/// keep their first occurrence.
pub fn parse_target_lines(content: &str) -> Vec<TargetLine> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut lines: Vec<TargetLine> = Vec::new();

    for raw in content.lines() {
        let fields: Vec<&str> = raw.trim().split(' ').filter(|f| !f.is_empty()).collect();
        let Some(id) = fields.first() else {
            continue;
        };
        if !id.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        if lines.iter().any(|l| l.id == *id) {
            continue;
        }

        let since = match (fields.get(2), fields.get(3)) {
            (Some(date), Some(time)) if is_valid_date(&format!("{} {}", date, time)) => {
                str_to_time(&format!("{} {}", date, time)).ok()
            }
            (Some(date), _) => str_to_time(date).ok(),
            _ => None,
        };

        lines.push(TargetLine {
            id: id.to_string(),
            nickname: fields.get(1).map(|n| n.to_string()),
            since,
        });
    }

    lines
}

/// Reads and parses a target-list file
///
/// # Returns
///
/// * `Ok(Vec<TargetLine>)` - Parsed lines, possibly empty
/// * `Err(ConfigError::TargetFile)` - File missing, unreadable, or not UTF-8
pub fn read_target_file(path: &Path) -> Result<Vec<TargetLine>, ConfigError> {
    let bytes = std::fs::read(path).map_err(|e| ConfigError::TargetFile {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let content = String::from_utf8(bytes).map_err(|_| ConfigError::TargetFile {
        path: path.display().to_string(),
        message: "file is not valid UTF-8".to_string(),
    })?;
    Ok(parse_target_lines(&content))
}

/// Rewrites one line with a new resume cursor
///
/// A missing nickname is filled in, an existing one is kept. Other lines are
/// left as they are.
pub fn rewrite_line(content: &str, id: &str, nickname: &str, cursor: &str) -> (String, bool) {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut found = false;

    let lines: Vec<String> = content
        .lines()
        .map(|line| {
            let mut fields: Vec<String> = line
                .trim()
                .split(' ')
                .filter(|f| !f.is_empty())
                .map(str::to_string)
                .collect();
            if found || fields.first().map(String::as_str) != Some(id) {
                return line.to_string();
            }
            found = true;

            if fields.len() == 1 {
                fields.push(nickname.to_string());
            }
            if fields.len() > 3 && is_valid_date(&format!("{} {}", fields[2], fields[3])) {
                fields.remove(3);
            }
            if fields.len() == 2 {
                fields.push(cursor.to_string());
            } else {
                fields[2] = cursor.to_string();
            }
            fields.join(" ")
        })
        .collect();

    (lines.join("\n"), found)
}

/// Writes an account's resume cursor back into the target-list file
///
/// # Returns
///
/// * `Ok(true)` - The account's line was found and rewritten
/// * `Ok(false)` - No line matched; the file is untouched
/// * `Err(std::io::Error)` - Failed to read or write the file
pub async fn update_target_file(
    path: &Path,
    id: &str,
    nickname: &str,
    cursor: &str,
) -> std::io::Result<bool> {
    let content = tokio::fs::read_to_string(path).await?;
    let (updated, found) = rewrite_line(&content, id, nickname, cursor);
    if found {
        tokio::fs::write(path, updated).await?;
    }
    Ok(found)
}
