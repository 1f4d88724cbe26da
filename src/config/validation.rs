use crate::config::types::{
    AuthConfig, Config, CrawlerConfig, OutputConfig, PostConfig, UserIdEntry, UserIdList,
};
use crate::dates::{is_valid_date, EndDate};
use crate::output::KNOWN_WRITERS;
use crate::ConfigError;
use chrono::Local;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_auth_config(&config.auth)?;
    validate_output_config(&config.output)?;
    if config.output.write_mode.iter().any(|m| m == "post") {
        match &config.post {
            Some(post) => validate_post_config(post)?,
            None => {
                return Err(ConfigError::Validation(
                    "write-mode 'post' needs a [post] section".to_string(),
                ))
            }
        }
    }
    Ok(())
}

/// Validates crawl window, targets and pacing
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    validate_range("random-wait-pages", config.random_wait_pages)?;
    validate_range("random-wait-seconds", config.random_wait_seconds)?;
    validate_global_wait(&config.global_wait)?;

    config.since(Local::now().date_naive())?;
    config.end()?;

    validate_user_id_list(&config.user_id_list)?;

    Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if config.request_timeout == 0 {
        return Err(ConfigError::Validation(
            "request-timeout must be >= 1 second".to_string(),
        ));
    }

    Ok(())
}

/// Validates a `[min, max]` pacing range
///
/// Ranges are rejected rather than reordered.
fn validate_range(name: &str, range: [u64; 2]) -> Result<(), ConfigError> {
    let [min, max] = range;
    if min < 1 {
        return Err(ConfigError::Validation(format!(
            "{} minimum must be >= 1, got {}",
            name, min
        )));
    }
    if min > max {
        return Err(ConfigError::Validation(format!(
            "{} minimum ({}) must not exceed maximum ({})",
            name, min, max
        )));
    }
    Ok(())
}

/// Validates the cooldown ring entries
fn validate_global_wait(entries: &[[u64; 2]]) -> Result<(), ConfigError> {
    if entries.is_empty() {
        return Err(ConfigError::Validation(
            "global-wait must contain at least one [pages, seconds] entry".to_string(),
        ));
    }
    for [threshold, _] in entries {
        if *threshold < 1 {
            return Err(ConfigError::Validation(format!(
                "global-wait page threshold must be >= 1, got {}",
                threshold
            )));
        }
    }
    Ok(())
}

/// Validates inline target entries
///
/// Inline ids may be aliases, resolved later from the index page. A
/// file-backed list is checked when it is loaded and only takes numeric ids.
fn validate_user_id_list(list: &UserIdList) -> Result<(), ConfigError> {
    let entries = match list {
        UserIdList::File(path) => {
            if path.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "user-id-list path cannot be empty".to_string(),
                ));
            }
            return Ok(());
        }
        UserIdList::Inline(entries) => entries,
    };

    if entries.is_empty() {
        return Err(ConfigError::Validation(
            "user-id-list must name at least one account".to_string(),
        ));
    }

    for entry in entries {
        let id = entry.id();
        if id.is_empty() || id.chars().any(char::is_whitespace) {
            return Err(ConfigError::Validation(format!(
                "user id '{}' must be non-empty and contain no whitespace",
                id
            )));
        }
        if let UserIdEntry::Detailed(detailed) = entry {
            if let Some(since) = &detailed.since_date {
                if !is_valid_date(since) {
                    return Err(ConfigError::InvalidDate(since.clone()));
                }
            }
            if let Some(end) = &detailed.end_date {
                EndDate::parse(end)?;
            }
        }
    }

    Ok(())
}

/// Validates credentials
fn validate_auth_config(config: &AuthConfig) -> Result<(), ConfigError> {
    if config.cookie.trim().is_empty() {
        return Err(ConfigError::Validation("cookie cannot be empty".to_string()));
    }
    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.output_dir.is_empty() {
        return Err(ConfigError::Validation(
            "output-dir cannot be empty".to_string(),
        ));
    }

    if config.write_mode.is_empty() {
        return Err(ConfigError::Validation(
            "write-mode must name at least one writer".to_string(),
        ));
    }

    for name in &config.write_mode {
        if !KNOWN_WRITERS.contains(&name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "unknown write-mode '{}', expected one of: {}",
                name,
                KNOWN_WRITERS.join(", ")
            )));
        }
    }

    let [_, connect, total] = config.file_download_timeout;
    if connect == 0 || total == 0 {
        return Err(ConfigError::Validation(format!(
            "file-download-timeout timeouts must be >= 1 second, got {:?}",
            config.file_download_timeout
        )));
    }

    Ok(())
}

/// Validates the POST writer endpoint
fn validate_post_config(config: &PostConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.api_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid api-url: {}", e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl(format!(
            "api-url must be http or https, got {}",
            url.scheme()
        )));
    }

    if config.request_timeout == 0 {
        return Err(ConfigError::Validation(
            "post request-timeout must be >= 1 second".to_string(),
        ));
    }

    Ok(())
}
