//! Decoder for the weibo.cn mobile markup
//!
//! This is the decoder the binary runs with. It only reads the handful of
//! elements the harvest needs:
//! - `div.u` / `div.tip2` / `input[name=mp]` on the index page
//! - `<title>` and the `div.c` blocks on the info page
//! - `div.c[id^=M_]` posts on listing pages

use crate::decoder::{
    parse_publish_time, DecodeError, DecodedBatch, IndexPage, PageContext, PageDecoder,
    ProfileDecoder,
};
use crate::record::{AccountMetadata, MediaKind, MediaRef, Record, NO_MEDIA};
use scraper::{ElementRef, Html, Selector};

/// Titles the site serves instead of content when the cookie is not accepted
const LOGIN_TITLES: [&str; 2] = ["登录 - 新浪微博", "新浪微博"];

/// Decoder for weibo.cn pages
#[derive(Debug, Clone, Default)]
pub struct WeiboCnDecoder;

impl WeiboCnDecoder {
    pub fn new() -> Self {
        Self
    }
}

fn selector(css: &str) -> Result<Selector, DecodeError> {
    Selector::parse(css).map_err(|e| DecodeError::Malformed(format!("selector {}: {:?}", css, e)))
}

fn element_text(element: &ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Direct text children, as XPath `text()` would return them
fn own_text(element: &ElementRef) -> Vec<String> {
    element
        .children()
        .filter_map(|node| node.value().as_text().map(|t| t.to_string()))
        .filter(|t| !t.trim().is_empty())
        .collect()
}

fn page_title(document: &Html) -> Result<Option<String>, DecodeError> {
    let title = selector("title")?;
    Ok(document.select(&title).next().map(|t| element_text(&t)))
}

/// Fails with `NotLoggedIn` when the page is the login wall
fn check_login(document: &Html) -> Result<(), DecodeError> {
    match page_title(document)? {
        Some(title) if LOGIN_TITLES.contains(&title.as_str()) => Err(DecodeError::NotLoggedIn),
        _ => Ok(()),
    }
}

/// Reads `n` out of labels like `微博[1234]`
fn bracket_count(text: &str) -> Option<u64> {
    let start = text.find('[')?;
    let end = text[start..].find(']')? + start;
    text[start + 1..end].trim().parse().ok()
}

impl ProfileDecoder for WeiboCnDecoder {
    fn decode_index(&self, raw: &str, configured_id: &str) -> Result<IndexPage, DecodeError> {
        let document = Html::parse_document(raw);
        check_login(&document)?;

        let tip2 = selector("div.tip2 > *")?;
        let counts: Vec<u64> = document
            .select(&tip2)
            .filter_map(|e| bracket_count(&element_text(&e)))
            .collect();
        if counts.len() < 3 {
            return Err(DecodeError::Malformed(
                "index page has no post/following/follower counts".to_string(),
            ));
        }

        let links = selector("div.u a")?;
        let resolved_id = document
            .select(&links)
            .filter(|a| element_text(a) == "资料")
            .filter_map(|a| a.value().attr("href"))
            .find(|href| href.ends_with("/info"))
            .map(|href| href.trim_start_matches('/').trim_end_matches("/info").to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| configured_id.to_string());

        let mp = selector("input[name=mp]")?;
        let page_count = document
            .select(&mp)
            .next()
            .and_then(|input| input.value().attr("value"))
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(1)
            .max(1);

        let avatar = selector("div.u img.por")?;
        let avatar_url = document
            .select(&avatar)
            .next()
            .and_then(|img| img.value().attr("src"))
            .map(str::to_string);

        Ok(IndexPage {
            resolved_id,
            post_count: counts[0],
            following: counts[1],
            followers: counts[2],
            page_count,
            avatar_url,
        })
    }

    fn decode_info(&self, raw: &str, metadata: &mut AccountMetadata) -> Result<(), DecodeError> {
        let document = Html::parse_document(raw);
        check_login(&document)?;

        let title = page_title(&document)?
            .ok_or_else(|| DecodeError::Malformed("info page has no title".to_string()))?;
        let chars: Vec<char> = title.chars().collect();
        metadata.nickname = chars[..chars.len().saturating_sub(3)].iter().collect();

        let c = selector("div.c")?;
        let blocks: Vec<ElementRef> = document.select(&c).collect();
        if let Some(basic) = blocks.get(2) {
            for line in own_text(basic) {
                let Some((key, value)) = line.split_once(':') else {
                    continue;
                };
                let value = value.replace('\u{3000}', "").trim().to_string();
                match key.trim() {
                    "性别" => metadata.gender = value,
                    "地区" => metadata.location = value,
                    "生日" => metadata.birthday = value,
                    "简介" => metadata.description = value,
                    "认证" => metadata.verified_reason = value,
                    "达人" => metadata.talent = value,
                    _ => {}
                }
            }
        }

        let tip = selector("div.tip")?;
        let tips: Vec<String> = document.select(&tip).map(|t| element_text(&t)).collect();
        let experience = |index: usize| -> String {
            blocks
                .get(index)
                .and_then(|b| own_text(b).into_iter().next())
                .map(|t| t.trim_start_matches('·').replace('\u{a0}', " ").trim().to_string())
                .unwrap_or_default()
        };
        match tips.get(1).map(String::as_str) {
            Some("学习经历") => {
                metadata.education = experience(3);
                if tips.get(2).map(String::as_str) == Some("工作经历") {
                    metadata.work = experience(4);
                }
            }
            Some("工作经历") => metadata.work = experience(3),
            _ => {}
        }

        Ok(())
    }
}

impl PageDecoder for WeiboCnDecoder {
    fn decode_page(&self, raw: &str, ctx: &PageContext) -> Result<DecodedBatch, DecodeError> {
        let document = Html::parse_document(raw);
        check_login(&document)?;

        let any_c = selector("div.c")?;
        if document.select(&any_c).next().is_none() {
            return Err(DecodeError::Malformed(format!(
                "listing page {} has no div.c blocks",
                ctx.page
            )));
        }

        let post_sel = selector("div.c[id^=\"M_\"]")?;
        let pinned_sel = selector("span.kt")?;
        let cmt_sel = selector("span.cmt")?;
        let ctt_sel = selector("span.ctt")?;
        let ct_sel = selector("span.ct")?;
        let img_sel = selector("img.ib")?;
        let link_sel = selector("a[href]")?;

        let mut records = Vec::new();
        let mut continue_paging = true;

        for post in document.select(&post_sel) {
            let Some(id) = post.value().attr("id").and_then(|id| id.strip_prefix("M_")) else {
                continue;
            };

            let pinned = post.select(&pinned_sel).any(|e| element_text(&e).contains("置顶"));
            let retweet = post.select(&cmt_sel).any(|e| element_text(&e).contains("转发了"));

            let stamp = post
                .select(&ct_sel)
                .next()
                .map(|e| element_text(&e))
                .unwrap_or_default();
            let (time_text, tool) = match stamp.split_once("来自") {
                Some((time, tool)) => (time.trim().to_string(), tool.trim().to_string()),
                None => (stamp.trim().to_string(), String::new()),
            };
            let Some(publish_time) = parse_publish_time(&time_text, ctx.now) else {
                tracing::debug!("Skipping post {} with unreadable time '{}'", id, time_text);
                continue;
            };

            if publish_time < ctx.since_date {
                if pinned {
                    continue;
                }
                continue_paging = false;
                break;
            }
            if publish_time > ctx.end_date {
                continue;
            }
            if ctx.original_only && retweet {
                continue;
            }

            let content = post
                .select(&ctt_sel)
                .map(|e| element_text(&e))
                .collect::<Vec<_>>()
                .join(" ");

            let pictures: Vec<String> = post
                .select(&img_sel)
                .filter_map(|img| img.value().attr("src"))
                .map(|src| src.replace("/wap180/", "/large/"))
                .collect();
            let picture_group = if pictures.is_empty() {
                NO_MEDIA.to_string()
            } else {
                pictures.join(",")
            };

            let mut record = Record::new(id, ctx.account_id.clone(), content, publish_time);
            record.original = !retweet;
            record.publish_tool = tool;

            for link in post.select(&link_sel) {
                let text = element_text(&link);
                let count = bracket_count(&text);
                if text.starts_with('赞') {
                    record.up_num = count.unwrap_or(0);
                } else if text.starts_with("转发") {
                    record.retweet_num = count.unwrap_or(0);
                } else if text.starts_with("评论") {
                    record.comment_num = count.unwrap_or(0);
                }
            }

            let video = post
                .select(&link_sel)
                .filter_map(|a| a.value().attr("href"))
                .find(|href| href.contains("/video/"))
                .map(str::to_string)
                .unwrap_or_else(|| NO_MEDIA.to_string());

            let images = MediaRef::new(picture_group, MediaKind::Image);
            record.media_refs.push(if retweet {
                images.from_retweet()
            } else {
                images
            });
            record.media_refs.push(MediaRef::new(video, MediaKind::Video));

            records.push(record);
        }

        Ok(DecodedBatch::new(records, continue_paging))
    }
}
