//! Integration tests for the harvester
//!
//! These tests serve weibo.cn-shaped pages from a wiremock server and run the
//! full pipeline: configuration, coordinator, decoder, writers and media
//! downloads. Pacing is configured so that no pause ever fires.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use weibo_harvest::config::{load_config, Config};
use weibo_harvest::crawler::{build_http_client, Coordinator, HttpSource};
use weibo_harvest::decoder::WeiboCnDecoder;
use weibo_harvest::output::SinkRegistry;
use weibo_harvest::storage::{SqliteStorage, Storage};
use weibo_harvest::targets::TargetList;
use weibo_harvest::HarvestError;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

/// Matches requests without a query string, i.e. the index page
struct NoQuery;

impl Match for NoQuery {
    fn matches(&self, request: &Request) -> bool {
        request.url.query().is_none()
    }
}

const COOKIE: &str = "SUB=integration";

fn index_html(id: &str, nickname: &str, pages: u64) -> String {
    format!(
        r#"<html><head><title>{nickname}的微博</title></head><body>
        <div class="u"><a href="/{id}/info">资料</a></div>
        <div class="tip2"><span class="tc">微博[4]</span><a href="/{id}/follow">关注[5]</a><a href="/{id}/fans">粉丝[6]</a></div>
        <form><input name="mp" type="hidden" value="{pages}"></form>
        </body></html>"#
    )
}

fn info_html(nickname: &str) -> String {
    format!(
        r#"<html><head><title>{nickname}的资料</title></head><body>
        <div class="c">header</div>
        </body></html>"#
    )
}

fn post_html(id: &str, time: &str, images: &[String]) -> String {
    let images: String = images
        .iter()
        .map(|src| format!(r#"<img src="{}" class="ib">"#, src))
        .collect();
    format!(
        r#"<div class="c" id="M_{id}"><span class="ctt">post {id}</span>{images}
        <a href="/attitude/{id}">赞[1]</a><a href="/repost/{id}">转发[2]</a><a href="/comment/{id}">评论[3]</a>
        <span class="ct">{time}&nbsp;来自网页</span></div>"#
    )
}

fn listing_html(posts: &[String]) -> String {
    format!(
        r#"<html><head><title>feed</title></head><body>{}<div class="c">pager</div></body></html>"#,
        posts.concat()
    )
}

const LOGIN_HTML: &str = "<html><head><title>登录 - 新浪微博</title></head><body></body></html>";

async fn mount_profile(server: &MockServer, id: &str, nickname: &str, pages: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/{}/profile", id)))
        .and(NoQuery)
        .and(header("cookie", COOKIE))
        .respond_with(ResponseTemplate::new(200).set_body_string(index_html(id, nickname, pages)))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/{}/info", id)))
        .respond_with(ResponseTemplate::new(200).set_body_string(info_html(nickname)))
        .mount(server)
        .await;
}

async fn mount_page(server: &MockServer, id: &str, page: u64, body: String, expected: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/{}/profile", id)))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(expected)
        .mount(server)
        .await;
}

/// Writes a configuration that never pauses and loads it back
fn write_config(dir: &Path, base_url: &str, user_id_list: &str, write_mode: &str) -> Config {
    write_config_with(dir, base_url, user_id_list, write_mode, "")
}

/// Same as [`write_config`], with `extra` appended to the file
fn write_config_with(
    dir: &Path,
    base_url: &str,
    user_id_list: &str,
    write_mode: &str,
    extra: &str,
) -> Config {
    let content = format!(
        r#"
[crawler]
user-id-list = {user_id_list}
since-date = "2024-01-01"
end-date = "2024-06-30 00:00"
random-wait-pages = [100, 100]
random-wait-seconds = [1, 1]
global-wait = [[1000, 1]]
base-url = "{base_url}"
request-timeout = 5

[auth]
cookie = "{COOKIE}"

[output]
output-dir = "{out}"
write-mode = {write_mode}
pic-download = true
file-download-timeout = [1, 2, 5]

[sqlite]
path = "{db}"

{extra}
"#,
        out = dir.join("out").display(),
        db = dir.join("out/weibodata.db").display(),
    );
    let config_path = dir.join("config.toml");
    std::fs::write(&config_path, content).unwrap();
    load_config(&config_path).unwrap()
}

fn coordinator(config: Config, targets: TargetList) -> Coordinator {
    let client = build_http_client(&config.crawler).unwrap();
    let source = Arc::new(HttpSource::new(client, config.auth.cookie.clone()));
    let registry = SinkRegistry::from_config(&config).unwrap();
    Coordinator::new(
        config,
        targets,
        source,
        Arc::new(WeiboCnDecoder::new()),
        registry,
    )
    .unwrap()
    .with_config_hash("test")
    .without_media_delay()
}

fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}

fn account_dir(dir: &Path, nickname: &str) -> PathBuf {
    dir.join("out").join(nickname)
}

#[tokio::test]
async fn test_full_harvest_stops_at_since_date() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_profile(&server, "1001", "测试号", 3).await;

    let page_one = listing_html(&[
        post_html("A1", "2024-05-02 09:00", &[]),
        post_html(
            "42",
            "2024-03-05 10:00",
            &[format!("{}/wap180/a.jpg", base), format!("{}/wap180/b.png", base)],
        ),
    ]);
    let page_two = listing_html(&[
        post_html("A1", "2024-05-02 09:00", &[]),
        post_html("B2", "2024-02-01 10:00", &[]),
        post_html("OLD", "2023-12-01 10:00", &[]),
    ]);
    mount_page(&server, "1001", 1, page_one, 1).await;
    mount_page(&server, "1001", 2, page_two, 1).await;
    // Page 3 lies entirely before the since-date and must never be requested
    mount_page(&server, "1001", 3, listing_html(&[]), 0).await;

    for name in ["a.jpg", "b.png"] {
        Mock::given(method("GET"))
            .and(path(format!("/large/{}", name)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(name.as_bytes().to_vec()))
            .expect(1)
            .mount(&server)
            .await;
    }

    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), &base, "[1001]", r#"["json", "txt", "sqlite"]"#);
    let targets = TargetList::from_config(&config.crawler, today()).unwrap();

    let summary = {
        let mut coordinator = coordinator(config, targets);
        coordinator.run().await.unwrap()
    };

    assert_eq!(summary.config_hash, "test");
    assert_eq!(summary.failed_count(), 0);
    let report = summary.reports().next().unwrap();
    assert_eq!(report.metadata.id, "1001");
    assert_eq!(report.metadata.nickname, "测试号");
    assert_eq!(report.metadata.post_count, 4);
    assert_eq!(report.pages_fetched, 3);
    assert_eq!(report.records_emitted, 3);
    assert_eq!(report.duplicates_dropped, 1);
    assert_eq!(report.media_saved, 2);
    assert_eq!(report.sink_failures, 0);
    assert_eq!(report.cursor.as_ref().unwrap().as_str(), "2024-06-30 00:00");

    // Pictures of a multi-image post are numbered and keep their own suffixes
    let pictures = account_dir(dir.path(), "测试号").join("img/original");
    assert_eq!(std::fs::read(pictures.join("20240305_42_1.jpg")).unwrap(), b"a.jpg");
    assert_eq!(std::fs::read(pictures.join("20240305_42_2.png")).unwrap(), b"b.png");

    let json: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(account_dir(dir.path(), "测试号").join("1001.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(json["user"]["nickname"], "测试号");
    let ids: Vec<&str> = json["weibo"]
        .as_array()
        .unwrap()
        .iter()
        .map(|w| w["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["A1", "42", "B2"]);

    let txt = std::fs::read_to_string(account_dir(dir.path(), "测试号").join("1001.txt")).unwrap();
    assert!(txt.contains("测试号"));
    assert!(txt.contains("post B2"));

    let storage = SqliteStorage::new(&dir.path().join("out/weibodata.db")).unwrap();
    assert_eq!(storage.count_records("1001").unwrap(), 3);
    assert_eq!(storage.get_user("1001").unwrap().unwrap().nickname, "测试号");
}

#[tokio::test]
async fn test_cursor_written_back_to_target_file() {
    let server = MockServer::start().await;
    mount_profile(&server, "1001", "测试号", 1).await;
    mount_page(
        &server,
        "1001",
        1,
        listing_html(&[post_html("A1", "2024-05-02 09:00", &[])]),
        1,
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let target_file = dir.path().join("targets.txt");
    std::fs::write(&target_file, "1001\n").unwrap();
    let config = write_config(
        dir.path(),
        &server.uri(),
        &format!("\"{}\"", target_file.display()),
        r#"["txt"]"#,
    );
    let targets = TargetList::from_config(&config.crawler, today()).unwrap();

    let mut coordinator = coordinator(config.clone(), targets);
    let summary = coordinator.run().await.unwrap();
    assert_eq!(summary.total_records(), 1);

    let content = std::fs::read_to_string(&target_file).unwrap();
    assert_eq!(content.trim(), "1001 测试号 2024-06-30 00:00");

    // The next run starts where this one stopped
    let reloaded = TargetList::from_config(&config.crawler, today()).unwrap();
    assert_eq!(
        reloaded.targets()[0].since_date,
        chrono::NaiveDate::from_ymd_opt(2024, 6, 30)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    );
}

#[tokio::test]
async fn test_login_wall_stops_the_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/1001/profile"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_HTML))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/1002/profile"))
        .respond_with(ResponseTemplate::new(200).set_body_string(index_html("1002", "next", 1)))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), &server.uri(), "[1001, 1002]", r#"["txt"]"#);
    let targets = TargetList::from_config(&config.crawler, today()).unwrap();

    let mut coordinator = coordinator(config, targets);
    let result = coordinator.run().await;

    assert!(matches!(result, Err(HarvestError::NotLoggedIn { .. })));
}

#[tokio::test]
async fn test_failed_account_does_not_stop_the_next() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/1001/profile"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;
    mount_profile(&server, "1002", "second", 1).await;
    mount_page(
        &server,
        "1002",
        1,
        listing_html(&[post_html("Z9", "2024-04-01 12:00", &[])]),
        1,
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), &server.uri(), "[1001, 1002]", r#"["json"]"#);
    let targets = TargetList::from_config(&config.crawler, today()).unwrap();

    let mut coordinator = coordinator(config, targets);
    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.accounts.len(), 2);
    assert_eq!(summary.failed_count(), 1);
    assert!(matches!(
        &summary.accounts[0].1,
        Err(HarvestError::FetchExhausted { attempts: 3, .. })
    ));
    assert_eq!(summary.total_records(), 1);
    assert!(account_dir(dir.path(), "second").join("1002.json").exists());
}

#[tokio::test]
async fn test_csv_and_post_writers() {
    let server = MockServer::start().await;
    mount_profile(&server, "1001", "测试号", 1).await;
    mount_page(
        &server,
        "1001",
        1,
        listing_html(&[
            post_html("A1", "2024-05-02 09:00", &[]),
            post_html("B2", "2024-04-01 08:30", &[]),
        ]),
        1,
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/collect"))
        .and(header("api-token", "tok"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let post_section = format!(
        "[post]\napi-url = \"{}/collect\"\napi-token = \"tok\"\nretries = 0\n",
        server.uri()
    );
    let config = write_config_with(
        dir.path(),
        &server.uri(),
        "[1001]",
        r#"["csv", "post"]"#,
        &post_section,
    );
    let targets = TargetList::from_config(&config.crawler, today()).unwrap();

    let mut coordinator = coordinator(config, targets);
    let summary = coordinator.run().await.unwrap();
    assert_eq!(summary.total_records(), 2);
    assert_eq!(summary.reports().next().unwrap().sink_failures, 0);

    let csv = std::fs::read_to_string(account_dir(dir.path(), "测试号").join("1001.csv")).unwrap();
    let lines: Vec<&str> = csv.split("\r\n").filter(|l| !l.is_empty()).collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("微博id,微博正文,"));
    assert!(lines[1].starts_with("A1,"));
    assert!(lines[1].contains("post A1"));
    assert!(lines[2].contains("2024-04-01 08:30"));

    let posted: Vec<_> = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == "/collect")
        .collect();
    let body: serde_json::Value = serde_json::from_slice(&posted[0].body).unwrap();
    assert_eq!(body["user"]["id"], "1001");
    let ids: Vec<&str> = body["weibo"]
        .as_array()
        .unwrap()
        .iter()
        .map(|w| w["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["A1", "B2"]);
}

#[tokio::test]
async fn test_unknown_writer_rejected_at_load() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    std::fs::write(
        &config_path,
        r#"
[crawler]
user-id-list = [1001]

[auth]
cookie = "x"

[output]
write-mode = ["mongo"]
"#,
    )
    .unwrap();

    assert!(load_config(&config_path).is_err());
}
