use anyhow::{bail, Context, Result};
use reqwest::Client;
use std::path::Path;
use tracing::{debug, info};

use crate::api_types::ApiEvent;
use crate::models::RawEventRecord;

pub const UPSTREAM_DATA_URL: &str =
    "https://gamewith-tool.s3-ap-northeast-1.amazonaws.com/uma-musume/male_event_datas.js";

const UPSTREAM_DATA_HEADER: &str = "window.eventDatas['男'] = [";
const UPSTREAM_DATA_FOOTER: &str = "];";

/// Fetch the upstream feed over HTTP and decode it.
pub async fn fetch_upstream(client: &Client, url: &str) -> Result<Vec<RawEventRecord>> {
    let start = std::time::Instant::now();
    debug!("Fetching upstream feed - url={}", url);

    let resp = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Request failed for {}", url))?;
    let resp = resp
        .error_for_status()
        .with_context(|| format!("HTTP error for {}", url))?;

    // The S3 object is served without a charset; force UTF-8.
    let bytes = resp
        .bytes()
        .await
        .with_context(|| format!("Reading body of {}", url))?;
    let body = String::from_utf8_lossy(&bytes);

    let records = parse_upstream(&body).with_context(|| format!("Decoding feed from {}", url))?;
    info!(
        "Upstream fetch completed - duration={:.2}s, records={}",
        start.elapsed().as_secs_f32(),
        records.len()
    );
    Ok(records)
}

/// Read a previously downloaded feed (either the raw `.js` or a bare JSON array).
pub fn load_upstream_file(path: &Path) -> Result<Vec<RawEventRecord>> {
    let body = std::fs::read_to_string(path)
        .with_context(|| format!("Reading upstream file {}", path.display()))?;
    let records =
        parse_upstream(&body).with_context(|| format!("Decoding upstream file {}", path.display()))?;
    info!("Upstream file loaded - path={}, records={}", path.display(), records.len());
    Ok(records)
}

/// Strip the JS assignment wrapper and decode the array, keeping upstream order.
pub fn parse_upstream(body: &str) -> Result<Vec<RawEventRecord>> {
    let array = match body.find(UPSTREAM_DATA_HEADER) {
        Some(pos) => {
            let rest = &body[pos + UPSTREAM_DATA_HEADER.len()..];
            let Some(end) = rest.find(UPSTREAM_DATA_FOOTER) else {
                bail!("upstream feed has a header but no closing `{}`", UPSTREAM_DATA_FOOTER);
            };
            format!("[{}]", &rest[..end])
        }
        None => body.trim().to_string(),
    };

    let array = strip_trailing_commas(&array);
    let rows: Vec<ApiEvent> = serde_json::from_str(&array).context("upstream array is not valid JSON")?;
    debug!("Upstream rows decoded: {}", rows.len());

    Ok(rows.into_iter().map(RawEventRecord::from).collect())
}

/// Drop commas that directly precede `]` or `}`, leaving string literals untouched.
fn strip_trailing_commas(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in src.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            out.push(c);
            continue;
        }
        match c {
            '"' => in_string = true,
            ',' => {
                let next = src[i + 1..].chars().find(|c| !c.is_whitespace());
                if matches!(next, Some(']') | Some('}')) {
                    continue;
                }
            }
            _ => {}
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response on a local port and return its base URL.
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await.unwrap();
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/javascript\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn local_client() -> Client {
        Client::builder().no_proxy().build().unwrap()
    }

    #[tokio::test]
    async fn fetches_and_decodes_feed_over_http() {
        let body = "window.eventDatas['男'] = [\n{\"e\":\"初詣\",\"n\":\"共通\",\"c\":\"m\",\"choices\":[{\"n\":\"上\",\"t\":\"体力+10\"},]},\n];";
        let base = serve_once("200 OK", body).await;
        let records = fetch_upstream(&local_client(), &format!("{}/male_event_datas.js", base))
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event_name, "初詣");
        assert_eq!(records[0].choices[0].text, "体力+10");
    }

    #[tokio::test]
    async fn http_error_status_fails_the_fetch() {
        let base = serve_once("404 Not Found", "").await;
        let err = fetch_upstream(&local_client(), &format!("{}/missing.js", base))
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("HTTP error"));
    }

    #[test]
    fn parses_js_wrapped_feed_with_trailing_commas() {
        let body = r#"// generated
window.eventDatas['男'] = [
{"e":"ダンスレッスン","n":"スペシャルウィーク(新衣装)","c":"c","choices":[{"n":"上","t":"スピード+10[br]体力-5"},]},
{"e":"初詣","n":"共通","c":"m","choices":[]},
];
window.other = 1;"#;
        let records = parse_upstream(body).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].event_name, "ダンスレッスン");
        assert_eq!(records[0].chara_name, "スペシャルウィーク(新衣装)");
        assert_eq!(records[0].choices[0].text, "スピード+10[br]体力-5");
        assert_eq!(records[1].kind_tag, "m");
    }

    #[test]
    fn parses_bare_json_array() {
        let body = r#"[{"e":"A","n":"B","c":"x"}]"#;
        let records = parse_upstream(body).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].choices.is_empty());
        assert!(records[0].kind().is_none());
    }

    #[test]
    fn commas_inside_choice_text_survive() {
        let body = r#"[{"e":"A","n":"B","c":"c","choices":[{"n":"t","t":"x,]y, }z \"q,]\""},],},]"#;
        let records = parse_upstream(body).unwrap();
        assert_eq!(records[0].choices[0].text, "x,]y, }z \"q,]\"");
    }

    #[test]
    fn trailing_comma_stripping_only_touches_structure() {
        assert_eq!(strip_trailing_commas("[1, 2 ,\n]"), "[1, 2 \n]");
        assert_eq!(strip_trailing_commas(r#"{"a":"b,}",}"#), r#"{"a":"b,}"}"#);
        assert_eq!(strip_trailing_commas(r#"["\\",]"#), r#"["\\"]"#);
    }

    #[test]
    fn missing_footer_is_an_error() {
        let body = "window.eventDatas['男'] = [{\"e\":\"A\",\"n\":\"B\",\"c\":\"c\"}";
        assert!(parse_upstream(body).is_err());
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.json");
        std::fs::write(&path, r#"[{"e":"A","n":"B","c":"s","choices":[{"n":"t","t":"b"}]}]"#).unwrap();
        let records = load_upstream_file(&path).unwrap();
        assert_eq!(records[0].choices[0].title, "t");
    }
}
