use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, error};

use super::signature::api_signature_now;
use super::Resource;
use crate::config::ApiConfig;
use crate::pipeline::{RecordSource, Window};

fn truncate_for_log(mut s: String, max_len: usize) -> String {
    if s.len() > max_len {
        let mut cut = max_len;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
        s.push('…');
    }
    s
}

/// Hotelbeds content API client for one resource.
///
/// Each request is authenticated with `Api-Key` plus an `X-Signature`
/// computed at send time, and asks for `fields=all` over an inclusive
/// `from`/`to` index range.
#[derive(Clone)]
pub struct HotelbedsProvider {
    base_url: String,
    http: Client,
    api_key: String,
    secret: String,
    language: String,
    resource: Resource,
}

impl HotelbedsProvider {
    pub fn new(cfg: &ApiConfig, resource: Resource) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("hotel-etl/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("build http client")?;

        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            http,
            api_key: cfg.key.clone(),
            secret: cfg.secret.clone(),
            language: cfg.language.clone(),
            resource,
        })
    }

    fn request(&self, window: Window) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, self.resource.path());
        let from = window.from.to_string();
        let to = window.to.to_string();
        let secondary = if self.resource.use_secondary_language() {
            "true"
        } else {
            "false"
        };
        self.http
            .get(url)
            .header("Api-Key", &self.api_key)
            .header("X-Signature", api_signature_now(&self.api_key, &self.secret))
            .header("Accept", "application/json")
            .query(&[
                ("fields", "all"),
                ("language", self.language.as_str()),
                ("from", from.as_str()),
                ("to", to.as_str()),
                ("useSecondaryLanguage", secondary),
            ])
    }

    /// Fetch one window and return the payload exactly as parsed.
    pub async fn fetch_window(&self, window: Window) -> Result<Value> {
        let resp = self
            .request(window)
            .send()
            .await
            .with_context(|| format!("{} request {window} failed", self.resource))?;
        let status = resp.status();
        if !status.is_success() {
            let body = truncate_for_log(resp.text().await.unwrap_or_default(), 2000);
            return Err(anyhow!(
                "{} request {window} failed: {status} body={body}",
                self.resource
            ));
        }
        let payload: Value = resp
            .json()
            .await
            .with_context(|| format!("{} response {window} is not JSON", self.resource))?;
        debug!(resource = %self.resource, %window, "payload received");
        Ok(payload)
    }
}

#[async_trait]
impl RecordSource for HotelbedsProvider {
    async fn fetch(&self, window: Window) -> Option<Value> {
        match self.fetch_window(window).await {
            Ok(payload) => Some(payload),
            Err(err) => {
                error!(resource = %self.resource, %window, error = %format!("{err:#}"), "failed to fetch data from API");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(base_url: &str) -> ApiConfig {
        ApiConfig {
            key: "k".into(),
            secret: "s".into(),
            base_url: base_url.into(),
            language: "ENG".into(),
            timeout_secs: 2,
        }
    }

    #[test]
    fn request_carries_window_and_auth() {
        let provider =
            HotelbedsProvider::new(&cfg("https://api.test/hotel-content-api/1.0/"), Resource::Hotels)
                .unwrap();
        let req = provider
            .request(Window { from: 101, to: 200 })
            .build()
            .unwrap();

        assert_eq!(req.url().path(), "/hotel-content-api/1.0/hotels");
        let query: Vec<(String, String)> = req.url().query_pairs().into_owned().collect();
        let get = |k: &str| {
            query
                .iter()
                .find(|(name, _)| name == k)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("fields"), Some("all"));
        assert_eq!(get("language"), Some("ENG"));
        assert_eq!(get("from"), Some("101"));
        assert_eq!(get("to"), Some("200"));
        assert_eq!(get("useSecondaryLanguage"), Some("false"));

        let headers = req.headers();
        assert_eq!(headers["Api-Key"], "k");
        assert_eq!(headers["Accept"], "application/json");
        assert_eq!(headers["X-Signature"].to_str().unwrap().len(), 64);
    }

    #[test]
    fn facilities_request_uses_secondary_language() {
        let provider =
            HotelbedsProvider::new(&cfg("https://api.test/base"), Resource::Facilities).unwrap();
        let req = provider.request(Window { from: 1, to: 5 }).build().unwrap();
        assert_eq!(req.url().path(), "/base/types/facilities");
        assert!(req
            .url()
            .query_pairs()
            .any(|(k, v)| k == "useSecondaryLanguage" && v == "true"));
    }

    #[tokio::test]
    async fn transport_failure_is_no_data() {
        // nothing listens on the discard port
        let provider = HotelbedsProvider::new(&cfg("http://127.0.0.1:9"), Resource::Hotels).unwrap();
        assert!(provider.fetch(Window { from: 1, to: 10 }).await.is_none());
    }

    /// Answer exactly one request with `status` and `body`, then close.
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut chunk = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = sock.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&chunk[..n]);
            }
            let resp = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            sock.write_all(resp.as_bytes()).await.unwrap();
            let _ = sock.shutdown().await;
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn error_status_is_no_data() {
        let base = serve_once("500 Internal Server Error", r#"{"error":"boom"}"#).await;
        let provider = HotelbedsProvider::new(&cfg(&base), Resource::Hotels).unwrap();
        assert!(provider.fetch(Window { from: 1, to: 2 }).await.is_none());
    }

    #[tokio::test]
    async fn success_returns_payload_unchanged() {
        let body = r#"{"to":2,"hotels":[{"code":1,"name":{"content":"Inn"}}],"from":1}"#;
        let base = serve_once("200 OK", body).await;
        let provider = HotelbedsProvider::new(&cfg(&base), Resource::Hotels).unwrap();

        let payload = provider.fetch(Window { from: 1, to: 2 }).await.unwrap();
        assert_eq!(serde_json::to_string(&payload).unwrap(), body);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = truncate_for_log("ééé".to_string(), 3);
        assert_eq!(s, "é…");
    }
}
