//! Network fetches: a plain GET, or a JS-rendering reader proxy that returns
//! the page's rendered HTML, with a direct-fetch fallback.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tracing::{debug, warn};
use url::Url;

use pagesift_config::RendererConfig;

use crate::{FetchError, RawDocument, Renderer};

/// Content types parsed as markup.
const MARKUP_TYPES: &[&str] = &["text/html", "application/xhtml+xml", "text/plain"];

#[derive(Debug, Clone)]
pub struct HttpRenderer {
    client: reqwest::Client,
    reader_proxy_url: Option<String>,
    max_download_bytes: usize,
    timeout: Duration,
    /// The proxy gets half the budget so a hung proxy still leaves room
    /// for the direct fetch.
    proxy_timeout: Duration,
}

impl HttpRenderer {
    pub fn from_config(config: &RendererConfig) -> Result<Self, FetchError> {
        let timeout = Duration::from_secs(config.navigation_timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|err| FetchError::Network(err.to_string()))?;
        let proxy = config.reader_proxy_url.trim();
        Ok(Self {
            client,
            reader_proxy_url: (!proxy.is_empty()).then(|| proxy.to_string()),
            max_download_bytes: config.max_download_bytes,
            timeout,
            proxy_timeout: timeout / 2,
        })
    }

    /// Fetch `url` through the reader proxy, which runs the page's scripts
    /// and returns the resulting HTML.
    async fn fetch_rendered(&self, proxy: &str, url: &Url) -> Result<String, FetchError> {
        let proxied = format!("{proxy}{url}");
        let response = self
            .client
            .get(&proxied)
            .header("X-Return-Format", "html")
            .header(ACCEPT, "text/html")
            .timeout(self.proxy_timeout)
            .send()
            .await
            .map_err(|err| self.map_reqwest(err))?;
        self.read_markup(response).await
    }

    async fn fetch_direct(&self, url: &Url) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url.as_str())
            .header(ACCEPT, "text/html")
            .send()
            .await
            .map_err(|err| self.map_reqwest(err))?;
        self.read_markup(response).await
    }

    async fn read_markup(&self, mut response: reqwest::Response) -> Result<String, FetchError> {
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();
        if !content_type.is_empty() && !MARKUP_TYPES.iter().any(|t| content_type.contains(t)) {
            return Err(FetchError::UnsupportedContent(content_type));
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|err| self.map_reqwest(err))? {
            let room = self.max_download_bytes.saturating_sub(body.len());
            if chunk.len() >= room {
                body.extend_from_slice(&chunk[..room]);
                debug!(limit = self.max_download_bytes, "download cap reached");
                break;
            }
            body.extend_from_slice(&chunk);
        }
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    fn map_reqwest(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn fetch(&self, url: &Url, render_js: bool) -> Result<RawDocument, FetchError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(format!(
                "expected an http(s) url, got {url}"
            )));
        }

        if render_js {
            if let Some(proxy) = &self.reader_proxy_url {
                match self.fetch_rendered(proxy, url).await {
                    Ok(html) if !html.trim().is_empty() => return Ok(RawDocument::Markup(html)),
                    Ok(_) => warn!(%url, "reader proxy returned an empty page, fetching directly"),
                    Err(err) => warn!(%url, error = %err, "reader proxy failed, fetching directly"),
                }
            }
        }

        debug!(%url, "direct fetch");
        self.fetch_direct(url).await.map(RawDocument::Markup)
    }
}
