//! Page rendering: turning a URL into a [`DocumentNode`] tree.
//!
//! A [`Renderer`] returns a [`RawDocument`], either markup or an
//! accessibility snapshot.  [`RawDocument::into_document`] is the one place
//! where renderer output is validated and converted.

mod file;
mod http;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use pagesift_dom::{DocumentNode, parse_accessibility, parse_markup};

pub use file::FileRenderer;
pub use http::HttpRenderer;

#[async_trait]
pub trait Renderer: Send + Sync {
    async fn fetch(&self, url: &Url, render_js: bool) -> Result<RawDocument, FetchError>;
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("navigation timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP {0}")]
    Status(u16),
    #[error("unsupported content type: {0}")]
    UnsupportedContent(String),
    #[error("malformed accessibility snapshot: {0}")]
    Snapshot(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Which representation a page arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentSource {
    Markup,
    AccessibilityTree,
}

/// What a renderer hands back, before validation.
#[derive(Debug, Clone)]
pub enum RawDocument {
    Markup(String),
    AccessibilityTree(Value),
}

impl RawDocument {
    pub fn source(&self) -> DocumentSource {
        match self {
            Self::Markup(_) => DocumentSource::Markup,
            Self::AccessibilityTree(_) => DocumentSource::AccessibilityTree,
        }
    }

    /// Validate and convert into the shared tree.
    pub fn into_document(self) -> Result<DocumentNode, FetchError> {
        match self {
            Self::Markup(html) => Ok(parse_markup(&html)),
            Self::AccessibilityTree(snapshot) => {
                parse_accessibility(&snapshot).map_err(|err| FetchError::Snapshot(err.to_string()))
            }
        }
    }
}

/// Parse a target URL, accepting only `http`, `https` and `file`.
pub fn parse_target(raw: &str) -> Result<Url, FetchError> {
    let url = Url::parse(raw.trim()).map_err(|err| FetchError::InvalidUrl(format!("{raw}: {err}")))?;
    match url.scheme() {
        "http" | "https" | "file" => Ok(url),
        other => Err(FetchError::InvalidUrl(format!("unsupported scheme `{other}`"))),
    }
}

/// Dispatches by scheme: `file://` to [`FileRenderer`], everything else to
/// [`HttpRenderer`].
pub struct RendererRouter {
    http: HttpRenderer,
    file: FileRenderer,
}

impl RendererRouter {
    pub fn new(http: HttpRenderer) -> Self {
        Self {
            http,
            file: FileRenderer,
        }
    }

    pub fn from_config(config: &pagesift_config::RendererConfig) -> Result<Self, FetchError> {
        Ok(Self::new(HttpRenderer::from_config(config)?))
    }
}

#[async_trait]
impl Renderer for RendererRouter {
    async fn fetch(&self, url: &Url, render_js: bool) -> Result<RawDocument, FetchError> {
        if url.scheme() == "file" {
            self.file.fetch(url, render_js).await
        } else {
            self.http.fetch(url, render_js).await
        }
    }
}
