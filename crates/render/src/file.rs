use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::{FetchError, RawDocument, Renderer};

/// Reads saved pages from disk.  `.json` files are accessibility snapshots,
/// anything else is markup.  `render_js` has no effect.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileRenderer;

#[async_trait]
impl Renderer for FileRenderer {
    async fn fetch(&self, url: &Url, _render_js: bool) -> Result<RawDocument, FetchError> {
        let path = url
            .to_file_path()
            .map_err(|()| FetchError::InvalidUrl(format!("not a local file url: {url}")))?;
        debug!(path = %path.display(), "reading page from disk");
        let body = tokio::fs::read_to_string(&path).await?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            let snapshot =
                serde_json::from_str(&body).map_err(|err| FetchError::Snapshot(err.to_string()))?;
            Ok(RawDocument::AccessibilityTree(snapshot))
        } else {
            Ok(RawDocument::Markup(body))
        }
    }
}
