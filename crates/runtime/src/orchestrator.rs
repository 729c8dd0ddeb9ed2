//! One extraction call from URL to [`ExtractionResult`].

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{Instrument, debug, info, instrument};
use uuid::Uuid;

use pagesift_config::{AppConfig, ExtractionConfig, Strategy};
use pagesift_dom::{
    DocumentNode, ExtractOptions, OutlineOptions, build_outline, extract_loose, extract_text,
    normalize, plain_text, render_snapshot, structured_elements, truncate_chars,
};
use pagesift_llm::{LlmRouter, Oracle};
use pagesift_render::{
    DocumentSource, FetchError, RawDocument, Renderer, RendererRouter, parse_target,
};

use crate::agentic::{AgenticOptions, AgenticSession};
use crate::prompts::single_pass_prompt;
use crate::selector::{Selection, select_sections};
use crate::synthesizer::synthesize;
use crate::{CallContext, DiagnosticSink, ExtractError, FileSink, NoopSink, Outcome};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub prompt: String,
    pub url: String,
    pub result: Outcome,
    pub correlation_id: Uuid,
    /// The strategy that actually ran (`auto` resolves to one of the others).
    pub strategy: Strategy,
}

/// A fetched page, converted and cleaned.
#[derive(Debug, Clone)]
pub struct LoadedPage {
    pub source: DocumentSource,
    pub document: DocumentNode,
}

/// Runs extractions.  Holds no per-call state; share it behind an `Arc`.
pub struct Extractor {
    renderer: Arc<dyn Renderer>,
    oracle: Arc<dyn Oracle>,
    options: ExtractionConfig,
    render_js: bool,
    navigation_timeout: Duration,
    sink: Arc<dyn DiagnosticSink>,
}

impl Extractor {
    pub fn new(
        renderer: Arc<dyn Renderer>,
        oracle: Arc<dyn Oracle>,
        options: ExtractionConfig,
    ) -> Self {
        Self {
            renderer,
            oracle,
            options,
            render_js: true,
            navigation_timeout: Duration::from_secs(30),
            sink: Arc::new(NoopSink),
        }
    }

    /// Production wiring: network/file renderer, configured oracle, and a
    /// file sink when diagnostics are enabled.
    pub fn from_config(config: &AppConfig) -> Result<Self, ExtractError> {
        config
            .validate()
            .map_err(|err| ExtractError::Configuration(err.to_string()))?;
        let renderer = RendererRouter::from_config(&config.renderer)
            .map_err(|err| ExtractError::Configuration(err.to_string()))?;
        let oracle = LlmRouter::from_config(&config.llm)?;

        let mut extractor = Self::new(
            Arc::new(renderer),
            Arc::new(oracle),
            config.extraction.clone(),
        )
        .with_render_js(config.renderer.render_js)
        .with_navigation_timeout(Duration::from_secs(config.renderer.navigation_timeout_secs));
        if config.diagnostics.enabled {
            extractor = extractor.with_sink(Arc::new(FileSink::new(&config.diagnostics.dir)));
        }
        Ok(extractor)
    }

    pub fn with_render_js(mut self, render_js: bool) -> Self {
        self.render_js = render_js;
        self
    }

    pub fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn options(&self) -> &ExtractionConfig {
        &self.options
    }

    /// A fresh context for one call, wired to this extractor's sink.
    pub fn context(&self) -> CallContext {
        CallContext::new().with_sink(self.sink.clone())
    }

    pub async fn extract(&self, prompt: &str, url: &str) -> Result<ExtractionResult, ExtractError> {
        self.extract_with(&self.context(), prompt, url).await
    }

    /// Run one extraction under `ctx`.  Cancelling `ctx` aborts whichever
    /// stage is active and discards partial results.
    pub async fn extract_with(
        &self,
        ctx: &CallContext,
        prompt: &str,
        url: &str,
    ) -> Result<ExtractionResult, ExtractError> {
        let outcome = self.run(ctx, prompt, url).instrument(ctx.span()).await;
        match &outcome {
            Ok(result) => info!(
                correlation_id = %ctx.correlation_id(),
                strategy = ?result.strategy,
                raw = result.result.is_raw(),
                "extraction complete"
            ),
            Err(err) => info!(
                correlation_id = %ctx.correlation_id(),
                status = ?err.status(),
                error = %err,
                "extraction failed"
            ),
        }
        outcome
    }

    async fn run(
        &self,
        ctx: &CallContext,
        prompt: &str,
        url: &str,
    ) -> Result<ExtractionResult, ExtractError> {
        info!(%url, prompt_len = prompt.len(), "extraction started");
        let page = self.load(ctx, url).await?;

        let strategy = self.resolve_strategy(&page.document);
        let result = match strategy {
            Strategy::SinglePass => self.single_pass(ctx, prompt, &page).await?,
            Strategy::Agentic => self.agentic(ctx, prompt, &page).await?,
            Strategy::TwoPass | Strategy::Auto => self.two_pass(ctx, prompt, &page).await?,
        };

        Ok(ExtractionResult {
            prompt: prompt.to_string(),
            url: url.to_string(),
            result,
            correlation_id: ctx.correlation_id(),
            strategy,
        })
    }

    /// Fetch under the navigation timeout, convert, and drop boilerplate
    /// subtrees.
    #[instrument(skip(self, ctx))]
    pub async fn load(&self, ctx: &CallContext, url: &str) -> Result<LoadedPage, ExtractError> {
        let raw = self.fetch(ctx, url).await?;
        let source = raw.source();
        let document = raw.into_document()?.prune(&self.options.excluded_tags);
        debug!(?source, nodes = document.node_count(), "page loaded");
        Ok(LoadedPage { source, document })
    }

    /// The renderer's output as-is, under the navigation timeout.
    pub async fn fetch(&self, ctx: &CallContext, url: &str) -> Result<RawDocument, ExtractError> {
        let target = parse_target(url)?;
        let fetch = tokio::time::timeout(
            self.navigation_timeout,
            self.renderer.fetch(&target, self.render_js),
        );
        let raw = ctx
            .guard(fetch)
            .await?
            .map_err(|_| FetchError::Timeout(self.navigation_timeout))??;
        Ok(raw)
    }

    fn resolve_strategy(&self, document: &DocumentNode) -> Strategy {
        match self.options.strategy {
            Strategy::Auto => {
                let chars = plain_text(document, &self.options.excluded_tags).chars().count();
                let resolved = if chars <= self.options.single_pass_max_chars {
                    Strategy::SinglePass
                } else {
                    Strategy::TwoPass
                };
                debug!(chars, ?resolved, "auto strategy resolved");
                resolved
            }
            other => other,
        }
    }

    /// Digest handed to the selector: the outline for markup, the
    /// normalized snapshot for accessibility trees.
    pub fn digest(&self, page: &LoadedPage) -> String {
        match page.source {
            DocumentSource::Markup => build_outline(
                &page.document,
                &OutlineOptions {
                    tags: &self.options.outline_tags,
                    excluded: &self.options.excluded_tags,
                    text_chars: self.options.outline_text_chars,
                    max_entries: self.options.outline_max_entries,
                },
            ),
            DocumentSource::AccessibilityTree => {
                let snapshot = render_snapshot(&normalize(&page.document));
                truncate_chars(&snapshot, self.options.snapshot_window_chars).to_string()
            }
        }
    }

    async fn two_pass(
        &self,
        ctx: &CallContext,
        prompt: &str,
        page: &LoadedPage,
    ) -> Result<Outcome, ExtractError> {
        let digest = self.digest(page);
        ctx.record("digest", &digest).await;

        let selection = select_sections(
            self.oracle.as_ref(),
            ctx,
            prompt,
            &digest,
            self.options.selection_mode,
        )
        .await?;

        let separators = ExtractOptions {
            item_separator: &self.options.item_separator,
            block_separator: &self.options.block_separator,
        };
        let candidate = match &selection {
            Selection::Identifiers(ids) => extract_text(&page.document, ids, separators),
            Selection::Hints(hints) => extract_loose(&page.document, hints, separators),
        };
        ctx.record("candidate", &candidate).await;
        info!(candidate_len = candidate.len(), "candidate text extracted");

        let elements = structured_elements(&page.document);
        synthesize(
            self.oracle.as_ref(),
            ctx,
            prompt,
            &candidate,
            &elements,
            self.options.max_structured_chars,
        )
        .await
    }

    async fn single_pass(
        &self,
        ctx: &CallContext,
        prompt: &str,
        page: &LoadedPage,
    ) -> Result<Outcome, ExtractError> {
        let text = plain_text(&page.document, &self.options.excluded_tags);
        let text = truncate_chars(&text, self.options.single_pass_max_chars);
        ctx.record("page_text", text).await;

        let reply = ctx
            .guard(self.oracle.complete(&single_pass_prompt(prompt, text)))
            .await??;
        ctx.record("single_pass_reply", &reply).await;
        Ok(Outcome::from_reply(&reply))
    }

    async fn agentic(
        &self,
        ctx: &CallContext,
        prompt: &str,
        page: &LoadedPage,
    ) -> Result<Outcome, ExtractError> {
        let lines = normalize(&page.document);
        let session = AgenticSession::new(
            self.oracle.as_ref(),
            ctx,
            &lines,
            AgenticOptions {
                max_attempts: self.options.max_attempts,
                initial_window_chars: self.options.snapshot_window_chars,
            },
        );
        session.run(prompt).await
    }
}
