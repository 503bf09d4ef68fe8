use crate::catalog::config::{
    CATALOG_ROOT, MAX_PAGES, RETRY_ATTEMPTS, RETRY_DELAY, SITE_ROOT, TAXONOMY_URL,
};
use crate::catalog::listings::{self, ListingParams, PageQuery};
use crate::catalog::normalize::{NormalizedRecord, normalize_page};
use crate::catalog::taxonomy::{self, CategoryDescriptor};
use crate::http::{RetryPolicy, build_client};
use crate::models::{PageReport, PipelineRequest, ProductsResponse};
use reqwest::Client;
use std::{io, sync::Arc, time::Instant};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub taxonomy_url: String,
    pub catalog_root: String,
    pub site_root: String,
    pub listing: ListingParams,
    pub max_pages: u32,
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            taxonomy_url: TAXONOMY_URL.as_str().to_string(),
            catalog_root: CATALOG_ROOT.as_str().to_string(),
            site_root: SITE_ROOT.as_str().to_string(),
            listing: ListingParams::default(),
            max_pages: MAX_PAGES,
            retry: RetryPolicy::new(RETRY_ATTEMPTS, RETRY_DELAY),
        }
    }
}

/// Receives each non-empty page as the run accumulates it.
pub trait RecordSink {
    fn write_page(&mut self, page: u32, records: &[NormalizedRecord]) -> io::Result<()>;
}

impl RecordSink for Vec<NormalizedRecord> {
    fn write_page(&mut self, _page: u32, records: &[NormalizedRecord]) -> io::Result<()> {
        self.extend_from_slice(records);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub category: CategoryDescriptor,
    pub pages: Vec<PageReport>,
    pub total: usize,
}

#[derive(Clone)]
pub struct Pipeline {
    pub config: Arc<PipelineConfig>,
    http: Client,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_client(config, build_client())
    }

    pub fn with_client(config: PipelineConfig, http: Client) -> Self {
        Self {
            config: Arc::new(config),
            http,
        }
    }

    pub fn from_env() -> Self {
        Self::new(PipelineConfig::default())
    }

    /// Downloads and flattens the category menu. Not retried: a missing
    /// menu ends the run.
    pub async fn load_catalog(&self) -> Result<Vec<CategoryDescriptor>, PipelineError> {
        let started = Instant::now();
        let tree = taxonomy::fetch_taxonomy(&self.http, &self.config.taxonomy_url)
            .await
            .map_err(|err| PipelineError::taxonomy_unavailable("fetch_taxonomy", err.to_string()))?;
        let catalog = taxonomy::flatten(&tree);
        crate::metrics::stage_elapsed("fetch_taxonomy", started.elapsed().as_millis());
        info!(target = "wb.pipeline", categories = catalog.len(), "taxonomy_loaded");
        Ok(catalog)
    }

    /// Resolves `url` against a fresh copy of the menu. Returns the match and
    /// the number of categories it was chosen from.
    pub async fn resolve_category(
        &self,
        url: &str,
    ) -> Result<(CategoryDescriptor, usize), PipelineError> {
        let catalog = self.load_catalog().await?;
        let category = taxonomy::resolve(url, &self.config.site_root, &catalog)
            .cloned()
            .ok_or_else(|| {
                PipelineError::category_not_found(
                    "resolve_category",
                    format!("no catalog section matches `{url}`; remove extra filters from the link"),
                )
            })?;
        Ok((category, catalog.len()))
    }

    pub async fn run(&self, request: &PipelineRequest) -> Result<ProductsResponse, PipelineError> {
        let mut records = Vec::new();
        let summary = self.run_into(request, &mut records).await?;
        Ok(ProductsResponse {
            run_id: Uuid::new_v4().to_string(),
            category: summary.category,
            pages: summary.pages,
            total: summary.total,
            records,
        })
    }

    /// Resolves the category, then pulls pages in order until one comes back
    /// empty or `max_pages` is reached. Every non-empty page goes to `sink`.
    pub async fn run_into<S: RecordSink>(
        &self,
        request: &PipelineRequest,
        sink: &mut S,
    ) -> Result<RunSummary, PipelineError> {
        request
            .validate()
            .map_err(|field| PipelineError::invalid_request("validate_request", field))?;

        let (category, _) = self.resolve_category(&request.url).await?;
        let (shard, query) = listing_target(&category)?;

        let mut pages = Vec::new();
        let mut total = 0usize;
        for page in 1..=self.config.max_pages {
            let started = Instant::now();
            let page_query = PageQuery {
                page,
                shard,
                query,
                low_price: request.low_price,
                top_price: request.top_price,
                discount: request.discount,
            };
            let body = listings::fetch_page(
                &self.http,
                &self.config.catalog_root,
                &self.config.listing,
                &page_query,
                self.config.retry,
            )
            .await
            .map_err(|err| {
                PipelineError::upstream_failed(
                    "fetch_page",
                    format!("page {page} failed after {} attempts: {}", err.attempts, err.last),
                )
            })?;

            let records = normalize_page(&body, &self.config.site_root);
            let elapsed_ms = started.elapsed().as_millis();
            crate::metrics::stage_elapsed("fetch_page", elapsed_ms);
            pages.push(PageReport::new(page, records.len(), elapsed_ms));
            info!(target = "wb.pipeline", page, added = records.len(), "page_collected");

            if records.is_empty() {
                break;
            }
            sink.write_page(page, &records)
                .map_err(|err| PipelineError::from_sink("write_records", err))?;
            total += records.len();
        }

        if total == 0 {
            warn!(target = "wb.pipeline", category = %category.name, "nothing_found");
        }
        info!(
            target = "wb.pipeline",
            category = %category.name,
            pages = pages.len(),
            total,
            "run_complete"
        );
        Ok(RunSummary {
            category,
            pages,
            total,
        })
    }
}

fn listing_target(category: &CategoryDescriptor) -> Result<(&str, &str), PipelineError> {
    let missing = |field: &str| {
        PipelineError::category_malformed(
            "resolve_category",
            format!("category `{}` has no {field}", category.name),
        )
    };
    let shard = category
        .shard
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| missing("shard"))?;
    let query = category
        .query_suffix
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| missing("query"))?;
    Ok((shard, query))
}

#[derive(Debug, Error)]
#[error("stage `{stage}` failed: {message}")]
pub struct PipelineError {
    stage: &'static str,
    message: String,
    kind: PipelineErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineErrorKind {
    InvalidRequest,
    TaxonomyUnavailable,
    CategoryNotFound,
    CategoryMalformed,
    UpstreamRequestFailed,
    ResultWriteConflict,
    Unclassified,
}

impl PipelineErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::TaxonomyUnavailable => "taxonomy_unavailable",
            Self::CategoryNotFound => "category_not_found",
            Self::CategoryMalformed => "category_malformed",
            Self::UpstreamRequestFailed => "upstream_request_failed",
            Self::ResultWriteConflict => "result_write_conflict",
            Self::Unclassified => "unclassified",
        }
    }
}

impl PipelineError {
    fn new(kind: PipelineErrorKind, stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            kind,
        }
    }

    pub fn invalid_request(stage: &'static str, message: impl Into<String>) -> Self {
        Self::new(PipelineErrorKind::InvalidRequest, stage, message)
    }

    pub fn taxonomy_unavailable(stage: &'static str, message: impl Into<String>) -> Self {
        Self::new(PipelineErrorKind::TaxonomyUnavailable, stage, message)
    }

    pub fn category_not_found(stage: &'static str, message: impl Into<String>) -> Self {
        Self::new(PipelineErrorKind::CategoryNotFound, stage, message)
    }

    pub fn category_malformed(stage: &'static str, message: impl Into<String>) -> Self {
        Self::new(PipelineErrorKind::CategoryMalformed, stage, message)
    }

    pub fn upstream_failed(stage: &'static str, message: impl Into<String>) -> Self {
        Self::new(PipelineErrorKind::UpstreamRequestFailed, stage, message)
    }

    pub fn unclassified(stage: &'static str, message: impl Into<String>) -> Self {
        Self::new(PipelineErrorKind::Unclassified, stage, message)
    }

    /// A locked or read-only output target is a write conflict; any other
    /// sink failure keeps its message under `Unclassified`.
    pub fn from_sink(stage: &'static str, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied | io::ErrorKind::WouldBlock => Self::new(
                PipelineErrorKind::ResultWriteConflict,
                stage,
                format!("output target is locked by another process: {err}"),
            ),
            _ => Self::unclassified(stage, err.to_string()),
        }
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    pub fn kind(&self) -> PipelineErrorKind {
        self.kind
    }

    pub fn detail(&self) -> &str {
        &self.message
    }
}
