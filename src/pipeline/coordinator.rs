use crate::app::ports::{HighscoreSink, HttpClientPort};
use crate::config::ScrapeConfig;
use crate::error::{FetchError, PageError, ParseError, Result, ScraperError};
use crate::infra::http_client::ReqwestHttp;
use crate::pipeline::aggregator::Highscores;
use crate::pipeline::ingestion::{Fetcher, RateLimiter, RetryPolicy};
use crate::pipeline::processing::{extract, parse};
use crate::types::PageIndex;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Idle,
    Running,
    Draining,
    Complete,
}

/// Fetch, extract and parse for a single page.
pub struct PagePipeline {
    fetcher: Fetcher,
    header_rows_to_skip: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSummary {
    pub page: PageIndex,
    pub records: usize,
    pub short_rows: usize,
    pub field_parse_rows: usize,
}

impl PagePipeline {
    pub fn new(fetcher: Fetcher, header_rows_to_skip: usize) -> Self {
        Self {
            fetcher,
            header_rows_to_skip,
        }
    }

    /// Run one page end to end and append its records into `aggregate`.
    pub async fn run(
        &self,
        page: PageIndex,
        cancel: &CancellationToken,
        aggregate: &Highscores,
    ) -> std::result::Result<PageSummary, PageError> {
        let raw = self
            .fetcher
            .fetch(page, cancel)
            .await
            .map_err(|source| PageError::Fetch { page, source })?;
        let fragment = extract(&raw).map_err(|source| PageError::Extract { page, source })?;
        drop(raw);
        let parsed = parse(&fragment, self.header_rows_to_skip)
            .map_err(|source| PageError::Parse { page, source })?;

        for skipped in &parsed.skipped {
            debug!("Row skipped on page {}: {}", page, skipped);
        }
        let short_rows = parsed
            .skipped
            .iter()
            .filter(|e| matches!(e, ParseError::ShortRow { .. }))
            .count();
        let field_parse_rows = parsed.skipped.len() - short_rows;
        let records = aggregate.append(page, parsed.records);
        counter!("hiscores_records_total").increment(records as u64);
        counter!("hiscores_rows_skipped_total", "reason" => "short_row")
            .increment(short_rows as u64);
        counter!("hiscores_rows_skipped_total", "reason" => "field_parse")
            .increment(field_parse_rows as u64);
        debug!(
            "Page {} contributed {} records ({} short rows, {} unparseable rows)",
            page, records, short_rows, field_parse_rows
        );
        Ok(PageSummary {
            page,
            records,
            short_rows,
            field_parse_rows,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageFailure {
    pub page: PageIndex,
    pub error: String,
}

/// Outcome of a completed run.
///
/// Skipped rows are counted by reason: `short_rows` had fewer than four
/// cells, `field_parse_rows` had a rank, name, level or xp that did not decode.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub state: RunState,
    pub pages_total: usize,
    pub pages_succeeded: usize,
    pub pages_failed: usize,
    pub pages_cancelled: usize,
    pub short_rows: usize,
    pub field_parse_rows: usize,
    pub records: usize,
    pub failures: Vec<PageFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn rows_skipped(&self) -> usize {
        self.short_rows + self.field_parse_rows
    }
}

/// Fans a page range out over a bounded set of concurrent page pipelines,
/// waits for all of them, and hands the aggregate to the sink.
///
/// A coordinator performs exactly one run.
pub struct Coordinator {
    pipeline: Arc<PagePipeline>,
    sink: Arc<dyn HighscoreSink>,
    max_concurrency: usize,
    table: u32,
    cancel: CancellationToken,
    state: watch::Sender<RunState>,
}

impl Coordinator {
    pub fn new(
        pipeline: PagePipeline,
        sink: Arc<dyn HighscoreSink>,
        max_concurrency: usize,
        table: u32,
    ) -> Self {
        let (state, _) = watch::channel(RunState::Idle);
        Self {
            pipeline: Arc::new(pipeline),
            sink,
            max_concurrency: max_concurrency.max(1),
            table,
            cancel: CancellationToken::new(),
            state,
        }
    }

    pub fn from_config(
        config: &ScrapeConfig,
        client: Arc<dyn HttpClientPort>,
        sink: Arc<dyn HighscoreSink>,
    ) -> Result<Self> {
        config.validate()?;
        let timeout = config.request_timeout();
        let mut fetcher = Fetcher::new(client, config.base_url.clone(), config.table, timeout)
            .with_retry(RetryPolicy::from(&config.retry));
        if let Some(rpm) = config.requests_per_min {
            fetcher = fetcher.with_rate_limiter(RateLimiter::new(rpm));
        }
        let pipeline = PagePipeline::new(fetcher, config.header_rows_to_skip);
        Ok(Self::new(pipeline, sink, config.max_concurrency, config.table))
    }

    /// Build a coordinator that talks to the network through reqwest.
    pub fn with_reqwest(config: &ScrapeConfig, sink: Arc<dyn HighscoreSink>) -> Result<Self> {
        let client = ReqwestHttp::new(&config.user_agent, config.request_timeout())?;
        Self::from_config(config, Arc::new(client), sink)
    }

    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change while `run` is in progress.
    pub fn subscribe_state(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    /// Token that stops spawning new pages and aborts in-flight fetches.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn transition(&self, next: RunState) {
        let previous = self.state.send_replace(next);
        info!("Coordinator {:?} -> {:?}", previous, next);
    }

    pub async fn run(&mut self, pages: impl IntoIterator<Item = PageIndex>) -> Result<RunReport> {
        let state = self.state();
        if state != RunState::Idle {
            return Err(ScraperError::InvalidState(format!(
                "coordinator already used (state {state:?})"
            )));
        }
        let run_id = Uuid::new_v4();
        let span = info_span!("run", run_id = %run_id, table = self.table);
        self.run_inner(run_id, pages.into_iter().collect()).instrument(span).await
    }

    async fn run_inner(&mut self, run_id: Uuid, pages: Vec<PageIndex>) -> Result<RunReport> {
        let started_at = Utc::now();
        self.transition(RunState::Running);
        info!(
            "Scraping {} pages with up to {} concurrent requests",
            pages.len(),
            self.max_concurrency
        );

        let aggregate = Arc::new(Highscores::new());
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut handles: Vec<(PageIndex, JoinHandle<std::result::Result<PageSummary, PageError>>)> =
            Vec::with_capacity(pages.len());
        let mut pages_cancelled = 0;

        for (i, &page) in pages.iter().enumerate() {
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                permit = semaphore.clone().acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                pages_cancelled = pages.len() - i;
                warn!("Run cancelled; {} pages not started", pages_cancelled);
                break;
            };

            let pipeline = self.pipeline.clone();
            let aggregate = aggregate.clone();
            let cancel = self.cancel.clone();
            let handle = tokio::spawn(
                async move {
                    let _permit = permit;
                    pipeline.run(page, &cancel, &aggregate).await
                }
                .instrument(info_span!("page", page = page.0)),
            );
            handles.push((page, handle));
        }

        self.transition(RunState::Draining);
        let mut pages_succeeded = 0;
        let mut pages_failed = 0;
        let mut short_rows = 0;
        let mut field_parse_rows = 0;
        let mut failures = Vec::new();

        for (page, handle) in handles {
            let outcome = handle.await.unwrap_or_else(|join_err| {
                Err(PageError::Aborted {
                    page,
                    message: join_err.to_string(),
                })
            });
            match outcome {
                Ok(summary) => {
                    pages_succeeded += 1;
                    short_rows += summary.short_rows;
                    field_parse_rows += summary.field_parse_rows;
                }
                Err(PageError::Fetch {
                    source: FetchError::Cancelled,
                    ..
                }) => {
                    pages_cancelled += 1;
                }
                Err(e) => {
                    warn!("{}", e);
                    counter!("hiscores_page_failures_total").increment(1);
                    pages_failed += 1;
                    failures.push(PageFailure {
                        page,
                        error: e.to_string(),
                    });
                }
            }
        }

        let aggregate = Arc::try_unwrap(aggregate)
            .map_err(|_| ScraperError::InvalidState("aggregate still shared after drain".into()))?;
        let finished = aggregate.finish(run_id, self.table);
        self.transition(RunState::Complete);

        let report = RunReport {
            run_id,
            state: self.state(),
            pages_total: pages.len(),
            pages_succeeded,
            pages_failed,
            pages_cancelled,
            short_rows,
            field_parse_rows,
            records: finished.len(),
            failures,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            "Run finished: {} records, {} pages ok, {} failed, {} cancelled, {} rows skipped",
            report.records,
            report.pages_succeeded,
            report.pages_failed,
            report.pages_cancelled,
            report.rows_skipped()
        );

        if let Err(source) = self.sink.accept(&finished).await {
            error!("Sink rejected {} records: {}", finished.len(), source);
            return Err(ScraperError::Sink {
                source,
                report: Box::new(report),
            });
        }
        Ok(report)
    }
}
