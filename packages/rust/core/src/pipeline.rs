//! End-to-end analysis pipeline: URL → profile → competitors → report.
//!
//! Stages run in a strict order. Competitor search and deep scraping fan out
//! concurrently; everything else is sequential. Progress goes to a single
//! [`ProgressSink`], and a failed run always ends with an `error` event.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use futures::StreamExt;
use futures::stream;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use compintel_crawler::{CommandDocumentParser, FirecrawlFetcher, HttpFetcher};
use compintel_search::{FirecrawlSearch, TavilySearch, competitor_queries, search_all};
use compintel_shared::{
    AppConfig, CompanyProfile, CompetitorCandidate, CompetitorRawData, CompintelError,
    ContentFetcher, DefaultsConfig, DocumentParser, EventKind, NoopDocumentParser, Notifier,
    ProgressEvent, ProgressSink, ReasoningEngine, Report, ReportStore, Result, ScrapeBackend,
    SearchBackend, SearchHit, SearchProvider, Stage, expand_home, resolve_api_key,
};
use compintel_storage::Storage;

use crate::llm::OpenRouterClient;
use crate::notify::ResendNotifier;
use crate::scoring::{
    ANALYSIS_CHAR_BUDGET, HOMEPAGE_CHAR_LIMIT, PAGE_CHAR_LIMIT, PDF_CHAR_LIMIT, TARGET_CHAR_LIMIT,
    truncate_chars,
};
use crate::{delivery, prompts, scoring};

// ---------------------------------------------------------------------------
// Services and options
// ---------------------------------------------------------------------------

/// The external collaborators a run talks to, built once and shared.
#[derive(Clone)]
pub struct Services {
    pub fetcher: Arc<dyn ContentFetcher>,
    pub search: Arc<dyn SearchProvider>,
    pub documents: Arc<dyn DocumentParser>,
    pub reasoning: Arc<dyn ReasoningEngine>,
    pub store: Arc<dyn ReportStore>,
    pub notifier: Option<Arc<dyn Notifier>>,
}

impl Services {
    /// Build the configured bindings. Email delivery is left out when the
    /// Resend key is not set.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let call_timeout = Duration::from_secs(config.defaults.call_timeout_secs);
        let document_timeout = Duration::from_secs(config.defaults.document_timeout_secs);
        let scraping = &config.scraping;

        let fetcher: Arc<dyn ContentFetcher> = match scraping.backend {
            ScrapeBackend::Http => Arc::new(
                HttpFetcher::new(call_timeout)?.allow_private_hosts(scraping.allow_private_hosts),
            ),
            ScrapeBackend::Firecrawl => {
                let key = resolve_api_key(&scraping.firecrawl_api_key_env, "Firecrawl")?;
                Arc::new(FirecrawlFetcher::new(
                    key,
                    &scraping.firecrawl_base_url,
                    call_timeout,
                )?)
            }
        };

        let search: Arc<dyn SearchProvider> = match config.search.provider {
            SearchBackend::Firecrawl => {
                let key = resolve_api_key(&scraping.firecrawl_api_key_env, "Firecrawl")?;
                Arc::new(FirecrawlSearch::new(
                    key,
                    &scraping.firecrawl_base_url,
                    call_timeout,
                )?)
            }
            SearchBackend::Tavily => {
                let key = resolve_api_key(&config.search.tavily_api_key_env, "Tavily")?;
                Arc::new(TavilySearch::new(
                    key,
                    &config.search.tavily_base_url,
                    call_timeout,
                )?)
            }
        };

        let documents: Arc<dyn DocumentParser> = if config.documents.enabled {
            Arc::new(
                CommandDocumentParser::new(
                    config.documents.command.clone(),
                    config.documents.args.clone(),
                    document_timeout,
                )?
                .allow_private_hosts(scraping.allow_private_hosts),
            )
        } else {
            Arc::new(NoopDocumentParser)
        };

        let reasoning: Arc<dyn ReasoningEngine> = Arc::new(OpenRouterClient::from_config(
            &config.openrouter,
            call_timeout,
        )?);

        let db_path = expand_home(&config.defaults.db_path)?;
        let store: Arc<dyn ReportStore> = Arc::new(Storage::open(&db_path).await?);

        let notifier: Option<Arc<dyn Notifier>> =
            match ResendNotifier::from_config(&config.email, call_timeout) {
                Ok(n) => Some(Arc::new(n) as Arc<dyn Notifier>),
                Err(e) => {
                    debug!(error = %e, "email delivery disabled");
                    None
                }
            };

        Ok(Self {
            fetcher,
            search,
            documents,
            reasoning,
            store,
            notifier,
        })
    }
}

/// Per-run options.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Send the finished report here. No notify stage when absent.
    pub recipient_email: Option<String>,
    pub max_competitors: usize,
    pub results_per_query: usize,
    /// Budget for each external call.
    pub call_timeout: Duration,
    /// Budget for a single PDF parse.
    pub document_timeout: Duration,
    /// Budget for the whole run.
    pub run_timeout: Duration,
    pub persist: bool,
    pub cancel: CancellationToken,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::from_config(&DefaultsConfig::default())
    }
}

impl RunOptions {
    pub fn from_config(defaults: &DefaultsConfig) -> Self {
        Self {
            recipient_email: None,
            max_competitors: defaults.max_competitors,
            results_per_query: defaults.results_per_query,
            call_timeout: Duration::from_secs(defaults.call_timeout_secs),
            document_timeout: Duration::from_secs(defaults.document_timeout_secs),
            run_timeout: Duration::from_secs(defaults.run_timeout_secs),
            persist: defaults.persist,
            cancel: CancellationToken::new(),
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug)]
pub struct PipelineRun {
    pub report: Report,
    /// Non-fatal problems, e.g. a failed report email.
    pub warnings: Vec<String>,
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Stage bookkeeping
// ---------------------------------------------------------------------------

/// Tracks the active stage so an overall timeout or cancellation can name it.
struct StageCursor(Mutex<Stage>);

impl StageCursor {
    fn new() -> Self {
        Self(Mutex::new(Stage::Scrape))
    }

    fn get(&self) -> Stage {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self, stage: Stage) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = stage;
    }

    /// Move to `stage`, failing if the run was cancelled.
    fn enter(&self, stage: Stage, cancel: &CancellationToken) -> Result<()> {
        self.set(stage);
        if cancel.is_cancelled() {
            return Err(CompintelError::Cancelled { stage });
        }
        debug!(%stage, "entering stage");
        Ok(())
    }
}

/// Wrap a stage failure. Cancellation passes through untouched.
fn stage_error(stage: Stage) -> impl FnOnce(CompintelError) -> CompintelError {
    move |e| match e {
        CompintelError::Cancelled { .. } => e,
        other => other.at_stage(stage),
    }
}

/// Fold a collaborator failure into the stage's own error kind. Timeouts and
/// cancellation keep their identity.
fn as_stage_failure(
    wrap: fn(String) -> CompintelError,
) -> impl Fn(CompintelError) -> CompintelError {
    move |e| match e {
        CompintelError::Timeout { .. } | CompintelError::Cancelled { .. } => e,
        other => wrap(other.to_string()),
    }
}

async fn with_timeout<T>(
    stage: Stage,
    limit: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| CompintelError::Timeout {
            stage,
            secs: limit.as_secs(),
        })?
}

fn event(kind: EventKind, detail: impl Into<String>) -> ProgressEvent {
    ProgressEvent::new(kind).with_detail(detail)
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline {
    services: Services,
}

impl Pipeline {
    pub fn new(services: Services) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Run every stage for `input_url`.
    ///
    /// On failure the sink receives a terminal `error` event carrying the
    /// failed stage before this returns. Once `done` is emitted the run
    /// succeeds: a failed, timed-out or cancelled email is only a warning.
    #[instrument(skip_all, fields(url = %input_url))]
    pub async fn run(
        &self,
        input_url: &str,
        options: &RunOptions,
        sink: &dyn ProgressSink,
    ) -> Result<PipelineRun> {
        let start = Instant::now();
        let cursor = StageCursor::new();

        info!(max_competitors = options.max_competitors, "starting pipeline");

        let outcome = tokio::select! {
            biased;
            _ = options.cancel.cancelled() => Err(CompintelError::Cancelled { stage: cursor.get() }),
            res = tokio::time::timeout(
                options.run_timeout,
                self.run_stages(input_url, options, sink, &cursor),
            ) => match res {
                Ok(res) => res,
                Err(_) => {
                    let stage = cursor.get();
                    Err(CompintelError::Timeout {
                        stage,
                        secs: options.run_timeout.as_secs(),
                    }
                    .at_stage(stage))
                }
            },
        };

        let mut report = match outcome {
            Ok(report) => report,
            Err(e) => {
                let stage = e.stage().unwrap_or_else(|| cursor.get());
                error!(%stage, error = %e, "pipeline failed");
                sink.emit(
                    event(EventKind::Error, e.to_string()).with_data(json!({ "stage": stage })),
                );
                return Err(e);
            }
        };

        // The report exists from here on; notify problems are warnings.
        sink.emit(
            event(EventKind::Done, "Analysis complete")
                .with_data(json!({ "reportId": report.id.to_string() })),
        );

        let mut warnings = Vec::new();
        if let Some(email) = options.recipient_email.as_deref() {
            if let Some(warning) = self.notify(&mut report, email, options, sink).await {
                warnings.push(warning);
            }
        }

        let elapsed = start.elapsed();
        info!(
            report_id = %report.id,
            competitors = report.competitors.len(),
            warnings = warnings.len(),
            elapsed_ms = elapsed.as_millis(),
            "pipeline complete"
        );
        Ok(PipelineRun {
            report,
            warnings,
            elapsed,
        })
    }

    /// Stages 1 to 7. Everything here is bounded by cancellation and the
    /// overall run timeout.
    async fn run_stages(
        &self,
        input_url: &str,
        options: &RunOptions,
        sink: &dyn ProgressSink,
        cursor: &StageCursor,
    ) -> Result<Report> {
        let cancel = &options.cancel;

        // --- Stage 1: Scrape target ---
        cursor.enter(Stage::Scrape, cancel)?;
        let source_url = scoring::canonical_url(input_url)
            .ok_or_else(|| CompintelError::validation(format!("invalid URL: {input_url:?}")))
            .map_err(stage_error(Stage::Scrape))?;
        let content = self
            .scrape_target(&source_url, options, sink)
            .await
            .map_err(stage_error(Stage::Scrape))?;

        // --- Stage 2: Extract profile ---
        cursor.enter(Stage::Extract, cancel)?;
        let profile = self
            .extract_profile(&content, options, sink)
            .await
            .map_err(stage_error(Stage::Extract))?;

        // --- Stage 3: Search ---
        cursor.enter(Stage::Search, cancel)?;
        let hits = self.search_competitors(&profile, options, sink).await;

        // --- Stage 4: Rank ---
        cursor.enter(Stage::Rank, cancel)?;
        let candidates = self
            .rank_competitors(&profile, &source_url, &hits, options, sink)
            .await
            .map_err(stage_error(Stage::Rank))?;

        // --- Stage 5: Deep scrape ---
        cursor.enter(Stage::DeepScrape, cancel)?;
        let raw = self.deep_scrape(&candidates, options, sink).await?;

        // --- Stage 6: Analyze ---
        cursor.enter(Stage::Analyze, cancel)?;
        let report = self
            .analyze(&source_url, &profile, &candidates, raw, options, sink)
            .await
            .map_err(stage_error(Stage::Analyze))?;

        // --- Stage 7: Persist ---
        if options.persist {
            cursor.enter(Stage::Persist, cancel)?;
            self.persist(&report, options, sink)
                .await
                .map_err(stage_error(Stage::Persist))?;
        }
        Ok(report)
    }

    #[instrument(skip_all, fields(url = %url))]
    async fn scrape_target(
        &self,
        url: &str,
        options: &RunOptions,
        sink: &dyn ProgressSink,
    ) -> Result<String> {
        sink.emit(event(EventKind::Scraping, format!("Scraping {url}...")));

        let page = with_timeout(
            Stage::Scrape,
            options.call_timeout,
            self.services.fetcher.fetch(url),
        )
        .await
        .map_err(|e| match e {
            CompintelError::Timeout { .. } => e,
            other => CompintelError::Scrape(format!("{url}: {other}")),
        })?;

        let text = page.text.trim();
        if text.is_empty() {
            return Err(CompintelError::Scrape(format!("no content at {url}")));
        }

        let text = truncate_chars(text, TARGET_CHAR_LIMIT);
        info!(chars = text.chars().count(), "target scraped");
        Ok(text.to_string())
    }

    #[instrument(skip_all)]
    async fn extract_profile(
        &self,
        content: &str,
        options: &RunOptions,
        sink: &dyn ProgressSink,
    ) -> Result<CompanyProfile> {
        sink.emit(event(EventKind::Extracting, "Analyzing company..."));

        let prompt = prompts::extraction_prompt(content);
        let raw = with_timeout(
            Stage::Extract,
            options.call_timeout,
            self.services.reasoning.complete(&prompt, None),
        )
        .await
        .map_err(as_stage_failure(CompintelError::Extraction))?;

        let profile =
            prompts::parse_profile(&raw).map_err(as_stage_failure(CompintelError::Extraction))?;

        info!(name = %profile.name, industry = %profile.industry, "profile extracted");
        sink.emit(
            event(EventKind::Profile, format!("Identified: {}", profile.name))
                .with_data(json!({ "profile": &profile })),
        );
        Ok(profile)
    }

    async fn search_competitors(
        &self,
        profile: &CompanyProfile,
        options: &RunOptions,
        sink: &dyn ProgressSink,
    ) -> Vec<SearchHit> {
        sink.emit(event(
            EventKind::Searching,
            format!("Finding competitors for {}...", profile.name),
        ));

        let queries = competitor_queries(profile);
        search_all(
            self.services.search.as_ref(),
            &queries,
            options.results_per_query,
            options.call_timeout,
        )
        .await
    }

    #[instrument(skip_all, fields(hits = hits.len()))]
    async fn rank_competitors(
        &self,
        profile: &CompanyProfile,
        source_url: &str,
        hits: &[SearchHit],
        options: &RunOptions,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<CompetitorCandidate>> {
        sink.emit(event(EventKind::Ranking, "Ranking top competitors..."));

        let prompt = prompts::ranking_prompt(profile, hits, options.max_competitors);
        let raw = with_timeout(
            Stage::Rank,
            options.call_timeout,
            self.services.reasoning.complete(&prompt, None),
        )
        .await
        .map_err(as_stage_failure(CompintelError::Ranking))?;

        let ranked =
            prompts::parse_candidates(&raw).map_err(as_stage_failure(CompintelError::Ranking))?;
        let returned = ranked.len();
        let candidates =
            scoring::filter_candidates(ranked, profile, source_url, options.max_competitors);

        info!(returned, kept = candidates.len(), "competitors ranked");
        sink.emit(
            event(
                EventKind::CompetitorsFound,
                format!("Found {} competitors", candidates.len()),
            )
            .with_data(json!({ "competitors": &candidates })),
        );
        Ok(candidates)
    }

    #[instrument(skip_all, fields(competitors = candidates.len()))]
    async fn deep_scrape(
        &self,
        candidates: &[CompetitorCandidate],
        options: &RunOptions,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<CompetitorRawData>> {
        sink.emit(event(
            EventKind::DeepScraping,
            format!("Deep scraping {} competitors...", candidates.len()),
        ));
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let fanout = stream::iter(
            candidates
                .iter()
                .map(|c| self.scrape_competitor(c, options, sink)),
        )
        .buffered(options.max_competitors.max(1))
        .collect::<Vec<_>>();

        tokio::select! {
            raw = fanout => Ok(raw),
            _ = options.cancel.cancelled() => Err(CompintelError::Cancelled { stage: Stage::DeepScrape }),
        }
    }

    /// Fetch the four key pages of one competitor and at most one PDF.
    async fn scrape_competitor(
        &self,
        candidate: &CompetitorCandidate,
        options: &RunOptions,
        sink: &dyn ProgressSink,
    ) -> CompetitorRawData {
        sink.emit(
            event(
                EventKind::CompetitorScraping,
                format!("Scraping {}...", candidate.name),
            )
            .with_data(json!({ "name": candidate.name })),
        );

        let base = candidate.url.trim_end_matches('/');
        let (homepage, pricing, about, careers) = tokio::join!(
            self.fetch_best_effort(base.to_string(), options.call_timeout),
            self.fetch_best_effort(format!("{base}/pricing"), options.call_timeout),
            self.fetch_best_effort(format!("{base}/about"), options.call_timeout),
            self.fetch_best_effort(format!("{base}/careers"), options.call_timeout),
        );

        let pdf_content = self
            .parse_first_pdf(
                &[homepage.as_str(), pricing.as_str(), about.as_str(), careers.as_str()],
                options,
            )
            .await;

        sink.emit(
            event(EventKind::CompetitorDone, format!("{} scraped", candidate.name))
                .with_data(json!({ "name": candidate.name })),
        );

        CompetitorRawData {
            name: candidate.name.clone(),
            url: candidate.url.clone(),
            homepage: truncate_chars(&homepage, HOMEPAGE_CHAR_LIMIT).to_string(),
            pricing: truncate_chars(&pricing, PAGE_CHAR_LIMIT).to_string(),
            about: truncate_chars(&about, PAGE_CHAR_LIMIT).to_string(),
            careers: truncate_chars(&careers, PAGE_CHAR_LIMIT).to_string(),
            pdf_content,
        }
    }

    async fn fetch_best_effort(&self, url: String, limit: Duration) -> String {
        match tokio::time::timeout(limit, self.services.fetcher.fetch(&url)).await {
            Ok(Ok(page)) => page.text,
            Ok(Err(e)) => {
                warn!(%url, error = %e, "sub-page fetch failed");
                String::new()
            }
            Err(_) => {
                warn!(%url, timeout_secs = limit.as_secs(), "sub-page fetch timed out");
                String::new()
            }
        }
    }

    async fn parse_first_pdf(&self, pages: &[&str], options: &RunOptions) -> Option<String> {
        let link = pages
            .iter()
            .flat_map(|page| compintel_markdown::pdf_links(page))
            .next()?;

        match tokio::time::timeout(
            options.document_timeout,
            self.services.documents.parse_pdf(&link),
        )
        .await
        {
            Ok(Some(text)) if !text.trim().is_empty() => {
                Some(truncate_chars(text.trim(), PDF_CHAR_LIMIT).to_string())
            }
            Ok(_) => None,
            Err(_) => {
                warn!(url = %link, "PDF parse timed out");
                None
            }
        }
    }

    #[instrument(skip_all, fields(competitors = candidates.len()))]
    async fn analyze(
        &self,
        source_url: &str,
        profile: &CompanyProfile,
        candidates: &[CompetitorCandidate],
        raw: Vec<CompetitorRawData>,
        options: &RunOptions,
        sink: &dyn ProgressSink,
    ) -> Result<Report> {
        sink.emit(event(EventKind::Analyzing, "Generating competitive analysis..."));

        let budgeted = scoring::budget_raw_data(raw, ANALYSIS_CHAR_BUDGET);
        let prompt = prompts::analysis_prompt(profile, &budgeted);
        let response = with_timeout(
            Stage::Analyze,
            options.call_timeout,
            self.services
                .reasoning
                .complete(&prompt, Some(prompts::analysis_system_prompt())),
        )
        .await
        .map_err(as_stage_failure(CompintelError::Analysis))?;

        let payload = prompts::parse_analysis(&response)
            .map_err(as_stage_failure(CompintelError::Analysis))?;
        let analyzed = payload.competitors.len();
        let report = scoring::assemble_report(source_url, profile, candidates, payload);

        if report.competitors.len() != analyzed {
            warn!(
                analyzed,
                kept = report.competitors.len(),
                "dropped analyses that did not match a scraped competitor"
            );
        }

        sink.emit(event(EventKind::AnalysisReady, "Analysis complete").with_data(json!({
            "analysis": {
                "competitors": &report.competitors,
                "marketIntelligence": &report.market_intelligence,
                "recommendations": &report.recommendations,
                "marketOverview": &report.market_overview,
            }
        })));
        Ok(report)
    }

    #[instrument(skip_all, fields(report_id = %report.id))]
    async fn persist(
        &self,
        report: &Report,
        options: &RunOptions,
        sink: &dyn ProgressSink,
    ) -> Result<()> {
        sink.emit(event(EventKind::Storing, "Saving report..."));

        with_timeout(
            Stage::Persist,
            options.call_timeout,
            self.services.store.save(report),
        )
        .await
        .map_err(as_stage_failure(CompintelError::Persistence))?;
        Ok(())
    }

    /// Email the report. Returns a warning instead of failing the run.
    async fn notify(
        &self,
        report: &mut Report,
        email: &str,
        options: &RunOptions,
        sink: &dyn ProgressSink,
    ) -> Option<String> {
        let Some(notifier) = self.services.notifier.as_deref() else {
            let warning = "email delivery is not configured; report was not sent".to_string();
            warn!("{warning}");
            sink.emit(event(EventKind::Warning, warning.clone()));
            return Some(warning);
        };

        sink.emit(event(EventKind::Emailing, format!("Sending report to {email}...")));

        let store = options.persist.then(|| self.services.store.as_ref());
        let send = tokio::time::timeout(
            options.call_timeout,
            delivery::send_report(notifier, store, report, email),
        );
        let outcome = tokio::select! {
            biased;
            _ = options.cancel.cancelled() => Err(CompintelError::Cancelled { stage: Stage::Notify }),
            res = send => res.unwrap_or_else(|_| {
                Err(CompintelError::Timeout {
                    stage: Stage::Notify,
                    secs: options.call_timeout.as_secs(),
                })
            }),
        };

        match outcome {
            Ok(()) => {
                sink.emit(event(EventKind::ReportSent, format!("Report sent to {email}")));
                None
            }
            Err(e) => {
                let warning = format!("report email failed: {e}");
                warn!(error = %e, "report email failed");
                sink.emit(
                    event(EventKind::Warning, warning.clone())
                        .with_data(json!({ "stage": Stage::Notify })),
                );
                Some(warning)
            }
        }
    }
}

/// Convenience wrapper: build a [`Pipeline`] and run it once.
pub async fn run_pipeline(
    services: Services,
    input_url: &str,
    options: &RunOptions,
    sink: &dyn ProgressSink,
) -> Result<PipelineRun> {
    Pipeline::new(services).run(input_url, options, sink).await
}
