//! Crawler coordinator - main harvest orchestration logic
//!
//! This module contains the main harvest loop that coordinates all aspects
//! of a run, including:
//! - Opening the store and recording the run
//! - Walking the discoverer target by target
//! - Fetching the detail page and its four category pages
//! - Extracting, normalizing and persisting one record per zip code
//! - Applying the per-target error policy

use crate::config::{config_fingerprint, Config, ErrorPolicy};
use crate::crawler::discover::{CrawlTarget, LinkDiscoverer};
use crate::crawler::fetcher::Fetcher;
use crate::crawler::page::{parse_selector, Page};
use crate::extract::table::locators_for;
use crate::extract::{default_locators, extract, FieldLocator, PageKind, PartialRecord};
use crate::record::normalize;
use crate::state::{RunPhase, TargetStage};
use crate::storage::{open_store, SqliteStore, Store};
use crate::HarvestError;
use scraper::Selector;
use std::path::Path;
use std::time::Instant;
use url::Url;

/// Counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Targets handed to the coordinator
    pub targets_seen: u64,
    /// Targets already in the store, not fetched
    pub skipped_existing: u64,
    /// Records written by this run
    pub persisted: u64,
    /// Targets skipped after an error (skip policy only)
    pub failed: u64,
}

/// What happened to a single target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetOutcome {
    AlreadyStored,
    Persisted,
}

/// Main harvest coordinator
///
/// Owns the configuration, the HTTP fetcher and the store for the lifetime
/// of one run.
pub struct Coordinator {
    config: Config,
    fetcher: Fetcher,
    store: SqliteStore,
    locators: Vec<FieldLocator>,
    menu_selector: Selector,
    phase: RunPhase,
}

impl Coordinator {
    /// Creates a new coordinator, opening the configured database
    ///
    /// # Arguments
    ///
    /// * `config` - The harvester configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(HarvestError)` - Failed to open the store or build the client
    pub fn new(config: Config) -> Result<Self, HarvestError> {
        let store = open_store(Path::new(&config.output.database_path))?;
        Self::with_store(config, store)
    }

    /// Creates a coordinator around an already opened store
    pub fn with_store(config: Config, store: SqliteStore) -> Result<Self, HarvestError> {
        let store = store.with_persisted_fields(config.crawler.persisted());
        let fetcher = Fetcher::new(&config.fetcher, &config.user_agent)?;
        let locators = default_locators()?;
        let menu_selector = parse_selector(&config.site.menu_selector)?;

        Ok(Self {
            config,
            fetcher,
            store,
            locators,
            menu_selector,
            phase: RunPhase::Init,
        })
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Runs a full harvest starting from the configured root page
    ///
    /// Discovery errors always end the run; per-target errors are handled
    /// according to `crawler.on-target-error`.
    pub async fn run(&mut self) -> Result<RunSummary, HarvestError> {
        let run_id = self.begin_run()?;
        let mut discoverer = LinkDiscoverer::new(&self.config.site)?;
        let mut summary = RunSummary::default();
        let start_time = Instant::now();

        let result = self
            .walk_discoverer(&mut discoverer, run_id, &mut summary, start_time)
            .await;
        self.finish_run(run_id, summary, result, start_time)
    }

    /// Processes a fixed list of targets instead of discovering them
    pub async fn run_targets<I>(&mut self, targets: I) -> Result<RunSummary, HarvestError>
    where
        I: IntoIterator<Item = CrawlTarget>,
    {
        let run_id = self.begin_run()?;
        let mut summary = RunSummary::default();
        let start_time = Instant::now();

        let mut result = Ok(());
        for (zip_index, target) in targets.into_iter().enumerate() {
            self.phase = RunPhase::Crawling {
                state_index: 0,
                zip_index,
            };
            if let Err(e) = self.handle_target(run_id, &target, &mut summary).await {
                result = Err(e);
                break;
            }
        }

        self.finish_run(run_id, summary, result, start_time)
    }

    fn begin_run(&mut self) -> Result<i64, HarvestError> {
        let config_hash = config_fingerprint(&self.config)?;
        let run_id = self.store.create_run(&config_hash)?;
        tracing::info!(
            "Starting run {} (config {})",
            run_id,
            &config_hash[..12.min(config_hash.len())]
        );
        self.phase = RunPhase::Crawling {
            state_index: 0,
            zip_index: 0,
        };
        Ok(run_id)
    }

    async fn walk_discoverer(
        &mut self,
        discoverer: &mut LinkDiscoverer,
        run_id: i64,
        summary: &mut RunSummary,
        start_time: Instant,
    ) -> Result<(), HarvestError> {
        while let Some(target) = discoverer.next_target(&self.fetcher).await? {
            let (state_index, zip_index) = discoverer.position();
            self.phase = RunPhase::Crawling {
                state_index,
                zip_index,
            };

            self.handle_target(run_id, &target, summary).await?;

            // Progress reporting every 25 targets
            if summary.targets_seen % 25 == 0 {
                tracing::info!(
                    "Progress: {} zip codes seen ({} written, {} already stored, {} failed), state {}/{} in {:?}",
                    summary.targets_seen,
                    summary.persisted,
                    summary.skipped_existing,
                    summary.failed,
                    state_index + 1,
                    discoverer.state_count().unwrap_or(0),
                    start_time.elapsed()
                );
            }
        }

        Ok(())
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        summary: RunSummary,
        result: Result<(), HarvestError>,
        start_time: Instant,
    ) -> Result<RunSummary, HarvestError> {
        match result {
            Ok(()) => {
                self.store
                    .complete_run(run_id, summary.targets_seen, summary.persisted)?;
                self.phase = RunPhase::Done;
                tracing::info!(
                    "Run {} completed: {} zip codes seen, {} written, {} already stored, {} failed in {:?}",
                    run_id,
                    summary.targets_seen,
                    summary.persisted,
                    summary.skipped_existing,
                    summary.failed,
                    start_time.elapsed()
                );
                Ok(summary)
            }
            Err(e) => {
                tracing::error!("Run {} failed at {}: {}", run_id, self.phase, e);
                if let Err(store_err) =
                    self.store
                        .fail_run(run_id, summary.targets_seen, summary.persisted)
                {
                    tracing::error!("Could not mark run {} as failed: {}", run_id, store_err);
                }
                Err(e)
            }
        }
    }

    /// Processes one target and applies the error policy to its outcome
    async fn handle_target(
        &mut self,
        run_id: i64,
        target: &CrawlTarget,
        summary: &mut RunSummary,
    ) -> Result<(), HarvestError> {
        summary.targets_seen += 1;
        let mut stage = TargetStage::SkipIfExists;

        let error = match self.process_target(target, &mut stage).await {
            Ok(TargetOutcome::AlreadyStored) => {
                summary.skipped_existing += 1;
                return Ok(());
            }
            Ok(TargetOutcome::Persisted) => {
                summary.persisted += 1;
                return Ok(());
            }
            Err(e) => e,
        };

        // A broken store cannot record failure markers either
        if matches!(error, HarvestError::Storage(_)) {
            return Err(error);
        }

        match self.config.crawler.on_target_error {
            ErrorPolicy::Abort => {
                tracing::error!("{} failed at {}: {}", target.zip_code, stage, error);
                Err(error)
            }
            ErrorPolicy::Skip => {
                tracing::warn!(
                    "Skipping {} after failure at {}: {}",
                    target.zip_code,
                    stage,
                    error
                );
                self.store
                    .record_failure(run_id, target, stage, &error.to_string())?;
                summary.failed += 1;
                Ok(())
            }
        }
    }

    /// Runs the per-target stages, keeping `stage` at the one in progress
    async fn process_target(
        &mut self,
        target: &CrawlTarget,
        stage: &mut TargetStage,
    ) -> Result<TargetOutcome, HarvestError> {
        *stage = TargetStage::SkipIfExists;
        let zip_code = target
            .zip_key()
            .ok_or_else(|| HarvestError::InvalidTarget(target.zip_code.clone()))?;

        if self.store.exists(zip_code)? {
            tracing::info!("{} already in database", target.zip_code);
            return Ok(TargetOutcome::AlreadyStored);
        }

        tracing::info!("Downloading statistics for {}", target);

        *stage = TargetStage::FetchDetail;
        let detail = self.fetcher.fetch_page(&target.detail_url).await?;

        *stage = TargetStage::Extract;
        let mut partial = self.extract_page(&detail, PageKind::Detail);

        *stage = TargetStage::ResolveMenuLinks;
        let category_links = self.menu_links(&detail)?;
        drop(detail);

        for (kind, url) in category_links {
            *stage = TargetStage::FetchCategory(kind);
            let page = self.fetcher.fetch_page(&url).await?;

            *stage = TargetStage::Extract;
            partial.merge(self.extract_page(&page, kind));
        }

        for (field, value) in partial.iter() {
            tracing::info!("{}: {}", field, value.unwrap_or("None"));
        }
        let missing = partial.missing();
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(|field| field.name()).collect();
            tracing::info!("{}: not found on site: {}", target.zip_code, names.join(", "));
        }

        *stage = TargetStage::Normalize;
        let record = normalize(&partial, target)?;
        if record.null_count() > 0 {
            tracing::info!(
                "{}: {} of {} statistics missing",
                target.zip_code,
                record.null_count(),
                crate::record::Field::ALL.len()
            );
        }

        *stage = TargetStage::Persist;
        if self.store.insert(&record)? {
            Ok(TargetOutcome::Persisted)
        } else {
            tracing::info!("{} was stored by another writer; keeping existing row", target.zip_code);
            Ok(TargetOutcome::AlreadyStored)
        }
    }

    fn extract_page(&self, page: &Page, kind: PageKind) -> PartialRecord {
        tracing::info!("Parsing {} page {}", kind, page.url());
        extract(page, &locators_for(&self.locators, kind))
    }

    /// Resolves the four category links from the detail page's menu
    ///
    /// # Errors
    ///
    /// `MissingLink` if the menu or any of its category links is absent.
    fn menu_links(&self, detail: &Page) -> Result<Vec<(PageKind, Url)>, HarvestError> {
        let menu = detail
            .select_first(&self.menu_selector)
            .ok_or_else(|| HarvestError::MissingLink {
                url: detail.url().to_string(),
                label: self.config.site.menu_selector.clone(),
            })?;

        PageKind::CATEGORIES
            .iter()
            .map(|kind| {
                let label = kind.menu_label().unwrap_or_default();
                detail
                    .link_by_text(menu, label)
                    .map(|url| (*kind, url))
                    .ok_or_else(|| HarvestError::MissingLink {
                        url: detail.url().to_string(),
                        label: label.to_string(),
                    })
            })
            .collect()
    }
}

/// Runs a complete harvest with the given configuration
///
/// # Returns
///
/// * `Ok(RunSummary)` - Every discovered zip code was handled
/// * `Err(HarvestError)` - The run stopped on a fatal error
pub async fn run_harvest(config: Config) -> Result<RunSummary, HarvestError> {
    let mut coordinator = Coordinator::new(config)?;
    coordinator.run().await
}
