//! Session orchestrator: runs the harvest loop, one profile per iteration.
//!
//! Iteration state machine:
//! locate profile → paginate carousel → open details → extract fields →
//! close details → allocate id → fetch images → persist record → decide →
//! advance. Failures are contained per the taxonomy: a locate miss skips
//! the iteration, a persistence failure abandons it (leaving an id gap),
//! and only a fatal driver failure ends the session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{carousel, fields};
use crate::core::{HarvestConfig, PhotoSlot, ProfileRecord};
use crate::decision::{Decision, DecisionStrategy};
use crate::driver::{Driver, DriverError, Handle, Key, Query};
use crate::storage::{IdAllocator, ImageFetcher, RecordStore};

/// All resolved delays and bounds, one shared lookup timeout included.
#[derive(Debug, Clone)]
pub struct Timings {
    pub lookup_timeout: Duration,
    pub photo_advance_delay: Duration,
    pub details_settle_delay: Duration,
    pub advance_delay: Duration,
    pub locate_retry_delay: Duration,
    pub max_carousel_length: usize,
}

impl Timings {
    pub fn from_config(cfg: &HarvestConfig) -> Self {
        Self {
            lookup_timeout: cfg.resolve_lookup_timeout(),
            photo_advance_delay: cfg.resolve_photo_advance_delay(),
            details_settle_delay: cfg.resolve_details_settle_delay(),
            advance_delay: cfg.resolve_advance_delay(),
            locate_retry_delay: cfg.resolve_locate_retry_delay(),
            max_carousel_length: cfg.resolve_max_carousel_length(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterationOutcome {
    /// Record persisted and decision applied.
    Harvested { id: u64, name: String },
    /// No unambiguous visible profile; retry after a short delay.
    SkippedNoProfile,
    /// Durable storage failed after (or during) allocation; the id, when
    /// one was issued, is left as a gap.
    Abandoned { id: Option<u64> },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub harvested: u64,
    pub skipped: u64,
    pub abandoned: u64,
}

pub struct Harvester {
    driver: Arc<dyn Driver>,
    fetcher: Arc<dyn ImageFetcher>,
    store: RecordStore,
    allocator: IdAllocator,
    strategy: DecisionStrategy,
    timings: Timings,
    interrupted: Arc<AtomicBool>,
}

impl Harvester {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        driver: Arc<dyn Driver>,
        fetcher: Arc<dyn ImageFetcher>,
        store: RecordStore,
        allocator: IdAllocator,
        strategy: DecisionStrategy,
        timings: Timings,
        interrupted: Arc<AtomicBool>,
    ) -> Self {
        Self {
            driver,
            fetcher,
            store,
            allocator,
            strategy,
            timings,
            interrupted,
        }
    }

    /// Run iterations until the profile limit is reached, the interrupt
    /// flag is set, or the driver fails fatally. The interrupt is only
    /// observed between iterations so the allocator/store pair is never
    /// left mid-update.
    pub async fn run(&mut self, limit: Option<u64>) -> Result<RunSummary, DriverError> {
        let mut remaining = limit;
        let mut summary = RunSummary::default();

        loop {
            if self.interrupted.load(Ordering::SeqCst) {
                info!("interrupt received; stopping between iterations");
                break;
            }
            if remaining == Some(0) {
                info!("profile limit reached");
                break;
            }

            match self.iterate().await? {
                IterationOutcome::Harvested { id, name } => {
                    info!("✅ harvested profile {} ({})", id, name);
                    summary.harvested += 1;
                    if let Some(n) = remaining.as_mut() {
                        *n -= 1;
                    }
                }
                IterationOutcome::SkippedNoProfile => {
                    warn!("no visible profile; retrying shortly");
                    summary.skipped += 1;
                    tokio::time::sleep(self.timings.locate_retry_delay).await;
                }
                IterationOutcome::Abandoned { id } => {
                    warn!(
                        "persistence failed; abandoning iteration (id gap: {:?})",
                        id
                    );
                    summary.abandoned += 1;
                }
            }
        }

        Ok(summary)
    }

    /// One full traversal iteration. Only `DriverError::Fatal` escapes;
    /// every other failure mode is folded into the outcome.
    pub async fn iterate(&mut self) -> Result<IterationOutcome, DriverError> {
        let t = self.timings.clone();

        // LocateProfile — a miss here is a recoverable skip.
        let section = match self
            .driver
            .find_section(&Query::VisibleProfileSection, t.lookup_timeout)
            .await
        {
            Ok(Some(section)) => section,
            Ok(None) => return Ok(IterationOutcome::SkippedNoProfile),
            Err(DriverError::Timeout(_)) => return Ok(IterationOutcome::SkippedNoProfile),
            Err(fatal) => return Err(fatal),
        };

        let Some(name) = self.profile_name(section).await? else {
            return Ok(IterationOutcome::SkippedNoProfile);
        };
        debug!("scraping visible profile: {}", name);

        // Paginate.
        let walk_params = carousel::WalkParams {
            lookup_timeout: t.lookup_timeout,
            advance_delay: t.photo_advance_delay,
            max_positions: t.max_carousel_length,
        };
        let urls = carousel::walk(self.driver.as_ref(), section, &walk_params).await?;
        let photos: Vec<PhotoSlot> = urls
            .into_iter()
            .enumerate()
            .map(|(index, url)| PhotoSlot { index, url })
            .collect();

        // ExtractFields, behind the details panel.
        self.toggle_details(Key::ArrowUp).await?;
        let extracted = fields::extract_all(self.driver.as_ref(), t.lookup_timeout).await;
        self.toggle_details(Key::ArrowDown).await?;
        let extracted = extracted?;

        // Allocate — durable before the id is used for any write below.
        let id = match self.allocator.allocate() {
            Ok(id) => id,
            Err(e) => {
                warn!("id allocation failed: {}", e);
                return Ok(IterationOutcome::Abandoned { id: None });
            }
        };

        // FetchImages — joins all attempts before we move on.
        self.fetcher.fetch(id, &photos).await;

        // Persist.
        let mut record = ProfileRecord::new(id, &name);
        record.about_me = extracted.about_me;
        record.essentials = extracted.essentials;
        record.basics = extracted.basics;
        record.lifestyle = extracted.lifestyle;
        record.interests = extracted.interests;
        record.anthem = extracted.anthem;
        record.photos = photos;

        if let Err(e) = self.store.put(&record) {
            warn!("record persistence failed for id {}: {}", id, e);
            return Ok(IterationOutcome::Abandoned { id: Some(id) });
        }

        // Decide, then Advance. Exactly one decision per processed profile.
        let key = match self.strategy.decide() {
            Decision::Like => Key::ArrowRight,
            Decision::Pass => Key::ArrowLeft,
        };
        self.send_key_tolerant(key).await?;
        tokio::time::sleep(t.advance_delay).await;

        Ok(IterationOutcome::Harvested { id, name })
    }

    /// Name comes from the section's `aria-label` of the form
    /// `"<name>'s photos"`. Anything else means we aren't looking at an
    /// unambiguous profile card.
    async fn profile_name(&self, section: Handle) -> Result<Option<String>, DriverError> {
        let label = match self
            .driver
            .attribute(section, "aria-label", self.timings.lookup_timeout)
            .await
        {
            Ok(Some(label)) => label,
            Ok(None) => return Ok(None),
            Err(DriverError::Timeout(_)) => return Ok(None),
            Err(fatal) => return Err(fatal),
        };
        match parse_profile_name(&label) {
            Some(name) => Ok(Some(name)),
            None => {
                debug!("unparsable section label '{}'", label);
                Ok(None)
            }
        }
    }

    async fn toggle_details(&self, key: Key) -> Result<(), DriverError> {
        self.send_key_tolerant(key).await?;
        tokio::time::sleep(self.timings.details_settle_delay).await;
        Ok(())
    }

    /// Key dispatch where a timeout is tolerated: the affected step degrades
    /// (fields read as absent, the card may not advance) but the session
    /// keeps going.
    async fn send_key_tolerant(&self, key: Key) -> Result<(), DriverError> {
        match self
            .driver
            .send_key(key, self.timings.lookup_timeout)
            .await
        {
            Ok(()) => Ok(()),
            Err(DriverError::Timeout(d)) => {
                warn!("{:?} key dispatch timed out after {:?}", key, d);
                Ok(())
            }
            Err(fatal) => Err(fatal),
        }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn allocator(&self) -> &IdAllocator {
        &self.allocator
    }
}

/// Extract the profile name from `"<name>'s photos"`.
pub fn parse_profile_name(aria_label: &str) -> Option<String> {
    static NAME_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = NAME_RE
        .get_or_init(|| regex::Regex::new(r"^(.+)'s photos$").expect("valid name regex"));
    re.captures(aria_label)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|n| !n.trim().is_empty())
}
