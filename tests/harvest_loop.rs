//! End-to-end harvest loop tests against a mocked UI driver.
//!
//! The mock models the swipe-card DOM at the `Driver` boundary: one visible
//! photo section, a carousel with a bounded number of enabled "next"
//! transitions, and a details panel that must be opened before headings
//! resolve — the same contract the live page presents.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use swipecrawl::core::PhotoSlot;
use swipecrawl::decision::DecisionStrategy;
use swipecrawl::driver::{Driver, DriverResult, Handle, Key, Query};
use swipecrawl::scraping::{carousel, fields, Harvester, IterationOutcome, Timings};
use swipecrawl::storage::images::image_path;
use swipecrawl::storage::{IdAllocator, ImageFetcher, RecordStore};

fn init_logger() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

// ─────────────────────────────────────────────────────────────────────────
// Mock driver
// ─────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum El {
    Section,
    PhotoSlot(u32),
    NextControl,
    HeadingWrapper(String),
    Content(String),
}

#[derive(Default)]
struct MockState {
    els: HashMap<u64, El>,
    next_handle: u64,
    /// `aria-label` of the visible section, `None` = no profile on screen.
    section_label: Option<String>,
    /// Per-position urls; `None` = slot present but style yields nothing.
    photos: Vec<Option<String>>,
    /// How many "next" clicks succeed before the control reports disabled.
    enabled_next_transitions: usize,
    next_clicks: usize,
    /// Heading label → content lines, visible only while details are open.
    sections: HashMap<String, Vec<String>>,
    details_open: bool,
    keys_sent: Vec<Key>,
}

struct MockDriver {
    state: Mutex<MockState>,
}

impl MockDriver {
    fn new(state: MockState) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(state),
        })
    }

    fn register(state: &mut MockState, el: El) -> Handle {
        let id = state.next_handle;
        state.next_handle += 1;
        state.els.insert(id, el);
        Handle(id)
    }

    fn keys_sent(&self) -> Vec<Key> {
        self.state.lock().unwrap().keys_sent.clone()
    }
}

#[async_trait]
impl Driver for MockDriver {
    async fn find_section(
        &self,
        query: &Query,
        _timeout: Duration,
    ) -> DriverResult<Option<Handle>> {
        let mut s = self.state.lock().unwrap();
        match query {
            Query::VisibleProfileSection => {
                if s.section_label.is_some() {
                    Ok(Some(Self::register(&mut s, El::Section)))
                } else {
                    Ok(None)
                }
            }
            Query::HeadingExact(label) => {
                if s.details_open && s.sections.contains_key(label) {
                    let el = El::HeadingWrapper(label.clone());
                    Ok(Some(Self::register(&mut s, el)))
                } else {
                    Ok(None)
                }
            }
            _ => Ok(None),
        }
    }

    async fn find_child(
        &self,
        of: Handle,
        query: &Query,
        _timeout: Duration,
    ) -> DriverResult<Option<Handle>> {
        let mut s = self.state.lock().unwrap();
        if !matches!(s.els.get(&of.0), Some(El::Section)) {
            return Ok(None);
        }
        match query {
            Query::PhotoSlot(n) => {
                if (*n as usize) <= s.photos.len() {
                    Ok(Some(Self::register(&mut s, El::PhotoSlot(*n))))
                } else {
                    Ok(None)
                }
            }
            Query::NextPhotoControl => {
                if s.photos.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(Self::register(&mut s, El::NextControl)))
                }
            }
            _ => Ok(None),
        }
    }

    async fn find_sibling(&self, of: Handle, _timeout: Duration) -> DriverResult<Option<Handle>> {
        let mut s = self.state.lock().unwrap();
        match s.els.get(&of.0).cloned() {
            Some(El::HeadingWrapper(label)) => {
                Ok(Some(Self::register(&mut s, El::Content(label))))
            }
            _ => Ok(None),
        }
    }

    async fn attribute(
        &self,
        el: Handle,
        name: &str,
        _timeout: Duration,
    ) -> DriverResult<Option<String>> {
        let s = self.state.lock().unwrap();
        match (s.els.get(&el.0), name) {
            (Some(El::Section), "aria-label") => Ok(s.section_label.clone()),
            (Some(El::PhotoSlot(n)), "style") => {
                let url = s.photos.get(*n as usize - 1).cloned().flatten();
                Ok(url.map(|u| format!(r#"background-image: url("{}");"#, u)))
            }
            _ => Ok(None),
        }
    }

    async fn text(&self, el: Handle, _timeout: Duration) -> DriverResult<Option<String>> {
        let s = self.state.lock().unwrap();
        match s.els.get(&el.0) {
            Some(El::Content(label)) => Ok(s.sections.get(label).map(|lines| lines.join("\n"))),
            _ => Ok(None),
        }
    }

    async fn click(&self, el: Handle, _timeout: Duration) -> DriverResult<bool> {
        let mut s = self.state.lock().unwrap();
        match s.els.get(&el.0) {
            Some(El::NextControl) => {
                if s.next_clicks < s.enabled_next_transitions {
                    s.next_clicks += 1;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Some(_) => Ok(true),
            None => Ok(false),
        }
    }

    async fn send_key(&self, key: Key, _timeout: Duration) -> DriverResult<()> {
        let mut s = self.state.lock().unwrap();
        match key {
            Key::ArrowUp => s.details_open = true,
            Key::ArrowDown => s.details_open = false,
            _ => {}
        }
        s.keys_sent.push(key);
        Ok(())
    }

    async fn is_enabled(&self, el: Handle, _timeout: Duration) -> DriverResult<bool> {
        let s = self.state.lock().unwrap();
        match s.els.get(&el.0) {
            Some(El::NextControl) => Ok(s.next_clicks < s.enabled_next_transitions),
            Some(_) => Ok(true),
            None => Ok(false),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Stub image fetcher — same on-disk layout, no network
// ─────────────────────────────────────────────────────────────────────────

struct StubImageFetcher {
    root: std::path::PathBuf,
}

#[async_trait]
impl ImageFetcher for StubImageFetcher {
    async fn fetch(&self, id: u64, photos: &[PhotoSlot]) {
        for slot in photos {
            if slot.url.is_none() {
                continue;
            }
            let dest = image_path(&self.root, id, slot.index);
            tokio::fs::create_dir_all(dest.parent().unwrap())
                .await
                .unwrap();
            tokio::fs::write(&dest, b"stub-bytes").await.unwrap();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Fixtures
// ─────────────────────────────────────────────────────────────────────────

fn fast_timings() -> Timings {
    Timings {
        lookup_timeout: Duration::from_secs(1),
        photo_advance_delay: Duration::ZERO,
        details_settle_delay: Duration::ZERO,
        advance_delay: Duration::ZERO,
        locate_retry_delay: Duration::ZERO,
        max_carousel_length: 64,
    }
}

fn alice_state() -> MockState {
    let mut sections = HashMap::new();
    sections.insert("About me".to_string(), vec!["Hi!".to_string()]);
    sections.insert(
        "Essentials".to_string(),
        vec!["2 km away".to_string(), "Engineer".to_string()],
    );
    MockState {
        section_label: Some("Alice's photos".to_string()),
        photos: vec![
            Some("http://a/1.jpg".to_string()),
            Some("http://a/2.jpg".to_string()),
        ],
        enabled_next_transitions: 1,
        sections,
        ..Default::default()
    }
}

fn harvester_for(
    driver: Arc<MockDriver>,
    data_dir: &std::path::Path,
    strategy: DecisionStrategy,
) -> Harvester {
    let store = RecordStore::new(data_dir.join("profiles.json"));
    let allocator = IdAllocator::open(data_dir.join(".last_id")).unwrap();
    let fetcher = Arc::new(StubImageFetcher {
        root: data_dir.join("images"),
    });
    Harvester::new(
        driver,
        fetcher,
        store,
        allocator,
        strategy,
        fast_timings(),
        Arc::new(AtomicBool::new(false)),
    )
}

// ─────────────────────────────────────────────────────────────────────────
// Carousel properties
// ─────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn carousel_yields_n_plus_one_entries_in_order() {
    init_logger();
    // 2 enabled transitions then a disabled control → exactly 3 positions.
    let driver = MockDriver::new(MockState {
        section_label: Some("Alice's photos".to_string()),
        photos: vec![
            Some("http://a/1.jpg".to_string()),
            Some("http://a/2.jpg".to_string()),
            Some("http://a/3.jpg".to_string()),
        ],
        enabled_next_transitions: 2,
        ..Default::default()
    });

    let section = driver
        .find_section(&Query::VisibleProfileSection, Duration::from_secs(1))
        .await
        .unwrap()
        .unwrap();
    let params = carousel::WalkParams {
        lookup_timeout: Duration::from_secs(1),
        advance_delay: Duration::ZERO,
        max_positions: 64,
    };
    let urls = carousel::walk(driver.as_ref(), section, &params)
        .await
        .unwrap();

    assert_eq!(
        urls,
        vec![
            Some("http://a/1.jpg".to_string()),
            Some("http://a/2.jpg".to_string()),
            Some("http://a/3.jpg".to_string()),
        ]
    );
}

#[tokio::test]
async fn carousel_records_failed_positions_as_none() {
    init_logger();
    let driver = MockDriver::new(MockState {
        section_label: Some("Alice's photos".to_string()),
        photos: vec![Some("http://a/1.jpg".to_string()), None],
        enabled_next_transitions: 1,
        ..Default::default()
    });

    let section = driver
        .find_section(&Query::VisibleProfileSection, Duration::from_secs(1))
        .await
        .unwrap()
        .unwrap();
    let params = carousel::WalkParams {
        lookup_timeout: Duration::from_secs(1),
        advance_delay: Duration::ZERO,
        max_positions: 64,
    };
    let urls = carousel::walk(driver.as_ref(), section, &params)
        .await
        .unwrap();

    // Position 2 failed but still occupies its slot.
    assert_eq!(urls.len(), 2);
    assert!(urls[0].is_some());
    assert!(urls[1].is_none());
}

#[tokio::test]
async fn carousel_ceiling_stops_a_runaway_walk() {
    init_logger();
    let driver = MockDriver::new(MockState {
        section_label: Some("Alice's photos".to_string()),
        photos: vec![Some("http://a/1.jpg".to_string()); 100],
        // Control never reports disabled.
        enabled_next_transitions: usize::MAX,
        ..Default::default()
    });

    let section = driver
        .find_section(&Query::VisibleProfileSection, Duration::from_secs(1))
        .await
        .unwrap()
        .unwrap();
    let params = carousel::WalkParams {
        lookup_timeout: Duration::from_secs(1),
        advance_delay: Duration::ZERO,
        max_positions: 5,
    };
    let urls = carousel::walk(driver.as_ref(), section, &params)
        .await
        .unwrap();

    assert_eq!(urls.len(), 5);
}

// ─────────────────────────────────────────────────────────────────────────
// Field extraction
// ─────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_sections_never_block_the_rest() {
    init_logger();
    let mut state = alice_state();
    state.details_open = true;
    let driver = MockDriver::new(state);

    let extracted = fields::extract_all(driver.as_ref(), Duration::from_secs(1))
        .await
        .unwrap();

    assert_eq!(extracted.about_me.as_deref(), Some("Hi!"));
    assert_eq!(extracted.essentials, vec!["2 km away", "Engineer"]);
    assert!(extracted.basics.is_empty());
    assert!(extracted.lifestyle.is_empty());
    assert!(extracted.interests.is_empty());
    assert!(extracted.anthem.is_none());
}

#[tokio::test]
async fn extraction_is_idempotent_on_an_unchanged_section() {
    init_logger();
    let mut state = alice_state();
    state.details_open = true;
    state.sections.insert(
        "Basics".to_string(),
        vec!["Height".into(), "172 cm".into()],
    );
    state.sections.insert(
        "My anthem".to_string(),
        vec!["Hero".into(), "Bonnie Tyler".into()],
    );
    let driver = MockDriver::new(state);

    let first = fields::extract_all(driver.as_ref(), Duration::from_secs(1))
        .await
        .unwrap();
    let second = fields::extract_all(driver.as_ref(), Duration::from_secs(1))
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(first.anthem.as_deref(), Some("Hero by Bonnie Tyler"));
    assert_eq!(first.basics["Height"], "172 cm");
}

#[tokio::test]
async fn malformed_anthem_is_dropped_not_fatal() {
    init_logger();
    let mut state = alice_state();
    state.details_open = true;
    state.sections.insert(
        "My anthem".to_string(),
        vec!["One line only".to_string()],
    );
    let driver = MockDriver::new(state);

    let extracted = fields::extract_all(driver.as_ref(), Duration::from_secs(1))
        .await
        .unwrap();
    assert!(extracted.anthem.is_none());
    assert_eq!(extracted.about_me.as_deref(), Some("Hi!"));
}

// ─────────────────────────────────────────────────────────────────────────
// End-to-end iterations
// ─────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn one_iteration_harvests_alice_end_to_end() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let driver = MockDriver::new(alice_state());
    let mut harvester = harvester_for(driver.clone(), dir.path(), DecisionStrategy::AlwaysPass);

    let outcome = harvester.iterate().await.unwrap();
    assert_eq!(
        outcome,
        IterationOutcome::Harvested {
            id: 0,
            name: "Alice".to_string()
        }
    );

    // Store key "0" carries the full record.
    let record = harvester.store().get(0).unwrap().unwrap();
    assert_eq!(record.name, "Alice");
    assert_eq!(record.about_me.as_deref(), Some("Hi!"));
    assert_eq!(record.essentials, vec!["2 km away", "Engineer"]);
    assert_eq!(record.photos.len(), 2);
    assert_eq!(record.photos[0].url.as_deref(), Some("http://a/1.jpg"));
    assert_eq!(record.photos[1].url.as_deref(), Some("http://a/2.jpg"));

    // Both image files landed under the id-0 directory.
    let images = dir.path().join("images");
    assert!(image_path(&images, 0, 0).exists());
    assert!(image_path(&images, 0, 1).exists());

    // Decision applied exactly once, after persistence: one ArrowLeft.
    let decisions: Vec<Key> = driver
        .keys_sent()
        .into_iter()
        .filter(|k| matches!(k, Key::ArrowLeft | Key::ArrowRight))
        .collect();
    assert_eq!(decisions, vec![Key::ArrowLeft]);

    // Details panel was opened and closed around extraction.
    let keys = driver.keys_sent();
    assert!(keys.contains(&Key::ArrowUp));
    assert!(keys.contains(&Key::ArrowDown));
}

#[tokio::test]
async fn run_honors_the_profile_limit() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let driver = MockDriver::new(alice_state());
    let mut harvester = harvester_for(driver, dir.path(), DecisionStrategy::AlwaysPass);

    let summary = harvester.run(Some(3)).await.unwrap();
    assert_eq!(summary.harvested, 3);
    assert_eq!(harvester.store().len().unwrap(), 3);
    // Ids 0,1,2 issued, no gaps.
    assert_eq!(harvester.allocator().last_id(), 2);
}

#[tokio::test]
async fn no_visible_profile_is_a_recoverable_skip() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let driver = MockDriver::new(MockState::default());
    let mut harvester = harvester_for(driver, dir.path(), DecisionStrategy::AlwaysPass);

    let outcome = harvester.iterate().await.unwrap();
    assert_eq!(outcome, IterationOutcome::SkippedNoProfile);
    assert!(harvester.store().is_empty().unwrap());
    // No id was burned on the skip.
    assert_eq!(harvester.allocator().last_id(), -1);
}

#[tokio::test]
async fn persistence_failure_leaves_an_id_gap_and_continues() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    // Make the store path unwritable by pointing it at a directory.
    std::fs::create_dir(dir.path().join("profiles.json")).unwrap();

    let driver = MockDriver::new(alice_state());
    let mut harvester = harvester_for(driver, dir.path(), DecisionStrategy::AlwaysPass);

    let outcome = harvester.iterate().await.unwrap();
    assert_eq!(outcome, IterationOutcome::Abandoned { id: Some(0) });
    // The allocated id is burned — a gap, never a future collision.
    assert_eq!(harvester.allocator().last_id(), 0);
}

#[tokio::test]
async fn interrupt_flag_stops_between_iterations() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let driver = MockDriver::new(alice_state());

    let store = RecordStore::new(dir.path().join("profiles.json"));
    let allocator = IdAllocator::open(dir.path().join(".last_id")).unwrap();
    let fetcher = Arc::new(StubImageFetcher {
        root: dir.path().join("images"),
    });
    let interrupted = Arc::new(AtomicBool::new(false));
    interrupted.store(true, Ordering::SeqCst);

    let mut harvester = Harvester::new(
        driver,
        fetcher,
        store,
        allocator,
        DecisionStrategy::AlwaysPass,
        fast_timings(),
        interrupted,
    );

    // Flag already set: the loop exits before touching the UI or storage.
    let summary = harvester.run(None).await.unwrap();
    assert_eq!(summary.harvested, 0);
    assert!(harvester.store().is_empty().unwrap());
}
