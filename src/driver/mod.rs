//! Automation Capability boundary.
//!
//! Everything that touches the live UI goes through the [`Driver`] trait:
//! the orchestrator, carousel walker, and field extractors only ever see
//! opaque [`Handle`]s and the closed [`Query`] vocabulary, so all selectors
//! live behind this seam and the whole engine can run against a mock.
//!
//! The real implementation is [`cdp::CdpDriver`] (chromiumoxide over a
//! Chromium-family browser); launch/discovery helpers live in [`browser`].

pub mod browser;
pub mod cdp;

use async_trait::async_trait;
use std::time::Duration;

/// Opaque reference to a located UI element. Valid until the next
/// [`Query::VisibleProfileSection`] lookup, which starts a fresh iteration
/// and invalidates prior handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(pub u64);

/// The closed vocabulary of element lookups the engine needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// The photo `section` of the currently visible card: `aria-label`
    /// contains `'s photos` and the section's grandparent is not
    /// `aria-hidden`. The UI keeps off-screen cards in the DOM, so the
    /// visibility check is what disambiguates.
    VisibleProfileSection,
    /// Wrapper of an `h2` whose trimmed text equals the label exactly.
    /// Resolves to the heading's parent so that [`Driver::find_sibling`]
    /// lands on the content container next to it.
    HeadingExact(String),
    /// Carousel slot `div[aria-label="Profile Photo {n}"]`, 1-based as the
    /// UI labels them.
    PhotoSlot(u32),
    /// The carousel's `button[aria-label="Next Photo"]`.
    NextPhotoControl,
}

/// Key events the engine sends (details toggle + accept/reject).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
}

impl Key {
    pub fn key_name(self) -> &'static str {
        match self {
            Key::ArrowUp => "ArrowUp",
            Key::ArrowDown => "ArrowDown",
            Key::ArrowLeft => "ArrowLeft",
            Key::ArrowRight => "ArrowRight",
        }
    }

    pub fn virtual_key_code(self) -> i64 {
        match self {
            Key::ArrowLeft => 37,
            Key::ArrowUp => 38,
            Key::ArrowRight => 39,
            Key::ArrowDown => 40,
        }
    }
}

/// Driver failures. Element-not-found is *not* an error — lookups return
/// `Ok(None)` for that; these two variants are the only failure modes.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// Bounded wait exceeded. Treated as field-not-found by extractors and
    /// as skip-this-iteration when it hits profile location.
    #[error("UI lookup timed out after {0:?}")]
    Timeout(Duration),
    /// The automation session itself is unusable. Terminates the harvest
    /// loop and triggers session teardown.
    #[error("browser session unusable: {0}")]
    Fatal(String),
}

pub type DriverResult<T> = Result<T, DriverError>;

/// Synchronous-in-spirit UI automation primitives. One shared timeout budget
/// is supplied per call; no two UI-mutating calls may be in flight at once
/// (the orchestrator is the sole driver of UI state).
#[async_trait]
pub trait Driver: Send + Sync {
    /// Locate a document-level element. Absent is `Ok(None)`.
    async fn find_section(&self, query: &Query, timeout: Duration) -> DriverResult<Option<Handle>>;

    /// Locate a descendant of a previously found element.
    async fn find_child(
        &self,
        of: Handle,
        query: &Query,
        timeout: Duration,
    ) -> DriverResult<Option<Handle>>;

    /// Next structural sibling element.
    async fn find_sibling(&self, of: Handle, timeout: Duration) -> DriverResult<Option<Handle>>;

    /// Attribute value, `Ok(None)` when the attribute or element is gone.
    async fn attribute(
        &self,
        el: Handle,
        name: &str,
        timeout: Duration,
    ) -> DriverResult<Option<String>>;

    /// Rendered text content (line-broken like the UI shows it). `Ok(None)`
    /// when the element went stale.
    async fn text(&self, el: Handle, timeout: Duration) -> DriverResult<Option<String>>;

    /// Click an element. Returns `Ok(false)` when the element went stale
    /// between lookup and click — callers decide whether that ends a walk.
    async fn click(&self, el: Handle, timeout: Duration) -> DriverResult<bool>;

    /// Dispatch a keyboard event at the page level.
    async fn send_key(&self, key: Key, timeout: Duration) -> DriverResult<()>;

    /// Whether an element is enabled (stale elements count as disabled).
    async fn is_enabled(&self, el: Handle, timeout: Duration) -> DriverResult<bool>;
}
