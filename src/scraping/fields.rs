//! Semi-structured profile field extraction.
//!
//! Each field is located by the exact text of its heading; the heading's
//! wrapper's next sibling holds the content, read as line-broken text.
//! Absence is the normal case, not an error — profiles fill in whatever
//! subset they like — so each extractor returns a discriminated
//! [`FieldError`] and the collector proceeds with whatever succeeded.

use std::time::Duration;
use tracing::{debug, warn};

use crate::core::FieldMap;
use crate::driver::{Driver, DriverError, Query};

pub const ABOUT_ME: &str = "About me";
pub const ESSENTIALS: &str = "Essentials";
pub const BASICS: &str = "Basics";
pub const LIFESTYLE: &str = "Lifestyle";
pub const INTERESTS: &str = "Interests";
pub const ANTHEM: &str = "My anthem";

#[derive(Debug, thiserror::Error)]
pub enum FieldError {
    /// Heading not present, sibling missing, or lookup timed out — the
    /// field simply isn't there for this profile.
    #[error("section not present")]
    NotFound,
    /// The section exists but violates its structural shape.
    #[error("section malformed: {0}")]
    Malformed(String),
    /// Fatal driver failure; propagates out of the whole iteration.
    #[error(transparent)]
    Driver(DriverError),
}

impl From<DriverError> for FieldError {
    fn from(e: DriverError) -> Self {
        match e {
            // Bounded-wait overrun on a single field reads as field-absent.
            DriverError::Timeout(_) => FieldError::NotFound,
            fatal @ DriverError::Fatal(_) => FieldError::Driver(fatal),
        }
    }
}

/// Everything the six extractors produced for one profile. Fields that
/// failed or were absent keep their empty defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedFields {
    pub about_me: Option<String>,
    pub essentials: Vec<String>,
    pub basics: FieldMap,
    pub lifestyle: FieldMap,
    pub interests: Vec<String>,
    pub anthem: Option<String>,
}

/// Run all six extractors independently. A failure in any one never
/// prevents attempting the rest; only a fatal driver error aborts.
pub async fn extract_all(
    driver: &dyn Driver,
    timeout: Duration,
) -> Result<ExtractedFields, DriverError> {
    let mut out = ExtractedFields::default();

    match about_me(driver, timeout).await {
        Ok(text) => out.about_me = Some(text),
        Err(e) => note_miss(ABOUT_ME, e)?,
    }
    match essentials(driver, timeout).await {
        Ok(lines) => out.essentials = lines,
        Err(e) => note_miss(ESSENTIALS, e)?,
    }
    match basics(driver, timeout).await {
        Ok(map) => out.basics = map,
        Err(e) => note_miss(BASICS, e)?,
    }
    match lifestyle(driver, timeout).await {
        Ok(map) => out.lifestyle = map,
        Err(e) => note_miss(LIFESTYLE, e)?,
    }
    match interests(driver, timeout).await {
        Ok(lines) => out.interests = lines,
        Err(e) => note_miss(INTERESTS, e)?,
    }
    match anthem(driver, timeout).await {
        Ok(text) => out.anthem = Some(text),
        Err(e) => note_miss(ANTHEM, e)?,
    }

    Ok(out)
}

fn note_miss(label: &str, e: FieldError) -> Result<(), DriverError> {
    match e {
        FieldError::NotFound => {
            debug!("no '{}' section on this profile", label);
            Ok(())
        }
        FieldError::Malformed(why) => {
            warn!("'{}' section dropped: {}", label, why);
            Ok(())
        }
        FieldError::Driver(fatal) => Err(fatal),
    }
}

/// Raw text of the "About me" section.
pub async fn about_me(driver: &dyn Driver, timeout: Duration) -> Result<String, FieldError> {
    let text = section_text(driver, ABOUT_ME, timeout).await?;
    Ok(text.trim().to_string())
}

/// Ordered non-empty lines of "Essentials" (distance, job, school, …).
pub async fn essentials(
    driver: &dyn Driver,
    timeout: Duration,
) -> Result<Vec<String>, FieldError> {
    Ok(non_empty_lines(&section_text(driver, ESSENTIALS, timeout).await?))
}

/// "Basics" label→value pairs (height, family plans, …).
pub async fn basics(driver: &dyn Driver, timeout: Duration) -> Result<FieldMap, FieldError> {
    let lines = non_empty_lines(&section_text(driver, BASICS, timeout).await?);
    Ok(pair_lines(BASICS, &lines))
}

/// "Lifestyle" label→value pairs (exercise, diet, pets, …).
pub async fn lifestyle(driver: &dyn Driver, timeout: Duration) -> Result<FieldMap, FieldError> {
    let lines = non_empty_lines(&section_text(driver, LIFESTYLE, timeout).await?);
    Ok(pair_lines(LIFESTYLE, &lines))
}

/// Ordered non-empty lines of "Interests".
pub async fn interests(driver: &dyn Driver, timeout: Duration) -> Result<Vec<String>, FieldError> {
    Ok(non_empty_lines(&section_text(driver, INTERESTS, timeout).await?))
}

/// "My anthem": exactly two lines, joined as `"<title> by <author>"`.
pub async fn anthem(driver: &dyn Driver, timeout: Duration) -> Result<String, FieldError> {
    let lines = non_empty_lines(&section_text(driver, ANTHEM, timeout).await?);
    join_anthem(&lines)
}

/// Heading-by-label → sibling container → line-broken text.
async fn section_text(
    driver: &dyn Driver,
    label: &str,
    timeout: Duration,
) -> Result<String, FieldError> {
    let heading = driver
        .find_section(&Query::HeadingExact(label.to_string()), timeout)
        .await?
        .ok_or(FieldError::NotFound)?;
    let content = driver
        .find_sibling(heading, timeout)
        .await?
        .ok_or(FieldError::NotFound)?;
    driver
        .text(content, timeout)
        .await?
        .ok_or(FieldError::NotFound)
}

pub(crate) fn non_empty_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .map(|l| l.to_string())
        .collect()
}

/// Pair alternating key/value lines into an ordered map. An odd trailing
/// line is dropped with a log line, never an error.
pub(crate) fn pair_lines(label: &str, lines: &[String]) -> FieldMap {
    if lines.len() % 2 != 0 {
        warn!(
            "'{}' has {} lines; dropping unpaired trailing line '{}'",
            label,
            lines.len(),
            lines.last().map(String::as_str).unwrap_or_default()
        );
    }
    let mut map = FieldMap::new();
    for pair in lines.chunks_exact(2) {
        map.insert(
            pair[0].clone(),
            serde_json::Value::String(pair[1].clone()),
        );
    }
    map
}

pub(crate) fn join_anthem(lines: &[String]) -> Result<String, FieldError> {
    match lines {
        [title, author] => Ok(format!("{} by {}", title, author)),
        other => Err(FieldError::Malformed(format!(
            "expected 2 anthem lines (title, author), got {}",
            other.len()
        ))),
    }
}
