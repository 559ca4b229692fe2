//! Photo carousel pagination: drain the visible card's carousel into an
//! ordered sequence of optional image urls.
//!
//! The walker is the sole driver of UI state while it runs. Termination is
//! "next control absent or disabled", with a hard position ceiling as a
//! guard against a misdetected disabled state looping forever.

use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, warn};

use crate::driver::{Driver, DriverError, DriverResult, Handle, Query};

#[derive(Debug, Clone)]
pub struct WalkParams {
    pub lookup_timeout: Duration,
    /// Pause after each "next" click so the photo can load.
    pub advance_delay: Duration,
    /// Hard iteration ceiling.
    pub max_positions: usize,
}

/// Visit carousel positions starting at 1 and collect the image url of
/// each. A per-position lookup failure yields `None` for that position and
/// the walk continues; only a fatal driver error aborts it.
pub async fn walk(
    driver: &dyn Driver,
    section: Handle,
    params: &WalkParams,
) -> DriverResult<Vec<Option<String>>> {
    let mut urls: Vec<Option<String>> = Vec::new();
    let mut position: u32 = 1;

    loop {
        let url = match photo_url_at(driver, section, position, params.lookup_timeout).await {
            Ok(url) => url,
            Err(DriverError::Timeout(_)) => {
                debug!("photo lookup timed out at position {}", position);
                None
            }
            Err(fatal) => return Err(fatal),
        };
        if url.is_none() {
            debug!("no url extracted at carousel position {}", position);
        }
        urls.push(url);

        if urls.len() >= params.max_positions {
            warn!(
                "carousel ceiling of {} positions hit; next control may be misreporting enabled",
                params.max_positions
            );
            break;
        }

        let next = match driver
            .find_child(section, &Query::NextPhotoControl, params.lookup_timeout)
            .await
        {
            Ok(Some(next)) => next,
            Ok(None) => break,
            Err(DriverError::Timeout(_)) => break,
            Err(fatal) => return Err(fatal),
        };

        match driver.is_enabled(next, params.lookup_timeout).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(DriverError::Timeout(_)) => break,
            Err(fatal) => return Err(fatal),
        }

        match driver.click(next, params.lookup_timeout).await {
            Ok(true) => {}
            // Stale between enabled-check and click: the card changed under
            // us, stop the walk with what we have.
            Ok(false) => break,
            Err(DriverError::Timeout(_)) => break,
            Err(fatal) => return Err(fatal),
        }

        tokio::time::sleep(params.advance_delay).await;
        position += 1;
    }

    Ok(urls)
}

async fn photo_url_at(
    driver: &dyn Driver,
    section: Handle,
    position: u32,
    timeout: Duration,
) -> DriverResult<Option<String>> {
    let Some(slot) = driver
        .find_child(section, &Query::PhotoSlot(position), timeout)
        .await?
    else {
        return Ok(None);
    };
    let Some(style) = driver.attribute(slot, "style", timeout).await? else {
        return Ok(None);
    };
    Ok(parse_photo_url(&style))
}

/// Pull the image url out of a CSS `background-image` declaration and
/// unescape the HTML entities the attribute carries.
pub fn parse_photo_url(style: &str) -> Option<String> {
    static URL_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = URL_RE.get_or_init(|| {
        regex::Regex::new(r#"url\("?([^")]+)"?\)"#).expect("valid background-image regex")
    });
    let raw = re.captures(style)?.get(1)?.as_str();
    let url = unescape_entities(raw.trim_matches('"'));
    if url.is_empty() {
        None
    } else {
        Some(url)
    }
}

/// The handful of entities that show up in serialized style attributes.
fn unescape_entities(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
}
