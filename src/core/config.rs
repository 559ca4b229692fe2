use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// HarvestConfig — file-based config loader (swipecrawl.json) with env-var
// fallback. Every knob resolves as: JSON field → env var → built-in default.
// ---------------------------------------------------------------------------

/// Raw deserialized shape of `swipecrawl.json`. All fields optional; use the
/// `resolve_*` accessors instead of reading fields directly.
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct HarvestConfig {
    /// URL of the swipe-card page to drive.
    pub target_url: Option<String>,
    /// Stop after this many successfully persisted profiles. Unbounded when unset.
    pub profile_limit: Option<u64>,
    /// Shared bounded-wait budget for every single UI lookup, in ms.
    pub lookup_timeout_ms: Option<u64>,
    /// Pause after each carousel "next" click so the photo can load, in ms.
    pub photo_advance_delay_ms: Option<u64>,
    /// Pause after opening/closing the details panel, in ms.
    pub details_settle_delay_ms: Option<u64>,
    /// Pause after the accept/reject key so the next card can render, in ms.
    pub advance_delay_ms: Option<u64>,
    /// Pause before retrying when no visible profile was found, in ms.
    pub locate_retry_delay_ms: Option<u64>,
    /// Hard ceiling on carousel positions per profile. Guards against a
    /// misdetected "disabled" next control looping forever.
    pub max_carousel_length: Option<usize>,
    /// Directory holding the store file, allocator file, and image tree.
    pub data_dir: Option<PathBuf>,
    /// Decision strategy: "like", "pass", or "coinflip".
    pub strategy: Option<String>,
    /// Like probability for the "coinflip" strategy.
    pub like_probability: Option<f64>,
    /// Browser executable override (also honors CHROME_EXECUTABLE).
    pub browser_executable: Option<String>,
    /// Persistent browser profile directory so a login survives restarts.
    pub user_data_dir: Option<PathBuf>,
    /// Run the browser headless. Off by default — the login is manual.
    pub headless: Option<bool>,
}

impl HarvestConfig {
    /// Load from an explicit path, or from `swipecrawl.json` in the working
    /// directory. A missing file yields all-defaults; a malformed file is an
    /// error (silently ignoring a typo'd config burns a session).
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => PathBuf::from("swipecrawl.json"),
        };
        if !path.exists() {
            if explicit.is_some() {
                anyhow::bail!("config file not found: {}", path.display());
            }
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)?;
        let cfg: Self = serde_json::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("invalid config {}: {}", path.display(), e))?;
        Ok(cfg)
    }

    /// Target URL: JSON field → `SWIPECRAWL_URL` env var → `None` (required,
    /// `main` refuses to start without it).
    pub fn resolve_target_url(&self) -> Option<String> {
        if let Some(u) = &self.target_url {
            if !u.trim().is_empty() {
                return Some(u.clone());
            }
        }
        std::env::var("SWIPECRAWL_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
    }

    /// Profile limit: JSON field → `SWIPECRAWL_PROFILE_LIMIT` env → unbounded.
    pub fn resolve_profile_limit(&self) -> Option<u64> {
        self.profile_limit.or_else(|| {
            std::env::var("SWIPECRAWL_PROFILE_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
        })
    }

    fn resolve_ms(field: Option<u64>, env_key: &str, default: u64) -> std::time::Duration {
        let ms = field
            .or_else(|| std::env::var(env_key).ok().and_then(|v| v.parse().ok()))
            .unwrap_or(default);
        std::time::Duration::from_millis(ms)
    }

    pub fn resolve_lookup_timeout(&self) -> std::time::Duration {
        Self::resolve_ms(self.lookup_timeout_ms, "SWIPECRAWL_LOOKUP_TIMEOUT_MS", 10_000)
    }

    pub fn resolve_photo_advance_delay(&self) -> std::time::Duration {
        Self::resolve_ms(
            self.photo_advance_delay_ms,
            "SWIPECRAWL_PHOTO_ADVANCE_DELAY_MS",
            500,
        )
    }

    pub fn resolve_details_settle_delay(&self) -> std::time::Duration {
        Self::resolve_ms(
            self.details_settle_delay_ms,
            "SWIPECRAWL_DETAILS_SETTLE_DELAY_MS",
            700,
        )
    }

    pub fn resolve_advance_delay(&self) -> std::time::Duration {
        Self::resolve_ms(self.advance_delay_ms, "SWIPECRAWL_ADVANCE_DELAY_MS", 800)
    }

    pub fn resolve_locate_retry_delay(&self) -> std::time::Duration {
        Self::resolve_ms(
            self.locate_retry_delay_ms,
            "SWIPECRAWL_LOCATE_RETRY_DELAY_MS",
            1_500,
        )
    }

    /// Carousel ceiling: JSON field → `SWIPECRAWL_MAX_CAROUSEL` env → 64.
    /// Well above any realistic carousel length (the UI caps at 9 photos).
    pub fn resolve_max_carousel_length(&self) -> usize {
        self.max_carousel_length
            .or_else(|| {
                std::env::var("SWIPECRAWL_MAX_CAROUSEL")
                    .ok()
                    .and_then(|v| v.parse().ok())
            })
            .unwrap_or(64)
    }

    /// Data directory: JSON field → `SWIPECRAWL_DATA_DIR` env → `~/.swipecrawl/data`.
    pub fn resolve_data_dir(&self) -> PathBuf {
        if let Some(d) = &self.data_dir {
            return d.clone();
        }
        if let Ok(d) = std::env::var("SWIPECRAWL_DATA_DIR") {
            if !d.trim().is_empty() {
                return PathBuf::from(d);
            }
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".swipecrawl")
            .join("data")
    }

    /// Strategy name: JSON field → `SWIPECRAWL_STRATEGY` env → `"pass"`.
    /// Pass is the safe default — likes are rate-limited server-side.
    pub fn resolve_strategy_name(&self) -> String {
        if let Some(s) = &self.strategy {
            if !s.trim().is_empty() {
                return s.trim().to_ascii_lowercase();
            }
        }
        std::env::var("SWIPECRAWL_STRATEGY")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(|v| v.trim().to_ascii_lowercase())
            .unwrap_or_else(|| "pass".to_string())
    }

    pub fn resolve_like_probability(&self) -> f64 {
        self.like_probability
            .or_else(|| {
                std::env::var("SWIPECRAWL_LIKE_PROBABILITY")
                    .ok()
                    .and_then(|v| v.parse().ok())
            })
            .unwrap_or(0.5)
            .clamp(0.0, 1.0)
    }

    pub fn resolve_browser_executable(&self) -> Option<String> {
        self.browser_executable
            .clone()
            .filter(|v| !v.trim().is_empty())
    }

    pub fn resolve_user_data_dir(&self) -> Option<PathBuf> {
        if let Some(d) = &self.user_data_dir {
            return Some(d.clone());
        }
        std::env::var("SWIPECRAWL_USER_DATA_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
    }

    pub fn resolve_headless(&self) -> bool {
        self.headless.unwrap_or_else(|| {
            std::env::var("SWIPECRAWL_HEADLESS")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false)
        })
    }
}
