use serde::{Deserialize, Serialize};

/// Ordered label→value mapping read off the UI.
///
/// `serde_json`'s `preserve_order` feature is enabled so insertion order
/// (= UI read order) survives the round-trip through the store file.
pub type FieldMap = serde_json::Map<String, serde_json::Value>;

/// One carousel position. A `None` url means extraction failed at that
/// position, not that the position doesn't exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoSlot {
    /// Zero-based carousel position.
    pub index: usize,
    pub url: Option<String>,
}

/// One harvested profile. Assembled in memory during a single orchestrator
/// iteration, assigned its id by the allocator, then written to the store.
/// Never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub about_me: Option<String>,
    #[serde(default)]
    pub essentials: Vec<String>,
    #[serde(default)]
    pub basics: FieldMap,
    #[serde(default)]
    pub lifestyle: FieldMap,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub anthem: Option<String>,
    #[serde(default)]
    pub photos: Vec<PhotoSlot>,
    /// When this record was harvested (RFC 3339).
    pub scraped_at: String,
}

impl ProfileRecord {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            about_me: None,
            essentials: Vec::new(),
            basics: FieldMap::new(),
            lifestyle: FieldMap::new(),
            interests: Vec::new(),
            anthem: None,
            photos: Vec::new(),
            scraped_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
