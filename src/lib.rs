pub mod core;
pub mod decision;
pub mod driver;
pub mod scraping;
pub mod storage;

// --- Primary exports ---
pub use crate::core::config::HarvestConfig;
pub use crate::core::types;
pub use crate::core::types::*;

pub use decision::{Decision, DecisionStrategy};
pub use driver::cdp::CdpDriver;
pub use scraping::{Harvester, IterationOutcome, RunSummary, Timings};
pub use storage::{HttpImageFetcher, IdAllocator, ImageFetcher, RecordStore, StoreError};
