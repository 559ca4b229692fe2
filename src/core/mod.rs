pub mod config;
pub mod types;

pub use config::HarvestConfig;
pub use types::{FieldMap, PhotoSlot, ProfileRecord};
