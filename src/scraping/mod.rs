pub mod carousel;
pub mod fields;
pub mod harvester;

pub use harvester::{Harvester, IterationOutcome, RunSummary, Timings};
