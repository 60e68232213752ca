/// File extraction, classification and run orchestration
pub mod engine;
pub mod extract;
pub mod signatures;

pub use engine::{RipEngine, RipProgress, RipStage};
pub use extract::{extract_tree, plan_destinations, ExtractOptions, PlannedExtraction};
pub use signatures::{classify, identify, FileSignature};
