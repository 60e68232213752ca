/// Forensic integrity helpers
pub mod verification;

pub use verification::{calculate_file_digests, calculate_hash, FileDigests, HashAlgorithm};
