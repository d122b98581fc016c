//! Result tree identification

pub mod hashing;
pub mod resolver;

pub use hashing::{sha256_file, DigestCache};
pub use resolver::{identify, Identification, RecognizedFile, UNKNOWN};
