//! # In-process analyzers
//!
//! - FmpCapsuleValidator: capsule header checks and image type lookup
//! - GuidDatabase: well-known GUID descriptions
//! - EthernetScorer: ethtool and ping results per network device
//! - BlockDeviceScorer: partition table, read and write checks per disk

pub mod block_devices;
pub mod criteria;
pub mod ethernet;
pub mod fmp_capsule;
pub mod guid_database;

pub use block_devices::BlockDeviceScorer;
pub use criteria::{CriteriaDatabase, Quality, Verdict};
pub use ethernet::EthernetScorer;
pub use fmp_capsule::FmpCapsuleValidator;
pub use guid_database::GuidDatabase;
