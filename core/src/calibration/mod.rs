pub mod profile;
pub mod storage;
pub mod store;

pub use profile::{CalibrationProfile, ReferenceKeypoints};
pub use storage::{FileStore, MemoryStore};
pub use store::{CalibrationStatus, CalibrationStore};
