//! Short-lived storage of finished downloads

pub mod registry;

pub use registry::{DownloadRegistry, RegistryEntry};
