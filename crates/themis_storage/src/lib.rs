#![forbid(unsafe_code)]

pub mod registry;

pub use registry::{RegistryStore, StorageError};
