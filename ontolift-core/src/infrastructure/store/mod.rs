// ontolift-core/src/infrastructure/store/mod.rs

pub mod file;

pub use file::{FileStore, StoreOptions};
