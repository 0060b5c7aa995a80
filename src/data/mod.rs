//! Data loading
//!
//! - [`DataLoader`] turns a [`DataSource`] into a polars `DataFrame`
//! - [`DatasetCatalog`] lists and resolves tables kept in the data directory

mod catalog;
mod loader;

pub use catalog::{DatasetCatalog, DatasetEntry};
pub use loader::{DataFormat, DataLoader, DataSource};
