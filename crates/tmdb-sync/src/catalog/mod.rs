//! Catalog API access: detail URLs, nightly ID exports and the changes feed

pub mod changes;
pub mod client;
pub mod exports;

pub use client::CatalogClient;
