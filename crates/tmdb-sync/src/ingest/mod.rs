//! Ingestion engine
//!
//! Detail payloads are decoded into [`raw`] models, mapped to a
//! [`graph::MediaGraph`] by a pure function, then written by [`persist`].
//!
//! ```text
//! JSON body ──▶ RawMovie / RawSeries ──▶ MovieGraph / SeriesGraph ──▶ persist (one tx)
//!                                                   │
//!                                                   └──▶ staging CSV row-sets
//! ```

pub mod graph;
pub mod persist;
pub mod raw;
pub mod sink;
pub mod tables;

use thiserror::Error;

use crate::media::MediaKind;

pub use graph::{MediaGraph, MovieGraph, SeriesGraph};
pub use persist::{delete_media_items, local_ids, persist, persist_movie, persist_series};
pub use sink::IngestSink;

/// Result type for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to decode {kind} payload: {source}")]
    Decode {
        kind: MediaKind,
        #[source]
        source: serde_json::Error,
    },
}
