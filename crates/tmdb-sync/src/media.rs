//! Media kinds synchronized from the catalog

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ingest::tables::{TableSpec, MOVIE_TABLES, SERIES_TABLES};

/// The two root entity types the catalog exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Movie,
    Series,
}

impl MediaKind {
    pub const ALL: [MediaKind; 2] = [MediaKind::Movie, MediaKind::Series];

    /// Path segment used by the catalog API (`/movie/{id}`, `/tv/{id}`).
    pub fn api_segment(self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Series => "tv",
        }
    }

    /// Sub-resources appended to a detail request.
    pub fn append_to_response(self) -> &'static str {
        match self {
            MediaKind::Movie => {
                "alternative_titles,credits,external_ids,keywords,release_dates,videos"
            },
            MediaKind::Series => "alternative_titles,credits,external_ids,keywords,videos",
        }
    }

    /// File name prefix of the nightly ID export.
    pub fn export_prefix(self) -> &'static str {
        match self {
            MediaKind::Movie => "movie_ids",
            MediaKind::Series => "tv_series_ids",
        }
    }

    /// Production table holding the root rows.
    pub fn root_table(self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Series => "series",
        }
    }

    pub fn tables(self) -> &'static [TableSpec] {
        match self {
            MediaKind::Movie => MOVIE_TABLES,
            MediaKind::Series => SERIES_TABLES,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Movie => f.write_str("movie"),
            MediaKind::Series => f.write_str("series"),
        }
    }
}
