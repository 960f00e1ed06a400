//! Catalog table registry
//!
//! One [`TableSpec`] per production table. The column order of every spec is
//! the field order of the row struct written into it, so the same row feeds
//! both the transactional upsert and the CSV bulk load.

/// How a table relates to its media root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableRole {
    /// The media item itself.
    Root,
    /// Shared reference entity, deduplicated by natural key across items.
    Lookup,
    /// Many-to-many association between a root and a lookup.
    Link,
    /// Child collection whose lifetime equals its parent's.
    Owned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSpec {
    pub name: &'static str,
    pub columns: &'static [&'static str],
    /// Conflict target for upserts; empty for identity-keyed owned rows.
    pub key: &'static [&'static str],
    pub role: TableRole,
    /// Column referencing the media root (links and owned rows).
    pub parent_column: Option<&'static str>,
}

impl TableSpec {
    pub fn is_child(&self) -> bool {
        matches!(self.role, TableRole::Link | TableRole::Owned)
    }

    pub fn staging_name(&self) -> String {
        format!("staging_{}", self.name)
    }

    pub fn old_name(&self) -> String {
        format!("{}_old", self.name)
    }

    pub fn column_list(&self) -> String {
        self.columns.join(", ")
    }
}

const fn lookup(
    name: &'static str,
    columns: &'static [&'static str],
    key: &'static [&'static str],
) -> TableSpec {
    TableSpec {
        name,
        columns,
        key,
        role: TableRole::Lookup,
        parent_column: None,
    }
}

const fn link(name: &'static str, columns: &'static [&'static str]) -> TableSpec {
    TableSpec {
        name,
        columns,
        key: columns,
        role: TableRole::Link,
        parent_column: Some(columns[0]),
    }
}

const fn owned(
    name: &'static str,
    columns: &'static [&'static str],
    key: &'static [&'static str],
    parent: &'static str,
) -> TableSpec {
    TableSpec {
        name,
        columns,
        key,
        role: TableRole::Owned,
        parent_column: Some(parent),
    }
}

const NAMED: &[&str] = &["id", "name"];
const COMPANY: &[&str] = &["id", "name", "origin_country", "logo_path"];
const COUNTRY: &[&str] = &["iso_3166_1", "name"];
const LANGUAGE: &[&str] = &["iso_639_1", "english_name", "name"];
const CAST: &[&str] = &[
    "id",
    "adult",
    "gender",
    "cast_id",
    "name",
    "original_name",
    "known_for_department",
    "popularity",
    "profile_path",
    "character",
    "cast_order",
];
const ID_KEY: &[&str] = &["id"];

// ============================================================================
// Movie tables
// ============================================================================

pub const MOVIE: TableSpec = TableSpec {
    name: "movie",
    columns: &[
        "id",
        "backdrop_path",
        "budget",
        "homepage",
        "imdb_id",
        "origin_country",
        "original_language",
        "original_title",
        "overview",
        "popularity",
        "poster_path",
        "release_date",
        "revenue",
        "runtime",
        "status",
        "tagline",
        "title",
        "video",
        "vote_average",
        "vote_count",
        "belongs_to_collection_id",
    ],
    key: ID_KEY,
    role: TableRole::Root,
    parent_column: None,
};

pub const MOVIE_COLLECTIONS: TableSpec = lookup(
    "movie_collections",
    &["id", "name", "poster_path", "backdrop_path"],
    ID_KEY,
);
pub const MOVIE_GENRES: TableSpec = lookup("movie_genres", NAMED, ID_KEY);
pub const MOVIE_GENRES_ASSOC: TableSpec = link("movie_genres_assoc", &["movie_id", "genre_id"]);
pub const MOVIE_COMPANIES: TableSpec = lookup("movie_production_companies", COMPANY, ID_KEY);
pub const MOVIE_COMPANIES_ASSOC: TableSpec =
    link("movie_companies_assoc", &["movie_id", "company_id"]);
pub const MOVIE_COUNTRIES: TableSpec =
    lookup("movie_production_countries", COUNTRY, &["iso_3166_1"]);
pub const MOVIE_COUNTRIES_ASSOC: TableSpec =
    link("movie_countries_assoc", &["movie_id", "country_id"]);
pub const MOVIE_LANGUAGES: TableSpec = lookup("movie_spoken_languages", LANGUAGE, &["iso_639_1"]);
pub const MOVIE_LANGUAGES_ASSOC: TableSpec =
    link("movie_languages_assoc", &["movie_id", "language_id"]);
pub const MOVIE_ALTERNATIVE_TITLES: TableSpec = owned(
    "movie_alternative_titles",
    &["iso_3166_1", "title", "type", "movie_id"],
    &[],
    "movie_id",
);
pub const MOVIE_CAST: TableSpec = lookup("movie_cast_members", CAST, ID_KEY);
pub const MOVIE_CAST_ASSOC: TableSpec = link("movie_cast_assoc", &["movie_id", "cast_id"]);
pub const MOVIE_KEYWORDS: TableSpec = lookup("movie_keywords", NAMED, ID_KEY);
pub const MOVIE_KEYWORDS_ASSOC: TableSpec = link("movie_keywords_assoc", &["movie_id", "id"]);
pub const MOVIE_RELEASE_DATES: TableSpec = owned(
    "movie_release_dates",
    &["iso_3166_1", "certification", "release_date", "type", "note", "movie_id"],
    &[],
    "movie_id",
);
pub const MOVIE_VIDEOS: TableSpec = owned(
    "movie_videos",
    &[
        "id",
        "iso_639_1",
        "iso_3166_1",
        "name",
        "key",
        "site",
        "size",
        "type",
        "official",
        "published_at",
        "movie_id",
    ],
    ID_KEY,
    "movie_id",
);
pub const MOVIE_EXTERNAL_IDS: TableSpec = owned(
    "movie_external_ids",
    &["movie_id", "imdb_id", "wikidata_id", "facebook_id", "instagram_id", "twitter_id"],
    &["movie_id"],
    "movie_id",
);

pub const MOVIE_TABLES: &[TableSpec] = &[
    MOVIE,
    MOVIE_COLLECTIONS,
    MOVIE_GENRES,
    MOVIE_GENRES_ASSOC,
    MOVIE_COMPANIES,
    MOVIE_COMPANIES_ASSOC,
    MOVIE_COUNTRIES,
    MOVIE_COUNTRIES_ASSOC,
    MOVIE_LANGUAGES,
    MOVIE_LANGUAGES_ASSOC,
    MOVIE_ALTERNATIVE_TITLES,
    MOVIE_CAST,
    MOVIE_CAST_ASSOC,
    MOVIE_KEYWORDS,
    MOVIE_KEYWORDS_ASSOC,
    MOVIE_RELEASE_DATES,
    MOVIE_VIDEOS,
    MOVIE_EXTERNAL_IDS,
];

// ============================================================================
// Series tables
// ============================================================================

const EPISODE: &[&str] = &[
    "id",
    "name",
    "overview",
    "vote_average",
    "vote_count",
    "air_date",
    "episode_number",
    "episode_type",
    "production_code",
    "runtime",
    "season_number",
    "show_id",
    "still_path",
];

pub const SERIES: TableSpec = TableSpec {
    name: "series",
    columns: &[
        "id",
        "backdrop_path",
        "first_air_date",
        "homepage",
        "imdb_id",
        "in_production",
        "last_air_date",
        "name",
        "number_of_episodes",
        "number_of_seasons",
        "origin_country",
        "original_language",
        "original_name",
        "overview",
        "popularity",
        "poster_path",
        "status",
        "tagline",
        "type",
        "vote_average",
        "vote_count",
        "last_episode_to_air_id",
        "next_episode_to_air_id",
    ],
    key: ID_KEY,
    role: TableRole::Root,
    parent_column: None,
};

pub const SERIES_CREATED_BY: TableSpec = lookup(
    "series_created_by",
    &["id", "credit_id", "name", "original_name", "gender", "profile_path"],
    ID_KEY,
);
pub const SERIES_CREATED_BY_ASSOC: TableSpec =
    link("series_created_by_assoc", &["series_id", "created_by_id"]);
pub const SERIES_GENRES: TableSpec = lookup("series_genres", NAMED, ID_KEY);
pub const SERIES_GENRES_ASSOC: TableSpec = link("series_genres_assoc", &["series_id", "genre_id"]);
pub const SERIES_LAST_EPISODE: TableSpec = lookup("series_last_episode_to_air", EPISODE, ID_KEY);
pub const SERIES_NEXT_EPISODE: TableSpec = lookup("series_next_episode_to_air", EPISODE, ID_KEY);
pub const SERIES_NETWORKS: TableSpec = lookup(
    "series_networks",
    &["id", "logo_path", "name", "origin_country"],
    ID_KEY,
);
pub const SERIES_NETWORKS_ASSOC: TableSpec =
    link("series_networks_assoc", &["series_id", "network_id"]);
pub const SERIES_COMPANIES: TableSpec = lookup("series_production_companies", COMPANY, ID_KEY);
pub const SERIES_COMPANIES_ASSOC: TableSpec =
    link("series_companies_assoc", &["series_id", "company_id"]);
pub const SERIES_COUNTRIES: TableSpec =
    lookup("series_production_countries", COUNTRY, &["iso_3166_1"]);
pub const SERIES_COUNTRIES_ASSOC: TableSpec =
    link("series_countries_assoc", &["series_id", "country_id"]);
pub const SERIES_SEASONS: TableSpec = owned(
    "series_seasons",
    &[
        "id",
        "air_date",
        "episode_count",
        "name",
        "overview",
        "poster_path",
        "season_number",
        "vote_average",
        "series_id",
    ],
    ID_KEY,
    "series_id",
);
pub const SERIES_LANGUAGES: TableSpec =
    lookup("series_spoken_languages", LANGUAGE, &["iso_639_1"]);
pub const SERIES_LANGUAGES_ASSOC: TableSpec =
    link("series_languages_assoc", &["series_id", "language_id"]);
pub const SERIES_ALTERNATIVE_TITLES: TableSpec = owned(
    "series_alternative_titles",
    &["iso_3166_1", "title", "type", "series_id"],
    &[],
    "series_id",
);
pub const SERIES_CAST: TableSpec = lookup("series_cast_members", CAST, ID_KEY);
pub const SERIES_CAST_ASSOC: TableSpec = link("series_cast_assoc", &["series_id", "cast_id"]);
pub const SERIES_EXTERNAL_IDS: TableSpec = owned(
    "series_external_ids",
    &["series_id", "imdb_id", "wikidata_id", "facebook_id", "instagram_id", "twitter_id"],
    &["series_id"],
    "series_id",
);
pub const SERIES_KEYWORDS: TableSpec = lookup("series_keywords", NAMED, ID_KEY);
pub const SERIES_KEYWORDS_ASSOC: TableSpec = link("series_keywords_assoc", &["series_id", "id"]);
pub const SERIES_VIDEOS: TableSpec = owned(
    "series_videos",
    &[
        "id",
        "iso_639_1",
        "iso_3166_1",
        "name",
        "key",
        "site",
        "size",
        "type",
        "official",
        "published_at",
        "series_id",
    ],
    ID_KEY,
    "series_id",
);

pub const SERIES_TABLES: &[TableSpec] = &[
    SERIES,
    SERIES_CREATED_BY,
    SERIES_CREATED_BY_ASSOC,
    SERIES_GENRES,
    SERIES_GENRES_ASSOC,
    SERIES_LAST_EPISODE,
    SERIES_NEXT_EPISODE,
    SERIES_NETWORKS,
    SERIES_NETWORKS_ASSOC,
    SERIES_COMPANIES,
    SERIES_COMPANIES_ASSOC,
    SERIES_COUNTRIES,
    SERIES_COUNTRIES_ASSOC,
    SERIES_SEASONS,
    SERIES_LANGUAGES,
    SERIES_LANGUAGES_ASSOC,
    SERIES_ALTERNATIVE_TITLES,
    SERIES_CAST,
    SERIES_CAST_ASSOC,
    SERIES_EXTERNAL_IDS,
    SERIES_KEYWORDS,
    SERIES_KEYWORDS_ASSOC,
    SERIES_VIDEOS,
];

/// Every catalog table, movies first.
pub fn all_tables() -> impl Iterator<Item = &'static TableSpec> {
    MOVIE_TABLES.iter().chain(SERIES_TABLES.iter())
}
