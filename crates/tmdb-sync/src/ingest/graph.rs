//! Normalized entity graphs
//!
//! [`MovieGraph::from_raw`] and [`SeriesGraph::from_raw`] flatten one detail
//! payload into table rows without touching the database. Nested references
//! are deduplicated by natural key, so a genre listed twice yields one lookup
//! row and one association row. The same rows feed both the transactional
//! upsert in `persist` and the CSV row-sets of the staging pipeline.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::query_builder::Separated;
use sqlx::Postgres;
use std::collections::HashSet;
use std::fs::File;

use super::raw::{
    RawAltTitles, RawCast, RawCompany, RawCountry, RawCredits, RawEpisode, RawExternalIds,
    RawKeywords, RawLanguage, RawMovie, RawNamed, RawSeries, RawVideos,
};
use super::tables::{self, TableSpec};
use super::IngestError;
use crate::media::MediaKind;

/// Natural key of a row, used to drop duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupKey {
    Id(i64),
    Code(String),
    Link(i64, i64),
    CodeLink(i64, String),
}

/// A row of one catalog table. Field order equals the table's column order.
pub trait TableRow: Serialize + Send + Sync {
    fn push_binds<'args>(&self, b: &mut Separated<'_, 'args, Postgres, &'static str>);

    /// `None` for rows without a natural key (identity-keyed owned rows).
    fn dedup_key(&self) -> Option<DedupKey>;
}

/// Object-safe view over any [`TableRow`].
pub trait ErasedRow: Send + Sync {
    fn push_binds<'args>(&self, b: &mut Separated<'_, 'args, Postgres, &'static str>);
    fn dedup_key(&self) -> Option<DedupKey>;
    fn write_csv(&self, writer: &mut csv::Writer<File>) -> csv::Result<()>;
}

impl<T: TableRow> ErasedRow for T {
    fn push_binds<'args>(&self, b: &mut Separated<'_, 'args, Postgres, &'static str>) {
        TableRow::push_binds(self, b)
    }

    fn dedup_key(&self) -> Option<DedupKey> {
        TableRow::dedup_key(self)
    }

    fn write_csv(&self, writer: &mut csv::Writer<File>) -> csv::Result<()> {
        writer.serialize(self)
    }
}

/// Rows destined for one table.
pub struct TableRows<'a> {
    pub table: &'static TableSpec,
    pub rows: Vec<&'a dyn ErasedRow>,
}

fn rows<'a, T: TableRow>(table: &'static TableSpec, items: &'a [T]) -> TableRows<'a> {
    TableRows {
        table,
        rows: items.iter().map(|r| r as &dyn ErasedRow).collect(),
    }
}

fn optional_rows<'a, T: TableRow>(table: &'static TableSpec, item: &'a Option<T>) -> TableRows<'a> {
    TableRows {
        table,
        rows: item.iter().map(|r| r as &dyn ErasedRow).collect(),
    }
}

// ============================================================================
// Field normalization
// ============================================================================

fn text(value: &Option<String>) -> Option<String> {
    value.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()).map(str::to_string)
}

fn int(value: Option<i64>) -> Option<i32> {
    value.and_then(|n| i32::try_from(n).ok())
}

/// `YYYY-MM-DD`; anything else is treated as absent.
pub fn parse_date(value: &Option<String>) -> Option<NaiveDate> {
    text(value).and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok())
}

/// RFC 3339 timestamp; anything else is treated as absent.
pub fn parse_timestamp(value: &Option<String>) -> Option<DateTime<Utc>> {
    text(value)
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Keep the first row for each natural key.
fn dedup<T: TableRow>(items: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|row| match TableRow::dedup_key(row) {
            Some(key) => seen.insert(key),
            None => true,
        })
        .collect()
}

// ============================================================================
// Shared rows
// ============================================================================

/// Genres and keywords.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedRow {
    pub id: i64,
    pub name: Option<String>,
}

impl TableRow for NamedRow {
    fn push_binds<'args>(&self, b: &mut Separated<'_, 'args, Postgres, &'static str>) {
        b.push_bind(self.id).push_bind(self.name.clone());
    }

    fn dedup_key(&self) -> Option<DedupKey> {
        Some(DedupKey::Id(self.id))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyRow {
    pub id: i64,
    pub name: Option<String>,
    pub origin_country: Option<String>,
    pub logo_path: Option<String>,
}

impl TableRow for CompanyRow {
    fn push_binds<'args>(&self, b: &mut Separated<'_, 'args, Postgres, &'static str>) {
        b.push_bind(self.id)
            .push_bind(self.name.clone())
            .push_bind(self.origin_country.clone())
            .push_bind(self.logo_path.clone());
    }

    fn dedup_key(&self) -> Option<DedupKey> {
        Some(DedupKey::Id(self.id))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryRow {
    pub iso_3166_1: String,
    pub name: Option<String>,
}

impl TableRow for CountryRow {
    fn push_binds<'args>(&self, b: &mut Separated<'_, 'args, Postgres, &'static str>) {
        b.push_bind(self.iso_3166_1.clone()).push_bind(self.name.clone());
    }

    fn dedup_key(&self) -> Option<DedupKey> {
        Some(DedupKey::Code(self.iso_3166_1.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguageRow {
    pub iso_639_1: String,
    pub english_name: Option<String>,
    pub name: Option<String>,
}

impl TableRow for LanguageRow {
    fn push_binds<'args>(&self, b: &mut Separated<'_, 'args, Postgres, &'static str>) {
        b.push_bind(self.iso_639_1.clone())
            .push_bind(self.english_name.clone())
            .push_bind(self.name.clone());
    }

    fn dedup_key(&self) -> Option<DedupKey> {
        Some(DedupKey::Code(self.iso_639_1.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CastRow {
    pub id: i64,
    pub adult: Option<bool>,
    pub gender: Option<i32>,
    pub cast_id: Option<i64>,
    pub name: Option<String>,
    pub original_name: Option<String>,
    pub known_for_department: Option<String>,
    pub popularity: Option<f64>,
    pub profile_path: Option<String>,
    pub character: Option<String>,
    pub cast_order: Option<i32>,
}

impl TableRow for CastRow {
    fn push_binds<'args>(&self, b: &mut Separated<'_, 'args, Postgres, &'static str>) {
        b.push_bind(self.id)
            .push_bind(self.adult)
            .push_bind(self.gender)
            .push_bind(self.cast_id)
            .push_bind(self.name.clone())
            .push_bind(self.original_name.clone())
            .push_bind(self.known_for_department.clone())
            .push_bind(self.popularity)
            .push_bind(self.profile_path.clone())
            .push_bind(self.character.clone())
            .push_bind(self.cast_order);
    }

    fn dedup_key(&self) -> Option<DedupKey> {
        Some(DedupKey::Id(self.id))
    }
}

/// Association between a media root and a numerically keyed lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdLink {
    pub media_id: i64,
    pub target_id: i64,
}

impl TableRow for IdLink {
    fn push_binds<'args>(&self, b: &mut Separated<'_, 'args, Postgres, &'static str>) {
        b.push_bind(self.media_id).push_bind(self.target_id);
    }

    fn dedup_key(&self) -> Option<DedupKey> {
        Some(DedupKey::Link(self.media_id, self.target_id))
    }
}

/// Association between a media root and an ISO-coded lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeLink {
    pub media_id: i64,
    pub code: String,
}

impl TableRow for CodeLink {
    fn push_binds<'args>(&self, b: &mut Separated<'_, 'args, Postgres, &'static str>) {
        b.push_bind(self.media_id).push_bind(self.code.clone());
    }

    fn dedup_key(&self) -> Option<DedupKey> {
        Some(DedupKey::CodeLink(self.media_id, self.code.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AltTitleRow {
    pub iso_3166_1: Option<String>,
    pub title: Option<String>,
    pub kind: Option<String>,
    pub media_id: i64,
}

impl TableRow for AltTitleRow {
    fn push_binds<'args>(&self, b: &mut Separated<'_, 'args, Postgres, &'static str>) {
        b.push_bind(self.iso_3166_1.clone())
            .push_bind(self.title.clone())
            .push_bind(self.kind.clone())
            .push_bind(self.media_id);
    }

    fn dedup_key(&self) -> Option<DedupKey> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoRow {
    pub id: String,
    pub iso_639_1: Option<String>,
    pub iso_3166_1: Option<String>,
    pub name: Option<String>,
    pub key: Option<String>,
    pub site: Option<String>,
    pub size: Option<i32>,
    pub kind: Option<String>,
    pub official: Option<bool>,
    pub published_at: Option<DateTime<Utc>>,
    pub media_id: i64,
}

impl TableRow for VideoRow {
    fn push_binds<'args>(&self, b: &mut Separated<'_, 'args, Postgres, &'static str>) {
        b.push_bind(self.id.clone())
            .push_bind(self.iso_639_1.clone())
            .push_bind(self.iso_3166_1.clone())
            .push_bind(self.name.clone())
            .push_bind(self.key.clone())
            .push_bind(self.site.clone())
            .push_bind(self.size)
            .push_bind(self.kind.clone())
            .push_bind(self.official)
            .push_bind(self.published_at)
            .push_bind(self.media_id);
    }

    fn dedup_key(&self) -> Option<DedupKey> {
        Some(DedupKey::Code(self.id.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExternalIdsRow {
    pub media_id: i64,
    pub imdb_id: Option<String>,
    pub wikidata_id: Option<String>,
    pub facebook_id: Option<String>,
    pub instagram_id: Option<String>,
    pub twitter_id: Option<String>,
}

impl TableRow for ExternalIdsRow {
    fn push_binds<'args>(&self, b: &mut Separated<'_, 'args, Postgres, &'static str>) {
        b.push_bind(self.media_id)
            .push_bind(self.imdb_id.clone())
            .push_bind(self.wikidata_id.clone())
            .push_bind(self.facebook_id.clone())
            .push_bind(self.instagram_id.clone())
            .push_bind(self.twitter_id.clone());
    }

    fn dedup_key(&self) -> Option<DedupKey> {
        Some(DedupKey::Id(self.media_id))
    }
}

// ============================================================================
// Shared mapping helpers
// ============================================================================

fn named(items: &[RawNamed]) -> Vec<NamedRow> {
    dedup(items.iter().filter_map(|n| {
        n.id.map(|id| NamedRow {
            id,
            name: text(&n.name),
        })
    }))
}

fn companies(items: &[RawCompany]) -> Vec<CompanyRow> {
    dedup(items.iter().filter_map(|c| {
        c.id.map(|id| CompanyRow {
            id,
            name: text(&c.name),
            origin_country: text(&c.origin_country),
            logo_path: text(&c.logo_path),
        })
    }))
}

fn countries(items: &[RawCountry]) -> Vec<CountryRow> {
    dedup(items.iter().filter_map(|c| {
        text(&c.iso_3166_1).map(|iso| CountryRow {
            iso_3166_1: iso,
            name: text(&c.name),
        })
    }))
}

fn languages(items: &[RawLanguage]) -> Vec<LanguageRow> {
    dedup(items.iter().filter_map(|l| {
        text(&l.iso_639_1).map(|iso| LanguageRow {
            iso_639_1: iso,
            english_name: text(&l.english_name),
            name: text(&l.name),
        })
    }))
}

fn cast(credits: &Option<RawCredits>) -> Vec<CastRow> {
    let members: &[RawCast] = credits.as_ref().map(|c| c.cast.as_slice()).unwrap_or_default();
    dedup(members.iter().filter_map(|m| {
        m.id.map(|id| CastRow {
            id,
            adult: m.adult,
            gender: int(m.gender),
            cast_id: m.cast_id,
            name: text(&m.name),
            original_name: text(&m.original_name),
            known_for_department: text(&m.known_for_department),
            popularity: m.popularity,
            profile_path: text(&m.profile_path),
            character: text(&m.character),
            cast_order: int(m.order),
        })
    }))
}

fn keywords(raw: &Option<RawKeywords>) -> Vec<NamedRow> {
    raw.as_ref().map(|k| named(&k.keywords)).unwrap_or_default()
}

fn alternative_titles(media_id: i64, raw: &Option<RawAltTitles>) -> Vec<AltTitleRow> {
    raw.iter()
        .flat_map(|a| a.titles.iter())
        .map(|t| AltTitleRow {
            iso_3166_1: text(&t.iso_3166_1),
            title: text(&t.title),
            kind: text(&t.kind),
            media_id,
        })
        .collect()
}

fn videos(media_id: i64, raw: &Option<RawVideos>) -> Vec<VideoRow> {
    dedup(raw.iter().flat_map(|v| v.results.iter()).filter_map(|v| {
        text(&v.id).map(|id| VideoRow {
            id,
            iso_639_1: text(&v.iso_639_1),
            iso_3166_1: text(&v.iso_3166_1),
            name: text(&v.name),
            key: text(&v.key),
            site: text(&v.site),
            size: int(v.size),
            kind: text(&v.kind),
            official: v.official,
            published_at: parse_timestamp(&v.published_at),
            media_id,
        })
    }))
}

fn external_ids(media_id: i64, raw: &Option<RawExternalIds>) -> Option<ExternalIdsRow> {
    raw.as_ref().map(|e| ExternalIdsRow {
        media_id,
        imdb_id: text(&e.imdb_id),
        wikidata_id: text(&e.wikidata_id),
        facebook_id: text(&e.facebook_id),
        instagram_id: text(&e.instagram_id),
        twitter_id: text(&e.twitter_id),
    })
}

fn id_links(media_id: i64, targets: impl Iterator<Item = i64>) -> Vec<IdLink> {
    dedup(targets.map(|target_id| IdLink {
        media_id,
        target_id,
    }))
}

fn code_links<'a>(media_id: i64, codes: impl Iterator<Item = &'a String>) -> Vec<CodeLink> {
    dedup(codes.map(|code| CodeLink {
        media_id,
        code: code.clone(),
    }))
}

fn first_country(origin_country: &[String]) -> Option<String> {
    origin_country
        .first()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

// ============================================================================
// Movie
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovieRow {
    pub id: i64,
    pub backdrop_path: Option<String>,
    pub budget: Option<i64>,
    pub homepage: Option<String>,
    pub imdb_id: Option<String>,
    pub origin_country: Option<String>,
    pub original_language: Option<String>,
    pub original_title: Option<String>,
    pub overview: Option<String>,
    pub popularity: Option<f64>,
    pub poster_path: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub revenue: Option<i64>,
    pub runtime: Option<i32>,
    pub status: Option<String>,
    pub tagline: Option<String>,
    pub title: Option<String>,
    pub video: Option<bool>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<i32>,
    pub belongs_to_collection_id: Option<i64>,
}

impl TableRow for MovieRow {
    fn push_binds<'args>(&self, b: &mut Separated<'_, 'args, Postgres, &'static str>) {
        b.push_bind(self.id)
            .push_bind(self.backdrop_path.clone())
            .push_bind(self.budget)
            .push_bind(self.homepage.clone())
            .push_bind(self.imdb_id.clone())
            .push_bind(self.origin_country.clone())
            .push_bind(self.original_language.clone())
            .push_bind(self.original_title.clone())
            .push_bind(self.overview.clone())
            .push_bind(self.popularity)
            .push_bind(self.poster_path.clone())
            .push_bind(self.release_date)
            .push_bind(self.revenue)
            .push_bind(self.runtime)
            .push_bind(self.status.clone())
            .push_bind(self.tagline.clone())
            .push_bind(self.title.clone())
            .push_bind(self.video)
            .push_bind(self.vote_average)
            .push_bind(self.vote_count)
            .push_bind(self.belongs_to_collection_id);
    }

    fn dedup_key(&self) -> Option<DedupKey> {
        Some(DedupKey::Id(self.id))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionRow {
    pub id: i64,
    pub name: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
}

impl TableRow for CollectionRow {
    fn push_binds<'args>(&self, b: &mut Separated<'_, 'args, Postgres, &'static str>) {
        b.push_bind(self.id)
            .push_bind(self.name.clone())
            .push_bind(self.poster_path.clone())
            .push_bind(self.backdrop_path.clone());
    }

    fn dedup_key(&self) -> Option<DedupKey> {
        Some(DedupKey::Id(self.id))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReleaseDateRow {
    pub iso_3166_1: Option<String>,
    pub certification: Option<String>,
    pub release_date: Option<DateTime<Utc>>,
    pub kind: Option<i32>,
    pub note: Option<String>,
    pub movie_id: i64,
}

impl TableRow for ReleaseDateRow {
    fn push_binds<'args>(&self, b: &mut Separated<'_, 'args, Postgres, &'static str>) {
        b.push_bind(self.iso_3166_1.clone())
            .push_bind(self.certification.clone())
            .push_bind(self.release_date)
            .push_bind(self.kind)
            .push_bind(self.note.clone())
            .push_bind(self.movie_id);
    }

    fn dedup_key(&self) -> Option<DedupKey> {
        None
    }
}

/// Every row produced by one movie payload.
#[derive(Debug, Clone, PartialEq)]
pub struct MovieGraph {
    pub movie: MovieRow,
    pub collection: Option<CollectionRow>,
    pub genres: Vec<NamedRow>,
    pub genre_links: Vec<IdLink>,
    pub companies: Vec<CompanyRow>,
    pub company_links: Vec<IdLink>,
    pub countries: Vec<CountryRow>,
    pub country_links: Vec<CodeLink>,
    pub languages: Vec<LanguageRow>,
    pub language_links: Vec<CodeLink>,
    pub alternative_titles: Vec<AltTitleRow>,
    pub cast: Vec<CastRow>,
    pub cast_links: Vec<IdLink>,
    pub keywords: Vec<NamedRow>,
    pub keyword_links: Vec<IdLink>,
    pub release_dates: Vec<ReleaseDateRow>,
    pub videos: Vec<VideoRow>,
    pub external_ids: Option<ExternalIdsRow>,
}

impl MovieGraph {
    pub fn from_raw(raw: &RawMovie) -> Self {
        let id = raw.id;

        let collection = raw.belongs_to_collection.as_ref().and_then(|c| {
            c.id.map(|cid| CollectionRow {
                id: cid,
                name: text(&c.name),
                poster_path: text(&c.poster_path),
                backdrop_path: text(&c.backdrop_path),
            })
        });

        let external_ids = external_ids(id, &raw.external_ids);
        let imdb_id = text(&raw.imdb_id)
            .or_else(|| external_ids.as_ref().and_then(|e| e.imdb_id.clone()));

        let movie = MovieRow {
            id,
            backdrop_path: text(&raw.backdrop_path),
            budget: raw.budget,
            homepage: text(&raw.homepage),
            imdb_id,
            origin_country: first_country(&raw.origin_country),
            original_language: text(&raw.original_language),
            original_title: text(&raw.original_title),
            overview: text(&raw.overview),
            popularity: raw.popularity,
            poster_path: text(&raw.poster_path),
            release_date: parse_date(&raw.release_date),
            revenue: raw.revenue,
            runtime: int(raw.runtime),
            status: text(&raw.status),
            tagline: text(&raw.tagline),
            title: text(&raw.title),
            video: raw.video,
            vote_average: raw.vote_average,
            vote_count: int(raw.vote_count),
            belongs_to_collection_id: collection.as_ref().map(|c| c.id),
        };

        let genres = named(&raw.genres);
        let companies = companies(&raw.production_companies);
        let countries = countries(&raw.production_countries);
        let languages = languages(&raw.spoken_languages);
        let cast = cast(&raw.credits);
        let keywords = keywords(&raw.keywords);

        let release_dates = raw
            .release_dates
            .iter()
            .flat_map(|r| r.results.iter())
            .flat_map(|country| {
                country.release_dates.iter().map(move |d| ReleaseDateRow {
                    iso_3166_1: text(&country.iso_3166_1),
                    certification: text(&d.certification),
                    release_date: parse_timestamp(&d.release_date),
                    kind: int(d.kind),
                    note: text(&d.note),
                    movie_id: id,
                })
            })
            .collect();

        Self {
            genre_links: id_links(id, genres.iter().map(|g| g.id)),
            company_links: id_links(id, companies.iter().map(|c| c.id)),
            country_links: code_links(id, countries.iter().map(|c| &c.iso_3166_1)),
            language_links: code_links(id, languages.iter().map(|l| &l.iso_639_1)),
            cast_links: id_links(id, cast.iter().map(|c| c.id)),
            keyword_links: id_links(id, keywords.iter().map(|k| k.id)),
            alternative_titles: alternative_titles(id, &raw.alternative_titles),
            videos: videos(id, &raw.videos),
            movie,
            collection,
            genres,
            companies,
            countries,
            languages,
            cast,
            keywords,
            release_dates,
            external_ids,
        }
    }

    /// Rows grouped by destination table, in registry order.
    pub fn tables(&self) -> Vec<TableRows<'_>> {
        vec![
            rows(&tables::MOVIE, std::slice::from_ref(&self.movie)),
            optional_rows(&tables::MOVIE_COLLECTIONS, &self.collection),
            rows(&tables::MOVIE_GENRES, &self.genres),
            rows(&tables::MOVIE_GENRES_ASSOC, &self.genre_links),
            rows(&tables::MOVIE_COMPANIES, &self.companies),
            rows(&tables::MOVIE_COMPANIES_ASSOC, &self.company_links),
            rows(&tables::MOVIE_COUNTRIES, &self.countries),
            rows(&tables::MOVIE_COUNTRIES_ASSOC, &self.country_links),
            rows(&tables::MOVIE_LANGUAGES, &self.languages),
            rows(&tables::MOVIE_LANGUAGES_ASSOC, &self.language_links),
            rows(&tables::MOVIE_ALTERNATIVE_TITLES, &self.alternative_titles),
            rows(&tables::MOVIE_CAST, &self.cast),
            rows(&tables::MOVIE_CAST_ASSOC, &self.cast_links),
            rows(&tables::MOVIE_KEYWORDS, &self.keywords),
            rows(&tables::MOVIE_KEYWORDS_ASSOC, &self.keyword_links),
            rows(&tables::MOVIE_RELEASE_DATES, &self.release_dates),
            rows(&tables::MOVIE_VIDEOS, &self.videos),
            optional_rows(&tables::MOVIE_EXTERNAL_IDS, &self.external_ids),
        ]
    }
}

// ============================================================================
// Series
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesRow {
    pub id: i64,
    pub backdrop_path: Option<String>,
    pub first_air_date: Option<NaiveDate>,
    pub homepage: Option<String>,
    pub imdb_id: Option<String>,
    pub in_production: Option<bool>,
    pub last_air_date: Option<NaiveDate>,
    pub name: Option<String>,
    pub number_of_episodes: Option<i32>,
    pub number_of_seasons: Option<i32>,
    pub origin_country: Option<String>,
    pub original_language: Option<String>,
    pub original_name: Option<String>,
    pub overview: Option<String>,
    pub popularity: Option<f64>,
    pub poster_path: Option<String>,
    pub status: Option<String>,
    pub tagline: Option<String>,
    pub kind: Option<String>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<i32>,
    pub last_episode_to_air_id: Option<i64>,
    pub next_episode_to_air_id: Option<i64>,
}

impl TableRow for SeriesRow {
    fn push_binds<'args>(&self, b: &mut Separated<'_, 'args, Postgres, &'static str>) {
        b.push_bind(self.id)
            .push_bind(self.backdrop_path.clone())
            .push_bind(self.first_air_date)
            .push_bind(self.homepage.clone())
            .push_bind(self.imdb_id.clone())
            .push_bind(self.in_production)
            .push_bind(self.last_air_date)
            .push_bind(self.name.clone())
            .push_bind(self.number_of_episodes)
            .push_bind(self.number_of_seasons)
            .push_bind(self.origin_country.clone())
            .push_bind(self.original_language.clone())
            .push_bind(self.original_name.clone())
            .push_bind(self.overview.clone())
            .push_bind(self.popularity)
            .push_bind(self.poster_path.clone())
            .push_bind(self.status.clone())
            .push_bind(self.tagline.clone())
            .push_bind(self.kind.clone())
            .push_bind(self.vote_average)
            .push_bind(self.vote_count)
            .push_bind(self.last_episode_to_air_id)
            .push_bind(self.next_episode_to_air_id);
    }

    fn dedup_key(&self) -> Option<DedupKey> {
        Some(DedupKey::Id(self.id))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatorRow {
    pub id: i64,
    pub credit_id: Option<String>,
    pub name: Option<String>,
    pub original_name: Option<String>,
    pub gender: Option<i32>,
    pub profile_path: Option<String>,
}

impl TableRow for CreatorRow {
    fn push_binds<'args>(&self, b: &mut Separated<'_, 'args, Postgres, &'static str>) {
        b.push_bind(self.id)
            .push_bind(self.credit_id.clone())
            .push_bind(self.name.clone())
            .push_bind(self.original_name.clone())
            .push_bind(self.gender)
            .push_bind(self.profile_path.clone());
    }

    fn dedup_key(&self) -> Option<DedupKey> {
        Some(DedupKey::Id(self.id))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeRow {
    pub id: i64,
    pub name: Option<String>,
    pub overview: Option<String>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<i32>,
    pub air_date: Option<NaiveDate>,
    pub episode_number: Option<i32>,
    pub episode_type: Option<String>,
    pub production_code: Option<String>,
    pub runtime: Option<i32>,
    pub season_number: Option<i32>,
    pub show_id: Option<i64>,
    pub still_path: Option<String>,
}

impl EpisodeRow {
    fn from_raw(raw: &RawEpisode) -> Option<Self> {
        raw.id.map(|id| Self {
            id,
            name: text(&raw.name),
            overview: text(&raw.overview),
            vote_average: raw.vote_average,
            vote_count: int(raw.vote_count),
            air_date: parse_date(&raw.air_date),
            episode_number: int(raw.episode_number),
            episode_type: text(&raw.episode_type),
            production_code: text(&raw.production_code),
            runtime: int(raw.runtime),
            season_number: int(raw.season_number),
            show_id: raw.show_id,
            still_path: text(&raw.still_path),
        })
    }
}

impl TableRow for EpisodeRow {
    fn push_binds<'args>(&self, b: &mut Separated<'_, 'args, Postgres, &'static str>) {
        b.push_bind(self.id)
            .push_bind(self.name.clone())
            .push_bind(self.overview.clone())
            .push_bind(self.vote_average)
            .push_bind(self.vote_count)
            .push_bind(self.air_date)
            .push_bind(self.episode_number)
            .push_bind(self.episode_type.clone())
            .push_bind(self.production_code.clone())
            .push_bind(self.runtime)
            .push_bind(self.season_number)
            .push_bind(self.show_id)
            .push_bind(self.still_path.clone());
    }

    fn dedup_key(&self) -> Option<DedupKey> {
        Some(DedupKey::Id(self.id))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkRow {
    pub id: i64,
    pub logo_path: Option<String>,
    pub name: Option<String>,
    pub origin_country: Option<String>,
}

impl TableRow for NetworkRow {
    fn push_binds<'args>(&self, b: &mut Separated<'_, 'args, Postgres, &'static str>) {
        b.push_bind(self.id)
            .push_bind(self.logo_path.clone())
            .push_bind(self.name.clone())
            .push_bind(self.origin_country.clone());
    }

    fn dedup_key(&self) -> Option<DedupKey> {
        Some(DedupKey::Id(self.id))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonRow {
    pub id: i64,
    pub air_date: Option<NaiveDate>,
    pub episode_count: Option<i32>,
    pub name: Option<String>,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub season_number: Option<i32>,
    pub vote_average: Option<f64>,
    pub series_id: i64,
}

impl TableRow for SeasonRow {
    fn push_binds<'args>(&self, b: &mut Separated<'_, 'args, Postgres, &'static str>) {
        b.push_bind(self.id)
            .push_bind(self.air_date)
            .push_bind(self.episode_count)
            .push_bind(self.name.clone())
            .push_bind(self.overview.clone())
            .push_bind(self.poster_path.clone())
            .push_bind(self.season_number)
            .push_bind(self.vote_average)
            .push_bind(self.series_id);
    }

    fn dedup_key(&self) -> Option<DedupKey> {
        Some(DedupKey::Id(self.id))
    }
}

/// Every row produced by one series payload.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesGraph {
    pub series: SeriesRow,
    pub created_by: Vec<CreatorRow>,
    pub created_by_links: Vec<IdLink>,
    pub genres: Vec<NamedRow>,
    pub genre_links: Vec<IdLink>,
    pub last_episode: Option<EpisodeRow>,
    pub next_episode: Option<EpisodeRow>,
    pub networks: Vec<NetworkRow>,
    pub network_links: Vec<IdLink>,
    pub companies: Vec<CompanyRow>,
    pub company_links: Vec<IdLink>,
    pub countries: Vec<CountryRow>,
    pub country_links: Vec<CodeLink>,
    pub seasons: Vec<SeasonRow>,
    pub languages: Vec<LanguageRow>,
    pub language_links: Vec<CodeLink>,
    pub alternative_titles: Vec<AltTitleRow>,
    pub cast: Vec<CastRow>,
    pub cast_links: Vec<IdLink>,
    pub external_ids: Option<ExternalIdsRow>,
    pub keywords: Vec<NamedRow>,
    pub keyword_links: Vec<IdLink>,
    pub videos: Vec<VideoRow>,
}

impl SeriesGraph {
    pub fn from_raw(raw: &RawSeries) -> Self {
        let id = raw.id;

        let created_by: Vec<CreatorRow> = dedup(raw.created_by.iter().filter_map(|c| {
            c.id.map(|cid| CreatorRow {
                id: cid,
                credit_id: text(&c.credit_id),
                name: text(&c.name),
                original_name: text(&c.original_name),
                gender: int(c.gender),
                profile_path: text(&c.profile_path),
            })
        }));

        let networks: Vec<NetworkRow> = dedup(raw.networks.iter().filter_map(|n| {
            n.id.map(|nid| NetworkRow {
                id: nid,
                logo_path: text(&n.logo_path),
                name: text(&n.name),
                origin_country: text(&n.origin_country),
            })
        }));

        let seasons: Vec<SeasonRow> = dedup(raw.seasons.iter().filter_map(|s| {
            s.id.map(|sid| SeasonRow {
                id: sid,
                air_date: parse_date(&s.air_date),
                episode_count: int(s.episode_count),
                name: text(&s.name),
                overview: text(&s.overview),
                poster_path: text(&s.poster_path),
                season_number: int(s.season_number),
                vote_average: s.vote_average,
                series_id: id,
            })
        }));

        let last_episode = raw.last_episode_to_air.as_ref().and_then(EpisodeRow::from_raw);
        let next_episode = raw.next_episode_to_air.as_ref().and_then(EpisodeRow::from_raw);
        let external_ids = external_ids(id, &raw.external_ids);

        let series = SeriesRow {
            id,
            backdrop_path: text(&raw.backdrop_path),
            first_air_date: parse_date(&raw.first_air_date),
            homepage: text(&raw.homepage),
            imdb_id: external_ids.as_ref().and_then(|e| e.imdb_id.clone()),
            in_production: raw.in_production,
            last_air_date: parse_date(&raw.last_air_date),
            name: text(&raw.name),
            number_of_episodes: int(raw.number_of_episodes),
            number_of_seasons: int(raw.number_of_seasons),
            origin_country: first_country(&raw.origin_country),
            original_language: text(&raw.original_language),
            original_name: text(&raw.original_name),
            overview: text(&raw.overview),
            popularity: raw.popularity,
            poster_path: text(&raw.poster_path),
            status: text(&raw.status),
            tagline: text(&raw.tagline),
            kind: text(&raw.kind),
            vote_average: raw.vote_average,
            vote_count: int(raw.vote_count),
            last_episode_to_air_id: last_episode.as_ref().map(|e| e.id),
            next_episode_to_air_id: next_episode.as_ref().map(|e| e.id),
        };

        let genres = named(&raw.genres);
        let companies = companies(&raw.production_companies);
        let countries = countries(&raw.production_countries);
        let languages = languages(&raw.spoken_languages);
        let cast = cast(&raw.credits);
        let keywords = keywords(&raw.keywords);

        Self {
            created_by_links: id_links(id, created_by.iter().map(|c| c.id)),
            genre_links: id_links(id, genres.iter().map(|g| g.id)),
            network_links: id_links(id, networks.iter().map(|n| n.id)),
            company_links: id_links(id, companies.iter().map(|c| c.id)),
            country_links: code_links(id, countries.iter().map(|c| &c.iso_3166_1)),
            language_links: code_links(id, languages.iter().map(|l| &l.iso_639_1)),
            cast_links: id_links(id, cast.iter().map(|c| c.id)),
            keyword_links: id_links(id, keywords.iter().map(|k| k.id)),
            alternative_titles: alternative_titles(id, &raw.alternative_titles),
            videos: videos(id, &raw.videos),
            series,
            created_by,
            genres,
            last_episode,
            next_episode,
            networks,
            companies,
            countries,
            seasons,
            languages,
            cast,
            external_ids,
            keywords,
        }
    }

    /// Rows grouped by destination table, in registry order.
    pub fn tables(&self) -> Vec<TableRows<'_>> {
        vec![
            rows(&tables::SERIES, std::slice::from_ref(&self.series)),
            rows(&tables::SERIES_CREATED_BY, &self.created_by),
            rows(&tables::SERIES_CREATED_BY_ASSOC, &self.created_by_links),
            rows(&tables::SERIES_GENRES, &self.genres),
            rows(&tables::SERIES_GENRES_ASSOC, &self.genre_links),
            optional_rows(&tables::SERIES_LAST_EPISODE, &self.last_episode),
            optional_rows(&tables::SERIES_NEXT_EPISODE, &self.next_episode),
            rows(&tables::SERIES_NETWORKS, &self.networks),
            rows(&tables::SERIES_NETWORKS_ASSOC, &self.network_links),
            rows(&tables::SERIES_COMPANIES, &self.companies),
            rows(&tables::SERIES_COMPANIES_ASSOC, &self.company_links),
            rows(&tables::SERIES_COUNTRIES, &self.countries),
            rows(&tables::SERIES_COUNTRIES_ASSOC, &self.country_links),
            rows(&tables::SERIES_SEASONS, &self.seasons),
            rows(&tables::SERIES_LANGUAGES, &self.languages),
            rows(&tables::SERIES_LANGUAGES_ASSOC, &self.language_links),
            rows(&tables::SERIES_ALTERNATIVE_TITLES, &self.alternative_titles),
            rows(&tables::SERIES_CAST, &self.cast),
            rows(&tables::SERIES_CAST_ASSOC, &self.cast_links),
            optional_rows(&tables::SERIES_EXTERNAL_IDS, &self.external_ids),
            rows(&tables::SERIES_KEYWORDS, &self.keywords),
            rows(&tables::SERIES_KEYWORDS_ASSOC, &self.keyword_links),
            rows(&tables::SERIES_VIDEOS, &self.videos),
        ]
    }
}

// ============================================================================
// Either kind
// ============================================================================

/// A normalized graph for either media kind.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaGraph {
    Movie(Box<MovieGraph>),
    Series(Box<SeriesGraph>),
}

impl MediaGraph {
    /// Decode a detail payload and map it to rows.
    pub fn from_value(kind: MediaKind, value: serde_json::Value) -> Result<Self, IngestError> {
        match kind {
            MediaKind::Movie => {
                let raw: RawMovie = serde_json::from_value(value)
                    .map_err(|source| IngestError::Decode { kind, source })?;
                Ok(MediaGraph::Movie(Box::new(MovieGraph::from_raw(&raw))))
            },
            MediaKind::Series => {
                let raw: RawSeries = serde_json::from_value(value)
                    .map_err(|source| IngestError::Decode { kind, source })?;
                Ok(MediaGraph::Series(Box::new(SeriesGraph::from_raw(&raw))))
            },
        }
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            MediaGraph::Movie(_) => MediaKind::Movie,
            MediaGraph::Series(_) => MediaKind::Series,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            MediaGraph::Movie(g) => g.movie.id,
            MediaGraph::Series(g) => g.series.id,
        }
    }

    pub fn tables(&self) -> Vec<TableRows<'_>> {
        match self {
            MediaGraph::Movie(g) => g.tables(),
            MediaGraph::Series(g) => g.tables(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn movie_fixture() -> serde_json::Value {
        json!({
            "id": 550,
            "title": "Fight Club",
            "release_date": "1999-10-15",
            "runtime": 139,
            "origin_country": ["US", "DE"],
            "belongs_to_collection": null,
            "genres": [
                {"id": 18, "name": "Drama"},
                {"id": 18, "name": "Drama"},
                {"id": 53, "name": "Thriller"}
            ],
            "production_countries": [{"iso_3166_1": "US", "name": "United States of America"}],
            "spoken_languages": [{"iso_639_1": "en", "english_name": "English", "name": "English"}],
            "credits": {"cast": [
                {"id": 819, "name": "Edward Norton", "order": 0},
                {"id": 819, "name": "Edward Norton", "order": 5}
            ]},
            "keywords": {"keywords": [{"id": 825, "name": "support group"}]},
            "alternative_titles": {"titles": [{"iso_3166_1": "FR", "title": "Fight Club", "type": ""}]},
            "release_dates": {"results": [{
                "iso_3166_1": "US",
                "release_dates": [
                    {"certification": "R", "release_date": "1999-10-15T00:00:00.000Z", "type": 3, "note": ""}
                ]
            }]},
            "videos": {"results": [{"id": "v1", "key": "abc", "site": "YouTube", "size": 1080,
                "type": "Trailer", "official": true, "published_at": "2014-01-01T00:00:00.000Z"}]},
            "external_ids": {"imdb_id": "tt0137523", "wikidata_id": "Q190050"}
        })
    }

    #[test]
    fn test_movie_scalars_and_lenient_fields() {
        let graph = match MediaGraph::from_value(MediaKind::Movie, movie_fixture()).unwrap() {
            MediaGraph::Movie(g) => g,
            MediaGraph::Series(_) => panic!("expected movie"),
        };

        assert_eq!(graph.movie.id, 550);
        assert_eq!(graph.movie.origin_country.as_deref(), Some("US"));
        assert_eq!(graph.movie.release_date, NaiveDate::from_ymd_opt(1999, 10, 15));
        assert_eq!(graph.movie.imdb_id.as_deref(), Some("tt0137523"));
        assert!(graph.collection.is_none());
        assert_eq!(graph.movie.belongs_to_collection_id, None);
        assert_eq!(graph.alternative_titles[0].kind, None);
        assert!(graph.release_dates[0].release_date.is_some());
    }

    #[test]
    fn test_repeated_references_deduplicated() {
        let raw: RawMovie = serde_json::from_value(movie_fixture()).unwrap();
        let graph = MovieGraph::from_raw(&raw);

        assert_eq!(graph.genres.len(), 2);
        assert_eq!(graph.genre_links.len(), 2);
        assert_eq!(graph.cast.len(), 1);
        assert_eq!(graph.cast[0].cast_order, Some(0));
        assert_eq!(graph.cast_links.len(), 1);
    }

    #[test]
    fn test_invalid_dates_become_none() {
        let raw: RawMovie = serde_json::from_value(json!({
            "id": 1,
            "release_date": "",
            "videos": {"results": [{"id": "x", "published_at": "yesterday"}]}
        }))
        .unwrap();
        let graph = MovieGraph::from_raw(&raw);

        assert_eq!(graph.movie.release_date, None);
        assert_eq!(graph.videos[0].published_at, None);
        assert!(graph.external_ids.is_none());
    }

    #[test]
    fn test_series_mapping() {
        let raw: RawSeries = serde_json::from_value(json!({
            "id": 1399,
            "name": "Game of Thrones",
            "type": "Scripted",
            "first_air_date": "2011-04-17",
            "origin_country": ["US"],
            "created_by": [{"id": 9813, "name": "David Benioff"}],
            "networks": [{"id": 49, "name": "HBO"}, {"id": 49, "name": "HBO"}],
            "seasons": [{"id": 3627, "season_number": 1, "episode_count": 10}],
            "last_episode_to_air": {"id": 1551830, "air_date": "2019-05-19", "show_id": 1399},
            "next_episode_to_air": null,
            "external_ids": {"imdb_id": "tt0944947"}
        }))
        .unwrap();
        let graph = SeriesGraph::from_raw(&raw);

        assert_eq!(graph.series.kind.as_deref(), Some("Scripted"));
        assert_eq!(graph.series.imdb_id.as_deref(), Some("tt0944947"));
        assert_eq!(graph.series.last_episode_to_air_id, Some(1551830));
        assert_eq!(graph.series.next_episode_to_air_id, None);
        assert_eq!(graph.networks.len(), 1);
        assert_eq!(graph.network_links.len(), 1);
        assert_eq!(graph.seasons[0].series_id, 1399);
    }

    #[test]
    fn test_tables_follow_registry() {
        let raw: RawSeries = serde_json::from_value(json!({"id": 1})).unwrap();
        let graph = SeriesGraph::from_raw(&raw);
        let names: Vec<_> = graph.tables().iter().map(|t| t.table.name).collect();
        let registry: Vec<_> = tables::SERIES_TABLES.iter().map(|t| t.name).collect();
        assert_eq!(names, registry);

        let raw: RawMovie = serde_json::from_value(json!({"id": 1})).unwrap();
        let names: Vec<_> = MovieGraph::from_raw(&raw).tables().iter().map(|t| t.table.name).collect();
        let registry: Vec<_> = tables::MOVIE_TABLES.iter().map(|t| t.name).collect();
        assert_eq!(names, registry);
    }

    #[test]
    fn test_decode_error_reports_kind() {
        let err = MediaGraph::from_value(MediaKind::Series, json!({"name": "no id"})).unwrap_err();
        assert!(err.to_string().contains("series"));
    }
}
