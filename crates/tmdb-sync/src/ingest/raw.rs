//! Catalog API detail payloads
//!
//! These mirror the JSON returned by `/movie/{id}` and `/tv/{id}` with
//! `append_to_response`. Every field is optional or defaulted: the API omits
//! keys freely and sends `null` for empty lists.

use serde::{Deserialize, Deserializer};

/// Treat an explicit `null` list the same as a missing one.
fn nullable<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================================================
// Shared references
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawNamed {
    pub id: Option<i64>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCompany {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub origin_country: Option<String>,
    pub logo_path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCountry {
    pub iso_3166_1: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawLanguage {
    pub iso_639_1: Option<String>,
    pub english_name: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCast {
    pub id: Option<i64>,
    pub adult: Option<bool>,
    pub gender: Option<i64>,
    pub cast_id: Option<i64>,
    pub name: Option<String>,
    pub original_name: Option<String>,
    pub known_for_department: Option<String>,
    pub popularity: Option<f64>,
    pub profile_path: Option<String>,
    pub character: Option<String>,
    pub order: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCredits {
    #[serde(default, deserialize_with = "nullable")]
    pub cast: Vec<RawCast>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAltTitle {
    pub iso_3166_1: Option<String>,
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Movies return `titles`, series return `results`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAltTitles {
    #[serde(default, alias = "results", deserialize_with = "nullable")]
    pub titles: Vec<RawAltTitle>,
}

/// Movies return `keywords`, series return `results`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawKeywords {
    #[serde(default, alias = "results", deserialize_with = "nullable")]
    pub keywords: Vec<RawNamed>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawVideo {
    pub id: Option<String>,
    pub iso_639_1: Option<String>,
    pub iso_3166_1: Option<String>,
    pub name: Option<String>,
    pub key: Option<String>,
    pub site: Option<String>,
    pub size: Option<i64>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub official: Option<bool>,
    pub published_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawVideos {
    #[serde(default, deserialize_with = "nullable")]
    pub results: Vec<RawVideo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawExternalIds {
    pub imdb_id: Option<String>,
    pub wikidata_id: Option<String>,
    pub facebook_id: Option<String>,
    pub instagram_id: Option<String>,
    pub twitter_id: Option<String>,
}

// ============================================================================
// Movie
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCollection {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawReleaseDate {
    pub certification: Option<String>,
    pub release_date: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<i64>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawReleaseCountry {
    pub iso_3166_1: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub release_dates: Vec<RawReleaseDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawReleaseDates {
    #[serde(default, deserialize_with = "nullable")]
    pub results: Vec<RawReleaseCountry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMovie {
    pub id: i64,
    pub backdrop_path: Option<String>,
    pub belongs_to_collection: Option<RawCollection>,
    pub budget: Option<i64>,
    #[serde(default, deserialize_with = "nullable")]
    pub genres: Vec<RawNamed>,
    pub homepage: Option<String>,
    pub imdb_id: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub origin_country: Vec<String>,
    pub original_language: Option<String>,
    pub original_title: Option<String>,
    pub overview: Option<String>,
    pub popularity: Option<f64>,
    pub poster_path: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub production_companies: Vec<RawCompany>,
    #[serde(default, deserialize_with = "nullable")]
    pub production_countries: Vec<RawCountry>,
    pub release_date: Option<String>,
    pub revenue: Option<i64>,
    pub runtime: Option<i64>,
    #[serde(default, deserialize_with = "nullable")]
    pub spoken_languages: Vec<RawLanguage>,
    pub status: Option<String>,
    pub tagline: Option<String>,
    pub title: Option<String>,
    pub video: Option<bool>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<i64>,
    pub alternative_titles: Option<RawAltTitles>,
    pub credits: Option<RawCredits>,
    pub external_ids: Option<RawExternalIds>,
    pub keywords: Option<RawKeywords>,
    pub release_dates: Option<RawReleaseDates>,
    pub videos: Option<RawVideos>,
}

// ============================================================================
// Series
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCreator {
    pub id: Option<i64>,
    pub credit_id: Option<String>,
    pub name: Option<String>,
    pub original_name: Option<String>,
    pub gender: Option<i64>,
    pub profile_path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEpisode {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub overview: Option<String>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<i64>,
    pub air_date: Option<String>,
    pub episode_number: Option<i64>,
    pub episode_type: Option<String>,
    pub production_code: Option<String>,
    pub runtime: Option<i64>,
    pub season_number: Option<i64>,
    pub show_id: Option<i64>,
    pub still_path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawNetwork {
    pub id: Option<i64>,
    pub logo_path: Option<String>,
    pub name: Option<String>,
    pub origin_country: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSeason {
    pub id: Option<i64>,
    pub air_date: Option<String>,
    pub episode_count: Option<i64>,
    pub name: Option<String>,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub season_number: Option<i64>,
    pub vote_average: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSeries {
    pub id: i64,
    pub backdrop_path: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub created_by: Vec<RawCreator>,
    pub first_air_date: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub genres: Vec<RawNamed>,
    pub homepage: Option<String>,
    pub in_production: Option<bool>,
    pub last_air_date: Option<String>,
    pub last_episode_to_air: Option<RawEpisode>,
    pub name: Option<String>,
    pub next_episode_to_air: Option<RawEpisode>,
    #[serde(default, deserialize_with = "nullable")]
    pub networks: Vec<RawNetwork>,
    pub number_of_episodes: Option<i64>,
    pub number_of_seasons: Option<i64>,
    #[serde(default, deserialize_with = "nullable")]
    pub origin_country: Vec<String>,
    pub original_language: Option<String>,
    pub original_name: Option<String>,
    pub overview: Option<String>,
    pub popularity: Option<f64>,
    pub poster_path: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub production_companies: Vec<RawCompany>,
    #[serde(default, deserialize_with = "nullable")]
    pub production_countries: Vec<RawCountry>,
    #[serde(default, deserialize_with = "nullable")]
    pub seasons: Vec<RawSeason>,
    #[serde(default, deserialize_with = "nullable")]
    pub spoken_languages: Vec<RawLanguage>,
    pub status: Option<String>,
    pub tagline: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<i64>,
    pub alternative_titles: Option<RawAltTitles>,
    pub credits: Option<RawCredits>,
    pub external_ids: Option<RawExternalIds>,
    pub keywords: Option<RawKeywords>,
    pub videos: Option<RawVideos>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_lists_become_empty() {
        let raw: RawMovie =
            serde_json::from_value(json!({"id": 1, "genres": null, "spoken_languages": null}))
                .unwrap();
        assert!(raw.genres.is_empty());
        assert!(raw.spoken_languages.is_empty());
        assert!(raw.credits.is_none());
    }

    #[test]
    fn test_series_sub_resources_use_results_key() {
        let raw: RawSeries = serde_json::from_value(json!({
            "id": 1399,
            "alternative_titles": {"results": [{"iso_3166_1": "US", "title": "GoT", "type": ""}]},
            "keywords": {"results": [{"id": 6091, "name": "war"}]}
        }))
        .unwrap();
        assert_eq!(raw.alternative_titles.unwrap().titles.len(), 1);
        assert_eq!(raw.keywords.unwrap().keywords[0].id, Some(6091));
    }
}
