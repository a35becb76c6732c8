//! Wire records returned by the TMDb v3 REST API.
//!
//! Fields the upstream may omit or null out are defaulted so that a sparse
//! record still decodes; normalization decides what the gaps mean.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TmdbMovie {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub genre_ids: Vec<i64>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub original_language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmdbGenre {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmdbProductionCountry {
    #[serde(default)]
    pub iso_3166_1: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmdbCastMember {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub character: Option<String>,
    #[serde(default)]
    pub order: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmdbCrewMember {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub job: String,
    #[serde(default)]
    pub department: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TmdbCredits {
    #[serde(default)]
    pub cast: Vec<TmdbCastMember>,
    #[serde(default)]
    pub crew: Vec<TmdbCrewMember>,
}

/// `/movie/{id}` with `append_to_response=credits`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TmdbMovieDetails {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub genres: Vec<TmdbGenre>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub original_language: String,
    #[serde(default)]
    pub runtime: Option<u32>,
    #[serde(default)]
    pub production_countries: Vec<TmdbProductionCountry>,
    #[serde(default)]
    pub credits: Option<TmdbCredits>,
}

/// Paginated envelope shared by `/movie/popular` and `/search/movie`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmdbMoviesResponse {
    pub page: i64,
    #[serde(default)]
    pub results: Vec<TmdbMovie>,
    #[serde(default)]
    pub total_pages: i64,
}

/// Error body TMDb attaches to non-2xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmdbStatusResponse {
    #[serde(default)]
    pub status_code: i64,
    #[serde(default)]
    pub status_message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_summary_record_decodes() {
        let raw = r#"{"id": 7, "title": "Sparse", "poster_path": null, "release_date": ""}"#;
        let movie: TmdbMovie = serde_json::from_str(raw).expect("decode");
        assert_eq!(movie.id, 7);
        assert!(movie.genre_ids.is_empty());
        assert_eq!(movie.poster_path, None);
        assert_eq!(movie.release_date.as_deref(), Some(""));
    }

    #[test]
    fn details_without_credits_decode() {
        let raw = r#"{"id": 9, "title": "Bare", "runtime": null, "genres": [{"id": 18, "name": "Drama"}]}"#;
        let details: TmdbMovieDetails = serde_json::from_str(raw).expect("decode");
        assert!(details.credits.is_none());
        assert_eq!(details.runtime, None);
        assert_eq!(details.genres[0].name, "Drama");
    }

    #[test]
    fn unmodeled_fields_are_ignored() {
        let raw = r#"{"page": 2, "results": [], "total_pages": 5, "total_results": 97}"#;
        let envelope: TmdbMoviesResponse = serde_json::from_str(raw).expect("decode");
        assert_eq!((envelope.page, envelope.total_pages), (2, 5));

        let raw = r#"{"id": 1, "title": "Heat", "revenue": 187436818, "budget": 60000000}"#;
        let details: TmdbMovieDetails = serde_json::from_str(raw).expect("decode");
        assert_eq!(details.title, "Heat");
    }
}
