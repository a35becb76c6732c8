//! Normalization of raw TMDb records into the catalog domain.
//!
//! Everything here is pure: no I/O, no clocks, no shared state.

use chrono::{Datelike, NaiveDate};
use shared::{
    domain::{Movie, MovieId, PageResult, UNKNOWN},
    protocol::{TmdbMovie, TmdbMovieDetails, TmdbMoviesResponse},
};
use tracing::debug;

pub const DEFAULT_IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p/w500";
pub const MAX_CAST_MEMBERS: usize = 5;
const DIRECTOR_JOB: &str = "Director";

const GENRES: &[(i64, &str)] = &[
    (28, "Action"),
    (12, "Adventure"),
    (16, "Animation"),
    (35, "Comedy"),
    (80, "Crime"),
    (99, "Documentary"),
    (18, "Drama"),
    (10751, "Family"),
    (14, "Fantasy"),
    (36, "History"),
    (27, "Horror"),
    (10402, "Music"),
    (9648, "Mystery"),
    (10749, "Romance"),
    (878, "Science Fiction"),
    (10770, "TV Movie"),
    (53, "Thriller"),
    (10752, "War"),
    (37, "Western"),
];

#[derive(Debug, Clone)]
pub struct CatalogContext {
    pub image_base_url: String,
}

impl Default for CatalogContext {
    fn default() -> Self {
        Self {
            image_base_url: DEFAULT_IMAGE_BASE_URL.into(),
        }
    }
}

impl CatalogContext {
    pub fn new(image_base_url: impl Into<String>) -> Self {
        Self {
            image_base_url: image_base_url.into(),
        }
    }

    pub fn poster_url(&self, poster_path: Option<&str>) -> String {
        match poster_path {
            Some(path) if !path.is_empty() => {
                format!("{}{path}", self.image_base_url.trim_end_matches('/'))
            }
            _ => String::new(),
        }
    }
}

pub fn genre_name(genre_id: i64) -> &'static str {
    GENRES
        .iter()
        .find(|(id, _)| *id == genre_id)
        .map(|(_, name)| *name)
        .unwrap_or_else(|| {
            debug!(genre_id, "catalog: unmapped genre id");
            UNKNOWN
        })
}

/// Year of a `YYYY-MM-DD` release date; `None` for absent or invalid dates.
pub fn release_year(release_date: Option<&str>) -> Option<i32> {
    let raw = release_date?.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|date| date.year())
}

pub fn runtime_label(runtime_minutes: Option<u32>) -> String {
    match runtime_minutes {
        Some(minutes) if minutes > 0 => format!("{minutes} min"),
        _ => UNKNOWN.to_string(),
    }
}

/// Summary records carry no credits, runtime or country.
pub fn movie_from_summary(ctx: &CatalogContext, movie: TmdbMovie) -> Movie {
    Movie {
        id: MovieId(movie.id),
        release_year: release_year(movie.release_date.as_deref()),
        director: UNKNOWN.to_string(),
        genres: movie
            .genre_ids
            .iter()
            .map(|id| genre_name(*id).to_string())
            .collect(),
        overview: movie.overview.unwrap_or_default(),
        poster_url: ctx.poster_url(movie.poster_path.as_deref()),
        runtime_label: UNKNOWN.to_string(),
        language: movie.original_language,
        country: UNKNOWN.to_string(),
        cast: Vec::new(),
        rating: movie.vote_average,
        title: movie.title,
    }
}

pub fn movie_from_details(ctx: &CatalogContext, details: TmdbMovieDetails) -> Movie {
    let credits = details.credits.unwrap_or_default();
    let director = credits
        .crew
        .iter()
        .find(|person| person.job == DIRECTOR_JOB)
        .map(|person| person.name.clone())
        .unwrap_or_else(|| UNKNOWN.to_string());
    let cast = credits
        .cast
        .into_iter()
        .take(MAX_CAST_MEMBERS)
        .map(|actor| actor.name)
        .collect();
    let country = details
        .production_countries
        .into_iter()
        .next()
        .map(|country| country.name)
        .unwrap_or_else(|| UNKNOWN.to_string());

    Movie {
        id: MovieId(details.id),
        release_year: release_year(details.release_date.as_deref()),
        director,
        genres: details.genres.into_iter().map(|genre| genre.name).collect(),
        overview: details.overview.unwrap_or_default(),
        poster_url: ctx.poster_url(details.poster_path.as_deref()),
        runtime_label: runtime_label(details.runtime),
        language: details.original_language,
        country,
        cast,
        rating: details.vote_average,
        title: details.title,
    }
}

pub fn page_from_response(ctx: &CatalogContext, response: TmdbMoviesResponse) -> PageResult {
    let items = response
        .results
        .into_iter()
        .map(|movie| movie_from_summary(ctx, movie))
        .collect();
    PageResult::new(
        items,
        page_number(response.page),
        page_number(response.total_pages),
    )
}

fn page_number(raw: i64) -> u32 {
    u32::try_from(raw.max(0)).unwrap_or(u32::MAX)
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
