use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// Catalog ids are not unique within a listing; see `Movie::list_key`.
id_newtype!(MovieId);

pub const UNKNOWN: &str = "Unknown";

/// Normalized catalog entry. Built once by the normalizers and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: MovieId,
    pub title: String,
    /// `None` when the upstream release date is absent or unparseable.
    pub release_year: Option<i32>,
    pub director: String,
    pub genres: Vec<String>,
    pub overview: String,
    pub poster_url: String,
    pub runtime_label: String,
    pub language: String,
    pub country: String,
    pub cast: Vec<String>,
    pub rating: f64,
}

impl Movie {
    /// Identity for list rendering. Position disambiguates repeated ids
    /// across concatenated pages.
    pub fn list_key(&self, position: usize) -> String {
        format!("{}-{position}", self.id)
    }

    pub fn has_poster(&self) -> bool {
        !self.poster_url.is_empty()
    }
}

/// One page of a paginated catalog listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    pub items: Vec<Movie>,
    pub current_page: u32,
    pub total_pages: u32,
}

impl PageResult {
    /// Both cursors are clamped to at least 1. A reported total below the
    /// current page is kept and yields `has_more() == false`.
    pub fn new(items: Vec<Movie>, current_page: u32, total_pages: u32) -> Self {
        Self {
            items,
            current_page: current_page.max(1),
            total_pages: total_pages.max(1),
        }
    }

    pub fn has_more(&self) -> bool {
        self.current_page < self.total_pages
    }
}
