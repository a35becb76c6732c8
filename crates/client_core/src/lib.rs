use anyhow::Context;
use async_trait::async_trait;
use catalog_api::{movie_from_details, page_from_response, CatalogContext};
use reqwest::Client;
use serde::de::DeserializeOwned;
use shared::{
    domain::{Movie, MovieId, PageResult},
    error::{CatalogError, CatalogResult},
    protocol::{TmdbMovieDetails, TmdbMoviesResponse, TmdbStatusResponse},
};
use tracing::{debug, warn};

pub mod config;
pub mod coordinator;
pub mod debounce;

pub use config::{load_settings, CatalogSettings};
pub use coordinator::{
    CoordinatorState, MoviesCoordinator, Phase, StateChanges, StateField, StateSubscription,
};
pub use debounce::SearchDebouncer;

/// Read-only view of the remote movie catalog.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn list_popular(&self, page: u32) -> CatalogResult<PageResult>;
    async fn search_by_title(&self, query: &str, page: u32) -> CatalogResult<PageResult>;
    async fn get_by_id(&self, id: MovieId) -> CatalogResult<Movie>;
}

/// TMDb v3 REST client.
pub struct TmdbCatalogClient {
    http: Client,
    base_url: String,
    api_key: String,
    language: String,
    region: String,
    ctx: CatalogContext,
}

impl TmdbCatalogClient {
    pub fn new(settings: &CatalogSettings) -> anyhow::Result<Self> {
        let api_key = settings.require_api_key()?.to_string();
        let http = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .context("failed to build catalog http client")?;

        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key,
            language: settings.language.clone(),
            region: settings.region.clone(),
            ctx: CatalogContext::new(settings.image_base_url.clone()),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> CatalogResult<T> {
        let url = format!("{}{path}", self.base_url);
        debug!(%url, "catalog: GET");

        let response = self
            .http
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .query(query)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<TmdbStatusResponse>()
                .await
                .map(|body| body.status_message)
                .unwrap_or_default();
            warn!(%url, status = status.as_u16(), detail = %detail, "catalog: request rejected");
            return Err(CatalogError::from_status(status.as_u16()));
        }

        response.json::<T>().await.map_err(|err| {
            if err.is_decode() {
                CatalogError::Malformed(err.to_string())
            } else {
                transport_error(err)
            }
        })
    }
}

fn transport_error(err: reqwest::Error) -> CatalogError {
    if let Some(status) = err.status() {
        return CatalogError::from_status(status.as_u16());
    }
    warn!(error = %err, timeout = err.is_timeout(), "catalog: transport failure");
    CatalogError::network(err.to_string())
}

#[async_trait]
impl CatalogClient for TmdbCatalogClient {
    async fn list_popular(&self, page: u32) -> CatalogResult<PageResult> {
        let response: TmdbMoviesResponse = self
            .get_json(
                "/movie/popular",
                &[
                    ("page", page.max(1).to_string()),
                    ("language", self.language.clone()),
                    ("region", self.region.clone()),
                ],
            )
            .await?;
        Ok(page_from_response(&self.ctx, response))
    }

    async fn search_by_title(&self, query: &str, page: u32) -> CatalogResult<PageResult> {
        let response: TmdbMoviesResponse = self
            .get_json(
                "/search/movie",
                &[
                    ("query", query.to_string()),
                    ("language", self.language.clone()),
                    ("page", page.max(1).to_string()),
                ],
            )
            .await?;
        Ok(page_from_response(&self.ctx, response))
    }

    async fn get_by_id(&self, id: MovieId) -> CatalogResult<Movie> {
        let details: TmdbMovieDetails = self
            .get_json(
                &format!("/movie/{}", id.0),
                &[
                    ("language", self.language.clone()),
                    ("append_to_response", "credits".to_string()),
                ],
            )
            .await?;
        Ok(movie_from_details(&self.ctx, details))
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
