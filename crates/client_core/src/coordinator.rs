//! Pagination and search state behind the movie list and detail screens.
//!
//! All state lives in one [`CoordinatorState`] held by a `watch` channel.
//! Every transition is a single `send_if_modified` call, so observers never
//! see a partially applied update and are not woken when nothing visible
//! changed. The lock is never held across a catalog call.
//!
//! Out-of-order completion is handled with generations: each primary load
//! (browse page 1, a fresh search, a search clear, a reset) bumps
//! `primary_generation`, each load-more bumps `incremental_generation`, each
//! detail lookup bumps `detail_generation`. A response is applied only if the
//! generations it was issued under are still current.
//!
//! An operation future may be dropped mid-request (a timeout, an aborted
//! task). Its [`InFlight`] guard then clears the loading flag it raised,
//! provided no newer request of the same kind has taken over.

use std::sync::Arc;

use shared::domain::{Movie, MovieId, PageResult};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::CatalogClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    LoadingInitial,
    LoadingMore,
    SearchingInitial,
    /// Idle with an undismissed error.
    Error,
}

#[derive(Debug, Clone)]
pub struct CoordinatorState {
    /// Accumulated browse (popular) pages.
    pub browse_items: Arc<[Movie]>,
    /// What the list renders: `browse_items` itself outside search mode,
    /// the accumulated search results inside it.
    pub displayed_items: Arc<[Movie]>,
    pub selected_movie: Option<Arc<Movie>>,
    pub primary_loading: bool,
    pub incremental_loading: bool,
    pub detail_loading: bool,
    pub search_active: bool,
    pub query: String,
    pub page: u32,
    pub total_pages: u32,
    pub has_more: bool,
    pub last_error: Option<String>,
    /// Browse-mode `total_pages`, restored when a search is cleared.
    browse_total_pages: u32,
    primary_generation: u64,
    incremental_generation: u64,
    detail_generation: u64,
}

impl Default for CoordinatorState {
    fn default() -> Self {
        let empty: Arc<[Movie]> = Arc::from(Vec::new());
        Self {
            browse_items: Arc::clone(&empty),
            displayed_items: empty,
            selected_movie: None,
            primary_loading: false,
            incremental_loading: false,
            detail_loading: false,
            search_active: false,
            query: String::new(),
            page: 1,
            total_pages: 1,
            has_more: false,
            last_error: None,
            browse_total_pages: 1,
            primary_generation: 0,
            incremental_generation: 0,
            detail_generation: 0,
        }
    }
}

impl CoordinatorState {
    pub fn phase(&self) -> Phase {
        if self.primary_loading {
            if self.search_active {
                Phase::SearchingInitial
            } else {
                Phase::LoadingInitial
            }
        } else if self.incremental_loading {
            Phase::LoadingMore
        } else if self.last_error.is_some() {
            Phase::Error
        } else {
            Phase::Idle
        }
    }

    /// Displayed items paired with a list identity of `"<id>-<position>"`.
    /// Catalog ids repeat across pages, so the id alone is not a key.
    pub fn keyed_items(&self) -> impl Iterator<Item = (String, &Movie)> + '_ {
        self.displayed_items
            .iter()
            .enumerate()
            .map(|(position, movie)| (movie.list_key(position), movie))
    }

    pub fn is_empty(&self) -> bool {
        self.displayed_items.is_empty()
    }

    /// Fields whose value differs from `previous`. Collections and the
    /// selection compare by pointer.
    pub fn diff(&self, previous: &CoordinatorState) -> StateChanges {
        let mut changes = StateChanges::default();
        if !Arc::ptr_eq(&self.browse_items, &previous.browse_items) {
            changes.push(StateField::BrowseItems);
        }
        if !Arc::ptr_eq(&self.displayed_items, &previous.displayed_items) {
            changes.push(StateField::DisplayedItems);
        }
        let same_selection = match (&self.selected_movie, &previous.selected_movie) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        if !same_selection {
            changes.push(StateField::SelectedMovie);
        }
        if self.primary_loading != previous.primary_loading {
            changes.push(StateField::PrimaryLoading);
        }
        if self.incremental_loading != previous.incremental_loading {
            changes.push(StateField::IncrementalLoading);
        }
        if self.detail_loading != previous.detail_loading {
            changes.push(StateField::DetailLoading);
        }
        if self.search_active != previous.search_active {
            changes.push(StateField::SearchActive);
        }
        if self.query != previous.query {
            changes.push(StateField::Query);
        }
        if self.page != previous.page {
            changes.push(StateField::Page);
        }
        if self.total_pages != previous.total_pages {
            changes.push(StateField::TotalPages);
        }
        if self.has_more != previous.has_more {
            changes.push(StateField::HasMore);
        }
        if self.last_error != previous.last_error {
            changes.push(StateField::LastError);
        }
        changes
    }

    /// Starts a new primary request, superseding any in flight.
    fn begin_primary(&mut self) -> u64 {
        self.primary_generation += 1;
        self.primary_loading = false;
        self.primary_generation
    }

    /// Drops any in-flight load-more. Used on mode switches, whose page
    /// cursor the append would no longer match.
    fn cancel_incremental(&mut self) {
        self.incremental_generation += 1;
        self.incremental_loading = false;
    }

    fn apply_cursor(&mut self, page: &PageResult) {
        // A reported total below the current page means no more pages.
        self.page = page.current_page.max(1);
        self.total_pages = page.total_pages.max(self.page);
        self.has_more = page.has_more();
    }

    /// Primary loads restart from page 1 with no known further pages.
    fn restart_cursor(&mut self) {
        self.page = 1;
        self.total_pages = 1;
        self.has_more = false;
    }

    fn remember_browse_cursor(&mut self) {
        self.browse_total_pages = self.total_pages;
    }

    fn show_browse(&mut self) {
        self.displayed_items = Arc::clone(&self.browse_items);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateField {
    BrowseItems,
    DisplayedItems,
    SelectedMovie,
    PrimaryLoading,
    IncrementalLoading,
    DetailLoading,
    SearchActive,
    Query,
    Page,
    TotalPages,
    HasMore,
    LastError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateChanges {
    fields: Vec<StateField>,
}

impl StateChanges {
    fn push(&mut self, field: StateField) {
        self.fields.push(field);
    }

    pub fn contains(&self, field: StateField) -> bool {
        self.fields.contains(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = StateField> + '_ {
        self.fields.iter().copied()
    }
}

/// Observer handle. Dropping it unsubscribes.
pub struct StateSubscription {
    rx: watch::Receiver<CoordinatorState>,
    seen: CoordinatorState,
}

impl StateSubscription {
    /// Waits for the next update and returns the fields that changed since
    /// the last one this subscriber saw. `None` once the coordinator is gone.
    pub async fn changed(&mut self) -> Option<StateChanges> {
        loop {
            self.rx.changed().await.ok()?;
            let current = self.rx.borrow_and_update().clone();
            let changes = current.diff(&self.seen);
            self.seen = current;
            if !changes.is_empty() {
                return Some(changes);
            }
        }
    }

    /// The state as of the last `changed()` (or subscription time).
    pub fn current(&self) -> &CoordinatorState {
        &self.seen
    }
}

#[derive(Debug, Clone, Copy)]
enum Request {
    Primary { generation: u64 },
    Incremental { primary: u64, incremental: u64 },
    Detail { generation: u64 },
}

impl Request {
    /// Lowers the loading flag this request raised, if it still owns it.
    fn abandon(self, state: &mut CoordinatorState) -> bool {
        match self {
            Request::Primary { generation } => {
                if state.primary_generation != generation || !state.primary_loading {
                    return false;
                }
                state.primary_loading = false;
            }
            Request::Incremental {
                primary,
                incremental,
            } => {
                if state.primary_generation != primary
                    || state.incremental_generation != incremental
                    || !state.incremental_loading
                {
                    return false;
                }
                state.incremental_loading = false;
            }
            Request::Detail { generation } => {
                if state.detail_generation != generation || !state.detail_loading {
                    return false;
                }
                state.detail_loading = false;
            }
        }
        true
    }
}

/// Held across the catalog call. Completing disarms it; dropping it armed
/// means the operation future was cancelled.
struct InFlight<'a> {
    state: &'a watch::Sender<CoordinatorState>,
    request: Request,
    armed: bool,
}

impl<'a> InFlight<'a> {
    fn new(state: &'a watch::Sender<CoordinatorState>, request: Request) -> Self {
        Self {
            state,
            request,
            armed: true,
        }
    }

    fn complete(mut self) {
        self.armed = false;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let request = self.request;
        if self.state.send_if_modified(|state| request.abandon(state)) {
            debug!(?request, "movies: request cancelled, loading flag cleared");
        }
    }
}

struct LoadMoreTicket {
    primary_generation: u64,
    incremental_generation: u64,
    next_page: u32,
    search_query: Option<String>,
}

pub struct MoviesCoordinator {
    catalog: Arc<dyn CatalogClient>,
    state: watch::Sender<CoordinatorState>,
}

impl MoviesCoordinator {
    pub fn new(catalog: Arc<dyn CatalogClient>) -> Self {
        let (state, _) = watch::channel(CoordinatorState::default());
        Self { catalog, state }
    }

    pub fn snapshot(&self) -> CoordinatorState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> StateSubscription {
        let rx = self.state.subscribe();
        let seen = rx.borrow().clone();
        StateSubscription { rx, seen }
    }

    fn mutate(&self, apply: impl FnOnce(&mut CoordinatorState)) {
        self.state.send_if_modified(|state| {
            let before = state.clone();
            apply(state);
            !state.diff(&before).is_empty()
        });
    }

    /// Replaces the browse list with page 1 of the popular listing.
    pub async fn load_initial(&self) {
        let mut generation = 0;
        self.mutate(|state| {
            generation = state.begin_primary();
            state.cancel_incremental();
            state.primary_loading = true;
            state.last_error = None;
            state.restart_cursor();
            state.search_active = false;
            state.query.clear();
            state.show_browse();
        });
        info!(generation, "movies: loading popular page 1");

        let guard = InFlight::new(&self.state, Request::Primary { generation });
        let result = self.catalog.list_popular(1).await;
        guard.complete();

        self.mutate(|state| {
            if state.primary_generation != generation {
                warn!(generation, "movies: discarding superseded popular response");
                return;
            }
            state.primary_loading = false;
            match result {
                Ok(page) => {
                    info!(
                        count = page.items.len(),
                        page = page.current_page,
                        total_pages = page.total_pages,
                        "movies: popular page loaded"
                    );
                    state.apply_cursor(&page);
                    state.remember_browse_cursor();
                    state.browse_items = Arc::from(page.items);
                    state.show_browse();
                }
                Err(err) => {
                    warn!(code = ?err.code(), error = %err, "movies: popular load failed");
                    state.last_error = Some(err.to_string());
                }
            }
        });
    }

    /// Starts a fresh title search. A blank query returns to the browse list
    /// without touching the network.
    pub async fn search(&self, query: &str) {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            self.clear_search();
            return;
        }

        let mut generation = 0;
        self.mutate(|state| {
            generation = state.begin_primary();
            state.cancel_incremental();
            state.search_active = true;
            state.query = trimmed.to_string();
            state.restart_cursor();
            state.last_error = None;
            state.primary_loading = true;
        });
        info!(generation, query = %trimmed, "movies: searching");

        let guard = InFlight::new(&self.state, Request::Primary { generation });
        let result = self.catalog.search_by_title(trimmed, 1).await;
        guard.complete();

        self.mutate(|state| {
            if state.primary_generation != generation {
                warn!(generation, query = %trimmed, "movies: discarding superseded search response");
                return;
            }
            state.primary_loading = false;
            match result {
                Ok(page) => {
                    info!(
                        query = %trimmed,
                        count = page.items.len(),
                        total_pages = page.total_pages,
                        "movies: search results loaded"
                    );
                    state.apply_cursor(&page);
                    state.displayed_items = Arc::from(page.items);
                }
                Err(err) => {
                    warn!(
                        query = %trimmed,
                        code = ?err.code(),
                        error = %err,
                        "movies: search failed"
                    );
                    state.last_error = Some(err.to_string());
                }
            }
        });
    }

    fn clear_search(&self) {
        self.mutate(|state| {
            if state.search_active {
                state.begin_primary();
                state.cancel_incremental();
            }
            state.search_active = false;
            state.query.clear();
            state.show_browse();
            state.page = 1;
            state.total_pages = state.browse_total_pages.max(1);
            state.has_more = !state.browse_items.is_empty();
        });
        debug!("movies: search cleared, showing browse list");
    }

    /// Appends the next page of whichever mode is active right now.
    pub async fn load_more(&self) {
        let mut ticket = None;
        self.mutate(|state| {
            if state.incremental_loading || state.primary_loading || !state.has_more {
                return;
            }
            state.incremental_generation += 1;
            state.incremental_loading = true;
            ticket = Some(LoadMoreTicket {
                primary_generation: state.primary_generation,
                incremental_generation: state.incremental_generation,
                next_page: state.page + 1,
                search_query: state.search_active.then(|| state.query.clone()),
            });
        });
        let Some(ticket) = ticket else {
            debug!("movies: load more skipped");
            return;
        };
        info!(
            page = ticket.next_page,
            search = ticket.search_query.is_some(),
            "movies: loading more"
        );

        let guard = InFlight::new(
            &self.state,
            Request::Incremental {
                primary: ticket.primary_generation,
                incremental: ticket.incremental_generation,
            },
        );
        let result = match &ticket.search_query {
            Some(query) => self.catalog.search_by_title(query, ticket.next_page).await,
            None => self.catalog.list_popular(ticket.next_page).await,
        };
        guard.complete();

        self.mutate(|state| {
            if state.primary_generation != ticket.primary_generation
                || state.incremental_generation != ticket.incremental_generation
            {
                warn!(page = ticket.next_page, "movies: discarding stale load-more response");
                return;
            }
            state.incremental_loading = false;
            match result {
                Ok(page) => {
                    info!(
                        page = page.current_page,
                        count = page.items.len(),
                        "movies: page appended"
                    );
                    state.apply_cursor(&page);
                    state.last_error = None;
                    if ticket.search_query.is_some() {
                        state.displayed_items = appended(&state.displayed_items, page.items);
                    } else {
                        state.browse_items = appended(&state.browse_items, page.items);
                        state.remember_browse_cursor();
                        state.show_browse();
                    }
                }
                Err(err) => {
                    warn!(
                        page = ticket.next_page,
                        code = ?err.code(),
                        error = %err,
                        "movies: load more failed"
                    );
                    state.last_error = Some(err.to_string());
                }
            }
        });
    }

    /// Loads the detail record for `id`. A failure keeps the previous selection.
    pub async fn select_by_id(&self, id: MovieId) {
        let mut generation = 0;
        self.mutate(|state| {
            state.detail_generation += 1;
            generation = state.detail_generation;
            state.detail_loading = true;
            state.last_error = None;
        });
        info!(movie_id = id.0, "movies: loading details");

        let guard = InFlight::new(&self.state, Request::Detail { generation });
        let result = self.catalog.get_by_id(id).await;
        guard.complete();

        self.mutate(|state| {
            if state.detail_generation != generation {
                warn!(movie_id = id.0, "movies: discarding superseded detail response");
                return;
            }
            state.detail_loading = false;
            match result {
                Ok(movie) => state.selected_movie = Some(Arc::new(movie)),
                Err(err) => {
                    warn!(
                        movie_id = id.0,
                        code = ?err.code(),
                        error = %err,
                        "movies: detail load failed"
                    );
                    state.last_error = Some(err.to_string());
                }
            }
        });
    }

    /// Navigating away from the detail view.
    pub fn clear_selection(&self) {
        self.mutate(|state| {
            state.detail_generation += 1;
            state.detail_loading = false;
            state.selected_movie = None;
        });
    }

    /// Pull-to-refresh: re-runs the active search, or reloads the browse list.
    pub async fn refresh(&self) {
        let query = {
            let state = self.state.borrow();
            state.search_active.then(|| state.query.clone())
        };
        match query {
            Some(query) if !query.is_empty() => self.search(&query).await,
            _ => self.load_initial().await,
        }
    }

    pub fn clear_error(&self) {
        self.mutate(|state| state.last_error = None);
    }

    /// Back to the session-start state. In-flight responses are discarded.
    pub fn reset(&self) {
        self.mutate(|state| {
            let next = CoordinatorState {
                primary_generation: state.primary_generation + 1,
                incremental_generation: state.incremental_generation + 1,
                detail_generation: state.detail_generation + 1,
                ..CoordinatorState::default()
            };
            *state = next;
        });
        info!("movies: state reset");
    }
}

fn appended(existing: &[Movie], more: Vec<Movie>) -> Arc<[Movie]> {
    let mut merged = Vec::with_capacity(existing.len() + more.len());
    merged.extend_from_slice(existing);
    merged.extend(more);
    Arc::from(merged)
}

#[cfg(test)]
#[path = "tests/coordinator_tests.rs"]
mod tests;
