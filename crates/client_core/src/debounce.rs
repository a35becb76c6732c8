use std::{sync::Arc, time::Duration};

use tokio::{sync::mpsc, task::JoinHandle};
use tracing::debug;

use crate::coordinator::MoviesCoordinator;

/// Coalesces search-box input. A query reaches [`MoviesCoordinator::search`]
/// only after no newer input arrived for `window`. Each settled query runs on
/// its own task, so a newer one is issued while an older one is still in
/// flight and the coordinator discards the older response.
pub struct SearchDebouncer {
    tx: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

impl SearchDebouncer {
    pub fn spawn(coordinator: Arc<MoviesCoordinator>, window: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(coordinator, window, rx));
        Self { tx, task }
    }

    pub fn push(&self, query: impl Into<String>) {
        // The receiver only goes away together with `self`.
        let _ = self.tx.send(query.into());
    }
}

impl Drop for SearchDebouncer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    coordinator: Arc<MoviesCoordinator>,
    window: Duration,
    mut rx: mpsc::UnboundedReceiver<String>,
) {
    let mut pending: Option<String> = None;
    loop {
        let Some(query) = pending.take() else {
            match rx.recv().await {
                Some(query) => pending = Some(query),
                None => return,
            }
            continue;
        };

        tokio::select! {
            next = rx.recv() => match next {
                Some(newer) => {
                    debug!(dropped = %query, "debounce: input superseded");
                    pending = Some(newer);
                }
                None => {
                    dispatch(&coordinator, query);
                    return;
                }
            },
            _ = tokio::time::sleep(window) => dispatch(&coordinator, query),
        }
    }
}

fn dispatch(coordinator: &Arc<MoviesCoordinator>, query: String) {
    debug!(query = %query, "debounce: input settled");
    let coordinator = Arc::clone(coordinator);
    tokio::spawn(async move { coordinator.search(&query).await });
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use shared::{
        domain::{Movie, MovieId, PageResult},
        error::{CatalogError, CatalogResult},
    };
    use tokio::sync::oneshot;

    use super::*;
    use crate::CatalogClient;

    #[derive(Default)]
    struct RecordingCatalog {
        searches: Mutex<Vec<String>>,
        /// Held by the first search until released.
        first_search_gate: Mutex<Option<oneshot::Receiver<()>>>,
    }

    impl RecordingCatalog {
        fn gated() -> (Self, oneshot::Sender<()>) {
            let (tx, rx) = oneshot::channel();
            let catalog = Self {
                first_search_gate: Mutex::new(Some(rx)),
                ..Self::default()
            };
            (catalog, tx)
        }

        fn searches(&self) -> Vec<String> {
            self.searches
                .lock()
                .map(|calls| calls.clone())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl CatalogClient for RecordingCatalog {
        async fn list_popular(&self, _page: u32) -> CatalogResult<PageResult> {
            Ok(PageResult::new(Vec::new(), 1, 1))
        }

        async fn search_by_title(&self, query: &str, _page: u32) -> CatalogResult<PageResult> {
            if let Ok(mut calls) = self.searches.lock() {
                calls.push(query.to_string());
            }
            let gate = match self.first_search_gate.lock() {
                Ok(mut gate) => gate.take(),
                Err(_) => None,
            };
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            Ok(PageResult::new(vec![titled(query)], 1, 1))
        }

        async fn get_by_id(&self, _id: MovieId) -> CatalogResult<Movie> {
            Err(CatalogError::NotFound)
        }
    }

    fn titled(title: &str) -> Movie {
        Movie {
            id: MovieId(1),
            title: title.to_string(),
            release_year: None,
            director: "Unknown".into(),
            genres: Vec::new(),
            overview: String::new(),
            poster_url: String::new(),
            runtime_label: "Unknown".into(),
            language: "en".into(),
            country: "Unknown".into(),
            cast: Vec::new(),
            rating: 0.0,
        }
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_input_issues_one_search() {
        let catalog = Arc::new(RecordingCatalog::default());
        let coordinator = Arc::new(MoviesCoordinator::new(catalog.clone()));
        let debouncer = SearchDebouncer::spawn(coordinator.clone(), Duration::from_millis(500));

        for query in ["i", "in", "inc", "ince"] {
            debouncer.push(query);
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(catalog.searches().is_empty());

        tokio::time::sleep(Duration::from_millis(600)).await;
        settle().await;

        assert_eq!(catalog.searches(), vec!["ince".to_string()]);
        assert_eq!(coordinator.snapshot().query, "ince");
    }

    #[tokio::test(start_paused = true)]
    async fn stable_inputs_each_search() {
        let catalog = Arc::new(RecordingCatalog::default());
        let coordinator = Arc::new(MoviesCoordinator::new(catalog.clone()));
        let debouncer = SearchDebouncer::spawn(coordinator, Duration::from_millis(200));

        debouncer.push("alien");
        tokio::time::sleep(Duration::from_millis(300)).await;
        settle().await;
        debouncer.push("aliens");
        tokio::time::sleep(Duration::from_millis(300)).await;
        settle().await;

        assert_eq!(
            catalog.searches(),
            vec!["alien".to_string(), "aliens".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn newer_query_overtakes_search_in_flight() {
        let (catalog, release_first) = RecordingCatalog::gated();
        let catalog = Arc::new(catalog);
        let coordinator = Arc::new(MoviesCoordinator::new(catalog.clone()));
        let debouncer = SearchDebouncer::spawn(coordinator.clone(), Duration::from_millis(20));

        debouncer.push("a");
        tokio::time::sleep(Duration::from_millis(50)).await;
        settle().await;
        assert_eq!(catalog.searches(), vec!["a".to_string()]);
        assert!(coordinator.snapshot().primary_loading);

        debouncer.push("ab");
        tokio::time::sleep(Duration::from_millis(50)).await;
        settle().await;
        assert_eq!(catalog.searches(), vec!["a".to_string(), "ab".to_string()]);

        let state = coordinator.snapshot();
        assert_eq!(state.query, "ab");
        assert!(!state.primary_loading);
        assert_eq!(state.displayed_items[0].title, "ab");

        let _ = release_first.send(());
        settle().await;
        let state = coordinator.snapshot();
        assert_eq!(state.displayed_items.len(), 1);
        assert_eq!(state.displayed_items[0].title, "ab");
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_debouncer_after_dispatch_lets_search_finish() {
        let catalog = Arc::new(RecordingCatalog::default());
        let coordinator = Arc::new(MoviesCoordinator::new(catalog.clone()));
        let debouncer = SearchDebouncer::spawn(coordinator.clone(), Duration::from_millis(20));

        debouncer.push("heat");
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(debouncer);
        settle().await;

        let state = coordinator.snapshot();
        assert_eq!(state.query, "heat");
        assert!(!state.primary_loading);
        assert_eq!(state.displayed_items[0].title, "heat");
    }
}
