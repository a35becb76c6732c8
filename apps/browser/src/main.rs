use std::{io::Write as _, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    config::{apply_env_overrides, load_settings_from},
    load_settings, CoordinatorState, MoviesCoordinator, Phase, SearchDebouncer, StateField,
    StateSubscription, TmdbCatalogClient,
};
use shared::domain::{Movie, MovieId};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Browse and search the TMDb movie catalog from a terminal")]
struct Args {
    /// Settings file; defaults to ./catalog.toml or $CATALOG_CONFIG.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    api_key: Option<String>,
    /// Rows printed by `list`.
    #[arg(long, default_value_t = 20)]
    rows: usize,
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    List,
    More,
    Search(String),
    ClearSearch,
    Show(Target),
    Back,
    Refresh,
    Reset,
    Dismiss,
    Help,
    Quit,
}

#[derive(Debug, PartialEq, Eq)]
enum Target {
    Id(MovieId),
    Position(usize),
}

fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (word, rest) = line
        .split_once(char::is_whitespace)
        .map(|(word, rest)| (word, rest.trim()))
        .unwrap_or((line, ""));

    match word {
        "" | "list" | "ls" => Ok(Command::List),
        "more" | "m" => Ok(Command::More),
        "search" | "s" | "/" if rest.is_empty() => Ok(Command::ClearSearch),
        "search" | "s" | "/" => Ok(Command::Search(rest.to_string())),
        "clear" => Ok(Command::ClearSearch),
        "show" => parse_target(rest).map(Command::Show),
        "back" => Ok(Command::Back),
        "refresh" | "r" => Ok(Command::Refresh),
        "reset" => Ok(Command::Reset),
        "dismiss" | "ok" => Ok(Command::Dismiss),
        "help" | "?" => Ok(Command::Help),
        "quit" | "q" | "exit" => Ok(Command::Quit),
        other => Err(format!("unknown command `{other}`; try `help`")),
    }
}

fn parse_target(raw: &str) -> Result<Target, String> {
    if let Some(position) = raw.strip_prefix('#') {
        return position
            .parse::<usize>()
            .map(Target::Position)
            .map_err(|_| format!("invalid list position `{raw}`"));
    }
    raw.parse::<i64>()
        .map(|id| Target::Id(MovieId(id)))
        .map_err(|_| format!("expected a movie id or #position, got `{raw}`"))
}

const HELP: &str = "\
commands:
  list                 show the current list
  more                 load the next page
  search <title>       search by title (debounced)
  clear                leave search and show popular movies
  show <id> | #<pos>   movie details
  back                 close the detail view
  refresh              reload the current list
  reset                forget everything
  dismiss              dismiss the current error
  quit";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = match &args.config {
        Some(path) => {
            let mut settings = load_settings_from(path)?;
            apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
            settings
        }
        None => load_settings(),
    };
    if let Some(key) = args.api_key {
        settings.api_key = Some(key);
    }

    let client = TmdbCatalogClient::new(&settings)?;
    let coordinator = Arc::new(MoviesCoordinator::new(Arc::new(client)));
    let debouncer = SearchDebouncer::spawn(coordinator.clone(), settings.search_debounce());
    let notices = tokio::spawn(report_changes(coordinator.subscribe()));
    info!(base_url = %settings.base_url, "browser: starting");

    coordinator.load_initial().await;
    print_list(&coordinator.snapshot(), args.rows);
    prompt();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        match parse_command(&line) {
            Ok(Command::List) => print_list(&coordinator.snapshot(), args.rows),
            Ok(Command::More) => {
                coordinator.load_more().await;
                print_list(&coordinator.snapshot(), args.rows);
            }
            Ok(Command::Search(query)) => debouncer.push(query),
            Ok(Command::ClearSearch) => debouncer.push(""),
            Ok(Command::Show(target)) => match resolve_target(&coordinator.snapshot(), target) {
                Some(id) => {
                    coordinator.select_by_id(id).await;
                    if let Some(movie) = coordinator.snapshot().selected_movie.as_deref() {
                        print_details(movie);
                    }
                }
                None => println!("no movie at that position"),
            },
            Ok(Command::Back) => coordinator.clear_selection(),
            Ok(Command::Refresh) => {
                coordinator.refresh().await;
                print_list(&coordinator.snapshot(), args.rows);
            }
            Ok(Command::Reset) => coordinator.reset(),
            Ok(Command::Dismiss) => coordinator.clear_error(),
            Ok(Command::Help) => println!("{HELP}"),
            Ok(Command::Quit) => break,
            Err(message) => println!("{message}"),
        }
        prompt();
    }

    notices.abort();
    Ok(())
}

fn resolve_target(state: &CoordinatorState, target: Target) -> Option<MovieId> {
    match target {
        Target::Id(id) => Some(id),
        Target::Position(position) => state.displayed_items.get(position).map(|m| m.id),
    }
}

/// Surfaces asynchronous outcomes (debounced searches, errors) as they land.
async fn report_changes(mut subscription: StateSubscription) {
    while let Some(changes) = subscription.changed().await {
        let state = subscription.current();
        if changes.contains(StateField::LastError) {
            if let Some(error) = &state.last_error {
                println!("\n! {error} (`dismiss` to clear)");
            }
        }
        if changes.contains(StateField::PrimaryLoading) && state.phase() == Phase::SearchingInitial
        {
            println!("\nSearching movies...");
        }
        if changes.contains(StateField::DisplayedItems) && state.search_active {
            println!(
                "\n{} results for \"{}\" (`list` to show)",
                state.displayed_items.len(),
                state.query
            );
        }
    }
}

fn prompt() {
    print!("movies> ");
    let _ = std::io::stdout().flush();
}

fn print_list(state: &CoordinatorState, rows: usize) {
    if state.is_empty() {
        if state.search_active {
            println!("No movies found matching your search.");
        } else {
            println!("No movies available.");
        }
        return;
    }

    let heading = if state.search_active {
        format!("Search: \"{}\"", state.query)
    } else {
        "Popular movies".to_string()
    };
    println!("{heading} (page {}/{})", state.page, state.total_pages);

    let shown = state.displayed_items.len().saturating_sub(rows);
    for (position, (key, movie)) in state.keyed_items().enumerate().skip(shown) {
        println!(
            "#{position:<4} {key:<14} {} ({}) {:.1}",
            movie.title,
            year_label(movie),
            movie.rating
        );
    }

    if state.has_more {
        println!("-- `more` for page {} --", state.page + 1);
    } else {
        println!("-- You've reached the end! --");
    }
}

fn print_details(movie: &Movie) {
    println!("{} ({})", movie.title, year_label(movie));
    println!("  Director: {}", movie.director);
    println!("  Genre:    {}", movie.genres.join(", "));
    println!("  Runtime:  {}", movie.runtime_label);
    println!("  Language: {}", movie.language);
    println!("  Country:  {}", movie.country);
    println!("  Rating:   {:.1}", movie.rating);
    if !movie.cast.is_empty() {
        println!("  Cast:     {}", movie.cast.join(", "));
    }
    if movie.has_poster() {
        println!("  Poster:   {}", movie.poster_url);
    }
    if !movie.overview.is_empty() {
        println!("\n{}", movie.overview);
    }
}

fn year_label(movie: &Movie) -> String {
    movie
        .release_year
        .map(|year| year.to_string())
        .unwrap_or_else(|| "N/A".to_string())
}
