mod catalog;
mod format;
mod media;
mod player;
mod playback;
mod progress;
mod tui;


use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tracing::{info, warn};

use crate::cli::{Cli, Command};
use crate::config::{Config, PlayerConfig};
use crate::db::{Database, UnavailableStorage};
use crate::paths::database_file_path;

use self::catalog::{Catalog, Episode, Series};
use self::format::{format_updated_at, seen_summary, truncate};
use self::media::MediaSources;
use self::playback::{Route, RouteError};
use self::progress::ProgressStore;
use self::tui::Screen;

pub(crate) struct AppContext {
    pub(crate) catalog: Catalog,
    pub(crate) progress: ProgressStore,
    pub(crate) player: PlayerConfig,
}

impl AppContext {
    pub(crate) fn find_series(&self, slug: &str) -> Result<&Series> {
        self.catalog.series(slug).ok_or_else(|| {
            let known = self
                .catalog
                .all()
                .iter()
                .map(|series| series.slug.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            anyhow!("unknown series `{slug}` (available: {known})")
        })
    }

    pub(crate) fn seen(&self, series: &Series) -> Vec<u32> {
        self.progress
            .load(&series.storage_key, &series.legacy_storage_keys)
    }

    pub(crate) fn mark_watched(&self, series: &Series, episode_id: u32) -> Vec<u32> {
        self.progress.ensure_marked(
            &series.storage_key,
            episode_id,
            &series.legacy_storage_keys,
        )
    }

    pub(crate) fn toggle_watched(&self, series: &Series, episode_id: u32) -> Vec<u32> {
        self.progress
            .toggle(&series.storage_key, episode_id, &series.legacy_storage_keys)
    }

    pub(crate) fn clear_watched(&self, series: &Series) -> Vec<u32> {
        self.progress
            .clear(&series.storage_key, &series.legacy_storage_keys)
    }
}

pub fn run(cli: Cli, config: Config) -> Result<()> {
    let catalog_path = cli.catalog.clone().or(config.catalog.path.clone());
    let ctx = AppContext {
        catalog: load_catalog(catalog_path.as_deref())?,
        progress: open_progress_store(),
        player: config.player,
    };

    match cli.command {
        Some(Command::Series) => run_series(&ctx),
        Some(Command::List { series }) => run_list(&ctx, &series)?,
        Some(Command::Mark { series, episode }) => run_mark(&ctx, &series, episode)?,
        Some(Command::Toggle { series, episode }) => run_toggle(&ctx, &series, episode)?,
        Some(Command::Reset { series }) => run_reset(&ctx, &series)?,
        Some(Command::Resolve { series, episode }) => run_resolve(&ctx, &series, episode)?,
        Some(Command::Play {
            series,
            episode,
            autoplay,
        }) => {
            let series = ctx.find_series(&series)?;
            let route = Route::new(&series.base_path, episode, autoplay);
            tui::run_tui(&ctx, Screen::player(series, &route))?;
        }
        Some(Command::Open { route }) => run_open(&ctx, &route)?,
        Some(Command::Tui { series: Some(slug) }) => {
            let series = ctx.find_series(&slug)?;
            tui::run_tui(&ctx, Screen::listing(series))?;
        }
        Some(Command::Tui { series: None }) | None => {
            tui::run_tui(&ctx, Screen::listing(ctx.catalog.first()))?;
        }
    }

    Ok(())
}

fn run_series(ctx: &AppContext) {
    if !ctx.progress.is_available() {
        println!("Progress storage unavailable; showing empty progress.");
    }
    println!(
        "{:<12} {:<32} {:<12} {:<6} {:<18}",
        "SERIES", "TITLE", "SEEN", "%", "UPDATED"
    );
    for series in ctx.catalog.all() {
        let seen = ctx.seen(series);
        let updated = ctx
            .progress
            .updated_at(&series.storage_key)
            .map(|raw| format_updated_at(&raw))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<12} {:<32} {:<12} {:<6} {:<18}",
            truncate(&series.slug, 12),
            truncate(&series.title, 32),
            format!("{}/{}", seen.len(), series.episodes.len()),
            format!("{}%", series.progress_percent(seen.len())),
            updated
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ListingRow {
    pub(crate) id: u32,
    pub(crate) title: String,
    pub(crate) seen: bool,
    pub(crate) thumbnail: Option<String>,
}

pub(crate) fn listing_rows(series: &Series, seen: &[u32]) -> Vec<ListingRow> {
    series
        .episodes
        .iter()
        .map(|episode| ListingRow {
            id: episode.id,
            title: episode.title.clone(),
            seen: seen.contains(&episode.id),
            thumbnail: series.thumbnail_for(episode),
        })
        .collect()
}

fn run_list(ctx: &AppContext, slug: &str) -> Result<()> {
    let series = ctx.find_series(slug)?;
    let seen = ctx.seen(series);

    println!("{}", series.title);
    if let Some(subtitle) = series.subtitle.as_deref() {
        println!("{subtitle}");
    }
    println!(
        "{} ({}%)\n",
        seen_summary(seen.len(), series.episodes.len()),
        series.progress_percent(seen.len())
    );

    println!("{:<5} {:<44} {:<5} {:<30}", "ID", "TITLE", "SEEN", "THUMBNAIL");
    for row in listing_rows(series, &seen) {
        println!(
            "{:<5} {:<44} {:<5} {:<30}",
            row.id,
            truncate(&row.title, 44),
            if row.seen { "✓" } else { "" },
            row.thumbnail.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

fn lookup_episode<'a>(series: &'a Series, episode_id: u32) -> Option<&'a Episode> {
    let found = series.episode(episode_id);
    if found.is_none() {
        println!("Episodio no encontrado: {} #{episode_id}", series.title);
        println!("Back to the listing: vistos list {}", series.slug);
    }
    found
}

fn run_mark(ctx: &AppContext, slug: &str, episode_id: u32) -> Result<()> {
    let series = ctx.find_series(slug)?;
    let Some(episode) = lookup_episode(series, episode_id) else {
        return Ok(());
    };
    let seen = ctx.mark_watched(series, episode.id);
    println!(
        "Marked as watched: {}. {} | {}",
        episode.id,
        episode.title,
        seen_summary(seen.len(), series.episodes.len())
    );
    Ok(())
}

fn run_toggle(ctx: &AppContext, slug: &str, episode_id: u32) -> Result<()> {
    let series = ctx.find_series(slug)?;
    let Some(episode) = lookup_episode(series, episode_id) else {
        return Ok(());
    };
    let seen = ctx.toggle_watched(series, episode.id);
    let state = if seen.contains(&episode.id) {
        "watched"
    } else {
        "not watched"
    };
    println!(
        "{}. {} is now {state} | {}",
        episode.id,
        episode.title,
        seen_summary(seen.len(), series.episodes.len())
    );
    Ok(())
}

fn run_reset(ctx: &AppContext, slug: &str) -> Result<()> {
    let series = ctx.find_series(slug)?;
    ctx.clear_watched(series);
    println!("Cleared progress for {}.", series.title);
    Ok(())
}

fn run_resolve(ctx: &AppContext, slug: &str, episode_id: u32) -> Result<()> {
    let series = ctx.find_series(slug)?;
    let Some(episode) = lookup_episode(series, episode_id) else {
        return Ok(());
    };
    let sources = MediaSources::resolve(&episode.url);
    println!("Episode:    {}. {}", episode.id, episode.title);
    println!("Source:     {}", episode.url);
    match sources.identifier.as_deref() {
        Some(id) => println!("Identifier: {id}"),
        None => println!("Identifier: none (not a hosted-file link)"),
    }
    for (idx, candidate) in sources.candidates.iter().enumerate() {
        println!("Candidate {}: {candidate}", idx + 1);
    }
    println!("Preview:    {}", sources.preview_src);
    Ok(())
}

fn run_open(ctx: &AppContext, raw: &str) -> Result<()> {
    let screen = screen_for_address(&ctx.catalog, raw)?;
    tui::run_tui(ctx, screen)
}

/// Maps a player or listing address to the series that serves it.
///
/// Legacy base paths are accepted and rewritten to the series' current one.
pub(crate) fn resolve_route<'a>(
    catalog: &'a Catalog,
    route: &Route,
) -> Option<(&'a Series, Route)> {
    let series = catalog.series_by_base_path(&route.base_path)?;
    let canonical = Route::new(&series.base_path, route.episode_id, route.autoplay);
    Some((series, canonical))
}

pub(crate) fn screen_for_address(catalog: &Catalog, raw: &str) -> Result<Screen> {
    match Route::parse(raw) {
        Ok(route) => {
            let (series, route) = resolve_route(catalog, &route)
                .ok_or_else(|| anyhow!("no series is served at `{}`", route.base_path))?;
            info!(route = %route, series = %series.slug, "opening route");
            Ok(Screen::player(series, &route))
        }
        Err(RouteError::MissingEpisodeSegment(_)) => {
            let path = raw.trim().split('?').next().unwrap_or_default();
            let series = catalog
                .series_by_base_path(path)
                .ok_or_else(|| anyhow!("no series is served at `{path}`"))?;
            info!(series = %series.slug, "opening listing");
            Ok(Screen::listing(series))
        }
        Err(err) => Err(err.into()),
    }
}

fn load_catalog(path: Option<&Path>) -> Result<Catalog> {
    match path {
        Some(path) => Catalog::from_path(path)
            .with_context(|| format!("failed to load catalog {}", path.display())),
        None => Catalog::bundled().context("bundled catalog is invalid"),
    }
}

fn open_db() -> Result<Database> {
    let db_path = database_file_path()?;
    let db = Database::open(&db_path)?;
    db.migrate()?;
    Ok(db)
}

fn open_progress_store() -> ProgressStore {
    match open_db() {
        Ok(db) => ProgressStore::new(Box::new(db)),
        Err(err) => {
            warn!(error = format!("{err:#}"), "progress storage unavailable");
            ProgressStore::new(Box::new(UnavailableStorage))
        }
    }
}
