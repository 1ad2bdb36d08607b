mod actions;
mod render;
mod session;

use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::TableState;
use tracing::info;

use super::{AppContext, resolve_route};
use super::catalog::Series;
use super::playback::{PlaybackController, PlayerEffect, PlayerEvent, Route};
use super::player::{MpvSession, PlayerSignal};

use self::actions::{
    apply_effects, mount_player, open_preview, refresh_seen, status_error, status_info,
};
use self::render::draw_tui;
use self::session::TuiSession;

const FALLBACK_NOTICE: &str = "Este reproductor no permite saltar intro ni resumen.";
const NOT_FOUND: &str = "Episodio no encontrado";

pub(crate) struct ListingView {
    pub(super) slug: String,
    pub(super) seen: Vec<u32>,
    pub(super) table_state: TableState,
    pub(super) pending_reset: bool,
}

pub(crate) struct PlayerView {
    pub(super) slug: String,
    pub(super) route: Route,
    /// `None` when the route names an episode missing from the catalog.
    pub(super) controller: Option<PlaybackController>,
}

pub(crate) enum Screen {
    Listing(ListingView),
    Player(PlayerView),
}

impl Screen {
    pub(crate) fn listing(series: &Series) -> Self {
        Self::listing_at(series, None)
    }

    pub(crate) fn listing_at(series: &Series, episode_id: Option<u32>) -> Self {
        let mut table_state = TableState::default();
        let selected = episode_id
            .and_then(|id| series.episodes.iter().position(|episode| episode.id == id))
            .or((!series.episodes.is_empty()).then_some(0));
        table_state.select(selected);
        Self::Listing(ListingView {
            slug: series.slug.clone(),
            seen: Vec::new(),
            table_state,
            pending_reset: false,
        })
    }

    pub(crate) fn player(series: &Series, route: &Route) -> Self {
        let controller = series
            .episode(route.episode_id)
            .map(|episode| PlaybackController::new(series, episode, route.autoplay));
        Self::Player(PlayerView {
            slug: series.slug.clone(),
            route: route.clone(),
            controller,
        })
    }
}

pub(crate) fn run_tui(ctx: &AppContext, initial: Screen) -> Result<()> {
    let mut session = TuiSession::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))
        .context("failed to initialize terminal backend")?;
    terminal.clear()?;

    let mut player: Option<MpvSession> = None;
    let mut status = status_info("Ready.");
    let mut screen = initial;
    enter_screen(ctx, &mut screen, &mut player, &mut status);

    loop {
        if let Some(route) = drain_player_signals(ctx, &mut screen, &mut player, &mut status) {
            navigate(ctx, &mut screen, &route, &mut player, &mut status);
        }

        terminal.draw(|frame| draw_tui(frame, ctx, &mut screen, &status))?;

        if !event::poll(Duration::from_millis(200))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        if quits(&screen, key.code) {
            break;
        }

        let next = match &mut screen {
            Screen::Listing(view) => handle_listing_key(ctx, view, key.code, &mut status),
            Screen::Player(view) => {
                handle_player_key(ctx, view, key.code, &mut player, &mut status)
            }
        };
        if let Some(next) = next {
            screen = next;
            enter_screen(ctx, &mut screen, &mut player, &mut status);
        }
    }

    drop(player);
    terminal.show_cursor()?;
    session.leave()?;
    Ok(())
}

/// `q` quits everywhere except the confirm-clear dialog, where it cancels.
pub(super) fn quits(screen: &Screen, code: KeyCode) -> bool {
    code == KeyCode::Char('q') && !matches!(screen, Screen::Listing(view) if view.pending_reset)
}

pub(super) fn enter_screen(
    ctx: &AppContext,
    screen: &mut Screen,
    player: &mut Option<MpvSession>,
    status: &mut String,
) {
    match screen {
        Screen::Listing(view) => {
            // Leaving the player view discards its playback session.
            *player = None;
            refresh_seen(ctx, view);
        }
        Screen::Player(view) => mount_player(ctx, view, player, status),
    }
}

fn navigate(
    ctx: &AppContext,
    screen: &mut Screen,
    route: &Route,
    player: &mut Option<MpvSession>,
    status: &mut String,
) {
    let Some((series, route)) = resolve_route(&ctx.catalog, route) else {
        *status = status_error(&format!("No series is served at {}", route.base_path));
        return;
    };
    info!(route = %route, "navigating");
    *screen = Screen::player(series, &route);
    enter_screen(ctx, screen, player, status);
}

fn drain_player_signals(
    ctx: &AppContext,
    screen: &mut Screen,
    player: &mut Option<MpvSession>,
    status: &mut String,
) -> Option<Route> {
    let signals = player.as_ref()?.drain_signals();
    let Screen::Player(view) = screen else {
        return None;
    };

    for signal in signals {
        match signal {
            PlayerSignal::Event(event) => {
                let Some(controller) = view.controller.as_mut() else {
                    continue;
                };
                let effects = controller.handle(event);
                if let Some(route) = apply_effects(ctx, effects, player, status) {
                    return Some(route);
                }
            }
            PlayerSignal::Closed => {
                *player = None;
                *status = status_info("Player closed. Press Enter to reopen it.");
                return None;
            }
        }
    }
    None
}

pub(super) fn handle_listing_key(
    ctx: &AppContext,
    view: &mut ListingView,
    code: KeyCode,
    status: &mut String,
) -> Option<Screen> {
    let series = ctx.catalog.series(&view.slug)?;

    if view.pending_reset {
        match code {
            KeyCode::Char('y') | KeyCode::Enter => {
                view.pending_reset = false;
                view.seen = ctx.clear_watched(series);
                *status = status_info("Progress cleared.");
            }
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('q') => {
                view.pending_reset = false;
                *status = status_info("Clear canceled.");
            }
            _ => {}
        }
        return None;
    }

    let selected = view
        .table_state
        .selected()
        .and_then(|idx| series.episodes.get(idx));

    match code {
        KeyCode::Up => {
            if let Some(idx) = view.table_state.selected() {
                view.table_state.select(Some(idx.saturating_sub(1)));
            }
        }
        KeyCode::Down => {
            if let Some(idx) = view.table_state.selected()
                && !series.episodes.is_empty()
            {
                let next = (idx + 1).min(series.episodes.len() - 1);
                view.table_state.select(Some(next));
            }
        }
        KeyCode::Char(' ') => {
            let episode = selected?;
            view.seen = ctx.toggle_watched(series, episode.id);
            let state = if view.seen.contains(&episode.id) {
                "watched"
            } else {
                "not watched"
            };
            *status = status_info(&format!("Episode {} marked {state}.", episode.id));
        }
        KeyCode::Enter => {
            let episode = selected?;
            view.seen = ctx.mark_watched(series, episode.id);
            let route = Route::new(&series.base_path, episode.id, false);
            return Some(Screen::player(series, &route));
        }
        KeyCode::Char('c') => {
            view.pending_reset = true;
            *status = status_info("Confirm clear: y/Enter to clear, n/Esc to cancel.");
        }
        KeyCode::Tab => {
            let target = series
                .switch_to
                .as_deref()
                .and_then(|slug| ctx.catalog.series(slug));
            match target {
                Some(other) => return Some(Screen::listing(other)),
                None => *status = status_info("No other series to switch to."),
            }
        }
        _ => {}
    }
    None
}

pub(super) fn handle_player_key(
    ctx: &AppContext,
    view: &mut PlayerView,
    code: KeyCode,
    player: &mut Option<MpvSession>,
    status: &mut String,
) -> Option<Screen> {
    let series = ctx.catalog.series(&view.slug)?;

    if matches!(code, KeyCode::Esc | KeyCode::Char('b')) {
        return Some(Screen::listing_at(series, Some(view.route.episode_id)));
    }
    let controller = view.controller.as_mut()?;

    let event = match code {
        KeyCode::Char('i') => Some(PlayerEvent::SkipIntro),
        KeyCode::Char('r') => Some(PlayerEvent::SkipRecap),
        KeyCode::Left | KeyCode::Char('p') => Some(PlayerEvent::GoPrevious),
        KeyCode::Right | KeyCode::Char('n') => Some(PlayerEvent::GoNext),
        KeyCode::Char('o') => {
            open_preview(&controller.sources().preview_src, status);
            None
        }
        KeyCode::Enter => {
            if player.is_none()
                && let Some(url) = controller.current_source()
            {
                let effects = vec![PlayerEffect::Load {
                    url: url.to_string(),
                }];
                apply_effects(ctx, effects, player, status);
            }
            None
        }
        _ => None,
    };

    let effects = controller.handle(event?);
    let route = apply_effects(ctx, effects, player, status)?;
    let (next, route) = resolve_route(&ctx.catalog, &route)?;
    Some(Screen::player(next, &route))
}
