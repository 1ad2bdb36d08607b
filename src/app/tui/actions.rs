use tracing::{info, warn};

use super::super::AppContext;
use super::super::playback::{PlayerEffect, Route};
use super::super::player::MpvSession;
use super::{FALLBACK_NOTICE, ListingView, NOT_FOUND, PlayerView};

pub(super) fn status_info(msg: &str) -> String {
    format!("INFO: {msg}")
}

pub(super) fn status_error(msg: &str) -> String {
    format!("ERROR: {msg}")
}

pub(super) fn refresh_seen(ctx: &AppContext, view: &mut ListingView) {
    let Some(series) = ctx.catalog.series(&view.slug) else {
        return;
    };
    view.seen = ctx.seen(series);
    if series.episodes.is_empty() {
        view.table_state.select(None);
        return;
    }
    match view.table_state.selected() {
        Some(selected) => view
            .table_state
            .select(Some(selected.min(series.episodes.len() - 1))),
        None => view.table_state.select(Some(0)),
    }
}

/// Marks the episode as watched and runs the controller's start effects.
pub(super) fn mount_player(
    ctx: &AppContext,
    view: &mut PlayerView,
    player: &mut Option<MpvSession>,
    status: &mut String,
) {
    let Some(series) = ctx.catalog.series(&view.slug) else {
        return;
    };
    let Some(controller) = view.controller.as_ref() else {
        *player = None;
        *status = status_error(&format!("{NOT_FOUND}: {}", view.route));
        return;
    };

    ctx.mark_watched(series, controller.episode_id());
    info!(route = %view.route, "player mounted");
    *status = status_info(&format!(
        "Playing {} episode {}.",
        series.title,
        controller.episode_id()
    ));

    let pending = apply_effects(ctx, controller.start(), player, status);
    debug_assert!(pending.is_none(), "start effects never navigate");
}

/// Executes controller effects against mpv. A navigation stops the batch and
/// is handed back to the caller.
pub(super) fn apply_effects(
    ctx: &AppContext,
    effects: Vec<PlayerEffect>,
    player: &mut Option<MpvSession>,
    status: &mut String,
) -> Option<Route> {
    for effect in effects {
        match effect {
            PlayerEffect::Load { url } => load_source(ctx, &url, player, status),
            PlayerEffect::OpenFallback { url } => {
                *player = None;
                open_preview(&url, status);
                if status.starts_with("INFO:") {
                    *status = status_info(FALLBACK_NOTICE);
                }
            }
            PlayerEffect::StartMuted => {
                with_session(player, status, "start playback", MpvSession::start_muted)
            }
            PlayerEffect::Seek { seconds } => {
                with_session(player, status, "seek", |session| {
                    session.seek(seconds)?;
                    session.resume()
                });
            }
            PlayerEffect::Navigate(route) => return Some(route),
        }
    }
    None
}

fn load_source(
    ctx: &AppContext,
    url: &str,
    player: &mut Option<MpvSession>,
    status: &mut String,
) {
    if player.is_none() {
        match MpvSession::spawn(&ctx.player) {
            Ok(session) => *player = Some(session),
            Err(err) => {
                warn!(error = format!("{err:#}"), "player unavailable");
                *status = status_error(&format!(
                    "{err:#}. Press o to open the preview in a browser."
                ));
                return;
            }
        }
    }
    with_session(player, status, "load source", |session| session.load(url));
}

fn with_session(
    player: &mut Option<MpvSession>,
    status: &mut String,
    what: &str,
    op: impl FnOnce(&mut MpvSession) -> anyhow::Result<()>,
) {
    let Some(session) = player.as_mut() else {
        return;
    };
    if let Err(err) = op(session) {
        warn!(error = format!("{err:#}"), "failed to {what}");
        *status = status_error(&format!("Failed to {what}: {err:#}"));
        *player = None;
    }
}

pub(super) fn open_preview(url: &str, status: &mut String) {
    match webbrowser::open(url) {
        Ok(()) => {
            info!(url, "opened preview");
            *status = status_info(&format!("Opened preview in browser: {url}"));
        }
        Err(err) => {
            warn!(error = %err, url, "failed to open preview");
            *status = status_error(&format!("Failed to open browser: {err}"));
        }
    }
}
