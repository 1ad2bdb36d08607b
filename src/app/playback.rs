use std::fmt;

use thiserror::Error;
use tracing::debug;

use super::catalog::{Episode, Series};
use super::media::MediaSources;

pub(crate) const INTRO_END: f64 = 92.0;
pub(crate) const RECAP_END: f64 = 125.0;
pub(crate) const SKIP_INTRO_TO: f64 = INTRO_END;
pub(crate) const SKIP_RECAP_TO: f64 = RECAP_END;

const EPISODE_SEGMENT: &str = "/ver/";

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum RouteError {
    #[error("route `{0}` does not address an episode (expected <base>/ver/<id>)")]
    MissingEpisodeSegment(String),
    #[error("route `{0}` has an invalid episode id")]
    InvalidEpisodeId(String),
}

/// Address of a player view: `<base_path>/ver/<id>[?autoplay=1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Route {
    pub(crate) base_path: String,
    pub(crate) episode_id: u32,
    pub(crate) autoplay: bool,
}

impl Route {
    pub(crate) fn new(base_path: &str, episode_id: u32, autoplay: bool) -> Self {
        Self {
            base_path: base_path.trim_end_matches('/').to_string(),
            episode_id,
            autoplay,
        }
    }

    pub(crate) fn parse(raw: &str) -> Result<Self, RouteError> {
        let trimmed = raw.trim();
        let (path, query) = match trimmed.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (trimmed, None),
        };

        let Some(idx) = path.rfind(EPISODE_SEGMENT) else {
            return Err(RouteError::MissingEpisodeSegment(raw.to_string()));
        };
        let base_path = &path[..idx];
        let id_part = path[idx + EPISODE_SEGMENT.len()..].trim_end_matches('/');
        let episode_id = match id_part.parse::<u32>() {
            Ok(id) if id > 0 => id,
            _ => return Err(RouteError::InvalidEpisodeId(raw.to_string())),
        };

        let autoplay = query.is_some_and(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .any(|(name, value)| name == "autoplay" && value == "1")
        });
        Ok(Self::new(base_path, episode_id, autoplay))
    }

    pub(crate) fn to_path(&self) -> String {
        let mut path = format!("{}{EPISODE_SEGMENT}{}", self.base_path, self.episode_id);
        if self.autoplay {
            path.push_str("?autoplay=1");
        }
        path
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_path())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SkipOverlay {
    pub(crate) intro_visible: bool,
    pub(crate) recap_visible: bool,
}

impl SkipOverlay {
    pub(crate) const INITIAL: Self = Self {
        intro_visible: true,
        recap_visible: false,
    };

    pub(crate) const HIDDEN: Self = Self {
        intro_visible: false,
        recap_visible: false,
    };

    pub(crate) fn at(position: f64) -> Self {
        Self {
            intro_visible: position < INTRO_END,
            recap_visible: (INTRO_END..RECAP_END).contains(&position),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PlaybackState {
    Trying { candidate_index: usize },
    FallbackFrame,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum PlayerEvent {
    Ready,
    Error,
    TimeUpdate(f64),
    Ended,
    SkipIntro,
    SkipRecap,
    GoPrevious,
    GoNext,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PlayerEffect {
    Load { url: String },
    OpenFallback { url: String },
    /// Unmuted autostart is refused by most environments, so start muted.
    StartMuted,
    /// Jump to `seconds` and resume playback.
    Seek { seconds: f64 },
    Navigate(Route),
}

/// Per-episode playback state machine. Owns no I/O; the caller executes the
/// returned effects against a real player.
#[derive(Debug, Clone)]
pub(crate) struct PlaybackController {
    base_path: String,
    episode_id: u32,
    previous_id: Option<u32>,
    next_id: Option<u32>,
    sources: MediaSources,
    autoplay: bool,
    state: PlaybackState,
    overlay: SkipOverlay,
    position: f64,
}

impl PlaybackController {
    pub(crate) fn new(series: &Series, episode: &Episode, autoplay: bool) -> Self {
        let sources = MediaSources::resolve(&episode.url);
        let state = if sources.candidates.is_empty() {
            PlaybackState::FallbackFrame
        } else {
            PlaybackState::Trying { candidate_index: 0 }
        };
        Self {
            base_path: series.base_path.trim_end_matches('/').to_string(),
            episode_id: episode.id,
            previous_id: series.previous(episode.id).map(|ep| ep.id),
            next_id: series.next(episode.id).map(|ep| ep.id),
            sources,
            autoplay,
            state,
            overlay: SkipOverlay::INITIAL,
            position: 0.0,
        }
    }

    /// Effects needed to show the episode when the player view mounts.
    pub(crate) fn start(&self) -> Vec<PlayerEffect> {
        match self.state {
            PlaybackState::Trying { candidate_index } => vec![PlayerEffect::Load {
                url: self.sources.candidates[candidate_index].clone(),
            }],
            PlaybackState::FallbackFrame => vec![PlayerEffect::OpenFallback {
                url: self.sources.preview_src.clone(),
            }],
        }
    }

    pub(crate) fn handle(&mut self, event: PlayerEvent) -> Vec<PlayerEffect> {
        match event {
            PlayerEvent::GoPrevious => return self.navigate(self.previous_id, false),
            PlayerEvent::GoNext => return self.navigate(self.next_id, true),
            _ => {}
        }

        let PlaybackState::Trying { candidate_index } = self.state else {
            return Vec::new();
        };

        match event {
            PlayerEvent::Ready => {
                self.overlay = SkipOverlay::INITIAL;
                if self.autoplay {
                    vec![PlayerEffect::StartMuted]
                } else {
                    Vec::new()
                }
            }
            PlayerEvent::Error => self.advance_candidate(candidate_index),
            PlayerEvent::TimeUpdate(position) => {
                self.position = if position.is_finite() && position > 0.0 {
                    position
                } else {
                    0.0
                };
                self.overlay = SkipOverlay::at(self.position);
                Vec::new()
            }
            PlayerEvent::Ended => self.navigate(self.next_id, true),
            PlayerEvent::SkipIntro if self.overlay.intro_visible => vec![PlayerEffect::Seek {
                seconds: SKIP_INTRO_TO,
            }],
            PlayerEvent::SkipRecap if self.overlay.recap_visible => vec![PlayerEffect::Seek {
                seconds: SKIP_RECAP_TO,
            }],
            PlayerEvent::SkipIntro
            | PlayerEvent::SkipRecap
            | PlayerEvent::GoPrevious
            | PlayerEvent::GoNext => Vec::new(),
        }
    }

    fn advance_candidate(&mut self, failed_index: usize) -> Vec<PlayerEffect> {
        self.overlay = SkipOverlay::INITIAL;
        self.position = 0.0;

        let next_index = failed_index + 1;
        if let Some(url) = self.sources.candidates.get(next_index) {
            debug!(episode = self.episode_id, candidate = next_index, "trying next candidate");
            self.state = PlaybackState::Trying {
                candidate_index: next_index,
            };
            return vec![PlayerEffect::Load { url: url.clone() }];
        }

        debug!(episode = self.episode_id, "all candidates failed, using preview");
        self.state = PlaybackState::FallbackFrame;
        vec![PlayerEffect::OpenFallback {
            url: self.sources.preview_src.clone(),
        }]
    }

    fn navigate(&self, target: Option<u32>, autoplay: bool) -> Vec<PlayerEffect> {
        match target {
            Some(id) => vec![PlayerEffect::Navigate(Route::new(&self.base_path, id, autoplay))],
            None => Vec::new(),
        }
    }

    pub(crate) fn state(&self) -> PlaybackState {
        self.state
    }

    pub(crate) fn overlay(&self) -> SkipOverlay {
        match self.state {
            PlaybackState::Trying { .. } => self.overlay,
            PlaybackState::FallbackFrame => SkipOverlay::HIDDEN,
        }
    }

    pub(crate) fn position(&self) -> f64 {
        self.position
    }

    pub(crate) fn sources(&self) -> &MediaSources {
        &self.sources
    }

    pub(crate) fn current_source(&self) -> Option<&str> {
        match self.state {
            PlaybackState::Trying { candidate_index } => self
                .sources
                .candidates
                .get(candidate_index)
                .map(String::as_str),
            PlaybackState::FallbackFrame => None,
        }
    }

    pub(crate) fn episode_id(&self) -> u32 {
        self.episode_id
    }

    pub(crate) fn autoplay(&self) -> bool {
        self.autoplay
    }

    pub(crate) fn has_previous(&self) -> bool {
        self.previous_id.is_some()
    }

    pub(crate) fn has_next(&self) -> bool {
        self.next_id.is_some()
    }
}
