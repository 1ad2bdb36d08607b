use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

const BUNDLED_CATALOG: &str = include_str!("../../data/catalog.json");

#[derive(Debug, Error)]
pub(crate) enum CatalogError {
    #[error("failed to read catalog at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("catalog is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("catalog defines no series")]
    Empty,
    #[error("series slug `{0}` is defined more than once")]
    DuplicateSlug(String),
    #[error("base path `{0}` is used by more than one series")]
    DuplicateBasePath(String),
    #[error("series `{0}` has an empty storage key")]
    EmptyStorageKey(String),
    #[error("series `{series}` has a non-positive episode id")]
    InvalidEpisodeId { series: String },
    #[error("series `{series}` lists episode {id} more than once")]
    DuplicateEpisode { series: String, id: u32 },
    #[error("series `{series}` episode {id} has an empty url")]
    EmptyUrl { series: String, id: u32 },
    #[error("series `{series}` switches to unknown series `{target}`")]
    UnknownSwitchTarget { series: String, target: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct Episode {
    pub(crate) id: u32,
    pub(crate) title: String,
    pub(crate) url: String,
    #[serde(default)]
    pub(crate) thumbnail: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Series {
    pub(crate) slug: String,
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) subtitle: Option<String>,
    pub(crate) base_path: String,
    /// Older addresses that still serve this series.
    #[serde(default)]
    pub(crate) legacy_base_paths: Vec<String>,
    pub(crate) storage_key: String,
    #[serde(default)]
    pub(crate) legacy_storage_keys: Vec<String>,
    /// `{id}` expands to the two-digit episode id; without it the template
    /// is a placeholder shared by every episode.
    #[serde(default)]
    pub(crate) thumbnail_template: Option<String>,
    #[serde(default)]
    pub(crate) switch_to: Option<String>,
    pub(crate) episodes: Vec<Episode>,
}

impl Series {
    pub(crate) fn episode(&self, id: u32) -> Option<&Episode> {
        self.episodes.iter().find(|episode| episode.id == id)
    }

    pub(crate) fn previous(&self, id: u32) -> Option<&Episode> {
        id.checked_sub(1).and_then(|prev| self.episode(prev))
    }

    pub(crate) fn next(&self, id: u32) -> Option<&Episode> {
        id.checked_add(1).and_then(|next| self.episode(next))
    }

    pub(crate) fn thumbnail_for(&self, episode: &Episode) -> Option<String> {
        if let Some(thumbnail) = episode.thumbnail.as_deref()
            && !thumbnail.is_empty()
        {
            return Some(thumbnail.to_string());
        }
        self.thumbnail_template
            .as_deref()
            .map(|template| template.replace("{id}", &format!("{:02}", episode.id)))
    }

    fn base_paths(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.base_path.as_str())
            .chain(self.legacy_base_paths.iter().map(String::as_str))
    }

    /// Share of the series marked watched, rounded to a whole percent.
    pub(crate) fn progress_percent(&self, seen_count: usize) -> u32 {
        if self.episodes.is_empty() {
            return 0;
        }
        ((seen_count as f64 / self.episodes.len() as f64) * 100.0).round() as u32
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Catalog {
    series: Vec<Series>,
}

impl Catalog {
    pub(crate) fn bundled() -> Result<Self, CatalogError> {
        Self::from_json(BUNDLED_CATALOG)
    }

    pub(crate) fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let raw = fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub(crate) fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let catalog: Catalog = serde_json::from_str(raw)?;
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> Result<(), CatalogError> {
        if self.series.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut slugs = HashSet::new();
        let mut base_paths = HashSet::new();
        for series in &self.series {
            if !slugs.insert(series.slug.as_str()) {
                return Err(CatalogError::DuplicateSlug(series.slug.clone()));
            }
            for path in series.base_paths() {
                if !base_paths.insert(path.trim_end_matches('/')) {
                    return Err(CatalogError::DuplicateBasePath(path.to_string()));
                }
            }
            if series.storage_key.trim().is_empty() {
                return Err(CatalogError::EmptyStorageKey(series.slug.clone()));
            }

            let mut ids = HashSet::new();
            for episode in &series.episodes {
                if episode.id == 0 {
                    return Err(CatalogError::InvalidEpisodeId {
                        series: series.slug.clone(),
                    });
                }
                if !ids.insert(episode.id) {
                    return Err(CatalogError::DuplicateEpisode {
                        series: series.slug.clone(),
                        id: episode.id,
                    });
                }
                if episode.url.trim().is_empty() {
                    return Err(CatalogError::EmptyUrl {
                        series: series.slug.clone(),
                        id: episode.id,
                    });
                }
            }
        }

        for series in &self.series {
            if let Some(target) = series.switch_to.as_deref()
                && !slugs.contains(target)
            {
                return Err(CatalogError::UnknownSwitchTarget {
                    series: series.slug.clone(),
                    target: target.to_string(),
                });
            }
        }
        Ok(())
    }

    pub(crate) fn series(&self, slug: &str) -> Option<&Series> {
        self.series.iter().find(|series| series.slug == slug)
    }

    /// Finds the series served at `base_path`, including legacy aliases.
    pub(crate) fn series_by_base_path(&self, base_path: &str) -> Option<&Series> {
        let wanted = base_path.trim_end_matches('/');
        self.series.iter().find(|series| {
            series
                .base_paths()
                .any(|path| path.trim_end_matches('/') == wanted)
        })
    }

    pub(crate) fn all(&self) -> &[Series] {
        &self.series
    }

    pub(crate) fn first(&self) -> &Series {
        // validate() guarantees at least one series
        &self.series[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> String {
        r#"{
            "series": [
                {
                    "slug": "digimon",
                    "title": "Digimon Adventure",
                    "base_path": "/digimon",
                    "storage_key": "vistos",
                    "thumbnail_template": "/mini{id}.webp",
                    "switch_to": "beyblade",
                    "episodes": [
                        {"id": 1, "title": "Uno", "url": "https://host/file/d/A/view"},
                        {"id": 2, "title": "Dos", "url": "https://host/file/d/B/view", "thumbnail": "/custom.png"},
                        {"id": 3, "title": "Tres", "url": "https://host/file/d/C/view"}
                    ]
                },
                {
                    "slug": "beyblade",
                    "title": "Beyblade",
                    "base_path": "/beyblade",
                    "legacy_base_paths": ["/baybade"],
                    "storage_key": "vistos_beyblade",
                    "legacy_storage_keys": ["vistos_baybade"],
                    "thumbnail_template": "/beyblade-placeholder.svg",
                    "episodes": [
                        {"id": 1, "title": "Uno", "url": "https://host/open?id=Z"}
                    ]
                }
            ]
        }"#
        .to_string()
    }

    #[test]
    fn bundled_catalog_is_valid() {
        let catalog = Catalog::bundled().expect("bundled catalog should validate");
        let beyblade = catalog.series("beyblade").expect("beyblade series");
        assert_eq!(beyblade.legacy_storage_keys, vec!["vistos_baybade"]);
        assert!(catalog.series("digimon").is_some());
    }

    #[test]
    fn neighbours_follow_adjacent_ids() {
        let catalog = Catalog::from_json(&sample_json()).unwrap();
        let series = catalog.series("digimon").unwrap();
        assert!(series.previous(1).is_none());
        assert_eq!(series.previous(2).map(|ep| ep.id), Some(1));
        assert_eq!(series.next(2).map(|ep| ep.id), Some(3));
        assert!(series.next(3).is_none());
        assert!(series.episode(9).is_none());
    }

    #[test]
    fn thumbnail_prefers_episode_then_template() {
        let catalog = Catalog::from_json(&sample_json()).unwrap();
        let digimon = catalog.series("digimon").unwrap();
        let first = digimon.episode(1).unwrap();
        let second = digimon.episode(2).unwrap();
        assert_eq!(digimon.thumbnail_for(first).as_deref(), Some("/mini01.webp"));
        assert_eq!(digimon.thumbnail_for(second).as_deref(), Some("/custom.png"));

        let beyblade = catalog.series("beyblade").unwrap();
        let episode = beyblade.episode(1).unwrap();
        assert_eq!(
            beyblade.thumbnail_for(episode).as_deref(),
            Some("/beyblade-placeholder.svg")
        );
    }

    #[test]
    fn progress_percent_rounds_and_handles_empty_series() {
        let catalog = Catalog::from_json(&sample_json()).unwrap();
        let series = catalog.series("digimon").unwrap();
        assert_eq!(series.progress_percent(0), 0);
        assert_eq!(series.progress_percent(1), 33);
        assert_eq!(series.progress_percent(2), 67);
        assert_eq!(series.progress_percent(3), 100);

        let mut empty = series.clone();
        empty.episodes.clear();
        assert_eq!(empty.progress_percent(4), 0);
    }

    #[test]
    fn lookup_by_base_path_ignores_trailing_slash() {
        let catalog = Catalog::from_json(&sample_json()).unwrap();
        assert_eq!(
            catalog.series_by_base_path("/beyblade/").map(|s| s.slug.as_str()),
            Some("beyblade")
        );
    }

    #[test]
    fn lookup_by_base_path_accepts_legacy_aliases() {
        let catalog = Catalog::from_json(&sample_json()).unwrap();
        assert_eq!(
            catalog.series_by_base_path("/baybade").map(|s| s.slug.as_str()),
            Some("beyblade")
        );
        assert!(catalog.series_by_base_path("").is_none());

        let bundled = Catalog::bundled().unwrap();
        assert_eq!(
            bundled.series_by_base_path("").map(|s| s.slug.as_str()),
            Some("digimon")
        );
        assert_eq!(
            bundled.series_by_base_path("/baybade/").map(|s| s.slug.as_str()),
            Some("beyblade")
        );
    }

    #[test]
    fn rejects_legacy_alias_shared_with_another_series() {
        let raw = sample_json().replace(r#"["/baybade"]"#, r#"["/digimon/"]"#);
        let err = Catalog::from_json(&raw).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateBasePath(path) if path == "/digimon/"));
    }

    #[test]
    fn rejects_duplicate_episode_ids() {
        let raw = sample_json().replace(r#""id": 3"#, r#""id": 2"#);
        let err = Catalog::from_json(&raw).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateEpisode { id: 2, .. }));
    }

    #[test]
    fn rejects_zero_episode_id() {
        let raw = sample_json().replace(r#""id": 3"#, r#""id": 0"#);
        let err = Catalog::from_json(&raw).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidEpisodeId { .. }));
    }

    #[test]
    fn rejects_unknown_switch_target() {
        let raw = sample_json().replace(r#""switch_to": "beyblade""#, r#""switch_to": "pokemon""#);
        let err = Catalog::from_json(&raw).unwrap_err();
        assert!(matches!(err, CatalogError::UnknownSwitchTarget { .. }));
    }

    #[test]
    fn rejects_records_missing_required_fields() {
        let raw = sample_json().replace(r#", "url": "https://host/open?id=Z""#, "");
        assert!(matches!(
            Catalog::from_json(&raw),
            Err(CatalogError::Parse(_))
        ));
    }
}
