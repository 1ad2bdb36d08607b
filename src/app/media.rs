use std::sync::LazyLock;

use regex::Regex;
use url::Url;

static FILE_PATH_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/file/d/([^/]+)/").expect("valid file path regex"));
static QUERY_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]id=([^&]+)").expect("valid query id regex"));

/// Playable forms of one episode's source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MediaSources {
    pub(crate) identifier: Option<String>,
    /// Direct media URLs, tried strictly in order.
    pub(crate) candidates: Vec<String>,
    /// Embeddable page used once every candidate has failed.
    pub(crate) preview_src: String,
}

impl MediaSources {
    pub(crate) fn resolve(raw_url: &str) -> Self {
        match extract_file_identifier(raw_url) {
            Some(id) => Self {
                candidates: build_candidates(&id),
                preview_src: build_preview_url(&id),
                identifier: Some(id),
            },
            None => Self {
                identifier: None,
                candidates: Vec::new(),
                preview_src: raw_url.to_string(),
            },
        }
    }
}

pub(crate) fn extract_file_identifier(raw_url: &str) -> Option<String> {
    if let Some(caps) = FILE_PATH_ID.captures(raw_url) {
        return Some(caps[1].to_string());
    }

    if let Ok(parsed) = Url::parse(raw_url)
        && let Some((_, id)) = parsed
            .query_pairs()
            .find(|(name, value)| name == "id" && !value.is_empty())
    {
        return Some(id.into_owned());
    }

    QUERY_ID
        .captures(raw_url)
        .map(|caps| caps[1].to_string())
}

/// Hosting endpoints in the order they are attempted. Some of them refuse
/// direct streaming for a given file while others serve it.
pub(crate) fn build_candidates(id: &str) -> Vec<String> {
    vec![
        format!("https://drive.usercontent.google.com/uc?id={id}&export=download"),
        format!("https://drive.google.com/uc?export=download&id={id}"),
        format!("https://lh3.googleusercontent.com/uc?export=download&id={id}"),
    ]
}

pub(crate) fn build_preview_url(id: &str) -> String {
    format!("https://drive.google.com/file/d/{id}/preview")
}
