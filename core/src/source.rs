mod drive;
pub mod headers;
mod youtube;

use std::collections::HashMap;
use std::fmt;

use log::debug;
use once_cell::sync::Lazy;
use url::Url;

pub use drive::extract_drive_id;
pub use headers::{HeaderMap, PlayableSource, split_headers};
pub use youtube::{extract_youtube_id, is_youtube_url};

/// Third-party hosts that bring their own playback surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmbedProvider {
    /// youtube.com / youtu.be
    YouTube,
    /// Google Drive file previews
    Drive,
}

impl EmbedProvider {
    /// Stable provider identifier
    pub fn id(&self) -> &'static str {
        match self {
            EmbedProvider::YouTube => "youtube",
            EmbedProvider::Drive => "drive",
        }
    }

    /// Build the embeddable page URL for a media identifier
    pub fn embed_url(&self, media_id: &str) -> String {
        match self {
            EmbedProvider::YouTube => format!("https://www.youtube.com/embed/{}", media_id),
            EmbedProvider::Drive => format!("https://drive.google.com/file/d/{}/preview", media_id),
        }
    }
}

/// How a source URL gets played
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// Progressive media file (mp4, webm, ogv)
    DirectFile,
    /// Segmented stream described by a manifest (m3u8, mpd)
    HlsManifest,
    /// Provider-hosted player
    Embed { provider: EmbedProvider, id: String },
    /// Nothing we know how to play
    Unrecognized,
}

impl Strategy {
    pub fn provider(&self) -> Option<EmbedProvider> {
        match self {
            Strategy::Embed { provider, .. } => Some(*provider),
            _ => None,
        }
    }

    pub fn embed_url(&self) -> Option<String> {
        match self {
            Strategy::Embed { provider, id } => Some(provider.embed_url(id)),
            _ => None,
        }
    }

    pub fn is_playable(&self) -> bool {
        !matches!(self, Strategy::Unrecognized)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::DirectFile => write!(f, "direct-file"),
            Strategy::HlsManifest => write!(f, "hls-manifest"),
            Strategy::Embed { provider, .. } => write!(f, "embed-provider({})", provider.id()),
            Strategy::Unrecognized => write!(f, "unrecognized"),
        }
    }
}

/// Strategy implied by a path extension
static EXTENSIONS: Lazy<HashMap<&'static str, Strategy>> = Lazy::new(|| {
    let mut table = HashMap::new();
    for ext in ["mp4", "webm", "ogv"] {
        table.insert(ext, Strategy::DirectFile);
    }
    for ext in ["m3u8", "mpd"] {
        table.insert(ext, Strategy::HlsManifest);
    }
    table
});

/// Classify a raw source URL. Never fails: anything unparsable is `Unrecognized`.
pub fn classify(url: &str) -> Strategy {
    let parsed = match Url::parse(url.trim()) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => parsed,
        Ok(parsed) => {
            debug!("Unsupported URL scheme '{}' in {}", parsed.scheme(), url);
            return Strategy::Unrecognized;
        }
        Err(e) => {
            debug!("Could not parse source URL {:?}: {}", url, e);
            return Strategy::Unrecognized;
        }
    };

    if let Some(id) = youtube::video_id(&parsed) {
        return Strategy::Embed { provider: EmbedProvider::YouTube, id };
    }

    if let Some(id) = drive::file_id(&parsed) {
        return Strategy::Embed { provider: EmbedProvider::Drive, id };
    }

    path_extension(&parsed)
        .and_then(|ext| EXTENSIONS.get(ext.as_str()).cloned())
        .unwrap_or(Strategy::Unrecognized)
}

/// Lowercased extension of the last path segment; query and fragment are not part of `path()`
fn path_extension(url: &Url) -> Option<String> {
    let last = url.path_segments()?.next_back()?;
    let (stem, ext) = last.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Identifier alphabet shared by the embed providers
pub(crate) fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}
