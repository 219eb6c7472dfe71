use log::{debug, warn};
use url::Url;

use super::element::{ElementPlayer, Prober};
use super::native::probe_file;
use super::probe::{HlsPlaylist, parse_dash_duration, parse_hls};
use super::{Backend, LoadRequest, MediaErrorKind};
use crate::fetch::{FetchResponse, HookId, HttpLayer};
use crate::source::Strategy;

/// Manifest-aware element: HLS/DASH manifests as well as progressive files
pub type ManifestPlayer = ElementPlayer<ManifestProbe>;

/// Master playlists are followed at most this deep
const MAX_PLAYLIST_HOPS: usize = 3;

pub struct ManifestProbe;

impl Prober for ManifestProbe {
    const BACKEND: Backend = Backend::Manifest;

    fn probe(http: &HttpLayer, request: &LoadRequest) -> Result<f64, MediaErrorKind> {
        match request.strategy {
            Strategy::HlsManifest => probe_manifest(http, &request.source.url, request.hook),
            _ => probe_file(http, request),
        }
    }
}

fn fetch_text(http: &HttpLayer, url: &str, hook: Option<HookId>) -> Result<String, MediaErrorKind> {
    let response: FetchResponse = http.get(url, hook, None).map_err(|e| {
        warn!("Manifest fetch of {} failed: {:#}", url, e);
        MediaErrorKind::Network
    })?;
    if !response.is_success() {
        warn!("Manifest fetch of {} returned {}", url, response.status);
        return Err(MediaErrorKind::Network);
    }
    Ok(response.text())
}

fn probe_manifest(http: &HttpLayer, url: &str, hook: Option<HookId>) -> Result<f64, MediaErrorKind> {
    let mut current = url.to_string();

    for _ in 0..MAX_PLAYLIST_HOPS {
        let text = fetch_text(http, &current, hook)?;

        if !text.trim_start_matches('\u{feff}').trim_start().starts_with("#EXTM3U") {
            return match parse_dash_duration(&text) {
                Ok(duration) => Ok(duration.unwrap_or(f64::INFINITY)),
                Err(e) => {
                    warn!("Unreadable manifest at {}: {}", current, e);
                    Err(MediaErrorKind::Format)
                }
            };
        }

        match parse_hls(&text) {
            Ok(HlsPlaylist::Master { variants }) => {
                let variant = variants
                    .first()
                    .and_then(|entry| resolve(&current, entry))
                    .ok_or(MediaErrorKind::Format)?;
                debug!("Following variant {} of {}", variant, current);
                current = variant;
            }
            Ok(playlist) => return Ok(playlist.playback_duration().unwrap_or(f64::INFINITY)),
            Err(e) => {
                warn!("Unreadable playlist at {}: {}", current, e);
                return Err(MediaErrorKind::Format);
            }
        }
    }

    warn!("Too many nested playlists under {}", url);
    Err(MediaErrorKind::Format)
}

/// Resolve a playlist entry against the playlist it appeared in
fn resolve(base: &str, entry: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    base.join(entry).ok().map(String::from)
}
