use log::warn;

use super::element::{ElementPlayer, Prober};
use super::probe::mp4_duration;
use super::{Backend, LoadRequest, MediaErrorKind};
use crate::fetch::{FetchResponse, HttpLayer};

/// Bytes fetched from the head of a file to look for metadata
pub(super) const PROBE_BYTES: u64 = 256 * 1024;

/// Native media element: progressive files only
pub type NativePlayer = ElementPlayer<FileProbe>;

/// Ranged GET on the file head, reading the MP4 `mvhd` box when it is there
pub struct FileProbe;

impl Prober for FileProbe {
    const BACKEND: Backend = Backend::Native;

    fn probe(http: &HttpLayer, request: &LoadRequest) -> Result<f64, MediaErrorKind> {
        probe_file(http, request)
    }
}

pub(super) fn probe_file(http: &HttpLayer, request: &LoadRequest) -> Result<f64, MediaErrorKind> {
    match http.get(&request.source.url, request.hook, Some(0..PROBE_BYTES)) {
        Ok(response) => probe_response(&response),
        Err(e) => {
            warn!("Probe of {} failed: {:#}", request.source.url, e);
            Err(MediaErrorKind::Network)
        }
    }
}

/// Classify a probe response into a duration or a media error
fn probe_response(response: &FetchResponse) -> Result<f64, MediaErrorKind> {
    if !response.is_success() {
        return Err(MediaErrorKind::Network);
    }
    if let Some(content_type) = &response.content_type {
        let essence = content_type.split(';').next().unwrap_or_default().trim();
        if essence.starts_with("text/") || essence == "application/json" {
            return Err(MediaErrorKind::Format);
        }
    }
    Ok(mp4_duration(&response.body).unwrap_or(f64::INFINITY))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::fetch::testing::RecordingFetch;
    use crate::media::element::testing::{next_event, request};
    use crate::media::{EventSink, MediaPlayer, PlayerEvent};
    use crate::source::Strategy;

    #[test]
    fn test_unknown_duration_is_infinite() {
        let transport = Arc::new(RecordingFetch::default());
        transport.serve("https://cdn.example/movie.webm", 206, vec![0x1a, 0x45, 0xdf, 0xa3]);
        let mut player = NativePlayer::new(HttpLayer::new(transport.clone()));
        let (sink, mut rx) = EventSink::channel();
        player.subscribe(sink);

        player.load(request("https://cdn.example/movie.webm", Strategy::DirectFile, 7)).unwrap();
        assert_eq!(next_event(&mut rx), (7, PlayerEvent::CanPlay { duration: f64::INFINITY }));
        assert_eq!(transport.requests.lock()[0].range, Some(0..PROBE_BYTES));

        player.play();
        assert_eq!(next_event(&mut rx), (7, PlayerEvent::Playing));
        assert!(!player.is_paused());
    }

    #[test]
    fn test_http_error_is_fatal_network() {
        let transport = Arc::new(RecordingFetch::default());
        transport.serve("https://cdn.example/gone.mp4", 404, "not found");
        let mut player = NativePlayer::new(HttpLayer::new(transport));
        let (sink, mut rx) = EventSink::channel();
        player.subscribe(sink);

        player.load(request("https://cdn.example/gone.mp4", Strategy::DirectFile, 1)).unwrap();
        assert_eq!(next_event(&mut rx), (1, PlayerEvent::Fatal(MediaErrorKind::Network)));

        player.play();
        assert!(matches!(next_event(&mut rx), (1, PlayerEvent::PlayRejected(_))));
    }

    #[test]
    fn test_text_response_is_format_error() {
        let response = FetchResponse {
            status: 200,
            content_type: Some("text/html; charset=utf-8".to_string()),
            body: b"<html></html>".to_vec(),
        };
        assert_eq!(probe_response(&response), Err(MediaErrorKind::Format));
    }

    #[test]
    fn test_rejects_manifests_and_disposed_use() {
        let mut player = NativePlayer::new(HttpLayer::new(Arc::new(RecordingFetch::default())));
        let hls = request("https://cdn.example/index.m3u8", Strategy::HlsManifest, 1);
        assert!(player.load(hls).is_err());

        player.dispose();
        assert!(player.load(request("https://cdn.example/a.mp4", Strategy::DirectFile, 2)).is_err());
        assert_eq!(player.current_url(), None);
    }
}
