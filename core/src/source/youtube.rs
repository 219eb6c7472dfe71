use url::Url;

use super::is_id_char;

const MAX_ID_LEN: usize = 64;

/// Helper function to extract YouTube video ID from URL
///
/// Understands watch, short-link, shorts, live and embed forms. Returns
/// `None` when the host matches but the identifier is missing or malformed.
pub fn extract_youtube_id(url: &str) -> Option<String> {
    Url::parse(url.trim()).ok().and_then(|parsed| video_id(&parsed))
}

/// Check if a URL is a valid YouTube URL
pub fn is_youtube_url(url: &str) -> bool {
    extract_youtube_id(url).is_some()
}

pub(crate) fn video_id(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_ascii_lowercase();
    let host = ["www.", "m.", "music."]
        .iter()
        .find_map(|prefix| host.strip_prefix(prefix))
        .unwrap_or(host.as_str());

    let candidate = match host {
        "youtu.be" => url.path_segments()?.next().map(str::to_string),
        "youtube.com" | "youtube-nocookie.com" => {
            let mut segments = url.path_segments()?;
            match segments.next()? {
                "watch" => url
                    .query_pairs()
                    .find(|(key, _)| key == "v")
                    .map(|(_, value)| value.into_owned()),
                "embed" | "shorts" | "live" | "v" => segments.next().map(str::to_string),
                _ => None,
            }
        }
        _ => None,
    }?;

    is_valid_id(&candidate).then_some(candidate)
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= MAX_ID_LEN && id.chars().all(is_id_char)
}
