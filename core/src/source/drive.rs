use url::Url;

use super::is_id_char;

const MIN_ID_LEN: usize = 10;

/// Extract a Google Drive file identifier from a sharing link
pub fn extract_drive_id(url: &str) -> Option<String> {
    Url::parse(url.trim()).ok().and_then(|parsed| file_id(&parsed))
}

pub(crate) fn file_id(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_ascii_lowercase();
    if host != "drive.google.com" && host != "docs.google.com" {
        return None;
    }

    let mut segments = url.path_segments()?;
    let candidate = match segments.next()? {
        // /file/d/<id>/view, /file/d/<id>/preview
        "file" => match segments.next()? {
            "d" => segments.next().map(str::to_string),
            _ => None,
        },
        "open" | "uc" => url
            .query_pairs()
            .find(|(key, _)| key == "id")
            .map(|(_, value)| value.into_owned()),
        _ => None,
    }?;

    (candidate.len() >= MIN_ID_LEN && candidate.chars().all(is_id_char)).then_some(candidate)
}
