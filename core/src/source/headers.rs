//! Custom request headers carried inside a source URL.
//!
//! A source may embed a JSON object in its `headers` query parameter, e.g.
//! `https://cdn.example/index.m3u8?headers={"Referer":"https://site.example"}`.
//! The object is pulled out into a header map and the parameter is removed
//! from the URL that is actually handed to the player.

use std::collections::BTreeMap;

use log::warn;
use url::{Url, form_urlencoded};

/// Query parameter that carries the JSON header payload
pub const HEADERS_PARAM: &str = "headers";

/// Header name to value, ordered for stable output
pub type HeaderMap = BTreeMap<String, String>;

/// A source URL ready to be played, plus the headers to send while fetching it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayableSource {
    pub url: String,
    pub headers: HeaderMap,
}

impl PlayableSource {
    fn passthrough(url: &str) -> Self {
        Self { url: url.to_string(), headers: HeaderMap::new() }
    }
}

/// Split a raw source URL into the playable URL and its custom headers.
///
/// Never fails. Unparsable URLs and invalid payloads yield no headers; a
/// present `headers` parameter is always stripped, valid or not.
pub fn split_headers(raw: &str) -> PlayableSource {
    let trimmed = raw.trim();
    let Ok(mut parsed) = Url::parse(trimmed) else {
        return PlayableSource::passthrough(trimmed);
    };

    let Some(query) = parsed.query().map(str::to_string) else {
        return PlayableSource::passthrough(trimmed);
    };

    let mut payload = None;
    let mut found = false;
    let mut kept = Vec::new();
    for segment in query.split('&') {
        match form_urlencoded::parse(segment.as_bytes()).next() {
            Some((key, value)) if key == HEADERS_PARAM => {
                found = true;
                payload.get_or_insert_with(|| value.into_owned());
            }
            _ => kept.push(segment),
        }
    }
    if !found {
        return PlayableSource::passthrough(trimmed);
    }

    // other parameters keep their exact encoding
    let kept: Vec<&str> = kept.into_iter().filter(|s| !s.is_empty()).collect();
    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.set_query(Some(&kept.join("&")));
    }

    let headers = payload.map(|p| parse_header_payload(&p)).unwrap_or_default();
    PlayableSource { url: parsed.to_string(), headers }
}

fn parse_header_payload(payload: &str) -> HeaderMap {
    let value: serde_json::Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(e) => {
            warn!("Ignoring malformed headers payload: {}", e);
            return HeaderMap::new();
        }
    };

    let Some(object) = value.as_object() else {
        warn!("Ignoring headers payload that is not a JSON object");
        return HeaderMap::new();
    };

    let mut headers = HeaderMap::new();
    for (name, value) in object {
        match value.as_str() {
            Some(value) if is_header_name(name) && is_header_value(value) => {
                headers.insert(name.clone(), value.to_string());
            }
            _ => warn!("Dropping invalid header entry '{}'", name),
        }
    }
    headers
}

/// RFC 7230 token characters
fn is_header_name(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
        })
}

fn is_header_value(value: &str) -> bool {
    value.bytes().all(|b| b == b'\t' || (b >= 0x20 && b != 0x7f))
}
