//! Metadata probes: just enough parsing to learn a source's duration.

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProbeError {
    #[error("missing #EXTM3U header")]
    NotHls,
    #[error("master playlist has no variants")]
    NoVariants,
    #[error("not a DASH manifest: {0}")]
    NotDash(String),
    #[error("invalid duration '{0}'")]
    BadDuration(String),
}

/// Parsed HLS playlist, reduced to what playback needs
#[derive(Debug, Clone, PartialEq)]
pub enum HlsPlaylist {
    /// Variant URIs in declaration order, possibly relative
    Master { variants: Vec<String> },
    Media {
        /// Sum of segment durations
        duration: f64,
        segments: usize,
        /// `#EXT-X-ENDLIST` seen; live playlists have no fixed duration
        ended: bool,
    },
}

impl HlsPlaylist {
    /// Duration as a media element reports it: infinite for live playlists
    pub fn playback_duration(&self) -> Option<f64> {
        match self {
            HlsPlaylist::Media { duration, ended: true, .. } => Some(*duration),
            HlsPlaylist::Media { ended: false, .. } => Some(f64::INFINITY),
            HlsPlaylist::Master { .. } => None,
        }
    }
}

pub fn parse_hls(text: &str) -> Result<HlsPlaylist, ProbeError> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    if lines.next().map(|l| l.trim_start_matches('\u{feff}')) != Some("#EXTM3U") {
        return Err(ProbeError::NotHls);
    }

    let mut variants = Vec::new();
    let mut expect_variant_uri = false;
    let mut duration = 0.0;
    let mut segments = 0;
    let mut ended = false;

    for line in lines {
        if let Some(attrs) = line.strip_prefix("#EXTINF:") {
            let value = attrs.split(',').next().unwrap_or_default().trim();
            let secs = value
                .parse::<f64>()
                .ok()
                .filter(|secs| secs.is_finite() && *secs >= 0.0)
                .ok_or_else(|| ProbeError::BadDuration(value.to_string()))?;
            duration += secs;
            segments += 1;
        } else if line.starts_with("#EXT-X-STREAM-INF") {
            expect_variant_uri = true;
        } else if line == "#EXT-X-ENDLIST" {
            ended = true;
        } else if !line.starts_with('#') && expect_variant_uri {
            variants.push(line.to_string());
            expect_variant_uri = false;
        }
    }

    if !variants.is_empty() {
        return Ok(HlsPlaylist::Master { variants });
    }
    if expect_variant_uri {
        return Err(ProbeError::NoVariants);
    }
    Ok(HlsPlaylist::Media { duration, segments, ended })
}

/// `mediaPresentationDuration` of a DASH MPD; `None` for dynamic (live) manifests
pub fn parse_dash_duration(text: &str) -> Result<Option<f64>, ProbeError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                if e.local_name().as_ref() != b"MPD" {
                    return Err(ProbeError::NotDash("root element is not MPD".to_string()));
                }
                for attr in e.attributes().flatten() {
                    if attr.key.local_name().as_ref() == b"mediaPresentationDuration" {
                        let value = String::from_utf8_lossy(&attr.value).into_owned();
                        return parse_iso8601_duration(&value).map(Some);
                    }
                }
                return Ok(None);
            }
            Ok(Event::Eof) => return Err(ProbeError::NotDash("empty document".to_string())),
            Ok(_) => continue,
            Err(e) => return Err(ProbeError::NotDash(e.to_string())),
        }
    }
}

/// Parse `PnDTnHnMnS` durations as used by MPD (no years or months)
pub fn parse_iso8601_duration(value: &str) -> Result<f64, ProbeError> {
    let bad = || ProbeError::BadDuration(value.to_string());
    let rest = value.strip_prefix('P').ok_or_else(bad)?;
    let (date_part, time_part) = match rest.split_once('T') {
        Some((date, time)) => (date, Some(time)),
        None => (rest, None),
    };

    let mut total = 0.0;
    let mut number = String::new();
    for c in date_part.chars() {
        match c {
            '0'..='9' | '.' => number.push(c),
            'D' => total += take_number(&mut number).ok_or_else(bad)? * 86_400.0,
            'W' => total += take_number(&mut number).ok_or_else(bad)? * 604_800.0,
            _ => return Err(bad()),
        }
    }
    if !number.is_empty() {
        return Err(bad());
    }

    if let Some(time) = time_part {
        if time.is_empty() {
            return Err(bad());
        }
        for c in time.chars() {
            match c {
                '0'..='9' | '.' => number.push(c),
                'H' => total += take_number(&mut number).ok_or_else(bad)? * 3_600.0,
                'M' => total += take_number(&mut number).ok_or_else(bad)? * 60.0,
                'S' => total += take_number(&mut number).ok_or_else(bad)?,
                _ => return Err(bad()),
            }
        }
        if !number.is_empty() {
            return Err(bad());
        }
    }

    Ok(total)
}

fn take_number(buf: &mut String) -> Option<f64> {
    let value = buf.parse().ok();
    buf.clear();
    value
}

/// Duration from the `mvhd` box of an MP4 head, if the `moov` box comes first
pub fn mp4_duration(data: &[u8]) -> Option<f64> {
    let moov = find_box(data, b"moov")?;
    let mvhd = find_box(moov, b"mvhd")?;
    let version = *mvhd.first()?;
    // version(1) flags(3), then creation/modification times
    let (timescale, duration) = match version {
        0 => (read_u32(mvhd, 12)? as u64, read_u32(mvhd, 16)? as u64),
        1 => (read_u32(mvhd, 20)? as u64, read_u64(mvhd, 24)?),
        _ => return None,
    };
    let unknown = if version == 0 { u32::MAX as u64 } else { u64::MAX };
    if timescale == 0 || duration == unknown {
        return None;
    }
    Some(duration as f64 / timescale as f64)
}

/// Payload of the first child box named `kind`. Truncated boxes yield what is available.
fn find_box<'a>(mut data: &'a [u8], kind: &[u8; 4]) -> Option<&'a [u8]> {
    while data.len() >= 8 {
        let size = read_u32(data, 0)? as u64;
        let name = &data[4..8];
        let (header, size) = match size {
            1 => (16, read_u64(data, 8)?),
            0 => (8, data.len() as u64),
            n => (8, n),
        };
        if size < header as u64 {
            return None;
        }
        let end = usize::try_from(size).unwrap_or(usize::MAX).min(data.len());
        if name == kind {
            return data.get(header..end);
        }
        if end >= data.len() {
            return None;
        }
        data = &data[end..];
    }
    None
}

fn read_u32(data: &[u8], at: usize) -> Option<u32> {
    let bytes = data.get(at..at + 4)?;
    Some(u32::from_be_bytes(bytes.try_into().ok()?))
}

fn read_u64(data: &[u8], at: usize) -> Option<u64> {
    let bytes = data.get(at..at + 8)?;
    Some(u64::from_be_bytes(bytes.try_into().ok()?))
}
