//! HTTP fetching layer shared by the player backends.
//!
//! Custom headers are attached through per-session hooks: a session registers
//! its header map and gets back a [`HeaderHook`] guard. Requests made on behalf
//! of that session carry the hook id, and only that hook's headers are merged.
//! Dropping the guard removes the registration.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use log::{debug, trace};
use parking_lot::Mutex;

use crate::source::HeaderMap;

/// Identifier of a registered header hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

/// A single outbound request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub headers: HeaderMap,
    /// Byte range to request, end exclusive
    pub range: Option<Range<u64>>,
}

/// Response body and status, already read into memory
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Transport used by the fetch layer
pub trait Fetch: Send + Sync {
    fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse>;
}

#[derive(Default)]
struct HookTable {
    next_id: AtomicU64,
    hooks: Mutex<HashMap<HookId, HeaderMap>>,
}

/// Shared fetch layer: a transport plus the per-session header hooks
#[derive(Clone)]
pub struct HttpLayer {
    transport: Arc<dyn Fetch>,
    table: Arc<HookTable>,
}

impl HttpLayer {
    pub fn new(transport: Arc<dyn Fetch>) -> Self {
        Self { transport, table: Arc::new(HookTable::default()) }
    }

    /// Register headers for one session. The registration lives as long as the guard.
    pub fn install_hook(&self, headers: HeaderMap) -> HeaderHook {
        let id = HookId(self.table.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        debug!("Installing header hook {:?} ({} headers)", id, headers.len());
        self.table.hooks.lock().insert(id, headers);
        HeaderHook { id, table: Arc::clone(&self.table) }
    }

    /// Number of live hooks
    pub fn active_hooks(&self) -> usize {
        self.table.hooks.lock().len()
    }

    /// Headers a request under `hook` would carry
    pub fn headers_for(&self, hook: Option<HookId>) -> HeaderMap {
        hook.and_then(|id| self.table.hooks.lock().get(&id).cloned())
            .unwrap_or_default()
    }

    /// Fetch `url`, merging the headers registered under `hook`
    pub fn get(&self, url: &str, hook: Option<HookId>, range: Option<Range<u64>>) -> Result<FetchResponse> {
        let request = FetchRequest {
            url: url.to_string(),
            headers: self.headers_for(hook),
            range,
        };
        trace!("GET {} with {} custom headers", request.url, request.headers.len());
        self.transport.fetch(&request)
    }
}

/// Registration guard returned by [`HttpLayer::install_hook`]
pub struct HeaderHook {
    id: HookId,
    table: Arc<HookTable>,
}

impl HeaderHook {
    pub fn id(&self) -> HookId {
        self.id
    }
}

impl Drop for HeaderHook {
    fn drop(&mut self) {
        debug!("Removing header hook {:?}", self.id);
        self.table.hooks.lock().remove(&self.id);
    }
}

impl std::fmt::Debug for HeaderHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeaderHook").field("id", &self.id).finish()
    }
}

/// Blocking reqwest transport
pub struct ReqwestFetch {
    client: reqwest::blocking::Client,
}

impl ReqwestFetch {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl Fetch for ReqwestFetch {
    fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse> {
        let mut builder = self.client.get(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(range) = &request.range {
            if range.end <= range.start {
                return Err(anyhow!("Empty byte range {:?}", range));
            }
            builder = builder.header(reqwest::header::RANGE, format!("bytes={}-{}", range.start, range.end - 1));
        }

        let response = builder
            .send()
            .with_context(|| format!("Request to {} failed", request.url))?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .with_context(|| format!("Failed to read body from {}", request.url))?
            .to_vec();

        Ok(FetchResponse { status, content_type, body })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Records requests and serves canned bodies keyed by URL
    #[derive(Default)]
    pub struct RecordingFetch {
        pub responses: Mutex<HashMap<String, (u16, Vec<u8>)>>,
        pub requests: Mutex<Vec<FetchRequest>>,
    }

    impl RecordingFetch {
        pub fn serve(&self, url: &str, status: u16, body: impl Into<Vec<u8>>) {
            self.responses.lock().insert(url.to_string(), (status, body.into()));
        }
    }

    impl Fetch for RecordingFetch {
        fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse> {
            self.requests.lock().push(request.clone());
            let (status, body) = self
                .responses
                .lock()
                .get(&request.url)
                .cloned()
                .ok_or_else(|| anyhow!("connection refused: {}", request.url))?;
            Ok(FetchResponse { status, content_type: None, body })
        }
    }
}
