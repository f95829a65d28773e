//! Source resolution.
//!
//! Turns the server-supplied stream list into sanitized, proxy-routed
//! [`SourceDescriptor`]s. Upstream URLs may carry credentials and point at
//! the backend directly; descriptors exposed to the player never do either.

use crate::error::{Result, SourceError};
use regex::Regex;
use reelsync_model::{ItemID, LibraryID, RawStream, SourceDescriptor, StreamKind};
use std::sync::LazyLock;
use url::Url;

/// Query parameters that must never reach the player layer
const CREDENTIAL_PARAMS: &[&str] = &["access_token", "api_key", "token", "x-auth-token"];

/// Path suffixes the server plays back unmodified (no offset correction)
static DIRECT_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(/original|\.(mp4|mkv|webm|avi|mov|m4v))$")
        .expect("static direct-play pattern")
});

/// Builds playable source descriptors from the upstream stream list
///
/// One resolver per backend connection; resolution itself is pure and
/// per-item.
#[derive(Debug, Clone)]
pub struct SourceResolver {
    proxy_base: Url,
    library_id: LibraryID,
}

impl SourceResolver {
    /// `proxy_base` is the local proxy root every playable URL is routed
    /// through, e.g. `http://127.0.0.1:32401/`.
    pub fn new(proxy_base: &str, library_id: LibraryID) -> Result<Self> {
        let proxy_base = Url::parse(proxy_base)?;
        Ok(Self {
            proxy_base,
            library_id,
        })
    }

    /// Resolve the upstream list for one item.
    ///
    /// Malformed entries are logged and dropped without aborting the rest.
    /// Upstream ordering is preserved. If nothing survives (or the server
    /// sent nothing), a legacy direct-play descriptor is synthesized so
    /// playback is never fully blocked.
    pub fn resolve(&self, item_id: ItemID, streams: &[RawStream]) -> Vec<SourceDescriptor> {
        let mut sources = Vec::with_capacity(streams.len());

        for stream in streams {
            match self.resolve_one(item_id, stream) {
                Ok(descriptor) => sources.push(descriptor),
                Err(e) => {
                    log::warn!(
                        "[Source] Dropping malformed stream entry '{}' for {}: {}",
                        stream.label,
                        item_id,
                        e
                    );
                }
            }
        }

        if sources.is_empty() {
            log::info!(
                "[Source] No usable upstream streams for {}; synthesizing legacy direct source",
                item_id
            );
            sources.push(self.legacy_fallback(item_id));
        }

        sources
    }

    fn resolve_one(&self, item_id: ItemID, stream: &RawStream) -> Result<SourceDescriptor> {
        let upstream = Url::parse(&stream.url)
            .map_err(|e| SourceError::InvalidUpstream(format!("{}: {}", stream.url, e)))?;

        let kind = self.classify(&upstream);
        if stream.is_direct != (kind == StreamKind::Direct) {
            log::debug!(
                "[Source] Server direct-play claim for '{}' disagrees with URL shape ({})",
                stream.label,
                upstream.path()
            );
        }
        let url = self.rewrite(item_id, &upstream)?;

        Ok(SourceDescriptor {
            url,
            mime_type: stream.mime_type.clone(),
            label: stream.label.clone(),
            kind,
            is_offset_corrected: kind == StreamKind::Transcoded,
            total_duration: stream.total_duration,
            bandwidth: stream.bandwidth,
            resolution: stream.resolution,
        })
    }

    /// Classify an upstream URL as direct or transcoded playback.
    ///
    /// The URL shape alone decides; the server's `is_direct` flag is a
    /// hint only and a disagreement is logged at resolve time.
    pub fn classify(&self, upstream: &Url) -> StreamKind {
        if DIRECT_SUFFIX.is_match(upstream.path()) {
            StreamKind::Direct
        } else {
            StreamKind::Transcoded
        }
    }

    /// Strip credential query parameters and inject the library
    /// disambiguation parameter
    pub fn sanitize(&self, upstream: &Url) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = upstream
            .query_pairs()
            .filter(|(key, _)| {
                !CREDENTIAL_PARAMS.contains(&key.to_ascii_lowercase().as_str())
            })
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        params.push(("lib".to_string(), self.library_id.as_str()));
        params
    }

    /// Map an upstream absolute URL to the item-scoped proxy path.
    ///
    /// The proxy base may itself carry a path prefix (reverse-proxy mounts);
    /// the rewritten path is appended under it. `Url::set_path` leaves
    /// existing percent-escapes intact, so the upstream tail passes through
    /// encoded exactly as the server sent it.
    pub fn rewrite(&self, item_id: ItemID, upstream: &Url) -> Result<Url> {
        let mut url = self.proxy_base.clone();
        url.set_path(&format!(
            "{}/api/v1/items/{}/play{}",
            self.proxy_base.path().trim_end_matches('/'),
            urlencoding::encode(&item_id.as_str()),
            upstream.path()
        ));
        url.query_pairs_mut().clear().extend_pairs(self.sanitize(upstream));
        Ok(url)
    }

    /// Plain direct-play descriptor used when the server supplied nothing
    fn legacy_fallback(&self, item_id: ItemID) -> SourceDescriptor {
        let mut url = self.proxy_base.clone();
        url.set_path(&format!(
            "{}/api/v1/items/{}/play/original",
            self.proxy_base.path().trim_end_matches('/'),
            urlencoding::encode(&item_id.as_str())
        ));
        url.query_pairs_mut()
            .clear()
            .append_pair("lib", &self.library_id.as_str());

        SourceDescriptor {
            url,
            mime_type: "video/mp4".to_string(),
            label: "Original".to_string(),
            kind: StreamKind::Direct,
            is_offset_corrected: false,
            total_duration: None,
            bandwidth: None,
            resolution: None,
        }
    }
}
