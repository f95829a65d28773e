//! Stream descriptors exchanged with the media server.
//!
//! The server supplies an ordered list of [`RawStream`] entries per item.
//! The playback layer resolves those into sanitized, proxy-routed
//! [`SourceDescriptor`]s that the player can load directly.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use url::Url;

/// How a stream is delivered by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum StreamKind {
    /// Unmodified file playback; the resource covers the full timeline
    Direct,
    /// Server-transcoded rendition; the resource is a window anchored at a
    /// requested start offset and needs offset correction on the client
    Transcoded,
}

impl StreamKind {
    pub fn is_direct(&self) -> bool {
        matches!(self, StreamKind::Direct)
    }
}

/// Video resolution in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when this rendition fits inside `other` on both axes
    pub fn fits_within(&self, other: &Resolution) -> bool {
        self.width <= other.width && self.height <= other.height
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One stream entry as supplied by the server, before resolution
///
/// Entries arrive ordered by server preference. Malformed entries are
/// dropped during resolution without aborting the rest of the list.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawStream {
    /// Upstream absolute URL, possibly carrying credentials
    pub url: String,
    /// MIME type reported by the server (e.g. `video/mp4`)
    pub mime_type: String,
    /// Human-readable rendition label (e.g. `1080p`)
    pub label: String,
    /// Whether the server considers this unmodified direct playback
    pub is_direct: bool,
    /// Total duration of the item in seconds, when the server knows it
    #[cfg_attr(feature = "serde", serde(default))]
    pub total_duration: Option<f64>,
    /// Peak bandwidth of the rendition in bits per second
    #[cfg_attr(feature = "serde", serde(default))]
    pub bandwidth: Option<u64>,
    /// Encoded resolution of the rendition
    #[cfg_attr(feature = "serde", serde(default))]
    pub resolution: Option<Resolution>,
}

/// A sanitized, playable source produced by the resolver
///
/// Immutable once built; one descriptor is selected as the active source
/// for the lifetime of a playback session (barring codec fallback).
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDescriptor {
    /// Proxy-routed URL, credentials stripped
    pub url: Url,
    pub mime_type: String,
    pub label: String,
    pub kind: StreamKind,
    /// True when positions reported by the resource must be shifted by the
    /// session's start offset to recover virtual-timeline positions
    pub is_offset_corrected: bool,
    /// Declared total duration of the virtual timeline, in seconds
    pub total_duration: Option<f64>,
    pub bandwidth: Option<u64>,
    pub resolution: Option<Resolution>,
}

impl SourceDescriptor {
    /// Whether this source presents the full timeline without correction
    pub fn is_direct(&self) -> bool {
        self.kind.is_direct()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_fit() {
        let source = Resolution::new(1920, 1080);
        assert!(Resolution::new(1280, 720).fits_within(&source));
        assert!(Resolution::new(1920, 1080).fits_within(&source));
        assert!(!Resolution::new(3840, 2160).fits_within(&source));
        // Width fits but height does not
        assert!(!Resolution::new(1920, 1440).fits_within(&source));
    }
}
