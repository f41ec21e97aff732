//! Render request and response types

use std::sync::Arc;

use super::cancel::CancelToken;
use super::types::{RenderedPage, Rotation};

/// Unique identifier for render requests
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl RequestId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Parameters for rendering a page
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderParams {
    /// Page number (1-based)
    pub page: usize,
    /// Scale factor (CSS pixels per point)
    pub scale: f32,
    /// User rotation only; the worker adds the page's baked rotation
    pub rotation: Rotation,
    /// Device pixel ratio for the backing buffer
    pub device_pixel_ratio: f32,
}

/// Request sent to the render worker
#[derive(Debug)]
pub enum RenderRequest {
    /// Render a page
    Page {
        id: RequestId,
        params: RenderParams,
        token: CancelToken,
    },

    /// Shutdown the worker
    Shutdown,
}

/// Render failures, from fatal to silent
#[derive(Clone, Debug, thiserror::Error)]
pub enum RenderError {
    /// The raster surface cannot exist in this environment. Not retryable.
    #[error("render surface unavailable: {0}")]
    Configuration(String),

    /// The document could not be opened or parsed
    #[error("failed to load document: {0}")]
    DocumentLoad(String),

    /// A single page failed; changing page/scale/rotation may succeed
    #[error("failed to render page {page}: {detail}")]
    Page { page: usize, detail: String },

    /// Superseded or torn down. Never shown to the user.
    #[error("render cancelled")]
    Cancelled,
}

impl RenderError {
    pub fn page(page: usize, detail: impl Into<String>) -> Self {
        Self::Page {
            page,
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

/// Response from the render worker
#[derive(Debug)]
pub enum RenderResponse {
    /// Rendered page data
    Page {
        id: RequestId,
        data: Arc<RenderedPage>,
    },

    /// Request was cancelled before or during rasterization
    Cancelled(RequestId),

    /// Error during rendering
    Error { id: RequestId, error: RenderError },
}

impl RenderResponse {
    #[must_use]
    pub fn id(&self) -> RequestId {
        match self {
            Self::Page { id, .. } | Self::Cancelled(id) | Self::Error { id, .. } => *id,
        }
    }
}
