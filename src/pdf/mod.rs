//! PDF rendering infrastructure

mod backend;
mod cache;
mod cancel;
mod fit;
#[cfg(feature = "pdf")]
mod mupdf_backend;
mod request;
mod selection;
mod service;
mod state;
mod types;
mod viewport;
mod worker;
mod zoom;

pub use backend::{DocumentLoader, PageSource, SourceFile, mime_for_name};
pub use cache::{CacheKey, DEFAULT_CACHE_SIZE, PageCache};
pub use cancel::{CancelToken, RenderHandle};
pub use fit::{FIT_EPSILON, MAX_SCALE, MIN_SCALE, compute_fit_scale, exceeds_epsilon, normalize_scale};
#[cfg(feature = "pdf")]
pub use mupdf_backend::MupdfLoader;
pub use request::{RenderError, RenderParams, RenderRequest, RenderResponse, RequestId};
pub use selection::{DEFAULT_MIN_SELECTION, DragState, PointerButton, RegionSelection};
pub use service::{DocumentInfo, RenderEvent, RenderService};
pub use state::{Command, Effect, ThemeMode, ViewerOptions, ViewerState};
pub use types::*;
pub use viewport::Viewport;
pub use worker::{MAX_SURFACE_DIMENSION, render_page};
pub use zoom::*;
