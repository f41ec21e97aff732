//! Page render worker - runs in a dedicated thread

use std::sync::{Arc, Mutex};

use flume::{Receiver, Sender};
use log::{debug, warn};

use super::backend::{DocumentLoader, PageSource};
use super::cache::{CacheKey, PageCache};
use super::cancel::CancelToken;
use super::request::{RenderError, RenderParams, RenderRequest, RenderResponse, RequestId};
use super::types::RenderedPage;

/// Largest backing buffer side, in device pixels, a surface may have
pub const MAX_SURFACE_DIMENSION: f32 = 16_384.0;

/// Main worker function - owns its own document instance
#[expect(
    clippy::needless_pass_by_value,
    reason = "Values moved into thread, need ownership"
)]
pub fn render_worker(
    loader: Arc<dyn DocumentLoader>,
    requests: Receiver<RenderRequest>,
    responses: Sender<RenderResponse>,
    cache: Arc<Mutex<PageCache>>,
) {
    let source = match loader.open() {
        Ok(source) => source,
        Err(error) => {
            warn!("Render worker could not open document: {error}");
            drain_with_error(&requests, &responses, &error);
            return;
        }
    };

    for request in requests {
        match request {
            RenderRequest::Page { id, params, token } => {
                let response = handle_page_request(source.as_ref(), id, &params, &token, &cache);
                let _ = responses.send(response);
            }

            RenderRequest::Shutdown => break,
        }
    }
    debug!("Render worker stopped");
}

fn drain_with_error(
    requests: &Receiver<RenderRequest>,
    responses: &Sender<RenderResponse>,
    error: &RenderError,
) {
    for request in requests {
        match request {
            RenderRequest::Page { id, .. } => {
                let _ = responses.send(RenderResponse::Error {
                    id,
                    error: error.clone(),
                });
            }
            RenderRequest::Shutdown => break,
        }
    }
}

fn handle_page_request(
    source: &dyn PageSource,
    id: RequestId,
    params: &RenderParams,
    token: &CancelToken,
    cache: &Arc<Mutex<PageCache>>,
) -> RenderResponse {
    if token.is_cancelled() {
        return RenderResponse::Cancelled(id);
    }

    let key = CacheKey::from_params(params);
    let cached = cache
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .get(&key);
    if let Some(data) = cached {
        return RenderResponse::Page { id, data };
    }

    match render_page(source, params, token) {
        Ok(page) => {
            let data = cache
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .insert(key, page);
            // A finished raster is still worth caching even if nobody wants it now
            if token.is_cancelled() {
                RenderResponse::Cancelled(id)
            } else {
                RenderResponse::Page { id, data }
            }
        }
        Err(RenderError::Cancelled) => RenderResponse::Cancelled(id),
        Err(error) => RenderResponse::Error { id, error },
    }
}

/// Render a single page at the requested scale/rotation/density
pub fn render_page(
    source: &dyn PageSource,
    params: &RenderParams,
    token: &CancelToken,
) -> Result<RenderedPage, RenderError> {
    let dpr = params.device_pixel_ratio;
    if !dpr.is_finite() || dpr <= 0.0 {
        return Err(RenderError::Configuration(format!(
            "invalid device pixel ratio {dpr}"
        )));
    }
    if !params.scale.is_finite() || params.scale <= 0.0 {
        return Err(RenderError::page(
            params.page,
            format!("invalid scale {}", params.scale),
        ));
    }
    if params.page == 0 || params.page > source.page_count() {
        return Err(RenderError::page(params.page, "page out of range"));
    }

    let info = source.page_info(params.page)?;
    let viewport = info.viewport(params.scale, params.rotation);

    let largest_side = viewport.width.max(viewport.height) * dpr;
    if largest_side > MAX_SURFACE_DIMENSION {
        return Err(RenderError::page(
            params.page,
            format!("surface of {largest_side:.0}px exceeds {MAX_SURFACE_DIMENSION:.0}px"),
        ));
    }

    if token.is_cancelled() {
        return Err(RenderError::Cancelled);
    }

    let image = source.rasterize(&info, &viewport, dpr, token)?;

    Ok(RenderedPage {
        image,
        page: params.page,
        viewport,
        device_pixel_ratio: dpr,
    })
}
