//! Page bitmap loading for the flip viewer.
//!
//! The render thread never waits on decoding. It asks [`PageImageLoader::peek`]
//! whether a page is ready and falls back to placeholder content otherwise.
//! Decoding happens on a worker pool owned by [`ThreadedPageLoader`]; callers
//! subscribe to completion through [`PageImageLoader::prefetch_around`] or
//! hold a [`PageRequest`] and poll it without blocking.
//!
//! ```text
//!   coordinator ── prefetch_around(i, on_ready) ──▶ job queue ──▶ workers
//!                                                              │ decode + rasterize
//!   render thread ◀── peek(i) ── PageCache ◀───────────────────┘
//!                                        └──▶ on_ready()
//! ```

mod cache;
mod error;
mod source;
mod threaded;

use std::sync::Arc;

use image::RgbaImage;

pub use error::LoadError;
pub use source::{PackSource, PageSource, SyntheticSource};
pub use threaded::{LoaderOptions, PageRequest, RequestStatus, ThreadedPageLoader};

/// Decoded page pixels shared between the loader cache and its consumers.
pub type PageBuffer = Arc<RgbaImage>;

/// Completion hook handed to `prefetch_around`. It runs on a loader worker
/// thread and must hop back to the coordination thread before touching any
/// shared state.
pub type ReadyCallback = Arc<dyn Fn() + Send + Sync>;

/// Request/callback contract the render controller relies on.
pub trait PageImageLoader: Send + Sync {
    /// Returns the cached pixels for `page` without blocking, if present.
    fn peek(&self, page: usize) -> Option<PageBuffer>;

    /// Schedules background decoding of the pages around `page` and invokes
    /// `on_ready` each time one of them becomes available.
    fn prefetch_around(&self, page: usize, on_ready: ReadyCallback);

    /// Sets the raster size future decodes are scaled to.
    fn set_target_raster_size(&self, width: u32, height: u32, scale: f32);
}

impl<T: PageImageLoader + ?Sized> PageImageLoader for Arc<T> {
    fn peek(&self, page: usize) -> Option<PageBuffer> {
        (**self).peek(page)
    }

    fn prefetch_around(&self, page: usize, on_ready: ReadyCallback) {
        (**self).prefetch_around(page, on_ready)
    }

    fn set_target_raster_size(&self, width: u32, height: u32, scale: f32) {
        (**self).set_target_raster_size(width, height, scale)
    }
}
