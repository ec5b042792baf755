use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use image::imageops::{self, FilterType};
use image::DynamicImage;

use crate::cache::PageCache;
use crate::error::LoadError;
use crate::source::PageSource;
use crate::{PageBuffer, PageImageLoader, ReadyCallback};

/// Sizing knobs for [`ThreadedPageLoader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderOptions {
    pub workers: usize,
    pub prefetch_radius: usize,
    pub cache_capacity: usize,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            workers: 2,
            prefetch_radius: 1,
            cache_capacity: 6,
        }
    }
}

/// Outcome of polling a [`PageRequest`].
#[derive(Debug, Clone)]
pub enum RequestStatus {
    Ready(PageBuffer),
    Pending,
    /// The page could not be decoded; a later request may retry.
    Failed,
}

/// Handle to a single page decode that can be polled without blocking.
#[derive(Debug)]
pub struct PageRequest {
    page: usize,
    receiver: Receiver<PageBuffer>,
}

impl PageRequest {
    fn ready(page: usize, buffer: PageBuffer) -> Self {
        let (sender, receiver) = bounded(1);
        let _ = sender.send(buffer);
        Self { page, receiver }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn poll(&self) -> RequestStatus {
        match self.receiver.try_recv() {
            Ok(buffer) => RequestStatus::Ready(buffer),
            Err(TryRecvError::Empty) => RequestStatus::Pending,
            Err(TryRecvError::Disconnected) => RequestStatus::Failed,
        }
    }

    /// Blocks for at most `timeout`; intended for tooling, never the render thread.
    pub fn wait(&self, timeout: Duration) -> Option<PageBuffer> {
        match self.receiver.recv_timeout(timeout) {
            Ok(buffer) => Some(buffer),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }
}

enum Waiter {
    Callback(ReadyCallback),
    Request(Sender<PageBuffer>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct RasterTarget {
    width: u32,
    height: u32,
    scale: f32,
    generation: u64,
}

impl RasterTarget {
    fn dimensions(&self) -> Option<(u32, u32)> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        let width = (self.width as f32 * self.scale).round().max(1.0) as u32;
        let height = (self.height as f32 * self.scale).round().max(1.0) as u32;
        Some((width, height))
    }
}

struct LoaderState {
    cache: PageCache,
    pending: HashMap<usize, Vec<Waiter>>,
    target: RasterTarget,
    /// Callback from the latest prefetch; re-rasterized pages notify it.
    last_on_ready: Option<ReadyCallback>,
}

struct Shared {
    source: Arc<dyn PageSource>,
    state: Mutex<LoaderState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, LoaderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Loader backed by a pool of decode threads fed through a job channel.
pub struct ThreadedPageLoader {
    shared: Arc<Shared>,
    jobs: Option<Sender<usize>>,
    workers: Vec<JoinHandle<()>>,
    prefetch_radius: usize,
}

impl ThreadedPageLoader {
    pub fn new(source: Arc<dyn PageSource>, options: LoaderOptions) -> Result<Self, LoadError> {
        let shared = Arc::new(Shared {
            source,
            state: Mutex::new(LoaderState {
                cache: PageCache::new(options.cache_capacity),
                pending: HashMap::new(),
                target: RasterTarget {
                    width: 0,
                    height: 0,
                    scale: 1.0,
                    generation: 0,
                },
                last_on_ready: None,
            }),
        });

        let (job_tx, job_rx) = unbounded::<usize>();
        let mut workers = Vec::with_capacity(options.workers.max(1));
        for index in 0..options.workers.max(1) {
            let shared = Arc::clone(&shared);
            let jobs = job_rx.clone();
            let handle = thread::Builder::new()
                .name(format!("pageflip-loader-{index}"))
                .spawn(move || {
                    for page in jobs.iter() {
                        run_job(&shared, page);
                    }
                })
                .map_err(LoadError::Spawn)?;
            workers.push(handle);
        }

        tracing::debug!(
            workers = workers.len(),
            pages = shared.source.page_count(),
            "page loader started"
        );
        Ok(Self {
            shared,
            jobs: Some(job_tx),
            workers,
            prefetch_radius: options.prefetch_radius,
        })
    }

    pub fn page_count(&self) -> usize {
        self.shared.source.page_count()
    }

    /// Starts (or joins) the decode of a single page and returns a pollable handle.
    pub fn request_page(&self, page: usize) -> PageRequest {
        let mut state = self.shared.lock();
        if let Some(buffer) = state.cache.get(page) {
            return PageRequest::ready(page, Arc::clone(buffer));
        }
        let (sender, receiver) = bounded(1);
        self.enqueue(&mut state, page, Waiter::Request(sender));
        PageRequest { page, receiver }
    }

    fn enqueue(&self, state: &mut LoaderState, page: usize, waiter: Waiter) {
        if let Some(waiters) = state.pending.get_mut(&page) {
            waiters.push(waiter);
            return;
        }
        let Some(jobs) = self.jobs.as_ref() else {
            return;
        };
        state.pending.insert(page, vec![waiter]);
        if jobs.send(page).is_err() {
            state.pending.remove(&page);
            tracing::warn!(page, "loader job queue closed; dropping request");
        }
    }
}

/// Prefetch order: the focus page first, then alternating forward and backward.
fn prefetch_window(focus: usize, radius: usize, count: usize) -> Vec<usize> {
    let mut pages = Vec::with_capacity(2 * radius + 1);
    if focus < count {
        pages.push(focus);
    }
    for distance in 1..=radius {
        if let Some(next) = focus.checked_add(distance).filter(|page| *page < count) {
            pages.push(next);
        }
        if let Some(previous) = focus.checked_sub(distance).filter(|page| *page < count) {
            pages.push(previous);
        }
    }
    pages
}

impl PageImageLoader for ThreadedPageLoader {
    fn peek(&self, page: usize) -> Option<PageBuffer> {
        self.shared.lock().cache.get(page).cloned()
    }

    fn prefetch_around(&self, page: usize, on_ready: ReadyCallback) {
        let window = prefetch_window(page, self.prefetch_radius, self.page_count());
        let mut state = self.shared.lock();
        state.cache.set_focus(page);
        state.last_on_ready = Some(Arc::clone(&on_ready));
        let mut scheduled = 0usize;
        for candidate in window {
            if state.cache.contains(candidate) {
                continue;
            }
            self.enqueue(&mut state, candidate, Waiter::Callback(Arc::clone(&on_ready)));
            scheduled += 1;
        }
        tracing::debug!(focus = page, scheduled, "prefetch requested");
    }

    fn set_target_raster_size(&self, width: u32, height: u32, scale: f32) {
        let scale = if scale.is_finite() && scale > 0.0 {
            scale
        } else {
            1.0
        };
        let mut state = self.shared.lock();
        let generation = state.target.generation + 1;
        state.target = RasterTarget {
            width,
            height,
            scale,
            generation,
        };
        let cached = state.cache.clear();
        tracing::debug!(
            width,
            height,
            scale,
            generation,
            redecode = cached.len(),
            "loader raster target changed"
        );
        if let Some(on_ready) = state.last_on_ready.clone() {
            for page in cached {
                self.enqueue(&mut state, page, Waiter::Callback(Arc::clone(&on_ready)));
            }
        }
    }
}

impl Drop for ThreadedPageLoader {
    fn drop(&mut self) {
        self.jobs.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn run_job(shared: &Shared, page: usize) {
    loop {
        let target = shared.lock().target;
        let result = shared
            .source
            .decode(page)
            .map(|image| rasterize(image, target));

        let mut state = shared.lock();
        if state.target.generation != target.generation {
            tracing::debug!(page, "discarding decode for superseded raster size");
            continue;
        }
        let waiters = state.pending.remove(&page).unwrap_or_default();
        match result {
            Ok(buffer) => {
                let buffer: PageBuffer = Arc::new(buffer);
                state.cache.insert(page, Arc::clone(&buffer));
                drop(state);
                tracing::trace!(page, waiters = waiters.len(), "page decoded");
                for waiter in waiters {
                    match waiter {
                        Waiter::Callback(callback) => (*callback)(),
                        Waiter::Request(sender) => {
                            let _ = sender.send(Arc::clone(&buffer));
                        }
                    }
                }
            }
            Err(error) => {
                drop(state);
                tracing::warn!(page, error = %error, "page decode failed; placeholder stays");
            }
        }
        return;
    }
}

fn rasterize(image: DynamicImage, target: RasterTarget) -> image::RgbaImage {
    let rgba = image.into_rgba8();
    match target.dimensions() {
        Some((width, height)) if (width, height) != rgba.dimensions() => {
            imageops::resize(&rgba, width, height, FilterType::Triangle)
        }
        _ => rgba,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_starts_at_focus_and_alternates() {
        assert_eq!(prefetch_window(5, 2, 20), vec![5, 6, 4, 7, 3]);
    }

    #[test]
    fn window_is_clipped_to_document() {
        assert_eq!(prefetch_window(0, 1, 20), vec![0, 1]);
        assert_eq!(prefetch_window(19, 1, 20), vec![19, 18]);
        assert!(prefetch_window(25, 1, 20).is_empty());
    }

    #[test]
    fn raster_target_applies_scale() {
        let target = RasterTarget {
            width: 200,
            height: 100,
            scale: 0.5,
            generation: 1,
        };
        assert_eq!(target.dimensions(), Some((100, 50)));
        let unset = RasterTarget {
            width: 0,
            ..target
        };
        assert_eq!(unset.dimensions(), None);
    }
}
