use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use image::RgbaImage;
use pageloader::{PageBuffer, PageImageLoader, ReadyCallback};

/// In-memory loader whose readiness is set by the test.
#[derive(Default)]
pub(crate) struct FakeLoader {
    ready: Mutex<HashMap<usize, PageBuffer>>,
    pub(crate) prefetches: Mutex<Vec<usize>>,
    pub(crate) targets: Mutex<Vec<(u32, u32, f32)>>,
    pub(crate) peeks: AtomicUsize,
}

impl FakeLoader {
    pub(crate) fn set_ready(&self, page: usize, image: RgbaImage) {
        self.ready.lock().unwrap().insert(page, Arc::new(image));
    }

    pub(crate) fn prefetched(&self) -> Vec<usize> {
        self.prefetches.lock().unwrap().clone()
    }

    pub(crate) fn peek_count(&self) -> usize {
        self.peeks.load(Ordering::SeqCst)
    }
}

impl PageImageLoader for FakeLoader {
    fn peek(&self, page: usize) -> Option<PageBuffer> {
        self.peeks.fetch_add(1, Ordering::SeqCst);
        self.ready.lock().unwrap().get(&page).cloned()
    }

    fn prefetch_around(&self, page: usize, _on_ready: ReadyCallback) {
        self.prefetches.lock().unwrap().push(page);
    }

    fn set_target_raster_size(&self, width: u32, height: u32, scale: f32) {
        self.targets.lock().unwrap().push((width, height, scale));
    }
}
