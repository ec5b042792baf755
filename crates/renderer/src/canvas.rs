//! Off-screen page surface.
//!
//! `FrameCanvas` owns the single pixel buffer a page is drawn into before it
//! is handed to the flip engine. Text is not rasterized; labels are recorded
//! with their computed size and position so a presenter (or a test) can
//! render or inspect them.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use pageloader::PageImageLoader;

use crate::types::RenderStyle;

/// Approximate advance of one glyph as a fraction of the font size.
const GLYPH_ADVANCE: f32 = 0.6;
/// Gap between the page number and the bottom edge.
const BOTTOM_MARGIN: f32 = 20.0;
/// Gap between the page number and its caption.
const CAPTION_GAP: f32 = 5.0;

/// A line of text placed on the canvas. `origin` is the top-left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLabel {
    pub text: String,
    pub size: f32,
    pub origin: (f32, f32),
    pub color: [u8; 4],
}

impl TextLabel {
    pub fn width(&self) -> f32 {
        text_width(&self.text, self.size)
    }
}

/// Buffer lifecycle counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CanvasStats {
    pub allocations: u64,
    pub releases: u64,
    pub draws: u64,
}

pub struct FrameCanvas {
    pixels: Option<RgbaImage>,
    labels: Vec<TextLabel>,
    style: RenderStyle,
    max_pages: usize,
    stats: CanvasStats,
}

impl FrameCanvas {
    pub fn new(style: RenderStyle, max_pages: usize) -> Self {
        Self {
            pixels: None,
            labels: Vec::new(),
            style,
            max_pages,
            stats: CanvasStats::default(),
        }
    }

    pub fn stats(&self) -> CanvasStats {
        self.stats
    }

    pub fn is_allocated(&self) -> bool {
        self.pixels.is_some()
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.pixels.as_ref().map(RgbaImage::dimensions)
    }

    pub fn pixels(&self) -> Option<&RgbaImage> {
        self.pixels.as_ref()
    }

    pub fn labels(&self) -> &[TextLabel] {
        &self.labels
    }

    /// Allocates a fresh buffer. A buffer that is still held is released first.
    pub fn allocate(&mut self, width: u32, height: u32) {
        if self.pixels.is_some() {
            tracing::warn!("canvas buffer still held at allocation; releasing it first");
            self.release();
        }
        let (width, height) = (width.max(1), height.max(1));
        self.pixels = Some(RgbaImage::from_pixel(
            width,
            height,
            Rgba(self.style.background),
        ));
        self.stats.allocations += 1;
        tracing::debug!(width, height, "canvas buffer allocated");
    }

    /// Frees the buffer; returns whether one was held.
    pub fn release(&mut self) -> bool {
        self.labels.clear();
        match self.pixels.take() {
            Some(_) => {
                self.stats.releases += 1;
                true
            }
            None => false,
        }
    }

    /// Font size for `base`, scaled by the ratio of canvas width to the
    /// reference width.
    pub fn font_size(&self, base: f32) -> f32 {
        let width = self.dimensions().map_or(self.style.reference_width, |(w, _)| w);
        base * width as f32 / self.style.reference_width.max(1) as f32
    }

    /// Draws page `number` and reports whether it was a placeholder draw,
    /// i.e. the loader had no content for it yet. Never blocks on the loader.
    ///
    /// Without an allocated buffer nothing is drawn and the draw counts as a
    /// placeholder.
    pub fn draw_page(&mut self, number: usize, loader: &dyn PageImageLoader) -> bool {
        let Some(pixels) = self.pixels.as_mut() else {
            tracing::warn!(page = number, "draw requested before a surface exists");
            return true;
        };
        let (width, height) = pixels.dimensions();

        for pixel in pixels.pixels_mut() {
            *pixel = Rgba(self.style.background);
        }

        let content = loader.peek(number);
        if let Some(buffer) = content.as_deref() {
            if buffer.dimensions() == (width, height) {
                imageops::overlay(pixels, buffer, 0, 0);
            } else {
                let scaled = imageops::resize(buffer, width, height, FilterType::Triangle);
                imageops::overlay(pixels, &scaled, 0, 0);
            }
        }

        self.labels = self.page_labels(number, width as f32, height as f32);
        self.stats.draws += 1;

        let placeholder = content.is_none();
        tracing::trace!(page = number, placeholder, "page drawn");
        placeholder
    }

    fn page_labels(&self, number: usize, width: f32, height: f32) -> Vec<TextLabel> {
        let color = self.style.text_color;
        let size = self.font_size(self.style.page_number_size);
        let text = number.to_string();
        let y = height - size - BOTTOM_MARGIN;
        let mut labels = vec![TextLabel {
            origin: ((width - text_width(&text, size)) / 2.0, y),
            text,
            size,
            color,
        }];

        let caption = if number <= 1 {
            Some("The First Page")
        } else if number >= self.max_pages {
            Some("The Last Page")
        } else {
            None
        };
        if let Some(caption) = caption {
            let caption_size = self.font_size(self.style.caption_size);
            labels.push(TextLabel {
                text: caption.to_string(),
                size: caption_size,
                origin: (
                    (width - text_width(caption, caption_size)) / 2.0,
                    y + CAPTION_GAP + caption_size,
                ),
                color,
            });
        }
        labels
    }
}

fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * GLYPH_ADVANCE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeLoader;

    const CYAN: Rgba<u8> = Rgba([0, 255, 255, 255]);

    fn canvas(max_pages: usize) -> FrameCanvas {
        let mut canvas = FrameCanvas::new(RenderStyle::default(), max_pages);
        canvas.allocate(360, 640);
        canvas
    }

    #[test]
    fn missing_content_draws_placeholder_with_first_page_caption() {
        let mut canvas = canvas(20);
        let loader = FakeLoader::default();

        assert!(canvas.draw_page(0, &loader));
        let pixels = canvas.pixels().unwrap();
        assert_eq!(*pixels.get_pixel(10, 10), CYAN);
        assert_eq!(*pixels.get_pixel(359, 639), CYAN);

        let texts: Vec<_> = canvas.labels().iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, ["0", "The First Page"]);
    }

    #[test]
    fn ready_content_covers_background() {
        let mut canvas = canvas(20);
        let loader = FakeLoader::default();
        loader.set_ready(5, RgbaImage::from_pixel(36, 64, Rgba([10, 20, 30, 255])));

        assert!(!canvas.draw_page(5, &loader));
        let pixels = canvas.pixels().unwrap();
        assert_eq!(*pixels.get_pixel(0, 0), Rgba([10, 20, 30, 255]));
        assert_eq!(*pixels.get_pixel(359, 639), Rgba([10, 20, 30, 255]));
        assert_eq!(canvas.labels().len(), 1);
    }

    #[test]
    fn last_page_caption() {
        let mut canvas = canvas(20);
        let loader = FakeLoader::default();
        canvas.draw_page(20, &loader);
        assert_eq!(canvas.labels()[1].text, "The Last Page");
        canvas.draw_page(19, &loader);
        assert_eq!(canvas.labels().len(), 1);
    }

    #[test]
    fn labels_scale_with_width_and_sit_above_bottom_margin() {
        let mut canvas = canvas(20);
        canvas.draw_page(1, &FakeLoader::default());
        let number = &canvas.labels()[0];
        assert_eq!(number.size, 40.0);
        assert_eq!(number.origin.1, 640.0 - 40.0 - 20.0);
        assert_eq!(number.origin.0, (360.0 - number.width()) / 2.0);

        let caption = &canvas.labels()[1];
        assert_eq!(caption.size, 8.0);
        assert_eq!(caption.origin.1, number.origin.1 + 5.0 + 8.0);
    }

    #[test]
    fn allocation_and_release_are_counted() {
        let mut canvas = FrameCanvas::new(RenderStyle::default(), 3);
        assert!(!canvas.release());
        canvas.allocate(10, 10);
        canvas.allocate(20, 10);
        assert_eq!(canvas.dimensions(), Some((20, 10)));
        let stats = canvas.stats();
        assert_eq!((stats.allocations, stats.releases), (2, 1));
    }

    #[test]
    fn unallocated_canvas_reports_placeholder_without_drawing() {
        let mut canvas = FrameCanvas::new(RenderStyle::default(), 3);
        assert!(canvas.draw_page(0, &FakeLoader::default()));
        assert_eq!(canvas.stats().draws, 0);
    }
}
