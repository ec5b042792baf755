use image::{DynamicImage, Rgba, RgbaImage};
use pagepack::LocalPack;

use crate::error::LoadError;

/// Where page pixels come from. Implementations are called from loader
/// worker threads and may block.
pub trait PageSource: Send + Sync + 'static {
    fn page_count(&self) -> usize;

    fn decode(&self, page: usize) -> Result<DynamicImage, LoadError>;
}

/// Decodes page images listed by a [`LocalPack`].
#[derive(Debug, Clone)]
pub struct PackSource {
    pack: LocalPack,
}

impl PackSource {
    pub fn new(pack: LocalPack) -> Self {
        Self { pack }
    }

    pub fn pack(&self) -> &LocalPack {
        &self.pack
    }
}

impl PageSource for PackSource {
    fn page_count(&self) -> usize {
        self.pack.page_count()
    }

    fn decode(&self, page: usize) -> Result<DynamicImage, LoadError> {
        let path = self.pack.page_path(page).ok_or(LoadError::OutOfRange {
            page,
            count: self.pack.page_count(),
        })?;
        image::open(&path).map_err(|source| LoadError::Decode { page, path, source })
    }
}

/// Generates a vertical gradient per page; used when no pack is configured.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticSource {
    pages: usize,
    size: (u32, u32),
}

impl SyntheticSource {
    pub fn new(pages: usize, size: (u32, u32)) -> Self {
        Self {
            pages,
            size: (size.0.max(1), size.1.max(1)),
        }
    }
}

impl PageSource for SyntheticSource {
    fn page_count(&self) -> usize {
        self.pages
    }

    fn decode(&self, page: usize) -> Result<DynamicImage, LoadError> {
        if page >= self.pages {
            return Err(LoadError::OutOfRange {
                page,
                count: self.pages,
            });
        }
        let (width, height) = self.size;
        let tint = page_tint(page);
        let image = RgbaImage::from_fn(width, height, |_, y| {
            let shade = 0.55 + 0.45 * (y as f32 / height as f32);
            Rgba([
                (tint[0] as f32 * shade) as u8,
                (tint[1] as f32 * shade) as u8,
                (tint[2] as f32 * shade) as u8,
                255,
            ])
        });
        Ok(DynamicImage::ImageRgba8(image))
    }
}

fn page_tint(page: usize) -> [u8; 3] {
    const PALETTE: [[u8; 3]; 6] = [
        [236, 222, 196],
        [205, 226, 240],
        [222, 240, 205],
        [240, 210, 214],
        [225, 214, 240],
        [240, 234, 200],
    ];
    PALETTE[page % PALETTE.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_pages_have_requested_size() {
        let source = SyntheticSource::new(3, (40, 60));
        let image = source.decode(2).unwrap();
        assert_eq!((image.width(), image.height()), (40, 60));
    }

    #[test]
    fn synthetic_source_rejects_pages_past_the_end() {
        let source = SyntheticSource::new(3, (4, 4));
        let err = source.decode(3).unwrap_err();
        assert!(matches!(err, LoadError::OutOfRange { page: 3, count: 3 }));
    }
}
