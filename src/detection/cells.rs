use image::imageops::crop_imm;
use image::{GenericImageView, ImageBuffer, Pixel, SubImage};

use crate::models::{CELL_COUNT, GRID_DIM, GridBounds};

/// One cell of the lattice in image coordinates, already trimmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRegion {
    pub index: usize,
    pub row: usize,
    pub col: usize,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CellRegion {
    /// Zero-area cells come from pathological bounds and classify as empty.
    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// The centered sub-rectangle spanning `ratio` of each axis.
    pub fn center_region(&self, ratio: f32) -> CellRegion {
        let margin_w = (self.width as f32 * (1.0 - ratio) / 2.0) as u32;
        let margin_h = (self.height as f32 * (1.0 - ratio) / 2.0) as u32;
        CellRegion {
            x: self.x + margin_w,
            y: self.y + margin_h,
            width: self.width.saturating_sub(2 * margin_w),
            height: self.height.saturating_sub(2 * margin_h),
            ..*self
        }
    }

    /// Borrow this cell's pixels out of a full-frame buffer.
    pub fn view<'a, P>(
        &self,
        image: &'a ImageBuffer<P, Vec<P::Subpixel>>,
    ) -> SubImage<&'a ImageBuffer<P, Vec<P::Subpixel>>>
    where
        P: Pixel,
    {
        crop_imm(image, self.x, self.y, self.width, self.height)
    }
}

/// Slices the lattice into 81 row-major cells.
#[derive(Debug, Clone, Copy)]
pub struct CellExtractor {
    /// Pixels trimmed inward on every side to keep lattice lines out.
    pub padding: u32,
}

impl Default for CellExtractor {
    fn default() -> Self {
        Self { padding: 2 }
    }
}

impl CellExtractor {
    pub fn new(padding: u32) -> Self {
        Self { padding }
    }

    /// Always returns exactly 81 regions, clamped to the image.
    pub fn extract(&self, bounds: &GridBounds, image_width: u32, image_height: u32) -> Vec<CellRegion> {
        let pad = self.padding as i64;
        let (img_w, img_h) = (image_width as i64, image_height as i64);

        (0..CELL_COUNT)
            .map(|index| {
                let (row, col) = (index / GRID_DIM, index % GRID_DIM);
                let y1 = (bounds.lines_h[row] as i64 + pad).clamp(0, img_h);
                let y2 = (bounds.lines_h[row + 1] as i64 - pad).clamp(0, img_h);
                let x1 = (bounds.lines_v[col] as i64 + pad).clamp(0, img_w);
                let x2 = (bounds.lines_v[col + 1] as i64 - pad).clamp(0, img_w);
                CellRegion {
                    index,
                    row,
                    col,
                    x: x1 as u32,
                    y: y1 as u32,
                    width: (x2 - x1).max(0) as u32,
                    height: (y2 - y1).max(0) as u32,
                }
            })
            .collect()
    }
}

/// Count pixels of a view satisfying `pred`.
pub fn count_pixels<V>(view: &V, pred: impl Fn(V::Pixel) -> bool) -> u64
where
    V: GenericImageView,
{
    view.pixels().filter(|(_, _, p)| pred(*p)).count() as u64
}
