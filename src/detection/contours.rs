use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};

/// Axis-aligned bounding box of one outer contour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContourBox {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl ContourBox {
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    /// `min(w, h) / max(w, h)`, 1.0 for a perfect square.
    pub fn squareness(&self) -> f64 {
        let w = self.width() as f64;
        let h = self.height() as f64;
        w.min(h) / w.max(h)
    }
}

/// Bounding boxes of the outermost contours of a binary mask.
///
/// Contours nested inside holes of other shapes are skipped.
pub fn find_external_contours(mask: &GrayImage) -> Vec<ContourBox> {
    find_contours::<u32>(mask)
        .into_iter()
        .filter(|c| c.parent.is_none() && c.border_type == BorderType::Outer)
        .filter_map(|c| {
            let first = c.points.first()?;
            let init = ContourBox {
                min_x: first.x,
                min_y: first.y,
                max_x: first.x,
                max_y: first.y,
            };
            Some(c.points.iter().fold(init, |b, p| ContourBox {
                min_x: b.min_x.min(p.x),
                min_y: b.min_y.min(p.y),
                max_x: b.max_x.max(p.x),
                max_y: b.max_y.max(p.y),
            }))
        })
        .collect()
}
