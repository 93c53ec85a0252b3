use handgrid::MarkerColor;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut};
use imageproc::rect::Rect;
use tempfile::NamedTempFile;

pub const SHEET_SIZE: u32 = 400;
/// Top-left corner of the lattice, on both axes.
pub const GRID_ORIGIN: u32 = 60;
/// Lattice pitch in pixels.
pub const CELL: u32 = 30;

pub const PRINTED_GRAY: Rgb<u8> = Rgb([160, 160, 160]);
pub const INK_BLACK: Rgb<u8> = Rgb([0, 0, 0]);

/// Small, medium and large marker radii; they measure as sizes 1, 2 and 3+.
pub const SMALL: i32 = 6;
pub const MEDIUM: i32 = 11;
pub const LARGE: i32 = 13;

#[derive(Debug, Clone, Copy)]
pub struct Marker {
    pub row: usize,
    pub col: usize,
    pub color: MarkerColor,
    pub radius: i32,
}

impl Marker {
    pub fn new(row: usize, col: usize, color: MarkerColor, radius: i32) -> Self {
        Self {
            row,
            col,
            color,
            radius,
        }
    }

    pub fn index(&self) -> usize {
        self.row * 9 + self.col
    }
}

/// Saturated pen colors, well inside each marker's hue range.
pub fn pen(color: MarkerColor) -> Rgb<u8> {
    match color {
        MarkerColor::Green => Rgb([0, 200, 0]),
        MarkerColor::Cyan => Rgb([0, 200, 200]),
        MarkerColor::Blue => Rgb([0, 0, 220]),
        MarkerColor::Red => Rgb([220, 0, 0]),
        MarkerColor::Yellow => Rgb([230, 200, 0]),
    }
}

/// A white sheet with a gray 9x9 lattice and the given markers.
pub fn render_sheet(markers: &[Marker]) -> RgbImage {
    render_sheet_with_lattice(markers, PRINTED_GRAY)
}

pub fn render_sheet_with_lattice(markers: &[Marker], lattice: Rgb<u8>) -> RgbImage {
    let mut img = RgbImage::from_pixel(SHEET_SIZE, SHEET_SIZE, Rgb([255, 255, 255]));
    let span = CELL * 9;
    for i in 0..=9 {
        let p = (GRID_ORIGIN + i * CELL) as i32 - 1;
        let start = GRID_ORIGIN as i32 - 1;
        draw_filled_rect_mut(&mut img, Rect::at(p, start).of_size(3, span + 3), lattice);
        draw_filled_rect_mut(&mut img, Rect::at(start, p).of_size(span + 3, 3), lattice);
    }
    for m in markers {
        let cx = (GRID_ORIGIN + m.col as u32 * CELL + CELL / 2) as i32;
        let cy = (GRID_ORIGIN + m.row as u32 * CELL + CELL / 2) as i32;
        draw_filled_circle_mut(&mut img, (cx, cy), m.radius, pen(m.color));
    }
    img
}

/// A featureless image with no lattice to find.
pub fn blank_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([255, 255, 255]))
}

/// Writes `img` to a temporary PNG that is removed on drop.
pub fn write_png(img: &RgbImage) -> NamedTempFile {
    let file = tempfile::Builder::new()
        .suffix(".png")
        .tempfile()
        .expect("Failed to create temp image file");
    img.save_with_format(file.path(), image::ImageFormat::Png)
        .expect("Failed to save test image");
    file
}
