use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_circle_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

use super::cells::CellRegion;
use crate::models::{CellReading, GridBounds};

const LATTICE_COLOR: Rgb<u8> = Rgb([0, 200, 0]);
/// Weight of the marker color when tinting a detected cell.
const TINT_ALPHA: f32 = 0.4;
const PIP_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
const EMPTY_MARK: Rgb<u8> = Rgb([128, 128, 128]);
const PIP: u32 = 2;
const PIP_STRIDE: u32 = 3;

/// Annotated copy of a photograph: lattice lines, detected cells tinted in
/// their marker color with a circle of the measured diameter and one pip
/// per size level, and a gray dot in empty cells.
pub fn draw_overlay(image: &RgbImage, bounds: &GridBounds, cells: &[CellRegion], readings: &[CellReading]) -> RgbImage {
    let mut out = image.clone();

    let (left, right) = (bounds.lines_v[0], bounds.lines_v[bounds.lines_v.len() - 1]);
    let (top, bottom) = (bounds.lines_h[0], bounds.lines_h[bounds.lines_h.len() - 1]);
    for &y in &bounds.lines_h {
        draw_line_segment_mut(&mut out, (left, y), (right, y), LATTICE_COLOR);
    }
    for &x in &bounds.lines_v {
        draw_line_segment_mut(&mut out, (x, top), (x, bottom), LATTICE_COLOR);
    }

    for (cell, reading) in cells.iter().zip(readings) {
        if cell.width < PIP_STRIDE || cell.height < PIP_STRIDE {
            continue;
        }
        let Some(color) = reading.color else {
            let (cx, cy) = ((cell.x + cell.width / 2) as i32, (cell.y + cell.height / 2) as i32);
            draw_filled_rect_mut(&mut out, Rect::at(cx - 1, cy - 1).of_size(3, 3), EMPTY_MARK);
            continue;
        };
        let tint = Rgb(color.display_rgb());
        tint_region(&mut out, cell, tint);

        let radius = (reading.diameter_ratio * cell.width as f32 / 2.0).round() as i32;
        if radius > 0 {
            let center = (
                (cell.x + cell.width / 2) as i32,
                (cell.y + cell.height / 2) as i32,
            );
            draw_hollow_circle_mut(&mut out, center, radius, tint);
        }
        draw_size_pips(&mut out, cell, reading.size.unwrap_or(0));
    }
    out
}

/// A row of `size` pips along the top of the cell, clipped to its width.
fn draw_size_pips(image: &mut RgbImage, cell: &CellRegion, size: u8) {
    let right = cell.x + cell.width;
    for k in 0..size as u32 {
        let x = cell.x + 1 + k * PIP_STRIDE;
        if x + PIP > right {
            break;
        }
        draw_filled_rect_mut(image, Rect::at(x as i32, cell.y as i32 + 1).of_size(PIP, PIP), PIP_COLOR);
    }
}

/// Blend `tint` into the cell, leaving a 2px rim untouched.
fn tint_region(image: &mut RgbImage, cell: &CellRegion, tint: Rgb<u8>) {
    let x2 = (cell.x + cell.width).saturating_sub(2).min(image.width());
    let y2 = (cell.y + cell.height).saturating_sub(2).min(image.height());
    for y in cell.y + 2..y2 {
        for x in cell.x + 2..x2 {
            let px = image.get_pixel_mut(x, y);
            for (c, t) in px.0.iter_mut().zip(tint.0) {
                *c = (*c as f32 * (1.0 - TINT_ALPHA) + t as f32 * TINT_ALPHA).round() as u8;
            }
        }
    }
}
