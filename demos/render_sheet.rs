use handgrid::MarkerColor;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut};
use imageproc::rect::Rect;

const SIZE: u32 = 600;
const ORIGIN: u32 = 75;
const CELL: u32 = 50;

/// Renders a synthetic exercise sheet: a gray 9x9 lattice with a diagonal
/// of left-hand markers and a row of right-hand markers of growing size.
fn main() {
    let output = std::env::args().nth(1).unwrap_or_else(|| "sheet.png".to_string());
    let mut img = RgbImage::from_pixel(SIZE, SIZE, Rgb([250, 250, 250]));

    let gray = Rgb([160, 160, 160]);
    let span = CELL * 9;
    for i in 0..=9 {
        let p = (ORIGIN + i * CELL) as i32 - 2;
        draw_filled_rect_mut(&mut img, Rect::at(p, ORIGIN as i32 - 2).of_size(4, span + 4), gray);
        draw_filled_rect_mut(&mut img, Rect::at(ORIGIN as i32 - 2, p).of_size(span + 4, 4), gray);
    }

    let mut marker = |row: u32, col: u32, color: MarkerColor, radius: i32| {
        let [r, g, b] = color.display_rgb().map(|c| (c as f32 * 0.8) as u8);
        let center = (
            (ORIGIN + col * CELL + CELL / 2) as i32,
            (ORIGIN + row * CELL + CELL / 2) as i32,
        );
        draw_filled_circle_mut(&mut img, center, radius, Rgb([r, g, b]));
    };
    for i in 0..9 {
        marker(i, i, MarkerColor::Cyan, 8 + (i as i32 % 5) * 3);
    }
    for col in 0..9 {
        if col != 4 {
            marker(4, col, MarkerColor::Green, 8 + (col as i32 % 5) * 3);
        }
    }

    match img.save(&output) {
        Ok(()) => println!("Created {output} ({SIZE}x{SIZE} exercise sheet)"),
        Err(e) => eprintln!("Failed to save {output}: {e}"),
    }
}
