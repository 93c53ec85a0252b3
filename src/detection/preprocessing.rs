use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::morphology::{close, dilate, open};

use crate::models::MarkerColor;

/// Image whose three channels hold hue (0..=180), saturation and value.
pub type HsvImage = ImageBuffer<Rgb<u8>, Vec<u8>>;

/// Convert image to grayscale
pub fn to_grayscale(img: &RgbImage) -> GrayImage {
    image::imageops::grayscale(img)
}

/// Detect edges using Canny edge detector
pub fn detect_edges(img: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    canny(img, low_threshold, high_threshold)
}

/// Convert one RGB pixel to 8-bit HSV with hue halved into `0..=180`.
pub fn rgb_to_hsv([r, g, b]: [u8; 3]) -> [u8; 3] {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = (max - min) as f32;

    let s = if max == 0 {
        0.0
    } else {
        255.0 * delta / max as f32
    };

    let h = if delta == 0.0 {
        0.0
    } else {
        let (r, g, b) = (r as f32, g as f32, b as f32);
        let deg = if max as f32 == r {
            60.0 * (g - b) / delta
        } else if max as f32 == g {
            120.0 + 60.0 * (b - r) / delta
        } else {
            240.0 + 60.0 * (r - g) / delta
        };
        if deg < 0.0 { deg + 360.0 } else { deg }
    };

    [(h / 2.0).round() as u8, s.round() as u8, max]
}

pub fn to_hsv(img: &RgbImage) -> HsvImage {
    let (width, height) = img.dimensions();
    let mut hsv = HsvImage::new(width, height);
    for (src, dst) in img.pixels().zip(hsv.pixels_mut()) {
        *dst = Rgb(rgb_to_hsv(src.0));
    }
    hsv
}

/// Inclusive box in HSV space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HsvRange {
    pub hue: (u8, u8),
    pub saturation: (u8, u8),
    pub value: (u8, u8),
}

impl HsvRange {
    pub const fn new(hue: (u8, u8), saturation: (u8, u8), value: (u8, u8)) -> Self {
        Self {
            hue,
            saturation,
            value,
        }
    }

    pub fn contains(&self, [h, s, v]: [u8; 3]) -> bool {
        (self.hue.0..=self.hue.1).contains(&h)
            && (self.saturation.0..=self.saturation.1).contains(&s)
            && (self.value.0..=self.value.1).contains(&v)
    }
}

/// Low-saturation, mid-value pixels of the printed lattice.
pub const LATTICE_GRAY: HsvRange = HsvRange::new((0, 180), (0, 40), (120, 220));

const GREEN: [HsvRange; 1] = [HsvRange::new((35, 85), (50, 255), (50, 255))];
const CYAN: [HsvRange; 1] = [HsvRange::new((80, 105), (50, 255), (50, 255))];
const BLUE: [HsvRange; 1] = [HsvRange::new((100, 130), (50, 255), (50, 255))];
const RED: [HsvRange; 2] = [
    HsvRange::new((0, 10), (50, 255), (50, 255)),
    HsvRange::new((170, 180), (50, 255), (50, 255)),
];
const YELLOW: [HsvRange; 1] = [HsvRange::new((20, 35), (50, 255), (50, 255))];

/// HSV boxes of a marker color. Red wraps around hue 0.
pub fn color_ranges(color: MarkerColor) -> &'static [HsvRange] {
    match color {
        MarkerColor::Green => &GREEN,
        MarkerColor::Cyan => &CYAN,
        MarkerColor::Blue => &BLUE,
        MarkerColor::Red => &RED,
        MarkerColor::Yellow => &YELLOW,
    }
}

pub fn matches_color(hsv: [u8; 3], color: MarkerColor, min_saturation: u8) -> bool {
    hsv[1] >= min_saturation && color_ranges(color).iter().any(|r| r.contains(hsv))
}

/// Binary mask (255 = inside) of pixels within `range`.
pub fn range_mask(hsv: &HsvImage, range: HsvRange) -> GrayImage {
    binary_mask(hsv, |p| range.contains(p))
}

/// Binary mask of pixels showing `color` with at least `min_saturation`.
pub fn color_mask(hsv: &HsvImage, color: MarkerColor, min_saturation: u8) -> GrayImage {
    binary_mask(hsv, |p| matches_color(p, color, min_saturation))
}

fn binary_mask(hsv: &HsvImage, inside: impl Fn([u8; 3]) -> bool) -> GrayImage {
    let (width, height) = hsv.dimensions();
    let mut mask = GrayImage::new(width, height);
    for (src, dst) in hsv.pixels().zip(mask.pixels_mut()) {
        if inside(src.0) {
            *dst = Luma([255]);
        }
    }
    mask
}

/// Bridge gaps up to `radius` pixels wide with a square structuring element.
pub fn close_mask(mask: &GrayImage, radius: u8) -> GrayImage {
    close(mask, Norm::LInf, radius)
}

/// Open then close to drop speckles and fill pinholes.
pub fn despeckle(mask: &GrayImage, radius: u8) -> GrayImage {
    close(&open(mask, Norm::LInf, radius), Norm::LInf, radius)
}

pub fn dilate_mask(mask: &GrayImage, radius: u8) -> GrayImage {
    dilate(mask, Norm::LInf, radius)
}
