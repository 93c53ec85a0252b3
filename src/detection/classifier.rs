//! Per-cell marker color and size.
//!
//! Color is decided from the cell's center only, so two same-colored
//! markers touching across a shared lattice line do not bleed into each
//! other. Size comes from a full-frame distance transform of that color's
//! mask: the distance peak near the cell center is the radius of the
//! largest disc that fits inside the marker, which stays meaningful when a
//! marker spills over the lattice line.

use std::collections::HashMap;

use image::imageops::invert;
use image::{ImageBuffer, Luma};
use imageproc::distance_transform::euclidean_squared_distance_transform;

use super::cells::{CellRegion, count_pixels};
use super::preprocessing::{HsvImage, color_mask, despeckle, matches_color};
use crate::config::{ClassifierConfig, SizeThresholds};
use crate::models::{CellReading, MarkerColor};

/// Squared distance from each marker pixel to the nearest non-marker pixel.
pub type DistanceMap = ImageBuffer<Luma<f64>, Vec<f64>>;

/// Ratio ranges narrower than this collapse every marker to the middle size.
const MIN_RESCALE_RANGE: f32 = 0.01;

/// Distance maps of one photograph, built on first use per color.
pub struct MaskCache<'a> {
    hsv: &'a HsvImage,
    min_saturation: u8,
    maps: HashMap<MarkerColor, DistanceMap>,
}

impl<'a> MaskCache<'a> {
    pub fn new(hsv: &'a HsvImage, min_saturation: u8) -> Self {
        Self {
            hsv,
            min_saturation,
            maps: HashMap::new(),
        }
    }

    pub fn distance_map(&mut self, color: MarkerColor) -> &DistanceMap {
        let hsv = self.hsv;
        let min_saturation = self.min_saturation;
        self.maps
            .entry(color)
            .or_insert_with(|| build_distance_map(hsv, color, min_saturation))
    }

    /// Number of colors computed so far.
    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}

fn build_distance_map(hsv: &HsvImage, color: MarkerColor, min_saturation: u8) -> DistanceMap {
    let mut background = despeckle(&color_mask(hsv, color, min_saturation), 1);
    // The transform measures distance to the nearest nonzero pixel, so the
    // background has to be the foreground here.
    invert(&mut background);
    euclidean_squared_distance_transform(&background)
}

/// Color and raw diameter ratio of a non-empty cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub color: MarkerColor,
    /// Colored fraction of the cell center.
    pub coverage: f32,
    pub diameter_ratio: f32,
}

pub struct CellClassifier<'c> {
    config: &'c ClassifierConfig,
}

impl<'c> CellClassifier<'c> {
    pub fn new(config: &'c ClassifierConfig) -> Self {
        Self { config }
    }

    /// Dominant color of the cell center and its coverage, or `None` when
    /// no color covers at least `min_center_fraction`.
    pub fn center_color(&self, hsv: &HsvImage, cell: &CellRegion) -> Option<(MarkerColor, f32)> {
        if cell.is_degenerate() {
            return None;
        }
        let center = cell.center_region(self.config.center_ratio);
        if center.is_degenerate() {
            return None;
        }

        let view = center.view(hsv);
        let area = center.area() as f32;
        let sat = self.config.min_saturation;

        let mut best: Option<(MarkerColor, f32)> = None;
        for color in MarkerColor::ALL {
            let fraction = count_pixels(&*view, |p| matches_color(p.0, color, sat)) as f32 / area;
            if fraction > best.map_or(0.0, |(_, f)| f) {
                best = Some((color, fraction));
            }
        }

        best.filter(|(_, fraction)| *fraction >= self.config.min_center_fraction)
    }

    /// Marker width relative to the cell width.
    ///
    /// Takes the distance peak inside the cell's center region; the marker
    /// spans `2 * sqrt(peak) - 1` pixels at that point.
    pub fn diameter_ratio(&self, cache: &mut MaskCache<'_>, cell: &CellRegion, color: MarkerColor) -> f32 {
        if cell.is_degenerate() {
            return 0.0;
        }
        let center = cell.center_region(self.config.center_ratio);
        let map = cache.distance_map(color);

        let mut peak = 0.0f64;
        for y in center.y..center.y + center.height {
            for x in center.x..center.x + center.width {
                if x < map.width() && y < map.height() {
                    peak = peak.max(map.get_pixel(x, y)[0]);
                }
            }
        }

        let diameter = (2.0 * peak.sqrt() - 1.0).max(0.0);
        diameter as f32 / cell.width as f32
    }

    /// Color and ratio without quantizing to a size level.
    pub fn measure(&self, hsv: &HsvImage, cache: &mut MaskCache<'_>, cell: &CellRegion) -> Option<Measurement> {
        let (color, coverage) = self.center_color(hsv, cell)?;
        Some(Measurement {
            color,
            coverage,
            diameter_ratio: self.diameter_ratio(cache, cell, color),
        })
    }

    pub fn classify(&self, hsv: &HsvImage, cache: &mut MaskCache<'_>, cell: &CellRegion) -> CellReading {
        let mut reading = CellReading::empty(cell.index);
        if let Some(m) = self.measure(hsv, cache, cell) {
            reading.color = Some(m.color);
            reading.size = Some(self.config.thresholds.quantize(m.diameter_ratio));
            reading.confidence = m.coverage.min(1.0);
            reading.diameter_ratio = m.diameter_ratio;
        }
        reading
    }

    /// Classify every cell of one photograph, sharing one mask cache.
    pub fn classify_all(&self, hsv: &HsvImage, cells: &[CellRegion]) -> Vec<CellReading> {
        let mut cache = MaskCache::new(hsv, self.config.min_saturation);
        let mut readings: Vec<CellReading> = cells.iter().map(|c| self.classify(hsv, &mut cache, c)).collect();
        if self.config.rescale_per_image {
            rescale_sizes(&mut readings);
        }
        readings
    }
}

/// Re-quantize non-empty cells against thresholds spread over this
/// photograph's own ratio range.
fn rescale_sizes(readings: &mut [CellReading]) {
    let ratios: Vec<f32> = readings
        .iter()
        .filter(|r| !r.is_empty())
        .map(|r| r.diameter_ratio)
        .collect();
    if ratios.len() < 2 {
        return;
    }
    let min = ratios.iter().copied().fold(f32::INFINITY, f32::min);
    let max = ratios.iter().copied().fold(f32::NEG_INFINITY, f32::max);

    let thresholds = if max - min < MIN_RESCALE_RANGE {
        None
    } else {
        SizeThresholds::range_linear(min, max).ok()
    };
    for reading in readings.iter_mut().filter(|r| !r.is_empty()) {
        reading.size = Some(match &thresholds {
            Some(t) => t.quantize(reading.diameter_ratio),
            None => 3,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::preprocessing::to_hsv;
    use image::{Rgb, RgbImage};
    use imageproc::drawing::draw_filled_circle_mut;

    fn cell_at(x: u32, y: u32, size: u32) -> CellRegion {
        CellRegion {
            index: 0,
            row: 0,
            col: 0,
            x,
            y,
            width: size,
            height: size,
        }
    }

    #[test]
    fn empty_center_is_no_marker() {
        let img = RgbImage::from_pixel(60, 60, Rgb([255, 255, 255]));
        let hsv = to_hsv(&img);
        let config = ClassifierConfig::default();
        let classifier = CellClassifier::new(&config);
        let mut cache = MaskCache::new(&hsv, config.min_saturation);

        let reading = classifier.classify(&hsv, &mut cache, &cell_at(10, 10, 40));
        assert_eq!(reading.color, None);
        assert_eq!(reading.size, None);
        assert_eq!(reading.confidence, 0.0);
        // Nothing to measure, so no mask was built.
        assert!(cache.is_empty());
    }

    #[test]
    fn larger_markers_measure_wider() {
        let mut img = RgbImage::from_pixel(200, 100, Rgb([255, 255, 255]));
        draw_filled_circle_mut(&mut img, (50, 50), 8, Rgb([0, 200, 0]));
        draw_filled_circle_mut(&mut img, (150, 50), 18, Rgb([0, 200, 0]));
        let hsv = to_hsv(&img);
        let config = ClassifierConfig::default();
        let classifier = CellClassifier::new(&config);
        let mut cache = MaskCache::new(&hsv, config.min_saturation);

        let small = classifier.measure(&hsv, &mut cache, &cell_at(30, 30, 40)).unwrap();
        let large = classifier.measure(&hsv, &mut cache, &cell_at(130, 30, 40)).unwrap();
        assert_eq!(small.color, MarkerColor::Green);
        assert_eq!(large.color, MarkerColor::Green);
        assert!(large.diameter_ratio > small.diameter_ratio);
        assert!((small.diameter_ratio - 17.0 / 40.0).abs() < 0.08);
        assert!((large.diameter_ratio - 37.0 / 40.0).abs() < 0.08);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn per_image_rescale_spreads_sizes() {
        let mut readings: Vec<CellReading> = (0..3).map(CellReading::empty).collect();
        for (r, ratio) in readings.iter_mut().zip([0.5, 1.0, 1.5]) {
            r.color = Some(MarkerColor::Cyan);
            r.size = Some(1);
            r.diameter_ratio = ratio;
        }
        rescale_sizes(&mut readings);
        let sizes: Vec<_> = readings.iter().map(|r| r.size).collect();
        assert_eq!(sizes, vec![Some(1), Some(3), Some(5)]);
    }

    #[test]
    fn uniform_markers_rescale_to_middle_size() {
        let mut readings: Vec<CellReading> = (0..4).map(CellReading::empty).collect();
        for (r, ratio) in readings.iter_mut().take(3).zip([0.800, 0.805, 0.809]) {
            r.color = Some(MarkerColor::Green);
            r.size = Some(2);
            r.diameter_ratio = ratio;
        }
        rescale_sizes(&mut readings);
        let sizes: Vec<_> = readings.iter().map(|r| r.size).collect();
        assert_eq!(sizes, vec![Some(3), Some(3), Some(3), None]);
    }

    #[test]
    fn single_marker_is_not_rescaled() {
        let mut readings: Vec<CellReading> = (0..2).map(CellReading::empty).collect();
        readings[0].color = Some(MarkerColor::Cyan);
        readings[0].size = Some(4);
        readings[0].diameter_ratio = 1.1;
        rescale_sizes(&mut readings);
        assert_eq!(readings[0].size, Some(4));
        assert_eq!(readings[1].size, None);
    }
}
