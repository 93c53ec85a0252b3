//! Finding the 9x9 lattice in a photograph.
//!
//! [`GridLocator`] tries an ordered list of [`LocatorStrategy`]s and keeps
//! the first one that reports bounds. The default order is the gray-lattice
//! color mask, then Hough line detection, then the largest square-ish edge
//! contour.

use image::GrayImage;
use image::imageops::crop_imm;
use imageproc::hough::{LineDetectionOptions, detect_lines};
use log::debug;

use super::Frame;
use super::contours::{ContourBox, find_external_contours};
use super::preprocessing::{HsvRange, LATTICE_GRAY, close_mask, detect_edges, dilate_mask, range_mask};
use crate::models::{GridBounds, LINE_COUNT};

/// One way of locating the grid. `None` means "not found here".
pub trait LocatorStrategy: Send + Sync {
    fn locate(&self, frame: &Frame) -> Option<GridBounds>;

    /// Human-readable name for this strategy (used in log output)
    fn name(&self) -> &str;
}

/// Ordered fallback over strategies; the first success wins.
pub struct GridLocator {
    strategies: Vec<Box<dyn LocatorStrategy>>,
}

impl GridLocator {
    /// A locator with no strategies; it never finds anything.
    pub fn empty() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    pub fn with_strategy(mut self, strategy: impl LocatorStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn locate(&self, frame: &Frame) -> Option<GridBounds> {
        self.locate_named(frame).map(|(bounds, _)| bounds)
    }

    /// Like [`locate`](Self::locate) but also names the strategy that succeeded.
    pub fn locate_named(&self, frame: &Frame) -> Option<(GridBounds, &str)> {
        self.strategies.iter().find_map(|strategy| {
            let found = strategy.locate(frame);
            match &found {
                Some(b) => debug!(
                    "{}: grid at ({}, {}) size {}",
                    strategy.name(),
                    b.x,
                    b.y,
                    b.size
                ),
                None => debug!("{}: no grid", strategy.name()),
            }
            found.map(|b| (b, strategy.name()))
        })
    }
}

impl Default for GridLocator {
    fn default() -> Self {
        Self::empty()
            .with_strategy(ColorMaskStrategy::default())
            .with_strategy(LineStrategy::default())
            .with_strategy(ContourStrategy::default())
    }
}

/// Isolate the gray lattice by color and take the most square, largest blob.
#[derive(Debug, Clone)]
pub struct ColorMaskStrategy {
    pub lattice: HsvRange,
    pub close_radius: u8,
    pub min_area_fraction: f64,
    pub max_area_fraction: f64,
    pub min_squareness: f64,
    /// Extra pixels around the candidate searched when refining its edges.
    pub refine_margin: u32,
}

impl Default for ColorMaskStrategy {
    fn default() -> Self {
        Self {
            lattice: LATTICE_GRAY,
            close_radius: 2,
            min_area_fraction: 0.05,
            max_area_fraction: 0.8,
            min_squareness: 0.8,
            refine_margin: 20,
        }
    }
}

impl LocatorStrategy for ColorMaskStrategy {
    fn locate(&self, frame: &Frame) -> Option<GridBounds> {
        let mask = close_mask(&range_mask(frame.hsv(), self.lattice), self.close_radius);
        let image_area = frame.width() as f64 * frame.height() as f64;

        let score = |c: &ContourBox| c.area() as f64 * c.squareness();
        let best = find_external_contours(&mask)
            .into_iter()
            .filter(|c| {
                let fraction = c.area() as f64 / image_area;
                c.squareness() > self.min_squareness
                    && fraction > self.min_area_fraction
                    && fraction < self.max_area_fraction
            })
            .reduce(|best, c| if score(&c) > score(&best) { c } else { best })?;

        let (mut x, mut y, mut w, mut h) = (best.min_x, best.min_y, best.width(), best.height());
        if let Some(refined) = refine_bounds(frame.gray(), (x, y, w, h), self.refine_margin) {
            (x, y, w, h) = refined;
        }

        let size = w.min(h);
        x += (w - size) / 2;
        y += (h - size) / 2;
        GridBounds::square(x, y, size)
    }

    fn name(&self) -> &str {
        "color mask"
    }
}

/// Tighten a candidate box to its strongest edge columns and rows.
///
/// Columns (rows) whose edge count exceeds 30% of the busiest one are
/// "strong"; the first and last strong ones become the new bounds. The
/// result is rejected if it shrinks either side below half.
fn refine_bounds(
    gray: &GrayImage,
    (x, y, w, h): (u32, u32, u32, u32),
    margin: u32,
) -> Option<(u32, u32, u32, u32)> {
    let (img_w, img_h) = gray.dimensions();
    let x1 = x.saturating_sub(margin);
    let y1 = y.saturating_sub(margin);
    let x2 = (x + w + margin).min(img_w);
    let y2 = (y + h + margin).min(img_h);
    if x2 <= x1 || y2 <= y1 {
        return None;
    }

    let region = crop_imm(gray, x1, y1, x2 - x1, y2 - y1).to_image();
    let edges = detect_edges(&region, 50.0, 150.0);

    let mut columns = vec![0u32; edges.width() as usize];
    let mut rows = vec![0u32; edges.height() as usize];
    for (px, py, p) in edges.enumerate_pixels() {
        if p[0] > 0 {
            columns[px as usize] += 1;
            rows[py as usize] += 1;
        }
    }

    let (left, right) = strong_span(&columns)?;
    let (top, bottom) = strong_span(&rows)?;
    let new_w = right - left;
    let new_h = bottom - top;
    if (new_w as f64) < w as f64 * 0.5 || (new_h as f64) < h as f64 * 0.5 {
        return None;
    }
    Some((x1 + left, y1 + top, new_w, new_h))
}

fn strong_span(projection: &[u32]) -> Option<(u32, u32)> {
    let max = *projection.iter().max()?;
    let threshold = max as f64 * 0.3;
    let mut strong = projection
        .iter()
        .enumerate()
        .filter(|(_, v)| **v as f64 > threshold)
        .map(|(i, _)| i as u32);
    let first = strong.next()?;
    let last = strong.last()?;
    Some((first, last))
}

/// Hough lines, clustered per axis, searched for ten evenly spaced ones.
#[derive(Debug, Clone)]
pub struct LineStrategy {
    pub canny_low: f32,
    pub canny_high: f32,
    pub vote_threshold: u32,
    pub suppression_radius: u32,
    /// Degrees a line may deviate from horizontal or vertical.
    pub angle_tolerance: u32,
    /// Lines closer than this many pixels merge into one.
    pub merge_distance: f32,
    pub min_lines: usize,
    pub min_lines_per_axis: usize,
    pub min_spacing: f32,
}

impl Default for LineStrategy {
    fn default() -> Self {
        Self {
            canny_low: 50.0,
            canny_high: 150.0,
            vote_threshold: 60,
            suppression_radius: 8,
            angle_tolerance: 10,
            merge_distance: 15.0,
            min_lines: 10,
            min_lines_per_axis: 5,
            min_spacing: 10.0,
        }
    }
}

impl LocatorStrategy for LineStrategy {
    fn locate(&self, frame: &Frame) -> Option<GridBounds> {
        let edges = detect_edges(frame.gray(), self.canny_low, self.canny_high);
        let lines = detect_lines(
            &edges,
            LineDetectionOptions {
                vote_threshold: self.vote_threshold,
                suppression_radius: self.suppression_radius,
            },
        );
        if lines.len() < self.min_lines {
            return None;
        }

        // Lines are x*cos(t) + y*sin(t) = r; t = 0 is vertical, t = 90 horizontal.
        let mid_x = frame.width() as f32 / 2.0;
        let mid_y = frame.height() as f32 / 2.0;
        let tol = self.angle_tolerance;
        let mut horizontal = Vec::new();
        let mut vertical = Vec::new();
        for line in &lines {
            let angle = line.angle_in_degrees;
            let theta = (angle as f32).to_radians();
            if angle.abs_diff(90) <= tol {
                horizontal.push((line.r - mid_x * theta.cos()) / theta.sin());
            } else if angle <= tol || angle >= 180 - tol {
                vertical.push((line.r - mid_y * theta.sin()) / theta.cos());
            }
        }
        if horizontal.len() < self.min_lines_per_axis || vertical.len() < self.min_lines_per_axis {
            return None;
        }

        let h = cluster_positions(horizontal, self.merge_distance);
        let v = cluster_positions(vertical, self.merge_distance);
        let lines_h = find_evenly_spaced(&h, self.min_spacing)?;
        let lines_v = find_evenly_spaced(&v, self.min_spacing)?;
        GridBounds::from_lines(lines_h, lines_v)
    }

    fn name(&self) -> &str {
        "line detection"
    }
}

/// Sort positions and merge runs whose neighbors are closer than `threshold`.
fn cluster_positions(mut positions: Vec<f32>, threshold: f32) -> Vec<f32> {
    positions.retain(|p| p.is_finite());
    positions.sort_by(f32::total_cmp);

    let mut clusters = Vec::new();
    let mut current: Vec<f32> = Vec::new();
    for pos in positions {
        if let Some(&last) = current.last() {
            if pos - last >= threshold {
                clusters.push(mean(&current));
                current.clear();
            }
        }
        current.push(pos);
    }
    if !current.is_empty() {
        clusters.push(mean(&current));
    }
    clusters
}

/// Pick the ten consecutive positions with the most uniform spacing.
///
/// Falls back to interpolating between the first and last position when
/// no window qualifies.
fn find_evenly_spaced(positions: &[f32], min_spacing: f32) -> Option<[f32; LINE_COUNT]> {
    if positions.len() < LINE_COUNT - 2 {
        return None;
    }

    let mut best: Option<(&[f32], f32)> = None;
    for window in positions.windows(LINE_COUNT) {
        let spacings: Vec<f32> = window.windows(2).map(|w| w[1] - w[0]).collect();
        let avg = mean(&spacings);
        let variance = spacings.iter().map(|s| (s - avg).powi(2)).sum::<f32>() / spacings.len() as f32;
        if avg > min_spacing && best.is_none_or(|(_, v)| variance < v) {
            best = Some((window, variance));
        }
    }

    if let Some((window, _)) = best {
        return window.try_into().ok();
    }

    let start = *positions.first()?;
    let end = *positions.last()?;
    let step = (end - start) / (LINE_COUNT - 1) as f32;
    Some(std::array::from_fn(|i| start + i as f32 * step))
}

fn mean(values: &[f32]) -> f32 {
    values.iter().sum::<f32>() / values.len() as f32
}

/// Heavily dilated edges; the largest square-ish blob is taken as the grid.
#[derive(Debug, Clone)]
pub struct ContourStrategy {
    pub canny_low: f32,
    pub canny_high: f32,
    pub dilate_radius: u8,
    pub min_area: u64,
    pub min_squareness: f64,
}

impl Default for ContourStrategy {
    fn default() -> Self {
        Self {
            canny_low: 30.0,
            canny_high: 100.0,
            dilate_radius: 6,
            min_area: 10_000,
            min_squareness: 0.7,
        }
    }
}

impl LocatorStrategy for ContourStrategy {
    fn locate(&self, frame: &Frame) -> Option<GridBounds> {
        let edges = detect_edges(frame.gray(), self.canny_low, self.canny_high);
        let dilated = dilate_mask(&edges, self.dilate_radius);

        let best = find_external_contours(&dilated)
            .into_iter()
            .filter(|c| c.squareness() > self.min_squareness && c.area() > self.min_area)
            .reduce(|best, c| if c.area() > best.area() { c } else { best })?;

        GridBounds::evenly_spaced(best.min_x, best.min_y, best.width(), best.height())
    }

    fn name(&self) -> &str {
        "contour"
    }
}
