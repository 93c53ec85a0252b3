pub mod cells;
pub mod classifier;
pub mod contours;
pub mod locator;
pub mod overlay;
pub mod preprocessing;

use image::{DynamicImage, GrayImage, RgbImage};
use log::{debug, info};

use crate::config::ClassifierConfig;
use crate::error::{GridError, Result};
use crate::models::{GridBounds, GridReading, MarkerColor};
use cells::{CellExtractor, CellRegion};
use classifier::{CellClassifier, MaskCache};
use locator::GridLocator;
use preprocessing::HsvImage;

/// Reason given for photographs whose lattice cannot be located.
pub const GRID_NOT_FOUND: &str = "could not detect grid in image";

/// A decoded photograph with the color spaces the detectors work in.
pub struct Frame {
    rgb: RgbImage,
    hsv: HsvImage,
    gray: GrayImage,
}

impl Frame {
    pub fn from_rgb(rgb: RgbImage) -> Self {
        let hsv = preprocessing::to_hsv(&rgb);
        let gray = preprocessing::to_grayscale(&rgb);
        Self { rgb, hsv, gray }
    }

    pub fn from_image(image: &DynamicImage) -> Self {
        Self::from_rgb(image.to_rgb8())
    }

    /// Wrap a row-major `height x width x 3` RGB buffer.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let len = data.len();
        let rgb = RgbImage::from_raw(width, height, data).filter(|_| len == width as usize * height as usize * 3);
        rgb.map(Self::from_rgb)
            .ok_or(GridError::InvalidBuffer { width, height, len })
    }

    pub fn rgb(&self) -> &RgbImage {
        &self.rgb
    }

    pub fn hsv(&self) -> &HsvImage {
        &self.hsv
    }

    pub fn gray(&self) -> &GrayImage {
        &self.gray
    }

    pub fn width(&self) -> u32 {
        self.rgb.width()
    }

    pub fn height(&self) -> u32 {
        self.rgb.height()
    }
}

/// Intermediate products of reading one frame, kept for diagnostics.
pub struct Detection {
    pub bounds: GridBounds,
    pub strategy: String,
    pub cells: Vec<CellRegion>,
    pub reading: GridReading,
}

/// Non-empty cell of one frame with its raw diameter ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellMeasurement {
    pub index: usize,
    pub color: MarkerColor,
    pub diameter_ratio: f32,
}

/// Locate, slice and classify a single frame.
#[derive(Default)]
pub struct GridReader {
    locator: GridLocator,
}

impl GridReader {
    pub fn new(locator: GridLocator) -> Self {
        Self { locator }
    }

    pub fn locator(&self) -> &GridLocator {
        &self.locator
    }

    /// Read a frame; a missing grid yields a failed reading.
    pub fn read(&self, frame: &Frame, config: &ClassifierConfig) -> GridReading {
        match self.detect(frame, config) {
            Ok(Some(detection)) => detection.reading,
            Ok(None) => GridReading::failed(GRID_NOT_FOUND),
            Err(e) => GridReading::failed(e.to_string()),
        }
    }

    /// Like [`read`](Self::read) but keeps the bounds and cell regions.
    pub fn detect(&self, frame: &Frame, config: &ClassifierConfig) -> Result<Option<Detection>> {
        let Some((bounds, strategy)) = self.locator.locate_named(frame) else {
            info!("no grid found in {}x{} frame", frame.width(), frame.height());
            return Ok(None);
        };

        let cells = CellExtractor::new(config.cell_padding).extract(&bounds, frame.width(), frame.height());
        let readings = CellClassifier::new(config).classify_all(frame.hsv(), &cells);
        let reading = GridReading::from_cells(readings, bounds)?;
        info!(
            "grid found by {} at ({}, {}) size {}, {} markers",
            strategy,
            bounds.x,
            bounds.y,
            bounds.size,
            reading.marker_count()
        );

        Ok(Some(Detection {
            bounds,
            strategy: strategy.to_string(),
            cells,
            reading,
        }))
    }

    /// Raw ratios of every non-empty cell, or `None` when no grid is found.
    pub fn measure(&self, frame: &Frame, config: &ClassifierConfig) -> Option<Vec<CellMeasurement>> {
        let bounds = self.locator.locate(frame)?;
        let cells = CellExtractor::new(config.cell_padding).extract(&bounds, frame.width(), frame.height());
        let classifier = CellClassifier::new(config);
        let mut cache = MaskCache::new(frame.hsv(), config.min_saturation);

        let measurements: Vec<CellMeasurement> = cells
            .iter()
            .filter_map(|cell| {
                let m = classifier.measure(frame.hsv(), &mut cache, cell)?;
                Some(CellMeasurement {
                    index: cell.index,
                    color: m.color,
                    diameter_ratio: m.diameter_ratio,
                })
            })
            .collect();
        debug!("measured {} markers", measurements.len());
        Some(measurements)
    }
}
