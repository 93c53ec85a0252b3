use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::DynamicImage;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::aggregate::{ConsensusGrid, GridAggregator};
use crate::config::{ActiveConfig, ClassifierConfig};
use crate::detection::locator::GridLocator;
use crate::detection::overlay::draw_overlay;
use crate::detection::preprocessing::{LATTICE_GRAY, range_mask};
use crate::detection::{CellMeasurement, Detection, Frame, GRID_NOT_FOUND, GridReader};
use crate::error::{GridError, Result};
use crate::models::{GridReading, HandMap};
use crate::scoring::{PatternScorer, ScoreReport};

/// Debug configuration for pipeline execution
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Root directory for debug outputs
    pub output_dir: PathBuf,
    /// Whether debug mode is enabled
    pub enabled: bool,
}

/// Settings shared by every photograph of a run.
#[derive(Clone, Debug, Default)]
pub struct PipelineContext {
    pub verbose: bool,
    pub debug: Option<DebugConfig>,
}

/// Where a photograph's pixels come from.
#[derive(Clone, Debug)]
pub enum PhotoSource {
    Path(PathBuf),
    /// Encoded bytes in any format the `image` crate decodes.
    Encoded(Vec<u8>),
    Image(DynamicImage),
    /// Row-major `height x width x 3` RGB.
    Raw { width: u32, height: u32, data: Vec<u8> },
}

impl PhotoSource {
    fn decode(self) -> Result<Frame> {
        match self {
            PhotoSource::Path(path) => Ok(Frame::from_image(&image::open(path)?)),
            PhotoSource::Encoded(bytes) => Ok(Frame::from_image(&image::load_from_memory(&bytes)?)),
            PhotoSource::Image(img) => Ok(Frame::from_image(&img)),
            PhotoSource::Raw { width, height, data } => Frame::from_raw(width, height, data),
        }
    }
}

/// One photograph of an exercise sheet.
#[derive(Clone, Debug)]
pub struct Photo {
    /// Used in log lines and debug directory names.
    pub label: String,
    pub source: PhotoSource,
}

impl Photo {
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let label = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "photo".to_string());
        Self {
            label,
            source: PhotoSource::Path(path.to_path_buf()),
        }
    }

    pub fn from_bytes(label: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            label: label.into(),
            source: PhotoSource::Encoded(bytes),
        }
    }

    pub fn from_image(label: impl Into<String>, image: DynamicImage) -> Self {
        Self {
            label: label.into(),
            source: PhotoSource::Image(image),
        }
    }

    pub fn from_raw(label: impl Into<String>, width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            label: label.into(),
            source: PhotoSource::Raw { width, height, data },
        }
    }
}

/// Everything produced for one examination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExaminationReport {
    pub image_count: usize,
    pub readings: Vec<GridReading>,
    pub consensus: ConsensusGrid,
    #[serde(flatten)]
    pub scores: ScoreReport,
}

/// Reads photographs into grids, one at a time or as a concurrent batch.
pub struct GridPipeline {
    reader: GridReader,
    config: Arc<ActiveConfig>,
    context: PipelineContext,
}

impl GridPipeline {
    pub fn new() -> Self {
        Self {
            reader: GridReader::default(),
            config: Arc::new(ActiveConfig::default()),
            context: PipelineContext::default(),
        }
    }

    /// Enable verbose output
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.context.verbose = verbose;
        self
    }

    /// Enable debug mode with output directory
    /// The directory must be empty or non-existent
    pub fn with_debug(mut self, output_dir: PathBuf) -> Result<Self> {
        if output_dir.exists() {
            if std::fs::read_dir(&output_dir)?.next().is_some() {
                return Err(GridError::DebugDirNotEmpty(output_dir));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        self.context.debug = Some(DebugConfig {
            output_dir,
            enabled: true,
        });
        Ok(self)
    }

    /// Share a configuration cell, e.g. with a [`crate::Calibrator`].
    pub fn with_config(mut self, config: Arc<ActiveConfig>) -> Self {
        self.config = config;
        self
    }

    pub fn with_locator(mut self, locator: GridLocator) -> Self {
        self.reader = GridReader::new(locator);
        self
    }

    pub fn config(&self) -> &Arc<ActiveConfig> {
        &self.config
    }

    pub fn reader(&self) -> &GridReader {
        &self.reader
    }

    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    /// Read one photograph with the configuration active right now.
    pub fn read(&self, photo: Photo) -> GridReading {
        let config = self.config.snapshot();
        self.read_photo(0, photo, &config)
    }

    /// Read the photograph at `position` of a batch.
    ///
    /// Undecodable input and a missing grid both come back as a failed
    /// reading.
    pub fn read_photo(&self, position: usize, photo: Photo, config: &ClassifierConfig) -> GridReading {
        let Photo { label, source } = photo;
        let frame = match source.decode() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("{}: {}", label, e);
                return GridReading::failed(e.to_string());
            }
        };
        self.read_frame(position, &label, &frame, config)
    }

    pub fn read_frame(&self, position: usize, label: &str, frame: &Frame, config: &ClassifierConfig) -> GridReading {
        if self.context.verbose {
            info!("Reading {} ({}x{})", label, frame.width(), frame.height());
        }
        let detection = match self.reader.detect(frame, config) {
            Ok(detection) => detection,
            Err(e) => return GridReading::failed(e.to_string()),
        };
        if let Err(e) = self.save_debug_output(position, label, frame, detection.as_ref()) {
            warn!("failed to save debug output for {}: {}", label, e);
        }

        match detection {
            Some(d) => d.reading,
            None => GridReading::failed(GRID_NOT_FOUND),
        }
    }

    /// Raw ratios of one photograph, `None` when it cannot be used.
    pub fn measure_photo(&self, photo: Photo, config: &ClassifierConfig) -> Option<Vec<CellMeasurement>> {
        let frame = match photo.source.decode() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("{}: {}", photo.label, e);
                return None;
            }
        };
        let measured = self.reader.measure(&frame, config);
        if measured.is_none() {
            warn!("{}: {}", photo.label, GRID_NOT_FOUND);
        }
        measured
    }

    /// Read every photograph concurrently.
    ///
    /// Readings come back in submission order. The configuration is taken
    /// once for the whole batch.
    pub async fn read_batch(self: &Arc<Self>, photos: Vec<Photo>) -> Vec<GridReading> {
        let config = self.config.snapshot();
        let handles: Vec<_> = photos
            .into_iter()
            .enumerate()
            .map(|(position, photo)| {
                let pipeline = Arc::clone(self);
                let config = Arc::clone(&config);
                tokio::task::spawn_blocking(move || pipeline.read_photo(position, photo, &config))
            })
            .collect();

        let mut readings = Vec::with_capacity(handles.len());
        for (position, handle) in handles.into_iter().enumerate() {
            readings.push(handle.await.unwrap_or_else(|e| {
                warn!("photo {} worker failed: {}", position + 1, e);
                GridReading::failed(format!("worker failed: {e}"))
            }));
        }
        let ok = readings.iter().filter(|r| r.success()).count();
        debug!("batch read: {}/{} photographs usable", ok, readings.len());
        readings
    }

    /// Raw ratios of every photograph, in submission order.
    pub async fn measure_batch(self: &Arc<Self>, photos: Vec<Photo>) -> Vec<Option<Vec<CellMeasurement>>> {
        let config = self.config.snapshot();
        let handles: Vec<_> = photos
            .into_iter()
            .map(|photo| {
                let pipeline = Arc::clone(self);
                let config = Arc::clone(&config);
                tokio::task::spawn_blocking(move || pipeline.measure_photo(photo, &config))
            })
            .collect();

        let mut measured = Vec::with_capacity(handles.len());
        for handle in handles {
            measured.push(handle.await.unwrap_or_else(|e| {
                warn!("measurement worker failed: {}", e);
                None
            }));
        }
        measured
    }

    /// Read, merge and score one examination's photographs.
    pub async fn analyze(
        self: &Arc<Self>,
        photos: Vec<Photo>,
        scorer: &PatternScorer<'_>,
        hands: &HandMap,
    ) -> Result<ExaminationReport> {
        let readings = self.read_batch(photos).await;
        let consensus = GridAggregator::new(*hands).aggregate(&readings)?;
        let scores = scorer.score(&consensus.grid, hands);

        Ok(ExaminationReport {
            image_count: readings.len(),
            readings: readings.into_iter().map(GridReading::without_details).collect(),
            consensus,
            scores,
        })
    }

    /// Save the input, lattice mask and overlay under `NN_<label>/`.
    fn save_debug_output(
        &self,
        position: usize,
        label: &str,
        frame: &Frame,
        detection: Option<&Detection>,
    ) -> Result<()> {
        let Some(debug_config) = &self.context.debug else {
            return Ok(());
        };
        if !debug_config.enabled {
            return Ok(());
        }

        let dir_name = format!("{:02}_{}", position + 1, debug_dir_label(label));
        let dir = debug_config.output_dir.join(&dir_name);
        std::fs::create_dir_all(&dir)?;

        frame.rgb().save(dir.join("input.png"))?;
        range_mask(frame.hsv(), LATTICE_GRAY).save(dir.join("lattice_mask.png"))?;
        if let Some(d) = detection {
            draw_overlay(frame.rgb(), &d.bounds, &d.cells, d.reading.cells()).save(dir.join("overlay.png"))?;
        }

        if self.context.verbose {
            info!("  Debug: saved {}/", dir_name);
        }
        Ok(())
    }
}

impl Default for GridPipeline {
    fn default() -> Self {
        Self::new()
    }
}

fn debug_dir_label(label: &str) -> String {
    label
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}
