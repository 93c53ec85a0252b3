pub mod aggregate;
pub mod calibration;
pub mod config;
pub mod detection;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod scoring;

pub use aggregate::{ConsensusGrid, GridAggregator};
pub use calibration::{CalibrationReport, Calibrator, RatioSample};
pub use config::{ActiveConfig, ClassifierConfig, ScoringConfig, SeverityBands, SizeThresholds};
pub use detection::{Frame, GridReader};
pub use error::{GridError, Result};
pub use models::{CellReading, GridBounds, GridReading, Hand, HandCounts, HandMap, MarkerColor, MarkerGrid};
pub use pipeline::{DebugConfig, ExaminationReport, GridPipeline, Photo, PhotoSource, PipelineContext};
pub use scoring::catalog::{DiseasePattern, PatternCatalog};
pub use scoring::{HandAnalysis, PatternResult, PatternScorer, Rank, ScoreReport, Severity, Simulation};
