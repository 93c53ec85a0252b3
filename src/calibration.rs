//! Deriving size thresholds from sample photographs.
//!
//! Calibration measures the diameter ratio of every marker it can find
//! and spreads the four cut points evenly over the observed range. The new
//! thresholds only take effect once installed into the shared
//! [`ActiveConfig`](crate::ActiveConfig).

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::config::SizeThresholds;
use crate::error::{GridError, Result};
use crate::models::MarkerColor;
use crate::pipeline::{GridPipeline, Photo};

const HISTOGRAM_EDGES: [f32; 12] = [0.0, 0.2, 0.4, 0.6, 0.8, 1.0, 1.2, 1.4, 1.6, 1.8, 2.0, 2.5];

/// One marker measured during calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioSample {
    pub image: String,
    pub index: usize,
    pub color: MarkerColor,
    pub ratio: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub range: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub samples: Vec<RatioSample>,
    pub count: usize,
    pub min: f32,
    pub max: f32,
    pub median: f32,
    pub thresholds: SizeThresholds,
    pub histogram: Vec<HistogramBin>,
    /// Human-readable ratio span of each size level.
    pub size_ranges: BTreeMap<String, String>,
    pub images_used: usize,
    pub images_total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calibrated_at: Option<String>,
}

impl CalibrationReport {
    /// Summarize samples; needs at least two of them.
    pub fn from_samples(samples: Vec<RatioSample>, images_used: usize, images_total: usize) -> Result<Self> {
        if samples.len() < 2 {
            return Err(GridError::InsufficientSamples {
                found: samples.len(),
            });
        }

        let mut sorted: Vec<f32> = samples.iter().map(|s| s.ratio).collect();
        sorted.sort_by(f32::total_cmp);
        let min = sorted[0];
        let max = sorted[sorted.len() - 1];
        let thresholds = SizeThresholds::range_linear(min, max)?;

        Ok(Self {
            count: samples.len(),
            min,
            max,
            median: median(&sorted),
            thresholds,
            histogram: histogram(&sorted),
            size_ranges: size_ranges(&thresholds),
            samples,
            images_used,
            images_total,
            calibrated_at: OffsetDateTime::now_utc().format(&Rfc3339).ok(),
        })
    }
}

fn median(sorted: &[f32]) -> f32 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}

/// Counts over half-open bins; ratios past the last edge are not counted.
fn histogram(ratios: &[f32]) -> Vec<HistogramBin> {
    HISTOGRAM_EDGES
        .windows(2)
        .map(|w| HistogramBin {
            range: format!("{:.2}-{:.2}", w[0], w[1]),
            count: ratios.iter().filter(|r| (w[0]..w[1]).contains(*r)).count(),
        })
        .collect()
}

fn size_ranges(t: &SizeThresholds) -> BTreeMap<String, String> {
    let [t1, t2, t3, t4] = t.as_array();
    BTreeMap::from([
        ("size_1".to_string(), format!("< {t1:.3}")),
        ("size_2".to_string(), format!("{t1:.3} - {t2:.3}")),
        ("size_3".to_string(), format!("{t2:.3} - {t3:.3}")),
        ("size_4".to_string(), format!("{t3:.3} - {t4:.3}")),
        ("size_5".to_string(), format!("> {t4:.3}")),
    ])
}

pub struct Calibrator {
    pipeline: Arc<GridPipeline>,
}

impl Calibrator {
    pub fn new(pipeline: Arc<GridPipeline>) -> Self {
        Self { pipeline }
    }

    /// Measure every photograph. Returns the samples and how many
    /// photographs contributed.
    pub async fn collect(&self, photos: Vec<Photo>) -> (Vec<RatioSample>, usize) {
        let labels: Vec<String> = photos.iter().map(|p| p.label.clone()).collect();
        let measured = self.pipeline.measure_batch(photos).await;

        let mut used = 0;
        let mut samples = Vec::new();
        for (label, cells) in labels.into_iter().zip(measured) {
            let Some(cells) = cells else { continue };
            used += 1;
            samples.extend(cells.into_iter().map(|m| RatioSample {
                image: label.clone(),
                index: m.index,
                color: m.color,
                ratio: m.diameter_ratio,
            }));
        }
        (samples, used)
    }

    /// Derive thresholds without installing them.
    pub async fn calibrate(&self, photos: Vec<Photo>) -> Result<CalibrationReport> {
        let total = photos.len();
        let (samples, used) = self.collect(photos).await;
        info!("calibration: {} markers from {}/{} photographs", samples.len(), used, total);
        CalibrationReport::from_samples(samples, used, total)
    }

    /// Derive thresholds and make them the active configuration.
    ///
    /// On error the active configuration is left untouched.
    pub async fn calibrate_and_apply(&self, photos: Vec<Photo>) -> Result<CalibrationReport> {
        let report = self.calibrate(photos).await.inspect_err(|e| {
            warn!("calibration failed, thresholds unchanged: {}", e);
        })?;

        let thresholds = report.thresholds;
        self.pipeline
            .config()
            .update(|current| current.clone().with_thresholds(thresholds));
        info!("installed thresholds {:?}", report.thresholds.as_array());
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(ratio: f32) -> RatioSample {
        RatioSample {
            image: "a".into(),
            index: 0,
            color: MarkerColor::Cyan,
            ratio,
        }
    }

    #[test]
    fn thresholds_spread_over_observed_range() {
        let report = CalibrationReport::from_samples(vec![sample(1.5), sample(0.5), sample(1.0)], 1, 1).unwrap();
        assert_eq!(report.min, 0.5);
        assert_eq!(report.max, 1.5);
        assert_eq!(report.median, 1.0);
        let t = report.thresholds.as_array();
        for (got, want) in t.iter().zip([0.7, 0.9, 1.1, 1.3]) {
            assert!((got - want).abs() < 1e-5);
        }
        assert_eq!(report.size_ranges["size_1"], "< 0.700");
        assert!(report.calibrated_at.is_some());
    }

    #[test]
    fn one_sample_is_not_enough() {
        assert!(matches!(
            CalibrationReport::from_samples(vec![sample(1.0)], 1, 1),
            Err(GridError::InsufficientSamples { found: 1 })
        ));
    }

    #[test]
    fn histogram_bins_are_half_open() {
        let bins = histogram(&[0.0, 0.2, 0.39, 2.5, 3.0]);
        assert_eq!(bins.len(), 11);
        assert_eq!(bins[0].range, "0.00-0.20");
        assert_eq!(bins[0].count, 1);
        assert_eq!(bins[1].count, 2);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 3);
    }
}
