//! Merging several readings of one sheet into a consensus grid.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{GridError, Result};
use crate::models::{CELL_COUNT, GridReading, HandCounts, HandMap, MarkerColor, MarkerGrid};

/// Per-cell merge of every successful reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusGrid {
    #[serde(flatten)]
    pub grid: MarkerGrid,
    pub readings_used: usize,
    pub readings_total: usize,
    pub dot_counts: HandCounts,
}

/// Cell-wise reduction over readings.
///
/// Size is the median of every successful reading's contribution (0 for
/// "no marker here"). Color is taken from the last reading, in input
/// order, that saw a marker at the cell.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridAggregator {
    hands: HandMap,
}

impl GridAggregator {
    pub fn new(hands: HandMap) -> Self {
        Self { hands }
    }

    /// Fails with [`GridError::NoUsableInput`] when no reading succeeded.
    pub fn aggregate(&self, readings: &[GridReading]) -> Result<ConsensusGrid> {
        let usable: Vec<&GridReading> = readings.iter().filter(|r| r.success()).collect();
        if usable.is_empty() {
            warn!("none of {} readings succeeded", readings.len());
            return Err(GridError::NoUsableInput {
                total: readings.len(),
            });
        }

        let mut colors = vec![None; CELL_COUNT];
        let mut sizes = vec![0u8; CELL_COUNT];
        let mut contributions = Vec::with_capacity(usable.len());
        for index in 0..CELL_COUNT {
            contributions.clear();
            contributions.extend(usable.iter().map(|r| r.grid_size()[index].unwrap_or(0)));

            let size = median_size(&contributions);
            if size == 0 {
                continue;
            }
            sizes[index] = size;
            colors[index] = last_color(&usable, index);
        }

        let grid = MarkerGrid::new(colors, sizes)?;
        let dot_counts = HandCounts::tally(&grid, &self.hands);
        debug!(
            "consensus of {}/{} readings: {} left, {} right",
            usable.len(),
            readings.len(),
            dot_counts.left,
            dot_counts.right
        );

        Ok(ConsensusGrid {
            grid,
            readings_used: usable.len(),
            readings_total: readings.len(),
            dot_counts,
        })
    }
}

fn last_color(readings: &[&GridReading], index: usize) -> Option<MarkerColor> {
    readings.iter().rev().find_map(|r| r.grid_color()[index])
}

/// Median rounded half to even, so `[2, 3]` gives 2 and `[3, 4]` gives 4.
fn median_size(values: &[u8]) -> u8 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 1 {
        sorted[mid] as f64
    } else {
        (sorted[mid - 1] as f64 + sorted[mid] as f64) / 2.0
    };
    median.round_ties_even() as u8
}
