#![allow(dead_code)]

mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from handgrid for tests
pub use handgrid::{
    GridAggregator, GridPipeline, GridReading, Hand, HandMap, MarkerColor, MarkerGrid, PatternCatalog,
    PatternScorer, Photo, ScoringConfig,
};

/// A reading with the given `(index, color, size)` markers and nothing else.
pub fn reading_with(markers: &[(usize, MarkerColor, u8)]) -> GridReading {
    let mut colors = vec![None; 81];
    let mut sizes = vec![None; 81];
    for &(i, c, s) in markers {
        colors[i] = Some(c);
        sizes[i] = Some(s);
    }
    GridReading::new(colors, sizes).expect("81 cells")
}

/// A grid with the given `(index, color, size)` markers.
pub fn grid_with(markers: &[(usize, MarkerColor, u8)]) -> MarkerGrid {
    let mut colors = vec![None; 81];
    let mut sizes = vec![0; 81];
    for &(i, c, s) in markers {
        colors[i] = Some(c);
        sizes[i] = s;
    }
    MarkerGrid::new(colors, sizes).expect("81 cells")
}
