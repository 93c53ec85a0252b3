use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::{GridError, Result};
use crate::models::MarkerColor;

/// Diameter-ratio cut points between the five size levels.
///
/// A ratio `<= t1` is size 1, `<= t2` size 2, `<= t3` size 3, `<= t4`
/// size 4, anything larger size 5.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f32; 4]", into = "[f32; 4]")]
pub struct SizeThresholds {
    t1: f32,
    t2: f32,
    t3: f32,
    t4: f32,
}

impl SizeThresholds {
    pub fn new(t1: f32, t2: f32, t3: f32, t4: f32) -> Result<Self> {
        let all = [t1, t2, t3, t4];
        let valid = all.iter().all(|t| t.is_finite()) && all.windows(2).all(|w| w[0] < w[1]);
        if !valid {
            return Err(GridError::InvalidThresholds(all));
        }
        Ok(Self { t1, t2, t3, t4 })
    }

    /// Place cut points at 20/40/60/80% of the way from `min` to `max`.
    pub fn range_linear(min: f32, max: f32) -> Result<Self> {
        let range = max - min;
        Self::new(
            min + range * 0.2,
            min + range * 0.4,
            min + range * 0.6,
            min + range * 0.8,
        )
    }

    pub fn quantize(&self, ratio: f32) -> u8 {
        if ratio <= self.t1 {
            1
        } else if ratio <= self.t2 {
            2
        } else if ratio <= self.t3 {
            3
        } else if ratio <= self.t4 {
            4
        } else {
            5
        }
    }

    pub fn as_array(&self) -> [f32; 4] {
        [self.t1, self.t2, self.t3, self.t4]
    }
}

impl Default for SizeThresholds {
    fn default() -> Self {
        Self {
            t1: 0.717,
            t2: 0.886,
            t3: 1.054,
            t4: 1.223,
        }
    }
}

impl TryFrom<[f32; 4]> for SizeThresholds {
    type Error = GridError;

    fn try_from(t: [f32; 4]) -> Result<Self> {
        Self::new(t[0], t[1], t[2], t[3])
    }
}

impl From<SizeThresholds> for [f32; 4] {
    fn from(t: SizeThresholds) -> Self {
        t.as_array()
    }
}

/// Tunables of the cell classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub thresholds: SizeThresholds,
    /// Fraction of each cell axis inspected for color presence.
    pub center_ratio: f32,
    /// Minimum colored fraction of the center region for a non-empty cell.
    pub min_center_fraction: f32,
    /// Pixels below this HSV saturation never count as a marker color.
    pub min_saturation: u8,
    /// Pixels trimmed from every side of a cell before classification.
    pub cell_padding: u32,
    /// Re-derive thresholds from each photograph's own ratios.
    pub rescale_per_image: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            thresholds: SizeThresholds::default(),
            center_ratio: 0.4,
            min_center_fraction: 0.2,
            min_saturation: 80,
            cell_padding: 2,
            rescale_per_image: false,
        }
    }
}

impl ClassifierConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn with_thresholds(mut self, thresholds: SizeThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }
}

/// The classifier configuration in effect, swapped as a whole.
///
/// Readers take an `Arc` snapshot at the start of a call and keep using it
/// even if calibration installs a new value meanwhile.
#[derive(Debug, Default)]
pub struct ActiveConfig {
    current: RwLock<Arc<ClassifierConfig>>,
}

impl ActiveConfig {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(config)),
        }
    }

    pub fn snapshot(&self) -> Arc<ClassifierConfig> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Install `config`, returning the previous value.
    pub fn replace(&self, config: ClassifierConfig) -> Arc<ClassifierConfig> {
        self.update(|_| config)
    }

    /// Derive the next value from the current one under a single write lock,
    /// returning the previous value.
    pub fn update(&self, f: impl FnOnce(&ClassifierConfig) -> ClassifierConfig) -> Arc<ClassifierConfig> {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let next = Arc::new(f(&guard));
        std::mem::replace(&mut *guard, next)
    }
}

/// Contiguous severity bands: light `light_min..=light_max`, mild
/// `light_max+1..=mild_max`, serious above. `light_min` doubles as the
/// minimum display score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawBands")]
pub struct SeverityBands {
    light_min: u32,
    light_max: u32,
    mild_max: u32,
}

#[derive(Deserialize)]
struct RawBands {
    light_min: u32,
    light_max: u32,
    mild_max: u32,
}

impl TryFrom<RawBands> for SeverityBands {
    type Error = GridError;

    fn try_from(raw: RawBands) -> Result<Self> {
        Self::new(raw.light_min, raw.light_max, raw.mild_max)
    }
}

impl SeverityBands {
    pub fn new(light_min: u32, light_max: u32, mild_max: u32) -> Result<Self> {
        if light_min == 0 || light_min > light_max || light_max >= mild_max {
            return Err(GridError::InvalidBands(light_min, light_max, mild_max));
        }
        Ok(Self {
            light_min,
            light_max,
            mild_max,
        })
    }

    pub fn min_display(&self) -> u32 {
        self.light_min
    }

    pub fn light_max(&self) -> u32 {
        self.light_max
    }

    pub fn mild_max(&self) -> u32 {
        self.mild_max
    }
}

impl Default for SeverityBands {
    fn default() -> Self {
        Self {
            light_min: 4,
            light_max: 8,
            mild_max: 18,
        }
    }
}

/// Tunables of the pattern scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Weight of each pattern color tag; tags not listed use `default_weight`.
    pub color_weights: BTreeMap<MarkerColor, u32>,
    pub default_weight: u32,
    pub bands: SeverityBands,
    /// Largest score gap at which the runner-up is still primary.
    pub primary_gap: u32,
    /// Patterns surfaced per hand.
    pub visible_limit: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            color_weights: BTreeMap::from([
                (MarkerColor::Red, 3),
                (MarkerColor::Yellow, 2),
                (MarkerColor::Blue, 1),
            ]),
            default_weight: 1,
            bands: SeverityBands::default(),
            primary_gap: 3,
            visible_limit: 2,
        }
    }
}

impl ScoringConfig {
    pub fn weight(&self, tag: MarkerColor) -> u32 {
        self.color_weights
            .get(&tag)
            .copied()
            .unwrap_or(self.default_weight)
    }
}
