use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::config::ScoringConfig;
use crate::error::{GridError, Result};
use crate::models::{CELL_COUNT, MAX_MARKER_SIZE, MarkerColor};

const BUILTIN_CATALOG: &str = include_str!("../../data/patterns.json");

/// Report text for each severity level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityText {
    pub light: String,
    pub mild: String,
    pub serious: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternReport {
    pub cause: String,
    #[serde(rename = "symptoms")]
    pub symptoms_by_severity: SeverityText,
    #[serde(rename = "treatments")]
    pub treatments_by_severity: SeverityText,
    #[serde(rename = "carings")]
    pub carings_by_severity: SeverityText,
    pub disclaimer: String,
}

/// A named reference template over the 81 cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPattern")]
pub struct DiseasePattern {
    pub id: u32,
    pub name_zh: String,
    pub name_en: String,
    pub symptoms: Vec<String>,
    grid_color: Vec<Option<MarkerColor>>,
    pub report: PatternReport,
}

#[derive(Deserialize)]
struct RawPattern {
    id: u32,
    name_zh: String,
    name_en: String,
    #[serde(default)]
    symptoms: Vec<String>,
    grid_color: Vec<Option<MarkerColor>>,
    #[serde(default)]
    report: PatternReport,
}

impl TryFrom<RawPattern> for DiseasePattern {
    type Error = GridError;

    fn try_from(raw: RawPattern) -> Result<Self> {
        if raw.grid_color.len() != CELL_COUNT {
            return Err(GridError::InvalidCatalog(format!(
                "pattern {} has {} cells, expected {}",
                raw.id,
                raw.grid_color.len(),
                CELL_COUNT
            )));
        }
        Ok(Self {
            id: raw.id,
            name_zh: raw.name_zh,
            name_en: raw.name_en,
            symptoms: raw.symptoms,
            grid_color: raw.grid_color,
            report: raw.report,
        })
    }
}

impl DiseasePattern {
    /// Color tag per cell; `None` cells do not count towards the score.
    pub fn grid_color(&self) -> &[Option<MarkerColor>] {
        &self.grid_color
    }

    /// `(index, tag)` of every cell the pattern weights.
    pub fn weighted_cells(&self) -> impl Iterator<Item = (usize, MarkerColor)> + '_ {
        self.grid_color
            .iter()
            .enumerate()
            .filter_map(|(i, tag)| tag.map(|t| (i, t)))
    }

    pub fn is_scorable(&self) -> bool {
        self.weighted_cells().next().is_some()
    }

    /// Score of a grid holding the hand's color at size 5 on every weighted cell.
    pub fn max_score(&self, config: &ScoringConfig) -> u32 {
        self.weighted_cells()
            .map(|(_, tag)| MAX_MARKER_SIZE as u32 * config.weight(tag))
            .sum()
    }
}

/// Read-only set of patterns, unique by id, in file order.
#[derive(Debug, Clone)]
pub struct PatternCatalog {
    patterns: Vec<DiseasePattern>,
}

impl PatternCatalog {
    pub fn new(patterns: Vec<DiseasePattern>) -> Result<Self> {
        let mut seen = HashSet::new();
        for p in &patterns {
            if !seen.insert(p.id) {
                return Err(GridError::InvalidCatalog(format!("duplicate pattern id {}", p.id)));
            }
        }
        Ok(Self { patterns })
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Self::new(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    /// The catalog compiled into the binary, parsed once per process.
    pub fn builtin() -> Result<&'static PatternCatalog> {
        static CATALOG: OnceLock<PatternCatalog> = OnceLock::new();
        if let Some(catalog) = CATALOG.get() {
            return Ok(catalog);
        }
        let parsed = Self::from_json_str(BUILTIN_CATALOG)?;
        Ok(CATALOG.get_or_init(|| parsed))
    }

    pub fn patterns(&self) -> &[DiseasePattern] {
        &self.patterns
    }

    pub fn get(&self, id: u32) -> Option<&DiseasePattern> {
        self.patterns.iter().find(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
