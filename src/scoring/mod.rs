//! Scoring grids against the pattern catalog.
//!
//! Each hand is scored on its own: only cells holding that hand's marker
//! color count. A pattern's score is the sum over its tagged cells of the
//! observed size (clamped to 1..=5) times the tag's weight.

pub mod catalog;
pub mod report;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::config::{ScoringConfig, SeverityBands};
use crate::error::{GridError, Result};
use crate::models::{CELL_COUNT, Hand, HandCounts, HandMap, MAX_MARKER_SIZE, MarkerColor, MarkerGrid};
use catalog::{DiseasePattern, PatternCatalog};
use report::{ReportSection, build_sections};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Light,
    Mild,
    Serious,
}

impl Severity {
    /// `None` below the display floor.
    pub fn classify(score: u32, bands: &SeverityBands) -> Option<Self> {
        if score < bands.min_display() {
            None
        } else if score <= bands.light_max() {
            Some(Severity::Light)
        } else if score <= bands.mild_max() {
            Some(Severity::Mild)
        } else {
            Some(Severity::Serious)
        }
    }

    pub fn label_zh(self) -> &'static str {
        match self {
            Severity::Light => "輕微",
            Severity::Mild => "中度",
            Severity::Serious => "嚴重",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    Primary,
    Secondary,
}

impl Rank {
    pub fn label_zh(self) -> &'static str {
        match self {
            Rank::Primary => "主要",
            Rank::Secondary => "次要",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredPattern {
    pub pattern_id: u32,
    pub score: u32,
    pub severity: Option<Severity>,
    pub rank: Option<Rank>,
}

/// A scored pattern with its names and report text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternResult {
    #[serde(flatten)]
    pub scored: ScoredPattern,
    pub name_zh: String,
    pub name_en: String,
    pub symptoms: Vec<String>,
    pub report_sections: Vec<ReportSection>,
    pub disclaimer: String,
    pub severity_zh: String,
    pub rank_zh: String,
}

impl PatternResult {
    fn new(pattern: &DiseasePattern, scored: ScoredPattern) -> Self {
        Self {
            scored,
            name_zh: pattern.name_zh.clone(),
            name_en: pattern.name_en.clone(),
            symptoms: pattern.symptoms.clone(),
            report_sections: build_sections(&pattern.report, scored.severity),
            disclaimer: pattern.report.disclaimer.clone(),
            severity_zh: scored.severity.map(Severity::label_zh).unwrap_or_default().to_string(),
            rank_zh: scored.rank.map(Rank::label_zh).unwrap_or_default().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandAnalysis {
    pub hand: Hand,
    pub hand_zh: String,
    pub color: MarkerColor,
    pub dot_count: usize,
    /// Ranked patterns above the display floor, at most `visible_limit`.
    pub patterns: Vec<PatternResult>,
    /// Every scorable pattern, highest score first.
    pub all_patterns: Vec<PatternResult>,
}

impl HandAnalysis {
    pub fn primary(&self) -> impl Iterator<Item = &PatternResult> {
        self.patterns.iter().filter(|p| p.scored.rank == Some(Rank::Primary))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub merged_grid: MarkerGrid,
    pub left_hand: HandAnalysis,
    pub right_hand: HandAnalysis,
}

impl ScoreReport {
    pub fn hand(&self, hand: Hand) -> &HandAnalysis {
        match hand {
            Hand::Left => &self.left_hand,
            Hand::Right => &self.right_hand,
        }
    }
}

/// Result of scoring a bare size grid with no hand filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Simulation {
    /// Every pattern in catalog order.
    pub scored: Vec<SimulatedPattern>,
    /// Ranked top patterns above the display floor.
    pub visible: Vec<SimulatedPattern>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedPattern {
    #[serde(flatten)]
    pub scored: ScoredPattern,
    pub name_zh: String,
    pub name_en: String,
    pub grid_color: Vec<Option<MarkerColor>>,
    pub severity_zh: String,
    pub rank_zh: String,
}

pub struct PatternScorer<'a> {
    catalog: &'a PatternCatalog,
    config: ScoringConfig,
}

impl<'a> PatternScorer<'a> {
    pub fn new(catalog: &'a PatternCatalog, config: ScoringConfig) -> Self {
        Self { catalog, config }
    }

    pub fn catalog(&self) -> &PatternCatalog {
        self.catalog
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score of `pattern` for the cells of `grid` holding `hand_color`, or
    /// `None` when the pattern tags no cells.
    pub fn score_pattern(&self, grid: &MarkerGrid, pattern: &DiseasePattern, hand_color: MarkerColor) -> Option<u32> {
        if !pattern.is_scorable() {
            return None;
        }
        let score = pattern
            .weighted_cells()
            .filter(|(i, _)| grid.color(*i) == Some(hand_color))
            .map(|(i, tag)| grid.size(i).clamp(1, MAX_MARKER_SIZE) as u32 * self.config.weight(tag))
            .sum();
        Some(score)
    }

    /// Every scorable pattern for one hand, ranked.
    pub fn score_hand(&self, grid: &MarkerGrid, hands: &HandMap, hand: Hand) -> HandAnalysis {
        let color = hands.color(hand);
        let mut scored: Vec<(&DiseasePattern, ScoredPattern)> = Vec::with_capacity(self.catalog.len());
        for pattern in self.catalog.patterns() {
            let Some(score) = self.score_pattern(grid, pattern, color) else {
                warn!("pattern {} tags no cells, skipped", pattern.id);
                continue;
            };
            scored.push((
                pattern,
                ScoredPattern {
                    pattern_id: pattern.id,
                    score,
                    severity: Severity::classify(score, &self.config.bands),
                    rank: None,
                },
            ));
        }

        // Stable, so equal scores keep catalog order.
        scored.sort_by(|a, b| b.1.score.cmp(&a.1.score));
        let visible = assign_ranks(scored.iter_mut().map(|(_, s)| s), &self.config);

        let all_patterns: Vec<PatternResult> = scored
            .iter()
            .map(|(pattern, s)| PatternResult::new(pattern, *s))
            .collect();
        let patterns = all_patterns.iter().take(visible).cloned().collect();
        debug!(
            "{:?} hand: {} of {} patterns visible",
            hand,
            visible,
            all_patterns.len()
        );

        HandAnalysis {
            hand,
            hand_zh: hand.label_zh().to_string(),
            color,
            dot_count: HandCounts::tally(grid, hands).get(hand),
            patterns,
            all_patterns,
        }
    }

    pub fn score(&self, grid: &MarkerGrid, hands: &HandMap) -> ScoreReport {
        ScoreReport {
            merged_grid: grid.clone(),
            left_hand: self.score_hand(grid, hands, Hand::Left),
            right_hand: self.score_hand(grid, hands, Hand::Right),
        }
    }

    /// Score a bare size grid against every pattern.
    ///
    /// Every non-zero cell counts regardless of color; sizes are not
    /// clamped and tags missing from the weight table weigh 0. Scores
    /// saturate at `u32::MAX`.
    pub fn simulate(&self, sizes: &[u32], bands: &SeverityBands) -> Result<Simulation> {
        if sizes.len() != CELL_COUNT {
            return Err(GridError::InvalidGridLength {
                expected: CELL_COUNT,
                found: sizes.len(),
            });
        }

        let mut scored: Vec<(&DiseasePattern, ScoredPattern)> = self
            .catalog
            .patterns()
            .iter()
            .map(|pattern| {
                let score = pattern
                    .weighted_cells()
                    .filter(|(i, _)| sizes[*i] > 0)
                    .map(|(i, tag)| sizes[i].saturating_mul(self.config.color_weights.get(&tag).copied().unwrap_or(0)))
                    .fold(0u32, u32::saturating_add);
                let scored = ScoredPattern {
                    pattern_id: pattern.id,
                    score,
                    severity: Severity::classify(score, bands),
                    rank: None,
                };
                (pattern, scored)
            })
            .collect();

        // Stable, so equal scores keep catalog order.
        let mut order: Vec<usize> = (0..scored.len()).collect();
        order.sort_by(|a, b| scored[*b].1.score.cmp(&scored[*a].1.score));
        let config = ScoringConfig {
            bands: *bands,
            ..self.config.clone()
        };
        let mut by_score: Vec<ScoredPattern> = order.iter().map(|i| scored[*i].1).collect();
        let ranked = assign_ranks(by_score.iter_mut(), &config);
        for (i, s) in order.iter().zip(&by_score).take(ranked) {
            scored[*i].1 = *s;
        }

        let simulated = |(pattern, s): &(&DiseasePattern, ScoredPattern)| SimulatedPattern {
            scored: *s,
            name_zh: pattern.name_zh.clone(),
            name_en: pattern.name_en.clone(),
            grid_color: pattern.grid_color().to_vec(),
            severity_zh: s.severity.map(Severity::label_zh).unwrap_or_default().to_string(),
            rank_zh: s.rank.map(Rank::label_zh).unwrap_or_default().to_string(),
        };
        let visible = order.iter().take(ranked).map(|i| simulated(&scored[*i])).collect();

        Ok(Simulation {
            scored: scored.iter().map(simulated).collect(),
            visible,
        })
    }
}

/// Rank patterns already sorted by score, highest first.
///
/// The first `visible_limit` patterns at or above the display floor are
/// ranked: the top one primary, the runner-up primary when within
/// `primary_gap` of the top and secondary otherwise. Returns how many
/// were ranked.
fn assign_ranks<'s>(sorted: impl Iterator<Item = &'s mut ScoredPattern>, config: &ScoringConfig) -> usize {
    let floor = config.bands.min_display();
    let mut top = None;
    let mut ranked = 0;
    for scored in sorted {
        if scored.score < floor || ranked >= config.visible_limit {
            break;
        }
        let top_score = *top.get_or_insert(scored.score);
        scored.rank = Some(if ranked == 0 || top_score.saturating_sub(scored.score) <= config.primary_gap {
            Rank::Primary
        } else {
            Rank::Secondary
        });
        ranked += 1;
    }
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(score: u32) -> ScoredPattern {
        ScoredPattern {
            pattern_id: score,
            score,
            severity: None,
            rank: None,
        }
    }

    #[test]
    fn severity_bands_are_contiguous() {
        let bands = SeverityBands::default();
        assert_eq!(Severity::classify(3, &bands), None);
        assert_eq!(Severity::classify(4, &bands), Some(Severity::Light));
        assert_eq!(Severity::classify(8, &bands), Some(Severity::Light));
        assert_eq!(Severity::classify(9, &bands), Some(Severity::Mild));
        assert_eq!(Severity::classify(18, &bands), Some(Severity::Mild));
        assert_eq!(Severity::classify(19, &bands), Some(Severity::Serious));
    }

    #[test]
    fn runner_up_within_gap_is_primary() {
        let config = ScoringConfig::default();
        let mut list = vec![scored(12), scored(9), scored(8)];
        assert_eq!(assign_ranks(list.iter_mut(), &config), 2);
        assert_eq!(list[0].rank, Some(Rank::Primary));
        assert_eq!(list[1].rank, Some(Rank::Primary));
        assert_eq!(list[2].rank, None);
    }

    #[test]
    fn runner_up_beyond_gap_is_secondary() {
        let config = ScoringConfig::default();
        let mut list = vec![scored(12), scored(8)];
        assign_ranks(list.iter_mut(), &config);
        assert_eq!(list[1].rank, Some(Rank::Secondary));
    }

    #[test]
    fn nothing_below_the_floor_is_ranked() {
        let config = ScoringConfig::default();
        let mut list = vec![scored(5), scored(3), scored(0)];
        assert_eq!(assign_ranks(list.iter_mut(), &config), 1);
        assert_eq!(list[1].rank, None);
    }
}
