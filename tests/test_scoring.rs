mod common;

use common::*;
use handgrid::{Rank, Severity, SeverityBands};

const CATALOG: &str = r#"[
  {"id": 1, "name_zh": "甲", "name_en": "Alpha", "symptoms": ["a"],
   "grid_color": ["RED", "YELLOW", "BLUE", null, null, null, null, null, null,
                  null, null, null, null, null, null, null, null, null,
                  null, null, null, null, null, null, null, null, null,
                  null, null, null, null, null, null, null, null, null,
                  null, null, null, null, null, null, null, null, null,
                  null, null, null, null, null, null, null, null, null,
                  null, null, null, null, null, null, null, null, null,
                  null, null, null, null, null, null, null, null, null,
                  null, null, null, null, null, null, null, null, null],
   "report": {"cause": "alpha cause",
              "symptoms": {"light": "mild aches", "mild": "aches", "serious": "severe aches"},
              "disclaimer": "see a doctor"}},
  {"id": 2, "name_zh": "乙", "name_en": "Beta",
   "grid_color": [null, null, null, "RED", "RED", null, null, null, null,
                  null, null, null, null, null, null, null, null, null,
                  null, null, null, null, null, null, null, null, null,
                  null, null, null, null, null, null, null, null, null,
                  null, null, null, null, null, null, null, null, null,
                  null, null, null, null, null, null, null, null, null,
                  null, null, null, null, null, null, null, null, null,
                  null, null, null, null, null, null, null, null, null,
                  null, null, null, null, null, null, null, null, null]},
  {"id": 3, "name_zh": "丙", "name_en": "Gamma",
   "grid_color": [null, null, null, null, null, null, null, null, null,
                  null, null, null, null, null, null, null, null, null,
                  null, null, null, null, null, null, null, null, null,
                  null, null, null, null, null, null, null, null, null,
                  null, null, null, null, null, null, null, null, null,
                  null, null, null, null, null, null, null, null, null,
                  null, null, null, null, null, null, null, null, null,
                  null, null, null, null, null, null, null, null, null,
                  null, null, null, null, null, null, null, null, null]}
]"#;

fn catalog() -> PatternCatalog {
    PatternCatalog::from_json_str(CATALOG).unwrap()
}

#[test]
fn empty_grid_scores_nothing() {
    let catalog = PatternCatalog::builtin().unwrap();
    let scorer = PatternScorer::new(catalog, ScoringConfig::default());
    let report = scorer.score(&MarkerGrid::empty(), &HandMap::default());

    for hand in Hand::BOTH {
        let analysis = report.hand(hand);
        assert_eq!(analysis.dot_count, 0);
        assert!(analysis.patterns.is_empty());
        assert!(analysis.all_patterns.iter().all(|p| p.scored.score == 0));
        assert_eq!(analysis.all_patterns.len(), catalog.len());
    }
}

#[test]
fn full_match_is_primary_with_maximum_score() {
    let catalog = PatternCatalog::builtin().unwrap();
    let config = ScoringConfig::default();
    let scorer = PatternScorer::new(catalog, config.clone());

    for pattern in catalog.patterns() {
        let cells: Vec<_> = pattern
            .weighted_cells()
            .map(|(i, _)| (i, MarkerColor::Green, 5))
            .collect();
        let report = scorer.score(&grid_with(&cells), &HandMap::default());

        let right = &report.right_hand;
        let top = &right.patterns[0];
        assert_eq!(top.scored.pattern_id, pattern.id);
        assert_eq!(top.scored.score, pattern.max_score(&config));
        assert_eq!(top.scored.rank, Some(Rank::Primary));
        assert!(report.left_hand.patterns.is_empty());
    }
}

#[test]
fn other_hands_color_is_ignored() {
    let catalog = catalog();
    let scorer = PatternScorer::new(&catalog, ScoringConfig::default());
    let grid = grid_with(&[(0, MarkerColor::Cyan, 5), (1, MarkerColor::Red, 5)]);

    let report = scorer.score(&grid, &HandMap::default());
    let alpha_left = report.left_hand.all_patterns.iter().find(|p| p.scored.pattern_id == 1).unwrap();
    let alpha_right = report.right_hand.all_patterns.iter().find(|p| p.scored.pattern_id == 1).unwrap();
    assert_eq!(alpha_left.scored.score, 15);
    assert_eq!(alpha_right.scored.score, 0);
}

#[test]
fn larger_markers_never_lower_the_score() {
    let catalog = catalog();
    let scorer = PatternScorer::new(&catalog, ScoringConfig::default());
    let alpha = catalog.get(1).unwrap();

    for index in 0..3 {
        let mut previous = 0;
        for size in 1..=5 {
            let grid = grid_with(&[(index, MarkerColor::Cyan, size), (2, MarkerColor::Cyan, 1)]);
            let score = scorer.score_pattern(&grid, alpha, MarkerColor::Cyan).unwrap();
            assert!(score >= previous, "cell {index} size {size}");
            previous = score;
        }
    }
}

#[test]
fn lone_pattern_above_floor_is_sole_primary() {
    let catalog = catalog();
    let scorer = PatternScorer::new(&catalog, ScoringConfig::default());
    // Alpha: 2*3 + 1*2 = 8, light. Beta and Gamma score 0.
    let grid = grid_with(&[(0, MarkerColor::Cyan, 2), (1, MarkerColor::Cyan, 1)]);
    let left = scorer.score(&grid, &HandMap::default()).left_hand;

    assert_eq!(left.patterns.len(), 1);
    let only = &left.patterns[0];
    assert_eq!(only.scored.pattern_id, 1);
    assert_eq!(only.scored.score, 8);
    assert_eq!(only.scored.rank, Some(Rank::Primary));
    assert_eq!(only.scored.severity, Some(Severity::Light));
    assert_eq!(only.severity_zh, "輕微");
    assert_eq!(only.rank_zh, "主要");
    assert_eq!(only.report_sections[0].header, "成因");
    assert_eq!(only.report_sections[1].content, "mild aches");
    assert_eq!(only.disclaimer, "see a doctor");
}

#[test]
fn runner_up_rank_depends_on_gap() {
    let catalog = catalog();
    let scorer = PatternScorer::new(&catalog, ScoringConfig::default());

    // Alpha 3*3 = 9, Beta 1*3 + 1*3 = 6: gap 3, both primary.
    let close = grid_with(&[(0, MarkerColor::Cyan, 3), (3, MarkerColor::Cyan, 1), (4, MarkerColor::Cyan, 1)]);
    let left = scorer.score(&close, &HandMap::default()).left_hand;
    assert_eq!(left.patterns.len(), 2);
    assert!(left.patterns.iter().all(|p| p.scored.rank == Some(Rank::Primary)));

    // Alpha 5*3 = 15, Beta 6: gap 9, Beta secondary.
    let far = grid_with(&[(0, MarkerColor::Cyan, 5), (3, MarkerColor::Cyan, 1), (4, MarkerColor::Cyan, 1)]);
    let left = scorer.score(&far, &HandMap::default()).left_hand;
    assert_eq!(left.patterns[1].scored.pattern_id, 2);
    assert_eq!(left.patterns[1].scored.rank, Some(Rank::Secondary));
    assert_eq!(left.patterns[1].rank_zh, "次要");
    assert_eq!(left.patterns[0].scored.severity, Some(Severity::Mild));
}

#[test]
fn pattern_without_tagged_cells_is_skipped() {
    let catalog = catalog();
    let scorer = PatternScorer::new(&catalog, ScoringConfig::default());
    let gamma = catalog.get(3).unwrap();
    assert_eq!(scorer.score_pattern(&MarkerGrid::empty(), gamma, MarkerColor::Cyan), None);

    let report = scorer.score(&MarkerGrid::empty(), &HandMap::default());
    assert_eq!(report.left_hand.all_patterns.len(), 2);
}

#[test]
fn simulation_scores_sizes_without_hands() {
    let catalog = catalog();
    let scorer = PatternScorer::new(&catalog, ScoringConfig::default());
    let mut sizes = vec![0u32; 81];
    sizes[0] = 7;
    sizes[3] = 1;

    let sim = scorer.simulate(&sizes, &SeverityBands::new(2, 5, 10).unwrap()).unwrap();
    let ids: Vec<_> = sim.scored.iter().map(|p| p.scored.pattern_id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    // Sizes are not clamped in simulation.
    assert_eq!(sim.scored[0].scored.score, 21);
    assert_eq!(sim.scored[0].scored.severity, Some(Severity::Serious));
    assert_eq!(sim.scored[1].scored.score, 3);
    assert_eq!(sim.scored[1].scored.severity, Some(Severity::Light));

    assert_eq!(sim.visible.len(), 2);
    assert_eq!(sim.visible[0].scored.rank, Some(Rank::Primary));
    assert_eq!(sim.visible[1].scored.rank, Some(Rank::Secondary));
    assert_eq!(sim.scored[1].scored.rank, Some(Rank::Secondary));
}

#[test]
fn simulation_rejects_wrong_length() {
    let catalog = catalog();
    let scorer = PatternScorer::new(&catalog, ScoringConfig::default());
    assert!(scorer.simulate(&[1, 2, 3], &SeverityBands::default()).is_err());
}

#[test]
fn huge_simulated_sizes_saturate() {
    let catalog = catalog();
    let scorer = PatternScorer::new(&catalog, ScoringConfig::default());

    let sim = scorer.simulate(&[u32::MAX; 81], &SeverityBands::default()).unwrap();
    assert_eq!(sim.scored[0].scored.score, u32::MAX);
    assert_eq!(sim.scored[0].scored.severity, Some(Severity::Serious));
    assert_eq!(sim.scored[1].scored.score, u32::MAX);
    assert_eq!(sim.scored[2].scored.score, 0);
}
