mod common;

use common::*;
use handgrid::GridError;

#[test]
fn size_is_the_median_of_every_successful_reading() {
    let readings = vec![
        reading_with(&[]),
        reading_with(&[(7, MarkerColor::Cyan, 3)]),
        reading_with(&[]),
        reading_with(&[(7, MarkerColor::Cyan, 5)]),
        reading_with(&[(7, MarkerColor::Cyan, 4)]),
    ];
    let consensus = GridAggregator::default().aggregate(&readings).unwrap();
    assert_eq!(consensus.grid.size(7), 3);
    assert_eq!(consensus.grid.color(7), Some(MarkerColor::Cyan));
    assert_eq!(consensus.grid.size(8), 0);
    assert_eq!(consensus.grid.color(8), None);
    assert_eq!(consensus.readings_used, 5);
}

#[test]
fn mostly_empty_cell_stays_empty() {
    let readings = vec![
        reading_with(&[(3, MarkerColor::Green, 5)]),
        reading_with(&[]),
        reading_with(&[]),
    ];
    let consensus = GridAggregator::default().aggregate(&readings).unwrap();
    assert_eq!(consensus.grid.size(3), 0);
    assert_eq!(consensus.grid.color(3), None);
    assert_eq!(consensus.dot_counts.right, 0);
}

#[test]
fn last_reading_with_a_color_wins() {
    let a = reading_with(&[(5, MarkerColor::Cyan, 2)]);
    let b = reading_with(&[(5, MarkerColor::Green, 2)]);

    let ab = GridAggregator::default().aggregate(&[a.clone(), b.clone()]).unwrap();
    assert_eq!(ab.grid.color(5), Some(MarkerColor::Green));

    let ba = GridAggregator::default().aggregate(&[b, a]).unwrap();
    assert_eq!(ba.grid.color(5), Some(MarkerColor::Cyan));
}

#[test]
fn failed_readings_contribute_nothing() {
    let readings = vec![
        GridReading::failed("could not detect grid in image"),
        reading_with(&[(0, MarkerColor::Cyan, 4), (1, MarkerColor::Green, 2)]),
    ];
    let consensus = GridAggregator::default().aggregate(&readings).unwrap();
    assert_eq!(consensus.readings_used, 1);
    assert_eq!(consensus.readings_total, 2);
    assert_eq!(consensus.grid.size(0), 4);
    assert_eq!(consensus.dot_counts.left, 1);
    assert_eq!(consensus.dot_counts.right, 1);
}

#[test]
fn no_successful_reading_is_an_error() {
    let readings = vec![GridReading::failed("a"), GridReading::failed("b")];
    let result = GridAggregator::default().aggregate(&readings);
    assert!(matches!(result, Err(GridError::NoUsableInput { total: 2 })));

    assert!(matches!(
        GridAggregator::default().aggregate(&[]),
        Err(GridError::NoUsableInput { total: 0 })
    ));
}

#[test]
fn hand_map_decides_dot_counts() {
    let hands = HandMap::new(MarkerColor::Red, MarkerColor::Blue).unwrap();
    let readings = vec![reading_with(&[
        (0, MarkerColor::Red, 1),
        (1, MarkerColor::Red, 1),
        (2, MarkerColor::Blue, 1),
        (3, MarkerColor::Cyan, 1),
    ])];
    let consensus = GridAggregator::new(hands).aggregate(&readings).unwrap();
    assert_eq!(consensus.dot_counts.get(Hand::Left), 2);
    assert_eq!(consensus.dot_counts.get(Hand::Right), 1);
}
