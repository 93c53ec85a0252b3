mod common;

use common::*;
use handgrid::Frame;
use handgrid::detection::locator::{ContourStrategy, GridLocator, LineStrategy, LocatorStrategy};

#[test]
fn gray_lattice_is_found_by_color_mask() {
    let frame = Frame::from_rgb(render_sheet(&[Marker::new(4, 4, MarkerColor::Cyan, MEDIUM)]));
    let locator = GridLocator::default();
    let (bounds, strategy) = locator.locate_named(&frame).expect("grid");

    assert_eq!(strategy, "color mask");
    assert!(bounds.x.abs_diff(GRID_ORIGIN) <= 3, "x = {}", bounds.x);
    assert!(bounds.y.abs_diff(GRID_ORIGIN) <= 3, "y = {}", bounds.y);
    assert!(bounds.size.abs_diff(CELL * 9) <= 6, "size = {}", bounds.size);
    assert!(bounds.lines_h.windows(2).all(|w| w[1] > w[0]));
    assert!(bounds.lines_v.windows(2).all(|w| w[1] > w[0]));
}

#[test]
fn featureless_image_has_no_grid() {
    let frame = Frame::from_rgb(blank_image(300, 300));
    assert!(GridLocator::default().locate(&frame).is_none());
}

#[test]
fn contour_strategy_finds_black_lattice() {
    let frame = Frame::from_rgb(render_sheet_with_lattice(&[], INK_BLACK));
    let bounds = ContourStrategy::default().locate(&frame).expect("grid");

    // Dilation grows the blob a few pixels past the outer lines.
    assert!((45..=62).contains(&bounds.x), "x = {}", bounds.x);
    assert!((260..=300).contains(&bounds.size), "size = {}", bounds.size);
}

#[test]
fn line_strategy_finds_black_lattice() {
    let frame = Frame::from_rgb(render_sheet_with_lattice(&[], INK_BLACK));
    let bounds = LineStrategy::default().locate(&frame).expect("grid");

    assert!(bounds.x.abs_diff(GRID_ORIGIN) <= 4, "x = {}", bounds.x);
    assert!(bounds.y.abs_diff(GRID_ORIGIN) <= 4, "y = {}", bounds.y);
    assert!(bounds.size.abs_diff(CELL * 9) <= 8, "size = {}", bounds.size);
    assert!(bounds.lines_h.windows(2).all(|w| w[1] > w[0]));
    assert!(bounds.lines_v.windows(2).all(|w| w[1] > w[0]));
}

#[test]
fn line_strategy_ignores_featureless_image() {
    let frame = Frame::from_rgb(blank_image(300, 300));
    assert!(LineStrategy::default().locate(&frame).is_none());
}

#[test]
fn strategies_are_tried_in_order() {
    let frame = Frame::from_rgb(render_sheet_with_lattice(&[], INK_BLACK));
    let locator = GridLocator::empty().with_strategy(ContourStrategy::default());
    let (_, name) = locator.locate_named(&frame).expect("grid");
    assert_eq!(name, "contour");
    assert_eq!(locator.strategy_names(), vec!["contour"]);
}
