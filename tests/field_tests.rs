use smilecomb::error::LayoutError;
use smilecomb::kernel::honeycomb::{CellState, FieldStep, HoneycombField, Skin};
use smilecomb::kernel::layout::{FieldLayout, HexGeometry, Point};
use std::collections::HashSet;
use std::time::Duration;

fn geometry() -> HexGeometry {
    HexGeometry {
        spacing: 50.0,
        cell_size: 65.0,
        center: Point { x: 200.0, y: 200.0 },
    }
}

fn field(layout: FieldLayout) -> HoneycombField {
    HoneycombField::new(&layout, &geometry(), Some(42)).unwrap()
}

#[test]
fn test_growth_visits_every_cell_once_in_order() {
    let mut f = field(FieldLayout::full());
    assert_eq!(f.capacity(), 90);
    assert_eq!(f.active_count(), 0);

    let mut grown = Vec::new();
    while let FieldStep::Grew(index) = f.step(true) {
        grown.push(index);
    }
    assert_eq!(grown, (1..=90).collect::<Vec<_>>());
    assert!(f.is_complete());
    assert!(f.cells().iter().all(|c| c.is_active()));

    // Full field: further smiling changes nothing.
    assert_eq!(f.step(true), FieldStep::Unchanged);
    assert_eq!(f.active_count(), 90);
}

#[test]
fn test_shrink_reverses_growth_and_keeps_base() {
    let mut f = field(FieldLayout::compact());
    for _ in 0..10 {
        f.step(true);
    }
    assert_eq!(f.active_count(), 10);

    let mut shrunk = Vec::new();
    while let FieldStep::Shrank(index) = f.step(false) {
        shrunk.push(index);
    }
    assert_eq!(shrunk, (1..=10).rev().collect::<Vec<_>>());
    assert_eq!(f.active_count(), 0);
    assert_eq!(f.step(false), FieldStep::Unchanged);

    assert_eq!(f.base().state(), CellState::Active);
    assert!(f.cells()[1..].iter().all(|c| c.state() == CellState::Inactive));
}

#[test]
fn test_active_count_stays_within_bounds() {
    let mut f = field(FieldLayout::compact());
    // Long alternating runs that overshoot both ends.
    let pattern = [(true, 50), (false, 70), (true, 20), (false, 5), (true, 100)];
    for (smiling, ticks) in pattern {
        for _ in 0..ticks {
            let before = f.active_count();
            f.step(smiling);
            let after = f.active_count();
            assert!(after <= f.capacity());
            assert!(before.abs_diff(after) <= 1, "at most one cell per tick");
            assert!(f.base().is_active());
            let active = f.cells().iter().filter(|c| c.is_active()).count();
            assert_eq!(active, after + 1);
        }
    }
    assert!(f.is_complete());
}

#[test]
fn test_grown_cells_use_active_skins() {
    let mut f = field(FieldLayout::full());
    while f.step(true) != FieldStep::Unchanged {}

    let view = f.snapshot(Duration::ZERO, Duration::from_secs(1));
    assert_eq!(view.len(), 91);
    assert_eq!(view[0].skin, Skin::Base);
    let skins: HashSet<Skin> = view[1..].iter().map(|c| c.skin).collect();
    assert!(skins.iter().all(|s| matches!(s, Skin::Grown1 | Skin::Grown2 | Skin::Grown3)));
    // 90 draws from the pool hit every skin.
    assert_eq!(skins.len(), 3);
}

#[test]
fn test_same_seed_same_skins() {
    let grow = |seed| {
        let mut f = HoneycombField::new(&FieldLayout::compact(), &geometry(), Some(seed)).unwrap();
        while f.step(true) != FieldStep::Unchanged {}
        f.snapshot(Duration::ZERO, Duration::from_secs(1))
            .into_iter()
            .map(|c| c.skin)
            .collect::<Vec<_>>()
    };
    assert_eq!(grow(7), grow(7));
}

#[test]
fn test_inactive_cells_blink_between_idle_skins() {
    let mut f = field(FieldLayout::compact());
    f.step(true);
    let idle = Duration::from_secs(1);

    let skin_of = |f: &HoneycombField, index: usize, elapsed_ms: u64| {
        f.snapshot(Duration::from_millis(elapsed_ms), idle)[index].skin
    };
    assert_eq!(skin_of(&f, 2, 0), Skin::IdleA);
    assert_eq!(skin_of(&f, 2, 999), Skin::IdleA);
    assert_eq!(skin_of(&f, 2, 1000), Skin::IdleB);
    assert_eq!(skin_of(&f, 2, 2500), Skin::IdleA);

    // Active cells keep their grown skin whatever the phase.
    let grown = skin_of(&f, 1, 0);
    assert_eq!(skin_of(&f, 1, 1000), grown);
    assert_eq!(skin_of(&f, 0, 1000), Skin::Base);
}

#[test]
fn test_positions_follow_layout() {
    let f = field(FieldLayout::full());
    let base = f.base().position;
    assert_eq!(base, Point { x: 167.5, y: 167.5 });

    // Ring one sits one spacing away from the base.
    for cell in &f.cells()[1..=6] {
        let d = ((cell.position.x - base.x).powi(2) + (cell.position.y - base.y).powi(2)).sqrt();
        assert!((d - 50.0).abs() < 1e-9, "cell {} at distance {}", cell.index, d);
    }
}

#[test]
fn test_malformed_layouts_are_rejected() {
    let g = geometry();
    let empty = FieldLayout::new(vec![vec![None; 3]; 3]);
    assert_eq!(HoneycombField::new(&empty, &g, None).err(), Some(LayoutError::Empty));

    let gap = FieldLayout::new(vec![vec![Some(0), Some(2)]]);
    assert_eq!(HoneycombField::new(&gap, &g, None).err(), Some(LayoutError::MissingCell(1)));

    let no_base = FieldLayout::new(vec![vec![Some(1)]]);
    assert_eq!(HoneycombField::new(&no_base, &g, None).err(), Some(LayoutError::NoBase));
}
