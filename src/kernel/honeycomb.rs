use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use std::time::Duration;

use super::layout::{FieldLayout, HexGeometry, Point, BASE};
use crate::error::LayoutError;

/// Image a cell is drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Skin {
    Base,
    Grown1,
    Grown2,
    Grown3,
    IdleA,
    IdleB,
}

/// Pool drawn from on activation; `Grown1` is drawn twice as often as the others.
const ACTIVE_SKINS: [Skin; 4] = [Skin::Grown1, Skin::Grown2, Skin::Grown3, Skin::Grown1];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CellState {
    Inactive,
    Active,
}

#[derive(Debug, Clone)]
pub struct HoneycombCell {
    pub index: usize,
    pub position: Point,
    state: CellState,
    // Meaningful only while active.
    skin: Skin,
}

impl HoneycombCell {
    pub fn state(&self) -> CellState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == CellState::Active
    }

    /// Skin to draw `elapsed` after the field was built.
    ///
    /// Inactive cells blink between the two idle skins, flipping every
    /// `idle_interval`, starting on `IdleA`.
    pub fn skin_at(&self, elapsed: Duration, idle_interval: Duration) -> Skin {
        match self.state {
            CellState::Active => self.skin,
            CellState::Inactive => {
                let phase = elapsed.as_nanos() / idle_interval.as_nanos().max(1);
                if phase % 2 == 0 {
                    Skin::IdleA
                } else {
                    Skin::IdleB
                }
            }
        }
    }
}

/// What the renderer needs to draw one cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CellView {
    pub index: usize,
    pub position: Point,
    pub state: CellState,
    pub skin: Skin,
}

/// Outcome of one field-update tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldStep {
    Grew(usize),
    Shrank(usize),
    Unchanged,
}

/// The honeycomb that grows while the subject smiles.
///
/// Cells are created once from the layout and never added or removed. Cells
/// `1..=active_count` are active; growth always takes the next index and
/// shrinking always gives back the highest one, so deactivation runs in the
/// reverse of activation order. The base cell is always active.
#[derive(Debug)]
pub struct HoneycombField {
    cells: Vec<HoneycombCell>,
    capacity: usize,
    active_count: usize,
    rng: StdRng,
}

impl HoneycombField {
    pub fn new(
        layout: &FieldLayout,
        geometry: &HexGeometry,
        skin_seed: Option<u64>,
    ) -> Result<Self, LayoutError> {
        let positions = layout.positions(geometry)?;
        let cells = positions
            .into_iter()
            .enumerate()
            .map(|(index, position)| HoneycombCell {
                index,
                position,
                state: if index == BASE {
                    CellState::Active
                } else {
                    CellState::Inactive
                },
                skin: if index == BASE { Skin::Base } else { Skin::Grown1 },
            })
            .collect::<Vec<_>>();

        let rng = match skin_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            capacity: cells.len() - 1,
            cells,
            active_count: 0,
            rng,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Active cells, not counting the base.
    pub fn active_count(&self) -> usize {
        self.active_count
    }

    pub fn is_complete(&self) -> bool {
        self.active_count == self.capacity
    }

    pub fn cells(&self) -> &[HoneycombCell] {
        &self.cells
    }

    pub fn base(&self) -> &HoneycombCell {
        &self.cells[BASE]
    }

    /// Activates the next cell in layout order. Returns its index, or `None`
    /// when the field is already full.
    pub fn activate_next(&mut self) -> Option<usize> {
        if self.active_count >= self.capacity {
            return None;
        }
        self.active_count += 1;
        let skin = ACTIVE_SKINS
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(Skin::Grown1);
        let cell = &mut self.cells[self.active_count];
        cell.state = CellState::Active;
        cell.skin = skin;
        Some(self.active_count)
    }

    /// Deactivates the most recently activated cell. The base is never touched.
    pub fn deactivate_last(&mut self) -> Option<usize> {
        if self.active_count == 0 {
            return None;
        }
        let index = self.active_count;
        self.cells[index].state = CellState::Inactive;
        self.active_count -= 1;
        Some(index)
    }

    /// One rate-limited update: grow by one cell while smiling, shrink by one otherwise.
    pub fn step(&mut self, smiling: bool) -> FieldStep {
        let changed = if smiling {
            self.activate_next().map(FieldStep::Grew)
        } else {
            self.deactivate_last().map(FieldStep::Shrank)
        };
        changed.unwrap_or(FieldStep::Unchanged)
    }

    pub fn snapshot(&self, elapsed: Duration, idle_interval: Duration) -> Vec<CellView> {
        self.cells
            .iter()
            .map(|cell| CellView {
                index: cell.index,
                position: cell.position,
                state: cell.state,
                skin: cell.skin_at(elapsed, idle_interval),
            })
            .collect()
    }
}
