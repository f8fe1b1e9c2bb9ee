//! Grid simulation for Chain Reaction.
//!
//! The grid is pure state: it knows nothing about rooms, connections or
//! turns. [`Grid::place_orb`] adds a single orb, [`Grid::resolve_cascade`]
//! runs chain explosions to a fixed point, and [`Grid::owners`] reports which
//! players still hold cells.
//!
//! # Critical mass
//!
//! A cell's critical mass is the largest orb count it can hold without
//! bursting: 1 in a corner, 2 along an edge, 3 in the interior. A cell whose
//! count exceeds its critical mass bursts, keeping `count - (mass + 1)` orbs
//! and pushing one orb into every orthogonal neighbor, which it also claims.
//!
//! # Cascade ordering
//!
//! Each cascade pass first snapshots the bursting cells in row-major order,
//! then bursts them one by one against the live grid. A snapshotted cell that
//! receives orbs from an earlier burst in the same pass bursts with its
//! updated count and for whoever owns it at that moment. Clients replay this
//! exact ordering, so it must not be replaced by a simultaneous update.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A player's fixed position in the roster captured at match start.
pub type PlayerIndex = usize;

/// Default upper bound on cascade passes per move.
pub const DEFAULT_CASCADE_LIMIT: usize = 1000;

// ── Cell ────────────────────────────────────────────────────────────

/// One grid cell.
///
/// `owner` is `None` exactly when `count` is zero. On the wire the owner is
/// the `player` field, with `-1` meaning empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    #[serde(rename = "player", with = "crate::protocol::player_slot")]
    pub owner: Option<PlayerIndex>,
    pub count: u32,
}

impl Cell {
    /// Returns `true` if no player holds this cell.
    pub fn is_empty(&self) -> bool {
        self.owner.is_none()
    }

    fn clear(&mut self) {
        self.owner = None;
        self.count = 0;
    }
}

/// Returns the critical mass of the cell at column `x`, row `y`.
pub fn critical_mass(x: usize, y: usize, cols: usize, rows: usize) -> u32 {
    let on_vertical_edge = x == 0 || x + 1 == cols;
    let on_horizontal_edge = y == 0 || y + 1 == rows;
    match (on_vertical_edge, on_horizontal_edge) {
        (true, true) => 1,
        (true, false) | (false, true) => 2,
        (false, false) => 3,
    }
}

// ── Placement / cascade results ─────────────────────────────────────

/// Why an orb could not be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementError {
    /// The coordinates are outside the grid.
    OutOfBounds,
    /// The cell already belongs to another player.
    OwnedByOther(PlayerIndex),
}

/// Summary of one cascade resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeReport {
    /// Number of passes that burst at least one cell.
    pub passes: usize,
    /// Total number of individual cell bursts.
    pub bursts: usize,
    /// `true` if the pass limit was reached before the grid settled.
    pub truncated: bool,
}

// ── Grid ────────────────────────────────────────────────────────────

/// A `rows × cols` board stored row-major.
///
/// Serializes as an array of rows, each an array of [`Cell`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<Cell>>", into = "Vec<Vec<Cell>>")]
pub struct Grid {
    rows: usize,
    cols: usize,
    cells: Vec<Cell>,
}

impl Grid {
    /// Create an empty grid.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![Cell::default(); rows * cols],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Returns `true` if column `x`, row `y` lies inside the grid.
    pub fn contains(&self, x: usize, y: usize) -> bool {
        x < self.cols && y < self.rows
    }

    /// Returns the cell at column `x`, row `y`.
    pub fn cell(&self, x: usize, y: usize) -> Option<&Cell> {
        self.offset(x, y).and_then(|i| self.cells.get(i))
    }

    fn cell_mut(&mut self, x: usize, y: usize) -> Option<&mut Cell> {
        self.offset(x, y).and_then(|i| self.cells.get_mut(i))
    }

    fn offset(&self, x: usize, y: usize) -> Option<usize> {
        self.contains(x, y).then(|| y * self.cols + x)
    }

    /// Iterate over rows as slices, top to bottom.
    pub fn rows_iter(&self) -> impl Iterator<Item = &[Cell]> {
        // `chunks` rejects a zero size; an empty grid simply has no rows.
        self.cells.chunks(self.cols.max(1))
    }

    /// Iterate over every cell in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }

    /// Critical mass of the cell at column `x`, row `y` on this grid.
    pub fn critical_mass_at(&self, x: usize, y: usize) -> u32 {
        critical_mass(x, y, self.cols, self.rows)
    }

    /// Add one orb for `player` at column `x`, row `y`, claiming the cell if
    /// it is empty.
    ///
    /// # Errors
    ///
    /// Returns [`PlacementError`] if the cell is off the grid or owned by
    /// someone else. The grid is unchanged in that case.
    pub fn place_orb(
        &mut self,
        x: usize,
        y: usize,
        player: PlayerIndex,
    ) -> Result<(), PlacementError> {
        let cell = self.cell_mut(x, y).ok_or(PlacementError::OutOfBounds)?;
        match cell.owner {
            Some(owner) if owner != player => Err(PlacementError::OwnedByOther(owner)),
            _ => {
                cell.owner = Some(player);
                cell.count += 1;
                Ok(())
            }
        }
    }

    /// Burst cells until none exceeds its critical mass or `limit` passes
    /// have run.
    pub fn resolve_cascade(&mut self, limit: usize) -> CascadeReport {
        let mut report = CascadeReport::default();
        loop {
            let bursting = self.bursting_cells();
            if bursting.is_empty() {
                return report;
            }
            if report.passes >= limit {
                report.truncated = true;
                return report;
            }
            report.passes += 1;
            for (x, y) in bursting {
                self.burst(x, y);
                report.bursts += 1;
            }
        }
    }

    /// Coordinates of every cell currently over its critical mass, row-major.
    pub fn bursting_cells(&self) -> Vec<(usize, usize)> {
        let (rows, cols) = (self.rows, self.cols);
        (0..rows)
            .flat_map(|y| (0..cols).map(move |x| (x, y)))
            .filter(|&(x, y)| {
                self.cell(x, y)
                    .is_some_and(|cell| cell.count > critical_mass(x, y, cols, rows))
            })
            .collect()
    }

    fn burst(&mut self, x: usize, y: usize) {
        let mass = self.critical_mass_at(x, y);
        let Some(cell) = self.cell_mut(x, y) else {
            return;
        };
        let owner = cell.owner;
        cell.count = cell.count.saturating_sub(mass + 1);
        if cell.count == 0 {
            cell.clear();
        }

        for (nx, ny) in self.neighbors(x, y) {
            if let Some(neighbor) = self.cell_mut(nx, ny) {
                neighbor.owner = owner;
                neighbor.count += 1;
            }
        }
    }

    /// In-bounds orthogonal neighbors in up, down, left, right order.
    fn neighbors(&self, x: usize, y: usize) -> Vec<(usize, usize)> {
        let candidates = [
            y.checked_sub(1).map(|ny| (x, ny)),
            Some((x, y + 1)),
            x.checked_sub(1).map(|nx| (nx, y)),
            Some((x + 1, y)),
        ];
        candidates
            .into_iter()
            .flatten()
            .filter(|&(nx, ny)| self.contains(nx, ny))
            .collect()
    }

    /// Distinct players that own at least one cell.
    pub fn owners(&self) -> BTreeSet<PlayerIndex> {
        self.cells.iter().filter_map(|cell| cell.owner).collect()
    }

    /// Total number of orbs on the board.
    pub fn orb_count(&self) -> u64 {
        self.cells.iter().map(|cell| u64::from(cell.count)).sum()
    }
}

impl From<Grid> for Vec<Vec<Cell>> {
    fn from(grid: Grid) -> Self {
        grid.rows_iter().map(<[Cell]>::to_vec).collect()
    }
}

impl TryFrom<Vec<Vec<Cell>>> for Grid {
    type Error = String;

    fn try_from(rows: Vec<Vec<Cell>>) -> Result<Self, Self::Error> {
        let cols = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().position(|row| row.len() != cols) {
            return Err(format!(
                "grid row {bad} has a different length than row 0 ({cols} cells)"
            ));
        }
        let row_count = rows.len();
        let cells: Vec<Cell> = rows.into_iter().flatten().collect();
        if let Some(cell) = cells
            .iter()
            .find(|cell| cell.owner.is_none() != (cell.count == 0))
        {
            return Err(format!("inconsistent cell {cell:?}"));
        }
        Ok(Self {
            rows: row_count,
            cols,
            cells,
        })
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    fn cell(owner: PlayerIndex, count: u32) -> Cell {
        Cell {
            owner: Some(owner),
            count,
        }
    }

    fn set(grid: &mut Grid, x: usize, y: usize, value: Cell) {
        *grid.cell_mut(x, y).unwrap() = value;
    }

    fn assert_cells_consistent(grid: &Grid) {
        for c in grid.cells() {
            assert_eq!(c.owner.is_none(), c.count == 0, "broken cell {c:?}");
        }
    }

    #[test]
    fn critical_mass_by_position() {
        for (rows, cols) in [(2, 2), (2, 5), (6, 9), (7, 3)] {
            for y in 0..rows {
                for x in 0..cols {
                    let edges = usize::from(x == 0 || x == cols - 1)
                        + usize::from(y == 0 || y == rows - 1);
                    let expected = match edges {
                        2 => 1,
                        1 => 2,
                        _ => 3,
                    };
                    assert_eq!(
                        critical_mass(x, y, cols, rows),
                        expected,
                        "({x},{y}) on {rows}x{cols}"
                    );
                }
            }
        }
    }

    #[test]
    fn critical_mass_corners_edges_interior() {
        assert_eq!(critical_mass(0, 0, 9, 6), 1);
        assert_eq!(critical_mass(8, 5, 9, 6), 1);
        assert_eq!(critical_mass(4, 0, 9, 6), 2);
        assert_eq!(critical_mass(0, 3, 9, 6), 2);
        assert_eq!(critical_mass(4, 3, 9, 6), 3);
    }

    #[test]
    fn new_grid_is_empty() {
        let grid = Grid::new(6, 9);
        assert_eq!(grid.rows(), 6);
        assert_eq!(grid.cols(), 9);
        assert_eq!(grid.cells().count(), 54);
        assert!(grid.cells().all(Cell::is_empty));
        assert!(grid.owners().is_empty());
    }

    #[test]
    fn place_orb_claims_and_stacks() {
        let mut grid = Grid::new(3, 3);
        grid.place_orb(1, 1, 0).unwrap();
        grid.place_orb(1, 1, 0).unwrap();
        assert_eq!(grid.cell(1, 1), Some(&cell(0, 2)));
    }

    #[test]
    fn place_orb_rejects_foreign_cell_and_bounds() {
        let mut grid = Grid::new(3, 3);
        grid.place_orb(2, 0, 1).unwrap();
        assert_eq!(
            grid.place_orb(2, 0, 0),
            Err(PlacementError::OwnedByOther(1))
        );
        assert_eq!(grid.place_orb(3, 0, 0), Err(PlacementError::OutOfBounds));
        assert_eq!(grid.place_orb(0, 3, 0), Err(PlacementError::OutOfBounds));
        assert_eq!(grid.cell(2, 0), Some(&cell(1, 1)));
    }

    #[test]
    fn stable_grid_does_not_cascade() {
        let mut grid = Grid::new(3, 3);
        set(&mut grid, 1, 1, cell(0, 3));
        set(&mut grid, 0, 0, cell(1, 1));
        let before = grid.clone();
        let report = grid.resolve_cascade(DEFAULT_CASCADE_LIMIT);
        assert_eq!(report, CascadeReport::default());
        assert_eq!(grid, before);
    }

    #[test]
    fn corner_burst_feeds_two_neighbors() {
        let mut grid = Grid::new(2, 2);
        set(&mut grid, 0, 0, cell(0, 2));
        set(&mut grid, 1, 1, cell(1, 1));

        let report = grid.resolve_cascade(DEFAULT_CASCADE_LIMIT);

        assert_eq!(report.passes, 1);
        assert_eq!(report.bursts, 1);
        assert!(!report.truncated);
        assert!(grid.cell(0, 0).unwrap().is_empty());
        assert_eq!(grid.cell(1, 0), Some(&cell(0, 1)));
        assert_eq!(grid.cell(0, 1), Some(&cell(0, 1)));
        assert_eq!(grid.cell(1, 1), Some(&cell(1, 1)));
    }

    #[test]
    fn interior_burst_keeps_leftover_orbs() {
        let mut grid = Grid::new(3, 3);
        set(&mut grid, 1, 1, cell(0, 5));
        grid.resolve_cascade(DEFAULT_CASCADE_LIMIT);
        assert_eq!(grid.cell(1, 1), Some(&cell(0, 1)));
        for (x, y) in [(1, 0), (1, 2), (0, 1), (2, 1)] {
            assert_eq!(grid.cell(x, y), Some(&cell(0, 1)));
        }
        assert_cells_consistent(&grid);
    }

    #[test]
    fn burst_captures_enemy_neighbors() {
        let mut grid = Grid::new(3, 3);
        set(&mut grid, 1, 0, cell(1, 1));
        set(&mut grid, 0, 1, cell(1, 2));
        set(&mut grid, 0, 0, cell(0, 2));

        grid.resolve_cascade(DEFAULT_CASCADE_LIMIT);

        // (0,1) reached 3 > 2 and burst in the second pass, for player 0.
        assert_eq!(grid.owners(), BTreeSet::from([0]));
        assert_cells_consistent(&grid);
    }

    #[test]
    fn later_burst_in_same_pass_sees_earlier_effects() {
        // (0,0) and (1,0) both burst in the first pass. (0,0) goes first and
        // hands (1,0) an extra orb and its ownership before (1,0) bursts.
        let mut grid = Grid::new(2, 3);
        set(&mut grid, 0, 0, cell(0, 2));
        set(&mut grid, 1, 0, cell(1, 3));

        let report = grid.resolve_cascade(DEFAULT_CASCADE_LIMIT);

        assert_eq!(report.passes, 1);
        assert_eq!(report.bursts, 2);
        assert_eq!(grid.cell(0, 0), Some(&cell(0, 1)));
        assert_eq!(grid.cell(1, 0), Some(&cell(0, 1)));
        assert_eq!(grid.cell(2, 0), Some(&cell(0, 1)));
        assert_eq!(grid.cell(0, 1), Some(&cell(0, 1)));
        assert_eq!(grid.cell(1, 1), Some(&cell(0, 1)));
        assert!(grid.cell(2, 1).unwrap().is_empty());
        assert_eq!(grid.owners(), BTreeSet::from([0]));
    }

    #[test]
    fn cascade_conserves_orbs() {
        let mut grid = Grid::new(4, 4);
        set(&mut grid, 0, 0, cell(0, 2));
        set(&mut grid, 1, 0, cell(1, 2));
        set(&mut grid, 1, 1, cell(1, 3));
        let before = grid.orb_count();
        grid.resolve_cascade(DEFAULT_CASCADE_LIMIT);
        assert_eq!(grid.orb_count(), before);
        assert_cells_consistent(&grid);
    }

    #[test]
    fn overfull_board_is_truncated_at_limit() {
        let mut grid = Grid::new(2, 2);
        for (x, y) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            set(&mut grid, x, y, cell(0, 2));
        }
        let report = grid.resolve_cascade(10);
        assert!(report.truncated);
        assert_eq!(report.passes, 10);
        assert_eq!(grid.orb_count(), 8);
        assert_cells_consistent(&grid);
    }

    #[test]
    fn grid_serializes_as_rows_of_cells() {
        let mut grid = Grid::new(2, 3);
        grid.place_orb(2, 1, 1).unwrap();
        let json = serde_json::to_value(&grid).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 2);
        assert_eq!(json[0].as_array().unwrap().len(), 3);
        assert_eq!(json[0][0], serde_json::json!({ "player": -1, "count": 0 }));
        assert_eq!(json[1][2], serde_json::json!({ "player": 1, "count": 1 }));

        let back: Grid = serde_json::from_value(json).unwrap();
        assert_eq!(back, grid);
    }

    #[test]
    fn ragged_or_inconsistent_rows_are_rejected() {
        let ragged = serde_json::json!([
            [{ "player": -1, "count": 0 }],
            []
        ]);
        assert!(serde_json::from_value::<Grid>(ragged).is_err());

        let ownerless = serde_json::json!([[{ "player": -1, "count": 2 }]]);
        assert!(serde_json::from_value::<Grid>(ownerless).is_err());
    }
}
