/// Index of a tile, row-major from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId(pub usize);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tile {
    pub is_target: bool,
    pub is_resolved: bool,
    pub is_error: bool,
}

/// Visual board the session controller drives.
///
/// Implementations only hold per-tile flags; every rule about when a flag
/// changes lives in the controller. Calls with an unknown id are ignored.
pub trait BoardRenderer {
    fn tile_count(&self) -> usize;
    fn tile(&self, id: TileId) -> Option<Tile>;
    /// Clears every flag on every tile.
    fn reset_board(&mut self);
    fn set_target(&mut self, id: TileId);
    fn clear_target(&mut self, id: TileId);
    fn mark_resolved(&mut self, id: TileId);
    fn mark_error(&mut self, id: TileId);
    fn clear_error(&mut self, id: TileId);
}

/// Rectangular grid of tiles drawn by the terminal UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    cols: u16,
    rows: u16,
    tiles: Vec<Tile>,
}

impl Grid {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            cols,
            rows,
            tiles: vec![Tile::default(); cols as usize * rows as usize],
        }
    }

    pub fn square(side: u16) -> Self {
        Self::new(side, side)
    }

    pub fn cols(&self) -> u16 {
        self.cols
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn target(&self) -> Option<TileId> {
        self.tiles.iter().position(|t| t.is_target).map(TileId)
    }

    pub fn target_count(&self) -> usize {
        self.tiles.iter().filter(|t| t.is_target).count()
    }

    pub fn resolved_count(&self) -> usize {
        self.tiles.iter().filter(|t| t.is_resolved).count()
    }

    pub fn id_at(&self, col: u16, row: u16) -> Option<TileId> {
        if col >= self.cols || row >= self.rows {
            return None;
        }
        Some(TileId(row as usize * self.cols as usize + col as usize))
    }

    fn update(&mut self, id: TileId, f: impl FnOnce(&mut Tile)) {
        if let Some(tile) = self.tiles.get_mut(id.0) {
            f(tile);
        }
    }
}

impl BoardRenderer for Grid {
    fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    fn tile(&self, id: TileId) -> Option<Tile> {
        self.tiles.get(id.0).copied()
    }

    fn reset_board(&mut self) {
        self.tiles.fill(Tile::default());
    }

    fn set_target(&mut self, id: TileId) {
        self.update(id, |t| t.is_target = true);
    }

    fn clear_target(&mut self, id: TileId) {
        self.update(id, |t| t.is_target = false);
    }

    fn mark_resolved(&mut self, id: TileId) {
        self.update(id, |t| t.is_resolved = true);
    }

    fn mark_error(&mut self, id: TileId) {
        self.update(id, |t| t.is_error = true);
    }

    fn clear_error(&mut self, id: TileId) {
        self.update(id, |t| t.is_error = false);
    }
}
