//! 2D tile grid for the world.

use dinosim_core::{Cell, Direction, Error, GridConfig, Mobility, Result, Tile, Vector2D};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A bounded grid of square tiles. Immutable once a run starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldGrid {
    pub width: i32,
    pub height: i32,
    pub tile_size: f64,
    tiles: Vec<Tile>,
}

impl WorldGrid {
    /// A grid of plain ground
    pub fn new(width: i32, height: i32, tile_size: f64) -> Self {
        let size = (width.max(0) * height.max(0)) as usize;
        Self {
            width,
            height,
            tile_size,
            tiles: vec![Tile::ground(); size],
        }
    }

    /// Create a random grid from configuration
    pub fn from_config<R: Rng>(config: &GridConfig, rng: &mut R) -> Self {
        let mut grid = Self::new(config.width, config.height, config.tile_size);

        for row in 0..config.height {
            for col in 0..config.width {
                let roll = rng.gen::<f32>();

                if roll < config.water_density {
                    grid.set(Cell::new(col, row), Tile::water());
                } else if roll < config.water_density + config.mountain_density {
                    grid.set(Cell::new(col, row), Tile::mountain());
                }
            }
        }

        grid
    }

    /// Build a grid from text rows: `.` ground, `~` water, `^` mountain.
    pub fn from_ascii(rows: &[&str], tile_size: f64) -> Result<Self> {
        let height = rows.len() as i32;
        let width = rows.first().map_or(0, |r| r.chars().count()) as i32;
        if width == 0 || height == 0 {
            return Err(Error::Validation("grid must not be empty".to_string()));
        }

        let mut tiles = Vec::with_capacity((width * height) as usize);
        for (row_idx, row) in rows.iter().enumerate() {
            if row.chars().count() as i32 != width {
                return Err(Error::Validation(format!(
                    "grid row {row_idx} has {} tiles, expected {width}",
                    row.chars().count()
                )));
            }
            for symbol in row.chars() {
                tiles.push(match symbol {
                    '.' => Tile::ground(),
                    '~' => Tile::water(),
                    '^' => Tile::mountain(),
                    other => {
                        return Err(Error::Validation(format!(
                            "unknown tile symbol {other:?} in row {row_idx}"
                        )))
                    }
                });
            }
        }

        Ok(Self {
            width,
            height,
            tile_size,
            tiles,
        })
    }

    /// Width of the world in pixels
    pub fn pixel_width(&self) -> f64 {
        self.width as f64 * self.tile_size
    }

    /// Height of the world in pixels
    pub fn pixel_height(&self) -> f64 {
        self.height as f64 * self.tile_size
    }

    pub fn contains_cell(&self, cell: Cell) -> bool {
        cell.col >= 0 && cell.row >= 0 && cell.col < self.width && cell.row < self.height
    }

    pub fn contains(&self, position: Vector2D) -> bool {
        position.x >= 0.0
            && position.y >= 0.0
            && position.x < self.pixel_width()
            && position.y < self.pixel_height()
    }

    /// Cell containing `position`, or `None` outside the world
    pub fn cell_at(&self, position: Vector2D) -> Option<Cell> {
        if !self.contains(position) {
            return None;
        }
        Some(Cell::new(
            (position.x / self.tile_size).floor() as i32,
            (position.y / self.tile_size).floor() as i32,
        ))
    }

    pub fn tile_center(&self, cell: Cell) -> Vector2D {
        Vector2D::new(
            (cell.col as f64 + 0.5) * self.tile_size,
            (cell.row as f64 + 0.5) * self.tile_size,
        )
    }

    pub fn get(&self, cell: Cell) -> Option<&Tile> {
        if self.contains_cell(cell) {
            Some(&self.tiles[self.cell_to_index(cell)])
        } else {
            None
        }
    }

    pub fn set(&mut self, cell: Cell, tile: Tile) {
        if self.contains_cell(cell) {
            let index = self.cell_to_index(cell);
            self.tiles[index] = tile;
        }
    }

    pub fn tile_at(&self, position: Vector2D) -> Option<&Tile> {
        self.cell_at(position).and_then(|cell| self.get(cell))
    }

    /// Whether a mover may stand at `position`. Outside the world is never passable.
    pub fn is_passable(&self, position: Vector2D, mobility: Mobility) -> bool {
        self.tile_at(position)
            .is_some_and(|tile| tile.is_passable(mobility))
    }

    /// In-bounds neighbors of a cell
    pub fn neighbors(&self, cell: Cell) -> impl Iterator<Item = (Cell, &Tile)> + '_ {
        Direction::all()
            .into_iter()
            .map(move |direction| cell.neighbor(direction))
            .filter_map(move |neighbor| self.get(neighbor).map(|tile| (neighbor, tile)))
    }

    /// Cells whose centers lie within `radius` of `origin`, in row-major order
    pub fn cells_in_radius(&self, origin: Vector2D, radius: f64) -> Vec<Cell> {
        let min_col = ((origin.x - radius) / self.tile_size).floor().max(0.0) as i32;
        let min_row = ((origin.y - radius) / self.tile_size).floor().max(0.0) as i32;
        let max_col = ((origin.x + radius) / self.tile_size).ceil() as i32;
        let max_row = ((origin.y + radius) / self.tile_size).ceil() as i32;

        let mut cells = Vec::new();
        for row in min_row..=max_row.min(self.height - 1) {
            for col in min_col..=max_col.min(self.width - 1) {
                let cell = Cell::new(col, row);
                if self.tile_center(cell).distance(&origin) <= radius {
                    cells.push(cell);
                }
            }
        }
        cells
    }

    fn cell_to_index(&self, cell: Cell) -> usize {
        (cell.row * self.width + cell.col) as usize
    }
}
