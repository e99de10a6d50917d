//! Building and position primitives shared across crates.
//!
//! Cognition reads tile positions but never writes them; movement is the
//! motion collaborator's job. Distances are Chebyshev (board distance) to
//! match square perception radii on the tile grid.

use serde::{Deserialize, Serialize};

/// A tile coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TilePos {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl TilePos {
    /// Construct a position.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chebyshev distance to another tile.
    pub const fn distance(self, other: Self) -> u32 {
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        if dx > dy { dx } else { dy }
    }
}

/// A building footprint on the tile map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    /// Unique building name (`"bakery"`, `"Elena's house"`, ...).
    pub name: String,
    /// Type tag (`house`, `market_stall`, `tavern`, ...).
    pub kind: String,
    /// Top-left tile.
    pub pos: TilePos,
    /// Width in tiles.
    pub width: u32,
    /// Height in tiles.
    pub height: u32,
}

impl Building {
    /// The doorstep tile: centre of the bottom edge.
    pub fn door(&self) -> TilePos {
        let half = i32::try_from(self.width / 2).unwrap_or(0);
        let below = i32::try_from(self.height).unwrap_or(0);
        TilePos::new(
            self.pos.x.saturating_add(half),
            self.pos.y.saturating_add(below),
        )
    }

    /// Whether a tile lies inside the footprint.
    pub fn contains(&self, tile: TilePos) -> bool {
        let w = i32::try_from(self.width).unwrap_or(0);
        let h = i32::try_from(self.height).unwrap_or(0);
        tile.x >= self.pos.x
            && tile.x < self.pos.x.saturating_add(w)
            && tile.y >= self.pos.y
            && tile.y < self.pos.y.saturating_add(h)
    }

    /// Distance from a tile to the nearest tile of the footprint,
    /// approximated as distance to the centre minus half the extent.
    pub fn distance_from(&self, tile: TilePos) -> u32 {
        let w = i32::try_from(self.width).unwrap_or(0);
        let h = i32::try_from(self.height).unwrap_or(0);
        let centre = TilePos::new(
            self.pos.x.saturating_add(w / 2),
            self.pos.y.saturating_add(h / 2),
        );
        let extent = (self.width.max(self.height) / 2).min(u32::MAX);
        centre.distance(tile).saturating_sub(extent)
    }
}
