//! The tile-map collaborator surface.
//!
//! Rendering, pathfinding heuristics, and world generation live outside
//! the cognition core; cognition consumes them through the [`TileWorld`]
//! trait. [`GridWorld`] is the minimal in-memory implementation used by
//! the headless host and the test suite: straight-line paths, uniform
//! walkability outside building footprints.

use rand::Rng;

use hamlet_types::{Building, TilePos};

/// The world-map surface consumed by cognition.
pub trait TileWorld {
    /// All buildings on the map.
    fn buildings(&self) -> &[Building];

    /// Fuzzy lookup: exact name match, then case-insensitive, then
    /// substring either way.
    fn building_by_name_fuzzy(&self, name: &str) -> Option<&Building> {
        let lowered = name.to_lowercase();
        self.buildings()
            .iter()
            .find(|b| b.name == name)
            .or_else(|| {
                self.buildings()
                    .iter()
                    .find(|b| b.name.to_lowercase() == lowered)
            })
            .or_else(|| {
                self.buildings().iter().find(|b| {
                    let bl = b.name.to_lowercase();
                    bl.contains(&lowered) || lowered.contains(&bl)
                })
            })
    }

    /// The building whose footprint contains a tile, if any.
    fn building_at(&self, pos: TilePos) -> Option<&Building> {
        self.buildings().iter().find(|b| b.contains(pos))
    }

    /// Find a path between two tiles, bounded by `max_steps`.
    ///
    /// `None` means no path: the agent stays idle this cycle and no
    /// error propagates.
    fn find_path(&self, from: TilePos, to: TilePos, max_steps: usize) -> Option<Vec<TilePos>>;

    /// A random walkable tile within `radius` of `near`.
    fn random_walkable(&self, near: TilePos, radius: u32) -> TilePos;
}

/// Minimal in-memory tile map.
#[derive(Debug, Clone, Default)]
pub struct GridWorld {
    /// Map width in tiles.
    pub width: i32,
    /// Map height in tiles.
    pub height: i32,
    buildings: Vec<Building>,
}

impl GridWorld {
    /// Create an empty grid of the given size.
    pub const fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            buildings: Vec::new(),
        }
    }

    /// Add a building to the map.
    pub fn add_building(&mut self, building: Building) {
        self.buildings.push(building);
    }

    /// Whether a tile is inside the map bounds.
    const fn in_bounds(&self, pos: TilePos) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    /// Walkable = in bounds and not inside a building footprint.
    fn walkable(&self, pos: TilePos) -> bool {
        self.in_bounds(pos) && self.building_at(pos).is_none()
    }

    /// Clamp a tile into map bounds.
    fn clamp_tile(&self, pos: TilePos) -> TilePos {
        TilePos {
            x: pos.x.clamp(0, self.width.saturating_sub(1).max(0)),
            y: pos.y.clamp(0, self.height.saturating_sub(1).max(0)),
        }
    }
}

impl TileWorld for GridWorld {
    fn buildings(&self) -> &[Building] {
        &self.buildings
    }

    /// Straight-line walk: step one tile toward the target each move,
    /// diagonals allowed. Good enough for a headless host; a real
    /// pathfinder plugs in behind the same trait.
    fn find_path(&self, from: TilePos, to: TilePos, max_steps: usize) -> Option<Vec<TilePos>> {
        if !self.in_bounds(from) || !self.in_bounds(to) {
            return None;
        }
        let mut path = Vec::new();
        let mut current = from;
        while current != to {
            if path.len() >= max_steps {
                return None;
            }
            current = TilePos {
                x: current.x.saturating_add((to.x - current.x).signum()),
                y: current.y.saturating_add((to.y - current.y).signum()),
            };
            path.push(current);
        }
        Some(path)
    }

    fn random_walkable(&self, near: TilePos, radius: u32) -> TilePos {
        let mut rng = rand::rng();
        let spread = i32::try_from(radius).unwrap_or(i32::MAX);
        for _ in 0..16 {
            let candidate = TilePos {
                x: near.x.saturating_add(rng.random_range(-spread..=spread)),
                y: near.y.saturating_add(rng.random_range(-spread..=spread)),
            };
            if self.walkable(candidate) {
                return candidate;
            }
        }
        self.clamp_tile(near)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn grid() -> GridWorld {
        let mut g = GridWorld::new(50, 50);
        g.add_building(Building {
            name: "Old Bakery".to_owned(),
            kind: "bakery".to_owned(),
            pos: TilePos::new(10, 10),
            width: 4,
            height: 3,
        });
        g
    }

    #[test]
    fn fuzzy_lookup_matches_case_and_substring() {
        let g = grid();
        assert!(g.building_by_name_fuzzy("Old Bakery").is_some());
        assert!(g.building_by_name_fuzzy("old bakery").is_some());
        assert!(g.building_by_name_fuzzy("bakery").is_some());
        assert!(g.building_by_name_fuzzy("forge").is_none());
    }

    #[test]
    fn straight_path_reaches_the_target() {
        let g = grid();
        let path = g
            .find_path(TilePos::new(0, 0), TilePos::new(5, 3), 100)
            .unwrap();
        assert_eq!(path.last().copied().unwrap(), TilePos::new(5, 3));
        assert_eq!(path.len(), 5);
    }

    #[test]
    fn path_respects_the_step_budget() {
        let g = grid();
        assert!(g.find_path(TilePos::new(0, 0), TilePos::new(40, 40), 10).is_none());
    }

    #[test]
    fn random_walkable_avoids_footprints() {
        let g = grid();
        for _ in 0..20 {
            let tile = g.random_walkable(TilePos::new(11, 11), 3);
            assert!(g.building_at(tile).is_none());
        }
    }
}
