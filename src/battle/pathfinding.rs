//! Grid map with A* pathfinding
//!
//! A self-contained implementation of the map collaborator, used by the
//! batch runner and tests. Blocked hexes are impassable; every step costs 1.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ahash::{AHashMap, AHashSet};

use crate::battle::hex::HexCoord;
use crate::battle::terrain::Terrain;
use crate::battle::world::{Pathfinder, TerrainSource};
use crate::core::types::PlayerId;

/// Node in the A* open set
#[derive(Debug, Clone)]
struct PathNode {
    coord: HexCoord,
    f_cost: u32, // g_cost + heuristic
}

impl PartialEq for PathNode {
    fn eq(&self, other: &Self) -> bool {
        self.coord == other.coord && self.f_cost == other.f_cost
    }
}

impl Eq for PathNode {}

impl Ord for PathNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap; coordinate breaks ties deterministically
        other
            .f_cost
            .cmp(&self.f_cost)
            .then_with(|| other.coord.cmp(&self.coord))
    }
}

impl PartialOrd for PathNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Rectangular axial map (`0 <= q < width`, `0 <= r < height`)
#[derive(Debug, Clone, Default)]
pub struct GridMap {
    pub width: i32,
    pub height: i32,
    terrain: AHashMap<HexCoord, Terrain>,
    blocked: AHashSet<HexCoord>,
}

impl GridMap {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            terrain: AHashMap::new(),
            blocked: AHashSet::new(),
        }
    }

    pub fn set_terrain(&mut self, coord: HexCoord, terrain: Terrain) {
        self.terrain.insert(coord, terrain);
    }

    pub fn block(&mut self, coord: HexCoord) {
        self.blocked.insert(coord);
    }

    pub fn in_bounds(&self, coord: HexCoord) -> bool {
        coord.q >= 0 && coord.q < self.width && coord.r >= 0 && coord.r < self.height
    }

    pub fn is_passable(&self, coord: HexCoord) -> bool {
        self.in_bounds(coord) && !self.blocked.contains(&coord)
    }
}

impl TerrainSource for GridMap {
    fn terrain_at(&self, coord: HexCoord) -> Terrain {
        self.terrain.get(&coord).copied().unwrap_or_default()
    }
}

impl Pathfinder for GridMap {
    fn find_path(&self, start: HexCoord, goal: HexCoord, _player: PlayerId) -> Option<Vec<HexCoord>> {
        if !self.is_passable(start) || !self.is_passable(goal) {
            return None;
        }
        if start == goal {
            return Some(vec![start]);
        }

        let mut open_set = BinaryHeap::new();
        let mut came_from: AHashMap<HexCoord, HexCoord> = AHashMap::new();
        let mut g_scores: AHashMap<HexCoord, u32> = AHashMap::new();

        g_scores.insert(start, 0);
        open_set.push(PathNode {
            coord: start,
            f_cost: start.distance(&goal),
        });

        while let Some(current) = open_set.pop() {
            if current.coord == goal {
                return Some(reconstruct_path(&came_from, current.coord));
            }

            let current_g = *g_scores.get(&current.coord).unwrap_or(&u32::MAX);

            for neighbor in current.coord.neighbors() {
                if !self.is_passable(neighbor) {
                    continue;
                }

                let tentative_g = current_g + 1;
                let neighbor_g = *g_scores.get(&neighbor).unwrap_or(&u32::MAX);

                if tentative_g < neighbor_g {
                    came_from.insert(neighbor, current.coord);
                    g_scores.insert(neighbor, tentative_g);
                    open_set.push(PathNode {
                        coord: neighbor,
                        f_cost: tentative_g + neighbor.distance(&goal),
                    });
                }
            }
        }

        None
    }
}

/// Reconstruct path from came_from map
fn reconstruct_path(came_from: &AHashMap<HexCoord, HexCoord>, mut current: HexCoord) -> Vec<HexCoord> {
    let mut path = vec![current];
    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pathfind_straight_line() {
        let map = GridMap::new(10, 10);
        let start = HexCoord::new(0, 0);
        let goal = HexCoord::new(5, 0);

        let path = map.find_path(start, goal, PlayerId(1)).unwrap();
        assert_eq!(path.first(), Some(&start));
        assert_eq!(path.last(), Some(&goal));
        assert_eq!(path.len(), 6);
    }

    #[test]
    fn test_pathfind_around_wall() {
        let mut map = GridMap::new(10, 10);
        for r in 0..9 {
            map.block(HexCoord::new(3, r));
        }

        let path = map
            .find_path(HexCoord::new(0, 0), HexCoord::new(6, 0), PlayerId(1))
            .unwrap();
        assert!(path.iter().all(|c| map.is_passable(*c)));
        assert!(path.len() > 7);
    }

    #[test]
    fn test_pathfind_enclosed_goal() {
        let mut map = GridMap::new(10, 10);
        let goal = HexCoord::new(5, 5);
        for n in goal.neighbors() {
            map.block(n);
        }
        assert!(map.find_path(HexCoord::new(0, 0), goal, PlayerId(1)).is_none());
    }

    #[test]
    fn test_default_terrain_is_plains() {
        let mut map = GridMap::new(4, 4);
        map.set_terrain(HexCoord::new(1, 1), Terrain::Hills);
        assert_eq!(map.terrain_at(HexCoord::new(1, 1)), Terrain::Hills);
        assert_eq!(map.terrain_at(HexCoord::new(2, 2)), Terrain::Plains);
    }
}
