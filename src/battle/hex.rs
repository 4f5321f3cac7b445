//! Hex coordinate system for the strategic map (axial coordinates)
//!
//! Armies, buildings and villager groups all sit on axial (q, r) hexes.
//! Contact, siege reach, garrison range and footprints are hex distances.

use serde::{Deserialize, Serialize};

/// Axial offsets of the six neighbours, counter-clockwise from east
const DIRECTIONS: [(i32, i32); 6] = [(1, 0), (1, -1), (0, -1), (-1, 0), (-1, 1), (0, 1)];

/// Axial hex coordinate
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct HexCoord {
    pub q: i32,
    pub r: i32,
}

impl HexCoord {
    pub fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    /// Cube coordinate S (derived from q and r)
    pub fn s(&self) -> i32 {
        -self.q - self.r
    }

    fn offset(&self, dq: i32, dr: i32) -> Self {
        Self::new(self.q + dq, self.r + dr)
    }

    /// Hex steps between two coordinates
    pub fn distance(&self, other: &Self) -> u32 {
        let dq = (self.q - other.q).unsigned_abs();
        let dr = (self.r - other.r).unsigned_abs();
        let ds = (self.s() - other.s()).unsigned_abs();
        dq.max(dr).max(ds)
    }

    /// Is `other` within `range` hexes of this coordinate?
    pub fn within(&self, other: &Self, range: u32) -> bool {
        self.distance(other) <= range
    }

    pub fn neighbors(&self) -> [HexCoord; 6] {
        DIRECTIONS.map(|(dq, dr)| self.offset(dq, dr))
    }

    /// Every hex at most `range` steps away, this one included
    pub fn hexes_in_range(&self, range: u32) -> Vec<HexCoord> {
        let n = range as i32;
        (-n..=n)
            .flat_map(|dq| ((-n).max(-dq - n)..=n.min(-dq + n)).map(move |dr| (dq, dr)))
            .map(|(dq, dr)| self.offset(dq, dr))
            .collect()
    }

    /// Hexes exactly `radius` steps away
    pub fn ring(&self, radius: u32) -> Vec<HexCoord> {
        if radius == 0 {
            return vec![*self];
        }
        let n = radius as i32;
        // Start `radius` steps south-west, then walk each of the six sides
        let mut hex = self.offset(DIRECTIONS[4].0 * n, DIRECTIONS[4].1 * n);
        let mut ring = Vec::with_capacity(6 * radius as usize);
        for (dq, dr) in DIRECTIONS {
            for _ in 0..radius {
                ring.push(hex);
                hex = hex.offset(dq, dr);
            }
        }
        ring
    }
}

impl std::fmt::Display for HexCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.q, self.r)
    }
}
