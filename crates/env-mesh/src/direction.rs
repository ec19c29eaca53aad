//! Compass directions used to key the neighbour graph.
//!
//! Each direction has a signed integer code. Negating a code yields the
//! opposite direction, which is what every neighbour-repair routine relies on
//! when it writes the reverse edge.

use std::fmt;

use crate::error::{MeshError, MeshResult};

/// One of the eight compass directions between adjacent cellboxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
    North,
}

impl Direction {
    /// All directions in the order they are serialised.
    pub const ALL: [Direction; 8] = [
        Direction::NorthEast,
        Direction::East,
        Direction::SouthEast,
        Direction::South,
        Direction::SouthWest,
        Direction::West,
        Direction::NorthWest,
        Direction::North,
    ];

    /// The signed code of this direction.
    #[inline]
    pub const fn code(self) -> i8 {
        match self {
            Direction::NorthEast => 1,
            Direction::East => 2,
            Direction::SouthEast => 3,
            Direction::South => 4,
            Direction::SouthWest => -1,
            Direction::West => -2,
            Direction::NorthWest => -3,
            Direction::North => -4,
        }
    }

    /// Look up a direction from its signed code.
    pub fn from_code(code: i8) -> MeshResult<Self> {
        Direction::ALL
            .into_iter()
            .find(|d| d.code() == code)
            .ok_or_else(|| {
                MeshError::invalid_argument("direction", format!("{} is not a direction code", code))
            })
    }

    /// The direction pointing the other way.
    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Direction::NorthEast => Direction::SouthWest,
            Direction::East => Direction::West,
            Direction::SouthEast => Direction::NorthWest,
            Direction::South => Direction::North,
            Direction::SouthWest => Direction::NorthEast,
            Direction::West => Direction::East,
            Direction::NorthWest => Direction::SouthEast,
            Direction::North => Direction::South,
        }
    }

    /// Whether this is a corner (diagonal) direction.
    #[inline]
    pub fn is_corner(self) -> bool {
        matches!(
            self,
            Direction::NorthEast | Direction::SouthEast | Direction::SouthWest | Direction::NorthWest
        )
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::NorthEast => "north_east",
            Direction::East => "east",
            Direction::SouthEast => "south_east",
            Direction::South => "south",
            Direction::SouthWest => "south_west",
            Direction::West => "west",
            Direction::NorthWest => "north_west",
            Direction::North => "north",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negation_is_opposite() {
        for d in Direction::ALL {
            assert_eq!(d.opposite().code(), -d.code());
            assert_eq!(d.opposite().opposite(), d);
        }
    }

    #[test]
    fn test_from_code() {
        assert_eq!(Direction::from_code(-4).unwrap(), Direction::North);
        assert_eq!(Direction::from_code(3).unwrap(), Direction::SouthEast);
        assert!(Direction::from_code(0).is_err());
        assert!(Direction::from_code(5).is_err());
    }

    #[test]
    fn test_corners() {
        let corners: Vec<_> = Direction::ALL.into_iter().filter(|d| d.is_corner()).collect();
        assert_eq!(corners.len(), 4);
        assert!(!Direction::North.is_corner());
    }
}
