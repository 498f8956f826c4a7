//! Core type definitions for the simulation.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Simulation clock, in seconds since the run started.
pub type SimulationTime = f64;

/// Integer tile coordinate in the world grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub col: i32,
    pub row: i32,
}

impl Cell {
    pub fn new(col: i32, row: i32) -> Self {
        Self { col, row }
    }

    pub fn offset(&self, dcol: i32, drow: i32) -> Self {
        Self {
            col: self.col + dcol,
            row: self.row + drow,
        }
    }

    pub fn neighbor(&self, direction: Direction) -> Self {
        let (dcol, drow) = direction.to_delta();
        self.offset(dcol, drow)
    }
}

/// Direction towards one of the eight neighboring cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    North,
    South,
    East,
    West,
    NorthEast,
    NorthWest,
    SouthEast,
    SouthWest,
}

impl Direction {
    pub fn to_delta(&self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::South => (0, 1),
            Direction::East => (1, 0),
            Direction::West => (-1, 0),
            Direction::NorthEast => (1, -1),
            Direction::NorthWest => (-1, -1),
            Direction::SouthEast => (1, 1),
            Direction::SouthWest => (-1, 1),
        }
    }

    pub fn all() -> [Direction; 8] {
        [
            Direction::North,
            Direction::South,
            Direction::East,
            Direction::West,
            Direction::NorthEast,
            Direction::NorthWest,
            Direction::SouthEast,
            Direction::SouthWest,
        ]
    }
}

/// Terrain flags of a single tile.
///
/// A swimmable tile is water, a climbable tile is a mountain. A tile with neither flag is
/// plain ground every mover can cross.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub swimmable: bool,
    pub climbable: bool,
}

impl Tile {
    pub fn ground() -> Self {
        Self::default()
    }

    pub fn water() -> Self {
        Self {
            swimmable: true,
            climbable: false,
        }
    }

    pub fn mountain() -> Self {
        Self {
            swimmable: false,
            climbable: true,
        }
    }

    pub fn is_water(&self) -> bool {
        self.swimmable
    }

    /// Whether a mover with the given capabilities may enter this tile
    pub fn is_passable(&self, mobility: Mobility) -> bool {
        (!self.swimmable || mobility.can_swim) && (!self.climbable || mobility.can_climb)
    }
}

/// Terrain capabilities of a mover
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mobility {
    pub can_swim: bool,
    pub can_climb: bool,
}

impl Mobility {
    pub fn new(can_swim: bool, can_climb: bool) -> Self {
        Self { can_swim, can_climb }
    }

    /// Crosses every kind of terrain
    pub fn unrestricted() -> Self {
        Self::new(true, true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn opposite(&self) -> Gender {
        match self {
            Gender::Male => Gender::Female,
            Gender::Female => Gender::Male,
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Male => write!(f, "male"),
            Gender::Female => write!(f, "female"),
        }
    }
}

/// What an agent feeds on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Diet {
    Herbivore,
    Carnivore,
    Omnivore,
}

impl Diet {
    pub fn eats_plants(&self) -> bool {
        matches!(self, Diet::Herbivore | Diet::Omnivore)
    }

    pub fn eats_meat(&self) -> bool {
        matches!(self, Diet::Carnivore | Diet::Omnivore)
    }

    /// Whether an agent with this diet hunts agents with the `prey` diet.
    ///
    /// Carnivores hunt anything; omnivores only hunt herbivores.
    pub fn hunts(&self, prey: Diet) -> bool {
        match self {
            Diet::Herbivore => false,
            Diet::Carnivore => true,
            Diet::Omnivore => prey == Diet::Herbivore,
        }
    }
}

impl FromStr for Diet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "h" | "herbivore" => Ok(Diet::Herbivore),
            "c" | "carnivore" => Ok(Diet::Carnivore),
            "o" | "omnivore" => Ok(Diet::Omnivore),
            other => Err(Error::Validation(format!("unknown diet code {other:?}"))),
        }
    }
}

impl TryFrom<String> for Diet {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Diet> for String {
    fn from(diet: Diet) -> String {
        diet.to_string()
    }
}

impl fmt::Display for Diet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diet::Herbivore => write!(f, "herbivore"),
            Diet::Carnivore => write!(f, "carnivore"),
            Diet::Omnivore => write!(f, "omnivore"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_neighbor() {
        let cell = Cell::new(5, 5);
        assert_eq!(cell.neighbor(Direction::North), Cell::new(5, 4));
        assert_eq!(cell.neighbor(Direction::SouthWest), Cell::new(4, 6));
    }

    #[test]
    fn test_tile_passability() {
        let walker = Mobility::new(false, false);
        let swimmer = Mobility::new(true, false);
        let climber = Mobility::new(false, true);

        assert!(Tile::ground().is_passable(walker));
        assert!(!Tile::water().is_passable(walker));
        assert!(Tile::water().is_passable(swimmer));
        assert!(!Tile::mountain().is_passable(swimmer));
        assert!(Tile::mountain().is_passable(climber));
        assert!(Tile::mountain().is_passable(Mobility::unrestricted()));
    }

    #[test]
    fn test_diet_codes() {
        assert_eq!("h".parse::<Diet>().unwrap(), Diet::Herbivore);
        assert_eq!("Carnivore".parse::<Diet>().unwrap(), Diet::Carnivore);
        assert_eq!(" o ".parse::<Diet>().unwrap(), Diet::Omnivore);
        assert!("x".parse::<Diet>().is_err());
    }

    #[test]
    fn test_diet_hunting() {
        assert!(Diet::Carnivore.hunts(Diet::Carnivore));
        assert!(Diet::Omnivore.hunts(Diet::Herbivore));
        assert!(!Diet::Omnivore.hunts(Diet::Carnivore));
        assert!(!Diet::Herbivore.hunts(Diet::Herbivore));
        assert!(Diet::Omnivore.eats_plants() && Diet::Omnivore.eats_meat());
    }

    #[test]
    fn test_diet_serialization() {
        let json = serde_json::to_string(&Diet::Omnivore).unwrap();
        assert_eq!(json, "\"omnivore\"");
        let diet: Diet = serde_json::from_str("\"c\"").unwrap();
        assert_eq!(diet, Diet::Carnivore);
    }

    #[test]
    fn test_gender_opposite() {
        assert_eq!(Gender::Male.opposite(), Gender::Female);
        assert_eq!(Gender::Female.opposite(), Gender::Male);
    }
}
