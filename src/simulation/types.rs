//! Core types for the intersection simulation
//!
//! Directions, vehicle categories and the small geometric helpers shared by
//! the motion engine, the controller and the detectors.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A unique identifier for a vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VehicleId(pub u64);

/// One of the four approaches into the intersection
///
/// The declaration order is the default phase sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    pub fn index(self) -> usize {
        match self {
            Direction::North => 0,
            Direction::East => 1,
            Direction::South => 2,
            Direction::West => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Direction> {
        Self::ALL.get(index).copied()
    }

    /// The direction that follows this one in the default cycle
    pub fn next(self) -> Direction {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::East => "east",
            Direction::South => "south",
            Direction::West => "west",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "north" => Ok(Direction::North),
            "east" => Ok(Direction::East),
            "south" => Ok(Direction::South),
            "west" => Ok(Direction::West),
            other => Err(format!("unknown direction '{}'", other)),
        }
    }
}

/// Class of a vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleCategory {
    Car,
    Bus,
    Truck,
    Rickshaw,
    Bike,
    Emergency,
}

impl VehicleCategory {
    /// Categories drawn uniformly by the generator for ordinary traffic
    pub const GENERAL: [VehicleCategory; 5] = [
        VehicleCategory::Car,
        VehicleCategory::Bus,
        VehicleCategory::Truck,
        VehicleCategory::Rickshaw,
        VehicleCategory::Bike,
    ];

    pub const ALL: [VehicleCategory; 6] = [
        VehicleCategory::Car,
        VehicleCategory::Bus,
        VehicleCategory::Truck,
        VehicleCategory::Rickshaw,
        VehicleCategory::Bike,
        VehicleCategory::Emergency,
    ];

    /// Distance covered per motion step, in canvas units
    pub fn speed(self) -> f32 {
        match self {
            VehicleCategory::Car => 2.25,
            VehicleCategory::Bus => 1.8,
            VehicleCategory::Truck => 1.8,
            VehicleCategory::Rickshaw => 2.0,
            VehicleCategory::Bike => 2.5,
            VehicleCategory::Emergency => 3.0,
        }
    }

    /// Average seconds this category needs to clear the stop line.
    /// Emergency vehicles carry no weight in the green-time estimate.
    pub fn pass_time(self) -> Option<f64> {
        match self {
            VehicleCategory::Car => Some(2.0),
            VehicleCategory::Bus => Some(2.5),
            VehicleCategory::Truck => Some(2.5),
            VehicleCategory::Rickshaw => Some(2.25),
            VehicleCategory::Bike => Some(1.0),
            VehicleCategory::Emergency => None,
        }
    }

    /// Footprint as (length along heading, width)
    pub fn footprint(self) -> (f32, f32) {
        match self {
            VehicleCategory::Car => (44.0, 22.0),
            VehicleCategory::Bus => (72.0, 26.0),
            VehicleCategory::Truck => (66.0, 26.0),
            VehicleCategory::Rickshaw => (36.0, 20.0),
            VehicleCategory::Bike => (24.0, 12.0),
            VehicleCategory::Emergency => (52.0, 24.0),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VehicleCategory::Car => "car",
            VehicleCategory::Bus => "bus",
            VehicleCategory::Truck => "truck",
            VehicleCategory::Rickshaw => "rickshaw",
            VehicleCategory::Bike => "bike",
            VehicleCategory::Emergency => "emergency",
        }
    }
}

impl fmt::Display for VehicleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of a signal head as seen by road users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Light {
    Red,
    Yellow,
    Green,
}

impl fmt::Display for Light {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Light::Red => "red",
            Light::Yellow => "yellow",
            Light::Green => "green",
        })
    }
}

impl FromStr for Light {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "red" => Ok(Light::Red),
            "yellow" => Ok(Light::Yellow),
            "green" => Ok(Light::Green),
            other => Err(format!("unknown signal state '{}'", other)),
        }
    }
}

/// Canvas axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

/// Travel direction along one canvas axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Heading {
    pub axis: Axis,
    /// +1.0 when coordinates grow along the heading, -1.0 otherwise
    pub sign: f32,
}

impl Heading {
    pub const POS_X: Heading = Heading { axis: Axis::X, sign: 1.0 };
    pub const NEG_X: Heading = Heading { axis: Axis::X, sign: -1.0 };
    pub const POS_Y: Heading = Heading { axis: Axis::Y, sign: 1.0 };
    pub const NEG_Y: Heading = Heading { axis: Axis::Y, sign: -1.0 };

    /// Project a coordinate so that "further along the heading" is always larger
    pub fn signed(&self, coordinate: f32) -> f32 {
        self.sign * coordinate
    }
}

/// A 2D position on the intersection canvas (top-left corner of a footprint)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn along(&self, axis: Axis) -> f32 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
        }
    }

    pub fn along_mut(&mut self, axis: Axis) -> &mut f32 {
        match axis {
            Axis::X => &mut self.x,
            Axis::Y => &mut self.y,
        }
    }
}

/// Index of the lane reserved for bikes
pub const BIKE_LANE: usize = 0;

/// Index of the outer general lane, the only one whose vehicles may turn
pub const TURN_LANE: usize = 2;

/// Lanes per direction
pub const LANES_PER_DIRECTION: usize = 3;
