//! Fixed intersection geometry
//!
//! The canvas is 1400 x 800 units with y growing downwards. Each approach has
//! three lane spawn origins, a stop line, a default stop position for the
//! first queued vehicle and a turn midpoint. Every turn is a right turn in
//! canvas coordinates.

use super::types::{Direction, Heading, Position, LANES_PER_DIRECTION};

pub const CANVAS_WIDTH: f32 = 1400.0;
pub const CANVAS_HEIGHT: f32 = 800.0;

/// Static description of one approach into the intersection
#[derive(Debug, Clone, Copy)]
pub struct Approach {
    pub heading: Heading,
    /// Top-left spawn corner of each lane
    pub lane_origins: [Position; LANES_PER_DIRECTION],
    /// A vehicle counts as crossed once its leading edge passes this coordinate
    pub stop_line: f32,
    /// Where the first queued vehicle halts
    pub default_stop: f32,
    /// Turning vehicles start rotating once their leading edge reaches this
    pub turn_midpoint: f32,
    /// Displacement applied on every rotation step
    pub turn_step: (f32, f32),
    /// Heading after a completed turn
    pub turned_heading: Heading,
}

impl Approach {
    pub fn for_direction(direction: Direction) -> Approach {
        match direction {
            Direction::North => Approach {
                heading: Heading::POS_Y,
                lane_origins: [
                    Position::new(755.0, 0.0),
                    Position::new(727.0, 0.0),
                    Position::new(697.0, 0.0),
                ],
                stop_line: 330.0,
                default_stop: 320.0,
                turn_midpoint: 450.0,
                turn_step: (-2.5, 2.0),
                turned_heading: Heading::NEG_X,
            },
            Direction::East => Approach {
                heading: Heading::NEG_X,
                lane_origins: [
                    Position::new(CANVAS_WIDTH, 498.0),
                    Position::new(CANVAS_WIDTH, 466.0),
                    Position::new(CANVAS_WIDTH, 436.0),
                ],
                stop_line: 800.0,
                default_stop: 810.0,
                turn_midpoint: 695.0,
                turn_step: (-1.8, -2.5),
                turned_heading: Heading::NEG_Y,
            },
            Direction::South => Approach {
                heading: Heading::NEG_Y,
                lane_origins: [
                    Position::new(602.0, CANVAS_HEIGHT),
                    Position::new(627.0, CANVAS_HEIGHT),
                    Position::new(657.0, CANVAS_HEIGHT),
                ],
                stop_line: 535.0,
                default_stop: 545.0,
                turn_midpoint: 400.0,
                turn_step: (1.0, -1.0),
                turned_heading: Heading::POS_X,
            },
            Direction::West => Approach {
                heading: Heading::POS_X,
                lane_origins: [
                    Position::new(0.0, 348.0),
                    Position::new(0.0, 370.0),
                    Position::new(0.0, 398.0),
                ],
                stop_line: 590.0,
                default_stop: 580.0,
                turn_midpoint: 705.0,
                turn_step: (2.0, 1.8),
                turned_heading: Heading::POS_Y,
            },
        }
    }
}

/// Approaches indexed by `Direction::index`
pub fn approaches() -> [Approach; 4] {
    Direction::ALL.map(Approach::for_direction)
}
