//! Vehicle movement logic for the intersection simulation

use super::assets::Sprite;
use super::geometry::{Approach, CANVAS_HEIGHT, CANVAS_WIDTH};
use super::types::{Axis, Direction, Heading, Position, VehicleCategory, VehicleId};

/// Result of a vehicle update indicating what the lane should do with it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleUpdate {
    Continue,
    /// Leading edge passed the stop line during this step
    Crossed,
    /// Vehicle left the canvas and should be removed
    Exited,
}

/// Turn progress for vehicles assigned to turn
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TurnState {
    None,
    Rotating { angle: f32 },
    Completed,
}

/// Spacing and turning constants applied by the motion engine
#[derive(Debug, Clone, Copy)]
pub struct MotionRules {
    pub stopping_gap: f32,
    pub moving_gap: f32,
    pub rotation_step: f32,
    pub rotation_threshold: f32,
}

/// A vehicle queued in, or driving through, the intersection
#[derive(Debug, Clone)]
pub struct Vehicle {
    pub id: VehicleId,
    pub category: VehicleCategory,
    pub direction: Direction,
    pub lane: usize,
    pub position: Position,
    pub heading: Heading,
    pub speed: f32,
    pub length: f32,
    pub width: f32,
    /// Set once the leading edge passed the stop line
    pub crossed: bool,
    pub will_turn: bool,
    pub turn: TurnState,
    /// Coordinate of the leading edge where the vehicle must halt on red.
    /// Derived once at spawn time from the vehicle ahead.
    pub stop: f32,
    pub last_position: Position,
    /// Simulated time of the last position change
    pub last_moved_at: f64,
    pub anomaly_reported: bool,
    pub sprite: Sprite,
}

impl Vehicle {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: VehicleId,
        category: VehicleCategory,
        direction: Direction,
        lane: usize,
        position: Position,
        heading: Heading,
        will_turn: bool,
        stop: f32,
        sprite: Sprite,
        now: f64,
    ) -> Self {
        let (length, width) = category.footprint();
        Self {
            id,
            category,
            direction,
            lane,
            position,
            heading,
            speed: category.speed(),
            length,
            width,
            crossed: false,
            will_turn,
            turn: TurnState::None,
            stop,
            last_position: position,
            last_moved_at: now,
            anomaly_reported: false,
            sprite,
        }
    }

    /// Occupied interval along an axis
    pub fn span(&self, axis: Axis) -> (f32, f32) {
        let extent = if axis == self.heading.axis {
            self.length
        } else {
            self.width
        };
        let start = self.position.along(axis);
        (start, start + extent)
    }

    /// Edge facing forward along the given heading
    pub fn leading(&self, heading: Heading) -> f32 {
        let (low, high) = self.span(heading.axis);
        if heading.sign > 0.0 {
            high
        } else {
            low
        }
    }

    /// Edge facing backward along the given heading
    pub fn trailing(&self, heading: Heading) -> f32 {
        let (low, high) = self.span(heading.axis);
        if heading.sign > 0.0 {
            low
        } else {
            high
        }
    }

    pub fn leading_edge(&self) -> f32 {
        self.leading(self.heading)
    }

    /// True when at least `gap` separates this vehicle from `ahead` along `heading`
    pub fn is_clear_of(&self, ahead: &Vehicle, heading: Heading, gap: f32) -> bool {
        heading.signed(self.leading(heading)) + gap < heading.signed(ahead.trailing(heading))
    }

    pub fn has_turned(&self) -> bool {
        self.turn == TurnState::Completed
    }

    pub fn is_emergency(&self) -> bool {
        self.category == VehicleCategory::Emergency
    }

    /// Footprint entirely off the canvas
    pub fn is_off_canvas(&self) -> bool {
        let (x0, x1) = self.span(Axis::X);
        let (y0, y1) = self.span(Axis::Y);
        x1 < 0.0 || x0 > CANVAS_WIDTH || y1 < 0.0 || y0 > CANVAS_HEIGHT
    }

    /// Advance this vehicle by one motion step
    ///
    /// `ahead` is the vehicle directly in front in the same lane, `green` is
    /// whether this vehicle's direction currently shows green (not yellow).
    pub fn update(
        &mut self,
        ahead: Option<&Vehicle>,
        approach: &Approach,
        green: bool,
        rules: &MotionRules,
        now: f64,
    ) -> VehicleUpdate {
        let mut crossed_now = false;
        if !self.crossed
            && self.heading.signed(self.leading_edge()) > self.heading.signed(approach.stop_line)
        {
            self.crossed = true;
            crossed_now = true;
        }

        match self.turn {
            TurnState::Completed => self.follow_turned_path(ahead, approach, rules),
            TurnState::Rotating { angle } => self.rotate(angle, approach, rules),
            TurnState::None => {
                let before_midpoint = self.heading.signed(self.leading_edge())
                    < self.heading.signed(approach.turn_midpoint);
                if self.will_turn && self.crossed && !before_midpoint {
                    self.rotate(0.0, approach, rules);
                } else {
                    self.approach_stop_line(ahead, green, rules);
                }
            }
        }

        if self.position != self.last_position {
            self.last_position = self.position;
            self.last_moved_at = now;
        }

        if crossed_now {
            VehicleUpdate::Crossed
        } else if self.crossed && self.is_off_canvas() {
            VehicleUpdate::Exited
        } else {
            VehicleUpdate::Continue
        }
    }

    fn approach_stop_line(&mut self, ahead: Option<&Vehicle>, green: bool, rules: &MotionRules) {
        let before_stop = self.heading.signed(self.leading_edge()) <= self.heading.signed(self.stop);
        let may_proceed = before_stop || self.crossed || green;
        let spacing_ok = match ahead {
            None => true,
            Some(ahead) => {
                self.is_clear_of(ahead, self.heading, rules.moving_gap) || ahead.has_turned()
            }
        };

        if may_proceed && spacing_ok {
            self.advance();
        }
    }

    fn rotate(&mut self, angle: f32, approach: &Approach, rules: &MotionRules) {
        let angle = angle + rules.rotation_step;
        self.position.x += approach.turn_step.0;
        self.position.y += approach.turn_step.1;

        if angle >= rules.rotation_threshold {
            self.turn = TurnState::Completed;
            self.heading = approach.turned_heading;
        } else {
            self.turn = TurnState::Rotating { angle };
        }
    }

    fn follow_turned_path(&mut self, ahead: Option<&Vehicle>, approach: &Approach, rules: &MotionRules) {
        let free = match ahead {
            None => true,
            Some(ahead) => {
                self.is_clear_of(ahead, self.heading, rules.moving_gap)
                    || self.is_clear_of(ahead, approach.heading, rules.moving_gap)
            }
        };

        if free {
            self.advance();
        }
    }

    fn advance(&mut self) {
        let heading = self.heading;
        *self.position.along_mut(heading.axis) += heading.sign * self.speed;
    }
}
