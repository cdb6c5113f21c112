//! Ship Maps
//!
//! Spawn geometry for each ship. Used when the server repositions players
//! at the start of a meeting.

use std::fmt;
use serde::{Serialize, Deserialize};

use crate::core::vec2::Vector2;

/// Vertical offset applied to every spawn point.
const SPAWN_Y_OFFSET: f32 = 0.3636;

/// Ship map variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MapType {
    /// The Skeld
    Skeld,
    /// Mira HQ
    Mira,
    /// Polus
    Polus,
    /// Mirrored Skeld
    Dleks,
    /// The Airship
    Airship,
    /// The Fungle
    Fungle,
}

impl MapType {
    /// Radius of the spawn circle.
    pub fn spawn_radius(self) -> f32 {
        match self {
            Self::Skeld | Self::Dleks => 1.6,
            Self::Mira => 1.55,
            Self::Polus | Self::Fungle => 1.0,
            Self::Airship => 0.0,
        }
    }

    /// Centre of the spawn circle at round start.
    pub fn initial_spawn_center(self) -> Vector2 {
        match self {
            Self::Skeld => Vector2::new(-0.72, 0.62),
            Self::Dleks => Vector2::new(0.72, 0.62),
            Self::Mira => Vector2::new(-4.4, 2.2),
            Self::Polus => Vector2::new(16.64, -2.46),
            Self::Airship => Vector2::new(-25.0, 40.0),
            Self::Fungle => Vector2::new(-9.81, -0.6),
        }
    }

    /// Centre of the spawn circle when a meeting is called.
    pub fn meeting_spawn_center(self) -> Vector2 {
        match self {
            Self::Skeld => Vector2::new(-0.72, 0.62),
            Self::Dleks => Vector2::new(0.72, 0.62),
            Self::Mira => Vector2::new(24.043, 1.72),
            Self::Polus => Vector2::new(17.726, -16.286),
            Self::Airship => Vector2::new(-25.0, 40.0),
            Self::Fungle => Vector2::new(-3.1, -0.5),
        }
    }

    /// Where a player with `slot` lands among `player_count` players.
    ///
    /// The Airship uses a fixed pre-spawn location; players pick their
    /// real spawn afterwards.
    pub fn spawn_location(self, slot: u8, player_count: usize, initial: bool) -> Vector2 {
        if self == Self::Airship {
            return Vector2::new(-25.0, 40.0);
        }

        let count = player_count.max(1) as f32;
        let offset = Vector2::UP.rotate((slot as f32 - 1.0) * (360.0 / count)) * self.spawn_radius();
        let center = if initial {
            self.initial_spawn_center()
        } else {
            self.meeting_spawn_center()
        };

        center + offset + Vector2::new(0.0, SPAWN_Y_OFFSET)
    }
}

impl fmt::Display for MapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Skeld => "Skeld",
            Self::Mira => "Mira",
            Self::Polus => "Polus",
            Self::Dleks => "Dleks",
            Self::Airship => "Airship",
            Self::Fungle => "Fungle",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_airship_is_fixed() {
        let a = MapType::Airship.spawn_location(0, 10, false);
        let b = MapType::Airship.spawn_location(7, 3, true);
        assert_eq!(a, b);
        assert_eq!(a, Vector2::new(-25.0, 40.0));
    }

    #[test]
    fn test_slot_one_sits_above_center() {
        let pos = MapType::Skeld.spawn_location(1, 4, false);
        let expected = MapType::Skeld.meeting_spawn_center()
            + Vector2::new(0.0, 1.6 + SPAWN_Y_OFFSET);
        assert!((pos - expected).length() < 1e-4, "got {:?}", pos);
    }

    #[test]
    fn test_players_spread_on_circle() {
        let center = MapType::Polus.meeting_spawn_center() + Vector2::new(0.0, SPAWN_Y_OFFSET);
        for slot in 0..5 {
            let pos = MapType::Polus.spawn_location(slot, 5, false);
            let radius = (pos - center).length();
            assert!((radius - 1.0).abs() < 1e-4);
        }
    }
}
