/// Distance → level → volume conversion.

use crate::model::TankSnapshot;

/// Level and volume derived from one averaged distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Level {
    pub water_level_cm: f32,
    pub volume: f32,
}

/// Fixed geometry of the tank and where the transducer is mounted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TankGeometry {
    pub sensor_height_cm: f32,
    pub tank_height_cm: f32,
    pub tank_capacity: f32,
}

impl Default for TankGeometry {
    fn default() -> Self {
        Self {
            sensor_height_cm: 200.0,
            tank_height_cm: 183.0,
            tank_capacity: 1550.0,
        }
    }
}

impl TankGeometry {
    /// Clamp the liquid column to the tank before deriving the volume, so
    /// level and volume always agree.
    pub fn convert(&self, distance_cm: f32) -> Level {
        let water_level_cm = (self.sensor_height_cm - distance_cm).clamp(0.0, self.tank_height_cm);
        Level {
            water_level_cm,
            volume: self.volume_at(water_level_cm),
        }
    }

    /// Volume of a (clamped) liquid column; linear in height.
    pub fn volume_at(&self, water_level_cm: f32) -> f32 {
        (water_level_cm / self.tank_height_cm) * self.tank_capacity
    }

    /// Build a snapshot from a distance plus the readings taken alongside it.
    pub fn snapshot(
        &self,
        distance_cm: f32,
        battery_voltage_volts: Option<f32>,
        signal_strength: i32,
        timestamp_ms: u32,
    ) -> TankSnapshot {
        let level = self.convert(distance_cm);
        TankSnapshot {
            raw_distance_cm: distance_cm,
            water_level_cm: level.water_level_cm,
            volume_units: level.volume,
            battery_voltage_volts,
            signal_strength,
            timestamp_ms,
        }
    }
}
