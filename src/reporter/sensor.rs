//! Simulated sensor standing in for real device readings

use rand::Rng;

/// Inclusive range of simulated readings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasurementRange {
    pub min: i64,
    pub max: i64,
}

impl MeasurementRange {
    pub fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: i64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

impl Default for MeasurementRange {
    fn default() -> Self {
        Self::new(
            c8y_smartrest::defaults::MEASUREMENT_MIN,
            c8y_smartrest::defaults::MEASUREMENT_MAX,
        )
    }
}

/// Draws readings uniformly from its range
#[derive(Debug, Clone)]
pub struct SimulatedSensor {
    range: MeasurementRange,
}

impl SimulatedSensor {
    pub fn new(range: MeasurementRange) -> Self {
        Self { range }
    }

    /// Take one reading.
    ///
    /// An inverted range yields `min`; configuration validation rejects it
    /// before the agent starts.
    pub fn read(&self) -> i64 {
        if self.range.min >= self.range.max {
            return self.range.min;
        }
        rand::thread_rng().gen_range(self.range.min..=self.range.max)
    }
}
