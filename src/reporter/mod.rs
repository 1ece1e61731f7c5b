//! Periodic measurement reporting

mod periodic;
mod sensor;

pub use periodic::{PeriodicReporter, ReporterHandle};
pub use sensor::{MeasurementRange, SimulatedSensor};
