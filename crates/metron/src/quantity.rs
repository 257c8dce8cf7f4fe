//! The value-with-unit convenience layer.

use std::{fmt, time::Duration};

use crate::{error::UnitResult, system::UnitSystem, units::Unit};

/// A numeric value tagged with its unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Quantity {
    pub value: f64,
    pub unit: Unit,
}

impl Quantity {
    pub fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }

    /// The same quantity expressed in `target`. Errors iff the units are
    /// not commensurable.
    pub fn convert_to(&self, target: &Unit) -> UnitResult<Self> {
        Ok(Self {
            value: self.unit.convert(self.value, target)?,
            unit: target.clone(),
        })
    }

    /// Interprets the quantity as a span of time against `system`'s second.
    ///
    /// Errors when the unit is not commensurable with seconds or the
    /// converted value is negative or not finite.
    pub fn to_duration(&self, system: &UnitSystem) -> UnitResult<Duration> {
        let seconds = system.unit("s")?;
        self.unit.duration(self.value, &seconds)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}
