use std::ops::RangeInclusive;

use four_cc::FourCC;

use super::{Parameter, ParameterType, ParameterValueUpdate};
use crate::Error;

// -------------------------------------------------------------------------------------------------

/// A discrete integer parameter descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegerParameter {
    id: FourCC,
    name: &'static str,
    range: RangeInclusive<i32>,
    default: i32,
    unit: &'static str,
}

impl IntegerParameter {
    /// Create a new integer parameter descriptor.
    pub const fn new(
        id: FourCC,
        name: &'static str,
        range: RangeInclusive<i32>,
        default: i32,
    ) -> Self {
        assert!(
            default >= *range.start() && default <= *range.end(),
            "Invalid parameter default value"
        );
        Self {
            id,
            name,
            range,
            default,
            unit: "",
        }
    }

    /// Optional unit for string displays.
    pub const fn with_unit(mut self, unit: &'static str) -> Self {
        self.unit = unit;
        self
    }

    pub fn range(&self) -> &RangeInclusive<i32> {
        &self.range
    }

    pub fn default_value(&self) -> i32 {
        self.default
    }

    pub fn clamp_value(&self, value: i32) -> i32 {
        value.clamp(*self.range.start(), *self.range.end())
    }

    pub fn normalize_value(&self, value: i32) -> f32 {
        let (start, end) = (*self.range.start(), *self.range.end());
        if end == start {
            return 0.0;
        }
        (self.clamp_value(value) - start) as f32 / (end - start) as f32
    }

    pub fn denormalize_value(&self, normalized: f32) -> i32 {
        let (start, end) = (*self.range.start(), *self.range.end());
        start + (normalized.clamp(0.0, 1.0) * (end - start) as f32).round() as i32
    }

    /// Resolve a parameter update into a plain, clamped value.
    pub fn value_from_update(&self, update: &ParameterValueUpdate) -> Result<i32, Error> {
        match update {
            ParameterValueUpdate::Normalized(normalized) => {
                Ok(self.denormalize_value(*normalized))
            }
            ParameterValueUpdate::Raw(raw) => {
                if let Some(value) = raw.downcast_ref::<i32>() {
                    Ok(self.clamp_value(*value))
                } else if let Some(value) = raw.downcast_ref::<i64>() {
                    Ok(self.clamp_value((*value).clamp(i32::MIN as i64, i32::MAX as i64) as i32))
                } else if let Some(value) = raw.downcast_ref::<u8>() {
                    Ok(self.clamp_value(*value as i32))
                } else {
                    Err(Error::ParameterError(format!(
                        "Unsupported payload type for integer parameter '{}'",
                        self.name
                    )))
                }
            }
        }
    }
}

impl Parameter for IntegerParameter {
    fn id(&self) -> FourCC {
        self.id
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn parameter_type(&self) -> ParameterType {
        ParameterType::Integer {
            range: self.range.clone(),
            default: self.default,
        }
    }

    fn default_normalized_value(&self) -> f32 {
        self.normalize_value(self.default)
    }

    fn normalized_value_to_string(&self, normalized: f32, include_unit: bool) -> String {
        let value = self.denormalize_value(normalized);
        if include_unit && !self.unit.is_empty() {
            format!("{} {}", value, self.unit)
        } else {
            value.to_string()
        }
    }

    fn string_to_normalized_value(&self, string: &str) -> Option<f32> {
        let value = string
            .trim()
            .trim_end_matches(self.unit)
            .trim()
            .parse::<i32>()
            .ok()?;
        Some(self.normalize_value(value))
    }
}
