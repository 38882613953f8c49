use std::ops::RangeInclusive;

use four_cc::FourCC;

use super::{Parameter, ParameterScaling, ParameterType, ParameterValueUpdate};
use crate::Error;

// -------------------------------------------------------------------------------------------------

/// A continuous (float) parameter descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatParameter {
    id: FourCC,
    name: &'static str,
    range: RangeInclusive<f32>,
    default: f32,
    scaling: ParameterScaling,
    unit: &'static str,
}

impl FloatParameter {
    /// Create a new float parameter descriptor.
    pub const fn new(
        id: FourCC,
        name: &'static str,
        range: RangeInclusive<f32>,
        default: f32,
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
            scaling: ParameterScaling::Linear,
            unit: "",
        }
    }

    /// Optional scaling applied when converting from and to normalized values.
    pub const fn with_scaling(mut self, scaling: ParameterScaling) -> Self {
        scaling.validate();
        self.scaling = scaling;
        self
    }

    /// Optional unit for string displays.
    pub const fn with_unit(mut self, unit: &'static str) -> Self {
        self.unit = unit;
        self
    }

    /// The parameter's value range.
    pub fn range(&self) -> &RangeInclusive<f32> {
        &self.range
    }

    /// The parameter's default value.
    pub fn default_value(&self) -> f32 {
        self.default
    }

    /// The parameter's unit, if any.
    pub fn unit(&self) -> &'static str {
        self.unit
    }

    /// Clamp the given plain value to the parameter's range.
    pub fn clamp_value(&self, value: f32) -> f32 {
        if value.is_nan() {
            return self.default;
        }
        value.clamp(*self.range.start(), *self.range.end())
    }

    /// Normalize the given plain value to a 0.0-1.0 range.
    pub fn normalize_value(&self, value: f32) -> f32 {
        let (start, end) = (*self.range.start(), *self.range.end());
        let linear = ((self.clamp_value(value) - start) / (end - start)).clamp(0.0, 1.0);
        self.scaling.unscale(linear)
    }

    /// Denormalize a 0.0-1.0 ranged value to the corresponding plain value.
    pub fn denormalize_value(&self, normalized: f32) -> f32 {
        let (start, end) = (*self.range.start(), *self.range.end());
        start + self.scaling.scale(normalized.clamp(0.0, 1.0)) * (end - start)
    }

    /// Resolve a parameter update into a plain, clamped value.
    pub fn value_from_update(&self, update: &ParameterValueUpdate) -> Result<f32, Error> {
        match update {
            ParameterValueUpdate::Normalized(normalized) => {
                Ok(self.denormalize_value(*normalized))
            }
            ParameterValueUpdate::Raw(raw) => {
                if let Some(value) = raw.downcast_ref::<f32>() {
                    Ok(self.clamp_value(*value))
                } else if let Some(value) = raw.downcast_ref::<f64>() {
                    Ok(self.clamp_value(*value as f32))
                } else {
                    Err(Error::ParameterError(format!(
                        "Unsupported payload type for float parameter '{}'",
                        self.name
                    )))
                }
            }
        }
    }

    /// Convert the given plain value to a string.
    pub fn value_to_string(&self, value: f32, include_unit: bool) -> String {
        if include_unit && !self.unit.is_empty() {
            format!("{:.2} {}", value, self.unit)
        } else {
            format!("{:.2}", value)
        }
    }

    /// Convert the given string to a plain, clamped value.
    pub fn string_to_value(&self, string: &str) -> Option<f32> {
        let value = string
            .trim()
            .trim_end_matches(self.unit)
            .trim()
            .parse::<f32>()
            .ok()?;
        Some(self.clamp_value(value))
    }
}

impl Parameter for FloatParameter {
    fn id(&self) -> FourCC {
        self.id
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn parameter_type(&self) -> ParameterType {
        ParameterType::Float {
            range: self.range.clone(),
            default: self.default,
        }
    }

    fn default_normalized_value(&self) -> f32 {
        self.normalize_value(self.default)
    }

    fn normalized_value_to_string(&self, normalized: f32, include_unit: bool) -> String {
        self.value_to_string(self.denormalize_value(normalized), include_unit)
    }

    fn string_to_normalized_value(&self, string: &str) -> Option<f32> {
        let value = self.string_to_value(string)?;
        Some(self.normalize_value(value))
    }
}

// -------------------------------------------------------------------------------------------------
