use std::str::FromStr;

use four_cc::FourCC;

use super::{Parameter, ParameterType, ParameterValueUpdate};
use crate::Error;

// -------------------------------------------------------------------------------------------------

/// An enum parameter descriptor. Values usually are the `VARIANTS` of a `strum::VariantNames`
/// enum, so updates can be parsed back into the enum via `FromStr`.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumParameter {
    id: FourCC,
    name: &'static str,
    values: &'static [&'static str],
    default_index: usize,
}

impl EnumParameter {
    /// Create a new enum parameter descriptor.
    pub const fn new(
        id: FourCC,
        name: &'static str,
        values: &'static [&'static str],
        default_index: usize,
    ) -> Self {
        assert!(!values.is_empty(), "Enum parameters need at least one value");
        assert!(
            default_index < values.len(),
            "Invalid parameter default value"
        );
        Self {
            id,
            name,
            values,
            default_index,
        }
    }

    pub fn values(&self) -> &'static [&'static str] {
        self.values
    }

    pub fn default_value(&self) -> &'static str {
        self.values[self.default_index]
    }

    pub fn normalize_index(&self, index: usize) -> f32 {
        if self.values.len() <= 1 {
            return 0.0;
        }
        index.min(self.values.len() - 1) as f32 / (self.values.len() - 1) as f32
    }

    pub fn denormalize_index(&self, normalized: f32) -> usize {
        (normalized.clamp(0.0, 1.0) * (self.values.len() - 1) as f32).round() as usize
    }

    /// Resolve a parameter update into the given enum type.
    ///
    /// Raw updates may either contain the enum value itself, or a string variant name.
    pub fn value_from_update<T>(&self, update: &ParameterValueUpdate) -> Result<T, Error>
    where
        T: FromStr + Copy + 'static,
    {
        let parse = |value: &str| {
            T::from_str(value).map_err(|_| {
                Error::ParameterError(format!(
                    "Invalid value '{value}' for enum parameter '{}'",
                    self.name
                ))
            })
        };
        match update {
            ParameterValueUpdate::Normalized(normalized) => {
                parse(self.values[self.denormalize_index(*normalized)])
            }
            ParameterValueUpdate::Raw(raw) => {
                if let Some(value) = raw.downcast_ref::<T>() {
                    Ok(*value)
                } else if let Some(value) = raw.downcast_ref::<String>() {
                    parse(value)
                } else if let Some(value) = raw.downcast_ref::<&'static str>() {
                    parse(value)
                } else {
                    Err(Error::ParameterError(format!(
                        "Unsupported payload type for enum parameter '{}'",
                        self.name
                    )))
                }
            }
        }
    }
}

impl Parameter for EnumParameter {
    fn id(&self) -> FourCC {
        self.id
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn parameter_type(&self) -> ParameterType {
        ParameterType::Enum {
            values: self.values.iter().map(|v| v.to_string()).collect(),
            default_index: self.default_index,
        }
    }

    fn default_normalized_value(&self) -> f32 {
        self.normalize_index(self.default_index)
    }

    fn normalized_value_to_string(&self, normalized: f32, _include_unit: bool) -> String {
        self.values[self.denormalize_index(normalized)].to_string()
    }

    fn string_to_normalized_value(&self, string: &str) -> Option<f32> {
        let string = string.trim();
        self.values
            .iter()
            .position(|v| v.eq_ignore_ascii_case(string))
            .map(|index| self.normalize_index(index))
    }
}
