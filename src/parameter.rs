//! Parameter descriptors and value updates for the granular engine's configuration surface.

use std::{any::Any, fmt::Debug, ops::RangeInclusive};

use four_cc::FourCC;

// -------------------------------------------------------------------------------------------------

/// Describes the type of a [`Parameter`] to e.g. select a proper visual representation in a UI.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterType {
    /// A continuous floating-point value.
    Float {
        range: RangeInclusive<f32>,
        default: f32,
    },
    /// A discrete integer value.
    Integer {
        range: RangeInclusive<i32>,
        default: i32,
    },
    /// A choice from a list of strings (an enum).
    Enum {
        values: Vec<String>,
        default_index: usize,
    },
}

// -------------------------------------------------------------------------------------------------

/// Describes a single parameter of the [`GranularParameters`](crate::GranularParameters) for use
/// in UIs or for automation.
pub trait Parameter: Debug + Send + Sync {
    /// The unique id of the parameter.
    fn id(&self) -> FourCC;

    /// The name of the parameter.
    fn name(&self) -> &'static str;

    /// The parameter type.
    fn parameter_type(&self) -> ParameterType;

    /// Default value of parameter, expressed as normalized floating point value in range \[0,1\].
    fn default_normalized_value(&self) -> f32;

    /// Convert the given normalized floating point value to a string value.
    fn normalized_value_to_string(&self, normalized: f32, include_unit: bool) -> String;

    /// Convert the given string value to a normalized floating point value.
    /// Returns `None` when conversion failed, else a valid normalized value.
    fn string_to_normalized_value(&self, string: &str) -> Option<f32>;

    /// Wrap the parameter descriptor into a boxed dyn Parameter.
    fn into_box(self) -> Box<dyn Parameter>
    where
        Self: Sized + 'static,
    {
        Box::new(self)
    }
}

// -------------------------------------------------------------------------------------------------

/// An update for a [`Parameter`]'s value, applied to a parameter snapshot by parameter id.
#[derive(Debug)]
pub enum ParameterValueUpdate {
    /// Raw, type-erased internal value (f32, i32 or some Enum).
    Raw(Box<dyn Any + Send + Sync>),
    /// A float value in range `0.0..=1.0`.
    Normalized(f32),
}

// -------------------------------------------------------------------------------------------------

mod float;
pub use float::FloatParameter;

mod integer;
pub use integer::IntegerParameter;

mod r#enum;
pub use r#enum::EnumParameter;

mod scaling;
pub use scaling::ParameterScaling;
