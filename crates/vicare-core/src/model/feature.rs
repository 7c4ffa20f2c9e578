// ── Flat features ──

use super::value::FeatureValue;
use crate::constraint::{ParamConstraint, Pattern};

/// A flat, independently addressable sensor or setting.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Globally unique dotted name.
    pub name: String,
    pub value: FeatureValue,
    pub unit: Option<String>,
    pub is_ready: bool,
    pub is_enabled: bool,
    /// Present only when the value can be written back.
    pub control: Option<FeatureControl>,
}

impl Feature {
    pub fn is_writable(&self) -> bool {
        self.control.is_some()
    }
}

/// Links a writable feature to the command parameter it controls.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureControl {
    pub command_name: String,
    pub param_name: String,
    /// Every parameter the command needs, in declaration order.
    /// Always contains `param_name`.
    pub required_params: Vec<String>,
    /// Resource that holds the sibling values.
    pub parent_feature_name: String,
    pub uri: String,
    pub constraint: ParamConstraint,
}

impl FeatureControl {
    pub fn min(&self) -> Option<f64> {
        match self.constraint {
            ParamConstraint::Number { min, .. } => min,
            _ => None,
        }
    }

    pub fn max(&self) -> Option<f64> {
        match self.constraint {
            ParamConstraint::Number { max, .. } => max,
            _ => None,
        }
    }

    pub fn step(&self) -> Option<f64> {
        match self.constraint {
            ParamConstraint::Number { step, .. } => step,
            _ => None,
        }
    }

    pub fn options(&self) -> Option<&[String]> {
        match &self.constraint {
            ParamConstraint::Text { options, .. } => options.as_deref(),
            _ => None,
        }
    }

    pub fn numeric_options(&self) -> Option<&[f64]> {
        match &self.constraint {
            ParamConstraint::Number { options, .. } => options.as_deref(),
            _ => None,
        }
    }

    pub fn pattern(&self) -> Option<&Pattern> {
        match &self.constraint {
            ParamConstraint::Text { pattern, .. } => pattern.as_ref(),
            _ => None,
        }
    }

    pub fn min_length(&self) -> Option<usize> {
        match self.constraint {
            ParamConstraint::Text { min_length, .. } => min_length,
            _ => None,
        }
    }

    pub fn max_length(&self) -> Option<usize> {
        match self.constraint {
            ParamConstraint::Text { max_length, .. } => max_length,
            _ => None,
        }
    }
}
