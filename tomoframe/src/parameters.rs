//! Stage parameter expansion.
//!
//! A stage parameter whose value is a `;`-delimited list of more than one
//! item is a *swept* parameter: the stage runs over the cross product of all
//! swept values and each swept parameter contributes one extra output
//! dimension, in parameter-declaration order. `iterations = "1;2;3"` with
//! `method = "FBP;CGLS"` therefore appends dimensions of extent 3 and 2 to
//! every output dataset of the stage.

use std::fmt::Display;

use itertools::Itertools;
use thiserror::Error;

use crate::dataset::Configuration;

/// A malformed parameter list error.
#[derive(Clone, Debug, Error)]
#[error("parameter {name} has a malformed list value: {value}")]
pub struct AmbiguousExpansionError {
    /// The parameter name.
    pub name: String,
    /// The offending raw value.
    pub value: String,
}

/// A parsed parameter value.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    /// An integer value.
    Int(i64),
    /// A floating point value.
    Float(f64),
    /// Anything else, kept verbatim.
    Str(String),
}

impl ParamValue {
    /// Parse a raw item with the singleton type-inference rule: integer if it
    /// parses as one, else float, else string.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Ok(int) = raw.parse::<i64>() {
            Self::Int(int)
        } else if let Ok(float) = raw.parse::<f64>() {
            Self::Float(float)
        } else {
            Self::Str(raw.to_string())
        }
    }

    fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Number(number) => {
                if let Some(int) = number.as_i64() {
                    Self::Int(int)
                } else {
                    Self::Float(number.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(string) => Self::parse(string),
            other => Self::Str(other.to_string()),
        }
    }
}

impl Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(int) => int.fmt(f),
            Self::Float(float) => float.fmt(f),
            Self::Str(string) => string.fmt(f),
        }
    }
}

/// The result of expanding a stage's parameters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Expansion {
    parameters: Vec<(String, Vec<ParamValue>)>,
    varied: Vec<String>,
    extra_dims: Vec<u64>,
}

impl Expansion {
    /// Return the values of parameter `name`: a single element unless the
    /// parameter is swept.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[ParamValue]> {
        self.parameters
            .iter()
            .find(|(parameter, _)| parameter == name)
            .map(|(_, values)| values.as_slice())
    }

    /// Return the names of the swept parameters, in declaration order.
    #[must_use]
    pub fn varied(&self) -> &[String] {
        &self.varied
    }

    /// Return the extra output dimensions, one per swept parameter in
    /// declaration order.
    #[must_use]
    pub fn extra_dims(&self) -> &[u64] {
        &self.extra_dims
    }

    /// Returns true if any parameter is swept.
    #[must_use]
    pub fn is_swept(&self) -> bool {
        !self.varied.is_empty()
    }

    /// Iterate every combination of swept parameter values as
    /// extra-dimension indices, slowest-declared parameter varying slowest.
    ///
    /// Yields a single empty combination when nothing is swept.
    pub fn combinations(&self) -> impl Iterator<Item = Vec<u64>> + '_ {
        if self.extra_dims.is_empty() {
            itertools::Either::Left(std::iter::once(Vec::new()))
        } else {
            itertools::Either::Right(
                self.extra_dims
                    .iter()
                    .map(|&extent| 0..extent)
                    .multi_cartesian_product(),
            )
        }
    }

    /// Select the swept parameter values at the given extra-dimension
    /// indices, in declaration order.
    ///
    /// Returns [`None`] if `indices` does not match the number of swept
    /// parameters or any index is out of range.
    #[must_use]
    pub fn select(&self, indices: &[u64]) -> Option<Vec<(&str, &ParamValue)>> {
        if indices.len() != self.varied.len() {
            return None;
        }
        std::iter::zip(&self.varied, indices)
            .map(|(name, &index)| {
                let values = self.get(name)?;
                let value = values.get(usize::try_from(index).ok()?)?;
                Some((name.as_str(), value))
            })
            .collect()
    }
}

/// Expand a stage's raw parameters, computing the swept-value lists and the
/// extra output dimensions.
///
/// String values split on `;` at the top bracket level; every parameter with
/// more than one item becomes swept. Non-string values pass through as
/// singletons.
///
/// # Errors
/// Returns [`AmbiguousExpansionError`] if a value has unbalanced bracket
/// nesting.
pub fn expand(parameters: &Configuration) -> Result<Expansion, AmbiguousExpansionError> {
    let mut expansion = Expansion::default();
    for (name, value) in parameters {
        let values = match value {
            serde_json::Value::String(raw) => {
                let items = split_list(raw).map_err(|()| AmbiguousExpansionError {
                    name: name.clone(),
                    value: raw.clone(),
                })?;
                items.into_iter().map(ParamValue::parse).collect::<Vec<_>>()
            }
            other => vec![ParamValue::from_json(other)],
        };
        if values.len() > 1 {
            expansion.varied.push(name.clone());
            expansion.extra_dims.push(values.len() as u64);
        }
        expansion.parameters.push((name.clone(), values));
    }
    Ok(expansion)
}

/// Split `raw` on `;` at the top bracket level.
///
/// Errors on unbalanced `[`/`(` nesting.
fn split_list(raw: &str) -> Result<Vec<&str>, ()> {
    let mut items = Vec::new();
    let mut depth = 0i32;
    let mut item_start = 0;
    for (position, character) in raw.char_indices() {
        match character {
            '[' | '(' => depth += 1,
            ']' | ')' => {
                depth -= 1;
                if depth < 0 {
                    return Err(());
                }
            }
            ';' if depth == 0 => {
                items.push(&raw[item_start..position]);
                item_start = position + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(());
    }
    items.push(&raw[item_start..]);
    Ok(items)
}
