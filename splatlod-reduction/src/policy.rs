//! Per-attribute aggregation policy for voxel merging

use serde::{Deserialize, Serialize};
use splatlod_core::{AttributeDef, Error, Schema};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// How the values of one attribute are combined across a voxel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reducer {
    /// Arithmetic mean, accumulated in `f64`. Lists are averaged element-wise.
    Mean,
    /// Value of the earliest-indexed member of the voxel.
    First,
    /// Most frequent value; ties go to the value seen first.
    Mode,
}

impl fmt::Display for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Reducer::Mean => "mean",
            Reducer::First => "first",
            Reducer::Mode => "mode",
        };
        f.write_str(name)
    }
}

impl FromStr for Reducer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mean" => Ok(Reducer::Mean),
            "first" => Ok(Reducer::First),
            "mode" => Ok(Reducer::Mode),
            other => Err(Error::InvalidParameter(format!(
                "unknown reducer '{}', expected mean, first or mode",
                other
            ))),
        }
    }
}

/// Chooses a [`Reducer`] for every attribute of a schema.
///
/// The default averages numeric attributes and keeps the earliest-indexed
/// member's value for everything else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AggregationPolicy {
    /// Reducer for scalar attributes
    pub numeric: Reducer,
    /// Reducer for list and other non-numeric attributes
    pub other: Reducer,
    /// Reducers for specific attribute names, taking precedence over the above
    pub overrides: BTreeMap<String, Reducer>,
}

impl Default for AggregationPolicy {
    fn default() -> Self {
        Self {
            numeric: Reducer::Mean,
            other: Reducer::First,
            overrides: BTreeMap::new(),
        }
    }
}

impl AggregationPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_numeric(mut self, reducer: Reducer) -> Self {
        self.numeric = reducer;
        self
    }

    pub fn with_other(mut self, reducer: Reducer) -> Self {
        self.other = reducer;
        self
    }

    pub fn with_override(mut self, name: impl Into<String>, reducer: Reducer) -> Self {
        self.overrides.insert(name.into(), reducer);
        self
    }

    pub fn reducer_for(&self, attr: &AttributeDef) -> Reducer {
        if let Some(reducer) = self.overrides.get(&attr.name) {
            return *reducer;
        }
        if attr.ty.is_numeric() {
            self.numeric
        } else {
            self.other
        }
    }

    /// One reducer per schema column, in schema order
    pub fn resolve(&self, schema: &Schema) -> Vec<Reducer> {
        schema
            .attributes()
            .iter()
            .map(|attr| self.reducer_for(attr))
            .collect()
    }
}
