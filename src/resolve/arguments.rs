//! Maps a sample's attributes onto a pipeline's declared flags.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ResolutionFailure;
use crate::interface::{ArgumentSpec, PipelineSpec};

/// One emitted flag, with its value unless the flag is a bare switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgPair {
    pub flag: String,
    pub value: Option<String>,
}

impl ArgPair {
    pub fn new(flag: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            flag: flag.into(),
            value: Some(value.into()),
        }
    }

    pub fn switch(flag: impl Into<String>) -> Self {
        Self {
            flag: flag.into(),
            value: None,
        }
    }
}

impl fmt::Display for ArgPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{} {}", self.flag, value),
            None => write!(f, "{}", self.flag),
        }
    }
}

/// Resolves the ordered argument vector for `spec` from `attributes`.
///
/// Required arguments come first, then optional ones, each group in
/// declaration order. Value-less flags are always emitted.
///
/// # Errors
///
/// Returns `MissingRequiredAttribute` for the first required argument whose
/// attribute the sample lacks.
pub fn resolve_arguments(
    spec: &PipelineSpec,
    attributes: &BTreeMap<String, String>,
) -> Result<Vec<ArgPair>, ResolutionFailure> {
    let mut argv = Vec::with_capacity(spec.arguments.len() + spec.optional_arguments.len());

    for arg in &spec.arguments {
        match lookup(arg, attributes) {
            Lookup::Switch => argv.push(ArgPair::switch(&arg.flag)),
            Lookup::Value(value) => argv.push(ArgPair::new(&arg.flag, value)),
            Lookup::Missing(attribute) => {
                return Err(ResolutionFailure::MissingRequiredAttribute {
                    flag: arg.flag.clone(),
                    attribute: attribute.to_string(),
                })
            }
        }
    }

    for arg in &spec.optional_arguments {
        match lookup(arg, attributes) {
            Lookup::Switch => argv.push(ArgPair::switch(&arg.flag)),
            Lookup::Value(value) => argv.push(ArgPair::new(&arg.flag, value)),
            Lookup::Missing(_) => {}
        }
    }

    Ok(argv)
}

enum Lookup<'a> {
    Switch,
    Value(&'a str),
    Missing(&'a str),
}

fn lookup<'a>(arg: &'a ArgumentSpec, attributes: &'a BTreeMap<String, String>) -> Lookup<'a> {
    match &arg.attribute {
        None => Lookup::Switch,
        Some(attribute) => match attributes.get(attribute) {
            Some(value) => Lookup::Value(value),
            None => Lookup::Missing(attribute),
        },
    }
}
