//! Compiled programs and the source markers that bind external inputs.
//!
//! A program refers to a registered sample `amen` through the identifier
//! `sample_amen` (or its metadata, `sample_amen_meta`) and to a performer
//! parameter `cutoff` through `param_cutoff`. Markers are resolved once, when the
//! program is compiled.

use std::collections::BTreeSet;

use crate::error::SynthError;

pub const SAMPLE_PREFIX: &str = "sample_";
pub const SAMPLE_META_SUFFIX: &str = "_meta";
pub const PARAM_PREFIX: &str = "param_";

/// Sample bindings available to one program.
pub const MAX_PROGRAM_SAMPLES: usize = 16;
/// Scalar parameters available to one program.
pub const MAX_PROGRAM_PARAMS: usize = 16;

/// Identifier-like tokens of `source`, in order of appearance.
pub fn identifiers(source: &str) -> impl Iterator<Item = &str> {
    source
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|token| {
            token
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        })
}

/// Sample name a single identifier refers to, if it is a registered sample marker.
pub fn sample_marker<'a>(ident: &'a str, is_registered: impl Fn(&str) -> bool) -> Option<&'a str> {
    let name = ident.strip_prefix(SAMPLE_PREFIX)?;
    if !name.is_empty() && is_registered(name) {
        return Some(name);
    }
    let name = name.strip_suffix(SAMPLE_META_SUFFIX)?;
    (!name.is_empty() && is_registered(name)).then_some(name)
}

/// External inputs a program needs bound on every render.
///
/// Both sets are ordered, and that order is the binding slot order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramInterface {
    pub samples: BTreeSet<String>,
    pub params: BTreeSet<String>,
}

impl ProgramInterface {
    /// Resolve the markers in `source` against the samples registered right now.
    pub fn scan(source: &str, is_registered: impl Fn(&str) -> bool) -> Result<Self, SynthError> {
        let mut interface = Self::default();
        for ident in identifiers(source) {
            if let Some(name) = sample_marker(ident, &is_registered) {
                interface.samples.insert(name.to_string());
            } else if let Some(name) = ident.strip_prefix(PARAM_PREFIX) {
                if !name.is_empty() {
                    interface.params.insert(name.to_string());
                }
            }
        }

        if interface.samples.len() > MAX_PROGRAM_SAMPLES {
            return Err(SynthError::exhausted(format!(
                "program references {} samples, at most {} can be bound",
                interface.samples.len(),
                MAX_PROGRAM_SAMPLES
            )));
        }
        if interface.params.len() > MAX_PROGRAM_PARAMS {
            return Err(SynthError::exhausted(format!(
                "program references {} parameters, at most {} can be bound",
                interface.params.len(),
                MAX_PROGRAM_PARAMS
            )));
        }
        Ok(interface)
    }
}

/// A compiled program. Immutable once constructed.
#[derive(Debug)]
pub struct Program<P> {
    compiled: P,
    source: String,
    interface: ProgramInterface,
}

impl<P> Program<P> {
    pub fn new(compiled: P, source: impl Into<String>, interface: ProgramInterface) -> Self {
        Self {
            compiled,
            source: source.into(),
            interface,
        }
    }

    /// Backend handle.
    pub fn compiled(&self) -> &P {
        &self.compiled
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn interface(&self) -> &ProgramInterface {
        &self.interface
    }

    pub fn required_sample_names(&self) -> &BTreeSet<String> {
        &self.interface.samples
    }

    pub fn param_names(&self) -> &BTreeSet<String> {
        &self.interface.params
    }
}
