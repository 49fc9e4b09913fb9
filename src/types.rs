//! Core data types for pipetune
//!
//! This module contains the textual pipeline model the search operates on.
//!
//! # Main Types
//!
//! - [`Stage`] - One processing unit: a kind name plus ordered properties
//! - [`PipelineDescriptor`] - Ordered stages, parsed from and serialized to a `!`-joined string
//! - [`Suggestion`] - One alternative for a stage position (a single stage or a run of stages)
//! - [`SuggestionSet`] - Per-position alternative lists whose head is the current stage
//! - [`Combinations`] - Deterministic cartesian product over a [`SuggestionSet`]
//!
//! # Text Format
//!
//! Stages are separated by [`CONNECTOR`]. Inside a stage the first word is the
//! stage kind and every following word is either `key=value` or a bare word.
//! Double quotes group text so that whitespace and connectors inside a quoted
//! value are not treated as separators. Serialization is canonical: one space
//! between words and `" ! "` between stages, so `parse(serialize(p)) == p`.

use crate::error::{AutotuneError, Result};
use std::fmt;
use std::str::FromStr;

/// Token separating stages in a serialized pipeline
pub const CONNECTOR: char = '!';

/// One `key=value` (or bare `key`) word of a stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageProperty {
    pub key: String,
    pub value: Option<String>,
}

impl fmt::Display for StageProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={}", self.key, value),
            None => write!(f, "{}", self.key),
        }
    }
}

/// A configurable unit of work in a pipeline
///
/// Property order is preserved so that changing one key and serializing again
/// produces a minimal diff against the original token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    name: String,
    properties: Vec<StageProperty>,
}

impl Stage {
    /// Create a stage without properties
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
        }
    }

    /// Builder-style property setter
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Parse a single stage token such as `gvadetect model=m.xml device=GPU`
    pub fn parse(token: &str) -> Result<Self> {
        let words = split_unquoted(token, char::is_whitespace)?;
        let mut words = words.into_iter().filter(|w| !w.is_empty());
        let name = words
            .next()
            .ok_or_else(|| AutotuneError::InvalidPipeline("empty stage".to_string()))?;

        let properties = words
            .map(|word| match word.split_once('=') {
                Some((key, value)) => StageProperty {
                    key: key.to_string(),
                    value: Some(value.to_string()),
                },
                None => StageProperty {
                    key: word.to_string(),
                    value: None,
                },
            })
            .collect();

        Ok(Self {
            name: name.to_string(),
            properties,
        })
    }

    /// Stage kind (the first word of the token)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Properties in declaration order
    pub fn properties(&self) -> &[StageProperty] {
        &self.properties
    }

    /// Value of a `key=value` property
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.key == key)
            .and_then(|p| p.value.as_deref())
    }

    /// Set a property in place, appending it if the key is new
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = Some(value.into());
        match self.properties.iter_mut().find(|p| p.key == key) {
            Some(existing) => existing.value = value,
            None => self.properties.push(StageProperty { key, value }),
        }
    }

    /// Whether this stage is one of the given kinds
    pub fn is_any_of<S: AsRef<str>>(&self, kinds: &[S]) -> bool {
        kinds.iter().any(|k| k.as_ref() == self.name)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for property in &self.properties {
            write!(f, " {}", property)?;
        }
        Ok(())
    }
}

impl FromStr for Stage {
    type Err = AutotuneError;

    fn from_str(s: &str) -> Result<Self> {
        Stage::parse(s)
    }
}

/// Ordered sequence of stages forming one pipeline
///
/// Stage kinds are positions, not identifiers: the same kind may appear
/// several times.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PipelineDescriptor {
    stages: Vec<Stage>,
}

impl PipelineDescriptor {
    pub fn from_stages(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// Parse a `!`-separated pipeline description
    pub fn parse(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Err(AutotuneError::InvalidPipeline(
                "pipeline text is empty".to_string(),
            ));
        }

        let stages = split_unquoted(text, |c| c == CONNECTOR)?
            .into_iter()
            .enumerate()
            .map(|(position, token)| {
                if token.trim().is_empty() {
                    return Err(AutotuneError::InvalidPipeline(format!(
                        "empty stage at position {}",
                        position
                    )));
                }
                Stage::parse(token)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { stages })
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn into_stages(self) -> Vec<Stage> {
        self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&Stage> {
        self.stages.get(position)
    }

    pub fn insert(&mut self, position: usize, stage: Stage) {
        self.stages.insert(position, stage);
    }

    /// Positions of all stages of the given kinds, in pipeline order
    pub fn positions_of<S: AsRef<str>>(&self, kinds: &[S]) -> Vec<usize> {
        self.stages
            .iter()
            .enumerate()
            .filter(|(_, stage)| stage.is_any_of(kinds))
            .map(|(i, _)| i)
            .collect()
    }

    /// Position of the last stage of the given kinds
    pub fn last_position_of<S: AsRef<str>>(&self, kinds: &[S]) -> Option<usize> {
        self.stages.iter().rposition(|stage| stage.is_any_of(kinds))
    }
}

impl fmt::Display for PipelineDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stage) in self.stages.iter().enumerate() {
            if i > 0 {
                write!(f, " {} ", CONNECTOR)?;
            }
            write!(f, "{}", stage)?;
        }
        Ok(())
    }
}

impl FromStr for PipelineDescriptor {
    type Err = AutotuneError;

    fn from_str(s: &str) -> Result<Self> {
        PipelineDescriptor::parse(s)
    }
}

/// Split `text` at every separator character that is not inside double quotes.
fn split_unquoted(text: &str, is_separator: impl Fn(char) -> bool) -> Result<Vec<&str>> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' => in_quotes = !in_quotes,
            c if !in_quotes && is_separator(c) => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }

    if in_quotes {
        return Err(AutotuneError::InvalidPipeline(format!(
            "unterminated quote in `{}`",
            text.trim()
        )));
    }

    parts.push(&text[start..]);
    Ok(parts)
}

/// One alternative configuration for a stage position
///
/// A suggestion may expand to more than one stage (for example a filter stage
/// inserted in front of a reconfigured stage). Reassembly always flattens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Suggestion {
    Single(Stage),
    Sequence(Vec<Stage>),
}

impl Suggestion {
    pub fn stages(&self) -> &[Stage] {
        match self {
            Suggestion::Single(stage) => std::slice::from_ref(stage),
            Suggestion::Sequence(stages) => stages,
        }
    }
}

impl From<Stage> for Suggestion {
    fn from(stage: Stage) -> Self {
        Suggestion::Single(stage)
    }
}

impl fmt::Display for Suggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = PipelineDescriptor::from_stages(self.stages().to_vec());
        write!(f, "{}", text)
    }
}

/// Alternatives for every position of a pipeline
///
/// Every list is non-empty and its head is the pipeline's current stage at
/// that position, so the identity configuration is always the first member of
/// [`SuggestionSet::combinations`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionSet {
    positions: Vec<Vec<Suggestion>>,
}

impl SuggestionSet {
    /// A set containing only the current pipeline
    pub fn identity(pipeline: &PipelineDescriptor) -> Self {
        Self {
            positions: pipeline
                .stages()
                .iter()
                .map(|stage| vec![Suggestion::Single(stage.clone())])
                .collect(),
        }
    }

    /// The current (head) stage at a position
    pub fn current(&self, position: usize) -> Option<&Stage> {
        self.positions
            .get(position)
            .and_then(|list| list.first())
            .and_then(|head| head.stages().first())
    }

    /// Append an alternative for a position; out-of-range positions are ignored
    pub fn push(&mut self, position: usize, suggestion: impl Into<Suggestion>) {
        match self.positions.get_mut(position) {
            Some(list) => list.push(suggestion.into()),
            None => tracing::warn!(position, "Dropping suggestion for unknown position"),
        }
    }

    /// Number of positions (equals the pipeline's stage count)
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// All entries for a position, head first
    pub fn entries(&self, position: usize) -> &[Suggestion] {
        self.positions.get(position).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Entries after the head for a position
    pub fn alternatives(&self, position: usize) -> &[Suggestion] {
        self.entries(position).get(1..).unwrap_or(&[])
    }

    /// Size of the cartesian product (saturating)
    pub fn combination_count(&self) -> u128 {
        self.positions
            .iter()
            .fold(1u128, |acc, list| acc.saturating_mul(list.len() as u128))
    }

    /// Iterate the cartesian product; position 0 varies slowest
    pub fn combinations(&self) -> Combinations<'_> {
        Combinations {
            set: self,
            indices: vec![0; self.positions.len()],
            done: self.positions.iter().any(Vec::is_empty),
        }
    }
}

/// Odometer over a [`SuggestionSet`], yielding flattened pipelines
pub struct Combinations<'a> {
    set: &'a SuggestionSet,
    indices: Vec<usize>,
    done: bool,
}

impl Combinations<'_> {
    fn assemble(&self) -> PipelineDescriptor {
        let stages = self
            .indices
            .iter()
            .zip(&self.set.positions)
            .flat_map(|(&i, list)| list[i].stages().iter().cloned())
            .collect();
        PipelineDescriptor::from_stages(stages)
    }

    fn advance(&mut self) {
        for (index, list) in self.indices.iter_mut().zip(&self.set.positions).rev() {
            *index += 1;
            if *index < list.len() {
                return;
            }
            *index = 0;
        }
        self.done = true;
    }
}

impl Iterator for Combinations<'_> {
    type Item = PipelineDescriptor;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let pipeline = self.assemble();
        self.advance();
        Some(pipeline)
    }
}
