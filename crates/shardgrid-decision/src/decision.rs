//! Decider verdicts.
//!
//! A [`Decision`] is what one decider (or a chain of them) says about
//! placing a shard on a node: YES, NO or THROTTLE, with the decider's
//! label and a human-readable explanation. A [`Multi`] keeps every child
//! verdict in order and reports the most restrictive one.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::codec::{Readable, StreamInput, StreamOutput, WireEnum, Writeable};
use crate::error::DecisionResult;

/// Outcome of a decider. Variants are ordered by restrictiveness, so the
/// worst of several types is their `max()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionType {
    Yes,
    Throttle,
    No,
}

impl DecisionType {
    pub const ALL: [DecisionType; 3] = [Self::Yes, Self::Throttle, Self::No];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "YES",
            Self::Throttle => "THROTTLE",
            Self::No => "NO",
        }
    }
}

impl fmt::Display for DecisionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl WireEnum for DecisionType {
    const KIND: &'static str = "decision type";

    fn ordinal(self) -> u8 {
        match self {
            Self::Yes => 0,
            Self::Throttle => 1,
            Self::No => 2,
        }
    }

    fn from_ordinal(ordinal: u8) -> Option<Self> {
        Self::ALL.get(usize::from(ordinal)).copied()
    }
}

/// A leaf verdict from one decider.
#[derive(Debug, Clone)]
pub struct Single {
    decision_type: DecisionType,
    label: Option<String>,
    explanation: Option<String>,
}

impl Single {
    pub fn decision_type(&self) -> DecisionType {
        self.decision_type
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }
}

// Explanations compare by their words; whitespace layout is not part of
// a verdict's identity.
fn same_words(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.split_whitespace().eq(b.split_whitespace()),
        _ => false,
    }
}

impl PartialEq for Single {
    fn eq(&self, other: &Self) -> bool {
        self.decision_type == other.decision_type
            && self.label == other.label
            && same_words(self.explanation(), other.explanation())
    }
}

impl Eq for Single {}

impl Hash for Single {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.decision_type.hash(state);
        self.label.hash(state);
        match &self.explanation {
            Some(text) => {
                1u8.hash(state);
                for word in text.split_whitespace() {
                    word.hash(state);
                }
            }
            None => 0u8.hash(state),
        }
    }
}

/// An ordered collection of child verdicts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Multi {
    decisions: Vec<Decision>,
}

impl Multi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, decision: Decision) -> Self {
        self.decisions.push(decision);
        self
    }

    pub fn decisions(&self) -> &[Decision] {
        &self.decisions
    }

    /// NO beats THROTTLE beats YES. An empty multi is YES.
    pub fn decision_type(&self) -> DecisionType {
        self.decisions
            .iter()
            .map(Decision::decision_type)
            .max()
            .unwrap_or(DecisionType::Yes)
    }
}

impl From<Multi> for Decision {
    fn from(multi: Multi) -> Self {
        Decision::Multi(multi)
    }
}

impl FromIterator<Decision> for Multi {
    fn from_iter<I: IntoIterator<Item = Decision>>(iter: I) -> Self {
        Self {
            decisions: iter.into_iter().collect(),
        }
    }
}

/// A decider verdict: either a single decider's answer or a composition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Decision {
    Single(Single),
    Multi(Multi),
}

impl Decision {
    /// Unlabelled YES.
    pub const ALWAYS: Decision = Decision::Single(Single {
        decision_type: DecisionType::Yes,
        label: None,
        explanation: None,
    });

    /// Unlabelled NO.
    pub const NO: Decision = Decision::Single(Single {
        decision_type: DecisionType::No,
        label: None,
        explanation: None,
    });

    /// Unlabelled THROTTLE.
    pub const THROTTLE: Decision = Decision::Single(Single {
        decision_type: DecisionType::Throttle,
        label: None,
        explanation: None,
    });

    /// Build a leaf verdict. Format the explanation at the call site.
    pub fn single(
        decision_type: DecisionType,
        label: impl Into<String>,
        explanation: impl Into<String>,
    ) -> Self {
        Decision::Single(Single {
            decision_type,
            label: Some(label.into()),
            explanation: Some(explanation.into()),
        })
    }

    pub fn yes(label: impl Into<String>, explanation: impl Into<String>) -> Self {
        Self::single(DecisionType::Yes, label, explanation)
    }

    pub fn no(label: impl Into<String>, explanation: impl Into<String>) -> Self {
        Self::single(DecisionType::No, label, explanation)
    }

    pub fn throttle(label: impl Into<String>, explanation: impl Into<String>) -> Self {
        Self::single(DecisionType::Throttle, label, explanation)
    }

    pub fn multi(decisions: impl IntoIterator<Item = Decision>) -> Self {
        Decision::Multi(decisions.into_iter().collect())
    }

    pub fn decision_type(&self) -> DecisionType {
        match self {
            Decision::Single(s) => s.decision_type,
            Decision::Multi(m) => m.decision_type(),
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            Decision::Single(s) => s.label(),
            Decision::Multi(_) => None,
        }
    }

    pub fn explanation(&self) -> Option<&str> {
        match self {
            Decision::Single(s) => s.explanation(),
            Decision::Multi(_) => None,
        }
    }

    /// All leaf verdicts, depth-first in insertion order.
    pub fn leaves(&self) -> Vec<&Single> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Single>) {
        match self {
            Decision::Single(s) => out.push(s),
            Decision::Multi(m) => {
                for d in &m.decisions {
                    d.collect_leaves(out);
                }
            }
        }
    }

    /// Leaves with the given type, e.g. every decider that said NO.
    pub fn leaves_of_type(&self, decision_type: DecisionType) -> Vec<&Single> {
        self.leaves()
            .into_iter()
            .filter(|s| s.decision_type == decision_type)
            .collect()
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Single(s) => {
                write!(f, "{}", s.decision_type)?;
                if let Some(label) = &s.label {
                    write!(f, "({label})")?;
                }
                if let Some(explanation) = &s.explanation {
                    write!(f, ": {explanation}")?;
                }
                Ok(())
            }
            Decision::Multi(m) => {
                for (i, d) in m.decisions.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "[{d}]")?;
                }
                Ok(())
            }
        }
    }
}

impl Writeable for Decision {
    fn write_to(&self, out: &mut StreamOutput) {
        match self {
            Decision::Single(s) => {
                out.write_bool(false);
                out.write_enum(s.decision_type);
                out.write_optional_string(s.label.as_deref());
                out.write_optional_string(s.explanation.as_deref());
            }
            Decision::Multi(m) => {
                out.write_bool(true);
                out.write_list(&m.decisions);
            }
        }
    }
}

impl Readable for Decision {
    fn read_from(input: &mut StreamInput<'_>) -> DecisionResult<Self> {
        if input.read_bool()? {
            input.enter_nested()?;
            let decisions = input.read_list();
            input.exit_nested();
            Ok(Decision::Multi(Multi {
                decisions: decisions?,
            }))
        } else {
            Ok(Decision::Single(Single {
                decision_type: input.read_enum()?,
                label: input.read_optional_string()?,
                explanation: input.read_optional_string()?,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(d: &Decision) -> u64 {
        let mut h = DefaultHasher::new();
        d.hash(&mut h);
        h.finish()
    }

    #[test]
    fn multi_no_wins() {
        let d = Decision::multi([
            Decision::yes("a", ""),
            Decision::throttle("b", ""),
            Decision::no("c", ""),
        ]);
        assert_eq!(d.decision_type(), DecisionType::No);
    }

    #[test]
    fn multi_throttle_beats_yes() {
        let d = Multi::new()
            .add(Decision::yes("a", ""))
            .add(Decision::throttle("b", ""));
        assert_eq!(d.decision_type(), DecisionType::Throttle);
    }

    #[test]
    fn empty_multi_is_yes() {
        assert_eq!(Decision::multi([]).decision_type(), DecisionType::Yes);
    }

    #[test]
    fn nested_multi_reduces_through_levels() {
        let inner = Decision::multi([Decision::yes("a", ""), Decision::no("b", "")]);
        let outer = Decision::multi([Decision::yes("c", ""), inner]);
        assert_eq!(outer.decision_type(), DecisionType::No);
    }

    #[test]
    fn equality_ignores_whitespace_layout() {
        let a = Decision::no("disk", "node is above the   high watermark");
        let b = Decision::no("disk", " node is above the high\nwatermark ");
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn equality_respects_type_and_label() {
        assert_ne!(Decision::no("disk", "x"), Decision::throttle("disk", "x"));
        assert_ne!(Decision::no("disk", "x"), Decision::no("filter", "x"));
        assert_ne!(Decision::no("disk", "x"), Decision::no("disk", "y"));
    }

    #[test]
    fn leaves_flatten_depth_first() {
        let d = Decision::multi([
            Decision::yes("a", ""),
            Decision::multi([Decision::no("b", ""), Decision::throttle("c", "")]),
        ]);
        let leaves = d.leaves();
        let labels: Vec<&str> = leaves.iter().filter_map(|s| s.label()).collect();
        assert_eq!(labels, ["a", "b", "c"]);
        assert_eq!(d.leaves_of_type(DecisionType::No).len(), 1);
    }

    #[test]
    fn display_single_and_multi() {
        let d = Decision::multi([Decision::no("same_shard", "copy exists"), Decision::ALWAYS]);
        assert_eq!(d.to_string(), "[NO(same_shard): copy exists], [YES]");
    }

    #[test]
    fn type_ordinals_are_stable() {
        assert_eq!(DecisionType::Yes.ordinal(), 0);
        assert_eq!(DecisionType::Throttle.ordinal(), 1);
        assert_eq!(DecisionType::No.ordinal(), 2);
        assert_eq!(DecisionType::from_ordinal(3), None);
    }

    #[test]
    fn unlabelled_constants_survive_the_wire() {
        let d = Decision::multi([Decision::ALWAYS, Decision::NO, Decision::THROTTLE]);
        let mut out = StreamOutput::new();
        d.write_to(&mut out);
        let bytes = out.into_bytes();
        let back = Decision::read_from(&mut StreamInput::new(&bytes)).unwrap();
        assert_eq!(back, d);
        assert_eq!(back.decision_type(), DecisionType::No);
    }
}
