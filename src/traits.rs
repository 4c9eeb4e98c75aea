//! Personality trait engine: continuous trait-vector deltas from free
//! text, and discrete trait unlocks from cumulative answer history.
//!
//! Everything here is deterministic given its input. Malformed or empty
//! text is not an error; it simply produces no deltas and no unlocks.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

/// The 16 fixed personality axes of a soul seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TraitAxis {
    Curiosity,
    Empathy,
    Creativity,
    Resilience,
    Skepticism,
    Playfulness,
    Introspection,
    Ambition,
    Harmony,
    Rebellion,
    Logic,
    Intuition,
    Openness,
    Discipline,
    SpiritualAttunement,
    SystemsThinking,
}

pub const AXES: [TraitAxis; 16] = [
    TraitAxis::Curiosity,
    TraitAxis::Empathy,
    TraitAxis::Creativity,
    TraitAxis::Resilience,
    TraitAxis::Skepticism,
    TraitAxis::Playfulness,
    TraitAxis::Introspection,
    TraitAxis::Ambition,
    TraitAxis::Harmony,
    TraitAxis::Rebellion,
    TraitAxis::Logic,
    TraitAxis::Intuition,
    TraitAxis::Openness,
    TraitAxis::Discipline,
    TraitAxis::SpiritualAttunement,
    TraitAxis::SystemsThinking,
];

/// Trait values, one per axis, each clamped to [0, 100].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraitVector(BTreeMap<TraitAxis, i32>);

impl TraitVector {
    /// Fresh seeds start every axis at the neutral midpoint.
    pub fn baseline() -> Self {
        Self(AXES.iter().map(|a| (*a, 50)).collect())
    }

    pub fn get(&self, axis: TraitAxis) -> i32 {
        self.0.get(&axis).copied().unwrap_or(50)
    }

    /// Shift one axis by `delta`, clamped to [0, 100].
    pub fn nudge(&mut self, axis: TraitAxis, delta: i32) {
        let v = self.get(axis);
        self.0.insert(axis, (v + delta).clamp(0, 100));
    }

    pub fn iter(&self) -> impl Iterator<Item = (TraitAxis, i32)> + '_ {
        self.0.iter().map(|(a, v)| (*a, *v))
    }
}

impl Default for TraitVector {
    fn default() -> Self {
        Self::baseline()
    }
}

struct TextRule {
    axis: TraitAxis,
    words: &'static [&'static str],
    delta: i32,
}

// Substring matches against lower-cased text. Each rule fires at most
// once per call; rules fire independently of each other.
const TEXT_RULES: &[TextRule] = &[
    TextRule { axis: TraitAxis::Curiosity, words: &["wonder", "curious", "question", "infinite", "explore", "discover", "learn"], delta: 2 },
    TextRule { axis: TraitAxis::Empathy, words: &["feel", "heart", "care", "together", "friend", "love"], delta: 2 },
    TextRule { axis: TraitAxis::Creativity, words: &["create", "imagine", "dream", "paint", "music", "design"], delta: 2 },
    TextRule { axis: TraitAxis::Resilience, words: &["struggle", "overcome", "survive", "strength", "persist"], delta: 2 },
    TextRule { axis: TraitAxis::Skepticism, words: &["doubt", "proof", "evidence", "skeptic", "verify"], delta: 2 },
    TextRule { axis: TraitAxis::Playfulness, words: &["play", "joke", "laugh", "game", "silly"], delta: 2 },
    TextRule { axis: TraitAxis::Introspection, words: &["myself", "reflect", "inner", "within", "alone"], delta: 2 },
    TextRule { axis: TraitAxis::Ambition, words: &["goal", "achieve", "success", "ambition", "hustle"], delta: 2 },
    TextRule { axis: TraitAxis::Harmony, words: &["peace", "balance", "calm", "harmony", "gentle"], delta: 1 },
    TextRule { axis: TraitAxis::Rebellion, words: &["rebel", "chaos", "against", "refuse", "fight"], delta: 2 },
    TextRule { axis: TraitAxis::Logic, words: &["logic", "reason", "rational", "analyze", "calculate"], delta: 2 },
    TextRule { axis: TraitAxis::Intuition, words: &["intuition", "instinct", "vibe", "gut feeling"], delta: 2 },
    TextRule { axis: TraitAxis::Openness, words: &["open mind", "change", "different", "perspective"], delta: 1 },
    TextRule { axis: TraitAxis::Discipline, words: &["routine", "habit", "discipline", "practice", "focus"], delta: 2 },
    TextRule { axis: TraitAxis::SpiritualAttunement, words: &["universe", "cosmos", "spirit", "soul", "divine", "believe", "meditat"], delta: 3 },
    TextRule { axis: TraitAxis::SystemsThinking, words: &["pattern", "system", "structure", "network", "connect", "emerge"], delta: 2 },
];

/// Apply the fixed text-to-trait rule set to `traits` in place.
///
/// Multiple rules may fire for one text; each axis updates independently.
pub fn apply_text_to_traits(traits: &mut TraitVector, text: &str) {
    let lower = text.to_lowercase();
    for rule in TEXT_RULES {
        if rule.words.iter().any(|w| lower.contains(w)) {
            traits.nudge(rule.axis, rule.delta);
        }
    }
}

/// A submitted answer, the unit the unlock engine and classifier consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub question_id: String,
    pub question: String,
    pub text: String,
    /// Question category tag ("identity", "relationships", ...).
    pub category: String,
    /// Difficulty tag ("surface", "deep").
    pub depth: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequirementKind {
    /// `pattern` is a `|`-delimited alternation matched as a substring
    /// of the lower-cased answer text.
    Keyword,
    /// `pattern` must equal the answer's category tag.
    Category,
    /// `pattern` must equal the answer's difficulty tag.
    Depth,
}

pub struct Requirement {
    pub kind: RequirementKind,
    pub pattern: &'static str,
    /// Minimum number of answers (across the whole history) that must match.
    pub count: usize,
}

/// A catalog trait: an unlockable identity marker with its requirements.
pub struct TraitDef {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub requirements: &'static [Requirement],
}

pub const TRAIT_CATALOG: &[TraitDef] = &[
    TraitDef {
        id: "seeker",
        name: "The Seeker",
        description: "Keeps asking why when everyone else stopped.",
        requirements: &[Requirement { kind: RequirementKind::Keyword, pattern: "why|meaning|purpose|truth", count: 2 }],
    },
    TraitDef {
        id: "stargazer",
        name: "Stargazer",
        description: "Finds the cosmos in everyday questions.",
        requirements: &[
            Requirement { kind: RequirementKind::Keyword, pattern: "universe|cosmos|stars|infinite", count: 2 },
            Requirement { kind: RequirementKind::Depth, pattern: "deep", count: 1 },
        ],
    },
    TraitDef {
        id: "pattern-weaver",
        name: "Pattern Weaver",
        description: "Sees the threads that tie systems together.",
        requirements: &[Requirement { kind: RequirementKind::Keyword, pattern: "pattern|system|structure|connect", count: 2 }],
    },
    TraitDef {
        id: "empath",
        name: "The Empath",
        description: "Answers with the heart first.",
        requirements: &[
            Requirement { kind: RequirementKind::Category, pattern: "relationships", count: 2 },
            Requirement { kind: RequirementKind::Keyword, pattern: "feel|heart|care|love", count: 1 },
        ],
    },
    TraitDef {
        id: "builder",
        name: "The Builder",
        description: "Turns ideas into things.",
        requirements: &[Requirement { kind: RequirementKind::Category, pattern: "creativity", count: 2 }],
    },
    TraitDef {
        id: "night-owl",
        name: "Night Owl",
        description: "Does the best thinking after midnight.",
        requirements: &[Requirement { kind: RequirementKind::Keyword, pattern: "night|dream|moon|midnight", count: 2 }],
    },
    TraitDef {
        id: "oracle",
        name: "The Oracle",
        description: "Goes deep every single time.",
        requirements: &[Requirement { kind: RequirementKind::Depth, pattern: "deep", count: 3 }],
    },
    TraitDef {
        id: "trickster",
        name: "Trickster",
        description: "Never takes the mirror too seriously.",
        requirements: &[Requirement { kind: RequirementKind::Keyword, pattern: "joke|chaos|trick|laugh|play", count: 2 }],
    },
];

fn requirement_met(req: &Requirement, answers: &[&Answer]) -> bool {
    let hits = answers
        .iter()
        .filter(|a| match req.kind {
            RequirementKind::Keyword => {
                let text = a.text.to_lowercase();
                req.pattern.split('|').any(|alt| text.contains(alt))
            }
            RequirementKind::Category => a.category == req.pattern,
            RequirementKind::Depth => a.depth == req.pattern,
        })
        .count();
    hits >= req.count
}

/// Evaluate every not-yet-earned catalog trait against the cumulative
/// answer history (prior answers plus the new one).
///
/// A trait qualifies only when every one of its requirements is
/// independently satisfied. Results are in catalog order; all qualifying
/// traits are returned and the caller persists all of them.
pub fn check_trait_unlock(
    new_answer: &Answer,
    prior_answers: &[Answer],
    earned_ids: &HashSet<String>,
) -> Vec<&'static TraitDef> {
    let combined: Vec<&Answer> = prior_answers.iter().chain(std::iter::once(new_answer)).collect();
    TRAIT_CATALOG
        .iter()
        .filter(|def| {
            !earned_ids.contains(def.id)
                && def.requirements.iter().all(|req| requirement_met(req, &combined))
        })
        .collect()
}

/// Strength of an unlock, from how much evidence exceeds the minimum.
pub fn unlock_strength(def: &TraitDef, new_answer: &Answer, prior_answers: &[Answer]) -> i32 {
    let combined: Vec<&Answer> = prior_answers.iter().chain(std::iter::once(new_answer)).collect();
    let surplus: usize = def
        .requirements
        .iter()
        .map(|req| {
            let hits = combined
                .iter()
                .filter(|a| match req.kind {
                    RequirementKind::Keyword => {
                        let text = a.text.to_lowercase();
                        req.pattern.split('|').any(|alt| text.contains(alt))
                    }
                    RequirementKind::Category => a.category == req.pattern,
                    RequirementKind::Depth => a.depth == req.pattern,
                })
                .count();
            hits.saturating_sub(req.count)
        })
        .sum();
    (60 + 8 * surplus as i32).min(100)
}
