//! The soul seed aggregate and its single mutating transition, `feed`.
//!
//! Streak, level and artifact accrual live only here; no other code path
//! mutates those fields. Feeds against one seed are serialized by the
//! `&mut self` receiver, which is the per-aggregate mutation queue the
//! design calls for.

use anyhow::{bail, Result};
use chrono::{DateTime, Local, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::artifacts::{draw_artifact, Artifact};
use crate::logging::{log, obj, v_num, v_str, Domain, Level};
use crate::traits::{apply_text_to_traits, unlock_strength, Answer, TraitDef, TraitVector};

pub const MAX_ALIAS_LEN: usize = 50;

/// Narrative voice, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vibe {
    Ethereal,
    Zen,
    Cyber,
}

/// One fed answer, kept verbatim and local-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryShard {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub prompt_id: String,
    pub text: String,
}

/// An unlocked catalog trait. Created at most once per trait id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EarnedTrait {
    pub id: String,
    pub earned_at: DateTime<Utc>,
    pub trigger_answer: String,
    pub question_id: String,
    pub strength: i32,
}

/// Per-user progression aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoulSeed {
    pub alias: String,
    pub vibe: Vibe,
    pub streak_count: u32,
    pub last_fed_at: Option<DateTime<Utc>>,
    pub traits: TraitVector,
    pub artifacts: Vec<Artifact>,
    pub memories: Vec<MemoryShard>,
    pub earned_traits: Vec<EarnedTrait>,
    pub offensive_count: u32,
    pub trust_penalty: i32,
}

/// What one feed produced, for the caller to surface and persist.
#[derive(Debug, Clone)]
pub struct FeedOutcome {
    pub shard_id: Uuid,
    pub artifact: Artifact,
    pub streak_extended: bool,
    pub level: u32,
}

/// Trim, strip control characters and enforce the length cap.
pub fn sanitize_alias(raw: &str) -> Result<String> {
    let cleaned: String = raw.trim().chars().filter(|c| !c.is_control()).collect();
    if cleaned.is_empty() {
        bail!("alias must not be empty");
    }
    if cleaned.chars().count() > MAX_ALIAS_LEN {
        bail!("alias must be at most {} characters", MAX_ALIAS_LEN);
    }
    Ok(cleaned)
}

impl SoulSeed {
    pub fn new(alias: &str, vibe: Vibe) -> Result<Self> {
        Ok(Self {
            alias: sanitize_alias(alias)?,
            vibe,
            streak_count: 0,
            last_fed_at: None,
            traits: TraitVector::baseline(),
            artifacts: Vec::new(),
            memories: Vec::new(),
            earned_traits: Vec::new(),
            offensive_count: 0,
            trust_penalty: 0,
        })
    }

    /// Level is derived from the streak, never stored.
    pub fn level(&self) -> u32 {
        self.streak_count / 5 + 1
    }

    /// Feed the seed with one answer.
    ///
    /// Streak rule: the count rises at most once per calendar day (local
    /// time); further feeds the same day still mutate traits, memories
    /// and artifacts. Every feed yields exactly one artifact.
    pub fn feed<R: Rng + ?Sized>(
        &mut self,
        prompt_id: &str,
        text: &str,
        now: DateTime<Local>,
        rng: &mut R,
    ) -> FeedOutcome {
        let now_utc = now.with_timezone(&Utc);
        let shard = MemoryShard {
            id: Uuid::new_v4(),
            created_at: now_utc,
            prompt_id: prompt_id.to_string(),
            text: text.to_string(),
        };

        apply_text_to_traits(&mut self.traits, text);
        let shard_id = shard.id;
        self.memories.push(shard);

        let streak_extended = match self.last_fed_at {
            None => true,
            Some(last) => last.with_timezone(&Local).date_naive() != now.date_naive(),
        };
        if streak_extended {
            self.streak_count += 1;
        }
        self.last_fed_at = Some(now_utc);

        let artifact = draw_artifact(rng, now_utc);
        self.artifacts.push(artifact.clone());

        log(
            Level::Info,
            Domain::Seed,
            "feed",
            obj(&[
                ("alias", v_str(&self.alias)),
                ("prompt_id", v_str(prompt_id)),
                ("streak", v_num(self.streak_count as f64)),
                ("level", v_num(self.level() as f64)),
                ("rarity", v_str(artifact.rarity.as_str())),
            ]),
        );

        FeedOutcome { shard_id, artifact, streak_extended, level: self.level() }
    }

    /// Record an unlock. Duplicate trait ids are ignored.
    pub fn earn_trait(
        &mut self,
        def: &TraitDef,
        answer: &Answer,
        prior_answers: &[Answer],
        now: DateTime<Utc>,
    ) {
        if self.earned_traits.iter().any(|t| t.id == def.id) {
            return;
        }
        let strength = unlock_strength(def, answer, prior_answers);
        self.earned_traits.push(EarnedTrait {
            id: def.id.to_string(),
            earned_at: now,
            trigger_answer: answer.text.clone(),
            question_id: answer.question_id.clone(),
            strength,
        });
    }

    pub fn earned_ids(&self) -> std::collections::HashSet<String> {
        self.earned_traits.iter().map(|t| t.id.clone()).collect()
    }

    /// Offensive answers raise the penalty the trust score subtracts.
    pub fn record_offense(&mut self, trust_impact: i32) {
        self.offensive_count += 1;
        self.trust_penalty += trust_impact.max(0);
    }
}
