//! User profile aggregate: identity, sessions, and the derived points
//! and trust values.
//!
//! Points are a computed property, never a stored field. Every display
//! and persistence path goes through [`UserProfile::total_points`], so
//! stored and derived values cannot drift.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classifier::Analysis;
use crate::traits::Answer;

pub const BASE_POINTS: i64 = 1000;
pub const OG_BONUS: i64 = 10_000;

/// Verified identity tuple from the OAuth collaborator. Opaque input:
/// the engine only reads it, never refreshes or re-validates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedIdentity {
    pub twitter_id: String,
    pub twitter_handle: String,
    pub twitter_name: String,
    pub profile_image: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    pub full_name: Option<String>,
    pub location: Option<String>,
    pub bio: Option<String>,
}

impl PersonalInfo {
    fn filled_fields(&self) -> i32 {
        [&self.full_name, &self.location, &self.bio]
            .iter()
            .filter(|f| f.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false))
            .count() as i32
    }
}

/// Linked social account. At most one entry per platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialProfile {
    pub platform: String,
    pub handle: String,
    pub url: Option<String>,
    pub verified: bool,
    pub added_at: DateTime<Utc>,
}

/// One answered question with its stored classifier analysis, kept so a
/// later edit can diff against the original scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub answer: Answer,
    pub analysis: Option<Analysis>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub date: DateTime<Utc>,
    pub questions_answered: u32,
    pub human_score: u32,
    pub points_earned: i64,
    pub session_data: Option<Vec<AnswerRecord>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub twitter_handle: String,
    pub twitter_verified: bool,
    pub is_og: bool,
    pub og_points_awarded: bool,
    pub personal_info: PersonalInfo,
    pub social_profiles: Vec<SocialProfile>,
    pub human_score: u32,
    pub total_questions_answered: u32,
    pub session_history: Vec<Session>,
}

impl UserProfile {
    /// Created on first Twitter verification.
    pub fn from_identity(identity: &VerifiedIdentity, is_og: bool) -> Self {
        Self {
            twitter_handle: identity.twitter_handle.clone(),
            twitter_verified: true,
            is_og,
            og_points_awarded: is_og,
            personal_info: PersonalInfo::default(),
            social_profiles: Vec::new(),
            human_score: 0,
            total_questions_answered: 0,
            session_history: Vec::new(),
        }
    }

    /// The single source of truth for points. Idempotent and
    /// side-effect-free.
    pub fn total_points(&self) -> i64 {
        let og = if self.is_og { OG_BONUS } else { 0 };
        let sessions: i64 = self.session_history.iter().map(|s| s.points_earned).sum();
        BASE_POINTS + og + sessions
    }

    /// Trust score in [0, 100]: verification base, filled personal
    /// fields, linked socials, verified socials, minus the penalty
    /// accrued on the soul seed.
    pub fn trust_score(&self, trust_penalty: i32) -> i32 {
        let base = if self.twitter_verified { 20 } else { 0 };
        let personal = 10 * self.personal_info.filled_fields().min(3);
        let socials = (5 * self.social_profiles.len() as i32).min(30);
        let verified = 5 * self.social_profiles.iter().filter(|s| s.verified).count() as i32;
        (base + personal + socials + verified - trust_penalty).clamp(0, 100)
    }

    /// Add or replace the entry for `platform`, returning a new profile.
    /// New entries always start unverified.
    pub fn add_social_profile(mut self, platform: &str, handle: &str, url: Option<&str>) -> Self {
        self.social_profiles.retain(|s| s.platform != platform);
        self.social_profiles.push(SocialProfile {
            platform: platform.to_string(),
            handle: handle.to_string(),
            url: url.map(|u| u.to_string()),
            verified: false,
            added_at: Utc::now(),
        });
        self
    }

    pub fn push_session(&mut self, session: Session) {
        self.session_history.push(session);
        self.recompute_aggregates();
    }

    /// Human score is the simple mean over sessions; question total is
    /// the sum. Called after any session-history mutation.
    pub fn recompute_aggregates(&mut self) {
        let n = self.session_history.len();
        if n == 0 {
            self.human_score = 0;
            self.total_questions_answered = 0;
            return;
        }
        let sum: u64 = self.session_history.iter().map(|s| s.human_score as u64).sum();
        self.human_score = ((sum as f64 / n as f64).round() as u32).min(100);
        self.total_questions_answered =
            self.session_history.iter().map(|s| s.questions_answered).sum();
    }
}
