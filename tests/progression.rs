//! End-to-end validation of the progression engine's claims: feed
//! semantics, derived points, rarity distribution, unlock rules, and
//! the persistence round trip.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Local, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;

use eva_mirror::classifier::{Analysis, AnswerCategory, ClassifyRequest, TextClassifier};
use eva_mirror::profile::{Session, UserProfile, VerifiedIdentity};
use eva_mirror::seed::{SoulSeed, Vibe};
use eva_mirror::session::{re_analyze_session, score_session, update_profile_with_session, CancelToken};
use eva_mirror::store::{read_json, write_json, MemoryStore, SqliteStore};
use eva_mirror::sync::{seed_key, RemoteBackend, SyncAdapter};
use eva_mirror::traits::{check_trait_unlock, Answer, TraitAxis};
use eva_mirror::{draw_artifact, Rarity};

fn answer(id: &str, text: &str, category: &str, depth: &str) -> Answer {
    Answer {
        question_id: id.to_string(),
        question: "What do you believe?".to_string(),
        text: text.to_string(),
        category: category.to_string(),
        depth: depth.to_string(),
    }
}

fn identity() -> VerifiedIdentity {
    VerifiedIdentity {
        twitter_id: "42".to_string(),
        twitter_handle: "nova".to_string(),
        twitter_name: "Nova".to_string(),
        profile_image: None,
    }
}

// ---------------------------------------------------------------------------
// First feed of the day: the canonical scenario
// ---------------------------------------------------------------------------
#[test]
fn first_feed_of_the_day_scenario() {
    let mut seed = SoulSeed::new("nova", Vibe::Ethereal).unwrap();
    let mut rng = StdRng::seed_from_u64(11);
    let now = Local.with_ymd_and_hms(2026, 4, 2, 10, 30, 0).unwrap();

    let outcome = seed.feed("p1", "I believe in the universe and its infinite patterns", now, &mut rng);

    assert_eq!(seed.traits.get(TraitAxis::Curiosity), 52);
    assert_eq!(seed.traits.get(TraitAxis::SpiritualAttunement), 53);
    assert_eq!(seed.traits.get(TraitAxis::SystemsThinking), 52);
    assert_eq!(seed.streak_count, 1);
    assert_eq!(outcome.level, 1);
    assert_eq!(seed.artifacts.len(), 1);
    assert_eq!(seed.memories.len(), 1);
    assert_eq!(seed.memories[0].text, "I believe in the universe and its infinite patterns");
}

#[test]
fn same_day_feeds_differing_only_in_text() {
    let now = Local.with_ymd_and_hms(2026, 4, 2, 10, 0, 0).unwrap();
    let later = Local.with_ymd_and_hms(2026, 4, 2, 19, 0, 0).unwrap();

    let mut seed = SoulSeed::new("nova", Vibe::Zen).unwrap();
    let mut rng = StdRng::seed_from_u64(12);
    seed.feed("p1", "first answer", now, &mut rng);
    let before_memories = seed.memories.len();
    let streak_after_first = seed.streak_count;

    seed.feed("p1", "a different answer", later, &mut rng);
    assert_eq!(seed.streak_count, streak_after_first, "second feed of the day must not extend the streak");
    assert_eq!(seed.memories.len(), before_memories + 1);
}

// ---------------------------------------------------------------------------
// Points are derived, idempotent, and match the OG example
// ---------------------------------------------------------------------------
#[test]
fn og_profile_points_example() {
    let mut profile = UserProfile::from_identity(&identity(), true);
    profile.push_session(Session {
        date: Utc::now(),
        questions_answered: 5,
        human_score: 80,
        points_earned: 2000,
        session_data: None,
    });
    assert_eq!(profile.total_points(), 13_000);
    assert_eq!(profile.total_points(), profile.total_points());
}

// ---------------------------------------------------------------------------
// Rarity distribution over 10,000 draws
// ---------------------------------------------------------------------------
#[test]
fn rarity_distribution_matches_weights() {
    let mut rng = StdRng::seed_from_u64(99);
    let now = Utc::now();
    let mut counts = [0u32; 4];
    let n = 10_000;
    for _ in 0..n {
        let artifact = draw_artifact(&mut rng, now);
        let idx = match artifact.rarity {
            Rarity::Common => 0,
            Rarity::Uncommon => 1,
            Rarity::Rare => 2,
            Rarity::Legendary => 3,
        };
        counts[idx] += 1;
    }

    let expected = [7000.0, 2200.0, 700.0, 100.0];
    let chi2: f64 = counts
        .iter()
        .zip(expected.iter())
        .map(|(obs, exp)| {
            let d = *obs as f64 - exp;
            d * d / exp
        })
        .sum();
    // df = 3; 16.27 is the 0.001 critical value. Leave headroom so the
    // fixed seed never flakes across rand versions.
    assert!(chi2 < 25.0, "chi2 {:.2} too large, counts {:?}", chi2, counts);
    assert!(counts[3] > 0, "legendary never drawn in {} draws", n);
    assert!(counts[3] < counts[0], "legendary must be rarer than common");
}

// ---------------------------------------------------------------------------
// Trait unlocks: X qualifies, Y does not, and X only unlocks once
// ---------------------------------------------------------------------------
#[test]
fn only_qualifying_traits_unlock() {
    let earned = HashSet::new();
    let prior = vec![
        answer("q1", "why does anything exist", "identity", "surface"),
        answer("q2", "the purpose of all this", "identity", "surface"),
    ];
    let new = answer("q3", "no cosmic words here", "identity", "surface");

    let unlocked = check_trait_unlock(&new, &prior, &earned);
    let ids: Vec<&str> = unlocked.iter().map(|d| d.id).collect();
    assert!(ids.contains(&"seeker"));
    assert!(!ids.contains(&"stargazer"));

    // Re-submitting stronger evidence never re-returns an earned trait.
    let mut earned = earned;
    for def in &unlocked {
        earned.insert(def.id.to_string());
    }
    let again = check_trait_unlock(
        &answer("q4", "the truth and the meaning and why", "identity", "deep"),
        &prior,
        &earned,
    );
    assert!(!again.iter().any(|d| d.id == "seeker"));
}

// ---------------------------------------------------------------------------
// Persistence round trip
// ---------------------------------------------------------------------------
#[test]
fn soul_seed_sqlite_round_trip() {
    let mut seed = SoulSeed::new("nova", Vibe::Cyber).unwrap();
    let mut rng = StdRng::seed_from_u64(21);
    let now = Local.with_ymd_and_hms(2026, 4, 2, 8, 0, 0).unwrap();
    seed.feed("p1", "I believe in the universe", now, &mut rng);
    let a = answer("q1", "why", "identity", "deep");
    let def = eva_mirror::traits::TRAIT_CATALOG.iter().find(|d| d.id == "oracle").unwrap();
    seed.earn_trait(def, &a, &[], Utc::now());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mirror.sqlite");
    let store = SqliteStore::new(path.to_str().unwrap(), "eva").unwrap();
    write_json(&store, "soulseed:42", &seed).unwrap();
    let back: Option<SoulSeed> = read_json(&store, "soulseed:42", None);
    assert_eq!(back.as_ref(), Some(&seed));
}

// ---------------------------------------------------------------------------
// Full edit flow: score, persist, re-analyze with one classifier failure
// ---------------------------------------------------------------------------

/// Fails on a fixed set of call indices, succeeds otherwise.
struct FlakyClassifier {
    fail_on: Vec<u32>,
    calls: std::sync::atomic::AtomicU32,
}

#[async_trait]
impl TextClassifier for FlakyClassifier {
    async fn classify(&self, req: &ClassifyRequest) -> Result<Analysis> {
        let call = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if self.fail_on.contains(&call) {
            return Err(anyhow!("connection reset"));
        }
        let quality = if req.user_input.len() > 20 { 9 } else { 7 };
        Ok(Analysis {
            quality,
            category: AnswerCategory::Genuine,
            sincerity: quality,
            flags: Vec::new(),
            eva_response: "the mirror ripples".to_string(),
            trust_impact: 0,
            should_terminate: false,
            points_awarded: None,
        })
    }
}

#[tokio::test]
async fn edit_flow_survives_mid_batch_classifier_failure() {
    let cancel = CancelToken::new();
    let answers = vec![
        answer("q1", "short", "identity", "surface"),
        answer("q2", "a considerably longer reflection", "identity", "deep"),
        answer("q3", "also short", "identity", "surface"),
    ];

    // Initial scoring succeeds for all three answers.
    let classifier = FlakyClassifier { fail_on: vec![], calls: Default::default() };
    let scored = score_session(&classifier, &answers, Vibe::Zen, Some("nova"), &cancel)
        .await
        .unwrap();
    let mut profile = UserProfile::from_identity(&identity(), false);
    profile.push_session(scored.session);
    let points_before = profile.total_points();

    // Re-analysis with the second call failing mid-batch.
    let flaky = FlakyClassifier { fail_on: vec![1], calls: Default::default() };
    let edited = vec![
        answer("q1", "a much richer first answer now", "identity", "surface"),
        answer("q2", "rewritten", "identity", "deep"),
        answer("q3", "rewritten third answer with substance", "identity", "surface"),
    ];
    let outcome = re_analyze_session(
        &flaky,
        &edited,
        profile.session_history.first(),
        Vibe::Zen,
        Some("nova"),
        &cancel,
    )
    .await
    .unwrap();

    // Every question got a comparison row; the failed one is defaulted.
    assert_eq!(outcome.score_comparisons.len(), 3);
    let failed = &outcome.score_comparisons[1];
    assert_eq!((failed.quality_after, failed.sincerity_after, failed.points_after), (5, 5, 250));

    let profile = update_profile_with_session(profile, 0, &outcome).unwrap();
    // The derived points invariant holds after reconciliation.
    assert_eq!(profile.total_points(), 1000 + outcome.points_earned);
    assert_ne!(profile.total_points(), points_before);
    assert_eq!(profile.total_questions_answered, 3);
}

// ---------------------------------------------------------------------------
// Write-through sync never corrupts local state when remote is down
// ---------------------------------------------------------------------------

struct DownBackend;

#[async_trait]
impl RemoteBackend for DownBackend {
    async fn upsert(&self, _table: &str, _user_id: &str, _record: serde_json::Value) -> Result<()> {
        Err(anyhow!("503"))
    }

    async fn fetch(&self, _table: &str, _user_id: &str) -> Result<Option<serde_json::Value>> {
        Err(anyhow!("503"))
    }
}

#[tokio::test]
async fn local_state_survives_remote_outage() {
    let store = MemoryStore::new();
    let adapter = SyncAdapter::new(Arc::new(DownBackend));

    let mut seed = SoulSeed::new("nova", Vibe::Ethereal).unwrap();
    let mut rng = StdRng::seed_from_u64(5);
    seed.feed("p1", "persist me", Local::now(), &mut rng);

    adapter.write_through_seed(&store, "42", &seed).unwrap();
    let loaded = adapter.load_seed(&store, "42").await.unwrap();
    assert_eq!(loaded, seed);
    assert_eq!(read_json::<Option<SoulSeed>>(&store, &seed_key("42"), None), Some(seed));
}
