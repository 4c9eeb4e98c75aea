//! Session scoring and re-analysis.
//!
//! Edited answers are re-classified one at a time, in submission order,
//! so classifier rate limits are respected and per-question comparisons
//! stay ordered. One failed classification degrades that answer to the
//! neutral minimum; it never aborts the batch. The whole flow moves
//! `Idle -> Analyzing -> Reconciling -> Persisted` unless the caller
//! cancels between calls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::Utc;

use crate::classifier::{classify_or_default, Analysis, AnswerCategory, ClassifyRequest, TextClassifier};
use crate::logging::{log, obj, v_num, v_str, Domain, Level};
use crate::profile::{AnswerRecord, Session, UserProfile};
use crate::seed::Vibe;
use crate::traits::Answer;

/// Baseline used when a question has no stored analysis to diff against.
const DEFAULT_BASELINE: (u8, u8, i64) = (5, 5, 250);

/// Cooperative cancellation for a re-analysis batch. Checked between
/// classifier calls; cancelling mid-batch stops before the next call and
/// leaves the profile untouched.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-question before/after diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreComparison {
    pub question_id: String,
    pub quality_before: u8,
    pub quality_after: u8,
    pub sincerity_before: u8,
    pub sincerity_after: u8,
    pub points_before: i64,
    pub points_after: i64,
}

#[derive(Debug, Clone)]
pub struct ReanalysisOutcome {
    pub human_score: u32,
    pub points_earned: i64,
    pub total_questions_answered: u32,
    pub score_comparisons: Vec<ScoreComparison>,
    /// Net points gained (or lost) across the whole batch.
    pub overall_improvement: i64,
    pub records: Vec<AnswerRecord>,
}

/// Aggregate of one scored session, with the trust fallout for the seed.
#[derive(Debug, Clone)]
pub struct SessionScore {
    pub session: Session,
    pub offensive_count: u32,
    pub trust_penalty: i32,
}

fn request_for(answer: &Answer, vibe: Vibe, alias: Option<&str>, is_onboarding: bool) -> ClassifyRequest {
    ClassifyRequest {
        user_input: answer.text.clone(),
        question: answer.question.clone(),
        category: answer.category.clone(),
        vibe,
        alias: alias.map(|a| a.to_string()),
        is_onboarding,
    }
}

/// Human score over the batch: the 1-10 classifier average of quality
/// and sincerity across valid answers, stored ×10 so the field shares
/// the profile aggregate's 0..=100 scale. 0 when nothing valid was
/// scored; a neutral 5/5 answer scores 50.
fn human_score(sum_quality: u64, sum_sincerity: u64, valid: u32) -> u32 {
    if valid == 0 {
        return 0;
    }
    let avg = (sum_quality + sum_sincerity) as f64 / (2.0 * valid as f64);
    ((avg * 10.0).round() as u32).min(100)
}

fn baseline_for(original: Option<&Session>, question_id: &str) -> (u8, u8, i64) {
    original
        .and_then(|s| s.session_data.as_ref())
        .and_then(|records| records.iter().find(|r| r.answer.question_id == question_id))
        .and_then(|r| r.analysis.as_ref())
        .map(|a| (a.quality, a.sincerity, a.points()))
        .unwrap_or(DEFAULT_BASELINE)
}

struct BatchResult {
    records: Vec<AnswerRecord>,
    sum_quality: u64,
    sum_sincerity: u64,
    valid: u32,
    points: i64,
    offensive: u32,
    trust_penalty: i32,
}

/// Classify a batch sequentially, degrading per answer and honoring the
/// cancel token between calls.
async fn classify_batch(
    classifier: &dyn TextClassifier,
    answers: &[Answer],
    vibe: Vibe,
    alias: Option<&str>,
    is_onboarding: bool,
    cancel: &CancelToken,
) -> Result<BatchResult> {
    let mut out = BatchResult {
        records: Vec::with_capacity(answers.len()),
        sum_quality: 0,
        sum_sincerity: 0,
        valid: 0,
        points: 0,
        offensive: 0,
        trust_penalty: 0,
    };
    for answer in answers {
        if cancel.is_cancelled() {
            bail!("analysis cancelled");
        }
        let analysis =
            classify_or_default(classifier, &request_for(answer, vibe, alias, is_onboarding)).await;
        if analysis.counts_toward_score() {
            out.sum_quality += analysis.quality as u64;
            out.sum_sincerity += analysis.sincerity as u64;
            out.valid += 1;
        }
        if analysis.category == AnswerCategory::Offensive {
            out.offensive += 1;
            out.trust_penalty += analysis.trust_impact.max(0);
        }
        out.points += analysis.points();
        out.records.push(AnswerRecord { answer: answer.clone(), analysis: Some(analysis) });
    }
    Ok(out)
}

/// Score a fresh session (the initial, non-edit path).
pub async fn score_session(
    classifier: &dyn TextClassifier,
    answers: &[Answer],
    vibe: Vibe,
    alias: Option<&str>,
    cancel: &CancelToken,
) -> Result<SessionScore> {
    let batch = classify_batch(classifier, answers, vibe, alias, true, cancel).await?;
    let session = Session {
        date: Utc::now(),
        questions_answered: answers.len() as u32,
        human_score: human_score(batch.sum_quality, batch.sum_sincerity, batch.valid),
        points_earned: batch.points,
        session_data: Some(batch.records),
    };
    Ok(SessionScore {
        session,
        offensive_count: batch.offensive,
        trust_penalty: batch.trust_penalty,
    })
}

/// Re-score a session's edited answers and diff them against the stored
/// analysis of the original session.
pub async fn re_analyze_session(
    classifier: &dyn TextClassifier,
    edited_answers: &[Answer],
    original: Option<&Session>,
    vibe: Vibe,
    alias: Option<&str>,
    cancel: &CancelToken,
) -> Result<ReanalysisOutcome> {
    log(
        Level::Info,
        Domain::Session,
        "phase",
        obj(&[("phase", v_str("analyzing")), ("answers", v_num(edited_answers.len() as f64))]),
    );
    let batch = classify_batch(classifier, edited_answers, vibe, alias, false, cancel).await?;

    log(Level::Info, Domain::Session, "phase", obj(&[("phase", v_str("reconciling"))]));
    let mut comparisons = Vec::with_capacity(batch.records.len());
    let mut improvement = 0i64;
    for record in &batch.records {
        let analysis = record.analysis.clone().unwrap_or_else(Analysis::neutral);
        let (q_before, s_before, p_before) = baseline_for(original, &record.answer.question_id);
        let p_after = analysis.points();
        improvement += p_after - p_before;
        comparisons.push(ScoreComparison {
            question_id: record.answer.question_id.clone(),
            quality_before: q_before,
            quality_after: analysis.quality,
            sincerity_before: s_before,
            sincerity_after: analysis.sincerity,
            points_before: p_before,
            points_after: p_after,
        });
    }

    Ok(ReanalysisOutcome {
        human_score: human_score(batch.sum_quality, batch.sum_sincerity, batch.valid),
        points_earned: batch.points,
        total_questions_answered: edited_answers.len() as u32,
        score_comparisons: comparisons,
        overall_improvement: improvement,
        records: batch.records,
    })
}

/// Fold a re-analysis outcome back into the profile: overwrite the
/// target session, then recompute the cross-session aggregates. Points
/// need no separate recomputation step because they are derived.
pub fn update_profile_with_session(
    mut profile: UserProfile,
    session_index: usize,
    outcome: &ReanalysisOutcome,
) -> Result<UserProfile> {
    let Some(session) = profile.session_history.get_mut(session_index) else {
        bail!("session index {} out of range", session_index);
    };
    session.human_score = outcome.human_score;
    session.points_earned = outcome.points_earned;
    session.questions_answered = outcome.total_questions_answered;
    session.session_data = Some(outcome.records.clone());
    profile.recompute_aggregates();
    log(
        Level::Info,
        Domain::Session,
        "phase",
        obj(&[
            ("phase", v_str("persisted")),
            ("human_score", v_num(profile.human_score as f64)),
            ("points", v_num(profile.total_points() as f64)),
        ]),
    );
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Analysis;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;

    fn answer(id: &str, text: &str) -> Answer {
        Answer {
            question_id: id.to_string(),
            question: "What do you see?".to_string(),
            text: text.to_string(),
            category: "identity".to_string(),
            depth: "surface".to_string(),
        }
    }

    /// Returns a fixed analysis, failing on the answers whose index is
    /// in `fail_on`.
    struct ScriptedClassifier {
        analysis: Analysis,
        fail_on: Vec<u32>,
        calls: AtomicU32,
    }

    impl ScriptedClassifier {
        fn new(analysis: Analysis, fail_on: Vec<u32>) -> Self {
            Self { analysis, fail_on, calls: AtomicU32::new(0) }
        }
    }

    #[async_trait]
    impl TextClassifier for ScriptedClassifier {
        async fn classify(&self, _req: &ClassifyRequest) -> Result<Analysis> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on.contains(&call) {
                Err(anyhow!("classifier timeout"))
            } else {
                Ok(self.analysis.clone())
            }
        }
    }

    fn good_analysis() -> Analysis {
        Analysis {
            quality: 9,
            category: AnswerCategory::Genuine,
            sincerity: 9,
            flags: Vec::new(),
            eva_response: "noted".to_string(),
            trust_impact: 0,
            should_terminate: false,
            points_awarded: None,
        }
    }

    #[test]
    fn human_score_scales_to_percent() {
        assert_eq!(human_score(9, 9, 1), 90);
        assert_eq!(human_score(5, 5, 1), 50);
        assert_eq!(human_score(0, 0, 0), 0);
        assert_eq!(human_score(10, 10, 1), 100);
    }

    #[tokio::test]
    async fn failed_answer_defaults_without_aborting_the_batch() {
        let classifier = ScriptedClassifier::new(good_analysis(), vec![1]);
        let answers = vec![answer("q1", "one"), answer("q2", "two"), answer("q3", "three")];
        let outcome = re_analyze_session(
            &classifier,
            &answers,
            None,
            Vibe::Zen,
            Some("nova"),
            &CancelToken::new(),
        )
        .await
        .unwrap();

        // A comparison row exists for every question.
        assert_eq!(outcome.score_comparisons.len(), 3);
        // The failed one carries the neutral default.
        let failed = &outcome.score_comparisons[1];
        assert_eq!(failed.quality_after, 5);
        assert_eq!(failed.sincerity_after, 5);
        assert_eq!(failed.points_after, 250);
        // The others carry the real classification.
        assert_eq!(outcome.score_comparisons[0].points_after, 500);
        assert_eq!(outcome.points_earned, 500 + 250 + 500);
    }

    #[tokio::test]
    async fn spam_excluded_from_score_but_counted() {
        let mut spam = good_analysis();
        spam.quality = 1;
        spam.sincerity = 1;
        spam.category = AnswerCategory::Spam;
        let classifier = ScriptedClassifier::new(spam, vec![]);
        let answers = vec![answer("q1", "buy now"), answer("q2", "buy now")];
        let outcome =
            re_analyze_session(&classifier, &answers, None, Vibe::Zen, None, &CancelToken::new())
                .await
                .unwrap();
        assert_eq!(outcome.human_score, 0);
        assert_eq!(outcome.total_questions_answered, 2);
    }

    #[tokio::test]
    async fn baseline_comes_from_original_session_data() {
        let original_analysis = Analysis {
            quality: 3,
            category: AnswerCategory::Genuine,
            sincerity: 3,
            flags: Vec::new(),
            eva_response: String::new(),
            trust_impact: 0,
            should_terminate: false,
            points_awarded: None,
        };
        let original = Session {
            date: Utc::now(),
            questions_answered: 1,
            human_score: 30,
            points_earned: 200,
            session_data: Some(vec![AnswerRecord {
                answer: answer("q1", "old text"),
                analysis: Some(original_analysis),
            }]),
        };
        let classifier = ScriptedClassifier::new(good_analysis(), vec![]);
        let outcome = re_analyze_session(
            &classifier,
            &[answer("q1", "much better text")],
            Some(&original),
            Vibe::Ethereal,
            None,
            &CancelToken::new(),
        )
        .await
        .unwrap();
        let cmp = &outcome.score_comparisons[0];
        assert_eq!(cmp.quality_before, 3);
        assert_eq!(cmp.points_before, 200);
        assert_eq!(cmp.points_after, 500);
        assert_eq!(outcome.overall_improvement, 300);
    }

    #[tokio::test]
    async fn cancellation_stops_before_the_next_call() {
        let classifier = ScriptedClassifier::new(good_analysis(), vec![]);
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = re_analyze_session(
            &classifier,
            &[answer("q1", "text")],
            None,
            Vibe::Cyber,
            None,
            &cancel,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn update_profile_overwrites_target_session() {
        let identity = crate::profile::VerifiedIdentity {
            twitter_id: "1".to_string(),
            twitter_handle: "nova".to_string(),
            twitter_name: "Nova".to_string(),
            profile_image: None,
        };
        let mut profile = UserProfile::from_identity(&identity, false);
        profile.push_session(Session {
            date: Utc::now(),
            questions_answered: 2,
            human_score: 40,
            points_earned: 400,
            session_data: None,
        });
        profile.push_session(Session {
            date: Utc::now(),
            questions_answered: 3,
            human_score: 60,
            points_earned: 600,
            session_data: None,
        });

        let classifier = ScriptedClassifier::new(good_analysis(), vec![]);
        let answers = vec![answer("q1", "a"), answer("q2", "b")];
        let outcome =
            re_analyze_session(&classifier, &answers, None, Vibe::Zen, None, &CancelToken::new())
                .await
                .unwrap();
        let profile = update_profile_with_session(profile, 0, &outcome).unwrap();

        assert_eq!(profile.session_history[0].human_score, 90);
        assert_eq!(profile.session_history[0].points_earned, 1000);
        assert_eq!(profile.human_score, 75);
        assert_eq!(profile.total_questions_answered, 5);
        assert_eq!(profile.total_points(), 1000 + 1000 + 600);

        // Out-of-range index is rejected before any mutation.
        let profile2 = update_profile_with_session(profile, 9, &outcome);
        assert!(profile2.is_err());
    }

    #[tokio::test]
    async fn score_session_reports_trust_fallout() {
        let mut offensive = good_analysis();
        offensive.category = AnswerCategory::Offensive;
        offensive.trust_impact = 10;
        let classifier = ScriptedClassifier::new(offensive, vec![]);
        let score = score_session(
            &classifier,
            &[answer("q1", "rude")],
            Vibe::Zen,
            Some("nova"),
            &CancelToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(score.offensive_count, 1);
        assert_eq!(score.trust_penalty, 10);
        assert_eq!(score.session.questions_answered, 1);
    }
}
