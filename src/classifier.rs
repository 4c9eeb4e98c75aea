//! Text-quality classifier port.
//!
//! The engine never lets a classifier failure escape to the conversation
//! flow: [`classify_or_default`] degrades to a neutral analysis so Eva
//! always has something to say.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::backoff::{with_backoff, Backoff};
use crate::config::Config;
use crate::logging::{log, obj, v_str, Domain, Level};
use crate::seed::Vibe;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerCategory {
    Genuine,
    Offensive,
    Gibberish,
    Test,
    Spam,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifyRequest {
    pub user_input: String,
    pub question: String,
    pub category: String,
    pub vibe: Vibe,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub is_onboarding: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub quality: u8,
    pub category: AnswerCategory,
    pub sincerity: u8,
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub eva_response: String,
    #[serde(default)]
    pub trust_impact: i32,
    #[serde(default)]
    pub should_terminate: bool,
    #[serde(default)]
    pub points_awarded: Option<i64>,
}

impl Analysis {
    /// Neutral fallback used whenever the classifier is unreachable or
    /// returns garbage: a minimum valid answer, worth 250 points.
    pub fn neutral() -> Self {
        Self {
            quality: 5,
            category: AnswerCategory::Genuine,
            sincerity: 5,
            flags: Vec::new(),
            eva_response: String::new(),
            trust_impact: 0,
            should_terminate: false,
            points_awarded: Some(250),
        }
    }

    /// Spam and gibberish are excluded from the quality/sincerity
    /// aggregate but still counted as answered questions.
    pub fn counts_toward_score(&self) -> bool {
        !matches!(self.category, AnswerCategory::Spam | AnswerCategory::Gibberish)
    }

    /// Classifier-provided points when present, else the step function.
    pub fn points(&self) -> i64 {
        self.points_awarded.unwrap_or_else(|| points_for(self.quality, self.sincerity))
    }
}

/// Step function over the quality/sincerity average.
pub fn points_for(quality: u8, sincerity: u8) -> i64 {
    let avg = (quality as f64 + sincerity as f64) / 2.0;
    if avg >= 9.0 {
        500
    } else if avg >= 7.0 {
        400
    } else if avg >= 5.0 {
        300
    } else if avg >= 3.0 {
        200
    } else {
        100
    }
}

#[async_trait]
pub trait TextClassifier: Send + Sync {
    async fn classify(&self, req: &ClassifyRequest) -> Result<Analysis>;
}

pub struct HttpClassifier {
    client: Client,
    base: String,
    backoff: Backoff,
}

impl HttpClassifier {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.http_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base: cfg.classifier_base.clone(),
            backoff: Backoff {
                max_attempts: cfg.classifier_max_attempts,
                base_delay_ms: cfg.backoff_base_ms,
                max_delay_ms: cfg.backoff_max_ms,
            },
        })
    }
}

impl HttpClassifier {
    async fn classify_once(&self, url: &str, req: &ClassifyRequest) -> Result<Analysis> {
        let resp = self.client.post(url).json(req).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("classifier returned {}", status));
        }
        let analysis: Analysis = resp.json().await?;
        if !(1..=10).contains(&analysis.quality) || !(1..=10).contains(&analysis.sincerity) {
            return Err(anyhow!(
                "classifier scores out of range: quality={} sincerity={}",
                analysis.quality,
                analysis.sincerity
            ));
        }
        Ok(analysis)
    }
}

#[async_trait]
impl TextClassifier for HttpClassifier {
    async fn classify(&self, req: &ClassifyRequest) -> Result<Analysis> {
        let url = format!("{}/api/analyze", self.base);
        with_backoff(&self.backoff, Domain::Classifier, "classify", || {
            self.classify_once(&url, req)
        })
        .await
    }
}

/// Classify, degrading silently to [`Analysis::neutral`] on any failure.
pub async fn classify_or_default(classifier: &dyn TextClassifier, req: &ClassifyRequest) -> Analysis {
    match classifier.classify(req).await {
        Ok(a) => a,
        Err(e) => {
            log(
                Level::Warn,
                Domain::Classifier,
                "degraded",
                obj(&[("question", v_str(&req.question)), ("error", v_str(&e.to_string()))]),
            );
            Analysis::neutral()
        }
    }
}
