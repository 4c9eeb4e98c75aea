//! Bounded retry with exponential backoff for idempotent external calls.

use std::future::Future;

use anyhow::{anyhow, Result};
use tokio::time::{sleep, Duration};

use crate::logging::{log, obj, v_num, v_str, Domain, Level};

#[derive(Clone, Debug)]
pub struct Backoff {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay_ms: 200, max_delay_ms: 5000 }
    }
}

impl Backoff {
    pub fn delay(&self, attempt: u32) -> Duration {
        let ms = self.base_delay_ms.saturating_mul(1u64 << attempt.min(16));
        Duration::from_millis(ms.min(self.max_delay_ms))
    }
}

/// Run `op` up to `policy.max_attempts` times, sleeping between failures.
/// The last error is returned when every attempt fails.
pub async fn with_backoff<F, Fut, T>(
    policy: &Backoff,
    domain: Domain,
    what: &str,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last: Option<anyhow::Error> = None;
    for attempt in 0..policy.max_attempts.max(1) {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                let retrying = attempt + 1 < policy.max_attempts;
                log(
                    Level::Warn,
                    domain,
                    "retry",
                    obj(&[
                        ("what", v_str(what)),
                        ("attempt", v_num((attempt + 1) as f64)),
                        ("error", v_str(&e.to_string())),
                        ("retrying", serde_json::Value::Bool(retrying)),
                    ]),
                );
                last = Some(e);
                if retrying {
                    sleep(policy.delay(attempt)).await;
                }
            }
        }
    }
    Err(last.unwrap_or_else(|| anyhow!("{}: no attempts were made", what)))
}
