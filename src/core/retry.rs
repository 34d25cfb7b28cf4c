// SPDX-License-Identifier: MIT

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use super::dispatch::DispatchOutcome;
use super::message::Message;

/// Applies the backoff ladder and the retry budget. Stateless -- every method takes
/// the message (and, where relevant, `now`) as input rather than owning any message.
#[derive(Debug, Clone)]
pub struct RetryScheduler {
    ladder_secs: Vec<u64>,
    max_retries: u32,
}

impl RetryScheduler {
    pub fn new(ladder_secs: Vec<u64>, max_retries: u32) -> Self {
        Self {
            ladder_secs,
            max_retries,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// `attempts_exhausted(msg) := retry_count >= max_retries`. Takes precedence over
    /// `is_due`: an exhausted message is never due.
    pub fn attempts_exhausted(&self, msg: &Message) -> bool {
        msg.retry_count >= self.max_retries
    }

    /// `is_due(msg, now) := retry_count = 0 ∨ now >= base(msg) + ladder[retry_count - 1]`
    pub fn is_due(&self, msg: &Message, now: DateTime<Utc>) -> bool {
        if msg.retry_count == 0 {
            return true;
        }
        let delay = self.delay_after(msg.retry_count);
        now >= msg.retry_base() + delay
    }

    /// The ladder delay to apply after `retry_count` prior failed attempts. A custom
    /// ladder shorter than `max_retries` is clamped to its last entry rather than
    /// panicking -- a misconfigured deployment degrades to a flat delay.
    fn delay_after(&self, retry_count: u32) -> ChronoDuration {
        let idx = (retry_count as usize - 1).min(self.ladder_secs.len().saturating_sub(1));
        let secs = self.ladder_secs.get(idx).copied().unwrap_or(60);
        ChronoDuration::seconds(secs as i64)
    }

    /// Applies a dispatch outcome to a message: `Terminal` fails immediately
    /// without touching `retry_count`; `Transient` bumps the count and fails once
    /// the budget is spent; `Success` delivers. Used by both the polling worker
    /// and the fast path so the two paths can never diverge.
    pub fn apply_outcome(&self, msg: &mut Message, outcome: DispatchOutcome, now: DateTime<Utc>) {
        match outcome {
            DispatchOutcome::Success => {
                msg.status = super::types::MessageStatus::Delivered;
                msg.delivered_at = Some(now);
                msg.last_attempt_at = Some(now);
                msg.error = None;
            }
            DispatchOutcome::Terminal(reason) => {
                msg.status = super::types::MessageStatus::Failed;
                msg.last_attempt_at = Some(now);
                msg.error = Some(reason);
            }
            DispatchOutcome::Transient(reason) => {
                msg.retry_count += 1;
                msg.last_attempt_at = Some(now);
                msg.error = Some(reason);
                if msg.retry_count >= self.max_retries {
                    msg.status = super::types::MessageStatus::Failed;
                }
            }
        }
    }

    pub fn mark_recipient_missing(&self, msg: &mut Message, now: DateTime<Utc>) {
        msg.status = super::types::MessageStatus::Failed;
        msg.last_attempt_at = Some(now);
        msg.error = Some("recipient not found".to_owned());
    }

    /// Defensive backstop for a message found `queued` with its budget already
    /// spent (ordinarily `apply_outcome` already flipped it to `failed` the moment
    /// `retry_count` hit `max_retries`). Preserves whatever error the last attempt
    /// recorded rather than overwriting it.
    pub fn mark_exhausted(&self, msg: &mut Message, now: DateTime<Utc>) {
        msg.status = super::types::MessageStatus::Failed;
        msg.last_attempt_at = Some(now);
        if msg.error.is_none() {
            msg.error = Some("retry budget exhausted".to_owned());
        }
    }
}

impl Default for RetryScheduler {
    fn default() -> Self {
        Self::new(vec![60, 300, 900, 3600, 21600], 5)
    }
}
