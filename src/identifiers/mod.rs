//! Identifier generation
//!
//! Account numbers, card numbers and CVVs are drawn from a [`CandidateSource`].
//! [`IdentifierGenerator`] owns the retry loop: it keeps drawing until the
//! caller's uniqueness check accepts a candidate.

use chrono::{Duration, NaiveDate};
use rand::Rng;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;

/// Card validity from the day of issue
pub const CARD_VALIDITY_DAYS: i64 = 1095;

/// Shape of a generated identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierFormat {
    /// `DDD-DDDDD`
    AccountNumber,
    /// 16 digits
    CardNumber,
    /// 3 digits
    Cvv,
}

impl IdentifierFormat {
    /// Check that `value` has this format
    pub fn matches(&self, value: &str) -> bool {
        let all_digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
        match self {
            IdentifierFormat::AccountNumber => match value.split_once('-') {
                Some((head, tail)) => {
                    head.len() == 3 && tail.len() == 5 && all_digits(head) && all_digits(tail)
                }
                None => false,
            },
            IdentifierFormat::CardNumber => value.len() == 16 && all_digits(value),
            IdentifierFormat::Cvv => value.len() == 3 && all_digits(value),
        }
    }
}

/// Where candidates come from
pub trait CandidateSource: Send + Sync {
    fn next_candidate(&self, format: IdentifierFormat) -> String;
}

/// Uniformly random digits from the thread-local RNG
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSource;

impl CandidateSource for RandomSource {
    fn next_candidate(&self, format: IdentifierFormat) -> String {
        let mut rng = rand::thread_rng();
        let mut digits = |n: usize| -> String {
            (0..n)
                .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
                .collect()
        };
        match format {
            IdentifierFormat::AccountNumber => {
                let branch = digits(3);
                let serial = digits(5);
                format!("{branch}-{serial}")
            }
            IdentifierFormat::CardNumber => digits(16),
            IdentifierFormat::Cvv => digits(3),
        }
    }
}

/// Replays a fixed list of candidates, then falls back to random draws.
/// Used to force collisions in tests.
#[derive(Debug, Default)]
pub struct SequenceSource {
    queue: Mutex<VecDeque<String>>,
}

impl SequenceSource {
    pub fn new<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            queue: Mutex::new(candidates.into_iter().map(Into::into).collect()),
        }
    }
}

impl CandidateSource for SequenceSource {
    fn next_candidate(&self, format: IdentifierFormat) -> String {
        let next = match self.queue.lock() {
            Ok(mut queue) => queue.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        };
        next.unwrap_or_else(|| RandomSource.next_candidate(format))
    }
}

/// Draws identifiers and retries until one is free
pub struct IdentifierGenerator {
    source: Box<dyn CandidateSource>,
}

impl IdentifierGenerator {
    pub fn new(source: impl CandidateSource + 'static) -> Self {
        Self {
            source: Box::new(source),
        }
    }

    /// Generator backed by [`RandomSource`]
    pub fn random() -> Self {
        Self::new(RandomSource)
    }

    /// Draw until `is_taken` rejects nothing. The loop is unbounded; with
    /// random digits a collision is rare and each retry is independent.
    pub fn next_unique(
        &self,
        format: IdentifierFormat,
        mut is_taken: impl FnMut(&str) -> bool,
    ) -> String {
        loop {
            let candidate = self.source.next_candidate(format);
            if !is_taken(&candidate) {
                return candidate;
            }
            tracing::debug!(?format, "Identifier collision, drawing again");
        }
    }

    /// Same as [`next_unique`](Self::next_unique) with an async, fallible check
    pub async fn next_unique_async<F, Fut, E>(
        &self,
        format: IdentifierFormat,
        mut is_taken: F,
    ) -> Result<String, E>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<bool, E>>,
    {
        loop {
            let candidate = self.source.next_candidate(format);
            if !is_taken(candidate.clone()).await? {
                return Ok(candidate);
            }
            tracing::debug!(?format, "Identifier collision, drawing again");
        }
    }

    /// CVVs need no uniqueness
    pub fn cvv(&self) -> String {
        self.source.next_candidate(IdentifierFormat::Cvv)
    }
}

impl Default for IdentifierGenerator {
    fn default() -> Self {
        Self::random()
    }
}

impl std::fmt::Debug for IdentifierGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentifierGenerator").finish_non_exhaustive()
    }
}

/// Expiration of a card issued on `issued`
pub fn default_expiration(issued: NaiveDate) -> NaiveDate {
    issued + Duration::days(CARD_VALIDITY_DAYS)
}
