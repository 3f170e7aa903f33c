//! Unique reservation code generation.

use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use reserva_domain::{ReservationCode, ReservationStore, StoreError};
use std::sync::Arc;
use thiserror::Error;

/// Default number of generate-and-check attempts.
pub const DEFAULT_MAX_RETRIES: usize = 1_000;

/// Errors from code generation.
#[derive(Error, Debug)]
pub enum CodeGenerationError {
    /// Every attempt collided with an existing code.
    #[error("unable to generate a unique reservation code within {attempts} attempts")]
    Exhausted {
        /// How many candidates were tried.
        attempts: usize,
    },

    /// The uniqueness probe failed.
    #[error("store error while checking code uniqueness")]
    Store(#[from] StoreError),
}

/// Injectable candidate source; the default draws from [`OsRng`].
pub type CodeSource = Arc<dyn Fn() -> String + Send + Sync>;

/// Generate a globally unique 8-character alphanumeric reservation code.
///
/// Candidates come from a cryptographically strong random source and are
/// checked against the store's uniqueness predicate. Generation retries
/// sequentially on collision, never reusing a failed candidate, and gives up
/// after `max_retries` attempts.
///
/// # Example
///
/// ```ignore
/// let generate = GenerateReservationCode::new(store);
/// let code = generate.execute().await?;
/// assert_eq!(code.as_str().len(), 8);
/// ```
pub struct GenerateReservationCode {
    store: Arc<dyn ReservationStore>,
    code_source: CodeSource,
    max_retries: usize,
}

impl GenerateReservationCode {
    /// Create a generator with the default random source and retry cap.
    #[must_use]
    pub fn new(store: Arc<dyn ReservationStore>) -> Self {
        Self {
            store,
            code_source: Arc::new(random_code),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Override the candidate source (test-friendly).
    #[must_use]
    pub fn with_code_source(mut self, code_source: CodeSource) -> Self {
        self.code_source = code_source;
        self
    }

    /// Override the retry cap.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Produce a unique code, retrying on collisions.
    ///
    /// # Errors
    ///
    /// - [`CodeGenerationError::Exhausted`] when every candidate collided
    /// - [`CodeGenerationError::Store`] when the uniqueness probe fails
    pub async fn execute(&self) -> Result<ReservationCode, CodeGenerationError> {
        for attempt in 0..self.max_retries {
            let candidate = (self.code_source)();
            let Ok(code) = ReservationCode::new(candidate) else {
                // A malformed candidate burns an attempt, same as a collision.
                continue;
            };
            if !self.store.exists_code(code.clone()).await? {
                if attempt > 0 {
                    tracing::debug!(attempt, "reservation code generated after collisions");
                }
                return Ok(code);
            }
        }
        Err(CodeGenerationError::Exhausted {
            attempts: self.max_retries,
        })
    }
}

/// Draw an 8-character alphanumeric code from the OS random source.
#[must_use]
pub fn random_code() -> String {
    (0..ReservationCode::LENGTH)
        .map(|_| char::from(OsRng.sample(Alphanumeric)))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use reserva_domain::ReservationStore as _;
    use reserva_testing::{InMemoryStore, ReservationFixture};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn random_code_has_the_right_shape() {
        for _ in 0..100 {
            let code = random_code();
            assert_eq!(code.len(), 8);
            assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[tokio::test]
    async fn returns_a_valid_code_on_first_attempt() {
        let store = Arc::new(InMemoryStore::new());
        let generate = GenerateReservationCode::new(store);
        let code = generate.execute().await.unwrap();
        assert_eq!(code.as_str().len(), 8);
    }

    #[tokio::test]
    async fn retries_past_collisions() {
        let store = Arc::new(InMemoryStore::new());
        let taken = ReservationFixture::new("TAKEN123").build();
        {
            let mut tx = store.begin().await.unwrap();
            tx.save_reservation(taken).await.unwrap();
            tx.commit().await.unwrap();
        }

        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let source: CodeSource = Arc::new(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                "TAKEN123".to_string()
            } else {
                "FRESH456".to_string()
            }
        });

        let generate = GenerateReservationCode::new(store).with_code_source(source);
        let code = generate.execute().await.unwrap();
        assert_eq!(code.as_str(), "FRESH456");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn malformed_candidates_burn_attempts_without_reuse() {
        let store = Arc::new(InMemoryStore::new());
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let source: CodeSource = Arc::new(move || {
            if counter.fetch_add(1, Ordering::SeqCst) < 3 {
                "bad code".to_string()
            } else {
                "GOOD0000".to_string()
            }
        });

        let generate = GenerateReservationCode::new(store).with_code_source(source);
        let code = generate.execute().await.unwrap();
        assert_eq!(code.as_str(), "GOOD0000");
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn exhaustion_reports_the_attempt_budget() {
        let store = Arc::new(InMemoryStore::new());
        let taken = ReservationFixture::new("TAKEN123").build();
        {
            let mut tx = store.begin().await.unwrap();
            tx.save_reservation(taken).await.unwrap();
            tx.commit().await.unwrap();
        }

        let source: CodeSource = Arc::new(|| "TAKEN123".to_string());
        let generate = GenerateReservationCode::new(store)
            .with_code_source(source)
            .with_max_retries(5);

        let err = generate.execute().await.unwrap_err();
        assert!(matches!(err, CodeGenerationError::Exhausted { attempts: 5 }));
    }
}
