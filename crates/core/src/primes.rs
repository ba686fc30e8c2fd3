//! Prime generation, the pluggable compute step of a job.

use tokio_util::sync::CancellationToken;

/// Failure modes of a prime computation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ComputeError {
    #[error("computation was cancelled")]
    Cancelled,

    #[error("candidate overflowed u64 after {found} primes")]
    Overflow { found: usize },

    #[error("computation failed: {0}")]
    Failed(String),
}

/// Computes the first `count` primes in increasing order.
///
/// Implementations run on a blocking thread and must poll `cancel`
/// often enough for cancellation to be prompt.
pub trait PrimeComputer: Send + Sync {
    fn compute_primes(
        &self,
        count: u32,
        cancel: &CancellationToken,
    ) -> Result<Vec<u64>, ComputeError>;
}

/// Trial division up to the square root of each candidate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrialDivision;

impl TrialDivision {
    pub fn is_prime(candidate: u64) -> bool {
        if candidate < 2 {
            return false;
        }
        let mut divisor = 2u64;
        while divisor.saturating_mul(divisor) <= candidate {
            if candidate % divisor == 0 {
                return false;
            }
            divisor += 1;
        }
        true
    }
}

impl PrimeComputer for TrialDivision {
    fn compute_primes(
        &self,
        count: u32,
        cancel: &CancellationToken,
    ) -> Result<Vec<u64>, ComputeError> {
        let count = count as usize;
        let mut primes = Vec::with_capacity(count);
        let mut candidate = 2u64;

        while primes.len() < count {
            if cancel.is_cancelled() {
                return Err(ComputeError::Cancelled);
            }
            if Self::is_prime(candidate) {
                primes.push(candidate);
            }
            candidate = candidate
                .checked_add(1)
                .ok_or(ComputeError::Overflow { found: primes.len() })?;
        }

        Ok(primes)
    }
}
