//! Fixed-interval polling against an absolute deadline.
//!
//! [`poll_until`] repeats an attempt until it reports a value, fails, or
//! the deadline passes. Time comes from [`tokio::time`], so tests can run
//! it on a paused clock without real sleeping.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

/// Why [`poll_until`] stopped without a value.
#[derive(Debug)]
pub enum PollError<E> {
    /// An attempt failed; polling stops immediately.
    Failed(E),
    /// The deadline passed before any attempt was ready.
    DeadlineExceeded { attempts: u32, waited: Duration },
}

/// Value produced by a successful [`poll_until`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Polled<T> {
    pub value: T,
    /// Number of attempts made, including the successful one.
    pub attempts: u32,
    pub waited: Duration,
}

/// Call `attempt` every `interval` until it yields `Ok(Some(_))`.
///
/// The deadline is `now + timeout`. An attempt is only started while the
/// deadline has not passed, so a zero timeout makes no attempts at all.
/// `Ok(None)` means "not ready yet"; any `Err` ends polling at once.
/// The attempt closure receives the 1-based attempt number.
pub async fn poll_until<T, E, F, Fut>(
    interval: Duration,
    timeout: Duration,
    mut attempt: F,
) -> Result<Polled<T>, PollError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let started = Instant::now();
    let deadline = started + timeout;
    let mut attempts = 0u32;

    while Instant::now() < deadline {
        attempts += 1;
        match attempt(attempts).await {
            Ok(Some(value)) => {
                return Ok(Polled {
                    value,
                    attempts,
                    waited: started.elapsed(),
                })
            }
            Ok(None) => {}
            Err(e) => return Err(PollError::Failed(e)),
        }
        tokio::time::sleep(interval).await;
    }

    Err(PollError::DeadlineExceeded {
        attempts,
        waited: started.elapsed(),
    })
}
