//! Bounded waits at the three checkpoints of a run.

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::path::Path;
use std::time::Duration;

use crate::error::{MediaError, Result};
use crate::options::{RunOptions, TimeoutPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    /// Opening an input and resolving its video track.
    Discovery,
    /// The pull/push loop running to exhaustion.
    Drain,
    /// A sink flushing to disk.
    Finalize,
}

impl Display for Checkpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Checkpoint::Discovery => "loading video track",
            Checkpoint::Drain => "encoding",
            Checkpoint::Finalize => "writing output file",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
pub enum WaitOutcome<T> {
    Completed(T),
    ExceededBound,
}

/// Waits for `fut` for at most `ceiling`.
pub async fn bounded<F: Future>(ceiling: Duration, fut: F) -> WaitOutcome<F::Output> {
    match tokio::time::timeout(ceiling, fut).await {
        Ok(v) => WaitOutcome::Completed(v),
        Err(_) => WaitOutcome::ExceededBound,
    }
}

/// Waits at `checkpoint` under the run's ceiling and timeout policy.
///
/// `Ok(None)` is only returned for a lenient discovery or drain overrun.
pub async fn checkpoint<F: Future>(
    checkpoint: Checkpoint,
    options: &RunOptions,
    fut: F,
) -> Result<Option<F::Output>> {
    match bounded(options.wait_ceiling, fut).await {
        WaitOutcome::Completed(v) => Ok(Some(v)),
        WaitOutcome::ExceededBound => {
            let ceiling_secs = options.wait_ceiling.as_secs();
            let fatal = checkpoint == Checkpoint::Finalize
                || options.timeout_policy == TimeoutPolicy::Strict;
            if fatal {
                log::error!(
                    "{} exceeded the wait limit of {}s",
                    checkpoint,
                    ceiling_secs
                );
                Err(MediaError::TimeoutError {
                    checkpoint,
                    ceiling_secs,
                })
            } else {
                log::warn!(
                    "{} exceeded the wait limit of {}s, continuing",
                    checkpoint,
                    ceiling_secs
                );
                Ok(None)
            }
        }
    }
}

/// Waits for the pull/push loop under the drain checkpoint.
///
/// A lenient overrun keeps waiting past the ceiling, so the sinks still get
/// finalized. The flag is false when that happened.
pub(crate) async fn drain<F>(options: &RunOptions, mut fut: F) -> Result<(F::Output, bool)>
where
    F: Future + Unpin,
{
    match checkpoint(Checkpoint::Drain, options, &mut fut).await? {
        Some(v) => Ok((v, true)),
        None => {
            log::warn!("still waiting for the encoding loop to finish");
            Ok((fut.await, false))
        }
    }
}

/// Awaits a sink's finish future under the finalize checkpoint.
pub(crate) async fn finalize<F>(path: &Path, options: &RunOptions, finish: F) -> Result<()>
where
    F: Future<Output = anyhow::Result<()>>,
{
    match checkpoint(Checkpoint::Finalize, options, finish).await? {
        Some(Ok(())) => {
            log::info!("finished writing {}", path.display());
            Ok(())
        }
        Some(Err(e)) => {
            log::error!("could not finish writing {}: {:#}", path.display(), e);
            Err(MediaError::create_output(path, format!("{:#}", e)))
        }
        None => Err(MediaError::TimeoutError {
            checkpoint: Checkpoint::Finalize,
            ceiling_secs: options.wait_ceiling.as_secs(),
        }),
    }
}

/// Unwraps a blocking worker's join result, re-raising a worker panic.
pub(crate) fn joined<T>(
    result: std::result::Result<T, tokio::task::JoinError>,
    what: &str,
) -> anyhow::Result<T> {
    match result {
        Ok(v) => Ok(v),
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => Err(anyhow::anyhow!("{} worker did not complete: {}", what, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short() -> RunOptions {
        RunOptions::new().wait_ceiling(Duration::from_millis(20))
    }

    #[tokio::test]
    async fn completes_within_ceiling() {
        let v = checkpoint(Checkpoint::Drain, &short(), async { 7 }).await.unwrap();
        assert_eq!(v, Some(7));
    }

    #[tokio::test]
    async fn strict_overrun_is_a_timeout_error() {
        let err = checkpoint(Checkpoint::Discovery, &short(), futures::future::pending::<()>())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MediaError::TimeoutError {
                checkpoint: Checkpoint::Discovery,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn lenient_overrun_proceeds_except_for_finalize() {
        let options = short().timeout_policy(TimeoutPolicy::Lenient);
        let drain = checkpoint(Checkpoint::Drain, &options, futures::future::pending::<()>()).await;
        assert!(matches!(drain, Ok(None)));

        let finalize =
            checkpoint(Checkpoint::Finalize, &options, futures::future::pending::<()>()).await;
        assert!(matches!(
            finalize,
            Err(MediaError::TimeoutError {
                checkpoint: Checkpoint::Finalize,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn lenient_drain_waits_past_the_ceiling() {
        let options = short().timeout_policy(TimeoutPolicy::Lenient);
        let slow = Box::pin(async {
            tokio::time::sleep(Duration::from_millis(80)).await;
            5
        });
        let (v, within) = drain(&options, slow).await.unwrap();
        assert_eq!(v, 5);
        assert!(!within);

        let (v, within) = drain(&options, Box::pin(async { 6 })).await.unwrap();
        assert_eq!(v, 6);
        assert!(within);
    }
}
