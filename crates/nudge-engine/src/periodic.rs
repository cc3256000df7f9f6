//! Cancellable periodic triggers.
//!
//! A trigger runs its job once immediately and then every `period`. When the
//! token is cancelled the loop exits at the next tick boundary; a job that is
//! already running is allowed to finish.

use std::{future::Future, time::Duration};

use tokio::{
  task::JoinHandle,
  time::{MissedTickBehavior, interval},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub fn spawn_periodic<F, Fut>(
  name: &'static str,
  period: Duration,
  cancel: CancellationToken,
  mut job: F,
) -> JoinHandle<()>
where
  F: FnMut() -> Fut + Send + 'static,
  Fut: Future<Output = ()> + Send + 'static,
{
  tokio::spawn(async move {
    info!(task = name, period_secs = period.as_secs(), "periodic task started");
    let mut ticker = interval(period);
    // A slow job pushes the schedule back instead of causing a burst.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
      tokio::select! {
        biased;
        _ = cancel.cancelled() => break,
        _ = ticker.tick() => {}
      }
      debug!(task = name, "periodic task firing");
      job().await;
    }

    info!(task = name, "periodic task stopped");
  })
}

/// Wait up to `grace` for `handles` to finish, aborting whatever is left.
/// Returns whether everything finished in time.
pub async fn drain(handles: Vec<JoinHandle<()>>, grace: Duration) -> bool {
  let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();
  let joined = async {
    for handle in handles {
      if let Err(e) = handle.await
        && e.is_panic()
      {
        warn!(error = %e, "periodic task panicked");
      }
    }
  };

  match tokio::time::timeout(grace, joined).await {
    Ok(()) => true,
    Err(_) => {
      warn!(grace_secs = grace.as_secs(), "periodic tasks did not stop in time; aborting");
      for abort in aborts {
        abort.abort();
      }
      false
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  };

  use super::*;

  fn counting(counter: &Arc<AtomicUsize>) -> impl FnMut() -> std::future::Ready<()> + Send + 'static {
    let counter = counter.clone();
    move || {
      counter.fetch_add(1, Ordering::SeqCst);
      std::future::ready(())
    }
  }

  #[tokio::test(start_paused = true)]
  async fn fires_immediately_then_every_period() {
    let runs = Arc::new(AtomicUsize::new(0));
    let cancel = CancellationToken::new();
    let handle = spawn_periodic("test", Duration::from_secs(60), cancel.clone(), counting(&runs));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 3);

    cancel.cancel();
    assert!(drain(vec![handle], Duration::from_secs(5)).await);
  }

  #[tokio::test(start_paused = true)]
  async fn cancellation_stops_further_runs() {
    let runs = Arc::new(AtomicUsize::new(0));
    let cancel = CancellationToken::new();
    let handle = spawn_periodic("test", Duration::from_secs(10), cancel.clone(), counting(&runs));

    tokio::time::sleep(Duration::from_secs(1)).await;
    cancel.cancel();
    assert!(drain(vec![handle], Duration::from_secs(5)).await);

    tokio::time::sleep(Duration::from_secs(100)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn in_flight_job_finishes_before_stop() {
    let finished = Arc::new(AtomicUsize::new(0));
    let cancel = CancellationToken::new();
    let done = finished.clone();
    let handle = spawn_periodic("slow", Duration::from_secs(60), cancel.clone(), move || {
      let done = done.clone();
      async move {
        tokio::time::sleep(Duration::from_secs(3)).await;
        done.fetch_add(1, Ordering::SeqCst);
      }
    });

    tokio::time::sleep(Duration::from_secs(1)).await;
    cancel.cancel();
    assert!(drain(vec![handle], Duration::from_secs(10)).await);
    assert_eq!(finished.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn drain_gives_up_after_grace() {
    let cancel = CancellationToken::new();
    let handle = spawn_periodic("stuck", Duration::from_secs(60), cancel.clone(), || {
      std::future::pending::<()>()
    });

    tokio::time::sleep(Duration::from_secs(1)).await;
    cancel.cancel();
    assert!(!drain(vec![handle], Duration::from_secs(2)).await);
  }
}
