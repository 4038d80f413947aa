use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Handle to a running deadline. Dropping it does not cancel the deadline.
#[derive(Debug)]
pub struct DeadlineHandle {
    // Whoever flips this first owns the outcome: the timer thread firing or `cancel`.
    settled: Arc<AtomicBool>,
    cancel_tx: Sender<()>,
}

impl DeadlineHandle {
    /// Stop the deadline. Returns true if this call prevented the callback; false if
    /// the callback already ran (or is running) or the deadline was already cancelled.
    pub fn cancel(&self) -> bool {
        let won = self
            .settled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            // wake the timer thread early; it may already be gone
            let _ = self.cancel_tx.send(());
        }
        won
    }

    pub fn is_settled(&self) -> bool {
        self.settled.load(Ordering::Acquire)
    }
}

/// Run `on_expire` once after `duration` unless cancelled first.
pub fn start_deadline<F>(duration: Duration, on_expire: F) -> DeadlineHandle
where
    F: FnOnce() + Send + 'static,
{
    let settled = Arc::new(AtomicBool::new(false));
    let (cancel_tx, cancel_rx) = mpsc::channel::<()>();

    let guard = Arc::clone(&settled);
    std::thread::spawn(move || {
        let started = Instant::now();
        let cancelled = match cancel_rx.recv_timeout(duration) {
            Ok(()) => true,
            Err(RecvTimeoutError::Timeout) => false,
            // handle dropped without cancelling: the deadline still stands
            Err(RecvTimeoutError::Disconnected) => {
                std::thread::sleep(duration.saturating_sub(started.elapsed()));
                false
            }
        };
        if !cancelled
            && guard
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            on_expire();
        }
    });

    DeadlineHandle { settled, cancel_tx }
}
