//! Single-fire completion signal between the two tracks of one request.
//!
//! [`completion_signal`] returns a sender that can fire once (it is consumed)
//! and a waiter that any number of tasks can clone and wait on with a bound.

use std::time::Duration;
use tokio::sync::watch;

/// How a bounded wait ended.
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome<T> {
    /// The signal fired with this value.
    Ready(T),
    /// The bound elapsed first.
    TimedOut,
    /// The sender was dropped without firing.
    Abandoned,
}

pub struct CompletionSender<T> {
    tx: watch::Sender<Option<T>>,
}

#[derive(Clone)]
pub struct CompletionWaiter<T> {
    rx: watch::Receiver<Option<T>>,
}

/// Create a fresh sender/waiter pair.
pub fn completion_signal<T: Clone>() -> (CompletionSender<T>, CompletionWaiter<T>) {
    let (tx, rx) = watch::channel(None);
    (CompletionSender { tx }, CompletionWaiter { rx })
}

impl<T> CompletionSender<T> {
    /// Fire the signal. Waiters that already gave up are unaffected.
    pub fn fire(self, value: T) {
        self.tx.send_replace(Some(value));
    }
}

impl<T: Clone> CompletionWaiter<T> {
    /// Value if the signal has already fired.
    pub fn peek(&self) -> Option<T> {
        self.rx.borrow().clone()
    }

    /// Wait at most `bound` for the signal.
    pub async fn wait(&self, bound: Duration) -> WaitOutcome<T> {
        let mut rx = self.rx.clone();
        match tokio::time::timeout(bound, rx.wait_for(Option::is_some)).await {
            Ok(Ok(value)) => match value.clone() {
                Some(value) => WaitOutcome::Ready(value),
                None => WaitOutcome::Abandoned,
            },
            Ok(Err(_)) => WaitOutcome::Abandoned,
            Err(_) => WaitOutcome::TimedOut,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_returns_fired_value() {
        let (tx, rx) = completion_signal();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            tx.fire("Jimmy".to_string());
        });
        assert_eq!(
            rx.wait(Duration::from_secs(5)).await,
            WaitOutcome::Ready("Jimmy".to_string())
        );
    }

    #[tokio::test]
    async fn wait_after_fire_returns_immediately() {
        let (tx, rx) = completion_signal();
        tx.fire(7);
        assert_eq!(rx.peek(), Some(7));
        assert_eq!(rx.wait(Duration::ZERO).await, WaitOutcome::Ready(7));
    }

    #[tokio::test]
    async fn wait_times_out() {
        let (_tx, rx) = completion_signal::<u32>();
        assert_eq!(
            rx.wait(Duration::from_millis(20)).await,
            WaitOutcome::TimedOut
        );
        assert_eq!(rx.peek(), None);
    }

    #[tokio::test]
    async fn dropped_sender_abandons_waiters() {
        let (tx, rx) = completion_signal::<u32>();
        drop(tx);
        assert_eq!(rx.wait(Duration::from_secs(5)).await, WaitOutcome::Abandoned);
    }

    #[tokio::test]
    async fn every_waiter_sees_the_value() {
        let (tx, rx) = completion_signal();
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let rx = rx.clone();
                tokio::spawn(async move { rx.wait(Duration::from_secs(5)).await })
            })
            .collect();
        tx.fire(42u8);
        for waiter in waiters {
            assert_eq!(waiter.await.unwrap(), WaitOutcome::Ready(42));
        }
    }

    #[tokio::test]
    async fn late_fire_after_timeout_is_harmless() {
        let (tx, rx) = completion_signal();
        assert_eq!(rx.wait(Duration::from_millis(5)).await, WaitOutcome::TimedOut);
        tx.fire(1u8);
        assert_eq!(rx.peek(), Some(1));
    }
}
