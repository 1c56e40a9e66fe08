// src/session/countdown.rs

use std::time::Duration;

use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

/// A repeating timer owned by exactly one session.
///
/// Each period it pushes `()` into the channel it was started with. The
/// schedule stops when `cancel` is called, when the handle is dropped, or
/// when the receiving side goes away.
#[derive(Debug)]
pub struct Countdown {
    task: Option<JoinHandle<()>>,
}

impl Countdown {
    /// Starts ticking. The first tick fires one full `period` from now.
    pub fn start(period: Duration, ticks: mpsc::Sender<()>) -> Self {
        let task = tokio::spawn(async move {
            let mut interval = time::interval_at(time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if ticks.send(()).await.is_err() {
                    break;
                }
            }
        });

        Self { task: Some(task) }
    }

    /// Stops the schedule. Calling it again is a no-op.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!("Countdown cancelled");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ticks_until_cancelled() {
        let (tx, mut rx) = mpsc::channel(1);
        let mut countdown = Countdown::start(Duration::from_millis(2), tx);

        for _ in 0..3 {
            rx.recv().await.unwrap();
        }
        assert!(countdown.is_running());

        countdown.cancel();
        assert!(!countdown.is_running());

        // At most one tick was already buffered; after that the channel closes.
        let mut drained = 0;
        while rx.recv().await.is_some() {
            drained += 1;
        }
        assert!(drained <= 1);
    }

    #[tokio::test]
    async fn dropping_the_handle_stops_it() {
        let (tx, mut rx) = mpsc::channel(1);
        drop(Countdown::start(Duration::from_millis(1), tx));
        let mut drained = 0;
        while rx.recv().await.is_some() {
            drained += 1;
        }
        assert!(drained <= 1);
    }
}
