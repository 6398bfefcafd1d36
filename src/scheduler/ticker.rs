//! Tick sources for the scheduler loop.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Drives the scheduler loop.
#[async_trait]
pub trait Ticker: Send + 'static {
    /// Wait for the next tick. Returns false once no more ticks will come.
    async fn tick(&mut self) -> bool;
}

/// Wall-clock ticker. The first tick fires one full period after creation.
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    /// Create a ticker with the given period. Must be called inside a Tokio runtime.
    pub fn new(period: Duration) -> Self {
        let period = period.max(Duration::from_millis(1));
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval }
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) -> bool {
        self.interval.tick().await;
        true
    }
}

/// Ticker fired by hand through a [`TickHandle`].
pub struct ManualTicker {
    requests: mpsc::Receiver<oneshot::Sender<()>>,
    /// Acknowledgement for the tick currently being processed.
    in_flight: Option<oneshot::Sender<()>>,
}

/// Fires ticks on a [`ManualTicker`].
#[derive(Clone)]
pub struct TickHandle {
    requests: mpsc::Sender<oneshot::Sender<()>>,
}

impl ManualTicker {
    /// Create a manual ticker and the handle that fires it.
    pub fn channel() -> (TickHandle, Self) {
        let (tx, rx) = mpsc::channel(1);
        (
            TickHandle { requests: tx },
            Self {
                requests: rx,
                in_flight: None,
            },
        )
    }
}

#[async_trait]
impl Ticker for ManualTicker {
    async fn tick(&mut self) -> bool {
        // Being polled again means the previous tick has been fully handled.
        if let Some(ack) = self.in_flight.take() {
            let _ = ack.send(());
        }

        match self.requests.recv().await {
            Some(ack) => {
                self.in_flight = Some(ack);
                true
            }
            None => false,
        }
    }
}

impl TickHandle {
    /// Fire one tick and wait until the loop has finished handling it.
    ///
    /// Returns false if the ticker is no longer driven by a running loop.
    pub async fn tick(&self) -> bool {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.requests.send(ack_tx).await.is_err() {
            return false;
        }
        ack_rx.await.is_ok()
    }
}
