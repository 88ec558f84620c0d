//! Release gate session.
//!
//! `DownloadGate` is what a presentation layer talks to: `present` starts the
//! countdown for a product, `close` tears it down, and `retry_download`
//! runs delivery again once an attempt has finished. Progress comes back as
//! `GateEvent`s on the channel returned by `DownloadGate::new`.

use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::countdown::{Countdown, Tick, TICK_INTERVAL};
use crate::delivery::{DeliveryOrchestrator, DeliveryOutcome};
use crate::product::Product;

/// Notifications for the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateEvent {
    /// Seconds left before delivery starts
    Tick { remaining: u32 },
    /// Countdown is over (or a retry was requested); preparing the download
    DeliveryStarted,
    DeliverySucceeded { filename: String },
    DeliveryFailed { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatePhase {
    /// Nothing presented yet
    Idle,
    /// Counting down
    Waiting,
    /// Delivery in flight
    Preparing,
    Delivered,
    Failed,
    Closed,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum GateError {
    #[error("no product has been presented")]
    NotPresented,
    #[error("download unlocks in {remaining}s")]
    StillWaiting { remaining: u32 },
    #[error("a download is already in progress")]
    DeliveryInFlight,
    #[error("the download gate has been closed")]
    Closed,
}

struct GateState {
    product: Option<Product>,
    countdown: Countdown,
    phase: GatePhase,
    delivery_complete: bool,
    /// Bumped on every present/close so stale tasks can tell they are stale.
    generation: u64,
}

impl GateState {
    fn is_current(&self, generation: u64) -> bool {
        self.generation == generation && self.phase != GatePhase::Closed
    }
}

struct Ticker {
    cancel: CancellationToken,
}

/// Shared pieces handed to background tasks.
#[derive(Clone)]
struct GateContext {
    orchestrator: Arc<DeliveryOrchestrator>,
    state: Arc<Mutex<GateState>>,
    events_tx: mpsc::UnboundedSender<GateEvent>,
}

pub struct DownloadGate {
    ctx: GateContext,
    ticker: Mutex<Option<Ticker>>,
}

impl DownloadGate {
    pub fn new(
        orchestrator: Arc<DeliveryOrchestrator>,
    ) -> (Self, mpsc::UnboundedReceiver<GateEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let state = GateState {
            product: None,
            countdown: Countdown::new(),
            phase: GatePhase::Idle,
            delivery_complete: false,
            generation: 0,
        };
        let gate = Self {
            ctx: GateContext {
                orchestrator,
                state: Arc::new(Mutex::new(state)),
                events_tx,
            },
            ticker: Mutex::new(None),
        };
        (gate, events_rx)
    }

    pub fn phase(&self) -> GatePhase {
        self.ctx.state.lock().unwrap().phase
    }

    pub fn remaining(&self) -> u32 {
        self.ctx.state.lock().unwrap().countdown.remaining()
    }

    pub fn delivery_complete(&self) -> bool {
        self.ctx.state.lock().unwrap().delivery_complete
    }

    /// Start a fresh countdown for `product`, replacing any current one.
    ///
    /// Must be called from within a tokio runtime.
    pub fn present(&self, product: Product) {
        self.stop_ticker();

        let (generation, remaining) = {
            let mut state = self.ctx.state.lock().unwrap();
            info!("Presenting product {} ({})", product.id, product.title);
            state.product = Some(product);
            state.countdown = Countdown::new();
            state.phase = GatePhase::Waiting;
            state.delivery_complete = false;
            state.generation += 1;
            (state.generation, state.countdown.remaining())
        };

        let _ = self.ctx.events_tx.send(GateEvent::Tick { remaining });

        let cancel = CancellationToken::new();
        tokio::spawn(run_countdown(self.ctx.clone(), cancel.clone(), generation));
        *self.ticker.lock().unwrap() = Some(Ticker { cancel });
    }

    /// Tear down the presentation. A pending countdown never fires after
    /// this; a delivery already in flight runs to completion silently.
    pub fn close(&self) {
        self.stop_ticker();
        let mut state = self.ctx.state.lock().unwrap();
        if state.phase == GatePhase::Idle || state.phase == GatePhase::Closed {
            return;
        }
        state.countdown.cancel();
        state.phase = GatePhase::Closed;
        state.product = None;
        state.generation += 1;
        debug!("Download gate closed");
    }

    /// Run delivery again ("download again" / "retry").
    ///
    /// Only allowed once the countdown has fired and no attempt is running.
    pub async fn retry_download(&self) -> Result<DeliveryOutcome, GateError> {
        let generation = {
            let mut state = self.ctx.state.lock().unwrap();
            match state.phase {
                GatePhase::Idle => return Err(GateError::NotPresented),
                GatePhase::Closed => return Err(GateError::Closed),
                GatePhase::Waiting => {
                    return Err(GateError::StillWaiting {
                        remaining: state.countdown.remaining(),
                    })
                }
                GatePhase::Preparing => return Err(GateError::DeliveryInFlight),
                GatePhase::Delivered | GatePhase::Failed => {}
            }
            state.delivery_complete = false;
            state.phase = GatePhase::Preparing;
            state.generation
        };

        info!("Retrying download");
        run_delivery(&self.ctx, generation)
            .await
            .ok_or(GateError::Closed)
    }

    fn stop_ticker(&self) {
        if let Some(ticker) = self.ticker.lock().unwrap().take() {
            ticker.cancel.cancel();
        }
    }
}

impl Drop for DownloadGate {
    fn drop(&mut self) {
        self.stop_ticker();
    }
}

async fn run_countdown(ctx: GateContext, cancel: CancellationToken, generation: u64) {
    let mut interval = interval_at(Instant::now() + TICK_INTERVAL, TICK_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Countdown cancelled");
                return;
            }
            _ = interval.tick() => {}
        }

        let tick = {
            let mut state = ctx.state.lock().unwrap();
            if !state.is_current(generation) {
                return;
            }
            let delivery_complete = state.delivery_complete;
            let tick = state.countdown.tick(delivery_complete);
            if tick == Tick::Fire {
                state.phase = GatePhase::Preparing;
            }
            tick
        };

        match tick {
            Tick::Waiting(remaining) => {
                let _ = ctx.events_tx.send(GateEvent::Tick { remaining });
            }
            Tick::Fire => {
                let _ = ctx.events_tx.send(GateEvent::Tick { remaining: 0 });
                run_delivery(&ctx, generation).await;
                return;
            }
            Tick::Idle => return,
        }
    }
}

/// One delivery attempt. `None` if the gate was closed or re-presented
/// before the attempt started or while it was running.
async fn run_delivery(ctx: &GateContext, generation: u64) -> Option<DeliveryOutcome> {
    let product = {
        let mut state = ctx.state.lock().unwrap();
        if !state.is_current(generation) {
            return None;
        }
        state.phase = GatePhase::Preparing;
        state.product.clone()?
    };

    let _ = ctx.events_tx.send(GateEvent::DeliveryStarted);
    let outcome = ctx.orchestrator.deliver(&product).await;

    {
        let mut state = ctx.state.lock().unwrap();
        if !state.is_current(generation) {
            debug!("Gate closed during delivery of {}; dropping outcome", product.id);
            return Some(outcome);
        }
        match &outcome {
            DeliveryOutcome::Success { .. } => {
                state.delivery_complete = true;
                state.phase = GatePhase::Delivered;
            }
            DeliveryOutcome::Failure(_) => {
                state.delivery_complete = false;
                state.phase = GatePhase::Failed;
            }
        }
    }

    let event = match &outcome {
        DeliveryOutcome::Success { filename } => GateEvent::DeliverySucceeded {
            filename: filename.clone(),
        },
        DeliveryOutcome::Failure(err) => {
            warn!("Delivery of {} failed: {:?}", product.id, err);
            GateEvent::DeliveryFailed {
                reason: err.to_string(),
            }
        }
    };
    let _ = ctx.events_tx.send(event);
    Some(outcome)
}
