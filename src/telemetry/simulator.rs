use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::{
    sync::{broadcast, RwLock},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;

use super::fleet::{Fleet, FleetSnapshot};

const UPDATE_CHANNEL_CAPACITY: usize = 16;

/// Applies one random-walk step to every reporting node and to the
/// weather station.
pub fn step<R: Rng + ?Sized>(fleet: &mut Fleet, rng: &mut R, now: DateTime<Utc>) {
    for node in fleet.nodes.iter_mut().filter(|node| node.online) {
        node.vibration = (node.vibration + jitter(rng, 5.0)).max(0.0);
        node.tilt = (node.tilt + jitter(rng, 0.25)).max(0.0);
        node.temperature += jitter(rng, 0.1);
        node.humidity = (node.humidity + jitter(rng, 1.0)).clamp(0.0, 100.0);
        node.last_update = now;
    }

    let weather = &mut fleet.weather;
    weather.temperature += jitter(rng, 0.1);
    weather.humidity = (weather.humidity + jitter(rng, 1.0)).clamp(0.0, 100.0);
    weather.wind_speed = (weather.wind_speed + jitter(rng, 0.5)).max(0.0);
    weather.pressure += jitter(rng, 0.2);

    fleet.tick += 1;
    fleet.updated_at = now;
}

fn jitter<R: Rng + ?Sized>(rng: &mut R, amplitude: f64) -> f64 {
    rng.gen_range(-amplitude..amplitude)
}

struct SimulationState {
    fleet: Fleet,
    rng: StdRng,
}

struct Inner {
    state: RwLock<SimulationState>,
    live: AtomicBool,
    /// Dropped on shutdown so that live subscribers see the feed end
    updates: Mutex<Option<broadcast::Sender<Arc<FleetSnapshot>>>>,
    cancel: CancellationToken,
}

/// Shared handle to the simulated sensor network.
///
/// Cloning is cheap; every clone drives and observes the same fleet. While
/// paused the fleet is frozen and no snapshots are published.
#[derive(Clone)]
pub struct Simulator {
    inner: Arc<Inner>,
}

impl Simulator {
    pub fn new(fleet: Fleet) -> Self {
        Self::with_rng(fleet, StdRng::from_entropy())
    }

    pub fn with_rng(fleet: Fleet, rng: StdRng) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(SimulationState { fleet, rng }),
                live: AtomicBool::new(true),
                updates: Mutex::new(Some(updates)),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Starts the background task that steps the fleet every `interval`.
    pub fn spawn(&self, interval: Duration) -> JoinHandle<()> {
        let simulator = self.clone();
        let cancel = self.inner.cancel.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            tracing::info!("Telemetry simulator started ({:?} interval)", interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        simulator.tick().await;
                    }
                }
            }
            tracing::info!("Telemetry simulator stopped");
        })
    }

    /// Performs a single step if the simulator is live and publishes the
    /// resulting snapshot. Returns `None` while paused.
    pub async fn tick(&self) -> Option<Arc<FleetSnapshot>> {
        if !self.is_live() {
            return None;
        }

        let snapshot = {
            let mut state = self.inner.state.write().await;
            let SimulationState { fleet, rng } = &mut *state;
            step(fleet, rng, Utc::now());
            Arc::new(fleet.clone())
        };

        if let Some(updates) = self.updates().as_ref() {
            // No receivers just means nobody is watching the live feed
            let _ = updates.send(snapshot.clone());
        }
        tracing::trace!("Simulator tick {}", snapshot.tick);
        Some(snapshot)
    }

    pub async fn snapshot(&self) -> FleetSnapshot {
        self.inner.state.read().await.fleet.clone()
    }

    /// Receiver for future snapshots. After shutdown the receiver is
    /// already closed.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<FleetSnapshot>> {
        match self.updates().as_ref() {
            Some(updates) => updates.subscribe(),
            None => broadcast::channel(1).1,
        }
    }

    fn updates(&self) -> std::sync::MutexGuard<'_, Option<broadcast::Sender<Arc<FleetSnapshot>>>> {
        self.inner
            .updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_live(&self) -> bool {
        self.inner.live.load(Ordering::SeqCst)
    }

    pub fn set_live(&self, live: bool) {
        let was_live = self.inner.live.swap(live, Ordering::SeqCst);
        if was_live != live {
            tracing::info!(
                "Live telemetry {}",
                if live { "resumed" } else { "paused" }
            );
        }
    }

    pub fn pause(&self) {
        self.set_live(false);
    }

    pub fn resume(&self) {
        self.set_live(true);
    }

    /// Stops the background task and closes every live subscription.
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.updates().take();
    }
}
