//! Non-overlapping poll loops.
//!
//! A [`PollGate`] hands out at most one [`PollTicket`] at a time; ticks that
//! arrive while a ticket is outstanding are dropped rather than queued. Every
//! ticket carries a sequence number and only the latest issued sequence may
//! apply its response, so a poll that was superseded by a manual refresh
//! cannot overwrite newer state when its response finally lands.

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::{
    backend::BackendClient,
    reconciler::{NotificationManager, ReconcileError, ReconcileReport},
    store::SqliteStore,
    surface::MemorySurface,
    utils::now_ts,
};

#[derive(Debug, Default)]
struct GateState {
    issued: u64,
    in_flight: Option<u64>,
}

#[derive(Debug, Default)]
pub struct PollGate {
    state: Mutex<GateState>,
}

impl PollGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Returns `None` while another poll is in flight.
    pub fn try_begin(self: &Arc<Self>) -> Option<PollTicket> {
        let mut st = self.state.lock();
        if st.in_flight.is_some() {
            return None;
        }
        st.issued += 1;
        st.in_flight = Some(st.issued);
        Some(PollTicket {
            gate: self.clone(),
            seq: st.issued,
        })
    }

    /// Issues a ticket unconditionally. Any outstanding ticket becomes stale.
    pub fn supersede(self: &Arc<Self>) -> PollTicket {
        let mut st = self.state.lock();
        st.issued += 1;
        st.in_flight = Some(st.issued);
        PollTicket {
            gate: self.clone(),
            seq: st.issued,
        }
    }

    pub fn in_flight(&self) -> bool {
        self.state.lock().in_flight.is_some()
    }

    pub fn latest_seq(&self) -> u64 {
        self.state.lock().issued
    }
}

/// Held for the duration of one poll. Dropping it releases the gate, on success and failure alike.
#[derive(Debug)]
pub struct PollTicket {
    gate: Arc<PollGate>,
    seq: u64,
}

impl PollTicket {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn is_current(&self) -> bool {
        self.gate.state.lock().issued == self.seq
    }
}

impl Drop for PollTicket {
    fn drop(&mut self) {
        let mut st = self.gate.state.lock();
        if st.in_flight == Some(self.seq) {
            st.in_flight = None;
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum PollOutcome {
    Applied(ReconcileReport),
    /// A newer poll was issued while this one was in flight.
    Stale { seq: u64 },
    FetchFailed,
    Rejected(ReconcileError),
}

pub type SharedManager = Arc<Mutex<NotificationManager<MemorySurface>>>;

#[derive(Clone)]
pub struct NotificationPoller {
    backend: BackendClient,
    store: SqliteStore,
    manager: SharedManager,
    gate: Arc<PollGate>,
    fatal_tx: mpsc::UnboundedSender<ReconcileError>,
}

impl NotificationPoller {
    pub fn new(
        backend: BackendClient,
        store: SqliteStore,
        manager: SharedManager,
    ) -> (Self, mpsc::UnboundedReceiver<ReconcileError>) {
        let (fatal_tx, fatal_rx) = mpsc::unbounded_channel();
        (
            Self {
                backend,
                store,
                manager,
                gate: PollGate::new(),
                fatal_tx,
            },
            fatal_rx,
        )
    }

    pub fn manager(&self) -> &SharedManager {
        &self.manager
    }

    pub fn gate(&self) -> &Arc<PollGate> {
        &self.gate
    }

    /// Fetches and reconciles under `ticket`. Reconcile errors are forwarded to the loop as fatal.
    pub async fn poll_once(&self, ticket: PollTicket) -> PollOutcome {
        let records = match self.backend.fetch_notifications().await {
            Ok(r) => r,
            Err(e) => {
                log::warn!("notifications.poll.failed seq={} err={}", ticket.seq(), e);
                self.store
                    .upsert_runtime_status(
                        "notifications",
                        "error",
                        "fetch_failed",
                        Some(&e.to_string()),
                        now_ts(),
                    )
                    .ok();
                return PollOutcome::FetchFailed;
            }
        };

        // Staleness is decided under the manager lock so a supersede cannot slip in between.
        let result = {
            let mut manager = self.manager.lock();
            if !ticket.is_current() {
                log::debug!("notifications.poll.stale seq={} latest={}", ticket.seq(), self.gate.latest_seq());
                return PollOutcome::Stale { seq: ticket.seq() };
            }
            manager.reconcile(&records)
        };
        match result {
            Ok(report) => {
                self.store
                    .upsert_runtime_status(
                        "notifications",
                        "ok",
                        &format!("live {}", records.len()),
                        None,
                        now_ts(),
                    )
                    .ok();
                PollOutcome::Applied(report)
            }
            Err(e) => {
                self.store
                    .upsert_runtime_status("notifications", "error", "reconcile_failed", Some(&e.to_string()), now_ts())
                    .ok();
                let _ = self.fatal_tx.send(e.clone());
                PollOutcome::Rejected(e)
            }
        }
    }

    /// Starts a poll that overrides whatever is in flight.
    pub fn refresh(&self) -> u64 {
        let ticket = self.gate.supersede();
        let seq = ticket.seq();
        let poller = self.clone();
        tokio::spawn(async move {
            poller.poll_once(ticket).await;
        });
        seq
    }

    /// Runs until a reconciliation error surfaces; that error is returned.
    pub async fn run(
        self,
        every: Duration,
        mut fatal_rx: mpsc::UnboundedReceiver<ReconcileError>,
    ) -> Result<()> {
        let mut tick = tokio::time::interval(every);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        log::info!("notifications.loop.start every_ms={}", every.as_millis());

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let Some(ticket) = self.gate.try_begin() else {
                        log::debug!("notifications.poll.skipped in_flight=true");
                        continue;
                    };
                    let poller = self.clone();
                    tokio::spawn(async move {
                        poller.poll_once(ticket).await;
                    });
                }
                Some(err) = fatal_rx.recv() => {
                    return Err(anyhow::Error::new(err).context("notification reconciliation"));
                }
            }
        }
    }
}

/// Sweeps expired transitions off the surface.
pub async fn run_sweeper(manager: SharedManager, every: Duration) {
    let mut tick = tokio::time::interval(every);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tick.tick().await;
        let dropped = manager.lock().surface_mut().sweep(std::time::Instant::now());
        if dropped > 0 {
            log::debug!("surface.sweep detached={}", dropped);
        }
    }
}
