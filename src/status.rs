use std::{sync::Arc, time::Duration};

use parking_lot::RwLock;
use serde::Serialize;

use crate::{
    backend::BackendClient,
    models::AppStatus,
    poller::{PollGate, PollTicket},
    store::SqliteStore,
    utils::{clock_label, now_ts},
};

/// What the status bar shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub events: u64,
    pub notifications: u64,
    pub heavy_load: &'static str,
    pub error: &'static str,
    /// Tooltip for the error indicator.
    pub error_title: Option<String>,
    pub checked_at: String,
}

impl StatusSnapshot {
    pub fn from_status(s: &AppStatus, checked_at: String) -> Self {
        Self {
            events: s.status.events,
            notifications: s.status.notifications,
            heavy_load: yes_no(s.heavy_load),
            error: yes_no(s.error.is_some()),
            error_title: s.error.as_ref().map(|e| e.error_class.clone()),
            checked_at,
        }
    }
}

fn yes_no(b: bool) -> &'static str {
    if b {
        "yes"
    } else {
        "no"
    }
}

#[derive(Clone)]
pub struct StatusMonitor {
    backend: BackendClient,
    store: SqliteStore,
    latest: Arc<RwLock<Option<StatusSnapshot>>>,
    gate: Arc<PollGate>,
}

impl StatusMonitor {
    pub fn new(backend: BackendClient, store: SqliteStore) -> Self {
        Self {
            backend,
            store,
            latest: Arc::new(RwLock::new(None)),
            gate: PollGate::new(),
        }
    }

    pub fn latest(&self) -> Option<StatusSnapshot> {
        self.latest.read().clone()
    }

    /// A failed fetch keeps the previous snapshot.
    pub async fn poll_once(&self, ticket: PollTicket) -> bool {
        match self.backend.fetch_status().await {
            Ok(s) => {
                let mut latest = self.latest.write();
                if !ticket.is_current() {
                    return false;
                }
                let snap = StatusSnapshot::from_status(&s, clock_label());
                self.store
                    .upsert_runtime_status(
                        "status",
                        "ok",
                        &format!("events={} notifications={}", snap.events, snap.notifications),
                        snap.error_title.as_deref(),
                        now_ts(),
                    )
                    .ok();
                *latest = Some(snap);
                true
            }
            Err(e) => {
                log::warn!("status.poll.failed err={}", e);
                self.store
                    .upsert_runtime_status("status", "error", "fetch_failed", Some(&e.to_string()), now_ts())
                    .ok();
                false
            }
        }
    }

    pub async fn run(self, every: Duration) {
        let mut tick = tokio::time::interval(every);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            let Some(ticket) = self.gate.try_begin() else {
                log::debug!("status.poll.skipped in_flight=true");
                continue;
            };
            let monitor = self.clone();
            tokio::spawn(async move {
                monitor.poll_once(ticket).await;
            });
        }
    }

    #[cfg(test)]
    pub fn gate(&self) -> &Arc<PollGate> {
        &self.gate
    }
}
