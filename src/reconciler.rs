//! Diffs each poll's notification batch against the views currently on the surface.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use thiserror::Error;

use crate::{
    models::NotificationRecord,
    notification::NotificationView,
    surface::{Mutation, NotificationSurface},
};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("notification id {0} appears more than once in one poll response")]
    DuplicateId(String),
    #[error("tracked state diverged after reconcile: records={records} ids={ids} views={views}")]
    Invariant {
        records: usize,
        ids: usize,
        views: usize,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileReport {
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub removed: Vec<String>,
    pub mutations: usize,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.mutations == 0
    }
}

/// Sole owner of the id -> view mapping.
pub struct NotificationManager<S> {
    views: HashMap<String, NotificationView>,
    ids: HashSet<String>,
    surface: S,
    sound_min_uptime: Option<u64>,
}

impl<S: NotificationSurface> NotificationManager<S> {
    pub fn new(surface: S, sound_min_uptime: Option<u64>) -> Self {
        Self {
            views: HashMap::new(),
            ids: HashSet::new(),
            surface,
            sound_min_uptime,
        }
    }

    pub fn reconcile(&mut self, records: &[NotificationRecord]) -> Result<ReconcileReport, ReconcileError> {
        let mut incoming: HashSet<&str> = HashSet::with_capacity(records.len());
        for r in records {
            if !incoming.insert(r.id.as_str()) {
                return Err(ReconcileError::DuplicateId(r.id.clone()));
            }
        }

        let (known, mut fresh): (Vec<&NotificationRecord>, Vec<&NotificationRecord>) =
            records.iter().partition(|r| self.ids.contains(&r.id));
        let gone: Vec<String> = self
            .ids
            .iter()
            .filter(|id| !incoming.contains(id.as_str()))
            .cloned()
            .collect();

        let mut report = ReconcileReport::default();

        // Longest-running first; each one is prepended.
        fresh.sort_by(|a, b| b.uptime_seconds.cmp(&a.uptime_seconds));
        for r in fresh {
            let (view, muts) = NotificationView::create(r, self.sound_min_uptime);
            report.mutations += self.emit(muts);
            self.ids.insert(r.id.clone());
            self.views.insert(r.id.clone(), view);
            report.added.push(r.id.clone());
        }

        for r in known {
            let Some(view) = self.views.get_mut(&r.id) else {
                continue;
            };
            let muts = view.update(r, self.sound_min_uptime);
            if !muts.is_empty() {
                report.updated.push(r.id.clone());
                report.mutations += muts.len();
                for m in muts {
                    self.surface.apply(m);
                }
            }
        }

        for id in gone {
            // Freed immediately so the id can come back as new while the old node fades out.
            self.ids.remove(&id);
            self.views.remove(&id);
            self.surface.apply(Mutation::Detach { id: id.clone() });
            report.mutations += 1;
            report.removed.push(id);
        }

        if self.ids.len() != records.len() || self.views.len() != records.len() {
            let err = ReconcileError::Invariant {
                records: records.len(),
                ids: self.ids.len(),
                views: self.views.len(),
            };
            log::error!("notifications.reconcile.invariant {}", err);
            return Err(err);
        }

        if !report.is_noop() {
            log::debug!(
                "notifications.reconcile added={} updated={} removed={} mutations={}",
                report.added.len(),
                report.updated.len(),
                report.removed.len(),
                report.mutations
            );
        }
        Ok(report)
    }

    fn emit(&mut self, muts: Vec<Mutation>) -> usize {
        let n = muts.len();
        for m in muts {
            self.surface.apply(m);
        }
        n
    }

    pub fn tracked_len(&self) -> usize {
        self.ids.len()
    }

    #[cfg(test)]
    pub fn tracked_ids(&self) -> HashSet<String> {
        self.ids.clone()
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    #[cfg(test)]
    pub fn view(&self, id: &str) -> Option<&NotificationView> {
        self.views.get(id)
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }
}
