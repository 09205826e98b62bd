//! Render targets for notification views.
//!
//! The reconciler never touches presentation directly; it emits [`Mutation`]s
//! into a [`NotificationSurface`]. [`MemorySurface`] is the surface the
//! dashboard serves: an ordered node list with transient classes that expire
//! on [`MemorySurface::sweep`].

use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use serde::Serialize;

use crate::notification::{RenderedNotification, UptimeClass};

pub const ADDED_FOR: Duration = Duration::from_secs(3);
pub const UPDATED_FOR: Duration = Duration::from_secs(1);
pub const REMOVED_FOR: Duration = Duration::from_secs(3);

const MAX_SOUND_CUES: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Prepend a new node to the list.
    Attach { node: RenderedNotification },
    SetUptime { id: String, text: String },
    SetUptimeClass { id: String, class: Option<UptimeClass> },
    SetMatchTime { id: String, text: String },
    SetScore { id: String, text: String, highlight: bool },
    PlaySound { id: String },
    /// Start the removal transition; the node detaches once it finishes.
    Detach { id: String },
}

pub trait NotificationSurface: Send {
    fn apply(&mut self, mutation: Mutation);
}

#[derive(Debug, Clone)]
struct SurfaceNode {
    key: u64,
    node: RenderedNotification,
    added_until: Option<Instant>,
    updated_until: Option<Instant>,
    removing_until: Option<Instant>,
}

impl SurfaceNode {
    fn is_live(&self) -> bool {
        self.removing_until.is_none()
    }

    fn classes(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if let Some(c) = self.node.uptime_class {
            out.push(c.css_class());
        }
        if self.added_until.is_some() {
            out.push("added");
        }
        if self.updated_until.is_some() {
            out.push("updated");
        }
        if self.removing_until.is_some() {
            out.push("removed");
        }
        out
    }
}

/// `key` identifies one attached node for its whole lifetime. An id that
/// reappears while its old node is still fading out gets a fresh key.
#[derive(Debug, Clone, Serialize)]
pub struct NodeSnapshot {
    pub key: u64,
    #[serde(flatten)]
    pub node: RenderedNotification,
    pub classes: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SoundCue {
    pub seq: u64,
    pub id: String,
}

#[derive(Debug, Default)]
pub struct MemorySurface {
    nodes: Vec<SurfaceNode>,
    sound_cues: VecDeque<SoundCue>,
    next_cue: u64,
    next_key: u64,
    applied: u64,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    fn live_mut(&mut self, id: &str) -> Option<&mut SurfaceNode> {
        self.nodes.iter_mut().find(|n| n.is_live() && n.node.id == id)
    }

    fn apply_at(&mut self, mutation: Mutation, now: Instant) {
        self.applied += 1;
        match mutation {
            Mutation::Attach { node } => {
                self.next_key += 1;
                self.nodes.insert(
                    0,
                    SurfaceNode {
                        key: self.next_key,
                        node,
                        added_until: Some(now + ADDED_FOR),
                        updated_until: None,
                        removing_until: None,
                    },
                );
            }
            Mutation::SetUptime { id, text } => {
                if let Some(n) = self.live_mut(&id) {
                    n.node.uptime = text;
                }
            }
            Mutation::SetUptimeClass { id, class } => {
                if let Some(n) = self.live_mut(&id) {
                    n.node.uptime_class = class;
                }
            }
            Mutation::SetMatchTime { id, text } => {
                if let Some(n) = self.live_mut(&id) {
                    n.node.match_time = text;
                }
            }
            Mutation::SetScore { id, text, highlight } => {
                if let Some(n) = self.live_mut(&id) {
                    n.node.score = text;
                    if highlight {
                        n.updated_until = Some(now + UPDATED_FOR);
                    }
                }
            }
            Mutation::PlaySound { id } => {
                self.next_cue += 1;
                self.sound_cues.push_back(SoundCue { seq: self.next_cue, id });
                while self.sound_cues.len() > MAX_SOUND_CUES {
                    self.sound_cues.pop_front();
                }
            }
            Mutation::Detach { id } => {
                if let Some(n) = self.live_mut(&id) {
                    n.removing_until = Some(now + REMOVED_FOR);
                } else {
                    log::warn!("surface.detach.unknown id={}", id);
                }
            }
        }
    }

    /// Expires transient classes and drops nodes whose removal transition has finished.
    pub fn sweep(&mut self, now: Instant) -> usize {
        let before = self.nodes.len();
        self.nodes
            .retain(|n| n.removing_until.map_or(true, |until| until > now));
        for n in &mut self.nodes {
            if n.added_until.is_some_and(|until| until <= now) {
                n.added_until = None;
            }
            if n.updated_until.is_some_and(|until| until <= now) {
                n.updated_until = None;
            }
        }
        before - self.nodes.len()
    }

    /// Nodes in display order, top first. Includes nodes still fading out.
    pub fn snapshot(&self) -> Vec<NodeSnapshot> {
        self.nodes
            .iter()
            .map(|n| NodeSnapshot {
                key: n.key,
                node: n.node.clone(),
                classes: n.classes(),
            })
            .collect()
    }

    pub fn live_ids(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|n| n.is_live())
            .map(|n| n.node.id.clone())
            .collect()
    }

    pub fn sound_cues_since(&self, seq: u64) -> Vec<SoundCue> {
        self.sound_cues
            .iter()
            .filter(|c| c.seq > seq)
            .cloned()
            .collect()
    }

    pub fn last_cue(&self) -> u64 {
        self.next_cue
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Total mutations applied since creation.
    pub fn applied(&self) -> u64 {
        self.applied
    }
}

impl NotificationSurface for MemorySurface {
    fn apply(&mut self, mutation: Mutation) {
        self.apply_at(mutation, Instant::now());
    }
}
