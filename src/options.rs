use std::{collections::BTreeMap, sync::Arc};

use anyhow::{anyhow, Context, Result};
use parking_lot::RwLock;
use serde::Serialize;

use crate::backend::BackendClient;

/// Option id -> element hook used by the dashboard page.
pub const OPTION_HOOKS: [(u32, &str); 6] = [
    (1, "option-min-odds"),
    (2, "option-max-odds"),
    (3, "option-telegram-notification"),
    (4, "option-sound-notification"),
    (5, "option-telegram-second-notification"),
    (6, "option-auto-break-min-idle-time"),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionEntry {
    pub id: u32,
    pub hook: &'static str,
    pub name: String,
    pub value: f64,
}

#[derive(Clone)]
pub struct OptionsPanel {
    backend: BackendClient,
    entries: Arc<RwLock<BTreeMap<u32, OptionEntry>>>,
}

impl OptionsPanel {
    pub fn new(backend: BackendClient) -> Self {
        Self {
            backend,
            entries: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Loads every option one after another. Returns how many loaded.
    pub async fn load_all(&self) -> usize {
        let mut loaded = 0;
        for (id, hook) in OPTION_HOOKS {
            match self.backend.fetch_option(id).await {
                Ok(data) => {
                    self.entries.write().insert(
                        id,
                        OptionEntry {
                            id,
                            hook,
                            name: data.name,
                            value: data.value,
                        },
                    );
                    loaded += 1;
                }
                Err(e) => log::error!("options.load.failed id={} err={}", id, e),
            }
        }
        log::info!("options.load loaded={} total={}", loaded, OPTION_HOOKS.len());
        loaded
    }

    pub fn entries(&self) -> Vec<OptionEntry> {
        self.entries.read().values().cloned().collect()
    }

    pub fn get(&self, id: u32) -> Option<OptionEntry> {
        self.entries.read().get(&id).cloned()
    }

    /// Parses `raw`, stores it and PATCHes the backend; restores the old value if the PATCH fails.
    pub async fn update(&self, id: u32, raw: &str) -> Result<OptionEntry> {
        let value: f64 = raw
            .trim()
            .parse()
            .with_context(|| format!("option {id}: {raw:?} is not a number"))?;
        if !value.is_finite() {
            return Err(anyhow!("option {id}: value must be finite"));
        }

        let previous = {
            let mut entries = self.entries.write();
            let entry = entries
                .get_mut(&id)
                .ok_or_else(|| anyhow!("option {id} is not loaded"))?;
            std::mem::replace(&mut entry.value, value)
        };

        if let Err(e) = self.backend.patch_option(id, value).await {
            if let Some(entry) = self.entries.write().get_mut(&id) {
                entry.value = previous;
            }
            log::error!("options.patch.failed id={} err={}", id, e);
            return Err(e).with_context(|| format!("patch option {id}"));
        }

        log::info!("options.updated id={} value={}", id, value);
        self.get(id).ok_or_else(|| anyhow!("option {id} vanished"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve;
    use axum::{
        extract::Path,
        http::StatusCode,
        routing::get,
        Json, Router,
    };
    use std::{
        sync::atomic::{AtomicBool, Ordering},
        time::Duration,
    };

    fn options_backend(patch_fails: Arc<AtomicBool>) -> Router {
        Router::new().route(
            "/config/option/{id}",
            get(|Path(id): Path<u32>| async move {
                if id == 3 {
                    return Err(StatusCode::NOT_FOUND);
                }
                Ok(Json(serde_json::json!({"name": format!("opt {id}"), "value": id as f64 * 1.5})))
            })
            .patch(move || {
                let fail = patch_fails.clone();
                async move {
                    if fail.load(Ordering::SeqCst) {
                        StatusCode::INTERNAL_SERVER_ERROR
                    } else {
                        StatusCode::OK
                    }
                }
            }),
        )
    }

    async fn panel(fail: Arc<AtomicBool>) -> OptionsPanel {
        let base = serve(options_backend(fail)).await;
        OptionsPanel::new(BackendClient::new(&base, Duration::from_secs(2)).unwrap())
    }

    #[test]
    fn hooks_cover_ids_one_to_six() {
        let ids: Vec<u32> = OPTION_HOOKS.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(OPTION_HOOKS[5].1, "option-auto-break-min-idle-time");
    }

    #[tokio::test]
    async fn failed_option_is_skipped() {
        let p = panel(Arc::new(AtomicBool::new(false))).await;
        assert_eq!(p.load_all().await, 5);
        assert!(p.get(3).is_none());
        assert_eq!(p.get(2).unwrap().value, 3.0);
        assert_eq!(p.entries().len(), 5);
    }

    #[tokio::test]
    async fn update_parses_and_persists() {
        let p = panel(Arc::new(AtomicBool::new(false))).await;
        p.load_all().await;
        let e = p.update(1, " 1.35 ").await.unwrap();
        assert_eq!(e.value, 1.35);
        assert!(p.update(1, "abc").await.is_err());
        assert_eq!(p.get(1).unwrap().value, 1.35);
    }

    #[tokio::test]
    async fn failed_patch_restores_value() {
        let fail = Arc::new(AtomicBool::new(false));
        let p = panel(fail.clone()).await;
        p.load_all().await;
        fail.store(true, Ordering::SeqCst);
        assert!(p.update(4, "0").await.is_err());
        assert_eq!(p.get(4).unwrap().value, 6.0);
    }
}
