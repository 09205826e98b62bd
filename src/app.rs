use std::{sync::Arc, time::Duration};

use anyhow::Result;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::{
    backend::BackendClient,
    config::Settings,
    config_editor::{ConfigNavigator, HoldSessions},
    dashboard,
    options::OptionsPanel,
    place_bet::BetSelectionStore,
    poller::{run_sweeper, NotificationPoller},
    reconciler::{NotificationManager, ReconcileError},
    status::StatusMonitor,
    store::SqliteStore,
    surface::MemorySurface,
};

/// Every long-lived component, built once and handed to whoever needs it.
#[derive(Clone)]
pub struct AppContext {
    pub settings: Settings,
    pub store: SqliteStore,
    pub backend: BackendClient,
    pub poller: NotificationPoller,
    pub status: StatusMonitor,
    pub config: Arc<tokio::sync::Mutex<ConfigNavigator>>,
    pub holds: HoldSessions,
    pub options: OptionsPanel,
    pub bet_selection: BetSelectionStore,
}

impl AppContext {
    pub fn new(
        settings: Settings,
        store: SqliteStore,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ReconcileError>)> {
        let backend = BackendClient::new(&settings.backend_base_url, settings.http_timeout())?;
        let manager = Arc::new(Mutex::new(NotificationManager::new(
            MemorySurface::new(),
            settings.sound_min_uptime_secs,
        )));
        let (poller, fatal_rx) = NotificationPoller::new(backend.clone(), store.clone(), manager);

        let ctx = Self {
            status: StatusMonitor::new(backend.clone(), store.clone()),
            config: Arc::new(tokio::sync::Mutex::new(ConfigNavigator::new())),
            holds: HoldSessions::new(),
            options: OptionsPanel::new(backend.clone()),
            bet_selection: BetSelectionStore::new(store.clone()),
            settings,
            store,
            backend,
            poller,
        };
        Ok((ctx, fatal_rx))
    }

    /// Sports list and option values, loaded once at startup. Failures are logged.
    pub async fn load_initial(&self) {
        {
            let mut nav = self.config.lock().await;
            match nav.load_sports(&self.backend).await {
                Ok(n) => log::info!("config.sports.loaded count={}", n),
                Err(e) => log::error!("config.sports.load_failed err={:#}", e),
            }
        }
        self.options.load_all().await;
    }
}

/// Starts the background loops and blocks on the notification loop.
pub async fn run(ctx: AppContext, fatal_rx: mpsc::UnboundedReceiver<ReconcileError>) -> Result<()> {
    let s = &ctx.settings;
    log::info!(
        "app.start backend={} poll_ms={} status_secs={} sound_min_uptime={:?} sqlite={}",
        ctx.backend.base_url(),
        s.notifications_poll_ms,
        s.status_poll_secs,
        s.sound_min_uptime_secs,
        ctx.store.path()
    );

    {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            if let Err(e) = dashboard::serve_dashboard(ctx).await {
                log::error!("dashboard.error {:#}", e);
            }
        });
    }

    tokio::spawn(
        ctx.status
            .clone()
            .run(Duration::from_secs(s.status_poll_secs)),
    );
    tokio::spawn(run_sweeper(
        ctx.poller.manager().clone(),
        Duration::from_millis(s.sweep_ms),
    ));
    {
        let ctx = ctx.clone();
        tokio::spawn(async move { ctx.load_initial().await });
    }

    ctx.poller
        .clone()
        .run(Duration::from_millis(s.notifications_poll_ms), fatal_rx)
        .await
}
