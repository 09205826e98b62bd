mod app;
mod backend;
mod config;
mod config_editor;
mod dashboard;
mod models;
mod notification;
mod options;
mod place_bet;
mod poller;
mod reconciler;
mod status;
mod store;
mod surface;
mod utils;

#[cfg(test)]
mod test_support;

use anyhow::Result;
use clap::Parser;

use crate::{app::AppContext, config::Settings, store::SqliteStore};

#[derive(Debug, Parser)]
#[command(name = "cws-dashboard", version)]
struct Cli {
    /// Override BACKEND_BASE_URL
    #[arg(long)]
    backend: Option<String>,

    /// Override DASHBOARD_PORT
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let mut settings = Settings::load()?;
    if let Some(b) = cli.backend {
        settings.backend_base_url = b.trim_end_matches('/').to_string();
    }
    if let Some(p) = cli.port {
        settings.dashboard_port = p;
    }
    settings.validate()?;

    let store = SqliteStore::new(&settings.sqlite_path)?;
    store.init_db()?;

    if settings.dashboard_open_browser {
        let url = format!("http://{}:{}/", settings.dashboard_host, settings.dashboard_port);
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(650)).await;
            let _ = std::process::Command::new("xdg-open").arg(&url).spawn();
        });
    }

    let (ctx, fatal_rx) = AppContext::new(settings, store)?;
    tokio::select! {
        res = app::run(ctx, fatal_rx) => {
            if let Err(e) = &res {
                log::error!("app.fatal {:#}", e);
            }
            res
        }
        _ = tokio::signal::ctrl_c() => {
            log::info!("app.shutdown signal=ctrl_c");
            Ok(())
        }
    }
}
