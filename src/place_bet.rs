//! Manual bet placement across a chosen set of bots.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    backend::BackendClient,
    models::{BotResult, PlaceBetRequest},
    store::SqliteStore,
    utils::{non_empty, now_ts},
};

/// Shown in place of a missing summary field.
pub const EMPTY_FIELD: &str = "―";

const SELECTION_KEY: &str = "betData";

/// The tip last clicked on the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetSelection {
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default)]
    pub bet_name: Option<String>,
    #[serde(default)]
    pub tip_name: Option<String>,
    #[serde(default)]
    pub odds: Option<f64>,
    #[serde(default)]
    pub selection_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionSummary {
    pub event_name: String,
    pub bet_name: String,
    pub tip_name: String,
    pub odds: String,
}

impl SelectionSummary {
    pub fn of(sel: Option<&BetSelection>) -> Self {
        let field = |f: fn(&BetSelection) -> Option<String>| {
            sel.and_then(f).unwrap_or_else(|| EMPTY_FIELD.to_string())
        };
        Self {
            event_name: field(|s| s.event_name.clone()),
            bet_name: field(|s| s.bet_name.clone()),
            tip_name: field(|s| s.tip_name.clone()),
            odds: field(|s| s.odds.map(|o| o.to_string())),
        }
    }
}

/// Persists the selection in the kv table. Each save overwrites; nothing clears it.
#[derive(Clone)]
pub struct BetSelectionStore {
    store: SqliteStore,
}

impl BetSelectionStore {
    pub fn new(store: SqliteStore) -> Self {
        Self { store }
    }

    pub fn save(&self, sel: &BetSelection) -> Result<()> {
        let raw = serde_json::to_string(sel).context("encode bet selection")?;
        self.store.put_kv(SELECTION_KEY, &raw, now_ts())
    }

    pub fn load(&self) -> Result<Option<BetSelection>> {
        let Some(raw) = self.store.get_kv(SELECTION_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(sel) => Ok(Some(sel)),
            Err(e) => {
                log::warn!("place_bet.selection.corrupt err={}", e);
                Ok(None)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotChoice {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum DetailsProvider {
    Auto,
    Manual {
        #[serde(default)]
        selection_id: String,
        #[serde(default)]
        odds: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceBetForm {
    #[serde(default)]
    pub bots: Vec<BotChoice>,
    pub details: DetailsProvider,
    #[serde(default)]
    pub stake: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaceBetError {
    #[error("no bot specified")]
    NoBots,
    #[error("no tip selected")]
    MissingSelection,
    #[error("saved tip lacks selection id or odds")]
    InvalidSelection,
    #[error("manual selection id or odds missing")]
    MissingManualDetails,
    #[error("stake missing")]
    MissingStake,
    #[error("backend rejected the bet: {0}")]
    Server(String),
}

impl PlaceBetError {
    pub fn title(&self) -> &'static str {
        match self {
            PlaceBetError::NoBots => "No bot specified",
            PlaceBetError::MissingSelection | PlaceBetError::MissingManualDetails => "Missing bet data",
            PlaceBetError::InvalidSelection => "Invalid bet data",
            PlaceBetError::MissingStake => "Missing stake",
            PlaceBetError::Server(_) => "Server error",
        }
    }

    pub fn text(&self) -> &'static str {
        match self {
            PlaceBetError::NoBots => "Please choose at least one bot from the list",
            PlaceBetError::MissingSelection => "Go back to the dashboard and click desired tip",
            PlaceBetError::InvalidSelection => "Contact developer to fix this",
            PlaceBetError::MissingManualDetails => {
                "Please fill in \"Selection ID\" and \"Odds\" fields"
            }
            PlaceBetError::MissingStake => "Please specify the stake",
            PlaceBetError::Server(_) => {
                "There was an error on the server side.\nPlease contact the developer"
            }
        }
    }
}

/// A validated form, ready for confirmation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BetTicket {
    pub bots: Vec<BotChoice>,
    pub selection_id: String,
    pub odds: String,
    pub stake: String,
    /// Confirmation dialog text.
    pub summary: String,
}

impl BetTicket {
    fn request(&self) -> PlaceBetRequest {
        PlaceBetRequest {
            bot_ids: self.bots.iter().map(|b| b.id).collect(),
            stake: self.stake.clone(),
            selection_id: self.selection_id.clone(),
            odds: self.odds.clone(),
        }
    }
}

/// Validates in a fixed order; the first failing check wins.
pub fn prepare(form: &PlaceBetForm, saved: Option<&BetSelection>) -> Result<BetTicket, PlaceBetError> {
    if form.bots.is_empty() {
        return Err(PlaceBetError::NoBots);
    }

    let (selection_id, odds, details) = match &form.details {
        DetailsProvider::Auto => {
            let sel = saved.ok_or(PlaceBetError::MissingSelection)?;
            let (Some(selection_id), Some(odds)) = (sel.selection_id.as_deref(), sel.odds) else {
                return Err(PlaceBetError::InvalidSelection);
            };
            let s = SelectionSummary::of(Some(sel));
            let details = format!(
                "Event: {}\nBet: {}\nTip: {} ({})",
                s.event_name, s.bet_name, s.tip_name, s.odds
            );
            (selection_id.to_string(), odds.to_string(), details)
        }
        DetailsProvider::Manual { selection_id, odds } => {
            if selection_id.is_empty() || odds.is_empty() {
                return Err(PlaceBetError::MissingManualDetails);
            }
            let details = format!("Selection ID: {selection_id}\nOdds: {odds}");
            (selection_id.clone(), odds.clone(), details)
        }
    };

    if form.stake.is_empty() {
        return Err(PlaceBetError::MissingStake);
    }

    let bots: String = form.bots.iter().map(|b| format!("\n- {}", b.name)).collect();
    Ok(BetTicket {
        bots: form.bots.clone(),
        selection_id,
        odds,
        stake: form.stake.clone(),
        summary: format!("{details}\n\nBots:{bots}\n\nStake: {}", form.stake),
    })
}

fn results_summary(bots: &[BotChoice], results: &[BotResult]) -> String {
    let mut out = String::from("Results:");
    for r in results {
        let name = bots
            .iter()
            .find(|b| b.id == r.id)
            .and_then(|b| non_empty(&b.name).map(str::to_string))
            .unwrap_or_else(|| format!("bot #{}", r.id));
        match &r.result {
            None | Some(serde_json::Value::Null) => out.push_str(&format!("\n- {name}: 🟢 Success")),
            Some(v) => out.push_str(&format!("\n- {name}: 🔴 {v}")),
        }
    }
    out
}

/// Sends the bet and renders the per-bot results.
pub async fn place(backend: &BackendClient, ticket: &BetTicket) -> Result<String, PlaceBetError> {
    let request_id = Uuid::new_v4();
    log::info!(
        "place_bet.submit request_id={} bots={} selection_id={} odds={} stake={}",
        request_id,
        ticket.bots.len(),
        ticket.selection_id,
        ticket.odds,
        ticket.stake
    );
    let resp = backend.place_bet(&ticket.request()).await.map_err(|e| {
        log::error!("place_bet.failed request_id={} err={}", request_id, e);
        PlaceBetError::Server(e.to_string())
    })?;

    let failed = resp.results.iter().filter(|r| r.result.is_some()).count();
    log::info!(
        "place_bet.done request_id={} results={} failed={}",
        request_id,
        resp.results.len(),
        failed
    );
    Ok(results_summary(&ticket.bots, &resp.results))
}
