//! Sport / market / bet configuration lists.
//!
//! The three item types form a closed set behind [`ConfigItemComponent`].
//! Every edit is persisted immediately with a PATCH; a failed PATCH rolls the
//! item back to its pre-edit state and the error is returned to the caller.

use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::{
    backend::BackendClient,
    models::{ConfigItemData, ConfigKind},
};

/// How long a touch must be held before it counts as a trigger-time toggle.
pub const HOLD_DURATION: Duration = Duration::from_secs(1);

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::SportItem {}
    impl Sealed for super::MarketItem {}
    impl Sealed for super::BetItem {}
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriggerTimeInput {
    value: Option<u32>,
    readonly: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerToggle {
    /// The input became editable; nothing to persist yet.
    Unlocked,
    /// The value was cleared and the input locked again.
    Cleared,
}

impl TriggerTimeInput {
    /// Items without a trigger time start read-only.
    pub fn from_value(value: Option<u32>) -> Self {
        Self {
            value,
            readonly: value.is_none(),
        }
    }

    pub fn value(&self) -> Option<u32> {
        self.value
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    pub fn toggle(&mut self) -> TriggerToggle {
        if self.readonly {
            self.readonly = false;
            TriggerToggle::Unlocked
        } else {
            self.value = None;
            self.readonly = true;
            TriggerToggle::Cleared
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigRow {
    pub kind: ConfigKind,
    pub id: String,
    pub name: String,
    pub is_enabled: bool,
    pub trigger_time: Option<u32>,
    /// `None` for items without a trigger-time field.
    pub trigger_readonly: Option<bool>,
    pub selectable: bool,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "edit", content = "value", rename_all = "snake_case")]
pub enum ConfigEdit {
    SetEnabled(bool),
    SetTriggerTime(Option<u32>),
    ToggleTriggerTime,
}

pub trait ConfigItemComponent: sealed::Sealed + Clone + Send {
    const KIND: ConfigKind;
    const SELECTABLE: bool;

    fn data(&self) -> &ConfigItemData;
    fn data_mut(&mut self) -> &mut ConfigItemData;

    fn trigger(&self) -> Option<&TriggerTimeInput> {
        None
    }

    fn trigger_mut(&mut self) -> Option<&mut TriggerTimeInput> {
        None
    }

    fn is_active(&self) -> bool {
        false
    }

    fn render(&self) -> ConfigRow {
        let d = self.data();
        ConfigRow {
            kind: Self::KIND,
            id: d.id.clone(),
            name: d.name.clone(),
            is_enabled: d.is_enabled,
            trigger_time: self.trigger().and_then(|t| t.value()),
            trigger_readonly: self.trigger().map(|t| t.is_readonly()),
            selectable: Self::SELECTABLE,
            active: self.is_active(),
        }
    }

    /// The item as the backend sent it, minus `name`, with the edited values applied.
    fn patch_body(&self) -> Map<String, JsonValue> {
        let mut body = self.data().raw.clone();
        body.remove("name");
        body.insert("is_enabled".into(), JsonValue::Bool(self.data().is_enabled));
        if let Some(t) = self.trigger() {
            body.insert(
                "trigger_time".into(),
                t.value().map_or(JsonValue::Null, JsonValue::from),
            );
        }
        body
    }
}

#[derive(Debug, Clone)]
pub struct SportItem {
    data: ConfigItemData,
    trigger: TriggerTimeInput,
    active: bool,
}

impl SportItem {
    pub fn new(data: ConfigItemData) -> Self {
        let trigger = TriggerTimeInput::from_value(data.trigger_time);
        Self {
            data,
            trigger,
            active: false,
        }
    }
}

impl ConfigItemComponent for SportItem {
    const KIND: ConfigKind = ConfigKind::Sport;
    const SELECTABLE: bool = true;

    fn data(&self) -> &ConfigItemData {
        &self.data
    }
    fn data_mut(&mut self) -> &mut ConfigItemData {
        &mut self.data
    }
    fn trigger(&self) -> Option<&TriggerTimeInput> {
        Some(&self.trigger)
    }
    fn trigger_mut(&mut self) -> Option<&mut TriggerTimeInput> {
        Some(&mut self.trigger)
    }
    fn is_active(&self) -> bool {
        self.active
    }
}

#[derive(Debug, Clone)]
pub struct MarketItem {
    data: ConfigItemData,
    trigger: TriggerTimeInput,
    active: bool,
}

impl MarketItem {
    pub fn new(data: ConfigItemData) -> Self {
        let trigger = TriggerTimeInput::from_value(data.trigger_time);
        Self {
            data,
            trigger,
            active: false,
        }
    }
}

impl ConfigItemComponent for MarketItem {
    const KIND: ConfigKind = ConfigKind::Market;
    const SELECTABLE: bool = true;

    fn data(&self) -> &ConfigItemData {
        &self.data
    }
    fn data_mut(&mut self) -> &mut ConfigItemData {
        &mut self.data
    }
    fn trigger(&self) -> Option<&TriggerTimeInput> {
        Some(&self.trigger)
    }
    fn trigger_mut(&mut self) -> Option<&mut TriggerTimeInput> {
        Some(&mut self.trigger)
    }
    fn is_active(&self) -> bool {
        self.active
    }
}

#[derive(Debug, Clone)]
pub struct BetItem {
    data: ConfigItemData,
}

impl BetItem {
    pub fn new(data: ConfigItemData) -> Self {
        Self { data }
    }
}

impl ConfigItemComponent for BetItem {
    const KIND: ConfigKind = ConfigKind::Bet;
    const SELECTABLE: bool = false;

    fn data(&self) -> &ConfigItemData {
        &self.data
    }
    fn data_mut(&mut self) -> &mut ConfigItemData {
        &mut self.data
    }
}

/// Applies `edit` to `item` and persists it. On PATCH failure the item is restored.
pub async fn apply_edit<T: ConfigItemComponent>(
    item: &mut T,
    edit: ConfigEdit,
    backend: &BackendClient,
) -> Result<ConfigRow> {
    let before = item.clone();

    let persist = match edit {
        ConfigEdit::SetEnabled(v) => {
            item.data_mut().is_enabled = v;
            true
        }
        ConfigEdit::SetTriggerTime(v) => {
            let input = item
                .trigger_mut()
                .ok_or_else(|| anyhow!("{} have no trigger time", T::KIND.collection()))?;
            if input.is_readonly() {
                bail!("trigger time is read-only; toggle it first");
            }
            input.value = v;
            true
        }
        ConfigEdit::ToggleTriggerTime => {
            let input = item
                .trigger_mut()
                .ok_or_else(|| anyhow!("{} have no trigger time", T::KIND.collection()))?;
            input.toggle() == TriggerToggle::Cleared
        }
    };

    if !persist {
        return Ok(item.render());
    }

    let id = item.data().id.clone();
    let body = item.patch_body();
    if let Err(e) = backend.patch_config_item(T::KIND, &id, &body).await {
        *item = before;
        log::error!("config.patch.failed kind={} id={} err={}", T::KIND.collection(), id, e);
        return Err(e).with_context(|| format!("patch {} {}", T::KIND.collection(), id));
    }

    let trigger_time = item.trigger().and_then(|t| t.value());
    if item.trigger().is_some() {
        item.data_mut().trigger_time = trigger_time;
    }
    item.data_mut().raw.extend(body);
    Ok(item.render())
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigView {
    pub sports: Vec<ConfigRow>,
    pub markets: Vec<ConfigRow>,
    pub bets: Vec<ConfigRow>,
}

/// Sport -> market -> bet drill-down.
#[derive(Debug, Default)]
pub struct ConfigNavigator {
    sports: Vec<SportItem>,
    markets: Vec<MarketItem>,
    bets: Vec<BetItem>,
}

impl ConfigNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn load_sports(&mut self, backend: &BackendClient) -> Result<usize> {
        let sports = backend.fetch_sports().await.map_err(|e| {
            log::error!("config.sports.fetch_failed err={}", e);
            e
        })?;
        self.sports = sports.into_iter().map(SportItem::new).collect();
        Ok(self.sports.len())
    }

    /// Loads the sport's markets and clears the market and bet lists. A failed fetch changes nothing.
    pub async fn select_sport(&mut self, backend: &BackendClient, sport_id: &str) -> Result<usize> {
        if !self.sports.iter().any(|s| s.data.id == sport_id) {
            bail!("unknown sport {sport_id}");
        }
        let markets = backend.fetch_markets(sport_id).await.map_err(|e| {
            log::error!("config.markets.fetch_failed sport_id={} err={}", sport_id, e);
            e
        })?;

        self.markets = markets.into_iter().map(MarketItem::new).collect();
        self.bets.clear();
        for s in &mut self.sports {
            s.active = s.data.id == sport_id;
        }
        Ok(self.markets.len())
    }

    pub async fn select_market(&mut self, backend: &BackendClient, market_id: &str) -> Result<usize> {
        let market = self
            .markets
            .iter()
            .find(|m| m.data.id == market_id)
            .ok_or_else(|| anyhow!("unknown market {market_id}"))?;
        let sport_id = market
            .data
            .sport_id
            .clone()
            .or_else(|| self.active_sport_id().map(str::to_string))
            .ok_or_else(|| anyhow!("market {market_id} has no sport"))?;

        let bets = backend.fetch_bets(&sport_id, market_id).await.map_err(|e| {
            log::error!("config.bets.fetch_failed market_id={} err={}", market_id, e);
            e
        })?;

        self.bets = bets.into_iter().map(BetItem::new).collect();
        for m in &mut self.markets {
            m.active = m.data.id == market_id;
        }
        Ok(self.bets.len())
    }

    pub async fn edit(
        &mut self,
        backend: &BackendClient,
        kind: ConfigKind,
        id: &str,
        edit: ConfigEdit,
    ) -> Result<ConfigRow> {
        match kind {
            ConfigKind::Sport => apply_edit(find_item(&mut self.sports, id)?, edit, backend).await,
            ConfigKind::Market => apply_edit(find_item(&mut self.markets, id)?, edit, backend).await,
            ConfigKind::Bet => apply_edit(find_item(&mut self.bets, id)?, edit, backend).await,
        }
    }

    pub fn active_sport_id(&self) -> Option<&str> {
        self.sports
            .iter()
            .find(|s| s.active)
            .map(|s| s.data.id.as_str())
    }

    pub fn view(&self) -> ConfigView {
        ConfigView {
            sports: self.sports.iter().map(|s| s.render()).collect(),
            markets: self.markets.iter().map(|m| m.render()).collect(),
            bets: self.bets.iter().map(|b| b.render()).collect(),
        }
    }
}

fn find_item<'a, T: ConfigItemComponent>(items: &'a mut [T], id: &str) -> Result<&'a mut T> {
    items
        .iter_mut()
        .find(|i| i.data().id == id)
        .ok_or_else(|| anyhow!("unknown {} {id}", T::KIND.collection()))
}

/// Cancellable timer for one touch session. Cancelling or dropping it stops the timer.
pub struct HoldTimer {
    cancel: oneshot::Sender<()>,
}

impl HoldTimer {
    pub fn start<F>(after: Duration, on_fire: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (cancel, cancelled) = oneshot::channel::<()>();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(after) => on_fire.await,
                _ = cancelled => {}
            }
        });
        Self { cancel }
    }

    pub fn cancel(self) {
        let _ = self.cancel.send(());
    }
}

/// Open touch-and-hold sessions, each with its own timer token.
#[derive(Clone, Default)]
pub struct HoldSessions {
    inner: Arc<Mutex<HashMap<Uuid, HoldTimer>>>,
}

impl HoldSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin<F>(&self, after: Duration, on_fire: F) -> Uuid
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let session = Uuid::new_v4();
        let inner = self.inner.clone();
        let timer = HoldTimer::start(after, async move {
            inner.lock().remove(&session);
            on_fire.await;
        });
        self.inner.lock().insert(session, timer);
        session
    }

    /// Touch end or cancel. Returns false if the session already fired or never existed.
    pub fn end(&self, session: Uuid) -> bool {
        match self.inner.lock().remove(&session) {
            Some(timer) => {
                timer.cancel();
                true
            }
            None => false,
        }
    }

    pub fn open(&self) -> usize {
        self.inner.lock().len()
    }
}
