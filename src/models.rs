//! Wire types exchanged with the betting backend.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Backend ids arrive as either JSON strings or integers; we keep them as strings.
fn id_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    match JsonValue::deserialize(d)? {
        JsonValue::String(s) => Ok(s),
        JsonValue::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("invalid id: {other}"))),
    }
}

fn opt_id_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    match JsonValue::deserialize(d)? {
        JsonValue::Null => Ok(None),
        JsonValue::String(s) => Ok(Some(s)),
        JsonValue::Number(n) => Ok(Some(n.to_string())),
        other => Err(serde::de::Error::custom(format!("invalid id: {other}"))),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tip {
    pub name: String,
    pub odds: f64,
    #[serde(default, deserialize_with = "opt_id_string")]
    pub selection_id: Option<String>,
}

/// One live match event as reported by `GET /notifications`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub uptime_seconds: u64,
    #[serde(rename = "uptime", default)]
    pub uptime_formatted: String,
    #[serde(rename = "time", default)]
    pub match_time: String,
    #[serde(default)]
    pub score: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub sport_name: String,
    #[serde(default)]
    pub first_team: String,
    #[serde(default)]
    pub second_team: String,
    #[serde(default)]
    pub bet_name: String,
    #[serde(default)]
    pub tips: Vec<Tip>,
}

impl NotificationRecord {
    pub fn event_name(&self) -> String {
        format!("{} vs {}", self.first_team, self.second_team)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationsResponse {
    pub notifications: Vec<NotificationRecord>,
}

/// Which configuration collection an item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigKind {
    Sport,
    Market,
    Bet,
}

impl ConfigKind {
    /// Path segment under `/config/`.
    pub fn collection(self) -> &'static str {
        match self {
            ConfigKind::Sport => "sports",
            ConfigKind::Market => "markets",
            ConfigKind::Bet => "bets",
        }
    }

    pub fn from_collection(s: &str) -> Option<Self> {
        match s {
            "sports" | "sport" => Some(ConfigKind::Sport),
            "markets" | "market" => Some(ConfigKind::Market),
            "bets" | "bet" => Some(ConfigKind::Bet),
            _ => None,
        }
    }
}

/// A sport, market or bet entry from `/config/*`.
///
/// The typed fields are what the dashboard reads. `raw` is the item exactly as
/// the backend sent it, so a PATCH echoes every field back with its original
/// JSON type (numeric ids stay numeric).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Map<String, JsonValue>")]
pub struct ConfigItemData {
    pub id: String,
    pub name: String,
    pub is_enabled: bool,
    pub trigger_time: Option<u32>,
    pub sport_id: Option<String>,
    pub market_id: Option<String>,
    pub raw: Map<String, JsonValue>,
}

#[derive(Deserialize)]
struct ConfigItemFields {
    #[serde(deserialize_with = "id_string")]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    is_enabled: bool,
    #[serde(default)]
    trigger_time: Option<u32>,
    #[serde(default, deserialize_with = "opt_id_string")]
    sport_id: Option<String>,
    #[serde(default, deserialize_with = "opt_id_string")]
    market_id: Option<String>,
}

impl TryFrom<Map<String, JsonValue>> for ConfigItemData {
    type Error = serde_json::Error;

    fn try_from(raw: Map<String, JsonValue>) -> Result<Self, Self::Error> {
        let f: ConfigItemFields = serde_json::from_value(JsonValue::Object(raw.clone()))?;
        Ok(Self {
            id: f.id,
            name: f.name,
            is_enabled: f.is_enabled,
            trigger_time: f.trigger_time,
            sport_id: f.sport_id,
            market_id: f.market_id,
            raw,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SportsResponse {
    pub sports: Vec<ConfigItemData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketsResponse {
    pub markets: Vec<ConfigItemData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BetsResponse {
    pub bets: Vec<ConfigItemData>,
}

/// Scalar option from `/config/option/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionData {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusCounts {
    #[serde(default)]
    pub events: u64,
    #[serde(default)]
    pub notifications: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusError {
    pub error_class: String,
}

/// `GET /status` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppStatus {
    #[serde(default)]
    pub status: StatusCounts,
    #[serde(default)]
    pub heavy_load: bool,
    #[serde(default)]
    pub error: Option<StatusError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceBetRequest {
    pub bot_ids: Vec<i64>,
    pub stake: String,
    pub selection_id: String,
    pub odds: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotResult {
    pub id: i64,
    #[serde(default)]
    pub result: Option<JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceBetResponse {
    pub results: Vec<BotResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_accepts_numeric_ids_and_missing_display_fields() {
        let raw = r#"{
            "id": 8812734,
            "uptime_seconds": 75,
            "uptime": "01:15",
            "time": "2nd set",
            "score": "1:0",
            "tips": [{"name": "Over 2.5", "odds": 1.85, "selection_id": 991}]
        }"#;
        let r: NotificationRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(r.id, "8812734");
        assert_eq!(r.uptime_formatted, "01:15");
        assert_eq!(r.match_time, "2nd set");
        assert_eq!(r.link, "");
        assert_eq!(r.tips[0].selection_id.as_deref(), Some("991"));
    }

    #[test]
    fn config_item_keeps_raw_fields_and_types() {
        let raw = r#"{"id": 3, "name": "Tennis", "is_enabled": true, "trigger_time": 40, "priority": 2, "sport_id": "7"}"#;
        let item: ConfigItemData = serde_json::from_str(raw).unwrap();
        assert_eq!(item.id, "3");
        assert_eq!(item.trigger_time, Some(40));
        assert_eq!(item.sport_id.as_deref(), Some("7"));
        assert_eq!(item.raw["priority"], serde_json::json!(2));
        assert_eq!(item.raw["id"], serde_json::json!(3));
        assert_eq!(item.raw["sport_id"], serde_json::json!("7"));
    }

    #[test]
    fn config_item_rejects_missing_id() {
        assert!(serde_json::from_str::<ConfigItemData>(r#"{"name": "x"}"#).is_err());
        assert!(serde_json::from_str::<ConfigItemData>(r#"{"id": [1]}"#).is_err());
    }

    #[test]
    fn status_error_may_be_null() {
        let raw = r#"{"status": {"events": 12, "notifications": 3}, "heavy_load": false, "error": null}"#;
        let s: AppStatus = serde_json::from_str(raw).unwrap();
        assert_eq!(s.status.events, 12);
        assert!(s.error.is_none());
    }

    #[test]
    fn config_kind_collections() {
        assert_eq!(ConfigKind::Market.collection(), "markets");
        assert_eq!(ConfigKind::from_collection("bets"), Some(ConfigKind::Bet));
        assert_eq!(ConfigKind::from_collection("teams"), None);
    }
}
