//! REST client for the betting backend.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use crate::models::{
    AppStatus, BetsResponse, ConfigItemData, ConfigKind, MarketsResponse, NotificationRecord,
    NotificationsResponse, OptionData, PlaceBetRequest, PlaceBetResponse, SportsResponse,
};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{method} {path} failed: {source}")]
    Transport {
        method: Method,
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{method} {path} returned HTTP {status}: {body}")]
    Status {
        method: Method,
        path: String,
        status: u16,
        body: String,
    },
    #[error("could not encode request body for {path}: {source}")]
    Encode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{method} {path} returned an unexpected body: {source}")]
    Decode {
        method: Method,
        path: String,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build backend http client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&JsonValue>,
    ) -> Result<reqwest::Response, BackendError> {
        let mut req = self
            .http
            .request(method.clone(), format!("{}{}", self.base_url, path));
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(b) = body {
            req = req.json(b);
        }

        let resp = req.send().await.map_err(|source| BackendError::Transport {
            method: method.clone(),
            path: path.to_string(),
            source,
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                method,
                path: path.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, BackendError> {
        let resp = self.send(Method::GET, path, query, None).await?;
        resp.json::<T>().await.map_err(|source| BackendError::Decode {
            method: Method::GET,
            path: path.to_string(),
            source,
        })
    }

    pub async fn fetch_notifications(&self) -> Result<Vec<NotificationRecord>, BackendError> {
        let body: NotificationsResponse = self.get_json("/notifications", &[]).await?;
        Ok(body.notifications)
    }

    pub async fn fetch_sports(&self) -> Result<Vec<ConfigItemData>, BackendError> {
        let body: SportsResponse = self.get_json("/config/sports", &[]).await?;
        Ok(body.sports)
    }

    pub async fn fetch_markets(&self, sport_id: &str) -> Result<Vec<ConfigItemData>, BackendError> {
        let body: MarketsResponse = self
            .get_json("/config/markets", &[("sport_id", sport_id)])
            .await?;
        Ok(body.markets)
    }

    pub async fn fetch_bets(
        &self,
        sport_id: &str,
        market_id: &str,
    ) -> Result<Vec<ConfigItemData>, BackendError> {
        let body: BetsResponse = self
            .get_json(
                "/config/bets",
                &[("sport_id", sport_id), ("market_id", market_id)],
            )
            .await?;
        Ok(body.bets)
    }

    /// Partial update of one sport, market or bet. The response body is ignored.
    pub async fn patch_config_item(
        &self,
        kind: ConfigKind,
        id: &str,
        body: &Map<String, JsonValue>,
    ) -> Result<(), BackendError> {
        let path = format!("/config/{}/{}", kind.collection(), id);
        let body = JsonValue::Object(body.clone());
        self.send(Method::PATCH, &path, &[], Some(&body)).await?;
        Ok(())
    }

    pub async fn fetch_option(&self, option_id: u32) -> Result<OptionData, BackendError> {
        self.get_json(&format!("/config/option/{option_id}"), &[])
            .await
    }

    pub async fn patch_option(&self, option_id: u32, value: f64) -> Result<(), BackendError> {
        let path = format!("/config/option/{option_id}");
        let body = serde_json::json!({ "value": value });
        self.send(Method::PATCH, &path, &[], Some(&body)).await?;
        Ok(())
    }

    pub async fn fetch_status(&self) -> Result<AppStatus, BackendError> {
        self.get_json("/status", &[]).await
    }

    pub async fn place_bet(&self, req: &PlaceBetRequest) -> Result<PlaceBetResponse, BackendError> {
        let path = "/place_bet/place";
        let body = serde_json::to_value(req).map_err(|source| BackendError::Encode {
            path: path.to_string(),
            source,
        })?;
        let resp = self.send(Method::POST, path, &[], Some(&body)).await?;
        resp.json::<PlaceBetResponse>()
            .await
            .map_err(|source| BackendError::Decode {
                method: Method::POST,
                path: path.to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve;
    use axum::{
        extract::{Path, Query},
        http::StatusCode,
        routing::{get, patch, post},
        Json, Router,
    };
    use std::collections::HashMap;

    fn client(base: &str) -> BackendClient {
        BackendClient::new(base, Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn fetches_notifications() {
        let app = Router::new().route(
            "/notifications",
            get(|| async {
                Json(serde_json::json!({
                    "notifications": [
                        {"id": "a", "uptime_seconds": 10, "uptime": "00:10", "time": "12'", "score": "0:0", "tips": []}
                    ]
                }))
            }),
        );
        let base = serve(app).await;
        let records = client(&base).fetch_notifications().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "a");
    }

    #[tokio::test]
    async fn passes_drill_down_query() {
        let app = Router::new().route(
            "/config/bets",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                Json(serde_json::json!({
                    "bets": [{"id": 1, "name": format!("{}-{}", q["sport_id"], q["market_id"]), "is_enabled": true}]
                }))
            }),
        );
        let base = serve(app).await;
        let bets = client(&base).fetch_bets("4", "17").await.unwrap();
        assert_eq!(bets[0].name, "4-17");
    }

    #[tokio::test]
    async fn patch_targets_collection_path() {
        let app = Router::new().route(
            "/config/markets/{id}",
            patch(|Path(id): Path<String>, Json(body): Json<JsonValue>| async move {
                if id == "9" && body["is_enabled"] == false {
                    StatusCode::NO_CONTENT
                } else {
                    StatusCode::BAD_REQUEST
                }
            }),
        );
        let base = serve(app).await;
        let mut body = Map::new();
        body.insert("is_enabled".into(), JsonValue::Bool(false));
        client(&base)
            .patch_config_item(ConfigKind::Market, "9", &body)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let app = Router::new().route(
            "/place_bet/place",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let base = serve(app).await;
        let req = PlaceBetRequest {
            bot_ids: vec![1],
            stake: "5".into(),
            selection_id: "77".into(),
            odds: "1.9".into(),
        };
        let err = client(&base).place_bet(&req).await.unwrap_err();
        match err {
            BackendError::Status { status, body, .. } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn unreachable_backend_is_transport_error() {
        let err = client("http://127.0.0.1:1").fetch_status().await.unwrap_err();
        assert!(matches!(err, BackendError::Transport { .. }));
    }
}
