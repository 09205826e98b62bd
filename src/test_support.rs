use axum::Router;

use crate::models::{NotificationRecord, Tip};

/// Serves `app` on an ephemeral localhost port and returns its base URL.
pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

pub fn record(id: &str, uptime_seconds: u64, score: &str) -> NotificationRecord {
    NotificationRecord {
        id: id.to_string(),
        uptime_seconds,
        uptime_formatted: format!("{:02}:{:02}", uptime_seconds / 60, uptime_seconds % 60),
        match_time: "1st half".to_string(),
        score: score.to_string(),
        link: format!("https://example.test/event/{id}"),
        sport_name: "⚽".to_string(),
        first_team: "Home".to_string(),
        second_team: "Away".to_string(),
        bet_name: "Total goals".to_string(),
        tips: vec![Tip {
            name: "Over 2.5".to_string(),
            odds: 1.85,
            selection_id: Some(format!("sel-{id}")),
        }],
    }
}
