pub fn now_ts() -> f64 {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    now.as_secs_f64()
}

/// Wall-clock time of day, used for "last checked" labels.
pub fn clock_label() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

pub fn non_empty(s: &str) -> Option<&str> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t)
    }
}
