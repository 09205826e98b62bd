//! Per-notification view state and the mutations it emits.

use serde::Serialize;

use crate::{models::NotificationRecord, surface::Mutation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UptimeClass {
    #[serde(rename = "uptime-short")]
    Short,
    #[serde(rename = "uptime-medium")]
    Medium,
    #[serde(rename = "uptime-long")]
    Long,
}

impl UptimeClass {
    /// Bands are inclusive at the lower bound: [60,150), [150,300), [300,inf).
    pub fn for_uptime(uptime_seconds: u64) -> Option<Self> {
        match uptime_seconds {
            0..=59 => None,
            60..=149 => Some(UptimeClass::Short),
            150..=299 => Some(UptimeClass::Medium),
            _ => Some(UptimeClass::Long),
        }
    }

    pub fn css_class(self) -> &'static str {
        match self {
            UptimeClass::Short => "uptime-short",
            UptimeClass::Medium => "uptime-medium",
            UptimeClass::Long => "uptime-long",
        }
    }
}

/// `"1:2"` becomes `"1:2 (3)"`. Anything that is not exactly two integers is shown verbatim.
pub fn format_score(score: &str) -> String {
    let parts: Vec<&str> = score.split(':').collect();
    if parts.len() != 2 {
        return score.to_string();
    }
    let (Ok(a), Ok(b)) = (parts[0].trim().parse::<i64>(), parts[1].trim().parse::<i64>()) else {
        return score.to_string();
    };
    match a.checked_add(b) {
        Some(sum) => format!("{score} ({sum})"),
        None => score.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedTip {
    pub label: String,
    pub name: String,
    pub odds: f64,
    pub selection_id: Option<String>,
}

/// Everything the surface needs to draw one notification card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedNotification {
    pub id: String,
    pub href: String,
    pub sport: String,
    pub title: String,
    pub bet: String,
    pub tips: Vec<RenderedTip>,
    pub uptime: String,
    pub uptime_class: Option<UptimeClass>,
    pub match_time: String,
    pub score: String,
}

/// Presentation state for one live notification id.
#[derive(Debug, Clone)]
pub struct NotificationView {
    id: String,
    uptime_text: String,
    uptime_class: Option<UptimeClass>,
    match_time: String,
    score: String,
    sound_played: bool,
}

impl NotificationView {
    /// Builds the view and the mutations that put it on the surface.
    pub fn create(record: &NotificationRecord, sound_min_uptime: Option<u64>) -> (Self, Vec<Mutation>) {
        let mut view = Self {
            id: record.id.clone(),
            uptime_text: record.uptime_formatted.clone(),
            uptime_class: UptimeClass::for_uptime(record.uptime_seconds),
            match_time: record.match_time.clone(),
            score: record.score.clone(),
            sound_played: false,
        };

        let node = RenderedNotification {
            id: record.id.clone(),
            href: record.link.clone(),
            sport: record.sport_name.clone(),
            title: record.event_name(),
            bet: record.bet_name.clone(),
            tips: record
                .tips
                .iter()
                .map(|t| RenderedTip {
                    label: format!(" {} ({})", t.name, t.odds),
                    name: t.name.clone(),
                    odds: t.odds,
                    selection_id: t.selection_id.clone(),
                })
                .collect(),
            uptime: view.uptime_text.clone(),
            uptime_class: view.uptime_class,
            match_time: view.match_time.clone(),
            score: format_score(&record.score),
        };

        let mut out = vec![Mutation::Attach { node }];
        view.check_sound(record.uptime_seconds, sound_min_uptime, &mut out);
        (view, out)
    }

    /// Patches uptime, match time and score in place. Unchanged fields emit nothing.
    pub fn update(&mut self, record: &NotificationRecord, sound_min_uptime: Option<u64>) -> Vec<Mutation> {
        let mut out = Vec::new();

        if self.uptime_text != record.uptime_formatted {
            self.uptime_text = record.uptime_formatted.clone();
            out.push(Mutation::SetUptime {
                id: self.id.clone(),
                text: self.uptime_text.clone(),
            });
        }

        let class = UptimeClass::for_uptime(record.uptime_seconds);
        if class != self.uptime_class {
            self.uptime_class = class;
            out.push(Mutation::SetUptimeClass {
                id: self.id.clone(),
                class,
            });
        }
        self.check_sound(record.uptime_seconds, sound_min_uptime, &mut out);

        if self.match_time != record.match_time {
            self.match_time = record.match_time.clone();
            out.push(Mutation::SetMatchTime {
                id: self.id.clone(),
                text: self.match_time.clone(),
            });
        }

        if self.score != record.score {
            self.score = record.score.clone();
            out.push(Mutation::SetScore {
                id: self.id.clone(),
                text: format_score(&self.score),
                highlight: true,
            });
        }

        out
    }

    fn check_sound(&mut self, uptime_seconds: u64, threshold: Option<u64>, out: &mut Vec<Mutation>) {
        let Some(threshold) = threshold else {
            return;
        };
        if !self.sound_played && uptime_seconds > threshold {
            self.sound_played = true;
            out.push(Mutation::PlaySound { id: self.id.clone() });
        }
    }

    #[cfg(test)]
    pub fn sound_played(&self) -> bool {
        self.sound_played
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::record;

    #[test]
    fn score_summary() {
        assert_eq!(format_score("1:2"), "1:2 (3)");
        assert_eq!(format_score("1"), "1");
        assert_eq!(format_score("a:b"), "a:b");
        assert_eq!(format_score("1:2:3"), "1:2:3");
        assert_eq!(format_score(""), "");
        assert_eq!(format_score("10:x"), "10:x");
    }

    #[test]
    fn uptime_bands() {
        assert_eq!(UptimeClass::for_uptime(0), None);
        assert_eq!(UptimeClass::for_uptime(59), None);
        assert_eq!(UptimeClass::for_uptime(60), Some(UptimeClass::Short));
        assert_eq!(UptimeClass::for_uptime(149), Some(UptimeClass::Short));
        assert_eq!(UptimeClass::for_uptime(150), Some(UptimeClass::Medium));
        assert_eq!(UptimeClass::for_uptime(299), Some(UptimeClass::Medium));
        assert_eq!(UptimeClass::for_uptime(300), Some(UptimeClass::Long));
    }

    #[test]
    fn create_renders_title_tips_and_score_sum() {
        let (view, muts) = NotificationView::create(&record("n1", 70, "2:1"), None);
        assert_eq!(view.uptime_class, Some(UptimeClass::Short));
        assert_eq!(muts.len(), 1);
        let Mutation::Attach { node } = &muts[0] else {
            panic!("expected attach");
        };
        assert_eq!(node.title, "Home vs Away");
        assert_eq!(node.score, "2:1 (3)");
        assert_eq!(node.tips[0].label, " Over 2.5 (1.85)");
    }

    #[test]
    fn update_with_same_record_is_silent() {
        let r = record("n1", 70, "2:1");
        let (mut view, _) = NotificationView::create(&r, None);
        assert!(view.update(&r, None).is_empty());
    }

    #[test]
    fn score_change_highlights() {
        let (mut view, _) = NotificationView::create(&record("n1", 10, "0:0"), None);
        let muts = view.update(&record("n1", 10, "1:0"), None);
        assert!(muts.iter().any(|m| matches!(
            m,
            Mutation::SetScore { text, highlight: true, .. } if text == "1:0 (1)"
        )));
        assert_eq!(view.score, "1:0");
    }

    #[test]
    fn sound_latch_fires_once() {
        let (mut view, muts) = NotificationView::create(&record("n1", 100, "0:0"), Some(120));
        assert!(!muts.iter().any(|m| matches!(m, Mutation::PlaySound { .. })));

        let fired = view.update(&record("n1", 121, "0:0"), Some(120));
        assert!(fired.iter().any(|m| matches!(m, Mutation::PlaySound { .. })));
        assert!(view.sound_played());

        for uptime in [130, 400, 5] {
            let muts = view.update(&record("n1", uptime, "0:0"), Some(120));
            assert!(!muts.iter().any(|m| matches!(m, Mutation::PlaySound { .. })));
        }
        assert!(view.sound_played());
    }

    #[test]
    fn threshold_is_strict() {
        let (_, muts) = NotificationView::create(&record("n1", 120, "0:0"), Some(120));
        assert!(!muts.iter().any(|m| matches!(m, Mutation::PlaySound { .. })));
    }
}
