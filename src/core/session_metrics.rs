/// Session metrics and insights
///
/// Everything here is derived from a user's session list; nothing is stored.

use crate::models::UserSession;
use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Time of day categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Morning,   // 6am - 12pm
    Afternoon, // 12pm - 6pm
    Evening,   // 6pm - 10pm
    Night,     // 10pm - 6am
}

impl TimeOfDay {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            6..=11 => TimeOfDay::Morning,
            12..=17 => TimeOfDay::Afternoon,
            18..=21 => TimeOfDay::Evening,
            _ => TimeOfDay::Night,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetrics {
    pub total_sessions: usize,
    pub total_interactions: u64,
    /// Seconds
    pub average_duration: f64,
    pub most_active_hour: Option<u32>,
    pub most_active_time: Option<TimeOfDay>,
    pub dominant_device: Option<String>,
    /// 1.0 means sessions start at perfectly regular intervals
    pub consistency_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInsights {
    /// Sessions per day between the first and last session
    pub session_frequency: f64,
    pub active_days: usize,
    pub longest_streak: usize,
    pub first_session: Option<DateTime<Utc>>,
    pub last_session: Option<DateTime<Utc>>,
}

pub fn compute_metrics(sessions: &[UserSession]) -> SessionMetrics {
    let total_sessions = sessions.len();

    let average_duration = if sessions.is_empty() {
        0.0
    } else {
        sessions.iter().map(duration_secs).sum::<i64>() as f64 / total_sessions as f64
    };

    let most_active_hour = mode_hour(sessions);

    SessionMetrics {
        total_sessions,
        total_interactions: sessions.iter().map(|s| s.interaction_count).sum(),
        average_duration,
        most_active_hour,
        most_active_time: most_active_hour.map(TimeOfDay::from_hour),
        dominant_device: dominant_device(sessions),
        consistency_score: consistency_score(sessions),
    }
}

pub fn compute_insights(sessions: &[UserSession]) -> SessionInsights {
    let mut starts: Vec<DateTime<Utc>> = sessions.iter().map(|s| s.start_time).collect();
    starts.sort();

    let days: BTreeSet<NaiveDate> = starts.iter().map(|t| t.date_naive()).collect();

    let session_frequency = match (starts.first(), starts.last()) {
        (Some(first), Some(last)) => {
            let span_days = (last.date_naive() - first.date_naive()).num_days() + 1;
            starts.len() as f64 / span_days as f64
        }
        _ => 0.0,
    };

    SessionInsights {
        session_frequency,
        active_days: days.len(),
        longest_streak: longest_streak(&days),
        first_session: starts.first().copied(),
        last_session: starts.last().copied(),
    }
}

fn duration_secs(session: &UserSession) -> i64 {
    if session.is_active {
        (session.last_activity - session.start_time).num_seconds().max(0)
    } else {
        session.session_duration
    }
}

/// Most common start hour; the earliest hour wins a tie
fn mode_hour(sessions: &[UserSession]) -> Option<u32> {
    let mut histogram = [0usize; 24];
    for session in sessions {
        histogram[session.start_time.hour() as usize] += 1;
    }

    let (hour, count) = histogram
        .iter()
        .enumerate()
        .fold((0usize, 0usize), |best, (hour, &count)| if count > best.1 { (hour, count) } else { best });

    (count > 0).then_some(hour as u32)
}

fn dominant_device(sessions: &[UserSession]) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for session in sessions {
        *counts.entry(session.metadata.device_type.as_str()).or_insert(0) += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for (device, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((device, count));
        }
    }
    best.map(|(device, _)| device.to_string())
}

// 1 - coefficient of variation of the gaps between session starts
fn consistency_score(sessions: &[UserSession]) -> f64 {
    let mut starts: Vec<DateTime<Utc>> = sessions.iter().map(|s| s.start_time).collect();
    if starts.len() < 2 {
        return 0.0;
    }
    starts.sort();

    let gaps: Vec<f64> = starts
        .windows(2)
        .map(|w| (w[1] - w[0]).num_seconds() as f64)
        .collect();
    let mean = gaps.iter().sum::<f64>() / gaps.len() as f64;
    if mean <= 0.0 {
        return 1.0;
    }

    let variance = gaps.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / gaps.len() as f64;
    (1.0 - variance.sqrt() / mean).clamp(0.0, 1.0)
}

fn longest_streak(days: &BTreeSet<NaiveDate>) -> usize {
    let mut longest = 0;
    let mut current = 0;
    let mut previous: Option<NaiveDate> = None;

    for day in days {
        current = match previous {
            Some(prev) if (*day - prev).num_days() == 1 => current + 1,
            _ => 1,
        };
        longest = longest.max(current);
        previous = Some(*day);
    }

    longest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EndReason, SessionPreferences};
    use chrono::{Duration, TimeZone};

    fn session_at(day: u32, hour: u32, minutes: i64, device: &str, interactions: u64) -> UserSession {
        let start = Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap();
        let mut session = UserSession::new("u1", SessionPreferences::default(), device);
        session.start_time = start;
        session.last_activity = start + Duration::minutes(minutes);
        session.interaction_count = interactions;
        session.end(EndReason::Explicit, session.last_activity);
        session
    }

    #[test]
    fn test_metrics() {
        let sessions = vec![
            session_at(1, 9, 10, "desktop", 4),
            session_at(2, 9, 30, "desktop", 6),
            session_at(3, 20, 20, "mobile", 2),
        ];

        let metrics = compute_metrics(&sessions);
        assert_eq!(metrics.total_sessions, 3);
        assert_eq!(metrics.total_interactions, 12);
        assert_eq!(metrics.average_duration, 1200.0);
        assert_eq!(metrics.most_active_hour, Some(9));
        assert_eq!(metrics.most_active_time, Some(TimeOfDay::Morning));
        assert_eq!(metrics.dominant_device.as_deref(), Some("desktop"));
        assert!(metrics.consistency_score > 0.0 && metrics.consistency_score <= 1.0);
    }

    #[test]
    fn test_regular_sessions_are_fully_consistent() {
        let sessions: Vec<_> = (1..=4).map(|d| session_at(d, 9, 5, "desktop", 1)).collect();
        assert_eq!(compute_metrics(&sessions).consistency_score, 1.0);
    }

    #[test]
    fn test_insights_streak_and_frequency() {
        let sessions = vec![
            session_at(1, 9, 5, "desktop", 1),
            session_at(2, 9, 5, "desktop", 1),
            session_at(2, 15, 5, "desktop", 1),
            session_at(3, 9, 5, "desktop", 1),
            session_at(7, 9, 5, "desktop", 1),
            session_at(8, 9, 5, "desktop", 1),
        ];

        let insights = compute_insights(&sessions);
        assert_eq!(insights.longest_streak, 3);
        assert_eq!(insights.active_days, 5);
        assert_eq!(insights.session_frequency, 6.0 / 8.0);
    }

    #[test]
    fn test_empty() {
        let metrics = compute_metrics(&[]);
        assert_eq!(metrics.total_sessions, 0);
        assert_eq!(metrics.most_active_time, None);

        let insights = compute_insights(&[]);
        assert_eq!(insights.longest_streak, 0);
        assert_eq!(insights.session_frequency, 0.0);
    }

    #[test]
    fn test_time_of_day() {
        assert_eq!(TimeOfDay::from_hour(6), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(12), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_hour(21), TimeOfDay::Evening);
        assert_eq!(TimeOfDay::from_hour(2), TimeOfDay::Night);
    }
}
