/// Presentation helpers for activity lists
///
/// Ordering, grouping by calendar day (UTC), filtering, and the small
/// formatting bits consumers share. Placeholders stay in the list but are
/// labelled as estimates and never get an explorer link.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::types::{Activity, ActivityKind};

/// Descending by timestamp; equal timestamps keep their order
pub fn sort_newest_first(activities: &mut [Activity]) {
    activities.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayGroup {
    pub date: NaiveDate,
    pub label: String,
    pub activities: Vec<Activity>,
}

fn utc_date(timestamp: u64) -> NaiveDate {
    DateTime::<Utc>::from_timestamp(timestamp as i64, 0)
        .unwrap_or_default()
        .date_naive()
}

/// "Today", "Yesterday", else e.g. "Mar 4, 2024"
pub fn day_label(date: NaiveDate, today: NaiveDate) -> String {
    match (today - date).num_days() {
        0 => "Today".to_string(),
        1 => "Yesterday".to_string(),
        _ => date.format("%b %-d, %Y").to_string(),
    }
}

/// Group by UTC day, newest day first, newest activity first within a day
pub fn group_by_day(activities: &[Activity], now_secs: u64) -> Vec<DayGroup> {
    let mut sorted = activities.to_vec();
    sort_newest_first(&mut sorted);

    let today = utc_date(now_secs);
    let mut groups: Vec<DayGroup> = Vec::new();
    for activity in sorted {
        let date = utc_date(activity.timestamp);
        match groups.last_mut() {
            Some(group) if group.date == date => group.activities.push(activity),
            _ => groups.push(DayGroup {
                date,
                label: day_label(date, today),
                activities: vec![activity],
            }),
        }
    }
    groups
}

#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub kind: Option<ActivityKind>,
    pub include_placeholders: bool,
    /// Case-insensitive substring of title or subtitle
    pub query: Option<String>,
}

impl ActivityFilter {
    pub fn all() -> Self {
        Self {
            include_placeholders: true,
            ..Default::default()
        }
    }

    pub fn matches(&self, activity: &Activity) -> bool {
        if let Some(kind) = self.kind {
            if activity.kind != kind {
                return false;
            }
        }
        if !self.include_placeholders && activity.is_placeholder() {
            return false;
        }
        match self.query.as_deref().map(str::trim) {
            Some(q) if !q.is_empty() => {
                let q = q.to_lowercase();
                activity.title.to_lowercase().contains(&q)
                    || activity.subtitle.to_lowercase().contains(&q)
            }
            _ => true,
        }
    }

    pub fn apply(&self, activities: &[Activity]) -> Vec<Activity> {
        activities.iter().filter(|a| self.matches(a)).cloned().collect()
    }
}

/// Block explorer link; placeholders have no transaction to link to
pub fn explorer_tx_url(explorer_base: &str, activity: &Activity) -> Option<String> {
    if activity.is_placeholder() {
        return None;
    }
    Some(format!(
        "{}/tx/{}",
        explorer_base.trim_end_matches('/'),
        activity.transaction_hash
    ))
}

pub fn display_label(activity: &Activity) -> String {
    if activity.is_placeholder() {
        format!("{} (estimated)", activity.title)
    } else {
        activity.title.clone()
    }
}

/// Coarse "time ago" text
pub fn relative_time(timestamp: u64, now_secs: u64) -> String {
    let elapsed = now_secs.saturating_sub(timestamp);
    match elapsed {
        0..=59 => "just now".to_string(),
        60..=3_599 => format!("{}m ago", elapsed / 60),
        3_600..=86_399 => format!("{}h ago", elapsed / 3_600),
        _ => format!("{}d ago", elapsed / 86_400),
    }
}
