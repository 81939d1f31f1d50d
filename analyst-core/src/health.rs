//! Relationship health classification
//!
//! Staleness is always recomputed from `(tier, last_contact_date, now)`;
//! no status is ever stored.
//!
//! Thresholds:
//! - Tier 1: more than 30 days since last contact is `Overdue`
//! - Tier 2: more than 60 days since last contact is `NeedsUpdate`
//! - everything else is `Healthy`

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::models::{Analyst, Tier};

/// Tier 1 analysts are overdue after this many days without contact
pub const TIER1_OVERDUE_DAYS: u64 = 30;

/// Tier 2 analysts need an update after this many days without contact
pub const TIER2_NEEDS_UPDATE_DAYS: u64 = 60;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Whole days since last contact; `Never` is the unbounded case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElapsedDays {
    Days(u64),
    Never,
}

impl ElapsedDays {
    /// True when strictly more than `threshold` days have passed
    pub fn exceeds(&self, threshold: u64) -> bool {
        match self {
            ElapsedDays::Days(days) => *days > threshold,
            ElapsedDays::Never => true,
        }
    }
}

impl Ord for ElapsedDays {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (ElapsedDays::Days(a), ElapsedDays::Days(b)) => a.cmp(b),
            (ElapsedDays::Days(_), ElapsedDays::Never) => Ordering::Less,
            (ElapsedDays::Never, ElapsedDays::Days(_)) => Ordering::Greater,
            (ElapsedDays::Never, ElapsedDays::Never) => Ordering::Equal,
        }
    }
}

impl PartialOrd for ElapsedDays {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ElapsedDays {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElapsedDays::Days(days) => write!(f, "{} days ago", days),
            ElapsedDays::Never => write!(f, "N/A"),
        }
    }
}

/// Computed staleness of a relationship
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Overdue,
    NeedsUpdate,
    Healthy,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Overdue => write!(f, "Overdue"),
            HealthStatus::NeedsUpdate => write!(f, "Needs Update"),
            HealthStatus::Healthy => write!(f, "Healthy"),
        }
    }
}

/// Days elapsed between a last-contact date and `now`
///
/// The date is read as midnight UTC. The difference is absolute, so a
/// future-dated contact counts as elapsed time too. Partial days round up.
pub fn elapsed_days(last_contact: Option<NaiveDate>, now: DateTime<Utc>) -> ElapsedDays {
    let Some(date) = last_contact else {
        return ElapsedDays::Never;
    };
    let contact = date.and_time(chrono::NaiveTime::MIN).and_utc();
    let millis = (now - contact).num_milliseconds().unsigned_abs();
    let per_day = MILLIS_PER_DAY as u64;
    ElapsedDays::Days(millis.div_ceil(per_day))
}

/// Classifies a relationship by tier and elapsed days
pub fn classify(tier: &Tier, elapsed: ElapsedDays) -> HealthStatus {
    match tier {
        Tier::Tier1 if elapsed.exceeds(TIER1_OVERDUE_DAYS) => HealthStatus::Overdue,
        Tier::Tier2 if elapsed.exceeds(TIER2_NEEDS_UPDATE_DAYS) => HealthStatus::NeedsUpdate,
        _ => HealthStatus::Healthy,
    }
}

/// Sort key: lower is more urgent
pub fn rank_priority(status: HealthStatus) -> u8 {
    match status {
        HealthStatus::Overdue => 0,
        HealthStatus::NeedsUpdate => 1,
        HealthStatus::Healthy => 2,
    }
}

/// Current status of one analyst
pub fn status_of(analyst: &Analyst, now: DateTime<Utc>) -> HealthStatus {
    classify(&analyst.tier, elapsed_days(analyst.last_contact_date, now))
}

/// Orders analysts most urgent first, keeping input order within a status
pub fn sort_by_urgency(mut analysts: Vec<Analyst>, now: DateTime<Utc>) -> Vec<Analyst> {
    // sort_by_key is a stable merge sort
    analysts.sort_by_key(|a| rank_priority(status_of(a, now)));
    analysts
}

/// Aggregate numbers shown on the dashboard summary
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DashboardMetrics {
    pub total: usize,
    pub health_score_percent: u8,
    pub critical_actions: usize,
}

impl Default for DashboardMetrics {
    fn default() -> Self {
        Self {
            total: 0,
            health_score_percent: 100,
            critical_actions: 0,
        }
    }
}

/// Whether an analyst lowers the health score.
///
/// Narrower than the per-analyst badge: Tier 2 staleness does not count.
pub fn counts_as_overdue(analyst: &Analyst, now: DateTime<Utc>) -> bool {
    analyst.tier == Tier::Tier1
        && elapsed_days(analyst.last_contact_date, now).exceeds(TIER1_OVERDUE_DAYS)
}

/// Whether an analyst is a critical action on the dashboard.
///
/// Currently identical to [`counts_as_overdue`].
pub fn counts_as_critical_action(analyst: &Analyst, now: DateTime<Utc>) -> bool {
    counts_as_overdue(analyst, now) && analyst.tier == Tier::Tier1
}

/// Computes total, health score and critical actions over a collection
pub fn compute_dashboard_metrics(analysts: &[Analyst], now: DateTime<Utc>) -> DashboardMetrics {
    let total = analysts.len();
    if total == 0 {
        return DashboardMetrics::default();
    }

    let overdue = analysts.iter().filter(|a| counts_as_overdue(a, now)).count();
    let critical_actions = analysts
        .iter()
        .filter(|a| counts_as_critical_action(a, now))
        .count();

    DashboardMetrics {
        total,
        health_score_percent: rounded_percent(total - overdue, total),
        critical_actions,
    }
}

/// round(100 * part / whole), halves rounding up
fn rounded_percent(part: usize, whole: usize) -> u8 {
    let scaled = (200 * part + whole) / (2 * whole);
    scaled.min(100) as u8
}
