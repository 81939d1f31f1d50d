use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

/// Default sentiment score for newly added analysts
pub const DEFAULT_SENTIMENT_SCORE: i32 = 5;

/// Advisory sentiment range; values outside it are stored as-is
pub const SENTIMENT_RANGE: std::ops::RangeInclusive<i32> = 1..=10;

/// Analyst importance classification
///
/// Only Tier 1 and Tier 2 carry staleness thresholds. Tiers that don't
/// parse are kept verbatim so stored data round-trips unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Tier {
    #[default]
    Tier1,
    Tier2,
    Tier3,
    Unrecognized(String),
}

impl Tier {
    /// Parse a stored label; only the exact canonical labels are recognized
    pub fn from_label(s: &str) -> Self {
        match s {
            "Tier 1" => Tier::Tier1,
            "Tier 2" => Tier::Tier2,
            "Tier 3" => Tier::Tier3,
            _ => Tier::Unrecognized(s.to_string()),
        }
    }

    /// Parse a tier typed by a user, accepting shorthands like `t1` or `2`
    pub fn from_str(s: &str) -> Self {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "tier1" | "t1" | "1" => Tier::Tier1,
            "tier2" | "t2" | "2" => Tier::Tier2,
            "tier3" | "t3" | "3" => Tier::Tier3,
            _ => Tier::Unrecognized(s.to_string()),
        }
    }

    /// The canonical stored label
    pub fn as_str(&self) -> &str {
        match self {
            Tier::Tier1 => "Tier 1",
            Tier::Tier2 => "Tier 2",
            Tier::Tier3 => "Tier 3",
            Tier::Unrecognized(raw) => raw,
        }
    }

    /// All selectable tiers
    pub fn all() -> Vec<Tier> {
        vec![Tier::Tier1, Tier::Tier2, Tier::Tier3]
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for Tier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Tier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Tier::from_label(&raw))
    }
}

/// Kind of logged interaction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum InteractionType {
    #[default]
    Call,
    Email,
    Meeting,
    Conference,
}

impl fmt::Display for InteractionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InteractionType::Call => write!(f, "Call"),
            InteractionType::Email => write!(f, "Email"),
            InteractionType::Meeting => write!(f, "Meeting"),
            InteractionType::Conference => write!(f, "Conference"),
        }
    }
}

impl InteractionType {
    /// Parse an interaction type, case-insensitively
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "call" => Some(InteractionType::Call),
            "email" | "e-mail" => Some(InteractionType::Email),
            "meeting" => Some(InteractionType::Meeting),
            "conference" => Some(InteractionType::Conference),
            _ => None,
        }
    }

    pub fn all() -> Vec<InteractionType> {
        vec![
            InteractionType::Call,
            InteractionType::Email,
            InteractionType::Meeting,
            InteractionType::Conference,
        ]
    }
}

/// An industry analyst whose relationship is being tracked
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Analyst {
    /// Unique identifier (UUID)
    pub id: Uuid,

    /// Full name of the analyst
    pub name: String,

    /// Research firm the analyst works for
    pub firm: String,

    /// Importance tier
    pub tier: Tier,

    /// Relationship sentiment, nominally 1-10
    pub sentiment_score: i32,

    /// Date of the most recent contact, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_contact_date: Option<NaiveDate>,

    /// When the analyst was added
    pub created_at: DateTime<Utc>,
}

impl Analyst {
    /// Builds a stored analyst from insert fields
    pub fn from_new(new: NewAnalyst) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: new.name,
            firm: new.firm,
            tier: new.tier,
            sentiment_score: new.sentiment_score,
            last_contact_date: new.last_contact_date,
            created_at: Utc::now(),
        }
    }

    /// Applies a partial update in place
    pub fn apply(&mut self, changes: &AnalystChanges) {
        if let Some(name) = &changes.name {
            self.name = name.clone();
        }
        if let Some(firm) = &changes.firm {
            self.firm = firm.clone();
        }
        if let Some(tier) = &changes.tier {
            self.tier = tier.clone();
        }
        if let Some(score) = changes.sentiment_score {
            self.sentiment_score = score;
        }
        if let Some(date) = changes.last_contact_date {
            self.last_contact_date = date;
        }
    }
}

/// Fields supplied when adding an analyst
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewAnalyst {
    pub name: String,
    pub firm: String,
    pub tier: Tier,
    pub sentiment_score: i32,
    pub last_contact_date: Option<NaiveDate>,
}

impl NewAnalyst {
    /// Creates insert fields with the add-form defaults (Tier 1, sentiment 5)
    pub fn new(name: impl Into<String>, firm: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            firm: firm.into(),
            tier: Tier::default(),
            sentiment_score: DEFAULT_SENTIMENT_SCORE,
            last_contact_date: None,
        }
    }

    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = tier;
        self
    }

    pub fn with_last_contact(mut self, date: NaiveDate) -> Self {
        self.last_contact_date = Some(date);
        self
    }

    pub fn with_sentiment(mut self, score: i32) -> Self {
        self.sentiment_score = score;
        self
    }
}

/// Partial update of an analyst record
///
/// `None` leaves a field untouched. `last_contact_date: Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalystChanges {
    pub name: Option<String>,
    pub firm: Option<String>,
    pub tier: Option<Tier>,
    pub sentiment_score: Option<i32>,
    pub last_contact_date: Option<Option<NaiveDate>>,
}

impl AnalystChanges {
    /// An update that only sets the last-contact-date
    pub fn last_contact(date: NaiveDate) -> Self {
        Self {
            last_contact_date: Some(Some(date)),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &AnalystChanges::default()
    }
}

/// A logged call, email, meeting or conference with an analyst
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Interaction {
    pub id: Uuid,

    /// Owning analyst
    pub analyst_id: Uuid,

    /// Calendar date the interaction took place
    pub date: NaiveDate,

    #[serde(rename = "type")]
    pub interaction_type: InteractionType,

    pub notes: String,

    pub created_at: DateTime<Utc>,
}

impl Interaction {
    pub fn from_new(new: NewInteraction) -> Self {
        Self {
            id: Uuid::new_v4(),
            analyst_id: new.analyst_id,
            date: new.date,
            interaction_type: new.interaction_type,
            notes: new.notes,
            created_at: Utc::now(),
        }
    }
}

/// Fields supplied when logging an interaction
#[derive(Debug, Clone, PartialEq)]
pub struct NewInteraction {
    pub analyst_id: Uuid,
    pub date: NaiveDate,
    pub interaction_type: InteractionType,
    pub notes: String,
}

/// A research report in which an analyst mentioned us
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportMention {
    pub id: Uuid,

    /// Owning analyst
    pub analyst_id: Uuid,

    /// Report title
    pub title: String,

    /// Publication date of the report
    pub report_date: NaiveDate,

    /// Link to the report
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Free-text summary of the mention
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl ReportMention {
    pub fn from_new(new: NewReportMention) -> Self {
        Self {
            id: Uuid::new_v4(),
            analyst_id: new.analyst_id,
            title: new.title,
            report_date: new.report_date,
            url: non_blank(new.url),
            summary: non_blank(new.summary),
            created_at: Utc::now(),
        }
    }
}

/// Fields supplied when recording a report mention
#[derive(Debug, Clone, PartialEq)]
pub struct NewReportMention {
    pub analyst_id: Uuid,
    pub title: String,
    pub report_date: NaiveDate,
    pub url: Option<String>,
    pub summary: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// The complete tracker dataset, as persisted by whole-file backends
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TrackerStore {
    /// Dataset name
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub analysts: Vec<Analyst>,

    #[serde(default)]
    pub interactions: Vec<Interaction>,

    #[serde(default, rename = "reports")]
    pub report_mentions: Vec<ReportMention>,
}

impl TrackerStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_analyst_by_id(&self, id: &Uuid) -> Option<&Analyst> {
        self.analysts.iter().find(|a| &a.id == id)
    }

    pub fn get_analyst_by_id_mut(&mut self, id: &Uuid) -> Option<&mut Analyst> {
        self.analysts.iter_mut().find(|a| &a.id == id)
    }

    /// Finds analysts whose name matches case-insensitively
    pub fn find_analysts_by_name(&self, name: &str) -> Vec<&Analyst> {
        let needle = name.trim().to_lowercase();
        self.analysts
            .iter()
            .filter(|a| a.name.to_lowercase() == needle)
            .collect()
    }

    /// Interactions for one analyst, newest first
    pub fn interactions_for(&self, analyst_id: &Uuid) -> Vec<Interaction> {
        let mut items: Vec<Interaction> = self
            .interactions
            .iter()
            .filter(|i| &i.analyst_id == analyst_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.date.cmp(&a.date));
        items
    }

    /// Report mentions for one analyst, newest first
    pub fn report_mentions_for(&self, analyst_id: &Uuid) -> Vec<ReportMention> {
        let mut items: Vec<ReportMention> = self
            .report_mentions
            .iter()
            .filter(|r| &r.analyst_id == analyst_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.report_date.cmp(&a.report_date));
        items
    }

    /// Interactions and report mentions whose analyst no longer exists
    pub fn orphan_counts(&self) -> (usize, usize) {
        let interactions = self
            .interactions
            .iter()
            .filter(|i| self.get_analyst_by_id(&i.analyst_id).is_none())
            .count();
        let reports = self
            .report_mentions
            .iter()
            .filter(|r| self.get_analyst_by_id(&r.analyst_id).is_none())
            .count();
        (interactions, reports)
    }
}
