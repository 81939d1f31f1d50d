//! Tracker operations over a storage backend
//!
//! Sequences multi-step writes (interaction insert, then last-contact
//! advance), validates required fields, and wraps reads so a failed query
//! is distinguishable from an empty result.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::contact::{advance_if_newer, ContactAdvance};
use crate::db::DatabaseBackend;
use crate::error::{require, TrackerError, TrackerResult};
use crate::health::{
    compute_dashboard_metrics, elapsed_days, sort_by_urgency, status_of, DashboardMetrics,
    ElapsedDays, HealthStatus,
};
use crate::models::{
    Analyst, AnalystChanges, Interaction, NewAnalyst, NewInteraction, NewReportMention,
    ReportMention,
};

/// Result of a read that may have failed at the store
///
/// Callers that only display data can degrade to an empty value with
/// [`ReadOutcome::into_display_value`], while still being able to tell
/// "nothing there" apart from "couldn't ask".
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome<T> {
    Loaded(T),
    Unavailable(String),
}

impl<T> ReadOutcome<T> {
    pub fn is_loaded(&self) -> bool {
        matches!(self, ReadOutcome::Loaded(_))
    }

    /// The failure message, if the read failed
    pub fn failure(&self) -> Option<&str> {
        match self {
            ReadOutcome::Loaded(_) => None,
            ReadOutcome::Unavailable(message) => Some(message),
        }
    }
}

impl<T: Default> ReadOutcome<T> {
    /// The loaded value, or an empty one when the read failed
    pub fn into_display_value(self) -> T {
        match self {
            ReadOutcome::Loaded(value) => value,
            ReadOutcome::Unavailable(_) => T::default(),
        }
    }
}

impl<T> From<TrackerResult<T>> for ReadOutcome<T> {
    fn from(result: TrackerResult<T>) -> Self {
        match result {
            Ok(value) => ReadOutcome::Loaded(value),
            Err(err) => {
                log::warn!("read degraded: {:#}", anyhow::Error::from(err));
                ReadOutcome::Unavailable(String::from("Data could not be loaded"))
            }
        }
    }
}

/// An analyst with its computed status, ready for listing
#[derive(Debug, Clone, Serialize)]
pub struct AnalystCard {
    pub analyst: Analyst,
    pub status: HealthStatus,
    #[serde(skip)]
    pub elapsed: ElapsedDays,
}

impl AnalystCard {
    pub fn new(analyst: Analyst, now: DateTime<Utc>) -> Self {
        Self {
            status: status_of(&analyst, now),
            elapsed: elapsed_days(analyst.last_contact_date, now),
            analyst,
        }
    }
}

/// Summary metrics plus the urgency-ordered analyst list
#[derive(Debug, Clone, Default, Serialize)]
pub struct Dashboard {
    pub metrics: DashboardMetrics,
    pub analysts: Vec<AnalystCard>,
}

/// One analyst with its interaction and report history
#[derive(Debug, Clone, Serialize)]
pub struct AnalystProfile {
    pub card: AnalystCard,
    pub interactions: Vec<Interaction>,
    pub report_mentions: Vec<ReportMention>,
}

/// Outcome of logging an interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggedInteraction {
    pub interaction_id: Uuid,
    pub contact: ContactAdvance,
}

/// What to do with an analyst's interactions and reports on delete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletePolicy {
    /// Refuse while interactions or reports still reference the analyst
    #[default]
    RejectIfChildren,
    /// Delete interactions and reports, then the analyst
    Cascade,
    /// Delete only the analyst row, leaving children behind
    Orphan,
}

/// Counts of what a delete removed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemovedAnalyst {
    pub id: Uuid,
    pub interactions_removed: usize,
    pub reports_removed: usize,
}

/// Tracker operations bound to one backend
pub struct Tracker {
    backend: Box<dyn DatabaseBackend>,
}

impl Tracker {
    pub fn new(backend: Box<dyn DatabaseBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &dyn DatabaseBackend {
        self.backend.as_ref()
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Adds an analyst after checking required fields
    pub fn add_analyst(&self, fields: NewAnalyst) -> TrackerResult<Uuid> {
        require("name", &fields.name)?;
        require("firm", &fields.firm)?;

        let id = self
            .backend
            .insert_analyst(fields)
            .map_err(TrackerError::write("insert analyst"))?;
        log::info!("added analyst {}", id);
        Ok(id)
    }

    /// Applies a manual edit; any last-contact-date may be set here
    pub fn edit_analyst(&self, id: &Uuid, changes: &AnalystChanges) -> TrackerResult<()> {
        if let Some(name) = &changes.name {
            require("name", name)?;
        }
        if let Some(firm) = &changes.firm {
            require("firm", firm)?;
        }
        if changes.is_empty() {
            return Ok(());
        }

        self.get_analyst(id)?;
        self.backend
            .update_analyst(id, changes)
            .map_err(TrackerError::write("update analyst"))?;
        log::info!("updated analyst {}", id);
        Ok(())
    }

    /// Records an interaction, then advances the analyst's last-contact-date
    /// if the interaction is at least as recent.
    ///
    /// The advance only runs once the interaction is stored. If the insert
    /// fails the error is returned and the analyst is left untouched.
    pub fn log_interaction(&self, fields: NewInteraction) -> TrackerResult<LoggedInteraction> {
        require("notes", &fields.notes)?;

        let analyst = self.get_analyst(&fields.analyst_id)?;
        let date = fields.date;

        let interaction_id = self
            .backend
            .insert_interaction(fields)
            .map_err(TrackerError::write("insert interaction"))?;

        let contact = advance_if_newer(analyst.last_contact_date, date);
        match contact {
            ContactAdvance::Advance(new_date) => {
                self.backend
                    .update_analyst(&analyst.id, &AnalystChanges::last_contact(new_date))
                    .map_err(TrackerError::write("advance last contact date"))?;
                log::info!("analyst {} last contact advanced to {}", analyst.id, new_date);
            }
            ContactAdvance::NoOp => {
                log::debug!(
                    "interaction dated {} is older than last contact of analyst {}",
                    date,
                    analyst.id
                );
            }
        }

        Ok(LoggedInteraction {
            interaction_id,
            contact,
        })
    }

    /// Records a report mention for an existing analyst
    pub fn add_report_mention(&self, fields: NewReportMention) -> TrackerResult<Uuid> {
        require("title", &fields.title)?;
        self.get_analyst(&fields.analyst_id)?;

        let id = self
            .backend
            .insert_report_mention(fields)
            .map_err(TrackerError::write("insert report mention"))?;
        log::info!("added report mention {}", id);
        Ok(id)
    }

    /// Deletes an analyst according to `policy`
    pub fn remove_analyst(&self, id: &Uuid, policy: DeletePolicy) -> TrackerResult<RemovedAnalyst> {
        self.get_analyst(id)?;

        let mut removed = RemovedAnalyst {
            id: *id,
            interactions_removed: 0,
            reports_removed: 0,
        };

        match policy {
            DeletePolicy::RejectIfChildren => {
                let (interactions, reports) = self
                    .backend
                    .count_children(id)
                    .map_err(TrackerError::read("count analyst history"))?;
                if interactions > 0 || reports > 0 {
                    return Err(TrackerError::HasChildren {
                        id: *id,
                        interactions,
                        reports,
                    });
                }
            }
            DeletePolicy::Cascade => {
                removed.interactions_removed = self
                    .backend
                    .delete_interactions_for(id)
                    .map_err(TrackerError::write("delete interactions"))?;
                removed.reports_removed = self
                    .backend
                    .delete_report_mentions_for(id)
                    .map_err(TrackerError::write("delete report mentions"))?;
            }
            DeletePolicy::Orphan => {
                log::warn!("deleting analyst {} without removing its history", id);
            }
        }

        self.backend
            .delete_analyst(id)
            .map_err(TrackerError::write("delete analyst"))?;
        log::info!("deleted analyst {} ({:?})", id, policy);
        Ok(removed)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Fetches one analyst, or `NotFound`
    pub fn get_analyst(&self, id: &Uuid) -> TrackerResult<Analyst> {
        self.backend
            .get_analyst(id)
            .map_err(TrackerError::read("load analyst"))?
            .ok_or(TrackerError::NotFound(*id))
    }

    /// All analysts in stored order
    pub fn list_analysts(&self) -> TrackerResult<Vec<Analyst>> {
        self.backend
            .list_analysts()
            .map_err(TrackerError::read("list analysts"))
    }

    /// Analysts ordered most urgent first
    pub fn ranked_analysts(&self, now: DateTime<Utc>) -> ReadOutcome<Vec<AnalystCard>> {
        self.list_analysts()
            .map(|analysts| {
                sort_by_urgency(analysts, now)
                    .into_iter()
                    .map(|a| AnalystCard::new(a, now))
                    .collect()
            })
            .into()
    }

    /// Dashboard metrics and the ranked list from a single read
    pub fn dashboard(&self, now: DateTime<Utc>) -> ReadOutcome<Dashboard> {
        self.list_analysts()
            .map(|analysts| {
                let metrics = compute_dashboard_metrics(&analysts, now);
                let analysts = sort_by_urgency(analysts, now)
                    .into_iter()
                    .map(|a| AnalystCard::new(a, now))
                    .collect();
                Dashboard { metrics, analysts }
            })
            .into()
    }

    /// One analyst with interactions and report mentions, newest first
    pub fn analyst_profile(&self, id: &Uuid, now: DateTime<Utc>) -> TrackerResult<AnalystProfile> {
        let analyst = self.get_analyst(id)?;
        let interactions = self
            .backend
            .list_interactions(id)
            .map_err(TrackerError::read("list interactions"))?;
        let report_mentions = self
            .backend
            .list_report_mentions(id)
            .map_err(TrackerError::read("list report mentions"))?;

        Ok(AnalystProfile {
            card: AnalystCard::new(analyst, now),
            interactions,
            report_mentions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{BackendType, YamlBackend};
    use crate::models::{InteractionType, Tier, TrackerStore};
    use chrono::{Duration, NaiveDate, TimeZone};
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap()
    }

    fn days_ago(days: i64) -> NaiveDate {
        (now() - Duration::days(days)).date_naive()
    }

    #[derive(Default)]
    struct Faults {
        fail_insert_interaction: AtomicBool,
        fail_update_analyst: AtomicBool,
        fail_reads: AtomicBool,
        analyst_updates: AtomicUsize,
    }

    /// YAML backend with switchable failures
    struct FlakyBackend {
        inner: YamlBackend,
        faults: Arc<Faults>,
    }

    impl DatabaseBackend for FlakyBackend {
        fn backend_type(&self) -> BackendType {
            self.inner.backend_type()
        }

        fn path(&self) -> &Path {
            self.inner.path()
        }

        fn load(&self) -> anyhow::Result<TrackerStore> {
            if self.faults.fail_reads.load(Ordering::SeqCst) {
                anyhow::bail!("connection refused");
            }
            self.inner.load()
        }

        fn save(&self, store: &TrackerStore) -> anyhow::Result<()> {
            self.inner.save(store)
        }

        fn insert_interaction(&self, fields: NewInteraction) -> anyhow::Result<Uuid> {
            if self.faults.fail_insert_interaction.load(Ordering::SeqCst) {
                anyhow::bail!("insert rejected");
            }
            self.inner.insert_interaction(fields)
        }

        fn update_analyst(&self, id: &Uuid, changes: &AnalystChanges) -> anyhow::Result<()> {
            self.faults.analyst_updates.fetch_add(1, Ordering::SeqCst);
            if self.faults.fail_update_analyst.load(Ordering::SeqCst) {
                anyhow::bail!("update rejected");
            }
            self.inner.update_analyst(id, changes)
        }
    }

    fn setup() -> (TempDir, Tracker, Arc<Faults>) {
        let temp_dir = TempDir::new().unwrap();
        let faults = Arc::new(Faults::default());
        let backend = FlakyBackend {
            inner: YamlBackend::new(temp_dir.path().join("analysts.yaml")),
            faults: Arc::clone(&faults),
        };
        (temp_dir, Tracker::new(Box::new(backend)), faults)
    }

    fn interaction(analyst_id: Uuid, date: NaiveDate) -> NewInteraction {
        NewInteraction {
            analyst_id,
            date,
            interaction_type: InteractionType::Call,
            notes: "Quarterly briefing".to_string(),
        }
    }

    #[test]
    fn test_add_analyst_requires_name_and_firm() {
        let (_dir, tracker, _) = setup();

        let err = tracker.add_analyst(NewAnalyst::new("", "Gartner")).unwrap_err();
        assert!(matches!(err, TrackerError::Validation { field: "name" }));

        let err = tracker.add_analyst(NewAnalyst::new("Jane", "  ")).unwrap_err();
        assert!(matches!(err, TrackerError::Validation { field: "firm" }));

        assert!(tracker.list_analysts().unwrap().is_empty());
    }

    #[test]
    fn test_log_interaction_advances_from_absent() {
        let (_dir, tracker, _) = setup();
        let id = tracker.add_analyst(NewAnalyst::new("Jane", "Gartner")).unwrap();

        let logged = tracker.log_interaction(interaction(id, days_ago(3))).unwrap();
        assert_eq!(logged.contact, ContactAdvance::Advance(days_ago(3)));
        assert_eq!(
            tracker.get_analyst(&id).unwrap().last_contact_date,
            Some(days_ago(3))
        );
    }

    #[test]
    fn test_log_older_interaction_does_not_move_date_back() {
        let (_dir, tracker, faults) = setup();
        let id = tracker
            .add_analyst(NewAnalyst::new("Jane", "Gartner").with_last_contact(days_ago(1)))
            .unwrap();

        let logged = tracker.log_interaction(interaction(id, days_ago(20))).unwrap();
        assert_eq!(logged.contact, ContactAdvance::NoOp);
        assert_eq!(faults.analyst_updates.load(Ordering::SeqCst), 0);
        assert_eq!(
            tracker.get_analyst(&id).unwrap().last_contact_date,
            Some(days_ago(1))
        );
        assert_eq!(tracker.backend().list_interactions(&id).unwrap().len(), 1);
    }

    #[test]
    fn test_log_same_day_interaction_still_writes() {
        let (_dir, tracker, faults) = setup();
        let id = tracker
            .add_analyst(NewAnalyst::new("Jane", "Gartner").with_last_contact(days_ago(2)))
            .unwrap();

        tracker.log_interaction(interaction(id, days_ago(2))).unwrap();
        assert_eq!(faults.analyst_updates.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_insert_skips_advance() {
        let (_dir, tracker, faults) = setup();
        let id = tracker
            .add_analyst(NewAnalyst::new("Jane", "Gartner").with_last_contact(days_ago(40)))
            .unwrap();
        faults.fail_insert_interaction.store(true, Ordering::SeqCst);

        let err = tracker.log_interaction(interaction(id, days_ago(0))).unwrap_err();
        assert!(matches!(
            err,
            TrackerError::RemoteWrite {
                operation: "insert interaction",
                ..
            }
        ));
        assert_eq!(faults.analyst_updates.load(Ordering::SeqCst), 0);
        assert_eq!(
            tracker.get_analyst(&id).unwrap().last_contact_date,
            Some(days_ago(40))
        );
    }

    #[test]
    fn test_failed_advance_keeps_interaction() {
        let (_dir, tracker, faults) = setup();
        let id = tracker
            .add_analyst(NewAnalyst::new("Jane", "Gartner").with_last_contact(days_ago(40)))
            .unwrap();
        faults.fail_update_analyst.store(true, Ordering::SeqCst);

        let err = tracker.log_interaction(interaction(id, days_ago(0))).unwrap_err();
        assert!(matches!(
            err,
            TrackerError::RemoteWrite {
                operation: "advance last contact date",
                ..
            }
        ));
        assert_eq!(faults.analyst_updates.load(Ordering::SeqCst), 1);

        let stored = tracker.backend().list_interactions(&id).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].date, days_ago(0));
        assert_eq!(
            tracker.get_analyst(&id).unwrap().last_contact_date,
            Some(days_ago(40))
        );
    }

    #[test]
    fn test_log_interaction_validation_and_missing_analyst() {
        let (_dir, tracker, _) = setup();
        let id = tracker.add_analyst(NewAnalyst::new("Jane", "Gartner")).unwrap();

        let mut blank = interaction(id, days_ago(0));
        blank.notes = "   ".to_string();
        assert!(matches!(
            tracker.log_interaction(blank).unwrap_err(),
            TrackerError::Validation { field: "notes" }
        ));

        let missing = Uuid::new_v4();
        assert!(matches!(
            tracker.log_interaction(interaction(missing, days_ago(0))).unwrap_err(),
            TrackerError::NotFound(found) if found == missing
        ));
        assert!(tracker.backend().list_interactions(&missing).unwrap().is_empty());
    }

    #[test]
    fn test_add_report_mention() {
        let (_dir, tracker, _) = setup();
        let id = tracker.add_analyst(NewAnalyst::new("Jane", "Gartner")).unwrap();

        let blank = NewReportMention {
            analyst_id: id,
            title: "".to_string(),
            report_date: days_ago(5),
            url: None,
            summary: None,
        };
        assert!(matches!(
            tracker.add_report_mention(blank.clone()).unwrap_err(),
            TrackerError::Validation { field: "title" }
        ));

        let mention = NewReportMention {
            title: "Market Guide".to_string(),
            url: Some("https://example.com/guide".to_string()),
            ..blank
        };
        tracker.add_report_mention(mention).unwrap();

        let profile = tracker.analyst_profile(&id, now()).unwrap();
        assert_eq!(profile.report_mentions.len(), 1);
        assert_eq!(profile.report_mentions[0].title, "Market Guide");
        // Report mentions never touch the contact date
        assert!(profile.card.analyst.last_contact_date.is_none());
    }

    #[test]
    fn test_report_mention_for_missing_analyst() {
        let (_dir, tracker, _) = setup();
        tracker.add_analyst(NewAnalyst::new("Jane", "Gartner")).unwrap();

        let missing = Uuid::new_v4();
        let err = tracker
            .add_report_mention(NewReportMention {
                analyst_id: missing,
                title: "Market Guide".to_string(),
                report_date: days_ago(5),
                url: None,
                summary: None,
            })
            .unwrap_err();
        assert!(matches!(err, TrackerError::NotFound(found) if found == missing));
        assert!(tracker.backend().load().unwrap().report_mentions.is_empty());
    }

    #[test]
    fn test_remove_analyst_policies() {
        let (_dir, tracker, _) = setup();
        let id = tracker.add_analyst(NewAnalyst::new("Jane", "Gartner")).unwrap();
        tracker.log_interaction(interaction(id, days_ago(1))).unwrap();

        let err = tracker
            .remove_analyst(&id, DeletePolicy::RejectIfChildren)
            .unwrap_err();
        assert!(matches!(
            err,
            TrackerError::HasChildren {
                interactions: 1,
                reports: 0,
                ..
            }
        ));
        assert!(tracker.get_analyst(&id).is_ok());

        let removed = tracker.remove_analyst(&id, DeletePolicy::Cascade).unwrap();
        assert_eq!(removed.interactions_removed, 1);
        assert!(matches!(tracker.get_analyst(&id), Err(TrackerError::NotFound(_))));
        assert!(tracker.backend().list_interactions(&id).unwrap().is_empty());
    }

    #[test]
    fn test_remove_analyst_orphan_keeps_history() {
        let (_dir, tracker, _) = setup();
        let id = tracker.add_analyst(NewAnalyst::new("Jane", "Gartner")).unwrap();
        tracker.log_interaction(interaction(id, days_ago(1))).unwrap();

        tracker.remove_analyst(&id, DeletePolicy::Orphan).unwrap();
        assert_eq!(tracker.backend().list_interactions(&id).unwrap().len(), 1);
    }

    #[test]
    fn test_read_failure_is_distinguishable_from_empty() {
        let (_dir, tracker, faults) = setup();

        let empty = tracker.dashboard(now());
        assert!(empty.is_loaded());

        faults.fail_reads.store(true, Ordering::SeqCst);
        let failed = tracker.dashboard(now());
        assert!(!failed.is_loaded());
        assert!(failed.failure().is_some());

        let degraded = failed.into_display_value();
        assert!(degraded.analysts.is_empty());
        assert_eq!(degraded.metrics.health_score_percent, 100);
    }

    #[test]
    fn test_edit_analyst() {
        let (_dir, tracker, _) = setup();
        let id = tracker.add_analyst(NewAnalyst::new("Jane", "Gartner")).unwrap();

        let err = tracker
            .edit_analyst(
                &id,
                &AnalystChanges {
                    name: Some("".to_string()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, TrackerError::Validation { field: "name" }));

        // Manual edits may move the date backward
        tracker
            .edit_analyst(
                &id,
                &AnalystChanges {
                    tier: Some(Tier::Tier2),
                    last_contact_date: Some(Some(days_ago(100))),
                    ..Default::default()
                },
            )
            .unwrap();
        let analyst = tracker.get_analyst(&id).unwrap();
        assert_eq!(analyst.tier, Tier::Tier2);
        assert_eq!(analyst.last_contact_date, Some(days_ago(100)));
    }

    #[test]
    fn test_overdue_analyst_recovers_after_logging() {
        let (_dir, tracker, _) = setup();
        let id = tracker
            .add_analyst(
                NewAnalyst::new("Jane", "Gartner")
                    .with_tier(Tier::Tier1)
                    .with_last_contact(days_ago(35)),
            )
            .unwrap();
        tracker
            .add_analyst(NewAnalyst::new("Sam", "IDC").with_tier(Tier::Tier3))
            .unwrap();

        let before = tracker.dashboard(now()).into_display_value();
        assert_eq!(before.analysts[0].analyst.id, id);
        assert_eq!(before.analysts[0].status, HealthStatus::Overdue);
        assert_eq!(before.metrics.critical_actions, 1);
        assert_eq!(before.metrics.health_score_percent, 50);

        let logged = tracker
            .log_interaction(interaction(id, now().date_naive()))
            .unwrap();
        assert_eq!(logged.contact, ContactAdvance::Advance(now().date_naive()));

        let after = tracker.dashboard(now()).into_display_value();
        let card = after.analysts.iter().find(|c| c.analyst.id == id).unwrap();
        assert_eq!(card.status, HealthStatus::Healthy);
        assert_eq!(after.metrics.critical_actions, 0);
        assert_eq!(after.metrics.health_score_percent, 100);
    }
}
