pub mod config;
pub mod contact;
pub mod db;
pub mod error;
pub mod health;
pub mod models;
pub mod storage;
pub mod tracker;

// Re-export commonly used types
pub use config::{determine_database, get_config_path, PathSource, TrackerConfig};
pub use contact::{advance_if_newer, ContactAdvance};
pub use db::{create_backend, BackendType, DatabaseBackend, DatabaseConfig, DatabaseStats};
pub use error::{TrackerError, TrackerResult};
pub use health::{
    classify, compute_dashboard_metrics, elapsed_days, rank_priority, sort_by_urgency,
    status_of, DashboardMetrics, ElapsedDays, HealthStatus,
};
pub use models::{
    Analyst, AnalystChanges, Interaction, InteractionType, NewAnalyst, NewInteraction,
    NewReportMention, ReportMention, Tier, TrackerStore, DEFAULT_SENTIMENT_SCORE, SENTIMENT_RANGE,
};
pub use storage::Storage;
pub use tracker::{
    AnalystCard, AnalystProfile, Dashboard, DeletePolicy, LoggedInteraction, ReadOutcome,
    RemovedAnalyst, Tracker,
};
