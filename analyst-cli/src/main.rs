mod cli;
mod prompts;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::Parser;
use colored::{ColoredString, Colorize};
use uuid::Uuid;

use analyst_core::config::{get_config_path, TrackerConfig};
use analyst_core::db::{self, BackendType};
use analyst_core::{
    determine_database, AnalystCard, AnalystChanges, DeletePolicy, HealthStatus, InteractionType,
    NewAnalyst, NewInteraction, NewReportMention, ReadOutcome, Tier, Tracker, TrackerError,
    SENTIMENT_RANGE,
};

use crate::cli::{Cli, Command, ConfigCommand, DbCommand};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    // Config commands don't need a database
    if let Command::Config(config_cmd) = &cli.command {
        return handle_config_command(config_cmd);
    }

    let backend_override = cli.backend.as_deref().map(parse_backend).transpose()?;
    let (db_config, source) = determine_database(cli.db.as_deref(), backend_override)?;
    let tracker = Tracker::new(db::open(&db_config)?);

    match &cli.command {
        Command::Add {
            name,
            firm,
            tier,
            last_contact,
            sentiment,
            interactive,
        } => {
            // Default to interactive mode if no fields are provided
            let should_be_interactive = *interactive
                || (name.is_none()
                    && firm.is_none()
                    && tier.is_none()
                    && last_contact.is_none()
                    && sentiment.is_none());

            let fields = if should_be_interactive {
                prompts::prompt_new_analyst()?
            } else {
                analyst_from_flags(name, firm, tier, last_contact, sentiment)?
            };
            add_analyst(&tracker, fields)?;
        }
        Command::List { status, tier } => {
            list_analysts(&tracker, status.as_deref(), tier.as_deref())?;
        }
        Command::Show { id } => {
            show_analyst(&tracker, id)?;
        }
        Command::Edit {
            id,
            name,
            firm,
            tier,
            sentiment,
            last_contact,
            clear_last_contact,
        } => {
            let last_contact_date = if *clear_last_contact {
                Some(None)
            } else {
                last_contact.as_deref().map(parse_date).transpose()?.map(Some)
            };
            let changes = AnalystChanges {
                name: name.clone(),
                firm: firm.clone(),
                tier: tier.as_deref().map(parse_tier),
                sentiment_score: *sentiment,
                last_contact_date,
            };
            edit_analyst(&tracker, id, changes)?;
        }
        Command::Del {
            id,
            yes,
            cascade,
            orphan,
        } => {
            let policy = if *cascade {
                DeletePolicy::Cascade
            } else if *orphan {
                DeletePolicy::Orphan
            } else {
                DeletePolicy::RejectIfChildren
            };
            delete_analyst(&tracker, id, *yes, policy)?;
        }
        Command::Log {
            id,
            date,
            r#type,
            notes,
        } => {
            log_interaction(&tracker, id, date.as_deref(), r#type.as_deref(), notes.clone())?;
        }
        Command::Mention {
            id,
            title,
            date,
            url,
            summary,
        } => {
            let analyst_id = resolve_analyst_id(&tracker, id)?;
            let title = match title {
                Some(t) => t.clone(),
                None => prompts::prompt_report_title()?,
            };
            let fields = NewReportMention {
                analyst_id,
                title,
                report_date: date_or_today(date.as_deref())?,
                url: url.clone(),
                summary: summary.clone(),
            };
            tracker.add_report_mention(fields)?;
            println!("{}", "Report mention saved.".green());
        }
        Command::Dashboard => {
            show_dashboard(&tracker)?;
        }
        Command::Db(db_cmd) => {
            handle_db_command(db_cmd, &tracker, &db_config.path, source)?;
        }
        Command::Config(_) => unreachable!("handled before opening the database"),
    }

    Ok(())
}

fn analyst_from_flags(
    name: &Option<String>,
    firm: &Option<String>,
    tier: &Option<String>,
    last_contact: &Option<String>,
    sentiment: &Option<i32>,
) -> Result<NewAnalyst> {
    let name = match name {
        Some(n) => n.clone(),
        None => anyhow::bail!("Name is required. Use --name to specify a name."),
    };
    let firm = match firm {
        Some(f) => f.clone(),
        None => anyhow::bail!("Firm is required. Use --firm to specify a firm."),
    };

    let mut fields = NewAnalyst::new(name, firm);
    if let Some(tier) = tier {
        fields = fields.with_tier(parse_tier(tier));
    }
    if let Some(date) = last_contact {
        fields = fields.with_last_contact(parse_date(date)?);
    }
    if let Some(score) = sentiment {
        fields = fields.with_sentiment(*score);
    }
    Ok(fields)
}

fn add_analyst(tracker: &Tracker, fields: NewAnalyst) -> Result<()> {
    warn_sentiment(fields.sentiment_score);
    let id = tracker.add_analyst(fields)?;

    println!("{}", "Analyst added successfully!".green());
    println!("UUID: {}", id);
    Ok(())
}

fn list_analysts(tracker: &Tracker, status: Option<&str>, tier: Option<&str>) -> Result<()> {
    let status_filter = status.map(parse_status).transpose()?;
    let tier_filter = tier.map(parse_tier);

    let mut cards = display_or_warn(tracker.ranked_analysts(Utc::now()));

    if let Some(status) = status_filter {
        cards.retain(|c| c.status == status);
    }
    if let Some(tier) = &tier_filter {
        cards.retain(|c| &c.analyst.tier == tier);
    }

    if cards.is_empty() {
        println!("{}", "No analysts recorded yet.".yellow());
        return Ok(());
    }

    print_card_table(&cards);
    Ok(())
}

fn print_card_table(cards: &[AnalystCard]) {
    println!(
        "{:<36} | {:<24} | {:<20} | {:<7} | {:<12} | {:<14} | {:<9}",
        "UUID", "Name", "Firm", "Tier", "Status", "Last Contact", "Sentiment"
    );
    println!("{}", "-".repeat(140));

    for card in cards {
        let last_contact = card
            .analyst
            .last_contact_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "Never".to_string());

        println!(
            "{:<36} | {:<24} | {:<20} | {:<7} | {:<12} | {:<14} | {}/10 ({})",
            card.analyst.id.to_string(),
            card.analyst.name,
            card.analyst.firm,
            card.analyst.tier.to_string(),
            status_badge(card.status),
            last_contact,
            card.analyst.sentiment_score,
            card.elapsed,
        );
    }
}

fn show_analyst(tracker: &Tracker, id_str: &str) -> Result<()> {
    let id = resolve_analyst_id(tracker, id_str)?;
    let profile = tracker.analyst_profile(&id, Utc::now())?;
    let analyst = &profile.card.analyst;

    println!("{}: {}", "ID".blue(), analyst.id);
    println!("{}: {}", "Name".blue(), analyst.name);
    println!("{}: {}", "Firm".blue(), analyst.firm);
    println!("{}: {}", "Tier".blue(), analyst.tier);
    println!("{}: {}/10", "Sentiment".blue(), analyst.sentiment_score);
    println!("{}: {}", "Status".blue(), status_badge(profile.card.status));
    match analyst.last_contact_date {
        Some(date) => println!("{}: {} ({})", "Last Contact".blue(), date, profile.card.elapsed),
        None => println!("{}: {}", "Last Contact".blue(), "Never".dimmed()),
    }

    println!(
        "\n{} ({}):",
        "Interactions".green(),
        profile.interactions.len()
    );
    if profile.interactions.is_empty() {
        println!("  {}", "No interactions logged yet.".dimmed());
    }
    for interaction in &profile.interactions {
        println!(
            "  {} {}",
            interaction.date.to_string().yellow(),
            interaction.interaction_type.to_string().cyan()
        );
        for line in interaction.notes.lines() {
            println!("    {}", line);
        }
    }

    println!(
        "\n{} ({}):",
        "Report Mentions".green(),
        profile.report_mentions.len()
    );
    if profile.report_mentions.is_empty() {
        println!("  {}", "No report mentions recorded yet.".dimmed());
    }
    for mention in &profile.report_mentions {
        println!(
            "  {} {}",
            mention.report_date.to_string().yellow(),
            mention.title
        );
        if let Some(url) = &mention.url {
            println!("    {}", url.underline());
        }
        if let Some(summary) = &mention.summary {
            println!("    {}", summary.dimmed());
        }
    }

    Ok(())
}

fn edit_analyst(tracker: &Tracker, id_str: &str, changes: AnalystChanges) -> Result<()> {
    if changes.is_empty() {
        println!("{}", "Nothing to change.".yellow());
        return Ok(());
    }
    if let Some(score) = changes.sentiment_score {
        warn_sentiment(score);
    }

    let id = resolve_analyst_id(tracker, id_str)?;
    tracker.edit_analyst(&id, &changes)?;
    println!("{}", "Analyst updated successfully!".green());
    Ok(())
}

fn delete_analyst(
    tracker: &Tracker,
    id_str: &str,
    skip_confirm: bool,
    policy: DeletePolicy,
) -> Result<()> {
    let id = resolve_analyst_id(tracker, id_str)?;
    let analyst = tracker.get_analyst(&id)?;

    println!("{}", "Analyst to delete:".yellow());
    println!("  ID: {}", analyst.id);
    println!("  Name: {}", analyst.name);
    println!("  Firm: {}", analyst.firm);

    // Confirm deletion unless --yes flag is used
    if !skip_confirm {
        let confirm = inquire::Confirm::new("Are you sure you want to delete this analyst?")
            .with_default(false)
            .prompt()?;

        if !confirm {
            println!("{}", "Deletion cancelled.".yellow());
            return Ok(());
        }
    }

    match tracker.remove_analyst(&id, policy) {
        Ok(removed) => {
            println!("{}", "Analyst deleted successfully!".green());
            if removed.interactions_removed > 0 || removed.reports_removed > 0 {
                println!(
                    "  Removed {} interaction(s) and {} report mention(s)",
                    removed.interactions_removed, removed.reports_removed
                );
            }
            Ok(())
        }
        Err(err @ TrackerError::HasChildren { .. }) => {
            println!("{} {}", "!".yellow(), err);
            println!("  Use --cascade to delete the history too, or --orphan to keep it.");
            Err(err.into())
        }
        Err(err) => Err(err.into()),
    }
}

fn log_interaction(
    tracker: &Tracker,
    id_str: &str,
    date: Option<&str>,
    interaction_type: Option<&str>,
    notes: Option<String>,
) -> Result<()> {
    let analyst_id = resolve_analyst_id(tracker, id_str)?;
    let interaction_type = match interaction_type {
        Some(t) => InteractionType::parse(t).with_context(|| {
            let expected: Vec<String> = InteractionType::all()
                .iter()
                .map(|kind| kind.to_string().to_lowercase())
                .collect();
            format!(
                "Invalid interaction type: {}. Expected one of: {}",
                t,
                expected.join(", ")
            )
        })?,
        None => InteractionType::default(),
    };
    let notes = match notes {
        Some(n) => n,
        None => prompts::prompt_notes()?,
    };

    let logged = tracker.log_interaction(NewInteraction {
        analyst_id,
        date: date_or_today(date)?,
        interaction_type,
        notes,
    })?;

    println!("{}", "Interaction logged.".green());
    match logged.contact.date() {
        Some(date) => println!("  Last contact set to {}", date),
        None => println!(
            "  {}",
            "Older than the current last contact; last contact unchanged.".dimmed()
        ),
    }
    Ok(())
}

fn show_dashboard(tracker: &Tracker) -> Result<()> {
    let dashboard = display_or_warn(tracker.dashboard(Utc::now()));
    let metrics = dashboard.metrics;

    let score = format!("{}%", metrics.health_score_percent);
    let score = match metrics.health_score_percent {
        80..=100 => score.green(),
        50..=79 => score.yellow(),
        _ => score.red(),
    };

    println!("{}: {}", "Total Analysts".blue(), metrics.total);
    println!("{}: {} (analysts not overdue)", "Relationship Health".blue(), score);
    println!(
        "{}: {} (Tier 1 overdue)",
        "Critical Actions".blue(),
        metrics.critical_actions.to_string().red()
    );

    let needing_attention: Vec<AnalystCard> = dashboard
        .analysts
        .into_iter()
        .filter(|c| c.status != HealthStatus::Healthy)
        .collect();
    if !needing_attention.is_empty() {
        println!();
        print_card_table(&needing_attention);
    }
    Ok(())
}

fn handle_db_command(
    cmd: &DbCommand,
    tracker: &Tracker,
    db_path: &std::path::Path,
    source: analyst_core::PathSource,
) -> Result<()> {
    match cmd {
        DbCommand::Path => {
            println!("{}", db_path.display());
            log::debug!("database path from {}", source);
        }
        DbCommand::Stats => {
            let stats = tracker.backend().stats()?;
            println!("{}: {}", "Backend".blue(), stats.backend_type);
            println!("{}: {}", "Analysts".blue(), stats.analyst_count);
            println!("{}: {}", "Interactions".blue(), stats.interaction_count);
            println!("{}: {}", "Report Mentions".blue(), stats.report_count);
            if stats.orphan_interaction_count > 0 || stats.orphan_report_count > 0 {
                println!(
                    "{} {} interaction(s) and {} report mention(s) reference deleted analysts",
                    "!".yellow(),
                    stats.orphan_interaction_count,
                    stats.orphan_report_count
                );
            }
        }
        DbCommand::Migrate { to } => {
            let target = db::create_backend(to, None)?;
            let count = db::migrate_between(tracker.backend(), target.as_ref())?;
            println!(
                "{} Migrated {} analyst(s) to {} ({})",
                "✓".green(),
                count,
                to.display(),
                target.backend_type()
            );
        }
        DbCommand::Export { output } => {
            db::export_backend_to_json(tracker.backend(), output)?;
            println!("{} Exported to {}", "✓".green(), output.display());
        }
        DbCommand::Import { input, yes } => {
            if !*yes {
                let confirm = inquire::Confirm::new("Replace all data in the current database?")
                    .with_default(false)
                    .prompt()?;
                if !confirm {
                    println!("{}", "Import cancelled.".yellow());
                    return Ok(());
                }
            }
            let count = db::import_json_to_backend(input, tracker.backend())?;
            println!("{} Imported {} analyst(s)", "✓".green(), count);
        }
    }

    Ok(())
}

fn handle_config_command(cmd: &ConfigCommand) -> Result<()> {
    let config_path = get_config_path()?;

    match cmd {
        ConfigCommand::Show => {
            println!("{}: {}", "Config file".blue(), config_path.display());
            let config = TrackerConfig::load_or_default(&config_path)?;
            match &config.database {
                Some(path) => println!("{}: {}", "Database".blue(), path.display()),
                None => println!("{}: {}", "Database".blue(), "(not set)".dimmed()),
            }
            if let Some(backend) = config.backend {
                println!("{}: {}", "Backend".blue(), backend);
            }
        }
        ConfigCommand::SetDb { path, backend } => {
            let mut config = TrackerConfig::load_or_default(&config_path)?;
            config.database = Some(path.clone());
            config.backend = backend.as_deref().map(parse_backend).transpose()?;
            config.save(&config_path)?;
            println!(
                "{} Default database set to {}",
                "✓".green(),
                path.display()
            );
        }
    }

    Ok(())
}

/// Unwraps a read for display, warning when it failed
fn display_or_warn<T: Default>(outcome: ReadOutcome<T>) -> T {
    if let Some(message) = outcome.failure() {
        eprintln!("{} {}", "!".yellow(), message);
    }
    outcome.into_display_value()
}

/// Accepts a UUID or an analyst name (case-insensitive)
fn resolve_analyst_id(tracker: &Tracker, id_str: &str) -> Result<Uuid> {
    if let Ok(id) = Uuid::parse_str(id_str) {
        return Ok(id);
    }

    let store = tracker
        .backend()
        .load()
        .map_err(|e| TrackerError::RemoteRead {
            operation: "load analysts",
            source: e,
        })?;
    let matches: Vec<(Uuid, String)> = store
        .find_analysts_by_name(id_str)
        .into_iter()
        .map(|a| (a.id, format!("{} ({}, {})", a.name, a.firm, a.id)))
        .collect();

    match matches.len() {
        0 => anyhow::bail!("No analyst found with ID or name '{}'", id_str),
        1 => Ok(matches[0].0),
        _ => prompts::prompt_select_analyst(matches),
    }
}

fn parse_date(date_str: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date: {}. Expected YYYY-MM-DD", date_str))
}

fn date_or_today(date_str: Option<&str>) -> Result<NaiveDate> {
    match date_str {
        Some(d) => parse_date(d),
        None => Ok(Utc::now().date_naive()),
    }
}

fn parse_tier(tier_str: &str) -> Tier {
    let tier = Tier::from_str(tier_str);
    if let Tier::Unrecognized(raw) = &tier {
        eprintln!(
            "{} Unrecognized tier '{}': it will never be flagged as overdue",
            "!".yellow(),
            raw
        );
    }
    tier
}

fn parse_status(status_str: &str) -> Result<HealthStatus> {
    match status_str.to_lowercase().replace('_', "-").as_str() {
        "overdue" => Ok(HealthStatus::Overdue),
        "needs-update" | "needsupdate" => Ok(HealthStatus::NeedsUpdate),
        "healthy" => Ok(HealthStatus::Healthy),
        _ => anyhow::bail!(
            "Invalid status: {}. Expected overdue, needs-update or healthy",
            status_str
        ),
    }
}

fn parse_backend(backend_str: &str) -> Result<BackendType> {
    BackendType::parse(backend_str)
        .with_context(|| format!("Unknown backend: {}. Expected yaml or sqlite", backend_str))
}

fn status_badge(status: HealthStatus) -> ColoredString {
    match status {
        HealthStatus::Overdue => "Overdue".red().bold(),
        HealthStatus::NeedsUpdate => "Needs Update".yellow(),
        HealthStatus::Healthy => "Healthy".green(),
    }
}

fn warn_sentiment(score: i32) {
    if !SENTIMENT_RANGE.contains(&score) {
        eprintln!(
            "{} Sentiment {} is outside the usual 1-10 range",
            "!".yellow(),
            score
        );
    }
}
