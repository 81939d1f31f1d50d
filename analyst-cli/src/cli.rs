use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Track relationships with industry analysts")]
pub struct Cli {
    /// Path to the database file (.yaml or .db)
    #[clap(long, global = true)]
    pub db: Option<PathBuf>,

    /// Storage backend (yaml, sqlite); inferred from the file extension by default
    #[clap(long, global = true)]
    pub backend: Option<String>,

    /// Enable debug logging
    #[clap(long, short = 'v', global = true)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a new analyst
    Add {
        /// Full name of the analyst
        #[clap(long)]
        name: Option<String>,

        /// Research firm
        #[clap(long)]
        firm: Option<String>,

        /// Tier (1, 2, 3); defaults to Tier 1
        #[clap(long)]
        tier: Option<String>,

        /// Date of last contact (YYYY-MM-DD)
        #[clap(long)]
        last_contact: Option<String>,

        /// Sentiment score (1-10); defaults to 5
        #[clap(long)]
        sentiment: Option<i32>,

        /// Use interactive mode (prompts)
        #[clap(long)]
        interactive: bool,
    },

    /// List analysts, most urgent first
    List {
        /// Only show analysts with this status (overdue, needs-update, healthy)
        #[clap(long)]
        status: Option<String>,

        /// Only show analysts in this tier
        #[clap(long)]
        tier: Option<String>,
    },

    /// Show an analyst's profile, interactions and report mentions
    Show {
        /// Analyst UUID or name
        id: String,
    },

    /// Edit an existing analyst
    Edit {
        /// Analyst UUID or name
        id: String,

        /// New name
        #[clap(long)]
        name: Option<String>,

        /// New firm
        #[clap(long)]
        firm: Option<String>,

        /// New tier
        #[clap(long)]
        tier: Option<String>,

        /// New sentiment score
        #[clap(long)]
        sentiment: Option<i32>,

        /// Set the last contact date (YYYY-MM-DD)
        #[clap(long, conflicts_with = "clear_last_contact")]
        last_contact: Option<String>,

        /// Clear the last contact date
        #[clap(long)]
        clear_last_contact: bool,
    },

    /// Delete an analyst
    Del {
        /// Analyst UUID or name
        id: String,

        /// Skip confirmation prompt
        #[clap(long, short = 'y')]
        yes: bool,

        /// Also delete the analyst's interactions and report mentions
        #[clap(long, conflicts_with = "orphan")]
        cascade: bool,

        /// Delete the analyst but keep its interactions and report mentions
        #[clap(long)]
        orphan: bool,
    },

    /// Log an interaction with an analyst
    Log {
        /// Analyst UUID or name
        id: String,

        /// Interaction date (YYYY-MM-DD); defaults to today
        #[clap(long)]
        date: Option<String>,

        /// Interaction type (call, email, meeting, conference); defaults to call
        #[clap(long, short = 't')]
        r#type: Option<String>,

        /// Notes about the interaction
        #[clap(long, short = 'n')]
        notes: Option<String>,
    },

    /// Record a report that mentions us
    Mention {
        /// Analyst UUID or name
        id: String,

        /// Report title
        #[clap(long)]
        title: Option<String>,

        /// Report date (YYYY-MM-DD); defaults to today
        #[clap(long)]
        date: Option<String>,

        /// Link to the report
        #[clap(long)]
        url: Option<String>,

        /// Summary of the mention
        #[clap(long)]
        summary: Option<String>,
    },

    /// Show relationship health summary
    Dashboard,

    /// Database management commands
    #[clap(subcommand)]
    Db(DbCommand),

    /// Configuration commands
    #[clap(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug)]
pub enum DbCommand {
    /// Print the path of the database in use
    Path,

    /// Show record counts, including orphaned history
    Stats,

    /// Copy all data into another database file
    Migrate {
        /// Destination file (.yaml or .db)
        #[clap(long)]
        to: PathBuf,
    },

    /// Export all data to JSON
    Export {
        /// Output file path
        #[clap(long, short = 'o', default_value = "analysts.json")]
        output: PathBuf,
    },

    /// Replace all data with the contents of a JSON export
    Import {
        /// Input file path
        #[clap(long, short = 'i')]
        input: PathBuf,

        /// Skip confirmation prompt
        #[clap(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the config file location and contents
    Show,

    /// Set the default database path
    SetDb {
        /// Path to the database file
        path: PathBuf,

        /// Storage backend (yaml, sqlite)
        #[clap(long)]
        backend: Option<String>,
    },
}
