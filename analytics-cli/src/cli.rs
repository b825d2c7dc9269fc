use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

#[derive(Parser, Debug)]
#[command(
    name = "analytics",
    author,
    version,
    about = "Command-line client for the no-code analytics API",
    long_about = None
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend base URL (overrides the config file)
    #[arg(long, global = true, env = "ANALYTICS_BASE_URL")]
    pub base_url: Option<String>,

    /// Account email
    #[arg(long, global = true, env = "ANALYTICS_EMAIL")]
    pub email: Option<String>,

    /// Account password; prompted for when missing
    #[arg(long, global = true, env = "ANALYTICS_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Request timeout in seconds (0 disables it)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Proxy URL for all requests
    #[arg(long, global = true)]
    pub proxy: Option<String>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "json")]
    pub output: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress everything but errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in and print the account
    Login,

    /// Print the account the credentials belong to
    Whoami,

    /// Manage datasets
    #[command(subcommand)]
    Datasets(DatasetCommands),

    /// Manage saved recipes and list analysis templates
    #[command(subcommand)]
    Recipes(RecipeCommands),

    /// Submit an analysis run and wait for it to finish
    Run {
        /// Dataset id
        #[arg(short, long)]
        dataset: i64,

        /// Recipe key, e.g. `describe` or `pca`
        #[arg(short, long)]
        recipe: String,

        /// Recipe parameters as JSON, or @file
        #[arg(short, long, default_value = "{}")]
        params: String,

        /// Poll interval in milliseconds
        #[arg(long)]
        interval: Option<u64>,

        /// Give up after this many seconds
        #[arg(long)]
        max_wait: Option<u64>,
    },

    /// Correlation matrix of numeric columns
    Corr {
        #[arg(short, long)]
        dataset: i64,

        /// Columns to include (comma separated)
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,

        /// Row filters as JSON, or @file
        #[arg(long)]
        filters: Option<String>,
    },

    /// Principal component scores
    Pca {
        #[arg(short, long)]
        dataset: i64,

        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,

        #[arg(long)]
        filters: Option<String>,

        /// Number of components
        #[arg(short = 'n', long)]
        components: Option<u32>,
    },

    /// Render a chart panel
    Chart {
        #[arg(short, long)]
        dataset: i64,

        /// Panel spec as JSON, or @file
        #[arg(long)]
        panel: String,
    },

    /// Show or reset configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Reset configuration to defaults
        #[arg(long, conflicts_with = "show")]
        reset: bool,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum DatasetCommands {
    List,

    Upload {
        /// File to upload (.csv, .tsv, .txt, .gz, .xls, .xlsx)
        file: PathBuf,

        #[arg(short, long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,
    },

    Delete {
        id: i64,
    },

    Preview {
        id: i64,

        /// Rows to show (1-200)
        #[arg(short, long, default_value_t = 50)]
        rows: u32,
    },

    Schema {
        id: i64,

        /// Only columns whose name, type or role matches
        #[arg(long)]
        search: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum RecipeCommands {
    /// Analysis templates available for a dataset
    List {
        #[arg(short, long)]
        dataset: i64,
    },

    Save {
        #[arg(short, long)]
        dataset: i64,

        #[arg(short, long)]
        name: String,

        /// Panels as JSON, or @file
        #[arg(long, default_value = "[]")]
        panels: String,
    },

    Update {
        id: i64,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(long)]
        panels: Option<String>,
    },

    Delete {
        id: i64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Indented JSON
    Json,
    /// Single-line JSON
    JsonCompact,
}
