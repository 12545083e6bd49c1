//! Shared CLI definitions for olist-insights.
//!
//! Used by the main application and by the build script (manpage) and
//! gen_docs binary (command-line-options markdown).

use clap::{CommandFactory, Parser, ValueEnum};

/// Dashboard page to compute
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum PageArg {
    /// Top product categories by revenue, with average price and share of total
    TopCategories,
    /// Orders and revenue per calendar period
    OrdersOverTime,
    /// On-time vs late deliveries per period
    DeliveryPerformance,
    /// Weekday-by-hour activity grid
    ActivityHeatmap,
    /// Per-seller orders, revenue and freight ratio
    SellerLandscape,
    /// Top seller in each state, with state centroids
    StateLeaderboard,
    /// Active sellers vs revenue per period, with correlation and trend
    SellerCorrelation,
    /// Category revenue growth vs the previous equal-length window
    CategoryMomentum,
}

/// Calendar bucket size for time-based pages
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum GranularityArg {
    /// ISO weeks starting Monday
    Week,
    /// Calendar months
    Month,
    /// Calendar quarters
    Quarter,
    /// Calendar years
    Year,
}

/// Measure shown in the activity heatmap cells
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum HeatmapMetricArg {
    /// Number of orders
    OrderCount,
    /// Sum of order value
    Revenue,
    /// Mean order value
    AverageOrderValue,
}

/// Measure used to pick and rank the top seller per state
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum RankMetricArg {
    Revenue,
    Orders,
    AvgOrderValue,
    NumberOfSellers,
}

/// Command-line arguments for olist-insights
#[derive(Clone, Parser, Debug)]
#[command(
    name = "olist-insights",
    version,
    about = "Aggregated reports over the Olist e-commerce dataset"
)]
pub struct Args {
    /// Page to compute (not required with --generate-config or --list-pages)
    #[arg(value_enum, required_unless_present_any = ["generate_config", "list_pages"], value_name = "PAGE")]
    pub page: Option<PageArg>,

    /// Calendar granularity for time-based pages
    #[arg(long = "granularity", short = 'g', value_enum)]
    pub granularity: Option<GranularityArg>,

    /// First day of the date range (YYYY-MM-DD, inclusive)
    #[arg(long = "start", value_name = "DATE")]
    pub start: Option<String>,

    /// Last day of the date range (YYYY-MM-DD, inclusive)
    #[arg(long = "end", value_name = "DATE")]
    pub end: Option<String>,

    /// Keep only the first N rows of the ranked table
    #[arg(long = "top-n", value_name = "N")]
    pub top_n: Option<usize>,

    /// Restrict to sellers in this state. Repeat for several states
    #[arg(long = "state", value_name = "STATE")]
    pub states: Vec<String>,

    /// Minimum number of orders a seller or category needs to be shown
    #[arg(long = "min-orders", value_name = "N")]
    pub min_orders: Option<usize>,

    /// Only include orders with this status. Use "all" to disable the filter
    #[arg(long = "status", value_name = "STATUS")]
    pub status: Option<String>,

    /// Heatmap cell measure
    #[arg(long = "metric", value_enum)]
    pub metric: Option<HeatmapMetricArg>,

    /// Measure used to rank top sellers per state
    #[arg(long = "rank-by", value_enum)]
    pub rank_by: Option<RankMetricArg>,

    /// Show at most this many states on the leaderboard
    #[arg(long = "max-states", value_name = "N")]
    pub max_states: Option<usize>,

    /// Drop periods with fewer active sellers than this
    #[arg(long = "min-active-sellers", value_name = "N")]
    pub min_active_sellers: Option<usize>,

    /// Add a rolling mean of revenue over this many periods
    #[arg(long = "rolling", value_name = "N")]
    pub rolling: Option<usize>,

    /// Emit every calendar period in range, filling empty ones with zeros
    #[arg(long = "dense", action)]
    pub dense: bool,

    /// Primary directory holding the CSV sources (overrides config)
    #[arg(long = "data-dir", value_name = "DIR")]
    pub data_dir: Option<std::path::PathBuf>,

    /// Directory searched when a source is not found in the primary directory
    #[arg(long = "fallback-dir", value_name = "DIR")]
    pub fallback_dir: Option<std::path::PathBuf>,

    /// Write the page's main table to this CSV file
    #[arg(long = "export", value_name = "PATH")]
    pub export: Option<std::path::PathBuf>,

    /// Print the report as JSON instead of text
    #[arg(long = "json", action)]
    pub json: bool,

    /// Log level (error, warn, info, debug, trace). RUST_LOG takes precedence
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// List the available pages and exit
    #[arg(long = "list-pages", action)]
    pub list_pages: bool,

    /// Generate default configuration file at ~/.config/olist-insights/config.toml
    #[arg(long = "generate-config", action)]
    pub generate_config: bool,

    /// Force overwrite existing config file when using --generate-config
    #[arg(long = "force", requires = "generate_config", action)]
    pub force: bool,
}

/// Escape `|` and newlines for use in markdown table cells.
fn escape_table_cell(s: &str) -> String {
    s.replace('|', "\\|").replace(['\n', '\r'], " ")
}

/// Render command-line options as markdown.
pub fn render_options_markdown() -> String {
    let mut cmd = Args::command();
    cmd.build();

    let mut out = String::from("# Command Line Options\n\n");

    out.push_str("## Usage\n\n```\n");
    let usage = cmd.render_usage();
    out.push_str(&usage.to_string());
    out.push_str("\n```\n\n");

    out.push_str("## Options\n\n");
    out.push_str("| Option | Description |\n");
    out.push_str("|--------|-------------|\n");

    for arg in cmd.get_arguments() {
        let id = arg.get_id().as_ref().to_string();
        if id == "help" || id == "version" {
            continue;
        }

        let placeholder: String = if arg.is_positional() || arg.get_action().takes_values() {
            arg.get_value_names()
                .map(|names| {
                    names
                        .iter()
                        .map(|n: &clap::builder::Str| format!("<{}>", n.as_ref() as &str))
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .unwrap_or_default()
        } else {
            String::new()
        };

        let option_str = if arg.is_positional() {
            if arg.is_required_set() {
                placeholder
            } else {
                format!("[{placeholder}]")
            }
        } else {
            let mut parts = Vec::new();
            if let Some(s) = arg.get_short() {
                parts.push(format!("-{s}"));
            }
            if let Some(l) = arg.get_long() {
                parts.push(format!("--{l}"));
            }
            let op = parts.join(", ");
            if placeholder.is_empty() {
                op
            } else {
                format!("{op} {placeholder}")
            }
        };

        let help = arg
            .get_help()
            .map(|h| escape_table_cell(&h.to_string()))
            .unwrap_or_else(|| "-".to_string());

        out.push_str(&format!("| `{option_str}` | {help} |\n"));
    }

    out
}
