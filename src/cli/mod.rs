use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "folio")]
#[command(version, about = "Personal investment tracker")]
#[command(
    long_about = "Track your investments from brokerage CSV exports with automatic price updates, portfolio P&L, cash-flow and rebalancing views, and benchmark comparison."
)]
pub struct Cli {
    /// Disable colorized/ANSI output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Output results in JSON format
    #[arg(long = "json", global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import transactions from a brokerage CSV export
    Import {
        /// Path to the CSV file
        file: String,

        /// Preview only, don't save to database
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Instrument-to-ticker mapping management
    Mappings {
        #[command(subcommand)]
        action: MappingsCommands,
    },

    /// Price data management
    Prices {
        #[command(subcommand)]
        action: PriceCommands,
    },

    /// Show current portfolio with P&L
    Portfolio,

    /// Benchmark comparison: replay your cash flows into a reference instrument
    Benchmark {
        /// Reference ticker (defaults to the configured benchmark)
        ticker: Option<String>,

        /// Also print the synthetic trade ledger
        #[arg(short, long)]
        trades: bool,
    },

    /// Monthly cash-flow (budget) report
    Cashflow,

    /// Rebalancing suggestions against the configured targets
    Rebalance,
}

#[derive(Subcommand)]
pub enum MappingsCommands {
    /// Load a mapping CSV (isin,ticker,category), replacing all mappings
    Load {
        /// Path to the CSV file
        file: String,
    },

    /// List current mappings
    List,
}

#[derive(Subcommand)]
pub enum PriceCommands {
    /// Fetch missing price history for all mapped tickers
    Update,

    /// Show the most recent price for a ticker
    Quote {
        /// Ticker symbol (e.g. IWDA.AS)
        ticker: String,
    },

    /// Fetch and store historical prices for a specific ticker
    History {
        /// Ticker symbol (e.g. IWDA.AS)
        ticker: String,

        /// Start date (YYYY-MM-DD)
        #[arg(short, long)]
        from: String,

        /// End date (YYYY-MM-DD)
        #[arg(short, long)]
        to: String,
    },
}
