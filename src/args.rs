use cart_sync::parsers::PageKind;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cart-sync")]
#[command(about = "Moves voice shopping list items into a retailer cart")]
#[command(version)]
pub struct Args {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Pick the best catalog product for a query
    Match {
        /// Shopping list entry to match
        query: String,

        /// JSON array of catalog candidates
        #[arg(long)]
        catalog: PathBuf,

        /// JSON array of purchase-history candidates
        #[arg(long)]
        history: Option<PathBuf>,

        /// Override the configured threshold
        #[arg(long)]
        min_score: Option<u8>,
    },

    /// List the closest catalog products for a query
    Top {
        query: String,

        #[arg(long)]
        catalog: PathBuf,

        /// Maximum number of results
        #[arg(short, long, default_value_t = 5)]
        limit: usize,

        #[arg(long)]
        min_score: Option<u8>,
    },

    /// Parse a saved page and print what it yields as JSON
    Parse {
        /// Saved HTML file
        html: PathBuf,

        /// Kind of page saved
        #[arg(short, long, value_enum, required_unless_present = "url", conflicts_with = "url")]
        kind: Option<PageKindArg>,

        /// URL the page was saved from; the page kind and number are taken from it
        #[arg(long)]
        url: Option<String>,

        /// Page number stamped on purchase-history candidates
        #[arg(long, default_value_t = 1, conflicts_with = "url")]
        page: u32,
    },

    /// Drive the browser: read the list and fill the cart
    Run {
        /// Run a single pass instead of repeating on the configured interval
        #[arg(long)]
        once: bool,

        /// Log cart additions instead of clicking
        #[arg(long)]
        dry_run: bool,

        /// Show the browser window
        #[arg(long)]
        headed: bool,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum PageKindArg {
    Search,
    History,
    List,
}

/// Convert from CLI argument page kind to internal page kind
pub fn convert_page_kind(arg: PageKindArg) -> PageKind {
    match arg {
        PageKindArg::Search => PageKind::SearchResults,
        PageKindArg::History => PageKind::PurchaseHistory,
        PageKindArg::List => PageKind::ShoppingList,
    }
}
