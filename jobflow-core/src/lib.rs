pub mod config;
pub mod filter;
pub mod preferences;
pub mod progress;
pub mod scrape;
pub mod store;

pub use config::ScrapeConfig;
pub use filter::{Criterion, Verdict, evaluate, matches};
pub use preferences::{PreferenceError, PreferenceSet, TermSet};
pub use progress::{ProgressPublisher, ScrapeProgress, ScrapeStatus};
pub use scrape::{RunReport, ScrapeError, Scraper, pages_needed};
pub use store::{Database, InsertOutcome, JobStore, MemoryStore, try_insert};

use colored::Colorize;

pub fn print_banner() {
    let banner = r#"
       _       _      __ _
      (_) ___ | |__  / _| | _____      __
      | |/ _ \| '_ \| |_| |/ _ \ \ /\ / /
      | | (_) | |_) |  _| | (_) \ V  V /
     _/ |\___/|_.__/|_| |_|\___/ \_/\_/
    |__/"#;
    println!("{}", banner.bright_cyan().bold());
    println!(
        "    {} {}\n",
        "preference-driven job scraping".bright_white(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
