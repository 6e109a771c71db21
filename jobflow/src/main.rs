use clap::ArgMatches;
use commands::command_argument_builder;
use jobflow::handlers::{
    self, ConfigOverrides, ScrapeInvocation, ScrapeRequest, handle_init, handle_jobs, handle_stats,
};
use jobflow_core::print_banner;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use url::Url;

mod commands;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    init_tracing(quiet);

    let json_output = matches!(
        chosen_command.subcommand(),
        Some(("scrape" | "jobs", args)) if args.get_flag("json")
    );

    // Show banner unless --quiet flag is set or stdout carries JSON
    if !quiet && !json_output {
        print_banner();
    }

    if chosen_command.subcommand().is_none() {
        // No subcommand provided, just show the banner
        return;
    }

    let outcome = match chosen_command.subcommand() {
        Some(("init", primary_command)) => run_init(primary_command),
        Some(("scrape", primary_command)) => run_scrape(primary_command, quiet).await,
        Some(("jobs", primary_command)) => handle_jobs(
            required_string(primary_command, "user"),
            primary_command.get_one::<PathBuf>("db").map(PathBuf::as_path),
            primary_command.get_flag("json"),
        ),
        Some(("stats", primary_command)) => handle_stats(
            required_string(primary_command, "user"),
            primary_command.get_one::<PathBuf>("db").map(PathBuf::as_path),
        ),
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = outcome {
        eprintln!("✗ {:#}", e);
        std::process::exit(1);
    }
}

// Logs go to stderr so --json output on stdout stays machine readable.
fn init_tracing(quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn required_string<'a>(args: &'a ArgMatches, id: &str) -> &'a str {
    args.get_one::<String>(id)
        .map(String::as_str)
        .unwrap_or_default()
}

fn optional_string(args: &ArgMatches, id: &str) -> Option<String> {
    args.get_one::<String>(id).cloned()
}

fn run_init(args: &ArgMatches) -> anyhow::Result<()> {
    let path = args
        .get_one::<String>("PATH")
        .map(String::as_str)
        .unwrap_or(handlers::DEFAULT_CONFIG_DIR);
    handle_init(path, args.get_flag("force"))
}

async fn run_scrape(args: &ArgMatches, quiet: bool) -> anyhow::Result<()> {
    let request = ScrapeRequest {
        user: required_string(args, "user").to_string(),
        title: required_string(args, "title").to_string(),
        location: required_string(args, "location").to_string(),
        company: optional_string(args, "company"),
        job_type: optional_string(args, "job-type"),
        salary: optional_string(args, "salary"),
        description: optional_string(args, "description"),
        benefits: optional_string(args, "benefits"),
        radius: args.get_one::<u32>("radius").copied(),
        budget: args.get_one::<usize>("budget").copied().unwrap_or(50),
    };

    let overrides = ConfigOverrides {
        base_url: args.get_one::<Url>("base-url").cloned(),
        proxies_file: args.get_one::<PathBuf>("proxies-file").cloned(),
        max_pages: args.get_one::<usize>("max-pages").copied(),
        run_timeout_secs: args.get_one::<u64>("timeout").copied(),
    };

    handlers::handle_scrape(ScrapeInvocation {
        request,
        overrides,
        config_path: args.get_one::<PathBuf>("config").cloned(),
        db_path: args.get_one::<PathBuf>("db").cloned(),
        json: args.get_flag("json"),
        quiet,
    })
    .await?;
    Ok(())
}

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
