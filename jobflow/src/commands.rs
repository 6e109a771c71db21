use crate::CLAP_STYLING;
use clap::{arg, command};
use std::path::PathBuf;
use url::Url;

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("jobflow")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("jobflow")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Creates the jobflow config directory, default config and database")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Location of the jobflow config directory")
                        .default_value("~/.config/jobflow/"),
                )
                .arg(
                    arg!(-f --"force")
                        .help("Overwrite any existing config and database at the location")
                        .required(false),
                ),
        )
        .subcommand(
            command!("scrape")
                .about("Run one search, filter the listings and store the matches")
                .arg(
                    arg!(-u --"user" <USER_ID>)
                        .required(true)
                        .help("The user the listings are stored for"),
                )
                .arg(
                    arg!(-t --"title" <TITLES>)
                        .required(true)
                        .help("Comma-separated job titles, any may match"),
                )
                .arg(
                    arg!(-l --"location" <LOCATIONS>)
                        .required(true)
                        .help("Comma-separated locations, the first one is searched"),
                )
                .arg(arg!(--"company" <COMPANIES>).required(false).help("Comma-separated company names"))
                .arg(
                    arg!(--"job-type" <TYPES>)
                        .required(false)
                        .help("Comma-separated job types, e.g. full-time,contract,remote"),
                )
                .arg(arg!(--"salary" <TERMS>).required(false).help("Comma-separated salary terms"))
                .arg(
                    arg!(--"description" <KEYWORDS>)
                        .required(false)
                        .help("Comma-separated description keywords"),
                )
                .arg(arg!(--"benefits" <TERMS>).required(false).help("Comma-separated benefits"))
                .arg(
                    arg!(-r --"radius" <MILES>)
                        .required(false)
                        .help("Search radius around the location")
                        .value_parser(clap::value_parser!(u32)),
                )
                .arg(
                    arg!(-b --"budget" <COUNT>)
                        .required(false)
                        .help("Number of matching listings to collect")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("50"),
                )
                .arg(
                    arg!(-c --"config" <PATH>)
                        .required(false)
                        .help("Config file (default: ~/.config/jobflow/config.json)")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--"db" <PATH>)
                        .required(false)
                        .help("Database file (default: ~/.config/jobflow/jobflow.db)")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-p --"proxies-file" <PATH>)
                        .required(false)
                        .help("Newline-delimited proxy list, overrides the config")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--"base-url" <URL>)
                        .required(false)
                        .help("Job board root URL, overrides the config")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(
                    arg!(--"max-pages" <COUNT>)
                        .required(false)
                        .help("Hard ceiling on result pages")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Wall-clock limit for the whole run")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(--"json")
                        .required(false)
                        .help("Print progress messages as JSON lines on stdout")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            command!("jobs")
                .about("List stored jobs for a user")
                .arg(arg!(-u --"user" <USER_ID>).required(true).help("The user to list"))
                .arg(
                    arg!(--"db" <PATH>)
                        .required(false)
                        .help("Database file (default: ~/.config/jobflow/jobflow.db)")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--"json")
                        .required(false)
                        .help("Print jobs as JSON")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            command!("stats")
                .about("Show job and scrape counters for a user")
                .arg(arg!(-u --"user" <USER_ID>).required(true).help("The user to show"))
                .arg(
                    arg!(--"db" <PATH>)
                        .required(false)
                        .help("Database file (default: ~/.config/jobflow/jobflow.db)")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
}
