use clap::{Arg, arg, command};
use friendgraph_core::config::{DEFAULT_DATABASE_DIR, DEFAULT_LISTEN_ADDR};
use friendgraph_scanner::steam::DEFAULT_STEAM_API_URL;
use std::net::SocketAddr;

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

/// Options shared by every command that talks to Steam.
fn upstream_args() -> Vec<Arg> {
    vec![
        arg!(--"db" <PATH>)
            .required(false)
            .help("Directory holding the friendgraph database")
            .env("FRIENDGRAPH_DB")
            .default_value(DEFAULT_DATABASE_DIR),
        arg!(--"steam-api-key" <KEY>)
            .required(true)
            .help("Steam Web API key")
            .env("STEAM_API_KEY")
            .hide_env_values(true),
        arg!(--"steam-api-url" <URL>)
            .required(false)
            .help("Base URL of the Steam Web API")
            .env("STEAM_API_URL")
            .default_value(DEFAULT_STEAM_API_URL),
        arg!(-t --"workers" <NUM_WORKERS>)
            .required(false)
            .help("Profiles expanded concurrently within one crawl level")
            .env("FRIENDGRAPH_WORKERS")
            .value_parser(clap::value_parser!(usize))
            .default_value("8"),
        arg!(--"max-profiles" <COUNT>)
            .required(false)
            .help("Upper bound on profiles discovered by a single crawl")
            .env("FRIENDGRAPH_MAX_PROFILES")
            .value_parser(clap::value_parser!(usize))
            .default_value("5000"),
        arg!(--"max-in-flight" <COUNT>)
            .required(false)
            .help("Upstream requests allowed in flight across all crawls")
            .value_parser(clap::value_parser!(usize))
            .default_value("10"),
        arg!(--"request-spacing" <MILLISECONDS>)
            .required(false)
            .help("Minimum gap between upstream requests")
            .value_parser(clap::value_parser!(u64))
            .default_value("50"),
        arg!(--"retry-attempts" <COUNT>)
            .required(false)
            .help("Attempts per upstream request before giving up")
            .value_parser(clap::value_parser!(u32).range(1..))
            .default_value("3"),
        arg!(--"retry-backoff" <MILLISECONDS>)
            .required(false)
            .help("Delay before the first retry, doubled on each further attempt")
            .value_parser(clap::value_parser!(u64))
            .default_value("500"),
        arg!(--"timeout" <SECONDS>)
            .required(false)
            .help("Upstream request timeout in seconds")
            .value_parser(clap::value_parser!(u64))
            .default_value("10"),
    ]
}

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("friendgraph")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("friendgraph")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress non-essential output").required(false))
        .subcommand_required(true)
        .subcommand(
            command!("init")
                .about("Initializes the friendgraph database on your filesystem")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Location to store the friendgraph database")
                        .default_value(DEFAULT_DATABASE_DIR),
                )
                .arg(
                    arg!(-f --"force")
                        .help("Overwrites any existing database at the specified location.")
                        .required(false),
                ),
        )
        .subcommand(
            command!("serve")
                .about("Serves the friendgraph HTTP API")
                .arg(
                    arg!(--"addr" <ADDRESS>)
                        .required(false)
                        .help("Address to listen on")
                        .env("FRIENDGRAPH_ADDR")
                        .value_parser(clap::value_parser!(SocketAddr))
                        .default_value(DEFAULT_LISTEN_ADDR),
                )
                .args(upstream_args()),
        )
        .subcommand(
            command!("crawl")
                .about("Crawls the friend network of one profile in the foreground")
                .arg(
                    arg!(-s --"steamid" <STEAMID>)
                        .required(true)
                        .help("17 digit Steam id of the profile to start from"),
                )
                .arg(
                    arg!(-l --"level" <LEVEL>)
                        .required(false)
                        .help("1 = the profile only, 2 = its friends, 3 = friends of friends")
                        .value_parser(clap::value_parser!(i64).range(1..=3))
                        .default_value("2"),
                )
                .args(upstream_args()),
        )
}
