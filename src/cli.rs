//! CLI command definitions using clap.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{ArgGroup, Parser, Subcommand, ValueEnum};

/// Default address of a running dispatch service.
pub const DEFAULT_URL: &str = "http://127.0.0.1:8081";

/// dispatch - reaction rules and weighted resource allocation
#[derive(Parser, Debug)]
#[command(name = "dispatch")]
#[command(version)]
#[command(about = "Reaction rules and weighted resource allocation over topic messages")]
#[command(
    long_about = "dispatch consumes resource registrations and custom events from topics, fires reaction rules, and keeps the heaviest requirement sets supplied with resources."
)]
pub struct Cli {
    /// Base URL of the service for client commands
    #[arg(long, global = true, env = "DISPATCH_URL", default_value = DEFAULT_URL)]
    pub url: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API and the dispatcher until SIGINT/SIGTERM
    Serve {
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Port override
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind address override
        #[arg(long)]
        bind: Option<IpAddr>,

        /// Inbound topic override, repeatable
        #[arg(long = "topic")]
        topics: Vec<String>,
    },

    /// POST a reaction rule document
    PostReaction {
        /// JSON file holding the rule
        file: PathBuf,
    },

    /// POST a requirement set document
    PostRequirements {
        /// JSON file holding the requirement set
        file: PathBuf,
    },

    /// Publish a message on a topic
    #[command(group(ArgGroup::new("body").required(true).args(["file", "custom"])))]
    Publish {
        #[arg(short, long)]
        topic: String,

        /// JSON file holding the message
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Send a CustomMessageContent with this content
        #[arg(long)]
        custom: Option<String>,
    },

    /// Wait for messages on a topic and print them
    Poll {
        #[arg(short, long)]
        topic: String,

        #[arg(long, default_value_t = 5_000)]
        timeout_ms: u64,
    },

    /// Run one of the bundled scenarios against a running service
    Demo {
        #[arg(value_enum)]
        scenario: Scenario,

        /// Inbound topic the service listens on
        #[arg(long, default_value = "resources-topic-1")]
        topic: String,

        /// How long to wait for each expected message
        #[arg(long, default_value_t = 10_000)]
        timeout_ms: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Two-step AGV configuration driven by label changes
    MultiStep,
    /// Three weighted cargo handling sets losing AGVs, then a critical event
    Priority,
    /// Fire alarm with and without a parking zone dispatcher
    Conditional,
}
