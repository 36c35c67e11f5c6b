//! Clap derive structures for the `tillbridge` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use tillbridge_core::{DiscoveryMethod, Platform, SimulatedCardType};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// tillbridge -- payment terminal routing, from the command line
#[derive(Debug, Parser)]
#[command(
    name = "tillbridge",
    version,
    about = "Inspect tillbridge settings and walk through simulated terminal sessions",
    long_about = "Companion CLI for the tillbridge terminal facade.\n\n\
        The simulator drives the real facade against in-process mock backends,\n\
        so discovery merging, backend authority, and payment flows can be\n\
        exercised without a reader or an SDK.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Settings file (defaults to the platform config directory)
    #[arg(long, env = "TILLBRIDGE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Host platform, overriding the settings file (ios, android, web)
    #[arg(long, global = true)]
    pub platform: Option<Platform>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "TILLBRIDGE_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Inspect or create the settings file
    #[command(alias = "cfg")]
    Config(ConfigArgs),

    /// Drive the facade against simulated backends
    #[command(alias = "sim")]
    Simulate(SimulateArgs),
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective settings (defaults, file, environment)
    Show,

    /// Print the settings file path
    Path,

    /// Write a settings file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Args)]
pub struct SimulateArgs {
    #[command(subcommand)]
    pub command: SimulateCommand,
}

#[derive(Debug, Subcommand)]
pub enum SimulateCommand {
    /// Discover simulated readers and print the merged list
    Discover(DiscoverArgs),

    /// Discover, connect, collect, and process a simulated payment
    Checkout(CheckoutArgs),
}

#[derive(Debug, Args)]
pub struct DiscoverArgs {
    /// Discovery method
    #[arg(long, short = 'm', default_value = "bluetooth-scan")]
    pub method: MethodArg,

    /// Readers each simulated backend reports
    #[arg(long, default_value_t = 2)]
    pub readers: usize,
}

#[derive(Debug, Args)]
pub struct CheckoutArgs {
    /// Amount in the currency's minor unit
    #[arg(long, default_value_t = 1099)]
    pub amount: i64,

    /// Three-letter ISO currency code
    #[arg(long, default_value = "usd")]
    pub currency: String,

    /// Test card the simulated reader presents
    #[arg(long, default_value = "visa")]
    pub card: CardArg,

    /// Use an internet reader instead of a Bluetooth one
    #[arg(long)]
    pub internet: bool,
}

// ── Value enums ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MethodArg {
    BluetoothScan,
    BluetoothProximity,
    Internet,
    Both,
    Usb,
}

impl From<MethodArg> for DiscoveryMethod {
    fn from(method: MethodArg) -> Self {
        match method {
            MethodArg::BluetoothScan => Self::BluetoothScan,
            MethodArg::BluetoothProximity => Self::BluetoothProximity,
            MethodArg::Internet => Self::Internet,
            MethodArg::Both => Self::Both,
            MethodArg::Usb => Self::Usb,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CardArg {
    Visa,
    Mastercard,
    Amex,
    Discover,
    /// Generic decline
    Declined,
    InsufficientFunds,
    LostCard,
    ExpiredCard,
}

impl From<CardArg> for SimulatedCardType {
    fn from(card: CardArg) -> Self {
        match card {
            CardArg::Visa => Self::Visa,
            CardArg::Mastercard => Self::Mastercard,
            CardArg::Amex => Self::Amex,
            CardArg::Discover => Self::Discover,
            CardArg::Declined => Self::ChargeDeclined,
            CardArg::InsufficientFunds => Self::ChargeDeclinedInsufficientFunds,
            CardArg::LostCard => Self::ChargeDeclinedLostCard,
            CardArg::ExpiredCard => Self::ChargeDeclinedExpiredCard,
        }
    }
}

impl CardArg {
    /// Decline code the simulated processor answers with, if this card is
    /// one that gets declined.
    pub fn decline_code(self) -> Option<&'static str> {
        match self {
            Self::Visa | Self::Mastercard | Self::Amex | Self::Discover => None,
            Self::Declined => Some("generic_decline"),
            Self::InsufficientFunds => Some("insufficient_funds"),
            Self::LostCard => Some("lost_card"),
            Self::ExpiredCard => Some("expired_card"),
        }
    }
}
