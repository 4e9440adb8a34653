use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::schedule::ScheduleKey;
use crate::selection::{SelectionGroup, SelectionItem};

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

/// One `--select` flag. Flags are replayed in order through the selection
/// reducer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectArg {
    Item(SelectionItem),
    All(SelectionGroup),
    Clear,
}

impl std::str::FromStr for SelectArg {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("clear") {
            return Ok(Self::Clear);
        }

        let (group, value) = trimmed.split_once(':').ok_or_else(|| {
            anyhow!("expected GROUP:VALUE (category:5, pet:9, schedule:12@2024-01-03, all:pets) or clear, got: {s}")
        })?;
        let value = value.trim();

        match group.trim().to_ascii_lowercase().as_str() {
            "category" => Ok(Self::Item(SelectionItem::Category(parse_id(value)?))),
            "pet" => Ok(Self::Item(SelectionItem::Pet(parse_id(value)?))),
            "schedule" => Ok(Self::Item(SelectionItem::Schedule(
                value.parse::<ScheduleKey>()?,
            ))),
            "all" => match value.to_ascii_lowercase().as_str() {
                "category" | "categories" => Ok(Self::All(SelectionGroup::Category)),
                "pet" | "pets" => Ok(Self::All(SelectionGroup::Pet)),
                "schedule" | "schedules" => Ok(Self::All(SelectionGroup::Schedule)),
                other => Err(anyhow!("unknown selection group: {other}")),
            },
            other => Err(anyhow!("unknown selection group: {other}")),
        }
    }
}

fn parse_id(raw: &str) -> anyhow::Result<u64> {
    raw.parse::<u64>()
        .map_err(|e| anyhow!("invalid id {raw}: {e}"))
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "pawcal",
    version,
    about = "PawCal: pet-care schedule calendar",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "pawcalrc")]
    pub pawcalrc: Option<PathBuf>,

    /// JSON-lines file of schedule records.
    #[arg(long = "schedules")]
    pub schedules: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Month grid around --date.
    Month(ViewArgs),
    /// Seven-day grid starting at --date (see calendar.week.anchor).
    Week(ViewArgs),
    /// Agenda for the single day --date.
    Day(ViewArgs),
    /// Every generated occurrence, one per line.
    Expand {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct ViewArgs {
    /// Reference date, YYYY-MM-DD. Defaults to today (UTC+9).
    #[arg(long)]
    pub date: Option<String>,

    /// Pages to move from --date: months for `month`, weeks for `week`, days
    /// for `day`.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub page: i32,

    /// Ordering within a day; overrides calendar.sort.
    #[arg(long)]
    pub sort: Option<String>,

    #[arg(
        long = "select",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<SelectArg>()),
        action = ArgAction::Append
    )]
    pub select: Vec<SelectArg>,

    #[arg(long)]
    pub json: bool,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}
