use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use tickoff_shared::{Filter, TaskId};
use tracing::debug;
use tracing_subscriber::EnvFilter;

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

#[derive(Parser, Debug, Clone)]
#[command(
    name = "tickoff",
    version,
    about = "tickoff: a terminal client for a todo REST API",
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

    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    #[arg(long = "data")]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List tasks matching the current filter
    List {
        #[arg(long, short = 'f', value_parser = parse_filter)]
        filter: Option<Filter>,
    },
    /// Create a task
    Add {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Replace the text of a task
    Edit {
        #[arg(value_parser = parse_task_id)]
        id: TaskId,
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Mark a task completed
    Done {
        #[arg(value_parser = parse_task_id)]
        id: TaskId,
    },
    /// Mark a task active again
    Undo {
        #[arg(value_parser = parse_task_id)]
        id: TaskId,
    },
    /// Delete a task
    Rm {
        #[arg(value_parser = parse_task_id)]
        id: TaskId,
    },
    /// Complete every visible active task
    CompleteAll,
    /// Delete every visible completed task
    ClearCompleted,
    /// Show or set the stored filter
    Filter {
        #[arg(value_parser = parse_filter)]
        value: Option<Filter>,
    },
}

impl Default for Command {
    fn default() -> Self {
        Self::List { filter: None }
    }
}

fn parse_filter(raw: &str) -> Result<Filter, String> {
    raw.parse::<Filter>().map_err(|err| err.to_string())
}

fn parse_task_id(raw: &str) -> Result<TaskId, String> {
    TaskId::parse(raw).map_err(|err| err.to_string())
}

/// Joins free-form words back into task text.
pub fn join_text(words: &[String]) -> String {
    words.join(" ")
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
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "V1StGXR8_Z5jdHi6B-myT";

    #[test]
    fn no_subcommand_defaults_to_list() {
        let cli = GlobalCli::parse_from(["tickoff"]);
        assert_eq!(cli.command.unwrap_or_default(), Command::List { filter: None });
    }

    #[test]
    fn parses_filter_and_rc_overrides() {
        let cli = GlobalCli::parse_from([
            "tickoff",
            "--rc",
            "gate.min_busy_ms=0",
            "list",
            "--filter",
            "completed",
            "-vv",
        ]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.rc_overrides[0].key, "gate.min_busy_ms");
        assert_eq!(
            cli.command,
            Some(Command::List {
                filter: Some(Filter::Completed)
            })
        );
    }

    #[test]
    fn rejects_bad_ids_and_filters() {
        assert!(GlobalCli::try_parse_from(["tickoff", "done", "short"]).is_err());
        assert!(GlobalCli::try_parse_from(["tickoff", "list", "--filter", "open"]).is_err());
    }

    #[test]
    fn edit_collects_words() {
        let cli = GlobalCli::parse_from(["tickoff", "edit", ID, "buy", "oat", "milk"]);
        let Some(Command::Edit { id, text }) = cli.command else {
            panic!("expected edit");
        };
        assert_eq!(id.as_str(), ID);
        assert_eq!(join_text(&text), "buy oat milk");
    }
}
