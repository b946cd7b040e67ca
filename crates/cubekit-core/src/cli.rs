use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::commands::{expand_command_abbrev, known_command_names};

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

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
    name = "cube",
    version,
    about = "cubekit: edit a hosted cube list from the terminal",
    disable_help_subcommand = true,
    arg_required_else_help = false
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "cuberc")]
    pub cuberc: Option<PathBuf>,

    #[arg(long = "data")]
    pub data: Option<PathBuf>,

    /// Cube to edit; defaults to `cube.id` from the rc file.
    #[arg(long = "cube")]
    pub cube: Option<String>,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub rest: Vec<OsString>,
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
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = rest
                .split_once('=')
                .or_else(|| rest.split_once(':'))
                .map(|(k, v)| (format!("rc.{k}"), v.to_string()));

            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: String,
    pub args: Vec<String>,
}

impl Invocation {
    /// First token names the command (abbreviations allowed); the rest are its
    /// arguments. No tokens means `show`.
    #[tracing::instrument(skip(rest))]
    pub fn parse(rest: Vec<OsString>) -> anyhow::Result<Self> {
        let mut tokens = rest
            .into_iter()
            .map(|arg| arg.to_string_lossy().to_string());

        let Some(first) = tokens.next() else {
            debug!("no explicit command, using show");
            return Ok(Self {
                command: "show".to_string(),
                args: vec![],
            });
        };

        let known = known_command_names();
        let Some(command) = expand_command_abbrev(&first, &known) else {
            let candidates: Vec<&str> = known
                .iter()
                .copied()
                .filter(|name| name.starts_with(first.as_str()))
                .collect();
            if candidates.len() > 1 {
                warn!(token = %first, ?candidates, "ambiguous command abbreviation");
                return Err(anyhow!(
                    "ambiguous command '{first}': could be {}",
                    candidates.join(", ")
                ));
            }
            return Err(anyhow!("unknown command: {first}"));
        };

        debug!(token = %first, expanded = %command, "resolved command token");
        Ok(Self {
            command: command.to_string(),
            args: tokens.collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn positional_rc_overrides_are_pulled_out() {
        let pre = preprocess_args(&os(&["cube", "rc.cube.id=abc", "show", "rc.color:off"]))
            .expect("preprocess");
        assert_eq!(pre.cleaned_args, os(&["cube", "show"]));
        assert_eq!(
            pre.rc_overrides,
            vec![
                ("rc.cube.id".to_string(), "abc".to_string()),
                ("rc.color".to_string(), "off".to_string()),
            ]
        );
    }

    #[test]
    fn global_flags_parse_before_command() {
        let cli = GlobalCli::parse_from(os(&[
            "cube", "-vv", "--cube", "abc", "--rc", "color=off", "add", "Lightning", "Bolt",
        ]));
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.cube.as_deref(), Some("abc"));
        assert_eq!(cli.rc_overrides[0].key, "color");
        assert_eq!(cli.rest, os(&["add", "Lightning", "Bolt"]));
    }

    #[test]
    fn command_abbreviations_expand() {
        let inv = Invocation::parse(os(&["rev", "mainboard", "0"])).expect("parse");
        assert_eq!(inv.command, "revert");
        assert_eq!(inv.args, vec!["mainboard", "0"]);

        let inv = Invocation::parse(vec![]).expect("parse");
        assert_eq!(inv.command, "show");
    }

    #[test]
    fn ambiguous_and_unknown_commands_fail() {
        let err = Invocation::parse(os(&["s"])).expect_err("ambiguous");
        assert!(err.to_string().contains("ambiguous"));
        assert!(Invocation::parse(os(&["frobnicate"])).is_err());
    }
}
