//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};

/// Passive skill tree optimizer: budget-aware hill climbing over tree allocations
#[derive(Parser, Debug)]
#[command(name = "treeclimb")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity: -v info, -vv debug, -vvv trace
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Project directory holding .treeclimb.toml (default: cwd)
    #[arg(short = 'C', long, global = true, value_hint = ValueHint::DirPath)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Improve a build by hill climbing
    Optimize(OptimizeArgs),

    /// Score a build once
    Evaluate {
        #[command(flatten)]
        input: InputArgs,
        /// Metric to report as the objective
        #[arg(short, long)]
        metric: Option<String>,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Tree and build documents
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Tree graph JSON
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub tree: PathBuf,
    /// Build JSON
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub build: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct OptimizeArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Metric to maximize (default: objective.metric)
    #[arg(short, long)]
    pub metric: Option<String>,

    /// Unspent points available (default: build's "points", else 0)
    #[arg(short, long)]
    pub points: Option<u32>,

    /// Respec currency available
    #[arg(long)]
    pub currency: Option<u32>,

    /// Also try respec moves
    #[arg(long)]
    pub respec: bool,

    /// Maximum accepted moves
    #[arg(long)]
    pub iterations: Option<usize>,

    /// Wall-clock limit in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Heuristic weight, repeatable: --weight crit=0.5
    #[arg(short, long = "weight", value_parser = parse_weight)]
    pub weights: Vec<(String, f64)>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged config
    Show,

    /// Create config template
    Init {
        /// Create global config
        #[arg(short, long)]
        global: bool,
    },

    /// Show config paths
    Path,
}

/// Parse `tag=weight`.
pub fn parse_weight(s: &str) -> Result<(String, f64), String> {
    let (tag, weight) = s
        .split_once('=')
        .ok_or_else(|| format!("expected tag=weight, got {s:?}"))?;
    let tag = tag.trim();
    if tag.is_empty() {
        return Err(format!("empty tag in {s:?}"));
    }
    let weight: f64 = weight
        .trim()
        .parse()
        .map_err(|_| format!("invalid weight in {s:?}"))?;
    if !weight.is_finite() {
        return Err(format!("weight must be finite: {s:?}"));
    }
    Ok((tag.to_string(), weight))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_tag_and_weight_when_parsing_then_splits() {
        assert_eq!(parse_weight("crit=0.5"), Ok(("crit".to_string(), 0.5)));
        assert_eq!(parse_weight(" life = 2 "), Ok(("life".to_string(), 2.0)));
    }

    #[test]
    fn given_malformed_weight_when_parsing_then_errors() {
        assert!(parse_weight("crit").is_err());
        assert!(parse_weight("=1").is_err());
        assert!(parse_weight("crit=x").is_err());
        assert!(parse_weight("crit=inf").is_err());
    }
}
