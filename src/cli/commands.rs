//! Command dispatch

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use clap::CommandFactory;
use clap_complete::generate;
use itertools::Itertools;
use tracing::{debug, instrument};

use crate::application::services::RunOverrides;
use crate::application::{
    ApplicationError, CancellationToken, ChannelProgress, Objective, RunReport, TracingProgress,
};
use crate::cli::args::{Cli, Commands, ConfigCommands, InputArgs, OptimizeArgs};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::{global_config_path, local_config_path, Settings};
use crate::domain::MoveKind;
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::traits::{FileSystem, RealFileSystem};
use crate::infrastructure::InfraError;

const PROGRESS_CAPACITY: usize = 64;

pub fn execute(cli: &Cli) -> CliResult<()> {
    let project_dir = cli
        .project_dir
        .clone()
        .or_else(|| std::env::current_dir().ok());

    match &cli.command {
        Some(Commands::Optimize(args)) => optimize(&container(project_dir.as_deref())?, args),
        Some(Commands::Evaluate { input, metric }) => {
            evaluate(&container(project_dir.as_deref())?, input, metric.clone())
        }
        Some(Commands::Config { command }) => config(command, project_dir.as_deref()),
        Some(Commands::Completion { shell }) => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
        None => Err(CliError::Usage("no command given, see --help".into())),
    }
}

fn container(project_dir: Option<&Path>) -> CliResult<ServiceContainer> {
    let settings = Settings::load(project_dir)?;
    debug!("settings: {:?}", settings);
    Ok(ServiceContainer::new(settings))
}

#[instrument(skip(container))]
fn optimize(container: &ServiceContainer, args: &OptimizeArgs) -> CliResult<()> {
    let overrides = RunOverrides {
        metric: args.metric.clone(),
        points: args.points,
        currency: args.currency,
        respec: args.respec,
        iterations: args.iterations,
        timeout_secs: args.timeout,
        weights: args.weights.iter().cloned().collect(),
    };

    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());

    // Machine-readable runs report progress through the log only
    let result = if args.json {
        container.optimize.optimize(
            &args.input.tree,
            &args.input.build,
            &overrides,
            Arc::new(TracingProgress),
            cancel,
        )
    } else {
        let (sink, events) = ChannelProgress::bounded(PROGRESS_CAPACITY);
        // Ends once the optimizer drops the sink
        let consumer = thread::spawn(move || {
            for event in events.iter() {
                output::progress(&format!(
                    "[{:>4}] {:>12.3}  {:>6.1}s  {}",
                    event.iteration, event.best_objective, event.elapsed_seconds, event.message
                ));
            }
        });
        let result = container.optimize.optimize(
            &args.input.tree,
            &args.input.build,
            &overrides,
            Arc::new(sink),
            cancel,
        );
        if consumer.join().is_err() {
            output::warning("progress display stopped unexpectedly");
        }
        result
    };
    let report = result?;

    if args.json {
        let json = serde_json::to_string_pretty(&report).map_err(|e| {
            ApplicationError::OperationFailed {
                context: "serialize report".into(),
                source: Box::new(e),
            }
        })?;
        output::info(&json);
    } else {
        print_report(&report);
    }
    Ok(())
}

/// Cancel `token` on Ctrl-C; the run then stops at its next cycle boundary.
fn cancel_on_interrupt(token: CancellationToken) {
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                debug!("no interrupt handler: {e}");
                return;
            }
        };
        runtime.block_on(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                debug!("interrupt received, cancelling run");
                token.cancel();
            }
        });
    });
}

fn print_report(report: &RunReport) {
    output::header(&format!("Optimization {}", report.status));
    output::action(
        "objective",
        &format!(
            "{:.3} -> {:.3} ({:+.3})",
            report.starting_objective,
            report.final_objective,
            report.final_objective - report.starting_objective
        ),
    );

    for mv in &report.accepted {
        match &mv.kind {
            MoveKind::Add { nodes } => {
                output::diff_add(&format!("{} ({:+.3})", nodes.iter().join(", "), mv.improvement))
            }
            MoveKind::Respec { remove, add } => {
                output::diff_remove(remove);
                output::diff_add(&format!("{} ({:+.3})", add, mv.improvement));
            }
        }
    }

    output::detail(&format!(
        "moves: {}, cycles: {}, elapsed: {:.2}s",
        report.iterations, report.cycles, report.elapsed_seconds
    ));
    output::detail(&format!(
        "points used: {}, currency used: {}",
        report.points_used, report.currency_used
    ));
    output::action(
        "allocation",
        &report.final_allocation.iter().join(", "),
    );
}

#[instrument(skip(container))]
fn evaluate(container: &ServiceContainer, input: &InputArgs, metric: Option<String>) -> CliResult<()> {
    let overrides = RunOverrides {
        metric,
        ..RunOverrides::default()
    };
    let evaluation = container
        .optimize
        .evaluate(&input.tree, &input.build, &overrides)?;

    match &evaluation.objective {
        Objective::Score(v) => output::action("objective", &format!("{:.3}", v)),
        Objective::Disqualified(reason) => output::warning(&format!("not scoreable: {reason}")),
    }
    if let Some(primary) = evaluation.result.objective {
        output::detail(&format!("objective (engine): {:.3}", primary));
    }
    for (name, value) in &evaluation.result.metrics {
        output::detail(&format!("{name}: {value:.3}"));
    }
    Ok(())
}

fn config(command: &ConfigCommands, project_dir: Option<&Path>) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            let settings = Settings::load(project_dir)?;
            output::info(&settings.to_toml()?);
            Ok(())
        }
        ConfigCommands::Init { global } => {
            let path = if *global {
                global_config_path().ok_or_else(|| {
                    CliError::Usage("cannot determine global config directory".into())
                })?
            } else {
                let dir = project_dir
                    .ok_or_else(|| CliError::Usage("cannot determine project directory".into()))?;
                local_config_path(dir)
            };
            write_template(&RealFileSystem, &path)
        }
        ConfigCommands::Path => {
            let global = global_config_path();
            print_path("global", global.as_deref());
            print_path("local", project_dir.map(local_config_path).as_deref());
            Ok(())
        }
    }
}

fn write_template(fs: &dyn FileSystem, path: &Path) -> CliResult<()> {
    if fs.exists(path) {
        return Err(CliError::Usage(format!(
            "config already exists: {}",
            path.display()
        )));
    }
    let io_err = |e| InfraError::io(format!("write {}", path.display()), e);
    fs.ensure_parent(path).map_err(io_err)?;
    fs.write(path, &Settings::template()).map_err(io_err)?;
    output::success(&format!("created {}", path.display()));
    Ok(())
}

fn print_path(label: &str, path: Option<&Path>) {
    match path {
        Some(p) if p.exists() => output::action(label, &p.display()),
        Some(p) => output::action(label, &format!("{} (not found)", p.display())),
        None => output::action(label, &"(unavailable)"),
    }
}
