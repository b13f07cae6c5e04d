//! I/O boundary traits for testability
//!
//! These traits abstract external I/O operations, allowing services
//! to be tested with mock implementations.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::process::Output;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Filesystem abstraction for testability.
pub trait FileSystem: Send + Sync {
    /// Read file contents to string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Write string content to file.
    fn write(&self, path: &Path, content: &str) -> io::Result<()>;

    /// Check if path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Create parent directories if needed.
    fn ensure_parent(&self, path: &Path) -> io::Result<()>;
}

/// External command runner abstraction.
pub trait CommandRunner: Send + Sync {
    /// Run a command with arguments, feeding `stdin` and capturing output.
    fn run_with_stdin(&self, cmd: &str, args: &[&str], stdin: &str) -> io::Result<Output>;
}

/// Build configuration handed to a scoring engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfiguration {
    pub class: String,
    /// Allocated node ids, ascending
    pub nodes: Vec<u32>,
}

/// Raw output of one scoring call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Engine-designated primary objective, if it reports one
    #[serde(default)]
    pub objective: Option<f64>,
    /// Computed metric fields (damage, life, ...)
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
}

impl EvaluationResult {
    pub fn from_metrics(metrics: BTreeMap<String, f64>) -> Self {
        Self {
            objective: None,
            metrics,
        }
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }
}

/// Failure reported by a scoring engine for a single call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("engine failed: {0}")]
    Failed(String),

    #[error("engine returned malformed output: {0}")]
    MalformedOutput(String),

    #[error("engine unavailable: {0}")]
    Unavailable(String),
}

/// External stat engine: a possibly slow, possibly fallible pure function
/// from build configuration to metrics.
///
/// Instances are expensive and not shareable, hence `&mut self`. No `Sync`
/// bound: the pool hands each instance to one worker at a time.
pub trait ScoringEngine: Send {
    fn score(&mut self, config: &BuildConfiguration) -> Result<EvaluationResult, EngineError>;
}

/// Adapts a closure into a [`ScoringEngine`].
pub struct FnEngine<F>(pub F);

impl<F> ScoringEngine for FnEngine<F>
where
    F: FnMut(&BuildConfiguration) -> Result<EvaluationResult, EngineError> + Send,
{
    fn score(&mut self, config: &BuildConfiguration) -> Result<EvaluationResult, EngineError> {
        (self.0)(config)
    }
}

// ============================================================
// REAL IMPLEMENTATIONS
// ============================================================

/// Real filesystem implementation.
#[derive(Debug, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write(&self, path: &Path, content: &str) -> io::Result<()> {
        std::fs::write(path, content)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn ensure_parent(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

/// Real command runner implementation.
#[derive(Debug, Default)]
pub struct RealCommandRunner;

impl CommandRunner for RealCommandRunner {
    fn run_with_stdin(&self, cmd: &str, args: &[&str], stdin: &str) -> io::Result<Output> {
        use std::io::Write;
        use std::process::Stdio;

        let mut child = std::process::Command::new(cmd)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // a scorer may exit without reading its input; always reap it
        let written = match child.stdin.take() {
            Some(mut child_stdin) => child_stdin.write_all(stdin.as_bytes()),
            None => Ok(()),
        };
        let output = child.wait_with_output()?;
        match written {
            Err(e) if e.kind() != io::ErrorKind::BrokenPipe => Err(e),
            _ => Ok(output),
        }
    }
}
