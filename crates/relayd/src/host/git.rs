//! Best-effort version-control snapshots after mutating commands.

use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use thiserror::Error;

/// Errors from an auto-commit attempt. Callers log and discard them.
#[derive(Debug, Error)]
pub enum CommitError {
    /// The VCS binary could not be launched.
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    /// The VCS exited unsuccessfully, e.g. because there was nothing to commit.
    #[error("{step} exited with {status}")]
    Exit { step: &'static str, status: String },
}

/// Snapshots the working tree.
pub trait AutoCommit {
    /// Commits every pending change with `message`.
    fn commit(&self, message: &str) -> Result<(), CommitError>;
}

/// [`AutoCommit`] backed by the `git` command line.
#[derive(Debug, Clone)]
pub struct GitAutoCommit {
    workdir: PathBuf,
    program: String,
}

impl GitAutoCommit {
    /// Commits in `workdir` using `git` from `PATH`.
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            program: String::from("git"),
        }
    }

    /// Uses `program` instead of `git`.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn run(&self, step: &'static str, args: &[&str]) -> Result<(), CommitError> {
        let status = Command::new(&self.program)
            .args(args)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|source| CommitError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(CommitError::Exit {
                step,
                status: status.to_string(),
            })
        }
    }
}

impl AutoCommit for GitAutoCommit {
    fn commit(&self, message: &str) -> Result<(), CommitError> {
        self.run("git add", &["add", "-A"])?;
        self.run("git commit", &["commit", "-m", message])
    }
}
