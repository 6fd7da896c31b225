//! A [`Table`] backed by the `iptables` command.
//!
//! Each operation runs the binary once and blocks until it exits. `-w` makes concurrent
//! invocations (e.g. from kube-proxy) wait for the xtables lock rather than fail.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

use netpol_controller_core::{RuleSpec, Table, TableError};
use std::{
    path::PathBuf,
    process::{Command, Output, Stdio},
};
use tracing::{debug, trace};

/// iptables exits with this status when a chain already exists, or when `-C` finds no match.
const EXIT_NOT_APPLIED: i32 = 1;

#[derive(Clone, Debug)]
pub struct Iptables {
    program: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} --version exited with {code:?}: {stderr}")]
    Version {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}

// === impl Iptables ===

impl Iptables {
    /// Verifies that `program` runs and returns an executor that uses it.
    pub fn new(program: impl Into<PathBuf>) -> Result<Self, InitError> {
        let program = program.into();
        let output = Command::new(&program)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .map_err(|source| InitError::Spawn {
                program: program.display().to_string(),
                source,
            })?;
        if !output.status.success() {
            return Err(InitError::Version {
                program: program.display().to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        debug!(
            program = %program.display(),
            version = %String::from_utf8_lossy(&output.stdout).trim(),
            "Initialized"
        );
        Ok(Self { program })
    }

    fn run(&self, args: Vec<String>) -> Result<Output, TableError> {
        trace!(program = %self.program.display(), args = %args.join(" "), "Running");
        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .output()?;
        Ok(output)
    }

    fn run_checked(&self, args: Vec<String>) -> Result<(), TableError> {
        let output = self.run(args.clone())?;
        if output.status.success() {
            return Ok(());
        }
        Err(command_error(args, &output))
    }
}

fn command_error(args: Vec<String>, output: &Output) -> TableError {
    TableError::Command {
        args,
        code: output.status.code(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}

fn base_args(table: &str, op: &str, chain: &str) -> Vec<String> {
    vec![
        "-w".to_string(),
        "-t".to_string(),
        table.to_string(),
        op.to_string(),
        chain.to_string(),
    ]
}

fn rule_args(table: &str, op: &str, chain: &str, rule: &RuleSpec) -> Vec<String> {
    let mut args = base_args(table, op, chain);
    args.extend(rule.args().iter().cloned());
    args
}

fn insert_args(table: &str, chain: &str, position: u32, rule: &RuleSpec) -> Vec<String> {
    let mut args = base_args(table, "-I", chain);
    args.push(position.to_string());
    args.extend(rule.args().iter().cloned());
    args
}

impl Table for Iptables {
    fn new_chain(&self, table: &str, chain: &str) -> Result<(), TableError> {
        let args = base_args(table, "-N", chain);
        let output = self.run(args.clone())?;
        match output.status.code() {
            Some(0) => Ok(()),
            Some(EXIT_NOT_APPLIED) => Err(TableError::AlreadyExists {
                table: table.to_string(),
                chain: chain.to_string(),
            }),
            _ => Err(command_error(args, &output)),
        }
    }

    fn exists(&self, table: &str, chain: &str, rule: &RuleSpec) -> Result<bool, TableError> {
        let args = rule_args(table, "-C", chain, rule);
        let output = self.run(args.clone())?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(EXIT_NOT_APPLIED) => Ok(false),
            _ => Err(command_error(args, &output)),
        }
    }

    fn insert(
        &self,
        table: &str,
        chain: &str,
        position: u32,
        rule: &RuleSpec,
    ) -> Result<(), TableError> {
        self.run_checked(insert_args(table, chain, position, rule))
    }

    fn append(&self, table: &str, chain: &str, rule: &RuleSpec) -> Result<(), TableError> {
        self.run_checked(rule_args(table, "-A", chain, rule))
    }
}
