//! Command line surface.

use crate::engine::{CertificateFormat, SolverOptions};
use clap::Parser;
use miette::{Diagnostic, Result};
use std::{io::Read, path::PathBuf};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ArgError {
    #[error("Path {} does not exist", path.display())]
    FileDoesNotExist { path: PathBuf },

    #[error("{} is not a file", path.display())]
    NotAFile { path: PathBuf },

    #[error("Cannot read file {}: {}", path.display(), err)]
    CannotReadFile { path: PathBuf, err: std::io::Error },

    #[error("Cannot read from stdin: {}", err)]
    CannotReadStdIn { err: std::io::Error },
}

#[derive(Debug, Parser)]
#[command(name = "skolemium", about = "A certifying incremental-determinization solver for 2QBF")]
pub struct Cli {
    /// QDIMACS input file; reads from stdin when omitted
    pub file: Option<PathBuf>,

    /// Verbosity, 0 (errors only) to 4 (tracing)
    #[arg(short = 'v', default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=4))]
    pub verbosity: u8,

    /// Seed for the random number generator
    #[arg(short = 's', default_value_t = 0)]
    pub seed: u64,

    /// Write a certificate to this file (`.aig` binary, `.aag` ASCII, or
    /// `stdout`); also enables internal certification of UNSAT results
    #[arg(short = 'c')]
    pub certificate: Option<PathBuf>,

    /// Emit QBFcert-compatible certificates
    #[arg(long, conflicts_with_all = ["qaiger", "caqecert"])]
    pub qbfcert: bool,

    /// Emit QAIGER-compatible certificates
    #[arg(long, conflicts_with = "caqecert")]
    pub qaiger: bool,

    /// Emit CAQE-compatible certificates (default)
    #[arg(long)]
    pub caqecert: bool,

    /// Suppress colors for QDIMACS-compliant output
    #[arg(long = "qdimacs_out")]
    pub qdimacs_out: bool,

    /// Use more conservative defaults that are easier to debug
    #[arg(long = "debugging")]
    pub debugging: bool,

    /// Toggle CEGAR refinement (on by default)
    #[arg(long)]
    pub cegar: bool,

    /// Solve by CEGAR refinement only
    #[arg(long = "cegar_only")]
    pub cegar_only: bool,

    /// Toggle case splits (off by default)
    #[arg(long = "case_splits")]
    pub case_splits: bool,

    /// Compute a function even for false formulas; disables CEGAR
    #[arg(long = "functional-synthesis")]
    pub functional_synthesis: bool,

    /// Use the QBF engine even for propositional formulas
    #[arg(long = "sat_by_qbf")]
    pub sat_by_qbf: bool,

    /// Toggle miniscoping (accepted for compatibility, no effect without
    /// the matrix analyzer)
    #[arg(long)]
    pub miniscoping: bool,

    /// Toggle minimization of learnt clauses (on by default)
    #[arg(long)]
    pub minimize: bool,

    /// Toggle the pure-literal rule (on by default)
    #[arg(long = "pure_literals")]
    pub pure_literals: bool,

    /// Plaisted-Greenbaum completion (accepted for compatibility, no
    /// effect without the AIGER frontend)
    #[arg(long = "pg")]
    pub plaisted_greenbaum: bool,

    /// Consider blocked clauses when detecting pure literals
    #[arg(long = "enhanced_pure_literals")]
    pub enhanced_pure_literals: bool,

    /// Name prefix of controllable AIGER inputs
    #[arg(long = "aiger_controllable_inputs", default_value = "controllable_")]
    pub aiger_controllable_inputs: String,

    /// Give up after this many decisions, exiting with the Unknown code
    #[arg(short = 'l')]
    pub decision_limit: Option<u64>,
}

impl Cli {
    /// Folds the command line toggles over the solver defaults.
    #[must_use]
    pub fn solver_options(&self) -> SolverOptions {
        let defaults = SolverOptions::default();
        let mut options = SolverOptions {
            seed: self.seed,
            cegar: defaults.cegar ^ self.cegar,
            cegar_only: self.cegar_only,
            case_splits: defaults.case_splits ^ self.case_splits,
            sat_by_qbf: self.sat_by_qbf,
            certificate_format: if self.qbfcert {
                CertificateFormat::Qbfcert
            } else if self.qaiger {
                CertificateFormat::Qaiger
            } else {
                CertificateFormat::Caqecert
            },
            functional_synthesis: self.functional_synthesis,
            minimize_learnt_clauses: defaults.minimize_learnt_clauses ^ self.minimize,
            pure_literals: defaults.pure_literals ^ self.pure_literals,
            enhanced_pure_literals: self.enhanced_pure_literals,
            easy_debugging: self.debugging,
            hard_decision_limit: self.decision_limit,
            ..defaults
        };
        if options.functional_synthesis {
            options.cegar = false;
        }
        if self.miniscoping {
            tracing::warn!("--miniscoping has no effect without the matrix analyzer");
        }
        if self.plaisted_greenbaum {
            tracing::warn!("--pg has no effect without the AIGER frontend");
        }
        options
    }

    /// Reads the input file, or stdin when no file was provided.
    ///
    /// # Errors
    ///
    /// Fails when the path does not point to a readable file.
    pub fn read_input(&self) -> Result<Vec<u8>> {
        let Some(file_path) = &self.file else {
            tracing::info!("no input file provided, reading from stdin");
            let mut buffer = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buffer)
                .map_err(|err| ArgError::CannotReadStdIn { err })?;
            return Ok(buffer);
        };
        if !file_path.exists() {
            return Err(ArgError::FileDoesNotExist { path: file_path.clone() }.into());
        }
        if !file_path.is_file() {
            return Err(ArgError::NotAFile { path: file_path.clone() }.into());
        }
        let contents = std::fs::read(file_path)
            .map_err(|err| ArgError::CannotReadFile { path: file_path.clone(), err })?;
        Ok(contents)
    }

    /// Initializes the tracing subscriber according to `-v` and
    /// `--qdimacs_out`.
    pub fn init_logging(&self) {
        let level = match self.verbosity {
            0 => "error",
            1 => "warn",
            2 => "info",
            3 => "debug",
            _ => "trace",
        };
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(!self.qdimacs_out)
            .init();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn toggles_flip_defaults() {
        let cli = Cli::parse_from(["skolemium", "--cegar", "--case_splits", "--minimize"]);
        let options = cli.solver_options();
        assert!(!options.cegar);
        assert!(options.case_splits);
        assert!(!options.minimize_learnt_clauses);
    }

    #[test]
    fn functional_synthesis_disables_cegar() {
        let cli = Cli::parse_from(["skolemium", "--functional-synthesis"]);
        let options = cli.solver_options();
        assert!(options.functional_synthesis);
        assert!(!options.cegar);
    }

    #[test]
    fn decision_limit() {
        let cli = Cli::parse_from(["skolemium", "-l", "100", "input.qdimacs"]);
        assert_eq!(cli.decision_limit, Some(100));
        assert_eq!(cli.file.as_deref(), Some(std::path::Path::new("input.qdimacs")));
    }
}
