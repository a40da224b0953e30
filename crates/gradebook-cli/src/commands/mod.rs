//! Subcommand implementations and the setup they share.

pub mod assemble;
pub mod evaluate;
pub mod grade;
pub mod init;
pub mod score;
pub mod summary;
pub mod validate;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::ValueEnum;

use gradebook_core::engine::{GradingEngine, GradingEngineConfig};
use gradebook_core::model::Student;
use gradebook_core::parser;
use gradebook_core::store::{JsonGradebook, LogNotifier, StaticRoster};
use gradebook_core::traits::{NoopNotifier, Notifier};

use crate::config::{load_config_from, GradebookConfig};

/// Output format for commands that print results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

/// Options accepted by every command that touches the gradebook.
#[derive(Debug, Clone, Default)]
pub struct GlobalOpts {
    pub config: Option<PathBuf>,
    pub gradebook: Option<PathBuf>,
    pub roster: Option<PathBuf>,
}

impl GlobalOpts {
    pub fn load_config(&self) -> Result<GradebookConfig> {
        let mut config = load_config_from(self.config.as_deref())?;
        if let Some(path) = &self.gradebook {
            config.gradebook_path = path.clone();
        }
        if let Some(path) = &self.roster {
            config.roster_path = Some(path.clone());
        }
        Ok(config)
    }
}

/// An opened gradebook with its engine.
pub struct Session {
    pub config: GradebookConfig,
    pub store: Arc<JsonGradebook>,
    pub students: Vec<Student>,
    pub engine: GradingEngine,
}

impl Session {
    pub fn open(opts: &GlobalOpts) -> Result<Self> {
        let config = opts.load_config()?;
        let store = Arc::new(JsonGradebook::open(&config.gradebook_path)?);
        let students = match &config.roster_path {
            Some(path) => load_roster(path)?,
            None => Vec::new(),
        };

        let notifier: Arc<dyn Notifier> = if config.notify {
            Arc::new(LogNotifier)
        } else {
            Arc::new(NoopNotifier)
        };
        let engine = GradingEngine::new(
            store.clone(),
            Arc::new(StaticRoster::new(students.clone())),
            notifier,
            GradingEngineConfig {
                strict_criteria: config.strict_criteria,
                notify: config.notify,
                parallelism: config.parallelism,
            },
        );

        Ok(Self {
            config,
            store,
            students,
            engine,
        })
    }
}

/// Load a roster file, or every roster file under a directory.
pub fn load_roster(path: &Path) -> Result<Vec<Student>> {
    if path.is_dir() {
        parser::load_roster_directory(path)
    } else {
        parser::parse_roster(path)
    }
}

/// Parse `key=value` pairs such as `--score logic=8`.
pub fn parse_key_value(s: &str) -> Result<(String, f64), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in '{s}'"));
    }
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("invalid number in '{s}'"))?;
    Ok((key.to_string(), value))
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn fmt_marks(marks: f64) -> String {
    if marks.fract() == 0.0 {
        format!("{marks:.0}")
    } else {
        format!("{marks:.2}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_value_pairs() {
        assert_eq!(parse_key_value("logic=8"), Ok(("logic".into(), 8.0)));
        assert_eq!(parse_key_value(" style = 2.5 "), Ok(("style".into(), 2.5)));
        assert!(parse_key_value("logic").is_err());
        assert!(parse_key_value("=3").is_err());
        assert!(parse_key_value("logic=lots").is_err());
    }

    #[test]
    fn marks_formatting() {
        assert_eq!(fmt_marks(19.0), "19");
        assert_eq!(fmt_marks(7.5), "7.50");
    }
}
