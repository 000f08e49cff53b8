//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::analysis::ResultsMode;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// LOEScope - scoping and level-of-effort reports for transit compliance reviews
///
/// Answer the scoping questionnaire for a project, then browse the
/// applicable sub-areas, LOE totals, and the scoping workbook produced
/// by the assessment service.
///
/// Examples:
///   loescope projects create "Metro Transit FY26" --grantee "Metro Transit"
///   loescope assess 12 --answer recipient_type=urbanized --answer funding=5307
///   loescope results 12 --view all
///   loescope loe 12 --verify --format json
///   loescope export 12 --dir ./workbooks
///   loescope --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Assessment service base URL
    ///
    /// Can also be set via LOESCOPE_API_URL env var or .loescope.toml config.
    #[arg(long, value_name = "URL", env = "LOESCOPE_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Request timeout in seconds
    ///
    /// By default requests wait for the service indefinitely.
    #[arg(long, value_name = "SECS", global = true)]
    pub timeout: Option<u64>,

    /// Output format (markdown, json)
    #[arg(long, value_name = "FORMAT", global = true)]
    pub format: Option<OutputFormat>,

    /// Write the report to a file instead of stdout
    #[arg(short, long, value_name = "FILE", global = true)]
    pub output: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .loescope.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Generate a default .loescope.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Check that the assessment service is reachable
    Health,

    /// List the questionnaire questions and their options
    Questions {
        /// Show only the question with this key
        key: Option<String>,
    },

    /// List regulatory sections
    Sections {
        /// Show only the section with this id
        #[arg(conflicts_with = "summary")]
        id: Option<String>,

        /// Include catalog-wide sub-area counts and LOE statistics
        #[arg(long)]
        summary: bool,
    },

    /// Browse sub-area definitions in the catalog
    SubAreas {
        #[command(subcommand)]
        action: SubAreaCommand,
    },

    /// Manage projects
    Projects {
        #[command(subcommand)]
        action: ProjectCommand,
    },

    /// Answer the questionnaire for a project and submit it
    Assess {
        /// Project id
        project_id: i64,

        #[command(flatten)]
        answers: AnswerArgs,

        /// Validate the answers without submitting them
        #[arg(long)]
        dry_run: bool,
    },

    /// Evaluate answers without saving them to a project
    Preview {
        #[command(flatten)]
        answers: AnswerArgs,
    },

    /// Show the applicable sub-areas of a project
    Results {
        /// Project id
        project_id: i64,

        /// Layout: grouped by section, or one flat list
        #[arg(long, value_name = "VIEW", default_value = "section")]
        view: ViewArg,

        /// Expand a section (repeatable)
        #[arg(long, value_name = "SECTION")]
        expand: Vec<String>,

        /// Expand every section
        #[arg(long)]
        expand_all: bool,

        /// Show indicators for a sub-area (repeatable)
        #[arg(long, value_name = "SUB_AREA")]
        detail: Vec<String>,
    },

    /// Show the LOE summary of a project
    Loe {
        /// Project id
        project_id: i64,

        /// Cross-check the service summary against a local rollup
        ///
        /// Exit code 3 when they disagree.
        #[arg(long)]
        verify: bool,
    },

    /// Download the scoping workbook of a project
    Export {
        /// Project id
        project_id: i64,

        /// Directory to save the workbook into
        #[arg(long, value_name = "DIR", default_value = ".")]
        dir: PathBuf,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ProjectCommand {
    /// List all projects
    List,

    /// Create a project
    Create {
        /// Project name
        name: String,

        #[arg(long)]
        description: Option<String>,

        #[arg(long, value_name = "NAME")]
        grantee: Option<String>,

        #[arg(long, value_name = "NUMBER")]
        grant_number: Option<String>,

        #[arg(long, value_name = "TYPE")]
        review_type: Option<String>,
    },

    /// Show one project
    Show {
        /// Project id
        id: i64,
    },

    /// Update project fields
    Update {
        /// Project id
        id: i64,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long, value_name = "NAME")]
        grantee: Option<String>,

        #[arg(long, value_name = "NUMBER")]
        grant_number: Option<String>,

        #[arg(long, value_name = "TYPE")]
        review_type: Option<String>,
    },

    /// Delete a project and its answers
    Delete {
        /// Project id
        id: i64,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubAreaCommand {
    /// List sub-areas
    List {
        /// Only sub-areas of this section
        #[arg(long, value_name = "SECTION_ID")]
        section: Option<String>,
    },

    /// Show the review guidance, indicators and deficiencies of a sub-area
    Show {
        /// Sub-area id
        id: String,
    },
}

/// Answer input shared by `assess` and `preview`.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct AnswerArgs {
    /// Answer as question_key=value (repeatable)
    ///
    /// Repeating a checkbox question selects several options.
    #[arg(short, long = "answer", value_name = "KEY=VALUE", value_parser = parse_answer)]
    pub answers: Vec<(String, String)>,

    /// JSON file mapping question keys to a value or a list of values
    #[arg(long, value_name = "FILE")]
    pub answers_file: Option<PathBuf>,

    /// Require an answer to every question, not only the flagged ones
    #[arg(long)]
    pub require_all: bool,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Results layout for `--view`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ViewArg {
    Section,
    All,
}

impl From<ViewArg> for ResultsMode {
    fn from(view: ViewArg) -> Self {
        match view {
            ViewArg::Section => ResultsMode::Section,
            ViewArg::All => ResultsMode::All,
        }
    }
}

/// Parse a `key=value` answer.
pub fn parse_answer(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid answer {:?}: expected KEY=VALUE", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("invalid answer {:?}: empty question key", s));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        let Some(ref command) = self.command else {
            return Err("No command given. Run with --help for usage.".to_string());
        };

        // Validate service URL format
        if let Some(ref url) = self.api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        match command {
            Command::Assess { answers, .. } | Command::Preview { answers } => {
                if let Some(ref file) = answers.answers_file {
                    if !file.is_file() {
                        return Err(format!("Answers file does not exist: {}", file.display()));
                    }
                }
            }
            Command::Export { dir, .. } => {
                if !dir.is_dir() {
                    return Err(format!("Not a directory: {}", dir.display()));
                }
            }
            Command::Projects {
                action: ProjectCommand::Create { name, .. },
            } => {
                if name.trim().is_empty() {
                    return Err("Project name must not be empty".to_string());
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            command: Some(Command::Health),
            api_url: None,
            timeout: None,
            format: None,
            output: None,
            config: None,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_answer() {
        assert_eq!(
            parse_answer("funding=5307").unwrap(),
            ("funding".to_string(), "5307".to_string())
        );
        assert_eq!(
            parse_answer(" notes = a=b ").unwrap(),
            ("notes".to_string(), "a=b".to_string())
        );
        assert!(parse_answer("funding").is_err());
        assert!(parse_answer("=5307").is_err());
    }

    #[test]
    fn test_parse_command_line() {
        let args = Args::try_parse_from([
            "loescope",
            "assess",
            "12",
            "--answer",
            "funding=5307",
            "-a",
            "funding=5311",
            "--format",
            "json",
        ])
        .unwrap();

        match args.command {
            Some(Command::Assess {
                project_id,
                answers,
                dry_run,
            }) => {
                assert_eq!(project_id, 12);
                assert_eq!(answers.answers.len(), 2);
                assert!(!dry_run);
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(args.format, Some(OutputFormat::Json));
    }

    #[test]
    fn test_catalog_detail_commands() {
        let args = Args::try_parse_from(["loescope", "sub-areas", "show", "P4"]).unwrap();
        match args.command {
            Some(Command::SubAreas {
                action: SubAreaCommand::Show { id },
            }) => assert_eq!(id, "P4"),
            other => panic!("unexpected command: {:?}", other),
        }

        let args = Args::try_parse_from(["loescope", "sections", "PROC"]).unwrap();
        match args.command {
            Some(Command::Sections { id, summary }) => {
                assert_eq!(id.as_deref(), Some("PROC"));
                assert!(!summary);
            }
            other => panic!("unexpected command: {:?}", other),
        }

        assert!(Args::try_parse_from(["loescope", "sections", "PROC", "--summary"]).is_err());

        let args = Args::try_parse_from(["loescope", "questions"]).unwrap();
        assert!(matches!(args.command, Some(Command::Questions { key: None })));
    }

    #[test]
    fn test_results_view_defaults_to_section() {
        let args = Args::try_parse_from(["loescope", "results", "3"]).unwrap();
        match args.command {
            Some(Command::Results { view, .. }) => {
                assert_eq!(ResultsMode::from(view), ResultsMode::Section)
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_validation_missing_command() {
        let mut args = make_args();
        args.command = None;
        assert!(args.validate().is_err());

        args.init_config = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_invalid_url() {
        let mut args = make_args();
        args.api_url = Some("localhost:8000".to_string());
        assert!(args.validate().is_err());

        args.api_url = Some("http://localhost:8000".to_string());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_missing_answers_file() {
        let mut args = make_args();
        args.command = Some(Command::Preview {
            answers: AnswerArgs {
                answers_file: Some(PathBuf::from("/nonexistent/answers.json")),
                ..Default::default()
            },
        });
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
