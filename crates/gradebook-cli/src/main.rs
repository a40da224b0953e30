//! The gradebook command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::grade::GradeCommand;
use commands::{parse_key_value, GlobalOpts, OutputFormat};

#[derive(Parser)]
#[command(name = "gradebook", version, about = "Quiz authoring and grading for a digital classroom")]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Gradebook JSON file (overrides config)
    #[arg(long, global = true)]
    gradebook: Option<PathBuf>,

    /// Roster file or directory (overrides config)
    #[arg(long, global = true)]
    roster: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate quiz, rubric, and roster TOML files
    Validate {
        /// Definition file or directory
        path: PathBuf,
    },

    /// Assemble quizzes and rubrics into the gradebook
    Assemble {
        /// Quiz or rubric TOML files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Publish quizzes right after assembly
        #[arg(long)]
        publish: bool,
    },

    /// Compute a score without storing it
    Score {
        /// Rubric TOML file
        #[arg(long, conflicts_with = "marks")]
        rubric: Option<PathBuf>,

        /// Criterion score as CRITERION_ID=POINTS (repeatable)
        #[arg(long = "score", value_parser = parse_key_value, requires = "rubric")]
        scores: Vec<(String, f64)>,

        /// Manually entered marks
        #[arg(long, requires = "max")]
        marks: Option<f64>,

        /// Maximum marks for manual scoring
        #[arg(long)]
        max: Option<f64>,

        /// Fail if a rubric criterion has no score
        #[arg(long)]
        strict: bool,

        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Record grading actions for submissions
    Grade {
        #[command(subcommand)]
        action: GradeCommand,
    },

    /// Auto-evaluate a quiz attempt
    Evaluate {
        /// Stored quiz id
        quiz: String,

        /// JSON object mapping question ids to answers; repeat to compare attempts
        #[arg(long, required = true)]
        answers: Vec<PathBuf>,

        /// Check that this student may make the attempt
        #[arg(long)]
        student: Option<String>,

        /// Attempts the student has already used
        #[arg(long, default_value = "0", requires = "student")]
        attempts_used: u32,

        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Summarize grades by status
    Summary {
        /// Also list every grade
        #[arg(long)]
        list: bool,

        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Create a starter config and example definitions
    Init,
}

#[tokio::main]
async fn main() {
    let filter = match "gradebook=info".parse::<Directive>() {
        Ok(directive) => EnvFilter::from_default_env().add_directive(directive),
        Err(_) => EnvFilter::from_default_env(),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let opts = GlobalOpts {
        config: cli.config,
        gradebook: cli.gradebook,
        roster: cli.roster,
    };

    let result = match cli.command {
        Commands::Validate { path } => commands::validate::execute(path, &opts),
        Commands::Assemble { files, publish } => {
            commands::assemble::execute(files, publish, &opts).await
        }
        Commands::Score {
            rubric,
            scores,
            marks,
            max,
            strict,
            format,
        } => commands::score::execute(rubric, scores, marks, max, strict, format),
        Commands::Grade { action } => commands::grade::execute(action, &opts).await,
        Commands::Evaluate {
            quiz,
            answers,
            student,
            attempts_used,
            format,
        } => commands::evaluate::execute(quiz, answers, student, attempts_used, format, &opts).await,
        Commands::Summary { list, format } => {
            commands::summary::execute(list, format, &opts).await
        }
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
