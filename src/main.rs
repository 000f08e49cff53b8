//! LOEScope - scoping client for transit compliance reviews
//!
//! A CLI tool that drives the remote assessment service: it collects the
//! scoping questionnaire for a project, then groups, totals and renders the
//! applicable review sub-areas and their level-of-effort estimates.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (connection, config, service failure, etc.)
//!   2 - Required questions left unanswered
//!   3 - Service LOE summary disagrees with the local rollup (--verify)

mod analysis;
mod cli;
mod client;
mod config;
mod models;
mod questionnaire;
mod report;
mod session;

use analysis::{section_bars, ResultsMode, ViewEvent};
use anyhow::{bail, Context, Result};
use chrono::Utc;
use cli::{AnswerArgs, Args, Command, OutputFormat, ProjectCommand, SubAreaCommand, ViewArg};
use client::{ServiceClient, ServiceError};
use config::{Config, CONFIG_FILE};
use indicatif::{ProgressBar, ProgressStyle};
use models::{Project, ProjectCreate, ProjectUpdate, Question};
use questionnaire::{
    build_collector, parse_answers_file, Collector, CollectorError, Phase, RequiredPolicy,
};
use report::{LoeReport, ResultsReport, Verification};
use serde::Serialize;
use session::ProjectSession;
use std::future::Future;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Exit code when required questions are unanswered.
const EXIT_INCOMPLETE: i32 = 2;

/// Exit code when `--verify` finds a disagreement.
const EXIT_INCONSISTENT: i32 = 3;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration before logging so it can raise verbosity
    let (mut config, config_path) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(&args, &config)?;

    info!("LOEScope v{}", env!("CARGO_PKG_VERSION"));
    match config_path {
        Some(path) => info!("Loaded config from: {}", path.display()),
        None => debug!("No config file found, using defaults"),
    }
    debug!("Arguments: {:?}", args);

    match run(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("\n❌ Error: {}", describe_error(&e));
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .loescope.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to set the service URL, report format, and answer encoding.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// `LOESCOPE_LOG` takes a full filter directive and overrides the flags.
fn init_logging(args: &Args, config: &Config) -> Result<()> {
    let level = if !args.quiet && config.general.verbose {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let filter = EnvFilter::try_from_env("LOESCOPE_LOG")
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Load configuration from file or use defaults.
///
/// Returns the config and the file it came from, if any.
fn load_config(args: &Args) -> Result<(Config, Option<PathBuf>)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Ok((Config::load(config_path)?, Some(config_path.clone())));
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok((config, Some(PathBuf::from(CONFIG_FILE)))),
        Ok(None) => Ok((Config::default(), None)),
        Err(e) => {
            eprintln!("⚠️  Ignoring {}: {:#}", CONFIG_FILE, e);
            Ok((Config::default(), None))
        }
    }
}

/// User-facing description of a failure.
fn describe_error(e: &anyhow::Error) -> String {
    match e.downcast_ref::<ServiceError>() {
        Some(service_error) => service_error.user_message(),
        None => format!("{:#}", e),
    }
}

/// Dispatch the selected command. Returns the exit code.
async fn run(args: Args, config: Config) -> Result<i32> {
    let Some(command) = args.command else {
        bail!("No command given");
    };

    let client = ServiceClient::new(&config.service).context("Failed to create HTTP client")?;
    let progress = !args.quiet;

    match command {
        Command::Health => {
            let status = wait(progress, "Contacting service...", client.health()).await?;
            let base_url = client.base_url().to_string();
            render(&config, &status, |s| {
                format!("✅ Assessment service at {} is {}\n", base_url, s.status)
            })?;
            Ok(0)
        }
        Command::Questions { key: Some(key) } => {
            let question = wait(progress, "Loading question...", client.get_question(&key)).await?;
            render(&config, &question, |q| {
                report::generate_questions_markdown(std::slice::from_ref(q))
            })?;
            Ok(0)
        }
        Command::Questions { key: None } => {
            let questions = wait(progress, "Loading questions...", client.list_questions()).await?;
            render(
                &config,
                questions.as_slice(),
                report::generate_questions_markdown,
            )?;
            Ok(0)
        }
        Command::Sections { id: Some(id), .. } => {
            let section = wait(progress, "Loading section...", client.get_section(&id)).await?;
            render(&config, &section, report::generate_section_markdown)?;
            Ok(0)
        }
        Command::Sections { id: None, summary } => {
            if summary {
                let summaries =
                    wait(progress, "Loading sections...", client.section_summaries()).await?;
                render(
                    &config,
                    summaries.as_slice(),
                    report::generate_section_summaries_markdown,
                )?;
            } else {
                let sections = wait(progress, "Loading sections...", client.list_sections()).await?;
                render(
                    &config,
                    sections.as_slice(),
                    report::generate_sections_markdown,
                )?;
            }
            Ok(0)
        }
        Command::SubAreas {
            action: SubAreaCommand::List { section },
        } => {
            let sub_areas = wait(
                progress,
                "Loading sub-areas...",
                client.list_sub_areas(section.as_deref()),
            )
            .await?;
            render(
                &config,
                sub_areas.as_slice(),
                report::generate_sub_areas_markdown,
            )?;
            Ok(0)
        }
        Command::SubAreas {
            action: SubAreaCommand::Show { id },
        } => {
            let detail = wait(progress, "Loading sub-area...", client.sub_area_detail(&id)).await?;
            render(&config, &detail, report::generate_sub_area_detail_markdown)?;
            Ok(0)
        }
        Command::Projects { action } => handle_projects(&client, &config, progress, action).await,
        Command::Assess {
            project_id,
            answers,
            dry_run,
        } => handle_assess(&client, &config, progress, project_id, &answers, dry_run).await,
        Command::Preview { answers } => handle_preview(&client, &config, progress, &answers).await,
        Command::Results {
            project_id,
            view,
            expand,
            expand_all,
            detail,
        } => {
            let options = ResultsOptions {
                view,
                expand,
                expand_all,
                detail,
            };
            handle_results(&client, &config, progress, project_id, options).await
        }
        Command::Loe { project_id, verify } => {
            handle_loe(&client, &config, progress, project_id, verify).await
        }
        Command::Export { project_id, dir } => {
            handle_export(&client, progress, project_id, &dir).await
        }
    }
}

/// Project CRUD.
async fn handle_projects(
    client: &ServiceClient,
    config: &Config,
    progress: bool,
    action: ProjectCommand,
) -> Result<i32> {
    match action {
        ProjectCommand::List => {
            let projects = wait(progress, "Loading projects...", client.list_projects()).await?;
            render(
                config,
                projects.as_slice(),
                report::generate_projects_markdown,
            )?;
        }
        ProjectCommand::Create {
            name,
            description,
            grantee,
            grant_number,
            review_type,
        } => {
            let create = ProjectCreate {
                name,
                description,
                grantee_name: grantee,
                grant_number,
                review_type,
            };
            let project =
                wait(progress, "Creating project...", client.create_project(&create)).await?;
            info!("Created project {} ({})", project.id, project.name);
            render(config, &project, report::generate_project_markdown)?;
        }
        ProjectCommand::Show { id } => {
            let project = wait(progress, "Loading project...", client.get_project(id)).await?;
            render(config, &project, report::generate_project_markdown)?;
        }
        ProjectCommand::Update {
            id,
            name,
            description,
            grantee,
            grant_number,
            review_type,
        } => {
            let update = ProjectUpdate {
                name,
                description,
                grantee_name: grantee,
                grant_number,
                review_type,
            };
            if update.is_empty() {
                bail!("Nothing to update. Pass at least one field, e.g. --name.");
            }
            let project =
                wait(progress, "Updating project...", client.update_project(id, &update)).await?;
            info!("Updated project {}", project.id);
            render(config, &project, report::generate_project_markdown)?;
        }
        ProjectCommand::Delete { id, yes } => {
            if !yes {
                let project = wait(progress, "Loading project...", client.get_project(id)).await?;
                let prompt = format!(
                    "Delete project \"{}\" ({})? Its answers and results are removed too.",
                    project.name, project.id
                );
                if !confirm(&prompt)? {
                    println!("Cancelled.");
                    return Ok(0);
                }
            }
            wait(progress, "Deleting project...", client.delete_project(id)).await?;
            println!("🗑️  Deleted project {}", id);
        }
    }
    Ok(0)
}

/// Ask a yes/no question on the terminal. Defaults to no.
fn confirm(prompt: &str) -> Result<bool> {
    eprint!("{} [y/N] ", prompt);
    std::io::stderr().flush()?;

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read confirmation")?;

    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Build a collector from `--answer` flags and `--answers-file`.
fn collect_answers(
    config: &Config,
    questions: &[Question],
    answers: &AnswerArgs,
) -> Result<Collector> {
    let file = match answers.answers_file {
        Some(ref path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read answers file: {}", path.display()))?;
            let source = parse_answers_file(&content)
                .with_context(|| format!("Failed to parse answers file: {}", path.display()))?;
            Some(source)
        }
        None => None,
    };

    let collector = build_collector(
        config.assessment.wire_version,
        questions,
        file,
        &answers.answers,
    )
    .context("Invalid answers")?;

    if collector.phase() == Phase::Empty {
        warn!("No answers given. Pass --answer KEY=VALUE or --answers-file.");
    }
    debug!(
        "Collected {} answers ({} wire format)",
        collector.answers().len(),
        collector.wire_version()
    );
    Ok(collector)
}

fn required_policy(config: &Config, answers: &AnswerArgs) -> RequiredPolicy {
    if answers.require_all {
        RequiredPolicy::All
    } else {
        config.assessment.required
    }
}

/// Print every unanswered question.
fn report_unanswered(unanswered: &[String]) {
    eprintln!("\n⚠️  Please answer all required questions:");
    for text in unanswered {
        eprintln!("   - {}", text);
    }
    eprintln!("\n   Run `loescope questions` to see question keys and options.");
}

/// Collect, validate and submit answers for a project.
async fn handle_assess(
    client: &ServiceClient,
    config: &Config,
    progress: bool,
    project_id: i64,
    answers: &AnswerArgs,
    dry_run: bool,
) -> Result<i32> {
    let questions = wait(progress, "Loading questionnaire...", client.list_questions()).await?;
    let mut collector = collect_answers(config, &questions, answers)?;

    let snapshot = match collector.submit(&questions, required_policy(config, answers)) {
        Ok(snapshot) => snapshot,
        Err(CollectorError::Incomplete(validation)) => {
            report_unanswered(&validation.unanswered);
            return Ok(EXIT_INCOMPLETE);
        }
        Err(e) => return Err(e.into()),
    };

    // Handle --dry-run: print the payload and exit
    if dry_run {
        emit(config, &report::generate_json(&snapshot)?)?;
        eprintln!("\n📋 Answers:");
        for question in &questions {
            if let Some(answer) = collector.answer(&question.question_key) {
                eprintln!("   {}: {}", question.question_key, answer);
            }
        }
        eprintln!(
            "\n🔍 Dry run: {} answers validated, nothing submitted.",
            snapshot.answers.len()
        );
        return Ok(0);
    }

    let result = wait(
        progress,
        "Submitting answers...",
        client.submit_answers(project_id, &snapshot),
    )
    .await?;
    info!(
        "Project {}: {} applicable sub-areas",
        project_id, result.applicable_count
    );

    let mut session = ProjectSession::new(client.clone(), project_id, config.report.grouping);
    session.accept_results(result);

    let project_name = match client.get_project(project_id).await {
        Ok(project) => Some(project.name),
        Err(e) => {
            warn!("Could not load project name: {}", e);
            None
        }
    };
    render_results(config, &session, project_name)?;
    Ok(0)
}

/// Evaluate answers without saving them.
async fn handle_preview(
    client: &ServiceClient,
    config: &Config,
    progress: bool,
    answers: &AnswerArgs,
) -> Result<i32> {
    let questions = wait(progress, "Loading questionnaire...", client.list_questions()).await?;
    let mut collector = collect_answers(config, &questions, answers)?;

    let snapshot = match collector.submit(&questions, required_policy(config, answers)) {
        Ok(snapshot) => snapshot,
        Err(CollectorError::Incomplete(validation)) => {
            report_unanswered(&validation.unanswered);
            return Ok(EXIT_INCOMPLETE);
        }
        Err(e) => return Err(e.into()),
    };

    let preview = wait(progress, "Evaluating answers...", client.assess(&snapshot)).await?;
    render(config, &preview, report::generate_preview_markdown)?;
    Ok(0)
}

/// View options for the results command.
struct ResultsOptions {
    view: ViewArg,
    expand: Vec<String>,
    expand_all: bool,
    detail: Vec<String>,
}

/// Load and render the applicable sub-areas of a project.
async fn handle_results(
    client: &ServiceClient,
    config: &Config,
    progress: bool,
    project_id: i64,
    options: ResultsOptions,
) -> Result<i32> {
    let (session, project) = wait(
        progress,
        "Loading results...",
        load_results_view(client, config, project_id, &options),
    )
    .await?;

    render_results(config, &session, Some(project.name))?;
    Ok(0)
}

/// Fetch a project's results and apply the requested layout and expansions.
///
/// Sub-areas named by `--detail` are completed from the catalog, since the
/// applicability listing carries no indicators.
async fn load_results_view(
    client: &ServiceClient,
    config: &Config,
    project_id: i64,
    options: &ResultsOptions,
) -> Result<(ProjectSession, Project), ServiceError> {
    let mut session = ProjectSession::new(client.clone(), project_id, config.report.grouping);
    let (project, _) = tokio::try_join!(client.get_project(project_id), session.load_results())?;

    if session.view().mode != ResultsMode::from(options.view) {
        session.apply_view(ViewEvent::ToggleMode);
    }

    if options.expand_all {
        let keys = session.section_keys();
        session.apply_view(ViewEvent::ExpandAllSections(keys));
    }
    for wanted in &options.expand {
        match session.resolve_section(wanted) {
            Some(key) => session.expand_section(&key),
            None => warn!("No applicable section {:?}", wanted),
        }
    }

    for id in &options.detail {
        if !session.show_sub_area(id) {
            warn!("No applicable sub-area {:?}", id);
            continue;
        }
        if config.report.show_indicators {
            if let Err(e) = session.load_detail(id).await {
                warn!("Could not load details of sub-area {}: {}", id, e);
            }
        }
    }

    Ok((session, project))
}

fn results_report<'a>(
    config: &Config,
    session: &'a ProjectSession,
    project_name: Option<String>,
) -> Result<ResultsReport<'a>> {
    let (Some(results), Some(view)) = (session.results(), session.results_view()) else {
        bail!("No assessment results loaded for project {}", session.project_id());
    };

    Ok(ResultsReport {
        project_id: session.project_id(),
        project_name,
        applicable_count: results.applicable_count,
        generated_at: Utc::now(),
        view,
        show_indicators: config.report.show_indicators,
    })
}

fn render_results(
    config: &Config,
    session: &ProjectSession,
    project_name: Option<String>,
) -> Result<()> {
    let results_report = results_report(config, session, project_name)?;
    render(config, &results_report, report::generate_results_markdown)
}

/// Load and render the LOE summary, optionally cross-checked.
async fn handle_loe(
    client: &ServiceClient,
    config: &Config,
    progress: bool,
    project_id: i64,
    verify: bool,
) -> Result<i32> {
    let verify = verify || config.report.verify_consistency;
    let mut session = ProjectSession::new(client.clone(), project_id, config.report.grouping);

    if verify {
        wait(progress, "Loading LOE summary...", session.load_all()).await?;
    } else {
        wait(progress, "Loading LOE summary...", session.load_summary()).await?;
    }

    let verification = if verify {
        match session.verify() {
            Ok(true) => Some(Verification::Consistent),
            Ok(false) => None,
            Err(e) => Some(Verification::Inconsistent(e.to_string())),
        }
    } else {
        None
    };

    let Some(summary) = session.summary() else {
        bail!("No LOE summary loaded for project {}", project_id);
    };

    let loe_report = LoeReport {
        summary,
        bars: section_bars(summary, config.report.top_sections),
        verification: verification.clone(),
        generated_at: Utc::now(),
    };
    render(config, &loe_report, report::generate_loe_markdown)?;

    if let Some(Verification::Inconsistent(detail)) = verification {
        eprintln!(
            "\n⛔ LOE summary for project {} does not match its sub-areas: {}",
            project_id, detail
        );
        return Ok(EXIT_INCONSISTENT);
    }

    Ok(0)
}

/// Download the scoping workbook.
async fn handle_export(
    client: &ServiceClient,
    progress: bool,
    project_id: i64,
    dir: &Path,
) -> Result<i32> {
    let workbook = wait(
        progress,
        "Generating workbook...",
        client.export_workbook(project_id),
    )
    .await?;

    let path: PathBuf = workbook
        .write_to(dir)
        .with_context(|| format!("Failed to save workbook into {}", dir.display()))?;

    println!("✅ Workbook saved to: {}", path.display());
    Ok(0)
}

/// Render a value in the configured format and emit it.
fn render<T, F>(config: &Config, value: &T, markdown: F) -> Result<()>
where
    T: Serialize + ?Sized,
    F: FnOnce(&T) -> String,
{
    let content = match config.report.format {
        OutputFormat::Json => report::generate_json(value)?,
        OutputFormat::Markdown => markdown(value),
    };
    emit(config, &content)
}

/// Write a report to the configured output file, or stdout.
fn emit(config: &Config, content: &str) -> Result<()> {
    match config.general.output {
        Some(ref path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write report to {}", path))?;
            println!("✅ Report saved to: {}", path);
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(content.as_bytes())?;
            if !content.ends_with('\n') {
                writeln!(stdout)?;
            }
        }
    }
    Ok(())
}

/// Await `fut` behind a spinner. No spinner when `enabled` is false.
///
/// Requests have no client-side deadline unless one is configured, so the
/// spinner stays up until the service answers.
async fn wait<F: Future>(enabled: bool, message: &str, fut: F) -> F::Output {
    let indicator = enabled.then(|| spinner(message));
    let output = fut.await;
    if let Some(pb) = indicator {
        pb.finish_and_clear();
    }
    output
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) =
        ProgressStyle::default_spinner().template("{spinner:.green} {msg} [{elapsed}]")
    {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
