use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::sync::mpsc::{self, Sender};
use std::thread;

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use datapilot_client::app::{App, QuestionOutcome, UploadOutcome};
use datapilot_client::client::{DataPilotClient, DataPilotHttpClient};
use datapilot_client::config::{ConfigLoader, ConfigOverrides};
use datapilot_client::domain::{Dataset, DatasetId, TabularFileName};
use datapilot_client::error::{DataPilotError, ErrorKind};
use datapilot_client::output::{self, JsonOutput, OutputMode};
use datapilot_client::registry::{DatasetRegistry, RefreshPolicy, RefreshTicket};
use datapilot_client::session::QuerySession;

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

#[derive(Parser)]
#[command(name = "datapilot")]
#[command(about = "Upload tabular datasets and ask questions about them")]
#[command(version, author)]
struct Cli {
    /// Backend base URL, e.g. http://localhost:8000
    #[arg(long, global = true, env = "DATAPILOT_API_BASE_URL")]
    api_base: Option<String>,

    #[arg(long, global = true)]
    config: Option<Utf8PathBuf>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[arg(long, global = true, value_enum)]
    refresh_policy: Option<RefreshPolicy>,

    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "List uploaded datasets")]
    Datasets,
    #[command(about = "Upload a CSV file")]
    Upload(UploadArgs),
    #[command(about = "Ask a question about a dataset")]
    Ask(AskArgs),
    #[command(about = "Interactive session (default)")]
    Shell,
}

#[derive(Args)]
struct UploadArgs {
    path: Utf8PathBuf,
}

#[derive(Args)]
struct AskArgs {
    question: String,

    /// Dataset to ask about; defaults to the most recent upload
    #[arg(long)]
    dataset: Option<String>,

    /// Show reasoning and code
    #[arg(long)]
    details: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(report) => {
            eprintln!("{report:?}");
            match report.downcast_ref::<DataPilotError>() {
                Some(error) => ExitCode::from(map_exit_code(error)),
                None => ExitCode::from(1),
            }
        }
    }
}

fn map_exit_code(error: &DataPilotError) -> u8 {
    match error.kind() {
        ErrorKind::Validation => 2,
        ErrorKind::Transport => 3,
        ErrorKind::State | ErrorKind::Config => 1,
    }
}

fn run() -> miette::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    let overrides = ConfigOverrides {
        api_base_url: cli.api_base,
        timeout_secs: cli.timeout,
        refresh_policy: cli.refresh_policy,
    };
    let config = ConfigLoader::resolve(cli.config.as_deref(), overrides)?;
    let app = App::new(DataPilotHttpClient::new(&config)?);
    let mut registry = DatasetRegistry::new(config.refresh_policy);
    let mut session = QuerySession::new();

    match cli.command.unwrap_or(Commands::Shell) {
        Commands::Datasets => {
            app.refresh_datasets(&mut registry)?;
            print_registry(&registry, mode)?;
        }
        Commands::Upload(args) => {
            let outcome = upload_file(&app, &mut registry, &args.path)?;
            print_upload(&outcome, &registry, mode)?;
        }
        Commands::Ask(args) => {
            if let Err(err) = app.refresh_datasets(&mut registry) {
                eprintln!("{YELLOW}Failed to load datasets: {err}{RESET}");
            }
            if let Some(id) = args.dataset {
                registry.select(DatasetId::from(id));
            }
            let outcome = app.submit_question(&registry, &mut session, &args.question);
            if args.details {
                session.toggle_detail();
            }
            match outcome {
                QuestionOutcome::Answered => print_session(&session, mode)?,
                QuestionOutcome::Rejected(err) => return Err(err.into()),
                // The session already carries the message; report it once.
                QuestionOutcome::Failed(err) => {
                    print_session(&session, mode)?;
                    return Ok(ExitCode::from(map_exit_code(&err)));
                }
            }
        }
        Commands::Shell => run_shell(&app, &mut registry, &mut session, mode)?,
    }
    Ok(ExitCode::SUCCESS)
}

fn upload_file<C: DataPilotClient>(
    app: &App<C>,
    registry: &mut DatasetRegistry,
    path: &Utf8Path,
) -> Result<UploadOutcome, DataPilotError> {
    let file_name = path.file_name().unwrap_or(path.as_str());
    // Reject by extension before touching the file.
    file_name.parse::<TabularFileName>()?;
    let bytes = std::fs::read(path.as_std_path())
        .map_err(|err| DataPilotError::Filesystem(format!("read {path}: {err}")))?;
    app.submit_upload(registry, &bytes, file_name)
}

fn print_registry(registry: &DatasetRegistry, mode: OutputMode) -> miette::Result<()> {
    match mode {
        OutputMode::Json => JsonOutput::print_registry(registry).into_diagnostic(),
        OutputMode::Human => {
            println!("{CYAN}Datasets{RESET}");
            print!("{}", output::render_registry(registry));
            Ok(())
        }
    }
}

fn print_session(session: &QuerySession, mode: OutputMode) -> miette::Result<()> {
    match mode {
        OutputMode::Json => JsonOutput::print_session(session).into_diagnostic(),
        OutputMode::Human => {
            let rendered = output::render_session(session);
            if session.error_message().is_some() {
                print!("{RED}{rendered}{RESET}");
            } else {
                print!("{rendered}");
            }
            Ok(())
        }
    }
}

fn print_upload(
    outcome: &UploadOutcome,
    registry: &DatasetRegistry,
    mode: OutputMode,
) -> miette::Result<()> {
    if let OutputMode::Json = mode {
        return JsonOutput::print_upload(&outcome.receipt).into_diagnostic();
    }
    println!("{GREEN}{}{RESET}", outcome.receipt);
    match &outcome.refresh {
        Ok(_) => print_registry(registry, mode),
        Err(err) => {
            eprintln!("{YELLOW}Failed to load datasets: {err}{RESET}");
            Ok(())
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum ShellCommand {
    Datasets,
    Use(String),
    Upload(Utf8PathBuf),
    Details,
    Help,
    Quit,
    Ask(String),
}

fn parse_shell_command(input: &str) -> Result<Option<ShellCommand>, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let Some(directive) = trimmed.strip_prefix(':') else {
        return Ok(Some(ShellCommand::Ask(trimmed.to_string())));
    };
    let (name, rest) = directive
        .split_once(char::is_whitespace)
        .map(|(name, rest)| (name, rest.trim()))
        .unwrap_or((directive, ""));
    let command = match name {
        "datasets" | "ls" => ShellCommand::Datasets,
        "use" if !rest.is_empty() => ShellCommand::Use(rest.to_string()),
        "use" => return Err(":use requires a dataset id".to_string()),
        "upload" if !rest.is_empty() => ShellCommand::Upload(Utf8PathBuf::from(rest)),
        "upload" => return Err(":upload requires a file path".to_string()),
        "details" => ShellCommand::Details,
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" | "q" => ShellCommand::Quit,
        other => return Err(format!("unknown command :{other}")),
    };
    Ok(Some(command))
}

fn print_shell_help() {
    println!(":datasets          list datasets (* marks the selection)");
    println!(":use <id>          ask about a specific dataset");
    println!(":upload <path>     upload a CSV file");
    println!(":details           show or hide reasoning & code");
    println!(":quit              leave the session");
    println!("anything else is sent as a question");
}

enum ShellEvent {
    Line(String),
    Refreshed(RefreshTicket, Result<Vec<Dataset>, DataPilotError>),
    Closed,
}

fn spawn_stdin_reader(tx: Sender<ShellEvent>) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(ShellEvent::Line(line)).is_err() {
                return;
            }
        }
        let _ = tx.send(ShellEvent::Closed);
    });
}

/// Fetches on a worker thread; the result is applied back on the shell loop.
fn spawn_refresh<C>(app: &App<C>, registry: &mut DatasetRegistry, tx: &Sender<ShellEvent>)
where
    C: DataPilotClient + Clone + 'static,
{
    let ticket = registry.begin_refresh();
    let app = app.clone();
    let tx = tx.clone();
    thread::spawn(move || {
        let fetched = app.fetch_registry();
        let _ = tx.send(ShellEvent::Refreshed(ticket, fetched));
    });
}

fn prompt() -> miette::Result<()> {
    print!("{CYAN}datapilot>{RESET} ");
    io::stdout().flush().into_diagnostic()
}

fn run_shell<C>(
    app: &App<C>,
    registry: &mut DatasetRegistry,
    session: &mut QuerySession,
    mode: OutputMode,
) -> miette::Result<()>
where
    C: DataPilotClient + Clone + 'static,
{
    let (tx, rx) = mpsc::channel();
    spawn_refresh(app, registry, &tx);
    print_registry(registry, mode)?;
    print_shell_help();
    spawn_stdin_reader(tx.clone());
    prompt()?;

    while let Ok(event) = rx.recv() {
        let line = match event {
            ShellEvent::Closed => break,
            ShellEvent::Refreshed(ticket, fetched) => {
                println!();
                match app.apply_refresh(registry, ticket, fetched) {
                    Ok(outcome) if !outcome.applied => {}
                    Ok(_) => print_registry(registry, mode)?,
                    Err(err) => eprintln!("{YELLOW}Failed to load datasets: {err}{RESET}"),
                }
                prompt()?;
                continue;
            }
            ShellEvent::Line(line) => line,
        };
        let command = match parse_shell_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => {
                prompt()?;
                continue;
            }
            Err(message) => {
                eprintln!("{RED}{message}{RESET}");
                prompt()?;
                continue;
            }
        };

        match command {
            ShellCommand::Datasets => {
                spawn_refresh(app, registry, &tx);
                print_registry(registry, mode)?;
            }
            ShellCommand::Use(id) => {
                registry.select(DatasetId::from(id));
                print_registry(registry, mode)?;
            }
            ShellCommand::Upload(path) => match upload_file(app, registry, &path) {
                Ok(outcome) => print_upload(&outcome, registry, mode)?,
                Err(err) => eprintln!("{RED}{err}{RESET}"),
            },
            ShellCommand::Details => {
                session.toggle_detail();
                print_session(session, mode)?;
            }
            ShellCommand::Help => print_shell_help(),
            ShellCommand::Quit => break,
            ShellCommand::Ask(question) => {
                let outcome = app.submit_question(registry, session, &question);
                if let QuestionOutcome::Rejected(err) = outcome {
                    eprintln!("{YELLOW}{err}{RESET}");
                } else {
                    print_session(session, mode)?;
                }
            }
        }
        prompt()?;
    }
    Ok(())
}
