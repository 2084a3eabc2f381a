use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use colored::{ColoredString, Colorize};
use serde::Serialize;
use tracing::{debug, info, warn};

use vcg_backend::{DepotFixture, InMemoryBackend, LocalFs, WorkspaceFs};
use vcg_exec::{BatchReport, FileOutcome, OutcomeKind};
use vcg_policy::{glyph_for, is_eligible, permitted, Glyph};
use vcg_query::{
    Answer, AskCaller, AutoDeny, Decider, EditInfo, FileEdit, FileSave, Prompt, QueryEditFlags,
    QuerySaveFlags, SaveVerdict, Verdict,
};
use vcg_session::{SessionConfig, WorkspaceSession};
use vcg_types::{FileId, FileStatus, Operation, Selection};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    if cli.save && cli.depot.is_none() {
        anyhow::bail!("--save needs --depot");
    }
    let config = match &cli.config {
        Some(path) => SessionConfig::load(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => SessionConfig::default(),
    };
    let fixture = match &cli.depot {
        Some(path) if path.exists() => DepotFixture::load(path)
            .with_context(|| format!("loading depot {}", path.display()))?,
        Some(path) => {
            debug!(depot = %path.display(), "depot file absent, starting empty");
            DepotFixture::default()
        }
        None => DepotFixture::default(),
    };

    let fs: Arc<dyn WorkspaceFs> = Arc::new(LocalFs::new(&cli.root));
    let backend = InMemoryBackend::from_fixture(fixture).with_workspace(fs);
    let decider: Arc<dyn Decider> = match &cli.command {
        Command::Edit(args) => Arc::new(scripted(args.answer.into())),
        Command::Save(args) => Arc::new(scripted(args.answer.into())),
        _ => Arc::new(AutoDeny),
    };
    let session = WorkspaceSession::open_local(&cli.root, backend.clone(), decider, config)?;

    let result = match cli.command {
        Command::Status(args) => cmd_status(&session, args, cli.format).await,
        Command::Eligible(args) => cmd_eligible(&session, args, cli.format).await,
        Command::Run(args) => cmd_run(&session, args, cli.format).await,
        Command::Rename(args) => cmd_rename(&session, args, cli.format).await,
        Command::Edit(args) => cmd_edit(&session, args, cli.format).await,
        Command::Save(args) => cmd_save(&session, args, cli.format).await,
    };
    session.close().await;

    // Commands that succeeded for some files still changed the depot.
    if let (true, Some(path)) = (cli.save, &cli.depot) {
        save_depot(&backend, path)?;
    }
    result
}

/// A decider answering every prompt the same way and echoing it on stderr.
fn scripted(answer: Answer) -> AskCaller {
    AskCaller::new(move |prompt| {
        let given = match (prompt, answer) {
            (Prompt::MakeWritable { .. } | Prompt::SaveUncontrolled { .. }, Answer::CheckOut) => {
                Answer::MakeWritable
            }
            _ => answer,
        };
        eprintln!("{} {} {}", "?".yellow().bold(), prompt, format!("[{given:?}]").dimmed());
        given
    })
}

fn save_depot(backend: &InMemoryBackend, path: &Path) -> anyhow::Result<()> {
    backend
        .to_fixture()
        .save(path)
        .with_context(|| format!("saving depot {}", path.display()))?;
    info!(depot = %path.display(), "depot saved");
    Ok(())
}

fn selection(paths: &[String]) -> Selection {
    paths.iter().map(String::as_str).collect()
}

/// Resolve `selection` in the cache and wait for the batch.
async fn resolve(session: &WorkspaceSession, selection: Selection) -> anyhow::Result<()> {
    let event = session.initialize(selection)?.wait().await?;
    if !event.is_complete() {
        warn!(failed = event.failed.len(), "some files could not be resolved");
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn paint(glyph: Glyph) -> ColoredString {
    let marker = glyph.marker().to_string();
    match glyph {
        Glyph::CheckedIn => marker.green(),
        Glyph::Stale => marker.cyan(),
        Glyph::CheckedOut | Glyph::Locked => marker.yellow().bold(),
        Glyph::CheckedOutOther | Glyph::LockedOther => marker.magenta(),
        Glyph::Add => marker.green().bold(),
        Glyph::Delete => marker.red(),
        Glyph::Conflict => marker.red().bold(),
        Glyph::Uncontrolled | Glyph::Blank => marker.dimmed(),
    }
}

// ---------------------------------------------------------------------------
// status / eligible
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct StatusLine {
    file: FileId,
    status: FileStatus,
    glyph: Glyph,
    permitted: Vec<Operation>,
}

fn status_lines(session: &WorkspaceSession, selection: &Selection) -> Vec<StatusLine> {
    selection
        .iter()
        .map(|file| {
            let status = session.lookup(file);
            StatusLine {
                file: file.clone(),
                status,
                glyph: glyph_for(status),
                permitted: permitted(status).operations(),
            }
        })
        .collect()
}

async fn cmd_status(session: &WorkspaceSession, args: StatusArgs, format: OutputFormat) -> anyhow::Result<()> {
    let selection = if args.paths.is_empty() {
        session.scan()?
    } else {
        selection(&args.paths)
    };
    resolve(session, selection.clone()).await?;
    let lines = status_lines(session, &selection);
    match format {
        OutputFormat::Json => print_json(&lines)?,
        OutputFormat::Text => {
            if lines.is_empty() {
                println!("No files.");
            }
            for line in &lines {
                println!("{} {:<24} {}", paint(line.glyph), line.status.label(), line.file);
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct EligibleLine {
    file: FileId,
    status: FileStatus,
    eligible: bool,
}

async fn cmd_eligible(session: &WorkspaceSession, args: EligibleArgs, format: OutputFormat) -> anyhow::Result<()> {
    let selection = if args.paths.is_empty() {
        session.scan()?
    } else {
        selection(&args.paths)
    };
    resolve(session, selection.clone()).await?;
    let lines: Vec<EligibleLine> = selection
        .iter()
        .map(|file| {
            let status = session.lookup(file);
            EligibleLine {
                file: file.clone(),
                status,
                eligible: is_eligible(status, args.operation),
            }
        })
        .collect();
    match format {
        OutputFormat::Json => print_json(&lines)?,
        OutputFormat::Text => {
            for line in &lines {
                let answer = if line.eligible { "yes".green() } else { "no".red() };
                println!("{:<4} {} ({})", answer, line.file, line.status.label().dimmed());
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// run / rename
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ReportJson<'a> {
    operation: Operation,
    outcomes: &'a [FileOutcome],
    statuses: Vec<StatusLine>,
}

/// Wait for the post-batch refresh, then print outcomes and new statuses.
async fn finish_report(
    session: &WorkspaceSession,
    mut report: BatchReport,
    refreshed: &Selection,
    format: OutputFormat,
) -> anyhow::Result<()> {
    if let Some(ticket) = report.take_refresh() {
        ticket.wait().await?;
    }
    let statuses = status_lines(session, refreshed);
    match format {
        OutputFormat::Json => print_json(&ReportJson {
            operation: report.operation,
            outcomes: &report.outcomes,
            statuses,
        })?,
        OutputFormat::Text => {
            for outcome in &report.outcomes {
                match &outcome.kind {
                    OutcomeKind::Done { message } => {
                        println!("{} {}", "✓".green().bold(), message)
                    }
                    OutcomeKind::Skipped { status } => println!(
                        "{} {} {}",
                        "-".dimmed(),
                        outcome.file,
                        format!("(not eligible: {})", status.label()).dimmed()
                    ),
                    OutcomeKind::Failed { error } => {
                        println!("{} {} {}", "✗".red().bold(), outcome.file, error.red())
                    }
                }
            }
            println!(
                "{}: {} done, {} skipped, {} failed",
                report.operation.to_string().bold(),
                report.done().count(),
                report.skipped().count(),
                report.failed().count()
            );
        }
    }
    anyhow::ensure!(report.succeeded(), "{} file(s) failed", report.failed().count());
    Ok(())
}

async fn cmd_run(session: &WorkspaceSession, args: RunArgs, format: OutputFormat) -> anyhow::Result<()> {
    let selection = selection(&args.paths);
    resolve(session, selection.clone()).await?;
    let report = session.execute_operation(args.command, selection.clone())?;
    finish_report(session, report, &selection, format).await
}

async fn cmd_rename(session: &WorkspaceSession, args: RenameArgs, format: OutputFormat) -> anyhow::Result<()> {
    let old = FileId::parse(&args.old)?;
    let new = FileId::parse(&args.new)?;
    let both = Selection::from_files([old.clone(), new.clone()]);
    resolve(session, both.clone()).await?;
    let report = session.rename(vec![(old, new)])?;
    finish_report(session, report, &both, format).await
}

// ---------------------------------------------------------------------------
// edit / save
// ---------------------------------------------------------------------------

fn info_names(info: EditInfo) -> String {
    info.iter_names()
        .map(|(name, _)| name.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Serialize)]
struct EditJson<'a> {
    verdict: Verdict,
    info: EditInfo,
    files: &'a [FileEdit],
    failed_checkouts: &'a [FileId],
}

async fn cmd_edit(session: &WorkspaceSession, args: EditArgs, format: OutputFormat) -> anyhow::Result<()> {
    let selection = selection(&args.paths);
    resolve(session, selection.clone()).await?;
    let mut flags = QueryEditFlags::empty();
    flags.set(QueryEditFlags::REPORT_ONLY, args.report_only);
    flags.set(QueryEditFlags::SILENT, args.silent);

    let mut outcome = session.query_edit(selection.files(), flags);
    if let Some(ticket) = outcome.checkout.as_mut().and_then(BatchReport::take_refresh) {
        ticket.wait().await?;
    }
    match format {
        OutputFormat::Json => print_json(&EditJson {
            verdict: outcome.verdict,
            info: outcome.info,
            files: &outcome.files,
            failed_checkouts: &outcome.failed_checkouts,
        })?,
        OutputFormat::Text => {
            for file in &outcome.files {
                let verdict = match file.verdict {
                    Verdict::Allow => "allow".green(),
                    Verdict::Deny => "deny".red(),
                };
                let mut line = format!("{verdict:<6} {}", file.file);
                if !file.info.is_empty() {
                    line.push_str(&format!(" [{}]", info_names(file.info)));
                }
                if let Some(error) = &file.error {
                    line.push_str(&format!(" {}", error.red()));
                }
                println!("{line}");
            }
            for file in &outcome.failed_checkouts {
                println!("{} checkout of {} did not succeed", "!".yellow().bold(), file);
            }
            let verdict = match outcome.verdict {
                Verdict::Allow => "allowed".green().bold(),
                Verdict::Deny => "denied".red().bold(),
            };
            println!("edit {verdict}");
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct SaveJson<'a> {
    verdict: SaveVerdict,
    files: &'a [FileSave],
    failed_checkouts: &'a [FileId],
}

async fn cmd_save(session: &WorkspaceSession, args: SaveArgs, format: OutputFormat) -> anyhow::Result<()> {
    let selection = selection(&args.paths);
    resolve(session, selection.clone()).await?;
    let mut flags = QuerySaveFlags::empty();
    flags.set(QuerySaveFlags::SILENT, args.silent);

    let mut outcome = session.query_save(selection.files(), flags);
    if let Some(ticket) = outcome.checkout.as_mut().and_then(BatchReport::take_refresh) {
        ticket.wait().await?;
    }
    match format {
        OutputFormat::Json => print_json(&SaveJson {
            verdict: outcome.verdict,
            files: &outcome.files,
            failed_checkouts: &outcome.failed_checkouts,
        })?,
        OutputFormat::Text => {
            for file in &outcome.files {
                let label = format!("{:?}", file.result).to_ascii_lowercase();
                let mut line = format!("{:<7} {}", label.bold(), file.file);
                if let Some(error) = &file.error {
                    line.push_str(&format!(" {}", error.red()));
                }
                println!("{line}");
            }
            for file in &outcome.failed_checkouts {
                println!("{} checkout of {} did not succeed", "!".yellow().bold(), file);
            }
            let verdict = match outcome.verdict {
                SaveVerdict::SaveOk => "save".green().bold(),
                SaveVerdict::SaveOkPartial => "partial save".yellow().bold(),
                SaveVerdict::ForceSaveAs => "save as".cyan().bold(),
                SaveVerdict::Cancel => "cancel".red().bold(),
            };
            println!("{verdict}");
        }
    }
    Ok(())
}
