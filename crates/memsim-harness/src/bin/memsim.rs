//! CLI entrypoint for the memsim simulator process.
//!
//! With no subcommand the binary speaks the line protocol over
//! stdin/stdout, which is how a presentation client drives it. The
//! `script` subcommand replays a JSON script instead.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use memsim_core::Session;
use memsim_harness::{Script, TraceWriter, render_report, run_script};

/// Memory allocation and cache simulator.
#[derive(Debug, Parser)]
#[command(name = "memsim")]
#[command(about = "Byte-addressable memory and cache simulator speaking a line protocol")]
struct Cli {
    /// Print a `> ` prompt before reading each command.
    #[arg(long)]
    prompt: bool,
    /// Append a JSONL record per processed command to this file.
    #[arg(long)]
    trace: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Replay a JSON script against a fresh simulator.
    Script {
        /// Script JSON path.
        #[arg(long)]
        path: PathBuf,
        /// Markdown report output path.
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    match cli.command {
        Some(Command::Script { path, report }) => replay_script(&path, report.as_deref()),
        None => serve(cli.prompt, cli.trace.as_deref()),
    }
}

/// Runs the protocol loop until `exit` or EOF. Both end the process
/// cleanly with status 0.
fn serve(prompt: bool, trace: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut tracer = trace.map(TraceWriter::open).transpose()?;
    let mut session = Session::new();

    let mut line = String::new();
    loop {
        if prompt {
            write!(out, "> ")?;
            out.flush()?;
        }
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break; // input stream closed
        }
        let Some(response) = session.handle_line(&line) else {
            continue;
        };
        writeln!(out, "{response}")?;
        out.flush()?;
        if let Some(tracer) = tracer.as_mut() {
            tracer.record(line.trim(), &response)?;
        }
        if session.is_terminated() {
            break;
        }
    }
    Ok(())
}

fn replay_script(path: &Path, report: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let script = Script::from_path(path)?;
    let results = run_script(&script);

    for result in &results {
        let status = if result.passed { "PASS" } else { "FAIL" };
        eprintln!("{status} {}", result.command);
    }
    if let Some(report_path) = report {
        std::fs::write(report_path, render_report(&script.name, &results))?;
        eprintln!("report written to {}", report_path.display());
    }

    let failed = results.iter().filter(|r| !r.passed).count();
    if failed > 0 {
        return Err(format!("{failed} script step(s) failed").into());
    }
    Ok(())
}
