use anyhow::{bail, Context, Result};
use clap::Parser;
use ed2k_digest::Ed2k;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "ed2ksum")]
#[command(author, version, about = "Print ED2K hashes of files", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Print ed2k:// file links instead of plain hashes
    #[arg(short, long)]
    link: bool,

    /// Files to hash. Standard input is read when none are given, or for "-"
    files: Vec<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.debug {
        env_logger::Builder::from_env(env_logger::Env::default())
            .filter_level(log::LevelFilter::Debug)
            .format_timestamp_millis()
            .init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    let inputs = if cli.files.is_empty() {
        vec![PathBuf::from("-")]
    } else {
        cli.files
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut failed = false;
    for input in &inputs {
        let line = hash_input(input).and_then(|hasher| format_line(input, hasher, cli.link));
        match line {
            Ok(line) => {
                if let Err(e) = writeln!(out, "{line}") {
                    eprintln!("ed2ksum: {e}");
                    return ExitCode::FAILURE;
                }
            }
            Err(e) => {
                eprintln!("ed2ksum: {}: {e:#}", input.display());
                failed = true;
            }
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn is_stdin(input: &Path) -> bool {
    input.as_os_str() == "-"
}

fn hash_input(input: &Path) -> Result<Ed2k> {
    let mut hasher = Ed2k::new();
    if is_stdin(input) {
        log::debug!("Hashing standard input");
        hasher.io(io::stdin().lock())?;
    } else {
        hasher.file(input).context("Failed to hash file")?;
    }
    Ok(hasher)
}

fn format_line(input: &Path, mut hasher: Ed2k, link: bool) -> Result<String> {
    let hash = hasher.hexdigest();
    if !link {
        return Ok(format!("{hash}  {}", input.display()));
    }

    if is_stdin(input) {
        bail!("Cannot build an ed2k link for standard input");
    }
    let name = input
        .file_name()
        .with_context(|| format!("No file name in {}", input.display()))?
        .to_string_lossy();
    Ok(format!(
        "ed2k://|file|{}|{}|{hash}|/",
        name.replace('|', "_"),
        hasher.bytes_hashed()
    ))
}
