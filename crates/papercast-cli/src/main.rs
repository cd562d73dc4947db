use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use papercast_core::{
    Config, OutputDir, Pipeline, PipelineContext, PipelineError, PipelineRequest, ProgressEvent,
    config_file,
};
use papercast_pdf_mupdf::MupdfBackend;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod menu;
mod output;

use output::ColorMode;

/// Research paper podcasts - summarize papers and read them aloud
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Directory audio files are written to
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process papers given on the command line
    Run {
        /// Comma-separated PDF paths
        #[arg(long, value_delimiter = ',')]
        pdf: Vec<PathBuf>,

        /// Comma-separated DOIs
        #[arg(long, value_delimiter = ',')]
        doi: Vec<String>,

        /// Comma-separated paper URLs
        #[arg(long, value_delimiter = ',')]
        url: Vec<String>,

        /// Comma-separated candidate topics for classification
        #[arg(long, value_delimiter = ',')]
        topic: Vec<String>,

        /// Number of items processed concurrently
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Choose inputs from a menu (the default)
    Interactive,

    /// Manage audio files in the output directory
    Files {
        #[command(subcommand)]
        action: FilesAction,
    },
}

#[derive(Subcommand, Debug)]
enum FilesAction {
    /// List audio files with their sizes
    List,
    /// Delete one file
    Delete { name: String },
    /// Delete every audio file
    Clean,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
}

fn clean_entries(entries: Vec<String>) -> Vec<String> {
    entries
        .into_iter()
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    // Resolve configuration: CLI flags > env vars > config files > defaults
    let (mut config, _file) = config_file::resolve_config();
    if let Some(dir) = cli.output_dir {
        config.output_dir = dir;
    }
    tracing::debug!(?config, "resolved configuration");
    let color = ColorMode(!cli.no_color);

    match cli.command.unwrap_or(Command::Interactive) {
        Command::Run {
            pdf,
            doi,
            url,
            topic,
            workers,
        } => {
            if let Some(n) = workers {
                config.num_workers = n.max(1);
            }
            let request = PipelineRequest {
                pdf_files: pdf,
                doi_list: clean_entries(doi),
                urls: clean_entries(url),
                topic_list: clean_entries(topic),
            };
            if request.is_empty() {
                anyhow::bail!("At least one input type (PDFs, DOIs, or URLs) is required");
            }
            run(config, request, color).await
        }
        Command::Interactive => {
            let outcome = {
                let stdin = std::io::stdin();
                let mut input = stdin.lock();
                let mut out = std::io::stdout();
                menu::run_menu(&mut input, &mut out, color)?
            };
            match outcome {
                menu::MenuOutcome::Exit => Ok(()),
                menu::MenuOutcome::Run(request) => run(config, request, color).await,
            }
        }
        Command::Files { action } => files(&config, action, color),
    }
}

async fn run(config: Config, request: PipelineRequest, color: ColorMode) -> anyhow::Result<()> {
    for path in &request.pdf_files {
        if !path.exists() {
            anyhow::bail!("File not found: {}", path.display());
        }
    }

    let total = request.items().len() as u64;
    let ctx = Arc::new(PipelineContext::with_defaults(
        config,
        Arc::new(MupdfBackend::new()),
    ));
    let pipeline = Pipeline::new(ctx);

    let bar = if color.enabled() {
        let style = ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/dim}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        ProgressBar::new(total).with_style(style)
    } else {
        ProgressBar::hidden()
    };

    let progress_cb = {
        let bar = bar.clone();
        move |event: ProgressEvent| {
            let mut line = Vec::new();
            let _ = output::print_progress(&mut line, &event, color);
            let line = String::from_utf8_lossy(&line).trim_end().to_string();
            match event {
                ProgressEvent::ItemCompleted { .. } | ProgressEvent::ItemSkipped { .. } => bar.inc(1),
                ProgressEvent::Synthesizing { .. } => bar.set_message("synthesizing"),
                _ => {}
            }
            if line.is_empty() {
                return;
            }
            if bar.is_hidden() {
                println!("{}", line);
            } else {
                bar.println(line);
            }
        }
    };

    let cancel = CancellationToken::new();

    // Set up Ctrl+C handler
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_clone.cancel();
        }
    });

    let result = pipeline.run(&request, progress_cb, cancel).await;
    bar.finish_and_clear();

    let result = match result {
        Ok(result) => result,
        Err(PipelineError::Cancelled) => anyhow::bail!("Cancelled"),
        Err(e) => return Err(e.into()),
    };

    let mut stdout = std::io::stdout();
    writeln!(stdout)?;
    writeln!(stdout, "PROCESS COMPLETE")?;
    output::print_result(&mut stdout, &result, color)?;
    Ok(())
}

fn files(config: &Config, action: FilesAction, color: ColorMode) -> anyhow::Result<()> {
    let dir = OutputDir::new(config.output_dir.clone(), config.naming);
    let mut stdout = std::io::stdout();
    match action {
        FilesAction::List => output::print_files(&mut stdout, &dir.list_audio()?, color)?,
        FilesAction::Delete { name } => {
            dir.delete(&name)?;
            writeln!(stdout, "File {} deleted successfully", name)?;
        }
        FilesAction::Clean => {
            let count = dir.delete_all_audio()?;
            writeln!(stdout, "Deleted {} audio files", count)?;
        }
    }
    Ok(())
}
