mod cli;
mod compress;
mod error;
mod ffmpeg;
mod image_search;
mod logging;
mod media;
mod progress;
mod scratch;
mod search;
mod size;
mod tui;
mod video_search;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use compress::{CompressionReport, SystemCodecs};
use ffmpeg::Ffprobe;
use size::human_bytes;
use std::process::ExitCode;
use tracing::error;

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // --help and --version are not failures
            let code = if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
            let _ = err.print();
            return code;
        }
    };

    if let Err(err) = logging::init_logging(cli.verbose) {
        eprintln!("{err:#}");
    }

    match run(cli) {
        Ok(report) => {
            println!(
                "Compression completed successfully, output: {}, \
                 final size: {} bytes ({}), target: {}, {} [{}]",
                report.output.display(),
                report.final_size,
                human_bytes(report.final_size),
                report.target,
                report.kind,
                report.completion,
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("compression failed: {err:#}");
            eprintln!("Compression failed: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<CompressionReport> {
    let config = if cli.interactive {
        tui::interactive_config(cli.verbose, cli.ffmpeg, cli.ffprobe)?
    } else {
        cli.into_config()?
    };

    let probe = Ffprobe::resolve(config.ffprobe)?;
    let codecs = SystemCodecs {
        ffmpeg: config.ffmpeg,
        verbose: config.verbose,
    };
    Ok(compress::run(&config.job, &probe, &codecs)?)
}
