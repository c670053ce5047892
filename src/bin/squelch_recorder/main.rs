//! Squelch recorder entrypoint: listens on an audio input and writes each
//! burst of activity (a radio transmission, a doorbell, a voice) to its own
//! WAV file.

mod cli_utils;

use squelch_recorder::{app, config::AppConfig, init_tracing};
use std::process::ExitCode;

use crate::cli_utils::list_input_devices;

const EXIT_CONFIG_INVALID: u8 = 2;

fn main() -> ExitCode {
    let config = match AppConfig::parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err:#}");
            return ExitCode::from(EXIT_CONFIG_INVALID);
        }
    };

    if config.list_input_devices {
        list_input_devices();
        return ExitCode::SUCCESS;
    }

    init_tracing(&config);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        source = %config.source_label,
        "squelch recorder starting"
    );

    match app::run(&config) {
        Ok(summary) => {
            tracing::info!(
                frames = summary.frames_processed,
                frames_skipped = summary.frames_skipped,
                episodes = summary.episodes_started,
                aborted = summary.episodes_aborted,
                segments = summary.segments_emitted,
                rejected = summary.segments_rejected,
                discarded = summary.segments_discarded,
                files = summary.files_written,
                write_failures = summary.write_failures,
                "squelch recorder stopped"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "squelch recorder failed");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
