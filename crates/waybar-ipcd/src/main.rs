use std::process::ExitCode;

use waybar_ipcd::{LaunchError, run_daemon, telemetry};

fn main() -> ExitCode {
    match run_daemon() {
        Ok(()) => ExitCode::SUCCESS,
        Err(LaunchError::Config { source }) => {
            // Help and version requests surface as config errors from clap.
            let printed = source.print().is_ok();
            if printed && source.is_display() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(error) => {
            report(&error);
            ExitCode::FAILURE
        }
    }
}

fn report(error: &LaunchError) {
    if telemetry::is_initialised() {
        tracing::error!(%error, "daemon exited with an error");
    } else {
        eprintln!("waybar-ipcd: {error}");
    }
}
