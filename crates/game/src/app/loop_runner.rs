use std::process::ExitCode;

use runner_engine::run_app;
use tracing::{error, info};

use super::bootstrap::build_app;

pub(crate) fn run() -> ExitCode {
    let app = match build_app() {
        Ok(app) => app,
        Err(err) => {
            error!(error = %err, "startup_failed");
            return ExitCode::FAILURE;
        }
    };

    let mut autopilot = app.autopilot;
    let summary = run_app(app.config, app.scene, &mut autopilot);
    info!(
        frames = summary.frames,
        ticks = summary.ticks,
        simulated_ms = summary.simulated.as_millis() as u64,
        rounds_finished = autopilot.rounds_finished(),
        reason = ?summary.reason,
        "run_complete"
    );
    ExitCode::SUCCESS
}
