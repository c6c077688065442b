mod bootstrap;
pub mod gameplay;
mod loop_runner;
pub mod settings;

pub use bootstrap::AppError;

pub fn run() -> std::process::ExitCode {
    loop_runner::run()
}
