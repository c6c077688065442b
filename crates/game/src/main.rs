use std::process::ExitCode;

fn main() -> ExitCode {
    runner_game::run()
}
