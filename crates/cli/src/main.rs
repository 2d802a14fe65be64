use std::process::ExitCode;

fn main() -> ExitCode {
    solvent_cli::run()
}
