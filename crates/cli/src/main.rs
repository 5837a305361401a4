use std::process::ExitCode;

fn main() -> ExitCode {
    roleflow_cli::run()
}
