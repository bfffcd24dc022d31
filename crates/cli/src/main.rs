use std::process::ExitCode;

fn main() -> ExitCode {
    leadops_cli::run()
}
