use std::process::ExitCode;

fn main() -> ExitCode {
    replog_cli::run()
}
