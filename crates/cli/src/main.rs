use std::process::ExitCode;

fn main() -> ExitCode {
    cobuy_cli::run()
}
