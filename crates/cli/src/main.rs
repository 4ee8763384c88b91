use std::process::ExitCode;

fn main() -> ExitCode {
    helsesjekk_cli::run()
}
