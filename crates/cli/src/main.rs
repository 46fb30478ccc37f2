use std::process::ExitCode;

fn main() -> ExitCode {
    funil_cli::run()
}
