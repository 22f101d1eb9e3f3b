//! hwt - local-first hardware project tracker

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = hwtrack::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
