//! Binary entrypoint for the region worker bootstrap coordinator.

use std::io::{self, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    match regiond_bootstrap::run_coordinator() {
        Ok(_) => ExitCode::SUCCESS,
        Err(error) => {
            writeln!(io::stderr().lock(), "regiond-bootstrap: {error}").ok();
            ExitCode::FAILURE
        }
    }
}
