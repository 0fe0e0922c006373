//! Sheetsmith - Command-line tool for importing and normalizing spritesheets

use std::process::ExitCode;

use sheetsmith::cli;

fn main() -> ExitCode {
    cli::run()
}
