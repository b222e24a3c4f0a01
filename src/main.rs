//! mdv - Markdown preview with a render cache
//!
//! Entry point for the mdv CLI application.

use clap::Parser;
use mdv::{
    cli::Cli,
    error::{ExitCode, StructuredError},
};
use yansi::Paint;

fn main() {
    let cli = Cli::parse();
    let json_errors = cli.json_errors;
    if cli.no_color {
        yansi::disable();
    }

    match mdv::run_app(cli) {
        Ok(code) => std::process::exit(code.as_i32()),
        Err(err) => {
            let exit_code = ExitCode::for_error(&err);

            if json_errors {
                let structured = StructuredError::new(&err, exit_code);
                if let Ok(json) = serde_json::to_string_pretty(&structured) {
                    eprintln!("{}", json);
                } else {
                    eprintln!("[{}] Error: {:#}", exit_code.code_prefix(), err);
                }
            } else {
                eprintln!(
                    "[{}] {} {:#}",
                    exit_code.code_prefix(),
                    "Error:".red().bold(),
                    err
                );
            }

            std::process::exit(exit_code.as_i32());
        }
    }
}
