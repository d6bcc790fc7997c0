use std::env;
use std::process::ExitCode;

use tracing::error;

mod app;

use app::bootstrap::{self, CliCommand};

fn main() -> ExitCode {
    let args = env::args().skip(1).collect::<Vec<_>>();
    let options = match bootstrap::parse_args(&args) {
        Ok(CliCommand::Run(options)) => options,
        Ok(CliCommand::Help) => {
            println!("{}", bootstrap::usage_text());
            return ExitCode::SUCCESS;
        }
        Err(message) => {
            eprintln!("{message}\n\n{}", bootstrap::usage_text());
            return ExitCode::from(2);
        }
    };

    bootstrap::init_tracing();
    match bootstrap::build_app(options) {
        Ok(app) => app::loop_runner::run(app),
        Err(err) => {
            error!(error = %err, "startup_failed");
            ExitCode::FAILURE
        }
    }
}
