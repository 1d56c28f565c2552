//! Binary entry: arguments to exit code

use crate::cli::Cli;
use crate::config::BobConfig;
use crate::defaults::INTERRUPTED_EXIT_CODE;
use crate::descriptor::Registry;
use crate::error::{BootstrapError, BootstrapResult, ErrorKind};
use crate::orchestrator::{BootstrapOrchestrator, Outcome};
use crate::{logging, signal};
use clap::Parser;
use convenient_launch::CancelToken;
use std::env;
use std::ffi::OsString;
use std::path::Path;
use std::process::ExitCode;
use tracing::{error, warn};

/// Final line of a successful build
pub const SUCCESS_LINE: &str = "Build successful";

/// Final line of a failed build
pub const FAILURE_LINE: &str = "Build FAILED!";

/// Exit code for `outcome`, printing what the user should see
#[must_use]
pub fn report(outcome: BootstrapResult<Outcome>) -> ExitCode {
    match outcome {
        Ok(Outcome::Listed(listing)) => {
            print!("{listing}");
            ExitCode::SUCCESS
        }
        // the relaunch already printed its own result line
        Ok(Outcome::Relaunched(code)) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Ok(Outcome::Built) => {
            println!("{SUCCESS_LINE}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            match e.kind() {
                ErrorKind::Internal => error!("{e} ({})", ErrorKind::Internal),
                _ => error!("{e}"),
            }
            println!("{FAILURE_LINE}");
            if e.is_interrupted() {
                ExitCode::from(INTERRUPTED_EXIT_CODE)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

/// Run `bob` with the process arguments and `registry`
#[must_use]
pub fn run(registry: Registry) -> ExitCode {
    let args: Vec<OsString> = env::args_os().collect();
    let cli = match Cli::try_parse_from(&args) {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    logging::init(cli.verbose, cli.quiet);
    let cancel = CancelToken::new();
    if let Err(e) = signal::watch(cancel.clone()) {
        warn!("Ctrl-C handling unavailable: {e}");
    }

    let invocation = cli.invocation(args.into_iter().skip(1).collect());
    let outcome = env::current_dir()
        .map_err(|e| BootstrapError::io("Failed to read", Path::new("."), e))
        .and_then(|root| {
            let config = BobConfig::load(&root)?;
            BootstrapOrchestrator::new(root, config, registry)
        })
        .and_then(|orchestrator| orchestrator.with_cancel_token(cancel).run(&invocation));
    report(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use convenient_launch::LaunchError;

    #[test]
    fn test_exit_codes() {
        assert_eq!(report(Ok(Outcome::Built)), ExitCode::SUCCESS);
        assert_eq!(report(Ok(Outcome::Relaunched(3))), ExitCode::from(3));
        assert_eq!(report(Ok(Outcome::Relaunched(-1))), ExitCode::from(1));
        assert_eq!(
            report(Err(BootstrapError::Usage("bad".into()))),
            ExitCode::FAILURE
        );
        assert_eq!(
            report(Err(BootstrapError::Launch(LaunchError::Interrupted {
                program: "bob".into()
            }))),
            ExitCode::from(130)
        );
    }
}
