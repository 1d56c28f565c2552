//! Bob - programmatic build tool
//!
//! Usage: `bob [-v|-q] [-f FILE] [TARGET]` or `bob -l`

use std::process::ExitCode;

fn main() -> ExitCode {
    bob::app::run(bob::Registry::with_builtins())
}
