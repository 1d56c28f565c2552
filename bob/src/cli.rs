//! Command-line interface

use crate::defaults::HANDOFF_ENV;
use crate::orchestrator::Invocation;
use clap::{ArgAction, Parser};
use std::ffi::OsString;
use std::path::PathBuf;

/// Bob - programmatic build tool
#[derive(Debug, Parser)]
#[command(name = "bob")]
#[command(about = "Compiles the project and runs a target of its build descriptor")]
#[command(version)]
pub struct Cli {
    /// More output; repeat for even more
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Only print errors
    #[arg(short, long)]
    pub quiet: bool,

    /// List the targets of the build descriptor instead of building
    #[arg(short = 'l', long, conflicts_with = "target")]
    pub list_targets: bool,

    /// Build descriptor to use
    #[arg(short = 'f', long, value_name = "FILE")]
    pub build_file: Option<PathBuf>,

    /// Handoff file written by the cold bootstrap
    #[arg(long, env = HANDOFF_ENV, hide = true, hide_env_values = true)]
    pub handoff: Option<PathBuf>,

    /// Classpath resolved by the cold bootstrap
    #[arg(long, hide = true, value_name = "PATHS")]
    pub classpath: Option<OsString>,

    /// Target to run; the default target when omitted
    pub target: Option<String>,
}

impl Cli {
    /// Invocation described by these arguments
    ///
    /// `raw_args` are the arguments after the program name, forwarded
    /// unchanged when the cold bootstrap relaunches.
    #[must_use]
    pub fn invocation(&self, raw_args: Vec<OsString>) -> Invocation {
        Invocation {
            target: self.target.clone(),
            descriptor: self.build_file.clone(),
            handoff: self.handoff.clone(),
            classpath: self
                .classpath
                .as_ref()
                .map(|joined| std::env::split_paths(joined).collect())
                .unwrap_or_default(),
            list_targets: self.list_targets,
            raw_args,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn test_target_and_options() {
        let cli = Cli::try_parse_from(["bob", "-vv", "-f", "bob/Release.java", "dist"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.build_file, Some(PathBuf::from("bob/Release.java")));
        assert_eq!(cli.target.as_deref(), Some("dist"));
        assert!(!cli.list_targets);
    }

    #[test]
    fn test_list_conflicts_with_target() {
        let err = Cli::try_parse_from(["bob", "-l", "dist"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["bob", "-v", "-q"]).is_err());
    }

    #[test]
    fn test_extra_positional_is_rejected() {
        let err = Cli::try_parse_from(["bob", "build", "jar"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_hidden_classpath_is_split() {
        let joined = std::env::join_paths(["/a/classes", "/b/x.jar"]).unwrap();
        let mut args: Vec<OsString> = vec!["bob".into(), "--classpath".into(), joined];
        args.push("jar".into());
        let cli = Cli::try_parse_from(&args).unwrap();

        let invocation = cli.invocation(vec!["jar".into()]);
        assert_eq!(
            invocation.classpath,
            vec![PathBuf::from("/a/classes"), PathBuf::from("/b/x.jar")]
        );
        assert_eq!(invocation.target.as_deref(), Some("jar"));
        assert_eq!(invocation.raw_args, vec![OsString::from("jar")]);
    }
}
