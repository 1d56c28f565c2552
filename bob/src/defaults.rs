//! Conventional names and locations of the bootstrap

/// Build descriptor used when none is given
pub const DESCRIPTOR_PATH: &str = "bob/Default.java";

/// Target picked when no default is marked
pub const DEFAULT_TARGET_NAME: &str = "build";

/// Function holding the project declaration
pub const DECLARATION_FUNCTION: &str = "describeProject";

/// Environment key carrying the handoff file to the relaunched process
pub const HANDOFF_ENV: &str = "BOB_HANDOFF";

/// Optional project configuration file, relative to the project root
pub const CONFIG_FILE: &str = "bob.yml";

/// Schema version of the handoff file
pub const HANDOFF_VERSION: u32 = 1;

/// Exit code of a relaunch interrupted by Ctrl-C
pub const INTERRUPTED_EXIT_CODE: u8 = 130;

/// Default compiler program
pub const COMPILER_PROGRAM: &str = "javac";

/// Source file extension understood by the default compiler
pub const SOURCE_EXTENSION: &str = "java";

/// Unit file extension produced by the default compiler
pub const UNIT_EXTENSION: &str = "class";
