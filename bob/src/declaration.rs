//! Reading the project declaration out of a build descriptor
//!
//! Only the declaration function is looked at. Comments are stripped, the
//! function body is cut out by brace matching, and the declaration calls in
//! it are evaluated. Everything else in the file, including code that would
//! need the project's own dependencies, is ignored.

use crate::error::{BootstrapError, BootstrapResult};
use crate::project::{ProjectBuilder, ProjectDescriptor, ProjectError};
use regex::Regex;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Source of the project description for a build descriptor
pub trait ProjectReader {
    /// Project declared by `descriptor`, or `None` when it declares none
    ///
    /// # Errors
    ///
    /// An unreadable descriptor or an invalid declaration.
    fn read(&self, descriptor: &Path) -> BootstrapResult<Option<ProjectDescriptor>>;
}

const DECLARATION_CALLS: &[&str] = &[
    "sourcePath",
    "source_path",
    "optionalSourcePath",
    "optional_source_path",
    "sourcePathOptional",
    "jarPath",
    "jar_path",
    "optionalJarPath",
    "optional_jar_path",
    "jarPathOptional",
    "jarFile",
    "jar_file",
];

/// Reads the declaration function of a descriptor source file
#[derive(Debug)]
pub struct DeclarationReader {
    function: String,
    header: Regex,
    call: Regex,
    literal: Regex,
    conventional: Regex,
}

impl DeclarationReader {
    /// Reader for the declaration function named `function`
    ///
    /// The snake_case spelling of `function` is accepted as well.
    ///
    /// # Errors
    ///
    /// Only if the built-in patterns fail to compile.
    pub fn new(function: &str) -> BootstrapResult<Self> {
        let names = format!(
            "{}|{}",
            regex::escape(function),
            regex::escape(&snake_case(function))
        );
        let modifiers = r"(?:(?:private|public|protected|static|final|abstract|override)\s+)*";
        let header = format!(
            r"(?m)(?:{modifiers}[\w<>\[\].]+\s+(?:{names})\s*\(\s*\)\s*|fn\s+(?:{names})\s*\(\s*\)\s*(?:->\s*[^{{]+)?)\{{"
        );
        let call = format!(r"\b({})\s*\(([^)]*)\)", DECLARATION_CALLS.join("|"));

        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| BootstrapError::Internal(format!("invalid pattern: {e}")))
        };
        Ok(Self {
            function: function.to_string(),
            header: compile(&header)?,
            call: compile(&call)?,
            literal: compile(r#"^"((?:[^"\\]|\\.)*)"$"#)?,
            conventional: compile(r"\b(?:conventional|getDefault)\s*\(\s*\)")?,
        })
    }

    /// Body of the declaration function, without the outer braces
    ///
    /// # Errors
    ///
    /// [`ProjectError::Declaration`] when the body is not closed.
    pub fn declaration_body(&self, file: &Path, code: &str) -> Result<Option<String>, ProjectError> {
        let code = strip_comments(code);
        let Some(header) = self.header.find(&code) else {
            return Ok(None);
        };
        match matching_body(&code[header.end()..]) {
            Some(body) => Ok(Some(body.to_string())),
            None => Err(ProjectError::Declaration {
                file: file.to_path_buf(),
                reason: format!("the body of {} is not closed", self.function),
            }),
        }
    }

    /// Evaluate the declaration calls of `body`
    ///
    /// # Errors
    ///
    /// [`ProjectError::Declaration`] for arguments that aren't string literals.
    pub fn evaluate(&self, file: &Path, body: &str) -> Result<ProjectDescriptor, ProjectError> {
        let mut builder = if self.conventional.is_match(body) {
            ProjectBuilder::conventional()
        } else {
            ProjectDescriptor::builder()
        };

        for call in self.call.captures_iter(body) {
            let name = &call[1];
            let argument = call[2].trim();
            let Some(literal) = self.literal.captures(argument) else {
                return Err(ProjectError::Declaration {
                    file: file.to_path_buf(),
                    reason: format!("{name}({argument}) needs a string literal argument"),
                });
            };
            let path = unescape_literal(&literal[1]);
            debug!("Declaration {name}(\"{path}\")");

            let _ = match name {
                "sourcePath" | "source_path" => builder.source_path(path)?,
                "optionalSourcePath" | "optional_source_path" | "sourcePathOptional" => {
                    builder.optional_source_path(path)?
                }
                "jarPath" | "jar_path" => builder.archive_dir(path)?,
                "optionalJarPath" | "optional_jar_path" | "jarPathOptional" => {
                    builder.optional_archive_dir(path)?
                }
                _ => builder.archive_file(path)?,
            };
        }

        builder.build()
    }
}

impl ProjectReader for DeclarationReader {
    fn read(&self, descriptor: &Path) -> BootstrapResult<Option<ProjectDescriptor>> {
        let code = fs::read_to_string(descriptor)
            .map_err(|_| BootstrapError::DescriptorNotFound(descriptor.to_path_buf()))?;
        let Some(body) = self.declaration_body(descriptor, &code)? else {
            debug!("{} declares no {}", descriptor.display(), self.function);
            return Ok(None);
        };
        Ok(Some(self.evaluate(descriptor, &body)?))
    }
}

fn snake_case(name: &str) -> String {
    let mut snake = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                snake.push('_');
            }
            snake.extend(c.to_lowercase());
        } else {
            snake.push(c);
        }
    }
    snake
}

/// Remove `//` and `/* */` comments outside string and char literals
fn strip_comments(code: &str) -> String {
    let mut out = String::with_capacity(code.len());
    let mut chars = code.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == '\\' {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match (c, chars.peek()) {
            ('"' | '\'', _) => {
                quote = Some(c);
                out.push(c);
            }
            ('/', Some('/')) => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                let _ = chars.next();
                let mut previous = '\0';
                for skipped in chars.by_ref() {
                    if previous == '*' && skipped == '/' {
                        break;
                    }
                    previous = skipped;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }
    out
}

/// Text up to the brace closing an already opened block
fn matching_body(code: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in code.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '{' => depth += 1,
            '}' if depth == 0 => return Some(&code[..i]),
            '}' => depth -= 1,
            _ => {}
        }
    }
    None
}

fn unescape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}
