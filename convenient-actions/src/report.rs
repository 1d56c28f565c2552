//! Structured result of an isolated test run
//!
//! The runner writes a Java-properties file:
//!
//! ```text
//! success=false
//! failed=1
//! ignored=0
//! total=3
//! runtime=12
//! failedtests=testB(a.ATest)
//! testB(a.ATest)=java.lang.AssertionError\: expected...
//! ```

use crate::error::{ActionError, ActionResult};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

const SUCCESS: &str = "success";
const FAILED: &str = "failed";
const IGNORED: &str = "ignored";
const TOTAL: &str = "total";
const RUNTIME: &str = "runtime";
const FAILED_TESTS: &str = "failedtests";

/// One failed test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestFailure {
    /// Test header, e.g. `testB(a.ATest)`
    pub header: String,
    /// Failure trace, empty when the runner wrote none
    pub trace: String,
}

/// Outcome of a test run
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TestReport {
    /// Whether the run succeeded overall
    pub success: bool,
    /// Failed test count
    pub failed: u32,
    /// Ignored test count
    pub ignored: u32,
    /// Executed test count
    pub total: u32,
    /// Wall-clock time reported by the runner
    pub runtime: Duration,
    /// Failures in execution order
    pub failures: Vec<TestFailure>,
}

impl TestReport {
    /// Parse a results file's contents
    ///
    /// # Errors
    ///
    /// [`ActionError::MalformedReport`] when a mandatory key is missing or
    /// not a number/boolean.
    pub fn parse(text: &str) -> ActionResult<Self> {
        let properties = parse_properties(text);

        let success = match required(&properties, SUCCESS)? {
            "true" => true,
            "false" => false,
            other => {
                return Err(ActionError::MalformedReport(format!(
                    "{SUCCESS} must be true or false, got \"{other}\""
                )));
            }
        };

        let failures = properties
            .get(FAILED_TESTS)
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|h| !h.is_empty())
                    .map(|header| TestFailure {
                        header: header.to_string(),
                        trace: properties.get(header).cloned().unwrap_or_default(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            success,
            failed: number(&properties, FAILED)?,
            ignored: number(&properties, IGNORED)?,
            total: number(&properties, TOTAL)?,
            runtime: Duration::from_millis(number(&properties, RUNTIME)?),
            failures,
        })
    }

    /// Read and parse a results file
    ///
    /// # Errors
    ///
    /// I/O failures and malformed contents. An empty file means the runner
    /// never wrote its results.
    pub fn read(path: &Path) -> ActionResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| ActionError::io("Failed to read test results", path, e))?;
        if text.trim().is_empty() {
            return Err(ActionError::MalformedReport(format!(
                "{} is empty",
                path.display()
            )));
        }
        Self::parse(&text)
    }
}

impl fmt::Display for TestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tests run: {}, Failures: {}, Ignored: {}, Time: {:.3}s",
            self.total,
            self.failed,
            self.ignored,
            self.runtime.as_secs_f64()
        )?;
        for failure in &self.failures {
            write!(f, "\n  {}", failure.header)?;
            if let Some(first) = failure.trace.lines().next() {
                write!(f, ": {first}")?;
            }
        }
        Ok(())
    }
}

fn required<'a>(properties: &'a HashMap<String, String>, key: &str) -> ActionResult<&'a str> {
    properties
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| ActionError::MalformedReport(format!("missing key \"{key}\"")))
}

fn number<T: std::str::FromStr>(properties: &HashMap<String, String>, key: &str) -> ActionResult<T> {
    let value = required(properties, key)?;
    value
        .trim()
        .parse()
        .map_err(|_| ActionError::MalformedReport(format!("{key} is not a number: \"{value}\"")))
}

/// Logical lines: comments and blanks dropped, continuations joined
fn logical_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current: Option<String> = None;

    for raw in text.lines() {
        let line = raw.trim_start();
        let joined = match current.take() {
            Some(mut pending) => {
                pending.push_str(line);
                pending
            }
            None => {
                if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                    continue;
                }
                line.to_string()
            }
        };

        let trailing = joined.chars().rev().take_while(|c| *c == '\\').count();
        if trailing % 2 == 1 {
            let mut pending = joined;
            let _ = pending.pop();
            current = Some(pending);
        } else {
            lines.push(joined);
        }
    }
    if let Some(pending) = current {
        lines.push(pending);
    }
    lines
}

fn parse_properties(text: &str) -> HashMap<String, String> {
    let mut properties = HashMap::new();
    for line in logical_lines(text) {
        let (key, value) = split_key_value(&line);
        let _ = properties.insert(unescape(key), unescape(value));
    }
    properties
}

/// Split at the first unescaped `=`, `:` or whitespace
fn split_key_value(line: &str) -> (&str, &str) {
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => return (&line[..i], line[i + 1..].trim_start()),
            c if c.is_whitespace() => {
                let rest = line[i..].trim_start();
                let rest = rest
                    .strip_prefix(['=', ':'])
                    .map_or(rest, str::trim_start);
                return (&line[..i], rest);
            }
            _ => {}
        }
    }
    (line, "")
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "#Thu Oct 15 10:00:00 CEST 2026
success=false
failed=1
ignored=2
total=5
runtime=1500
failedtests=testB(a.ATest)
testB(a.ATest)=java.lang.AssertionError\\: expected\\:<1> but was\\:<2>\\n\\tat a.ATest.testB(ATest.java\\:12)
";

    #[test]
    fn test_parse_failed_run() {
        let report = TestReport::parse(SAMPLE).unwrap();
        assert!(!report.success);
        assert_eq!(report.failed, 1);
        assert_eq!(report.ignored, 2);
        assert_eq!(report.total, 5);
        assert_eq!(report.runtime, Duration::from_millis(1500));
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].header, "testB(a.ATest)");
        assert_eq!(
            report.failures[0].trace,
            "java.lang.AssertionError: expected:<1> but was:<2>\n\tat a.ATest.testB(ATest.java:12)"
        );
    }

    #[test]
    fn test_parse_successful_run_without_failures() {
        let report =
            TestReport::parse("success=true\nfailed=0\nignored=0\ntotal=2\nruntime=7\nfailedtests=\n")
                .unwrap();
        assert!(report.success);
        assert!(report.failures.is_empty());
        assert_eq!(report.to_string(), "Tests run: 2, Failures: 0, Ignored: 0, Time: 0.007s");
    }

    #[test]
    fn test_continuations_and_separators() {
        let properties = parse_properties("key   value\nlong = first \\\n    second\nesc\\=aped:x\n! note\n");
        assert_eq!(properties["key"], "value");
        assert_eq!(properties["long"], "first second");
        assert_eq!(properties["esc=aped"], "x");
        assert_eq!(properties.len(), 3);
    }

    #[test]
    fn test_unicode_escape() {
        assert_eq!(unescape("caf\\u00e9"), "café");
        assert_eq!(unescape("bad\\uZZZZ"), "bad\\uZZZZ");
    }

    #[test]
    fn test_missing_key_is_malformed() {
        let err = TestReport::parse("success=true\n").unwrap_err();
        assert!(matches!(err, ActionError::MalformedReport(m) if m.contains("failed")));
    }

    #[test]
    fn test_bad_boolean_is_malformed() {
        let err = TestReport::parse("success=yes\n").unwrap_err();
        assert!(matches!(err, ActionError::MalformedReport(_)));
    }

    #[test]
    fn test_empty_file_is_malformed() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("results.properties");
        fs::write(&path, "").unwrap();
        assert!(matches!(
            TestReport::read(&path),
            Err(ActionError::MalformedReport(_))
        ));
    }
}
