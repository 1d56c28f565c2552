//! Picking the one target method to run
//!
//! A descriptor exposes [`MethodInfo`] records instead of being inspected
//! reflectively. A usable target is public, marked as a target, takes no
//! parameters and returns an action.

use std::fmt::Write as _;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// Method visibility as declared by the descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Callable by the tool
    Public,
    /// Helper method, never a target
    Private,
}

/// Metadata of one descriptor method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    /// Method name
    pub name: String,
    /// Declared visibility
    pub visibility: Visibility,
    /// Carries the target marker
    pub is_target: bool,
    /// Marked as the explicit default target
    pub is_default: bool,
    /// Number of declared parameters
    pub parameter_count: usize,
    /// Whether the return type is an action
    pub returns_action: bool,
}

impl MethodInfo {
    /// Public, parameterless target returning an action
    #[must_use]
    pub fn target(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visibility: Visibility::Public,
            is_target: true,
            is_default: false,
            parameter_count: 0,
            returns_action: true,
        }
    }

    /// Like [`target`](Self::target), marked as the default
    #[must_use]
    pub fn default_target(name: impl Into<String>) -> Self {
        Self {
            is_default: true,
            ..Self::target(name)
        }
    }

    /// Method without the target marker
    #[must_use]
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            is_target: false,
            ..Self::target(name)
        }
    }

    /// Replace the visibility
    #[must_use]
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Replace the parameter count
    #[must_use]
    pub fn with_parameters(mut self, count: usize) -> Self {
        self.parameter_count = count;
        self
    }

    /// Replace whether an action is returned
    #[must_use]
    pub fn returning_action(mut self, returns_action: bool) -> Self {
        self.returns_action = returns_action;
        self
    }

    /// Why this method can't be run as a target, if it can't
    #[must_use]
    pub fn contract_violation(&self) -> Option<&'static str> {
        if self.visibility != Visibility::Public {
            Some("it is not public")
        } else if !self.is_target {
            Some("it is not marked as a target")
        } else if self.parameter_count > 0 {
            Some("it takes parameters")
        } else if !self.returns_action {
            Some("it does not return an action")
        } else {
            None
        }
    }

    /// Whether this method can be run as a target
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.contract_violation().is_none()
    }
}

/// Listing entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetInfo {
    /// Target name
    pub name: String,
    /// Would run when no target is given
    pub is_default: bool,
}

/// Target resolution failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetError {
    /// No method has the requested name
    #[error("Target \"{0}\" was not found")]
    NotFound(String),

    /// The named method exists but breaks the target contract
    #[error("Method \"{name}\" is not a valid target: {reason}")]
    Invalid {
        /// Requested name
        name: String,
        /// Broken rule
        reason: &'static str,
    },

    /// More than one method is marked as the default
    #[error("More than one default target: {}", .names.join(", "))]
    AmbiguousDefault {
        /// Every default-marked method
        names: Vec<String>,
    },

    /// Neither a default-marked nor a conventionally named target exists
    #[error("No target given, no default target marked and no target named \"{0}\"")]
    NoUsableTarget(String),
}

/// Resolves explicit names and the default target
#[derive(Debug, Clone)]
pub struct TargetResolver {
    conventional: String,
}

impl TargetResolver {
    /// Resolver falling back to targets named `conventional`
    #[must_use]
    pub fn new(conventional: impl Into<String>) -> Self {
        Self {
            conventional: conventional.into(),
        }
    }

    /// Name of the method to run
    ///
    /// # Errors
    ///
    /// See [`TargetError`].
    pub fn resolve<'a>(&self, methods: &'a [MethodInfo], explicit: Option<&str>) -> Result<&'a MethodInfo, TargetError> {
        match explicit {
            Some(name) => {
                let method = methods
                    .iter()
                    .find(|m| m.name == name)
                    .ok_or_else(|| TargetError::NotFound(name.to_string()))?;
                match method.contract_violation() {
                    Some(reason) => Err(TargetError::Invalid {
                        name: name.to_string(),
                        reason,
                    }),
                    None => Ok(method),
                }
            }
            None => self
                .default_target(methods)?
                .ok_or_else(|| TargetError::NoUsableTarget(self.conventional.clone())),
        }
    }

    /// Default target, if one can be chosen
    ///
    /// # Errors
    ///
    /// [`TargetError::AmbiguousDefault`] for two or more default-marked targets.
    pub fn default_target<'a>(&self, methods: &'a [MethodInfo]) -> Result<Option<&'a MethodInfo>, TargetError> {
        let defaults: Vec<&MethodInfo> = methods.iter().filter(|m| m.is_usable() && m.is_default).collect();
        match defaults.as_slice() {
            [] => {}
            [only] => return Ok(Some(only)),
            many => {
                return Err(TargetError::AmbiguousDefault {
                    names: many.iter().map(|m| m.name.clone()).collect(),
                });
            }
        }

        let conventional = methods
            .iter()
            .find(|m| m.is_usable() && m.name == self.conventional);
        if conventional.is_some() {
            debug!("No default target marked, falling back to {}", self.conventional);
        }
        Ok(conventional)
    }

    /// Usable targets sorted by name, with the default one flagged
    ///
    /// An ambiguous default flags nothing.
    #[must_use]
    pub fn list(&self, methods: &[MethodInfo]) -> Vec<TargetInfo> {
        let chosen = match self.default_target(methods) {
            Ok(chosen) => chosen.map(|m| m.name.as_str()),
            Err(e) => {
                warn!("{e}");
                None
            }
        };

        let mut targets: Vec<TargetInfo> = methods
            .iter()
            .filter(|m| m.is_usable())
            .map(|m| TargetInfo {
                name: m.name.clone(),
                is_default: Some(m.name.as_str()) == chosen,
            })
            .collect();
        targets.sort_by(|a, b| a.name.cmp(&b.name));
        targets.dedup_by(|a, b| a.name == b.name);
        targets
    }
}

/// Listing text for `descriptor`, newline terminated
#[must_use]
pub fn render_listing(descriptor: &Path, targets: &[TargetInfo]) -> String {
    if targets.is_empty() {
        return format!("Build file {} contains no build targets.\n", descriptor.display());
    }

    let mut out = format!(
        "Build file {} contains the following build targets:\n",
        descriptor.display()
    );
    for target in targets {
        let marker = if target.is_default { " (default)" } else { "" };
        let _ = writeln!(out, "{}{marker}", target.name);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> TargetResolver {
        TargetResolver::new("build")
    }

    #[test]
    fn test_explicit_default_beats_conventional_name() {
        let methods = vec![MethodInfo::target("build"), MethodInfo::default_target("foo")];
        assert_eq!(resolver().resolve(&methods, None).unwrap().name, "foo");
    }

    #[test]
    fn test_conventional_name_fallback() {
        let methods = vec![MethodInfo::target("jar"), MethodInfo::target("build")];
        assert_eq!(resolver().resolve(&methods, None).unwrap().name, "build");
    }

    #[test]
    fn test_two_defaults_are_ambiguous() {
        let methods = vec![MethodInfo::default_target("b"), MethodInfo::default_target("a")];
        assert_eq!(
            resolver().resolve(&methods, None).unwrap_err(),
            TargetError::AmbiguousDefault {
                names: vec!["b".into(), "a".into()]
            }
        );
    }

    #[test]
    fn test_no_usable_target() {
        let methods = vec![
            MethodInfo::target("jar"),
            MethodInfo::plain("build"),
            MethodInfo::default_target("helper").with_visibility(Visibility::Private),
        ];
        assert_eq!(
            resolver().resolve(&methods, None).unwrap_err(),
            TargetError::NoUsableTarget("build".into())
        );
    }

    #[test]
    fn test_explicit_name_not_found_vs_invalid() {
        let methods = vec![
            MethodInfo::target("jar"),
            MethodInfo::target("configure").with_parameters(1),
            MethodInfo::target("describe").returning_action(false),
        ];
        assert_eq!(resolver().resolve(&methods, Some("jar")).unwrap().name, "jar");
        assert_eq!(
            resolver().resolve(&methods, Some("war")).unwrap_err(),
            TargetError::NotFound("war".into())
        );
        assert_eq!(
            resolver().resolve(&methods, Some("configure")).unwrap_err(),
            TargetError::Invalid {
                name: "configure".into(),
                reason: "it takes parameters"
            }
        );
        assert!(matches!(
            resolver().resolve(&methods, Some("describe")),
            Err(TargetError::Invalid { reason: "it does not return an action", .. })
        ));
    }

    #[test]
    fn test_list_sorted_with_default_flagged() {
        let methods = vec![
            MethodInfo::target("war"),
            MethodInfo::target("build"),
            MethodInfo::plain("helper"),
            MethodInfo::target("clean"),
        ];
        let listed = resolver().list(&methods);
        let names: Vec<&str> = listed.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["build", "clean", "war"]);
        assert!(listed[0].is_default);
        assert!(!listed[1].is_default);
    }

    #[test]
    fn test_render_listing() {
        let targets = vec![
            TargetInfo {
                name: "build".into(),
                is_default: true,
            },
            TargetInfo {
                name: "clean".into(),
                is_default: false,
            },
        ];
        assert_eq!(
            render_listing(Path::new("bob/Default.java"), &targets),
            "Build file bob/Default.java contains the following build targets:\nbuild (default)\nclean\n"
        );
        assert_eq!(
            render_listing(Path::new("bob/Default.java"), &[]),
            "Build file bob/Default.java contains no build targets.\n"
        );
    }
}
