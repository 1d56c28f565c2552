//! Mapping from symbol names to archive entry names

/// How a dotted symbol name is laid out inside an archive
///
/// `org.example.Main` becomes `org/example/Main.class` with the default
/// layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolLayout {
    unit_extension: String,
}

impl SymbolLayout {
    /// Layout with the given unit file extension (without the dot)
    #[must_use]
    pub fn new(unit_extension: impl Into<String>) -> Self {
        Self {
            unit_extension: unit_extension.into().trim_start_matches('.').to_string(),
        }
    }

    /// Unit file extension, without the dot
    #[must_use]
    pub fn unit_extension(&self) -> &str {
        &self.unit_extension
    }

    /// Archive entry that holds `symbol`
    #[must_use]
    pub fn entry_for(&self, symbol: &str) -> String {
        let mut entry = symbol.trim().replace('.', "/");
        if !self.unit_extension.is_empty() {
            entry.push('.');
            entry.push_str(&self.unit_extension);
        }
        entry
    }
}

impl Default for SymbolLayout {
    fn default() -> Self {
        Self::new("class")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let layout = SymbolLayout::default();
        assert_eq!(layout.entry_for("org.example.Main"), "org/example/Main.class");
        assert_eq!(layout.entry_for("Outer$Inner"), "Outer$Inner.class");
    }

    #[test]
    fn test_extension_normalized() {
        let layout = SymbolLayout::new(".unit");
        assert_eq!(layout.unit_extension(), "unit");
        assert_eq!(layout.entry_for("a.b"), "a/b.unit");
        assert_eq!(SymbolLayout::new("").entry_for("a.b"), "a/b");
    }
}
