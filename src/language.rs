use serde::{Deserialize, Serialize};
use std::path::Path;

/// Source language of a patched file
///
/// Decides how literals are spelled in generated code. Files with an
/// unrecognized extension get JSON-compatible literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    /// Python (.py, .pyi)
    Python,
    /// JavaScript (.js, .mjs, .cjs)
    JavaScript,
    /// TypeScript (.ts, .tsx)
    TypeScript,
    /// Unknown language, JSON literals
    Unknown,
}

impl Language {
    /// Get the file extensions associated with this language
    pub fn extensions(&self) -> &[&str] {
        match self {
            Language::Python => &["py", "pyi"],
            Language::JavaScript => &["js", "mjs", "cjs"],
            Language::TypeScript => &["ts", "tsx"],
            Language::Unknown => &[],
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Language::Python => "Python",
            Language::JavaScript => "JavaScript",
            Language::TypeScript => "TypeScript",
            Language::Unknown => "Unknown",
        }
    }

    pub fn null_literal(&self) -> &'static str {
        match self {
            Language::Python => "None",
            _ => "null",
        }
    }

    pub fn bool_literal(&self, value: bool) -> &'static str {
        match (self, value) {
            (Language::Python, true) => "True",
            (Language::Python, false) => "False",
            (_, true) => "true",
            (_, false) => "false",
        }
    }

    /// Spell a keyword argument of a call
    pub fn keyword_argument(&self, name: &str, code: &str) -> String {
        match self {
            Language::Python => format!("{name}={code}"),
            _ => format!("{name}: {code}"),
        }
    }

    /// Code referencing a value kept in an external store
    pub fn external_reference(&self, location: &str) -> String {
        let quoted = serde_json::Value::String(location.to_string()).to_string();
        format!("external({quoted})")
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Detect the language of a file from its extension
///
/// # Examples
/// ```
/// use snapshot_patch::{Language, detect_language};
/// assert_eq!(detect_language("test_values.py"), Language::Python);
/// assert_eq!(detect_language("values.test.ts"), Language::TypeScript);
/// assert_eq!(detect_language("unknown.xyz"), Language::Unknown);
/// ```
pub fn detect_language<P: AsRef<Path>>(path: P) -> Language {
    let extension = path
        .as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("");

    match extension {
        "py" | "pyi" => Language::Python,
        "js" | "mjs" | "cjs" => Language::JavaScript,
        "ts" | "tsx" => Language::TypeScript,
        _ => Language::Unknown,
    }
}
