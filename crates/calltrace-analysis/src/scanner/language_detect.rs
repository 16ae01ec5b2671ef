//! Language detection from file extension.

use serde::{Deserialize, Serialize};

/// Supported programming languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Language {
    TypeScript,
    JavaScript,
    Python,
    Java,
    CSharp,
    Go,
    Rust,
    Ruby,
    Php,
    Kotlin,
    Cpp,
    C,
    Swift,
    Scala,
}

impl Language {
    /// Detect language from a file extension string.
    pub fn from_extension(ext: Option<&str>) -> Option<Language> {
        match ext? {
            "ts" | "tsx" | "mts" | "cts" => Some(Language::TypeScript),
            "js" | "jsx" | "mjs" | "cjs" => Some(Language::JavaScript),
            "py" | "pyi" => Some(Language::Python),
            "java" => Some(Language::Java),
            "cs" => Some(Language::CSharp),
            "go" => Some(Language::Go),
            "rs" => Some(Language::Rust),
            "rb" | "rake" | "gemspec" => Some(Language::Ruby),
            "php" => Some(Language::Php),
            "kt" | "kts" => Some(Language::Kotlin),
            "cpp" | "cc" | "cxx" | "hpp" | "hxx" | "hh" => Some(Language::Cpp),
            "c" | "h" => Some(Language::C),
            "swift" => Some(Language::Swift),
            "scala" | "sc" => Some(Language::Scala),
            _ => None,
        }
    }

    /// Detect language from a `/`-separated path.
    pub fn from_path(path: &str) -> Option<Language> {
        let file_name = path.rsplit('/').next()?;
        let ext = file_name.rsplit_once('.').map(|(_, ext)| ext);
        Self::from_extension(ext)
    }

    /// Returns all file extensions associated with this language.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Language::TypeScript => &["ts", "tsx", "mts", "cts"],
            Language::JavaScript => &["js", "jsx", "mjs", "cjs"],
            Language::Python => &["py", "pyi"],
            Language::Java => &["java"],
            Language::CSharp => &["cs"],
            Language::Go => &["go"],
            Language::Rust => &["rs"],
            Language::Ruby => &["rb", "rake", "gemspec"],
            Language::Php => &["php"],
            Language::Kotlin => &["kt", "kts"],
            Language::Cpp => &["cpp", "cc", "cxx", "hpp", "hxx", "hh"],
            Language::C => &["c", "h"],
            Language::Swift => &["swift"],
            Language::Scala => &["scala", "sc"],
        }
    }

    /// Stable lowercase identifier used in storage and diagnostics.
    pub fn id(&self) -> &'static str {
        match self {
            Language::TypeScript => "typescript",
            Language::JavaScript => "javascript",
            Language::Python => "python",
            Language::Java => "java",
            Language::CSharp => "csharp",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::Ruby => "ruby",
            Language::Php => "php",
            Language::Kotlin => "kotlin",
            Language::Cpp => "cpp",
            Language::C => "c",
            Language::Swift => "swift",
            Language::Scala => "scala",
        }
    }

    /// Inverse of [`Language::id`].
    pub fn from_id(id: &str) -> Option<Language> {
        ALL_LANGUAGES.iter().copied().find(|l| l.id() == id)
    }

    /// Returns the display name of the language.
    pub fn name(&self) -> &'static str {
        match self {
            Language::TypeScript => "TypeScript",
            Language::JavaScript => "JavaScript",
            Language::Python => "Python",
            Language::Java => "Java",
            Language::CSharp => "C#",
            Language::Go => "Go",
            Language::Rust => "Rust",
            Language::Ruby => "Ruby",
            Language::Php => "PHP",
            Language::Kotlin => "Kotlin",
            Language::Cpp => "C++",
            Language::C => "C",
            Language::Swift => "Swift",
            Language::Scala => "Scala",
        }
    }

    /// Module-path extensions tried, in order, when an import omits one.
    /// TypeScript and JavaScript resolve into each other.
    pub fn import_extensions(&self) -> &'static [&'static str] {
        match self {
            Language::TypeScript | Language::JavaScript => {
                &["ts", "tsx", "js", "jsx", "mts", "mjs", "cts", "cjs"]
            }
            other => other.extensions(),
        }
    }

    /// Index-module file stems tried when an import names a directory.
    pub fn index_modules(&self) -> &'static [&'static str] {
        match self {
            Language::TypeScript | Language::JavaScript => &["index"],
            Language::Python => &["__init__"],
            Language::Rust => &["mod", "lib"],
            _ => &[],
        }
    }

    /// Whether imports name modules with dots rather than slashes.
    pub fn dotted_modules(&self) -> bool {
        matches!(
            self,
            Language::Python | Language::Java | Language::Kotlin | Language::Scala | Language::CSharp
        )
    }
}

pub const ALL_LANGUAGES: [Language; 14] = [
    Language::TypeScript,
    Language::JavaScript,
    Language::Python,
    Language::Java,
    Language::CSharp,
    Language::Go,
    Language::Rust,
    Language::Ruby,
    Language::Php,
    Language::Kotlin,
    Language::Cpp,
    Language::C,
    Language::Swift,
    Language::Scala,
];

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_from_path() {
        assert_eq!(Language::from_path("src/a/b.tsx"), Some(Language::TypeScript));
        assert_eq!(Language::from_path("pkg/__init__.py"), Some(Language::Python));
        assert_eq!(Language::from_path("Makefile"), None);
    }

    #[test]
    fn ids_round_trip() {
        for lang in ALL_LANGUAGES {
            assert_eq!(Language::from_id(lang.id()), Some(lang));
        }
    }
}
