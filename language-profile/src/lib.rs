//! The closed set of supported languages and everything the sandbox needs
//! to know about each one.
//!
//! This is the only place allowed to branch on language: image, source
//! filename and the compile/run command lines all come from here, so adding
//! a language is a one-row change.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Raised when a submission carries a language tag outside the supported set.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported language: {0}")]
pub struct UnsupportedLanguage(pub String);

/// A supported submission language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Cpp,
    Java,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Python, Language::Cpp, Language::Java];

    /// The wire tag, also used as the `language` column value.
    pub fn as_str(self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Cpp => "cpp",
            Language::Java => "java",
        }
    }

    /// Container image the submission runs in.
    pub fn image(self) -> &'static str {
        match self {
            Language::Python => "python:3.9",
            Language::Cpp => "gcc:15.1",
            Language::Java => "openjdk:11",
        }
    }

    /// Filename the source is written to under `/workspace`.
    pub fn source_filename(self) -> &'static str {
        match self {
            Language::Python => "solution.py",
            Language::Cpp => "solution.cpp",
            Language::Java => "Solution.java",
        }
    }

    /// Compile command, if the language needs one.
    pub fn compile_command(self) -> Option<&'static str> {
        match self {
            Language::Python => None,
            Language::Cpp => Some(
                "g++ -O1 --param=ggc-min-expand=20 --param=ggc-min-heapsize=8192 \
                 /workspace/solution.cpp -o /workspace/solution",
            ),
            Language::Java => Some("javac /workspace/Solution.java"),
        }
    }

    /// Command a test case is piped into.
    pub fn run_command(self) -> &'static str {
        match self {
            Language::Python => "python3 /workspace/solution.py",
            Language::Cpp => "/workspace/solution",
            Language::Java => "java -cp /workspace Solution",
        }
    }
}

impl FromStr for Language {
    type Err = UnsupportedLanguage;

    fn from_str(tag: &str) -> Result<Language, UnsupportedLanguage> {
        match tag {
            "python" => Ok(Language::Python),
            "cpp" => Ok(Language::Cpp),
            "java" => Ok(Language::Java),
            other => Err(UnsupportedLanguage(other.to_string())),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip() {
        for lang in Language::ALL {
            assert_eq!(lang.as_str().parse::<Language>().unwrap(), lang);
        }
    }

    #[test]
    fn unknown_tags_are_rejected() {
        for tag in ["c++", "Python", "rust", "", "node"] {
            let err = tag.parse::<Language>().unwrap_err();
            assert_eq!(err, UnsupportedLanguage(tag.to_string()));
        }
    }

    #[test]
    fn python_runs_without_compiling() {
        assert!(Language::Python.compile_command().is_none());
        assert_eq!(
            Language::Python.run_command(),
            "python3 /workspace/solution.py"
        );
    }

    #[test]
    fn compiled_languages_target_workspace() {
        let cpp = Language::Cpp.compile_command().unwrap();
        assert!(cpp.starts_with("g++ "));
        assert!(cpp.ends_with("-o /workspace/solution"));
        assert_eq!(Language::Java.compile_command().unwrap(), "javac /workspace/Solution.java");
    }

    #[test]
    fn images_are_pinned() {
        assert_eq!(Language::Python.image(), "python:3.9");
        assert_eq!(Language::Cpp.image(), "gcc:15.1");
        assert_eq!(Language::Java.image(), "openjdk:11");
    }
}
