//! Supported languages and the static table that routes them.
//!
//! The table is resolved once from configuration and then only read: it maps
//! every language to the version string sent to the remote service and to the
//! class that decides which component executes it.

use crate::errors::PlaygroundError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    JavaScript,
    TypeScript,
    Python,
    Java,
    CSharp,
    Php,
    C,
    Cpp,
    Html,
    Css,
}

impl Language {
    pub const ALL: [Language; 10] = [
        Language::JavaScript,
        Language::TypeScript,
        Language::Python,
        Language::Java,
        Language::CSharp,
        Language::Php,
        Language::C,
        Language::Cpp,
        Language::Html,
        Language::Css,
    ];

    /// Identifier used on the wire and in configuration files.
    pub fn id(&self) -> &'static str {
        match self {
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Python => "python",
            Language::Java => "java",
            Language::CSharp => "csharp",
            Language::Php => "php",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Html => "html",
            Language::Css => "css",
        }
    }

    /// How this language can be rendered visually, if at all.
    pub fn preview_kind(&self) -> Option<PreviewKind> {
        match self {
            Language::Html => Some(PreviewKind::Document),
            Language::Css => Some(PreviewKind::Style),
            Language::JavaScript => Some(PreviewKind::Script),
            _ => None,
        }
    }

    pub fn from_extension(path: &Path) -> Option<Language> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "js" | "mjs" | "cjs" => Some(Language::JavaScript),
            "ts" => Some(Language::TypeScript),
            "py" => Some(Language::Python),
            "java" => Some(Language::Java),
            "cs" => Some(Language::CSharp),
            "php" => Some(Language::Php),
            "c" | "h" => Some(Language::C),
            "cpp" | "cc" | "cxx" | "hpp" => Some(Language::Cpp),
            "html" | "htm" => Some(Language::Html),
            "css" => Some(Language::Css),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Language {
    type Err = PlaygroundError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        match normalized.as_str() {
            "js" | "node" => return Ok(Language::JavaScript),
            "ts" => return Ok(Language::TypeScript),
            "py" | "python3" => return Ok(Language::Python),
            "c#" | "cs" => return Ok(Language::CSharp),
            "c++" => return Ok(Language::Cpp),
            _ => {}
        }
        Language::ALL
            .iter()
            .copied()
            .find(|lang| lang.id() == normalized)
            .ok_or_else(|| {
                PlaygroundError::ConfigurationError(format!("Unsupported language: {}", s))
            })
    }
}

/// Routing category of a language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguageClass {
    CompiledRemote,
    ScriptLocal,
    Markup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewKind {
    Document,
    Style,
    Script,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageSpec {
    pub version: String,
    pub class: LanguageClass,
}

impl LanguageSpec {
    fn new(version: &str, class: LanguageClass) -> Self {
        Self {
            version: version.to_string(),
            class,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LanguageTable {
    entries: HashMap<Language, LanguageSpec>,
}

impl Default for LanguageTable {
    fn default() -> Self {
        use LanguageClass::*;

        let entries = HashMap::from([
            (Language::JavaScript, LanguageSpec::new("18.15.0", ScriptLocal)),
            (Language::TypeScript, LanguageSpec::new("5.0.3", CompiledRemote)),
            (Language::Python, LanguageSpec::new("3.10.0", CompiledRemote)),
            (Language::Java, LanguageSpec::new("15.0.2", CompiledRemote)),
            (Language::CSharp, LanguageSpec::new("6.12.0", CompiledRemote)),
            (Language::Php, LanguageSpec::new("8.2.3", CompiledRemote)),
            (Language::C, LanguageSpec::new("10.2.0", CompiledRemote)),
            (Language::Cpp, LanguageSpec::new("10.2.0", CompiledRemote)),
            (Language::Html, LanguageSpec::new("5.0.0", Markup)),
            (Language::Css, LanguageSpec::new("3.0.0", Markup)),
        ]);
        Self { entries }
    }
}

impl LanguageTable {
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn insert(&mut self, language: Language, spec: LanguageSpec) {
        self.entries.insert(language, spec);
    }

    /// Overlay `overrides` on top of this table, entry by entry.
    pub fn merge(&mut self, overrides: &LanguageTable) {
        for (language, spec) in &overrides.entries {
            self.entries.insert(*language, spec.clone());
        }
    }

    pub fn spec(&self, language: Language) -> Result<&LanguageSpec, PlaygroundError> {
        self.entries.get(&language).ok_or_else(|| {
            PlaygroundError::ConfigurationError(format!(
                "No configuration entry for language '{}'",
                language
            ))
        })
    }

    pub fn version_for(&self, language: Language) -> Result<&str, PlaygroundError> {
        self.spec(language).map(|spec| spec.version.as_str())
    }

    pub fn class_of(&self, language: Language) -> Result<LanguageClass, PlaygroundError> {
        self.spec(language).map(|spec| spec.class)
    }

    /// Entries ordered by language.
    pub fn iter(&self) -> impl Iterator<Item = (Language, &LanguageSpec)> {
        let mut entries: Vec<_> = self.entries.iter().map(|(l, s)| (*l, s)).collect();
        entries.sort_by_key(|(l, _)| *l);
        entries.into_iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn validate(&self) -> Result<(), PlaygroundError> {
        for (language, spec) in self.iter() {
            if spec.version.trim().is_empty() {
                return Err(PlaygroundError::ConfigurationError(format!(
                    "Language '{}' has an empty version",
                    language
                )));
            }
            if spec.class == LanguageClass::Markup && language.preview_kind().is_none() {
                return Err(PlaygroundError::ConfigurationError(format!(
                    "Language '{}' cannot be rendered as markup",
                    language
                )));
            }
            if spec.class == LanguageClass::ScriptLocal && language != Language::JavaScript {
                return Err(PlaygroundError::ConfigurationError(format!(
                    "Language '{}' cannot be evaluated locally",
                    language
                )));
            }
        }
        Ok(())
    }
}
