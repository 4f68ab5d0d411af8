use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokens::HeaderKind;

/// Longest include path accepted before the lookup is even attempted.
pub const MAX_PATH_LEN: usize = 260;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputKind {
    Dll,
    #[default]
    ConsoleApplication,
    WindowApplication,
}

impl OutputKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Dll" | "dll" => Some(Self::Dll),
            "ConsoleApplication" | "console" => Some(Self::ConsoleApplication),
            "WindowApplication" | "window" => Some(Self::WindowApplication),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Dll => "Dll",
            Self::ConsoleApplication => "ConsoleApplication",
            Self::WindowApplication => "WindowApplication",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    #[serde(with = "header_name")]
    pub header: HeaderKind,
    pub output: OutputKind,
    pub app_name: String,
    pub version: String,
    pub file_name: String,
    pub main_class_name: String,
    pub library_dir: PathBuf,
    pub base_dir: PathBuf,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            header: HeaderKind::Console,
            output: OutputKind::ConsoleApplication,
            app_name: "TokensApplication".to_string(),
            version: "1.0.0.0".to_string(),
            file_name: "out.tbm".to_string(),
            main_class_name: "Program".to_string(),
            library_dir: PathBuf::from("lib"),
            base_dir: PathBuf::from("."),
        }
    }
}

impl BuildConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(ConfigError::Json)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|err| ConfigError::Io {
            path: path.to_path_buf(),
            err,
        })?;
        Self::from_json(&text)
    }

    /// Module name without the file extension, used when no explicit name is given.
    pub fn module_stem(&self) -> String {
        Path::new(&self.file_name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(&self.file_name)
            .to_string()
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, err: std::io::Error },
    Json(serde_json::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io { path, err } => {
                write!(f, "failed to read config '{}': {err}", path.display())
            }
            ConfigError::Json(err) => write!(f, "invalid config: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// How `finish` decides whether a module gets written out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PersistRule {
    /// Skip build-script and tokens-library headers individually.
    SeparateComparisons,
    /// Compare the header against the bitwise union of both kinds. No header
    /// equals that union, so every module is written.
    CombinedMask,
}

pub const PERSIST_RULE: PersistRule = PersistRule::SeparateComparisons;

impl PersistRule {
    pub fn persists(self, header: HeaderKind) -> bool {
        match self {
            PersistRule::SeparateComparisons => {
                header != HeaderKind::BuildScript && header != HeaderKind::TokensLibrary
            }
            PersistRule::CombinedMask => {
                let mask = HeaderKind::BuildScript as u8 | HeaderKind::TokensLibrary as u8;
                header as u8 != mask
            }
        }
    }
}

pub fn persists(header: HeaderKind) -> bool {
    PERSIST_RULE.persists(header)
}

/// Dotted identifier such as `System.Text` or `MyLib`.
pub fn is_valid_dotted_name(name: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$").ok())
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(name))
}

mod header_name {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};
    use tokens::HeaderKind;

    pub fn serialize<S: Serializer>(header: &HeaderKind, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(header.name())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<HeaderKind, D::Error> {
        let name = String::deserialize(deserializer)?;
        HeaderKind::from_name(&name)
            .ok_or_else(|| D::Error::custom(format!("unknown header kind '{name}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_overrides_only_given_fields() {
        let config = BuildConfig::from_json(r#"{"header": "script", "app_name": "Demo"}"#)
            .expect("config should parse");
        assert_eq!(config.header, HeaderKind::Script);
        assert_eq!(config.app_name, "Demo");
        assert_eq!(config.main_class_name, "Program");
    }

    #[test]
    fn unknown_header_is_rejected() {
        let err = BuildConfig::from_json(r#"{"header": "applet"}"#).expect_err("should fail");
        assert!(err.to_string().contains("applet"));
    }

    #[test]
    fn separate_comparisons_skip_non_output_headers() {
        let rule = PersistRule::SeparateComparisons;
        assert!(rule.persists(HeaderKind::Console));
        assert!(!rule.persists(HeaderKind::BuildScript));
        assert!(!rule.persists(HeaderKind::TokensLibrary));
    }

    #[test]
    fn combined_mask_always_persists() {
        let rule = PersistRule::CombinedMask;
        for byte in 0..=6 {
            let header = HeaderKind::from_byte(byte).expect("valid header byte");
            assert!(rule.persists(header));
        }
    }

    #[test]
    fn dotted_names_are_validated() {
        assert!(is_valid_dotted_name("System.Text"));
        assert!(is_valid_dotted_name("_lib2"));
        assert!(!is_valid_dotted_name(""));
        assert!(!is_valid_dotted_name("a..b"));
        assert!(!is_valid_dotted_name("9lives"));
    }
}
