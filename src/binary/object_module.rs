//! Per-object-module compiler and toolchain metadata.
//!
//! Records describe how each translation unit that went into a binary was
//! produced: which tool, which front-end/back-end versions, and whether
//! compile-time security instrumentation was enabled. The binary model only
//! consumes these records; producing them is the job of a provider such as
//! the Rich-header decoder in [`crate::binary::rich`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Source language of an object module, as far as the toolchain records it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    C,
    Cxx,
    Masm,
    Rc,
    Link,
    Unknown,
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Language::C => "C",
            Language::Cxx => "C++",
            Language::Masm => "MASM",
            Language::Rc => "RC",
            Language::Link => "LINK",
            Language::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// A four-part toolchain version (major.minor.patch.build), ordered.
/// Serializes as its dotted string form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ToolVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
    pub build: u16,
}

impl Serialize for ToolVersion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ToolVersion {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

impl ToolVersion {
    pub const fn new(major: u16, minor: u16, patch: u16, build: u16) -> Self {
        Self { major, minor, patch, build }
    }
}

impl fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.major, self.minor, self.patch, self.build)
    }
}

impl FromStr for ToolVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = [0u16; 4];
        let mut count = 0;
        for piece in s.split('.') {
            if count >= 4 {
                return Err(format!("too many components in version '{s}'"));
            }
            parts[count] = piece
                .parse::<u16>()
                .map_err(|_| format!("invalid version component '{piece}' in '{s}'"))?;
            count += 1;
        }
        if count == 0 {
            return Err("empty version string".to_string());
        }
        Ok(Self::new(parts[0], parts[1], parts[2], parts[3]))
    }
}

/// Metadata for one object module linked into a binary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObjectModuleDetails {
    /// Object file name, when recoverable (Rich-header records carry none).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Containing static library, when recoverable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library: Option<String>,
    /// Human-readable tool name (e.g. "MSVC C++ compiler").
    pub compiler_name: String,
    pub front_end_version: ToolVersion,
    pub back_end_version: ToolVersion,
    /// Recorded compiler command line, when recoverable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_line: Option<String>,
    pub language: Language,
    /// Compile-time security instrumentation (/GS or equivalent) observed.
    pub has_security_checks: bool,
    pub has_debug_info: bool,
}

impl ObjectModuleDetails {
    /// A record with only toolchain identity, as produced from embedded
    /// linker metadata where per-module names are not available.
    pub fn from_toolchain(
        compiler_name: impl Into<String>,
        version: ToolVersion,
        language: Language,
    ) -> Self {
        Self {
            name: None,
            library: None,
            compiler_name: compiler_name.into(),
            front_end_version: version,
            back_end_version: version,
            command_line: None,
            language,
            has_security_checks: false,
            has_debug_info: false,
        }
    }
}
