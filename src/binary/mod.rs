//! Binary model: format detection and the read-only view rules query.
//!
//! Detection is content-based (magic sniffing), never extension-based:
//! the corpus routinely contains renamed and intentionally malformed files.

pub mod object_module;
pub mod pe;
pub mod rich;

use crate::error::LoadError;
use std::fs;
use std::path::Path;
use tracing::debug;

pub use object_module::{Language, ObjectModuleDetails, ToolVersion};
pub use pe::{Bits, PeModel};

/// Binary container formats the loader recognizes. Only PE is modeled in
/// depth today; ELF and Mach-O are detected so rules can skip them with a
/// precise reason instead of an unrecognized-format load error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryFormat {
    Pe,
    Elf,
    MachO,
}

impl BinaryFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryFormat::Pe => "pe",
            BinaryFormat::Elf => "elf",
            BinaryFormat::MachO => "macho",
        }
    }
}

/// Sniff the container format from leading magic bytes.
pub fn detect_format(data: &[u8]) -> Option<BinaryFormat> {
    if data.len() < 4 {
        return None;
    }
    match &data[0..4] {
        [0x7f, b'E', b'L', b'F'] => Some(BinaryFormat::Elf),
        [0xfe, 0xed, 0xfa, 0xce]
        | [0xfe, 0xed, 0xfa, 0xcf]
        | [0xce, 0xfa, 0xed, 0xfe]
        | [0xcf, 0xfa, 0xed, 0xfe]
        | [0xca, 0xfe, 0xba, 0xbe] => Some(BinaryFormat::MachO),
        [b'M', b'Z', ..] => Some(BinaryFormat::Pe),
        _ => None,
    }
}

/// Loaded, immutable view of one target. Owned by its target for the run;
/// shared read-only across every rule that analyzes the target.
#[derive(Debug, Clone)]
pub struct Binary {
    pub format: BinaryFormat,
    pub size_bytes: u64,
    pe: Option<PeModel>,
}

impl Binary {
    /// Read and parse a target. Fails with a [`LoadError`]; malformed but
    /// bounded input never panics.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let metadata = fs::metadata(path).map_err(|e| LoadError::Unreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if !metadata.is_file() {
            return Err(LoadError::NotAFile(path.to_path_buf()));
        }

        let data = fs::read(path).map_err(|e| LoadError::Unreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Self::from_bytes(&data)
    }

    /// Parse from an in-memory byte stream (the loader input is any byte
    /// stream identified by a path; files are just the common case).
    pub fn from_bytes(data: &[u8]) -> Result<Self, LoadError> {
        let format = detect_format(data).ok_or(LoadError::UnrecognizedFormat)?;
        debug!(format = format.as_str(), size = data.len(), "detected container format");

        let pe = match format {
            BinaryFormat::Pe => Some(PeModel::parse(data)?),
            BinaryFormat::Elf | BinaryFormat::MachO => None,
        };

        Ok(Self { format, size_bytes: data.len() as u64, pe })
    }

    /// PE view, when the target is a portable executable.
    pub fn pe(&self) -> Option<&PeModel> {
        self.pe.as_ref()
    }

    pub fn bits(&self) -> Option<Bits> {
        self.pe.as_ref().and_then(|pe| pe.bits)
    }

    pub fn preferred_base(&self) -> Option<u64> {
        self.pe.as_ref().and_then(|pe| pe.preferred_base)
    }

    pub fn is_kernel_mode(&self) -> bool {
        self.pe.as_ref().is_some_and(PeModel::is_kernel_mode)
    }

    pub fn is_resource_only(&self) -> bool {
        self.pe.as_ref().is_some_and(PeModel::is_resource_only)
    }

    pub fn object_modules(&self) -> &[ObjectModuleDetails] {
        self.pe
            .as_ref()
            .map(|pe| pe.object_modules.as_slice())
            .unwrap_or_default()
    }

    /// Wrap an already-parsed PE model. Used by tests and by callers that
    /// source bytes from somewhere other than the filesystem.
    pub fn from_pe(pe: PeModel, size_bytes: u64) -> Self {
        Self { format: BinaryFormat::Pe, size_bytes, pe: Some(pe) }
    }
}
