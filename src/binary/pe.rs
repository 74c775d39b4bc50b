//! PE (Portable Executable) model for hardening checks.
//!
//! Wraps the goblin parse into the small set of typed, queryable properties
//! the rule catalog actually inspects. Everything is computed once at load;
//! the model never re-reads the file.

use crate::binary::object_module::ObjectModuleDetails;
use crate::binary::rich;
use crate::error::LoadError;
use goblin::pe::PE;
use tracing::debug;

// winnt.h subsystem / DllCharacteristics values. goblin exposes the raw
// fields; the bit meanings live here.
pub const IMAGE_SUBSYSTEM_NATIVE: u16 = 0x0001;
pub const IMAGE_DLLCHARACTERISTICS_DYNAMIC_BASE: u16 = 0x0040;
pub const IMAGE_DLLCHARACTERISTICS_NX_COMPAT: u16 = 0x0100;
pub const IMAGE_DLLCHARACTERISTICS_APPCONTAINER: u16 = 0x1000;
pub const IMAGE_DLLCHARACTERISTICS_GUARD_CF: u16 = 0x4000;

/// Bit width of the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bits {
    Bits32,
    Bits64,
}

/// Parsed PE header state relevant to the builtin rules.
///
/// A corrupt-but-bounded image can yield a model whose optional-header
/// fields were not recoverable; those queries return `None` rather than
/// invented values, and `header_unparseable` marks the condition.
#[derive(Debug, Clone)]
pub struct PeModel {
    pub machine: u16,
    pub bits: Option<Bits>,
    pub preferred_base: Option<u64>,
    pub subsystem: Option<u16>,
    pub dll_characteristics: Option<u16>,
    pub entry_point: u32,
    pub is_dll: bool,
    pub import_count: usize,
    pub export_count: usize,
    pub object_modules: Vec<ObjectModuleDetails>,
    /// True when the optional header could not be recovered.
    pub header_unparseable: bool,
}

impl PeModel {
    pub fn parse(data: &[u8]) -> Result<Self, LoadError> {
        let pe = PE::parse(data).map_err(|e| LoadError::Corrupt(e.to_string()))?;

        let pe_offset = pe.header.dos_header.pe_pointer as usize;
        let object_modules = rich::object_modules(data, pe_offset);
        if object_modules.is_empty() {
            debug!("no Rich-header toolchain records recovered");
        }

        let optional = pe.header.optional_header;
        let model = match optional {
            Some(opt) => Self {
                machine: pe.header.coff_header.machine,
                bits: Some(if pe.is_64 { Bits::Bits64 } else { Bits::Bits32 }),
                preferred_base: Some(opt.windows_fields.image_base),
                subsystem: Some(opt.windows_fields.subsystem),
                dll_characteristics: Some(opt.windows_fields.dll_characteristics),
                entry_point: opt.standard_fields.address_of_entry_point as u32,
                is_dll: pe.is_lib,
                import_count: pe.imports.len(),
                export_count: pe.exports.len(),
                object_modules,
                header_unparseable: false,
            },
            // COFF-only images (objects, some corrupt files) keep the
            // well-defined "unparseable" shape.
            None => Self {
                machine: pe.header.coff_header.machine,
                bits: None,
                preferred_base: None,
                subsystem: None,
                dll_characteristics: None,
                entry_point: 0,
                is_dll: pe.is_lib,
                import_count: pe.imports.len(),
                export_count: pe.exports.len(),
                object_modules,
                header_unparseable: true,
            },
        };

        Ok(model)
    }

    pub fn is_64bit(&self) -> bool {
        self.bits == Some(Bits::Bits64)
    }

    /// Kernel-mode images run under the Native subsystem.
    pub fn is_kernel_mode(&self) -> bool {
        self.subsystem == Some(IMAGE_SUBSYSTEM_NATIVE)
    }

    /// Resource-only DLLs carry no entry point and no import/export
    /// surface; they are never mapped executable and most hardening rules
    /// do not apply to them.
    pub fn is_resource_only(&self) -> bool {
        self.is_dll && self.entry_point == 0 && self.import_count == 0 && self.export_count == 0
    }

    pub fn has_characteristic(&self, bit: u16) -> Option<bool> {
        self.dll_characteristics.map(|dc| dc & bit != 0)
    }
}
