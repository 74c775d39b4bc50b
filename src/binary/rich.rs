//! Rich-header decoding.
//!
//! The undocumented "Rich" header sits between the DOS stub and the PE
//! signature in MSVC-linked images and records, per toolchain component, a
//! product id and build number. It is the only object-module provenance
//! embedded in the image itself (full per-module detail lives in the PDB,
//! which binvet treats as an external provider), so we decode it into
//! [`ObjectModuleDetails`] records.
//!
//! The header is XOR-masked with a checksum key stored after the plaintext
//! `Rich` marker. Hostile input is expected: any structural irregularity
//! yields an empty record list, never an error.

use crate::binary::object_module::{Language, ObjectModuleDetails, ToolVersion};
use tracing::debug;

const DANS_MARKER: u32 = 0x536e_6144; // "DanS"
const RICH_MARKER: &[u8; 4] = b"Rich";

/// One decoded Rich-header entry: a toolchain component and its use count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RichRecord {
    pub product_id: u16,
    pub build: u16,
    pub count: u32,
}

fn read_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Decode the raw Rich-header records from the region between the DOS
/// header and the PE signature. Returns an empty vec when no well-formed
/// header is present.
pub fn decode_rich_records(data: &[u8], pe_offset: usize) -> Vec<RichRecord> {
    let search_end = pe_offset.min(data.len());
    if search_end < 0x40 + 16 {
        return Vec::new();
    }

    // Locate the plaintext "Rich" marker; the XOR key follows it.
    let mut rich_offset = None;
    let mut cursor = 0x40;
    while cursor + 8 <= search_end {
        if &data[cursor..cursor + 4] == RICH_MARKER {
            rich_offset = Some(cursor);
            break;
        }
        cursor += 4;
    }
    let Some(rich_offset) = rich_offset else {
        return Vec::new();
    };
    let Some(key) = read_u32(data, rich_offset + 4) else {
        return Vec::new();
    };

    // Walk backwards in (id, count) pairs until the masked "DanS" start
    // marker. The three dwords after DanS are key-valued padding and decode
    // to zero; skip them.
    let mut records = Vec::new();
    let mut pos = rich_offset;
    let mut found_start = false;
    while pos >= 0x40 + 8 {
        pos -= 8;
        let (Some(raw_id), Some(raw_count)) = (read_u32(data, pos), read_u32(data, pos + 4)) else {
            break;
        };
        let id = raw_id ^ key;
        let count = raw_count ^ key;
        if id == DANS_MARKER {
            found_start = true;
            break;
        }
        if id == 0 && count == 0 {
            continue; // alignment padding
        }
        records.push(RichRecord {
            product_id: (id >> 16) as u16,
            build: (id & 0xffff) as u16,
            count,
        });
    }

    if !found_start {
        debug!("Rich marker without DanS start; ignoring header");
        return Vec::new();
    }

    records.reverse();
    records
}

/// VS2015-era product-id block. Later toolsets extend the same scheme with
/// consecutive ids, so everything at or above the UTC1900 compilers is
/// treated as the MSVC 19.x family.
const PROD_CVTRES_1400: u16 = 0x00ff;
const PROD_EXPORT_1400: u16 = 0x0100;
const PROD_IMPLIB_1400: u16 = 0x0101;
const PROD_LINKER_1400: u16 = 0x0102;
const PROD_MASM_1400: u16 = 0x0103;
const PROD_UTC1900_C: u16 = 0x0104;
const PROD_UTC1900_CPP: u16 = 0x0105;

fn describe_product(record: &RichRecord) -> (String, Language, ToolVersion) {
    let build = record.build;
    match record.product_id {
        PROD_UTC1900_C => (
            "MSVC C compiler".to_string(),
            Language::C,
            ToolVersion::new(19, 0, build, 0),
        ),
        PROD_UTC1900_CPP => (
            "MSVC C++ compiler".to_string(),
            Language::Cxx,
            ToolVersion::new(19, 0, build, 0),
        ),
        PROD_MASM_1400 => (
            "MSVC macro assembler".to_string(),
            Language::Masm,
            ToolVersion::new(14, 0, build, 0),
        ),
        PROD_LINKER_1400 => (
            "MSVC linker".to_string(),
            Language::Link,
            ToolVersion::new(14, 0, build, 0),
        ),
        PROD_CVTRES_1400 => (
            "MSVC resource converter".to_string(),
            Language::Rc,
            ToolVersion::new(14, 0, build, 0),
        ),
        PROD_EXPORT_1400 | PROD_IMPLIB_1400 => (
            "MSVC import library tool".to_string(),
            Language::Link,
            ToolVersion::new(14, 0, build, 0),
        ),
        other => (
            format!("toolchain product {other:#06x}"),
            Language::Unknown,
            ToolVersion::new(0, 0, build, 0),
        ),
    }
}

/// Turn decoded Rich records into object-module metadata. Import-thunk
/// records (product id 0 or 1, emitted once per imported symbol) carry no
/// compiler provenance and are filtered out.
pub fn object_modules(data: &[u8], pe_offset: usize) -> Vec<ObjectModuleDetails> {
    decode_rich_records(data, pe_offset)
        .iter()
        .filter(|r| r.product_id > 1)
        .map(|record| {
            let (compiler_name, language, version) = describe_product(record);
            ObjectModuleDetails::from_toolchain(compiler_name, version, language)
        })
        .collect()
}
