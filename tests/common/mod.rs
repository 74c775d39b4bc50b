//! Shared test support: synthesizes minimal-but-well-formed PE images so
//! the end-to-end tests need no checked-in binary fixtures.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

pub const NX_COMPAT: u16 = 0x0100;
pub const DYNAMIC_BASE: u16 = 0x0040;
pub const HARDENED: u16 = NX_COMPAT | DYNAMIC_BASE;

pub const SUBSYSTEM_NATIVE: u16 = 0x0001;
pub const SUBSYSTEM_CONSOLE: u16 = 0x0003;

/// Rich-header record: (product id, build number, use count).
pub type RichEntry = (u16, u16, u32);

/// The MSVC C++ compiler product id from the VS2015+ block, paired with a
/// build recent enough to satisfy the default BV2006 minimums.
pub const MODERN_CPP: RichEntry = (0x0105, 27034, 8);
/// Same product, a build older than the default minimums.
pub const ANCIENT_CPP: RichEntry = (0x0105, 21005, 8);
pub const LINKER: RichEntry = (0x0102, 27034, 1);

#[derive(Clone)]
pub struct PeSpec {
    pub bits64: bool,
    pub image_base: u64,
    pub dll_characteristics: u16,
    pub subsystem: u16,
    pub entry_point: u32,
    pub dll: bool,
    pub rich: Vec<RichEntry>,
}

impl Default for PeSpec {
    fn default() -> Self {
        Self {
            bits64: true,
            image_base: 0x0000_0001_4000_0000,
            dll_characteristics: HARDENED,
            subsystem: SUBSYSTEM_CONSOLE,
            entry_point: 0x1000,
            dll: false,
            rich: vec![MODERN_CPP, LINKER],
        }
    }
}

impl PeSpec {
    pub fn with_base(mut self, image_base: u64) -> Self {
        self.image_base = image_base;
        self
    }

    pub fn bits32(mut self) -> Self {
        self.bits64 = false;
        self.image_base = 0x0040_0000;
        self
    }

    pub fn kernel_mode(mut self) -> Self {
        self.subsystem = SUBSYSTEM_NATIVE;
        self
    }

    pub fn resource_only(mut self) -> Self {
        self.dll = true;
        self.entry_point = 0;
        self
    }

    pub fn characteristics(mut self, dll_characteristics: u16) -> Self {
        self.dll_characteristics = dll_characteristics;
        self
    }

    pub fn rich(mut self, rich: Vec<RichEntry>) -> Self {
        self.rich = rich;
        self
    }
}

fn push_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn push_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn push_u64(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn rich_blob(key: u32, entries: &[RichEntry]) -> Vec<u8> {
    let mut blob = Vec::new();
    push_u32(&mut blob, 0x536e_6144 ^ key); // DanS
    for _ in 0..3 {
        push_u32(&mut blob, key); // padding
    }
    for &(product_id, build, count) in entries {
        let id = (u32::from(product_id) << 16) | u32::from(build);
        push_u32(&mut blob, id ^ key);
        push_u32(&mut blob, count ^ key);
    }
    blob.extend_from_slice(b"Rich");
    push_u32(&mut blob, key);
    blob
}

/// Build a complete, goblin-parseable PE image from the spec.
pub fn build_pe(spec: &PeSpec) -> Vec<u8> {
    let mut image = Vec::new();

    // DOS header: MZ magic, e_lfanew patched below.
    image.extend_from_slice(b"MZ");
    image.resize(0x40, 0);

    if !spec.rich.is_empty() {
        let blob = rich_blob(0x5a4d_1337, &spec.rich);
        image.extend_from_slice(&blob);
    }

    let pe_offset = image.len() as u32;
    image[0x3c..0x40].copy_from_slice(&pe_offset.to_le_bytes());

    image.extend_from_slice(b"PE\0\0");

    // COFF header.
    push_u16(&mut image, if spec.bits64 { 0x8664 } else { 0x014c });
    push_u16(&mut image, 1); // one section
    push_u32(&mut image, 0); // timestamp
    push_u32(&mut image, 0); // symbol table
    push_u32(&mut image, 0); // symbol count
    push_u16(&mut image, if spec.bits64 { 240 } else { 224 });
    let mut characteristics: u16 = 0x0002; // EXECUTABLE_IMAGE
    if spec.dll {
        characteristics |= 0x2000; // DLL
    }
    push_u16(&mut image, characteristics);

    // Optional header.
    push_u16(&mut image, if spec.bits64 { 0x20b } else { 0x10b });
    image.push(14); // linker major
    image.push(0); // linker minor
    push_u32(&mut image, 0x200); // size of code
    push_u32(&mut image, 0); // size of initialized data
    push_u32(&mut image, 0); // size of uninitialized data
    push_u32(&mut image, spec.entry_point);
    push_u32(&mut image, 0x1000); // base of code
    if spec.bits64 {
        push_u64(&mut image, spec.image_base);
    } else {
        push_u32(&mut image, 0x2000); // base of data
        push_u32(&mut image, spec.image_base as u32);
    }
    push_u32(&mut image, 0x1000); // section alignment
    push_u32(&mut image, 0x200); // file alignment
    push_u16(&mut image, 6); // os major
    push_u16(&mut image, 0);
    push_u16(&mut image, 0); // image version
    push_u16(&mut image, 0);
    push_u16(&mut image, 6); // subsystem version
    push_u16(&mut image, 0);
    push_u32(&mut image, 0); // win32 version
    push_u32(&mut image, 0x2000); // size of image
    push_u32(&mut image, 0x200); // size of headers
    push_u32(&mut image, 0); // checksum
    push_u16(&mut image, spec.subsystem);
    push_u16(&mut image, spec.dll_characteristics);
    if spec.bits64 {
        push_u64(&mut image, 0x100000); // stack reserve
        push_u64(&mut image, 0x1000);
        push_u64(&mut image, 0x100000); // heap reserve
        push_u64(&mut image, 0x1000);
    } else {
        push_u32(&mut image, 0x100000);
        push_u32(&mut image, 0x1000);
        push_u32(&mut image, 0x100000);
        push_u32(&mut image, 0x1000);
    }
    push_u32(&mut image, 0); // loader flags
    push_u32(&mut image, 16); // data directory count
    for _ in 0..16 {
        push_u32(&mut image, 0);
        push_u32(&mut image, 0);
    }

    // One empty .text section header.
    image.extend_from_slice(b".text\0\0\0");
    push_u32(&mut image, 0x1000); // virtual size
    push_u32(&mut image, 0x1000); // virtual address
    push_u32(&mut image, 0); // raw size
    push_u32(&mut image, 0); // raw pointer
    push_u32(&mut image, 0); // relocations
    push_u32(&mut image, 0); // line numbers
    push_u16(&mut image, 0);
    push_u16(&mut image, 0);
    push_u32(&mut image, 0x6000_0020); // code | execute | read

    image
}

pub fn write_pe(dir: &Path, name: &str, spec: &PeSpec) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, build_pe(spec)).unwrap();
    path
}

/// An MZ stub whose PE pointer runs past the end of the file: bounded
/// hostile input that must load-error, not panic.
pub fn write_truncated_pe(dir: &Path, name: &str) -> PathBuf {
    let mut data = vec![0u8; 0x40];
    data[0] = b'M';
    data[1] = b'Z';
    data[0x3c] = 0x80;
    let path = dir.join(name);
    fs::write(&path, data).unwrap();
    path
}
