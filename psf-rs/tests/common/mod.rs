//! Helpers that synthesize binary PSF images byte by byte, so the decoder
//! tests are self-contained.
#![allow(dead_code)]

pub const DOUBLE: u32 = 0x0B;
pub const INT32: u32 = 0x05;
pub const INT8: u32 = 0x01;
pub const STRUCT: u32 = 0x10;

pub fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

pub fn push_f64(out: &mut Vec<u8>, v: f64) {
    out.extend_from_slice(&v.to_be_bytes());
}

pub fn push_string(out: &mut Vec<u8>, s: &str) {
    push_u32(out, s.len() as u32);
    out.extend_from_slice(s.as_bytes());
    out.extend(std::iter::repeat(0u8).take((4 - (s.len() & 3)) & 3));
}

pub fn push_prop_str(out: &mut Vec<u8>, name: &str, value: &str) {
    push_u32(out, 0x21);
    push_string(out, name);
    push_string(out, value);
}

pub fn push_prop_int(out: &mut Vec<u8>, name: &str, value: u32) {
    push_u32(out, 0x22);
    push_string(out, name);
    push_u32(out, value);
}

/// The nameless PSF-XL index tuple (tag 0x24).
pub fn push_prop_xl_index(out: &mut Vec<u8>, signal_index: i64, chunk_offset: i32, point_count: i32) {
    push_u32(out, 0x24);
    out.extend_from_slice(&signal_index.to_be_bytes());
    out.extend_from_slice(&chunk_offset.to_be_bytes());
    out.extend_from_slice(&0i32.to_be_bytes());
    out.extend_from_slice(&point_count.to_be_bytes());
    for v in [0.0f64, 0.0, 0.0, 0.0] {
        push_f64(out, v);
    }
}

/// A primitive type definition, optionally with a `units` property.
pub fn typedef(id: u32, name: &str, type_id: u32, units: Option<&str>) -> Vec<u8> {
    let mut out = Vec::new();
    push_u32(&mut out, 0x10);
    push_u32(&mut out, id);
    push_string(&mut out, name);
    push_u32(&mut out, 0); // definitions carry no reference
    push_u32(&mut out, type_id);
    if let Some(units) = units {
        push_prop_str(&mut out, "units", units);
    }
    out
}

/// A struct type definition with double members.
pub fn struct_typedef(id: u32, name: &str, members: &[(u32, &str)]) -> Vec<u8> {
    let mut out = Vec::new();
    push_u32(&mut out, 0x10);
    push_u32(&mut out, id);
    push_string(&mut out, name);
    push_u32(&mut out, 0);
    push_u32(&mut out, STRUCT);
    for &(member_id, member_name) in members {
        out.extend_from_slice(&typedef(member_id, member_name, DOUBLE, None));
    }
    push_u32(&mut out, 0x12); // struct end
    out
}

/// A single signal definition referencing a declared type.
pub fn signaldef(id: u32, name: &str, type_ref: u32, props: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    push_u32(&mut out, 0x10);
    push_u32(&mut out, id);
    push_string(&mut out, name);
    push_u32(&mut out, type_ref);
    out.extend_from_slice(props);
    out
}

/// A group of single signal definitions.
pub fn groupdef(id: u32, name: &str, children: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    push_u32(&mut out, 0x11);
    push_u32(&mut out, id);
    push_string(&mut out, name);
    push_u32(&mut out, children.len() as u32);
    for child in children {
        out.extend_from_slice(child);
    }
    out
}

/// The body of a Type section: sub-tag, element run, trailing id index.
pub fn type_body(body_start: usize, defs: &[(u32, Vec<u8>)]) -> Vec<u8> {
    let run: Vec<u8> = defs.iter().flat_map(|(_, bytes)| bytes.clone()).collect();
    let index_pos = body_start + 8 + run.len();
    let mut out = Vec::new();
    push_u32(&mut out, 0x16);
    push_u32(&mut out, index_pos as u32);
    out.extend_from_slice(&run);
    push_u32(&mut out, 0x13);
    push_u32(&mut out, (defs.len() * 8) as u32);
    for &(id, _) in defs {
        push_u32(&mut out, id);
        push_u32(&mut out, 0); // offsets are not consulted by the reader
    }
    out
}

/// The body of a Trace section: sub-tag, element run, trailing trace index
/// (one real record and one all-NUL filler record).
pub fn trace_body(body_start: usize, elems: &[Vec<u8>]) -> Vec<u8> {
    let run: Vec<u8> = elems.iter().flat_map(|e| e.clone()).collect();
    let index_pos = body_start + 8 + run.len();
    let mut out = Vec::new();
    push_u32(&mut out, 0x16);
    push_u32(&mut out, index_pos as u32);
    out.extend_from_slice(&run);
    push_u32(&mut out, 0x13);
    push_u32(&mut out, 32);
    out.extend_from_slice(b"AB\0\0");
    push_u32(&mut out, 0x40);
    push_u32(&mut out, 1);
    push_u32(&mut out, 2);
    out.extend_from_slice(&[0u8; 16]); // empty record, skipped
    out
}

/// Assembles a PSF image: the 4-byte signature, then sections, then (for
/// fully indexed files) the TOC and the "Clarissa" footer.
pub struct ImageBuilder {
    bytes: Vec<u8>,
    toc: Vec<(u32, u32)>,
}

impl ImageBuilder {
    pub fn new(signature: u32) -> Self {
        let mut bytes = Vec::new();
        push_u32(&mut bytes, signature);
        ImageBuilder { bytes, toc: Vec::new() }
    }

    /// Appends a section; the callback builds the body given its absolute
    /// start offset (needed for the index positions inside Type/Trace
    /// bodies).
    pub fn section<F>(&mut self, kind: u32, body: F) -> &mut Self
    where
        F: FnOnce(usize) -> Vec<u8>,
    {
        let offset = self.bytes.len();
        self.toc.push((kind, offset as u32));
        let body = body(offset + 8);
        push_u32(&mut self.bytes, 0x15);
        push_u32(&mut self.bytes, (offset + 8 + body.len()) as u32);
        self.bytes.extend_from_slice(&body);
        self
    }

    /// Appends a section whose end offset is the empty-data sentinel.
    pub fn sentinel_section(&mut self, kind: u32) -> &mut Self {
        let offset = self.bytes.len();
        self.toc.push((kind, offset as u32));
        push_u32(&mut self.bytes, 0x15);
        push_u32(&mut self.bytes, 0xFFFF_FFFF);
        self
    }

    /// Finishes a fully indexed file: TOC entries, "Clarissa", data size.
    pub fn finish(mut self) -> Vec<u8> {
        let data_size = self.bytes.len() as u32;
        for &(kind, offset) in &self.toc {
            let mut entry = Vec::new();
            push_u32(&mut entry, kind);
            push_u32(&mut entry, offset);
            self.bytes.extend_from_slice(&entry);
        }
        self.bytes.extend_from_slice(b"Clarissa");
        push_u32(&mut self.bytes, data_size);
        self.bytes
    }

    /// Finishes a PSF-XL index file: no TOC, no footer.
    pub fn finish_index(self) -> Vec<u8> {
        self.bytes
    }
}

/// A header section body with the usual metadata run.
pub fn header_body(sweeps: u32, sweep_points: u32, window_size: Option<u32>) -> Vec<u8> {
    let mut out = Vec::new();
    push_prop_str(&mut out, "PSF version", "1.00");
    push_prop_str(&mut out, "simulator", "spectre");
    push_prop_int(&mut out, "PSF sweeps", sweeps);
    push_prop_int(&mut out, "PSF sweep points", sweep_points);
    if let Some(size) = window_size {
        push_prop_int(&mut out, "PSF window size", size);
    }
    out
}
