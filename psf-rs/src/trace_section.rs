use std::collections::HashMap;

use log::debug;

use crate::byte_cursor::ByteCursor;
use crate::element::run_continues;
use crate::error::PsfError;
use crate::section::open_section;
use crate::signal_def::{read_signaldef, SignalDef, TraceElem};
use crate::type_def::TypeDef;

/// One record of the index trailing the Trace section.
///
/// The meaning of the two extra words is unknown; they are preserved but
/// never interpreted.
#[derive(Debug, Clone)]
pub(crate) struct TraceIndexEntry {
    pub id: String,
    pub offset: u32,
    pub extra1: u32,
    pub extra2: u32,
}

/// The index trailing the Trace section: fixed 16-byte records keyed by a
/// 4-byte ASCII id. Most records are all-NUL filler and are skipped.
#[derive(Debug, Default)]
pub(crate) struct TraceIndex {
    pub entries: Vec<TraceIndexEntry>,
}

impl TraceIndex {
    pub(crate) fn read(cur: &mut ByteCursor) -> Result<Self, PsfError> {
        let tag_offset = cur.abspos();
        let tag = cur.read_u32()?;
        if tag != 0x13 {
            return Err(PsfError::MalformedSection {
                offset: tag_offset,
                message: format!("bad trace index tag {tag:#x}"),
            });
        }
        let size = cur.read_u32()? as usize;
        let end = cur.abspos() + size;

        let mut entries = Vec::new();
        while cur.abspos() < end {
            let id_offset = cur.abspos();
            let raw = cur.read_bytes(4)?;
            let stripped = match raw.iter().position(|&b| b == 0) {
                Some(n) => &raw[..n],
                None => raw,
            };
            let id = std::str::from_utf8(stripped)
                .map_err(|_| PsfError::BadEncoding { offset: id_offset })?
                .to_owned();
            let offset = cur.read_u32()?;
            let extra1 = cur.read_u32()?;
            let extra2 = cur.read_u32()?;
            if !id.is_empty() {
                let entry = TraceIndexEntry { id, offset, extra1, extra2 };
                debug!(
                    "trace index {:?} -> {:#x} ({}, {})",
                    entry.id, entry.offset, entry.extra1, entry.extra2
                );
                entries.push(entry);
            }
        }
        Ok(TraceIndex { entries })
    }
}

/// The Trace section: the declared signals (possibly grouped).
///
/// Same layout as the Type section, except the entries are references to
/// typedefs instead of definitions, and the trailing index is a
/// [`TraceIndex`].
#[derive(Debug)]
pub(crate) struct TraceSection {
    pub elems: Vec<TraceElem>,
}

impl TraceSection {
    pub(crate) fn read<'a>(
        cur: ByteCursor<'a>,
        typedefs: &HashMap<u32, TypeDef>,
    ) -> Result<(Self, ByteCursor<'a>), PsfError> {
        let section = open_section(cur)?;
        let mut body = section.body;

        let sub_offset = body.abspos();
        let sub_tag = body.read_u32()?;
        if sub_tag != 0x16 {
            return Err(PsfError::MalformedSection {
                offset: sub_offset,
                message: format!("bad trace section sub-tag {sub_tag:#x}"),
            });
        }
        let index_pos = body.read_u32()?;
        let (mut trace_data, mut index_data) = body.split_at_absolute(index_pos as usize)?;

        let mut elems = Vec::new();
        while run_continues(&trace_data)? {
            let elem = read_signaldef(&mut trace_data, typedefs)?;
            debug!("trace {} = {:?}", elem.id(), elem.name());
            elems.push(elem);
        }

        let index = TraceIndex::read(&mut index_data)?;
        debug!("trace index holds {} entries", index.entries.len());

        Ok((TraceSection { elems }, section.tail))
    }

    /// All signals in declaration order, with groups flattened one level.
    pub(crate) fn flattened(&self) -> impl Iterator<Item = &SignalDef> {
        self.elems.iter().flat_map(|e| e.signals().iter())
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<&SignalDef> {
        self.flattened().find(|s| s.name == name)
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.flattened().map(|s| s.name.clone()).collect()
    }
}
