use std::collections::HashMap;

use log::{debug, warn};

use crate::byte_cursor::ByteCursor;
use crate::element::run_continues;
use crate::error::PsfError;
use crate::section::open_section;
use crate::type_def::{read_typedef, TypeDef};

/// The id → offset table trailing the Type section.
///
/// Not needed for decoding, but it must parse cleanly; real writers always
/// emit it.
#[derive(Debug, Default)]
pub(crate) struct SectionIndex {
    pub table: Vec<(u32, u32)>,
}

impl SectionIndex {
    pub(crate) fn read(cur: &mut ByteCursor) -> Result<Self, PsfError> {
        let tag_offset = cur.abspos();
        let tag = cur.read_u32()?;
        if tag != 0x13 {
            return Err(PsfError::MalformedSection {
                offset: tag_offset,
                message: format!("bad index tag {tag:#x}"),
            });
        }
        let size = cur.read_u32()? as usize;
        let end = cur.abspos() + size;

        let mut table = Vec::new();
        while cur.abspos() < end {
            let id = cur.read_u32()?;
            let pos = cur.read_u32()?;
            table.push((id, pos));
        }
        Ok(SectionIndex { table })
    }
}

/// The Type section: a run of type definitions plus its trailing index.
pub(crate) struct TypeSection {
    pub typedefs: HashMap<u32, TypeDef>,
}

impl TypeSection {
    pub(crate) fn read(cur: ByteCursor<'_>) -> Result<(Self, ByteCursor<'_>), PsfError> {
        let section = open_section(cur)?;
        let mut body = section.body;

        let sub_offset = body.abspos();
        let sub_tag = body.read_u32()?;
        if sub_tag != 0x16 {
            return Err(PsfError::MalformedSection {
                offset: sub_offset,
                message: format!("bad type section sub-tag {sub_tag:#x}"),
            });
        }
        let index_pos = body.read_u32()?;
        let (mut type_data, mut index_data) = body.split_at_absolute(index_pos as usize)?;

        let mut typedefs = HashMap::new();
        while run_continues(&type_data)? {
            let def = read_typedef(&mut type_data)?;
            debug!("type {} = {:?} ({:?})", def.id, def.name, def.type_id);
            if typedefs.insert(def.id, def).is_some() {
                warn!("type id declared twice, keeping the last definition");
            }
        }

        let index = SectionIndex::read(&mut index_data)?;
        debug!("type index holds {} entries", index.table.len());

        Ok((TypeSection { typedefs }, section.tail))
    }
}
