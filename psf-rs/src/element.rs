use crate::byte_cursor::ByteCursor;
use crate::error::PsfError;

/// The header every named element shares: a leader (0x10 single / 0x11
/// group), an id and a name.
pub(crate) struct ElementHeader {
    pub id: u32,
    pub name: String,
    pub is_group: bool,
}

pub(crate) fn read_element_header(cur: &mut ByteCursor) -> Result<ElementHeader, PsfError> {
    let offset = cur.abspos();
    let kind = cur.read_u32()?;
    let is_group = match kind {
        0x10 => false,
        0x11 => true,
        _ => {
            return Err(PsfError::MalformedSection {
                offset,
                message: format!("unexpected element leader {kind:#x}"),
            })
        }
    };
    let id = cur.read_u32()?;
    let name = cur.read_string()?;
    Ok(ElementHeader { id, name, is_group })
}

/// Whether a run of elements continues at the cursor.
///
/// 0x10/0x11 leaders keep the run going, end-of-data or 0x03 terminate it,
/// anything else is malformed.
pub(crate) fn run_continues(cur: &ByteCursor) -> Result<bool, PsfError> {
    if cur.is_empty() {
        return Ok(false);
    }
    match cur.peek_u32()? {
        0x03 => Ok(false),
        0x10 | 0x11 => Ok(true),
        other => Err(PsfError::MalformedSection {
            offset: cur.abspos(),
            message: format!("unexpected element leader {other:#x}"),
        }),
    }
}
