use crate::byte_cursor::ByteCursor;
use crate::error::PsfError;

/// The section kinds a PSF file is built from, as numbered in the TOC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    Header = 0,
    Type = 1,
    Sweep = 2,
    Trace = 3,
    Value = 4,
}

impl SectionKind {
    pub(crate) fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(SectionKind::Header),
            1 => Some(SectionKind::Type),
            2 => Some(SectionKind::Sweep),
            3 => Some(SectionKind::Trace),
            4 => Some(SectionKind::Value),
            _ => None,
        }
    }
}

/// One TOC entry: where a section starts and how far it runs.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SectionInfo {
    pub kind: SectionKind,
    pub offset: usize,
    pub size: usize,
}

/// End-offset sentinel marking a value section with no data (seen in the
/// primary file of PSF-XL pairs).
pub(crate) const END_SENTINEL: u32 = 0xFFFF_FFFF;

/// A section opened but not yet decoded: the body slice up to the declared
/// end offset, and the tail of the parent cursor after it.
pub(crate) struct RawSection<'a> {
    pub end_abspos: u32,
    pub body: ByteCursor<'a>,
    pub tail: ByteCursor<'a>,
}

/// Opens a section: int32 tag 0x15 followed by the absolute end offset.
///
/// For the `0xFFFFFFFF` end sentinel the body is empty and everything after
/// the two leading words stays in the tail.
pub(crate) fn open_section(cur: ByteCursor<'_>) -> Result<RawSection<'_>, PsfError> {
    let mut cur = cur;
    let tag_offset = cur.abspos();
    let tag = cur.read_u32()?;
    if tag != 0x15 {
        return Err(PsfError::MalformedSection {
            offset: tag_offset,
            message: format!("bad section tag {tag:#x}"),
        });
    }
    let end_abspos = cur.read_u32()?;
    let split_at = if end_abspos == END_SENTINEL {
        cur.abspos()
    } else {
        end_abspos as usize
    };
    let (body, tail) = cur.split_at_absolute(split_at)?;
    Ok(RawSection { end_abspos, body, tail })
}
