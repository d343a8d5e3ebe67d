use std::collections::HashMap;

use log::debug;

use crate::byte_cursor::ByteCursor;
use crate::error::PsfError;
use crate::section::open_section;
use crate::signal_def::{read_signaldef, SignalDef, TraceElem};
use crate::type_def::TypeDef;

/// The Sweep section: the one signal definition describing the x axis.
///
/// PSF allows a run here, but no analysis writes more than one sweep
/// variable; anything beyond the first is rejected.
pub(crate) struct SweepSection {
    pub sweep: SignalDef,
}

impl SweepSection {
    pub(crate) fn read<'a>(
        cur: ByteCursor<'a>,
        typedefs: &HashMap<u32, TypeDef>,
    ) -> Result<(Self, ByteCursor<'a>), PsfError> {
        let section = open_section(cur)?;
        let mut body = section.body;

        let offset = body.abspos();
        let sweep = match read_signaldef(&mut body, typedefs)? {
            TraceElem::Single(sweep) => sweep,
            TraceElem::Group(_) => return Err(PsfError::UnsupportedSweep { offset }),
        };
        debug!("sweep variable {:?}", sweep.name);

        if body.len() >= 4 && matches!(body.peek_u32()?, 0x10 | 0x11) {
            return Err(PsfError::UnsupportedSweep { offset: body.abspos() });
        }

        Ok((SweepSection { sweep }, section.tail))
    }
}
