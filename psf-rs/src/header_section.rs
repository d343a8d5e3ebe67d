use log::debug;

use crate::byte_cursor::ByteCursor;
use crate::error::PsfError;
use crate::property::{read_properties, Properties};
use crate::section::open_section;

/// The Header section: a single property run with the file-wide metadata.
///
/// `PSF sweeps`, `PSF sweep points` and the optional `PSF window size`
/// decide how the Value section is decoded.
pub(crate) struct HeaderSection {
    pub props: Properties,
}

impl HeaderSection {
    pub(crate) fn read(cur: ByteCursor<'_>) -> Result<(Self, ByteCursor<'_>), PsfError> {
        let section = open_section(cur)?;
        let mut body = section.body;
        let props = read_properties(&mut body)?;
        for (name, value) in props.iter() {
            debug!("header: {name} = {value:?}");
        }
        Ok((HeaderSection { props }, section.tail))
    }
}
