use std::os::raw::c_int;

use byteorder::{ByteOrder, LittleEndian};
use log::debug;

use crate::error::PsfError;

/// Size of the header leading every Blosc1 chunk.
pub(crate) const HEADER_SIZE: usize = 16;

/// The Blosc1 chunk header: a version/flags/typesize preamble followed by
/// three little-endian sizes. PSF-XL runs start with `02 01 {01|11} 08`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BloscHeader {
    pub version: u8,
    pub flags: u8,
    pub typesize: u8,
    pub nbytes: u32,
    pub blocksize: u32,
    pub cbytes: u32,
}

pub(crate) fn parse_header(run: &[u8], offset: usize) -> Result<BloscHeader, PsfError> {
    if run.len() < HEADER_SIZE {
        return Err(PsfError::BloscDecompress {
            offset,
            message: format!("run of {} bytes is shorter than the chunk header", run.len()),
        });
    }
    let header = BloscHeader {
        version: run[0],
        flags: run[2],
        typesize: run[3],
        nbytes: LittleEndian::read_u32(&run[4..8]),
        blocksize: LittleEndian::read_u32(&run[8..12]),
        cbytes: LittleEndian::read_u32(&run[12..16]),
    };
    if header.version != 0x02 {
        return Err(PsfError::BloscDecompress {
            offset,
            message: format!("unexpected chunk version {:#04x}", header.version),
        });
    }
    if header.cbytes as usize > run.len() {
        return Err(PsfError::BloscDecompress {
            offset,
            message: format!(
                "chunk declares {} compressed bytes but only {} are present",
                header.cbytes,
                run.len()
            ),
        });
    }
    Ok(header)
}

/// Decompresses one Blosc1 run into its original bytes.
pub(crate) fn decompress(run: &[u8], offset: usize) -> Result<Vec<u8>, PsfError> {
    let header = parse_header(run, offset)?;
    debug!(
        "blosc chunk at {offset:#x}: flags {:#04x}, typesize {}, {} -> {} bytes (blocks of {})",
        header.flags, header.typesize, header.cbytes, header.nbytes, header.blocksize
    );
    let mut out = vec![0u8; header.nbytes as usize];

    // SAFETY: the run holds at least `cbytes` readable bytes (checked above)
    // and `out` holds exactly the `nbytes` the chunk header declares, which
    // is the contract blosc_decompress_ctx verifies against its own copy of
    // the header before writing.
    let written = unsafe {
        blosc_src::blosc_decompress_ctx(
            run.as_ptr().cast(),
            out.as_mut_ptr().cast(),
            out.len(),
            1 as c_int,
        )
    };
    if written != out.len() as c_int {
        return Err(PsfError::BloscDecompress {
            offset,
            message: format!("decompressor returned {written}, expected {}", out.len()),
        });
    }
    Ok(out)
}
