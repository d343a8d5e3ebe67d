use std::collections::HashSet;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use log::{debug, warn};

use crate::blosc;
use crate::error::PsfError;

/// The `.psfxl` sidecar of a PSF-XL index file, read into memory once per
/// signal batch.
///
/// Each signal is stored as a reverse-linked list of compressed chunks; the
/// index file's `psfxl_idx` property points at the last chunk and every
/// chunk names its predecessor, `-1` ending the chain.
pub(crate) struct XlSidecar {
    data: Vec<u8>,
}

/// A decoded chunk marker.
///
/// On disk this is a NUL-terminated ASCII string of colon-separated hex
/// fields following a 0x03 lead-in byte:
///
/// `3:<idx>:<previous>:<npoints>:<csize>:<type>[:<xoffset>.]<xlen>[:<ylen>]`
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ChunkMarker {
    pub idx: i64,
    pub previous: i64,
    pub npoints: i64,
    pub csize: i64,
    pub chunk_type: i64,
    pub xoffset: Option<i64>,
    pub xlen: i64,
    pub ylen: Option<i64>,
    /// First byte of the payload: the next 8-byte boundary after the NUL.
    pub value_start: usize,
}

/// One decoded chunk: its sample vectors and the offset of its predecessor.
struct XlChunk {
    x: Vec<f64>,
    y: Vec<f64>,
    previous: i64,
}

/// Parses a hex field as a signed 64-bit integer.
///
/// Fields are written without leading zeros, except that negative values
/// occupy the full sixteen digits; only those can carry the sign bit.
fn hex_signed(field: &str, offset: usize) -> Result<i64, PsfError> {
    if field.is_empty() || field.len() > 16 {
        return Err(PsfError::BadMarker {
            offset,
            message: format!("hex field {field:?} out of range"),
        });
    }
    u64::from_str_radix(field, 16)
        .map(|v| v as i64)
        .map_err(|_| PsfError::BadMarker {
            offset,
            message: format!("invalid hex field {field:?}"),
        })
}

pub(crate) fn parse_marker(data: &[u8], offset: usize) -> Result<ChunkMarker, PsfError> {
    // The marker string starts one byte past the chunk offset; the 0x03
    // lead-in is not part of it.
    let start = offset + 1;
    if start >= data.len() {
        return Err(PsfError::Truncated { offset, needed: 1 });
    }
    let nul = data[start..]
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| PsfError::BadMarker {
            offset,
            message: String::from("unterminated marker"),
        })?;
    let text = std::str::from_utf8(&data[start..start + nul]).map_err(|_| PsfError::BadMarker {
        offset,
        message: String::from("marker is not ASCII"),
    })?;
    let text = text.trim_end_matches('\n');

    let fields: Vec<&str> = text.split(':').collect();
    if !(7..=8).contains(&fields.len()) || fields[0] != "3" {
        return Err(PsfError::BadMarker {
            offset,
            message: format!("unexpected marker layout {text:?}"),
        });
    }

    let (xoffset, xlen) = match fields[6].split_once('.') {
        Some((xo, xl)) => (Some(hex_signed(xo, offset)?), hex_signed(xl, offset)?),
        None => (None, hex_signed(fields[6], offset)?),
    };
    let ylen = match fields.get(7) {
        Some(field) => Some(hex_signed(field, offset)?),
        None => None,
    };

    let after_nul = start + nul + 1;
    Ok(ChunkMarker {
        idx: hex_signed(fields[1], offset)?,
        previous: hex_signed(fields[2], offset)?,
        npoints: hex_signed(fields[3], offset)?,
        csize: hex_signed(fields[4], offset)?,
        chunk_type: hex_signed(fields[5], offset)?,
        xoffset,
        xlen,
        ylen,
        value_start: (after_nul + 7) & !7,
    })
}

/// Reinterprets decompressed payload bytes as little-endian doubles.
fn doubles_from_le(bytes: &[u8], offset: usize) -> Result<Vec<f64>, PsfError> {
    if bytes.len() % 8 != 0 {
        return Err(PsfError::BloscDecompress {
            offset,
            message: format!("payload of {} bytes is not whole doubles", bytes.len()),
        });
    }
    Ok(bytes.chunks_exact(8).map(LittleEndian::read_f64).collect())
}

impl XlSidecar {
    /// Opens the sidecar paired with a primary file: same directory, same
    /// name with `.psfxl` appended.
    pub(crate) fn open(primary: &Path) -> Result<Self, PsfError> {
        let mut name = primary.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".psfxl");
        let path = primary.with_file_name(name);
        if !path.exists() {
            return Err(PsfError::SidecarMissing(path));
        }
        let data = std::fs::read(&path)?;
        debug!("opened sidecar {} ({} bytes)", path.display(), data.len());
        Ok(XlSidecar { data })
    }

    fn slice(&self, start: i64, len: i64, offset: usize) -> Result<&[u8], PsfError> {
        if start < 0 || len < 0 {
            return Err(PsfError::BadMarker {
                offset,
                message: format!("negative payload range {start}+{len}"),
            });
        }
        let (start, len) = (start as usize, len as usize);
        if start + len > self.data.len() {
            return Err(PsfError::Truncated {
                offset: self.data.len(),
                needed: start + len - self.data.len(),
            });
        }
        Ok(&self.data[start..start + len])
    }

    /// Reads and decodes the chunk whose marker sits at `offset`.
    fn read_chunk(&self, offset: usize) -> Result<XlChunk, PsfError> {
        let marker = parse_marker(&self.data, offset)?;

        // 0x20 has been observed in the wild but never characterized;
        // refuse it (and anything else unknown) before touching the payload.
        if !matches!(marker.chunk_type, 0x22 | 0xa2 | 0xa0) {
            return Err(PsfError::UnsupportedChunkType {
                offset,
                chunk_type: marker.chunk_type,
            });
        }

        // The x vector is always a Blosc run: either inline at the payload
        // start, or behind the marker at `offset - xoffset`.
        let x_start = match marker.xoffset {
            Some(xo) => offset as i64 - xo,
            None => marker.value_start as i64,
        };
        let x_bytes = self.slice(x_start, marker.xlen, offset)?;
        let x = doubles_from_le(&blosc::decompress(x_bytes, x_start as usize)?, x_start as usize)?;
        if marker.npoints >= 0 && x.len() as i64 != marker.npoints {
            warn!(
                "chunk {} at {offset:#x} declares {} points but holds {}",
                marker.idx,
                marker.npoints,
                x.len()
            );
        }

        let y = match marker.chunk_type {
            // x and y stored back to back at the payload start
            0x22 => {
                let ylen = marker.ylen.ok_or_else(|| PsfError::BadMarker {
                    offset,
                    message: String::from("chunk type 0x22 without a y length"),
                })?;
                let y_start = marker.value_start as i64 + marker.xlen;
                let y_bytes = self.slice(y_start, ylen, offset)?;
                doubles_from_le(&blosc::decompress(y_bytes, y_start as usize)?, y_start as usize)?
            }
            // x behind the marker, y at the payload start
            0xa2 => {
                let ylen = marker.ylen.ok_or_else(|| PsfError::BadMarker {
                    offset,
                    message: String::from("chunk type 0xa2 without a y length"),
                })?;
                let y_bytes = self.slice(marker.value_start as i64, ylen, offset)?;
                doubles_from_le(
                    &blosc::decompress(y_bytes, marker.value_start)?,
                    marker.value_start,
                )?
            }
            // uncompressed y: a broadcast literal, or raw doubles
            0xa0 => {
                let y_bytes = self.slice(marker.value_start as i64, marker.csize, offset)?;
                if marker.csize == 8 {
                    vec![LittleEndian::read_f64(y_bytes); x.len()]
                } else {
                    doubles_from_le(y_bytes, marker.value_start)?
                }
            }
            other => {
                return Err(PsfError::UnsupportedChunkType {
                    offset,
                    chunk_type: other,
                })
            }
        };

        Ok(XlChunk {
            x,
            y,
            previous: marker.previous,
        })
    }

    /// Rebuilds a signal starting from the offset of its last chunk.
    ///
    /// Chunks are collected iteratively along the `previous` chain and then
    /// materialized in reverse to produce the forward-time vectors.
    pub(crate) fn read_signal(&self, offset: i64) -> Result<(Vec<f64>, Vec<f64>), PsfError> {
        let mut chunks = Vec::new();
        let mut seen = HashSet::new();
        let mut next = offset;

        while next != -1 {
            if next < 0 || !seen.insert(next) {
                return Err(PsfError::BadMarker {
                    offset: next.max(0) as usize,
                    message: String::from("chunk chain does not terminate"),
                });
            }
            let chunk = self.read_chunk(next as usize)?;
            next = chunk.previous;
            chunks.push(chunk);
        }
        debug!("read {} chunks", chunks.len());

        let total: usize = chunks.iter().map(|c| c.x.len()).sum();
        let mut x = Vec::with_capacity(total);
        let mut y = Vec::with_capacity(total);
        for chunk in chunks.iter().rev() {
            x.extend_from_slice(&chunk.x);
            y.extend_from_slice(&chunk.y);
        }
        Ok((x, y))
    }
}
