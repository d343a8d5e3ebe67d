use byteorder::{BigEndian, ByteOrder};

use crate::error::PsfError;

/// A byte view that remembers its offset relative to the file it was cut from.
///
/// PSF addresses section boundaries and index tables by absolute file
/// position, so every derived cursor keeps the absolute offset of its first
/// byte. All scalar reads are big-endian; strings are length-prefixed and
/// NUL-padded to a four-byte boundary.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ByteCursor<'a> {
    data: &'a [u8],
    abspos: usize,
}

impl<'a> ByteCursor<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        ByteCursor { data, abspos: 0 }
    }

    /// Absolute offset of the cursor's first byte in the original file.
    pub(crate) fn abspos(&self) -> usize {
        self.abspos
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn ensure(&self, needed: usize) -> Result<(), PsfError> {
        if self.data.len() < needed {
            Err(PsfError::Truncated {
                offset: self.abspos,
                needed: needed - self.data.len(),
            })
        } else {
            Ok(())
        }
    }

    fn consume(&mut self, n: usize) {
        self.data = &self.data[n..];
        self.abspos += n;
    }

    /// Returns the subrange `[start, end)` of this cursor, keeping the
    /// absolute offset bookkeeping intact.
    pub(crate) fn sub(&self, start: usize, end: usize) -> Result<Self, PsfError> {
        if start > end || end > self.data.len() {
            return Err(PsfError::Truncated {
                offset: self.abspos + start.min(self.data.len()),
                needed: end.saturating_sub(self.data.len()).max(1),
            });
        }
        Ok(ByteCursor {
            data: &self.data[start..end],
            abspos: self.abspos + start,
        })
    }

    /// Splits the cursor at an absolute file position, returning the two
    /// halves. `abs_pos` must lie within the cursor.
    pub(crate) fn split_at_absolute(&self, abs_pos: usize) -> Result<(Self, Self), PsfError> {
        let rel = abs_pos.checked_sub(self.abspos).ok_or_else(|| PsfError::MalformedSection {
            offset: abs_pos,
            message: format!("split position before cursor start {:#x}", self.abspos),
        })?;
        if rel > self.data.len() {
            return Err(PsfError::Truncated {
                offset: self.abspos + self.data.len(),
                needed: rel - self.data.len(),
            });
        }
        Ok((
            ByteCursor { data: &self.data[..rel], abspos: self.abspos },
            ByteCursor { data: &self.data[rel..], abspos: self.abspos + rel },
        ))
    }

    /// Reads a big-endian `u32` at `pos` (relative to the cursor start)
    /// without consuming anything.
    pub(crate) fn get_u32(&self, pos: usize) -> Result<u32, PsfError> {
        if pos + 4 > self.data.len() {
            return Err(PsfError::Truncated {
                offset: self.abspos + pos.min(self.data.len()),
                needed: (pos + 4) - self.data.len(),
            });
        }
        Ok(BigEndian::read_u32(&self.data[pos..pos + 4]))
    }

    pub(crate) fn peek_u32(&self) -> Result<u32, PsfError> {
        self.get_u32(0)
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, PsfError> {
        let value = self.peek_u32()?;
        self.consume(4);
        Ok(value)
    }

    pub(crate) fn read_i32(&mut self) -> Result<i32, PsfError> {
        self.read_u32().map(|v| v as i32)
    }

    pub(crate) fn read_i8(&mut self) -> Result<i8, PsfError> {
        self.ensure(1)?;
        let value = self.data[0] as i8;
        self.consume(1);
        Ok(value)
    }

    pub(crate) fn read_i64(&mut self) -> Result<i64, PsfError> {
        self.ensure(8)?;
        let value = BigEndian::read_i64(&self.data[..8]);
        self.consume(8);
        Ok(value)
    }

    pub(crate) fn read_f64(&mut self) -> Result<f64, PsfError> {
        self.ensure(8)?;
        let value = BigEndian::read_f64(&self.data[..8]);
        self.consume(8);
        Ok(value)
    }

    pub(crate) fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], PsfError> {
        self.ensure(n)?;
        let bytes = &self.data[..n];
        self.consume(n);
        Ok(bytes)
    }

    pub(crate) fn skip(&mut self, n: usize) -> Result<(), PsfError> {
        self.ensure(n)?;
        self.consume(n);
        Ok(())
    }

    /// Reads a length-prefixed UTF-8 string and its alignment padding.
    ///
    /// The on-disk layout is an `i32` length, the string bytes, then NUL
    /// padding up to the next four-byte boundary. The total number of bytes
    /// consumed is always a multiple of four.
    pub(crate) fn read_string(&mut self) -> Result<String, PsfError> {
        let length_offset = self.abspos;
        let length = self.read_i32()?;
        if length < 0 || length as usize > self.data.len() {
            return Err(PsfError::BadLength {
                offset: length_offset,
                length: length as i64,
            });
        }
        let length = length as usize;
        let string_offset = self.abspos;
        let string = std::str::from_utf8(&self.data[..length])
            .map_err(|_| PsfError::BadEncoding { offset: string_offset })?
            .to_owned();
        self.consume(length);
        self.skip((4 - (length & 3)) & 3)?;
        Ok(string)
    }
}
