use log::warn;

use crate::byte_cursor::ByteCursor;
use crate::error::PsfError;

/// The value of a PSF property. Properties are tagged on disk; tag 0x24 is
/// the nameless PSF-XL index tuple attached to each trace of an index file.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Str(String),
    Int(i32),
    Double(f64),
    XlIndex(XlIndex),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            PropertyValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            PropertyValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_xl_index(&self) -> Option<&XlIndex> {
        match self {
            PropertyValue::XlIndex(v) => Some(v),
            _ => None,
        }
    }
}

/// The PSF-XL index tuple stored under the synthetic property name
/// `psfxl_idx`. `chunk_offset` locates the signal's final chunk inside the
/// `.psfxl` sidecar; the chunks chain backwards from there.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct XlIndex {
    pub signal_index: i64,
    pub chunk_offset: i32,
    pub point_start: i32,
    pub point_count: i32,
    pub t_start: f64,
    pub t_end: f64,
    pub v_min: f64,
    pub v_max: f64,
}

/// An ordered name/value property map.
///
/// Property runs appear in every PSF section; insertion order is the
/// declaration order in the file. Duplicate names are last-write-wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    entries: Vec<(String, PropertyValue)>,
}

impl Properties {
    pub(crate) fn new() -> Self {
        Properties { entries: Vec::new() }
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(PropertyValue::as_str)
    }

    pub fn get_int(&self, name: &str) -> Option<i32> {
        self.get(name).and_then(PropertyValue::as_int)
    }

    pub fn get_double(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(PropertyValue::as_double)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterates over the properties in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts a value, keeping the position of an already-present name.
    pub(crate) fn set(&mut self, name: &str, value: PropertyValue) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some((_, old)) => *old = value,
            None => self.entries.push((name.to_owned(), value)),
        }
    }

    fn insert(&mut self, name: String, value: PropertyValue) {
        if self.contains(&name) {
            warn!("duplicate property {name:?}, keeping the last value");
        }
        self.set(&name, value);
    }
}

/// Reads zero or more tagged properties and returns them in declaration
/// order.
///
/// The run ends at the cursor end or as soon as the next int32 belongs to
/// the enclosing structure: 0x10/0x11 start the next element, 0x12 closes a
/// struct, 0x03 terminates an element run.
pub(crate) fn read_properties(cur: &mut ByteCursor) -> Result<Properties, PsfError> {
    let mut props = Properties::new();

    while !cur.is_empty() && !matches!(cur.peek_u32()?, 0x03 | 0x10 | 0x11 | 0x12) {
        let tag_offset = cur.abspos();
        let tag = cur.read_u32()?;

        // The PSF-XL index tuple is the one property kind without a name.
        let name = if tag == 0x24 {
            String::from("psfxl_idx")
        } else {
            cur.read_string()?
        };

        let value = match tag {
            // Padding entries; the name has been consumed, nothing follows.
            0x01 | 0x04 => continue,
            0x21 => PropertyValue::Str(cur.read_string()?),
            0x22 => PropertyValue::Int(cur.read_i32()?),
            0x23 => PropertyValue::Double(cur.read_f64()?),
            0x24 => PropertyValue::XlIndex(XlIndex {
                signal_index: cur.read_i64()?,
                chunk_offset: cur.read_i32()?,
                point_start: cur.read_i32()?,
                point_count: cur.read_i32()?,
                t_start: cur.read_f64()?,
                t_end: cur.read_f64()?,
                v_min: cur.read_f64()?,
                v_max: cur.read_f64()?,
            }),
            _ => {
                return Err(PsfError::MalformedSection {
                    offset: tag_offset,
                    message: format!("unknown property tag {tag:#x}"),
                })
            }
        };
        props.insert(name, value);
    }

    Ok(props)
}
