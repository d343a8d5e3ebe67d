use std::collections::HashMap;

use log::debug;

use crate::byte_cursor::ByteCursor;
use crate::element::{read_element_header, run_continues};
use crate::error::PsfError;
use crate::property::{read_properties, Properties};
use crate::section::{open_section, END_SENTINEL};
use crate::signal_def::SignalDef;
use crate::trace_section::TraceSection;
use crate::type_def::{TypeDef, TypeId};
use crate::waveform::Samples;

/// A literal value from a non-swept value section.
///
/// Struct values keep their members in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    Double(f64),
    Complex(f64, f64),
    Struct(Vec<(String, Value)>),
}

impl Value {
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_complex(&self) -> Option<(f64, f64)> {
        match self {
            Value::Complex(re, im) => Some((*re, *im)),
            _ => None,
        }
    }

    /// Looks up a struct member by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Struct(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }
}

/// Reads one literal whose shape follows the type definition.
///
/// INT8 payloads occupy a full big-endian int32 on disk; the value is read
/// as such and carried unchanged (see the crate docs on this quirk).
fn read_value(cur: &mut ByteCursor, typedef: &TypeDef) -> Result<Value, PsfError> {
    match typedef.type_id {
        TypeId::Int8 => Ok(Value::Int(cur.read_i32()?)),
        TypeId::Int32 => Ok(Value::Int(cur.read_i32()?)),
        TypeId::Double => Ok(Value::Double(cur.read_f64()?)),
        TypeId::ComplexDouble => {
            let re = cur.read_f64()?;
            let im = cur.read_f64()?;
            Ok(Value::Complex(re, im))
        }
        TypeId::Struct => {
            let mut fields = Vec::with_capacity(typedef.struct_members.len());
            for member in &typedef.struct_members {
                fields.push((member.name.clone(), read_value(cur, member)?));
            }
            Ok(Value::Struct(fields))
        }
    }
}

/// One entry of a simple value section.
#[derive(Debug, Clone)]
pub(crate) struct ValueEntry {
    pub id: u32,
    pub name: String,
    pub type_ref: u32,
    pub value: Value,
    pub properties: Properties,
}

/// The value section of a non-swept file: one literal per signal.
#[derive(Debug)]
pub(crate) struct SimpleValueSection {
    pub entries: Vec<ValueEntry>,
}

impl SimpleValueSection {
    pub(crate) fn read(
        cur: ByteCursor<'_>,
        typedefs: &HashMap<u32, TypeDef>,
    ) -> Result<Self, PsfError> {
        let section = open_section(cur)?;
        let mut body = section.body;

        let sub_offset = body.abspos();
        let sub_tag = body.read_u32()?;
        if sub_tag != 0x16 {
            return Err(PsfError::MalformedSection {
                offset: sub_offset,
                message: format!("bad value section sub-tag {sub_tag:#x}"),
            });
        }
        let index_pos = body.read_u32()?;
        // The trailing index is not needed to decode the values.
        let (mut value_data, _index_data) = body.split_at_absolute(index_pos as usize)?;

        let mut entries = Vec::new();
        while run_continues(&value_data)? {
            let entry_offset = value_data.abspos();
            let header = read_element_header(&mut value_data)?;
            if header.is_group {
                return Err(PsfError::MalformedSection {
                    offset: entry_offset,
                    message: format!("group element {:?} in a value run", header.name),
                });
            }
            let ref_offset = value_data.abspos();
            let type_ref = value_data.read_u32()?;
            if type_ref == 0 {
                return Err(PsfError::MalformedSection {
                    offset: ref_offset,
                    message: format!("value {:?} with a zero type reference", header.name),
                });
            }
            let typedef = typedefs.get(&type_ref).ok_or(PsfError::UnknownType {
                offset: ref_offset,
                type_ref,
            })?;
            let value = read_value(&mut value_data, typedef)?;
            let properties = read_properties(&mut value_data)?;
            let entry = ValueEntry {
                id: header.id,
                name: header.name,
                type_ref,
                value,
                properties,
            };
            debug!(
                "value {} {:?} = {:?} ({} properties)",
                entry.id,
                entry.name,
                entry.value,
                entry.properties.len()
            );
            entries.push(entry);
        }

        Ok(SimpleValueSection { entries })
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<&ValueEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }
}

/// Decoded swept data: the shared x axis plus one sample run per trace, in
/// declaration order.
#[derive(Debug)]
pub(crate) struct SweptValues {
    pub x: Vec<f64>,
    pub traces: Vec<(String, Samples)>,
}

/// The value section of a swept file, decoded either from the flat packed
/// layout or from the windowed streaming layout.
///
/// `values` is `None` for the `0xFFFFFFFF` end sentinel: the section is
/// declared but carries no data (the PSF-XL primary file does this).
pub(crate) struct SweepValueSection {
    pub values: Option<SweptValues>,
}

/// One column of the swept record: a flattened trace with its resolved
/// primitive type.
struct TraceField {
    name: String,
    type_id: TypeId,
}

fn resolve_field(
    signal: &SignalDef,
    typedefs: &HashMap<u32, TypeDef>,
) -> Result<TraceField, PsfError> {
    let typedef = typedefs.get(&signal.type_ref).ok_or(PsfError::UnknownType {
        offset: 0,
        type_ref: signal.type_ref,
    })?;
    if typedef.type_id == TypeId::Struct {
        return Err(PsfError::MalformedSection {
            offset: 0,
            message: format!("struct-typed signal {:?} in a swept value section", signal.name),
        });
    }
    Ok(TraceField {
        name: signal.name.clone(),
        type_id: typedef.type_id,
    })
}

fn samples_for(type_id: TypeId) -> Samples {
    match type_id {
        TypeId::ComplexDouble => Samples::Complex(Vec::new()),
        _ => Samples::Real(Vec::new()),
    }
}

/// Appends one sample of `type_id` to `samples`. Integer samples widen to
/// `f64`.
fn push_sample(
    cur: &mut ByteCursor,
    type_id: TypeId,
    samples: &mut Samples,
) -> Result<(), PsfError> {
    let offset = cur.abspos();
    match (type_id, samples) {
        (TypeId::Int8, Samples::Real(v)) => v.push(cur.read_i8()? as f64),
        (TypeId::Int32, Samples::Real(v)) => v.push(cur.read_i32()? as f64),
        (TypeId::Double, Samples::Real(v)) => v.push(cur.read_f64()?),
        (TypeId::ComplexDouble, Samples::Complex(v)) => {
            let re = cur.read_f64()?;
            let im = cur.read_f64()?;
            v.push((re, im));
        }
        _ => {
            return Err(PsfError::MalformedSection {
                offset,
                message: format!("sample of unexpected type {type_id:?}"),
            })
        }
    }
    Ok(())
}

impl SweepValueSection {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn read(
        cur: ByteCursor<'_>,
        sweep: &SignalDef,
        traces: &TraceSection,
        typedefs: &HashMap<u32, TypeDef>,
        is_windowed: bool,
        window_size: usize,
        npoints: usize,
    ) -> Result<Self, PsfError> {
        let section = open_section(cur)?;
        if section.end_abspos == END_SENTINEL {
            debug!("empty value section (PSF-XL primary file)");
            return Ok(SweepValueSection { values: None });
        }
        let body = section.body;

        let sweep_field = resolve_field(sweep, typedefs)?;
        if sweep_field.type_id == TypeId::ComplexDouble {
            return Err(PsfError::MalformedSection {
                offset: body.abspos(),
                message: String::from("complex sweep variable"),
            });
        }

        let values = if is_windowed {
            let fields = traces
                .flattened()
                .map(|s| resolve_field(s, typedefs))
                .collect::<Result<Vec<_>, _>>()?;
            read_windowed(body, &sweep_field, &fields, window_size, npoints)?
        } else {
            let groups = traces
                .elems
                .iter()
                .map(|e| {
                    e.signals()
                        .iter()
                        .map(|s| resolve_field(s, typedefs))
                        .collect::<Result<Vec<_>, _>>()
                })
                .collect::<Result<Vec<_>, _>>()?;
            read_flat(body, &sweep_field, &groups, npoints)?
        };

        Ok(SweepValueSection { values: Some(values) })
    }
}

/// Decodes the flat layout: one packed record per sweep point, each
/// top-level element preceded by an 8-byte id marker that is skipped.
fn read_flat(
    mut body: ByteCursor,
    sweep_field: &TraceField,
    groups: &[Vec<TraceField>],
    npoints: usize,
) -> Result<SweptValues, PsfError> {
    let mut x = Vec::with_capacity(npoints);
    let mut ys: Vec<Samples> = groups
        .iter()
        .flatten()
        .map(|f| samples_for(f.type_id))
        .collect();

    for _ in 0..npoints {
        // id marker (0x10 + id) in front of the sweep column
        body.skip(8)?;
        let mut x_sample = samples_for(sweep_field.type_id);
        push_sample(&mut body, sweep_field.type_id, &mut x_sample)?;
        if let Samples::Real(v) = x_sample {
            x.extend_from_slice(&v);
        }

        let mut column = 0;
        for group in groups {
            body.skip(8)?; // id marker of the group or single trace
            for field in group {
                push_sample(&mut body, field.type_id, &mut ys[column])?;
                column += 1;
            }
        }
    }

    let names = groups.iter().flatten().map(|f| f.name.clone());
    Ok(SweptValues {
        x,
        traces: names.zip(ys).collect(),
    })
}

/// The windowed decoder's position inside a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WindowState {
    ExpectChunkHeader,
    ReadSweep,
    ReadTrace(usize),
    Done,
}

/// Reads `valid` samples and then consumes the remainder of the window's
/// capacity.
fn read_run(
    body: &mut ByteCursor,
    type_id: TypeId,
    valid: usize,
    window: usize,
    window_size: usize,
    samples: &mut Samples,
) -> Result<(), PsfError> {
    let offset = body.abspos();
    let item_size = type_id.item_size().ok_or_else(|| PsfError::MalformedSection {
        offset,
        message: String::from("struct-typed sample run"),
    })?;
    if window_size != 0 && window * item_size > window_size {
        return Err(PsfError::MalformedSection {
            offset,
            message: format!("window of {window} samples exceeds the declared window size"),
        });
    }
    for _ in 0..valid {
        push_sample(body, type_id, samples)?;
    }
    body.skip((window - valid) * item_size)?;
    Ok(())
}

/// Decodes the windowed layout: a verified zero pad, then chunks of
/// interleaved sweep and trace sample runs until the valid samples reach
/// the declared sweep point count.
fn read_windowed(
    mut body: ByteCursor,
    sweep_field: &TraceField,
    fields: &[TraceField],
    window_size: usize,
    npoints: usize,
) -> Result<SweptValues, PsfError> {
    let tag_offset = body.abspos();
    let tag = body.read_u32()?;
    if tag != 0x14 {
        return Err(PsfError::MalformedSection {
            offset: tag_offset,
            message: format!("bad zero-pad tag {tag:#x}"),
        });
    }
    let zeropad_size = body.read_u32()? as usize;
    let pad_offset = body.abspos();
    let pad = body.read_bytes(zeropad_size)?;
    if pad.iter().any(|&b| b != 0) {
        return Err(PsfError::MalformedSection {
            offset: pad_offset,
            message: String::from("nonzero byte in zero pad"),
        });
    }
    debug!("windowed layout, removed {zeropad_size} bytes of zero pad");

    let mut x = Vec::with_capacity(npoints);
    let mut ys: Vec<Samples> = fields.iter().map(|f| samples_for(f.type_id)).collect();

    let mut points_read = 0usize;
    let mut valid = 0usize;
    let mut window = 0usize;
    let mut state = if points_read < npoints {
        WindowState::ExpectChunkHeader
    } else {
        WindowState::Done
    };

    loop {
        match state {
            WindowState::ExpectChunkHeader => {
                let chunk_offset = body.abspos();
                let chunk_tag = body.read_u32()?;
                if chunk_tag == 0x14 {
                    // filler chunk
                    let len = body.read_u32()? as usize;
                    body.skip(len)?;
                    continue;
                }
                let d = body.read_u32()?;
                window = (d >> 16) as usize;
                valid = (d & 0xFFFF) as usize;
                if valid > window {
                    return Err(PsfError::MalformedSection {
                        offset: chunk_offset,
                        message: format!("{valid} valid samples in a window of {window}"),
                    });
                }
                if points_read + valid > npoints {
                    return Err(PsfError::MalformedSection {
                        offset: chunk_offset,
                        message: format!(
                            "window overruns the declared sweep points ({} > {npoints})",
                            points_read + valid
                        ),
                    });
                }
                state = WindowState::ReadSweep;
            }
            WindowState::ReadSweep => {
                let mut x_run = Samples::Real(Vec::new());
                read_run(&mut body, sweep_field.type_id, valid, window, window_size, &mut x_run)?;
                if let Samples::Real(v) = x_run {
                    x.extend_from_slice(&v);
                }
                state = if fields.is_empty() {
                    points_read += valid;
                    if points_read < npoints {
                        WindowState::ExpectChunkHeader
                    } else {
                        WindowState::Done
                    }
                } else {
                    WindowState::ReadTrace(0)
                };
            }
            WindowState::ReadTrace(k) => {
                // inter-run sentinel (ff ff ff ff 7f ff ff ff or similar)
                body.skip(8)?;
                read_run(&mut body, fields[k].type_id, valid, window, window_size, &mut ys[k])?;
                state = if k + 1 < fields.len() {
                    WindowState::ReadTrace(k + 1)
                } else {
                    points_read += valid;
                    if points_read < npoints {
                        WindowState::ExpectChunkHeader
                    } else {
                        WindowState::Done
                    }
                };
            }
            WindowState::Done => break,
        }
    }

    let names = fields.iter().map(|f| f.name.clone());
    Ok(SweptValues {
        x,
        traces: names.zip(ys).collect(),
    })
}
