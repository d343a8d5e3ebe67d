use std::collections::HashMap;

use crate::byte_cursor::ByteCursor;
use crate::element::read_element_header;
use crate::error::PsfError;
use crate::property::{read_properties, Properties};
use crate::type_def::TypeDef;

/// A named signal declared in the Sweep, Trace or Value sections.
///
/// `type_ref` is the id of a type declared earlier in the Type section; the
/// reference is validated at parse time and resolved through the file's
/// typedef table, never stored as a back-pointer.
#[derive(Debug, Clone)]
pub struct SignalDef {
    pub id: u32,
    pub name: String,
    pub type_ref: u32,
    pub properties: Properties,
}

/// A named collection of signals sharing one declaration scope.
///
/// The facade flattens groups one level: children are addressed by their own
/// names.
#[derive(Debug, Clone)]
pub struct Group {
    pub id: u32,
    pub name: String,
    pub children: Vec<SignalDef>,
    pub properties: Properties,
}

/// One entry of a trace run: either a single signal or a group of them.
#[derive(Debug, Clone)]
pub enum TraceElem {
    Single(SignalDef),
    Group(Group),
}

impl TraceElem {
    pub fn id(&self) -> u32 {
        match self {
            TraceElem::Single(s) => s.id,
            TraceElem::Group(g) => g.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            TraceElem::Single(s) => &s.name,
            TraceElem::Group(g) => &g.name,
        }
    }

    /// The group's children, or the signal itself for a single entry.
    pub fn signals(&self) -> &[SignalDef] {
        match self {
            TraceElem::Single(s) => std::slice::from_ref(s),
            TraceElem::Group(g) => &g.children,
        }
    }
}

/// Parses one entry of a Sweep or Trace section run.
pub(crate) fn read_signaldef(
    cur: &mut ByteCursor,
    typedefs: &HashMap<u32, TypeDef>,
) -> Result<TraceElem, PsfError> {
    let offset = cur.abspos();
    let header = read_element_header(cur)?;

    if header.is_group {
        let nchildren = cur.read_u32()?;
        let mut children = Vec::with_capacity(nchildren as usize);
        for _ in 0..nchildren {
            match read_signaldef(cur, typedefs)? {
                TraceElem::Single(child) => children.push(child),
                TraceElem::Group(_) => {
                    return Err(PsfError::MalformedSection {
                        offset,
                        message: format!("nested group inside group {:?}", header.name),
                    })
                }
            }
        }
        let properties = read_properties(cur)?;
        Ok(TraceElem::Group(Group {
            id: header.id,
            name: header.name,
            children,
            properties,
        }))
    } else {
        let ref_offset = cur.abspos();
        let type_ref = cur.read_u32()?;
        if type_ref == 0 {
            return Err(PsfError::MalformedSection {
                offset: ref_offset,
                message: format!("signal {:?} with a zero type reference", header.name),
            });
        }
        if !typedefs.contains_key(&type_ref) {
            return Err(PsfError::UnknownType {
                offset: ref_offset,
                type_ref,
            });
        }
        let properties = read_properties(cur)?;
        Ok(TraceElem::Single(SignalDef {
            id: header.id,
            name: header.name,
            type_ref,
            properties,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::type_def::TypeId;

    fn push_u32(out: &mut Vec<u8>, v: u32) {
        out.extend_from_slice(&v.to_be_bytes());
    }

    fn push_string(out: &mut Vec<u8>, s: &str) {
        push_u32(out, s.len() as u32);
        out.extend_from_slice(s.as_bytes());
        out.extend(std::iter::repeat(0u8).take((4 - (s.len() & 3)) & 3));
    }

    fn double_typedefs() -> HashMap<u32, TypeDef> {
        let mut map = HashMap::new();
        map.insert(
            1,
            TypeDef {
                id: 1,
                name: String::from("double"),
                type_id: TypeId::Double,
                struct_members: Vec::new(),
                properties: Properties::default(),
            },
        );
        map
    }

    #[test]
    fn reads_a_single_signal() {
        let mut data = Vec::new();
        push_u32(&mut data, 0x10);
        push_u32(&mut data, 20);
        push_string(&mut data, "vout");
        push_u32(&mut data, 1);

        let elem = read_signaldef(&mut ByteCursor::new(&data), &double_typedefs()).unwrap();
        match elem {
            TraceElem::Single(s) => {
                assert_eq!(s.name, "vout");
                assert_eq!(s.type_ref, 1);
            }
            TraceElem::Group(_) => panic!("expected a single signal"),
        }
    }

    #[test]
    fn reads_a_group_with_children() {
        let mut data = Vec::new();
        push_u32(&mut data, 0x11);
        push_u32(&mut data, 30);
        push_string(&mut data, "currents");
        push_u32(&mut data, 2);
        for name in ["i1", "i2"] {
            push_u32(&mut data, 0x10);
            push_u32(&mut data, 31);
            push_string(&mut data, name);
            push_u32(&mut data, 1);
        }

        let elem = read_signaldef(&mut ByteCursor::new(&data), &double_typedefs()).unwrap();
        assert_eq!(elem.name(), "currents");
        let names: Vec<&str> = elem.signals().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["i1", "i2"]);
    }

    #[test]
    fn rejects_an_unknown_type_reference() {
        let mut data = Vec::new();
        push_u32(&mut data, 0x10);
        push_u32(&mut data, 20);
        push_string(&mut data, "vout");
        push_u32(&mut data, 99);

        let err = read_signaldef(&mut ByteCursor::new(&data), &double_typedefs()).unwrap_err();
        assert!(matches!(err, PsfError::UnknownType { type_ref: 99, .. }));
    }
}
