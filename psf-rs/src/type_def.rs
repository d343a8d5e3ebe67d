use crate::byte_cursor::ByteCursor;
use crate::element::read_element_header;
use crate::error::PsfError;
use crate::property::{read_properties, Properties};

/// The primitive (or struct) kind behind a type definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeId {
    Int8,
    Int32,
    Double,
    ComplexDouble,
    Struct,
}

impl TypeId {
    pub(crate) fn from_u32(value: u32, offset: usize) -> Result<Self, PsfError> {
        match value {
            0x01 => Ok(TypeId::Int8),
            0x05 => Ok(TypeId::Int32),
            0x0B => Ok(TypeId::Double),
            0x0C => Ok(TypeId::ComplexDouble),
            0x10 => Ok(TypeId::Struct),
            _ => Err(PsfError::MalformedSection {
                offset,
                message: format!("unknown type id {value:#x}"),
            }),
        }
    }

    /// On-disk size of one sample of this type; structs have none.
    pub fn item_size(&self) -> Option<usize> {
        match self {
            TypeId::Int8 => Some(1),
            TypeId::Int32 => Some(4),
            TypeId::Double => Some(8),
            TypeId::ComplexDouble => Some(16),
            TypeId::Struct => None,
        }
    }
}

/// A named type declared in the Type section and referenced by id from the
/// Sweep, Trace and Value sections.
#[derive(Debug, Clone)]
pub struct TypeDef {
    pub id: u32,
    pub name: String,
    pub type_id: TypeId,
    /// Ordered member types; empty unless `type_id` is [`TypeId::Struct`].
    pub struct_members: Vec<TypeDef>,
    pub properties: Properties,
}

/// Parses one type definition from the Type section.
pub(crate) fn read_typedef(cur: &mut ByteCursor) -> Result<TypeDef, PsfError> {
    let offset = cur.abspos();
    let header = read_element_header(cur)?;
    if header.is_group {
        return Err(PsfError::MalformedSection {
            offset,
            message: format!("group element {:?} in a type run", header.name),
        });
    }

    let ref_offset = cur.abspos();
    let type_ref = cur.read_u32()?;
    if type_ref != 0 {
        return Err(PsfError::MalformedSection {
            offset: ref_offset,
            message: format!("type definition with nonzero reference {type_ref}"),
        });
    }

    let id_offset = cur.abspos();
    let type_id = TypeId::from_u32(cur.read_u32()?, id_offset)?;

    let mut struct_members = Vec::new();
    if type_id == TypeId::Struct {
        while cur.peek_u32()? != 0x12 {
            struct_members.push(read_typedef(cur)?);
        }
        cur.read_u32()?; // struct end marker
    }

    let properties = read_properties(cur)?;

    Ok(TypeDef {
        id: header.id,
        name: header.name,
        type_id,
        struct_members,
        properties,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_u32(out: &mut Vec<u8>, v: u32) {
        out.extend_from_slice(&v.to_be_bytes());
    }

    fn push_string(out: &mut Vec<u8>, s: &str) {
        push_u32(out, s.len() as u32);
        out.extend_from_slice(s.as_bytes());
        out.extend(std::iter::repeat(0u8).take((4 - (s.len() & 3)) & 3));
    }

    fn typedef_bytes(id: u32, name: &str, type_id: u32) -> Vec<u8> {
        let mut out = Vec::new();
        push_u32(&mut out, 0x10);
        push_u32(&mut out, id);
        push_string(&mut out, name);
        push_u32(&mut out, 0);
        push_u32(&mut out, type_id);
        out
    }

    #[test]
    fn reads_a_primitive_typedef() {
        let mut data = typedef_bytes(3, "sweep", 0x0B);
        push_u32(&mut data, 0x21);
        push_string(&mut data, "units");
        push_string(&mut data, "s");

        let def = read_typedef(&mut ByteCursor::new(&data)).unwrap();
        assert_eq!(def.id, 3);
        assert_eq!(def.name, "sweep");
        assert_eq!(def.type_id, TypeId::Double);
        assert!(def.struct_members.is_empty());
        assert_eq!(def.properties.get_str("units"), Some("s"));
    }

    #[test]
    fn reads_a_struct_typedef() {
        let mut data = typedef_bytes(9, "opInfo", 0x10);
        data.extend_from_slice(&typedef_bytes(10, "vgs", 0x0B));
        data.extend_from_slice(&typedef_bytes(11, "ids", 0x0B));
        push_u32(&mut data, 0x12); // struct end

        let def = read_typedef(&mut ByteCursor::new(&data)).unwrap();
        assert_eq!(def.type_id, TypeId::Struct);
        let members: Vec<&str> = def.struct_members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(members, ["vgs", "ids"]);
    }

    #[test]
    fn rejects_a_nonzero_reference() {
        let mut data = Vec::new();
        push_u32(&mut data, 0x10);
        push_u32(&mut data, 1);
        push_string(&mut data, "broken");
        push_u32(&mut data, 5);
        push_u32(&mut data, 0x0B);
        let err = read_typedef(&mut ByteCursor::new(&data)).unwrap_err();
        assert!(matches!(err, PsfError::MalformedSection { .. }));
    }
}
