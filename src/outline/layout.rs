//! Byte layout of carrier types.
//!
//! A carrier crosses the host/device boundary as an opaque buffer: a
//! [`BundleHeader`] followed by the fields at naturally aligned offsets.
//! Handles (arrays, class instances, references) travel as 64-bit slot
//! numbers; wide handles carry an extra node word.

use bytemuck::{Pod, Zeroable};

use crate::ir::display::type_name;
use crate::ir::{Program, Type, TypeId};

pub const BUNDLE_MAGIC: u32 = 0x4750_4c42; // "GPLB"

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct BundleHeader {
    pub magic: u32,
    pub field_count: u32,
    pub payload_size: u64,
}

pub const HEADER_SIZE: usize = std::mem::size_of::<BundleHeader>();

/// Encoded form of one field.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SlotValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Real(f64),
    Handle(u64),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotKind {
    Bool,
    Int,
    UInt,
    Real,
    Handle,
    WideHandle,
}

impl SlotKind {
    fn of(ty: &Type) -> SlotKind {
        match ty {
            Type::Bool => SlotKind::Bool,
            Type::Int => SlotKind::Int,
            Type::UInt => SlotKind::UInt,
            Type::Real => SlotKind::Real,
            Type::Wide(_) => SlotKind::WideHandle,
            Type::Ref(inner) if inner.is_wide() => SlotKind::WideHandle,
            _ => SlotKind::Handle,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SlotKind::Bool => "bool",
            SlotKind::Int => "int",
            SlotKind::UInt => "uint",
            SlotKind::Real => "real",
            SlotKind::Handle => "handle",
            SlotKind::WideHandle => "wide_handle",
        }
    }

    pub fn size(self) -> u32 {
        match self {
            SlotKind::Bool => 1,
            SlotKind::WideHandle => 16,
            _ => 8,
        }
    }

    pub fn align(self) -> u32 {
        match self {
            SlotKind::Bool => 1,
            _ => 8,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldSlot {
    pub name: String,
    pub type_name: String,
    pub kind: SlotKind,
    pub offset: u32,
    pub size: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CarrierLayout {
    pub name: String,
    pub fields: Vec<FieldSlot>,
    /// Payload size, padded to `align`.
    pub size: u32,
    pub align: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("bundle is {found} bytes, expected {expected}")]
    Size { expected: usize, found: usize },

    #[error("bundle header is corrupt")]
    BadHeader,

    #[error("carrier has {expected} fields, got {found} values")]
    FieldCount { expected: usize, found: usize },

    #[error("value for field '{field}' does not fit its slot")]
    SlotMismatch { field: String },
}

fn align_up(n: u32, align: u32) -> u32 {
    n.div_ceil(align) * align
}

impl CarrierLayout {
    pub fn of(program: &Program, ty: TypeId) -> CarrierLayout {
        let def = program.type_def(ty);
        let mut offset = 0;
        let mut align = 1;
        let mut fields = Vec::with_capacity(def.fields.len());
        for field in &def.fields {
            let kind = SlotKind::of(&field.ty);
            offset = align_up(offset, kind.align());
            align = align.max(kind.align());
            fields.push(FieldSlot {
                name: field.name.clone(),
                type_name: type_name(program, &field.ty),
                kind,
                offset,
                size: kind.size(),
            });
            offset += kind.size();
        }
        CarrierLayout {
            name: def.name.clone(),
            fields,
            size: align_up(offset, align),
            align,
        }
    }

    pub fn bundle_size(&self) -> usize {
        HEADER_SIZE + self.size as usize
    }

    /// Encode `values` (one per field) into an opaque bundle.
    pub fn pack(&self, values: &[SlotValue]) -> Result<Vec<u8>, LayoutError> {
        if values.len() != self.fields.len() {
            return Err(LayoutError::FieldCount {
                expected: self.fields.len(),
                found: values.len(),
            });
        }
        let header = BundleHeader {
            magic: BUNDLE_MAGIC,
            field_count: self.fields.len() as u32,
            payload_size: u64::from(self.size),
        };
        let mut out = vec![0u8; self.bundle_size()];
        out[..HEADER_SIZE].copy_from_slice(bytemuck::bytes_of(&header));
        for (slot, value) in self.fields.iter().zip(values) {
            let at = HEADER_SIZE + slot.offset as usize;
            match (slot.kind, *value) {
                (SlotKind::Bool, SlotValue::Bool(b)) => out[at] = u8::from(b),
                (SlotKind::Int, SlotValue::Int(v)) => write(&mut out, at, &v),
                (SlotKind::UInt, SlotValue::UInt(v)) => write(&mut out, at, &v),
                (SlotKind::Real, SlotValue::Real(v)) => write(&mut out, at, &v),
                (SlotKind::Handle, SlotValue::Handle(h)) => write(&mut out, at, &h),
                (SlotKind::WideHandle, SlotValue::Handle(h)) => {
                    // Node word stays 0: everything lives on this node.
                    write(&mut out, at, &0u64);
                    write(&mut out, at + 8, &h);
                }
                _ => {
                    return Err(LayoutError::SlotMismatch {
                        field: slot.name.clone(),
                    })
                }
            }
        }
        Ok(out)
    }

    /// Decode a bundle produced by [`CarrierLayout::pack`].
    pub fn unpack(&self, bytes: &[u8]) -> Result<Vec<SlotValue>, LayoutError> {
        if bytes.len() != self.bundle_size() {
            return Err(LayoutError::Size {
                expected: self.bundle_size(),
                found: bytes.len(),
            });
        }
        let header: BundleHeader = bytemuck::pod_read_unaligned(&bytes[..HEADER_SIZE]);
        if header.magic != BUNDLE_MAGIC
            || header.field_count as usize != self.fields.len()
            || header.payload_size != u64::from(self.size)
        {
            return Err(LayoutError::BadHeader);
        }
        let values = self
            .fields
            .iter()
            .map(|slot| {
                let at = HEADER_SIZE + slot.offset as usize;
                match slot.kind {
                    SlotKind::Bool => SlotValue::Bool(bytes[at] != 0),
                    SlotKind::Int => SlotValue::Int(read(bytes, at)),
                    SlotKind::UInt => SlotValue::UInt(read(bytes, at)),
                    SlotKind::Real => SlotValue::Real(read(bytes, at)),
                    SlotKind::Handle => SlotValue::Handle(read(bytes, at)),
                    SlotKind::WideHandle => SlotValue::Handle(read(bytes, at + 8)),
                }
            })
            .collect();
        Ok(values)
    }
}

fn write<T: Pod>(out: &mut [u8], at: usize, value: &T) {
    let bytes = bytemuck::bytes_of(value);
    out[at..at + bytes.len()].copy_from_slice(bytes);
}

fn read<T: Pod>(bytes: &[u8], at: usize) -> T {
    bytemuck::pod_read_unaligned(&bytes[at..at + std::mem::size_of::<T>()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Field, TypeDef};

    fn carrier(p: &mut Program, fields: Vec<(&str, Type)>) -> TypeId {
        let m = p.add_module("m", 0);
        p.add_type(TypeDef {
            name: "_class_locals_gpu_kernel0".into(),
            fields: fields
                .into_iter()
                .map(|(n, ty)| Field {
                    name: n.into(),
                    ty,
                })
                .collect(),
            module: m,
            carrier: true,
        })
    }

    #[test]
    fn test_offsets_are_naturally_aligned() {
        let mut p = Program::new();
        let t = carrier(
            &mut p,
            vec![
                ("_0_flag", Type::Bool),
                ("_1_n", Type::Int),
                ("_2_A", Type::Array(Box::new(Type::Real))),
                ("_3_W", Type::Wide(Box::new(Type::Int))),
                ("_4_done", Type::Bool),
            ],
        );
        let layout = CarrierLayout::of(&p, t);
        let offsets: Vec<u32> = layout.fields.iter().map(|f| f.offset).collect();
        assert_eq!(offsets, vec![0, 8, 16, 24, 40]);
        assert_eq!(layout.size, 48);
        assert_eq!(layout.align, 8);
        assert_eq!(layout.fields[2].type_name, "[real]");
        assert_eq!(HEADER_SIZE, 16);
    }

    #[test]
    fn test_pack_then_unpack() {
        let mut p = Program::new();
        let t = carrier(
            &mut p,
            vec![
                ("_0_a", Type::Real),
                ("_1_ok", Type::Bool),
                ("_2_A", Type::Array(Box::new(Type::Int))),
            ],
        );
        let layout = CarrierLayout::of(&p, t);
        let values = vec![SlotValue::Real(2.5), SlotValue::Bool(true), SlotValue::Handle(7)];
        let bytes = layout.pack(&values).expect("packs");
        assert_eq!(bytes.len(), layout.bundle_size());
        assert_eq!(layout.unpack(&bytes).expect("unpacks"), values);
    }

    #[test]
    fn test_corrupt_bundles_are_rejected() {
        let mut p = Program::new();
        let t = carrier(&mut p, vec![("_0_n", Type::Int)]);
        let layout = CarrierLayout::of(&p, t);
        assert!(matches!(
            layout.pack(&[SlotValue::Real(1.0)]),
            Err(LayoutError::SlotMismatch { .. })
        ));
        assert!(matches!(layout.pack(&[]), Err(LayoutError::FieldCount { .. })));
        let mut bytes = layout.pack(&[SlotValue::Int(-4)]).expect("packs");
        assert!(matches!(layout.unpack(&bytes[1..]), Err(LayoutError::Size { .. })));
        bytes[0] ^= 0xff;
        assert_eq!(layout.unpack(&bytes), Err(LayoutError::BadHeader));
    }

    #[test]
    fn test_empty_carrier() {
        let mut p = Program::new();
        let t = carrier(&mut p, vec![]);
        let layout = CarrierLayout::of(&p, t);
        assert_eq!(layout.size, 0);
        let bytes = layout.pack(&[]).expect("packs");
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(layout.unpack(&bytes).expect("unpacks"), vec![]);
    }
}
