//! Primitive operations.
//!
//! Every primitive has a canonical snake_case name used by the textual IR;
//! arithmetic, comparison and compound-assignment primitives additionally
//! have an operator spelling.

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimOp {
    // ── Data movement ──
    Noop,
    Move,
    Assign,

    // ── Unary ──
    UnaryMinus,
    UnaryNot,
    UnaryLNot,

    // ── Binary arithmetic / logic ──
    Add,
    Subtract,
    Mult,
    Div,
    Mod,
    Lsh,
    Rsh,
    And,
    Or,
    Xor,
    Pow,
    Min,
    Max,

    // ── Comparison ──
    Equal,
    NotEqual,
    LessOrEqual,
    GreaterOrEqual,
    Less,
    Greater,

    // ── Compound assignment ──
    AddAssign,
    SubtractAssign,
    MultAssign,
    DivAssign,
    ModAssign,
    LshAssign,
    RshAssign,
    AndAssign,
    OrAssign,
    XorAssign,

    // ── Aggregates & references ──
    GetMember,
    GetMemberValue,
    SetMember,
    CheckNil,
    AddrOf,
    Deref,
    SetReference,
    LocalCheck,
    Cast,
    SizeOf,
    PtrEqual,
    PtrNotEqual,
    CastToVoidStar,

    // ── Arrays ──
    ArrayAlloc,
    ArrayFree,
    ArrayGet,
    ArrayGetValue,
    ArraySet,

    // ── Memory ──
    HereAlloc,
    HereFree,
    StringCopy,

    // ── Communication ──
    CommGet,
    CommPut,
    CommArrayGet,
    CommArrayPut,

    // ── Runtime services ──
    RtError,
    RtWarning,
    GetUserLine,
    GetUserFile,
    Write,

    // ── Locales & tasking ──
    OnLocaleNum,
    WideGetLocale,
    WideGetNode,
    HeapBroadcastGlobalVars,
    PrivateBroadcast,
    GetSerial,
    SetSerial,
    GetEndCount,
    SetEndCount,

    // ── Accelerator ──
    IsGpuSublocale,
    GetGlobalId,
}

const ALL: &[PrimOp] = &[
    PrimOp::Noop,
    PrimOp::Move,
    PrimOp::Assign,
    PrimOp::UnaryMinus,
    PrimOp::UnaryNot,
    PrimOp::UnaryLNot,
    PrimOp::Add,
    PrimOp::Subtract,
    PrimOp::Mult,
    PrimOp::Div,
    PrimOp::Mod,
    PrimOp::Lsh,
    PrimOp::Rsh,
    PrimOp::And,
    PrimOp::Or,
    PrimOp::Xor,
    PrimOp::Pow,
    PrimOp::Min,
    PrimOp::Max,
    PrimOp::Equal,
    PrimOp::NotEqual,
    PrimOp::LessOrEqual,
    PrimOp::GreaterOrEqual,
    PrimOp::Less,
    PrimOp::Greater,
    PrimOp::AddAssign,
    PrimOp::SubtractAssign,
    PrimOp::MultAssign,
    PrimOp::DivAssign,
    PrimOp::ModAssign,
    PrimOp::LshAssign,
    PrimOp::RshAssign,
    PrimOp::AndAssign,
    PrimOp::OrAssign,
    PrimOp::XorAssign,
    PrimOp::GetMember,
    PrimOp::GetMemberValue,
    PrimOp::SetMember,
    PrimOp::CheckNil,
    PrimOp::AddrOf,
    PrimOp::Deref,
    PrimOp::SetReference,
    PrimOp::LocalCheck,
    PrimOp::Cast,
    PrimOp::SizeOf,
    PrimOp::PtrEqual,
    PrimOp::PtrNotEqual,
    PrimOp::CastToVoidStar,
    PrimOp::ArrayAlloc,
    PrimOp::ArrayFree,
    PrimOp::ArrayGet,
    PrimOp::ArrayGetValue,
    PrimOp::ArraySet,
    PrimOp::HereAlloc,
    PrimOp::HereFree,
    PrimOp::StringCopy,
    PrimOp::CommGet,
    PrimOp::CommPut,
    PrimOp::CommArrayGet,
    PrimOp::CommArrayPut,
    PrimOp::RtError,
    PrimOp::RtWarning,
    PrimOp::GetUserLine,
    PrimOp::GetUserFile,
    PrimOp::Write,
    PrimOp::OnLocaleNum,
    PrimOp::WideGetLocale,
    PrimOp::WideGetNode,
    PrimOp::HeapBroadcastGlobalVars,
    PrimOp::PrivateBroadcast,
    PrimOp::GetSerial,
    PrimOp::SetSerial,
    PrimOp::GetEndCount,
    PrimOp::SetEndCount,
    PrimOp::IsGpuSublocale,
    PrimOp::GetGlobalId,
];

impl PrimOp {
    pub fn all() -> &'static [PrimOp] {
        ALL
    }

    /// Canonical name in the textual IR.
    pub fn name(self) -> &'static str {
        match self {
            PrimOp::Noop => "noop",
            PrimOp::Move => "move",
            PrimOp::Assign => "assign",
            PrimOp::UnaryMinus => "neg",
            PrimOp::UnaryNot => "bit_not",
            PrimOp::UnaryLNot => "not",
            PrimOp::Add => "add",
            PrimOp::Subtract => "sub",
            PrimOp::Mult => "mul",
            PrimOp::Div => "div",
            PrimOp::Mod => "mod",
            PrimOp::Lsh => "lsh",
            PrimOp::Rsh => "rsh",
            PrimOp::And => "and",
            PrimOp::Or => "or",
            PrimOp::Xor => "xor",
            PrimOp::Pow => "pow",
            PrimOp::Min => "min",
            PrimOp::Max => "max",
            PrimOp::Equal => "eq",
            PrimOp::NotEqual => "ne",
            PrimOp::LessOrEqual => "le",
            PrimOp::GreaterOrEqual => "ge",
            PrimOp::Less => "lt",
            PrimOp::Greater => "gt",
            PrimOp::AddAssign => "add_assign",
            PrimOp::SubtractAssign => "sub_assign",
            PrimOp::MultAssign => "mul_assign",
            PrimOp::DivAssign => "div_assign",
            PrimOp::ModAssign => "mod_assign",
            PrimOp::LshAssign => "lsh_assign",
            PrimOp::RshAssign => "rsh_assign",
            PrimOp::AndAssign => "and_assign",
            PrimOp::OrAssign => "or_assign",
            PrimOp::XorAssign => "xor_assign",
            PrimOp::GetMember => "get_member",
            PrimOp::GetMemberValue => "get_member_value",
            PrimOp::SetMember => "set_member",
            PrimOp::CheckNil => "check_nil",
            PrimOp::AddrOf => "addr_of",
            PrimOp::Deref => "deref",
            PrimOp::SetReference => "set_reference",
            PrimOp::LocalCheck => "local_check",
            PrimOp::Cast => "cast",
            PrimOp::SizeOf => "sizeof",
            PrimOp::PtrEqual => "ptr_eq",
            PrimOp::PtrNotEqual => "ptr_ne",
            PrimOp::CastToVoidStar => "cast_to_void_star",
            PrimOp::ArrayAlloc => "array_alloc",
            PrimOp::ArrayFree => "array_free",
            PrimOp::ArrayGet => "array_get",
            PrimOp::ArrayGetValue => "array_get_value",
            PrimOp::ArraySet => "array_set",
            PrimOp::HereAlloc => "here_alloc",
            PrimOp::HereFree => "here_free",
            PrimOp::StringCopy => "string_copy",
            PrimOp::CommGet => "comm_get",
            PrimOp::CommPut => "comm_put",
            PrimOp::CommArrayGet => "comm_array_get",
            PrimOp::CommArrayPut => "comm_array_put",
            PrimOp::RtError => "rt_error",
            PrimOp::RtWarning => "rt_warning",
            PrimOp::GetUserLine => "get_user_line",
            PrimOp::GetUserFile => "get_user_file",
            PrimOp::Write => "writeln",
            PrimOp::OnLocaleNum => "on_locale_num",
            PrimOp::WideGetLocale => "wide_get_locale",
            PrimOp::WideGetNode => "wide_get_node",
            PrimOp::HeapBroadcastGlobalVars => "heap_broadcast_global_vars",
            PrimOp::PrivateBroadcast => "private_broadcast",
            PrimOp::GetSerial => "get_serial",
            PrimOp::SetSerial => "set_serial",
            PrimOp::GetEndCount => "get_end_count",
            PrimOp::SetEndCount => "set_end_count",
            PrimOp::IsGpuSublocale => "is_gpu_sublocale",
            PrimOp::GetGlobalId => "get_global_id",
        }
    }

    pub fn from_name(name: &str) -> Option<PrimOp> {
        ALL.iter().copied().find(|op| op.name() == name)
    }

    /// Operator spelling of a binary primitive (`a + b`).
    pub fn infix(self) -> Option<&'static str> {
        Some(match self {
            PrimOp::Add => "+",
            PrimOp::Subtract => "-",
            PrimOp::Mult => "*",
            PrimOp::Div => "/",
            PrimOp::Mod => "%",
            PrimOp::Lsh => "<<",
            PrimOp::Rsh => ">>",
            PrimOp::And => "&",
            PrimOp::Or => "|",
            PrimOp::Xor => "^",
            PrimOp::Equal => "==",
            PrimOp::NotEqual => "!=",
            PrimOp::LessOrEqual => "<=",
            PrimOp::GreaterOrEqual => ">=",
            PrimOp::Less => "<",
            PrimOp::Greater => ">",
            _ => return None,
        })
    }

    /// Operator spelling of a compound assignment (`a += b`).
    pub fn assign_infix(self) -> Option<&'static str> {
        Some(match self {
            PrimOp::Move => ":=",
            PrimOp::Assign => "=",
            PrimOp::AddAssign => "+=",
            PrimOp::SubtractAssign => "-=",
            PrimOp::MultAssign => "*=",
            PrimOp::DivAssign => "/=",
            PrimOp::ModAssign => "%=",
            PrimOp::LshAssign => "<<=",
            PrimOp::RshAssign => ">>=",
            PrimOp::AndAssign => "&=",
            PrimOp::OrAssign => "|=",
            PrimOp::XorAssign => "^=",
            _ => return None,
        })
    }

    pub fn is_op_assign(self) -> bool {
        self.arith_of_op_assign().is_some()
    }

    /// `+=` → `+`, etc.
    pub fn arith_of_op_assign(self) -> Option<PrimOp> {
        Some(match self {
            PrimOp::AddAssign => PrimOp::Add,
            PrimOp::SubtractAssign => PrimOp::Subtract,
            PrimOp::MultAssign => PrimOp::Mult,
            PrimOp::DivAssign => PrimOp::Div,
            PrimOp::ModAssign => PrimOp::Mod,
            PrimOp::LshAssign => PrimOp::Lsh,
            PrimOp::RshAssign => PrimOp::Rsh,
            PrimOp::AndAssign => PrimOp::And,
            PrimOp::OrAssign => PrimOp::Or,
            PrimOp::XorAssign => PrimOp::Xor,
            _ => return None,
        })
    }

    /// `move` or `assign`.
    pub fn is_copy(self) -> bool {
        matches!(self, PrimOp::Move | PrimOp::Assign)
    }

    /// Primitives whose first argument is overwritten.
    pub fn writes_first_arg(self) -> bool {
        self.is_copy() || self.is_op_assign() || self == PrimOp::SetReference
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            PrimOp::Equal
                | PrimOp::NotEqual
                | PrimOp::LessOrEqual
                | PrimOp::GreaterOrEqual
                | PrimOp::Less
                | PrimOp::Greater
        )
    }
}

impl fmt::Display for PrimOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for op in PrimOp::all() {
            assert_eq!(PrimOp::from_name(op.name()), Some(*op), "{:?}", op);
        }
        assert_eq!(PrimOp::from_name("no_such_prim"), None);
    }

    #[test]
    fn test_op_assign_mapping() {
        assert_eq!(PrimOp::AddAssign.arith_of_op_assign(), Some(PrimOp::Add));
        assert_eq!(
            PrimOp::SubtractAssign.arith_of_op_assign(),
            Some(PrimOp::Subtract)
        );
        assert!(!PrimOp::Move.is_op_assign());
        assert!(PrimOp::Move.writes_first_arg());
        assert!(PrimOp::XorAssign.writes_first_arg());
    }
}
