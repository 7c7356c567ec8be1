//! Offload IR: the resolved program representation the outlining pass
//! rewrites.
//!
//! The IR is a tree of statements inside function bodies. Symbols,
//! functions, aggregate types and modules live in flat tables owned by
//! [`Program`] and are referred to by copyable handles, so the pass can
//! redirect a use from one symbol to another without touching the
//! declaration.
//!
//! ```text
//! Program ─┬─ modules   : Vec<Module>    (init block, globals, fns, types)
//!          ├─ functions : Vec<Function>  (formals, body, nested fns)
//!          ├─ symbols   : Vec<Symbol>    (name, type, scope, flags)
//!          └─ types     : Vec<TypeDef>   (class / carrier layouts)
//! ```

pub mod callgraph;
pub mod copy;
pub mod display;
pub mod prim;
pub mod walk;

use std::collections::HashMap;
use std::fmt;

use crate::span::{LineIndex, Span};

pub use copy::SymbolMap;
pub use prim::PrimOp;

// ─── Handles ──────────────────────────────────────────────────────

macro_rules! handle {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

handle!(
    /// Handle of a [`Symbol`] in [`Program::symbols`].
    SymId,
    "%"
);
handle!(
    /// Handle of a [`Function`] in [`Program::functions`].
    FnId,
    "fn#"
);
handle!(
    /// Handle of a [`TypeDef`] in [`Program::types`].
    TypeId,
    "ty#"
);
handle!(
    /// Handle of a [`Module`] in [`Program::modules`].
    ModId,
    "mod#"
);

// ─── Types ────────────────────────────────────────────────────────

/// Value types as seen by the middle end.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    Bool,
    Int,
    UInt,
    Real,
    CString,
    /// Type-erased pointer; only crosses the host/device boundary.
    CVoidPtr,
    Ref(Box<Type>),
    /// Handle that may point into another address space.
    Wide(Box<Type>),
    /// Array handle (reference semantics).
    Array(Box<Type>),
    /// Instance of a declared aggregate (reference semantics).
    Class(TypeId),
}

impl Type {
    pub fn is_ref(&self) -> bool {
        matches!(self, Type::Ref(_))
    }

    /// True for types whose values alias storage: references, arrays,
    /// class instances and wide handles.
    pub fn is_reference_like(&self) -> bool {
        matches!(
            self,
            Type::Ref(_) | Type::Wide(_) | Type::Array(_) | Type::Class(_)
        )
    }

    /// True if a value of this type may live in a remote address space.
    pub fn is_wide(&self) -> bool {
        match self {
            Type::Wide(_) => true,
            Type::Ref(inner) => inner.is_wide(),
            _ => false,
        }
    }

    /// Element type of an array (through references and wide handles).
    pub fn element(&self) -> Option<&Type> {
        match self {
            Type::Array(elem) => Some(elem),
            Type::Ref(inner) | Type::Wide(inner) => inner.element(),
            _ => None,
        }
    }
}

/// A field of a declared aggregate.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: Type,
}

/// A declared aggregate (class) type.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeDef {
    pub name: String,
    pub fields: Vec<Field>,
    pub module: ModId,
    /// Synthesized by free-variable bundling.
    pub carrier: bool,
}

// ─── Symbols ──────────────────────────────────────────────────────

/// Where a symbol or function is defined.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    Module(ModId),
    Function(FnId),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SymFlags {
    /// Compiler-introduced temporary.
    pub temp: bool,
    /// Immutable after initialization.
    pub constant: bool,
    /// Compile-time parameter; folded into its uses by the backend.
    pub param: bool,
    /// Names a type rather than storage.
    pub type_alias: bool,
    /// Captured by a kernel and therefore visible to a second execution unit.
    pub concurrently_accessed: bool,
    /// Formal supplied by the dispatch layer, not emitted in device source.
    pub no_codegen: bool,
}

/// A declared storage location.
#[derive(Clone, Debug, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub ty: Type,
    pub scope: Scope,
    pub flags: SymFlags,
    pub span: Span,
}

// ─── Expressions & statements ─────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Int(i64),
    Real(f64),
    Bool(bool),
    Str(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Sym(SymId),
    Lit(Literal),
    /// A type operand (allocation size, casts).
    Type(TypeId),
    Call(Box<Call>),
}

impl Expr {
    pub fn int(v: i64) -> Self {
        Expr::Lit(Literal::Int(v))
    }

    pub fn call(callee: Callee, args: Vec<Expr>) -> Self {
        Expr::Call(Box::new(Call::new(callee, args)))
    }

    pub fn prim(op: PrimOp, args: Vec<Expr>) -> Self {
        Expr::call(Callee::Prim(op), args)
    }

    pub fn as_sym(&self) -> Option<SymId> {
        match self {
            Expr::Sym(s) => Some(*s),
            _ => None,
        }
    }

    pub fn as_call(&self) -> Option<&Call> {
        match self {
            Expr::Call(c) => Some(c),
            _ => None,
        }
    }

    /// A symbol or literal: the only operand forms the loop recognizer accepts.
    pub fn is_atom(&self) -> bool {
        matches!(self, Expr::Sym(_) | Expr::Lit(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Callee {
    Prim(PrimOp),
    Fn(FnId),
}

/// A call to a primitive or a resolved function.
#[derive(Clone, Debug, PartialEq)]
pub struct Call {
    pub callee: Callee,
    pub args: Vec<Expr>,
    pub span: Span,
}

impl Call {
    pub fn new(callee: Callee, args: Vec<Expr>) -> Self {
        Self {
            callee,
            args,
            span: Span::dummy(),
        }
    }

    pub fn prim(op: PrimOp, args: Vec<Expr>) -> Self {
        Self::new(Callee::Prim(op), args)
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn prim_op(&self) -> Option<PrimOp> {
        match self.callee {
            Callee::Prim(op) => Some(op),
            Callee::Fn(_) => None,
        }
    }

    pub fn is_prim(&self, op: PrimOp) -> bool {
        self.callee == Callee::Prim(op)
    }

    pub fn fn_id(&self) -> Option<FnId> {
        match self.callee {
            Callee::Fn(f) => Some(f),
            Callee::Prim(_) => None,
        }
    }

    /// `move`/`assign` whose target is a plain symbol: `(target, value)`.
    pub fn as_copy(&self) -> Option<(SymId, &Expr)> {
        match self.prim_op() {
            Some(PrimOp::Move) | Some(PrimOp::Assign) if self.args.len() == 2 => {
                Some((self.args[0].as_sym()?, &self.args[1]))
            }
            _ => None,
        }
    }

    /// `x op= y` with a plain symbol target: `(op, target, value)`.
    pub fn as_op_assign(&self) -> Option<(PrimOp, SymId, &Expr)> {
        let op = self.prim_op()?;
        if op.is_op_assign() && self.args.len() == 2 {
            Some((op, self.args[0].as_sym()?, &self.args[1]))
        } else {
            None
        }
    }
}

/// How a block's statements are to be executed.
#[derive(Clone, Debug, PartialEq)]
pub enum BlockKind {
    Plain,
    /// Programmer asserts no communication happens inside.
    Local,
    /// Explicit kernel: outlined as-is and launched over `work_items`.
    Kernel { work_items: Expr, group_size: Expr },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub kind: BlockKind,
    pub stmts: Vec<Stmt>,
}

impl Default for Block {
    fn default() -> Self {
        Self::new()
    }
}

impl Block {
    pub fn new() -> Self {
        Self {
            kind: BlockKind::Plain,
            stmts: Vec::new(),
        }
    }

    pub fn with_stmts(stmts: Vec<Stmt>) -> Self {
        Self {
            kind: BlockKind::Plain,
            stmts,
        }
    }

    pub fn push(&mut self, stmt: Stmt) {
        self.stmts.push(stmt);
    }

    pub fn is_empty(&self) -> bool {
        self.stmts.is_empty()
    }
}

/// A C-style counting loop: `for (init; test; incr) body`.
///
/// The loop continues while the value of the last statement of `test` is
/// true (for a `move`/`assign`, the value stored).
#[derive(Clone, Debug, PartialEq)]
pub struct CForLoop {
    pub init: Block,
    pub test: Block,
    pub incr: Block,
    pub body: Block,
    /// Iterations carry no dependency on each other's order.
    pub order_independent: bool,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Cond {
    pub test: Expr,
    pub then_block: Block,
    pub else_block: Option<Block>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    /// Declaration point of a symbol.
    Def(SymId),
    Call(Call),
    Block(Block),
    Loop(CForLoop),
    Cond(Cond),
    Return(Option<Expr>),
}

impl Stmt {
    pub fn prim(op: PrimOp, args: Vec<Expr>) -> Self {
        Stmt::Call(Call::prim(op, args))
    }

    pub fn mov(target: SymId, value: Expr) -> Self {
        Stmt::prim(PrimOp::Move, vec![Expr::Sym(target), value])
    }

    pub fn as_call(&self) -> Option<&Call> {
        match self {
            Stmt::Call(c) => Some(c),
            _ => None,
        }
    }
}

// ─── Functions & modules ──────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FnFlags {
    /// `@offload` pragma: loops in (or called from) this function may be offloaded.
    pub offload_requested: bool,
    /// Generated kernel entry point.
    pub offload_target: bool,
    /// Memoized fitness verdict. Monotonic: never reset once set.
    pub fit_for_offload: bool,
    /// Body is defined outside the program.
    pub extern_fn: bool,
    /// Blocks on another execution context.
    pub on_block: bool,
    /// Returns before its effects complete.
    pub non_blocking: bool,
    /// The whole body executes in a local context.
    pub local_fn: bool,
    /// Device-side clone of a host function called from a kernel.
    pub device_copy: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    pub name: String,
    pub formals: Vec<SymId>,
    pub ret: Type,
    pub body: Block,
    pub parent: Scope,
    /// Functions defined inside this one.
    pub nested: Vec<FnId>,
    pub flags: FnFlags,
    pub span: Span,
}

impl Function {
    pub fn new(name: impl Into<String>, parent: Scope) -> Self {
        Self {
            name: name.into(),
            formals: Vec::new(),
            ret: Type::Void,
            body: Block::new(),
            parent,
            nested: Vec::new(),
            flags: FnFlags::default(),
            span: Span::dummy(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Module {
    pub name: String,
    pub file_id: u16,
    /// Module-level statements, run once before the entry function.
    pub init: Block,
    /// Aggregate types in declaration order.
    pub types: Vec<TypeId>,
    /// Top-level functions in definition order.
    pub functions: Vec<FnId>,
}

/// A source file the program was read from, for diagnostics and reports.
#[derive(Clone, Debug)]
pub struct SourceFile {
    pub name: String,
    pub lines: LineIndex,
}

// ─── Program ──────────────────────────────────────────────────────

/// The whole program: owner of every symbol, function, type and module.
#[derive(Clone, Debug, Default)]
pub struct Program {
    pub symbols: Vec<Symbol>,
    pub functions: Vec<Function>,
    pub types: Vec<TypeDef>,
    pub modules: Vec<Module>,
    pub sources: Vec<SourceFile>,
    /// Interned global names → number of times handed out.
    names: HashMap<String, u32>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_source(&mut self, name: &str, source: &str) -> u16 {
        self.sources.push(SourceFile {
            name: name.to_string(),
            lines: LineIndex::new(source),
        });
        (self.sources.len() - 1) as u16
    }

    pub fn add_module(&mut self, name: &str, file_id: u16) -> ModId {
        self.reserve_name(name);
        self.modules.push(Module {
            name: name.to_string(),
            file_id,
            init: Block::new(),
            types: Vec::new(),
            functions: Vec::new(),
        });
        ModId((self.modules.len() - 1) as u32)
    }

    pub fn add_symbol(&mut self, symbol: Symbol) -> SymId {
        self.symbols.push(symbol);
        SymId((self.symbols.len() - 1) as u32)
    }

    /// Declare a fresh temporary in `scope`.
    pub fn new_temp(&mut self, name: &str, ty: Type, scope: Scope) -> SymId {
        self.add_symbol(Symbol {
            name: name.to_string(),
            ty,
            scope,
            flags: SymFlags {
                temp: true,
                ..SymFlags::default()
            },
            span: Span::dummy(),
        })
    }

    /// Add a function. Registration in its parent's function list is the
    /// caller's job (`Module::functions` or `Function::nested`).
    pub fn add_function(&mut self, function: Function) -> FnId {
        self.reserve_name(&function.name);
        self.functions.push(function);
        FnId((self.functions.len() - 1) as u32)
    }

    pub fn add_type(&mut self, def: TypeDef) -> TypeId {
        self.reserve_name(&def.name);
        self.types.push(def);
        TypeId((self.types.len() - 1) as u32)
    }

    pub fn sym(&self, id: SymId) -> &Symbol {
        &self.symbols[id.index()]
    }

    pub fn sym_mut(&mut self, id: SymId) -> &mut Symbol {
        &mut self.symbols[id.index()]
    }

    pub fn func(&self, id: FnId) -> &Function {
        &self.functions[id.index()]
    }

    pub fn func_mut(&mut self, id: FnId) -> &mut Function {
        &mut self.functions[id.index()]
    }

    pub fn type_def(&self, id: TypeId) -> &TypeDef {
        &self.types[id.index()]
    }

    pub fn module(&self, id: ModId) -> &Module {
        &self.modules[id.index()]
    }

    pub fn module_mut(&mut self, id: ModId) -> &mut Module {
        &mut self.modules[id.index()]
    }

    pub fn fn_ids(&self) -> impl Iterator<Item = FnId> {
        (0..self.functions.len() as u32).map(FnId)
    }

    pub fn function_by_name(&self, name: &str) -> Option<FnId> {
        self.fn_ids().find(|&f| self.func(f).name == name)
    }

    pub fn type_by_name(&self, name: &str) -> Option<TypeId> {
        (0..self.types.len() as u32)
            .map(TypeId)
            .find(|&t| self.type_def(t).name == name)
    }

    /// The module a scope ultimately belongs to.
    pub fn module_of(&self, scope: Scope) -> ModId {
        let mut scope = scope;
        loop {
            match scope {
                Scope::Module(m) => return m,
                Scope::Function(f) => scope = self.func(f).parent,
            }
        }
    }

    /// True if `outer` lexically encloses `inner` (or is the same function).
    pub fn encloses(&self, outer: FnId, inner: FnId) -> bool {
        let mut cur = Scope::Function(inner);
        while let Scope::Function(f) = cur {
            if f == outer {
                return true;
            }
            cur = self.func(f).parent;
        }
        false
    }

    /// Hand out a global name that no function, type or module uses yet.
    pub fn fresh_name(&mut self, base: &str) -> String {
        let count = self.names.entry(base.to_string()).or_insert(0);
        *count += 1;
        if *count == 1 {
            return base.to_string();
        }
        let mut n = *count - 1;
        loop {
            let candidate = format!("{}_{}", base, n);
            if !self.names.contains_key(&candidate) {
                self.names.insert(candidate.clone(), 1);
                return candidate;
            }
            n += 1;
        }
    }

    fn reserve_name(&mut self, name: &str) {
        *self.names.entry(name.to_string()).or_insert(0) += 1;
    }

    /// `(file name, 1-based line)` of a span, for reports.
    pub fn location(&self, span: Span) -> (String, u32) {
        match self.sources.get(span.file_id as usize) {
            Some(src) => (src.name.clone(), src.lines.line_of(span.start)),
            None => ("<unknown>".to_string(), 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_name_avoids_collisions() {
        let mut p = Program::new();
        let m = p.add_module("m", 0);
        p.add_function(Function::new("gpu_kernel0", Scope::Module(m)));
        assert_eq!(p.fresh_name("gpu_kernel1"), "gpu_kernel1");
        assert_eq!(p.fresh_name("gpu_kernel0"), "gpu_kernel0_1");
        assert_eq!(p.fresh_name("gpu_kernel0"), "gpu_kernel0_2");
    }

    #[test]
    fn test_module_of_walks_nesting() {
        let mut p = Program::new();
        let m = p.add_module("m", 0);
        let outer = p.add_function(Function::new("outer", Scope::Module(m)));
        let inner = p.add_function(Function::new("inner", Scope::Function(outer)));
        assert_eq!(p.module_of(Scope::Function(inner)), m);
        assert!(p.encloses(outer, inner));
        assert!(!p.encloses(inner, outer));
    }

    #[test]
    fn test_wide_and_reference_like() {
        let wide = Type::Ref(Box::new(Type::Wide(Box::new(Type::Int))));
        assert!(wide.is_wide());
        assert!(wide.is_ref());
        assert!(Type::Array(Box::new(Type::Real)).is_reference_like());
        assert!(!Type::Int.is_reference_like());
        assert_eq!(Type::Array(Box::new(Type::Real)).element(), Some(&Type::Real));
    }
}
