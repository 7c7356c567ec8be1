//! Reference interpreter.
//!
//! Executes a [`Program`] before or after outlining so that both paths of a
//! rewritten loop can be compared. Kernel calls run one invocation per
//! work-item, sequentially, in the configured order; `get_global_id()` is
//! bound to the current work-item. A bundled kernel receives its carrier
//! by decoding the opaque bytes built by `cast_to_void_star`, so the byte
//! layout is exercised on every launch.
//!
//! By-reference formals are copy-in/copy-out. Variable lookup falls back
//! to the frames of callers, which is enough for nested functions that
//! read their parent's locals.

mod value;

pub use value::{Handle, HeapCell, Value};

use std::collections::HashMap;

use crate::ir::{
    Block, BlockKind, CForLoop, Call, Callee, Expr, FnId, Literal, PrimOp, Program, Scope, Stmt,
    SymId, Type, TypeId,
};
use crate::outline::layout::{CarrierLayout, LayoutError, SlotValue};

/// Handle word standing for `nil` inside a bundle.
const NIL_HANDLE: u64 = u64::MAX;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("no function named '{0}'")]
    NoEntry(String),

    #[error("'{0}' is read before it is declared")]
    UndefinedVariable(String),

    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("'{function}' takes {expected} argument(s), got {found}")]
    Arity {
        function: String,
        expected: usize,
        found: usize,
    },

    #[error("the target of an assignment must be a variable")]
    NotAssignable,

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow")]
    Overflow,

    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: i64, len: usize },

    #[error("nil handle dereferenced")]
    NilHandle,

    #[error("dangling handle {0}")]
    DanglingHandle(Handle),

    #[error("get_global_id() called outside a kernel")]
    NoWorkItem,

    #[error("cannot execute extern function '{0}'")]
    Extern(String),

    #[error("'{0}' is not supported by the interpreter")]
    Unsupported(&'static str),

    #[error("step limit of {0} exceeded")]
    StepLimit(u64),

    #[error("call depth limit of {0} exceeded")]
    CallDepth(usize),

    #[error("runtime error: {0}")]
    Runtime(String),

    #[error("bad carrier: {0}")]
    Layout(#[from] LayoutError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvalConfig {
    /// Value of `is_gpu_sublocale()`.
    pub accelerator: bool,
    /// Run work-items from last to first.
    pub reverse_work_items: bool,
    pub step_limit: u64,
    /// Nested calls allowed before the run fails with `CallDepth`.
    pub max_call_depth: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            accelerator: false,
            reverse_work_items: false,
            step_limit: 10_000_000,
            max_call_depth: 128,
        }
    }
}

/// Result of a whole-program run.
#[derive(Clone, Debug, Default)]
pub struct Execution {
    /// One entry per `writeln`.
    pub output: Vec<String>,
    pub steps: u64,
    /// Kernel launches (not work-items).
    pub launches: u64,
}

enum Flow {
    Next,
    Return(Value),
}

struct Frame {
    vars: HashMap<SymId, Value>,
}

pub struct Interpreter<'p> {
    program: &'p Program,
    config: EvalConfig,
    globals: HashMap<SymId, Value>,
    frames: Vec<Frame>,
    heap: Vec<HeapCell>,
    output: Vec<String>,
    steps: u64,
    launches: u64,
    work_item: Option<i64>,
}

/// Run module initializers, then `entry()`.
pub fn run(program: &Program, entry: &str, config: EvalConfig) -> Result<Execution, EvalError> {
    let f = program
        .function_by_name(entry)
        .ok_or_else(|| EvalError::NoEntry(entry.to_string()))?;
    let mut interp = Interpreter::new(program, config);
    interp.init()?;
    interp.call(f, Vec::new())?;
    Ok(interp.finish())
}

impl<'p> Interpreter<'p> {
    pub fn new(program: &'p Program, config: EvalConfig) -> Self {
        Self {
            program,
            config,
            globals: HashMap::new(),
            frames: Vec::new(),
            heap: Vec::new(),
            output: Vec::new(),
            steps: 0,
            launches: 0,
            work_item: None,
        }
    }

    /// Execute the top-level statements of every module, in order.
    pub fn init(&mut self) -> Result<(), EvalError> {
        let program = self.program;
        for module in &program.modules {
            self.exec_block(&module.init)?;
        }
        Ok(())
    }

    /// Call `f` with already evaluated arguments.
    pub fn call(&mut self, f: FnId, args: Vec<Value>) -> Result<Value, EvalError> {
        let program = self.program;
        let func = program.func(f);
        if func.flags.extern_fn {
            return Err(EvalError::Extern(func.name.clone()));
        }
        if func.flags.offload_target {
            self.launch(f, args)?;
            return Ok(Value::Void);
        }
        self.invoke(f, args).map(|(ret, _)| ret)
    }

    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// Current value of a module-level variable.
    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals
            .iter()
            .find(|(s, _)| self.program.sym(**s).name == name)
            .map(|(_, v)| v)
    }

    /// Elements of an array value.
    pub fn array(&self, value: &Value) -> Option<&[Value]> {
        match value {
            Value::Array(h) => match self.heap.get(*h) {
                Some(HeapCell::Array(items)) => Some(items),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn finish(self) -> Execution {
        Execution {
            output: self.output,
            steps: self.steps,
            launches: self.launches,
        }
    }

    // ─── Calls ────────────────────────────────────────────────────

    /// Run `f`'s body in a new frame. Returns the result and the final
    /// values of the formals.
    fn invoke(&mut self, f: FnId, args: Vec<Value>) -> Result<(Value, Vec<Value>), EvalError> {
        let program = self.program;
        let func = program.func(f);
        if args.len() != func.formals.len() {
            return Err(EvalError::Arity {
                function: func.name.clone(),
                expected: func.formals.len(),
                found: args.len(),
            });
        }
        if self.frames.len() >= self.config.max_call_depth {
            return Err(EvalError::CallDepth(self.config.max_call_depth));
        }
        let vars = func.formals.iter().copied().zip(args).collect();
        self.frames.push(Frame { vars });
        let flow = self.exec_block(&func.body);
        let frame = self.frames.pop();
        let flow = flow?;
        let finals = func
            .formals
            .iter()
            .map(|s| {
                frame
                    .as_ref()
                    .and_then(|fr| fr.vars.get(s))
                    .cloned()
                    .unwrap_or(Value::Void)
            })
            .collect();
        let ret = match flow {
            Flow::Return(v) => v,
            Flow::Next => Value::Void,
        };
        Ok((ret, finals))
    }

    fn call_expr(&mut self, call: &Call) -> Result<Value, EvalError> {
        match call.callee {
            Callee::Prim(op) => self.prim(op, &call.args),
            Callee::Fn(f) => {
                let program = self.program;
                let func = program.func(f);
                if func.flags.extern_fn {
                    return Err(EvalError::Extern(func.name.clone()));
                }
                let args = call
                    .args
                    .iter()
                    .map(|a| self.eval(a))
                    .collect::<Result<Vec<_>, _>>()?;
                if func.flags.offload_target {
                    self.launch(f, args)?;
                    return Ok(Value::Void);
                }
                let (ret, finals) = self.invoke(f, args)?;
                for ((formal, actual), value) in func.formals.iter().zip(&call.args).zip(finals) {
                    if program.sym(*formal).ty.is_ref() {
                        if let Expr::Sym(s) = actual {
                            self.write(*s, value);
                        }
                    }
                }
                Ok(ret)
            }
        }
    }

    /// Launch kernel `f`: the last argument is the work-item count.
    fn launch(&mut self, f: FnId, mut args: Vec<Value>) -> Result<(), EvalError> {
        let program = self.program;
        let func = program.func(f);
        if args.len() < 2 || args.len() != func.formals.len() {
            return Err(EvalError::Arity {
                function: func.name.clone(),
                expected: func.formals.len(),
                found: args.len(),
            });
        }
        let count = args[args.len() - 1].as_int()?.max(0);

        // A bundled kernel gets its carrier back from the opaque bytes.
        let bytes = match args.first() {
            Some(Value::Bundle(b)) => Some(b.clone()),
            _ => None,
        };
        if let (Some(bytes), Some(&formal)) = (bytes, func.formals.get(1)) {
            if let Type::Class(t) = program.sym(formal).ty {
                args[1] = self.unpack_bundle(t, &bytes)?;
            }
        }

        self.launches += 1;
        let saved = self.work_item;
        let result = if self.config.reverse_work_items {
            (0..count).rev().try_for_each(|k| self.work_item_call(f, &args, k))
        } else {
            (0..count).try_for_each(|k| self.work_item_call(f, &args, k))
        };
        self.work_item = saved;
        result
    }

    // ─── Statements ───────────────────────────────────────────────

    fn work_item_call(&mut self, f: FnId, args: &[Value], k: i64) -> Result<(), EvalError> {
        self.tick()?;
        self.work_item = Some(k);
        self.invoke(f, args.to_vec()).map(|_| ())
    }

    fn tick(&mut self) -> Result<(), EvalError> {
        self.steps += 1;
        if self.steps > self.config.step_limit {
            return Err(EvalError::StepLimit(self.config.step_limit));
        }
        Ok(())
    }

    fn exec_block(&mut self, block: &Block) -> Result<Flow, EvalError> {
        if let BlockKind::Kernel { work_items, .. } = &block.kind {
            return self.exec_kernel_block(work_items, &block.stmts);
        }
        for stmt in &block.stmts {
            if let Flow::Return(v) = self.exec_stmt(stmt)? {
                return Ok(Flow::Return(v));
            }
        }
        Ok(Flow::Next)
    }

    /// A kernel block that was never outlined runs inline, once per
    /// work-item.
    fn exec_kernel_block(&mut self, work_items: &Expr, stmts: &[Stmt]) -> Result<Flow, EvalError> {
        let count = self.eval(work_items)?.as_int()?.max(0);
        let saved = self.work_item;
        let mut flow = Ok(Flow::Next);
        'items: for k in 0..count {
            self.work_item = Some(k);
            for stmt in stmts {
                match self.exec_stmt(stmt) {
                    Ok(Flow::Next) => {}
                    other => {
                        flow = other;
                        break 'items;
                    }
                }
            }
        }
        self.work_item = saved;
        flow
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> Result<Flow, EvalError> {
        self.tick()?;
        match stmt {
            Stmt::Def(s) => {
                let value = Value::default_of(&self.program.sym(*s).ty);
                self.declare(*s, value);
            }
            Stmt::Call(call) => {
                self.call_expr(call)?;
            }
            Stmt::Block(b) => return self.exec_block(b),
            Stmt::Loop(lp) => return self.exec_loop(lp),
            Stmt::Cond(c) => {
                if self.eval(&c.test)?.truthy()? {
                    return self.exec_block(&c.then_block);
                }
                if let Some(e) = &c.else_block {
                    return self.exec_block(e);
                }
            }
            Stmt::Return(None) => return Ok(Flow::Return(Value::Void)),
            Stmt::Return(Some(e)) => return Ok(Flow::Return(self.eval(e)?)),
        }
        Ok(Flow::Next)
    }

    fn exec_loop(&mut self, lp: &CForLoop) -> Result<Flow, EvalError> {
        self.exec_block(&lp.init)?;
        loop {
            self.tick()?;
            if !self.loop_test(&lp.test)? {
                return Ok(Flow::Next);
            }
            if let Flow::Return(v) = self.exec_block(&lp.body)? {
                return Ok(Flow::Return(v));
            }
            self.exec_block(&lp.incr)?;
        }
    }

    /// The value of the last header call decides the test.
    fn loop_test(&mut self, test: &Block) -> Result<bool, EvalError> {
        let mut last = Value::Bool(true);
        for stmt in &test.stmts {
            match stmt {
                Stmt::Call(call) => last = self.call_expr(call)?,
                other => {
                    self.exec_stmt(other)?;
                }
            }
        }
        last.truthy()
    }

    // ─── Variables ────────────────────────────────────────────────

    fn declare(&mut self, s: SymId, value: Value) {
        match (self.program.sym(s).scope, self.frames.last_mut()) {
            (Scope::Function(_), Some(frame)) => {
                frame.vars.insert(s, value);
            }
            _ => {
                self.globals.insert(s, value);
            }
        }
    }

    fn read(&self, s: SymId) -> Result<Value, EvalError> {
        self.frames
            .iter()
            .rev()
            .find_map(|fr| fr.vars.get(&s))
            .or_else(|| self.globals.get(&s))
            .cloned()
            .ok_or_else(|| EvalError::UndefinedVariable(self.program.sym(s).name.clone()))
    }

    fn write(&mut self, s: SymId, value: Value) {
        if let Some(slot) = self
            .frames
            .iter_mut()
            .rev()
            .find_map(|fr| fr.vars.get_mut(&s))
        {
            *slot = value;
            return;
        }
        if let Some(slot) = self.globals.get_mut(&s) {
            *slot = value;
            return;
        }
        self.declare(s, value);
    }

    fn target(args: &[Expr]) -> Result<SymId, EvalError> {
        args.first().and_then(Expr::as_sym).ok_or(EvalError::NotAssignable)
    }

    // ─── Expressions ──────────────────────────────────────────────

    fn eval(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Sym(s) => self.read(*s),
            Expr::Lit(Literal::Int(v)) => Ok(Value::Int(*v)),
            Expr::Lit(Literal::Real(v)) => Ok(Value::Real(*v)),
            Expr::Lit(Literal::Bool(b)) => Ok(Value::Bool(*b)),
            Expr::Lit(Literal::Str(s)) => Ok(Value::Str(s.clone())),
            Expr::Type(_) => Err(EvalError::Unsupported("type operand outside an allocation")),
            Expr::Call(c) => self.call_expr(c),
        }
    }

    fn arg(&mut self, args: &[Expr], i: usize) -> Result<Value, EvalError> {
        match args.get(i) {
            Some(e) => self.eval(e),
            None => Err(EvalError::Unsupported("missing primitive operand")),
        }
    }

    fn prim(&mut self, op: PrimOp, args: &[Expr]) -> Result<Value, EvalError> {
        use PrimOp::*;
        match op {
            Noop | LocalCheck | ArrayFree | HereFree | HeapBroadcastGlobalVars
            | PrivateBroadcast | SetSerial | SetEndCount => Ok(Value::Void),

            Move | Assign | SetReference => {
                let t = Self::target(args)?;
                let v = self.arg(args, 1)?;
                self.write(t, v.clone());
                Ok(v)
            }
            AddAssign | SubtractAssign | MultAssign | DivAssign | ModAssign | LshAssign
            | RshAssign | AndAssign | OrAssign | XorAssign => {
                let t = Self::target(args)?;
                let rhs = self.arg(args, 1)?;
                let arith = op.arith_of_op_assign().ok_or(EvalError::Unsupported("compound assignment"))?;
                let v = binary(arith, self.read(t)?, rhs)?;
                self.write(t, v.clone());
                Ok(v)
            }

            UnaryMinus => match self.arg(args, 0)? {
                Value::Real(v) => Ok(Value::Real(-v)),
                v => v.as_int()?.checked_neg().map(Value::Int).ok_or(EvalError::Overflow),
            },
            UnaryNot => match self.arg(args, 0)? {
                Value::Bool(b) => Ok(Value::Bool(!b)),
                v => Ok(Value::Int(!v.as_int()?)),
            },
            UnaryLNot => Ok(Value::Bool(!self.arg(args, 0)?.truthy()?)),

            Add | Subtract | Mult | Div | Mod | Lsh | Rsh | And | Or | Xor | Pow | Min | Max
            | Equal | NotEqual | LessOrEqual | GreaterOrEqual | Less | Greater | PtrEqual
            | PtrNotEqual => {
                let a = self.arg(args, 0)?;
                let b = self.arg(args, 1)?;
                binary(op, a, b)
            }

            GetMember | GetMemberValue => {
                let obj = self.arg(args, 0)?;
                let k = self.arg(args, 1)?.as_int()?;
                let fields = self.object_fields(&obj)?;
                field_at(fields, k).cloned()
            }
            SetMember => {
                let obj = self.arg(args, 0)?;
                let k = self.arg(args, 1)?.as_int()?;
                let v = self.arg(args, 2)?;
                let fields = self.object_fields_mut(&obj)?;
                let len = fields.len();
                let slot = usize::try_from(k)
                    .ok()
                    .and_then(|i| fields.get_mut(i))
                    .ok_or(EvalError::IndexOutOfBounds { index: k, len })?;
                *slot = v;
                Ok(Value::Void)
            }
            CheckNil => match self.arg(args, 0)? {
                Value::Nil => Err(EvalError::NilHandle),
                _ => Ok(Value::Void),
            },
            AddrOf | Deref | Cast | StringCopy => self.arg(args, 0),
            SizeOf => match args.first() {
                Some(Expr::Type(t)) => Ok(Value::Int(i64::from(CarrierLayout::of(self.program, *t).size))),
                _ => Err(EvalError::Unsupported("sizeof of a non-type")),
            },
            CastToVoidStar => {
                let obj = self.arg(args, 0)?;
                self.pack_object(&obj)
            }

            ArrayAlloc => {
                let n = self.arg(args, 0)?.as_int()?;
                let init = if args.len() > 1 { self.arg(args, 1)? } else { Value::Int(0) };
                let n = usize::try_from(n).map_err(|_| EvalError::IndexOutOfBounds { index: n, len: 0 })?;
                Ok(Value::Array(self.alloc(HeapCell::Array(vec![init; n]))))
            }
            ArrayGet | ArrayGetValue => {
                let a = self.arg(args, 0)?;
                let i = self.arg(args, 1)?.as_int()?;
                let items = self.array_items(&a)?;
                field_at(items, i).cloned()
            }
            ArraySet => {
                let a = self.arg(args, 0)?;
                let i = self.arg(args, 1)?.as_int()?;
                let v = self.arg(args, 2)?;
                let items = self.array_items_mut(&a)?;
                let len = items.len();
                let slot = usize::try_from(i)
                    .ok()
                    .and_then(|i| items.get_mut(i))
                    .ok_or(EvalError::IndexOutOfBounds { index: i, len })?;
                *slot = v;
                Ok(Value::Void)
            }
            HereAlloc => match args.first() {
                Some(Expr::Type(t)) => {
                    let fields = self
                        .program
                        .type_def(*t)
                        .fields
                        .iter()
                        .map(|f| Value::default_of(&f.ty))
                        .collect();
                    Ok(Value::Object(self.alloc(HeapCell::Object { ty: *t, fields })))
                }
                _ => Err(EvalError::Unsupported("here_alloc of a non-type")),
            },

            CommGet | CommPut | CommArrayGet | CommArrayPut => Err(EvalError::Unsupported(op.name())),

            RtError => {
                let msg = self.arg(args, 0)?;
                Err(EvalError::Runtime(msg.to_string()))
            }
            RtWarning => {
                let msg = self.arg(args, 0)?;
                log::warn!("{}", msg);
                Ok(Value::Void)
            }
            GetUserLine => Ok(Value::Int(0)),
            GetUserFile => Ok(Value::Str(String::new())),
            Write => {
                let mut line = String::new();
                for a in args {
                    line.push_str(&self.eval(a)?.to_string());
                }
                self.output.push(line);
                Ok(Value::Void)
            }

            OnLocaleNum | WideGetLocale | WideGetNode | GetEndCount => Ok(Value::Int(0)),
            GetSerial => Ok(Value::Bool(true)),
            IsGpuSublocale => Ok(Value::Bool(self.config.accelerator)),
            GetGlobalId => self.work_item.map(Value::Int).ok_or(EvalError::NoWorkItem),
        }
    }

    // ─── Heap ─────────────────────────────────────────────────────

    fn alloc(&mut self, cell: HeapCell) -> Handle {
        self.heap.push(cell);
        self.heap.len() - 1
    }

    fn cell_mut(&mut self, h: Handle) -> Result<&mut HeapCell, EvalError> {
        self.heap.get_mut(h).ok_or(EvalError::DanglingHandle(h))
    }

    fn array_items(&self, v: &Value) -> Result<&Vec<Value>, EvalError> {
        match v {
            Value::Array(h) => match self.heap.get(*h) {
                Some(HeapCell::Array(items)) => Ok(items),
                _ => Err(EvalError::DanglingHandle(*h)),
            },
            Value::Nil => Err(EvalError::NilHandle),
            other => Err(EvalError::TypeMismatch {
                expected: "array",
                found: other.kind(),
            }),
        }
    }

    fn array_items_mut(&mut self, v: &Value) -> Result<&mut Vec<Value>, EvalError> {
        match v {
            Value::Array(h) => match self.cell_mut(*h)? {
                HeapCell::Array(items) => Ok(items),
                _ => Err(EvalError::DanglingHandle(*h)),
            },
            Value::Nil => Err(EvalError::NilHandle),
            other => Err(EvalError::TypeMismatch {
                expected: "array",
                found: other.kind(),
            }),
        }
    }

    fn object_fields(&self, v: &Value) -> Result<&Vec<Value>, EvalError> {
        match v {
            Value::Object(h) => match self.heap.get(*h) {
                Some(HeapCell::Object { fields, .. }) => Ok(fields),
                _ => Err(EvalError::DanglingHandle(*h)),
            },
            Value::Nil => Err(EvalError::NilHandle),
            other => Err(EvalError::TypeMismatch {
                expected: "object",
                found: other.kind(),
            }),
        }
    }

    fn object_fields_mut(&mut self, v: &Value) -> Result<&mut Vec<Value>, EvalError> {
        match v {
            Value::Object(h) => match self.cell_mut(*h)? {
                HeapCell::Object { fields, .. } => Ok(fields),
                _ => Err(EvalError::DanglingHandle(*h)),
            },
            Value::Nil => Err(EvalError::NilHandle),
            other => Err(EvalError::TypeMismatch {
                expected: "object",
                found: other.kind(),
            }),
        }
    }

    // ─── Carriers ─────────────────────────────────────────────────

    fn pack_object(&mut self, obj: &Value) -> Result<Value, EvalError> {
        let Value::Object(h) = obj else {
            return Err(EvalError::TypeMismatch {
                expected: "object",
                found: obj.kind(),
            });
        };
        let (ty, fields) = match self.heap.get(*h) {
            Some(HeapCell::Object { ty, fields }) => (*ty, fields.clone()),
            _ => return Err(EvalError::DanglingHandle(*h)),
        };
        let program = self.program;
        let layout = CarrierLayout::of(program, ty);
        let mut slots = Vec::with_capacity(fields.len());
        for (field, value) in program.type_def(ty).fields.iter().zip(fields) {
            slots.push(self.to_slot(&field.ty, value)?);
        }
        Ok(Value::Bundle(layout.pack(&slots)?))
    }

    fn to_slot(&mut self, ty: &Type, value: Value) -> Result<SlotValue, EvalError> {
        Ok(match (ty, value) {
            (_, Value::Nil) => SlotValue::Handle(NIL_HANDLE),
            (_, Value::Array(h)) | (_, Value::Object(h)) => SlotValue::Handle(h as u64),
            (Type::Ref(_), v) => {
                // Scalars behind a reference travel boxed.
                SlotValue::Handle(self.alloc(HeapCell::Array(vec![v])) as u64)
            }
            (Type::Bool, v) => SlotValue::Bool(v.truthy()?),
            (Type::Int, v) => SlotValue::Int(v.as_int()?),
            (Type::UInt, v) => SlotValue::UInt(u64::try_from(v.as_int()?).map_err(|_| EvalError::Overflow)?),
            (Type::Real, v) => SlotValue::Real(v.as_real()?),
            (Type::CString, Value::Str(s)) => SlotValue::Handle(self.alloc(HeapCell::Str(s)) as u64),
            (_, v) => {
                return Err(EvalError::TypeMismatch {
                    expected: "carrier field",
                    found: v.kind(),
                })
            }
        })
    }

    fn unpack_bundle(&mut self, ty: TypeId, bytes: &[u8]) -> Result<Value, EvalError> {
        let program = self.program;
        let slots = CarrierLayout::of(program, ty).unpack(bytes)?;
        let mut fields = Vec::with_capacity(slots.len());
        for (field, slot) in program.type_def(ty).fields.iter().zip(slots) {
            fields.push(self.from_slot(&field.ty, slot)?);
        }
        Ok(Value::Object(self.alloc(HeapCell::Object { ty, fields })))
    }

    fn from_slot(&self, ty: &Type, slot: SlotValue) -> Result<Value, EvalError> {
        let h = match slot {
            SlotValue::Bool(b) => return Ok(Value::Bool(b)),
            SlotValue::Int(v) => return Ok(Value::Int(v)),
            SlotValue::UInt(v) => return Ok(Value::UInt(v)),
            SlotValue::Real(v) => return Ok(Value::Real(v)),
            SlotValue::Handle(NIL_HANDLE) => return Ok(Value::Nil),
            SlotValue::Handle(h) => usize::try_from(h).map_err(|_| EvalError::Overflow)?,
        };
        let pointee = match ty {
            Type::Wide(inner) => inner.as_ref(),
            other => other,
        };
        match (pointee, self.heap.get(h)) {
            (Type::Ref(inner), Some(HeapCell::Array(boxed))) if !inner.is_reference_like() => {
                boxed.first().cloned().ok_or(EvalError::DanglingHandle(h))
            }
            (_, Some(HeapCell::Array(_))) => Ok(Value::Array(h)),
            (_, Some(HeapCell::Object { .. })) => Ok(Value::Object(h)),
            (_, Some(HeapCell::Str(s))) => Ok(Value::Str(s.clone())),
            (_, None) => Err(EvalError::DanglingHandle(h)),
        }
    }
}

fn field_at(items: &[Value], i: i64) -> Result<&Value, EvalError> {
    usize::try_from(i)
        .ok()
        .and_then(|k| items.get(k))
        .ok_or(EvalError::IndexOutOfBounds {
            index: i,
            len: items.len(),
        })
}

fn equal(a: &Value, b: &Value) -> Result<bool, EvalError> {
    Ok(match (a, b) {
        (Value::Real(_), _) | (_, Value::Real(_)) => a.as_real()? == b.as_real()?,
        (Value::Int(_) | Value::UInt(_) | Value::Bool(_), Value::Int(_) | Value::UInt(_) | Value::Bool(_)) => {
            a.as_int()? == b.as_int()?
        }
        _ => a == b,
    })
}

/// Binary arithmetic, comparison and logic. Booleans act as 0/1 in
/// arithmetic; a real operand makes the operation real.
fn binary(op: PrimOp, a: Value, b: Value) -> Result<Value, EvalError> {
    use PrimOp::*;
    match op {
        Equal | PtrEqual => return Ok(Value::Bool(equal(&a, &b)?)),
        NotEqual | PtrNotEqual => return Ok(Value::Bool(!equal(&a, &b)?)),
        And | Or | Xor => {
            if let (Value::Bool(x), Value::Bool(y)) = (&a, &b) {
                let v = match op {
                    And => *x && *y,
                    Or => *x || *y,
                    _ => x ^ y,
                };
                return Ok(Value::Bool(v));
            }
        }
        _ => {}
    }

    if matches!(a, Value::Real(_)) || matches!(b, Value::Real(_)) {
        let (x, y) = (a.as_real()?, b.as_real()?);
        return Ok(match op {
            Less => Value::Bool(x < y),
            LessOrEqual => Value::Bool(x <= y),
            Greater => Value::Bool(x > y),
            GreaterOrEqual => Value::Bool(x >= y),
            Add => Value::Real(x + y),
            Subtract => Value::Real(x - y),
            Mult => Value::Real(x * y),
            Div => Value::Real(x / y),
            Mod => Value::Real(x % y),
            Pow => Value::Real(x.powf(y)),
            Min => Value::Real(x.min(y)),
            Max => Value::Real(x.max(y)),
            _ => return Err(EvalError::TypeMismatch { expected: "int", found: "real" }),
        });
    }

    let (x, y) = (a.as_int()?, b.as_int()?);
    let v = match op {
        Less => return Ok(Value::Bool(x < y)),
        LessOrEqual => return Ok(Value::Bool(x <= y)),
        Greater => return Ok(Value::Bool(x > y)),
        GreaterOrEqual => return Ok(Value::Bool(x >= y)),
        Add => x.checked_add(y),
        Subtract => x.checked_sub(y),
        Mult => x.checked_mul(y),
        Div | Mod if y == 0 => return Err(EvalError::DivisionByZero),
        Div => x.checked_div(y),
        Mod => x.checked_rem(y),
        Lsh => u32::try_from(y).ok().and_then(|s| x.checked_shl(s)),
        Rsh => u32::try_from(y).ok().and_then(|s| x.checked_shr(s)),
        And => Some(x & y),
        Or => Some(x | y),
        Xor => Some(x ^ y),
        Pow => u32::try_from(y).ok().and_then(|e| x.checked_pow(e)),
        Min => Some(x.min(y)),
        Max => Some(x.max(y)),
        _ => return Err(EvalError::Unsupported(op.name())),
    };
    v.map(Value::Int).ok_or(EvalError::Overflow)
}
