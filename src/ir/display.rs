//! Textual rendering of a [`Program`] in `.oir` syntax.
//!
//! The output is accepted by [`crate::syntax::parse_program`]. Symbols whose
//! names would be ambiguous in their scope (typically copies made by the
//! pass) are printed as `name.<id>`.

use std::collections::HashMap;
use std::fmt::Write;

use super::{
    Block, BlockKind, Call, Callee, CForLoop, Expr, FnId, Function, Literal, ModId, PrimOp,
    Program, Scope, Stmt, SymId, Type,
};

/// Print every module of the program.
pub fn print_program(program: &Program) -> String {
    let names = Names::new(program);
    let mut p = Printer {
        program,
        names: &names,
        out: String::new(),
        indent: 0,
    };
    for m in 0..program.modules.len() {
        if m > 0 {
            p.out.push('\n');
        }
        p.module(ModId(m as u32));
    }
    p.out
}

/// Print one function (with its nested functions).
pub fn print_function(program: &Program, f: FnId) -> String {
    let names = Names::new(program);
    let mut p = Printer {
        program,
        names: &names,
        out: String::new(),
        indent: 0,
    };
    p.function(f);
    p.out
}

/// Print one statement block, for reports and test failure messages.
pub fn print_block(program: &Program, block: &Block) -> String {
    let names = Names::new(program);
    let mut p = Printer {
        program,
        names: &names,
        out: String::new(),
        indent: 0,
    };
    for s in &block.stmts {
        p.stmt(s);
    }
    p.out
}

pub fn type_name(program: &Program, ty: &Type) -> String {
    match ty {
        Type::Void => "void".into(),
        Type::Bool => "bool".into(),
        Type::Int => "int".into(),
        Type::UInt => "uint".into(),
        Type::Real => "real".into(),
        Type::CString => "string".into(),
        Type::CVoidPtr => "c_ptr".into(),
        Type::Ref(t) => format!("ref {}", type_name(program, t)),
        Type::Wide(t) => format!("wide {}", type_name(program, t)),
        Type::Array(t) => format!("[{}]", type_name(program, t)),
        Type::Class(id) => program.type_def(*id).name.clone(),
    }
}

// ─── Name disambiguation ──────────────────────────────────────────

struct Names {
    display: Vec<String>,
}

impl Names {
    fn new(program: &Program) -> Self {
        let mut by_name: HashMap<&str, Vec<SymId>> = HashMap::new();
        for (i, s) in program.symbols.iter().enumerate() {
            by_name.entry(&s.name).or_default().push(SymId(i as u32));
        }
        let mut display: Vec<String> = program.symbols.iter().map(|s| s.name.clone()).collect();
        for ids in by_name.values() {
            if ids.len() < 2 {
                continue;
            }
            // The oldest symbol keeps its plain name.
            for &a in ids {
                let shadows_older = ids.iter().any(|&b| {
                    b < a && visible_together(program, program.sym(a).scope, program.sym(b).scope)
                });
                if shadows_older {
                    display[a.index()] = format!("{}.{}", program.sym(a).name, a.0);
                }
            }
        }
        Names { display }
    }

    fn get(&self, s: SymId) -> &str {
        &self.display[s.index()]
    }
}

/// True if symbols declared in `a` and `b` could both be in scope at once.
fn visible_together(program: &Program, a: Scope, b: Scope) -> bool {
    if program.module_of(a) != program.module_of(b) {
        return false;
    }
    match (a, b) {
        (Scope::Module(_), _) | (_, Scope::Module(_)) => true,
        (Scope::Function(fa), Scope::Function(fb)) => {
            program.encloses(fa, fb) || program.encloses(fb, fa)
        }
    }
}

// ─── Printer ──────────────────────────────────────────────────────

struct Printer<'a> {
    program: &'a Program,
    names: &'a Names,
    out: String,
    indent: usize,
}

impl Printer<'_> {
    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn module(&mut self, m: ModId) {
        let program = self.program;
        let module = program.module(m);
        self.line(&format!("module {} {{", module.name));
        self.indent += 1;
        for &t in &module.types {
            let def = program.type_def(t);
            let fields: Vec<String> = def
                .fields
                .iter()
                .map(|f| format!("{}: {}", f.name, type_name(program, &f.ty)))
                .collect();
            let attr = if def.carrier { " @carrier" } else { "" };
            self.line(&format!("class {}{} {{ {} }}", def.name, attr, fields.join(", ")));
        }
        for s in &module.init.stmts {
            self.stmt(s);
        }
        for &f in &module.functions {
            self.function(f);
        }
        self.indent -= 1;
        self.line("}");
    }

    fn function(&mut self, f: FnId) {
        let program = self.program;
        let func: &Function = program.func(f);
        let formals: Vec<String> = func
            .formals
            .iter()
            .map(|&s| {
                let sym = program.sym(s);
                let mut text = format!("{}: {}", self.names.get(s), type_name(program, &sym.ty));
                text.push_str(&sym_attrs(&sym.flags));
                text
            })
            .collect();
        let mut header = format!("fn {}({})", func.name, formals.join(", "));
        if func.ret != Type::Void {
            let _ = write!(header, ": {}", type_name(program, &func.ret));
        }
        let flags = &func.flags;
        for (on, attr) in [
            (flags.offload_requested, "@offload"),
            (flags.offload_target, "@kernel"),
            (flags.fit_for_offload, "@fit"),
            (flags.extern_fn, "@extern"),
            (flags.on_block, "@on_block"),
            (flags.non_blocking, "@non_blocking"),
            (flags.local_fn, "@local"),
            (flags.device_copy, "@device"),
        ] {
            if on {
                header.push(' ');
                header.push_str(attr);
            }
        }
        if flags.extern_fn {
            header.push(';');
            self.line(&header);
            return;
        }
        header.push_str(" {");
        self.line(&header);
        self.indent += 1;
        for s in &func.body.stmts {
            self.stmt(s);
        }
        for &n in &func.nested {
            self.function(n);
        }
        self.indent -= 1;
        self.line("}");
    }

    fn block_body(&mut self, block: &Block) {
        self.indent += 1;
        for s in &block.stmts {
            self.stmt(s);
        }
        self.indent -= 1;
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Def(s) => {
                let text = format!("{};", self.decl(*s));
                self.line(&text);
            }
            Stmt::Call(c) => {
                let text = format!("{};", self.simple(c));
                self.line(&text);
            }
            Stmt::Block(b) => {
                let head = match &b.kind {
                    BlockKind::Plain => "{".to_string(),
                    BlockKind::Local => "local {".to_string(),
                    BlockKind::Kernel {
                        work_items,
                        group_size,
                    } => format!("kernel({}, {}) {{", self.expr(work_items), self.expr(group_size)),
                };
                self.line(&head);
                self.block_body(b);
                self.line("}");
            }
            Stmt::Loop(lp) => self.cfor(lp),
            Stmt::Cond(c) => {
                let head = format!("if {} {{", self.expr(&c.test));
                self.line(&head);
                self.block_body(&c.then_block);
                match &c.else_block {
                    Some(e) => {
                        self.line("} else {");
                        self.block_body(e);
                        self.line("}");
                    }
                    None => self.line("}"),
                }
            }
            Stmt::Return(None) => self.line("return;"),
            Stmt::Return(Some(e)) => {
                let text = format!("return {};", self.expr(e));
                self.line(&text);
            }
        }
    }

    fn cfor(&mut self, lp: &CForLoop) {
        let header = |p: &Self, b: &Block| -> String {
            b.stmts
                .iter()
                .map(|s| match s {
                    Stmt::Def(sym) => p.decl(*sym),
                    Stmt::Call(c) => p.simple(c),
                    _ => "{ }".to_string(),
                })
                .collect::<Vec<_>>()
                .join(", ")
        };
        let attr = if lp.order_independent {
            "@order_independent "
        } else {
            ""
        };
        let text = format!(
            "for {}({}; {}; {}) {{",
            attr,
            header(self, &lp.init),
            header(self, &lp.test),
            header(self, &lp.incr)
        );
        self.line(&text);
        self.block_body(&lp.body);
        self.line("}");
    }

    fn decl(&self, s: SymId) -> String {
        let sym = self.program.sym(s);
        let ty = type_name(self.program, &sym.ty);
        let name = self.names.get(s);
        if sym.flags.type_alias {
            return format!("type {} = {}", name, ty);
        }
        let keyword = if sym.flags.param {
            "param"
        } else if sym.flags.constant {
            "const"
        } else {
            "var"
        };
        format!("{} {}: {}{}", keyword, name, ty, sym_attrs(&sym.flags))
    }

    /// A call in statement position: assignments use operator syntax.
    fn simple(&self, call: &Call) -> String {
        if let Some(op) = call.prim_op() {
            if let (Some(infix), 2) = (op.assign_infix(), call.args.len()) {
                return format!(
                    "{} {} {}",
                    self.expr(&call.args[0]),
                    infix,
                    self.expr(&call.args[1])
                );
            }
        }
        self.call(call)
    }

    fn call(&self, call: &Call) -> String {
        let args: Vec<String> = call.args.iter().map(|a| self.operand(a)).collect();
        match call.callee {
            Callee::Prim(op) => {
                if let (Some(infix), 2) = (op.infix(), args.len()) {
                    return format!("{} {} {}", args[0], infix, args[1]);
                }
                format!("{}({})", op.name(), self.plain_args(call))
            }
            Callee::Fn(f) => format!("{}({})", self.program.func(f).name, self.plain_args(call)),
        }
    }

    fn plain_args(&self, call: &Call) -> String {
        call.args
            .iter()
            .map(|a| self.expr(a))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// An infix operand: nested infix calls are parenthesized.
    fn operand(&self, e: &Expr) -> String {
        match e {
            Expr::Call(c) if c.prim_op().and_then(PrimOp::infix).is_some() => {
                format!("({})", self.expr(e))
            }
            _ => self.expr(e),
        }
    }

    fn expr(&self, e: &Expr) -> String {
        match e {
            Expr::Sym(s) => self.names.get(*s).to_string(),
            Expr::Lit(l) => literal(l),
            Expr::Type(t) => format!("type {}", self.program.type_def(*t).name),
            Expr::Call(c) => self.call(c),
        }
    }
}

fn sym_attrs(flags: &super::SymFlags) -> String {
    let mut out = String::new();
    for (on, attr) in [
        (flags.temp, " @temp"),
        (flags.concurrently_accessed, " @concurrent"),
        (flags.no_codegen, " @nocodegen"),
    ] {
        if on {
            out.push_str(attr);
        }
    }
    out
}

fn literal(l: &Literal) -> String {
    match l {
        Literal::Int(v) if *v < 0 => format!("({})", v),
        Literal::Int(v) => v.to_string(),
        Literal::Real(v) => format!("{:?}", v),
        Literal::Bool(b) => b.to_string(),
        Literal::Str(s) => {
            let mut out = String::from("\"");
            for c in s.chars() {
                match c {
                    '"' => out.push_str("\\\""),
                    '\\' => out.push_str("\\\\"),
                    '\n' => out.push_str("\\n"),
                    '\t' => out.push_str("\\t"),
                    c => out.push(c),
                }
            }
            out.push('"');
            out
        }
    }
}
