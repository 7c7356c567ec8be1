//! Runtime choice between the kernel launch and the original loop.
//!
//! ```text
//! {
//!     var _is_gpu: bool @temp;
//!     _is_gpu := is_gpu_sublocale();
//!     if _is_gpu { <launch> } else { <copy of the loop> }
//! }
//! ```

use crate::ir::{Block, CForLoop, Cond, Expr, FnId, PrimOp, Program, Scope, Stmt, SymbolMap, Type};

/// The statement that replaces `lp` once `gpu_path` exists.
pub fn dual_path(program: &mut Program, enclosing: FnId, lp: &CForLoop, gpu_path: Block) -> Stmt {
    let scope = Scope::Function(enclosing);
    let cpu_loop = program.copy_loop(lp, &mut SymbolMap::new(), scope);
    let is_gpu = program.new_temp("_is_gpu", Type::Bool, scope);
    Stmt::Block(Block::with_stmts(vec![
        Stmt::Def(is_gpu),
        Stmt::mov(is_gpu, Expr::prim(PrimOp::IsGpuSublocale, vec![])),
        Stmt::Cond(Cond {
            test: Expr::Sym(is_gpu),
            then_block: gpu_path,
            else_block: Some(Block::with_stmts(vec![Stmt::Loop(cpu_loop)])),
        }),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::display::print_block;
    use crate::syntax::parse_program;

    #[test]
    fn test_wraps_both_paths() {
        let src = "module m { var A: [int]; fn f(n: int) { for (var i: int = 0; i < n; i += 1) { A[i] = i; } } }";
        let mut p = parse_program("t.oir", src).expect("parses");
        let f = p.function_by_name("f").expect("f");
        let Some(Stmt::Loop(lp)) = p.func(f).body.stmts.first().cloned() else {
            panic!("expected loop");
        };
        let stmt = dual_path(&mut p, f, &lp, Block::new());
        let Stmt::Block(block) = &stmt else {
            panic!("expected block");
        };
        let text = print_block(&p, block);
        assert!(text.starts_with("var _is_gpu: bool @temp;\n_is_gpu := is_gpu_sublocale();\nif _is_gpu {\n} else {\n"), "{}", text);

        // The CPU path declares its own header variable.
        let Stmt::Cond(cond) = &block.stmts[2] else {
            panic!("expected conditional");
        };
        let Some(Stmt::Loop(cpu)) = cond.else_block.as_ref().and_then(|b| b.stmts.first()) else {
            panic!("expected loop copy");
        };
        assert_ne!(cpu.init.stmts[0], lp.init.stmts[0]);
        assert_eq!(cpu.body.stmts.len(), lp.body.stmts.len());
    }
}
