//! Counting-loop recognition.
//!
//! A loop is canonical when its header reads `i := start; i <cmp> bound;
//! i += step` (or `-=`) with every operand a plain symbol or literal.
//! Anything else is rejected by returning `None`.

use crate::ir::{CForLoop, Call, Expr, PrimOp, Stmt, SymId};

/// Comparison of the index against the bound, index on the left.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cmp {
    Lt,
    Le,
    Gt,
    Ge,
    Ne,
}

impl Cmp {
    fn from_prim(op: PrimOp) -> Option<Cmp> {
        Some(match op {
            PrimOp::Less => Cmp::Lt,
            PrimOp::LessOrEqual => Cmp::Le,
            PrimOp::Greater => Cmp::Gt,
            PrimOp::GreaterOrEqual => Cmp::Ge,
            PrimOp::NotEqual => Cmp::Ne,
            _ => return None,
        })
    }

    /// `bound < i` is `i > bound`.
    pub fn flip(self) -> Cmp {
        match self {
            Cmp::Lt => Cmp::Gt,
            Cmp::Le => Cmp::Ge,
            Cmp::Gt => Cmp::Lt,
            Cmp::Ge => Cmp::Le,
            Cmp::Ne => Cmp::Ne,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Cmp::Lt => "<",
            Cmp::Le => "<=",
            Cmp::Gt => ">",
            Cmp::Ge => ">=",
            Cmp::Ne => "!=",
        }
    }
}

/// Sign of the increment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoopShape {
    pub index: SymId,
    pub start: Expr,
    pub step: Expr,
    pub bound: Expr,
    pub cmp: Cmp,
    pub direction: Direction,
}

impl LoopShape {
    /// Header operands that are symbols (start, step, bound).
    pub fn operand_syms(&self) -> Vec<SymId> {
        [&self.start, &self.step, &self.bound]
            .into_iter()
            .filter_map(Expr::as_sym)
            .collect()
    }
}

pub fn recognize(lp: &CForLoop) -> Option<LoopShape> {
    let (index, start) = single_init(lp)?;
    let (direction, step) = single_incr(lp, index)?;
    let (cmp, bound) = single_test(lp, index)?;
    Some(LoopShape {
        index,
        start,
        step,
        bound,
        cmp,
        direction,
    })
}

fn single_init(lp: &CForLoop) -> Option<(SymId, Expr)> {
    let mut found = None;
    for stmt in &lp.init.stmts {
        match stmt {
            Stmt::Def(_) => {}
            Stmt::Call(call) => {
                let (target, value) = call.as_copy()?;
                if found.is_some() || !value.is_atom() {
                    return None;
                }
                found = Some((target, value.clone()));
            }
            _ => return None,
        }
    }
    found
}

fn single_incr(lp: &CForLoop, index: SymId) -> Option<(Direction, Expr)> {
    let mut found = None;
    for stmt in &lp.incr.stmts {
        let call = stmt.as_call()?;
        let (op, target, value) = call.as_op_assign()?;
        if found.is_some() || target != index || !value.is_atom() {
            return None;
        }
        let direction = match op {
            PrimOp::AddAssign => Direction::Ascending,
            PrimOp::SubtractAssign => Direction::Descending,
            _ => return None,
        };
        found = Some((direction, value.clone()));
    }
    found
}

fn single_test(lp: &CForLoop, index: SymId) -> Option<(Cmp, Expr)> {
    let mut found = None;
    for stmt in &lp.test.stmts {
        match stmt {
            Stmt::Def(_) => {}
            Stmt::Call(call) => {
                let cmp = comparison_of(call)?;
                if found.is_some() {
                    return None;
                }
                found = Some(normalize(cmp, index)?);
            }
            _ => return None,
        }
    }
    found
}

/// The comparison a test statement evaluates: the statement itself, or the
/// value moved into a condition temporary.
fn comparison_of(call: &Call) -> Option<&Call> {
    if let Some((_, value)) = call.as_copy() {
        return value.as_call().filter(|c| is_comparison(c));
    }
    Some(call).filter(|c| is_comparison(c))
}

fn is_comparison(call: &Call) -> bool {
    call.prim_op().is_some_and(PrimOp::is_comparison) && call.args.len() == 2
}

fn normalize(call: &Call, index: SymId) -> Option<(Cmp, Expr)> {
    let cmp = Cmp::from_prim(call.prim_op()?)?;
    let (lhs, rhs) = (&call.args[0], &call.args[1]);
    if !lhs.is_atom() || !rhs.is_atom() {
        return None;
    }
    match (lhs.as_sym() == Some(index), rhs.as_sym() == Some(index)) {
        (true, false) => Some((cmp, rhs.clone())),
        (false, true) => Some((cmp.flip(), lhs.clone())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Literal, Program};
    use crate::syntax::parse_program;

    fn first_loop(src: &str) -> (Program, CForLoop) {
        let full = format!("module m {{ var A: [int]; fn f(n: int, s: int) {{ var i: int; {} }} }}", src);
        let p = parse_program("t.oir", &full).expect("parses");
        let f = p.function_by_name("f").expect("f");
        let lp = p
            .func(f)
            .body
            .stmts
            .iter()
            .find_map(|s| match s {
                Stmt::Loop(lp) => Some(lp.clone()),
                _ => None,
            })
            .expect("loop");
        (p, lp)
    }

    fn sym_named(p: &Program, e: &Expr) -> String {
        p.sym(e.as_sym().expect("symbol")).name.clone()
    }

    #[test]
    fn test_ascending_loop() {
        let (p, lp) = first_loop("for (i := 0; i < n; i += 2) { A[i] = 1; }");
        let shape = recognize(&lp).expect("canonical");
        assert_eq!(p.sym(shape.index).name, "i");
        assert_eq!(shape.start, Expr::Lit(Literal::Int(0)));
        assert_eq!(shape.step, Expr::Lit(Literal::Int(2)));
        assert_eq!(sym_named(&p, &shape.bound), "n");
        assert_eq!(shape.cmp, Cmp::Lt);
        assert_eq!(shape.direction, Direction::Ascending);
    }

    #[test]
    fn test_index_on_the_right_is_flipped() {
        let (_, lp) = first_loop("for (i := n; 0 <= i; i -= s) { A[i] = 1; }");
        let shape = recognize(&lp).expect("canonical");
        assert_eq!(shape.cmp, Cmp::Ge);
        assert_eq!(shape.direction, Direction::Descending);
        assert_eq!(shape.bound, Expr::int(0));
    }

    #[test]
    fn test_condition_temporary_is_accepted() {
        let (_, lp) = first_loop(
            "for (i := 0; var c: bool = i != n; i += 1) { A[i] = 1; }",
        );
        let shape = recognize(&lp).expect("canonical");
        assert_eq!(shape.cmp, Cmp::Ne);
    }

    #[test]
    fn test_header_declared_index() {
        let (_, lp) = first_loop("for (var j: int = 0; j < n; j += 1) { A[j] = 1; }");
        assert!(recognize(&lp).is_some());
    }

    #[test]
    fn test_non_canonical_loops_fail_closed() {
        let cases = [
            // two assignments in init
            "for (i := 0, s := 1; i < n; i += 1) { }",
            // test on a variable with no init
            "for (i := 0; s < n; i += 1) { }",
            // two comparisons
            "for (i := 0; i < n, i < s; i += 1) { }",
            // non-atomic bound
            "for (i := 0; i < n + 1; i += 1) { }",
            // multiplicative update
            "for (i := 1; i < n; i *= 2) { }",
            // equality test
            "for (i := 0; i == n; i += 1) { }",
            // increment of another variable
            "for (i := 0; i < n; s += 1) { }",
            // empty header
            "for (; ; ) { }",
        ];
        for case in cases {
            let (_, lp) = first_loop(case);
            assert!(recognize(&lp).is_none(), "accepted: {}", case);
        }
    }
}
