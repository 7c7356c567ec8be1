//! Closed-form iteration counts.

use crate::ir::{Expr, Literal, PrimOp, Program, Type};

use super::shape::{Cmp, Direction, LoopShape};

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TripError {
    #[error("comparison '{cmp}' never terminates a {direction} loop")]
    DirectionMismatch {
        cmp: &'static str,
        direction: &'static str,
    },

    #[error("step must be positive")]
    NonPositiveStep,

    #[error("'!=' test requires a step of 1")]
    NonUnitInequality,

    #[error("loop bounds must be integers")]
    NonInteger,
}

/// IR for the number of iterations of a canonical loop, and for the value
/// the index holds after the last one.
#[derive(Clone, Debug, PartialEq)]
pub struct TripCount {
    /// Clamped distance `max(d, 0)` covered by the index.
    pub distance: Expr,
    /// `distance / step + (distance % step != 0)`.
    pub count: Expr,
}

pub fn synthesize(program: &Program, shape: &LoopShape) -> Result<TripCount, TripError> {
    for operand in [&shape.start, &shape.step, &shape.bound] {
        if !is_integer(program, operand) {
            return Err(TripError::NonInteger);
        }
    }
    match &shape.step {
        Expr::Lit(Literal::Int(v)) if *v <= 0 => return Err(TripError::NonPositiveStep),
        _ => {}
    }

    let ascending = shape.direction == Direction::Ascending;
    let inclusive = match (shape.cmp, ascending) {
        (Cmp::Lt, true) | (Cmp::Gt, false) => false,
        (Cmp::Le, true) | (Cmp::Ge, false) => true,
        (Cmp::Ne, _) => {
            if shape.step != Expr::int(1) {
                return Err(TripError::NonUnitInequality);
            }
            false
        }
        (cmp, _) => {
            return Err(TripError::DirectionMismatch {
                cmp: cmp.symbol(),
                direction: if ascending { "ascending" } else { "descending" },
            })
        }
    };

    let (from, to) = if ascending {
        (&shape.start, &shape.bound)
    } else {
        (&shape.bound, &shape.start)
    };
    let mut raw = binary(PrimOp::Subtract, to.clone(), from.clone());
    if inclusive {
        raw = binary(PrimOp::Add, raw, Expr::int(1));
    }
    let distance = binary(PrimOp::Max, raw, Expr::int(0));

    let quotient = binary(PrimOp::Div, distance.clone(), shape.step.clone());
    let remainder = binary(PrimOp::Mod, distance.clone(), shape.step.clone());
    let partial = binary(PrimOp::NotEqual, remainder, Expr::int(0));
    let count = binary(PrimOp::Add, quotient, partial);
    Ok(TripCount { distance, count })
}

/// `start ± step * k`: the index value at work-item (or iteration) `k`.
pub fn index_at(shape: &LoopShape, k: Expr) -> Expr {
    let op = match shape.direction {
        Direction::Ascending => PrimOp::Add,
        Direction::Descending => PrimOp::Subtract,
    };
    binary(
        op,
        shape.start.clone(),
        binary(PrimOp::Mult, shape.step.clone(), k),
    )
}

fn binary(op: PrimOp, a: Expr, b: Expr) -> Expr {
    Expr::prim(op, vec![a, b])
}

fn is_integer(program: &Program, e: &Expr) -> bool {
    match e {
        Expr::Lit(Literal::Int(_)) => true,
        Expr::Sym(s) => matches!(program.sym(*s).ty, Type::Int | Type::UInt),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::SymId;

    fn shape(start: i64, bound: i64, step: i64, cmp: Cmp, direction: Direction) -> LoopShape {
        LoopShape {
            index: SymId(0),
            start: Expr::int(start),
            step: Expr::int(step),
            bound: Expr::int(bound),
            cmp,
            direction,
        }
    }

    /// Constant-fold the integer expressions the synthesizer emits.
    fn fold(e: &Expr) -> i64 {
        match e {
            Expr::Lit(Literal::Int(v)) => *v,
            Expr::Call(c) => {
                let a = fold(&c.args[0]);
                let b = fold(&c.args[1]);
                match c.prim_op().expect("prim") {
                    PrimOp::Add => a + b,
                    PrimOp::Subtract => a - b,
                    PrimOp::Mult => a * b,
                    PrimOp::Div => a / b,
                    PrimOp::Mod => a % b,
                    PrimOp::Max => a.max(b),
                    PrimOp::NotEqual => (a != b) as i64,
                    op => panic!("unexpected {}", op),
                }
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    fn count(s: &LoopShape) -> i64 {
        fold(&synthesize(&Program::new(), s).expect("closed form").count)
    }

    fn iterate(s: &LoopShape) -> i64 {
        let (start, bound, step) = (fold(&s.start), fold(&s.bound), fold(&s.step));
        let mut i = start;
        let mut n = 0;
        loop {
            let go = match s.cmp {
                Cmp::Lt => i < bound,
                Cmp::Le => i <= bound,
                Cmp::Gt => i > bound,
                Cmp::Ge => i >= bound,
                Cmp::Ne => i != bound,
            };
            if !go {
                return n;
            }
            n += 1;
            i = match s.direction {
                Direction::Ascending => i + step,
                Direction::Descending => i - step,
            };
        }
    }

    #[test]
    fn test_documented_counts() {
        assert_eq!(count(&shape(0, 10, 2, Cmp::Lt, Direction::Ascending)), 5);
        assert_eq!(count(&shape(0, 10, 3, Cmp::Le, Direction::Ascending)), 4);
        assert_eq!(count(&shape(10, 0, 3, Cmp::Gt, Direction::Descending)), 4);
        assert_eq!(count(&shape(0, 7, 1, Cmp::Ne, Direction::Ascending)), 7);
    }

    #[test]
    fn test_empty_ranges_clamp_to_zero() {
        assert_eq!(count(&shape(10, 0, 1, Cmp::Lt, Direction::Ascending)), 0);
        assert_eq!(count(&shape(0, 5, 2, Cmp::Ge, Direction::Descending)), 0);
        assert_eq!(count(&shape(3, 3, 1, Cmp::Lt, Direction::Ascending)), 0);
    }

    #[test]
    fn test_matches_iteration() {
        for (cmp, dir) in [
            (Cmp::Lt, Direction::Ascending),
            (Cmp::Le, Direction::Ascending),
            (Cmp::Gt, Direction::Descending),
            (Cmp::Ge, Direction::Descending),
        ] {
            for step in 1..4 {
                for bound in -3..8 {
                    let s = shape(2, bound, step, cmp, dir);
                    assert_eq!(count(&s), iterate(&s), "{:?} {:?} step {} bound {}", cmp, dir, step, bound);
                }
            }
        }
    }

    #[test]
    fn test_exit_value() {
        let s = shape(0, 10, 3, Cmp::Le, Direction::Ascending);
        let n = count(&s);
        assert_eq!(fold(&index_at(&s, Expr::int(n))), 12);
        let d = shape(9, 0, 2, Cmp::Gt, Direction::Descending);
        let n = count(&d);
        assert_eq!(fold(&index_at(&d, Expr::int(n))), -1);
    }

    #[test]
    fn test_closed_form_failures() {
        let p = Program::new();
        assert!(matches!(
            synthesize(&p, &shape(0, 10, 1, Cmp::Lt, Direction::Descending)),
            Err(TripError::DirectionMismatch { .. })
        ));
        assert_eq!(
            synthesize(&p, &shape(0, 10, 0, Cmp::Lt, Direction::Ascending)),
            Err(TripError::NonPositiveStep)
        );
        assert_eq!(
            synthesize(&p, &shape(0, 10, 2, Cmp::Ne, Direction::Ascending)),
            Err(TripError::NonUnitInequality)
        );
        let mut real = shape(0, 10, 1, Cmp::Lt, Direction::Ascending);
        real.bound = Expr::Lit(Literal::Real(10.0));
        assert_eq!(synthesize(&p, &real), Err(TripError::NonInteger));
    }
}
