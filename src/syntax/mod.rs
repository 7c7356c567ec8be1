//! Textual offload IR (`.oir`): lexer and parser producing [`Program`].
//!
//! ```text
//! module demo {
//!     var A: [real];
//!     fn scale(n: int) @offload {
//!         var i: int;
//!         for @order_independent (i := 0; i < n; i += 1) {
//!             A[i] = A[i] * 2.0;
//!         }
//!     }
//! }
//! ```

pub mod lexeme;
pub mod lexer;
pub mod parser;
pub mod span;

use crate::diagnostic::Diagnostic;
use crate::ir::Program;
use lexer::Lexer;
use parser::Parser;

/// Parse `source` into `program`, appending its modules.
pub fn parse_into(program: &mut Program, filename: &str, source: &str) -> Result<(), Vec<Diagnostic>> {
    let file_id = program.add_source(filename, source);
    let (tokens, lex_errors) = Lexer::new(source, file_id).tokenize();
    if !lex_errors.is_empty() {
        return Err(lex_errors);
    }
    Parser::new(tokens, program).parse_file()
}

/// Parse a single source file into a fresh program.
pub fn parse_program(filename: &str, source: &str) -> Result<Program, Vec<Diagnostic>> {
    let mut program = Program::new();
    parse_into(&mut program, filename, source)?;
    Ok(program)
}
