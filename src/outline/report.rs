//! Per-loop outcomes of the pass and the `--report` lines.

use crate::span::Span;

use super::trip::TripError;

/// Why a loop stays on the CPU only. A rejection never modifies the IR.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("loop is not in canonical counting form")]
    NotCanonical,

    #[error("'{callee}' may block or communicate")]
    Unfit { callee: String },

    #[error("loop body exits early")]
    EarlyExit,

    #[error("'{name}' is modified inside the loop")]
    VariantOperand { name: String },

    #[error("index '{name}' is written by the loop body")]
    IndexWritten { name: String },

    #[error("loop body uses '{name}' declared in the loop header")]
    HeaderLocal { name: String },

    #[error("loop body writes '{name}', which is declared outside the loop")]
    CapturedWrite { name: String },

    #[error(transparent)]
    TripCount(#[from] TripError),
}

/// The fate of one considered loop.
#[derive(Clone, Debug)]
pub struct LoopOutcome {
    pub function: String,
    pub file: String,
    pub line: u32,
    pub span: Span,
    /// Kernel id on success.
    pub result: Result<u32, Rejection>,
}

impl LoopOutcome {
    pub fn is_outlined(&self) -> bool {
        self.result.is_ok()
    }

    /// The line printed by `--report`.
    pub fn report_line(&self) -> String {
        match &self.result {
            Ok(_) => format!(
                "Replacing loop with CPU and GPU paths at {}:{}",
                self.file, self.line
            ),
            Err(reason) => format!(
                "Failed to generate GPU kernel for loop at {}:{}: {}",
                self.file, self.line, reason
            ),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Report {
    pub loops: Vec<LoopOutcome>,
}

impl Report {
    pub fn push(&mut self, outcome: LoopOutcome) {
        self.loops.push(outcome);
    }

    pub fn outlined(&self) -> usize {
        self.loops.iter().filter(|o| o.is_outlined()).count()
    }

    pub fn rejected(&self) -> usize {
        self.loops.len() - self.outlined()
    }

    pub fn lines(&self) -> Vec<String> {
        self.loops.iter().map(LoopOutcome::report_line).collect()
    }
}
