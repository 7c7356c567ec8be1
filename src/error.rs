//! Fatal errors of the outlining pass.
//!
//! These are internal consistency violations: the pass stops, and the CLI
//! reports them as diagnostics. Loops that merely cannot be offloaded are
//! not errors (see [`crate::outline::report::Rejection`]).

use crate::diagnostic::Diagnostic;
use crate::span::Span;

#[derive(Debug, thiserror::Error)]
pub enum OffloadError {
    /// A kernel must be launched from exactly one place to be bundled.
    #[error("kernel '{kernel}' has {count} call sites, expected exactly one")]
    CallSiteCount {
        kernel: String,
        count: usize,
        span: Span,
    },

    /// The call site of a kernel could not be found in its parent.
    #[error("call site of kernel '{kernel}' not found in '{parent}'")]
    MissingCallSite { kernel: String, parent: String },

    /// After bundling a kernel still refers to storage it does not declare.
    #[error("kernel '{kernel}' still uses '{symbol}' from an enclosing scope")]
    ResidualFreeVariable {
        kernel: String,
        symbol: String,
        span: Span,
    },
}

impl OffloadError {
    pub fn span(&self) -> Span {
        match self {
            OffloadError::CallSiteCount { span, .. }
            | OffloadError::ResidualFreeVariable { span, .. } => *span,
            OffloadError::MissingCallSite { .. } => Span::dummy(),
        }
    }
}

impl From<&OffloadError> for Diagnostic {
    fn from(err: &OffloadError) -> Self {
        let diag = Diagnostic::error(err.to_string(), err.span());
        match err {
            OffloadError::CallSiteCount { .. } => diag.with_help(
                "kernels are launched from the loop they replace; \
                 calls added by another pass must be removed first"
                    .to_string(),
            ),
            _ => diag.with_note("this is an internal error of the outlining pass".to_string()),
        }
    }
}

impl From<OffloadError> for Diagnostic {
    fn from(err: OffloadError) -> Self {
        Diagnostic::from(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_site_count_message() {
        let err = OffloadError::CallSiteCount {
            kernel: "gpu_kernel0".into(),
            count: 2,
            span: Span::new(0, 3, 9),
        };
        assert_eq!(
            err.to_string(),
            "kernel 'gpu_kernel0' has 2 call sites, expected exactly one"
        );
        let diag = Diagnostic::from(err);
        assert_eq!(diag.span.start, 3);
        assert!(diag.help.is_some());
    }

    #[test]
    fn test_internal_errors_carry_note() {
        let diag = Diagnostic::from(OffloadError::MissingCallSite {
            kernel: "gpu_kernel3".into(),
            parent: "f".into(),
        });
        assert_eq!(diag.message, "call site of kernel 'gpu_kernel3' not found in 'f'");
        assert_eq!(diag.notes.len(), 1);
    }
}
