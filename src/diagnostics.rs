//! Stable-shaped diagnostics shared by every pipeline stage.
//!
//! `CompilerError` is used for both fatal aborts and non-fatal warnings; the
//! distinction is made by the caller (fatal errors are returned as `Err`,
//! warnings are pushed onto `CompileOutput::warnings`). `InternalError`
//! covers invariant failures that should never be reachable from well-formed
//! input.

use thiserror::Error;

pub const EFICT_CYCLE: &str = "EFICT-CYCLE";
pub const EFICT_STATE_PLACEMENT: &str = "EFICT-STATE-PLACEMENT";
pub const EFICT_STATE_DESTRUCTURE: &str = "EFICT-STATE-DESTRUCTURE";
pub const EFICT_UNIMPORTED: &str = "EFICT-UNIMPORTED";
pub const EFICT_PARSE: &str = "EFICT-PARSE";
pub const FICT_M: &str = "FICT-M";
pub const FICT_H: &str = "FICT-H";
pub const FICT_P001: &str = "FICT-P001";
pub const FICT_E001: &str = "FICT-E001";
pub const EFICT_INTERNAL_INVARIANT: &str = "EFICT-INTERNAL-INVARIANT";

/// A single diagnostic, fatal or warning depending on where it ends up.
#[derive(Debug, Clone)]
pub struct CompilerError {
    pub code: String,
    pub message: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub context: Option<String>,
}

impl CompilerError {
    pub fn new(code: &str, message: impl Into<String>, file: &str, line: u32, column: u32) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            file: file.to_string(),
            line,
            column,
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

impl std::fmt::Display for CompilerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}: {} [{}]",
            self.file, self.line, self.column, self.message, self.code
        )
    }
}

impl std::error::Error for CompilerError {}

/// Invariant failures internal to the compiler itself. Never expected to
/// surface from well-formed input; the API boundary converts these into a
/// fatal `CompilerError` with code `EFICT-INTERNAL-INVARIANT`.
#[derive(Debug, Error)]
pub enum InternalError {
    #[error("derived dependency graph contained a cycle after transform stage: {0}")]
    PostTransformCycle(String),

    #[error("shadow stack underflow while popping scope")]
    ShadowStackUnderflow,

    #[error("region grouper produced an empty output set for a non-empty region")]
    EmptyRegionOutputs,

    #[error("attempted to classify an identifier with no known binding: {0}")]
    UnknownBinding(String),
}

impl InternalError {
    pub fn into_compiler_error(self, file: &str) -> CompilerError {
        CompilerError::new(EFICT_INTERNAL_INVARIANT, self.to_string(), file, 0, 0)
    }
}
