use std::fmt;

use crate::frontend::SourceSpan;

/// Every analysis failure is fatal for the current compilation; the error
/// carries the formatted message and the span that triggered it and unwinds
/// through `?` to the outermost `analyze` entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompileErrorKind {
	NameResolution,
	TypeMismatch,
	OverloadSelection,
	GenericInstantiation,
	ConstantEvaluation,
	LayoutLimit,
	FlowError,
	ImportError,
}

#[derive(Clone, Debug)]
pub struct CompileError {
	pub span: SourceSpan,
	pub kind: CompileErrorKind,
	pub message: String,
}

impl CompileError {
	pub fn new(span: SourceSpan, kind: CompileErrorKind, message: String) -> Self {
		Self {
			span,
			kind,
			message,
		}
	}
}

impl fmt::Display for CompileError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.message)
	}
}

pub type AnalyzeResult<T> = Result<T, CompileError>;
