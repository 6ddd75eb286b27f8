use crate::frontend::{
	FunctionId, ScopeId, SourceSpan, SynBinaryOpType, SynUnaryOpType, TypeId, VariableId,
};

/// Concrete implicit-conversion kind chosen by `create_cast`. Closed set;
/// the IR builder switches on it without a fallback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CastKind {
	Numerical,
	PtrToBool,
	UnsizedToBool,
	FunctionToBool,
	NullToPtr,
	NullToAutoPtr,
	NullToUnsized,
	NullToAutoArray,
	NullToFunction,
	ArrayToUnsized,
	ArrayPtrToUnsized,
	ArrayPtrToUnsizedPtr,
	PtrToAutoPtr,
	AutoPtrToPtr,
	UnsizedToAutoArray,
	Reinterpret,
	AnyToPtr,
}

/// Typed expression node. The type is fixed at construction; transformations
/// build new nodes instead of mutating.
#[derive(Clone, Debug)]
pub struct Expr {
	pub span: SourceSpan,
	pub ty: TypeId,
	pub kind: ExprKind,
}

impl Expr {
	pub fn new(span: SourceSpan, ty: TypeId, kind: ExprKind) -> Self {
		Self { span, ty, kind }
	}
}

#[derive(Clone, Debug)]
pub enum ExprKind {
	Void,
	BoolLiteral(bool),
	CharLiteral(u8),
	/// Int or Long literal depending on the node type.
	IntegerLiteral(i64),
	/// Float or Double literal depending on the node type.
	RationalLiteral(f64),
	StringLiteral(Vec<u8>),
	TypeLiteral(TypeId),
	FunctionIndexLiteral(FunctionId),
	NullptrLiteral,
	/// Wrapper reusing an already-built node (shared default arguments).
	Passthrough(Box<Expr>),
	Array {
		values: Vec<Expr>,
	},
	VariableAccess(VariableId),
	GetAddress(VariableId),
	Dereference(Box<Expr>),
	MemberAccess {
		value: Box<Expr>,
		member: VariableId,
	},
	ArrayIndex {
		value: Box<Expr>,
		index: Box<Expr>,
	},
	PreModify {
		value: Box<Expr>,
		is_increment: bool,
	},
	PostModify {
		value: Box<Expr>,
		is_increment: bool,
	},
	UnaryOp {
		op: SynUnaryOpType,
		value: Box<Expr>,
	},
	BinaryOp {
		op: SynBinaryOpType,
		lhs: Box<Expr>,
		rhs: Box<Expr>,
	},
	Assignment {
		lhs: Box<Expr>,
		rhs: Box<Expr>,
	},
	Conditional {
		condition: Box<Expr>,
		true_block: Box<Expr>,
		false_block: Box<Expr>,
	},
	Sequence(Vec<Expr>),
	Block(Vec<Expr>),
	VariableDefinition {
		variable: VariableId,
		initializer: Option<Box<Expr>>,
	},
	VariableDefinitions(Vec<Expr>),
	/// Fill every element of a sized array from a single value.
	ArraySetup {
		variable: VariableId,
		initializer: Box<Expr>,
	},
	FunctionDefinition {
		function: FunctionId,
		prototype: bool,
		context_argument: Option<Box<Expr>>,
		arguments: Vec<Expr>,
		expressions: Vec<Expr>,
		context_variable: Option<Box<Expr>>,
	},
	GenericFunctionPrototype(FunctionId),
	FunctionAccess {
		function: FunctionId,
		context: Box<Expr>,
	},
	FunctionOverloadSet {
		functions: Vec<FunctionId>,
		context: Option<Box<Expr>>,
	},
	FunctionCall {
		function: Box<Expr>,
		arguments: Vec<Expr>,
	},
	Return(Box<Expr>),
	Yield(Box<Expr>),
	IfElse {
		condition: Box<Expr>,
		true_block: Box<Expr>,
		false_block: Option<Box<Expr>>,
	},
	For {
		initializer: Box<Expr>,
		condition: Box<Expr>,
		increment: Box<Expr>,
		body: Box<Expr>,
	},
	While {
		condition: Box<Expr>,
		body: Box<Expr>,
	},
	DoWhile {
		body: Box<Expr>,
		condition: Box<Expr>,
	},
	Switch {
		condition: Box<Expr>,
		cases: Vec<Expr>,
		blocks: Vec<Expr>,
		default_block: Option<Box<Expr>>,
	},
	Break(u32),
	Continue(u32),
	TypeCast {
		value: Box<Expr>,
		cast: CastKind,
	},
	ClassDefinition {
		class: TypeId,
		functions: Vec<Expr>,
	},
	GenericClassPrototype(TypeId),
	EnumDefinition {
		enum_type: TypeId,
		to_int: Box<Expr>,
		to_enum: Box<Expr>,
	},
	AliasDefinition(AliasDefinitionData),
	Module {
		global_scope: ScopeId,
		expressions: Vec<Expr>,
		setup: Vec<Expr>,
		definitions: Vec<FunctionId>,
	},
}

#[derive(Clone, Copy, Debug)]
pub struct AliasDefinitionData {
	pub alias: crate::frontend::AliasId,
}

impl Expr {
	pub fn is_variable_access(&self) -> Option<VariableId> {
		match &self.kind {
			ExprKind::VariableAccess(variable) => Some(*variable),
			_ => None,
		}
	}

	pub fn is_dereference(&self) -> bool {
		matches!(self.kind, ExprKind::Dereference(_))
	}

	pub fn into_dereference_target(self) -> Option<Expr> {
		match self.kind {
			ExprKind::Dereference(value) => Some(*value),
			_ => None,
		}
	}
}
