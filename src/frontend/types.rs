use std::rc::Rc;

use crate::frontend::{SourceSpan, SynClassDefinition};

pub type TypeId = usize;
pub type VariableId = usize;
pub type FunctionId = usize;
pub type AliasId = usize;
pub type ScopeId = usize;
pub type NamespaceId = usize;

pub const POINTER_SIZE: u64 = 4;
pub const MAX_TYPE_SIZE: u64 = 64 * 1024;
pub const MAX_ALIGNMENT: u64 = 16;
pub const MAX_GENERIC_INSTANCE_DEPTH: usize = 32;

/// A named generic binding, `name ↦ type`. Used for generic function
/// parameters, class generics and class-scope typedefs alike.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchData {
	pub name: String,
	pub ty: TypeId,
}

/// A class- or enum-scope constant with its reduced literal value.
#[derive(Clone, Debug)]
pub struct ConstantData {
	pub name: String,
	pub ty: TypeId,
	pub value: ConstValue,
}

/// Literal produced by the constant evaluator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConstValue {
	Bool(bool),
	Char(u8),
	Int(i32),
	Long(i64),
	Double(f64),
	Type(TypeId),
	FunctionIndex(FunctionId),
	Null,
}

#[derive(Clone, Debug, Default)]
pub struct ClassData {
	pub base_class: Option<TypeId>,
	pub proto: Option<TypeId>,
	pub generics: Vec<MatchData>,
	pub aliases: Vec<MatchData>,
	pub extendable: bool,
	pub completed: bool,
	pub type_scope: Option<ScopeId>,
}

#[derive(Clone, Debug)]
pub enum TypeKind {
	Void,
	Bool,
	Char,
	Short,
	Int,
	Long,
	Float,
	Double,
	TypeId,
	FunctionId,
	NullPtr,
	Auto,
	AutoRef,
	AutoArray,
	Generic {
		alias: String,
	},
	Ref {
		target: TypeId,
	},
	Array {
		elem: TypeId,
		length: i64,
	},
	UnsizedArray {
		elem: TypeId,
	},
	Function {
		return_type: TypeId,
		arguments: Vec<TypeId>,
	},
	Class(ClassData),
	Enum,
	GenericClassProto {
		definition: Rc<SynClassDefinition>,
		scope: ScopeId,
		instances: Vec<TypeId>,
	},
	/// A generic class applied to arguments that are themselves still
	/// generic; used as a pattern during unification. Fully concrete
	/// instances are ordinary `Class` entries carrying `proto`.
	GenericClassInstance {
		proto: TypeId,
		arguments: Vec<TypeId>,
	},
	FunctionSet {
		types: Vec<TypeId>,
	},
	ArgumentSet {
		types: Vec<TypeId>,
	},
	MemberSet {
		class: TypeId,
	},
}

/// One entry of the type universe. Entries are created through the interning
/// accessors on `ExpressionContext` and addressed by `TypeId` everywhere.
#[derive(Clone, Debug)]
pub struct TypeEntry {
	pub name: String,
	pub name_hash: u32,
	pub size: u64,
	pub alignment: u64,
	pub padding: u64,
	pub is_generic: bool,
	pub imported: bool,
	pub source: SourceSpan,
	/// Member variables for Class, UnsizedArray, AutoRef and AutoArray.
	pub members: Vec<VariableId>,
	pub constants: Vec<ConstantData>,
	pub kind: TypeKind,
}

impl TypeEntry {
	pub fn is_ref(&self) -> bool {
		matches!(self.kind, TypeKind::Ref { .. })
	}

	pub fn is_array(&self) -> bool {
		matches!(self.kind, TypeKind::Array { .. })
	}

	pub fn is_unsized_array(&self) -> bool {
		matches!(self.kind, TypeKind::UnsizedArray { .. })
	}

	pub fn is_function(&self) -> bool {
		matches!(self.kind, TypeKind::Function { .. })
	}

	pub fn is_class(&self) -> bool {
		matches!(self.kind, TypeKind::Class(_))
	}

	pub fn is_enum(&self) -> bool {
		matches!(self.kind, TypeKind::Enum)
	}

	pub fn class(&self) -> Option<&ClassData> {
		match &self.kind {
			TypeKind::Class(data) => Some(data),
			_ => None,
		}
	}

	pub fn class_mut(&mut self) -> Option<&mut ClassData> {
		match &mut self.kind {
			TypeKind::Class(data) => Some(data),
			_ => None,
		}
	}

	pub fn ref_target(&self) -> Option<TypeId> {
		match self.kind {
			TypeKind::Ref { target } => Some(target),
			_ => None,
		}
	}

	pub fn array_elem(&self) -> Option<(TypeId, i64)> {
		match self.kind {
			TypeKind::Array { elem, length } => Some((elem, length)),
			_ => None,
		}
	}

	pub fn unsized_elem(&self) -> Option<TypeId> {
		match self.kind {
			TypeKind::UnsizedArray { elem } => Some(elem),
			_ => None,
		}
	}

	pub fn function_parts(&self) -> Option<(TypeId, &[TypeId])> {
		match &self.kind {
			TypeKind::Function {
				return_type,
				arguments,
			} => Some((*return_type, arguments.as_slice())),
			_ => None,
		}
	}
}
