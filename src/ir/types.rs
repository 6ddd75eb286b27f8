use crate::frontend::{ExpressionContext, TypeId, TypeKind, POINTER_SIZE};

/// Closed set of IR value types. Aggregates carry only their byte size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VmType {
	Void,
	Int,
	Double,
	Long,
	Label,
	Pointer,
	FunctionRef,
	ArrayRef,
	AutoRef,
	AutoArray,
	Struct(u32),
}

impl VmType {
	pub fn size(self) -> u32 {
		let ptr = POINTER_SIZE as u32;

		match self {
			VmType::Void => 0,
			VmType::Int => 4,
			VmType::Double => 8,
			VmType::Long => 8,
			VmType::Label => 4,
			VmType::Pointer => ptr,
			// context + id
			VmType::FunctionRef => ptr + 4,
			// ptr + length
			VmType::ArrayRef => ptr + 4,
			// type + ptr
			VmType::AutoRef => 4 + ptr,
			// type + ptr + length
			VmType::AutoArray => 4 + ptr + 4,
			VmType::Struct(size) => size,
		}
	}
}

/// Total, deterministic mapping from source types to IR types.
pub fn get_vm_type(ctx: &ExpressionContext, ty: TypeId) -> VmType {
	let b = ctx.builtin;

	if ty == b.void_ {
		return VmType::Void;
	}

	if ty == b.bool_ || ty == b.char_ || ty == b.short_ || ty == b.int_ {
		return VmType::Int;
	}

	if ty == b.long_ {
		return VmType::Long;
	}

	if ty == b.float_ || ty == b.double_ {
		return VmType::Double;
	}

	if ty == b.typeid_ || ty == b.function_id {
		return VmType::Int;
	}

	if ty == b.nullptr_ {
		return VmType::Pointer;
	}

	if ty == b.auto_ref {
		return VmType::AutoRef;
	}

	if ty == b.auto_array {
		return VmType::AutoArray;
	}

	match &ctx.types[ty].kind {
		TypeKind::Ref { .. } => VmType::Pointer,
		TypeKind::Function { .. } => VmType::FunctionRef,
		TypeKind::UnsizedArray { .. } => VmType::ArrayRef,
		TypeKind::Enum => VmType::Int,
		TypeKind::Array { .. } | TypeKind::Class(_) => {
			let size = ctx.types[ty].size;

			// Empty classes degenerate to a zero integer
			if size == 0 {
				return VmType::Int;
			}

			debug_assert!(size % 4 == 0);

			VmType::Struct(size as u32)
		}
		_ => VmType::Void,
	}
}
