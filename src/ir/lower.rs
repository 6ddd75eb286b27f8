use crate::frontend::{
	CastKind, Expr, ExprKind, ExpressionContext, ScopeOwner, SourceSpan, SynBinaryOpType,
	SynUnaryOpType, TypeId, VariableData, VariableId,
};
use crate::ir::{get_vm_type, VmInstType, VmModule, VmType, VmValueId};

/// Per-lowering state: the loop stack maps break/continue depths to their
/// target blocks.
struct LoweringState {
	loops: Vec<LoopInfo>,
}

#[derive(Clone, Copy)]
struct LoopInfo {
	break_block: VmValueId,
	continue_block: VmValueId,
}

fn is_global_scope(ctx: &ExpressionContext, variable: VariableId) -> bool {
	let mut curr = Some(ctx.variables[variable].scope);

	while let Some(scope) = curr {
		match ctx.scopes[scope].owner {
			ScopeOwner::Function(_) | ScopeOwner::Type(_) => return false,
			_ => {}
		}

		curr = ctx.scopes[scope].parent;
	}

	true
}

fn create_load(
	ctx: &ExpressionContext,
	module: &mut VmModule,
	ty: TypeId,
	address: VmValueId,
) -> VmValueId {
	let b = ctx.builtin;

	if ty == b.bool_ || ty == b.char_ {
		return module.create_instruction(VmType::Int, VmInstType::LoadByte, &[address]);
	}

	if ty == b.short_ {
		return module.create_instruction(VmType::Int, VmInstType::LoadShort, &[address]);
	}

	if ty == b.int_ || ty == b.typeid_ || ty == b.function_id || ctx.types[ty].is_enum() {
		return module.create_instruction(VmType::Int, VmInstType::LoadInt, &[address]);
	}

	if ty == b.float_ {
		return module.create_instruction(VmType::Double, VmInstType::LoadFloat, &[address]);
	}

	if ty == b.double_ {
		return module.create_instruction(VmType::Double, VmInstType::LoadDouble, &[address]);
	}

	if ty == b.long_ {
		return module.create_instruction(VmType::Long, VmInstType::LoadLong, &[address]);
	}

	if ctx.types[ty].is_ref() {
		// Pointer-width load
		return module.create_instruction(VmType::Pointer, VmInstType::LoadInt, &[address]);
	}

	if ctx.types[ty].is_function() {
		return module.create_instruction(VmType::FunctionRef, VmInstType::LoadStruct, &[address]);
	}

	if ctx.types[ty].is_unsized_array() {
		return module.create_instruction(VmType::ArrayRef, VmInstType::LoadStruct, &[address]);
	}

	if ty == b.auto_ref {
		return module.create_instruction(VmType::AutoRef, VmInstType::LoadStruct, &[address]);
	}

	if ty == b.auto_array {
		return module.create_instruction(VmType::AutoArray, VmInstType::LoadStruct, &[address]);
	}

	let size = ctx.types[ty].size;

	if size == 0 {
		return module.create_constant_int(0);
	}

	debug_assert!(size % 4 == 0);

	module.create_instruction(
		VmType::Struct(size as u32),
		VmInstType::LoadStruct,
		&[address],
	)
}

fn create_store(
	ctx: &ExpressionContext,
	module: &mut VmModule,
	ty: TypeId,
	address: VmValueId,
	value: VmValueId,
) -> VmValueId {
	let b = ctx.builtin;

	if ty == b.bool_ || ty == b.char_ {
		return module.create_instruction(VmType::Void, VmInstType::StoreByte, &[address, value]);
	}

	if ty == b.short_ {
		return module.create_instruction(VmType::Void, VmInstType::StoreShort, &[address, value]);
	}

	if ty == b.int_
		|| ty == b.typeid_
		|| ty == b.function_id
		|| ctx.types[ty].is_enum()
		|| ctx.types[ty].is_ref()
	{
		return module.create_instruction(VmType::Void, VmInstType::StoreInt, &[address, value]);
	}

	if ty == b.float_ {
		return module.create_instruction(VmType::Void, VmInstType::StoreFloat, &[address, value]);
	}

	if ty == b.double_ {
		return module.create_instruction(VmType::Void, VmInstType::StoreDouble, &[address, value]);
	}

	if ty == b.long_ {
		return module.create_instruction(VmType::Void, VmInstType::StoreLong, &[address, value]);
	}

	if ctx.types[ty].size == 0 && !ctx.types[ty].is_function() && !ctx.types[ty].is_unsized_array()
	{
		return module.create_void();
	}

	module.create_instruction(VmType::Void, VmInstType::StoreStruct, &[address, value])
}

fn create_numeric_cast(module: &mut VmModule, value: VmValueId, target: VmType) -> VmValueId {
	let source = module.values[value.index()].ty;

	if source == target {
		return value;
	}

	let cmd = match (source, target) {
		(VmType::Double, VmType::Int) => VmInstType::DoubleToInt,
		(VmType::Long, VmType::Int) => VmInstType::LongToInt,
		(VmType::Int, VmType::Double) => VmInstType::IntToDouble,
		(VmType::Long, VmType::Double) => VmInstType::LongToDouble,
		(VmType::Int, VmType::Long) => VmInstType::IntToLong,
		(VmType::Double, VmType::Long) => VmInstType::DoubleToLong,
		_ => return value,
	};

	module.create_instruction(target, cmd, &[value])
}

fn create_variable_address(
	ctx: &ExpressionContext,
	module: &mut VmModule,
	variable: VariableId,
) -> VmValueId {
	if is_global_scope(ctx, variable) {
		return module.create_constant_pointer(ctx.variables[variable].offset as i32);
	}

	let offset = module.create_constant_int(ctx.variables[variable].offset as i32);

	module.create_instruction(VmType::Pointer, VmInstType::FrameOffset, &[offset])
}

/// Fresh stack (or global) slot for lowering-introduced temporaries.
fn allocate_scope_variable(
	ctx: &mut ExpressionContext,
	module: &mut VmModule,
	ty: TypeId,
) -> VmValueId {
	let function = module
		.current_function
		.and_then(|function| module.function(function))
		.and_then(|data| data.function);

	let size = ctx.types[ty].size;
	let alignment = ctx.types[ty].alignment;

	let (scope, offset) = match function {
		Some(function) => {
			let data = &mut ctx.functions[function];

			data.stack_size += crate::frontend::alignment_offset(data.stack_size, alignment);

			let offset = data.stack_size;

			data.stack_size += size;

			(
				ctx.functions[function]
					.function_scope
					.unwrap_or(ctx.global_scope),
				offset,
			)
		}
		None => {
			let scope = ctx.global_scope;
			let root = &mut ctx.scopes[scope];

			root.global_size += crate::frontend::alignment_offset(root.global_size, alignment);

			let offset = root.global_size;

			root.global_size += size;

			(scope, offset)
		}
	};

	let name = format!("$temp{}", ctx.unnamed_variable_count);
	ctx.unnamed_variable_count += 1;

	let name_hash = crate::frontend::string_hash(&name);

	let variable = ctx.variables.len();

	ctx.variables.push(VariableData {
		source: SourceSpan::default(),
		scope,
		ty,
		name,
		name_hash,
		alignment,
		offset,
		unique_id: 0,
		is_reference: false,
		imported: false,
	});

	if function.is_none() {
		return module.create_constant_pointer(ctx.variables[variable].offset as i32);
	}

	let offset = module.create_constant_int(ctx.variables[variable].offset as i32);

	module.create_instruction(VmType::Pointer, VmInstType::FrameOffset, &[offset])
}

fn binary_inst(op: SynBinaryOpType) -> VmInstType {
	match op {
		SynBinaryOpType::Add => VmInstType::Add,
		SynBinaryOpType::Sub => VmInstType::Sub,
		SynBinaryOpType::Mul => VmInstType::Mul,
		SynBinaryOpType::Div => VmInstType::Div,
		SynBinaryOpType::Mod => VmInstType::Mod,
		SynBinaryOpType::Pow => VmInstType::Pow,
		SynBinaryOpType::Shl => VmInstType::Shl,
		SynBinaryOpType::Shr => VmInstType::Shr,
		SynBinaryOpType::Less => VmInstType::Less,
		SynBinaryOpType::LessEqual => VmInstType::LessEqual,
		SynBinaryOpType::Greater => VmInstType::Greater,
		SynBinaryOpType::GreaterEqual => VmInstType::GreaterEqual,
		SynBinaryOpType::Equal => VmInstType::Equal,
		SynBinaryOpType::NotEqual => VmInstType::NotEqual,
		SynBinaryOpType::BitAnd => VmInstType::BitAnd,
		SynBinaryOpType::BitOr => VmInstType::BitOr,
		SynBinaryOpType::BitXor => VmInstType::BitXor,
		SynBinaryOpType::LogicalAnd => VmInstType::LogAnd,
		SynBinaryOpType::LogicalOr => VmInstType::LogOr,
		SynBinaryOpType::LogicalXor => VmInstType::LogXor,
	}
}

fn lower_cast(
	ctx: &mut ExpressionContext,
	module: &mut VmModule,
	state: &mut LoweringState,
	target_type: TypeId,
	value_expr: &Expr,
	cast: CastKind,
) -> VmValueId {
	let value = lower(ctx, module, state, value_expr);
	let target = get_vm_type(ctx, target_type);

	match cast {
		CastKind::Numerical => create_numeric_cast(module, value, target),
		CastKind::PtrToBool | CastKind::UnsizedToBool | CastKind::FunctionToBool => {
			let zero = module.create_constant_pointer(0);

			module.create_instruction(VmType::Int, VmInstType::NotEqual, &[value, zero])
		}
		CastKind::NullToPtr => value,
		CastKind::NullToAutoPtr
		| CastKind::NullToUnsized
		| CastKind::NullToAutoArray
		| CastKind::NullToFunction => {
			module.create_instruction(target, VmInstType::ConvertPointer, &[value])
		}
		CastKind::ArrayPtrToUnsizedPtr => value,
		CastKind::ArrayPtrToUnsized => {
			// The operand is a pointer to a sized array; attach the length
			let length = ctx.types[value_expr.ty]
				.ref_target()
				.and_then(|target| ctx.types[target].array_elem())
				.map(|(_, length)| length)
				.unwrap_or(0);

			let length = module.create_constant_int(length as i32);

			module.create_instruction(target, VmInstType::ConvertPointer, &[value, length])
		}
		CastKind::ArrayToUnsized => {
			// Spill the array value and wrap its address
			let address = allocate_scope_variable(ctx, module, value_expr.ty);

			create_store(ctx, module, value_expr.ty, address, value);

			let length = ctx.types[value_expr.ty]
				.array_elem()
				.map(|(_, length)| length)
				.unwrap_or(0);

			let length = module.create_constant_int(length as i32);

			module.create_instruction(target, VmInstType::ConvertPointer, &[address, length])
		}
		CastKind::PtrToAutoPtr
		| CastKind::AutoPtrToPtr
		| CastKind::UnsizedToAutoArray
		| CastKind::AnyToPtr => {
			let type_index = module.create_constant_int(value_expr.ty as i32);
			let type_id =
				module.create_instruction(VmType::Int, VmInstType::TypeIndex, &[type_index]);

			module.create_instruction(target, VmInstType::ConvertPointer, &[value, type_id])
		}
		CastKind::Reinterpret => {
			if module.values[value.index()].ty == target {
				value
			} else {
				module.create_instruction(target, VmInstType::ConvertPointer, &[value])
			}
		}
	}
}

fn lower_function_body(
	ctx: &mut ExpressionContext,
	module: &mut VmModule,
	state: &mut LoweringState,
	function_value: VmValueId,
	expressions: &[Expr],
) {
	// Save the builder position, lower into a fresh entry block, restore
	let saved_block_id = module.next_block_id;
	let saved_instruction_id = module.next_instruction_id;
	let saved_function = module.current_function;
	let saved_block = module.current_block;
	let saved_loops = std::mem::take(&mut state.loops);

	module.next_block_id = 1;
	module.next_instruction_id = 1;
	module.current_function = Some(function_value);

	let entry = module.create_block("start");

	module.add_block(function_value, entry);
	module.add_use(entry, function_value);
	module.current_block = Some(entry);

	for expression in expressions {
		lower(ctx, module, state, expression);
	}

	module.next_block_id = saved_block_id;
	module.next_instruction_id = saved_instruction_id;
	module.current_function = saved_function;
	module.current_block = saved_block;
	state.loops = saved_loops;
}

fn lower(
	ctx: &mut ExpressionContext,
	module: &mut VmModule,
	state: &mut LoweringState,
	expr: &Expr,
) -> VmValueId {
	match &expr.kind {
		ExprKind::Void => module.create_void(),
		ExprKind::BoolLiteral(value) => module.create_constant_int(*value as i32),
		ExprKind::CharLiteral(value) => module.create_constant_int(*value as i32),
		ExprKind::IntegerLiteral(value) => {
			if expr.ty == ctx.builtin.long_ {
				module.create_constant_long(*value)
			} else {
				module.create_constant_int(*value as i32)
			}
		}
		ExprKind::RationalLiteral(value) => module.create_constant_double(*value),
		ExprKind::StringLiteral(value) => {
			// Zero-terminated, padded to a multiple of four
			let size = (value.len() + 1 + 3) & !3;

			let mut data = vec![0u8; size];

			data[..value.len()].copy_from_slice(value);

			module.create_constant_struct(data)
		}
		ExprKind::TypeLiteral(ty) => {
			let index = module.create_constant_int(*ty as i32);

			module.create_instruction(VmType::Int, VmInstType::TypeIndex, &[index])
		}
		ExprKind::FunctionIndexLiteral(function) => {
			module.create_constant_int(*function as i32)
		}
		ExprKind::NullptrLiteral => module.create_constant_pointer(0),
		ExprKind::Passthrough(inner) => lower(ctx, module, state, inner),
		ExprKind::Array { values } => {
			let address = allocate_scope_variable(ctx, module, expr.ty);

			let (elem, _) = ctx.types[expr.ty]
				.array_elem()
				.expect("array literals have array types");

			let elem_size = ctx.types[elem].size;

			let mut offset = 0u64;

			for value in values {
				let element = lower(ctx, module, state, value);

				let offset_value = module.create_constant_int(offset as i32);

				let slot = module.create_instruction(
					VmType::Pointer,
					VmInstType::Add,
					&[address, offset_value],
				);

				create_store(ctx, module, elem, slot, element);

				offset += elem_size;
			}

			create_load(ctx, module, expr.ty, address)
		}
		ExprKind::VariableAccess(variable) => {
			let address = create_variable_address(ctx, module, *variable);

			create_load(ctx, module, ctx.variables[*variable].ty, address)
		}
		ExprKind::GetAddress(variable) => create_variable_address(ctx, module, *variable),
		ExprKind::Dereference(value) => {
			let address = lower(ctx, module, state, value);

			create_load(ctx, module, expr.ty, address)
		}
		ExprKind::MemberAccess { value, member } => {
			let base = lower(ctx, module, state, value);

			let offset = module.create_constant_int(ctx.variables[*member].offset as i32);

			module.create_instruction(VmType::Pointer, VmInstType::Add, &[base, offset])
		}
		ExprKind::ArrayIndex { value, index } => {
			let base = lower(ctx, module, state, value);
			let index = lower(ctx, module, state, index);

			if ctx.types[value.ty].is_unsized_array() {
				return module.create_instruction(
					VmType::Pointer,
					VmInstType::IndexUnsized,
					&[base, index],
				);
			}

			let elem_size = ctx.types[value.ty]
				.ref_target()
				.and_then(|target| ctx.types[target].array_elem())
				.map(|(elem, _)| ctx.types[elem].size)
				.expect("sized indexing goes through an array reference");

			let elem_size = module.create_constant_int(elem_size as i32);

			module.create_instruction(
				VmType::Pointer,
				VmInstType::Index,
				&[base, elem_size, index],
			)
		}
		ExprKind::PreModify {
			value,
			is_increment,
		} => {
			let address = lower(ctx, module, state, value);

			let target = ctx.types[value.ty]
				.ref_target()
				.expect("modification goes through a reference");

			let loaded = create_load(ctx, module, target, address);

			let delta = match module.values[loaded.index()].ty {
				VmType::Double => {
					module.create_constant_double(if *is_increment { 1.0 } else { -1.0 })
				}
				VmType::Long => module.create_constant_long(if *is_increment { 1 } else { -1 }),
				_ => module.create_constant_int(if *is_increment { 1 } else { -1 }),
			};

			let ty = module.values[loaded.index()].ty;

			let modified = module.create_instruction(ty, VmInstType::Add, &[loaded, delta]);

			create_store(ctx, module, target, address, modified);

			modified
		}
		ExprKind::PostModify {
			value,
			is_increment,
		} => {
			let address = lower(ctx, module, state, value);

			let target = ctx.types[value.ty]
				.ref_target()
				.expect("modification goes through a reference");

			let loaded = create_load(ctx, module, target, address);

			let delta = match module.values[loaded.index()].ty {
				VmType::Double => {
					module.create_constant_double(if *is_increment { 1.0 } else { -1.0 })
				}
				VmType::Long => module.create_constant_long(if *is_increment { 1 } else { -1 }),
				_ => module.create_constant_int(if *is_increment { 1 } else { -1 }),
			};

			let ty = module.values[loaded.index()].ty;

			let modified = module.create_instruction(ty, VmInstType::Add, &[loaded, delta]);

			create_store(ctx, module, target, address, modified);

			loaded
		}
		ExprKind::TypeCast { value, cast } => lower_cast(ctx, module, state, expr.ty, value, *cast),
		ExprKind::UnaryOp { op, value } => {
			let operand = lower(ctx, module, state, value);

			match op {
				SynUnaryOpType::Plus => operand,
				SynUnaryOpType::Negate => {
					let ty = module.values[operand.index()].ty;

					module.create_instruction(ty, VmInstType::Neg, &[operand])
				}
				SynUnaryOpType::BitNot => {
					let ty = module.values[operand.index()].ty;

					module.create_instruction(ty, VmInstType::BitNot, &[operand])
				}
				SynUnaryOpType::LogicalNot => {
					module.create_instruction(VmType::Int, VmInstType::LogNot, &[operand])
				}
			}
		}
		ExprKind::BinaryOp { op, lhs, rhs } => {
			let lhs_value = lower(ctx, module, state, lhs);
			let rhs_value = lower(ctx, module, state, rhs);

			let cmd = binary_inst(*op);

			let result_type = match cmd {
				VmInstType::Less
				| VmInstType::Greater
				| VmInstType::LessEqual
				| VmInstType::GreaterEqual
				| VmInstType::Equal
				| VmInstType::NotEqual
				| VmInstType::LogAnd
				| VmInstType::LogOr
				| VmInstType::LogXor => VmType::Int,
				_ => module.values[lhs_value.index()].ty,
			};

			module.create_instruction(result_type, cmd, &[lhs_value, rhs_value])
		}
		ExprKind::Assignment { lhs, rhs } => {
			let address = lower(ctx, module, state, lhs);
			let initializer = lower(ctx, module, state, rhs);

			create_store(ctx, module, rhs.ty, address, initializer);

			create_load(ctx, module, rhs.ty, address)
		}
		ExprKind::Conditional {
			condition,
			true_block,
			false_block,
		} => {
			// The result is routed through a scope-allocated temporary
			let address = allocate_scope_variable(ctx, module, expr.ty);

			let condition = lower(ctx, module, state, condition);

			let true_target = module.create_block("if_true");
			let false_target = module.create_block("if_false");
			let exit_target = module.create_block("if_exit");

			module.create_instruction(
				VmType::Void,
				VmInstType::JumpNz,
				&[condition, true_target, false_target],
			);

			let function = module.current_function.unwrap();

			module.add_block(function, true_target);
			module.current_block = Some(true_target);

			let true_value = lower(ctx, module, state, true_block);

			create_store(ctx, module, expr.ty, address, true_value);
			module.create_instruction(VmType::Void, VmInstType::Jump, &[exit_target]);

			module.add_block(function, false_target);
			module.current_block = Some(false_target);

			let false_value = lower(ctx, module, state, false_block);

			create_store(ctx, module, expr.ty, address, false_value);
			module.create_instruction(VmType::Void, VmInstType::Jump, &[exit_target]);

			module.add_block(function, exit_target);
			module.current_block = Some(exit_target);

			create_load(ctx, module, expr.ty, address)
		}
		ExprKind::Sequence(expressions) => {
			let mut result = None;

			for expression in expressions {
				result = Some(lower(ctx, module, state, expression));
			}

			result.unwrap_or_else(|| module.create_void())
		}
		ExprKind::Block(expressions) => {
			for expression in expressions {
				lower(ctx, module, state, expression);
			}

			module.create_void()
		}
		ExprKind::VariableDefinition { initializer, .. } => {
			if let Some(initializer) = initializer {
				lower(ctx, module, state, initializer);
			}

			module.create_void()
		}
		ExprKind::VariableDefinitions(definitions) => {
			for definition in definitions {
				lower(ctx, module, state, definition);
			}

			module.create_void()
		}
		ExprKind::ArraySetup {
			variable,
			initializer,
		} => {
			let address = create_variable_address(ctx, module, *variable);
			let value = lower(ctx, module, state, initializer);

			let length = ctx.types[ctx.variables[*variable].ty]
				.array_elem()
				.map(|(_, length)| length)
				.unwrap_or(0);

			let count = module.create_constant_int(length as i32);

			module.create_instruction(
				VmType::Void,
				VmInstType::SetRange,
				&[address, value, count],
			)
		}
		ExprKind::FunctionDefinition {
			function,
			prototype,
			expressions,
			context_variable,
			..
		} => {
			let function_value = module.function_values[function];

			if *prototype {
				return function_value;
			}

			lower_function_body(ctx, module, state, function_value, expressions);

			// Closure construction runs at the definition site
			if let Some(context_variable) = context_variable {
				lower(ctx, module, state, context_variable);
			}

			function_value
		}
		ExprKind::GenericFunctionPrototype(_) => module.create_void(),
		ExprKind::FunctionAccess { function, .. } => module.function_values[function],
		ExprKind::FunctionOverloadSet { .. } => {
			unreachable!("overload sets are narrowed during analysis")
		}
		ExprKind::FunctionCall {
			function,
			arguments,
		} => {
			let callee = lower(ctx, module, state, function);

			let mut operands = vec![callee];

			for argument in arguments {
				let value = lower(ctx, module, state, argument);

				debug_assert!(module.values[value.index()].ty != VmType::Void);

				operands.push(value);
			}

			let result_type = get_vm_type(ctx, expr.ty);

			module.create_instruction(result_type, VmInstType::Call, &operands)
		}
		ExprKind::Return(value) => {
			if value.ty == ctx.builtin.void_ {
				lower(ctx, module, state, value);

				return module.create_instruction(VmType::Void, VmInstType::Return, &[]);
			}

			let value = lower(ctx, module, state, value);

			module.create_instruction(VmType::Void, VmInstType::Return, &[value])
		}
		ExprKind::Yield(value) => {
			if value.ty == ctx.builtin.void_ {
				lower(ctx, module, state, value);

				return module.create_instruction(VmType::Void, VmInstType::Yield, &[]);
			}

			let value = lower(ctx, module, state, value);

			module.create_instruction(VmType::Void, VmInstType::Yield, &[value])
		}
		ExprKind::IfElse {
			condition,
			true_block,
			false_block,
		} => {
			let condition = lower(ctx, module, state, condition);

			let true_target = module.create_block("if_true");
			let false_target = module.create_block("if_false");
			let exit_target = module.create_block("if_exit");

			if false_block.is_some() {
				module.create_instruction(
					VmType::Void,
					VmInstType::JumpNz,
					&[condition, true_target, false_target],
				);
			} else {
				module.create_instruction(
					VmType::Void,
					VmInstType::JumpNz,
					&[condition, true_target, exit_target],
				);
			}

			let function = module.current_function.unwrap();

			module.add_block(function, true_target);
			module.current_block = Some(true_target);

			lower(ctx, module, state, true_block);

			module.create_instruction(VmType::Void, VmInstType::Jump, &[exit_target]);

			if let Some(false_block) = false_block {
				module.add_block(function, false_target);
				module.current_block = Some(false_target);

				lower(ctx, module, state, false_block);

				module.create_instruction(VmType::Void, VmInstType::Jump, &[exit_target]);
			}

			module.add_block(function, exit_target);
			module.current_block = Some(exit_target);

			module.create_void()
		}
		ExprKind::For {
			initializer,
			condition,
			increment,
			body,
		} => {
			lower(ctx, module, state, initializer);

			let condition_block = module.create_block("for_cond");
			let body_block = module.create_block("for_body");
			let iteration_block = module.create_block("for_iter");
			let exit_block = module.create_block("for_exit");

			state.loops.push(LoopInfo {
				break_block: exit_block,
				continue_block: iteration_block,
			});

			module.create_instruction(VmType::Void, VmInstType::Jump, &[condition_block]);

			let function = module.current_function.unwrap();

			module.add_block(function, condition_block);
			module.current_block = Some(condition_block);

			let condition = lower(ctx, module, state, condition);

			module.create_instruction(
				VmType::Void,
				VmInstType::JumpNz,
				&[condition, body_block, exit_block],
			);

			module.add_block(function, body_block);
			module.current_block = Some(body_block);

			lower(ctx, module, state, body);

			module.create_instruction(VmType::Void, VmInstType::Jump, &[iteration_block]);

			module.add_block(function, iteration_block);
			module.current_block = Some(iteration_block);

			lower(ctx, module, state, increment);

			module.create_instruction(VmType::Void, VmInstType::Jump, &[condition_block]);

			module.add_block(function, exit_block);
			module.current_block = Some(exit_block);

			state.loops.pop();

			module.create_void()
		}
		ExprKind::While { condition, body } => {
			let condition_block = module.create_block("while_cond");
			let body_block = module.create_block("while_body");
			let exit_block = module.create_block("while_exit");

			state.loops.push(LoopInfo {
				break_block: exit_block,
				continue_block: condition_block,
			});

			module.create_instruction(VmType::Void, VmInstType::Jump, &[condition_block]);

			let function = module.current_function.unwrap();

			module.add_block(function, condition_block);
			module.current_block = Some(condition_block);

			let condition = lower(ctx, module, state, condition);

			module.create_instruction(
				VmType::Void,
				VmInstType::JumpNz,
				&[condition, body_block, exit_block],
			);

			module.add_block(function, body_block);
			module.current_block = Some(body_block);

			lower(ctx, module, state, body);

			module.create_instruction(VmType::Void, VmInstType::Jump, &[condition_block]);

			module.add_block(function, exit_block);
			module.current_block = Some(exit_block);

			state.loops.pop();

			module.create_void()
		}
		ExprKind::DoWhile { body, condition } => {
			let body_block = module.create_block("do_body");
			let condition_block = module.create_block("do_cond");
			let exit_block = module.create_block("do_exit");

			module.create_instruction(VmType::Void, VmInstType::Jump, &[body_block]);

			let function = module.current_function.unwrap();

			module.add_block(function, body_block);
			module.current_block = Some(body_block);

			state.loops.push(LoopInfo {
				break_block: exit_block,
				continue_block: condition_block,
			});

			lower(ctx, module, state, body);

			module.create_instruction(VmType::Void, VmInstType::Jump, &[condition_block]);

			module.add_block(function, condition_block);
			module.current_block = Some(condition_block);

			let condition = lower(ctx, module, state, condition);

			module.create_instruction(
				VmType::Void,
				VmInstType::JumpNz,
				&[condition, body_block, exit_block],
			);

			module.add_block(function, exit_block);
			module.current_block = Some(exit_block);

			state.loops.pop();

			module.create_void()
		}
		ExprKind::Switch {
			condition,
			cases,
			blocks,
			default_block,
		} => {
			lower(ctx, module, state, condition);

			let function = module.current_function.unwrap();

			let exit_block = module.create_block("switch_exit");

			let case_blocks: Vec<VmValueId> = (0..blocks.len())
				.map(|_| module.create_block("switch_case"))
				.collect();

			let default_target = default_block
				.as_ref()
				.map(|_| module.create_block("switch_default"));

			// Breaks leave the switch like a loop level
			state.loops.push(LoopInfo {
				break_block: exit_block,
				continue_block: exit_block,
			});

			for (index, case) in cases.iter().enumerate() {
				let matched = lower(ctx, module, state, case);

				let next = module.create_block("switch_next");

				module.create_instruction(
					VmType::Void,
					VmInstType::JumpNz,
					&[matched, case_blocks[index], next],
				);

				module.add_block(function, next);
				module.current_block = Some(next);
			}

			let fallthrough = default_target.unwrap_or(exit_block);

			module.create_instruction(VmType::Void, VmInstType::Jump, &[fallthrough]);

			for (index, block) in blocks.iter().enumerate() {
				module.add_block(function, case_blocks[index]);
				module.current_block = Some(case_blocks[index]);

				lower(ctx, module, state, block);

				// Cases fall through to the next case body
				let next = case_blocks
					.get(index + 1)
					.copied()
					.or(default_target)
					.unwrap_or(exit_block);

				module.create_instruction(VmType::Void, VmInstType::Jump, &[next]);
			}

			if let (Some(default_target), Some(default_block)) = (default_target, default_block) {
				module.add_block(function, default_target);
				module.current_block = Some(default_target);

				lower(ctx, module, state, default_block);

				module.create_instruction(VmType::Void, VmInstType::Jump, &[exit_block]);
			}

			module.add_block(function, exit_block);
			module.current_block = Some(exit_block);

			state.loops.pop();

			module.create_void()
		}
		ExprKind::Break(depth) => {
			let target = state.loops[state.loops.len() - *depth as usize].break_block;

			module.create_instruction(VmType::Void, VmInstType::Jump, &[target])
		}
		ExprKind::Continue(depth) => {
			let target = state.loops[state.loops.len() - *depth as usize].continue_block;

			module.create_instruction(VmType::Void, VmInstType::Jump, &[target])
		}
		ExprKind::ClassDefinition { functions, .. } => {
			for function in functions {
				lower(ctx, module, state, function);
			}

			module.create_void()
		}
		ExprKind::GenericClassPrototype(_) => module.create_void(),
		ExprKind::EnumDefinition {
			to_int, to_enum, ..
		} => {
			lower(ctx, module, state, to_int);
			lower(ctx, module, state, to_enum);

			module.create_void()
		}
		ExprKind::AliasDefinition(_) => module.create_void(),
		ExprKind::Module { .. } => {
			unreachable!("modules are lowered through compile_module")
		}
	}
}

/// Lower a resolved module into IR: one function per non-generic source
/// function plus the implicit top-level function, with the virtual-table
/// setup lowered at the start of the top level.
pub fn compile_module(ctx: &mut ExpressionContext, expr: &Expr) -> VmModule {
	let (expressions, setup) = match &expr.kind {
		ExprKind::Module {
			expressions, setup, ..
		} => (expressions, setup),
		_ => unreachable!("the analyzer produces a module node"),
	};

	let mut module = VmModule::new();

	module.types = (0..ctx.types.len()).collect();
	module.vtables = ctx.vtables.clone();

	// A function value exists for every concrete function up front
	for function in 0..ctx.functions.len() {
		if ctx.types[ctx.functions[function].ty].is_generic {
			continue;
		}

		let function_type = get_vm_type(ctx, ctx.functions[function].ty);

		let (return_type, _) = ctx.types[ctx.functions[function].ty]
			.function_parts()
			.unwrap();

		let return_type = get_vm_type(ctx, return_type);

		let value = module.create_function(function_type, Some(function), return_type);

		module.function_values.insert(function, value);
		module.functions.push(value);
	}

	let global = module.create_function(VmType::Void, None, VmType::Void);

	module.current_function = Some(global);

	let entry = module.create_block("start");

	module.add_block(global, entry);
	module.add_use(entry, global);
	module.current_block = Some(entry);

	let mut state = LoweringState { loops: Vec::new() };

	for expression in setup {
		lower(ctx, &mut module, &mut state, expression);
	}

	for expression in expressions {
		lower(ctx, &mut module, &mut state, expression);
	}

	module.functions.push(global);

	module
}
