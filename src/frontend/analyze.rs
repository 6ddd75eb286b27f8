use std::rc::Rc;

use crate::frontend::{
	allocate_temporary, analyze_break, analyze_class_definition, analyze_continue,
	analyze_do_while, analyze_enum_definition, analyze_for, analyze_for_each, analyze_if_else,
	analyze_namespace_definition, analyze_return, analyze_switch, analyze_typedef, analyze_while,
	analyze_yield, create_array_index, create_assignment, create_binary_op, create_cast,
	create_condition_cast, create_function_access, create_function_call_1, create_function_call_2,
	create_function_call_3, create_function_call_resolved, create_function_call_with_syntax_args,
	create_function_context_access, create_generic_type_instance, create_get_address,
	create_member_access, create_sequence, create_typeid_member_access, create_unary_op,
	create_variable_access, create_variable_access_named, evaluate_integer, get_node_functions,
	match_generic_type, names, resolve_generic_type_aliases, string_hash, AliasData,
	AnalyzeResult, ArgumentData, CastKind, CompileError, CompileErrorKind, Expr, ExprKind,
	ExpressionContext, FunctionData, FunctionId, FunctionSyntax, MatchData, ScopeOwner,
	SourceSpan, Syn, SynCallArgument, SynFunctionDefinition, SynShortFunctionDefinition, SynValue,
	SynVariableDefinition, TypeEntry, TypeId, TypeKind, VariableData,
};

fn err(
	ctx: &ExpressionContext,
	span: SourceSpan,
	kind: CompileErrorKind,
	message: String,
) -> CompileError {
	ctx.error(span, kind, message)
}

// ----------------------------------------------------------------------
// Literals
// ----------------------------------------------------------------------

fn parse_digits(
	ctx: &ExpressionContext,
	span: SourceSpan,
	text: &str,
	base: i64,
) -> AnalyzeResult<i64> {
	let mut result: i64 = 0;

	for ch in text.bytes() {
		let digit = match ch {
			b'0'..=b'9' => (ch - b'0') as i64,
			b'a'..=b'f' => (ch - b'a' + 10) as i64,
			b'A'..=b'F' => (ch - b'A' + 10) as i64,
			_ => base,
		};

		if digit >= base {
			return Err(err(
				ctx,
				span,
				CompileErrorKind::ConstantEvaluation,
				format!("digit {} is not allowed in base {}", digit, base),
			));
		}

		result = result.wrapping_mul(base).wrapping_add(digit);
	}

	Ok(result)
}

pub fn analyze_number(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	value: &str,
	suffix: &str,
) -> AnalyzeResult<Expr> {
	let int_ = ctx.builtin.int_;
	let long_ = ctx.builtin.long_;

	// Hexadecimal
	if value.len() > 1 && value.as_bytes()[1] == b'x' {
		let digits = value[2..].trim_start_matches('0');

		if value.len() == 2 {
			return Err(err(
				ctx,
				span,
				CompileErrorKind::ConstantEvaluation,
				"'0x' must be followed by number".to_string(),
			));
		}

		if digits.len() > 16 {
			return Err(err(
				ctx,
				span,
				CompileErrorKind::ConstantEvaluation,
				"overflow in hexadecimal constant".to_string(),
			));
		}

		let num = parse_digits(ctx, span, digits, 16)?;

		let ty = if num as i32 as i64 == num { int_ } else { long_ };

		return Ok(Expr::new(span, ty, ExprKind::IntegerLiteral(num)));
	}

	let is_fp = value.contains('.') || value.contains('e');

	if !is_fp {
		if suffix == "b" {
			let digits = value.trim_start_matches('0');

			if digits.len() > 64 {
				return Err(err(
					ctx,
					span,
					CompileErrorKind::ConstantEvaluation,
					"overflow in binary constant".to_string(),
				));
			}

			let num = parse_digits(ctx, span, digits, 2)?;

			let ty = if num as i32 as i64 == num { int_ } else { long_ };

			return Ok(Expr::new(span, ty, ExprKind::IntegerLiteral(num)));
		}

		if suffix == "l" {
			let num = parse_digits(ctx, span, value, 10)?;

			return Ok(Expr::new(span, long_, ExprKind::IntegerLiteral(num)));
		}

		if !suffix.is_empty() {
			return Err(err(
				ctx,
				span,
				CompileErrorKind::ConstantEvaluation,
				format!("unknown number suffix '{}'", suffix),
			));
		}

		// Octal with a leading zero
		if value.len() > 1
			&& value.as_bytes()[0] == b'0'
			&& value.as_bytes()[1].is_ascii_digit()
		{
			let digits = value.trim_start_matches('0');

			if digits.len() > 22 {
				return Err(err(
					ctx,
					span,
					CompileErrorKind::ConstantEvaluation,
					"overflow in octal constant".to_string(),
				));
			}

			let num = parse_digits(ctx, span, digits, 8)?;

			let ty = if num as i32 as i64 == num { int_ } else { long_ };

			return Ok(Expr::new(span, ty, ExprKind::IntegerLiteral(num)));
		}

		let num = parse_digits(ctx, span, value, 10)?;

		if num as i32 as i64 != num {
			return Err(err(
				ctx,
				span,
				CompileErrorKind::ConstantEvaluation,
				"overflow in decimal constant".to_string(),
			));
		}

		return Ok(Expr::new(span, int_, ExprKind::IntegerLiteral(num)));
	}

	let num: f64 = value.parse().map_err(|_| {
		err(
			ctx,
			span,
			CompileErrorKind::ConstantEvaluation,
			format!("invalid number '{}'", value),
		)
	})?;

	if suffix == "f" {
		let float_ = ctx.builtin.float_;

		return Ok(Expr::new(
			span,
			float_,
			ExprKind::RationalLiteral(num as f32 as f64),
		));
	}

	if !suffix.is_empty() {
		return Err(err(
			ctx,
			span,
			CompileErrorKind::ConstantEvaluation,
			format!("unknown number suffix '{}'", suffix),
		));
	}

	let double_ = ctx.builtin.double_;

	Ok(Expr::new(span, double_, ExprKind::RationalLiteral(num)))
}

fn analyze_array_literal(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	values: &[Box<Syn>],
) -> AnalyzeResult<Expr> {
	debug_assert!(!values.is_empty());

	let mut raw = Vec::new();
	let mut nested_unsized_type = None;

	for el in values {
		let value = analyze_expression(ctx, el)?;

		if let Some(first) = raw.first() {
			let first: &Expr = first;

			if first.ty != value.ty {
				if let Some((elem, _)) = ctx.types[first.ty].array_elem() {
					nested_unsized_type = Some(ctx.get_unsized_array_type(elem));
				}
			}
		}

		raw.push(value);
	}

	let mut result = Vec::new();
	let mut sub_type: Option<TypeId> = None;

	for value in raw {
		let mut value = value;

		if let Some(nested) = nested_unsized_type {
			value = create_cast(ctx, value.span, value, nested, false)?;
		}

		match sub_type {
			None => sub_type = Some(value.ty),
			Some(expected) if expected != value.ty => {
				let promote = (ctx.is_integer_type(value.ty)
					&& ctx.is_floating_point_type(expected))
					|| (ctx.is_integer_type(value.ty)
						&& ctx.is_integer_type(expected)
						&& ctx.types[expected].size > ctx.types[value.ty].size)
					|| (ctx.is_floating_point_type(value.ty)
						&& ctx.is_floating_point_type(expected)
						&& ctx.types[expected].size > ctx.types[value.ty].size);

				if promote {
					value = create_cast(ctx, value.span, value, expected, false)?;
				} else {
					return Err(err(
						ctx,
						value.span,
						CompileErrorKind::TypeMismatch,
						format!(
							"array element type '{}' doesn't match '{}'",
							ctx.type_name(value.ty),
							ctx.type_name(expected)
						),
					));
				}
			}
			_ => {}
		}

		result.push(value);
	}

	let sub_type = sub_type.unwrap();
	let array_type = ctx.get_array_type(sub_type, result.len() as i64);

	Ok(Expr::new(span, array_type, ExprKind::Array { values: result }))
}

// ----------------------------------------------------------------------
// Types
// ----------------------------------------------------------------------

pub fn analyze_alignment(ctx: &mut ExpressionContext, syntax: &Syn) -> AnalyzeResult<u64> {
	let value = analyze_expression(ctx, syntax)?;

	let alignment = evaluate_integer(ctx, &value).ok_or_else(|| {
		err(
			ctx,
			syntax.span,
			CompileErrorKind::ConstantEvaluation,
			"alignment value requires a constant expression".to_string(),
		)
	})?;

	if alignment <= 0 || alignment > 16 || !names::is_power_of_two(alignment as u64) {
		return Err(err(
			ctx,
			syntax.span,
			CompileErrorKind::LayoutLimit,
			"alignment must be a power of two no larger than 16".to_string(),
		));
	}

	Ok(alignment as u64)
}

fn apply_array_sizes_to_type(
	ctx: &mut ExpressionContext,
	ty: TypeId,
	sizes: &[Box<Syn>],
) -> AnalyzeResult<TypeId> {
	let (size, rest) = match sizes.split_first() {
		Some(pair) => pair,
		None => return Ok(ty),
	};

	let ty = apply_array_sizes_to_type(ctx, ty, rest)?;

	let omitted = matches!(size.v, SynValue::Nothing);

	if ty == ctx.builtin.auto_ {
		if !omitted {
			return Err(err(
				ctx,
				size.span,
				CompileErrorKind::TypeMismatch,
				"cannot specify array size for auto".to_string(),
			));
		}

		return Ok(ctx.builtin.auto_array);
	}

	if omitted {
		return Ok(ctx.get_unsized_array_type(ty));
	}

	let size_value = analyze_expression(ctx, size)?;
	let long_ = ctx.builtin.long_;
	let size_value = create_cast(ctx, size.span, size_value, long_, false)?;

	let length = evaluate_integer(ctx, &size_value).ok_or_else(|| {
		err(
			ctx,
			size.span,
			CompileErrorKind::ConstantEvaluation,
			"array size requires a constant expression".to_string(),
		)
	})?;

	if length <= 0 {
		return Err(err(
			ctx,
			size.span,
			CompileErrorKind::LayoutLimit,
			"array size can't be negative or zero".to_string(),
		));
	}

	Ok(ctx.get_array_type(ty, length))
}

/// Resolve type syntax. With `allow_failure`, unknown names yield `None`
/// instead of an error, used while probing formal types that may still
/// mention unbound generic aliases.
pub fn analyze_type_with_failure(
	ctx: &mut ExpressionContext,
	syntax: &Syn,
	allow_failure: bool,
) -> AnalyzeResult<Option<TypeId>> {
	match &syntax.v {
		SynValue::TypeAuto => Ok(Some(ctx.builtin.auto_)),
		SynValue::TypeGeneric { name } => {
			let alias = name.as_deref().unwrap_or("generic");

			Ok(Some(ctx.get_generic_type(alias)))
		}
		SynValue::TypeReference { inner } => {
			let inner = match analyze_type_with_failure(ctx, inner, allow_failure)? {
				Some(ty) => ty,
				None => return Ok(None),
			};

			if inner == ctx.builtin.auto_ {
				return Ok(Some(ctx.builtin.auto_ref));
			}

			Ok(Some(ctx.get_reference_type(inner)))
		}
		SynValue::TypeArray { inner, sizes } => {
			let inner = match analyze_type_with_failure(ctx, inner, allow_failure)? {
				Some(ty) => ty,
				None => return Ok(None),
			};

			apply_array_sizes_to_type(ctx, inner, sizes).map(Some)
		}
		SynValue::TypeFunction {
			return_type,
			arguments,
		} => {
			let return_type = match analyze_type_with_failure(ctx, return_type, allow_failure)? {
				Some(ty) => ty,
				None => return Ok(None),
			};

			let mut argument_types = Vec::new();

			for argument in arguments {
				match analyze_type_with_failure(ctx, argument, allow_failure)? {
					Some(ty) => argument_types.push(ty),
					None => return Ok(None),
				}
			}

			Ok(Some(ctx.get_function_type(return_type, argument_types)))
		}
		SynValue::TypeGenericInstance { base, arguments } => {
			let base_type = match analyze_type_with_failure(ctx, base, allow_failure)? {
				Some(ty) => ty,
				None => return Ok(None),
			};

			if !matches!(ctx.types[base_type].kind, TypeKind::GenericClassProto { .. }) {
				return Err(err(
					ctx,
					syntax.span,
					CompileErrorKind::GenericInstantiation,
					format!("'{}' is not a generic class", ctx.type_name(base_type)),
				));
			}

			let mut argument_types = Vec::new();
			let mut is_generic = false;

			for argument in arguments {
				match analyze_type_with_failure(ctx, argument, allow_failure)? {
					Some(ty) => {
						is_generic |= ctx.types[ty].is_generic;

						argument_types.push(ty);
					}
					None => return Ok(None),
				}
			}

			if is_generic {
				let argument_names: Vec<&str> = argument_types
					.iter()
					.map(|arg| ctx.types[*arg].name.as_str())
					.collect();

				let name = names::generic_class_type_name(
					&ctx.types[base_type].name,
					&argument_names,
				);

				let id = ctx.types.len();

				ctx.types.push(TypeEntry {
					name_hash: string_hash(&name),
					name,
					size: 0,
					alignment: 0,
					padding: 0,
					is_generic: true,
					imported: false,
					source: syntax.span,
					members: Vec::new(),
					constants: Vec::new(),
					kind: TypeKind::GenericClassInstance {
						proto: base_type,
						arguments: argument_types,
					},
				});

				return Ok(Some(id));
			}

			create_generic_type_instance(ctx, syntax.span, base_type, argument_types).map(Some)
		}
		SynValue::Typeof { value } => {
			// Speculative: the operand is a value expression
			match analyze_expression(ctx, value) {
				Ok(value) => {
					if let ExprKind::TypeLiteral(ty) = value.kind {
						return Ok(Some(ty));
					}

					Ok(Some(value.ty))
				}
				Err(error) => {
					if allow_failure {
						Ok(None)
					} else {
						Err(error)
					}
				}
			}
		}
		SynValue::TypeSimple { path, name } => {
			for scope in ctx.named_or_global_scopes() {
				let hash = ctx.scope_qualified_hash(scope, path, name);

				if let Some(ty) = ctx.type_map.find(hash) {
					return Ok(Some(ty));
				}
			}

			Ok(None)
		}
		SynValue::Identifier { name } => {
			for scope in ctx.named_or_global_scopes() {
				let hash = ctx.scope_qualified_hash(scope, &[], name);

				if let Some(ty) = ctx.type_map.find(hash) {
					return Ok(Some(ty));
				}
			}

			Ok(None)
		}
		SynValue::MemberAccess { value, member } => {
			let base = try_analyze_type(ctx, value)?;

			if let Some(base) = base {
				if let Some(result) = create_typeid_member_access(ctx, syntax.span, base, member)?
				{
					if let ExprKind::TypeLiteral(ty) = result.kind {
						return Ok(Some(ty));
					}
				}
			}

			Ok(None)
		}
		SynValue::ArrayIndex { value, arguments } => {
			// `type[N]` and `type[]` parsed in expression position
			let base = match try_analyze_type(ctx, value)? {
				Some(ty) => ty,
				None => return Ok(None),
			};

			if base == ctx.builtin.auto_ {
				if !arguments.is_empty() {
					return Err(err(
						ctx,
						syntax.span,
						CompileErrorKind::TypeMismatch,
						"cannot specify array size for auto".to_string(),
					));
				}

				return Ok(Some(ctx.builtin.auto_array));
			}

			if arguments.is_empty() {
				return Ok(Some(ctx.get_unsized_array_type(base)));
			}

			if arguments.len() > 1 {
				return Err(err(
					ctx,
					syntax.span,
					CompileErrorKind::TypeMismatch,
					"',' is not expected in array type size".to_string(),
				));
			}

			let size = analyze_expression(ctx, &arguments[0].value)?;
			let long_ = ctx.builtin.long_;
			let size = create_cast(ctx, syntax.span, size, long_, false)?;

			let length = evaluate_integer(ctx, &size).ok_or_else(|| {
				err(
					ctx,
					syntax.span,
					CompileErrorKind::ConstantEvaluation,
					"array size requires a constant expression".to_string(),
				)
			})?;

			if length <= 0 {
				return Err(err(
					ctx,
					syntax.span,
					CompileErrorKind::LayoutLimit,
					"array size can't be negative or zero".to_string(),
				));
			}

			Ok(Some(ctx.get_array_type(base, length)))
		}
		_ => Ok(None),
	}
}

pub fn analyze_type(ctx: &mut ExpressionContext, syntax: &Syn) -> AnalyzeResult<TypeId> {
	match analyze_type_with_failure(ctx, syntax, false)? {
		Some(ty) => Ok(ty),
		None => Err(err(
			ctx,
			syntax.span,
			CompileErrorKind::NameResolution,
			"unknown type name".to_string(),
		)),
	}
}

/// Probe whether syntax denotes a type; value expressions yield `None` and
/// analysis errors inside the probe are suppressed.
pub fn try_analyze_type(
	ctx: &mut ExpressionContext,
	syntax: &Syn,
) -> AnalyzeResult<Option<TypeId>> {
	match analyze_type_with_failure(ctx, syntax, true) {
		Ok(result) => Ok(result),
		Err(_) => Ok(None),
	}
}

// ----------------------------------------------------------------------
// Expressions
// ----------------------------------------------------------------------

pub fn analyze_expression(ctx: &mut ExpressionContext, syntax: &Syn) -> AnalyzeResult<Expr> {
	let span = syntax.span;

	match &syntax.v {
		SynValue::Bool { value } => Ok(Expr::new(
			span,
			ctx.builtin.bool_,
			ExprKind::BoolLiteral(*value),
		)),
		SynValue::Number { value, suffix } => analyze_number(ctx, span, value, suffix),
		SynValue::Char { value } => Ok(Expr::new(
			span,
			ctx.builtin.char_,
			ExprKind::CharLiteral(*value),
		)),
		SynValue::String { value } => {
			let char_ = ctx.builtin.char_;
			let ty = ctx.get_array_type(char_, value.len() as i64 + 1);

			Ok(Expr::new(
				span,
				ty,
				ExprKind::StringLiteral(value.as_bytes().to_vec()),
			))
		}
		SynValue::Null => Ok(Expr::new(
			span,
			ctx.builtin.nullptr_,
			ExprKind::NullptrLiteral,
		)),
		SynValue::Identifier { name } => {
			if let Some(value) = create_variable_access_named(ctx, span, &[], name)? {
				return Ok(value);
			}

			if let Some(ty) = try_analyze_type(ctx, syntax)? {
				let typeid_ = ctx.builtin.typeid_;

				return Ok(Expr::new(span, typeid_, ExprKind::TypeLiteral(ty)));
			}

			Err(err(
				ctx,
				span,
				CompileErrorKind::NameResolution,
				format!("unknown variable '{}'", name),
			))
		}
		SynValue::TypeSimple { path, name } => {
			if let Some(value) = create_variable_access_named(ctx, span, path, name)? {
				return Ok(value);
			}

			if let Some(ty) = try_analyze_type(ctx, syntax)? {
				let typeid_ = ctx.builtin.typeid_;

				return Ok(Expr::new(span, typeid_, ExprKind::TypeLiteral(ty)));
			}

			Err(err(
				ctx,
				span,
				CompileErrorKind::NameResolution,
				format!("unknown variable '{}'", name),
			))
		}
		SynValue::TypeAuto
		| SynValue::TypeGeneric { .. }
		| SynValue::TypeReference { .. }
		| SynValue::TypeArray { .. }
		| SynValue::TypeFunction { .. }
		| SynValue::TypeGenericInstance { .. } => {
			let ty = analyze_type(ctx, syntax)?;
			let typeid_ = ctx.builtin.typeid_;

			Ok(Expr::new(span, typeid_, ExprKind::TypeLiteral(ty)))
		}
		SynValue::Typeof { value } => {
			let value = analyze_expression(ctx, value)?;
			let typeid_ = ctx.builtin.typeid_;

			if let ExprKind::TypeLiteral(_) = value.kind {
				return Ok(value);
			}

			let ty = value.ty;

			Ok(Expr::new(span, typeid_, ExprKind::TypeLiteral(ty)))
		}
		SynValue::ArrayLiteral { values } => analyze_array_literal(ctx, span, values),
		SynValue::MemberAccess { value, member } => {
			// A type property like `typeof(x).target` comes here as well
			if let Some(ty) = try_analyze_type(ctx, value)? {
				if let Some(result) = create_typeid_member_access(ctx, span, ty, member)? {
					return Ok(result);
				}

				return Err(err(
					ctx,
					span,
					CompileErrorKind::NameResolution,
					"unknown member expression type".to_string(),
				));
			}

			let value = analyze_expression(ctx, value)?;

			create_member_access(ctx, span, value, member, false)
				.map(|result| result.expect("member access reports its own failure"))
		}
		SynValue::ArrayIndex { value, arguments } => {
			if let Some(ty) = try_analyze_type(ctx, syntax)? {
				let typeid_ = ctx.builtin.typeid_;

				return Ok(Expr::new(span, typeid_, ExprKind::TypeLiteral(ty)));
			}

			let value = analyze_expression(ctx, value)?;

			let mut argument_data = Vec::new();

			for argument in arguments {
				let index = analyze_expression(ctx, &argument.value)?;

				argument_data.push(ArgumentData {
					source: index.span,
					is_explicit: false,
					name: argument.name.clone(),
					ty: index.ty,
					value: Some(index),
				});
			}

			create_array_index(ctx, span, value, argument_data)
		}
		SynValue::Call {
			value,
			generics,
			arguments,
		} => analyze_function_call(ctx, span, value, generics, arguments),
		SynValue::New {
			ty,
			count,
			arguments,
			constructor,
		} => analyze_new(ctx, span, ty, count.as_deref(), arguments, constructor),
		SynValue::PreModify {
			value,
			is_increment,
		} => {
			let value = analyze_expression(ctx, value)?;
			let wrapped = create_modify_target(ctx, span, value)?;

			let result_type = ctx.types[wrapped.ty].ref_target().unwrap();

			Ok(Expr::new(
				span,
				result_type,
				ExprKind::PreModify {
					value: Box::new(wrapped),
					is_increment: *is_increment,
				},
			))
		}
		SynValue::PostModify {
			value,
			is_increment,
		} => {
			let value = analyze_expression(ctx, value)?;
			let value_type = value.ty;
			let wrapped = create_modify_target(ctx, span, value)?;

			if !ctx.is_numeric_type(value_type) {
				return Err(err(
					ctx,
					span,
					CompileErrorKind::TypeMismatch,
					format!(
						"{} is not supported on '{}'",
						if *is_increment { "increment" } else { "decrement" },
						ctx.type_name(value_type)
					),
				));
			}

			Ok(Expr::new(
				span,
				value_type,
				ExprKind::PostModify {
					value: Box::new(wrapped),
					is_increment: *is_increment,
				},
			))
		}
		SynValue::UnaryOp { op, value } => {
			let value = analyze_expression(ctx, value)?;

			create_unary_op(ctx, span, *op, value)
		}
		SynValue::BinaryOp { op, lhs, rhs } => {
			let lhs = analyze_expression(ctx, lhs)?;
			let rhs = analyze_expression(ctx, rhs)?;

			create_binary_op(ctx, span, *op, lhs, rhs)
		}
		SynValue::GetAddress { value } => {
			let value = analyze_expression(ctx, value)?;

			create_get_address(ctx, span, value)
		}
		SynValue::Dereference { value } => {
			let value = analyze_expression(ctx, value)?;

			match ctx.types[value.ty].ref_target() {
				Some(target) => Ok(Expr::new(
					span,
					target,
					ExprKind::Dereference(Box::new(value)),
				)),
				None => Err(err(
					ctx,
					span,
					CompileErrorKind::TypeMismatch,
					format!(
						"cannot dereference type '{}' that is not a pointer",
						ctx.type_name(value.ty)
					),
				)),
			}
		}
		SynValue::Conditional {
			condition,
			true_block,
			false_block,
		} => {
			let condition = analyze_expression(ctx, condition)?;
			let condition = create_condition_cast(ctx, condition.span, condition)?;

			let mut true_block = analyze_statement(ctx, true_block)?;
			let mut false_block = analyze_statement(ctx, false_block)?;

			// Null pointer literals adopt the other side's type
			if true_block.ty != false_block.ty {
				if true_block.ty == ctx.builtin.nullptr_ {
					let target = false_block.ty;

					true_block = create_cast(ctx, true_block.span, true_block, target, false)?;
				}

				if false_block.ty == ctx.builtin.nullptr_ {
					let target = true_block.ty;

					false_block = create_cast(ctx, false_block.span, false_block, target, false)?;
				}
			}

			let result_type = if true_block.ty == false_block.ty {
				true_block.ty
			} else if ctx.is_numeric_type(true_block.ty) && ctx.is_numeric_type(false_block.ty) {
				let common = ctx
					.binary_op_result_type(true_block.ty, false_block.ty)
					.unwrap();

				true_block = create_cast(ctx, true_block.span, true_block, common, false)?;
				false_block = create_cast(ctx, false_block.span, false_block, common, false)?;

				common
			} else {
				return Err(err(
					ctx,
					span,
					CompileErrorKind::TypeMismatch,
					"unknown common type".to_string(),
				));
			};

			Ok(Expr::new(
				span,
				result_type,
				ExprKind::Conditional {
					condition: Box::new(condition),
					true_block: Box::new(true_block),
					false_block: Box::new(false_block),
				},
			))
		}
		SynValue::Assignment { lhs, rhs } => {
			let lhs = analyze_expression(ctx, lhs)?;
			let rhs = analyze_expression(ctx, rhs)?;

			create_assignment(ctx, span, lhs, rhs)
		}
		SynValue::ModifyAssignment { op, lhs, rhs } => {
			let lhs = analyze_expression(ctx, lhs)?;
			let rhs = analyze_expression(ctx, rhs)?;

			if let Some(result) = create_function_call_2(
				ctx,
				span,
				crate::frontend::modify_assign_name(*op),
				lhs.clone(),
				rhs.clone(),
				true,
			)? {
				return Ok(result);
			}

			let combined = create_binary_op(
				ctx,
				span,
				crate::frontend::modify_assign_op(*op),
				lhs.clone(),
				rhs,
			)?;

			create_assignment(ctx, span, lhs, combined)
		}
		SynValue::FunctionDefinition(definition) => {
			analyze_function_definition(ctx, definition, None, None, Vec::new(), true, true)
		}
		SynValue::ShortFunctionDefinition(_) => Err(err(
			ctx,
			span,
			CompileErrorKind::TypeMismatch,
			"cannot infer argument types for the function".to_string(),
		)),
		SynValue::Generator { expressions } => analyze_generator(ctx, span, expressions),
		_ => Err(err(
			ctx,
			span,
			CompileErrorKind::TypeMismatch,
			"unknown expression type".to_string(),
		)),
	}
}

fn create_modify_target(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	value: Expr,
) -> AnalyzeResult<Expr> {
	let value_type = value.ty;

	let wrapped = match value.kind {
		ExprKind::VariableAccess(variable) => {
			let ref_type = ctx.get_reference_type(value_type);

			Expr::new(span, ref_type, ExprKind::GetAddress(variable))
		}
		ExprKind::Dereference(inner) => *inner,
		kind => Expr::new(span, value_type, kind),
	};

	if !ctx.types[wrapped.ty].is_ref() {
		return Err(err(
			ctx,
			span,
			CompileErrorKind::TypeMismatch,
			format!(
				"cannot change immutable value of type {}",
				ctx.type_name(value_type)
			),
		));
	}

	Ok(wrapped)
}

// ----------------------------------------------------------------------
// Calls and allocation
// ----------------------------------------------------------------------

fn analyze_function_call(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	value: &Syn,
	generic_syntax: &[Box<Syn>],
	arguments: &[SynCallArgument],
) -> AnalyzeResult<Expr> {
	let function = analyze_expression(ctx, value)?;

	let mut generics = Vec::new();

	for generic in generic_syntax {
		generics.push(analyze_type(ctx, generic)?);
	}

	if let ExprKind::TypeLiteral(type_value) = function.kind {
		// hasMember(x) queries a member-set type value
		if let TypeKind::MemberSet { class } = ctx.types[type_value].kind {
			if generics.is_empty() && arguments.len() == 1 && arguments[0].name.is_none() {
				let queried = match &arguments[0].value.v {
					SynValue::Identifier { name } => Some(name),
					SynValue::TypeSimple { path, name } if path.is_empty() => Some(name),
					_ => None,
				};

				if let Some(name) = queried {
					let found = ctx.find_member(class, name).is_some();
					let bool_ = ctx.builtin.bool_;

					return Ok(Expr::new(span, bool_, ExprKind::BoolLiteral(found)));
				}
			}
		}

		// The name may also resolve to conversion functions
		let regular = match &value.v {
			SynValue::TypeSimple { path, name } => {
				create_variable_access_named(ctx, span, path, name)?
			}
			SynValue::Identifier { name } => create_variable_access_named(ctx, span, &[], name)?,
			_ => {
				let name = ctx.types[type_value].name.clone();

				create_variable_access_named(ctx, span, &[], &name)?
			}
		};

		if let Some(regular) = regular {
			let functions = get_node_functions(ctx, span, &regular)?;

			return create_function_call_with_syntax_args(
				ctx,
				span,
				function,
				functions,
				generics,
				arguments,
				false,
			)
			.map(|result| result.expect("call resolution reports its own failure"));
		}

		// Construct a value of the named type in a temporary
		let variable = allocate_temporary(ctx, span, type_value);

		let ref_type = ctx.get_reference_type(type_value);
		let pointer = Expr::new(span, ref_type, ExprKind::GetAddress(variable));

		let definition = Expr::new(
			span,
			ctx.builtin.void_,
			ExprKind::VariableDefinition {
				variable,
				initializer: None,
			},
		);

		let constructor_name = constructor_function_name(ctx, type_value);

		let hash = string_hash_pair(ctx.types[type_value].name_hash, &constructor_name);

		let mut constructor_functions = ctx.function_map.find_all(hash);

		if constructor_functions.is_empty() {
			if let Some(proto) = ctx.types[type_value].class().and_then(|class| class.proto) {
				let proto_name = ctx.types[proto].name.clone();
				let short = proto_name.rsplit('.').next().unwrap_or(&proto_name);

				let hash = string_hash_pair(ctx.types[proto].name_hash, short);

				constructor_functions = ctx.function_map.find_all(hash);
			}
		}

		if constructor_functions.is_empty() && arguments.is_empty() {
			let access = Expr::new(span, type_value, ExprKind::VariableAccess(variable));

			return Ok(create_sequence(span, vec![definition, access]));
		}

		if !constructor_functions.is_empty() {
			let constructor =
				create_function_access(ctx, span, &constructor_functions, Some(pointer))?;

			let functions = get_node_functions(ctx, span, &constructor)?;

			let call = create_function_call_with_syntax_args(
				ctx,
				span,
				function,
				functions,
				generics,
				arguments,
				false,
			)?
			.expect("call resolution reports its own failure");

			let access = Expr::new(span, type_value, ExprKind::VariableAccess(variable));

			return Ok(create_sequence(span, vec![definition, call, access]));
		}

		let function = Expr::new(
			span,
			ctx.builtin.typeid_,
			ExprKind::TypeLiteral(type_value),
		);

		return create_function_call_with_syntax_args(
			ctx,
			span,
			function,
			Vec::new(),
			generics,
			arguments,
			false,
		)
		.map(|result| result.expect("call resolution reports its own failure"));
	}

	let functions = get_node_functions(ctx, span, &function)?;

	create_function_call_with_syntax_args(ctx, span, function, functions, generics, arguments, false)
		.map(|result| result.expect("call resolution reports its own failure"))
}

fn string_hash_pair(parent_hash: u32, name: &str) -> u32 {
	let hash = crate::frontend::string_hash_continue(parent_hash, "::");

	crate::frontend::string_hash_continue(hash, name)
}

fn constructor_function_name(ctx: &ExpressionContext, ty: TypeId) -> String {
	let mut name = ctx.types[ty].name.clone();

	if let Some(class) = ctx.types[ty].class() {
		if let Some(proto) = class.proto {
			name = ctx.types[proto].name.clone();
		}
	}

	name.rsplit('.').next().unwrap_or(&name).to_string()
}

fn analyze_new(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	type_syntax: &Syn,
	count: Option<&Syn>,
	arguments: &[SynCallArgument],
	constructor: &[Box<Syn>],
) -> AnalyzeResult<Expr> {
	let ty = analyze_type(ctx, type_syntax)?;

	let int_ = ctx.builtin.int_;
	let typeid_ = ctx.builtin.typeid_;

	let size = Expr::new(span, int_, ExprKind::IntegerLiteral(ctx.types[ty].size as i64));

	let type_id = Expr::new(
		span,
		int_,
		ExprKind::TypeCast {
			value: Box::new(Expr::new(span, typeid_, ExprKind::TypeLiteral(ty))),
			cast: CastKind::Reinterpret,
		},
	);

	if let Some(count) = count {
		debug_assert!(arguments.is_empty() && constructor.is_empty());

		let count = analyze_expression(ctx, count)?;

		let call = create_function_call_3(ctx, span, "__newA", size, count, type_id, false)?
			.expect("__newA is supplied by the base module");

		let array_type = ctx.get_unsized_array_type(ty);

		return Ok(Expr::new(
			span,
			array_type,
			ExprKind::TypeCast {
				value: Box::new(call),
				cast: CastKind::Reinterpret,
			},
		));
	}

	let ref_type = ctx.get_reference_type(ty);

	let call = create_function_call_2(ctx, span, "__newS", size, type_id, false)?
		.expect("__newS is supplied by the base module");

	let mut alloc = Expr::new(
		span,
		ref_type,
		ExprKind::TypeCast {
			value: Box::new(call),
			cast: CastKind::Reinterpret,
		},
	);

	// A constructor is a method named like the class's short name
	let constructor_name = constructor_function_name(ctx, ty);
	let hash = string_hash_pair(ctx.types[ty].name_hash, &constructor_name);

	let constructor_functions = ctx.function_map.find_all(hash);

	if !constructor_functions.is_empty() {
		let variable = allocate_temporary(ctx, span, ref_type);

		let access = Expr::new(span, ref_type, ExprKind::VariableAccess(variable));
		let assignment = create_assignment(ctx, span, access, alloc.clone())?;

		let definition = Expr::new(
			span,
			ctx.builtin.void_,
			ExprKind::VariableDefinition {
				variable,
				initializer: Some(Box::new(assignment)),
			},
		);

		let context = Expr::new(span, ref_type, ExprKind::VariableAccess(variable));

		let overloads =
			create_function_access(ctx, span, &constructor_functions, Some(context))?;

		let functions = get_node_functions(ctx, span, &overloads)?;

		if let Some(call) = create_function_call_with_syntax_args(
			ctx,
			span,
			overloads,
			functions,
			Vec::new(),
			arguments,
			arguments.is_empty(),
		)? {
			let access = Expr::new(span, ref_type, ExprKind::VariableAccess(variable));

			alloc = Expr::new(
				span,
				ref_type,
				ExprKind::Sequence(vec![definition, call, access]),
			);
		}
	} else if arguments.len() == 1 && arguments[0].name.is_none() {
		// Copy-initialize from a single unnamed argument
		let variable = allocate_temporary(ctx, span, ref_type);

		let access = Expr::new(span, ref_type, ExprKind::VariableAccess(variable));
		let assignment = create_assignment(ctx, span, access, alloc)?;

		let definition = Expr::new(
			span,
			ctx.builtin.void_,
			ExprKind::VariableDefinition {
				variable,
				initializer: Some(Box::new(assignment)),
			},
		);

		let pointee = Expr::new(
			span,
			ty,
			ExprKind::Dereference(Box::new(Expr::new(
				span,
				ref_type,
				ExprKind::VariableAccess(variable),
			))),
		);

		let initializer = analyze_expression(ctx, &arguments[0].value)?;
		let copy = create_assignment(ctx, span, pointee, initializer)?;

		let access = Expr::new(span, ref_type, ExprKind::VariableAccess(variable));

		alloc = Expr::new(
			span,
			ref_type,
			ExprKind::Sequence(vec![definition, copy, access]),
		);
	} else if !arguments.is_empty() {
		return Err(err(
			ctx,
			span,
			CompileErrorKind::OverloadSelection,
			format!(
				"function '{}::{}' that accepts {} arguments is undefined",
				ctx.type_name(ty),
				constructor_name,
				arguments.len()
			),
		));
	}

	if !constructor.is_empty() {
		// `new T { body }` runs the body as a temporary method on T
		let variable = allocate_temporary(ctx, span, ref_type);

		let access = Expr::new(span, ref_type, ExprKind::VariableAccess(variable));
		let assignment = create_assignment(ctx, span, access, alloc)?;

		let definition = Expr::new(
			span,
			ctx.builtin.void_,
			ExprKind::VariableDefinition {
				variable,
				initializer: Some(Box::new(assignment)),
			},
		);

		let body_syntax = Rc::new(SynFunctionDefinition {
			span,
			parent_type: None,
			prototype: false,
			coroutine: false,
			accessor: false,
			is_operator: false,
			name: String::new(),
			aliases: Vec::new(),
			return_type: Syn::new(
				span,
				SynValue::TypeSimple {
					path: Vec::new(),
					name: "void".to_string(),
				},
			),
			arguments: Vec::new(),
			expressions: constructor.to_vec(),
		});

		let void_ = ctx.builtin.void_;

		let function_definition =
			create_function_definition(ctx, &body_syntax, Some(ty), void_, None, Vec::new())?;

		let function = match &function_definition.kind {
			ExprKind::FunctionDefinition { function, .. } => *function,
			_ => unreachable!("a constructor body is a concrete function"),
		};

		let context = Expr::new(span, ref_type, ExprKind::VariableAccess(variable));

		let functions = vec![crate::frontend::FunctionValue { function, context }];

		let callee = Expr::new(
			span,
			ctx.functions[function].ty,
			ExprKind::FunctionAccess {
				function,
				context: Box::new(Expr::new(span, ref_type, ExprKind::VariableAccess(variable))),
			},
		);

		let call = create_function_call_resolved(
			ctx,
			span,
			callee,
			functions,
			Vec::new(),
			Vec::new(),
			false,
		)?
		.expect("a constructor body takes no arguments");

		let access = Expr::new(span, ref_type, ExprKind::VariableAccess(variable));

		alloc = Expr::new(
			span,
			ref_type,
			ExprKind::Sequence(vec![definition, function_definition, call, access]),
		);
	}

	Ok(alloc)
}

// ----------------------------------------------------------------------
// Statements
// ----------------------------------------------------------------------

pub fn analyze_statement(ctx: &mut ExpressionContext, syntax: &Syn) -> AnalyzeResult<Expr> {
	let span = syntax.span;

	match &syntax.v {
		SynValue::VariableDefinitions {
			align,
			ty,
			definitions,
		} => analyze_variable_definitions(ctx, span, align.as_deref(), ty, definitions),
		SynValue::FunctionDefinition(definition) => {
			analyze_function_definition(ctx, definition, None, None, Vec::new(), false, false)
		}
		SynValue::ClassDefinition(definition) => {
			analyze_class_definition(ctx, definition, None, Vec::new())
		}
		SynValue::EnumDefinition { name, values } => {
			analyze_enum_definition(ctx, span, name, values)
		}
		SynValue::NamespaceDefinition { name, expressions } => {
			analyze_namespace_definition(ctx, span, name, expressions)
		}
		SynValue::Typedef { alias, ty } => analyze_typedef(ctx, span, alias, ty),
		SynValue::IfElse {
			static_if,
			condition,
			true_block,
			false_block,
		} => analyze_if_else(
			ctx,
			span,
			*static_if,
			condition,
			true_block,
			false_block.as_deref(),
		),
		SynValue::For {
			initializer,
			condition,
			increment,
			body,
		} => analyze_for(
			ctx,
			span,
			initializer.as_deref(),
			condition,
			increment.as_deref(),
			body.as_deref(),
		),
		SynValue::ForEach { iterators, body } => {
			analyze_for_each(ctx, span, iterators, body.as_deref())
		}
		SynValue::While { condition, body } => analyze_while(ctx, span, condition, body.as_deref()),
		SynValue::DoWhile {
			expressions,
			condition,
		} => analyze_do_while(ctx, span, expressions, condition),
		SynValue::Switch { condition, cases } => analyze_switch(ctx, span, condition, cases),
		SynValue::Break { number } => analyze_break(ctx, span, number.as_deref()),
		SynValue::Continue { number } => analyze_continue(ctx, span, number.as_deref()),
		SynValue::Return { value } => analyze_return(ctx, span, value.as_deref()),
		SynValue::Yield { value } => analyze_yield(ctx, span, value.as_deref()),
		SynValue::Block { expressions } => analyze_block(ctx, span, expressions, true),
		_ => analyze_expression(ctx, syntax),
	}
}

fn analyze_block(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	expressions: &[Box<Syn>],
	create_scope: bool,
) -> AnalyzeResult<Expr> {
	if create_scope {
		ctx.push_scope(ScopeOwner::None);
	}

	let mut result = Vec::new();

	for expression in expressions {
		result.push(analyze_statement(ctx, expression)?);
	}

	if create_scope {
		ctx.pop_scope(Some(span))?;
	}

	Ok(Expr::new(span, ctx.builtin.void_, ExprKind::Block(result)))
}

// ----------------------------------------------------------------------
// Variable definitions
// ----------------------------------------------------------------------

fn resolve_initializer_value(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	initializer: Option<Expr>,
) -> AnalyzeResult<Expr> {
	let initializer = initializer.ok_or_else(|| {
		err(
			ctx,
			span,
			CompileErrorKind::TypeMismatch,
			"auto variable must be initialized in place of definition".to_string(),
		)
	})?;

	if initializer.ty == ctx.builtin.void_ {
		return Err(err(
			ctx,
			span,
			CompileErrorKind::TypeMismatch,
			"r-value type is 'void'".to_string(),
		));
	}

	let mut initializer = initializer;

	if ctx.types[initializer.ty].is_function() {
		let target = initializer.ty;

		if let Some(best) =
			crate::frontend::get_function_for_type(ctx, span, &initializer, target)?
		{
			let function_type = ctx.functions[best.function].ty;

			initializer = Expr::new(
				span,
				function_type,
				ExprKind::FunctionAccess {
					function: best.function,
					context: Box::new(best.context),
				},
			);
		}
	}

	if let ExprKind::FunctionOverloadSet { functions, context } = &initializer.kind {
		if functions.len() == 1 {
			let function = functions[0];
			let context = context.clone();

			let context_is_auto_ref = context
				.as_ref()
				.map(|context| context.ty == ctx.builtin.auto_ref)
				.unwrap_or(false);

			if context_is_auto_ref {
				let context = *context.unwrap();
				let table = crate::frontend::get_function_table(ctx, span, function);

				let redirected =
					create_function_call_2(ctx, span, "__redirect_ptr", context, table, false)?
						.expect("__redirect_ptr is supplied by the base module");

				let function_type = ctx.functions[function].ty;

				initializer = Expr::new(
					span,
					function_type,
					ExprKind::TypeCast {
						value: Box::new(redirected),
						cast: CastKind::Reinterpret,
					},
				);
			} else {
				let context = match context {
					Some(context) => *context,
					None => create_function_context_access(ctx, span, function)?,
				};

				let function_type = ctx.functions[function].ty;

				initializer = Expr::new(
					span,
					function_type,
					ExprKind::FunctionAccess {
						function,
						context: Box::new(context),
					},
				);
			}
		} else {
			return Err(err(
				ctx,
				span,
				CompileErrorKind::OverloadSelection,
				"ambiguity, there is more than one overloaded function available".to_string(),
			));
		}
	}

	Ok(initializer)
}

fn analyze_variable_definition(
	ctx: &mut ExpressionContext,
	syntax: &SynVariableDefinition,
	alignment: u64,
	ty: TypeId,
) -> AnalyzeResult<Expr> {
	if syntax.name == "this" {
		return Err(err(
			ctx,
			syntax.span,
			CompileErrorKind::NameResolution,
			"'this' is a reserved keyword".to_string(),
		));
	}

	let full_name = ctx.name_in_scope(&syntax.name);
	let full_hash = string_hash(&full_name);

	if ctx.type_map.find(full_hash).is_some() {
		return Err(err(
			ctx,
			syntax.span,
			CompileErrorKind::NameResolution,
			format!("name '{}' is already taken for a class", syntax.name),
		));
	}

	if let Some(previous) = ctx.variable_map.find(full_hash) {
		if ctx.variables[previous].scope == ctx.scope {
			return Err(err(
				ctx,
				syntax.span,
				CompileErrorKind::NameResolution,
				format!(
					"name '{}' is already taken for a variable in current scope",
					syntax.name
				),
			));
		}
	}

	if let Some(previous) = ctx.function_map.find(full_hash) {
		if ctx.functions[previous].scope == ctx.scope {
			return Err(err(
				ctx,
				syntax.span,
				CompileErrorKind::NameResolution,
				format!("name '{}' is already taken for a function", syntax.name),
			));
		}
	}

	let unique_id = ctx.unique_variable_id;
	ctx.unique_variable_id += 1;

	let variable = ctx.add_variable(VariableData {
		source: syntax.span,
		scope: ctx.scope,
		ty,
		name: full_name,
		name_hash: full_hash,
		alignment: 0,
		offset: 0,
		unique_id,
		is_reference: false,
		imported: false,
	});

	let initializer = match &syntax.initializer {
		Some(initializer) => Some(analyze_expression(ctx, initializer)?),
		None => None,
	};

	let mut ty = ty;
	let mut initializer = initializer;

	if ty == ctx.builtin.auto_ {
		let resolved = resolve_initializer_value(ctx, syntax.span, initializer.take())?;

		ty = resolved.ty;
		initializer = Some(resolved);
	}

	let mut alignment = alignment;

	if alignment == 0 && ctx.types[ty].alignment != 0 {
		alignment = ctx.types[ty].alignment;
	}

	debug_assert!(!ctx.types[ty].is_generic);
	debug_assert_ne!(ty, ctx.builtin.auto_);

	// The final type is known now, fix up the variable's slot
	let size = ctx.types[ty].size;
	let offset = ctx.allocate_in_scope(alignment, size);

	ctx.variables[variable].ty = ty;
	ctx.variables[variable].alignment = alignment;
	ctx.variables[variable].offset = offset;

	let initializer = match initializer {
		Some(value) => {
			let array_elem = ctx.types[ty].array_elem();

			// A sized array may be filled from a single element value
			let fills_array = array_elem.is_some()
				&& !ctx.types[value.ty].is_array()
				&& value.ty != ctx.builtin.auto_array;

			if fills_array {
				let (elem, _) = array_elem.unwrap();

				let value = create_cast(ctx, value.span, value, elem, false)?;

				Some(Box::new(Expr::new(
					syntax.span,
					ctx.builtin.void_,
					ExprKind::ArraySetup {
						variable,
						initializer: Box::new(value),
					},
				)))
			} else {
				let access = Expr::new(syntax.span, ty, ExprKind::VariableAccess(variable));

				Some(Box::new(create_assignment(ctx, syntax.span, access, value)?))
			}
		}
		None => None,
	};

	Ok(Expr::new(
		syntax.span,
		ctx.builtin.void_,
		ExprKind::VariableDefinition {
			variable,
			initializer,
		},
	))
}

fn analyze_variable_definitions(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	align: Option<&Syn>,
	ty: &Syn,
	definitions: &[SynVariableDefinition],
) -> AnalyzeResult<Expr> {
	let alignment = match align {
		Some(align) => analyze_alignment(ctx, align)?,
		None => 0,
	};

	let parent_type = ctx.get_current_type();

	// Member types may reference 'this' (for typeof-style expressions)
	if let Some(parent_type) = parent_type {
		ctx.push_temporary_scope();

		let ref_type = ctx.get_reference_type(parent_type);

		let unique_id = ctx.unique_variable_id;
		ctx.unique_variable_id += 1;

		ctx.add_variable(VariableData {
			source: span,
			scope: ctx.scope,
			ty: ref_type,
			name: "this".to_string(),
			name_hash: string_hash("this"),
			alignment: 0,
			offset: 0,
			unique_id,
			is_reference: false,
			imported: false,
		});
	}

	let ty = analyze_type(ctx, ty);

	if parent_type.is_some() {
		ctx.pop_scope(Some(span))?;
	}

	let ty = ty?;

	let mut result = Vec::new();

	for definition in definitions {
		result.push(analyze_variable_definition(ctx, definition, alignment, ty)?);
	}

	Ok(Expr::new(
		span,
		ctx.builtin.void_,
		ExprKind::VariableDefinitions(result),
	))
}

// ----------------------------------------------------------------------
// Function definitions
// ----------------------------------------------------------------------

pub fn restore_parent_type_scope(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	parent_type: Option<TypeId>,
) -> AnalyzeResult<bool> {
	let parent_type = match parent_type {
		Some(parent) => parent,
		None => return Ok(false),
	};

	if let ScopeOwner::Type(current) = ctx.scopes[ctx.scope].owner {
		if current == parent_type {
			return Ok(false);
		}
	}

	ctx.push_scope(ScopeOwner::Type(parent_type));

	match &ctx.types[parent_type].kind {
		TypeKind::Class(_) => {
			let class = ctx.types[parent_type].class().unwrap();

			let generics = class.generics.clone();
			let aliases = class.aliases.clone();
			let members = ctx.types[parent_type].members.clone();

			for el in generics.iter().chain(aliases.iter()) {
				let unique_id = ctx.unique_alias_id;
				ctx.unique_alias_id += 1;

				ctx.add_alias(AliasData {
					source: span,
					scope: ctx.scope,
					ty: el.ty,
					name: el.name.clone(),
					name_hash: string_hash(&el.name),
					unique_id,
					imported: false,
				});
			}

			for member in members {
				ctx.register_existing_variable(member);
			}
		}
		TypeKind::GenericClassProto { definition, .. } => {
			let aliases = definition.aliases.clone();

			for alias in aliases {
				let generic = ctx.get_generic_type("generic");

				let unique_id = ctx.unique_alias_id;
				ctx.unique_alias_id += 1;

				let name_hash = string_hash(&alias);

				ctx.add_alias(AliasData {
					source: span,
					scope: ctx.scope,
					ty: generic,
					name: alias,
					name_hash,
					unique_id,
					imported: false,
				});
			}
		}
		_ => {}
	}

	Ok(true)
}

fn create_function_context_type(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	function_name: &str,
) -> TypeId {
	let name = names::function_context_type_name(function_name, ctx.functions.len());

	let entry = TypeEntry {
		name_hash: string_hash(&name),
		name,
		size: 0,
		alignment: 0,
		padding: 0,
		is_generic: false,
		imported: false,
		source: span,
		members: Vec::new(),
		constants: Vec::new(),
		kind: TypeKind::Class(crate::frontend::ClassData::default()),
	};

	let class_type = ctx.add_type(entry);

	let type_scope = ctx.push_scope(ScopeOwner::Type(class_type));

	if let Some(class) = ctx.types[class_type].class_mut() {
		class.type_scope = Some(type_scope);
	}

	ctx.pop_scope(Some(span)).expect("the scope was just pushed");

	class_type
}

fn create_function_context_argument(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	function: FunctionId,
) -> Expr {
	let ty = ctx.functions[function].context_type;

	debug_assert!(!ctx.types[ty].is_generic);

	let size = ctx.types[ty].size;
	let offset = ctx.allocate_in_scope(0, size);

	let function_scope = ctx.functions[function].scope;

	let is_member = matches!(ctx.scopes[function_scope].owner, ScopeOwner::Type(_));

	let name = if is_member { "this" } else { "$context" };

	let unique_id = ctx.unique_variable_id;
	ctx.unique_variable_id += 1;

	let variable = ctx.add_variable(VariableData {
		source: span,
		scope: ctx.scope,
		ty,
		name: name.to_string(),
		name_hash: string_hash(name),
		alignment: 0,
		offset,
		unique_id,
		is_reference: false,
		imported: false,
	});

	ctx.functions[function].context_argument = Some(variable);

	Expr::new(
		span,
		ctx.builtin.void_,
		ExprKind::VariableDefinition {
			variable,
			initializer: None,
		},
	)
}

/// Allocate and initialize the closure object at the definition site.
/// Coroutine upvalues are closed immediately: the value is copied and the
/// target pointer re-aimed at the copy.
fn create_function_context_variable(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	function: FunctionId,
) -> AnalyzeResult<Option<Expr>> {
	let function_scope = ctx.functions[function].scope;

	if matches!(ctx.scopes[function_scope].owner, ScopeOwner::Type(_)) {
		return Ok(None);
	}

	let ref_type = ctx.functions[function].context_type;

	let class_type = ctx.types[ref_type]
		.ref_target()
		.expect("a closure context is a reference to the context class");

	if ctx.types[class_type].members.is_empty() {
		// No captures; the context degenerates to a void reference
		let void_ref = ctx.get_reference_type(ctx.builtin.void_);

		ctx.functions[function].context_type = void_ref;

		return Ok(None);
	}

	let alignment = ctx.types[ref_type].alignment;
	let size = ctx.types[ref_type].size;
	let offset = ctx.allocate_in_scope(alignment, size);

	let variable_name = names::function_context_variable_name(
		&ctx.functions[function].name,
		ctx.functions[function].unique_id as usize,
	);

	let unique_id = ctx.unique_variable_id;
	ctx.unique_variable_id += 1;

	let name_hash = string_hash(&variable_name);

	let context_variable = ctx.add_variable(VariableData {
		source: span,
		scope: ctx.scope,
		ty: ref_type,
		name: variable_name,
		name_hash,
		alignment,
		offset,
		unique_id,
		is_reference: false,
		imported: false,
	});

	ctx.functions[function].context_variable = Some(context_variable);

	let int_ = ctx.builtin.int_;
	let typeid_ = ctx.builtin.typeid_;

	let size_literal = Expr::new(
		span,
		int_,
		ExprKind::IntegerLiteral(ctx.types[class_type].size as i64),
	);

	let type_id = Expr::new(
		span,
		int_,
		ExprKind::TypeCast {
			value: Box::new(Expr::new(span, typeid_, ExprKind::TypeLiteral(class_type))),
			cast: CastKind::Reinterpret,
		},
	);

	let call = create_function_call_2(ctx, span, "__newS", size_literal, type_id, false)?
		.expect("__newS is supplied by the base module");

	let alloc = Expr::new(
		span,
		ref_type,
		ExprKind::TypeCast {
			value: Box::new(call),
			cast: CastKind::Reinterpret,
		},
	);

	let mut expressions = Vec::new();

	let access = Expr::new(span, ref_type, ExprKind::VariableAccess(context_variable));
	let assignment = create_assignment(ctx, span, access, alloc)?;

	expressions.push(Expr::new(
		span,
		ctx.builtin.void_,
		ExprKind::VariableDefinition {
			variable: context_variable,
			initializer: Some(Box::new(assignment)),
		},
	));

	let upvalues = ctx.functions[function].upvalues.clone();
	let coroutine = ctx.functions[function].coroutine;

	for upvalue in upvalues {
		let target_type = ctx.variables[upvalue.target].ty;
		let target_ref = ctx.get_reference_type(target_type);

		let context_access =
			Expr::new(span, ref_type, ExprKind::VariableAccess(context_variable));

		let target_member = Expr::new(
			span,
			target_ref,
			ExprKind::MemberAccess {
				value: Box::new(context_access),
				member: upvalue.target,
			},
		);

		let target = Expr::new(
			span,
			target_type,
			ExprKind::Dereference(Box::new(target_member)),
		);

		let value = create_variable_access(ctx, span, upvalue.variable, false)?;

		if coroutine {
			let copy_type = ctx.variables[upvalue.copy].ty;
			let copy_ref = ctx.get_reference_type(copy_type);

			let context_access =
				Expr::new(span, ref_type, ExprKind::VariableAccess(context_variable));

			let copy_member = Expr::new(
				span,
				copy_ref,
				ExprKind::MemberAccess {
					value: Box::new(context_access),
					member: upvalue.copy,
				},
			);

			let copy_target = Expr::new(
				span,
				copy_type,
				ExprKind::Dereference(Box::new(copy_member.clone())),
			);

			expressions.push(create_assignment(ctx, span, copy_target, value)?);
			expressions.push(create_assignment(ctx, span, target, copy_member)?);
		} else {
			let address = create_get_address(ctx, span, value)?;

			expressions.push(create_assignment(ctx, span, target, address)?);
		}
	}

	let initializer = Expr::new(span, ctx.builtin.void_, ExprKind::Block(expressions));

	Ok(Some(Expr::new(
		span,
		ctx.builtin.void_,
		ExprKind::VariableDefinition {
			variable: context_variable,
			initializer: Some(Box::new(initializer)),
		},
	)))
}

fn create_function_argument_variables(
	ctx: &mut ExpressionContext,
	arguments: &[ArgumentData],
) -> Vec<Expr> {
	let mut variables = Vec::new();

	for argument in arguments {
		debug_assert!(!ctx.types[argument.ty].is_generic);

		let size = ctx.types[argument.ty].size;
		let offset = ctx.allocate_in_scope(0, size);

		let name = argument.name.clone().unwrap_or_default();
		let name_hash = string_hash(&name);

		let unique_id = ctx.unique_variable_id;
		ctx.unique_variable_id += 1;

		let variable = ctx.add_variable(VariableData {
			source: argument.source,
			scope: ctx.scope,
			ty: argument.ty,
			name,
			name_hash,
			alignment: 0,
			offset,
			unique_id,
			is_reference: false,
			imported: false,
		});

		variables.push(Expr::new(
			argument.source,
			ctx.builtin.void_,
			ExprKind::VariableDefinition {
				variable,
				initializer: None,
			},
		));
	}

	variables
}

fn implement_prototype(ctx: &mut ExpressionContext, function: FunctionId) {
	if ctx.functions[function].is_prototype {
		return;
	}

	let functions = ctx.scopes[ctx.scope].functions.clone();

	for curr in functions {
		if curr == function {
			continue;
		}

		if ctx.functions[curr].is_prototype
			&& ctx.functions[curr].implementation.is_none()
			&& ctx.functions[curr].ty == ctx.functions[function].ty
			&& ctx.functions[curr].name == ctx.functions[function].name
		{
			ctx.functions[curr].implementation = Some(function);

			ctx.hide_function(curr);
			break;
		}
	}
}

fn check_uniqueness(ctx: &ExpressionContext, function: FunctionId) -> Option<FunctionId> {
	let hash = ctx.functions[function].name_hash;

	for other in ctx.function_map.find_all(hash) {
		if other == function {
			continue;
		}

		if ctx.functions[other].ty == ctx.functions[function].ty
			&& ctx.functions[other].name == ctx.functions[function].name
		{
			return Some(other);
		}
	}

	None
}

pub fn create_function_pointer(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	definition: Expr,
	hide_function: bool,
) -> AnalyzeResult<Expr> {
	let function = match &definition.kind {
		ExprKind::FunctionDefinition { function, .. } => *function,
		_ => unreachable!("only function definitions decay to pointers"),
	};

	if hide_function {
		ctx.hide_function(function);
	}

	let access_context = create_function_context_access(ctx, span, function)?;

	let function_type = ctx.functions[function].ty;

	let access = Expr::new(
		span,
		function_type,
		ExprKind::FunctionAccess {
			function,
			context: Box::new(access_context),
		},
	);

	Ok(Expr::new(
		span,
		function_type,
		ExprKind::Sequence(vec![definition, access]),
	))
}

fn function_definition_name(
	ctx: &mut ExpressionContext,
	parent_type: Option<TypeId>,
	name: &str,
	is_operator: bool,
	accessor: bool,
) -> String {
	if name.is_empty() {
		let name = format!("$func{}", ctx.unnamed_func_count);
		ctx.unnamed_func_count += 1;

		return name;
	}

	let base = if let Some(parent) = parent_type {
		names::member_function_name(&ctx.types[parent].name, name)
	} else if is_operator {
		name.to_string()
	} else {
		ctx.name_in_scope(name)
	};

	if accessor {
		names::accessor_name(&base)
	} else {
		base
	}
}

pub fn analyze_function_definition(
	ctx: &mut ExpressionContext,
	syntax: &Rc<SynFunctionDefinition>,
	instance: Option<TypeId>,
	instance_parent: Option<TypeId>,
	matches: Vec<MatchData>,
	create_access: bool,
	hide_function: bool,
) -> AnalyzeResult<Expr> {
	let parent_type = match &syntax.parent_type {
		Some(parent) => Some(analyze_type(ctx, parent)?),
		None => None,
	};

	let parent_type = instance_parent.or(parent_type);

	let return_type = analyze_type(ctx, &syntax.return_type)?;

	let value =
		create_function_definition(ctx, syntax, parent_type, return_type, instance, matches)?;

	if let ExprKind::FunctionDefinition { function, .. } = &value.kind {
		let function_scope = ctx.functions[*function].scope;

		if matches!(ctx.scopes[function_scope].owner, ScopeOwner::Type(_)) {
			return Ok(value);
		}

		if create_access {
			let span = value.span;

			return create_function_pointer(ctx, span, value, hide_function);
		}
	}

	Ok(value)
}

fn create_function_definition(
	ctx: &mut ExpressionContext,
	syntax: &Rc<SynFunctionDefinition>,
	parent_type: Option<TypeId>,
	return_type: TypeId,
	instance: Option<TypeId>,
	matches: Vec<MatchData>,
) -> AnalyzeResult<Expr> {
	let span = syntax.span;

	let added_parent_scope = restore_parent_type_scope(ctx, span, parent_type)?;

	// Explicit generic parameters, bound through `matches` when instancing
	let mut generics = Vec::new();

	for alias in &syntax.aliases {
		let target = matches
			.iter()
			.find(|matched| matched.name == *alias)
			.map(|matched| matched.ty);

		let target = match target {
			Some(target) => target,
			None => ctx.get_generic_type(alias),
		};

		generics.push(MatchData {
			name: alias.clone(),
			ty: target,
		});
	}

	let instance_args = instance.map(|instance| {
		ctx.types[instance]
			.function_parts()
			.map(|(_, args)| args.to_vec())
			.unwrap()
	});

	let mut arg_data: Vec<ArgumentData> = Vec::new();
	let mut had_generic_argument = false;

	for (pos, argument) in syntax.arguments.iter().enumerate() {
		let (ty, initializer) = if let Some(instance_args) = &instance_args {
			let initializer = match &argument.default {
				Some(default) => Some(analyze_expression(ctx, default)?),
				None => None,
			};

			(instance_args[pos], initializer)
		} else {
			// Earlier arguments are visible while typing this one
			ctx.push_temporary_scope();

			for (prev, data) in syntax.arguments.iter().zip(arg_data.iter()) {
				let unique_id = ctx.unique_variable_id;
				ctx.unique_variable_id += 1;

				let name_hash = string_hash(&prev.name);

				ctx.add_variable(VariableData {
					source: prev.span,
					scope: ctx.scope,
					ty: data.ty,
					name: prev.name.clone(),
					name_hash,
					alignment: 0,
					offset: 0,
					unique_id,
					is_reference: false,
					imported: false,
				});
			}

			let analyzed = analyze_type_with_failure(ctx, &argument.ty, had_generic_argument);

			let ty = match analyzed {
				Ok(Some(ty)) => ty,
				Ok(None) => ctx.get_generic_type("generic"),
				Err(error) => {
					ctx.pop_scope(Some(span))?;

					return Err(error);
				}
			};

			let initializer = match &argument.default {
				Some(default) => {
					let result = analyze_expression(ctx, default);

					match result {
						Ok(value) => Some(value),
						Err(error) => {
							ctx.pop_scope(Some(span))?;

							return Err(error);
						}
					}
				}
				None => None,
			};

			let mut ty = ty;
			let mut initializer = initializer;

			if ty == ctx.builtin.auto_ {
				let result = resolve_initializer_value(ctx, argument.span, initializer.take());

				match result {
					Ok(resolved) => {
						ty = resolved.ty;
						initializer = Some(resolved);
					}
					Err(error) => {
						ctx.pop_scope(Some(span))?;

						return Err(error);
					}
				}
			}

			ctx.pop_scope(Some(span))?;

			if ty == ctx.builtin.void_ {
				return Err(err(
					ctx,
					argument.span,
					CompileErrorKind::TypeMismatch,
					"function parameter cannot be a void type".to_string(),
				));
			}

			had_generic_argument |= ctx.types[ty].is_generic;

			(ty, initializer)
		};

		arg_data.push(ArgumentData {
			source: argument.span,
			is_explicit: argument.is_explicit,
			name: Some(argument.name.clone()),
			ty,
			value: initializer,
		});
	}

	let scope_parent_type = match ctx.scopes[ctx.scope].owner {
		ScopeOwner::Type(parent) => Some(parent),
		_ => None,
	};

	let function_name = function_definition_name(
		ctx,
		scope_parent_type,
		&syntax.name,
		syntax.is_operator,
		syntax.accessor,
	);

	let context_class_type = create_function_context_type(ctx, span, &function_name);

	let context_ref_type = match scope_parent_type {
		Some(parent) => ctx.get_reference_type(parent),
		None => ctx.get_reference_type(context_class_type),
	};

	let argument_types: Vec<TypeId> = arg_data.iter().map(|argument| argument.ty).collect();
	let function_type = ctx.get_function_type(return_type, argument_types);

	if let Some(instance) = instance {
		debug_assert_eq!(function_type, instance);
	}

	let name_hash = string_hash(&function_name);

	if let Some(previous) = ctx.variable_map.find(name_hash) {
		if ctx.variables[previous].scope == ctx.scope {
			return Err(err(
				ctx,
				span,
				CompileErrorKind::NameResolution,
				format!(
					"name '{}' is already taken for a variable in current scope",
					syntax.name
				),
			));
		}
	}

	let unique_id = ctx.unique_function_id;
	ctx.unique_function_id += 1;

	let function = ctx.add_function(FunctionData {
		source: span,
		scope: ctx.scope,
		function_scope: None,
		ty: function_type,
		context_type: context_ref_type,
		name: function_name,
		name_hash,
		generics,
		aliases: matches.clone(),
		arguments: arg_data.clone(),
		definition: FunctionSyntax::Full(syntax.clone()),
		coroutine: syntax.coroutine,
		accessor: syntax.accessor,
		is_operator: syntax.is_operator,
		is_prototype: false,
		has_explicit_return: false,
		imported: false,
		is_generic_instance: instance.is_some(),
		proto: None,
		implementation: None,
		instances: Vec::new(),
		context_argument: None,
		context_variable: None,
		upvalues: Vec::new(),
		stack_size: 0,
		unique_id,
	});

	// With a known signature the prototype can be implemented right away
	if return_type != ctx.builtin.auto_ {
		implement_prototype(ctx, function);
	}

	if ctx.is_generic_function(function) {
		debug_assert!(instance.is_none());

		if syntax.prototype {
			return Err(err(
				ctx,
				span,
				CompileErrorKind::GenericInstantiation,
				"generic function cannot be forward-declared".to_string(),
			));
		}

		if added_parent_scope {
			ctx.pop_scope(Some(span))?;
		}

		let void_ref = ctx.get_reference_type(ctx.builtin.void_);

		ctx.functions[function].context_type = void_ref;

		return Ok(Expr::new(
			span,
			function_type,
			ExprKind::GenericFunctionPrototype(function),
		));
	}

	let function_scope = ctx.push_scope(ScopeOwner::Function(function));

	ctx.functions[function].function_scope = Some(function_scope);

	for matched in &matches {
		let unique_id = ctx.unique_alias_id;
		ctx.unique_alias_id += 1;

		let name_hash = string_hash(&matched.name);

		ctx.add_alias(AliasData {
			source: span,
			scope: ctx.scope,
			ty: matched.ty,
			name: matched.name.clone(),
			name_hash,
			unique_id,
			imported: false,
		});
	}

	let context_argument_definition = create_function_context_argument(ctx, span, function);

	let argument_variables = create_function_argument_variables(ctx, &arg_data);

	let mut code = Vec::new();

	if syntax.prototype {
		let (current_return, _) = ctx.types[ctx.functions[function].ty]
			.function_parts()
			.unwrap();

		if current_return == ctx.builtin.auto_ {
			ctx.pop_scope(None)?;

			return Err(err(
				ctx,
				span,
				CompileErrorKind::FlowError,
				"function prototype with unresolved return type".to_string(),
			));
		}

		ctx.functions[function].is_prototype = true;
	} else {
		for expression in &syntax.expressions {
			let statement = analyze_statement(ctx, expression);

			match statement {
				Ok(statement) => code.push(statement),
				Err(error) => {
					ctx.pop_scope(None)?;

					if added_parent_scope {
						ctx.pop_scope(Some(span))?;
					}

					return Err(error);
				}
			}
		}

		// A still-auto return type means the function never returned
		let (current_return, current_args) = {
			let (ret, args) = ctx.types[ctx.functions[function].ty].function_parts().unwrap();
			(ret, args.to_vec())
		};

		if current_return == ctx.builtin.auto_ {
			let void_ = ctx.builtin.void_;

			ctx.functions[function].ty = ctx.get_function_type(void_, current_args);
		}

		let (final_return, _) = ctx.types[ctx.functions[function].ty].function_parts().unwrap();

		if final_return != ctx.builtin.void_ && !ctx.functions[function].has_explicit_return {
			ctx.pop_scope(None)?;

			return Err(err(
				ctx,
				span,
				CompileErrorKind::FlowError,
				format!(
					"function must return a value of type '{}'",
					ctx.type_name(final_return)
				),
			));
		}
	}

	ctx.pop_scope(None)?;

	if added_parent_scope {
		ctx.pop_scope(Some(span))?;
	}

	let context_variable_definition = create_function_context_variable(ctx, span, function)?;

	// The signature may have been deduced; implement the prototype now
	implement_prototype(ctx, function);

	if let Some(conflict) = check_uniqueness(ctx, function) {
		if instance.is_some() {
			ctx.hide_function(function);

			let conflict_type = ctx.functions[conflict].ty;

			return Ok(Expr::new(
				span,
				conflict_type,
				ExprKind::FunctionDefinition {
					function: conflict,
					prototype: true,
					context_argument: None,
					arguments: Vec::new(),
					expressions: Vec::new(),
					context_variable: None,
				},
			));
		}

		return Err(err(
			ctx,
			span,
			CompileErrorKind::NameResolution,
			format!(
				"function '{}' is being defined with the same set of parameters",
				ctx.functions[function].name
			),
		));
	}

	ctx.definitions.push(function);

	let final_type = ctx.functions[function].ty;

	Ok(Expr::new(
		span,
		final_type,
		ExprKind::FunctionDefinition {
			function,
			prototype: syntax.prototype,
			context_argument: Some(Box::new(context_argument_definition)),
			arguments: argument_variables,
			expressions: code,
			context_variable: context_variable_definition.map(Box::new),
		},
	))
}

fn deduce_short_function_return_value(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	function: FunctionId,
	expressions: &mut Vec<Expr>,
) -> AnalyzeResult<()> {
	if ctx.functions[function].has_explicit_return {
		return Ok(());
	}

	let (expected, current_args) = {
		let (ret, args) = ctx.types[ctx.functions[function].ty].function_parts().unwrap();
		(ret, args.to_vec())
	};

	if expected == ctx.builtin.void_ {
		return Ok(());
	}

	let actual = match expressions.last() {
		Some(last) => last.ty,
		None => return Ok(()),
	};

	if actual == ctx.builtin.void_ {
		return Ok(());
	}

	// The last expression becomes the return value
	if expected == ctx.builtin.auto_ {
		ctx.functions[function].ty = ctx.get_function_type(actual, current_args);
	}

	let last = expressions.pop().unwrap();

	let result = if expected == ctx.builtin.auto_ {
		last
	} else {
		create_cast(ctx, span, last, expected, false)?
	};

	expressions.push(Expr::new(
		span,
		ctx.builtin.void_,
		ExprKind::Return(Box::new(result)),
	));

	ctx.functions[function].has_explicit_return = true;

	Ok(())
}

pub fn analyze_short_function_definition(
	ctx: &mut ExpressionContext,
	syntax: &Rc<SynShortFunctionDefinition>,
	argument_type: TypeId,
) -> AnalyzeResult<Option<Expr>> {
	let span = syntax.span;

	let (target_return, target_args) = match ctx.types[argument_type].function_parts() {
		Some((ret, args)) => (ret, args.to_vec()),
		None => return Ok(None),
	};

	if syntax.parameters.len() != target_args.len() {
		return Ok(None);
	}

	let return_type = if ctx.types[target_return].is_generic {
		ctx.builtin.auto_
	} else {
		target_return
	};

	// Parameters with declared types that differ from the target get hidden
	// '$'-suffixed slots and an entry cast into the visible variable
	let mut arg_casts: Vec<MatchData> = Vec::new();
	let mut arg_data: Vec<ArgumentData> = Vec::new();

	for (param, expected) in syntax.parameters.iter().zip(target_args.iter()) {
		let declared = match &param.ty {
			Some(ty) => Some(analyze_type(ctx, ty)?),
			None => None,
		};

		if let Some(declared) = declared {
			let hidden_name = format!("{}$", param.name);

			if ctx.types[*expected].is_generic {
				let mut aliases = Vec::new();

				match match_generic_type(ctx, span, *expected, declared, &mut aliases, false)? {
					Some(matched) => arg_data.push(ArgumentData {
						source: param.span,
						is_explicit: false,
						name: Some(hidden_name),
						ty: matched,
						value: None,
					}),
					None => return Ok(None),
				}
			} else {
				arg_data.push(ArgumentData {
					source: param.span,
					is_explicit: false,
					name: Some(hidden_name),
					ty: *expected,
					value: None,
				});
			}

			arg_casts.push(MatchData {
				name: param.name.clone(),
				ty: declared,
			});
		} else {
			arg_data.push(ArgumentData {
				source: param.span,
				is_explicit: false,
				name: Some(param.name.clone()),
				ty: *expected,
				value: None,
			});
		}
	}

	let function_name = function_definition_name(ctx, None, "", false, false);

	let context_class_type = create_function_context_type(ctx, span, &function_name);
	let context_ref_type = ctx.get_reference_type(context_class_type);

	let argument_types: Vec<TypeId> = arg_data.iter().map(|argument| argument.ty).collect();
	let function_type = ctx.get_function_type(return_type, argument_types);

	let name_hash = string_hash(&function_name);

	let unique_id = ctx.unique_function_id;
	ctx.unique_function_id += 1;

	let function = ctx.add_function(FunctionData {
		source: span,
		scope: ctx.scope,
		function_scope: None,
		ty: function_type,
		context_type: context_ref_type,
		name: function_name,
		name_hash,
		generics: Vec::new(),
		aliases: Vec::new(),
		arguments: arg_data.clone(),
		definition: FunctionSyntax::Short(syntax.clone()),
		coroutine: false,
		accessor: false,
		is_operator: false,
		is_prototype: false,
		has_explicit_return: false,
		imported: false,
		is_generic_instance: false,
		proto: None,
		implementation: None,
		instances: Vec::new(),
		context_argument: None,
		context_variable: None,
		upvalues: Vec::new(),
		stack_size: 0,
		unique_id,
	});

	if ctx.is_generic_function(function) {
		let void_ref = ctx.get_reference_type(ctx.builtin.void_);

		ctx.functions[function].context_type = void_ref;

		return Ok(Some(Expr::new(
			span,
			function_type,
			ExprKind::GenericFunctionPrototype(function),
		)));
	}

	let function_scope = ctx.push_scope(ScopeOwner::Function(function));

	ctx.functions[function].function_scope = Some(function_scope);

	let context_argument_definition = create_function_context_argument(ctx, span, function);

	let argument_variables = create_function_argument_variables(ctx, &arg_data);

	let mut expressions = Vec::new();

	for cast in &arg_casts {
		let alignment = ctx.types[cast.ty].alignment;
		let size = ctx.types[cast.ty].size;
		let offset = ctx.allocate_in_scope(alignment, size);

		let unique_id = ctx.unique_variable_id;
		ctx.unique_variable_id += 1;

		let name_hash = string_hash(&cast.name);

		let variable = ctx.add_variable(VariableData {
			source: span,
			scope: ctx.scope,
			ty: cast.ty,
			name: cast.name.clone(),
			name_hash,
			alignment,
			offset,
			unique_id,
			is_reference: false,
			imported: false,
		});

		let hidden_name = format!("{}$", cast.name);

		let access = create_variable_access_named(ctx, span, &[], &hidden_name)?
			.expect("the hidden parameter was just created");

		let cast_ref = ctx.get_reference_type(cast.ty);

		let access = if access.ty == cast_ref {
			let target = cast.ty;

			Expr::new(span, target, ExprKind::Dereference(Box::new(access)))
		} else {
			create_cast(ctx, span, access, cast.ty, true)?
		};

		let variable_access = Expr::new(span, cast.ty, ExprKind::VariableAccess(variable));
		let assignment = create_assignment(ctx, span, variable_access, access)?;

		expressions.push(Expr::new(
			span,
			ctx.builtin.void_,
			ExprKind::VariableDefinition {
				variable,
				initializer: Some(Box::new(assignment)),
			},
		));
	}

	for expression in &syntax.expressions {
		let statement = analyze_statement(ctx, expression);

		match statement {
			Ok(statement) => expressions.push(statement),
			Err(error) => {
				ctx.pop_scope(None)?;

				return Err(error);
			}
		}
	}

	deduce_short_function_return_value(ctx, span, function, &mut expressions)?;

	let (current_return, current_args) = {
		let (ret, args) = ctx.types[ctx.functions[function].ty].function_parts().unwrap();
		(ret, args.to_vec())
	};

	if current_return == ctx.builtin.auto_ {
		let void_ = ctx.builtin.void_;

		ctx.functions[function].ty = ctx.get_function_type(void_, current_args);
	}

	let (final_return, _) = ctx.types[ctx.functions[function].ty].function_parts().unwrap();

	if final_return != ctx.builtin.void_ && !ctx.functions[function].has_explicit_return {
		ctx.pop_scope(None)?;

		return Err(err(
			ctx,
			span,
			CompileErrorKind::FlowError,
			format!(
				"function must return a value of type '{}'",
				ctx.type_name(final_return)
			),
		));
	}

	ctx.pop_scope(None)?;

	let context_variable_definition = create_function_context_variable(ctx, span, function)?;

	ctx.definitions.push(function);

	let final_type = ctx.functions[function].ty;

	Ok(Some(Expr::new(
		span,
		final_type,
		ExprKind::FunctionDefinition {
			function,
			prototype: false,
			context_argument: Some(Box::new(context_argument_definition)),
			arguments: argument_variables,
			expressions,
			context_variable: context_variable_definition.map(Box::new),
		},
	)))
}

/// Type a short function literal used as call argument number
/// `current_arguments.len() + 1` of a candidate with type `ty`.
pub fn analyze_short_function_definition_for_argument(
	ctx: &mut ExpressionContext,
	syntax: &Rc<SynShortFunctionDefinition>,
	ty: TypeId,
	current_arguments: &[ArgumentData],
) -> AnalyzeResult<Option<Expr>> {
	let (_, function_args) = match ctx.types[ty].function_parts() {
		Some((ret, args)) => (ret, args.to_vec()),
		None => return Ok(None),
	};

	if current_arguments.len() + 1 > function_args.len() {
		return Ok(None);
	}

	let target = if ctx.types[ty].is_generic {
		let mut aliases = Vec::new();

		for (formal, actual) in function_args.iter().zip(current_arguments.iter()) {
			if match_generic_type(ctx, syntax.span, *formal, actual.ty, &mut aliases, false)?
				.is_none()
			{
				return Ok(None);
			}
		}

		resolve_generic_type_aliases(
			ctx,
			syntax.span,
			function_args[current_arguments.len()],
			&aliases,
		)?
	} else {
		function_args[current_arguments.len()]
	};

	if !ctx.types[target].is_function() {
		return Ok(None);
	}

	analyze_short_function_definition(ctx, syntax, target)
}

fn analyze_generator(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	expressions: &[Box<Syn>],
) -> AnalyzeResult<Expr> {
	let function_name = function_definition_name(ctx, None, "", false, false);

	let context_class_type = create_function_context_type(ctx, span, &function_name);
	let context_ref_type = ctx.get_reference_type(context_class_type);

	let auto_ = ctx.builtin.auto_;
	let function_type = ctx.get_function_type(auto_, Vec::new());

	let name_hash = string_hash(&function_name);

	let unique_id = ctx.unique_function_id;
	ctx.unique_function_id += 1;

	let function = ctx.add_function(FunctionData {
		source: span,
		scope: ctx.scope,
		function_scope: None,
		ty: function_type,
		context_type: context_ref_type,
		name: function_name,
		name_hash,
		generics: Vec::new(),
		aliases: Vec::new(),
		arguments: Vec::new(),
		definition: FunctionSyntax::None,
		coroutine: true,
		accessor: false,
		is_operator: false,
		is_prototype: false,
		has_explicit_return: false,
		imported: false,
		is_generic_instance: false,
		proto: None,
		implementation: None,
		instances: Vec::new(),
		context_argument: None,
		context_variable: None,
		upvalues: Vec::new(),
		stack_size: 0,
		unique_id,
	});

	let function_scope = ctx.push_scope(ScopeOwner::Function(function));

	ctx.functions[function].function_scope = Some(function_scope);

	let context_argument_definition = create_function_context_argument(ctx, span, function);

	let mut code = Vec::new();

	for expression in expressions {
		let statement = analyze_statement(ctx, expression);

		match statement {
			Ok(statement) => code.push(statement),
			Err(error) => {
				ctx.pop_scope(None)?;

				return Err(error);
			}
		}
	}

	if !ctx.functions[function].has_explicit_return {
		ctx.pop_scope(None)?;

		return Err(err(
			ctx,
			span,
			CompileErrorKind::FlowError,
			"not a single element is generated, and an array element type is unknown".to_string(),
		));
	}

	let (return_type, _) = ctx.types[ctx.functions[function].ty].function_parts().unwrap();

	if return_type == ctx.builtin.void_ {
		ctx.pop_scope(None)?;

		return Err(err(
			ctx,
			span,
			CompileErrorKind::FlowError,
			"cannot generate an array of 'void' element type".to_string(),
		));
	}

	// The coroutine terminates by returning one extra uninitialized element
	let empty = allocate_temporary(ctx, span, return_type);

	let access = Expr::new(span, return_type, ExprKind::VariableAccess(empty));

	code.push(Expr::new(
		span,
		ctx.builtin.void_,
		ExprKind::Return(Box::new(access)),
	));

	ctx.pop_scope(None)?;

	let context_variable_definition = create_function_context_variable(ctx, span, function)?;

	ctx.definitions.push(function);

	let final_type = ctx.functions[function].ty;

	let definition = Expr::new(
		span,
		final_type,
		ExprKind::FunctionDefinition {
			function,
			prototype: false,
			context_argument: Some(Box::new(context_argument_definition)),
			arguments: Vec::new(),
			expressions: code,
			context_variable: context_variable_definition.map(Box::new),
		},
	);

	let context = create_function_context_access(ctx, span, function)?;

	let access = Expr::new(
		span,
		final_type,
		ExprKind::FunctionAccess {
			function,
			context: Box::new(context),
		},
	);

	let list = create_function_call_1(ctx, span, "__gen_list", access, false)?
		.expect("__gen_list is supplied by the base module");

	Ok(create_sequence(span, vec![definition, list]))
}
