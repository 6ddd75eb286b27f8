use crate::frontend::{
	create_function_call_1, create_function_call_2, create_function_call_with_syntax_args,
	get_function_for_type, get_node_functions, names, string_hash, string_hash_continue,
	AnalyzeResult, ArgumentData, CastKind, CompileErrorKind, ConstValue, ConstantData, Expr,
	ExprKind, ExpressionContext, FunctionId, ScopeOwner, SourceSpan, SynBinaryOpType,
	SynUnaryOpType, TypeEntry, TypeId, TypeKind, UpvalueData, VariableData, VariableId,
};

pub fn create_sequence(span: SourceSpan, expressions: Vec<Expr>) -> Expr {
	let ty = expressions.last().map(|last| last.ty).unwrap_or_default();

	Expr::new(span, ty, ExprKind::Sequence(expressions))
}

pub fn allocate_temporary(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	ty: TypeId,
) -> VariableId {
	let name = format!("$temp{}", ctx.unnamed_variable_count);
	ctx.unnamed_variable_count += 1;

	let alignment = ctx.types[ty].alignment;
	let size = ctx.types[ty].size;
	let offset = ctx.allocate_in_scope(alignment, size);

	let unique_id = ctx.unique_variable_id;
	ctx.unique_variable_id += 1;

	let name_hash = string_hash(&name);

	ctx.add_variable(VariableData {
		source: span,
		scope: ctx.scope,
		ty,
		name,
		name_hash,
		alignment,
		offset,
		unique_id,
		is_reference: false,
		imported: false,
	})
}

pub fn create_get_address(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	value: Expr,
) -> AnalyzeResult<Expr> {
	if let ExprKind::VariableAccess(variable) = value.kind {
		let ref_type = ctx.get_reference_type(value.ty);

		return Ok(Expr::new(span, ref_type, ExprKind::GetAddress(variable)));
	}

	if let ExprKind::Dereference(inner) = value.kind {
		return Ok(*inner);
	}

	Err(ctx.error(
		span,
		CompileErrorKind::TypeMismatch,
		"cannot get address of the expression".to_string(),
	))
}

/// Copy an r-value into a fresh temporary and yield the temporary's address.
pub fn materialize_to_temporary(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	value: Expr,
) -> AnalyzeResult<Expr> {
	let value_type = value.ty;
	let storage = allocate_temporary(ctx, span, value_type);

	let access = Expr::new(span, value_type, ExprKind::VariableAccess(storage));
	let assignment = create_assignment(ctx, span, access, value)?;

	let definition = Expr::new(
		span,
		ctx.builtin.void_,
		ExprKind::VariableDefinition {
			variable: storage,
			initializer: Some(Box::new(assignment)),
		},
	);

	let ref_type = ctx.get_reference_type(value_type);
	let address = Expr::new(span, ref_type, ExprKind::GetAddress(storage));

	Ok(create_sequence(span, vec![definition, address]))
}

fn add_function_upvalue(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	function: FunctionId,
	variable: VariableId,
) -> VariableId {
	for upvalue in &ctx.functions[function].upvalues {
		if upvalue.variable == variable {
			return upvalue.target;
		}
	}

	let context_type = ctx.functions[function].context_type;
	let class_type = ctx.types[context_type]
		.ref_target()
		.expect("a closure context is a reference to the context class");

	let type_scope = ctx.types[class_type]
		.class()
		.and_then(|class| class.type_scope)
		.expect("the context class owns a scope");

	let variable_type = ctx.variables[variable].ty;
	let variable_name = ctx.variables[variable].name.clone();

	let current_scope = ctx.scope;
	ctx.scope = type_scope;

	let target_type = ctx.get_reference_type(variable_type);
	let target = allocate_class_member(
		ctx,
		span,
		target_type,
		names::function_context_member_name(&variable_name, "target"),
	);

	ctx.types[class_type].members.push(target);

	let copy = allocate_class_member(
		ctx,
		span,
		variable_type,
		names::function_context_member_name(&variable_name, "copy"),
	);

	ctx.types[class_type].members.push(copy);

	ctx.scope = current_scope;

	ctx.functions[function].upvalues.push(UpvalueData {
		variable,
		target,
		copy,
	});

	target
}

pub fn allocate_class_member(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	ty: TypeId,
	name: String,
) -> VariableId {
	let alignment = ctx.types[ty].alignment;
	let size = ctx.types[ty].size;
	let offset = ctx.allocate_in_scope(alignment, size);

	let unique_id = ctx.unique_variable_id;
	ctx.unique_variable_id += 1;

	let name_hash = string_hash(&name);

	ctx.add_variable(VariableData {
		source: span,
		scope: ctx.scope,
		ty,
		name,
		name_hash,
		alignment,
		offset,
		unique_id,
		is_reference: false,
		imported: false,
	})
}

/// Access a resolved variable, synthesizing an upvalue when it lives in an
/// enclosing function's frame and auto-dereferencing reference variables.
pub fn create_variable_access(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	variable: VariableId,
	handle_reference: bool,
) -> AnalyzeResult<Expr> {
	if ctx.variables[variable].ty == ctx.builtin.auto_ {
		return Err(ctx.error(
			span,
			CompileErrorKind::NameResolution,
			format!(
				"variable '{}' is being used while its type is unknown",
				ctx.variables[variable].name
			),
		));
	}

	let variable_scope = ctx.variables[variable].scope;
	let variable_type = ctx.variables[variable].ty;

	// Class member access goes through 'this'
	if matches!(ctx.scopes[variable_scope].owner, ScopeOwner::Type(_)) {
		let this_access = create_variable_access_named(ctx, span, &[], "this")?;

		let this_access = match this_access {
			Some(access) => access,
			None => {
				return Err(ctx.error(
					span,
					CompileErrorKind::NameResolution,
					"'this' variable is not available".to_string(),
				))
			}
		};

		let ref_type = ctx.get_reference_type(variable_type);

		let shift = Expr::new(
			span,
			ref_type,
			ExprKind::MemberAccess {
				value: Box::new(this_access),
				member: variable,
			},
		);

		return Ok(Expr::new(
			span,
			variable_type,
			ExprKind::Dereference(Box::new(shift)),
		));
	}

	let current_function = ctx.get_current_function();
	let owner_function = ctx.get_function_owner(variable_scope);

	let mut access = match (current_function, owner_function) {
		(Some(current), Some(owner)) if current != owner => {
			// The variable lives in an enclosing frame; capture it
			let context_argument = ctx.functions[current]
				.context_argument
				.expect("a function body has a context argument");

			let context_type = ctx.variables[context_argument].ty;

			let context = Expr::new(
				span,
				context_type,
				ExprKind::VariableAccess(context_argument),
			);

			let closure_member = add_function_upvalue(ctx, span, current, variable);
			let member_type = ctx.variables[closure_member].ty;

			let member_ref = ctx.get_reference_type(member_type);

			let member = Expr::new(
				span,
				member_ref,
				ExprKind::MemberAccess {
					value: Box::new(context),
					member: closure_member,
				},
			);

			let member = Expr::new(span, member_type, ExprKind::Dereference(Box::new(member)));

			Expr::new(span, variable_type, ExprKind::Dereference(Box::new(member)))
		}
		_ => Expr::new(span, variable_type, ExprKind::VariableAccess(variable)),
	};

	if ctx.variables[variable].is_reference && handle_reference {
		let target = ctx.types[access.ty]
			.ref_target()
			.expect("a reference variable has a reference type");

		access = Expr::new(span, target, ExprKind::Dereference(Box::new(access)));
	}

	Ok(access)
}

pub fn create_function_context_access(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	function: FunctionId,
) -> AnalyzeResult<Expr> {
	if ctx.get_current_function() == Some(function) {
		let argument = ctx.functions[function]
			.context_argument
			.expect("a function body has a context argument");

		return create_variable_access(ctx, span, argument, true);
	}

	if let Some(variable) = ctx.functions[function].context_variable {
		return create_variable_access(ctx, span, variable, true);
	}

	let context_type = ctx.functions[function].context_type;

	Ok(Expr::new(span, context_type, ExprKind::NullptrLiteral))
}

/// A single function becomes a direct access; multiple overloads under the
/// same name become a function-set expression narrowed at the use site.
pub fn create_function_access(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	functions: &[FunctionId],
	context: Option<Expr>,
) -> AnalyzeResult<Expr> {
	debug_assert!(!functions.is_empty());

	if functions.len() > 1 {
		let types: Vec<TypeId> = functions.iter().map(|f| ctx.functions[*f].ty).collect();

		let type_names: Vec<&str> = types.iter().map(|t| ctx.types[*t].name.as_str()).collect();
		let set_name = names::function_set_type_name(&type_names);

		let set_type = ctx.types.len();

		ctx.types.push(TypeEntry {
			name_hash: string_hash(&set_name),
			name: set_name,
			size: 0,
			alignment: 0,
			padding: 0,
			is_generic: true,
			imported: false,
			source: span,
			members: Vec::new(),
			constants: Vec::new(),
			kind: TypeKind::FunctionSet { types },
		});

		return Ok(Expr::new(
			span,
			set_type,
			ExprKind::FunctionOverloadSet {
				functions: functions.to_vec(),
				context: context.map(Box::new),
			},
		));
	}

	let function = functions[0];

	let context = match context {
		Some(context) => context,
		None => create_function_context_access(ctx, span, function)?,
	};

	let function_type = ctx.functions[function].ty;

	Ok(Expr::new(
		span,
		function_type,
		ExprKind::FunctionAccess {
			function,
			context: Box::new(context),
		},
	))
}

/// On an auto-ref receiver, the member name resolves to every member
/// function of that name across all classes; the call site narrows it.
fn create_auto_ref_function_set(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	value: Expr,
	name: &str,
) -> AnalyzeResult<Expr> {
	let mut types = Vec::new();
	let mut functions = Vec::new();

	for function in 0..ctx.functions.len() {
		let function_scope = ctx.functions[function].scope;

		let parent_type = match ctx.scopes[function_scope].owner {
			ScopeOwner::Type(parent) => parent,
			_ => continue,
		};

		let hash = string_hash_continue(ctx.types[parent_type].name_hash, "::");
		let hash = string_hash_continue(hash, name);

		if ctx.functions[function].name_hash != hash {
			continue;
		}

		let function_type = ctx.functions[function].ty;

		if types.contains(&function_type) {
			continue;
		}

		types.push(function_type);
		functions.push(function);
	}

	if functions.is_empty() {
		return Err(ctx.error(
			span,
			CompileErrorKind::NameResolution,
			format!("function '{}' is undefined in any of existing classes", name),
		));
	}

	let type_names: Vec<&str> = types.iter().map(|t| ctx.types[*t].name.as_str()).collect();
	let set_name = names::function_set_type_name(&type_names);

	let set_type = ctx.types.len();

	ctx.types.push(TypeEntry {
		name_hash: string_hash(&set_name),
		name: set_name,
		size: 0,
		alignment: 0,
		padding: 0,
		is_generic: true,
		imported: false,
		source: span,
		members: Vec::new(),
		constants: Vec::new(),
		kind: TypeKind::FunctionSet { types },
	});

	Ok(Expr::new(
		span,
		set_type,
		ExprKind::FunctionOverloadSet {
			functions,
			context: Some(Box::new(value)),
		},
	))
}

pub fn create_literal_copy(
	ctx: &ExpressionContext,
	span: SourceSpan,
	constant: &ConstantData,
) -> Expr {
	match constant.value {
		ConstValue::Bool(value) => Expr::new(span, constant.ty, ExprKind::BoolLiteral(value)),
		ConstValue::Char(value) => Expr::new(span, constant.ty, ExprKind::CharLiteral(value)),
		ConstValue::Int(value) => {
			Expr::new(span, constant.ty, ExprKind::IntegerLiteral(value as i64))
		}
		ConstValue::Long(value) => Expr::new(span, constant.ty, ExprKind::IntegerLiteral(value)),
		ConstValue::Double(value) => {
			Expr::new(span, constant.ty, ExprKind::RationalLiteral(value))
		}
		ConstValue::Type(value) => Expr::new(span, ctx.builtin.typeid_, ExprKind::TypeLiteral(value)),
		ConstValue::FunctionIndex(value) => Expr::new(
			span,
			ctx.builtin.function_id,
			ExprKind::FunctionIndexLiteral(value),
		),
		ConstValue::Null => Expr::new(span, ctx.builtin.nullptr_, ExprKind::NullptrLiteral),
	}
}

/// Resolve an identifier at each namespace-or-global scope walking outward:
/// variable, then class constant, then implicit 'this' member, then function
/// overload set.
pub fn create_variable_access_named(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	path: &[String],
	name: &str,
) -> AnalyzeResult<Option<Expr>> {
	let scopes = ctx.named_or_global_scopes();

	for scope in &scopes {
		let hash = ctx.scope_qualified_hash(*scope, path, name);

		if let Some(variable) = ctx.variable_map.find(hash) {
			return create_variable_access(ctx, span, variable, true).map(Some);
		}
	}

	if path.is_empty() {
		// Class constant of the enclosing class
		if let Some(current_type) = ctx.get_current_type() {
			if let Some(constant) = ctx.find_class_constant(current_type, name) {
				let constant = constant.clone();

				return Ok(Some(create_literal_copy(ctx, span, &constant)));
			}
		}

		// Implicit 'this' member access inside methods
		if ctx.get_current_type().is_some() {
			if let Some(this_variable) = ctx.variable_map.find(string_hash("this")) {
				let this_access = create_variable_access(ctx, span, this_variable, true)?;

				if let Some(member) = create_member_access(ctx, span, this_access, name, true)? {
					return Ok(Some(member));
				}
			}
		}
	}

	for scope in &scopes {
		let hash = ctx.scope_qualified_hash(*scope, path, name);

		let functions = ctx.function_map.find_all(hash);

		if !functions.is_empty() {
			return create_function_access(ctx, span, &functions, None).map(Some);
		}
	}

	Ok(None)
}

/// Compile-time member queries on a type value.
pub fn create_typeid_member_access(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	ty: TypeId,
	member: &str,
) -> AnalyzeResult<Option<Expr>> {
	let bool_ = ctx.builtin.bool_;
	let int_ = ctx.builtin.int_;
	let typeid_ = ctx.builtin.typeid_;

	match member {
		"isReference" => {
			return Ok(Some(Expr::new(
				span,
				bool_,
				ExprKind::BoolLiteral(ctx.types[ty].is_ref()),
			)))
		}
		"isArray" => {
			let value = ctx.types[ty].is_array() || ctx.types[ty].is_unsized_array();

			return Ok(Some(Expr::new(span, bool_, ExprKind::BoolLiteral(value))));
		}
		"isFunction" => {
			return Ok(Some(Expr::new(
				span,
				bool_,
				ExprKind::BoolLiteral(ctx.types[ty].is_function()),
			)))
		}
		"arraySize" => {
			if let Some((_, length)) = ctx.types[ty].array_elem() {
				return Ok(Some(Expr::new(span, int_, ExprKind::IntegerLiteral(length))));
			}

			if ctx.types[ty].is_unsized_array() {
				return Ok(Some(Expr::new(span, int_, ExprKind::IntegerLiteral(-1))));
			}

			return Err(ctx.error(
				span,
				CompileErrorKind::TypeMismatch,
				format!(
					"'arraySize' can only be applied to an array type, but we have '{}'",
					ctx.type_name(ty)
				),
			));
		}
		"size" => {
			if let TypeKind::ArgumentSet { types } = &ctx.types[ty].kind {
				let count = types.len() as i64;

				return Ok(Some(Expr::new(span, int_, ExprKind::IntegerLiteral(count))));
			}

			return Err(ctx.error(
				span,
				CompileErrorKind::TypeMismatch,
				format!(
					"'size' can only be applied to a function type, but we have '{}'",
					ctx.type_name(ty)
				),
			));
		}
		"argument" => {
			if let Some((_, arguments)) = ctx.types[ty].function_parts() {
				let arguments = arguments.to_vec();

				let type_names: Vec<&str> = arguments
					.iter()
					.map(|arg| ctx.types[*arg].name.as_str())
					.collect();

				let set_name = names::argument_set_type_name(&type_names);

				let set_type = ctx.types.len();

				ctx.types.push(TypeEntry {
					name_hash: string_hash(&set_name),
					name: set_name,
					size: 0,
					alignment: 0,
					padding: 0,
					is_generic: false,
					imported: false,
					source: span,
					members: Vec::new(),
					constants: Vec::new(),
					kind: TypeKind::ArgumentSet { types: arguments },
				});

				return Ok(Some(Expr::new(span, typeid_, ExprKind::TypeLiteral(set_type))));
			}

			return Err(ctx.error(
				span,
				CompileErrorKind::TypeMismatch,
				format!(
					"'argument' can only be applied to a function type, but we have '{}'",
					ctx.type_name(ty)
				),
			));
		}
		"return" => {
			if let Some((return_type, _)) = ctx.types[ty].function_parts() {
				return Ok(Some(Expr::new(
					span,
					typeid_,
					ExprKind::TypeLiteral(return_type),
				)));
			}

			return Err(ctx.error(
				span,
				CompileErrorKind::TypeMismatch,
				format!(
					"'return' can only be applied to a function type, but we have '{}'",
					ctx.type_name(ty)
				),
			));
		}
		"target" => {
			if let Some(target) = ctx.types[ty].ref_target() {
				return Ok(Some(Expr::new(span, typeid_, ExprKind::TypeLiteral(target))));
			}

			if let Some((elem, _)) = ctx.types[ty].array_elem() {
				return Ok(Some(Expr::new(span, typeid_, ExprKind::TypeLiteral(elem))));
			}

			if let Some(elem) = ctx.types[ty].unsized_elem() {
				return Ok(Some(Expr::new(span, typeid_, ExprKind::TypeLiteral(elem))));
			}

			return Err(ctx.error(
				span,
				CompileErrorKind::TypeMismatch,
				format!(
					"'target' can only be applied to a pointer or array type, but we have '{}'",
					ctx.type_name(ty)
				),
			));
		}
		"first" | "last" => {
			if let TypeKind::ArgumentSet { types } = &ctx.types[ty].kind {
				if types.is_empty() {
					return Err(ctx.error(
						span,
						CompileErrorKind::TypeMismatch,
						format!(
							"this function type '{}' doesn't have arguments",
							ctx.type_name(ty)
						),
					));
				}

				let chosen = if member == "first" {
					types[0]
				} else {
					*types.last().unwrap()
				};

				return Ok(Some(Expr::new(span, typeid_, ExprKind::TypeLiteral(chosen))));
			}

			return Err(ctx.error(
				span,
				CompileErrorKind::TypeMismatch,
				format!(
					"'{}' can only be applied to a function type, but we have '{}'",
					member,
					ctx.type_name(ty)
				),
			));
		}
		_ => {}
	}

	if let Some(class) = ctx.types[ty].class() {
		for alias in class.aliases.iter().chain(class.generics.iter()) {
			if alias.name == member {
				let target = alias.ty;

				return Ok(Some(Expr::new(span, typeid_, ExprKind::TypeLiteral(target))));
			}
		}
	}

	if let Some(found) = ctx.find_member(ty, member) {
		let member_type = ctx.variables[found].ty;

		return Ok(Some(Expr::new(
			span,
			typeid_,
			ExprKind::TypeLiteral(member_type),
		)));
	}

	if let Some(constant) = ctx.find_class_constant(ty, member) {
		let constant = constant.clone();

		return Ok(Some(create_literal_copy(ctx, span, &constant)));
	}

	if member == "hasMember" {
		let set_name = names::member_set_type_name(&ctx.types[ty].name);

		let set_type = ctx.types.len();

		ctx.types.push(TypeEntry {
			name_hash: string_hash(&set_name),
			name: set_name,
			size: 0,
			alignment: 0,
			padding: 0,
			is_generic: false,
			imported: false,
			source: span,
			members: Vec::new(),
			constants: Vec::new(),
			kind: TypeKind::MemberSet { class: ty },
		});

		return Ok(Some(Expr::new(span, typeid_, ExprKind::TypeLiteral(set_type))));
	}

	Ok(None)
}

/// Member access on a value: materialize an address for the receiver, then
/// resolve a member variable, member function set or accessor.
pub fn create_member_access(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	value: Expr,
	name: &str,
	allow_failure: bool,
) -> AnalyzeResult<Option<Expr>> {
	if let ExprKind::TypeLiteral(ty) = value.kind {
		if let Some(result) = create_typeid_member_access(ctx, span, ty, name)? {
			return Ok(Some(result));
		}
	}

	let mut value_type = value.ty;
	let wrapped;

	if let Some(target) = ctx.types[value.ty].ref_target() {
		// A reference to a class skips one dereference; a double reference
		// skips two
		if let Some(inner) = ctx.types[target].ref_target() {
			value_type = inner;

			wrapped = Expr::new(span, target, ExprKind::Dereference(Box::new(value)));
		} else {
			value_type = target;

			wrapped = value;
		}
	} else if value.ty == ctx.builtin.auto_ref {
		return create_auto_ref_function_set(ctx, span, value, name).map(Some);
	} else if let ExprKind::VariableAccess(variable) = value.kind {
		let ref_type = ctx.get_reference_type(value.ty);

		wrapped = Expr::new(span, ref_type, ExprKind::GetAddress(variable));
	} else if matches!(value.kind, ExprKind::Dereference(_)) {
		wrapped = match value.kind {
			ExprKind::Dereference(inner) => *inner,
			_ => unreachable!(),
		};
	} else {
		wrapped = materialize_to_temporary(ctx, span, value)?;
	}

	if let Some((_, length)) = ctx.types[value_type].array_elem() {
		if name == "size" {
			return Ok(Some(Expr::new(
				span,
				ctx.builtin.int_,
				ExprKind::IntegerLiteral(length),
			)));
		}

		return Err(ctx.error(
			span,
			CompileErrorKind::NameResolution,
			"array doesn't have member with this name".to_string(),
		));
	}

	if !ctx.types[wrapped.ty].is_ref() {
		return Err(ctx.error(
			span,
			CompileErrorKind::NameResolution,
			format!(
				"can't access member '{}' of type '{}'",
				name,
				ctx.type_name(value_type)
			),
		));
	}

	// Member variable
	if let Some(member) = ctx.find_member(value_type, name) {
		let member_type = ctx.variables[member].ty;
		let ref_type = ctx.get_reference_type(member_type);

		let shift = Expr::new(
			span,
			ref_type,
			ExprKind::MemberAccess {
				value: Box::new(wrapped),
				member,
			},
		);

		return Ok(Some(Expr::new(
			span,
			member_type,
			ExprKind::Dereference(Box::new(shift)),
		)));
	}

	// Member function set
	let hash = string_hash_continue(ctx.types[value_type].name_hash, "::");
	let member_hash = string_hash_continue(hash, name);

	let main_functions = ctx.function_map.find_all(member_hash);

	// A generic class instance also exposes functions of its prototype
	let proto = ctx.types[value_type].class().and_then(|class| class.proto);

	let base_functions = match proto {
		Some(proto) => {
			let base_hash = string_hash_continue(ctx.types[proto].name_hash, "::");
			let base_member_hash = string_hash_continue(base_hash, name);

			ctx.function_map.find_all(base_member_hash)
		}
		None => Vec::new(),
	};

	if !main_functions.is_empty() && !base_functions.is_empty() {
		let mut overloads: Vec<FunctionId> = Vec::new();

		for function in main_functions.iter().chain(base_functions.iter()) {
			let mut instantiated = false;

			for existing in &overloads {
				if ctx.functions[*existing].proto == Some(*function) {
					instantiated = true;
				} else {
					let existing_args = ctx.types[ctx.functions[*existing].ty]
						.function_parts()
						.map(|(_, args)| args.to_vec());
					let function_args = ctx.types[ctx.functions[*function].ty]
						.function_parts()
						.map(|(_, args)| args.to_vec());

					if existing_args == function_args {
						instantiated = true;
					}
				}
			}

			if !instantiated {
				overloads.push(*function);
			}
		}

		return create_function_access(ctx, span, &overloads, Some(wrapped)).map(Some);
	}

	if !main_functions.is_empty() {
		return create_function_access(ctx, span, &main_functions, Some(wrapped)).map(Some);
	}

	if !base_functions.is_empty() {
		return create_function_access(ctx, span, &base_functions, Some(wrapped)).map(Some);
	}

	// Accessor functions carry a '$' suffix
	let accessor_hash = string_hash_continue(member_hash, "$");

	let accessors = ctx.function_map.find_all(accessor_hash);

	if !accessors.is_empty() {
		let access = create_function_access(ctx, span, &accessors, Some(wrapped))?;
		let functions = get_node_functions(ctx, span, &access)?;

		return create_function_call_with_syntax_args(
			ctx,
			span,
			access,
			functions,
			Vec::new(),
			&[],
			false,
		);
	}

	if let Some(proto) = proto {
		let base_hash = string_hash_continue(ctx.types[proto].name_hash, "::");
		let base_member_hash = string_hash_continue(base_hash, name);
		let base_accessor_hash = string_hash_continue(base_member_hash, "$");

		let accessors = ctx.function_map.find_all(base_accessor_hash);

		if !accessors.is_empty() {
			let access = create_function_access(ctx, span, &accessors, Some(wrapped))?;
			let functions = get_node_functions(ctx, span, &access)?;

			return create_function_call_with_syntax_args(
				ctx,
				span,
				access,
				functions,
				Vec::new(),
				&[],
				false,
			);
		}
	}

	if allow_failure {
		return Ok(None);
	}

	Err(ctx.error(
		span,
		CompileErrorKind::NameResolution,
		format!(
			"member variable or function '{}' is not defined in class '{}'",
			name,
			ctx.type_name(value_type)
		),
	))
}

/// Array subscript: built-in checked indexing on arrays and unsized arrays,
/// or the overloaded '[]' operator.
pub fn create_array_index(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	value: Expr,
	arguments: Vec<ArgumentData>,
) -> AnalyzeResult<Expr> {
	let mut value = value;
	let wrapped;

	if let Some(target) = ctx.types[value.ty].ref_target() {
		let inner = Expr::new(span, target, ExprKind::Dereference(Box::new(value.clone())));

		if ctx.types[target].is_unsized_array() {
			value = inner;
			wrapped = value.clone();
		} else {
			value = inner;
			wrapped = match value.kind.clone() {
				ExprKind::Dereference(ptr) => *ptr,
				_ => unreachable!(),
			};
		}
	} else if ctx.types[value.ty].is_unsized_array() {
		wrapped = value.clone();
	} else if let ExprKind::VariableAccess(variable) = value.kind {
		let ref_type = ctx.get_reference_type(value.ty);

		wrapped = Expr::new(span, ref_type, ExprKind::GetAddress(variable));
	} else if matches!(value.kind, ExprKind::Dereference(_)) {
		wrapped = match value.kind.clone() {
			ExprKind::Dereference(inner) => *inner,
			_ => unreachable!(),
		};
	} else {
		wrapped = materialize_to_temporary(ctx, span, value.clone())?;
	}

	if ctx.types[wrapped.ty].is_ref() || ctx.types[value.ty].is_unsized_array() {
		let find_overload = arguments.is_empty()
			|| arguments.len() > 1
			|| arguments.iter().any(|argument| argument.name.is_some());

		if let Some(overloads) = create_variable_access_named(ctx, span, &[], "[]")? {
			let mut call_arguments =
				vec![ArgumentData::unnamed(wrapped.span, wrapped.ty, wrapped.clone())];

			call_arguments.extend(arguments.iter().cloned());

			let functions = get_node_functions(ctx, span, &overloads)?;

			if let Some(result) = crate::frontend::create_function_call_resolved(
				ctx,
				span,
				overloads,
				functions,
				Vec::new(),
				call_arguments,
				!find_overload,
			)? {
				if let Some(target) = ctx.types[result.ty].ref_target() {
					return Ok(Expr::new(
						span,
						target,
						ExprKind::Dereference(Box::new(result)),
					));
				}

				return Ok(result);
			}
		}

		if find_overload {
			return Err(ctx.error(
				span,
				CompileErrorKind::OverloadSelection,
				"overloaded '[]' operator is not available".to_string(),
			));
		}

		let index_argument = arguments.into_iter().next().unwrap();

		let index = create_cast(
			ctx,
			span,
			index_argument.value.expect("call arguments carry values"),
			ctx.builtin.int_,
			false,
		)?;

		let index_value = crate::frontend::evaluate_integer(ctx, &index);

		if let Some(index_value) = index_value {
			if index_value < 0 {
				return Err(ctx.error(
					span,
					CompileErrorKind::LayoutLimit,
					"array index cannot be negative".to_string(),
				));
			}

			if let Some((_, length)) = ctx.types[value.ty].array_elem() {
				if index_value >= length {
					return Err(ctx.error(
						span,
						CompileErrorKind::LayoutLimit,
						"array index out of bounds".to_string(),
					));
				}
			}
		}

		let elem = ctx.types[value.ty]
			.array_elem()
			.map(|(elem, _)| elem)
			.or_else(|| ctx.types[value.ty].unsized_elem());

		if let Some(elem) = elem {
			let ref_type = ctx.get_reference_type(elem);

			let shift = Expr::new(
				span,
				ref_type,
				ExprKind::ArrayIndex {
					value: Box::new(wrapped),
					index: Box::new(index),
				},
			);

			return Ok(Expr::new(span, elem, ExprKind::Dereference(Box::new(shift))));
		}
	}

	Err(ctx.error(
		span,
		CompileErrorKind::TypeMismatch,
		format!("type '{}' is not an array", ctx.type_name(value.ty)),
	))
}

fn cast_node(span: SourceSpan, ty: TypeId, value: Expr, cast: CastKind) -> Expr {
	Expr::new(
		span,
		ty,
		ExprKind::TypeCast {
			value: Box::new(value),
			cast,
		},
	)
}

/// Implicit conversion. Chooses exactly one concrete cast kind or fails;
/// `is_function_argument` additionally permits value-to-reference wrapping
/// for explicit reference parameters.
pub fn create_cast(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	value: Expr,
	ty: TypeId,
	is_function_argument: bool,
) -> AnalyzeResult<Expr> {
	// A function definition used as a value decays to a function pointer
	if matches!(value.kind, ExprKind::FunctionDefinition { .. }) {
		let value = crate::frontend::create_function_pointer(ctx, span, value, true)?;

		if value.ty == ty {
			return Ok(value);
		}

		return create_cast(ctx, span, value, ty, is_function_argument);
	}

	if value.ty == ty {
		return Ok(value);
	}

	if ctx.is_numeric_type(value.ty) && ctx.is_numeric_type(ty) {
		return Ok(cast_node(span, ty, value, CastKind::Numerical));
	}

	if ty == ctx.builtin.bool_ {
		if ctx.types[value.ty].is_ref() {
			return Ok(cast_node(span, ty, value, CastKind::PtrToBool));
		}

		if ctx.types[value.ty].is_unsized_array() {
			return Ok(cast_node(span, ty, value, CastKind::UnsizedToBool));
		}

		if ctx.types[value.ty].is_function() {
			return Ok(cast_node(span, ty, value, CastKind::FunctionToBool));
		}
	}

	if value.ty == ctx.builtin.nullptr_ {
		if ctx.types[ty].is_ref() {
			return Ok(cast_node(span, ty, value, CastKind::NullToPtr));
		}

		if ty == ctx.builtin.auto_ref {
			return Ok(cast_node(span, ty, value, CastKind::NullToAutoPtr));
		}

		if ctx.types[ty].is_unsized_array() {
			return Ok(cast_node(span, ty, value, CastKind::NullToUnsized));
		}

		if ty == ctx.builtin.auto_array {
			return Ok(cast_node(span, ty, value, CastKind::NullToAutoArray));
		}

		if ctx.types[ty].is_function() {
			return Ok(cast_node(span, ty, value, CastKind::NullToFunction));
		}
	}

	if let Some(target_elem) = ctx.types[ty].unsized_elem() {
		// Sized-to-unsized array conversion
		if let Some((value_elem, _)) = ctx.types[value.ty].array_elem() {
			if target_elem == value_elem {
				if let ExprKind::VariableAccess(variable) = value.kind {
					let ref_type = ctx.get_reference_type(value.ty);
					let address = Expr::new(span, ref_type, ExprKind::GetAddress(variable));

					return Ok(cast_node(span, ty, address, CastKind::ArrayPtrToUnsized));
				}

				if matches!(value.kind, ExprKind::Dereference(_)) {
					let inner = match value.kind {
						ExprKind::Dereference(inner) => *inner,
						_ => unreachable!(),
					};

					return Ok(cast_node(span, ty, inner, CastKind::ArrayPtrToUnsized));
				}

				return Ok(cast_node(span, ty, value, CastKind::ArrayToUnsized));
			}
		}
	}

	if let Some(target) = ctx.types[ty].ref_target() {
		if let Some(value_target) = ctx.types[value.ty].ref_target() {
			// Ref-to-sized-array to ref-to-unsized-array
			if let (Some(target_elem), Some((value_elem, _))) = (
				ctx.types[target].unsized_elem(),
				ctx.types[value_target].array_elem(),
			) {
				if target_elem == value_elem {
					return Ok(cast_node(span, ty, value, CastKind::ArrayPtrToUnsizedPtr));
				}
			}

			if ctx.types[target].is_class() && ctx.types[value_target].is_class() {
				if ctx.is_derived_from(value_target, target) {
					return Ok(cast_node(span, ty, value, CastKind::Reinterpret));
				}

				if ctx.is_derived_from(target, value_target) {
					// Downcast gets a runtime check
					let void_ref = ctx.get_reference_type(ctx.builtin.void_);

					let untyped = cast_node(span, void_ref, value, CastKind::Reinterpret);

					let type_id = Expr::new(
						span,
						ctx.builtin.typeid_,
						ExprKind::TypeLiteral(target),
					);

					let checked = create_function_call_2(
						ctx,
						span,
						"assert_derived_from_base",
						untyped,
						type_id,
						false,
					)?
					.expect("assert_derived_from_base is supplied by the base module");

					return Ok(cast_node(span, ty, checked, CastKind::Reinterpret));
				}
			}
		} else if value.ty == ctx.builtin.auto_ref {
			return Ok(cast_node(span, ty, value, CastKind::AutoPtrToPtr));
		} else if is_function_argument {
			// Value-to-reference wrapping for explicit reference parameters
			if let ExprKind::VariableAccess(variable) = value.kind {
				let ref_type = ctx.get_reference_type(value.ty);

				return Ok(Expr::new(span, ref_type, ExprKind::GetAddress(variable)));
			}

			if matches!(value.kind, ExprKind::Dereference(_)) {
				let inner = match value.kind {
					ExprKind::Dereference(inner) => *inner,
					_ => unreachable!(),
				};

				return Ok(inner);
			}

			return Ok(cast_node(span, ty, value, CastKind::AnyToPtr));
		}
	}

	if ty == ctx.builtin.auto_ref {
		if ctx.types[value.ty].is_ref() {
			return Ok(cast_node(span, ty, value, CastKind::PtrToAutoPtr));
		}

		if is_function_argument {
			if let ExprKind::VariableAccess(variable) = value.kind {
				let ref_type = ctx.get_reference_type(value.ty);
				let address = Expr::new(span, ref_type, ExprKind::GetAddress(variable));

				return Ok(cast_node(span, ty, address, CastKind::PtrToAutoPtr));
			}

			if matches!(value.kind, ExprKind::Dereference(_)) {
				let inner = match value.kind {
					ExprKind::Dereference(inner) => *inner,
					_ => unreachable!(),
				};

				return Ok(cast_node(span, ty, inner, CastKind::PtrToAutoPtr));
			}

			let value_ref = ctx.get_reference_type(value.ty);
			let pointer = create_cast(ctx, span, value, value_ref, true)?;

			return Ok(cast_node(span, ty, pointer, CastKind::PtrToAutoPtr));
		}

		// Boxing a value copies it to the heap
		return create_function_call_1(ctx, span, "duplicate", value, false)
			.map(|call| call.expect("duplicate is supplied by the base module"));
	}

	if ty == ctx.builtin.auto_array {
		if ctx.types[value.ty].is_unsized_array() {
			return Ok(cast_node(span, ty, value, CastKind::UnsizedToAutoArray));
		}

		if let Some((elem, _)) = ctx.types[value.ty].array_elem() {
			let unsized_type = ctx.get_unsized_array_type(elem);

			let unsized_value = create_cast(ctx, span, value, unsized_type, false)?;

			return create_cast(ctx, span, unsized_value, ty, false);
		}
	}

	if ctx.types[ty].is_function() {
		if let Some(function) = get_function_for_type(ctx, span, &value, ty)? {
			let function_type = ctx.functions[function.function].ty;

			return Ok(Expr::new(
				span,
				function_type,
				ExprKind::FunctionAccess {
					function: function.function,
					context: Box::new(function.context),
				},
			));
		}
	}

	if value.ty == ctx.builtin.auto_ref && !ctx.types[ty].is_ref() {
		// Unboxing dereferences after a pointer cast
		let ref_type = ctx.get_reference_type(ty);

		let pointer = create_cast(ctx, span, value, ref_type, false)?;

		return Ok(Expr::new(span, ty, ExprKind::Dereference(Box::new(pointer))));
	}

	Err(ctx.error(
		span,
		CompileErrorKind::TypeMismatch,
		format!(
			"can't convert '{}' to '{}'",
			ctx.type_name(value.ty),
			ctx.type_name(ty)
		),
	))
}

/// Conversion used for control-flow conditions.
pub fn create_condition_cast(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	value: Expr,
) -> AnalyzeResult<Expr> {
	if ctx.is_numeric_type(value.ty) {
		return Ok(value);
	}

	if ctx.types[value.ty].is_ref()
		|| ctx.types[value.ty].is_unsized_array()
		|| ctx.types[value.ty].is_function()
	{
		return create_cast(ctx, span, value, ctx.builtin.bool_, false);
	}

	if value.ty == ctx.builtin.auto_ref {
		let null = Expr::new(span, ctx.builtin.nullptr_, ExprKind::NullptrLiteral);

		return create_binary_op(ctx, span, SynBinaryOpType::NotEqual, value, null);
	}

	create_function_call_1(ctx, span, "bool", value, false)
		.map(|call| call.expect("a condition must convert to bool"))
}

/// Assignment. Getter calls turn into setter calls, user-defined '='
/// overloads win before the built-in store.
pub fn create_assignment(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	lhs: Expr,
	rhs: Expr,
) -> AnalyzeResult<Expr> {
	let mut lhs = lhs;
	let mut wrapped = lhs.clone();

	if let ExprKind::VariableAccess(variable) = lhs.kind {
		let ref_type = ctx.get_reference_type(lhs.ty);

		wrapped = Expr::new(lhs.span, ref_type, ExprKind::GetAddress(variable));
	} else if let ExprKind::Dereference(inner) = &lhs.kind {
		wrapped = (**inner).clone();
	} else if let ExprKind::FunctionCall { function, .. } = &lhs.kind {
		// Turn a 'get' accessor call into a 'set' call
		if let ExprKind::FunctionAccess { function, context } = &function.kind {
			if ctx.functions[*function].accessor {
				let arguments = vec![ArgumentData::unnamed(rhs.span, rhs.ty, rhs.clone())];

				let accessor_hash = ctx.functions[*function].name_hash;
				let overload_ids = ctx.function_map.find_all(accessor_hash);

				if !overload_ids.is_empty() {
					let context = (**context).clone();

					let overloads =
						create_function_access(ctx, span, &overload_ids, Some(context))?;

					if let Some(call) = crate::frontend::create_function_call_with_value(
						ctx,
						span,
						overloads,
						arguments.clone(),
						true,
					)? {
						return Ok(call);
					}
				}

				if let Some(proto) = ctx.functions[*function].proto {
					let proto_hash = ctx.functions[proto].name_hash;
					let overload_ids = ctx.function_map.find_all(proto_hash);

					if !overload_ids.is_empty() {
						let context = (**context).clone();

						let overloads =
							create_function_access(ctx, span, &overload_ids, Some(context))?;

						if let Some(call) = crate::frontend::create_function_call_with_value(
							ctx,
							span,
							overloads,
							arguments,
							true,
						)? {
							return Ok(call);
						}
					}
				}
			}
		}

		if let Some(target) = ctx.types[lhs.ty].ref_target() {
			lhs = Expr::new(span, target, ExprKind::Dereference(Box::new(lhs)));
		}
	}

	if !ctx.types[wrapped.ty].is_ref() {
		return Err(ctx.error(
			span,
			CompileErrorKind::TypeMismatch,
			format!(
				"cannot change immutable value of type {}",
				ctx.type_name(lhs.ty)
			),
		));
	}

	if rhs.ty == ctx.builtin.void_ {
		return Err(ctx.error(
			span,
			CompileErrorKind::TypeMismatch,
			format!("cannot convert from void to {}", ctx.type_name(lhs.ty)),
		));
	}

	if lhs.ty == ctx.builtin.void_ {
		return Err(ctx.error(
			span,
			CompileErrorKind::TypeMismatch,
			format!("cannot convert from {} to void", ctx.type_name(rhs.ty)),
		));
	}

	if let Some(result) =
		create_function_call_2(ctx, span, "=", wrapped.clone(), rhs.clone(), true)?
	{
		return Ok(result);
	}

	if (ctx.types[lhs.ty].is_array() || ctx.types[lhs.ty].is_unsized_array())
		&& rhs.ty == ctx.builtin.auto_array
	{
		return create_function_call_2(ctx, span, "__aaassignrev", wrapped, rhs, false)
			.map(|call| call.expect("__aaassignrev is supplied by the base module"));
	}

	let rhs = create_cast(ctx, span, rhs, lhs.ty, false)?;

	let lhs_type = lhs.ty;

	Ok(Expr::new(
		span,
		lhs_type,
		ExprKind::Assignment {
			lhs: Box::new(wrapped),
			rhs: Box::new(rhs),
		},
	))
}

fn is_binary_bitwise(op: SynBinaryOpType) -> bool {
	matches!(
		op,
		SynBinaryOpType::Shl
			| SynBinaryOpType::Shr
			| SynBinaryOpType::BitAnd
			| SynBinaryOpType::BitOr
			| SynBinaryOpType::BitXor
	)
}

fn is_comparison(op: SynBinaryOpType) -> bool {
	matches!(
		op,
		SynBinaryOpType::Less
			| SynBinaryOpType::LessEqual
			| SynBinaryOpType::Greater
			| SynBinaryOpType::GreaterEqual
			| SynBinaryOpType::Equal
			| SynBinaryOpType::NotEqual
	)
}

fn is_logical(op: SynBinaryOpType) -> bool {
	matches!(
		op,
		SynBinaryOpType::LogicalAnd | SynBinaryOpType::LogicalOr | SynBinaryOpType::LogicalXor
	)
}

pub fn create_binary_op(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	op: SynBinaryOpType,
	lhs: Expr,
	rhs: Expr,
) -> AnalyzeResult<Expr> {
	let mut lhs = lhs;
	let mut rhs = rhs;

	let mut skip_overload = false;

	if matches!(op, SynBinaryOpType::Equal | SynBinaryOpType::NotEqual) {
		if lhs.ty != rhs.ty {
			if lhs.ty == ctx.builtin.nullptr_ {
				let target = rhs.ty;

				lhs = create_cast(ctx, span, lhs, target, false)?;
			}

			if rhs.ty == ctx.builtin.nullptr_ {
				let target = lhs.ty;

				rhs = create_cast(ctx, span, rhs, target, false)?;
			}
		}

		if lhs.ty == ctx.builtin.auto_ref && lhs.ty == rhs.ty {
			let name = if op == SynBinaryOpType::Equal {
				"__rcomp"
			} else {
				"__rncomp"
			};

			return create_function_call_2(ctx, span, name, lhs, rhs, false)
				.map(|call| call.expect("auto ref comparison is supplied by the base module"));
		}

		if ctx.types[lhs.ty].is_function() && lhs.ty == rhs.ty {
			// Function identity comparison reinterprets to a common shape
			let int_ = ctx.builtin.int_;
			let void_ = ctx.builtin.void_;
			let compare_type = ctx.get_function_type(void_, vec![int_]);

			lhs = cast_node(span, compare_type, lhs, CastKind::Reinterpret);
			rhs = cast_node(span, compare_type, rhs, CastKind::Reinterpret);

			let name = if op == SynBinaryOpType::Equal {
				"__pcomp"
			} else {
				"__pncomp"
			};

			return create_function_call_2(ctx, span, name, lhs, rhs, false)
				.map(|call| call.expect("function comparison is supplied by the base module"));
		}

		if ctx.types[lhs.ty].is_unsized_array() && lhs.ty == rhs.ty {
			if let Some(result) = create_function_call_2(
				ctx,
				span,
				crate::frontend::binary_op_name(op),
				lhs.clone(),
				rhs.clone(),
				true,
			)? {
				return Ok(result);
			}

			let name = if op == SynBinaryOpType::Equal {
				"__acomp"
			} else {
				"__ancomp"
			};

			return create_function_call_2(ctx, span, name, lhs, rhs, false)
				.map(|call| call.expect("array comparison is supplied by the base module"));
		}

		if lhs.ty == ctx.builtin.typeid_ && rhs.ty == ctx.builtin.typeid_ {
			skip_overload = true;
		}
	}

	if is_logical(op) {
		lhs = create_condition_cast(ctx, lhs.span, lhs)?;
		rhs = create_condition_cast(ctx, rhs.span, rhs)?;
	}

	if !skip_overload {
		if let Some(result) = create_function_call_2(
			ctx,
			span,
			crate::frontend::binary_op_name(op),
			lhs.clone(),
			rhs.clone(),
			true,
		)? {
			return Ok(result);
		}
	}

	let eq_op = matches!(op, SynBinaryOpType::Equal | SynBinaryOpType::NotEqual);

	let mut ok = ctx.is_numeric_type(lhs.ty) && ctx.is_numeric_type(rhs.ty);
	ok |= lhs.ty == ctx.builtin.typeid_ && rhs.ty == ctx.builtin.typeid_ && eq_op;
	ok |= ctx.types[lhs.ty].is_ref() && lhs.ty == rhs.ty && eq_op;
	ok |= ctx.types[lhs.ty].is_enum() && lhs.ty == rhs.ty;

	if !ok {
		return Err(ctx.error(
			span,
			CompileErrorKind::TypeMismatch,
			"binary operations between complex types are not supported yet".to_string(),
		));
	}

	if lhs.ty == ctx.builtin.void_ {
		return Err(ctx.error(
			span,
			CompileErrorKind::TypeMismatch,
			"first operand type is 'void'".to_string(),
		));
	}

	if rhs.ty == ctx.builtin.void_ {
		return Err(ctx.error(
			span,
			CompileErrorKind::TypeMismatch,
			"second operand type is 'void'".to_string(),
		));
	}

	let bitwise_op = is_binary_bitwise(op);
	let comparison_op = is_comparison(op);
	let logical_op = is_logical(op);

	if (ctx.is_floating_point_type(lhs.ty) || ctx.is_floating_point_type(rhs.ty))
		&& (logical_op || bitwise_op)
	{
		return Err(ctx.error(
			span,
			CompileErrorKind::TypeMismatch,
			format!(
				"operation {} is not supported on '{}' and '{}'",
				crate::frontend::binary_op_name(op),
				ctx.type_name(lhs.ty),
				ctx.type_name(rhs.ty)
			),
		));
	}

	if logical_op {
		let bool_ = ctx.builtin.bool_;

		lhs = create_cast(ctx, span, lhs, bool_, false)?;
		rhs = create_cast(ctx, span, rhs, bool_, false)?;
	} else if ctx.is_numeric_type(lhs.ty) && ctx.is_numeric_type(rhs.ty) {
		let common = ctx
			.binary_op_result_type(lhs.ty, rhs.ty)
			.expect("both operands are numeric");

		lhs = create_cast(ctx, span, lhs, common, false)?;
		rhs = create_cast(ctx, span, rhs, common, false)?;
	}

	if lhs.ty != rhs.ty {
		return Err(ctx.error(
			span,
			CompileErrorKind::TypeMismatch,
			format!(
				"operation {} is not supported on '{}' and '{}'",
				crate::frontend::binary_op_name(op),
				ctx.type_name(lhs.ty),
				ctx.type_name(rhs.ty)
			),
		));
	}

	let result_type = if comparison_op || logical_op {
		ctx.builtin.bool_
	} else {
		lhs.ty
	};

	Ok(Expr::new(
		span,
		result_type,
		ExprKind::BinaryOp {
			op,
			lhs: Box::new(lhs),
			rhs: Box::new(rhs),
		},
	))
}

pub fn create_unary_op(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	op: SynUnaryOpType,
	value: Expr,
) -> AnalyzeResult<Expr> {
	if let Some(result) = create_function_call_1(
		ctx,
		span,
		crate::frontend::unary_op_name(op),
		value.clone(),
		true,
	)? {
		return Ok(result);
	}

	let bitwise_op = matches!(op, SynUnaryOpType::BitNot);
	let logical_op = matches!(op, SynUnaryOpType::LogicalNot);

	let unsupported = |ctx: &ExpressionContext| {
		ctx.error(
			span,
			CompileErrorKind::TypeMismatch,
			format!(
				"unary operation '{}' is not supported on '{}'",
				crate::frontend::unary_op_name(op),
				ctx.type_name(value.ty)
			),
		)
	};

	if ctx.is_floating_point_type(value.ty) {
		if bitwise_op || logical_op {
			return Err(unsupported(ctx));
		}
	} else if value.ty == ctx.builtin.bool_ || value.ty == ctx.builtin.auto_ref {
		if !logical_op {
			return Err(unsupported(ctx));
		}
	} else if ctx.types[value.ty].is_ref() {
		if !logical_op {
			return Err(unsupported(ctx));
		}
	} else if !ctx.is_numeric_type(value.ty) {
		return Err(unsupported(ctx));
	}

	let result_type = if logical_op {
		ctx.builtin.bool_
	} else {
		value.ty
	};

	Ok(Expr::new(
		span,
		result_type,
		ExprKind::UnaryOp {
			op,
			value: Box::new(value),
		},
	))
}

/// Virtual-table variable for dispatching a method through an auto-ref
/// receiver; created on first use and filled by the module setup pass.
pub fn get_function_table(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	function: FunctionId,
) -> Expr {
	let function_type = ctx.functions[function].ty;

	let method_name = ctx.functions[function]
		.name
		.rsplit("::")
		.next()
		.unwrap_or(&ctx.functions[function].name)
		.to_string();

	let table_name = names::vtable_name(ctx.types[function_type].name_hash, &method_name);
	let table_hash = string_hash(&table_name);

	if let Some(variable) = ctx.variable_map.find(table_hash) {
		let ty = ctx.variables[variable].ty;

		return Expr::new(span, ty, ExprKind::VariableAccess(variable));
	}

	let function_id_type = ctx.builtin.function_id;
	let table_type = ctx.get_unsized_array_type(function_id_type);

	let alignment = ctx.types[table_type].alignment;
	let size = ctx.types[table_type].size;
	let offset = ctx.allocate_in_scope(alignment, size);

	let unique_id = ctx.unique_variable_id;
	ctx.unique_variable_id += 1;

	let variable = ctx.variables.len();

	ctx.variables.push(VariableData {
		source: span,
		scope: ctx.global_scope,
		ty: table_type,
		name: table_name.clone(),
		name_hash: table_hash,
		alignment,
		offset,
		unique_id,
		is_reference: false,
		imported: false,
	});

	ctx.vtables.push(variable);
	ctx.vtable_map.insert((function_type, method_name), variable);

	Expr::new(span, table_type, ExprKind::VariableAccess(variable))
}
