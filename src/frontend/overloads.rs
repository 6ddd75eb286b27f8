use crate::frontend::{
	analyze_short_function_definition_for_argument, analyze_type_with_failure,
	create_cast, create_function_context_access, create_generic_type_instance,
	create_variable_access_named, get_function_table, names, string_hash, AnalyzeResult,
	ArgumentData, CompileError, CompileErrorKind, Expr, ExprKind, ExpressionContext, FunctionId,
	FunctionSyntax, MatchData, ScopeOwner, SourceSpan, SynCallArgument, SynValue, TypeEntry,
	TypeId, TypeKind, VariableData,
};

pub const RATING_INCOMPATIBLE: u32 = u32::MAX;

/// A callable candidate: the function plus the context expression the call
/// will be made through.
#[derive(Clone, Debug)]
pub struct FunctionValue {
	pub function: FunctionId,
	pub context: Expr,
}

pub fn get_node_functions(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	function: &Expr,
) -> AnalyzeResult<Vec<FunctionValue>> {
	let mut functions = Vec::new();

	let mut node = function;

	if let ExprKind::Passthrough(inner) = &node.kind {
		node = inner;
	}

	match &node.kind {
		ExprKind::FunctionAccess { function, context } => {
			functions.push(FunctionValue {
				function: *function,
				context: (**context).clone(),
			});
		}
		ExprKind::FunctionDefinition { function, .. }
		| ExprKind::GenericFunctionPrototype(function) => {
			let context = create_function_context_access(ctx, span, *function)?;

			functions.push(FunctionValue {
				function: *function,
				context,
			});
		}
		ExprKind::FunctionOverloadSet {
			functions: overloads,
			context,
		} => {
			let overloads = overloads.clone();
			let context = context.clone();

			for function in overloads {
				let context = match &context {
					Some(context) => (**context).clone(),
					None => create_function_context_access(ctx, span, function)?,
				};

				functions.push(FunctionValue { function, context });
			}
		}
		_ => {}
	}

	Ok(functions)
}

/// Pick the overload whose type matches `target` exactly, instantiating a
/// generic candidate when the match pins every argument down.
pub fn get_function_for_type(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	value: &Expr,
	target: TypeId,
) -> AnalyzeResult<Option<FunctionValue>> {
	let functions = get_node_functions(ctx, span, value)?;

	if functions.is_empty() {
		return Ok(None);
	}

	let (target_return, target_args) = match ctx.types[target].function_parts() {
		Some((ret, args)) => (ret, args.to_vec()),
		None => return Ok(None),
	};

	let mut best_match: Option<(FunctionValue, TypeId)> = None;
	let mut best_generic_match: Option<(FunctionValue, TypeId)> = None;

	for candidate in &functions {
		let function_type = ctx.functions[candidate.function].ty;

		let (function_return, function_args) = match ctx.types[function_type].function_parts() {
			Some((ret, args)) => (ret, args.to_vec()),
			None => continue,
		};

		if target_args.len() != function_args.len() {
			continue;
		}

		if ctx.types[target].is_generic {
			let mut aliases = Vec::new();

			let return_type =
				match_generic_type(ctx, span, target_return, function_return, &mut aliases, true)?;

			let mut arguments = Vec::new();

			for (lhs, rhs) in target_args.iter().zip(function_args.iter()) {
				if let Some(matched) =
					match_generic_type(ctx, span, *lhs, *rhs, &mut aliases, true)?
				{
					if !ctx.types[matched].is_generic {
						arguments.push(matched);
					}
				}
			}

			if let Some(return_type) = return_type {
				if arguments.len() == target_args.len() {
					if best_generic_match.is_some() {
						return Ok(None);
					}

					let matched = ctx.get_function_type(return_type, arguments);

					best_generic_match = Some((candidate.clone(), matched));
				}
			}
		} else if ctx.types[function_type].is_generic {
			let mut aliases = Vec::new();
			let mut matches = 0;

			for (lhs, rhs) in function_args.iter().zip(target_args.iter()) {
				if let Some(matched) =
					match_generic_type(ctx, span, *lhs, *rhs, &mut aliases, true)?
				{
					if !ctx.types[matched].is_generic {
						matches += 1;
					}
				}
			}

			if matches == target_args.len() {
				if best_generic_match.is_some() {
					return Ok(None);
				}

				best_generic_match = Some((candidate.clone(), target));
			}
		} else if function_type == target {
			if best_match.is_some() {
				return Ok(None);
			}

			best_match = Some((candidate.clone(), target));
		}
	}

	let (mut best_overload, mut best_target) = match best_match.or(best_generic_match) {
		Some(pair) => pair,
		None => return Ok(None),
	};

	let arguments: Vec<ArgumentData> = ctx.types[best_target]
		.function_parts()
		.map(|(_, args)| args.to_vec())
		.unwrap_or_default()
		.into_iter()
		.map(|ty| ArgumentData {
			source: span,
			is_explicit: false,
			name: None,
			ty,
			value: None,
		})
		.collect();

	if ctx.is_generic_function(best_overload.function) {
		best_overload = match create_generic_function_instance(
			ctx,
			span,
			best_overload,
			Vec::new(),
			&arguments,
		)? {
			Some(instance) => instance,
			None => return Ok(None),
		};
	}

	let (best_target_return, best_target_args) = {
		let (ret, args) = ctx.types[best_target].function_parts().unwrap();
		(ret, args.to_vec())
	};

	if best_target_return == ctx.builtin.auto_ {
		let (instance_return, _) = ctx.types[ctx.functions[best_overload.function].ty]
			.function_parts()
			.unwrap();

		best_target = ctx.get_function_type(instance_return, best_target_args);
	}

	if ctx.functions[best_overload.function].ty == best_target {
		return Ok(Some(best_overload));
	}

	Ok(None)
}

/// Handle named argument order, default argument values and variadic packs.
/// Returns `None` when the actual arguments cannot be mapped to the formals.
pub fn prepare_arguments_for_function_call(
	ctx: &mut ExpressionContext,
	function_arguments: &[ArgumentData],
	arguments: &[ArgumentData],
	prepare_values: bool,
) -> AnalyzeResult<Option<Vec<ArgumentData>>> {
	let has_named = arguments.iter().any(|arg| arg.name.is_some());

	let mut result: Vec<ArgumentData>;

	if has_named {
		for argument in arguments {
			if let Some(name) = &argument.name {
				if !function_arguments
					.iter()
					.any(|formal| formal.name.as_deref() == Some(name.as_str()))
				{
					return Ok(None);
				}
			}
		}

		let mut slots: Vec<Option<ArgumentData>> = vec![None; function_arguments.len()];

		let mut unnamed_count = 0;

		for argument in arguments {
			if argument.name.is_some() {
				break;
			}

			if unnamed_count >= slots.len() {
				return Ok(None);
			}

			slots[unnamed_count] = Some(argument.clone());
			unnamed_count += 1;
		}

		for argument in arguments.iter().skip(unnamed_count) {
			let name = match &argument.name {
				Some(name) => name,
				None => return Ok(None),
			};

			let target = function_arguments
				.iter()
				.position(|formal| formal.name.as_deref() == Some(name.as_str()))
				.unwrap();

			if slots[target].is_some() {
				return Err(CompileError::new(
					argument.source,
					CompileErrorKind::OverloadSelection,
					format!("argument '{}' is already set", name),
				));
			}

			slots[target] = Some(argument.clone());
		}

		for (slot, formal) in slots.iter_mut().zip(function_arguments.iter()) {
			if slot.is_none() {
				if let Some(default) = &formal.value {
					*slot = Some(ArgumentData {
						source: formal.source,
						is_explicit: false,
						name: None,
						ty: default.ty,
						value: Some(Expr::new(
							formal.source,
							default.ty,
							ExprKind::Passthrough(Box::new(default.clone())),
						)),
					});
				}
			}
		}

		if slots.iter().any(|slot| slot.is_none()) {
			return Ok(None);
		}

		result = slots.into_iter().map(|slot| slot.unwrap()).collect();
	} else {
		result = arguments.to_vec();

		for formal in function_arguments.iter().skip(result.len()) {
			if let Some(default) = &formal.value {
				result.push(ArgumentData {
					source: formal.source,
					is_explicit: false,
					name: None,
					ty: default.ty,
					value: Some(Expr::new(
						formal.source,
						default.ty,
						ExprKind::Passthrough(Box::new(default.clone())),
					)),
				});
			}
		}

		// Create a variadic pack if necessary
		let auto_ref = ctx.builtin.auto_ref;
		let var_arg_type = ctx.get_unsized_array_type(auto_ref);

		if let Some(last) = function_arguments.last() {
			if last.ty == var_arg_type && !last.is_explicit {
				let tail_allowed = result.len() >= function_arguments.len() - 1
					&& !(result.len() == function_arguments.len()
						&& result.last().map(|arg| arg.ty) == Some(var_arg_type));

				if tail_allowed {
					let value = if prepare_values {
						let pack_span = result
							.first()
							.map(|arg| arg.source)
							.unwrap_or_default();

						let mut values = Vec::new();

						for argument in result.iter().skip(function_arguments.len() - 1) {
							let argument_value = argument
								.value
								.clone()
								.expect("prepared call arguments carry values");

							values.push(create_cast(
								ctx,
								argument.source,
								argument_value,
								auto_ref,
								true,
							)?);
						}

						let packed = if values.is_empty() {
							Expr::new(pack_span, ctx.builtin.nullptr_, ExprKind::NullptrLiteral)
						} else {
							let array_type = ctx.get_array_type(auto_ref, values.len() as i64);

							Expr::new(pack_span, array_type, ExprKind::Array { values })
						};

						Some(create_cast(ctx, pack_span, packed, var_arg_type, true)?)
					} else {
						None
					};

					result.truncate(function_arguments.len() - 1);
					result.push(ArgumentData {
						source: last.source,
						is_explicit: false,
						name: last.name.clone(),
						ty: var_arg_type,
						value,
					});
				}
			}
		}
	}

	if result.len() != function_arguments.len() {
		return Ok(None);
	}

	if prepare_values {
		for (argument, formal) in result.iter_mut().zip(function_arguments.iter()) {
			let value = argument
				.value
				.take()
				.expect("prepared call arguments carry values");

			let converted = create_cast(ctx, value.span, value, formal.ty, true)?;

			argument.ty = converted.ty;
			argument.value = Some(converted);
		}
	}

	Ok(Some(result))
}

/// Integer rating of how well `arguments` fit the candidate; lower is better,
/// `RATING_INCOMPATIBLE` rules the candidate out.
pub fn get_function_rating(
	ctx: &mut ExpressionContext,
	function: FunctionId,
	instance_type: TypeId,
	arguments: &[ArgumentData],
) -> AnalyzeResult<u32> {
	if ctx.functions[function].arguments.len() != arguments.len() {
		return Ok(RATING_INCOMPATIBLE);
	}

	let instance_args = match ctx.types[instance_type].function_parts() {
		Some((_, args)) => args.to_vec(),
		None => return Ok(RATING_INCOMPATIBLE),
	};

	let mut rating = 0u32;

	for (i, expected_type) in instance_args.iter().enumerate() {
		let expected_type = *expected_type;
		let expected_explicit = ctx.functions[function].arguments[i].is_explicit;

		let actual = &arguments[i];
		let actual_type = actual.ty;

		if expected_type == actual_type {
			continue;
		}

		if actual_type == ctx.builtin.nullptr_ {
			// nullptr converts to T ref, T[] and function pointers for free
			if ctx.types[expected_type].is_ref()
				|| ctx.types[expected_type].is_unsized_array()
				|| ctx.types[expected_type].is_function()
			{
				continue;
			}

			if expected_type == ctx.builtin.auto_ref || expected_type == ctx.builtin.auto_array {
				rating += 5;
				continue;
			}
		}

		// Generic function argument
		if ctx.types[expected_type].is_generic {
			continue;
		}

		if expected_explicit {
			if ctx.types[expected_type].is_function() {
				if let Some(value) = &actual.value {
					let is_callable = ctx.types[actual_type].is_function()
						|| matches!(ctx.types[actual_type].kind, TypeKind::FunctionSet { .. });

					if is_callable {
						let value = value.clone();

						if get_function_for_type(ctx, value.span, &value, expected_type)?
							.is_some()
						{
							continue;
						}
					}
				}
			}

			return Ok(RATING_INCOMPATIBLE);
		}

		// array -> unsized array
		if let (Some(l_elem), Some((r_elem, _))) = (
			ctx.types[expected_type].unsized_elem(),
			ctx.types[actual_type].array_elem(),
		) {
			if l_elem == r_elem {
				rating += 2;
				continue;
			}
		}

		// array -> auto[]
		if expected_type == ctx.builtin.auto_array
			&& (ctx.types[actual_type].is_array() || ctx.types[actual_type].is_unsized_array())
		{
			rating += 5;
			continue;
		}

		if let (Some(l_target), Some(r_target)) = (
			ctx.types[expected_type].ref_target(),
			ctx.types[actual_type].ref_target(),
		) {
			// array[N] ref -> array[] ref
			if let (Some(l_elem), Some((r_elem, _))) = (
				ctx.types[l_target].unsized_elem(),
				ctx.types[r_target].array_elem(),
			) {
				if l_elem == r_elem {
					rating += 10;
					continue;
				}
			}

			// derived ref -> base ref, base ref -> derived ref
			if ctx.types[l_target].is_class() && ctx.types[r_target].is_class() {
				if ctx.is_derived_from(r_target, l_target) {
					rating += 5;
					continue;
				}

				if ctx.is_derived_from(l_target, r_target) {
					rating += 10;
					continue;
				}
			}
		}

		if ctx.types[expected_type].is_class() && ctx.types[actual_type].is_class() {
			if ctx.is_derived_from(actual_type, expected_type) {
				rating += 5;
				continue;
			}
		}

		if ctx.types[expected_type].is_function() {
			if let Some(value) = &actual.value {
				let is_callable = ctx.types[actual_type].is_function()
					|| matches!(ctx.types[actual_type].kind, TypeKind::FunctionSet { .. });

				if is_callable {
					let value = value.clone();

					if get_function_for_type(ctx, value.span, &value, expected_type)?.is_some() {
						continue;
					}
				}
			}

			return Ok(RATING_INCOMPATIBLE);
		}

		// type -> type ref
		if let Some(l_target) = ctx.types[expected_type].ref_target() {
			if l_target == actual_type {
				rating += 5;
				continue;
			}
		}

		// type ref -> auto ref
		if expected_type == ctx.builtin.auto_ref && ctx.types[actual_type].is_ref() {
			rating += 5;
			continue;
		}

		// type -> type ref -> auto ref
		if expected_type == ctx.builtin.auto_ref {
			rating += 10;
			continue;
		}

		// numeric -> numeric
		if ctx.is_numeric_type(expected_type) && ctx.is_numeric_type(actual_type) {
			rating += 1;
			continue;
		}

		return Ok(RATING_INCOMPATIBLE);
	}

	Ok(rating)
}

/// Structural match of a generic `pattern` against a concrete `arg`,
/// recording named aliases. In non-strict mode a few generalizations apply:
/// sized arrays decay to unsized and bare values match references.
pub fn match_generic_type(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	match_type: TypeId,
	arg_type: TypeId,
	aliases: &mut Vec<MatchData>,
	strict: bool,
) -> AnalyzeResult<Option<TypeId>> {
	let mut arg_type = arg_type;

	if !ctx.types[match_type].is_generic {
		if ctx.types[arg_type].is_generic {
			let mut sub_aliases = Vec::new();

			if let Some(improved) =
				match_generic_type(ctx, span, arg_type, match_type, &mut sub_aliases, true)?
			{
				arg_type = improved;
			}
		}

		if match_type == arg_type {
			return Ok(Some(arg_type));
		}

		if strict {
			return Ok(None);
		}

		return Ok(Some(match_type));
	}

	if let TypeKind::Generic { alias } = &ctx.types[match_type].kind {
		let alias = alias.clone();

		if !strict {
			// 'generic' matched with 'type[N]' binds to 'type[]'
			if let Some((elem, _)) = ctx.types[arg_type].array_elem() {
				arg_type = ctx.get_unsized_array_type(elem);
			}
		}

		if alias == "generic" {
			return Ok(Some(arg_type));
		}

		for existing in aliases.iter() {
			if existing.name == alias {
				return Ok(Some(existing.ty));
			}
		}

		aliases.push(MatchData {
			name: alias,
			ty: arg_type,
		});

		return Ok(Some(arg_type));
	}

	if let Some(l_target) = ctx.types[match_type].ref_target() {
		if let Some(r_target) = ctx.types[arg_type].ref_target() {
			if let Some(matched) =
				match_generic_type(ctx, span, l_target, r_target, aliases, true)?
			{
				return Ok(Some(ctx.get_reference_type(matched)));
			}

			return Ok(None);
		}

		if strict {
			return Ok(None);
		}

		// 'generic ref' matched with 'type' binds to 'type ref'
		if let Some(matched) = match_generic_type(ctx, span, l_target, arg_type, aliases, true)? {
			return Ok(Some(ctx.get_reference_type(matched)));
		}

		return Ok(None);
	}

	if let Some((l_elem, l_length)) = ctx.types[match_type].array_elem() {
		if let Some((r_elem, r_length)) = ctx.types[arg_type].array_elem() {
			if l_length == r_length {
				if let Some(matched) =
					match_generic_type(ctx, span, l_elem, r_elem, aliases, true)?
				{
					return Ok(Some(ctx.get_array_type(matched, l_length)));
				}
			}
		}

		return Ok(None);
	}

	if let Some(l_elem) = ctx.types[match_type].unsized_elem() {
		if let Some(r_elem) = ctx.types[arg_type].unsized_elem() {
			if let Some(matched) = match_generic_type(ctx, span, l_elem, r_elem, aliases, true)? {
				return Ok(Some(ctx.get_unsized_array_type(matched)));
			}

			return Ok(None);
		}

		if strict {
			return Ok(None);
		}

		// 'generic[]' matched with 'type[N]' binds to 'type[]'
		if let Some((r_elem, _)) = ctx.types[arg_type].array_elem() {
			if let Some(matched) = match_generic_type(ctx, span, l_elem, r_elem, aliases, true)? {
				return Ok(Some(ctx.get_unsized_array_type(matched)));
			}
		}

		return Ok(None);
	}

	if ctx.types[match_type].is_function() {
		let (l_return, l_args) = {
			let (ret, args) = ctx.types[match_type].function_parts().unwrap();
			(ret, args.to_vec())
		};

		let (r_return, r_args) = match ctx.types[arg_type].function_parts() {
			Some((ret, args)) => (ret, args.to_vec()),
			None => return Ok(None),
		};

		let return_type = match match_generic_type(ctx, span, l_return, r_return, aliases, true)? {
			Some(matched) => matched,
			None => return Ok(None),
		};

		if l_args.len() != r_args.len() {
			return Ok(None);
		}

		let mut arguments = Vec::new();

		for (lhs, rhs) in l_args.iter().zip(r_args.iter()) {
			match match_generic_type(ctx, span, *lhs, *rhs, aliases, true)? {
				Some(matched) => arguments.push(matched),
				None => return Ok(None),
			}
		}

		return Ok(Some(ctx.get_function_type(return_type, arguments)));
	}

	if let TypeKind::GenericClassInstance { proto, arguments } = &ctx.types[match_type].kind {
		let proto = *proto;
		let pattern_args = arguments.clone();

		if let Some(class) = ctx.types[arg_type].class() {
			if class.proto != Some(proto) {
				return Ok(None);
			}

			let class_args: Vec<TypeId> =
				class.generics.iter().map(|generic| generic.ty).collect();

			for (lhs, rhs) in pattern_args.iter().zip(class_args.iter()) {
				if match_generic_type(ctx, span, *lhs, *rhs, aliases, true)?.is_none() {
					return Ok(None);
				}
			}

			return Ok(Some(arg_type));
		}

		return Ok(None);
	}

	Err(ctx.error(
		span,
		CompileErrorKind::GenericInstantiation,
		"unknown generic type match".to_string(),
	))
}

/// Substitute recorded aliases into `ty`, instantiating generic classes
/// whose arguments become fully concrete.
pub fn resolve_generic_type_aliases(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	ty: TypeId,
	aliases: &[MatchData],
) -> AnalyzeResult<TypeId> {
	if !ctx.types[ty].is_generic || aliases.is_empty() {
		return Ok(ty);
	}

	if let TypeKind::Generic { alias } = &ctx.types[ty].kind {
		if alias == "generic" {
			return Ok(ty);
		}

		for existing in aliases {
			if existing.name == *alias {
				return Ok(existing.ty);
			}
		}

		return Ok(ty);
	}

	if let Some(target) = ctx.types[ty].ref_target() {
		let resolved = resolve_generic_type_aliases(ctx, span, target, aliases)?;

		return Ok(ctx.get_reference_type(resolved));
	}

	if let Some((elem, length)) = ctx.types[ty].array_elem() {
		let resolved = resolve_generic_type_aliases(ctx, span, elem, aliases)?;

		return Ok(ctx.get_array_type(resolved, length));
	}

	if let Some(elem) = ctx.types[ty].unsized_elem() {
		let resolved = resolve_generic_type_aliases(ctx, span, elem, aliases)?;

		return Ok(ctx.get_unsized_array_type(resolved));
	}

	if ctx.types[ty].is_function() {
		let (return_type, arguments) = {
			let (ret, args) = ctx.types[ty].function_parts().unwrap();
			(ret, args.to_vec())
		};

		let resolved_return = resolve_generic_type_aliases(ctx, span, return_type, aliases)?;

		let mut resolved_arguments = Vec::new();

		for argument in arguments {
			resolved_arguments.push(resolve_generic_type_aliases(ctx, span, argument, aliases)?);
		}

		return Ok(ctx.get_function_type(resolved_return, resolved_arguments));
	}

	if let TypeKind::GenericClassInstance { proto, arguments } = &ctx.types[ty].kind {
		let proto = *proto;
		let arguments = arguments.clone();

		let mut is_generic = false;
		let mut resolved_arguments = Vec::new();

		for argument in arguments {
			let resolved = resolve_generic_type_aliases(ctx, span, argument, aliases)?;

			is_generic |= ctx.types[resolved].is_generic;

			resolved_arguments.push(resolved);
		}

		if is_generic {
			let argument_names: Vec<&str> = resolved_arguments
				.iter()
				.map(|arg| ctx.types[*arg].name.as_str())
				.collect();

			let name =
				names::generic_class_type_name(&ctx.types[proto].name, &argument_names);

			let entry = TypeEntry {
				name_hash: string_hash(&name),
				name,
				size: 0,
				alignment: 0,
				padding: 0,
				is_generic: true,
				imported: false,
				source: span,
				members: Vec::new(),
				constants: Vec::new(),
				kind: TypeKind::GenericClassInstance {
					proto,
					arguments: resolved_arguments,
				},
			};

			let id = ctx.types.len();

			ctx.types.push(entry);

			return Ok(id);
		}

		return create_generic_type_instance(ctx, span, proto, resolved_arguments);
	}

	Err(ctx.error(
		span,
		CompileErrorKind::GenericInstantiation,
		"unknown generic type resolve".to_string(),
	))
}

fn match_argument_type(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	expected_type: TypeId,
	actual_type: TypeId,
	actual_value: Option<&Expr>,
	aliases: &mut Vec<MatchData>,
) -> AnalyzeResult<Option<TypeId>> {
	let mut actual_type = actual_type;

	if ctx.types[actual_type].is_generic {
		if ctx.types[expected_type].is_function() {
			if let Some(value) = actual_value {
				let value = value.clone();

				if let Some(best) = get_function_for_type(ctx, span, &value, expected_type)? {
					actual_type = ctx.functions[best.function].ty;
				}
			}
		}

		if ctx.types[actual_type].is_generic {
			return Ok(None);
		}
	}

	match_generic_type(ctx, span, expected_type, actual_type, aliases, actual_value.is_none())
}

/// Compute the concrete `Function` type a generic candidate would have for
/// these arguments, by re-entering its definition scope and evaluating each
/// declared formal type under the alias bindings.
pub fn get_generic_function_instance_type(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	parent_type: Option<TypeId>,
	function: FunctionId,
	arguments: &[ArgumentData],
	aliases: &mut Vec<MatchData>,
) -> AnalyzeResult<Option<TypeId>> {
	debug_assert_eq!(ctx.functions[function].arguments.len(), arguments.len());

	let original_scope = ctx.scope;
	let function_scope = ctx.functions[function].scope;
	let function_source = ctx.functions[function].source;

	ctx.switch_to_scope_at_point(None, function_scope, Some(function_source))?;

	let mut types = Vec::new();

	let definition = ctx.functions[function].definition.clone();

	match definition {
		FunctionSyntax::Full(syntax) => {
			let added_parent_scope =
				crate::frontend::restore_parent_type_scope(ctx, span, parent_type)?;

			// Expose earlier arguments while later formal types are evaluated
			ctx.push_temporary_scope();

			for (pos, argument) in syntax.arguments.iter().enumerate() {
				let expected_type = match analyze_type_with_failure(ctx, &argument.ty, true)? {
					Some(ty) => ty,
					None => break,
				};

				let actual = &arguments[pos];

				let matched = if expected_type == ctx.builtin.auto_ {
					Some(actual.ty)
				} else {
					match_argument_type(
						ctx,
						argument.span,
						expected_type,
						actual.ty,
						actual.value.as_ref(),
						aliases,
					)?
				};

				let matched = match matched {
					Some(ty) => ty,
					None => break,
				};

				let name_hash = string_hash(&argument.name);

				ctx.add_variable(VariableData {
					source: argument.span,
					scope: ctx.scope,
					ty: matched,
					name: argument.name.clone(),
					name_hash,
					alignment: 0,
					offset: 0,
					unique_id: ctx.unique_variable_id,
					is_reference: false,
					imported: false,
				});
				ctx.unique_variable_id += 1;

				types.push(matched);
			}

			ctx.pop_scope(None)?;

			if added_parent_scope {
				ctx.pop_scope(None)?;
			}
		}
		FunctionSyntax::Short(_) | FunctionSyntax::None => {
			if ctx.functions[function].imported {
				return Err(ctx.error(
					span,
					CompileErrorKind::GenericInstantiation,
					"imported generic function call is not supported".to_string(),
				));
			}

			let formals = ctx.functions[function].arguments.clone();

			for (formal, actual) in formals.iter().zip(arguments.iter()) {
				let matched = match_argument_type(
					ctx,
					formal.source,
					formal.ty,
					actual.ty,
					actual.value.as_ref(),
					aliases,
				)?;

				let matched = match matched {
					Some(ty) => ty,
					None => {
						ctx.switch_to_scope_at_point(
							Some(function_source),
							original_scope,
							None,
						)?;

						return Ok(None);
					}
				};

				types.push(matched);
			}
		}
	}

	ctx.switch_to_scope_at_point(Some(function_source), original_scope, None)?;

	if types.len() != arguments.len() {
		return Ok(None);
	}

	let (return_type, _) = ctx.types[ctx.functions[function].ty]
		.function_parts()
		.unwrap();

	Ok(Some(ctx.get_function_type(return_type, types)))
}

fn function_select_error(
	ctx: &ExpressionContext,
	span: SourceSpan,
	header: &str,
	function_name: Option<&str>,
	functions: &[FunctionValue],
	arguments: &[ArgumentData],
	ratings: &[u32],
	best_rating: u32,
) -> CompileError {
	let mut message = String::from(header);

	if let Some(name) = function_name {
		message.push_str(&format!("\n  {}(", name));

		for (idx, argument) in arguments.iter().enumerate() {
			if idx != 0 {
				message.push_str(", ");
			}

			message.push_str(ctx.type_name(argument.ty));
		}

		message.push(')');
	}

	message.push_str(if best_rating == RATING_INCOMPATIBLE {
		"\n the only available are:"
	} else {
		"\n candidates are:"
	});

	for (idx, candidate) in functions.iter().enumerate() {
		if !ratings.is_empty() && ratings[idx] != best_rating {
			continue;
		}

		let function = &ctx.functions[candidate.function];
		let (return_type, argument_types) = ctx.types[function.ty]
			.function_parts()
			.map(|(ret, args)| (ret, args.to_vec()))
			.unwrap_or((ctx.builtin.void_, Vec::new()));

		message.push_str(&format!(
			"\n  {} {}(",
			ctx.type_name(return_type),
			function.name
		));

		for (arg_idx, argument) in function.arguments.iter().enumerate() {
			if arg_idx != 0 {
				message.push_str(", ");
			}

			if argument.is_explicit {
				message.push_str("explicit ");
			}

			let shown = argument_types
				.get(arg_idx)
				.copied()
				.unwrap_or(argument.ty);

			message.push_str(ctx.type_name(shown));
		}

		message.push(')');
	}

	CompileError::new(span, CompileErrorKind::OverloadSelection, message)
}

/// Rate every candidate and pick the best one. Concrete candidates win
/// rating ties against generic ones; losing generic candidates are hidden
/// from subsequent ambiguity reporting.
pub fn select_best_function(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	functions: &[FunctionValue],
	generics: &[TypeId],
	arguments: &[ArgumentData],
	ratings: &mut Vec<u32>,
) -> AnalyzeResult<Option<FunctionValue>> {
	ratings.clear();
	ratings.resize(functions.len(), RATING_INCOMPATIBLE);

	let mut best_rating = RATING_INCOMPATIBLE;
	let mut best_function: Option<FunctionValue> = None;

	let mut best_generic_rating = RATING_INCOMPATIBLE;
	let mut best_generic_function: Option<FunctionValue> = None;

	for (idx, candidate) in functions.iter().enumerate() {
		let function = candidate.function;

		if ctx.functions[function].generics.len() != generics.len() {
			ratings[idx] = RATING_INCOMPATIBLE;
			continue;
		}

		if !generics.is_empty() {
			let mut mismatch = false;

			for (formal, actual) in ctx.functions[function].generics.iter().zip(generics.iter()) {
				if !ctx.types[formal.ty].is_generic && formal.ty != *actual {
					mismatch = true;
					break;
				}
			}

			if mismatch {
				ratings[idx] = RATING_INCOMPATIBLE;
				continue;
			}
		}

		let formals = ctx.functions[function].arguments.clone();

		let result =
			match prepare_arguments_for_function_call(ctx, &formals, arguments, false)? {
				Some(result) => result,
				None => {
					ratings[idx] = RATING_INCOMPATIBLE;
					continue;
				}
			};

		let function_type = ctx.functions[function].ty;

		ratings[idx] = get_function_rating(ctx, function, function_type, &result)?;

		if ratings[idx] == RATING_INCOMPATIBLE {
			continue;
		}

		if ctx.is_generic_function(function) {
			let parent_type = generic_call_parent_type(ctx, candidate);

			let mut aliases: Vec<MatchData> = ctx.functions[function]
				.generics
				.iter()
				.zip(generics.iter())
				.map(|(formal, actual)| MatchData {
					name: formal.name.clone(),
					ty: *actual,
				})
				.collect();

			let instance = get_generic_function_instance_type(
				ctx,
				span,
				parent_type,
				function,
				&result,
				&mut aliases,
			)?;

			let instance = match instance {
				Some(instance) => instance,
				None => {
					ratings[idx] = RATING_INCOMPATIBLE;
					continue;
				}
			};

			ratings[idx] = get_function_rating(ctx, function, instance, &result)?;

			if ratings[idx] < best_generic_rating {
				best_generic_rating = ratings[idx];
				best_generic_function = Some(candidate.clone());
			}
		} else if ratings[idx] < best_rating {
			best_rating = ratings[idx];
			best_function = Some(candidate.clone());
		}
	}

	// Use a generic function only if it is better than the concrete pick
	if best_generic_rating < best_rating {
		best_function = best_generic_function;
	} else {
		for (idx, candidate) in functions.iter().enumerate() {
			if ctx.is_generic_function(candidate.function) {
				ratings[idx] = RATING_INCOMPATIBLE;
			}
		}
	}

	Ok(best_function)
}

fn generic_call_parent_type(
	ctx: &ExpressionContext,
	candidate: &FunctionValue,
) -> Option<TypeId> {
	let function_scope = ctx.functions[candidate.function].scope;

	if candidate.context.ty == ctx.builtin.auto_ref {
		if let ScopeOwner::Type(owner) = ctx.scopes[function_scope].owner {
			return Some(owner);
		}

		return None;
	}

	if let ScopeOwner::Type(_) = ctx.scopes[function_scope].owner {
		return ctx.types[candidate.context.ty].ref_target();
	}

	None
}

/// Instantiate a generic candidate for concrete arguments, memoized per
/// `(parent type, generics, function type)`.
pub fn create_generic_function_instance(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	proto: FunctionValue,
	generics: Vec<TypeId>,
	arguments: &[ArgumentData],
) -> AnalyzeResult<Option<FunctionValue>> {
	let function = proto.function;

	let formals = ctx.functions[function].arguments.clone();

	let result = prepare_arguments_for_function_call(ctx, &formals, arguments, false)?
		.expect("the candidate was already rated against these arguments");

	let parent_type = generic_call_parent_type(ctx, &proto);

	let mut aliases: Vec<MatchData> = ctx.functions[function]
		.generics
		.iter()
		.zip(generics.iter())
		.map(|(formal, actual)| MatchData {
			name: formal.name.clone(),
			ty: *actual,
		})
		.collect();

	let instance_type = get_generic_function_instance_type(
		ctx,
		span,
		parent_type,
		function,
		&result,
		&mut aliases,
	)?;

	let instance_type = match instance_type {
		Some(instance) => instance,
		None => {
			return Err(ctx.error(
				span,
				CompileErrorKind::GenericInstantiation,
				format!(
					"failed to instantiate generic function '{}'",
					ctx.functions[function].name
				),
			))
		}
	};

	debug_assert!(!ctx.types[instance_type].is_generic);

	// Search for an existing instance
	let instance_args = ctx.types[instance_type]
		.function_parts()
		.map(|(_, args)| args.to_vec())
		.unwrap();

	for i in 0..ctx.functions[function].instances.len() {
		let existing = ctx.functions[function].instances[i];

		let existing_scope = ctx.functions[existing].scope;
		let existing_parent = match ctx.scopes[existing_scope].owner {
			ScopeOwner::Type(owner) => Some(owner),
			_ => None,
		};

		if existing_parent != parent_type {
			continue;
		}

		let same_generics = ctx.functions[existing].generics.len() == generics.len()
			&& ctx.functions[existing]
				.generics
				.iter()
				.zip(generics.iter())
				.all(|(a, b)| a.ty == *b);

		if !generics.is_empty() && !same_generics {
			continue;
		}

		let existing_args = ctx.types[ctx.functions[existing].ty]
			.function_parts()
			.map(|(_, args)| args.to_vec())
			.unwrap();

		if existing_args != instance_args {
			continue;
		}

		return Ok(Some(FunctionValue {
			function: existing,
			context: proto.context,
		}));
	}

	// Switch to the original function scope and reanalyze the definition
	let original_scope = ctx.scope;
	let function_scope = ctx.functions[function].scope;
	let function_source = ctx.functions[function].source;

	ctx.switch_to_scope_at_point(None, function_scope, Some(function_source))?;

	let definition_syntax = ctx.functions[function].definition.clone();

	let definition = match definition_syntax {
		FunctionSyntax::Full(syntax) => crate::frontend::analyze_function_definition(
			ctx,
			&syntax,
			Some(instance_type),
			parent_type,
			aliases,
			false,
			false,
		),
		FunctionSyntax::Short(syntax) => {
			crate::frontend::analyze_short_function_definition(ctx, &syntax, instance_type)
				.map(|option| option.expect("instance type fits the short function"))
		}
		FunctionSyntax::None => Err(ctx.error(
			span,
			CompileErrorKind::GenericInstantiation,
			"imported generic function call is not supported".to_string(),
		)),
	};

	let definition = match definition {
		Ok(definition) => definition,
		Err(error) => {
			// Leave the scope stack in the caller's state even on failure
			let _ = ctx.switch_to_scope_at_point(Some(function_source), original_scope, None);

			return Err(error);
		}
	};

	ctx.switch_to_scope_at_point(Some(function_source), original_scope, None)?;

	let instance = match &definition.kind {
		ExprKind::FunctionDefinition { function, .. } => *function,
		_ => {
			return Err(ctx.error(
				span,
				CompileErrorKind::GenericInstantiation,
				format!(
					"failed to instantiate generic function '{}'",
					ctx.functions[function].name
				),
			))
		}
	};

	ctx.functions[instance].proto = Some(function);
	ctx.functions[function].instances.push(instance);

	let instance_scope = ctx.functions[instance].scope;

	let context = if !matches!(ctx.scopes[instance_scope].owner, ScopeOwner::Type(_)) {
		let access = create_function_context_access(ctx, span, instance)?;

		let access_type = access.ty;

		Expr::new(
			span,
			access_type,
			ExprKind::Sequence(vec![definition, access]),
		)
	} else {
		let context = proto.context;

		Expr::new(
			span,
			context.ty,
			ExprKind::Sequence(vec![definition, context]),
		)
	};

	Ok(Some(FunctionValue {
		function: instance,
		context,
	}))
}

// ----------------------------------------------------------------------
// Call construction
// ----------------------------------------------------------------------

pub fn create_function_call_by_name(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	name: &str,
	arguments: Vec<ArgumentData>,
	allow_failure: bool,
) -> AnalyzeResult<Option<Expr>> {
	if let Some(overloads) = create_variable_access_named(ctx, span, &[], name)? {
		if let Some(result) =
			create_function_call_with_value(ctx, span, overloads, arguments, allow_failure)?
		{
			return Ok(Some(result));
		}
	}

	if !allow_failure {
		return Err(ctx.error(
			span,
			CompileErrorKind::NameResolution,
			format!("unknown identifier '{}'", name),
		));
	}

	Ok(None)
}

pub fn create_function_call_1(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	name: &str,
	arg0: Expr,
	allow_failure: bool,
) -> AnalyzeResult<Option<Expr>> {
	let arguments = vec![ArgumentData::unnamed(arg0.span, arg0.ty, arg0)];

	create_function_call_by_name(ctx, span, name, arguments, allow_failure)
}

pub fn create_function_call_2(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	name: &str,
	arg0: Expr,
	arg1: Expr,
	allow_failure: bool,
) -> AnalyzeResult<Option<Expr>> {
	let arguments = vec![
		ArgumentData::unnamed(arg0.span, arg0.ty, arg0),
		ArgumentData::unnamed(arg1.span, arg1.ty, arg1),
	];

	create_function_call_by_name(ctx, span, name, arguments, allow_failure)
}

pub fn create_function_call_3(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	name: &str,
	arg0: Expr,
	arg1: Expr,
	arg2: Expr,
	allow_failure: bool,
) -> AnalyzeResult<Option<Expr>> {
	let arguments = vec![
		ArgumentData::unnamed(arg0.span, arg0.ty, arg0),
		ArgumentData::unnamed(arg1.span, arg1.ty, arg1),
		ArgumentData::unnamed(arg2.span, arg2.ty, arg2),
	];

	create_function_call_by_name(ctx, span, name, arguments, allow_failure)
}

pub fn create_function_call_with_value(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	value: Expr,
	arguments: Vec<ArgumentData>,
	allow_failure: bool,
) -> AnalyzeResult<Option<Expr>> {
	let functions = get_node_functions(ctx, span, &value)?;

	create_function_call_resolved(ctx, span, value, functions, Vec::new(), arguments, allow_failure)
}

/// Analyze call-site argument syntax against a candidate set. Short-form
/// function literals are typed against each candidate's matching parameter.
pub fn create_function_call_with_syntax_args(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	value: Expr,
	functions: Vec<FunctionValue>,
	generics: Vec<TypeId>,
	argument_syntax: &[SynCallArgument],
	allow_failure: bool,
) -> AnalyzeResult<Option<Expr>> {
	let mut arguments: Vec<ArgumentData> = Vec::new();

	for el in argument_syntax {
		if functions.is_empty() && el.name.is_some() {
			return Err(ctx.error(
				span,
				CompileErrorKind::OverloadSelection,
				"function argument names are unknown at this point".to_string(),
			));
		}

		let argument = if let SynValue::ShortFunctionDefinition(node) = &el.value.v {
			let mut options: Vec<Expr> = Vec::new();

			if functions.is_empty() {
				if let Some(option) = analyze_short_function_definition_for_argument(
					ctx,
					node,
					value.ty,
					&arguments,
				)? {
					options.push(option);
				}
			} else {
				for candidate in &functions {
					let candidate_type = ctx.functions[candidate.function].ty;

					if let Some(option) = analyze_short_function_definition_for_argument(
						ctx,
						node,
						candidate_type,
						&arguments,
					)? {
						if !options.iter().any(|existing| existing.ty == option.ty) {
							options.push(option);
						}
					}
				}
			}

			if options.is_empty() {
				return Err(ctx.error(
					span,
					CompileErrorKind::OverloadSelection,
					format!(
						"cannot find function which accepts a function with {} argument(s) as an argument #{}",
						node.parameters.len(),
						arguments.len() + 1
					),
				));
			}

			if options.len() == 1 {
				options.pop().unwrap()
			} else {
				let mut types = Vec::new();
				let mut overloads = Vec::new();

				for option in &options {
					let function = match &option.kind {
						ExprKind::FunctionDefinition { function, .. } => *function,
						ExprKind::GenericFunctionPrototype(function) => *function,
						_ => unreachable!("short function analysis yields definitions"),
					};

					types.push(option.ty);
					overloads.push(function);
				}

				let type_names: Vec<&str> =
					types.iter().map(|ty| ctx.types[*ty].name.as_str()).collect();

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

				let void_ref = ctx.get_reference_type(ctx.builtin.void_);

				Expr::new(
					span,
					set_type,
					ExprKind::FunctionOverloadSet {
						functions: overloads,
						context: Some(Box::new(Expr::new(
							span,
							void_ref,
							ExprKind::NullptrLiteral,
						))),
					},
				)
			}
		} else {
			crate::frontend::analyze_expression(ctx, &el.value)?
		};

		arguments.push(ArgumentData {
			source: el.span,
			is_explicit: false,
			name: el.name.clone(),
			ty: argument.ty,
			value: Some(argument),
		});
	}

	create_function_call_resolved(ctx, span, value, functions, generics, arguments, allow_failure)
}

pub fn create_function_call_resolved(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	value: Expr,
	functions: Vec<FunctionValue>,
	generics: Vec<TypeId>,
	arguments: Vec<ArgumentData>,
	allow_failure: bool,
) -> AnalyzeResult<Option<Expr>> {
	let mut value = value;
	let mut call_type = if ctx.types[value.ty].is_function() {
		Some(value.ty)
	} else {
		None
	};

	let mut actual_arguments = Vec::new();

	if !functions.is_empty() {
		let mut ratings = Vec::new();

		let best_overload =
			select_best_function(ctx, span, &functions, &generics, &arguments, &mut ratings)?;

		let mut best_overload = match best_overload {
			Some(best) => best,
			None => {
				if allow_failure {
					return Ok(None);
				}

				// auto ref -> type cast through a call-shaped conversion
				if let ExprKind::TypeLiteral(target) = &value.kind {
					if arguments.len() == 1
						&& arguments[0].ty == ctx.builtin.auto_ref
						&& arguments[0].name.is_none()
					{
						let target = *target;
						let argument = arguments.into_iter().next().unwrap();

						return Ok(Some(create_cast(
							ctx,
							span,
							argument.value.unwrap(),
							target,
							true,
						)?));
					}
				}

				let name = ctx.functions[functions[0].function].name.clone();

				return Err(function_select_error(
					ctx,
					span,
					"can't find function with following parameters:",
					Some(name.as_str()),
					&functions,
					&arguments,
					&ratings,
					RATING_INCOMPATIBLE,
				));
			}
		};

		let mut best_rating = RATING_INCOMPATIBLE;

		for (idx, candidate) in functions.iter().enumerate() {
			if candidate.function == best_overload.function {
				best_rating = ratings[idx];
			}
		}

		for (idx, candidate) in functions.iter().enumerate() {
			if candidate.function != best_overload.function && ratings[idx] == best_rating {
				let name = ctx.functions[functions[0].function].name.clone();

				return Err(function_select_error(
					ctx,
					span,
					"ambiguity, there is more than one overloaded function available for the call:",
					Some(name.as_str()),
					&functions,
					&arguments,
					&ratings,
					best_rating,
				));
			}
		}

		if ctx.is_generic_function(best_overload.function) {
			best_overload =
				match create_generic_function_instance(ctx, span, best_overload, generics, &arguments)? {
					Some(instance) => instance,
					None => return Ok(None),
				};
		}

		let function = best_overload.function;
		let function_type = ctx.functions[function].ty;

		call_type = Some(function_type);

		if best_overload.context.ty == ctx.builtin.auto_ref {
			// Runtime dispatch through the method's virtual table
			let table = get_function_table(ctx, span, function);

			let redirected = create_function_call_2(
				ctx,
				span,
				"__redirect",
				best_overload.context,
				table,
				false,
			)?
			.expect("__redirect is supplied by the base module");

			value = Expr::new(
				span,
				function_type,
				ExprKind::TypeCast {
					value: Box::new(redirected),
					cast: crate::frontend::CastKind::Reinterpret,
				},
			);
		} else {
			value = Expr::new(
				span,
				function_type,
				ExprKind::FunctionAccess {
					function,
					context: Box::new(best_overload.context),
				},
			);
		}

		let formals = ctx.functions[function].arguments.clone();

		let result = prepare_arguments_for_function_call(ctx, &formals, &arguments, true)?
			.expect("the selected overload accepts these arguments");

		for argument in result {
			actual_arguments.push(argument.value.unwrap());
		}
	} else if let Some(function_type) = call_type {
		let formal_types = ctx.types[function_type]
			.function_parts()
			.map(|(_, args)| args.to_vec())
			.unwrap();

		let function_arguments: Vec<ArgumentData> = formal_types
			.iter()
			.map(|ty| ArgumentData {
				source: span,
				is_explicit: false,
				name: None,
				ty: *ty,
				value: None,
			})
			.collect();

		let result =
			prepare_arguments_for_function_call(ctx, &function_arguments, &arguments, true)?;

		let result = match result {
			Some(result) => result,
			None => {
				if allow_failure {
					return Ok(None);
				}

				let mut message = if arguments.len() != function_arguments.len() {
					format!(
						"function expects {} argument(s), while {} are supplied",
						function_arguments.len(),
						arguments.len()
					)
				} else {
					"there is no conversion from specified arguments and the ones that function accepts".to_string()
				};

				message.push_str("\n\tExpected: (");

				for (idx, formal) in function_arguments.iter().enumerate() {
					if idx != 0 {
						message.push_str(", ");
					}

					message.push_str(ctx.type_name(formal.ty));
				}

				message.push_str(")\n\tProvided: (");

				for (idx, argument) in arguments.iter().enumerate() {
					if idx != 0 {
						message.push_str(", ");
					}

					message.push_str(ctx.type_name(argument.ty));
				}

				message.push(')');

				return Err(ctx.error(span, CompileErrorKind::OverloadSelection, message));
			}
		};

		for argument in result {
			actual_arguments.push(argument.value.unwrap());
		}
	} else if let ExprKind::TypeLiteral(target) = &value.kind {
		// auto ref -> type cast
		if arguments.len() == 1
			&& arguments[0].ty == ctx.builtin.auto_ref
			&& arguments[0].name.is_none()
		{
			let target = *target;
			let argument = arguments.into_iter().next().unwrap();

			return Ok(Some(create_cast(ctx, span, argument.value.unwrap(), target, true)?));
		}

		return Err(ctx.error(
			span,
			CompileErrorKind::OverloadSelection,
			"unknown call".to_string(),
		));
	} else {
		return Err(ctx.error(
			span,
			CompileErrorKind::OverloadSelection,
			"unknown call".to_string(),
		));
	}

	let call_type = call_type.expect("call type is resolved by now");

	if ctx.types[call_type].is_generic {
		return Err(ctx.error(
			span,
			CompileErrorKind::GenericInstantiation,
			"generic function call is not supported".to_string(),
		));
	}

	let (return_type, formal_types) = {
		let (ret, args) = ctx.types[call_type].function_parts().unwrap();
		(ret, args.to_vec())
	};

	if return_type == ctx.builtin.auto_ {
		return Err(ctx.error(
			span,
			CompileErrorKind::TypeMismatch,
			"function can't return auto".to_string(),
		));
	}

	debug_assert_eq!(actual_arguments.len(), formal_types.len());

	Ok(Some(Expr::new(
		span,
		return_type,
		ExprKind::FunctionCall {
			function: Box::new(value),
			arguments: actual_arguments,
		},
	)))
}
