use std::rc::Rc;

use crate::frontend::{
	allocate_class_member, allocate_temporary, analyze_alignment, analyze_expression,
	analyze_function_definition, analyze_statement, analyze_type, create_array_index,
	create_assignment, create_binary_op, create_cast, create_condition_cast,
	create_function_call_1, create_function_call_3, create_function_call_resolved,
	create_function_call_with_value, create_member_access, create_unary_op,
	create_variable_access_named, evaluate, evaluate_integer, get_node_functions,
	import_module_by_path, names, string_hash, AliasData, AnalyzeResult, ArgumentData, CastKind,
	CompileError, CompileErrorKind, ConstValue, ConstantData, Expr, ExprKind, ExpressionContext,
	FunctionData, FunctionSyntax, MatchData, ModuleProvider, NamespaceData, ScopeOwner,
	SourceSpan, Syn, SynBinaryOpType, SynClassDefinition, SynClassElements, SynClassStaticIf,
	SynConstantSet, SynEnumValue, SynForEachIterator, SynFunctionDefinition, SynSwitchCase,
	SynUnaryOpType, SynValue, TypeEntry, TypeId, TypeKind, VariableData, VariableId,
	MAX_GENERIC_INSTANCE_DEPTH,
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
// Control flow
// ----------------------------------------------------------------------

pub fn analyze_if_else(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	static_if: bool,
	condition: &Syn,
	true_block: &Syn,
	false_block: Option<&Syn>,
) -> AnalyzeResult<Expr> {
	if static_if {
		let condition_value = analyze_expression(ctx, condition)?;
		let condition_value = create_condition_cast(ctx, condition.span, condition_value)?;

		let bool_ = ctx.builtin.bool_;
		let condition_value = create_cast(ctx, condition.span, condition_value, bool_, false)?;

		let chosen = match evaluate_integer(ctx, &condition_value) {
			Some(value) => value != 0,
			None => {
				return Err(err(
					ctx,
					condition.span,
					CompileErrorKind::ConstantEvaluation,
					"can't get condition value".to_string(),
				))
			}
		};

		if chosen {
			return analyze_statement(ctx, true_block);
		}

		if let Some(false_block) = false_block {
			return analyze_statement(ctx, false_block);
		}

		return Ok(Expr::new(span, ctx.builtin.void_, ExprKind::Void));
	}

	let condition = {
		let value = analyze_expression(ctx, condition)?;

		create_condition_cast(ctx, condition.span, value)?
	};

	let true_block = analyze_statement(ctx, true_block)?;

	let false_block = match false_block {
		Some(false_block) => Some(Box::new(analyze_statement(ctx, false_block)?)),
		None => None,
	};

	Ok(Expr::new(
		span,
		ctx.builtin.void_,
		ExprKind::IfElse {
			condition: Box::new(condition),
			true_block: Box::new(true_block),
			false_block,
		},
	))
}

pub fn analyze_for(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	initializer: Option<&Syn>,
	condition: &Syn,
	increment: Option<&Syn>,
	body: Option<&Syn>,
) -> AnalyzeResult<Expr> {
	ctx.push_loop_scope();

	let void_ = ctx.builtin.void_;

	let initializer = match initializer {
		Some(initializer) => analyze_statement(ctx, initializer)?,
		None => Expr::new(span, void_, ExprKind::Void),
	};

	let condition = {
		let value = analyze_expression(ctx, condition)?;

		create_condition_cast(ctx, condition.span, value)?
	};

	let increment = match increment {
		Some(increment) => analyze_statement(ctx, increment)?,
		None => Expr::new(span, void_, ExprKind::Void),
	};

	let body = match body {
		Some(body) => analyze_statement(ctx, body)?,
		None => Expr::new(span, void_, ExprKind::Void),
	};

	ctx.pop_scope(Some(span))?;

	Ok(Expr::new(
		span,
		void_,
		ExprKind::For {
			initializer: Box::new(initializer),
			condition: Box::new(condition),
			increment: Box::new(increment),
			body: Box::new(body),
		},
	))
}

/// For-each picks one of three strategies per iterator: a counted loop for
/// built-in arrays, direct coroutine iteration for argument-less function
/// values, or the `.start()` / `.hasnext()` / `.next()` protocol.
pub fn analyze_for_each(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	iterators: &[SynForEachIterator],
	body: Option<&Syn>,
) -> AnalyzeResult<Expr> {
	ctx.push_loop_scope();

	let void_ = ctx.builtin.void_;
	let int_ = ctx.builtin.int_;

	let mut initializers = Vec::new();
	let mut conditions = Vec::new();
	let mut definitions = Vec::new();
	let mut increments = Vec::new();

	for curr in iterators {
		let value = analyze_expression(ctx, &curr.value)?;

		let mut ty = match &curr.ty {
			Some(ty) => Some(analyze_type(ctx, ty)?),
			None => None,
		};

		// Built-in arrays expand to a counted loop over their size
		if ctx.types[value.ty].is_array() || ctx.types[value.ty].is_unsized_array() {
			if ty.is_none() {
				ty = ctx.types[value.ty]
					.array_elem()
					.map(|(elem, _)| elem)
					.or_else(|| ctx.types[value.ty].unsized_elem());
			}

			let elem_type = ty.unwrap();

			let iterator = allocate_temporary(ctx, curr.span, int_);

			let iterator_access = Expr::new(curr.span, int_, ExprKind::VariableAccess(iterator));
			let zero = Expr::new(curr.span, int_, ExprKind::IntegerLiteral(0));
			let iterator_assignment = create_assignment(ctx, curr.span, iterator_access, zero)?;

			initializers.push(Expr::new(
				curr.span,
				void_,
				ExprKind::VariableDefinition {
					variable: iterator,
					initializer: Some(Box::new(iterator_assignment)),
				},
			));

			let iterator_access = Expr::new(curr.span, int_, ExprKind::VariableAccess(iterator));

			let size = create_member_access(ctx, curr.span, value.clone(), "size", false)?
				.expect("arrays expose a size member");

			conditions.push(create_binary_op(
				ctx,
				curr.span,
				SynBinaryOpType::Less,
				iterator_access,
				size,
			)?);

			// The loop variable is a reference into the sequence
			let ref_type = ctx.get_reference_type(elem_type);

			let alignment = ctx.types[ref_type].alignment;
			let size = ctx.types[ref_type].size;
			let offset = ctx.allocate_in_scope(alignment, size);

			let unique_id = ctx.unique_variable_id;
			ctx.unique_variable_id += 1;

			let name_hash = string_hash(&curr.name);

			let variable = ctx.add_variable(VariableData {
				source: curr.span,
				scope: ctx.scope,
				ty: ref_type,
				name: curr.name.clone(),
				name_hash,
				alignment,
				offset,
				unique_id,
				is_reference: true,
				imported: false,
			});

			let iterator_access = Expr::new(curr.span, int_, ExprKind::VariableAccess(iterator));

			let arguments = vec![ArgumentData::unnamed(curr.span, int_, iterator_access)];

			let element = create_array_index(ctx, curr.span, value, arguments)?;

			let element_address = match element.kind {
				ExprKind::Dereference(inner) => *inner,
				_ => unreachable!("array indexing yields a dereference"),
			};

			let variable_access =
				Expr::new(curr.span, ref_type, ExprKind::VariableAccess(variable));

			let assignment =
				create_assignment(ctx, curr.span, variable_access, element_address)?;

			definitions.push(Expr::new(
				curr.span,
				void_,
				ExprKind::VariableDefinition {
					variable,
					initializer: Some(Box::new(assignment)),
				},
			));

			let int_ref = ctx.get_reference_type(int_);

			increments.push(Expr::new(
				curr.span,
				int_,
				ExprKind::PreModify {
					value: Box::new(Expr::new(
						curr.span,
						int_ref,
						ExprKind::GetAddress(iterator),
					)),
					is_increment: true,
				},
			));

			continue;
		}

		let mut value = value;

		let mut function_type = if ctx.types[value.ty].is_function() {
			Some(value.ty)
		} else {
			None
		};

		let mut start_call = None;

		// Not a function value; fetch an iterator object
		if function_type.is_none() {
			let start = create_member_access(ctx, curr.span, value.clone(), "start", false)?
				.expect("member access reports its own failure");

			let functions = get_node_functions(ctx, curr.span, &start)?;

			let call = create_function_call_resolved(
				ctx,
				curr.span,
				start,
				functions,
				Vec::new(),
				Vec::new(),
				false,
			)?
			.expect("call resolution reports its own failure");

			if ctx.types[call.ty].is_function() {
				function_type = Some(call.ty);
				value = call;
			} else {
				start_call = Some(call);
			}
		}

		if let Some(function_type) = function_type {
			// Coroutine iteration
			let funct_ptr = allocate_temporary(ctx, curr.span, value.ty);

			let funct_access =
				Expr::new(curr.span, value.ty, ExprKind::VariableAccess(funct_ptr));

			let value_type = value.ty;
			let assignment = create_assignment(ctx, curr.span, funct_access, value.clone())?;

			initializers.push(Expr::new(
				curr.span,
				void_,
				ExprKind::VariableDefinition {
					variable: funct_ptr,
					initializer: Some(Box::new(assignment)),
				},
			));

			if let ExprKind::FunctionAccess { function, .. } = &value.kind {
				if !ctx.functions[*function].coroutine {
					return Err(err(
						ctx,
						curr.span,
						CompileErrorKind::FlowError,
						"function is not a coroutine".to_string(),
					));
				}
			} else {
				let funct_access =
					Expr::new(curr.span, value_type, ExprKind::VariableAccess(funct_ptr));

				let assert_call = create_function_call_1(
					ctx,
					curr.span,
					"__assertCoroutine",
					funct_access,
					false,
				)?
				.expect("__assertCoroutine is supplied by the base module");

				initializers.push(assert_call);
			}

			let (return_type, _) = ctx.types[function_type].function_parts().unwrap();

			let elem_type = ty.unwrap_or(return_type);

			let alignment = ctx.types[elem_type].alignment;
			let size = ctx.types[elem_type].size;
			let offset = ctx.allocate_in_scope(alignment, size);

			let unique_id = ctx.unique_variable_id;
			ctx.unique_variable_id += 1;

			let name_hash = string_hash(&curr.name);

			let variable = ctx.add_variable(VariableData {
				source: curr.span,
				scope: ctx.scope,
				ty: elem_type,
				name: curr.name.clone(),
				name_hash,
				alignment,
				offset,
				unique_id,
				is_reference: false,
				imported: false,
			});

			let make_call = |ctx: &mut ExpressionContext| -> AnalyzeResult<Expr> {
				let funct_access =
					Expr::new(curr.span, value_type, ExprKind::VariableAccess(funct_ptr));

				let mut call = create_function_call_with_value(
					ctx,
					curr.span,
					funct_access,
					Vec::new(),
					false,
				)?
				.expect("call resolution reports its own failure");

				let elem_ref = ctx.get_reference_type(elem_type);

				if call.ty == elem_ref {
					call = Expr::new(curr.span, elem_type, ExprKind::Dereference(Box::new(call)));
				}

				Ok(call)
			};

			let call = make_call(ctx)?;

			let variable_access =
				Expr::new(curr.span, elem_type, ExprKind::VariableAccess(variable));

			let assignment = create_assignment(ctx, curr.span, variable_access, call)?;

			definitions.push(Expr::new(
				curr.span,
				void_,
				ExprKind::VariableDefinition {
					variable,
					initializer: Some(Box::new(assignment)),
				},
			));

			// The coroutine runs dry when its context resets
			let funct_access =
				Expr::new(curr.span, value_type, ExprKind::VariableAccess(funct_ptr));

			let reset_call = create_function_call_1(
				ctx,
				curr.span,
				"isCoroutineReset",
				funct_access,
				false,
			)?
			.expect("isCoroutineReset is supplied by the base module");

			conditions.push(create_unary_op(
				ctx,
				curr.span,
				SynUnaryOpType::LogicalNot,
				reset_call,
			)?);

			let call = make_call(ctx)?;

			let variable_access =
				Expr::new(curr.span, elem_type, ExprKind::VariableAccess(variable));

			increments.push(create_assignment(ctx, curr.span, variable_access, call)?);

			continue;
		}

		// Iterator object protocol
		let start_call = start_call.unwrap();

		let iterator = allocate_temporary(ctx, curr.span, start_call.ty);
		let iterator_type = start_call.ty;

		let iterator_access =
			Expr::new(curr.span, iterator_type, ExprKind::VariableAccess(iterator));

		let assignment = create_assignment(ctx, curr.span, iterator_access, start_call)?;

		initializers.push(Expr::new(
			curr.span,
			void_,
			ExprKind::VariableDefinition {
				variable: iterator,
				initializer: Some(Box::new(assignment)),
			},
		));

		let call_method = |ctx: &mut ExpressionContext, name: &str| -> AnalyzeResult<Expr> {
			let iterator_access =
				Expr::new(curr.span, iterator_type, ExprKind::VariableAccess(iterator));

			let access = create_member_access(ctx, curr.span, iterator_access, name, false)?
				.expect("member access reports its own failure");

			let functions = get_node_functions(ctx, curr.span, &access)?;

			create_function_call_resolved(
				ctx,
				curr.span,
				access,
				functions,
				Vec::new(),
				Vec::new(),
				false,
			)
			.map(|result| result.expect("call resolution reports its own failure"))
		};

		conditions.push(call_method(ctx, "hasnext")?);

		let call = call_method(ctx, "next")?;

		let elem_type = ty.unwrap_or(call.ty);

		let alignment = ctx.types[elem_type].alignment;
		let size = ctx.types[elem_type].size;
		let offset = ctx.allocate_in_scope(alignment, size);

		let unique_id = ctx.unique_variable_id;
		ctx.unique_variable_id += 1;

		let name_hash = string_hash(&curr.name);

		let is_reference = curr.ty.is_none() && ctx.types[elem_type].is_ref();

		let variable = ctx.add_variable(VariableData {
			source: curr.span,
			scope: ctx.scope,
			ty: elem_type,
			name: curr.name.clone(),
			name_hash,
			alignment,
			offset,
			unique_id,
			is_reference,
			imported: false,
		});

		let elem_ref = ctx.get_reference_type(elem_type);

		let call = if call.ty == elem_ref {
			Expr::new(curr.span, elem_type, ExprKind::Dereference(Box::new(call)))
		} else {
			call
		};

		let variable_access = Expr::new(curr.span, elem_type, ExprKind::VariableAccess(variable));

		let assignment = create_assignment(ctx, curr.span, variable_access, call)?;

		definitions.push(Expr::new(
			curr.span,
			void_,
			ExprKind::VariableDefinition {
				variable,
				initializer: Some(Box::new(assignment)),
			},
		));
	}

	let initializer = Expr::new(span, void_, ExprKind::Block(initializers));

	let mut condition: Option<Expr> = None;

	for curr in conditions {
		condition = Some(match condition {
			None => curr,
			Some(prev) => {
				create_binary_op(ctx, span, SynBinaryOpType::LogicalAnd, prev, curr)?
			}
		});
	}

	let condition = condition.expect("for-each has at least one iterator");

	let increment = Expr::new(span, void_, ExprKind::Block(increments));

	if let Some(body) = body {
		definitions.push(analyze_statement(ctx, body)?);
	}

	let body = Expr::new(span, void_, ExprKind::Block(definitions));

	ctx.pop_scope(Some(span))?;

	Ok(Expr::new(
		span,
		void_,
		ExprKind::For {
			initializer: Box::new(initializer),
			condition: Box::new(condition),
			increment: Box::new(increment),
			body: Box::new(body),
		},
	))
}

pub fn analyze_while(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	condition: &Syn,
	body: Option<&Syn>,
) -> AnalyzeResult<Expr> {
	ctx.push_loop_scope();

	let void_ = ctx.builtin.void_;

	let condition = {
		let value = analyze_expression(ctx, condition)?;

		create_condition_cast(ctx, condition.span, value)?
	};

	let body = match body {
		Some(body) => analyze_statement(ctx, body)?,
		None => Expr::new(span, void_, ExprKind::Void),
	};

	ctx.pop_scope(Some(span))?;

	Ok(Expr::new(
		span,
		void_,
		ExprKind::While {
			condition: Box::new(condition),
			body: Box::new(body),
		},
	))
}

pub fn analyze_do_while(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	expressions: &[Box<Syn>],
	condition: &Syn,
) -> AnalyzeResult<Expr> {
	ctx.push_loop_scope();

	let void_ = ctx.builtin.void_;

	let mut body = Vec::new();

	for expression in expressions {
		body.push(analyze_statement(ctx, expression)?);
	}

	let condition = {
		let value = analyze_expression(ctx, condition)?;

		create_condition_cast(ctx, condition.span, value)?
	};

	ctx.pop_scope(Some(span))?;

	Ok(Expr::new(
		span,
		void_,
		ExprKind::DoWhile {
			body: Box::new(Expr::new(span, void_, ExprKind::Block(body))),
			condition: Box::new(condition),
		},
	))
}

pub fn analyze_switch(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	condition: &Syn,
	cases: &[SynSwitchCase],
) -> AnalyzeResult<Expr> {
	ctx.push_loop_scope();

	let void_ = ctx.builtin.void_;

	let condition_value = analyze_expression(ctx, condition)?;

	let condition_variable = allocate_temporary(ctx, span, condition_value.ty);
	let condition_type = condition_value.ty;

	let access = Expr::new(
		condition.span,
		condition_type,
		ExprKind::VariableAccess(condition_variable),
	);

	let assignment = create_assignment(ctx, condition.span, access, condition_value)?;

	let condition_definition = Expr::new(
		condition.span,
		void_,
		ExprKind::VariableDefinition {
			variable: condition_variable,
			initializer: Some(Box::new(assignment)),
		},
	);

	let mut case_conditions = Vec::new();
	let mut case_blocks = Vec::new();
	let mut default_block = None;

	for case in cases {
		if let Some(value) = &case.value {
			let case_value = analyze_expression(ctx, value)?;

			let access = Expr::new(
				value.span,
				condition_type,
				ExprKind::VariableAccess(condition_variable),
			);

			case_conditions.push(create_binary_op(
				ctx,
				value.span,
				SynBinaryOpType::Equal,
				case_value,
				access,
			)?);
		}

		let mut expressions = Vec::new();

		for expression in &case.expressions {
			expressions.push(analyze_statement(ctx, expression)?);
		}

		let block = Expr::new(span, void_, ExprKind::Block(expressions));

		if case.value.is_some() {
			case_blocks.push(block);
		} else {
			if default_block.is_some() {
				return Err(err(
					ctx,
					case.span,
					CompileErrorKind::FlowError,
					"default switch case is already defined".to_string(),
				));
			}

			default_block = Some(Box::new(block));
		}
	}

	ctx.pop_scope(Some(span))?;

	Ok(Expr::new(
		span,
		void_,
		ExprKind::Switch {
			condition: Box::new(condition_definition),
			cases: case_conditions,
			blocks: case_blocks,
			default_block,
		},
	))
}

fn analyze_loop_depth(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	number: Option<&Syn>,
	keyword: &str,
) -> AnalyzeResult<u32> {
	let depth = match number {
		Some(number) => {
			let value = analyze_expression(ctx, number)?;
			let long_ = ctx.builtin.long_;
			let value = create_cast(ctx, number.span, value, long_, false)?;

			match evaluate_integer(ctx, &value) {
				Some(depth) => {
					if depth <= 0 {
						return Err(err(
							ctx,
							number.span,
							CompileErrorKind::FlowError,
							format!("{} level can't be negative or zero", keyword),
						));
					}

					depth
				}
				None => {
					return Err(err(
						ctx,
						number.span,
						CompileErrorKind::ConstantEvaluation,
						format!("{} statement must be followed by ';' or a constant", keyword),
					))
				}
			}
		}
		None => 1,
	};

	// Count loop scopes up to the function boundary
	let mut loop_depth = 0i64;
	let mut curr = Some(ctx.scope);

	while let Some(scope) = curr {
		if matches!(
			ctx.scopes[scope].owner,
			ScopeOwner::Function(_) | ScopeOwner::Type(_)
		) {
			break;
		}

		loop_depth += ctx.scopes[scope].loop_depth as i64;

		curr = ctx.scopes[scope].parent;
	}

	if loop_depth < depth {
		return Err(err(
			ctx,
			span,
			CompileErrorKind::FlowError,
			format!("{} level is greater that loop depth", keyword),
		));
	}

	Ok(depth as u32)
}

pub fn analyze_break(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	number: Option<&Syn>,
) -> AnalyzeResult<Expr> {
	let depth = analyze_loop_depth(ctx, span, number, "break")?;

	Ok(Expr::new(span, ctx.builtin.void_, ExprKind::Break(depth)))
}

pub fn analyze_continue(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	number: Option<&Syn>,
) -> AnalyzeResult<Expr> {
	let depth = analyze_loop_depth(ctx, span, number, "continue")?;

	Ok(Expr::new(span, ctx.builtin.void_, ExprKind::Continue(depth)))
}

pub fn analyze_return(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	value: Option<&Syn>,
) -> AnalyzeResult<Expr> {
	let void_ = ctx.builtin.void_;

	let result = match value {
		Some(value) => analyze_expression(ctx, value)?,
		None => Expr::new(span, void_, ExprKind::Void),
	};

	if let Some(function) = ctx.get_current_function() {
		let (mut return_type, current_args) = {
			let (ret, args) = ctx.types[ctx.functions[function].ty].function_parts().unwrap();
			(ret, args.to_vec())
		};

		// An auto return type latches onto the first returned value
		if return_type == ctx.builtin.auto_ {
			if ctx.types[result.ty].is_generic {
				return Err(err(
					ctx,
					span,
					CompileErrorKind::TypeMismatch,
					"generic return type is not supported".to_string(),
				));
			}

			return_type = result.ty;

			ctx.functions[function].ty = ctx.get_function_type(return_type, current_args);
		}

		let (final_return, _) = ctx.types[ctx.functions[function].ty].function_parts().unwrap();

		let result = create_cast(ctx, span, result, final_return, false)?;

		if return_type == void_ && result.ty != void_ {
			return Err(err(
				ctx,
				span,
				CompileErrorKind::FlowError,
				"'void' function returning a value".to_string(),
			));
		}

		if return_type != void_ && result.ty == void_ {
			return Err(err(
				ctx,
				span,
				CompileErrorKind::FlowError,
				format!(
					"function must return a value of type '{}'",
					ctx.type_name(return_type)
				),
			));
		}

		ctx.functions[function].has_explicit_return = true;

		return Ok(Expr::new(span, void_, ExprKind::Return(Box::new(result))));
	}

	if !ctx.is_numeric_type(result.ty) && !ctx.types[result.ty].is_enum() {
		return Err(err(
			ctx,
			span,
			CompileErrorKind::FlowError,
			format!("global return cannot accept '{}'", ctx.type_name(result.ty)),
		));
	}

	Ok(Expr::new(span, void_, ExprKind::Return(Box::new(result))))
}

pub fn analyze_yield(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	value: Option<&Syn>,
) -> AnalyzeResult<Expr> {
	let void_ = ctx.builtin.void_;

	let result = match value {
		Some(value) => analyze_expression(ctx, value)?,
		None => Expr::new(span, void_, ExprKind::Void),
	};

	let function = match ctx.get_current_function() {
		Some(function) => function,
		None => {
			return Err(err(
				ctx,
				span,
				CompileErrorKind::FlowError,
				"global yield is not allowed".to_string(),
			))
		}
	};

	if !ctx.functions[function].coroutine {
		return Err(err(
			ctx,
			span,
			CompileErrorKind::FlowError,
			"yield can only be used inside a coroutine".to_string(),
		));
	}

	let (mut return_type, current_args) = {
		let (ret, args) = ctx.types[ctx.functions[function].ty].function_parts().unwrap();
		(ret, args.to_vec())
	};

	if return_type == ctx.builtin.auto_ {
		return_type = result.ty;

		ctx.functions[function].ty = ctx.get_function_type(return_type, current_args);
	}

	let (final_return, _) = ctx.types[ctx.functions[function].ty].function_parts().unwrap();

	let result = create_cast(ctx, span, result, final_return, false)?;

	if return_type == void_ && result.ty != void_ {
		return Err(err(
			ctx,
			span,
			CompileErrorKind::FlowError,
			"'void' function returning a value".to_string(),
		));
	}

	if return_type != void_ && result.ty == void_ {
		return Err(err(
			ctx,
			span,
			CompileErrorKind::FlowError,
			format!(
				"function must return a value of type '{}'",
				ctx.type_name(return_type)
			),
		));
	}

	ctx.functions[function].has_explicit_return = true;

	Ok(Expr::new(span, void_, ExprKind::Yield(Box::new(result))))
}

// ----------------------------------------------------------------------
// Classes
// ----------------------------------------------------------------------

/// Memoized instantiation of a generic class prototype for concrete
/// argument types; reanalyzes the prototype's definition syntax at its
/// original scope point.
pub fn create_generic_type_instance(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	proto: TypeId,
	types: Vec<TypeId>,
) -> AnalyzeResult<TypeId> {
	let argument_names: Vec<&str> = types.iter().map(|ty| ctx.types[*ty].name.as_str()).collect();

	let class_name = names::generic_class_type_name(&ctx.types[proto].name, &argument_names);
	let class_hash = string_hash(&class_name);

	if let Some(existing) = ctx.generic_type_map.get(&class_hash) {
		return Ok(*existing);
	}

	let (definition, proto_scope, proto_source) = match &ctx.types[proto].kind {
		TypeKind::GenericClassProto {
			definition, scope, ..
		} => (definition.clone(), *scope, ctx.types[proto].source),
		_ => {
			return Err(err(
				ctx,
				span,
				CompileErrorKind::GenericInstantiation,
				format!("'{}' is not a generic class", ctx.type_name(proto)),
			))
		}
	};

	let original_scope = ctx.scope;

	ctx.switch_to_scope_at_point(None, proto_scope, Some(proto_source))?;

	let result = analyze_class_definition(ctx, &definition, Some(proto), types);

	let result = match result {
		Ok(result) => result,
		Err(error) => {
			let _ = ctx.switch_to_scope_at_point(Some(proto_source), original_scope, None);

			return Err(error);
		}
	};

	ctx.switch_to_scope_at_point(Some(proto_source), original_scope, None)?;

	if let ExprKind::ClassDefinition { class, .. } = &result.kind {
		let class = *class;

		if let TypeKind::GenericClassProto { instances, .. } = &mut ctx.types[proto].kind {
			instances.push(class);
		}

		return Ok(class);
	}

	Err(err(
		ctx,
		span,
		CompileErrorKind::GenericInstantiation,
		format!("type '{}' couldn't be instantiated", ctx.type_name(proto)),
	))
}

pub fn analyze_class_definition(
	ctx: &mut ExpressionContext,
	syntax: &Rc<SynClassDefinition>,
	proto: Option<TypeId>,
	generics: Vec<TypeId>,
) -> AnalyzeResult<Expr> {
	let span = syntax.span;

	let type_name = ctx.name_in_scope(&syntax.name);

	// First sight of a parameterized class registers the prototype only,
	// remembering the scope point for later reanalysis
	if proto.is_none() && !syntax.aliases.is_empty() {
		let name_hash = string_hash(&type_name);

		let proto_type = ctx.add_type(TypeEntry {
			name: type_name,
			name_hash,
			size: 0,
			alignment: 0,
			padding: 0,
			is_generic: true,
			imported: false,
			source: span,
			members: Vec::new(),
			constants: Vec::new(),
			kind: TypeKind::GenericClassProto {
				definition: syntax.clone(),
				scope: ctx.scope,
				instances: Vec::new(),
			},
		});

		return Ok(Expr::new(
			span,
			ctx.builtin.void_,
			ExprKind::GenericClassPrototype(proto_type),
		));
	}

	debug_assert_eq!(generics.len(), syntax.aliases.len());

	let class_name = if generics.is_empty() {
		type_name
	} else {
		let argument_names: Vec<&str> = generics
			.iter()
			.map(|ty| ctx.types[*ty].name.as_str())
			.collect();

		names::generic_class_type_name(&ctx.types[proto.unwrap()].name, &argument_names)
	};

	let class_hash = string_hash(&class_name);

	if ctx.type_map.find(class_hash).is_some() {
		return Err(err(
			ctx,
			span,
			CompileErrorKind::NameResolution,
			format!("'{}' is being redefined", syntax.name),
		));
	}

	if !generics.is_empty() && ctx.generic_class_instantiation_depth() > MAX_GENERIC_INSTANCE_DEPTH
	{
		return Err(err(
			ctx,
			span,
			CompileErrorKind::GenericInstantiation,
			format!(
				"reached maximum generic type instance depth ({})",
				MAX_GENERIC_INSTANCE_DEPTH
			),
		));
	}

	let alignment = match &syntax.align {
		Some(align) => analyze_alignment(ctx, align)?,
		None => 0,
	};

	let actual_generics: Vec<MatchData> = syntax
		.aliases
		.iter()
		.zip(generics.iter())
		.map(|(name, ty)| MatchData {
			name: name.clone(),
			ty: *ty,
		})
		.collect();

	let base_class = match &syntax.base_class {
		Some(base_syntax) => {
			// Generic arguments are visible while naming the base
			ctx.push_temporary_scope();

			for el in &actual_generics {
				let unique_id = ctx.unique_alias_id;
				ctx.unique_alias_id += 1;

				let name_hash = string_hash(&el.name);

				ctx.add_alias(AliasData {
					source: span,
					scope: ctx.scope,
					ty: el.ty,
					name: el.name.clone(),
					name_hash,
					unique_id,
					imported: false,
				});
			}

			let base = analyze_type(ctx, base_syntax);

			ctx.pop_scope(Some(span))?;

			let base = base?;

			let extendable = ctx.types[base]
				.class()
				.map(|class| class.extendable)
				.unwrap_or(false);

			if !extendable {
				return Err(err(
					ctx,
					span,
					CompileErrorKind::TypeMismatch,
					format!("type '{}' is not extendable", ctx.type_name(base)),
				));
			}

			Some(base)
		}
		None => None,
	};

	let extendable = syntax.extendable || base_class.is_some();

	let class_type = ctx.add_type(TypeEntry {
		name: class_name,
		name_hash: class_hash,
		size: 0,
		alignment: 0,
		padding: 0,
		is_generic: false,
		imported: false,
		source: span,
		members: Vec::new(),
		constants: Vec::new(),
		kind: TypeKind::Class(crate::frontend::ClassData {
			base_class,
			proto,
			generics: actual_generics.clone(),
			aliases: Vec::new(),
			extendable,
			completed: false,
			type_scope: None,
		}),
	});

	if !generics.is_empty() {
		ctx.generic_type_map.insert(class_hash, class_type);
	}

	let type_scope = ctx.push_scope(ScopeOwner::Type(class_type));

	if let Some(class) = ctx.types[class_type].class_mut() {
		class.type_scope = Some(type_scope);
	}

	for el in &actual_generics {
		let unique_id = ctx.unique_alias_id;
		ctx.unique_alias_id += 1;

		let name_hash = string_hash(&el.name);

		ctx.add_alias(AliasData {
			source: span,
			scope: ctx.scope,
			ty: el.ty,
			name: el.name.clone(),
			name_hash,
			unique_id,
			imported: false,
		});
	}

	// An extendable base reserves a hidden type id slot at offset zero
	if extendable && base_class.is_none() {
		let typeid_ = ctx.builtin.typeid_;

		let member = allocate_class_member(ctx, span, typeid_, "$typeid".to_string());

		ctx.types[class_type].members.push(member);
	}

	if let Some(base_class) = base_class {
		// Members keep their base-class offsets
		ctx.types[class_type].alignment = ctx.types[base_class].alignment;

		let base_aliases = ctx.types[base_class]
			.class()
			.map(|class| class.aliases.clone())
			.unwrap_or_default();

		for el in base_aliases {
			let unique_id = ctx.unique_alias_id;
			ctx.unique_alias_id += 1;

			let name_hash = string_hash(&el.name);

			ctx.add_alias(AliasData {
				source: span,
				scope: ctx.scope,
				ty: el.ty,
				name: el.name.clone(),
				name_hash,
				unique_id,
				imported: false,
			});

			if let Some(class) = ctx.types[class_type].class_mut() {
				class.aliases.push(el);
			}
		}

		let base_members = ctx.types[base_class].members.clone();

		for el in base_members {
			let member_type = ctx.variables[el].ty;
			let member_name = ctx.variables[el].name.clone();

			let member = allocate_class_member(ctx, span, member_type, member_name);

			debug_assert_eq!(ctx.variables[member].offset, ctx.variables[el].offset);

			ctx.types[class_type].members.push(member);
		}

		let base_constants = ctx.types[base_class].constants.clone();

		ctx.types[class_type].constants.extend(base_constants);
	}

	if syntax.align.is_some() {
		ctx.types[class_type].alignment = alignment;
	}

	let mut functions = Vec::new();

	let elements_result =
		analyze_class_elements(ctx, span, class_type, &syntax.elements, &mut functions);

	ctx.pop_scope(Some(span))?;

	elements_result?;

	if let Some(class) = ctx.types[class_type].class_mut() {
		class.completed = true;
	}

	Ok(Expr::new(
		span,
		ctx.builtin.void_,
		ExprKind::ClassDefinition {
			class: class_type,
			functions,
		},
	))
}

fn analyze_class_elements(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	class_type: TypeId,
	elements: &SynClassElements,
	functions: &mut Vec<Expr>,
) -> AnalyzeResult<()> {
	for type_def in &elements.typedefs {
		if let SynValue::Typedef { alias, ty } = &type_def.v {
			let target = analyze_type(ctx, ty)?;

			let unique_id = ctx.unique_alias_id;
			ctx.unique_alias_id += 1;

			let name_hash = string_hash(alias);

			ctx.add_alias(AliasData {
				source: type_def.span,
				scope: ctx.scope,
				ty: target,
				name: alias.clone(),
				name_hash,
				unique_id,
				imported: false,
			});

			if let Some(class) = ctx.types[class_type].class_mut() {
				class.aliases.push(MatchData {
					name: alias.clone(),
					ty: target,
				});
			}
		}
	}

	for member in &elements.members {
		let definitions = analyze_statement(ctx, member)?;

		if let ExprKind::VariableDefinitions(definitions) = &definitions.kind {
			for definition in definitions {
				if let ExprKind::VariableDefinition {
					variable,
					initializer,
				} = &definition.kind
				{
					if initializer.is_some() {
						return Err(err(
							ctx,
							definition.span,
							CompileErrorKind::TypeMismatch,
							"member can't have an initializer".to_string(),
						));
					}

					ctx.types[class_type].members.push(*variable);
				}
			}
		}
	}

	ctx.finalize_alignment(class_type)?;

	for constant_set in &elements.constants {
		let ty = analyze_type(ctx, &constant_set.ty)?;

		analyze_class_constants(ctx, class_type, ty, constant_set)?;
	}

	for function in &elements.functions {
		functions.push(analyze_function_definition(
			ctx,
			function,
			None,
			None,
			Vec::new(),
			false,
			false,
		)?);
	}

	for accessor in &elements.accessors {
		// Accessors desugar into '$'-suffixed getter and setter methods
		let parent_type = Syn::new(
			accessor.span,
			SynValue::TypeSimple {
				path: Vec::new(),
				name: ctx.types[class_type].name.clone(),
			},
		);

		let getter = Rc::new(SynFunctionDefinition {
			span: accessor.span,
			parent_type: Some(parent_type.clone()),
			prototype: false,
			coroutine: false,
			accessor: true,
			is_operator: false,
			name: accessor.name.clone(),
			aliases: Vec::new(),
			return_type: accessor.ty.clone(),
			arguments: Vec::new(),
			expressions: accessor.get_block.clone(),
		});

		functions.push(analyze_function_definition(
			ctx,
			&getter,
			None,
			None,
			Vec::new(),
			false,
			false,
		)?);

		if let Some(set_block) = &accessor.set_block {
			let setter = Rc::new(SynFunctionDefinition {
				span: accessor.span,
				parent_type: Some(parent_type),
				prototype: false,
				coroutine: false,
				accessor: true,
				is_operator: false,
				name: accessor.name.clone(),
				aliases: Vec::new(),
				return_type: Syn::new(accessor.span, SynValue::TypeAuto),
				arguments: vec![crate::frontend::SynFunctionArgument {
					span: accessor.span,
					is_explicit: false,
					name: accessor
						.set_name
						.clone()
						.unwrap_or_else(|| "r".to_string()),
					ty: accessor.ty.clone(),
					default: None,
				}],
				expressions: set_block.clone(),
			});

			functions.push(analyze_function_definition(
				ctx,
				&setter,
				None,
				None,
				Vec::new(),
				false,
				false,
			)?);
		}
	}

	for static_if in &elements.static_ifs {
		analyze_class_static_if(ctx, span, class_type, static_if, functions)?;
	}

	Ok(())
}

fn analyze_class_static_if(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	class_type: TypeId,
	syntax: &SynClassStaticIf,
	functions: &mut Vec<Expr>,
) -> AnalyzeResult<()> {
	let condition = analyze_expression(ctx, &syntax.condition)?;
	let condition = create_condition_cast(ctx, syntax.span, condition)?;

	let bool_ = ctx.builtin.bool_;
	let condition = create_cast(ctx, syntax.span, condition, bool_, false)?;

	match evaluate(ctx, &condition) {
		Some(ConstValue::Bool(true)) => {
			analyze_class_elements(ctx, span, class_type, &syntax.true_elements, functions)
		}
		Some(ConstValue::Bool(false)) => match &syntax.false_elements {
			Some(false_elements) => {
				analyze_class_elements(ctx, span, class_type, false_elements, functions)
			}
			None => Ok(()),
		},
		_ => Err(err(
			ctx,
			syntax.span,
			CompileErrorKind::ConstantEvaluation,
			"can't get condition value".to_string(),
		)),
	}
}

fn analyze_class_constants(
	ctx: &mut ExpressionContext,
	class_type: TypeId,
	ty: TypeId,
	syntax: &SynConstantSet,
) -> AnalyzeResult<()> {
	for (index, constant) in syntax.values.iter().enumerate() {
		let mut ty = ty;

		let value = if let Some(value_syntax) = &constant.initializer {
			let value = analyze_expression(ctx, value_syntax)?;

			if ty == ctx.builtin.auto_ {
				ty = value.ty;
			}

			if !ctx.is_numeric_type(ty) {
				return Err(err(
					ctx,
					constant.span,
					CompileErrorKind::ConstantEvaluation,
					"only basic numeric types can be used as constants".to_string(),
				));
			}

			let value = create_cast(ctx, constant.span, value, ty, false)?;

			evaluate(ctx, &value)
		} else if ctx.is_integer_type(ty) && index != 0 {
			// An integer constant list auto-increments by one
			let previous = ctx.types[class_type]
				.constants
				.last()
				.expect("an earlier constant exists");

			let last = crate::frontend::create_literal_copy(ctx, constant.span, previous);

			let one = Expr::new(constant.span, ty, ExprKind::IntegerLiteral(1));

			let next = create_binary_op(ctx, constant.span, SynBinaryOpType::Add, last, one)?;

			let next = create_cast(ctx, constant.span, next, ty, false)?;

			evaluate(ctx, &next)
		} else if index == 0 {
			return Err(err(
				ctx,
				constant.span,
				CompileErrorKind::ConstantEvaluation,
				"'=' not found after constant name".to_string(),
			));
		} else {
			return Err(err(
				ctx,
				constant.span,
				CompileErrorKind::ConstantEvaluation,
				"only integer constant list gets automatically incremented by 1".to_string(),
			));
		};

		let value = match value {
			Some(
				value @ (ConstValue::Bool(_)
				| ConstValue::Char(_)
				| ConstValue::Int(_)
				| ConstValue::Long(_)
				| ConstValue::Double(_)),
			) => value,
			_ => {
				return Err(err(
					ctx,
					constant.span,
					CompileErrorKind::ConstantEvaluation,
					"expression didn't evaluate to a constant number".to_string(),
				))
			}
		};

		ctx.types[class_type].constants.push(ConstantData {
			name: constant.name.clone(),
			ty,
			value,
		});
	}

	Ok(())
}

// ----------------------------------------------------------------------
// Enums, namespaces, typedefs
// ----------------------------------------------------------------------

fn create_enum_cast_function(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	name: String,
	from_type: TypeId,
	to_type: TypeId,
) -> AnalyzeResult<Expr> {
	let void_ref = {
		let void_ = ctx.builtin.void_;

		ctx.get_reference_type(void_)
	};

	let function_type = ctx.get_function_type(to_type, vec![from_type]);

	let name_hash = string_hash(&name);

	let argument = ArgumentData {
		source: span,
		is_explicit: false,
		name: Some("x".to_string()),
		ty: from_type,
		value: None,
	};

	let unique_id = ctx.unique_function_id;
	ctx.unique_function_id += 1;

	let function = ctx.add_function(FunctionData {
		source: span,
		scope: ctx.scope,
		function_scope: None,
		ty: function_type,
		context_type: void_ref,
		name,
		name_hash,
		generics: Vec::new(),
		aliases: Vec::new(),
		arguments: vec![argument.clone()],
		definition: FunctionSyntax::None,
		coroutine: false,
		accessor: false,
		is_operator: false,
		is_prototype: false,
		has_explicit_return: true,
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

	// Context argument
	let context_size = ctx.types[void_ref].size;
	let context_offset = ctx.allocate_in_scope(0, context_size);

	let context_unique_id = ctx.unique_variable_id;
	ctx.unique_variable_id += 1;

	let context_variable = ctx.add_variable(VariableData {
		source: span,
		scope: ctx.scope,
		ty: void_ref,
		name: "$context".to_string(),
		name_hash: string_hash("$context"),
		alignment: 0,
		offset: context_offset,
		unique_id: context_unique_id,
		is_reference: false,
		imported: false,
	});

	ctx.functions[function].context_argument = Some(context_variable);

	let context_definition = Expr::new(
		span,
		ctx.builtin.void_,
		ExprKind::VariableDefinition {
			variable: context_variable,
			initializer: None,
		},
	);

	// The single value argument
	let argument_size = ctx.types[from_type].size;
	let argument_offset = ctx.allocate_in_scope(0, argument_size);

	let argument_unique_id = ctx.unique_variable_id;
	ctx.unique_variable_id += 1;

	let argument_variable = ctx.add_variable(VariableData {
		source: span,
		scope: ctx.scope,
		ty: from_type,
		name: "x".to_string(),
		name_hash: string_hash("x"),
		alignment: 0,
		offset: argument_offset,
		unique_id: argument_unique_id,
		is_reference: false,
		imported: false,
	});

	let argument_definition = Expr::new(
		span,
		ctx.builtin.void_,
		ExprKind::VariableDefinition {
			variable: argument_variable,
			initializer: None,
		},
	);

	let access = Expr::new(span, from_type, ExprKind::VariableAccess(argument_variable));

	let converted = Expr::new(
		span,
		to_type,
		ExprKind::TypeCast {
			value: Box::new(access),
			cast: CastKind::Reinterpret,
		},
	);

	let body = vec![Expr::new(
		span,
		ctx.builtin.void_,
		ExprKind::Return(Box::new(converted)),
	)];

	ctx.pop_scope(None)?;

	ctx.definitions.push(function);

	Ok(Expr::new(
		span,
		function_type,
		ExprKind::FunctionDefinition {
			function,
			prototype: false,
			context_argument: Some(Box::new(context_definition)),
			arguments: vec![argument_definition],
			expressions: body,
			context_variable: None,
		},
	))
}

pub fn analyze_enum_definition(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	name: &str,
	values: &[SynEnumValue],
) -> AnalyzeResult<Expr> {
	let type_name = ctx.name_in_scope(name);
	let name_hash = string_hash(&type_name);

	let int_alignment = ctx.types[ctx.builtin.int_].alignment;

	let enum_type = ctx.add_type(TypeEntry {
		name: type_name.clone(),
		name_hash,
		size: 4,
		alignment: int_alignment,
		padding: 0,
		is_generic: false,
		imported: false,
		source: span,
		members: Vec::new(),
		constants: Vec::new(),
		kind: TypeKind::Enum,
	});

	// Enumeration constants, auto-incrementing from the previous one
	let mut last: Option<i64> = None;

	for value in values {
		let constant_value = match &value.value {
			Some(value_syntax) => {
				let int_ = ctx.builtin.int_;

				let expr = analyze_expression(ctx, value_syntax)?;
				let expr = create_cast(ctx, value.span, expr, int_, false)?;

				match evaluate_integer(ctx, &expr) {
					Some(result) => result,
					None => {
						return Err(err(
							ctx,
							value.span,
							CompileErrorKind::ConstantEvaluation,
							"expression didn't evaluate to a constant number".to_string(),
						))
					}
				}
			}
			None => match last {
				Some(last) => last + 1,
				None => 1,
			},
		};

		last = Some(constant_value);

		ctx.types[enum_type].constants.push(ConstantData {
			name: value.name.clone(),
			ty: enum_type,
			value: ConstValue::Int(constant_value as i32),
		});
	}

	// Conversion operators live at global scope
	let original_scope = ctx.scope;

	ctx.switch_to_scope_at_point(None, ctx.global_scope, None)?;

	let int_ = ctx.builtin.int_;

	let to_int = create_enum_cast_function(ctx, span, "int".to_string(), enum_type, int_);

	let to_int = match to_int {
		Ok(to_int) => to_int,
		Err(error) => {
			let _ = ctx.switch_to_scope_at_point(None, original_scope, None);

			return Err(error);
		}
	};

	let to_enum = create_enum_cast_function(ctx, span, type_name, int_, enum_type);

	let to_enum = match to_enum {
		Ok(to_enum) => to_enum,
		Err(error) => {
			let _ = ctx.switch_to_scope_at_point(None, original_scope, None);

			return Err(error);
		}
	};

	ctx.switch_to_scope_at_point(None, original_scope, None)?;

	Ok(Expr::new(
		span,
		ctx.builtin.void_,
		ExprKind::EnumDefinition {
			enum_type,
			to_int: Box::new(to_int),
			to_enum: Box::new(to_enum),
		},
	))
}

pub fn analyze_namespace_definition(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	name: &str,
	expressions: &[Box<Syn>],
) -> AnalyzeResult<Expr> {
	let at_global = ctx.scope == ctx.global_scope;
	let in_namespace = matches!(ctx.scopes[ctx.scope].owner, ScopeOwner::Namespace(_));

	if !at_global && !in_namespace {
		return Err(err(
			ctx,
			span,
			CompileErrorKind::NameResolution,
			"a namespace definition must appear either at file scope or immediately within another namespace definition"
				.to_string(),
		));
	}

	let parent = ctx.get_current_namespace();

	let full_name = match parent {
		Some(parent) => format!("{}.{}", ctx.namespaces[parent].full_name, name),
		None => name.to_string(),
	};

	let full_name_hash = string_hash(&full_name);

	let unique_id = ctx.unique_namespace_id;
	ctx.unique_namespace_id += 1;

	let namespace = ctx.add_namespace(NamespaceData {
		source: span,
		parent,
		name: name.to_string(),
		full_name,
		full_name_hash,
		unique_id,
	});

	ctx.push_scope(ScopeOwner::Namespace(namespace));

	let mut result = Vec::new();

	for expression in expressions {
		let statement = analyze_statement(ctx, expression);

		match statement {
			Ok(statement) => result.push(statement),
			Err(error) => {
				ctx.pop_scope(None)?;

				return Err(error);
			}
		}
	}

	// Namespace members stay accessible after the closing brace
	ctx.pop_scope(None)?;

	Ok(Expr::new(span, ctx.builtin.void_, ExprKind::Block(result)))
}

pub fn analyze_typedef(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	alias: &str,
	ty: &Syn,
) -> AnalyzeResult<Expr> {
	let target = analyze_type(ctx, ty)?;

	let unique_id = ctx.unique_alias_id;
	ctx.unique_alias_id += 1;

	let name_hash = string_hash(alias);

	let alias_id = ctx.add_alias(AliasData {
		source: span,
		scope: ctx.scope,
		ty: target,
		name: alias.to_string(),
		name_hash,
		unique_id,
		imported: false,
	});

	Ok(Expr::new(
		span,
		ctx.builtin.void_,
		ExprKind::AliasDefinition(crate::frontend::AliasDefinitionData { alias: alias_id }),
	))
}

// ----------------------------------------------------------------------
// Virtual tables
// ----------------------------------------------------------------------

/// Fill the virtual table for one method name: one slot per type, walking
/// the inheritance chain so derived classes fall back to base methods.
pub fn create_virtual_table_update(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	vtable: VariableId,
) -> AnalyzeResult<Expr> {
	let vtable_name = ctx.variables[vtable].name.clone();

	// $vtbl<10-digit type hash><method name>
	let type_name_hash: u32 = vtable_name[5..15].parse().map_err(|_| {
		err(
			ctx,
			span,
			CompileErrorKind::NameResolution,
			format!(
				"can't find function type for virtual function table '{}'",
				vtable_name
			),
		)
	})?;

	let method_name = vtable_name[15..].to_string();

	let function_type = ctx
		.types
		.iter()
		.position(|entry| entry.name_hash == type_name_hash && entry.is_function())
		.ok_or_else(|| {
			err(
				ctx,
				span,
				CompileErrorKind::NameResolution,
				format!(
					"can't find function type for virtual function table '{}'",
					vtable_name
				),
			)
		})?;

	let mut expressions = Vec::new();

	if !ctx.variables[vtable].imported {
		let int_ = ctx.builtin.int_;
		let typeid_ = ctx.builtin.typeid_;
		let function_id_type = ctx.builtin.function_id;

		let size = Expr::new(span, int_, ExprKind::IntegerLiteral(4));

		let type_count = create_variable_access_named(ctx, span, &[], "__typeCount")?;

		let type_count = type_count.ok_or_else(|| {
			err(
				ctx,
				span,
				CompileErrorKind::NameResolution,
				"unknown identifier '__typeCount'".to_string(),
			)
		})?;

		let count = create_function_call_with_value(ctx, span, type_count, Vec::new(), false)?
			.expect("__typeCount is supplied by the base module");

		let type_id = Expr::new(
			span,
			int_,
			ExprKind::TypeCast {
				value: Box::new(Expr::new(
					span,
					typeid_,
					ExprKind::TypeLiteral(function_id_type),
				)),
				cast: CastKind::Reinterpret,
			},
		);

		let call = create_function_call_3(ctx, span, "__newA", size, count, type_id, false)?
			.expect("__newA is supplied by the base module");

		let vtable_type = ctx.variables[vtable].ty;

		let alloc = Expr::new(
			span,
			vtable_type,
			ExprKind::TypeCast {
				value: Box::new(call),
				cast: CastKind::Reinterpret,
			},
		);

		let access = Expr::new(span, vtable_type, ExprKind::VariableAccess(vtable));
		let assignment = create_assignment(ctx, span, access, alloc)?;

		expressions.push(Expr::new(
			span,
			ctx.builtin.void_,
			ExprKind::VariableDefinition {
				variable: vtable,
				initializer: Some(Box::new(assignment)),
			},
		));

		ctx.register_existing_variable(vtable);
	}

	// Member functions with a matching name and type
	let mut implementations = Vec::new();

	for function in 0..ctx.functions.len() {
		let function_scope = ctx.functions[function].scope;

		let parent_type = match ctx.scopes[function_scope].owner {
			ScopeOwner::Type(parent) => parent,
			_ => continue,
		};

		if ctx.functions[function].imported {
			continue;
		}

		let name = &ctx.functions[function].name;

		let short_name = match name.split_once("::") {
			Some((_, short)) => short,
			None => continue,
		};

		if short_name == method_name && ctx.functions[function].ty == function_type {
			implementations.push((function, parent_type));
		}
	}

	for type_index in 0..ctx.types.len() {
		for (function, owner) in &implementations {
			let mut current: Option<TypeId> = Some(type_index);

			while let Some(ty) = current {
				if *owner == ty {
					let vtable_type = ctx.variables[vtable].ty;
					let int_ = ctx.builtin.int_;
					let typeid_ = ctx.builtin.typeid_;
					let function_id_type = ctx.builtin.function_id;

					let vtable_access =
						Expr::new(span, vtable_type, ExprKind::VariableAccess(vtable));

					let slot_index = Expr::new(
						span,
						int_,
						ExprKind::TypeCast {
							value: Box::new(Expr::new(
								span,
								typeid_,
								ExprKind::TypeLiteral(type_index),
							)),
							cast: CastKind::Reinterpret,
						},
					);

					let arguments = vec![ArgumentData::unnamed(span, int_, slot_index)];

					let slot = create_array_index(ctx, span, vtable_access, arguments)?;

					let function_index = Expr::new(
						span,
						function_id_type,
						ExprKind::FunctionIndexLiteral(*function),
					);

					expressions.push(create_assignment(ctx, span, slot, function_index)?);
					break;
				}

				current = ctx.types[ty].class().and_then(|class| class.base_class);
			}
		}
	}

	Ok(Expr::new(
		span,
		ctx.builtin.void_,
		ExprKind::Block(expressions),
	))
}

// ----------------------------------------------------------------------
// Module analysis
// ----------------------------------------------------------------------

fn register_intrinsic(
	ctx: &mut ExpressionContext,
	name: &str,
	return_type: TypeId,
	arguments: &[(&str, TypeId)],
) {
	let void_ref = {
		let void_ = ctx.builtin.void_;

		ctx.get_reference_type(void_)
	};

	let argument_types: Vec<TypeId> = arguments.iter().map(|(_, ty)| *ty).collect();
	let function_type = ctx.get_function_type(return_type, argument_types);

	let argument_data: Vec<ArgumentData> = arguments
		.iter()
		.map(|(name, ty)| ArgumentData {
			source: SourceSpan::default(),
			is_explicit: false,
			name: Some(name.to_string()),
			ty: *ty,
			value: None,
		})
		.collect();

	let unique_id = ctx.unique_function_id;
	ctx.unique_function_id += 1;

	ctx.add_function(FunctionData {
		source: SourceSpan::default(),
		scope: ctx.global_scope,
		function_scope: None,
		ty: function_type,
		context_type: void_ref,
		name: name.to_string(),
		name_hash: string_hash(name),
		generics: Vec::new(),
		aliases: Vec::new(),
		arguments: argument_data,
		definition: FunctionSyntax::None,
		coroutine: false,
		accessor: false,
		is_operator: false,
		is_prototype: false,
		has_explicit_return: true,
		imported: true,
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
}

/// Register the helper functions the analyzer generates calls to, for
/// embedders that run without a compiled base module. Importing a real
/// base module provides implementations under the same names.
pub fn install_base_intrinsics(ctx: &mut ExpressionContext) {
	let b = ctx.builtin;

	let void_ref = ctx.get_reference_type(b.void_);
	let auto_ref_array = ctx.get_unsized_array_type(b.auto_ref);
	let function_array = ctx.get_unsized_array_type(b.function_id);
	let compare_fn = ctx.get_function_type(b.void_, vec![b.int_]);

	register_intrinsic(ctx, "__newS", void_ref, &[("size", b.int_), ("type", b.int_)]);
	register_intrinsic(
		ctx,
		"__newA",
		b.auto_array,
		&[("size", b.int_), ("count", b.int_), ("type", b.int_)],
	);
	register_intrinsic(ctx, "duplicate", b.auto_ref, &[("obj", b.auto_ref)]);
	register_intrinsic(
		ctx,
		"__rcomp",
		b.int_,
		&[("a", b.auto_ref), ("b", b.auto_ref)],
	);
	register_intrinsic(
		ctx,
		"__rncomp",
		b.int_,
		&[("a", b.auto_ref), ("b", b.auto_ref)],
	);
	register_intrinsic(
		ctx,
		"__pcomp",
		b.int_,
		&[("a", compare_fn), ("b", compare_fn)],
	);
	register_intrinsic(
		ctx,
		"__pncomp",
		b.int_,
		&[("a", compare_fn), ("b", compare_fn)],
	);
	register_intrinsic(
		ctx,
		"__acomp",
		b.int_,
		&[("a", auto_ref_array), ("b", auto_ref_array)],
	);
	register_intrinsic(
		ctx,
		"__ancomp",
		b.int_,
		&[("a", auto_ref_array), ("b", auto_ref_array)],
	);
	register_intrinsic(
		ctx,
		"__aaassignrev",
		b.void_,
		&[("dst", b.auto_ref), ("src", b.auto_array)],
	);
	register_intrinsic(ctx, "isCoroutineReset", b.int_, &[("f", b.auto_ref)]);
	register_intrinsic(ctx, "__assertCoroutine", b.void_, &[("f", b.auto_ref)]);
	register_intrinsic(
		ctx,
		"assert_derived_from_base",
		void_ref,
		&[("derived", void_ref), ("base", b.typeid_)],
	);
	register_intrinsic(ctx, "__typeCount", b.int_, &[]);
	register_intrinsic(
		ctx,
		"__redirect",
		b.int_,
		&[("obj", b.auto_ref), ("table", function_array)],
	);
	register_intrinsic(
		ctx,
		"__redirect_ptr",
		b.int_,
		&[("obj", b.auto_ref), ("table", function_array)],
	);
	register_intrinsic(ctx, "__gen_list", b.auto_array, &[("f", b.auto_ref)]);
}

/// Analyze a parsed module: install imports, analyze top-level statements
/// and attach the virtual-table setup block.
pub fn analyze(
	ctx: &mut ExpressionContext,
	syntax: &Syn,
	provider: &dyn ModuleProvider,
) -> AnalyzeResult<Expr> {
	let (imports, expressions) = match &syntax.v {
		SynValue::Module {
			imports,
			expressions,
		} => (imports, expressions),
		_ => {
			return Err(err(
				ctx,
				syntax.span,
				CompileErrorKind::ImportError,
				"expected a module".to_string(),
			))
		}
	};

	// The base module provides allocation and dispatch helpers; without a
	// compiled one, fall back to intrinsic stubs
	if let Some(bytecode) = provider.bytecode("$base$.nc") {
		crate::frontend::import_module(ctx, syntax.span, &bytecode, "$base$.nc")?;
	} else {
		install_base_intrinsics(ctx);
	}

	ctx.base_module_function_count = ctx.functions.len();

	for import in imports {
		if let SynValue::ModuleImport { path } = &import.v {
			import_module_by_path(ctx, import.span, path, provider)?;
		}
	}

	let mut result = Vec::new();

	for expression in expressions {
		result.push(analyze_statement(ctx, expression)?);
	}

	let mut setup = Vec::new();

	for index in 0..ctx.vtables.len() {
		let vtable = ctx.vtables[index];

		setup.push(create_virtual_table_update(ctx, syntax.span, vtable)?);
	}

	let definitions = ctx.definitions.clone();

	Ok(Expr::new(
		syntax.span,
		ctx.builtin.void_,
		ExprKind::Module {
			global_scope: ctx.global_scope,
			expressions: result,
			setup,
			definitions,
		},
	))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::frontend::{NoModules, SynFunctionArgument, SynVariableDefinition};
	use crate::ir::{compile_module, verify_module, VmValueKind};

	fn sp(pos: u32) -> SourceSpan {
		SourceSpan::point(pos)
	}

	fn node(pos: u32, v: SynValue) -> Box<Syn> {
		Syn::new(sp(pos), v)
	}

	fn ident(pos: u32, name: &str) -> Box<Syn> {
		node(
			pos,
			SynValue::Identifier {
				name: name.to_string(),
			},
		)
	}

	fn num(pos: u32, text: &str) -> Box<Syn> {
		node(
			pos,
			SynValue::Number {
				value: text.to_string(),
				suffix: String::new(),
			},
		)
	}

	fn ty(pos: u32, name: &str) -> Box<Syn> {
		node(
			pos,
			SynValue::TypeSimple {
				path: Vec::new(),
				name: name.to_string(),
			},
		)
	}

	fn define(pos: u32, type_syntax: Box<Syn>, name: &str, initializer: Option<Box<Syn>>) -> Box<Syn> {
		node(
			pos,
			SynValue::VariableDefinitions {
				align: None,
				ty: type_syntax,
				definitions: vec![SynVariableDefinition {
					span: sp(pos),
					name: name.to_string(),
					initializer,
				}],
			},
		)
	}

	fn call(pos: u32, name: &str, arguments: Vec<Box<Syn>>) -> Box<Syn> {
		node(
			pos,
			SynValue::Call {
				value: ident(pos, name),
				generics: Vec::new(),
				arguments: arguments
					.into_iter()
					.map(|value| crate::frontend::SynCallArgument {
						span: value.span,
						name: None,
						value,
					})
					.collect(),
			},
		)
	}

	fn ret(pos: u32, value: Box<Syn>) -> Box<Syn> {
		node(pos, SynValue::Return { value: Some(value) })
	}

	fn binary(pos: u32, op: SynBinaryOpType, lhs: Box<Syn>, rhs: Box<Syn>) -> Box<Syn> {
		node(pos, SynValue::BinaryOp { op, lhs, rhs })
	}

	fn function(
		pos: u32,
		name: &str,
		coroutine: bool,
		return_type: Box<Syn>,
		arguments: Vec<(Box<Syn>, &str)>,
		expressions: Vec<Box<Syn>>,
	) -> Box<Syn> {
		node(
			pos,
			SynValue::FunctionDefinition(Rc::new(SynFunctionDefinition {
				span: sp(pos),
				parent_type: None,
				prototype: false,
				coroutine,
				accessor: false,
				is_operator: false,
				name: name.to_string(),
				aliases: Vec::new(),
				return_type,
				arguments: arguments
					.into_iter()
					.map(|(ty, name)| SynFunctionArgument {
						span: ty.span,
						is_explicit: false,
						name: name.to_string(),
						ty,
						default: None,
					})
					.collect(),
				expressions,
			})),
		)
	}

	fn run(expressions: Vec<Box<Syn>>) -> (ExpressionContext, AnalyzeResult<Expr>) {
		let mut ctx = ExpressionContext::new();

		let module = Syn::new(
			SourceSpan::default(),
			SynValue::Module {
				imports: Vec::new(),
				expressions,
			},
		);

		let result = analyze(&mut ctx, &module, &NoModules);

		(ctx, result)
	}

	fn find_function<'a>(
		ctx: &'a ExpressionContext,
		name: &str,
	) -> Vec<crate::frontend::FunctionId> {
		(0..ctx.functions.len())
			.filter(|f| ctx.functions[*f].name == name)
			.collect()
	}

	#[test]
	fn local_reference_round_trip() {
		// int a = 5; int ref b = &a; return *b;
		let (mut ctx, result) = run(vec![
			define(10, ty(10, "int"), "a", Some(num(11, "5"))),
			define(
				20,
				node(
					20,
					SynValue::TypeReference {
						inner: ty(20, "int"),
					},
				),
				"b",
				Some(node(
					21,
					SynValue::GetAddress {
						value: ident(21, "a"),
					},
				)),
			),
			ret(
				30,
				node(
					30,
					SynValue::Dereference {
						value: ident(30, "b"),
					},
				),
			),
		]);

		let module = result.expect("analysis succeeds");

		let ir = compile_module(&mut ctx, &module);

		verify_module(&ir).expect("ir invariants hold");

		// The top-level function ends in a return instruction
		let global = *ir.functions.last().unwrap();
		let blocks = ir.function(global).unwrap().blocks.clone();

		let has_return = blocks.iter().any(|block| {
			ir.block(*block)
				.unwrap()
				.instructions
				.iter()
				.any(|inst| ir.inst(*inst).unwrap().cmd == crate::ir::VmInstType::Return)
		});

		assert!(has_return);
	}

	#[test]
	fn generic_function_instances_and_memoization() {
		// auto f(x){ return x * 2; } return f(3) + f(2.5);
		let body = vec![ret(
			12,
			binary(12, SynBinaryOpType::Mul, ident(12, "x"), num(12, "2")),
		)];

		let (ctx, result) = run(vec![
			function(
				10,
				"f",
				false,
				node(10, SynValue::TypeAuto),
				vec![(node(10, SynValue::TypeGeneric { name: None }), "x")],
				body,
			),
			ret(
				20,
				binary(
					20,
					SynBinaryOpType::Add,
					call(20, "f", vec![num(20, "3")]),
					call(21, "f", vec![num(21, "2.5")]),
				),
			),
		]);

		result.expect("analysis succeeds");

		let prototypes = find_function(&ctx, "f");

		let proto = prototypes
			.iter()
			.copied()
			.find(|f| matches!(ctx.functions[*f].definition, FunctionSyntax::Full(_))
				&& !ctx.functions[*f].is_generic_instance)
			.expect("the generic prototype exists");

		let instances = &ctx.functions[proto].instances;

		assert_eq!(instances.len(), 2);

		let int_instance = ctx.functions[instances[0]].ty;
		let double_instance = ctx.functions[instances[1]].ty;

		let b = ctx.builtin;

		assert_eq!(
			ctx.types[int_instance].function_parts().unwrap(),
			(b.int_, &[b.int_][..])
		);
		assert_eq!(
			ctx.types[double_instance].function_parts().unwrap(),
			(b.double_, &[b.double_][..])
		);
	}

	#[test]
	fn generic_instances_are_memoized_per_argument_tuple() {
		// Two call sites with the same argument type share one instance
		let body = vec![ret(
			12,
			binary(12, SynBinaryOpType::Mul, ident(12, "x"), num(12, "2")),
		)];

		let (ctx, result) = run(vec![
			function(
				10,
				"f",
				false,
				node(10, SynValue::TypeAuto),
				vec![(node(10, SynValue::TypeGeneric { name: None }), "x")],
				body,
			),
			ret(
				20,
				binary(
					20,
					SynBinaryOpType::Add,
					call(20, "f", vec![num(20, "3")]),
					call(21, "f", vec![num(21, "4")]),
				),
			),
		]);

		result.expect("analysis succeeds");

		let proto = find_function(&ctx, "f")
			.into_iter()
			.find(|f| !ctx.functions[*f].is_generic_instance)
			.unwrap();

		assert_eq!(ctx.functions[proto].instances.len(), 1);
	}

	#[test]
	fn generic_class_instantiation() {
		// class P<T>{ T v; } P<int> p; p.v = 7; return p.v;
		let class_definition = node(
			10,
			SynValue::ClassDefinition(Rc::new(SynClassDefinition {
				span: sp(10),
				name: "P".to_string(),
				aliases: vec!["T".to_string()],
				extendable: false,
				base_class: None,
				align: None,
				elements: SynClassElements {
					members: vec![define(11, ty(11, "T"), "v", None)],
					..Default::default()
				},
			})),
		);

		let instance_type = node(
			20,
			SynValue::TypeGenericInstance {
				base: ty(20, "P"),
				arguments: vec![ty(20, "int")],
			},
		);

		let member = |pos: u32| {
			node(
				pos,
				SynValue::MemberAccess {
					value: ident(pos, "p"),
					member: "v".to_string(),
				},
			)
		};

		let (ctx, result) = run(vec![
			class_definition,
			define(20, instance_type, "p", None),
			node(
				30,
				SynValue::Assignment {
					lhs: member(30),
					rhs: num(30, "7"),
				},
			),
			ret(40, member(40)),
		]);

		result.expect("analysis succeeds");

		let prototypes = ctx
			.types
			.iter()
			.filter(|entry| matches!(entry.kind, TypeKind::GenericClassProto { .. }))
			.count();

		assert_eq!(prototypes, 1);

		let instances: Vec<usize> = (0..ctx.types.len())
			.filter(|t| ctx.types[*t].name == "P<int>")
			.collect();

		assert_eq!(instances.len(), 1);

		let instance = instances[0];

		assert_eq!(ctx.types[instance].size, 4);
		assert_eq!(ctx.types[instance].members.len(), 1);
	}

	#[test]
	fn generic_class_instances_are_interned() {
		let class_definition = node(
			10,
			SynValue::ClassDefinition(Rc::new(SynClassDefinition {
				span: sp(10),
				name: "P".to_string(),
				aliases: vec!["T".to_string()],
				extendable: false,
				base_class: None,
				align: None,
				elements: SynClassElements {
					members: vec![define(11, ty(11, "T"), "v", None)],
					..Default::default()
				},
			})),
		);

		let instance = |pos: u32| {
			node(
				pos,
				SynValue::TypeGenericInstance {
					base: ty(pos, "P"),
					arguments: vec![ty(pos, "int")],
				},
			)
		};

		let (ctx, result) = run(vec![
			class_definition,
			define(20, instance(20), "p", None),
			define(30, instance(30), "q", None),
		]);

		result.expect("analysis succeeds");

		let p = find_variable(&ctx, "p").unwrap();
		let q = find_variable(&ctx, "q").unwrap();

		assert_eq!(ctx.variables[p].ty, ctx.variables[q].ty);
	}

	fn find_variable(ctx: &ExpressionContext, name: &str) -> Option<crate::frontend::VariableId> {
		(0..ctx.variables.len()).find(|v| ctx.variables[*v].name == name)
	}

	#[test]
	fn for_each_over_array_literal() {
		// int[] a = { 1, 2, 3 }; int s = 0; for(x in a) s += x; return s;
		let unsized_int = node(
			10,
			SynValue::TypeArray {
				inner: ty(10, "int"),
				sizes: vec![node(10, SynValue::Nothing)],
			},
		);

		let literal = node(
			11,
			SynValue::ArrayLiteral {
				values: vec![num(11, "1"), num(11, "2"), num(11, "3")],
			},
		);

		let body = node(
			31,
			SynValue::ModifyAssignment {
				op: crate::frontend::SynModifyAssignType::Add,
				lhs: ident(31, "s"),
				rhs: ident(31, "x"),
			},
		);

		let for_each = node(
			30,
			SynValue::ForEach {
				iterators: vec![SynForEachIterator {
					span: sp(30),
					ty: None,
					name: "x".to_string(),
					value: ident(30, "a"),
				}],
				body: Some(body),
			},
		);

		let (mut ctx, result) = run(vec![
			define(10, unsized_int, "a", Some(literal)),
			define(20, ty(20, "int"), "s", Some(num(20, "0"))),
			for_each,
			ret(40, ident(40, "s")),
		]);

		let module = result.expect("analysis succeeds");

		let ir = compile_module(&mut ctx, &module);

		verify_module(&ir).expect("ir invariants hold");
	}

	#[test]
	fn for_each_over_coroutine() {
		// coroutine int gen(){ yield 1; yield 2; yield 3; return 0; }
		let yield_stmt = |pos: u32, text: &str| {
			node(
				pos,
				SynValue::Yield {
					value: Some(num(pos, text)),
				},
			)
		};

		let gen = function(
			10,
			"gen",
			true,
			ty(10, "int"),
			Vec::new(),
			vec![
				yield_stmt(11, "1"),
				yield_stmt(12, "2"),
				yield_stmt(13, "3"),
				ret(14, num(14, "0")),
			],
		);

		let body = node(
			31,
			SynValue::ModifyAssignment {
				op: crate::frontend::SynModifyAssignType::Add,
				lhs: ident(31, "s"),
				rhs: ident(31, "x"),
			},
		);

		let for_each = node(
			30,
			SynValue::ForEach {
				iterators: vec![SynForEachIterator {
					span: sp(30),
					ty: None,
					name: "x".to_string(),
					value: ident(30, "gen"),
				}],
				body: Some(body),
			},
		);

		let (mut ctx, result) = run(vec![
			gen,
			define(20, ty(20, "int"), "s", Some(num(20, "0"))),
			for_each,
			ret(40, ident(40, "s")),
		]);

		let module = result.expect("analysis succeeds");

		let gen_functions = find_function(&ctx, "gen");

		assert!(ctx.functions[gen_functions[0]].coroutine);

		let ir = compile_module(&mut ctx, &module);

		verify_module(&ir).expect("ir invariants hold");

		// The coroutine body contains yield instructions
		let gen_value = ir.function_values[&gen_functions[0]];
		let blocks = ir.function(gen_value).unwrap().blocks.clone();

		let yields = blocks
			.iter()
			.flat_map(|block| ir.block(*block).unwrap().instructions.clone())
			.filter(|inst| ir.inst(*inst).unwrap().cmd == crate::ir::VmInstType::Yield)
			.count();

		assert_eq!(yields, 3);
	}

	#[test]
	fn overload_selection_is_deterministic() {
		// int f(int x){ return x+1; } int f(double x){ return 2; }
		let int_overload = function(
			10,
			"f",
			false,
			ty(10, "int"),
			vec![(ty(10, "int"), "x")],
			vec![ret(
				11,
				binary(11, SynBinaryOpType::Add, ident(11, "x"), num(11, "1")),
			)],
		);

		let double_overload = function(
			20,
			"f",
			false,
			ty(20, "int"),
			vec![(ty(20, "double"), "x")],
			vec![ret(21, num(21, "2"))],
		);

		let (ctx, result) = run(vec![
			int_overload,
			double_overload,
			ret(
				30,
				binary(
					30,
					SynBinaryOpType::Add,
					call(30, "f", vec![num(30, "1")]),
					call(31, "f", vec![num(31, "1.0")]),
				),
			),
		]);

		let module = result.expect("analysis succeeds");

		// The two calls picked the two distinct overloads
		let mut selected = Vec::new();

		fn collect_calls(ctx: &ExpressionContext, expr: &Expr, out: &mut Vec<usize>) {
			if let ExprKind::FunctionCall { function, arguments } = &expr.kind {
				if let ExprKind::FunctionAccess { function, .. } = &function.kind {
					if ctx.functions[*function].name == "f" {
						out.push(*function);
					}
				}

				for argument in arguments {
					collect_calls(ctx, argument, out);
				}
			}

			match &expr.kind {
				ExprKind::Module { expressions, .. } => {
					for expression in expressions {
						collect_calls(ctx, expression, out);
					}
				}
				ExprKind::Return(value) => collect_calls(ctx, value, out),
				ExprKind::BinaryOp { lhs, rhs, .. } => {
					collect_calls(ctx, lhs, out);
					collect_calls(ctx, rhs, out);
				}
				ExprKind::TypeCast { value, .. } => collect_calls(ctx, value, out),
				_ => {}
			}
		}

		collect_calls(&ctx, &module, &mut selected);

		assert_eq!(selected.len(), 2);
		assert_ne!(selected[0], selected[1]);
	}

	#[test]
	fn overload_ambiguity_is_fatal() {
		// f(int, double) and f(double, int) tie for f(1, 1)
		let first = function(
			10,
			"f",
			false,
			ty(10, "int"),
			vec![(ty(10, "int"), "x"), (ty(10, "double"), "y")],
			vec![ret(11, num(11, "1"))],
		);

		let second = function(
			20,
			"f",
			false,
			ty(20, "int"),
			vec![(ty(20, "double"), "x"), (ty(20, "int"), "y")],
			vec![ret(21, num(21, "2"))],
		);

		let (_ctx, result) = run(vec![
			first,
			second,
			ret(30, call(30, "f", vec![num(30, "1"), num(30, "1")])),
		]);

		let error = result.expect_err("the call is ambiguous");

		assert_eq!(error.kind, CompileErrorKind::OverloadSelection);
		assert!(error.message.contains("ambiguity"));
	}

	#[test]
	fn class_layout_is_padded_and_aligned() {
		let class_definition = node(
			10,
			SynValue::ClassDefinition(Rc::new(SynClassDefinition {
				span: sp(10),
				name: "C".to_string(),
				aliases: Vec::new(),
				extendable: false,
				base_class: None,
				align: None,
				elements: SynClassElements {
					members: vec![
						define(11, ty(11, "char"), "a", None),
						define(12, ty(12, "int"), "b", None),
					],
					..Default::default()
				},
			})),
		);

		let (ctx, result) = run(vec![class_definition]);

		result.expect("analysis succeeds");

		let class = (0..ctx.types.len())
			.find(|t| ctx.types[*t].name == "C")
			.unwrap();

		assert_eq!(ctx.types[class].alignment, 4);
		assert_eq!(ctx.types[class].size % ctx.types[class].alignment.max(4), 0);
		assert_eq!(ctx.types[class].size, 8);

		let members = &ctx.types[class].members;

		assert_eq!(ctx.variables[members[0]].offset, 0);
		assert_eq!(ctx.variables[members[1]].offset, 4);
	}

	#[test]
	fn static_if_selects_one_branch() {
		// static if(0) int a = 1; else int b = 2;
		let static_if = node(
			10,
			SynValue::IfElse {
				static_if: true,
				condition: num(10, "0"),
				true_block: define(11, ty(11, "int"), "a", Some(num(11, "1"))),
				false_block: Some(define(12, ty(12, "int"), "b", Some(num(12, "2")))),
			},
		);

		let (ctx, result) = run(vec![static_if]);

		result.expect("analysis succeeds");

		assert!(find_variable(&ctx, "a").is_none());
		assert!(find_variable(&ctx, "b").is_some());
	}

	#[test]
	fn break_depth_bounds_are_enforced() {
		// while(1){ break 2; } is out of range
		let loop_stmt = node(
			10,
			SynValue::While {
				condition: num(10, "1"),
				body: Some(node(
					11,
					SynValue::Break {
						number: Some(num(11, "2")),
					},
				)),
			},
		);

		let (_ctx, result) = run(vec![loop_stmt]);

		let error = result.expect_err("break depth exceeds the loop depth");

		assert_eq!(error.kind, CompileErrorKind::FlowError);
	}

	#[test]
	fn break_depth_may_equal_loop_depth() {
		let loop_stmt = node(
			10,
			SynValue::While {
				condition: num(10, "1"),
				body: Some(node(
					11,
					SynValue::Break {
						number: Some(num(11, "1")),
					},
				)),
			},
		);

		let (_ctx, result) = run(vec![loop_stmt]);

		result.expect("break to the exact loop depth is legal");
	}

	#[test]
	fn yield_outside_coroutine_is_rejected() {
		let bad = function(
			10,
			"f",
			false,
			ty(10, "int"),
			Vec::new(),
			vec![node(
				11,
				SynValue::Yield {
					value: Some(num(11, "1")),
				},
			)],
		);

		let (_ctx, result) = run(vec![bad]);

		let error = result.expect_err("yield requires a coroutine");

		assert_eq!(error.kind, CompileErrorKind::FlowError);
	}

	#[test]
	fn scope_visibility_is_positional() {
		let mut ctx = ExpressionContext::new();

		let target = ctx.push_scope(ScopeOwner::None);

		let early = ctx.add_variable(VariableData {
			source: sp(10),
			scope: ctx.scope,
			ty: ctx.builtin.int_,
			name: "early".to_string(),
			name_hash: string_hash("early"),
			alignment: 4,
			offset: 0,
			unique_id: 0,
			is_reference: false,
			imported: false,
		});

		let late = ctx.add_variable(VariableData {
			source: sp(30),
			scope: ctx.scope,
			ty: ctx.builtin.int_,
			name: "late".to_string(),
			name_hash: string_hash("late"),
			alignment: 4,
			offset: 4,
			unique_id: 1,
			is_reference: false,
			imported: false,
		});

		let imported = ctx.add_variable(VariableData {
			source: sp(40),
			scope: ctx.scope,
			ty: ctx.builtin.int_,
			name: "imported".to_string(),
			name_hash: string_hash("imported"),
			alignment: 4,
			offset: 8,
			unique_id: 2,
			is_reference: false,
			imported: true,
		});

		ctx.pop_scope(None).unwrap();

		assert_eq!(ctx.variable_map.find(string_hash("early")), None);

		ctx.switch_to_scope_at_point(None, target, Some(sp(20))).unwrap();

		assert_eq!(ctx.variable_map.find(string_hash("early")), Some(early));
		assert_eq!(ctx.variable_map.find(string_hash("late")), None);
		assert_eq!(ctx.variable_map.find(string_hash("imported")), Some(imported));

		let _ = late;
	}

	#[test]
	fn namespace_common_ancestor_survives_scope_switch() {
		// A scope switch whose common ancestor is namespace-owned must keep
		// that namespace's members reachable, migrating them outward the
		// same way closing the namespace does
		let mut ctx = ExpressionContext::new();

		let namespace = ctx.add_namespace(NamespaceData {
			source: sp(1),
			parent: None,
			name: "ns".to_string(),
			full_name: "ns".to_string(),
			full_name_hash: string_hash("ns"),
			unique_id: 0,
		});

		ctx.push_scope(ScopeOwner::Namespace(namespace));

		let member = ctx.add_variable(VariableData {
			source: sp(10),
			scope: ctx.scope,
			ty: ctx.builtin.int_,
			name: "n_member".to_string(),
			name_hash: string_hash("n_member"),
			alignment: 4,
			offset: 0,
			unique_id: 0,
			is_reference: false,
			imported: false,
		});

		let target = ctx.push_scope(ScopeOwner::None);

		let inner = ctx.add_variable(VariableData {
			source: sp(5),
			scope: ctx.scope,
			ty: ctx.builtin.int_,
			name: "inner".to_string(),
			name_hash: string_hash("inner"),
			alignment: 4,
			offset: 4,
			unique_id: 1,
			is_reference: false,
			imported: false,
		});

		ctx.pop_scope(Some(sp(15))).unwrap();

		ctx.switch_to_scope_at_point(None, target, Some(sp(20))).unwrap();

		assert_eq!(ctx.variable_map.find(string_hash("n_member")), Some(member));
		assert_eq!(ctx.variable_map.find(string_hash("inner")), Some(inner));

		// The member migrated instead of being re-inserted; no duplicates
		assert_eq!(ctx.variable_map.find_all(string_hash("n_member")).len(), 1);
	}

	#[test]
	fn peephole_cleans_additive_identities() {
		// return 0 + a;
		let (mut ctx, result) = run(vec![
			define(10, ty(10, "int"), "a", Some(num(10, "5"))),
			ret(
				20,
				binary(20, SynBinaryOpType::Add, num(20, "0"), ident(20, "a")),
			),
		]);

		let module = result.expect("analysis succeeds");

		let mut ir = compile_module(&mut ctx, &module);

		crate::ir::run_peephole_optimizations(&mut ir);

		assert!(ir.peephole_optimization_count >= 1);

		verify_module(&ir).expect("ir invariants hold after rewriting");

		// The return now takes the loaded value directly
		let global = *ir.functions.last().unwrap();
		let blocks = ir.function(global).unwrap().blocks.clone();

		for block in blocks {
			for inst in ir.block(block).unwrap().instructions.clone() {
				if ir.inst(inst).unwrap().cmd == crate::ir::VmInstType::Return {
					let operand = ir.inst(inst).unwrap().arguments[0];

					assert!(!matches!(
						ir.values[operand.index()].kind,
						VmValueKind::Constant(_)
					));
				}
			}
		}
	}

	#[test]
	fn closures_capture_upvalues() {
		// int a = 1; auto f(){ return a; }
		let closure = function(
			20,
			"f",
			false,
			node(20, SynValue::TypeAuto),
			Vec::new(),
			vec![ret(21, ident(21, "a"))],
		);

		let outer = function(
			10,
			"outer",
			false,
			node(10, SynValue::TypeAuto),
			Vec::new(),
			vec![
				define(11, ty(11, "int"), "a", Some(num(11, "1"))),
				closure,
				ret(23, num(23, "0")),
			],
		);

		let (ctx, result) = run(vec![outer]);

		result.expect("analysis succeeds");

		let f = find_function(&ctx, "f")
			.into_iter()
			.next()
			.expect("the nested function exists");

		assert_eq!(ctx.functions[f].upvalues.len(), 1);

		let upvalue = &ctx.functions[f].upvalues[0];

		assert_eq!(ctx.variables[upvalue.variable].name, "a");
		assert!(ctx.variables[upvalue.target].name.ends_with("_target"));
		assert!(ctx.variables[upvalue.copy].name.ends_with("_copy"));

		// Both members live on the synthesized context class
		let context_type = ctx.functions[f].context_type;
		let class_type = ctx.types[context_type].ref_target().unwrap();

		assert_eq!(ctx.types[class_type].members.len(), 2);
	}
}
