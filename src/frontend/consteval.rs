use crate::frontend::{
	CastKind, ConstValue, Expr, ExprKind, ExpressionContext, SynBinaryOpType, SynUnaryOpType,
};

/// Compile-time reduction of an already-typed expression to a literal.
/// Returns `None` for anything outside the supported subset; the caller
/// decides whether that is an error. Division and modulo are never folded,
/// their behavior is left to the machine.
pub fn evaluate(ctx: &ExpressionContext, expr: &Expr) -> Option<ConstValue> {
	match &expr.kind {
		ExprKind::BoolLiteral(value) => Some(ConstValue::Bool(*value)),
		ExprKind::CharLiteral(value) => Some(ConstValue::Char(*value)),
		ExprKind::IntegerLiteral(value) => {
			if expr.ty == ctx.builtin.long_ {
				Some(ConstValue::Long(*value))
			} else {
				Some(ConstValue::Int(*value as i32))
			}
		}
		ExprKind::RationalLiteral(value) => Some(ConstValue::Double(*value)),
		ExprKind::TypeLiteral(ty) => Some(ConstValue::Type(*ty)),
		ExprKind::FunctionIndexLiteral(function) => Some(ConstValue::FunctionIndex(*function)),
		ExprKind::NullptrLiteral => Some(ConstValue::Null),
		ExprKind::Passthrough(inner) => evaluate(ctx, inner),
		ExprKind::TypeCast { value, cast } => {
			if *cast != CastKind::Numerical {
				return None;
			}

			let inner = evaluate(ctx, value)?;

			cast_numeric(ctx, inner, expr.ty)
		}
		ExprKind::UnaryOp { op, value } => {
			let inner = evaluate(ctx, value)?;

			eval_unary(*op, inner)
		}
		ExprKind::BinaryOp { op, lhs, rhs } => {
			let lhs = evaluate(ctx, lhs)?;
			let rhs = evaluate(ctx, rhs)?;

			eval_binary(*op, lhs, rhs)
		}
		_ => None,
	}
}

/// Evaluate to an integer, used for array sizes, alignment, `static if`
/// conditions and break/continue depths.
pub fn evaluate_integer(ctx: &ExpressionContext, expr: &Expr) -> Option<i64> {
	match evaluate(ctx, expr)? {
		ConstValue::Bool(value) => Some(value as i64),
		ConstValue::Char(value) => Some(value as i64),
		ConstValue::Int(value) => Some(value as i64),
		ConstValue::Long(value) => Some(value),
		_ => None,
	}
}

fn as_double(value: ConstValue) -> Option<f64> {
	match value {
		ConstValue::Bool(v) => Some(v as i64 as f64),
		ConstValue::Char(v) => Some(v as f64),
		ConstValue::Int(v) => Some(v as f64),
		ConstValue::Long(v) => Some(v as f64),
		ConstValue::Double(v) => Some(v),
		_ => None,
	}
}

fn as_long(value: ConstValue) -> Option<i64> {
	match value {
		ConstValue::Bool(v) => Some(v as i64),
		ConstValue::Char(v) => Some(v as i64),
		ConstValue::Int(v) => Some(v as i64),
		ConstValue::Long(v) => Some(v),
		ConstValue::Double(v) => Some(v as i64),
		_ => None,
	}
}

fn is_floating(value: ConstValue) -> bool {
	matches!(value, ConstValue::Double(_))
}

fn cast_numeric(
	ctx: &ExpressionContext,
	value: ConstValue,
	target: crate::frontend::TypeId,
) -> Option<ConstValue> {
	let b = ctx.builtin;

	if target == b.bool_ {
		if is_floating(value) {
			return Some(ConstValue::Bool(as_double(value)? != 0.0));
		}

		return Some(ConstValue::Bool(as_long(value)? != 0));
	}

	if target == b.char_ {
		return Some(ConstValue::Char(as_long(value)? as u8));
	}

	if target == b.short_ {
		return Some(ConstValue::Int(as_long(value)? as i16 as i32));
	}

	if target == b.int_ {
		return Some(ConstValue::Int(as_long(value)? as i32));
	}

	if target == b.long_ {
		return Some(ConstValue::Long(as_long(value)?));
	}

	if target == b.float_ {
		return Some(ConstValue::Double(as_double(value)? as f32 as f64));
	}

	if target == b.double_ {
		return Some(ConstValue::Double(as_double(value)?));
	}

	None
}

fn eval_unary(op: SynUnaryOpType, value: ConstValue) -> Option<ConstValue> {
	if is_floating(value) {
		let inner = as_double(value)?;

		return match op {
			SynUnaryOpType::Plus => Some(ConstValue::Double(inner)),
			SynUnaryOpType::Negate => Some(ConstValue::Double(-inner)),
			_ => None,
		};
	}

	let wide = matches!(value, ConstValue::Long(_));
	let inner = as_long(value)?;

	let result = match op {
		SynUnaryOpType::Plus => inner,
		SynUnaryOpType::Negate => inner.wrapping_neg(),
		SynUnaryOpType::BitNot => !inner,
		SynUnaryOpType::LogicalNot => (inner == 0) as i64,
	};

	if matches!(op, SynUnaryOpType::LogicalNot) {
		return Some(ConstValue::Bool(result != 0));
	}

	if wide {
		Some(ConstValue::Long(result))
	} else {
		Some(ConstValue::Int(result as i32))
	}
}

fn eval_binary(op: SynBinaryOpType, lhs: ConstValue, rhs: ConstValue) -> Option<ConstValue> {
	if is_floating(lhs) || is_floating(rhs) {
		let a = as_double(lhs)?;
		let b = as_double(rhs)?;

		return match op {
			SynBinaryOpType::Add => Some(ConstValue::Double(a + b)),
			SynBinaryOpType::Sub => Some(ConstValue::Double(a - b)),
			SynBinaryOpType::Mul => Some(ConstValue::Double(a * b)),
			SynBinaryOpType::Less => Some(ConstValue::Bool(a < b)),
			SynBinaryOpType::LessEqual => Some(ConstValue::Bool(a <= b)),
			SynBinaryOpType::Greater => Some(ConstValue::Bool(a > b)),
			SynBinaryOpType::GreaterEqual => Some(ConstValue::Bool(a >= b)),
			SynBinaryOpType::Equal => Some(ConstValue::Bool(a == b)),
			SynBinaryOpType::NotEqual => Some(ConstValue::Bool(a != b)),
			_ => None,
		};
	}

	let wide = matches!(lhs, ConstValue::Long(_)) || matches!(rhs, ConstValue::Long(_));
	let a = as_long(lhs)?;
	let b = as_long(rhs)?;

	let logical = |v: bool| Some(ConstValue::Bool(v));

	let result = match op {
		SynBinaryOpType::Add => a.wrapping_add(b),
		SynBinaryOpType::Sub => a.wrapping_sub(b),
		SynBinaryOpType::Mul => a.wrapping_mul(b),
		SynBinaryOpType::Shl => a.wrapping_shl(b as u32),
		SynBinaryOpType::Shr => a.wrapping_shr(b as u32),
		SynBinaryOpType::BitAnd => a & b,
		SynBinaryOpType::BitOr => a | b,
		SynBinaryOpType::BitXor => a ^ b,
		SynBinaryOpType::Less => return logical(a < b),
		SynBinaryOpType::LessEqual => return logical(a <= b),
		SynBinaryOpType::Greater => return logical(a > b),
		SynBinaryOpType::GreaterEqual => return logical(a >= b),
		SynBinaryOpType::Equal => return logical(a == b),
		SynBinaryOpType::NotEqual => return logical(a != b),
		SynBinaryOpType::LogicalAnd => return logical(a != 0 && b != 0),
		SynBinaryOpType::LogicalOr => return logical(a != 0 || b != 0),
		SynBinaryOpType::LogicalXor => return logical((a != 0) != (b != 0)),
		SynBinaryOpType::Div | SynBinaryOpType::Mod | SynBinaryOpType::Pow => return None,
	};

	if wide {
		Some(ConstValue::Long(result))
	} else {
		Some(ConstValue::Int(result as i32))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::frontend::SourceSpan;

	fn int_lit(ctx: &ExpressionContext, value: i64) -> Expr {
		Expr::new(
			SourceSpan::default(),
			ctx.builtin.int_,
			ExprKind::IntegerLiteral(value),
		)
	}

	#[test]
	fn folds_arithmetic() {
		let ctx = ExpressionContext::new();

		let lhs = int_lit(&ctx, 2);
		let rhs = int_lit(&ctx, 3);

		let sum = Expr::new(
			SourceSpan::default(),
			ctx.builtin.int_,
			ExprKind::BinaryOp {
				op: SynBinaryOpType::Add,
				lhs: Box::new(lhs),
				rhs: Box::new(rhs),
			},
		);

		assert_eq!(evaluate_integer(&ctx, &sum), Some(5));
	}

	#[test]
	fn does_not_fold_division() {
		let ctx = ExpressionContext::new();

		let division = Expr::new(
			SourceSpan::default(),
			ctx.builtin.int_,
			ExprKind::BinaryOp {
				op: SynBinaryOpType::Div,
				lhs: Box::new(int_lit(&ctx, 6)),
				rhs: Box::new(int_lit(&ctx, 2)),
			},
		);

		assert_eq!(evaluate(&ctx, &division), None);
	}

	#[test]
	fn numeric_casts_reduce() {
		let ctx = ExpressionContext::new();

		let cast = Expr::new(
			SourceSpan::default(),
			ctx.builtin.long_,
			ExprKind::TypeCast {
				value: Box::new(int_lit(&ctx, 41)),
				cast: CastKind::Numerical,
			},
		);

		assert_eq!(evaluate(&ctx, &cast), Some(ConstValue::Long(41)));
	}

	#[test]
	fn non_constant_nodes_do_not_reduce() {
		let ctx = ExpressionContext::new();

		let access = Expr::new(
			SourceSpan::default(),
			ctx.builtin.int_,
			ExprKind::VariableAccess(0),
		);

		assert_eq!(evaluate(&ctx, &access), None);
	}
}
