use crate::ir::{VmConstant, VmInstType, VmModule, VmType, VmValueId, VmValueKind};

fn constant_integer_matches(module: &VmModule, value: VmValueId, number: i64) -> bool {
	match module.constant(value) {
		Some(VmConstant::Int(v)) => *v as i64 == number,
		Some(VmConstant::Long(v)) => *v == number,
		_ => false,
	}
}

fn constant_matches_either(
	module: &VmModule,
	value: VmValueId,
	i_value: i32,
	d_value: f64,
	l_value: i64,
) -> bool {
	match module.constant(value) {
		Some(VmConstant::Int(v)) => *v == i_value,
		Some(VmConstant::Double(v)) => *v == d_value,
		Some(VmConstant::Long(v)) => *v == l_value,
		_ => false,
	}
}

fn is_constant_zero(module: &VmModule, value: VmValueId) -> bool {
	constant_matches_either(module, value, 0, 0.0, 0)
}

fn is_constant_one(module: &VmModule, value: VmValueId) -> bool {
	constant_matches_either(module, value, 1, 1.0, 1)
}

/// Rewrite every user of `inst` to use `replacement` instead, keeping the
/// use lists consistent; `inst` itself disappears once unused.
fn replace_value_users_with(module: &mut VmModule, inst: VmValueId, replacement: VmValueId) {
	let users = module.values[inst.index()].users.clone();

	for user in users {
		let arguments = match &module.values[user.index()].kind {
			VmValueKind::Inst(data) => data.arguments.clone(),
			_ => continue,
		};

		for (position, argument) in arguments.iter().enumerate() {
			if *argument != inst {
				continue;
			}

			module.add_use(replacement, user);

			if let VmValueKind::Inst(data) = &mut module.values[user.index()].kind {
				data.arguments[position] = replacement;
			}

			module.remove_use(inst, user);
		}
	}
}

/// Re-point an instruction at a different opcode and operand list, keeping
/// the use lists consistent.
fn change_instruction_to(
	module: &mut VmModule,
	inst: VmValueId,
	cmd: VmInstType,
	operands: &[VmValueId],
) {
	let old_arguments = match &mut module.values[inst.index()].kind {
		VmValueKind::Inst(data) => {
			data.cmd = cmd;

			std::mem::take(&mut data.arguments)
		}
		_ => return,
	};

	for operand in operands {
		module.add_argument(inst, *operand);
	}

	for argument in old_arguments {
		module.remove_use(argument, inst);
	}

	let side_effects = super::has_side_effects(cmd);

	if let VmValueKind::Inst(data) = &mut module.values[inst.index()].kind {
		data.has_side_effects = side_effects;
	}
}

fn run_on_instruction(module: &mut VmModule, inst: VmValueId) {
	let (cmd, arguments, result_type) = match &module.values[inst.index()].kind {
		VmValueKind::Inst(data) => (data.cmd, data.arguments.clone(), module.values[inst.index()].ty),
		_ => return,
	};

	match cmd {
		VmInstType::Add => {
			if is_constant_zero(module, arguments[0]) {
				// 0 + x, all types
				module.peephole_optimization_count += 1;
				replace_value_users_with(module, inst, arguments[1]);
			} else if is_constant_zero(module, arguments[1]) {
				// x + 0, all types
				module.peephole_optimization_count += 1;
				replace_value_users_with(module, inst, arguments[0]);
			}
		}
		VmInstType::Sub => {
			if constant_integer_matches(module, arguments[0], 0) {
				// 0 - x, integer types
				module.peephole_optimization_count += 1;
				change_instruction_to(module, inst, VmInstType::Neg, &[arguments[1]]);
			} else if is_constant_zero(module, arguments[1]) {
				// x - 0, all types
				module.peephole_optimization_count += 1;
				replace_value_users_with(module, inst, arguments[0]);
			}
		}
		VmInstType::Mul => {
			if is_constant_zero(module, arguments[0]) || is_constant_zero(module, arguments[1]) {
				// 0 * x or x * 0, with a typed zero result
				let zero = match result_type {
					VmType::Int => Some(module.create_constant_int(0)),
					VmType::Double => Some(module.create_constant_double(0.0)),
					VmType::Long => Some(module.create_constant_long(0)),
					_ => None,
				};

				if let Some(zero) = zero {
					module.peephole_optimization_count += 1;
					replace_value_users_with(module, inst, zero);
				}
			} else if is_constant_one(module, arguments[0]) {
				// 1 * x, all types
				module.peephole_optimization_count += 1;
				replace_value_users_with(module, inst, arguments[1]);
			} else if is_constant_one(module, arguments[1]) {
				// x * 1, all types
				module.peephole_optimization_count += 1;
				replace_value_users_with(module, inst, arguments[0]);
			}
		}
		_ => {}
	}
}

fn run_on_function(module: &mut VmModule, function: VmValueId) {
	let blocks = match module.function(function) {
		Some(data) => data.blocks.clone(),
		None => return,
	};

	for block in blocks {
		let instructions = match module.block(block) {
			Some(data) => data.instructions.clone(),
			None => continue,
		};

		for inst in instructions {
			run_on_instruction(module, inst);
		}
	}
}

/// Algebraic-identity rewrites; every rewrite goes through the operand-user
/// discipline so the module stays consistent.
pub fn run_peephole_optimizations(module: &mut VmModule) {
	let functions = module.functions.clone();

	for function in functions {
		run_on_function(module, function);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ir::VmType;

	fn module_with_block() -> (VmModule, VmValueId) {
		let mut module = VmModule::new();

		let function = module.create_function(VmType::Void, None, VmType::Void);
		let block = module.create_block("start");

		module.add_block(function, block);
		module.functions.push(function);
		module.current_function = Some(function);
		module.current_block = Some(block);

		(module, block)
	}

	#[test]
	fn add_zero_forwards_the_operand() {
		let (mut module, block) = module_with_block();

		let zero = module.create_constant_int(0);
		let x = module.create_constant_int(42);

		let sum = module.create_instruction(VmType::Int, VmInstType::Add, &[zero, x]);
		let user = module.create_instruction(VmType::Int, VmInstType::Neg, &[sum]);

		run_peephole_optimizations(&mut module);

		assert_eq!(module.inst(user).unwrap().arguments, vec![x]);
		assert_eq!(module.peephole_optimization_count, 1);

		// The add lost its last user and fell out of the block
		assert!(!module.block(block).unwrap().instructions.contains(&sum));
	}

	#[test]
	fn zero_minus_becomes_negation() {
		let (mut module, _block) = module_with_block();

		let zero = module.create_constant_int(0);
		let x = module.create_constant_int(5);

		let sub = module.create_instruction(VmType::Int, VmInstType::Sub, &[zero, x]);
		let _user = module.create_instruction(VmType::Int, VmInstType::Neg, &[sub]);

		run_peephole_optimizations(&mut module);

		assert_eq!(module.inst(sub).unwrap().cmd, VmInstType::Neg);
		assert_eq!(module.inst(sub).unwrap().arguments, vec![x]);
	}

	#[test]
	fn multiply_by_zero_becomes_typed_zero() {
		let (mut module, _block) = module_with_block();

		let zero = module.create_constant_double(0.0);
		let x = module.create_constant_double(8.0);

		let mul = module.create_instruction(VmType::Double, VmInstType::Mul, &[x, zero]);
		let user = module.create_instruction(VmType::Double, VmInstType::Neg, &[mul]);

		run_peephole_optimizations(&mut module);

		let replacement = module.inst(user).unwrap().arguments[0];

		assert_eq!(
			module.constant(replacement),
			Some(&VmConstant::Double(0.0))
		);
	}

	#[test]
	fn multiply_by_one_forwards_the_operand() {
		let (mut module, _block) = module_with_block();

		let one = module.create_constant_long(1);
		let x = module.create_constant_long(9);

		let mul = module.create_instruction(VmType::Long, VmInstType::Mul, &[one, x]);
		let user = module.create_instruction(VmType::Long, VmInstType::Neg, &[mul]);

		run_peephole_optimizations(&mut module);

		assert_eq!(module.inst(user).unwrap().arguments, vec![x]);
	}
}
