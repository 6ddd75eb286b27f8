use crate::ir::{VmModule, VmValueId, VmValueKind};

#[derive(Clone, Debug)]
pub struct VmVerifyError {
	pub value: VmValueId,
	pub message: String,
}

/// Check the module's structural invariants: every operand knows its users,
/// every linked instruction sits in its parent block, and unlinked
/// instructions hold no operands.
pub fn verify_module(module: &VmModule) -> Result<(), Vec<VmVerifyError>> {
	let mut errors = Vec::new();

	for index in 0..module.values.len() {
		let id = VmValueId(index as u32);

		match &module.values[index].kind {
			VmValueKind::Inst(inst) => {
				for argument in &inst.arguments {
					if !module.values[argument.index()].users.contains(&id) {
						errors.push(VmVerifyError {
							value: id,
							message: format!(
								"operand {:?} does not list the instruction as a user",
								argument
							),
						});
					}
				}

				match inst.parent {
					Some(parent) => {
						let listed = module
							.block(parent)
							.map(|block| block.instructions.contains(&id))
							.unwrap_or(false);

						if !listed {
							errors.push(VmVerifyError {
								value: id,
								message: "instruction is missing from its parent block"
									.to_string(),
							});
						}
					}
					None => {
						if !inst.arguments.is_empty() {
							errors.push(VmVerifyError {
								value: id,
								message: "dead instruction still holds operands".to_string(),
							});
						}
					}
				}
			}
			VmValueKind::Block(block) => {
				for inst in &block.instructions {
					let parented = module
						.inst(*inst)
						.map(|data| data.parent == Some(id))
						.unwrap_or(false);

					if !parented {
						errors.push(VmVerifyError {
							value: id,
							message: format!(
								"block lists instruction {:?} that does not point back",
								inst
							),
						});
					}
				}
			}
			_ => {}
		}
	}

	if errors.is_empty() {
		Ok(())
	} else {
		Err(errors)
	}
}
