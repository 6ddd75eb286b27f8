use std::collections::HashMap;

use crate::frontend::{FunctionId, TypeId, VariableId};
use crate::ir::{VmType, VmValueId};

/// Closed IR instruction set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VmInstType {
	LoadByte,
	LoadShort,
	LoadInt,
	LoadFloat,
	LoadDouble,
	LoadLong,
	LoadStruct,
	StoreByte,
	StoreShort,
	StoreInt,
	StoreFloat,
	StoreDouble,
	StoreLong,
	StoreStruct,
	SetRange,
	Jump,
	JumpZ,
	JumpNz,
	Call,
	Return,
	Yield,
	Add,
	Sub,
	Mul,
	Div,
	Pow,
	Mod,
	Neg,
	Shl,
	Shr,
	BitAnd,
	BitOr,
	BitXor,
	BitNot,
	LogAnd,
	LogOr,
	LogXor,
	LogNot,
	Less,
	Greater,
	LessEqual,
	GreaterEqual,
	Equal,
	NotEqual,
	IntToDouble,
	DoubleToInt,
	IntToLong,
	LongToInt,
	DoubleToLong,
	LongToDouble,
	FrameOffset,
	Index,
	IndexUnsized,
	TypeIndex,
	CreateClosure,
	CloseUpvalues,
	ConvertPointer,
	CheckedReturn,
}

pub fn has_side_effects(cmd: VmInstType) -> bool {
	matches!(
		cmd,
		VmInstType::StoreByte
			| VmInstType::StoreShort
			| VmInstType::StoreInt
			| VmInstType::StoreFloat
			| VmInstType::StoreDouble
			| VmInstType::StoreLong
			| VmInstType::StoreStruct
			| VmInstType::SetRange
			| VmInstType::Jump
			| VmInstType::JumpZ
			| VmInstType::JumpNz
			| VmInstType::Call
			| VmInstType::Return
			| VmInstType::Yield
			| VmInstType::CreateClosure
			| VmInstType::CloseUpvalues
			| VmInstType::ConvertPointer
			| VmInstType::CheckedReturn
	)
}

#[derive(Clone, Debug, PartialEq)]
pub enum VmConstant {
	Int(i32),
	Double(f64),
	Long(i64),
	Pointer(i32),
	Struct(Vec<u8>),
}

#[derive(Clone, Debug)]
pub struct VmInstData {
	pub cmd: VmInstType,
	pub arguments: Vec<VmValueId>,
	pub parent: Option<VmValueId>,
	pub has_side_effects: bool,
}

#[derive(Clone, Debug)]
pub struct VmBlockData {
	pub name: String,
	pub id: u32,
	pub parent: Option<VmValueId>,
	pub instructions: Vec<VmValueId>,
}

#[derive(Clone, Debug)]
pub struct VmFunctionData {
	pub function: Option<FunctionId>,
	pub return_type: VmType,
	pub blocks: Vec<VmValueId>,
}

#[derive(Clone, Debug)]
pub enum VmValueKind {
	Void,
	Constant(VmConstant),
	Inst(VmInstData),
	Block(VmBlockData),
	Function(VmFunctionData),
}

/// An IR value: a constant, instruction, block label or function reference.
/// Every value tracks its users so that removal keeps the module consistent.
#[derive(Clone, Debug)]
pub struct VmValue {
	pub ty: VmType,
	pub users: Vec<VmValueId>,
	pub kind: VmValueKind,
}

#[derive(Clone, Debug, Default)]
pub struct VmModule {
	pub values: Vec<VmValue>,
	/// All functions; the implicit top-level function is last.
	pub functions: Vec<VmValueId>,
	/// Source type universe, indexable by type id.
	pub types: Vec<TypeId>,
	/// Virtual table variables filled by the setup block.
	pub vtables: Vec<VariableId>,
	pub function_values: HashMap<FunctionId, VmValueId>,
	pub next_block_id: u32,
	pub next_instruction_id: u32,
	pub current_function: Option<VmValueId>,
	pub current_block: Option<VmValueId>,
	pub peephole_optimization_count: u32,
}

impl VmModule {
	pub fn new() -> Self {
		Self::default()
	}

	fn push_value(&mut self, value: VmValue) -> VmValueId {
		let id = VmValueId(self.values.len() as u32);

		self.values.push(value);

		id
	}

	pub fn create_void(&mut self) -> VmValueId {
		self.push_value(VmValue {
			ty: VmType::Void,
			users: Vec::new(),
			kind: VmValueKind::Void,
		})
	}

	pub fn create_constant_int(&mut self, value: i32) -> VmValueId {
		self.push_value(VmValue {
			ty: VmType::Int,
			users: Vec::new(),
			kind: VmValueKind::Constant(VmConstant::Int(value)),
		})
	}

	pub fn create_constant_double(&mut self, value: f64) -> VmValueId {
		self.push_value(VmValue {
			ty: VmType::Double,
			users: Vec::new(),
			kind: VmValueKind::Constant(VmConstant::Double(value)),
		})
	}

	pub fn create_constant_long(&mut self, value: i64) -> VmValueId {
		self.push_value(VmValue {
			ty: VmType::Long,
			users: Vec::new(),
			kind: VmValueKind::Constant(VmConstant::Long(value)),
		})
	}

	pub fn create_constant_pointer(&mut self, value: i32) -> VmValueId {
		self.push_value(VmValue {
			ty: VmType::Pointer,
			users: Vec::new(),
			kind: VmValueKind::Constant(VmConstant::Pointer(value)),
		})
	}

	pub fn create_constant_struct(&mut self, value: Vec<u8>) -> VmValueId {
		debug_assert!(value.len() % 4 == 0);

		self.push_value(VmValue {
			ty: VmType::Struct(value.len() as u32),
			users: Vec::new(),
			kind: VmValueKind::Constant(VmConstant::Struct(value)),
		})
	}

	pub fn create_block(&mut self, name: &str) -> VmValueId {
		let id = self.next_block_id;
		self.next_block_id += 1;

		self.push_value(VmValue {
			ty: VmType::Label,
			users: Vec::new(),
			kind: VmValueKind::Block(VmBlockData {
				name: name.to_string(),
				id,
				parent: None,
				instructions: Vec::new(),
			}),
		})
	}

	pub fn create_function(
		&mut self,
		ty: VmType,
		function: Option<FunctionId>,
		return_type: VmType,
	) -> VmValueId {
		self.push_value(VmValue {
			ty,
			users: Vec::new(),
			kind: VmValueKind::Function(VmFunctionData {
				function,
				return_type,
				blocks: Vec::new(),
			}),
		})
	}

	pub fn inst(&self, value: VmValueId) -> Option<&VmInstData> {
		match &self.values[value.index()].kind {
			VmValueKind::Inst(inst) => Some(inst),
			_ => None,
		}
	}

	pub fn block(&self, value: VmValueId) -> Option<&VmBlockData> {
		match &self.values[value.index()].kind {
			VmValueKind::Block(block) => Some(block),
			_ => None,
		}
	}

	pub fn function(&self, value: VmValueId) -> Option<&VmFunctionData> {
		match &self.values[value.index()].kind {
			VmValueKind::Function(function) => Some(function),
			_ => None,
		}
	}

	pub fn constant(&self, value: VmValueId) -> Option<&VmConstant> {
		match &self.values[value.index()].kind {
			VmValueKind::Constant(constant) => Some(constant),
			_ => None,
		}
	}

	pub fn add_use(&mut self, value: VmValueId, user: VmValueId) {
		self.values[value.index()].users.push(user);
	}

	/// Detach one use; a value left with no users and no side effects is
	/// removed from its parent, releasing its own operands in turn.
	pub fn remove_use(&mut self, value: VmValueId, user: VmValueId) {
		let users = &mut self.values[value.index()].users;

		if let Some(pos) = users.iter().position(|el| *el == user) {
			users.swap_remove(pos);
		}

		if !self.values[value.index()].users.is_empty() {
			return;
		}

		match &self.values[value.index()].kind {
			VmValueKind::Inst(inst) => {
				if !inst.has_side_effects {
					if let Some(parent) = inst.parent {
						self.remove_instruction(parent, value);
					}
				}
			}
			VmValueKind::Block(block) => {
				if let Some(parent) = block.parent {
					self.remove_block(parent, value);
				}
			}
			_ => {}
		}
	}

	pub fn add_argument(&mut self, inst: VmValueId, argument: VmValueId) {
		debug_assert!(self.values[argument.index()].ty != VmType::Void);

		if let VmValueKind::Inst(data) = &mut self.values[inst.index()].kind {
			data.arguments.push(argument);
		}

		self.add_use(argument, inst);
	}

	pub fn add_instruction(&mut self, block: VmValueId, inst: VmValueId) {
		if let VmValueKind::Inst(data) = &mut self.values[inst.index()].kind {
			debug_assert!(data.parent.is_none());

			data.parent = Some(block);
		}

		if let VmValueKind::Block(data) = &mut self.values[block.index()].kind {
			data.instructions.push(inst);
		}
	}

	pub fn remove_instruction(&mut self, block: VmValueId, inst: VmValueId) {
		if let VmValueKind::Block(data) = &mut self.values[block.index()].kind {
			if let Some(pos) = data.instructions.iter().position(|el| *el == inst) {
				data.instructions.remove(pos);
			}
		}

		let arguments = match &mut self.values[inst.index()].kind {
			VmValueKind::Inst(data) => {
				data.parent = None;

				std::mem::take(&mut data.arguments)
			}
			_ => Vec::new(),
		};

		for argument in arguments {
			self.remove_use(argument, inst);
		}
	}

	pub fn add_block(&mut self, function: VmValueId, block: VmValueId) {
		if let VmValueKind::Block(data) = &mut self.values[block.index()].kind {
			debug_assert!(data.parent.is_none());

			data.parent = Some(function);
		}

		if let VmValueKind::Function(data) = &mut self.values[function.index()].kind {
			data.blocks.push(block);
		}
	}

	pub fn remove_block(&mut self, function: VmValueId, block: VmValueId) {
		if let VmValueKind::Function(data) = &mut self.values[function.index()].kind {
			if let Some(pos) = data.blocks.iter().position(|el| *el == block) {
				data.blocks.remove(pos);
			}
		}

		loop {
			let last = match &self.values[block.index()].kind {
				VmValueKind::Block(data) => data.instructions.last().copied(),
				_ => None,
			};

			match last {
				Some(inst) => self.remove_instruction(block, inst),
				None => break,
			}
		}

		if let VmValueKind::Block(data) = &mut self.values[block.index()].kind {
			data.parent = None;
		}
	}

	/// Append a new instruction to the current block.
	pub fn create_instruction(
		&mut self,
		ty: VmType,
		cmd: VmInstType,
		arguments: &[VmValueId],
	) -> VmValueId {
		let block = self.current_block.expect("a block is active during lowering");

		self.next_instruction_id += 1;

		let inst = self.push_value(VmValue {
			ty,
			users: Vec::new(),
			kind: VmValueKind::Inst(VmInstData {
				cmd,
				arguments: Vec::new(),
				parent: None,
				has_side_effects: has_side_effects(cmd),
			}),
		});

		for argument in arguments {
			self.add_argument(inst, *argument);
		}

		self.add_instruction(block, inst);

		inst
	}
}

#[cfg(test)]
mod tests {
	use super::*;

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
	fn operands_register_users() {
		let (mut module, _block) = module_with_block();

		let lhs = module.create_constant_int(1);
		let rhs = module.create_constant_int(2);

		let sum = module.create_instruction(VmType::Int, VmInstType::Add, &[lhs, rhs]);

		assert!(module.values[lhs.index()].users.contains(&sum));
		assert!(module.values[rhs.index()].users.contains(&sum));
	}

	#[test]
	fn removal_unlinks_operands_and_block() {
		let (mut module, block) = module_with_block();

		let lhs = module.create_constant_int(1);
		let rhs = module.create_constant_int(2);

		let sum = module.create_instruction(VmType::Int, VmInstType::Add, &[lhs, rhs]);

		module.remove_instruction(block, sum);

		assert!(module.inst(sum).unwrap().arguments.is_empty());
		assert!(module.inst(sum).unwrap().parent.is_none());
		assert!(module.values[lhs.index()].users.is_empty());
		assert!(!module.block(block).unwrap().instructions.contains(&sum));
	}

	#[test]
	fn dropping_last_use_removes_pure_instructions() {
		let (mut module, block) = module_with_block();

		let lhs = module.create_constant_int(1);
		let rhs = module.create_constant_int(2);

		let sum = module.create_instruction(VmType::Int, VmInstType::Add, &[lhs, rhs]);

		// A user appears and then goes away
		let user = module.create_instruction(VmType::Int, VmInstType::Neg, &[sum]);

		module.remove_instruction(block, user);

		// The pure add had no remaining users and vanished with it
		assert!(!module.block(block).unwrap().instructions.contains(&sum));
		assert!(module.inst(sum).unwrap().arguments.is_empty());
	}

	#[test]
	fn stores_survive_with_no_users() {
		let (mut module, block) = module_with_block();

		let address = module.create_constant_pointer(0);
		let value = module.create_constant_int(7);

		let store =
			module.create_instruction(VmType::Void, VmInstType::StoreInt, &[address, value]);

		let probe = module.create_instruction(VmType::Int, VmInstType::LoadInt, &[address]);

		module.remove_instruction(block, probe);

		assert!(module.block(block).unwrap().instructions.contains(&store));
	}
}
