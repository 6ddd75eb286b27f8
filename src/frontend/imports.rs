use std::path::Path;

use crate::frontend::{
	string_hash, AliasData, AnalyzeResult, ArgumentData, CompileError, CompileErrorKind,
	ConstValue, ConstantData, Expr, ExprKind, ExpressionContext, FunctionData, FunctionSyntax,
	MatchData, ScopeOwner, SourceSpan, TypeEntry, TypeId, TypeKind, VariableData,
};

/// Module-import collaborator: resolves a module path to compiled bytecode.
pub trait ModuleProvider {
	fn bytecode(&self, path: &str) -> Option<Vec<u8>>;

	fn import_path(&self) -> Option<&str> {
		None
	}
}

/// Provider with no modules; the analyzer falls back to intrinsic stubs.
pub struct NoModules;

impl ModuleProvider for NoModules {
	fn bytecode(&self, _path: &str) -> Option<Vec<u8>> {
		None
	}
}

/// Filesystem provider rooted at an optional import path.
pub struct FileModuleProvider {
	pub import_path: Option<String>,
}

impl ModuleProvider for FileModuleProvider {
	fn bytecode(&self, path: &str) -> Option<Vec<u8>> {
		if let Some(import_path) = &self.import_path {
			let prefixed = Path::new(import_path).join(path);

			if let Ok(data) = std::fs::read(prefixed) {
				return Some(data);
			}
		}

		std::fs::read(path).ok()
	}

	fn import_path(&self) -> Option<&str> {
		self.import_path.as_deref()
	}
}

// Extern record categories, bit-exact with the serializer
const SUBCAT_NONE: u32 = 0;
const SUBCAT_ARRAY: u32 = 1;
const SUBCAT_POINTER: u32 = 2;
const SUBCAT_FUNCTION: u32 = 3;
const SUBCAT_CLASS: u32 = 4;

const TYPE_COMPLEX: u32 = 0;

const FUNC_COROUTINE: u32 = 1;

const LOCAL_PARAM_FLAG_EXPLICIT: u32 = 1;
const LOCAL_NO_DEFAULT: u32 = 0xffff;

const NO_INDEX: u32 = !0u32;

const HEADER_WORDS: usize = 10;

const NAMESPACE_RECORD_WORDS: usize = 2;
const TYPE_RECORD_WORDS: usize = 13;
const MEMBER_RECORD_WORDS: usize = 2;
const CONSTANT_RECORD_WORDS: usize = 3;
const TYPEDEF_RECORD_WORDS: usize = 3;
const VARIABLE_RECORD_WORDS: usize = 4;
const FUNCTION_RECORD_WORDS: usize = 13;
const LOCAL_RECORD_WORDS: usize = 4;

struct Reader<'a> {
	data: &'a [u8],
	span: SourceSpan,
	module: &'a str,
}

impl<'a> Reader<'a> {
	fn word(&self, index: usize) -> Result<u32, CompileError> {
		let offset = index * 4;

		if offset + 4 > self.data.len() {
			return Err(CompileError::new(
				self.span,
				CompileErrorKind::ImportError,
				format!("module {} bytecode is truncated", self.module),
			));
		}

		Ok(u32::from_le_bytes([
			self.data[offset],
			self.data[offset + 1],
			self.data[offset + 2],
			self.data[offset + 3],
		]))
	}

	fn long(&self, index: usize) -> Result<u64, CompileError> {
		let low = self.word(index)? as u64;
		let high = self.word(index + 1)? as u64;

		Ok(low | (high << 32))
	}
}

struct Header {
	type_count: usize,
	member_count: usize,
	constant_count: usize,
	namespace_count: usize,
	typedef_count: usize,
	variable_export_count: usize,
	function_count: usize,
	module_function_count: usize,
	local_count: usize,
	symbol_length: usize,
}

struct ModuleTables<'a> {
	reader: Reader<'a>,
	header: Header,
	namespaces_at: usize,
	types_at: usize,
	members_at: usize,
	constants_at: usize,
	typedefs_at: usize,
	variables_at: usize,
	functions_at: usize,
	locals_at: usize,
	symbols: &'a [u8],
	/// Imported type index to the installed type id.
	types: Vec<Option<TypeId>>,
}

impl<'a> ModuleTables<'a> {
	fn parse(
		data: &'a [u8],
		span: SourceSpan,
		module: &'a str,
	) -> Result<ModuleTables<'a>, CompileError> {
		let reader = Reader { data, span, module };

		let header = Header {
			type_count: reader.word(0)? as usize,
			member_count: reader.word(1)? as usize,
			constant_count: reader.word(2)? as usize,
			namespace_count: reader.word(3)? as usize,
			typedef_count: reader.word(4)? as usize,
			variable_export_count: reader.word(5)? as usize,
			function_count: reader.word(6)? as usize,
			module_function_count: reader.word(7)? as usize,
			local_count: reader.word(8)? as usize,
			symbol_length: reader.word(9)? as usize,
		};

		let namespaces_at = HEADER_WORDS;
		let types_at = namespaces_at + header.namespace_count * NAMESPACE_RECORD_WORDS;
		let members_at = types_at + header.type_count * TYPE_RECORD_WORDS;
		let constants_at = members_at + header.member_count * MEMBER_RECORD_WORDS;
		let typedefs_at = constants_at + header.constant_count * CONSTANT_RECORD_WORDS;
		let variables_at = typedefs_at + header.typedef_count * TYPEDEF_RECORD_WORDS;
		let functions_at = variables_at + header.variable_export_count * VARIABLE_RECORD_WORDS;
		let locals_at = functions_at + header.function_count * FUNCTION_RECORD_WORDS;

		let symbols_offset = (locals_at + header.local_count * LOCAL_RECORD_WORDS) * 4;

		if symbols_offset + header.symbol_length > data.len() {
			return Err(CompileError::new(
				span,
				CompileErrorKind::ImportError,
				format!("module {} bytecode is truncated", module),
			));
		}

		let symbols = &data[symbols_offset..symbols_offset + header.symbol_length];

		let type_count = header.type_count;

		Ok(ModuleTables {
			reader,
			header,
			namespaces_at,
			types_at,
			members_at,
			constants_at,
			typedefs_at,
			variables_at,
			functions_at,
			locals_at,
			symbols,
			types: vec![None; type_count],
		})
	}

	fn symbol(&self, offset: u32) -> Result<String, CompileError> {
		let offset = offset as usize;

		let end = self.symbols[offset..]
			.iter()
			.position(|byte| *byte == 0)
			.map(|pos| offset + pos)
			.ok_or_else(|| {
				CompileError::new(
					self.reader.span,
					CompileErrorKind::ImportError,
					format!(
						"module {} symbol table is not null-terminated",
						self.reader.module
					),
				)
			})?;

		Ok(String::from_utf8_lossy(&self.symbols[offset..end]).into_owned())
	}

	fn resolve_type(&self, index: u32) -> Option<TypeId> {
		self.types.get(index as usize).copied().flatten()
	}
}

fn import_error(span: SourceSpan, message: String) -> CompileError {
	CompileError::new(span, CompileErrorKind::ImportError, message)
}

fn import_module_namespaces(
	ctx: &mut ExpressionContext,
	tables: &ModuleTables,
) -> Result<(), CompileError> {
	for i in 0..tables.header.namespace_count {
		let at = tables.namespaces_at + i * NAMESPACE_RECORD_WORDS;

		let _parent_hash = tables.reader.word(at)?;
		let name_offset = tables.reader.word(at + 1)?;

		let name = tables.symbol(name_offset)?;

		let exists = ctx.namespaces.iter().any(|ns| ns.full_name == name);

		if !exists {
			let full_name_hash = string_hash(&name);

			let unique_id = ctx.unique_namespace_id;
			ctx.unique_namespace_id += 1;

			ctx.add_namespace(crate::frontend::NamespaceData {
				source: tables.reader.span,
				parent: None,
				name: name.clone(),
				full_name: name,
				full_name_hash,
				unique_id,
			});
		}
	}

	Ok(())
}

/// Generic arguments of an imported class instance, read from the typedef
/// records attached to its type.
fn class_generics_from_typedefs(
	tables: &ModuleTables,
	type_index: usize,
	name: &str,
	module: &str,
) -> Result<Vec<MatchData>, CompileError> {
	let span = tables.reader.span;

	let mut generics = Vec::new();

	for k in 0..tables.header.typedef_count {
		let at = tables.typedefs_at + k * TYPEDEF_RECORD_WORDS;

		let name_offset = tables.reader.word(at)?;
		let target_index = tables.reader.word(at + 1)?;
		let parent_index = tables.reader.word(at + 2)?;

		if parent_index == NO_INDEX || parent_index as usize != type_index {
			continue;
		}

		let alias_name = tables.symbol(name_offset)?;

		let target = tables.resolve_type(target_index).ok_or_else(|| {
			import_error(
				span,
				format!(
					"can't find generic argument '{}' type for '{}' in module {}",
					alias_name, name, module
				),
			)
		})?;

		generics.push(MatchData {
			name: alias_name,
			ty: target,
		});
	}

	Ok(generics)
}

fn import_module_types(
	ctx: &mut ExpressionContext,
	tables: &mut ModuleTables,
	module: &str,
) -> Result<(), CompileError> {
	let span = tables.reader.span;

	for i in 0..tables.header.type_count {
		let at = tables.types_at + i * TYPE_RECORD_WORDS;

		let name_offset = tables.reader.word(at)?;
		let name_hash = tables.reader.word(at + 1)?;
		let sub_cat = tables.reader.word(at + 2)?;
		let type_cat = tables.reader.word(at + 3)?;
		let sub_type = tables.reader.word(at + 4)?;
		let arr_size_or_members = tables.reader.word(at + 5)?;
		let constant_count = tables.reader.word(at + 6)?;
		let constant_offset = tables.reader.word(at + 7)?;
		let default_align = tables.reader.word(at + 8)?;
		let size = tables.reader.word(at + 9)?;
		let definition_offset = tables.reader.word(at + 10)?;
		let definition_offset_start = tables.reader.word(at + 11)?;
		let _namespace_hash = tables.reader.word(at + 12)?;

		let name = tables.symbol(name_offset)?;

		// Types already known by name are reused as-is
		if let Some(existing) = ctx.type_map.find(name_hash) {
			tables.types[i] = Some(existing);
			continue;
		}

		let imported = match sub_cat {
			SUBCAT_POINTER => {
				let target = tables.resolve_type(sub_type).ok_or_else(|| {
					import_error(
						span,
						format!("can't find target type for '{}' in module {}", name, module),
					)
				})?;

				ctx.get_reference_type(target)
			}
			SUBCAT_ARRAY => {
				let target = tables.resolve_type(sub_type).ok_or_else(|| {
					import_error(
						span,
						format!("can't find element type for '{}' in module {}", name, module),
					)
				})?;

				if arr_size_or_members == NO_INDEX {
					ctx.get_unsized_array_type(target)
				} else {
					ctx.get_array_type(target, arr_size_or_members as i64)
				}
			}
			SUBCAT_FUNCTION => {
				// The member list stores the return type and arguments
				let member_at = tables.members_at + sub_type as usize * MEMBER_RECORD_WORDS;

				let return_index = tables.reader.word(member_at)?;

				let return_type = tables.resolve_type(return_index).ok_or_else(|| {
					import_error(
						span,
						format!("can't find return type for '{}' in module {}", name, module),
					)
				})?;

				let mut arguments = Vec::new();

				for k in 1..arr_size_or_members as usize {
					let argument_at = member_at + k * MEMBER_RECORD_WORDS;

					let argument_index = tables.reader.word(argument_at)?;

					let argument = tables.resolve_type(argument_index).ok_or_else(|| {
						import_error(
							span,
							format!(
								"can't find argument {} type for '{}' in module {}",
								k, name, module
							),
						)
					})?;

					arguments.push(argument);
				}

				ctx.get_function_type(return_type, arguments)
			}
			SUBCAT_NONE | SUBCAT_CLASS => {
				// A prototype exports only its definition source; reanalyzing
				// it would need the parser collaborator
				if definition_offset_start != NO_INDEX {
					return Err(import_error(
						span,
						format!(
							"can't import generic class prototype '{}' from module {} without a parser",
							name, module
						),
					));
				}

				// A generic class instance carries a high-bit-tagged backref
				// to its prototype; its arguments live in the typedef records
				// attached to this type
				let instance_proto = if definition_offset != NO_INDEX
					&& definition_offset & 0x80000000 != 0
				{
					let proto_index = definition_offset & 0x7fffffff;

					let proto = tables.resolve_type(proto_index).ok_or_else(|| {
						import_error(
							span,
							format!(
								"can't find prototype of generic class instance '{}' in module {}",
								name, module
							),
						)
					})?;

					Some(proto)
				} else {
					None
				};

				let kind = if sub_cat == SUBCAT_NONE
					&& type_cat != TYPE_COMPLEX
					&& instance_proto.is_none()
				{
					TypeKind::Enum
				} else {
					let mut class = crate::frontend::ClassData::default();

					if let Some(proto) = instance_proto {
						class.proto = Some(proto);
						class.generics =
							class_generics_from_typedefs(tables, i, &name, module)?;
					}

					TypeKind::Class(class)
				};

				let mut entry = TypeEntry {
					name: name.clone(),
					name_hash,
					size: size as u64,
					alignment: default_align as u64,
					padding: 0,
					is_generic: false,
					imported: true,
					source: span,
					members: Vec::new(),
					constants: Vec::new(),
					kind,
				};

				// Member variables with their stored offsets
				let member_base = tables.members_at
					+ sub_type as usize * MEMBER_RECORD_WORDS;

				let mut member_names_at = {
					let name_terminator = tables.symbols[name_offset as usize..]
						.iter()
						.position(|byte| *byte == 0)
						.unwrap_or(0);

					name_offset as usize + name_terminator + 1
				};

				if matches!(entry.kind, TypeKind::Class(_)) {
					for n in 0..arr_size_or_members as usize {
						let member_at = member_base + n * MEMBER_RECORD_WORDS;

						let member_type_index = tables.reader.word(member_at)?;
						let member_offset = tables.reader.word(member_at + 1)?;

						let member_type =
							tables.resolve_type(member_type_index).ok_or_else(|| {
								import_error(
									span,
									format!(
										"can't find member {} type for '{}' in module {}",
										n + 1,
										name,
										module
									),
								)
							})?;

						let member_name = tables.symbol(member_names_at as u32)?;

						member_names_at += member_name.len() + 1;

						let unique_id = ctx.unique_variable_id;
						ctx.unique_variable_id += 1;

						let member_hash = string_hash(&member_name);

						let member = ctx.variables.len();

						ctx.variables.push(VariableData {
							source: span,
							scope: ctx.global_scope,
							ty: member_type,
							name: member_name,
							name_hash: member_hash,
							alignment: ctx.types[member_type].alignment,
							offset: member_offset as u64,
							unique_id,
							is_reference: false,
							imported: true,
						});

						entry.members.push(member);
					}

					for n in 0..constant_count as usize {
						let constant_at = tables.constants_at
							+ (constant_offset as usize + n) * CONSTANT_RECORD_WORDS;

						let constant_type_index = tables.reader.word(constant_at)?;
						let raw = tables.reader.long(constant_at + 1)?;

						let constant_type =
							tables.resolve_type(constant_type_index).ok_or_else(|| {
								import_error(
									span,
									format!(
										"can't find constant {} type for '{}' in module {}",
										n + 1,
										name,
										module
									),
								)
							})?;

						let constant_name = tables.symbol(member_names_at as u32)?;

						member_names_at += constant_name.len() + 1;

						let value = if constant_type == ctx.builtin.bool_ {
							ConstValue::Bool(raw != 0)
						} else if ctx.is_integer_type(constant_type)
							|| ctx.types[constant_type].is_enum()
						{
							ConstValue::Long(raw as i64)
						} else if ctx.is_floating_point_type(constant_type) {
							ConstValue::Double(f64::from_bits(raw))
						} else {
							return Err(import_error(
								span,
								format!(
									"can't import constant {} of type '{}'",
									n + 1,
									ctx.type_name(constant_type)
								),
							));
						};

						entry.constants.push(ConstantData {
							name: constant_name,
							ty: constant_type,
							value,
						});
					}
				}

				let id = ctx.add_type(entry);

				// Instances join the memo map so later requests for the
				// same mangled name reuse the imported class
				if instance_proto.is_some() {
					ctx.generic_type_map.insert(name_hash, id);
				}

				id
			}
			_ => {
				return Err(import_error(
					span,
					format!("new type in module {} named {} unsupported", module, name),
				))
			}
		};

		tables.types[i] = Some(imported);
	}

	Ok(())
}

fn import_module_variables(
	ctx: &mut ExpressionContext,
	tables: &ModuleTables,
	module: &str,
) -> Result<(), CompileError> {
	let span = tables.reader.span;

	for i in 0..tables.header.variable_export_count {
		let at = tables.variables_at + i * VARIABLE_RECORD_WORDS;

		let name_offset = tables.reader.word(at)?;
		let name_hash = tables.reader.word(at + 1)?;
		let type_index = tables.reader.word(at + 2)?;
		let offset = tables.reader.word(at + 3)?;

		let name = tables.symbol(name_offset)?;

		// Temporaries are not importable symbols
		if name.starts_with("$temp") {
			continue;
		}

		let ty = tables.resolve_type(type_index).ok_or_else(|| {
			import_error(
				span,
				format!("can't find variable '{}' type in module {}", name, module),
			)
		})?;

		let unique_id = ctx.unique_variable_id;
		ctx.unique_variable_id += 1;

		let is_vtable = name.starts_with("$vtbl");

		let variable = ctx.add_variable(VariableData {
			source: span,
			scope: ctx.global_scope,
			ty,
			name,
			name_hash,
			alignment: ctx.types[ty].alignment,
			offset: offset as u64,
			unique_id,
			is_reference: false,
			imported: true,
		});

		if is_vtable {
			ctx.vtables.push(variable);
		}
	}

	Ok(())
}

fn import_module_typedefs(
	ctx: &mut ExpressionContext,
	tables: &ModuleTables,
	module: &str,
) -> Result<(), CompileError> {
	let span = tables.reader.span;

	for i in 0..tables.header.typedef_count {
		let at = tables.typedefs_at + i * TYPEDEF_RECORD_WORDS;

		let name_offset = tables.reader.word(at)?;
		let target_index = tables.reader.word(at + 1)?;
		let parent_index = tables.reader.word(at + 2)?;

		let name = tables.symbol(name_offset)?;
		let name_hash = string_hash(&name);

		let target = tables.resolve_type(target_index).ok_or_else(|| {
			import_error(
				span,
				format!("can't find alias '{}' target type in module {}", name, module),
			)
		})?;

		if let Some(existing) = ctx.type_map.find(name_hash) {
			if ctx.types[existing].name == name {
				return Err(import_error(
					span,
					format!(
						"type '{}' alias '{}' is equal to previously imported class",
						ctx.type_name(target),
						name
					),
				));
			}

			if existing != target {
				return Err(import_error(
					span,
					format!(
						"type '{}' alias '{}' is equal to previously imported alias",
						ctx.type_name(target),
						name
					),
				));
			}
		} else if parent_index != NO_INDEX {
			let parent = tables.resolve_type(parent_index).ok_or_else(|| {
				import_error(span, format!("can't find alias '{}' parent type", name))
			})?;

			match ctx.types[parent].class_mut() {
				Some(class) => class.aliases.push(MatchData { name, ty: target }),
				None => {
					return Err(import_error(span, "can't import class alias".to_string()))
				}
			}
		} else {
			let unique_id = ctx.unique_alias_id;
			ctx.unique_alias_id += 1;

			ctx.add_alias(AliasData {
				source: span,
				scope: ctx.global_scope,
				ty: target,
				name,
				name_hash,
				unique_id,
				imported: true,
			});
		}
	}

	Ok(())
}

fn import_module_functions(
	ctx: &mut ExpressionContext,
	tables: &ModuleTables,
	module: &str,
) -> Result<(), CompileError> {
	let span = tables.reader.span;

	let import_count = tables.header.function_count - tables.header.module_function_count;

	let first_function = ctx.functions.len();

	let mut imported_ids: Vec<Option<crate::frontend::FunctionId>> = vec![None; import_count];

	for i in 0..import_count {
		let at = tables.functions_at + i * FUNCTION_RECORD_WORDS;

		let name_offset = tables.reader.word(at)?;
		let name_hash = tables.reader.word(at + 1)?;
		let func_type_index = tables.reader.word(at + 2)?;
		let parent_index = tables.reader.word(at + 3)?;
		let context_index = tables.reader.word(at + 4)?;
		let param_count = tables.reader.word(at + 5)?;
		let explicit_type_count = tables.reader.word(at + 6)?;
		let func_cat = tables.reader.word(at + 7)?;
		let namespace_hash = tables.reader.word(at + 8)?;
		let first_local = tables.reader.word(at + 9)?;
		let _generic_offset_start = tables.reader.word(at + 10)?;
		let generic_return_index = tables.reader.word(at + 11)?;
		let is_generic_instance = tables.reader.word(at + 12)?;

		let name = tables.symbol(name_offset)?;

		let mut function_type = if func_type_index == 0 {
			None
		} else {
			Some(tables.resolve_type(func_type_index).ok_or_else(|| {
				import_error(
					span,
					format!("can't find function '{}' type in module {}", name, module),
				)
			})?)
		};

		// A function with the same name and type may already be known
		if let Some(function_type) = function_type {
			let mut previous = None;

			for existing in ctx.function_map.find_all(name_hash) {
				if ctx.functions[existing].ty == function_type {
					previous = Some(existing);
					break;
				}
			}

			if let Some(previous) = previous {
				if ctx.functions[previous].name.starts_with('$')
					|| ctx.functions[previous].is_generic_instance
				{
					imported_ids[i] = Some(previous);
					continue;
				}

				return Err(import_error(
					span,
					format!(
						"function {} (type {}) is already defined. While importing {}",
						ctx.functions[previous].name,
						ctx.type_name(ctx.functions[previous].ty),
						module
					),
				));
			}
		}

		if namespace_hash != NO_INDEX {
			return Err(import_error(
				span,
				"can't import namespace function".to_string(),
			));
		}

		let parent_type = if parent_index != NO_INDEX {
			Some(tables.resolve_type(parent_index).ok_or_else(|| {
				import_error(
					span,
					format!(
						"can't find function '{}' parent type in module {}",
						name, module
					),
				)
			})?)
		} else {
			None
		};

		let context_type = if context_index != NO_INDEX {
			Some(tables.resolve_type(context_index).ok_or_else(|| {
				import_error(
					span,
					format!(
						"can't find function '{}' context type in module {}",
						name, module
					),
				)
			})?)
		} else {
			None
		};

		let context_type = match context_type {
			Some(context_type) => context_type,
			None => {
				let target = parent_type.unwrap_or(ctx.builtin.void_);

				ctx.get_reference_type(target)
			}
		};

		// Explicit generic bindings follow the parameters in the local table
		let mut generics = Vec::new();

		for k in 0..explicit_type_count as usize {
			let local_at = tables.locals_at
				+ (first_local as usize + param_count as usize + k) * LOCAL_RECORD_WORDS;

			let local_name_offset = tables.reader.word(local_at)?;
			let local_type_index = tables.reader.word(local_at + 1)?;

			let local_name = tables.symbol(local_name_offset)?;

			let local_type = tables.resolve_type(local_type_index).ok_or_else(|| {
				import_error(
					span,
					format!(
						"can't find function '{}' explicit type '{}' in module {}",
						name, k, module
					),
				)
			})?;

			generics.push(MatchData {
				name: local_name,
				ty: local_type,
			});
		}

		let coroutine = func_cat == FUNC_COROUTINE;
		let accessor = name.ends_with('$');

		let added_parent_scope = if let Some(parent_type) = parent_type {
			ctx.push_scope(ScopeOwner::Type(parent_type));
			true
		} else {
			false
		};

		let mut arguments = Vec::new();

		for n in 0..param_count as usize {
			let local_at =
				tables.locals_at + (first_local as usize + n) * LOCAL_RECORD_WORDS;

			let local_name_offset = tables.reader.word(local_at)?;
			let local_type_index = tables.reader.word(local_at + 1)?;
			let param_flags = tables.reader.word(local_at + 2)?;

			let local_name = tables.symbol(local_name_offset)?;

			let local_type = tables.resolve_type(local_type_index).ok_or_else(|| {
				import_error(
					span,
					format!(
						"can't find argument {} type for '{}' in module {}",
						n + 1,
						name,
						module
					),
				)
			})?;

			arguments.push(ArgumentData {
				source: span,
				is_explicit: param_flags & LOCAL_PARAM_FLAG_EXPLICIT != 0,
				name: Some(local_name),
				ty: local_type,
				value: None,
			});
		}

		if function_type.is_none() {
			// A generic function exports its signature but keeps its body
			// as source; it cannot be instantiated without a parser
			let return_type = if generic_return_index != NO_INDEX {
				tables.resolve_type(generic_return_index).ok_or_else(|| {
					import_error(
						span,
						format!(
							"can't find generic function '{}' return type in module {}",
							name, module
						),
					)
				})?
			} else {
				ctx.builtin.auto_
			};

			let argument_types: Vec<TypeId> =
				arguments.iter().map(|argument| argument.ty).collect();

			function_type = Some(ctx.get_function_type(return_type, argument_types));
		}

		let unique_id = ctx.unique_function_id;
		ctx.unique_function_id += 1;

		let function = ctx.add_function(FunctionData {
			source: span,
			scope: ctx.scope,
			function_scope: None,
			ty: function_type.unwrap(),
			context_type,
			name,
			name_hash,
			generics,
			aliases: Vec::new(),
			arguments,
			definition: FunctionSyntax::None,
			coroutine,
			accessor,
			is_operator: false,
			is_prototype: false,
			has_explicit_return: true,
			imported: true,
			is_generic_instance: is_generic_instance != 0,
			proto: None,
			implementation: None,
			instances: Vec::new(),
			context_argument: None,
			context_variable: None,
			upvalues: Vec::new(),
			stack_size: 0,
			unique_id,
		});

		imported_ids[i] = Some(function);

		if added_parent_scope {
			ctx.pop_scope(Some(span))?;
		}
	}

	// Default argument values reference functions by module-local index
	for i in 0..import_count {
		let at = tables.functions_at + i * FUNCTION_RECORD_WORDS;

		let param_count = tables.reader.word(at + 5)?;
		let first_local = tables.reader.word(at + 9)?;

		let function = match imported_ids[i] {
			Some(function) if function >= first_function => function,
			_ => continue,
		};

		for n in 0..param_count as usize {
			let local_at =
				tables.locals_at + (first_local as usize + n) * LOCAL_RECORD_WORDS;

			let default_func_id = tables.reader.word(local_at + 3)?;

			if default_func_id == LOCAL_NO_DEFAULT {
				continue;
			}

			let target_index =
				default_func_id as usize - tables.header.module_function_count;

			let target = imported_ids.get(target_index).copied().flatten().ok_or_else(
				|| {
					import_error(
						span,
						format!(
							"can't find default argument function in module {}",
							module
						),
					)
				},
			)?;

			let target_type = ctx.functions[target].ty;

			let (return_type, _) = ctx.types[target_type].function_parts().unwrap();

			let void_ref = {
				let void_ = ctx.builtin.void_;

				ctx.get_reference_type(void_)
			};

			let access = Expr::new(
				span,
				target_type,
				ExprKind::FunctionAccess {
					function: target,
					context: Box::new(Expr::new(span, void_ref, ExprKind::NullptrLiteral)),
				},
			);

			ctx.functions[function].arguments[n].value = Some(Expr::new(
				span,
				return_type,
				ExprKind::FunctionCall {
					function: Box::new(access),
					arguments: Vec::new(),
				},
			));
		}
	}

	Ok(())
}

/// Install a compiled module's symbols into the context.
pub fn import_module(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	bytecode: &[u8],
	module: &str,
) -> AnalyzeResult<()> {
	let mut tables = ModuleTables::parse(bytecode, span, module)?;

	import_module_namespaces(ctx, &tables)?;
	import_module_types(ctx, &mut tables, module)?;
	import_module_variables(ctx, &tables, module)?;
	import_module_typedefs(ctx, &tables, module)?;
	import_module_functions(ctx, &tables, module)?;

	Ok(())
}

/// Resolve a dotted import path against the provider and install the module.
pub fn import_module_by_path(
	ctx: &mut ExpressionContext,
	span: SourceSpan,
	path: &[String],
	provider: &dyn ModuleProvider,
) -> AnalyzeResult<()> {
	let file_path = format!("{}.nc", path.join("/"));

	let bytecode = provider.bytecode(&file_path).ok_or_else(|| {
		CompileError::new(
			span,
			CompileErrorKind::ImportError,
			format!("module '{}' not found", path.join(".")),
		)
	})?;

	import_module(ctx, span, &bytecode, &file_path)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn push_word(data: &mut Vec<u8>, value: u32) {
		data.extend_from_slice(&value.to_le_bytes());
	}

	fn empty_module() -> Vec<u8> {
		let mut data = Vec::new();

		for _ in 0..HEADER_WORDS {
			push_word(&mut data, 0);
		}

		data
	}

	#[test]
	fn empty_module_imports_cleanly() {
		let mut ctx = ExpressionContext::new();
		let data = empty_module();

		import_module(&mut ctx, SourceSpan::default(), &data, "test.nc").unwrap();
	}

	#[test]
	fn truncated_module_is_rejected() {
		let mut ctx = ExpressionContext::new();
		let data = vec![0u8; 7];

		let result = import_module(&mut ctx, SourceSpan::default(), &data, "test.nc");

		assert!(result.is_err());
		assert_eq!(result.unwrap_err().kind, CompileErrorKind::ImportError);
	}

	#[test]
	fn generic_prototype_import_is_rejected() {
		let mut ctx = ExpressionContext::new();

		let mut data = Vec::new();

		push_word(&mut data, 1); // typeCount
		push_word(&mut data, 0); // memberCount
		push_word(&mut data, 0); // constantCount
		push_word(&mut data, 0); // namespaceCount
		push_word(&mut data, 0); // typedefCount
		push_word(&mut data, 0); // variableExportCount
		push_word(&mut data, 0); // functionCount
		push_word(&mut data, 0); // moduleFunctionCount
		push_word(&mut data, 0); // localCount

		let symbols = b"P\0";

		push_word(&mut data, symbols.len() as u32);

		// ExternTypeInfo for a generic class prototype 'P': its definition
		// source offset is set, everything else is empty
		push_word(&mut data, 0); // offsetToName
		push_word(&mut data, string_hash("P"));
		push_word(&mut data, SUBCAT_CLASS);
		push_word(&mut data, TYPE_COMPLEX);
		push_word(&mut data, 0); // subType
		push_word(&mut data, 0); // members
		push_word(&mut data, 0); // constantCount
		push_word(&mut data, 0); // constantOffset
		push_word(&mut data, 4); // defaultAlign
		push_word(&mut data, 0); // size
		push_word(&mut data, NO_INDEX); // definitionOffset
		push_word(&mut data, 12); // definitionOffsetStart
		push_word(&mut data, NO_INDEX); // namespaceHash

		data.extend_from_slice(symbols);

		let result = import_module(&mut ctx, SourceSpan::default(), &data, "test.nc");

		let error = result.expect_err("prototypes need the parser to import");

		assert_eq!(error.kind, CompileErrorKind::ImportError);
		assert!(error.message.contains("generic class prototype"));
	}

	#[test]
	fn imports_a_global_variable() {
		let mut ctx = ExpressionContext::new();

		// One type record reusing builtin 'int' by name, one exported
		// variable of that type
		let mut data = Vec::new();

		push_word(&mut data, 1); // typeCount
		push_word(&mut data, 0); // memberCount
		push_word(&mut data, 0); // constantCount
		push_word(&mut data, 0); // namespaceCount
		push_word(&mut data, 0); // typedefCount
		push_word(&mut data, 1); // variableExportCount
		push_word(&mut data, 0); // functionCount
		push_word(&mut data, 0); // moduleFunctionCount
		push_word(&mut data, 0); // localCount

		let symbols = b"int\0counter\0";

		push_word(&mut data, symbols.len() as u32);

		// ExternTypeInfo for 'int'
		push_word(&mut data, 0); // offsetToName
		push_word(&mut data, string_hash("int")); // nameHash
		push_word(&mut data, SUBCAT_NONE);
		push_word(&mut data, 1); // simple category
		push_word(&mut data, 0); // subType
		push_word(&mut data, 0); // members
		push_word(&mut data, 0); // constantCount
		push_word(&mut data, 0); // constantOffset
		push_word(&mut data, 4); // defaultAlign
		push_word(&mut data, 4); // size
		push_word(&mut data, NO_INDEX); // definitionOffset
		push_word(&mut data, NO_INDEX); // definitionOffsetStart
		push_word(&mut data, NO_INDEX); // namespaceHash

		// ExternVarInfo for 'counter'
		push_word(&mut data, 4); // offsetToName
		push_word(&mut data, string_hash("counter"));
		push_word(&mut data, 0); // type index
		push_word(&mut data, 16); // offset

		data.extend_from_slice(symbols);

		import_module(&mut ctx, SourceSpan::default(), &data, "test.nc").unwrap();

		let variable = ctx.variable_map.find(string_hash("counter")).unwrap();

		assert_eq!(ctx.variables[variable].ty, ctx.builtin.int_);
		assert_eq!(ctx.variables[variable].offset, 16);
		assert!(ctx.variables[variable].imported);
	}
}
