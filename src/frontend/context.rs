use std::collections::HashMap;

use crate::frontend::{
	alignment_offset, names, string_hash, AliasData, AliasId, CompileError, CompileErrorKind,
	ConstantData, FunctionData, FunctionId, MatchData, NamespaceData, NamespaceId, ScopeData,
	ScopeId, ScopeOwner, SourceSpan, SymbolMap, TypeEntry, TypeId, TypeKind, VariableData,
	VariableId, MAX_TYPE_SIZE, POINTER_SIZE,
};

/// Well-known type ids, created once per compilation.
#[derive(Clone, Copy, Debug)]
pub struct BuiltinTypes {
	pub void_: TypeId,
	pub bool_: TypeId,
	pub char_: TypeId,
	pub short_: TypeId,
	pub int_: TypeId,
	pub long_: TypeId,
	pub float_: TypeId,
	pub double_: TypeId,
	pub typeid_: TypeId,
	pub function_id: TypeId,
	pub nullptr_: TypeId,
	pub auto_: TypeId,
	pub auto_ref: TypeId,
	pub auto_array: TypeId,
}

/// All state owned by one compilation: the type universe, symbol arenas,
/// the scope stack and the lookup maps. Passed through every analyzer entry.
pub struct ExpressionContext {
	pub types: Vec<TypeEntry>,
	pub variables: Vec<VariableData>,
	pub functions: Vec<FunctionData>,
	pub aliases: Vec<AliasData>,
	pub namespaces: Vec<NamespaceData>,
	pub scopes: Vec<ScopeData>,

	pub scope: ScopeId,
	pub global_scope: ScopeId,

	pub type_map: SymbolMap<TypeId>,
	pub variable_map: SymbolMap<VariableId>,
	pub function_map: SymbolMap<FunctionId>,

	/// Mangled-name hash of a generic class instance to the memoized class.
	pub generic_type_map: HashMap<u32, TypeId>,

	ref_cache: HashMap<TypeId, TypeId>,
	array_cache: HashMap<(TypeId, i64), TypeId>,
	unsized_cache: HashMap<TypeId, TypeId>,
	function_cache: HashMap<(TypeId, Vec<TypeId>), TypeId>,

	pub builtin: BuiltinTypes,

	pub vtables: Vec<VariableId>,
	pub vtable_map: HashMap<(TypeId, String), VariableId>,

	pub definitions: Vec<FunctionId>,
	pub base_module_function_count: usize,

	pub unique_namespace_id: u32,
	pub unique_variable_id: u32,
	pub unique_function_id: u32,
	pub unique_alias_id: u32,
	pub unique_scope_id: u32,
	pub unnamed_func_count: u32,
	pub unnamed_variable_count: u32,
}

fn primitive(name: &str, size: u64, alignment: u64, kind: TypeKind) -> TypeEntry {
	TypeEntry {
		name: name.to_string(),
		name_hash: string_hash(name),
		size,
		alignment,
		padding: 0,
		is_generic: false,
		imported: false,
		source: SourceSpan::default(),
		members: Vec::new(),
		constants: Vec::new(),
		kind,
	}
}

impl ExpressionContext {
	pub fn new() -> Self {
		let mut ctx = Self {
			types: Vec::new(),
			variables: Vec::new(),
			functions: Vec::new(),
			aliases: Vec::new(),
			namespaces: Vec::new(),
			scopes: Vec::new(),
			scope: 0,
			global_scope: 0,
			type_map: SymbolMap::new(),
			variable_map: SymbolMap::new(),
			function_map: SymbolMap::new(),
			generic_type_map: HashMap::new(),
			ref_cache: HashMap::new(),
			array_cache: HashMap::new(),
			unsized_cache: HashMap::new(),
			function_cache: HashMap::new(),
			builtin: BuiltinTypes {
				void_: 0,
				bool_: 0,
				char_: 0,
				short_: 0,
				int_: 0,
				long_: 0,
				float_: 0,
				double_: 0,
				typeid_: 0,
				function_id: 0,
				nullptr_: 0,
				auto_: 0,
				auto_ref: 0,
				auto_array: 0,
			},
			vtables: Vec::new(),
			vtable_map: HashMap::new(),
			definitions: Vec::new(),
			base_module_function_count: 0,
			unique_namespace_id: 0,
			unique_variable_id: 0,
			unique_function_id: 0,
			unique_alias_id: 0,
			unique_scope_id: 0,
			unnamed_func_count: 0,
			unnamed_variable_count: 0,
		};

		ctx.scopes.push(ScopeData::new(None, 0, ScopeOwner::None, 0));
		ctx.unique_scope_id = 1;
		ctx.scope = 0;
		ctx.global_scope = 0;

		ctx.builtin.void_ = ctx.add_type(primitive("void", 0, 0, TypeKind::Void));
		ctx.builtin.bool_ = ctx.add_type(primitive("bool", 1, 1, TypeKind::Bool));
		ctx.builtin.char_ = ctx.add_type(primitive("char", 1, 1, TypeKind::Char));
		ctx.builtin.short_ = ctx.add_type(primitive("short", 2, 2, TypeKind::Short));
		ctx.builtin.int_ = ctx.add_type(primitive("int", 4, 4, TypeKind::Int));
		ctx.builtin.long_ = ctx.add_type(primitive("long", 8, 8, TypeKind::Long));
		ctx.builtin.float_ = ctx.add_type(primitive("float", 4, 4, TypeKind::Float));
		ctx.builtin.double_ = ctx.add_type(primitive("double", 8, 8, TypeKind::Double));
		ctx.builtin.typeid_ = ctx.add_type(primitive("typeid", 4, 4, TypeKind::TypeId));
		ctx.builtin.function_id = ctx.add_type(primitive("__function", 4, 4, TypeKind::FunctionId));
		ctx.builtin.nullptr_ =
			ctx.add_type(primitive("__nullptr", POINTER_SIZE, 4, TypeKind::NullPtr));

		let mut auto_entry = primitive("auto", 0, 0, TypeKind::Auto);
		auto_entry.is_generic = false;
		ctx.builtin.auto_ = ctx.add_type(auto_entry);

		ctx.builtin.auto_ref = ctx.add_type(primitive(
			"auto ref",
			4 + POINTER_SIZE,
			4,
			TypeKind::AutoRef,
		));
		ctx.builtin.auto_array = ctx.add_type(primitive(
			"auto[]",
			4 + POINTER_SIZE + 4,
			4,
			TypeKind::AutoArray,
		));

		let typeid_ = ctx.builtin.typeid_;
		let void_ref = ctx.get_reference_type(ctx.builtin.void_);
		let int_ = ctx.builtin.int_;

		let auto_ref = ctx.builtin.auto_ref;
		let type_member = ctx.make_member(auto_ref, "type", typeid_, 0);
		let ptr_member = ctx.make_member(auto_ref, "ptr", void_ref, 4);
		ctx.types[auto_ref].members.push(type_member);
		ctx.types[auto_ref].members.push(ptr_member);

		let auto_array = ctx.builtin.auto_array;
		let type_member = ctx.make_member(auto_array, "type", typeid_, 0);
		let ptr_member = ctx.make_member(auto_array, "ptr", void_ref, 4);
		let size_member = ctx.make_member(auto_array, "size", int_, 4 + POINTER_SIZE);
		ctx.types[auto_array].members.push(type_member);
		ctx.types[auto_array].members.push(ptr_member);
		ctx.types[auto_array].members.push(size_member);

		ctx
	}

	fn make_member(&mut self, _parent: TypeId, name: &str, ty: TypeId, offset: u64) -> VariableId {
		let id = self.variables.len();

		self.variables.push(VariableData {
			source: SourceSpan::default(),
			scope: self.global_scope,
			ty,
			name: name.to_string(),
			name_hash: string_hash(name),
			alignment: self.types[ty].alignment,
			offset,
			unique_id: self.unique_variable_id,
			is_reference: false,
			imported: false,
		});

		self.unique_variable_id += 1;

		id
	}

	pub fn error(&self, span: SourceSpan, kind: CompileErrorKind, message: String) -> CompileError {
		CompileError::new(span, kind, message)
	}

	pub fn type_name(&self, ty: TypeId) -> &str {
		&self.types[ty].name
	}

	// ------------------------------------------------------------------
	// Scope stack
	// ------------------------------------------------------------------

	pub fn push_scope(&mut self, owner: ScopeOwner) -> ScopeId {
		let id = self.scopes.len();
		let depth = self.scopes[self.scope].scope_depth + 1;

		self.scopes
			.push(ScopeData::new(Some(self.scope), depth, owner, self.unique_scope_id));

		self.unique_scope_id += 1;
		self.scopes[self.scope].children.push(id);
		self.scope = id;

		id
	}

	pub fn push_loop_scope(&mut self) -> ScopeId {
		let id = self.push_scope(ScopeOwner::None);

		self.scopes[id].loop_depth = 1;

		id
	}

	pub fn push_temporary_scope(&mut self) -> ScopeId {
		let id = self.scopes.len();
		let depth = self.scopes[self.scope].scope_depth + 1;

		self.scopes
			.push(ScopeData::new(Some(self.scope), depth, ScopeOwner::None, 0));

		self.scope = id;

		id
	}

	/// Pop the current scope, unmapping its symbols. With no location, a
	/// namespace scope instead migrates its contents into the enclosing
	/// namespace-or-global scope so they stay addressable.
	pub fn pop_scope(&mut self, location: Option<SourceSpan>) -> Result<(), CompileError> {
		let scope = self.scope;

		if location.is_none() && matches!(self.scopes[scope].owner, ScopeOwner::Namespace(_)) {
			let mut adopter = self.scopes[scope].parent.expect("namespace scope has a parent");

			while !matches!(self.scopes[adopter].owner, ScopeOwner::Namespace(_))
				&& self.scopes[adopter].parent.is_some()
			{
				adopter = self.scopes[adopter].parent.unwrap();
			}

			let variables = std::mem::take(&mut self.scopes[scope].variables);
			let functions = std::mem::take(&mut self.scopes[scope].functions);
			let types = std::mem::take(&mut self.scopes[scope].types);
			let aliases = std::mem::take(&mut self.scopes[scope].aliases);

			self.scopes[adopter].variables.extend(variables);
			self.scopes[adopter].functions.extend(functions);
			self.scopes[adopter].types.extend(types);
			self.scopes[adopter].aliases.extend(aliases);

			self.scope = self.scopes[scope].parent.unwrap();
			return Ok(());
		}

		self.unmap_scope(scope)?;

		self.scope = self.scopes[scope].parent.expect("cannot pop the root scope");
		Ok(())
	}

	/// Remove a scope's symbols from the lookup maps without changing the
	/// scope stack.
	fn unmap_scope(&mut self, scope: ScopeId) -> Result<(), CompileError> {
		for i in (0..self.scopes[scope].variables.len()).rev() {
			let variable = self.scopes[scope].variables[i];
			let hash = self.variables[variable].name_hash;

			if self.variable_map.contains(hash, variable) {
				self.variable_map.remove(hash, variable);
			}
		}

		for i in (0..self.scopes[scope].functions.len()).rev() {
			let function = self.scopes[scope].functions[i];

			// Class member functions stay visible after the class closes
			let function_scope = self.functions[function].scope;

			if matches!(self.scopes[function_scope].owner, ScopeOwner::Type(_)) {
				continue;
			}

			if self.scopes[scope].parent.is_some()
				&& self.functions[function].is_prototype
				&& self.functions[function].implementation.is_none()
			{
				return Err(CompileError::new(
					self.functions[function].source,
					CompileErrorKind::FlowError,
					format!(
						"local function '{}' went out of scope unimplemented",
						self.functions[function].name
					),
				));
			}

			let hash = self.functions[function].name_hash;

			if self.function_map.contains(hash, function) {
				self.function_map.remove(hash, function);
			}
		}

		for i in (0..self.scopes[scope].types.len()).rev() {
			let ty = self.scopes[scope].types[i];
			let hash = self.types[ty].name_hash;

			if self.type_map.contains(hash, ty) {
				self.type_map.remove(hash, ty);
			}
		}

		for i in (0..self.scopes[scope].aliases.len()).rev() {
			let alias = self.scopes[scope].aliases[i];
			let hash = self.aliases[alias].name_hash;
			let target = self.aliases[alias].ty;

			if self.type_map.contains(hash, target) {
				self.type_map.remove(hash, target);
			}
		}

		Ok(())
	}

	/// Re-insert the symbols of `target` and its ancestors, limited to
	/// definitions preceding `location` (imported symbols always qualify).
	fn restore_scopes_at_point(&mut self, target: ScopeId, location: Option<SourceSpan>) {
		if let Some(parent) = self.scopes[target].parent {
			if parent != self.scope {
				self.restore_scopes_at_point(parent, location);
			}
		}

		let visible = |imported: bool, source: SourceSpan| match location {
			None => true,
			Some(point) => imported || source.begin <= point.begin,
		};

		for i in 0..self.scopes[target].variables.len() {
			let variable = self.scopes[target].variables[i];
			let data = &self.variables[variable];

			if visible(data.imported, data.source) {
				self.variable_map.insert(data.name_hash, variable);
			}
		}

		for i in 0..self.scopes[target].functions.len() {
			let function = self.scopes[target].functions[i];
			let data = &self.functions[function];

			// Class member functions are never unmapped
			if matches!(self.scopes[data.scope].owner, ScopeOwner::Type(_)) {
				continue;
			}

			if visible(data.imported, data.source) {
				self.function_map.insert(data.name_hash, function);
			}
		}

		for i in 0..self.scopes[target].types.len() {
			let ty = self.scopes[target].types[i];
			let entry = &self.types[ty];

			if visible(entry.imported, entry.source) {
				self.type_map.insert(entry.name_hash, ty);
			}
		}

		for i in 0..self.scopes[target].aliases.len() {
			let alias = self.scopes[target].aliases[i];
			let data = &self.aliases[alias];

			if visible(data.imported, data.source) {
				self.type_map.insert(data.name_hash, data.ty);
			}
		}

		self.scope = target;
	}

	/// Leave the current scope chain and re-enter `target` as it looked at
	/// `target_location`. Used for generic function and class reanalysis.
	pub fn switch_to_scope_at_point(
		&mut self,
		curr_location: Option<SourceSpan>,
		target: ScopeId,
		target_location: Option<SourceSpan>,
	) -> Result<(), CompileError> {
		while self.scopes[self.scope].scope_depth > self.scopes[target].scope_depth {
			self.pop_scope(None)?;
		}

		let mut curr = target;

		while self.scopes[curr].scope_depth > self.scopes[self.scope].scope_depth {
			curr = self.scopes[curr].parent.expect("deeper scope has a parent");
		}

		while self.scopes[self.scope].parent != self.scopes[curr].parent {
			self.pop_scope(None)?;

			curr = self.scopes[curr].parent.expect("scope chains join at the root");
		}

		// Leave the common parent; its symbols return below, filtered by
		// definition position. Without a current location a namespace-owned
		// scope migrates its contents into the enclosing namespace-or-global
		// scope instead of unmapping them.
		let common = self.scope;

		if curr_location.is_none()
			&& matches!(self.scopes[common].owner, ScopeOwner::Namespace(_))
		{
			self.pop_scope(None)?;
		} else {
			self.unmap_scope(common)?;

			self.scope = self.scopes[common].parent.unwrap_or(usize::MAX);
		}

		self.restore_scopes_at_point(target, target_location);
		Ok(())
	}

	pub fn get_current_function(&self) -> Option<FunctionId> {
		let mut curr = Some(self.scope);

		while let Some(scope) = curr {
			match self.scopes[scope].owner {
				ScopeOwner::Type(_) => return None,
				ScopeOwner::Function(function) => return Some(function),
				_ => {}
			}

			curr = self.scopes[scope].parent;
		}

		None
	}

	pub fn get_current_type(&self) -> Option<TypeId> {
		let mut curr = Some(self.scope);

		while let Some(scope) = curr {
			if let ScopeOwner::Type(ty) = self.scopes[scope].owner {
				return Some(ty);
			}

			curr = self.scopes[scope].parent;
		}

		None
	}

	pub fn get_current_namespace(&self) -> Option<NamespaceId> {
		let mut curr = Some(self.scope);

		while let Some(scope) = curr {
			if let ScopeOwner::Namespace(ns) = self.scopes[scope].owner {
				return Some(ns);
			}

			curr = self.scopes[scope].parent;
		}

		None
	}

	/// The function whose frame owns variables of `scope`, stopping at type
	/// and namespace boundaries.
	pub fn get_function_owner(&self, scope: ScopeId) -> Option<FunctionId> {
		let mut curr = Some(scope);

		while let Some(scope) = curr {
			match self.scopes[scope].owner {
				ScopeOwner::Type(_) | ScopeOwner::Namespace(_) => return None,
				ScopeOwner::Function(function) => return Some(function),
				ScopeOwner::None => {}
			}

			curr = self.scopes[scope].parent;
		}

		None
	}

	pub fn generic_class_instantiation_depth(&self) -> usize {
		let mut depth = 0;
		let mut curr = Some(self.scope);

		while let Some(scope) = curr {
			if let ScopeOwner::Type(ty) = self.scopes[scope].owner {
				if let Some(class) = self.types[ty].class() {
					if !class.generics.is_empty() {
						depth += 1;
					}
				}
			}

			curr = self.scopes[scope].parent;
		}

		depth
	}

	/// Namespace-or-global scopes from the current one outward; these are the
	/// only points where qualified lookup keys change.
	pub fn named_or_global_scopes(&self) -> Vec<ScopeId> {
		let mut result = Vec::new();
		let mut curr = Some(self.scope);

		while let Some(scope) = curr {
			let named = matches!(self.scopes[scope].owner, ScopeOwner::Namespace(_));

			if named || self.scopes[scope].parent.is_none() {
				result.push(scope);
			}

			curr = self.scopes[scope].parent;
		}

		result
	}

	/// Hash of `path.name` qualified by the namespace owning `scope`.
	pub fn scope_qualified_hash(&self, scope: ScopeId, path: &[String], name: &str) -> u32 {
		let mut hash = match self.scopes[scope].owner {
			ScopeOwner::Namespace(ns) => {
				names::string_hash_continue(self.namespaces[ns].full_name_hash, ".")
			}
			_ => string_hash(""),
		};

		for part in path {
			hash = names::string_hash_continue(hash, part);
			hash = names::string_hash_continue(hash, ".");
		}

		names::string_hash_continue(hash, name)
	}

	// ------------------------------------------------------------------
	// Allocation
	// ------------------------------------------------------------------

	/// Allocate `size` bytes in the nearest function frame, class layout or
	/// the global area, honoring `alignment`. Returns the base offset.
	pub fn allocate_in_scope(&mut self, alignment: u64, size: u64) -> u64 {
		debug_assert!(alignment <= 16 && (alignment == 0 || alignment.is_power_of_two()));

		let mut scope = self.scope;

		while self.scopes[scope].parent.is_some() {
			match self.scopes[scope].owner {
				ScopeOwner::Function(function) => {
					let data = &mut self.functions[function];

					data.stack_size += alignment_offset(data.stack_size, alignment);

					let result = data.stack_size;

					data.stack_size += size;

					return result;
				}
				ScopeOwner::Type(ty) => {
					let entry = &mut self.types[ty];

					entry.size += alignment_offset(entry.size, alignment);

					let result = entry.size;

					entry.size += size;

					return result;
				}
				_ => {}
			}

			scope = self.scopes[scope].parent.unwrap();
		}

		let root = &mut self.scopes[scope];

		root.global_size += alignment_offset(root.global_size, alignment);

		let result = root.global_size;

		root.global_size += size;

		result
	}

	// ------------------------------------------------------------------
	// Symbol registration
	// ------------------------------------------------------------------

	pub fn add_type(&mut self, entry: TypeEntry) -> TypeId {
		let id = self.types.len();
		let hash = entry.name_hash;

		self.types.push(entry);
		self.scopes[self.scope].types.push(id);
		self.type_map.insert(hash, id);

		id
	}

	pub fn add_variable(&mut self, data: VariableData) -> VariableId {
		let id = self.variables.len();
		let hash = data.name_hash;

		self.variables.push(data);
		self.scopes[self.scope].variables.push(id);
		self.variable_map.insert(hash, id);

		id
	}

	pub fn add_function(&mut self, data: FunctionData) -> FunctionId {
		let id = self.functions.len();
		let hash = data.name_hash;

		self.functions.push(data);
		self.scopes[self.scope].functions.push(id);
		self.function_map.insert(hash, id);

		id
	}

	pub fn add_alias(&mut self, data: AliasData) -> AliasId {
		let id = self.aliases.len();
		let hash = data.name_hash;
		let target = data.ty;

		self.aliases.push(data);
		self.scopes[self.scope].aliases.push(id);
		self.type_map.insert(hash, target);

		id
	}

	pub fn add_namespace(&mut self, data: NamespaceData) -> NamespaceId {
		let id = self.namespaces.len();

		self.namespaces.push(data);

		id
	}

	/// Re-register a variable that already exists in the arena (base-class
	/// members and generic-class scope re-entry).
	pub fn register_existing_variable(&mut self, variable: VariableId) {
		let hash = self.variables[variable].name_hash;

		self.scopes[self.scope].variables.push(variable);
		self.variable_map.insert(hash, variable);
	}

	/// Name prefixed by the namespace chain enclosing the current scope,
	/// stopping at function and type boundaries.
	pub fn name_in_scope(&self, name: &str) -> String {
		let mut curr = Some(self.scope);

		while let Some(scope) = curr {
			match self.scopes[scope].owner {
				ScopeOwner::Function(_) | ScopeOwner::Type(_) => break,
				ScopeOwner::Namespace(ns) => {
					return format!("{}.{}", self.namespaces[ns].full_name, name);
				}
				ScopeOwner::None => {}
			}

			curr = self.scopes[scope].parent;
		}

		name.to_string()
	}

	/// Make a function invisible to lookup and detach it from its scope.
	pub fn hide_function(&mut self, function: FunctionId) {
		let hash = self.functions[function].name_hash;

		self.function_map.remove(hash, function);

		let scope = self.functions[function].scope;
		let functions = &mut self.scopes[scope].functions;

		if let Some(pos) = functions.iter().position(|el| *el == function) {
			functions.swap_remove(pos);
		}
	}

	pub fn is_generic_function(&self, function: FunctionId) -> bool {
		let data = &self.functions[function];

		if self.types[data.ty].is_generic {
			return true;
		}

		if let ScopeOwner::Type(owner) = self.scopes[data.scope].owner {
			if self.types[owner].is_generic {
				return true;
			}
		}

		data.generics.iter().any(|generic| self.types[generic.ty].is_generic)
	}

	// ------------------------------------------------------------------
	// Type predicates
	// ------------------------------------------------------------------

	pub fn is_integer_type(&self, ty: TypeId) -> bool {
		ty == self.builtin.bool_
			|| ty == self.builtin.char_
			|| ty == self.builtin.short_
			|| ty == self.builtin.int_
			|| ty == self.builtin.long_
	}

	pub fn is_floating_point_type(&self, ty: TypeId) -> bool {
		ty == self.builtin.float_ || ty == self.builtin.double_
	}

	pub fn is_numeric_type(&self, ty: TypeId) -> bool {
		self.is_integer_type(ty) || self.is_floating_point_type(ty)
	}

	/// Common type of a numeric binary operation, ranked
	/// double > float > long > int > short > char > bool.
	pub fn binary_op_result_type(&self, a: TypeId, b: TypeId) -> Option<TypeId> {
		let b_ = &self.builtin;

		for candidate in [b_.double_, b_.float_, b_.long_, b_.int_, b_.short_, b_.char_, b_.bool_] {
			if a == candidate || b == candidate {
				return Some(candidate);
			}
		}

		None
	}

	// ------------------------------------------------------------------
	// Interning
	// ------------------------------------------------------------------

	pub fn get_reference_type(&mut self, target: TypeId) -> TypeId {
		if let Some(existing) = self.ref_cache.get(&target) {
			return *existing;
		}

		let name = names::reference_type_name(&self.types[target].name);
		let is_generic = self.types[target].is_generic;

		let entry = TypeEntry {
			name_hash: string_hash(&name),
			name,
			size: POINTER_SIZE,
			alignment: 4,
			padding: 0,
			is_generic,
			imported: false,
			source: self.types[target].source,
			members: Vec::new(),
			constants: Vec::new(),
			kind: TypeKind::Ref { target },
		};

		let id = self.types.len();

		self.types.push(entry);

		if !is_generic {
			self.ref_cache.insert(target, id);
		}

		id
	}

	pub fn get_array_type(&mut self, elem: TypeId, length: i64) -> TypeId {
		if let Some(existing) = self.array_cache.get(&(elem, length)) {
			return *existing;
		}

		let name = names::array_type_name(&self.types[elem].name, length);
		let is_generic = self.types[elem].is_generic;
		let alignment = self.types[elem].alignment;

		let mut size = self.types[elem].size * length as u64;
		let maximum_alignment = alignment.max(4);

		let padding = if size % maximum_alignment != 0 {
			maximum_alignment - (size % maximum_alignment)
		} else {
			0
		};

		size += padding;

		let entry = TypeEntry {
			name_hash: string_hash(&name),
			name,
			size,
			alignment,
			padding,
			is_generic,
			imported: false,
			source: self.types[elem].source,
			members: Vec::new(),
			constants: Vec::new(),
			kind: TypeKind::Array { elem, length },
		};

		let id = self.types.len();

		self.types.push(entry);

		if !is_generic {
			self.array_cache.insert((elem, length), id);
		}

		id
	}

	pub fn get_unsized_array_type(&mut self, elem: TypeId) -> TypeId {
		if let Some(existing) = self.unsized_cache.get(&elem) {
			return *existing;
		}

		let name = names::unsized_array_type_name(&self.types[elem].name);
		let is_generic = self.types[elem].is_generic;

		let size_member = self.make_member(0, "size", self.builtin.int_, POINTER_SIZE);

		let entry = TypeEntry {
			name_hash: string_hash(&name),
			name,
			size: POINTER_SIZE + 4,
			alignment: 4,
			padding: 0,
			is_generic,
			imported: false,
			source: self.types[elem].source,
			members: vec![size_member],
			constants: Vec::new(),
			kind: TypeKind::UnsizedArray { elem },
		};

		let id = self.types.len();

		self.types.push(entry);

		if !is_generic {
			self.unsized_cache.insert(elem, id);
		}

		id
	}

	pub fn get_function_type(&mut self, return_type: TypeId, arguments: Vec<TypeId>) -> TypeId {
		if let Some(existing) = self.function_cache.get(&(return_type, arguments.clone())) {
			return *existing;
		}

		let argument_names: Vec<&str> = arguments
			.iter()
			.map(|arg| self.types[*arg].name.as_str())
			.collect();

		let name = names::function_type_name(&self.types[return_type].name, &argument_names);

		let is_generic = self.types[return_type].is_generic
			|| arguments.iter().any(|arg| self.types[*arg].is_generic);

		let entry = TypeEntry {
			name_hash: string_hash(&name),
			name,
			size: POINTER_SIZE + 4,
			alignment: 4,
			padding: 0,
			is_generic,
			imported: false,
			source: SourceSpan::default(),
			members: Vec::new(),
			constants: Vec::new(),
			kind: TypeKind::Function {
				return_type,
				arguments: arguments.clone(),
			},
		};

		let id = self.types.len();

		self.types.push(entry);

		if !is_generic {
			self.function_cache.insert((return_type, arguments), id);
		}

		id
	}

	pub fn get_generic_type(&mut self, alias: &str) -> TypeId {
		let name = if alias == "generic" {
			"generic".to_string()
		} else {
			format!("@{}", alias)
		};

		let entry = TypeEntry {
			name_hash: string_hash(&name),
			name,
			size: 0,
			alignment: 0,
			padding: 0,
			is_generic: true,
			imported: false,
			source: SourceSpan::default(),
			members: Vec::new(),
			constants: Vec::new(),
			kind: TypeKind::Generic {
				alias: alias.to_string(),
			},
		};

		let id = self.types.len();

		self.types.push(entry);

		id
	}

	/// Finalize a class layout: derive alignment from members when it was
	/// not explicit and pad the size to a multiple of max(alignment, 4).
	pub fn finalize_alignment(&mut self, ty: TypeId) -> Result<(), CompileError> {
		let mut maximum_alignment = 0;

		for i in 0..self.types[ty].members.len() {
			let member = self.types[ty].members[i];

			maximum_alignment = maximum_alignment.max(self.variables[member].alignment);
		}

		if self.types[ty].alignment == 0 {
			self.types[ty].alignment = maximum_alignment;
		}

		let maximum_alignment = self.types[ty].alignment.max(4);

		if self.types[ty].size % maximum_alignment != 0 {
			let padding = maximum_alignment - (self.types[ty].size % maximum_alignment);

			self.types[ty].padding = padding;
			self.types[ty].size += padding;
		}

		if self.types[ty].size > MAX_TYPE_SIZE {
			return Err(CompileError::new(
				self.types[ty].source,
				CompileErrorKind::LayoutLimit,
				format!(
					"class '{}' exceeds the maximum size of {} bytes",
					self.types[ty].name, MAX_TYPE_SIZE
				),
			));
		}

		Ok(())
	}

	pub fn find_class_constant(&self, ty: TypeId, name: &str) -> Option<&ConstantData> {
		self.types[ty].constants.iter().find(|c| c.name == name)
	}

	pub fn find_member(&self, ty: TypeId, name: &str) -> Option<VariableId> {
		self.types[ty]
			.members
			.iter()
			.copied()
			.find(|member| self.variables[*member].name == name)
	}

	pub fn is_derived_from(&self, derived: TypeId, base: TypeId) -> bool {
		let mut curr = Some(derived);

		while let Some(ty) = curr {
			if ty == base {
				return true;
			}

			curr = self.types[ty].class().and_then(|class| class.base_class);
		}

		false
	}

	pub fn class_generics(&self, ty: TypeId) -> &[MatchData] {
		static EMPTY: [MatchData; 0] = [];

		self.types[ty]
			.class()
			.map(|class| class.generics.as_slice())
			.unwrap_or(&EMPTY)
	}
}

impl Default for ExpressionContext {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reference_types_are_interned() {
		let mut ctx = ExpressionContext::new();

		let int_ = ctx.builtin.int_;
		let a = ctx.get_reference_type(int_);
		let b = ctx.get_reference_type(int_);

		assert_eq!(a, b);
		assert_eq!(ctx.type_name(a), "int ref");
		assert_eq!(ctx.types[a].size, POINTER_SIZE);
	}

	#[test]
	fn array_types_are_interned_and_padded() {
		let mut ctx = ExpressionContext::new();

		let char_ = ctx.builtin.char_;
		let a = ctx.get_array_type(char_, 5);
		let b = ctx.get_array_type(char_, 5);
		let c = ctx.get_array_type(char_, 6);

		assert_eq!(a, b);
		assert_ne!(a, c);

		// char[5] pads to a multiple of 4
		assert_eq!(ctx.types[a].size, 8);
		assert_eq!(ctx.types[a].padding, 3);
	}

	#[test]
	fn unsized_array_layout() {
		let mut ctx = ExpressionContext::new();

		let int_ = ctx.builtin.int_;
		let a = ctx.get_unsized_array_type(int_);
		let b = ctx.get_unsized_array_type(int_);

		assert_eq!(a, b);
		assert_eq!(ctx.types[a].size, POINTER_SIZE + 4);

		let size_member = ctx.types[a].members[0];
		assert_eq!(ctx.variables[size_member].name, "size");
		assert_eq!(ctx.variables[size_member].offset, POINTER_SIZE);
	}

	#[test]
	fn function_types_are_interned_structurally() {
		let mut ctx = ExpressionContext::new();

		let int_ = ctx.builtin.int_;
		let void_ = ctx.builtin.void_;

		let a = ctx.get_function_type(void_, vec![int_, int_]);
		let b = ctx.get_function_type(void_, vec![int_, int_]);
		let c = ctx.get_function_type(int_, vec![int_, int_]);

		assert_eq!(a, b);
		assert_ne!(a, c);
		assert_eq!(ctx.type_name(a), "void ref(int,int)");
	}

	#[test]
	fn binary_op_result_ranking() {
		let ctx = ExpressionContext::new();
		let b = ctx.builtin;

		assert_eq!(ctx.binary_op_result_type(b.int_, b.double_), Some(b.double_));
		assert_eq!(ctx.binary_op_result_type(b.float_, b.long_), Some(b.float_));
		assert_eq!(ctx.binary_op_result_type(b.char_, b.short_), Some(b.short_));
		assert_eq!(ctx.binary_op_result_type(b.bool_, b.bool_), Some(b.bool_));
		assert_eq!(ctx.binary_op_result_type(b.void_, b.int_), Some(b.int_));
	}

	#[test]
	fn allocation_walks_to_global_scope() {
		let mut ctx = ExpressionContext::new();

		let first = ctx.allocate_in_scope(4, 4);
		let second = ctx.allocate_in_scope(8, 8);
		let third = ctx.allocate_in_scope(1, 1);

		assert_eq!(first, 0);
		assert_eq!(second, 8);
		assert_eq!(third, 16);
	}

	#[test]
	fn generic_types_are_not_cached() {
		let mut ctx = ExpressionContext::new();

		let generic = ctx.get_generic_type("T");
		assert!(ctx.types[generic].is_generic);

		let a = ctx.get_reference_type(generic);
		let b = ctx.get_reference_type(generic);

		assert_ne!(a, b);
		assert!(ctx.types[a].is_generic);
	}
}
