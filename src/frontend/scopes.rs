use std::rc::Rc;

use crate::frontend::{
	AliasId, Expr, FunctionId, MatchData, NamespaceId, ScopeId, SourceSpan,
	SynFunctionDefinition, SynShortFunctionDefinition, TypeId, VariableId,
};

/// Multi-map from full-name hash to symbol ids, with stack semantics: the
/// most recently inserted symbol for a hash shadows earlier ones, and
/// overload iteration yields most-recent-first.
#[derive(Clone, Debug, Default)]
pub struct SymbolMap<T: Copy + PartialEq> {
	buckets: std::collections::HashMap<u32, Vec<T>>,
}

impl<T: Copy + PartialEq> SymbolMap<T> {
	pub fn new() -> Self {
		Self {
			buckets: std::collections::HashMap::new(),
		}
	}

	pub fn insert(&mut self, hash: u32, value: T) {
		self.buckets.entry(hash).or_default().push(value);
	}

	pub fn remove(&mut self, hash: u32, value: T) {
		if let Some(bucket) = self.buckets.get_mut(&hash) {
			if let Some(pos) = bucket.iter().rposition(|el| *el == value) {
				bucket.remove(pos);
			}

			if bucket.is_empty() {
				self.buckets.remove(&hash);
			}
		}
	}

	pub fn contains(&self, hash: u32, value: T) -> bool {
		self.buckets
			.get(&hash)
			.map(|bucket| bucket.contains(&value))
			.unwrap_or(false)
	}

	pub fn find(&self, hash: u32) -> Option<T> {
		self.buckets
			.get(&hash)
			.and_then(|bucket| bucket.last().copied())
	}

	/// All symbols registered under the hash, most recent first.
	pub fn find_all(&self, hash: u32) -> Vec<T> {
		self.buckets
			.get(&hash)
			.map(|bucket| bucket.iter().rev().copied().collect())
			.unwrap_or_default()
	}

	pub fn len(&self) -> usize {
		self.buckets.values().map(|bucket| bucket.len()).sum()
	}

	pub fn is_empty(&self) -> bool {
		self.buckets.is_empty()
	}
}

#[derive(Clone, Debug)]
pub struct NamespaceData {
	pub source: SourceSpan,
	pub parent: Option<NamespaceId>,
	pub name: String,
	pub full_name: String,
	pub full_name_hash: u32,
	pub unique_id: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeOwner {
	None,
	Function(FunctionId),
	Type(TypeId),
	Namespace(NamespaceId),
}

#[derive(Clone, Debug)]
pub struct ScopeData {
	pub parent: Option<ScopeId>,
	pub owner: ScopeOwner,
	pub scope_depth: usize,
	pub loop_depth: u32,
	pub unique_id: u32,
	pub children: Vec<ScopeId>,
	pub variables: Vec<VariableId>,
	pub functions: Vec<FunctionId>,
	pub types: Vec<TypeId>,
	pub aliases: Vec<AliasId>,
	/// Global allocation watermark; meaningful on the root scope only.
	pub global_size: u64,
}

impl ScopeData {
	pub fn new(parent: Option<ScopeId>, depth: usize, owner: ScopeOwner, unique_id: u32) -> Self {
		Self {
			parent,
			owner,
			scope_depth: depth,
			loop_depth: 0,
			unique_id,
			children: Vec::new(),
			variables: Vec::new(),
			functions: Vec::new(),
			types: Vec::new(),
			aliases: Vec::new(),
			global_size: 0,
		}
	}
}

#[derive(Clone, Debug)]
pub struct VariableData {
	pub source: SourceSpan,
	pub scope: ScopeId,
	pub ty: TypeId,
	pub name: String,
	pub name_hash: u32,
	pub alignment: u64,
	pub offset: u64,
	pub unique_id: u32,
	/// Reads go through one extra dereference.
	pub is_reference: bool,
	pub imported: bool,
}

#[derive(Clone, Debug)]
pub struct AliasData {
	pub source: SourceSpan,
	pub scope: ScopeId,
	pub ty: TypeId,
	pub name: String,
	pub name_hash: u32,
	pub unique_id: u32,
	pub imported: bool,
}

/// Formal argument of a function, or a prepared call-site argument.
#[derive(Clone, Debug)]
pub struct ArgumentData {
	pub source: SourceSpan,
	pub is_explicit: bool,
	pub name: Option<String>,
	pub ty: TypeId,
	/// Default initializer on formals; the actual value on call arguments.
	pub value: Option<Expr>,
}

impl ArgumentData {
	pub fn unnamed(source: SourceSpan, ty: TypeId, value: Expr) -> Self {
		Self {
			source,
			is_explicit: false,
			name: None,
			ty,
			value: Some(value),
		}
	}
}

#[derive(Clone, Debug)]
pub struct UpvalueData {
	pub variable: VariableId,
	/// Pointer member on the context class.
	pub target: VariableId,
	/// Value shadow written when the closure is closed on coroutine capture.
	pub copy: VariableId,
}

/// Syntax retained for re-analysis of generic functions.
#[derive(Clone, Debug)]
pub enum FunctionSyntax {
	None,
	Full(Rc<SynFunctionDefinition>),
	Short(Rc<SynShortFunctionDefinition>),
}

#[derive(Clone, Debug)]
pub struct FunctionData {
	pub source: SourceSpan,
	pub scope: ScopeId,
	pub function_scope: Option<ScopeId>,
	/// A `Function` type; starts as `Function(Auto, ...)` for inferred returns.
	pub ty: TypeId,
	pub context_type: TypeId,
	pub name: String,
	pub name_hash: u32,
	pub generics: Vec<MatchData>,
	pub aliases: Vec<MatchData>,
	pub arguments: Vec<ArgumentData>,
	pub definition: FunctionSyntax,
	pub coroutine: bool,
	pub accessor: bool,
	pub is_operator: bool,
	pub is_prototype: bool,
	pub has_explicit_return: bool,
	pub imported: bool,
	pub is_generic_instance: bool,
	pub proto: Option<FunctionId>,
	pub implementation: Option<FunctionId>,
	pub instances: Vec<FunctionId>,
	pub context_argument: Option<VariableId>,
	pub context_variable: Option<VariableId>,
	pub upvalues: Vec<UpvalueData>,
	pub stack_size: u64,
	pub unique_id: u32,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn symbol_map_shadows_and_unwinds() {
		let mut map: SymbolMap<usize> = SymbolMap::new();

		map.insert(7, 1);
		map.insert(7, 2);

		assert_eq!(map.find(7), Some(2));
		assert_eq!(map.find_all(7), vec![2, 1]);

		map.remove(7, 2);
		assert_eq!(map.find(7), Some(1));

		map.remove(7, 1);
		assert_eq!(map.find(7), None);
		assert!(map.is_empty());
	}

	#[test]
	fn symbol_map_removes_latest_duplicate_first() {
		let mut map: SymbolMap<usize> = SymbolMap::new();

		map.insert(3, 9);
		map.insert(3, 5);
		map.insert(3, 9);

		map.remove(3, 9);
		assert_eq!(map.find_all(3), vec![5, 9]);
	}
}
