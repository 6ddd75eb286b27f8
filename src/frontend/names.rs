//! Name hashing and mangling. Symbol lookup is keyed by a djb2 rolling hash
//! over the full namespace-qualified name; the hash of a prefix can be
//! extended with more bytes, which is what makes qualified lookup cheap.

pub fn string_hash(s: &str) -> u32 {
	string_hash_continue(5381, s)
}

pub fn string_hash_continue(hash: u32, s: &str) -> u32 {
	let mut hash = hash;

	for b in s.bytes() {
		hash = hash.wrapping_shl(5).wrapping_add(hash).wrapping_add(b as u32);
	}

	hash
}

pub fn reference_type_name(inner: &str) -> String {
	format!("{} ref", inner)
}

pub fn array_type_name(inner: &str, length: i64) -> String {
	format!("{}[{}]", inner, length)
}

pub fn unsized_array_type_name(inner: &str) -> String {
	format!("{}[]", inner)
}

pub fn function_type_name(return_type: &str, arguments: &[&str]) -> String {
	let mut name = format!("{} ref(", return_type);

	for (idx, argument) in arguments.iter().enumerate() {
		if idx != 0 {
			name.push(',');
		}

		name.push_str(argument);
	}

	name.push(')');
	name
}

pub fn generic_class_type_name(proto: &str, arguments: &[&str]) -> String {
	let mut name = format!("{}<", proto);

	for (idx, argument) in arguments.iter().enumerate() {
		if idx != 0 {
			name.push(',');
		}

		name.push_str(argument);
	}

	name.push('>');
	name
}

pub fn member_function_name(parent: &str, name: &str) -> String {
	format!("{}::{}", parent, name)
}

pub fn accessor_name(name: &str) -> String {
	format!("{}$", name)
}

pub fn function_set_type_name(types: &[&str]) -> String {
	let mut name = String::new();

	for (idx, ty) in types.iter().enumerate() {
		if idx != 0 {
			name.push_str(" or ");
		}

		name.push_str(ty);
	}

	name
}

pub fn argument_set_type_name(types: &[&str]) -> String {
	let mut name = String::from("(");

	for (idx, ty) in types.iter().enumerate() {
		if idx != 0 {
			name.push(',');
		}

		name.push_str(ty);
	}

	name.push(')');
	name
}

pub fn member_set_type_name(class_name: &str) -> String {
	format!("{} members", class_name)
}

pub fn function_context_type_name(function_name: &str, index: usize) -> String {
	format!("__{}_{}_cls", function_name.replace(':', "_"), index)
}

pub fn function_context_variable_name(function_name: &str, index: usize) -> String {
	format!("${}_{}_ext", function_name.replace(':', "_"), index)
}

pub fn function_context_member_name(prefix: &str, suffix: &str) -> String {
	format!("{}_{}", prefix, suffix)
}

pub fn vtable_name(type_name_hash: u32, function_name: &str) -> String {
	format!("$vtbl{:0>10}{}", type_name_hash, function_name)
}

pub fn is_power_of_two(value: u64) -> bool {
	value != 0 && (value & (value - 1)) == 0
}

pub fn alignment_offset(offset: u64, alignment: u64) -> u64 {
	if alignment == 0 || offset % alignment == 0 {
		0
	} else {
		alignment - (offset % alignment)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn hash_continuation_matches_whole_string() {
		let whole = string_hash("std.vector");
		let partial = string_hash_continue(string_hash("std."), "vector");

		assert_eq!(whole, partial);
	}

	#[test]
	fn type_names() {
		assert_eq!(reference_type_name("int"), "int ref");
		assert_eq!(array_type_name("int", 4), "int[4]");
		assert_eq!(unsized_array_type_name("double"), "double[]");
		assert_eq!(function_type_name("void", &["int", "char"]), "void ref(int,char)");
		assert_eq!(generic_class_type_name("Pair", &["int", "double"]), "Pair<int,double>");
	}

	#[test]
	fn alignment_math() {
		assert_eq!(alignment_offset(0, 8), 0);
		assert_eq!(alignment_offset(5, 4), 3);
		assert_eq!(alignment_offset(8, 8), 0);
		assert!(is_power_of_two(16));
		assert!(!is_power_of_two(12));
		assert!(!is_power_of_two(0));
	}
}
