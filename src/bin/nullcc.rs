use clap::{Arg, ArgAction, Command};
use serde::{Deserialize, Serialize};

use nullc::frontend::{import_module, ExpressionContext, ScopeOwner, SourceSpan};

#[derive(Clone, Debug, Serialize, Deserialize)]
struct ModuleReport {
	module: String,
	types: Vec<String>,
	variables: Vec<VariableReport>,
	functions: Vec<FunctionReport>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct VariableReport {
	name: String,
	ty: String,
	offset: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct FunctionReport {
	name: String,
	ty: String,
	coroutine: bool,
	member_of: Option<String>,
}

fn main() {
	let matches = Command::new("nullcc")
		.about("NULLC front-end driver")
		.arg(
			Arg::new("module")
				.help("Path to a compiled .nc module to inspect")
				.required(true)
				.value_name("MODULE"),
		)
		.arg(
			Arg::new("import_path")
				.short('I')
				.long("import-path")
				.value_name("DIR")
				.help("Base directory for module imports"),
		)
		.arg(
			Arg::new("json")
				.long("json")
				.help("Print the symbol report as JSON")
				.action(ArgAction::SetTrue),
		)
		.get_matches();

	let module = matches
		.get_one::<String>("module")
		.expect("clap enforces required argument")
		.to_owned();

	let import_path = matches.get_one::<String>("import_path").cloned();
	let json = matches.get_flag("json");

	let path = match &import_path {
		Some(import_path) => format!("{}/{}", import_path, module),
		None => module.clone(),
	};

	let bytecode = match std::fs::read(&path) {
		Ok(bytecode) => bytecode,
		Err(e) => {
			eprintln!("error: failed to read `{path}`: {e}");
			std::process::exit(1);
		}
	};

	let mut ctx = ExpressionContext::new();

	let builtin_types = ctx.types.len();
	let builtin_variables = ctx.variables.len();

	if let Err(error) = import_module(&mut ctx, SourceSpan::default(), &bytecode, &module) {
		nullc::diagnostics::pretty_print_error(&error, &module, "");
		std::process::exit(1);
	}

	let mut report = ModuleReport {
		module: module.clone(),
		types: Vec::new(),
		variables: Vec::new(),
		functions: Vec::new(),
	};

	for entry in ctx.types.iter().skip(builtin_types) {
		report.types.push(entry.name.clone());
	}

	for variable in ctx.variables.iter().skip(builtin_variables) {
		if !variable.imported {
			continue;
		}

		report.variables.push(VariableReport {
			name: variable.name.clone(),
			ty: ctx.types[variable.ty].name.clone(),
			offset: variable.offset,
		});
	}

	for function in &ctx.functions {
		if !function.imported {
			continue;
		}

		let member_of = match ctx.scopes[function.scope].owner {
			ScopeOwner::Type(parent) => Some(ctx.types[parent].name.clone()),
			_ => None,
		};

		report.functions.push(FunctionReport {
			name: function.name.clone(),
			ty: ctx.types[function.ty].name.clone(),
			coroutine: function.coroutine,
			member_of,
		});
	}

	if json {
		match serde_json::to_string_pretty(&report) {
			Ok(text) => println!("{text}"),
			Err(e) => {
				eprintln!("error: failed to serialize report: {e}");
				std::process::exit(1);
			}
		}

		return;
	}

	println!("module {}", report.module);

	println!("  types ({}):", report.types.len());

	for name in &report.types {
		println!("    {name}");
	}

	println!("  variables ({}):", report.variables.len());

	for variable in &report.variables {
		println!(
			"    {}: {} at {}",
			variable.name, variable.ty, variable.offset
		);
	}

	println!("  functions ({}):", report.functions.len());

	for function in &report.functions {
		let coroutine = if function.coroutine { " coroutine" } else { "" };

		match &function.member_of {
			Some(parent) => {
				println!("    {}: {}{} in {}", function.name, function.ty, coroutine, parent)
			}
			None => println!("    {}: {}{}", function.name, function.ty, coroutine),
		}
	}
}
