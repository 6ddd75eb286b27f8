use std::io;

use crate::frontend::{CompileError, CompileErrorKind, SourceSpan};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

pub fn pretty_print_error(err: &CompileError, file: &str, input: &str) {
	let mut stderr = StandardStream::stderr(ColorChoice::Auto);
	let _ = emit_error(&mut stderr, err, file, input);
}

fn kind_label(kind: CompileErrorKind) -> &'static str {
	match kind {
		CompileErrorKind::NameResolution => "name resolution",
		CompileErrorKind::TypeMismatch => "type mismatch",
		CompileErrorKind::OverloadSelection => "overload selection",
		CompileErrorKind::GenericInstantiation => "generic instantiation",
		CompileErrorKind::ConstantEvaluation => "constant evaluation",
		CompileErrorKind::LayoutLimit => "layout limit",
		CompileErrorKind::FlowError => "control flow",
		CompileErrorKind::ImportError => "module import",
	}
}

/// Line and column (both 1-based) of a byte offset, via the source text.
fn locate(input: &str, offset: u32) -> (usize, usize) {
	let offset = (offset as usize).min(input.len());

	let mut line = 1;
	let mut column = 1;

	for (position, ch) in input.char_indices() {
		if position >= offset {
			break;
		}

		if ch == '\n' {
			line += 1;
			column = 1;
		} else {
			column += 1;
		}
	}

	(line, column)
}

pub fn emit_error<W: WriteColor>(
	writer: &mut W,
	err: &CompileError,
	file: &str,
	input: &str,
) -> io::Result<()> {
	let (line, column) = locate(input, err.span.begin);

	let mut error_spec = ColorSpec::new();
	error_spec.set_fg(Some(Color::Red)).set_bold(true);
	writer.set_color(&error_spec)?;
	write!(writer, "error")?;
	writer.reset()?;

	write!(writer, " [{}]: {} at ", kind_label(err.kind), err.message)?;

	let mut cyan_spec = ColorSpec::new();
	cyan_spec.set_fg(Some(Color::Cyan));
	writer.set_color(&cyan_spec)?;
	writeln!(
		writer,
		"{}:{}:{}",
		if file.is_empty() { "<input>" } else { file },
		line,
		column
	)?;
	writer.reset()?;

	highlight_location(writer, err.span, line, column, input)?;

	Ok(())
}

fn highlight_location<W: WriteColor>(
	writer: &mut W,
	span: SourceSpan,
	line_number: usize,
	column_number: usize,
	input: &str,
) -> io::Result<()> {
	let raw_line = fetch_line(input, line_number);
	let (visual_line, columns) = visualize_line(raw_line);

	let (end_line, end_column) = locate(input, span.end.max(span.begin + 1));

	let end_column = if end_line == line_number {
		end_column
	} else {
		column_number + 1
	};

	let start_offset = column_to_visual_offset(column_number, &columns);
	let mut end_offset = column_to_visual_offset(end_column, &columns);

	if end_offset <= start_offset {
		end_offset = start_offset + 1;
	}

	let caret_width = end_offset - start_offset;
	let line_str = line_number.to_string();
	let gutter_width = line_str.len().max(2);

	let mut dim_spec = ColorSpec::new();
	dim_spec.set_fg(Some(Color::Ansi256(8)));
	let mut caret_spec = ColorSpec::new();
	caret_spec.set_fg(Some(Color::Red)).set_bold(true);
	let mut context_spec = ColorSpec::new();
	context_spec.set_fg(Some(Color::Ansi256(8))).set_dimmed(true);

	let prev_line_number = line_number.saturating_sub(1);
	if prev_line_number > 0 {
		let prev_raw = fetch_line(input, prev_line_number);
		let (prev_visual, _) = visualize_line(prev_raw);
		write_source_line(
			writer,
			prev_line_number,
			&prev_visual,
			gutter_width,
			&dim_spec,
			true,
			&context_spec,
		)?;
	} else {
		write!(writer, "  ")?;
		writer.set_color(&dim_spec)?;
		write!(writer, "{:>width$}", "", width = gutter_width)?;
		write!(writer, " ")?;
		write!(writer, "|")?;
		writer.reset()?;
		writeln!(writer)?;
	}

	write_source_line(
		writer,
		line_number,
		&visual_line,
		gutter_width,
		&dim_spec,
		false,
		&context_spec,
	)?;

	write!(writer, "  ")?;
	write!(writer, "{:>width$}", "", width = gutter_width)?;
	write!(writer, " ")?;
	writer.set_color(&dim_spec)?;
	write!(writer, "|")?;
	writer.reset()?;
	write!(writer, " ")?;
	let caret_padding = " ".repeat(start_offset);
	write!(writer, "{caret_padding}")?;
	writer.set_color(&caret_spec)?;
	write!(writer, "{}", "^".repeat(caret_width))?;
	writer.reset()?;
	writeln!(writer)?;

	Ok(())
}

fn fetch_line(input: &str, line_number: usize) -> &str {
	if line_number == 0 {
		return "";
	}

	input
		.split('\n')
		.nth(line_number - 1)
		.map(|line| line.trim_end_matches('\r'))
		.unwrap_or("")
}

fn visualize_line(line: &str) -> (String, Vec<usize>) {
	let mut visual = String::new();
	let mut offsets = Vec::new();
	offsets.push(0);

	let mut width = 0usize;
	for ch in line.chars() {
		if ch == '\t' {
			visual.push(' ');
			visual.push(' ');
			width += 2;
		} else {
			visual.push(ch);
			width += 1;
		}
		offsets.push(width);
	}

	(visual, offsets)
}

fn column_to_visual_offset(column: usize, offsets: &[usize]) -> usize {
	if column == 0 || offsets.is_empty() {
		return 0;
	}

	let idx = column.saturating_sub(1);
	if idx >= offsets.len() {
		*offsets.last().unwrap()
	} else {
		offsets[idx]
	}
}

fn write_source_line<W: WriteColor>(
	writer: &mut W,
	line_number: usize,
	text: &str,
	gutter_width: usize,
	gutter_spec: &ColorSpec,
	dim_line: bool,
	dim_text_spec: &ColorSpec,
) -> io::Result<()> {
	write!(writer, "  ")?;
	if dim_line {
		writer.set_color(dim_text_spec)?;
	}
	write!(writer, "{:>width$}", line_number, width = gutter_width)?;
	if dim_line {
		writer.reset()?;
	}
	write!(writer, " ")?;
	writer.set_color(gutter_spec)?;
	write!(writer, "|")?;
	writer.reset()?;
	if dim_line {
		writer.set_color(dim_text_spec)?;
	}
	writeln!(writer, " {text}")?;
	if dim_line {
		writer.reset()?;
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn locates_line_and_column() {
		let input = "first\nsecond line\nthird";

		assert_eq!(locate(input, 0), (1, 1));
		assert_eq!(locate(input, 6), (2, 1));
		assert_eq!(locate(input, 13), (2, 8));
		assert_eq!(locate(input, 100), (3, 6));
	}

	#[test]
	fn tabs_expand_in_visual_columns() {
		let (visual, offsets) = visualize_line("\tint a;");

		assert_eq!(visual, "  int a;");
		assert_eq!(column_to_visual_offset(2, &offsets), 2);
	}
}
