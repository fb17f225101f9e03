//! The `Block` model: a mutable buffer the emitter appends
//! to as it walks a region, rendered to C++ source text only at the end.

use indexmap::IndexMap;

/// A buffer of declarations and statements for one region of a function
/// (a function's top-level body, an `If` branch's body, a loop's body...).
///
/// Declarations are grouped by type so emission can print `int64_t a, b;`
/// instead of one line per variable, matching how hand-written C++ in this
/// style tends to look.
#[derive(Debug, Default)]
pub struct Block {
    declarations: IndexMap<String, Vec<String>>,
    statements: Vec<String>,
    /// Lines emitted before the first statement (e.g. a loop's init/guard).
    head: Vec<String>,
    /// Lines emitted after the last statement (e.g. a loop's break check).
    tail: Vec<String>,
    /// Pragma lines (e.g. `#pragma omp parallel for reduction(+:acc)`),
    /// emitted immediately before the block's opening brace.
    pragma_lines: Vec<String>,
}

impl Block {
    pub fn new() -> Self {
        Block::default()
    }

    pub fn declare(&mut self, cpp_type: &str, var_name: impl Into<String>) {
        self.declarations.entry(cpp_type.to_string()).or_default().push(var_name.into());
    }

    pub fn statement(&mut self, line: impl Into<String>) {
        self.statements.push(line.into());
    }

    pub fn head_line(&mut self, line: impl Into<String>) {
        self.head.push(line.into());
    }

    pub fn tail_line(&mut self, line: impl Into<String>) {
        self.tail.push(line.into());
    }

    pub fn pragma_line(&mut self, line: impl Into<String>) {
        self.pragma_lines.push(line.into());
    }

    /// Appends another block's rendered text as a single nested statement,
    /// indented one level further (an `If` branch or loop body nested
    /// inside this block).
    pub fn nest(&mut self, inner: &Block, opener: &str) {
        let mut rendered = String::new();
        rendered.push_str(opener);
        rendered.push_str(" {\n");
        rendered.push_str(&indent(&inner.render(), 1));
        rendered.push('}');
        self.statements.push(rendered);
    }

    /// Renders declarations, head, statements, tail -- in that order --
    /// as a flat, unindented block of C++ lines.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.pragma_lines {
            out.push_str(line);
            out.push('\n');
        }
        for (cpp_type, names) in &self.declarations {
            out.push_str(&format!("{cpp_type} {};\n", names.join(", ")));
        }
        for line in &self.head {
            out.push_str(line);
            out.push('\n');
        }
        for line in &self.statements {
            out.push_str(line);
            out.push('\n');
        }
        for line in &self.tail {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

fn indent(text: &str, levels: usize) -> String {
    let pad = "    ".repeat(levels);
    text.lines().map(|l| if l.is_empty() { String::new() } else { format!("{pad}{l}") }).collect::<Vec<_>>().join("\n") + "\n"
}
