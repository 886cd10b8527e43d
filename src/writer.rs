//! Indentation-tracking writer for generated Rust source.
//!
//! Indent guards share the level through `Rc<Cell<_>>`, so a guard can stay
//! alive while the writer keeps being borrowed mutably:
//!
//! ```
//! use shapegen::writer::RustWriter;
//!
//! let mut w = RustWriter::new();
//! w.block("fn answer() -> u32", |w| {
//!     w.writeln("42")?;
//!     Ok(())
//! })
//! .unwrap();
//! assert_eq!(w.as_str(), "fn answer() -> u32 {\n    42\n}\n");
//! ```

use crate::error::Result;
use std::cell::Cell;
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

const INDENT: &str = "    ";

/// External crates a piece of generated code refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Dependency {
    Runtime,
    Http,
}

impl Dependency {
    pub fn crate_name(self) -> &'static str {
        match self {
            Dependency::Runtime => "shapegen-runtime",
            Dependency::Http => "http",
        }
    }
}

/// A named unit of emitted code plus the crates it needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    pub name: String,
    pub code: String,
    pub dependencies: BTreeSet<Dependency>,
}

impl Fragment {
    pub fn is_empty(&self) -> bool {
        self.code.trim().is_empty()
    }
}

pub struct IndentGuard {
    level: Rc<Cell<usize>>,
}

impl Drop for IndentGuard {
    fn drop(&mut self) {
        self.level.set(self.level.get().saturating_sub(1));
    }
}

#[derive(Debug, Default)]
pub struct RustWriter {
    out: String,
    level: Rc<Cell<usize>>,
    dependencies: BTreeSet<Dependency>,
}

impl RustWriter {
    pub fn new() -> Self {
        RustWriter::default()
    }

    /// Writes one or more lines, indenting each non-empty line.
    pub fn writeln(&mut self, text: &str) -> fmt::Result {
        for line in text.lines() {
            if !line.trim().is_empty() {
                for _ in 0..self.level.get() {
                    self.out.push_str(INDENT);
                }
                self.out.push_str(line);
            }
            self.out.push('\n');
        }
        if text.is_empty() {
            self.out.push('\n');
        }
        Ok(())
    }

    pub fn blank_line(&mut self) -> fmt::Result {
        self.out.push('\n');
        Ok(())
    }

    pub fn indent(&mut self) -> IndentGuard {
        self.level.set(self.level.get() + 1);
        IndentGuard {
            level: Rc::clone(&self.level),
        }
    }

    pub fn docs(&mut self, text: Option<&str>) -> fmt::Result {
        if let Some(text) = text {
            for line in text.lines() {
                if line.trim().is_empty() {
                    self.writeln("///")?;
                } else {
                    self.writeln(&format!("/// {}", line.trim_end()))?;
                }
            }
        }
        Ok(())
    }

    /// `header {`, the body one level deeper, then `}`.
    pub fn block<F>(&mut self, header: &str, body: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        self.block_with(header, "}", body)
    }

    /// Like [`RustWriter::block`] with a custom closing line, e.g. `};` or `},`.
    pub fn block_with<F>(&mut self, header: &str, close: &str, body: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        self.writeln(&format!("{header} {{"))?;
        {
            let _indent = self.indent();
            body(self)?;
        }
        self.writeln(close)?;
        Ok(())
    }

    /// Appends already-rendered code at the current indentation.
    pub fn write_code(&mut self, code: &str) -> fmt::Result {
        self.writeln(code.trim_end_matches('\n'))
    }

    pub fn depends_on(&mut self, dependency: Dependency) {
        self.dependencies.insert(dependency);
    }

    pub fn absorb(&mut self, fragment: &Fragment) -> fmt::Result {
        self.dependencies.extend(fragment.dependencies.iter().copied());
        if fragment.is_empty() {
            return Ok(());
        }
        self.write_code(&fragment.code)
    }

    pub fn as_str(&self) -> &str {
        &self.out
    }

    pub fn is_empty(&self) -> bool {
        self.out.trim().is_empty()
    }

    pub fn into_fragment(self, name: impl Into<String>) -> Fragment {
        Fragment {
            name: name.into(),
            code: self.out,
            dependencies: self.dependencies,
        }
    }
}

/// `wln!(w, "fmt", args..)` writes a formatted line.
#[macro_export]
macro_rules! wln {
    ($w:expr) => {
        $w.blank_line()
    };
    ($w:expr, $($arg:tt)*) => {
        $w.writeln(&format!($($arg)*))
    };
}

/// Renders a Rust string literal for `value`.
pub fn string_literal(value: &str) -> String {
    format!("{value:?}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_blocks_indent() {
        let mut w = RustWriter::new();
        w.block("mod a", |w| {
            w.block("fn b()", |w| {
                wln!(w, "let x = {};", 1)?;
                Ok(())
            })
        })
        .unwrap();
        assert_eq!(w.as_str(), "mod a {\n    fn b() {\n        let x = 1;\n    }\n}\n");
    }

    #[test]
    fn multi_line_text_is_indented_per_line() {
        let mut w = RustWriter::new();
        let _guard = w.indent();
        w.writeln("a\n\nb").unwrap();
        assert_eq!(w.as_str(), "    a\n\n    b\n");
    }

    #[test]
    fn guards_restore_the_level() {
        let mut w = RustWriter::new();
        {
            let _guard = w.indent();
            w.writeln("inner").unwrap();
        }
        w.writeln("outer").unwrap();
        assert_eq!(w.as_str(), "    inner\nouter\n");
    }

    #[test]
    fn fragments_carry_dependencies() {
        let mut inner = RustWriter::new();
        inner.depends_on(Dependency::Http);
        inner.writeln("fn f() {}").unwrap();
        let fragment = inner.into_fragment("f");

        let mut outer = RustWriter::new();
        outer.depends_on(Dependency::Runtime);
        outer.absorb(&fragment).unwrap();
        let outer = outer.into_fragment("outer");
        assert_eq!(
            outer.dependencies.into_iter().collect::<Vec<_>>(),
            vec![Dependency::Runtime, Dependency::Http]
        );
        assert_eq!(outer.code, "fn f() {}\n");
    }

    #[test]
    fn string_literals_are_escaped() {
        assert_eq!(string_literal(r#"a"b\c"#), r#""a\"b\\c""#);
    }
}
