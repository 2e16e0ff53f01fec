//! Presentación de diagnósticos.
//!
//! Cualquier error ubicado de cualquier fase puede reunirse en un
//! [`Diagnostics`], cuya forma `Display` cita la línea original
//! y subraya el rango afectado.

use crate::source::{Located, Location};
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

mod sealed {
    pub trait Sealed {}
}

/// Error con una ubicación en el código fuente.
pub trait LocatedError: sealed::Sealed {
    fn error(&self) -> &dyn Error;
    fn location(&self) -> &Location;
}

impl<E: Error> sealed::Sealed for Located<E> {}

impl<E: Error> LocatedError for Located<E> {
    fn error(&self) -> &dyn Error {
        self.val()
    }

    fn location(&self) -> &Location {
        Located::location(self)
    }
}

/// Errores de una misma fase, listos para presentarse.
pub struct Diagnostics {
    kind: &'static str,
    errors: Vec<Box<dyn LocatedError>>,
}

impl Diagnostics {
    /// Nombra la fase que produjo los errores.
    pub fn kind(mut self, kind: &'static str) -> Self {
        self.kind = kind;
        self
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Diagnostics {
            kind: "error",
            errors: Vec::new(),
        }
    }
}

impl<E: 'static + Error> From<Located<E>> for Diagnostics {
    fn from(error: Located<E>) -> Self {
        Diagnostics::from(vec![error])
    }
}

impl<E: 'static + Error> From<Vec<Located<E>>> for Diagnostics {
    fn from(errors: Vec<Located<E>>) -> Self {
        let errors = errors
            .into_iter()
            .map(|error| Box::new(error) as Box<dyn LocatedError>)
            .collect();

        Diagnostics {
            errors,
            ..Default::default()
        }
    }
}

impl Display for Diagnostics {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return writeln!(fmt, "No errors were reported");
        }

        for error in &self.errors {
            writeln!(fmt, "{}: {}", self.kind, error.error())?;
            excerpt(fmt, error.location())?;
            writeln!(fmt)?;
        }

        let count = self.errors.len();
        let plural = if count == 1 { "" } else { "s" };
        writeln!(fmt, "Build failed with {} error{}", count, plural)
    }
}

/// Cita la primera línea de una ubicación y subraya el rango cubierto.
///
/// Un rango que continúa en otras líneas se subraya solo en su
/// primera columna.
fn excerpt(fmt: &mut Formatter<'_>, location: &Location) -> fmt::Result {
    let (start, end) = (location.start(), location.end());

    let gutter = start.line().to_string();
    let blank = " ".repeat(gutter.len());
    let text = location.source().line(start.line()).unwrap_or("");

    let width = if end.line() == start.line() && end.column() > start.column() {
        end.column() - start.column()
    } else {
        1
    };

    let offset = " ".repeat(start.column().saturating_sub(1) as usize);
    let underline = "^".repeat(width as usize);

    writeln!(fmt, " --> {}", location)?;
    writeln!(fmt, "{} |", blank)?;
    writeln!(fmt, "{} | {}", gutter, text)?;
    writeln!(fmt, "{} | {}{}", blank, offset, underline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{Position, Source};
    use thiserror::Error;

    #[derive(Error, Debug)]
    #[error("Bad thing")]
    struct BadThing;

    #[test]
    fn renders_excerpt_with_underline() {
        let source = Source::new("unit.so", "let x = $$\n");
        let location = Location::new(&source, Position::new(1, 9), Position::new(1, 11));
        let diagnostics = Diagnostics::from(Located::at(BadThing, location)).kind("Lexical error");

        let rendered = diagnostics.to_string();
        assert!(rendered.contains("Lexical error: Bad thing"));
        assert!(rendered.contains(" --> unit.so:[1:9-1:10]"));
        assert!(rendered.contains("1 | let x = $$"));
        assert!(rendered.contains("  |         ^^"));
        assert!(rendered.ends_with("Build failed with 1 error\n"));
    }

    #[test]
    fn multiline_ranges_mark_their_first_column() {
        let source = Source::new("unit.so", "print(\"a\nb\")");
        let location = Location::new(&source, Position::new(1, 7), Position::new(2, 3));
        let rendered = Diagnostics::from(vec![Located::at(BadThing, location)]).to_string();

        assert!(rendered.starts_with("error: Bad thing\n --> unit.so:1:7\n"));
        assert!(rendered.contains("1 | print(\"a\n  |       ^\n"));
    }

    #[test]
    fn empty_diagnostics() {
        let diagnostics = Diagnostics::default();
        assert!(diagnostics.is_empty());
        assert_eq!(diagnostics.to_string(), "No errors were reported\n");
    }
}
