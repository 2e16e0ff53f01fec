//! Rastreo de ubicaciones originales en código fuente.
//!
//! Los distintos objetos internos que el compilador construye
//! deben llevar cuenta de posiciones o rangos de ubicaciones en
//! el código fuente original, lo cual permite determinar un punto
//! exacto o aproximado en donde ocurre un error de cualquier fase.
//!
//! A diferencia de un flujo de entrada incremental, cada compilación
//! dispone del texto completo de su unidad. El texto vive en un
//! [`Source`] compartido por referencia contada entre todas las
//! ubicaciones que apuntan hacia él, de modo que los diagnósticos
//! pueden citar la línea original sin depender del lexer.

use std::{
    fmt::{self, Debug, Display, Formatter},
    ops::Range,
    rc::Rc,
};

/// Ancho de los divisores de tabulador.
const TAB_STOP: u32 = 4;

/// Nombre de origen y texto completo de una unidad de compilación.
pub struct Source {
    name: String,
    text: String,
}

impl Source {
    /// Construye un origen compartido a partir de su nombre y contenido.
    pub fn new<N, T>(name: N, text: T) -> Rc<Self>
    where
        N: Into<String>,
        T: Into<String>,
    {
        Rc::new(Source {
            name: name.into(),
            text: text.into(),
        })
    }

    /// Nombre con el que se reporta este origen.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Texto completo.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Obtiene una línea por número, comenzando en 1.
    pub fn line(&self, number: u32) -> Option<&str> {
        let index = (number as usize).checked_sub(1)?;
        self.text
            .split('\n')
            .nth(index)
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
    }

    /// Ubicación del primer carácter.
    pub fn start(self: &Rc<Self>) -> Location {
        let start = Position::default();
        Location::new(self, start, start.advance())
    }
}

impl Debug for Source {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "Source({:?})", self.name)
    }
}

/// Valor acompañado de la ubicación de la que proviene.
#[derive(Debug, Clone)]
pub struct Located<T> {
    value: T,
    location: Location,
}

impl<T> Located<T> {
    pub fn at(value: T, location: Location) -> Self {
        Located { value, location }
    }

    pub fn val(&self) -> &T {
        &self.value
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Descarta la ubicación.
    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T: PartialEq> PartialEq for Located<T> {
    /// Dos valores ubicados son iguales si sus valores lo son; la
    /// ubicación no participa en la comparación.
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

/// Una ubicación está conformada por un origen y un rango de posiciones.
///
/// El rango es semiabierto: `end` es la posición inmediatamente
/// posterior al último carácter cubierto.
#[derive(Clone)]
pub struct Location {
    from: Rc<Source>,
    position: Range<Position>,
}

impl Location {
    /// Construye una ubicación dentro de un origen.
    pub fn new(from: &Rc<Source>, start: Position, end: Position) -> Self {
        Location {
            from: Rc::clone(from),
            position: start..end,
        }
    }

    /// Unifica un rango de ubicaciones. Se asume el mismo origen.
    pub fn span(from: Location, to: &Location) -> Self {
        Location {
            from: from.from,
            position: from.position.start..to.position.end,
        }
    }

    /// Obtiene la posición de inicio.
    pub fn start(&self) -> Position {
        self.position.start
    }

    /// Obtiene la posición de fin.
    pub fn end(&self) -> Position {
        self.position.end
    }

    /// Origen al que pertenece la ubicación.
    pub fn source(&self) -> &Source {
        &self.from
    }
}

impl Display for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        let Range { start, end } = self.position;
        let last = end.column.saturating_sub(1);

        // Un rango de una sola columna o de varias líneas se muestra como punto
        if end.line != start.line || last <= start.column {
            write!(formatter, "{}:{}", self.from.name, start)
        } else {
            write!(formatter, "{}:[{}-{}:{}]", self.from.name, start, end.line, last)
        }
    }
}

impl Debug for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, formatter)
    }
}

/// Línea y columna, ambas a partir de 1.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Position {
    line: u32,
    column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Position { line, column }
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn column(&self) -> u32 {
        self.column
    }

    /// Siguiente columna de la misma línea.
    pub fn advance(self) -> Position {
        Position::new(self.line, self.column + 1)
    }

    /// Posición que sigue a un carácter dado. Un tabulador avanza hasta
    /// el siguiente múltiplo de [`TAB_STOP`].
    pub fn after(self, c: char) -> Position {
        match c {
            '\n' => Position::new(self.line + 1, 1),
            '\t' => {
                let stops = (self.column - 1) / TAB_STOP + 1;
                Position::new(self.line, stops * TAB_STOP + 1)
            }

            _ => self.advance(),
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Position::new(1, 1)
    }
}

impl Display for Position {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_follow_tabs_and_newlines() {
        let start = Position::default();
        assert_eq!(start.after('a'), Position::new(1, 2));
        assert_eq!(start.after('\t'), Position::new(1, 5));
        assert_eq!(Position::new(1, 3).after('\t'), Position::new(1, 5));
        assert_eq!(Position::new(4, 9).after('\n'), Position::new(5, 1));
    }

    #[test]
    fn lines_are_one_based_and_strip_carriage_returns() {
        let source = Source::new("unit.so", "let x = 1\r\nprint(x)\n");
        assert_eq!(source.line(1), Some("let x = 1"));
        assert_eq!(source.line(2), Some("print(x)"));
        assert_eq!(source.line(0), None);
    }

    #[test]
    fn single_column_locations_display_as_points() {
        let source = Source::new("unit.so", "x");
        assert_eq!(source.start().to_string(), "unit.so:1:1");

        let wide = Location::new(&source, Position::new(2, 3), Position::new(2, 7));
        assert_eq!(wide.to_string(), "unit.so:[2:3-2:6]");
    }
}
