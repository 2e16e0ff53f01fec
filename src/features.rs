//! Conjuntos de características del lenguaje.
//!
//! Un mismo lexer y parser cubren todos los dialectos del lenguaje.
//! Lo que cambia entre dialectos es cuáles palabras clave existen,
//! qué puntuación se reconoce y cómo se agrupan las expresiones.

use bitflags::bitflags;

bitflags! {
    /// Características habilitadas para una compilación.
    pub struct Features: u32 {
        /// Declaraciones `fn` y su elevación antes del punto de entrada.
        const FUNCTIONS = 0x01;

        /// Comentarios de línea `//`.
        const COMMENTS = 0x02;

        /// Secuencias de escape en literales de texto.
        const ESCAPES = 0x04;

        /// Precedencia y encadenamiento de operadores binarios.
        ///
        /// Sin esta característica una expresión admite a lo sumo un
        /// operador binario.
        const PRECEDENCE = 0x08;

        /// Extensión on-chain: `program`, `instruction`, `account`,
        /// atributos `@`, `#` y `->`.
        const CHAIN = 0x10;

        /// Dialecto inicial: sin funciones, comentarios ni escapes.
        const STAGE0 = Self::CHAIN.bits;

        /// Dialecto extendido de autohospedaje.
        const ENHANCED = Self::FUNCTIONS.bits | Self::COMMENTS.bits | Self::ESCAPES.bits;
    }
}

impl Default for Features {
    fn default() -> Self {
        Features::all()
    }
}

const DIALECTS: &[(&str, Features)] = &[
    ("stage0", Features::STAGE0),
    ("enhanced", Features::ENHANCED),
    ("full", Features::all()),
];

impl Features {
    /// Busca un dialecto por nombre, sin distinguir mayúsculas.
    pub fn dialect(name: &str) -> Option<Features> {
        DIALECTS
            .iter()
            .find(|(known, _)| unicase::eq_ascii(*known, name))
            .map(|&(_, features)| features)
    }

    /// Nombres aceptados por [`Features::dialect`].
    pub fn dialect_names() -> impl Iterator<Item = &'static str> {
        DIALECTS.iter().map(|&(name, _)| name)
    }
}
