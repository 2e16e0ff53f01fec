//! Compilador para el lenguaje So.
//!
//! # Front end
//! Cada programa deriva de un único archivo de código fuente. Este
//! archivo se somete primero a análisis léxico en [`lex`], de lo cual
//! se obtiene un flujo de tokens. El flujo de tokens se dispone en un
//! AST descrito en [`ast`] por medio de análisis sintáctico en [`parse`].
//! Qué palabras clave y construcciones existen lo decide el conjunto de
//! [`features`] de la compilación, de modo que todos los dialectos
//! comparten un mismo lexer y un mismo parser.
//!
//! # Back end
//! El árbol se clasifica en [`classify`] como programa genérico o como
//! programa on-chain. Esa clase, junto al objetivo solicitado, determina
//! la forma de la salida que se emite en [`codegen`]: C, Rust, o Rust
//! on-chain en estilo de framework o de punto de entrada crudo. El
//! identificador de un programa on-chain puede provenir de un par de
//! llaves en disco, ver [`identity`].
//!
//! [`pipeline`] encadena todas las fases y [`error`] presenta los
//! errores ubicados con una cita del código original.

#[macro_use]
mod macros;

pub mod ast;
pub mod classify;
pub mod codegen;
pub mod error;
pub mod features;
pub mod identity;
pub mod lex;
pub mod parse;
pub mod pipeline;
pub mod source;
