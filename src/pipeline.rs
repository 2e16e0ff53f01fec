//! Orquestación de fases.
//!
//! Una compilación recorre lexer, parser, clasificador y emisor en ese
//! orden. La primera fase que falla detiene la compilación; ninguna
//! salida parcial se entrega al llamador.

use crate::{
    ast::{Ast, Statement},
    classify::{self, UnitKind},
    codegen::{self, EmitError, EmitOptions, Target},
    error::Diagnostics,
    features::Features,
    identity::{self, IdentityError, KeyProvider},
    lex::{self, LexerError},
    parse::{self, ParserError},
    source::{Located, Source},
};

use log::{debug, info};
use std::rc::Rc;
use thiserror::Error;

/// Configuración de una compilación.
#[derive(Clone, Debug, Default)]
pub struct Options {
    pub features: Features,

    /// Objetivo solicitado; sin él se elige según la clasificación.
    pub target: Option<Target>,

    /// Trata la unidad como programa on-chain aunque no tenga nodos on-chain.
    pub force_chain: bool,

    /// Identificador para programas que no declaran uno literal.
    pub program_id: Option<String>,

    pub emit: EmitOptions,
}

/// Resultado de una compilación exitosa.
#[derive(Debug)]
pub struct Compilation {
    pub target: Target,
    pub unit: UnitKind,
    pub program_name: Option<String>,
    pub text: String,
}

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Found {} lexical error(s)", .0.len())]
    Lexical(Vec<Located<LexerError>>),

    #[error("{}", .0.val())]
    Syntax(Located<ParserError>),

    #[error("{}", .0.val())]
    Emission(Located<EmitError>),

    #[error(transparent)]
    Target(EmitError),

    #[error(transparent)]
    Identity(#[from] IdentityError),
}

impl CompileError {
    /// Reúne los errores que apuntan al código fuente.
    ///
    /// Los errores sin ubicación se devuelven intactos.
    pub fn into_diagnostics(self) -> Result<Diagnostics, Self> {
        match self {
            CompileError::Lexical(errors) => Ok(Diagnostics::from(errors).kind("Lexical error")),
            CompileError::Syntax(error) => Ok(Diagnostics::from(error).kind("Syntax error")),
            CompileError::Emission(error) => Ok(Diagnostics::from(error).kind("Emission error")),
            other => Err(other),
        }
    }
}

/// Compila una unidad completa.
pub fn compile(
    source: &Rc<Source>,
    options: &Options,
    keys: &dyn KeyProvider,
) -> Result<Compilation, CompileError> {
    let tokens = lex::tokenize(source, options.features).map_err(CompileError::Lexical)?;
    info!("Scanned {} tokens from {}", tokens.len(), source.name());

    let ast = parse::parse(source, &tokens, options.features).map_err(CompileError::Syntax)?;

    let functions = ast
        .items
        .iter()
        .filter(|item| matches!(item.val(), Statement::Function { .. }))
        .count();

    info!("Parsed {} top-level items, {} of them functions", ast.items.len(), functions);

    let mut unit = classify::classify(&ast);
    if options.force_chain && unit == UnitKind::Generic {
        debug!("Forcing on-chain classification for {}", source.name());
        unit = UnitKind::ChainProgram;
    }

    let program_name = classify::program_name(&ast).map(str::to_owned);
    info!("Classified {} as {}", source.name(), unit);

    let target = Target::resolve(options.target, unit).map_err(CompileError::Target)?;
    info!("Emitting for target {}", target);

    let mut emit = options.emit.clone();
    if target.is_chain() {
        emit.program_id = program_id(&ast, program_name.as_deref(), options, keys)?;
    }

    let text = codegen::emit(&ast, target, &emit).map_err(CompileError::Emission)?;
    info!("Generated {} lines", text.lines().count());

    Ok(Compilation {
        target,
        unit,
        program_name,
        text,
    })
}

/// Identificador efectivo: literal, luego configurado, luego el del proveedor.
fn program_id(
    ast: &Ast,
    name: Option<&str>,
    options: &Options,
    keys: &dyn KeyProvider,
) -> Result<Option<String>, CompileError> {
    let literal = classify::program_decl(ast)
        .and_then(|program| program.program_id.as_ref())
        .map(|id| id.val().clone());

    let configured = options
        .program_id
        .clone()
        .or_else(|| options.emit.program_id.clone());

    let id = match literal.or(configured) {
        Some(id) => Some(id),
        None => {
            let name = name.unwrap_or(&options.emit.default_program_name);
            keys.public_key(name)?
        }
    };

    if let Some(id) = &id {
        identity::validate_program_id(id);
    }

    Ok(id)
}
