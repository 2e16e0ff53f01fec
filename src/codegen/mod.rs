//! Emisión de código fuente objetivo.
//!
//! # Objetivos
//! Un mismo recorrido del AST produce cuatro salidas distintas según
//! el [`Target`]. Los objetivos nativos (C y Rust) elevan las funciones
//! antes de un punto de entrada implícito, ver [`native`]. Los objetivos
//! on-chain aplanan la declaración `program` y divergen en estructura:
//! módulo de framework con contextos de cuentas, o punto de entrada
//! crudo con despacho por opcode, ver [`chain`].
//!
//! # Emisión compartida
//! Expresiones y sentencias del subconjunto genérico se emiten igual
//! para todos los objetivos, salvo los detalles de `print` y `return`.
//! Un operador binario se emite tal cual; los operandos que son a su vez
//! operaciones binarias se encierran entre paréntesis, de modo que el
//! texto generado conserva la forma del árbol.
//!
//! # Errores
//! La salida se acumula en memoria y solo se entrega completa. Un nodo
//! sin regla para el objetivo activo es un error fatal.

mod chain;
mod native;

use crate::{
    ast::{Ast, Block, Else, Expr, If, Statement},
    classify::UnitKind,
    source::{Located, Location},
};

use log::debug;
use std::{
    collections::HashSet,
    fmt::{self, Display, Write},
    str::FromStr,
};

use thiserror::Error;

/// Ancho de un nivel de indentación.
pub(crate) const INDENT: usize = 4;

/// Lenguaje y forma de la salida.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Target {
    NativeC,
    NativeRust,
    ChainFramework,
    ChainRaw,
}

const TARGET_NAMES: &[(&str, Target)] = &[
    ("c", Target::NativeC),
    ("rust", Target::NativeRust),
    ("anchor", Target::ChainFramework),
    ("framework", Target::ChainFramework),
    ("native-solana", Target::ChainRaw),
    ("raw", Target::ChainRaw),
];

impl Target {
    pub fn is_chain(self) -> bool {
        matches!(self, Target::ChainFramework | Target::ChainRaw)
    }

    /// Elige el objetivo definitivo para una unidad clasificada.
    ///
    /// Un programa on-chain no puede emitirse como C ni como Rust
    /// genérico: esas solicitudes se convierten a [`Target::ChainRaw`].
    /// Lo inverso, un objetivo on-chain para una unidad genérica, es un
    /// error; forzar la clasificación es responsabilidad del llamador.
    pub fn resolve(requested: Option<Target>, unit: UnitKind) -> Result<Target, EmitError> {
        match (requested, unit) {
            (None, UnitKind::Generic) => Ok(Target::NativeC),
            (None, UnitKind::ChainProgram) => Ok(Target::ChainRaw),

            (Some(target), UnitKind::ChainProgram) if !target.is_chain() => {
                debug!("Coercing target {} to {} for an on-chain program", target, Target::ChainRaw);
                Ok(Target::ChainRaw)
            }

            (Some(target), UnitKind::Generic) if target.is_chain() => {
                Err(EmitError::ChainTargetForGenericUnit(target))
            }

            (Some(target), _) => Ok(target),
        }
    }

    /// Nombre de archivo de salida por omisión.
    pub fn default_output(self, bootstrap: bool) -> &'static str {
        match (self, bootstrap) {
            (Target::NativeC, false) => "output.c",
            (Target::NativeC, true) => "solang_self_hosted.c",
            (Target::NativeRust, false) => "output.rs",
            (Target::NativeRust, true) => "solang_self_hosted.rs",
            (Target::ChainFramework, _) => "lib.rs",
            (Target::ChainRaw, _) => "program.rs",
        }
    }
}

impl FromStr for Target {
    type Err = EmitError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        TARGET_NAMES
            .iter()
            .find(|(known, _)| unicase::eq_ascii(*known, name))
            .map(|&(_, target)| target)
            .ok_or_else(|| EmitError::UnknownTarget(name.to_owned()))
    }
}

impl Display for Target {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Target::NativeC => "c",
            Target::NativeRust => "rust",
            Target::ChainFramework => "anchor",
            Target::ChainRaw => "native-solana",
        };

        fmt.write_str(name)
    }
}

/// Parámetros de emisión que no provienen del código fuente.
#[derive(Clone, Debug)]
pub struct EmitOptions {
    /// Nombre de programa cuando no existe una declaración `program`.
    pub default_program_name: String,

    /// Identificador a usar si `program` no declara uno literal.
    pub program_id: Option<String>,

    /// Cuenta que paga la inicialización de cuentas `init`.
    pub payer: String,

    /// Espacio reservado para cuentas `init`.
    pub account_space: String,

    /// Campo de contexto a través del cual se transfieren tokens.
    pub token_program: String,
}

impl Default for EmitOptions {
    fn default() -> Self {
        EmitOptions {
            default_program_name: String::from("program"),
            program_id: None,
            payer: String::from("payer"),
            account_space: String::from("8 + 32"),
            token_program: String::from("token_program"),
        }
    }
}

#[non_exhaustive]
#[derive(Error, Debug, PartialEq, Eq)]
pub enum EmitError {
    #[error("`{construct}` is not supported by the {target} target")]
    Unsupported {
        construct: &'static str,
        target: Target,
    },

    #[error("Functions can only be declared at the top level")]
    NestedFunction,

    #[error("`{0}` can only be declared at the top level or inside a program")]
    Misplaced(&'static str),

    #[error("Account `{0}` is declared outside of an instruction")]
    OrphanAccount(String),

    #[error("Only one `program` declaration is allowed per unit")]
    DuplicateProgram,

    #[error("Instructions cannot return a value")]
    ValueReturnInInstruction,

    #[error("At most {max} instructions can be dispatched by opcode, found {found}")]
    TooManyInstructions { max: usize, found: usize },

    #[error("The {0} target requires an on-chain program")]
    ChainTargetForGenericUnit(Target),

    #[error("Unknown target `{0}`")]
    UnknownTarget(String),

    #[error("Failed to format output")]
    Format(#[from] fmt::Error),
}

/// Emite una unidad completa para un objetivo.
///
/// La salida es función pura de sus entradas: dos emisiones del mismo
/// árbol con el mismo objetivo producen exactamente el mismo texto.
pub fn emit(ast: &Ast, target: Target, options: &EmitOptions) -> Result<String, Located<EmitError>> {
    let mut context = Context {
        target,
        options,
        output: String::new(),
        indent: 0,
        scope: Scope::Entry,
        strings: HashSet::new(),
        authority: None,
        last_known: ast.origin.clone(),
    };

    if target.is_chain() {
        chain::emit_unit(&mut context, ast)?;
    } else {
        native::emit_unit(&mut context, ast)?;
    }

    Ok(context.output)
}

type Emit<T> = Result<T, Located<EmitError>>;

/// Cuerpo que se está emitiendo.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Scope {
    /// Punto de entrada implícito.
    Entry,

    /// Función declarada con `fn`.
    Function,

    /// Manejador de una instrucción on-chain.
    Instruction,
}

/// Estado de una emisión en curso.
struct Context<'a> {
    target: Target,
    options: &'a EmitOptions,
    output: String,
    indent: usize,
    scope: Scope,

    /// Locales ligadas a literales de texto en el cuerpo actual.
    strings: HashSet<String>,

    /// Firmante que autoriza transferencias en el manejador actual.
    authority: Option<String>,

    last_known: Location,
}

impl Context<'_> {
    fn fault<E: Into<EmitError>>(&self, error: E) -> Located<EmitError> {
        Located::at(error.into(), self.last_known.clone())
    }

    fn unsupported(&self, statement: &Statement) -> Located<EmitError> {
        self.fault(EmitError::Unsupported {
            construct: statement.describe(),
            target: self.target,
        })
    }

    /// Ajusta el estado para iniciar un nuevo cuerpo.
    fn enter(&mut self, scope: Scope) {
        self.scope = scope;
        self.strings.clear();
    }

    fn nested<F>(&mut self, body: F) -> Emit<()>
    where
        F: FnOnce(&mut Self) -> Emit<()>,
    {
        self.indent += 1;
        let result = body(self);
        self.indent -= 1;

        result
    }

    /// Las locales de texto declaradas en el bloque mueren con él.
    fn block(&mut self, block: &Block) -> Emit<()> {
        let outer = self.strings.clone();
        let result = block.iter().try_for_each(|statement| self.statement(statement));
        self.strings = outer;

        result
    }

    fn statement(&mut self, statement: &Located<Statement>) -> Emit<()> {
        self.last_known = statement.location().clone();

        let node = statement.val();
        if !self.target.is_chain() && (node.is_chain_node() || matches!(node, Statement::State(_))) {
            return Err(self.unsupported(node));
        }

        match node {
            Statement::Let { name, init } => self.binding(name.val(), init.as_ref()),
            Statement::If(conditional) => self.conditional(conditional),
            Statement::Print(value) => self.print(value.as_ref()),
            Statement::Return(value) => self.return_statement(value.as_ref()),
            Statement::Expr(value) => emit!(self, "{};", expr(value)),

            Statement::Function { .. } => Err(self.fault(EmitError::NestedFunction)),
            Statement::Program(_) | Statement::Instruction(_) | Statement::State(_) => {
                Err(self.fault(EmitError::Misplaced(node.describe())))
            }

            Statement::Account(account) => {
                Err(self.fault(EmitError::OrphanAccount(account.name.clone())))
            }

            Statement::Transfer { .. } | Statement::Require { .. } | Statement::Emit { .. } => {
                chain::statement(self, node)
            }
        }
    }

    fn binding(&mut self, name: &str, init: Option<&Located<Expr>>) -> Emit<()> {
        let value = init.map_or_else(|| String::from("0"), |init| expr(init.val()));

        match self.target {
            Target::NativeC => {
                if let Some(Expr::Str(_)) = init.map(Located::val) {
                    self.strings.insert(name.to_owned());
                    emit!(self, "const char *{} = {};", name, value)
                } else {
                    self.strings.remove(name);
                    emit!(self, "int {} = {};", name, value)
                }
            }

            _ => emit!(self, "let {} = {};", name, value),
        }
    }

    fn conditional(&mut self, conditional: &If) -> Emit<()> {
        let condition = expr(conditional.condition.val());
        match self.target {
            Target::NativeC => emit!(self, "if ({}) {{", condition)?,
            _ => emit!(self, "if {} {{", condition)?,
        }

        self.nested(|context| context.block(&conditional.then))?;

        // Las cadenas `else if` se conservan como condicionales anidados
        match &conditional.otherwise {
            None => (),

            Some(Else::Block(block)) => {
                emit!(self, "}} else {{")?;
                self.nested(|context| context.block(block))?;
            }

            Some(Else::If(chained)) => {
                emit!(self, "}} else {{")?;
                self.nested(|context| context.conditional(chained.val()))?;
            }
        }

        emit!(self, "}}")
    }

    fn print(&mut self, value: Option<&Located<Expr>>) -> Emit<()> {
        let value = value.map(Located::val);

        match (self.target, value) {
            (Target::NativeC, None) => emit!(self, "printf(\"\\n\");"),
            (Target::NativeC, Some(value)) => {
                let format = if self.is_string(value) { "%s" } else { "%d" };
                emit!(self, "printf(\"{}\\n\", {});", format, expr(value))
            }

            (Target::NativeRust, None) => emit!(self, "println!();"),
            (Target::NativeRust, Some(value)) => emit!(self, "println!(\"{{}}\", {});", expr(value)),

            (_, None) => emit!(self, "msg!(\"\");"),
            (_, Some(value)) => emit!(self, "msg!(\"{{}}\", {});", expr(value)),
        }
    }

    fn return_statement(&mut self, value: Option<&Located<Expr>>) -> Emit<()> {
        let value = value.map(|value| expr(value.val()));

        match (self.target, self.scope, value) {
            // `main` en Rust no retorna valores
            (Target::NativeRust, Scope::Entry, Some(value)) => {
                emit!(self, "std::process::exit({});", value)
            }

            (Target::NativeRust, Scope::Entry, None) => emit!(self, "return;"),

            (target, Scope::Entry | Scope::Instruction, value) if target.is_chain() => match value {
                Some(_) => Err(self.fault(EmitError::ValueReturnInInstruction)),
                None => emit!(self, "return Ok(());"),
            },

            (_, _, value) => emit!(self, "return {};", value.as_deref().unwrap_or("0")),
        }
    }

    fn is_string(&self, value: &Expr) -> bool {
        match value {
            Expr::Str(_) => true,
            Expr::Identifier(name) => self.strings.contains(name),
            _ => false,
        }
    }
}

/// Texto de una expresión, común a todos los objetivos.
fn expr(expr: &Expr) -> String {
    match expr {
        Expr::Number(number) => number.clone(),
        Expr::Str(text) => quote(text),
        Expr::Identifier(name) => name.clone(),
        Expr::Call(name) => format!("{}()", name),
        Expr::Binary(left, op, right) => {
            format!("{} {} {}", operand(left.val()), op, operand(right.val()))
        }
    }
}

fn operand(value: &Expr) -> String {
    match value {
        Expr::Binary(..) => format!("({})", expr(value)),
        _ => expr(value),
    }
}

/// Literal de texto con los escapes que comparten C y Rust.
fn quote(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);

    quoted.push('"');
    for c in text.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\t' => quoted.push_str("\\t"),
            '\r' => quoted.push_str("\\r"),
            c => quoted.push(c),
        }
    }

    quoted.push('"');
    quoted
}
