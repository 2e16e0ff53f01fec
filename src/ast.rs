//! Árbol de sintaxis abstracta.
//!
//! Un único tipo suma cubre tanto el lenguaje genérico como la
//! extensión on-chain. Cada nodo es dueño exclusivo de sus hijos
//! y ningún nodo se modifica después de que el parser lo construye.

use crate::source::{Located, Location};
use bitflags::bitflags;
use std::fmt::{self, Display};

/// Secuencia ordenada de sentencias.
pub type Block = Vec<Located<Statement>>;

/// Raíz de una unidad de compilación.
#[derive(Debug, Clone)]
pub struct Ast {
    pub items: Block,

    /// Inicio del origen, para errores sin una sentencia asociada.
    pub origin: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Let {
        name: Located<String>,
        init: Option<Located<Expr>>,
    },

    /// Los parámetros declarados se descartan durante el parsing.
    Function {
        name: Located<String>,
        body: Block,
    },

    If(If),
    Return(Option<Located<Expr>>),
    Print(Option<Located<Expr>>),
    Expr(Expr),

    Program(ProgramDecl),
    Instruction(Instruction),
    Account(Account),
    State(StateDecl),

    Transfer {
        from: Located<Expr>,
        to: Located<Expr>,
        amount: Located<Expr>,
    },

    Require {
        condition: Located<Expr>,
        message: Option<String>,
    },

    Emit {
        event: Located<String>,
        fields: Vec<EventField>,
    },
}

impl Statement {
    /// Nombre de la construcción, para diagnósticos.
    pub fn describe(&self) -> &'static str {
        match self {
            Statement::Let { .. } => "let",
            Statement::Function { .. } => "fn",
            Statement::If(_) => "if",
            Statement::Return(_) => "return",
            Statement::Print(_) => "print",
            Statement::Expr(_) => "expression",
            Statement::Program(_) => "program",
            Statement::Instruction(_) => "instruction",
            Statement::Account(_) => "account",
            Statement::State(_) => "state",
            Statement::Transfer { .. } => "transfer",
            Statement::Require { .. } => "require",
            Statement::Emit { .. } => "emit",
        }
    }

    /// Determina si el nodo pertenece a la extensión on-chain.
    pub fn is_chain_node(&self) -> bool {
        matches!(
            self,
            Statement::Program(_)
                | Statement::Instruction(_)
                | Statement::Account(_)
                | Statement::Transfer { .. }
                | Statement::Require { .. }
                | Statement::Emit { .. }
        )
    }

    /// Bloques anidados directamente en esta sentencia.
    pub fn blocks(&self) -> Vec<&Block> {
        match self {
            Statement::Function { body, .. } => vec![body],
            Statement::If(branch) => branch.blocks(),
            Statement::Program(program) => vec![&program.items],
            Statement::Instruction(instruction) => vec![&instruction.body],
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct If {
    pub condition: Located<Expr>,
    pub then: Block,
    pub otherwise: Option<Else>,
}

impl If {
    fn blocks(&self) -> Vec<&Block> {
        let mut blocks = vec![&self.then];
        match &self.otherwise {
            Some(Else::Block(block)) => blocks.push(block),
            Some(Else::If(chained)) => blocks.extend(chained.val().blocks()),
            None => (),
        }

        blocks
    }
}

/// Rama alternativa de un `if`.
#[derive(Debug, Clone, PartialEq)]
pub enum Else {
    Block(Block),

    /// `else if`, por recursión derecha.
    If(Box<Located<If>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgramDecl {
    pub name: Located<String>,
    pub program_id: Option<Located<String>>,
    pub items: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub name: Located<String>,
    pub accounts: Vec<Located<Account>>,
    pub body: Block,
}

impl Instruction {
    /// Cuentas de la instrucción en orden de declaración: primero las
    /// de la lista de parámetros, luego las declaradas en el cuerpo.
    pub fn all_accounts(&self) -> impl Iterator<Item = &Account> {
        let declared = self.body.iter().filter_map(|item| match item.val() {
            Statement::Account(account) => Some(account),
            _ => None,
        });

        self.accounts.iter().map(Located::val).chain(declared)
    }
}

bitflags! {
    /// Restricciones declaradas sobre una cuenta.
    pub struct Constraints: u8 {
        const SIGNER   = 0x01;
        const WRITABLE = 0x02;
        const INIT     = 0x04;
        const BUMP     = 0x08;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub name: String,
    pub ty: Option<String>,
    pub constraints: Constraints,
    pub seeds: Vec<Located<Expr>>,
}

impl Account {
    pub fn is(&self, constraint: Constraints) -> bool {
        self.constraints.contains(constraint)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateDecl {
    pub name: Located<String>,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventField {
    pub name: String,
    pub value: Located<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Texto original del literal.
    Number(String),

    /// Contenido ya sin escapes.
    Str(String),

    Identifier(String),

    /// Las llamadas no tienen argumentos.
    Call(String),

    Binary(Box<Located<Expr>>, BinOp, Box<Located<Expr>>),
}

impl Located<Expr> {
    /// Construye una operación binaria cuya ubicación cubre ambos operandos.
    pub fn binary(left: Located<Expr>, op: BinOp, right: Located<Expr>) -> Self {
        let location = Location::span(left.location().clone(), right.location());
        Located::at(Expr::Binary(Box::new(left), op, Box::new(right)), location)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Equal,
    NotEqual,
    Less,
    Greater,
}

impl BinOp {
    /// Nivel de precedencia; un nivel mayor agrupa primero.
    pub fn precedence(self) -> u8 {
        match self {
            BinOp::Mul | BinOp::Div => 3,
            BinOp::Add | BinOp::Sub => 2,
            BinOp::Equal | BinOp::NotEqual | BinOp::Less | BinOp::Greater => 1,
        }
    }
}

// Todos los objetivos comparten el mismo léxico de operadores
impl Display for BinOp {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Equal => "==",
            BinOp::NotEqual => "!=",
            BinOp::Less => "<",
            BinOp::Greater => ">",
        };

        fmt.write_str(op)
    }
}
