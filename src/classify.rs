//! Clasificación de unidades de compilación.

use crate::ast::{Ast, Block, ProgramDecl, Statement};
use std::fmt::{self, Display};

/// Clase de una unidad, según los nodos que contiene.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnitKind {
    Generic,
    ChainProgram,
}

impl Display for UnitKind {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitKind::Generic => fmt.write_str("generic program"),
            UnitKind::ChainProgram => fmt.write_str("on-chain program"),
        }
    }
}

/// Determina si una unidad es un programa on-chain.
///
/// Basta con que exista, en cualquier nivel de anidamiento, un nodo
/// de la extensión on-chain. `state` por sí solo no cuenta, ya que
/// no altera la forma del programa generado.
pub fn classify(ast: &Ast) -> UnitKind {
    if contains_chain_node(&ast.items) {
        UnitKind::ChainProgram
    } else {
        UnitKind::Generic
    }
}

/// Primera declaración `program` en preorden.
pub fn program_decl(ast: &Ast) -> Option<&ProgramDecl> {
    fn search(block: &Block) -> Option<&ProgramDecl> {
        block.iter().find_map(|item| match item.val() {
            Statement::Program(program) => Some(program),
            statement => statement.blocks().into_iter().find_map(search),
        })
    }

    search(&ast.items)
}

/// Nombre declarado del programa, si lo hay.
pub fn program_name(ast: &Ast) -> Option<&str> {
    program_decl(ast).map(|program| program.name.val().as_str())
}

fn contains_chain_node(block: &Block) -> bool {
    block.iter().any(|item| {
        let statement = item.val();
        statement.is_chain_node() || statement.blocks().into_iter().any(contains_chain_node)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{features::Features, lex::tokenize, parse::parse, source::Source};

    fn ast(text: &str) -> Ast {
        let source = Source::new("test.so", text);
        let tokens = tokenize(&source, Features::all()).unwrap();
        parse(&source, &tokens, Features::all()).unwrap()
    }

    #[test]
    fn generic_units() {
        assert_eq!(classify(&ast("let x = 42\nprint(x)")), UnitKind::Generic);
        assert_eq!(classify(&ast("state Vault { owner: pubkey }")), UnitKind::Generic);
        assert_eq!(classify(&ast("")), UnitKind::Generic);
    }

    #[test]
    fn nested_chain_nodes_are_found() {
        let unit = ast("fn helper() {\n if x { instruction deep() { } }\n}");
        assert_eq!(classify(&unit), UnitKind::ChainProgram);

        let unit = ast("if a { } else if b { } else { require(ok) }");
        assert_eq!(classify(&unit), UnitKind::ChainProgram);
    }

    #[test]
    fn program_name_is_the_first_declaration() {
        let unit = ast("fn f() { program Inner { } }\nprogram Outer { }");
        assert_eq!(classify(&unit), UnitKind::ChainProgram);
        assert_eq!(program_name(&unit), Some("Inner"));

        let unit = ast("transfer(a, b, 1)");
        assert_eq!(classify(&unit), UnitKind::ChainProgram);
        assert_eq!(program_name(&unit), None);
    }
}
