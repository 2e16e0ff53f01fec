//! Objetivos nativos: C y Rust.
//!
//! Se emite en dos pasadas sobre los ítems de nivel superior. La primera
//! eleva cada `fn` como función independiente con un `return 0`
//! implícito al final; la segunda abre `main` y emite el resto de ítems
//! en orden de aparición.

use super::{Context, Emit, Scope, Target};
use crate::ast::{Ast, Block, Statement};

use log::debug;
use std::fmt::Write;

pub(super) fn emit_unit(context: &mut Context, ast: &Ast) -> Emit<()> {
    if context.target == Target::NativeC {
        emit!(context, "#include <stdio.h>")?;
        emit!(context, "#include <stdlib.h>")?;
        emit!(context, "#include <string.h>")?;
        emit!(context)?;
    }

    for item in &ast.items {
        if let Statement::Function { name, body } = item.val() {
            context.last_known = item.location().clone();
            function(context, name.val(), body)?;
        }
    }

    context.enter(Scope::Entry);
    match context.target {
        Target::NativeC => emit!(context, "int main() {{")?,
        _ => emit!(context, "fn main() {{")?,
    }

    context.nested(|context| {
        let statements = ast
            .items
            .iter()
            .filter(|item| !matches!(item.val(), Statement::Function { .. }));

        for statement in statements {
            context.statement(statement)?;
        }

        match context.target {
            Target::NativeC => emit!(context, "return 0;"),
            _ => Ok(()),
        }
    })?;

    emit!(context, "}}")
}

fn function(context: &mut Context, name: &str, body: &Block) -> Emit<()> {
    debug!("Hoisting function `{}`", name);

    context.enter(Scope::Function);
    match context.target {
        Target::NativeC => emit!(context, "int {}() {{", name)?,
        _ => emit!(context, "fn {}() -> i32 {{", name)?,
    }

    context.nested(|context| {
        context.block(body)?;

        // Todo camino sin `return` explícito termina en cero
        match context.target {
            Target::NativeC => emit!(context, "return 0;"),
            _ => emit!(context, "0"),
        }
    })?;

    emit!(context, "}}")?;
    emit!(context)
}
