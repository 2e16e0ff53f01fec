//! Objetivos on-chain.
//!
//! Ambos objetivos comparten el aplanado de la unidad: la declaración
//! `program` aporta nombre e identificador, y sus ítems se reparten entre
//! funciones auxiliares, instrucciones, estructuras de estado y sentencias
//! sueltas. A partir de ahí la estructura diverge:
//!
//! - [`Target::ChainFramework`]: un módulo `#[program]` con un manejador
//!   por instrucción y un contexto de cuentas `#[derive(Accounts)]` por
//!   manejador. Las sentencias sueltas forman un manejador implícito.
//! - [`Target::ChainRaw`]: un único punto de entrada que ejecuta las
//!   sentencias sueltas y luego despacha por el primer byte de los datos
//!   de instrucción, asignando opcodes en orden de declaración.

use super::{expr, quote, Context, Emit, EmitError, Scope, Target};
use crate::{
    ast::{Account, Ast, Block, Constraints, EventField, Expr, Instruction, StateDecl, Statement},
    source::{Located, Location},
};

use log::debug;
use std::fmt::Write;

/// Nombre del manejador que agrupa las sentencias sueltas.
const IMPLICIT_HANDLER: &str = "execute";

const RAW_PRELUDE: &[&str] = &[
    "use solana_program::{",
    "    account_info::{next_account_info, AccountInfo},",
    "    entrypoint,",
    "    entrypoint::ProgramResult,",
    "    msg,",
    "    program::invoke,",
    "    program_error::ProgramError,",
    "    pubkey::Pubkey,",
    "    system_instruction,",
    "};",
];

/// Tipos de campo de estado; cualquier otro se emite como `u64`.
const FIELD_TYPES: &[(&str, &str)] = &[
    ("pubkey", "Pubkey"),
    ("u64", "u64"),
    ("u32", "u32"),
    ("bool", "bool"),
    ("string", "String"),
];

pub(super) fn emit_unit(context: &mut Context, ast: &Ast) -> Emit<()> {
    let layout = Layout::of(context, ast)?;

    match context.target {
        Target::ChainFramework => framework(context, ast, layout),
        _ => raw(context, layout),
    }
}

/// Emite las sentencias propias de la extensión on-chain.
pub(super) fn statement(context: &mut Context, statement: &Statement) -> Emit<()> {
    let framework = context.target == Target::ChainFramework;

    match statement {
        Statement::Require { condition, message } if framework => {
            let variant = error_variant(message.as_deref());
            emit!(context, "require!({}, ErrorCode::{});", expr(condition.val()), variant)
        }

        // El mensaje solo existe en el objetivo de framework
        Statement::Require { condition, .. } => guard(
            context,
            &format!("!({})", expr(condition.val())),
            "InvalidArgument",
        ),

        Statement::Transfer { from, to, amount } if framework => {
            framework_transfer(context, from.val(), to.val(), amount.val())
        }

        Statement::Transfer { from, to, amount } => {
            let (from, to, amount) = (expr(from.val()), expr(to.val()), expr(amount.val()));

            emit!(context, "invoke(")?;
            context.nested(|context| {
                emit!(context, "&system_instruction::transfer({}.key, {}.key, {}),", from, to, amount)?;
                emit!(context, "&[{}.clone(), {}.clone()],", from, to)
            })?;
            emit!(context, ")?;")
        }

        Statement::Emit { event, fields } if framework => {
            let fields: Vec<_> = fields
                .iter()
                .map(|field| format!("{}: {}", field.name, expr(field.value.val())))
                .collect();

            if fields.is_empty() {
                emit!(context, "emit!({} {{}});", event.val())
            } else {
                emit!(context, "emit!({} {{ {} }});", event.val(), fields.join(", "))
            }
        }

        Statement::Emit { event, fields } => {
            let format: String = fields
                .iter()
                .map(|field| format!(" {}={{}}", field.name))
                .collect();

            let args: String = fields
                .iter()
                .map(|field| format!(", {}", expr(field.value.val())))
                .collect();

            emit!(context, "msg!(\"{}{}\"{});", event.val(), format, args)
        }

        other => Err(context.unsupported(other)),
    }
}

/// Unidad aplanada.
struct Layout<'a> {
    name: String,
    program_id: Option<String>,
    helpers: Vec<(&'a Located<Statement>, &'a str, &'a Block)>,
    handlers: Vec<Handler<'a>>,
    states: Vec<&'a StateDecl>,
    loose: Vec<&'a Located<Statement>>,
}

/// Una instrucción declarada, o el manejador implícito.
#[derive(Clone)]
struct Handler<'a> {
    name: &'a str,
    accounts: Vec<&'a Account>,
    body: Vec<&'a Located<Statement>>,
    location: Location,
}

impl<'a> Layout<'a> {
    fn of(context: &mut Context, ast: &'a Ast) -> Emit<Self> {
        let mut layout = Layout {
            name: context.options.default_program_name.clone(),
            program_id: None,
            helpers: Vec::new(),
            handlers: Vec::new(),
            states: Vec::new(),
            loose: Vec::new(),
        };

        let mut declared = false;
        for item in &ast.items {
            context.last_known = item.location().clone();

            match item.val() {
                Statement::Program(program) => {
                    if declared {
                        return Err(context.fault(EmitError::DuplicateProgram));
                    }

                    declared = true;
                    layout.name = program.name.val().clone();
                    layout.program_id = program.program_id.as_ref().map(|id| id.val().clone());

                    for inner in &program.items {
                        layout.place(context, inner)?;
                    }
                }

                _ => layout.place(context, item)?,
            }
        }

        if layout.program_id.is_none() {
            layout.program_id = context.options.program_id.clone();
        }

        Ok(layout)
    }

    fn place(&mut self, context: &mut Context, item: &'a Located<Statement>) -> Emit<()> {
        context.last_known = item.location().clone();

        match item.val() {
            Statement::Function { name, body } => self.helpers.push((item, name.val(), body)),
            Statement::Instruction(instruction) => {
                self.handlers.push(Handler::declared(item, instruction))
            }

            Statement::State(state) => self.states.push(state),
            Statement::Program(_) => return Err(context.fault(EmitError::Misplaced("program"))),
            Statement::Account(account) => {
                return Err(context.fault(EmitError::OrphanAccount(account.name.clone())))
            }

            _ => self.loose.push(item),
        }

        Ok(())
    }

    fn state_names(&self) -> Vec<&'a str> {
        self.states.iter().map(|state| state.name.val().as_str()).collect()
    }
}

impl<'a> Handler<'a> {
    fn declared(item: &'a Located<Statement>, instruction: &'a Instruction) -> Self {
        // Las cuentas declaradas en el cuerpo ya forman parte de la lista
        let body = instruction
            .body
            .iter()
            .filter(|statement| !matches!(statement.val(), Statement::Account(_)))
            .collect();

        Handler {
            name: instruction.name.val(),
            accounts: instruction.all_accounts().collect(),
            body,
            location: item.location().clone(),
        }
    }

    fn transfers(&self) -> bool {
        any_node(self.body.iter().copied(), |statement| {
            matches!(statement, Statement::Transfer { .. })
        })
    }
}

fn framework(context: &mut Context, ast: &Ast, layout: Layout) -> Emit<()> {
    let mut handlers = Vec::new();
    if let Some(first) = layout.loose.first() {
        handlers.push(Handler {
            name: IMPLICIT_HANDLER,
            accounts: Vec::new(),
            body: layout.loose.clone(),
            location: first.location().clone(),
        });
    }

    let Layout {
        name,
        program_id,
        handlers: declared,
        ..
    } = &layout;

    handlers.extend(declared.iter().cloned());

    emit!(context, "use anchor_lang::prelude::*;")?;
    if any_node(&ast.items, |statement| matches!(statement, Statement::Transfer { .. })) {
        emit!(context, "use anchor_spl::token::{{self, Token}};")?;
    }

    emit!(context)?;
    if let Some(id) = program_id {
        emit!(context, "declare_id!({});", quote(id))?;
        emit!(context)?;
    }

    helpers(context, &layout)?;

    emit!(context, "#[program]")?;
    emit!(context, "pub mod {} {{", name)?;
    context.nested(|context| {
        emit!(context, "use super::*;")?;
        for handler in &handlers {
            emit!(context)?;
            handler_function(context, handler)?;
        }

        Ok(())
    })?;
    emit!(context, "}}")?;

    let states = layout.state_names();
    for handler in &handlers {
        emit!(context)?;
        accounts_struct(context, handler, &states)?;
    }

    for state in &layout.states {
        emit!(context)?;
        state_struct(context, state, "#[account]")?;
    }

    for (event, fields) in events(ast) {
        emit!(context)?;
        emit!(context, "#[event]")?;
        emit!(context, "pub struct {} {{", event)?;
        context.nested(|context| {
            fields
                .iter()
                .try_for_each(|(field, ty)| emit!(context, "pub {}: {},", field, ty))
        })?;
        emit!(context, "}}")?;
    }

    let codes = error_codes(ast);
    if !codes.is_empty() {
        emit!(context)?;
        emit!(context, "#[error_code]")?;
        emit!(context, "pub enum ErrorCode {{")?;
        context.nested(|context| {
            codes.iter().try_for_each(|(variant, message)| {
                emit!(context, "#[msg({})]", quote(message))?;
                emit!(context, "{},", variant)
            })
        })?;
        emit!(context, "}}")?;
    }

    Ok(())
}

fn handler_function(context: &mut Context, handler: &Handler) -> Emit<()> {
    context.last_known = handler.location.clone();
    context.enter(Scope::Instruction);
    context.authority = handler
        .accounts
        .iter()
        .find(|account| account.is(Constraints::SIGNER))
        .map(|account| account.name.clone());

    emit!(context, "pub fn {0}(ctx: Context<{0}Context>) -> Result<()> {{", handler.name)?;
    context.nested(|context| {
        for statement in &handler.body {
            context.statement(statement)?;
        }

        emit!(context, "Ok(())")
    })?;

    emit!(context, "}}")
}

/// Contexto de cuentas de un manejador, con campos en orden de declaración.
fn accounts_struct(context: &mut Context, handler: &Handler, states: &[&str]) -> Emit<()> {
    let init = handler.accounts.iter().any(|account| account.is(Constraints::INIT));
    let transfers = handler.transfers();

    emit!(context, "#[derive(Accounts)]")?;
    if handler.accounts.is_empty() && !transfers {
        return emit!(context, "pub struct {}Context {{}}", handler.name);
    }

    emit!(context, "pub struct {}Context<'info> {{", handler.name)?;
    context.nested(|context| {
        for account in &handler.accounts {
            account_field(context, account, states)?;
        }

        if init {
            emit!(context, "pub system_program: Program<'info, System>,")?;
        }

        if transfers {
            emit!(context, "pub {}: Program<'info, Token>,", context.options.token_program)?;
        }

        Ok(())
    })?;

    emit!(context, "}}")
}

fn account_field(context: &mut Context, account: &Account, states: &[&str]) -> Emit<()> {
    let mut constraints = Vec::new();
    if account.is(Constraints::SIGNER) {
        constraints.push(String::from("signer"));
    }

    if account.is(Constraints::WRITABLE) {
        constraints.push(String::from("mut"));
    }

    if account.is(Constraints::INIT) {
        constraints.push(String::from("init"));
        constraints.push(format!("payer = {}", context.options.payer));
        constraints.push(format!("space = {}", context.options.account_space));
    }

    if !account.seeds.is_empty() {
        let seeds: Vec<_> = account.seeds.iter().map(|seed| seed_bytes(seed.val())).collect();
        constraints.push(format!("seeds = [{}]", seeds.join(", ")));
    }

    if account.is(Constraints::BUMP) {
        constraints.push(String::from("bump"));
    }

    if !constraints.is_empty() {
        emit!(context, "#[account({})]", constraints.join(", "))?;
    }

    let name = &account.name;
    match account.ty.as_deref() {
        Some(ty) if states.contains(&ty) => emit!(context, "pub {}: Account<'info, {}>,", name, ty),
        None if account.is(Constraints::SIGNER) => emit!(context, "pub {}: Signer<'info>,", name),
        _ => {
            emit!(context, "/// CHECK: validated by the program logic")?;
            emit!(context, "pub {}: AccountInfo<'info>,", name)
        }
    }
}

fn seed_bytes(seed: &Expr) -> String {
    match seed {
        Expr::Str(text) => format!("b{}", quote(text)),
        Expr::Identifier(name) => format!("{}.key().as_ref()", name),
        other => expr(other),
    }
}

fn framework_transfer(context: &mut Context, from: &Expr, to: &Expr, amount: &Expr) -> Emit<()> {
    let (from, to, amount) = (account_info(from), account_info(to), expr(amount));
    let authority = match &context.authority {
        Some(signer) => account_info(&Expr::Identifier(signer.clone())),
        None => from.clone(),
    };

    emit!(context, "token::transfer(")?;
    context.nested(|context| {
        emit!(context, "CpiContext::new(")?;
        context.nested(|context| {
            emit!(context, "ctx.accounts.{}.to_account_info(),", context.options.token_program)?;
            emit!(context, "token::Transfer {{")?;
            context.nested(|context| {
                emit!(context, "from: {},", from)?;
                emit!(context, "to: {},", to)?;
                emit!(context, "authority: {},", authority)
            })?;
            emit!(context, "}},")
        })?;
        emit!(context, "),")?;
        emit!(context, "{},", amount)
    })?;

    emit!(context, ")?;")
}

fn account_info(account: &Expr) -> String {
    match account {
        Expr::Identifier(name) => format!("ctx.accounts.{}.to_account_info()", name),
        other => format!("{}.to_account_info()", expr(other)),
    }
}

/// Los códigos de operación ocupan el primer byte de los datos.
const MAX_OPCODES: usize = u8::MAX as usize + 1;

fn raw(context: &mut Context, layout: Layout) -> Emit<()> {
    if let Some(excess) = layout.handlers.get(MAX_OPCODES) {
        context.last_known = excess.location.clone();
        return Err(context.fault(EmitError::TooManyInstructions {
            max: MAX_OPCODES,
            found: layout.handlers.len(),
        }));
    }

    for line in RAW_PRELUDE {
        emit!(context, "{}", line)?;
    }

    emit!(context)?;
    emit!(context, "entrypoint!(process_instruction);")?;
    emit!(context)?;

    if let Some(id) = &layout.program_id {
        emit!(context, "solana_program::declare_id!({});", quote(id))?;
        emit!(context)?;
    }

    helpers(context, &layout)?;

    context.enter(Scope::Entry);
    context.authority = None;

    emit!(context, "pub fn process_instruction(")?;
    context.nested(|context| {
        emit!(context, "program_id: &Pubkey,")?;
        emit!(context, "accounts: &[AccountInfo],")?;
        emit!(context, "instruction_data: &[u8],")
    })?;
    emit!(context, ") -> ProgramResult {{")?;

    context.nested(|context| {
        // Las sentencias de nivel de programa preceden al despacho
        for statement in &layout.loose {
            context.statement(statement)?;
        }

        if !layout.loose.is_empty() {
            emit!(context)?;
        }

        emit!(context, "let (&opcode, _data) = instruction_data")?;
        context.nested(|context| {
            emit!(context, ".split_first()")?;
            emit!(context, ".ok_or(ProgramError::InvalidInstructionData)?;")
        })?;

        emit!(context)?;
        emit!(context, "match opcode {{")?;
        context.nested(|context| {
            for (opcode, handler) in layout.handlers.iter().enumerate() {
                debug!("Dispatching `{}` as opcode {}", handler.name, opcode);
                dispatch_arm(context, opcode, handler)?;
            }

            emit!(context, "_ => Err(ProgramError::InvalidInstructionData),")
        })?;
        emit!(context, "}}")
    })?;

    emit!(context, "}}")?;

    for state in &layout.states {
        emit!(context)?;
        state_struct(context, state, "#[derive(Clone, Debug, PartialEq)]")?;
    }

    Ok(())
}

fn dispatch_arm(context: &mut Context, opcode: usize, handler: &Handler) -> Emit<()> {
    context.last_known = handler.location.clone();
    context.enter(Scope::Instruction);

    emit!(context, "{} => {{", opcode)?;
    context.nested(|context| {
        emit!(context, "msg!(\"Executing {}\");", handler.name)?;

        if !handler.accounts.is_empty() {
            emit!(context, "let accounts_iter = &mut accounts.iter();")?;
            for account in &handler.accounts {
                account_checks(context, account)?;
            }
        }

        for statement in &handler.body {
            context.statement(statement)?;
        }

        emit!(context, "Ok(())")
    })?;

    emit!(context, "}}")
}

/// Enlace y validación de una cuenta en el objetivo crudo.
fn account_checks(context: &mut Context, account: &Account) -> Emit<()> {
    let name = &account.name;
    emit!(context, "let {} = next_account_info(accounts_iter)?;", name)?;

    if account.is(Constraints::SIGNER) {
        guard(context, &format!("!{}.is_signer", name), "MissingRequiredSignature")?;
    }

    if account.is(Constraints::WRITABLE) {
        guard(context, &format!("!{}.is_writable", name), "InvalidAccountData")?;
    }

    if account.is(Constraints::INIT) {
        guard(context, &format!("!{}.data_is_empty()", name), "AccountAlreadyInitialized")?;
    }

    // Las direcciones derivadas no se calculan, solo se documentan
    if !account.seeds.is_empty() || account.is(Constraints::BUMP) {
        let seeds: Vec<_> = account.seeds.iter().map(|seed| expr(seed.val())).collect();
        let bump = if account.is(Constraints::BUMP) { ", bump" } else { "" };
        emit!(context, "// {}: seeds = [{}]{}", name, seeds.join(", "), bump)?;
    }

    Ok(())
}

fn guard(context: &mut Context, condition: &str, error: &str) -> Emit<()> {
    emit!(context, "if {} {{", condition)?;
    context.nested(|context| emit!(context, "return Err(ProgramError::{});", error))?;
    emit!(context, "}}")
}

/// Funciones auxiliares, elevadas antes del programa.
fn helpers(context: &mut Context, layout: &Layout) -> Emit<()> {
    for &(item, name, body) in &layout.helpers {
        debug!("Hoisting helper `{}`", name);

        context.last_known = item.location().clone();
        context.enter(Scope::Function);

        emit!(context, "fn {}() -> u64 {{", name)?;
        context.nested(|context| {
            context.block(body)?;
            emit!(context, "0")
        })?;

        emit!(context, "}}")?;
        emit!(context)?;
    }

    Ok(())
}

fn state_struct(context: &mut Context, state: &StateDecl, attribute: &str) -> Emit<()> {
    emit!(context, "{}", attribute)?;
    emit!(context, "pub struct {} {{", state.name.val())?;
    context.nested(|context| {
        state.fields.iter().try_for_each(|field| {
            emit!(context, "pub {}: {},", field.name, field_type(field.ty.as_deref()))
        })
    })?;

    emit!(context, "}}")
}

fn field_type(ty: Option<&str>) -> &'static str {
    ty.and_then(|ty| FIELD_TYPES.iter().find(|(name, _)| unicase::eq_ascii(*name, ty)))
        .map_or("u64", |&(_, rust)| rust)
}

/// Eventos emitidos, en orden de primera aparición.
fn events(ast: &Ast) -> Vec<(&str, Vec<(&str, &'static str)>)> {
    let mut events: Vec<(&str, Vec<(&str, &'static str)>)> = Vec::new();

    walk(&ast.items, &mut |statement| {
        if let Statement::Emit { event, fields } = statement {
            if events.iter().all(|(known, _)| *known != event.val().as_str()) {
                events.push((event.val(), fields.iter().map(event_field).collect()));
            }
        }
    });

    events
}

fn event_field(field: &EventField) -> (&str, &'static str) {
    let ty = match field.value.val() {
        Expr::Str(_) => "String",
        _ => "u64",
    };

    (field.name.as_str(), ty)
}

/// Códigos de error derivados de los mensajes de `require`.
fn error_codes(ast: &Ast) -> Vec<(String, String)> {
    let mut codes: Vec<(String, String)> = Vec::new();

    walk(&ast.items, &mut |statement| {
        if let Statement::Require { message, .. } = statement {
            let variant = error_variant(message.as_deref());
            if codes.iter().all(|(known, _)| *known != variant) {
                let message = message.as_deref().unwrap_or("Requirement failed");
                codes.push((variant, message.to_owned()));
            }
        }
    });

    codes
}

/// `"must be positive"` se convierte en `MustBePositive`.
fn error_variant(message: Option<&str>) -> String {
    let variant: String = message
        .unwrap_or("")
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let (first, rest) = word.split_at(1);
            first.to_ascii_uppercase() + rest
        })
        .collect();

    match variant.chars().next() {
        None => String::from("RequirementFailed"),
        Some(first) if first.is_ascii_digit() => format!("Error{}", variant),
        Some(_) => variant,
    }
}

fn walk<'a>(block: &'a Block, visit: &mut dyn FnMut(&'a Statement)) {
    for item in block {
        visit(item.val());
        for inner in item.val().blocks() {
            walk(inner, visit);
        }
    }
}

fn any_node<'a, I>(items: I, predicate: fn(&Statement) -> bool) -> bool
where
    I: IntoIterator<Item = &'a Located<Statement>>,
{
    items.into_iter().any(|item| {
        predicate(item.val())
            || item
                .val()
                .blocks()
                .into_iter()
                .any(|block| any_node(block, predicate))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        codegen::{emit, EmitOptions},
        features::Features,
        lex::tokenize,
        parse::parse,
    };
    use crate::source::Source;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn ast(text: &str) -> Ast {
        let source = Source::new("test.so", text);
        let tokens = tokenize(&source, Features::all()).unwrap();
        parse(&source, &tokens, Features::all()).unwrap()
    }

    fn emit_text(text: &str, target: Target) -> String {
        emit(&ast(text), target, &EmitOptions::default()).unwrap()
    }

    /// Texto sin indentación, para comparar fragmentos anidados.
    fn flat(text: &str) -> String {
        text.lines().map(|line| format!("{}\n", line.trim_start())).collect()
    }

    fn emit_error(text: &str, target: Target) -> EmitError {
        emit(&ast(text), target, &EmitOptions::default())
            .unwrap_err()
            .into_inner()
    }

    const FOO: &str = "program Foo { instruction bar() { print(\"hi\") } }";

    #[test]
    fn raw_dispatch() {
        assert_eq!(
            emit_text(FOO, Target::ChainRaw),
            indoc! {r#"
                use solana_program::{
                    account_info::{next_account_info, AccountInfo},
                    entrypoint,
                    entrypoint::ProgramResult,
                    msg,
                    program::invoke,
                    program_error::ProgramError,
                    pubkey::Pubkey,
                    system_instruction,
                };

                entrypoint!(process_instruction);

                pub fn process_instruction(
                    program_id: &Pubkey,
                    accounts: &[AccountInfo],
                    instruction_data: &[u8],
                ) -> ProgramResult {
                    let (&opcode, _data) = instruction_data
                        .split_first()
                        .ok_or(ProgramError::InvalidInstructionData)?;

                    match opcode {
                        0 => {
                            msg!("Executing bar");
                            msg!("{}", "hi");
                            Ok(())
                        }
                        _ => Err(ProgramError::InvalidInstructionData),
                    }
                }
            "#}
        );
    }

    #[test]
    fn framework_module() {
        assert_eq!(
            emit_text(FOO, Target::ChainFramework),
            indoc! {r#"
                use anchor_lang::prelude::*;

                #[program]
                pub mod Foo {
                    use super::*;

                    pub fn bar(ctx: Context<barContext>) -> Result<()> {
                        msg!("{}", "hi");
                        Ok(())
                    }
                }

                #[derive(Accounts)]
                pub struct barContext {}
            "#}
        );
    }

    #[test]
    fn opcodes_follow_declaration_order() {
        let output = emit_text(
            "program P {\n instruction a() { }\n instruction b() { }\n instruction c() { }\n}",
            Target::ChainRaw,
        );

        let a = output.find("0 => {").unwrap();
        let b = output.find("1 => {").unwrap();
        let c = output.find("2 => {").unwrap();

        assert!(a < b && b < c);
        assert!(output[a..b].contains("Executing a"));
        assert!(output[c..].contains("Executing c"));
    }

    #[test]
    fn require_keeps_its_message_only_in_the_framework() {
        let source = "program P { instruction check() { require(x > 0, \"must be positive\") } }";

        let framework = emit_text(source, Target::ChainFramework);
        assert!(framework.contains("require!(x > 0, ErrorCode::MustBePositive);"));
        assert!(framework.contains(indoc! {r#"
            #[error_code]
            pub enum ErrorCode {
                #[msg("must be positive")]
                MustBePositive,
            }
        "#}));

        let raw = emit_text(source, Target::ChainRaw);
        assert!(flat(&raw).contains(indoc! {"
            if !(x > 0) {
            return Err(ProgramError::InvalidArgument);
            }
        "}));
        assert!(!raw.contains("must be positive"));
    }

    #[test]
    fn loose_statements_form_an_implicit_handler() {
        let source = "require(x > 0, \"must be positive\")";

        let framework = emit_text(source, Target::ChainFramework);
        assert!(framework.contains("pub mod program {"));
        assert!(framework.contains("pub fn execute(ctx: Context<executeContext>) -> Result<()> {"));
        assert!(framework.contains("pub struct executeContext {}"));

        let raw = emit_text(source, Target::ChainRaw);
        let guard = raw.find("if !(x > 0) {").unwrap();
        let dispatch = raw.find("match opcode {").unwrap();
        assert!(guard < dispatch);
    }

    #[test]
    fn accounts_struct_preserves_declaration_order() {
        let output = emit_text(
            indoc! {r#"
                program Bank {
                    state Vault { owner: pubkey, balance: u64, note: string, flag: Bool, other: f32 }
                    instruction deposit(account vault(init, writable, seeds("vault", user), bump): Vault, @signer user, account mint) {
                        account clock: Sysvar
                        transfer(user, vault, 10)
                    }
                }
            "#},
            Target::ChainFramework,
        );

        assert!(output.starts_with(
            "use anchor_lang::prelude::*;\nuse anchor_spl::token::{self, Token};\n"
        ));

        assert!(output.contains(indoc! {r#"
            #[derive(Accounts)]
            pub struct depositContext<'info> {
                #[account(mut, init, payer = payer, space = 8 + 32, seeds = [b"vault", user.key().as_ref()], bump)]
                pub vault: Account<'info, Vault>,
                #[account(signer)]
                pub user: Signer<'info>,
                /// CHECK: validated by the program logic
                pub mint: AccountInfo<'info>,
                /// CHECK: validated by the program logic
                pub clock: AccountInfo<'info>,
                pub system_program: Program<'info, System>,
                pub token_program: Program<'info, Token>,
            }
        "#}));

        assert!(output.contains(indoc! {"
            #[account]
            pub struct Vault {
                pub owner: Pubkey,
                pub balance: u64,
                pub note: String,
                pub flag: bool,
                pub other: u64,
            }
        "}));

        assert!(output.contains("authority: ctx.accounts.user.to_account_info(),"));
        assert!(output.contains("from: ctx.accounts.user.to_account_info(),"));
    }

    #[test]
    fn raw_accounts_are_checked_in_order() {
        let output = emit_text(
            "program Bank { instruction withdraw(@signer @writable owner, account vault(writable, init, seeds(\"v\"), bump)) { transfer(vault, owner, 5) } }",
            Target::ChainRaw,
        );

        assert!(flat(&output).contains(indoc! {r#"
            let accounts_iter = &mut accounts.iter();
            let owner = next_account_info(accounts_iter)?;
            if !owner.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
            }
            if !owner.is_writable {
            return Err(ProgramError::InvalidAccountData);
            }
            let vault = next_account_info(accounts_iter)?;
            if !vault.is_writable {
            return Err(ProgramError::InvalidAccountData);
            }
            if !vault.data_is_empty() {
            return Err(ProgramError::AccountAlreadyInitialized);
            }
            // vault: seeds = ["v"], bump
            invoke(
            &system_instruction::transfer(vault.key, owner.key, 5),
            &[vault.clone(), owner.clone()],
            )?;
            Ok(())
        "#}));
    }

    #[test]
    fn events_and_helpers() {
        let source = indoc! {r#"
            fn fee() { return 2 }
            program Market {
                instruction sell() {
                    emit Sold(amount: fee(), by: "me")
                    emit Sold
                }
            }
        "#};

        let framework = emit_text(source, Target::ChainFramework);
        assert!(framework.contains("fn fee() -> u64 {\n    return 2;\n    0\n}\n"));
        assert!(framework.contains("emit!(Sold { amount: fee(), by: \"me\" });"));
        assert!(framework.contains("emit!(Sold {});"));
        assert!(framework.contains("#[event]\npub struct Sold {\n    pub amount: u64,\n    pub by: String,\n}\n"));

        let raw = emit_text(source, Target::ChainRaw);
        assert!(raw.contains("msg!(\"Sold amount={} by={}\", fee(), \"me\");"));
        assert!(raw.contains("msg!(\"Sold\");"));
    }

    #[test]
    fn program_ids() {
        let literal = "program P(\"11111111111111111111111111111111\") { }";
        let output = emit_text(literal, Target::ChainFramework);
        assert!(output.contains("declare_id!(\"11111111111111111111111111111111\");"));

        let options = EmitOptions {
            program_id: Some(String::from("Fallback1111111111111111111111111")),
            ..EmitOptions::default()
        };

        let output = emit(&ast("program P { }"), Target::ChainRaw, &options).unwrap();
        assert!(output.contains("solana_program::declare_id!(\"Fallback1111111111111111111111111\");"));

        let output = emit(&ast(literal), Target::ChainRaw, &options).unwrap();
        assert!(!output.contains("Fallback"));
    }

    #[test]
    fn returns_inside_instructions() {
        let output = emit_text("program P { instruction i() { if x { return } } }", Target::ChainRaw);
        assert!(output.contains("return Ok(());"));

        assert_eq!(
            emit_error("program P { instruction i() { return 1 } }", Target::ChainRaw),
            EmitError::ValueReturnInInstruction
        );
    }

    #[test]
    fn misplaced_declarations() {
        assert_eq!(
            emit_error("program A { }\nprogram B { }", Target::ChainRaw),
            EmitError::DuplicateProgram
        );

        assert_eq!(
            emit_error("program A { program B { } }", Target::ChainRaw),
            EmitError::Misplaced("program")
        );

        assert_eq!(
            emit_error("program A { account loose }", Target::ChainFramework),
            EmitError::OrphanAccount(String::from("loose"))
        );

        assert_eq!(
            emit_error("program A { instruction i() { instruction j() { } } }", Target::ChainRaw),
            EmitError::Misplaced("instruction")
        );

        assert_eq!(
            emit_error("program A { instruction i() { fn f() { } } }", Target::ChainFramework),
            EmitError::NestedFunction
        );
    }

    #[test]
    fn opcodes_fit_in_one_byte() {
        let program = |count: usize| {
            let instructions: Vec<_> = (0..count).map(|i| format!("instruction i{}() {{ }}", i)).collect();
            format!("program P {{\n{}\n}}", instructions.join("\n"))
        };

        let output = emit_text(&program(256), Target::ChainRaw);
        assert!(output.contains("255 => {"));

        let error = emit(&ast(&program(300)), Target::ChainRaw, &EmitOptions::default()).unwrap_err();
        assert_eq!(error.location().start().line(), 258);
        assert_eq!(
            error.into_inner(),
            EmitError::TooManyInstructions { max: 256, found: 300 }
        );

        let framework = emit_text(&program(300), Target::ChainFramework);
        assert!(framework.contains("pub fn i299("));
    }

    #[test]
    fn error_variants() {
        assert_eq!(error_variant(Some("must be positive")), "MustBePositive");
        assert_eq!(error_variant(Some("not-enough_funds!")), "NotEnoughFunds");
        assert_eq!(error_variant(Some("404 not found")), "Error404NotFound");
        assert_eq!(error_variant(Some("   ")), "RequirementFailed");
        assert_eq!(error_variant(None), "RequirementFailed");
    }
}
