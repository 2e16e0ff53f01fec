//! Análisis sintáctico.
//!
//! Parser descendente recursivo con un único token de lookahead.
//! La gramática es permisiva: la mayoría de tokens esperados se
//! consumen solo si están presentes. Los errores duros se limitan a
//! nombres faltantes tras una palabra clave declarativa, un `{`
//! faltante al abrir un bloque y un token que no puede iniciar una
//! expresión donde se requiere una.

use crate::{
    ast::{
        Account, Ast, BinOp, Block, Constraints, Else, EventField, Expr, Field, If, Instruction,
        ProgramDecl, StateDecl, Statement,
    },
    features::Features,
    lex::{Token, TokenKind},
    source::{Located, Location, Position, Source},
};

use std::rc::Rc;
use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParserError {
    #[error("Expected a name after {after}, found {found}")]
    MissingName { after: TokenKind, found: String },

    #[error("Expected `{{` to open a block, found {0}")]
    ExpectedBlock(String),

    #[error("Expected an expression, found {0}")]
    ExpectedExpr(String),
}

/// Construye el AST de una unidad a partir de su secuencia de tokens.
pub fn parse(
    source: &Rc<Source>,
    tokens: &[Token],
    features: Features,
) -> Result<Ast, Located<ParserError>> {
    let end = match tokens.last() {
        Some(last) => last.end(),
        None => Position::default(),
    };

    let mut parser = Parser {
        source,
        tokens,
        position: 0,
        end: Token::end_of_input(end),
        features,
        last_known: source.start(),
    };

    parser.program()
}

struct Parser<'a> {
    source: &'a Rc<Source>,
    tokens: &'a [Token],
    position: usize,
    end: Token,
    features: Features,
    last_known: Location,
}

type Parse<T> = Result<T, Located<ParserError>>;

impl Parser<'_> {
    fn program(&mut self) -> Parse<Ast> {
        let mut items = Vec::new();

        self.skip_terminators();
        while self.kind() != TokenKind::EndOfInput {
            items.push(self.statement()?);
            self.skip_terminators();
        }

        Ok(Ast {
            items,
            origin: self.source.start(),
        })
    }

    fn block(&mut self) -> Parse<Block> {
        self.skip_newlines();
        if !self.matches(TokenKind::OpenCurly) {
            return self.fail(ParserError::ExpectedBlock(self.current().to_string()));
        }

        let mut statements = Vec::new();
        loop {
            self.skip_terminators();
            match self.kind() {
                TokenKind::CloseCurly => {
                    self.advance();
                    break Ok(statements);
                }

                // Un bloque sin cerrar termina con la entrada
                TokenKind::EndOfInput => break Ok(statements),

                _ => statements.push(self.statement()?),
            }
        }
    }

    fn statement(&mut self) -> Parse<Located<Statement>> {
        let start = self.here();
        let statement = match self.kind() {
            TokenKind::Let => self.let_statement()?,
            TokenKind::Fn => self.function()?,
            TokenKind::If => Statement::If(self.conditional()?.into_inner()),
            TokenKind::Return => self.return_statement()?,
            TokenKind::Print => self.print()?,

            TokenKind::Program => self.program_decl()?,
            TokenKind::Instruction => self.instruction()?,
            TokenKind::Account => Statement::Account(self.account()?.into_inner()),
            TokenKind::Signer | TokenKind::Writable | TokenKind::Init => {
                Statement::Account(self.attributed_account()?.into_inner())
            }

            TokenKind::State => self.state()?,
            TokenKind::Transfer => self.transfer()?,
            TokenKind::Require => self.require()?,
            TokenKind::Emit => self.emit()?,

            _ => Statement::Expr(self.expr()?.into_inner()),
        };

        Ok(Located::at(statement, Location::span(start, &self.last_known)))
    }

    fn let_statement(&mut self) -> Parse<Statement> {
        self.advance();
        let name = self.name(TokenKind::Let)?;

        let init = if self.matches(TokenKind::Assign) {
            Some(self.expr()?)
        } else {
            None
        };

        Ok(Statement::Let { name, init })
    }

    fn function(&mut self) -> Parse<Statement> {
        self.advance();
        let name = self.name(TokenKind::Fn)?;

        // Los parámetros no tienen representación en el código generado
        if self.matches(TokenKind::OpenParen) {
            self.skip_until(TokenKind::CloseParen);
        }

        // Anotación de tipo de retorno, igualmente descartada
        if self.matches(TokenKind::Arrow) && self.kind() != TokenKind::OpenCurly {
            self.advance();
        }

        let body = self.block()?;
        Ok(Statement::Function { name, body })
    }

    fn conditional(&mut self) -> Parse<Located<If>> {
        let start = self.here();
        self.advance();

        let condition = self.expr()?;
        let then = self.block()?;

        let otherwise = if self.matches_after_newlines(TokenKind::Else) {
            if self.kind() == TokenKind::If {
                Some(Else::If(Box::new(self.conditional()?)))
            } else {
                Some(Else::Block(self.block()?))
            }
        } else {
            None
        };

        let conditional = If {
            condition,
            then,
            otherwise,
        };

        Ok(Located::at(conditional, Location::span(start, &self.last_known)))
    }

    fn return_statement(&mut self) -> Parse<Statement> {
        self.advance();

        let value = if self.at_statement_end() {
            None
        } else {
            Some(self.expr()?)
        };

        Ok(Statement::Return(value))
    }

    fn print(&mut self) -> Parse<Statement> {
        self.advance();

        let value = if self.matches(TokenKind::OpenParen) {
            if self.matches(TokenKind::CloseParen) {
                None
            } else {
                let value = self.expr()?;
                self.matches(TokenKind::CloseParen);
                Some(value)
            }
        } else if self.at_statement_end() {
            None
        } else {
            Some(self.expr()?)
        };

        Ok(Statement::Print(value))
    }

    fn program_decl(&mut self) -> Parse<Statement> {
        self.advance();
        let name = self.name(TokenKind::Program)?;

        let mut program_id = None;
        if self.matches(TokenKind::OpenParen) {
            if self.kind() == TokenKind::Str {
                let location = self.here();
                let token = self.advance();
                program_id = Some(Located::at(token.lexeme().to_owned(), location));
            }

            self.matches(TokenKind::CloseParen);
        }

        let items = self.block()?;
        Ok(Statement::Program(ProgramDecl {
            name,
            program_id,
            items,
        }))
    }

    fn instruction(&mut self) -> Parse<Statement> {
        self.advance();
        let name = self.name(TokenKind::Instruction)?;

        let mut accounts = Vec::new();
        if self.matches(TokenKind::OpenParen) {
            loop {
                match self.kind() {
                    TokenKind::CloseParen => {
                        self.advance();
                        break;
                    }

                    TokenKind::EndOfInput => break,
                    TokenKind::Account => accounts.push(self.account()?),
                    TokenKind::Signer | TokenKind::Writable | TokenKind::Init => {
                        accounts.push(self.attributed_account()?)
                    }

                    // Cualquier otro parámetro se descarta, igual que en `fn`
                    _ => {
                        self.advance();
                    }
                }
            }
        }

        let body = self.block()?;
        Ok(Statement::Instruction(Instruction {
            name,
            accounts,
            body,
        }))
    }

    /// `account NAME ('(' restricciones ')')? (':' TIPO)?`
    fn account(&mut self) -> Parse<Located<Account>> {
        let start = self.here();
        self.advance();
        let name = self.name(TokenKind::Account)?.into_inner();

        let mut constraints = Constraints::empty();
        let mut seeds = Vec::new();
        if self.matches(TokenKind::OpenParen) {
            self.constraints(&mut constraints, &mut seeds)?;
        }

        let ty = self.type_annotation();
        let account = Account {
            name,
            ty,
            constraints,
            seeds,
        };

        Ok(Located::at(account, Location::span(start, &self.last_known)))
    }

    /// `(@signer | @writable | @init)+ NAME (':' TIPO)?`
    fn attributed_account(&mut self) -> Parse<Located<Account>> {
        let start = self.here();

        let mut constraints = Constraints::empty();
        let mut last = self.kind();
        while let Some(constraint) = attribute_constraint(self.kind()) {
            last = self.kind();
            constraints |= constraint;
            self.advance();
        }

        let name = self.name(last)?.into_inner();
        let ty = self.type_annotation();

        let account = Account {
            name,
            ty,
            constraints,
            seeds: Vec::new(),
        };

        Ok(Located::at(account, Location::span(start, &self.last_known)))
    }

    /// Lista de restricciones sin orden; tokens desconocidos se omiten.
    fn constraints(
        &mut self,
        constraints: &mut Constraints,
        seeds: &mut Vec<Located<Expr>>,
    ) -> Parse<()> {
        loop {
            self.skip_newlines();
            match self.kind() {
                TokenKind::CloseParen => {
                    self.advance();
                    break Ok(());
                }

                TokenKind::EndOfInput => break Ok(()),

                TokenKind::Seeds => {
                    self.advance();
                    if self.matches(TokenKind::OpenParen) {
                        self.list(|parser| {
                            seeds.push(parser.expr()?);
                            Ok(())
                        })?;
                    }
                }

                kind => {
                    if let Some(constraint) = attribute_constraint(kind) {
                        *constraints |= constraint;
                    } else if kind == TokenKind::Bump {
                        *constraints |= Constraints::BUMP;
                    }

                    self.advance();
                }
            }
        }
    }

    fn state(&mut self) -> Parse<Statement> {
        self.advance();
        let name = self.name(TokenKind::State)?;

        self.skip_newlines();
        if !self.matches(TokenKind::OpenCurly) {
            return self.fail(ParserError::ExpectedBlock(self.current().to_string()));
        }

        let mut fields = Vec::new();
        loop {
            self.skip_terminators();
            match self.kind() {
                TokenKind::CloseCurly => {
                    self.advance();
                    break;
                }

                TokenKind::EndOfInput => break,
                TokenKind::Comma => {
                    self.advance();
                }

                TokenKind::Identifier => {
                    let name = self.advance().lexeme().to_owned();
                    let ty = self.type_annotation();
                    fields.push(Field { name, ty });
                }

                _ => {
                    self.advance();
                }
            }
        }

        Ok(Statement::State(StateDecl { name, fields }))
    }

    fn transfer(&mut self) -> Parse<Statement> {
        self.advance();
        self.matches(TokenKind::OpenParen);

        let from = self.expr()?;
        self.matches(TokenKind::Comma);
        let to = self.expr()?;
        self.matches(TokenKind::Comma);
        let amount = self.expr()?;

        self.matches(TokenKind::CloseParen);
        Ok(Statement::Transfer { from, to, amount })
    }

    fn require(&mut self) -> Parse<Statement> {
        self.advance();
        self.matches(TokenKind::OpenParen);

        let condition = self.expr()?;

        let mut message = None;
        if self.matches(TokenKind::Comma) && self.kind() == TokenKind::Str {
            message = Some(self.advance().lexeme().to_owned());
        }

        self.matches(TokenKind::CloseParen);
        Ok(Statement::Require { condition, message })
    }

    fn emit(&mut self) -> Parse<Statement> {
        self.advance();
        let event = self.name(TokenKind::Emit)?;

        let mut fields = Vec::new();
        if self.matches(TokenKind::OpenParen) {
            self.list(|parser| {
                if parser.kind() != TokenKind::Identifier {
                    parser.advance();
                    return Ok(());
                }

                let location = parser.here();
                let name = parser.advance().lexeme().to_owned();

                // Un campo sin valor es abreviatura de `campo: campo`
                let value = if parser.matches(TokenKind::Colon) {
                    parser.expr()?
                } else {
                    Located::at(Expr::Identifier(name.clone()), location)
                };

                fields.push(EventField { name, value });
                Ok(())
            })?;
        }

        Ok(Statement::Emit { event, fields })
    }

    fn type_annotation(&mut self) -> Option<String> {
        if !self.matches(TokenKind::Colon) {
            return None;
        }

        match self.kind() {
            TokenKind::Identifier | TokenKind::Pubkey => Some(self.advance().lexeme().to_owned()),
            _ => None,
        }
    }

    fn expr(&mut self) -> Parse<Located<Expr>> {
        if self.features.contains(Features::PRECEDENCE) {
            self.binary(1)
        } else {
            // Gramática plana: a lo sumo un operador binario
            let left = self.primary()?;
            match self.operator() {
                Some(op) => {
                    self.advance();
                    let right = self.primary()?;
                    Ok(Located::binary(left, op, right))
                }

                None => Ok(left),
            }
        }
    }

    /// Escalado de precedencia, asociativo a la izquierda.
    fn binary(&mut self, min: u8) -> Parse<Located<Expr>> {
        let mut left = self.primary()?;

        while let Some(op) = self.operator() {
            if op.precedence() < min {
                break;
            }

            self.advance();
            let right = self.binary(op.precedence() + 1)?;
            left = Located::binary(left, op, right);
        }

        Ok(left)
    }

    fn primary(&mut self) -> Parse<Located<Expr>> {
        let location = self.here();
        let expr = match self.kind() {
            TokenKind::Number => Expr::Number(self.advance().lexeme().to_owned()),
            TokenKind::Str => Expr::Str(self.advance().lexeme().to_owned()),

            TokenKind::Identifier => {
                let name = self.advance().lexeme().to_owned();

                // Las llamadas no admiten argumentos; se descartan
                if self.matches(TokenKind::OpenParen) {
                    self.skip_until(TokenKind::CloseParen);
                    Expr::Call(name)
                } else {
                    Expr::Identifier(name)
                }
            }

            TokenKind::OpenParen => {
                self.advance();
                let inner = self.expr()?;
                self.matches(TokenKind::CloseParen);

                return Ok(inner);
            }

            _ => return self.fail(ParserError::ExpectedExpr(self.current().to_string())),
        };

        Ok(Located::at(expr, Location::span(location, &self.last_known)))
    }

    fn operator(&self) -> Option<BinOp> {
        let op = match self.kind() {
            TokenKind::Plus => BinOp::Add,
            TokenKind::Minus => BinOp::Sub,
            TokenKind::Star => BinOp::Mul,
            TokenKind::Slash => BinOp::Div,
            TokenKind::Equal => BinOp::Equal,
            TokenKind::NotEqual => BinOp::NotEqual,
            TokenKind::Less => BinOp::Less,
            TokenKind::Greater => BinOp::Greater,
            _ => return None,
        };

        Some(op)
    }

    /// Elementos separados opcionalmente por comas hasta `)`.
    fn list<F>(&mut self, mut item: F) -> Parse<()>
    where
        F: FnMut(&mut Self) -> Parse<()>,
    {
        loop {
            self.skip_newlines();
            match self.kind() {
                TokenKind::CloseParen => {
                    self.advance();
                    break Ok(());
                }

                TokenKind::EndOfInput => break Ok(()),
                TokenKind::Comma => {
                    self.advance();
                }

                _ => item(self)?,
            }
        }
    }

    fn name(&mut self, after: TokenKind) -> Parse<Located<String>> {
        if self.kind() != TokenKind::Identifier {
            let found = self.current().to_string();
            return self.fail(ParserError::MissingName { after, found });
        }

        let location = self.here();
        let token = self.advance();

        Ok(Located::at(token.lexeme().to_owned(), location))
    }

    fn at_statement_end(&self) -> bool {
        matches!(
            self.kind(),
            TokenKind::Newline | TokenKind::Semicolon | TokenKind::CloseCurly | TokenKind::EndOfInput
        )
    }

    fn skip_terminators(&mut self) {
        while self.kind().is_terminator() {
            self.advance();
        }
    }

    fn skip_newlines(&mut self) {
        while self.kind() == TokenKind::Newline {
            self.advance();
        }
    }

    /// Consume hasta e incluyendo un token dado, o hasta el final.
    fn skip_until(&mut self, kind: TokenKind) {
        while !matches!(self.kind(), TokenKind::EndOfInput) {
            if self.advance().kind() == kind {
                break;
            }
        }
    }

    /// Consume un token tras saltos de línea opcionales. Si el token no
    /// aparece, los saltos de línea tampoco se consumen.
    fn matches_after_newlines(&mut self, kind: TokenKind) -> bool {
        let saved = self.position;

        self.skip_newlines();
        if self.matches(kind) {
            true
        } else {
            self.position = saved;
            false
        }
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        let found = self.kind() == kind;
        if found {
            self.advance();
        }

        found
    }

    fn kind(&self) -> TokenKind {
        self.current().kind()
    }

    fn current(&self) -> &Token {
        self.tokens.get(self.position).unwrap_or(&self.end)
    }

    /// Ubicación del token actual.
    fn here(&self) -> Location {
        let token = self.current();
        Location::new(self.source, token.start(), token.end())
    }

    /// Avanza un token, excepto al final de la entrada.
    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if token.kind() != TokenKind::EndOfInput {
            self.last_known = self.here();
            self.position += 1;
        }

        token
    }

    fn fail<T>(&self, error: ParserError) -> Parse<T> {
        Err(Located::at(error, self.here()))
    }
}

/// Restricción que corresponde a un atributo de cuenta.
fn attribute_constraint(kind: TokenKind) -> Option<Constraints> {
    match kind {
        TokenKind::Signer => Some(Constraints::SIGNER),
        TokenKind::Writable => Some(Constraints::WRITABLE),
        TokenKind::Init => Some(Constraints::INIT),
        _ => None,
    }
}
