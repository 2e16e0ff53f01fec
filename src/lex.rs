//! Análisis léxico.
//!
//! # Tokenization
//! Esta es la primera fase del compilador. Descompone el texto de un
//! [`Source`] en unidades léxicas denominadas tokens. Los espacios en
//! blanco y los comentarios se descartan durante esta operación, con
//! excepción del salto de línea, que es significativo: separa sentencias.
//! Cada token emitido conserva su lexema y su posición original, y la
//! secuencia siempre termina con un único [`TokenKind::EndOfInput`].
//!
//! # Reglas importantes del lenguaje
//! - Los identificadores comienzan con una letra o `_` y continúan con
//!   alfanuméricos o `_`. Las palabras clave se resuelven por tabla.
//! - Un literal numérico es una secuencia de dígitos con a lo sumo un
//!   punto decimal. Un segundo punto termina el literal y se rechaza
//!   por sí mismo como carácter desconocido.
//! - Los literales de texto admiten los escapes `\n \t \r \\ \"`. Un
//!   literal sin cerrar al final de la entrada se acepta tal cual.
//! - La extensión on-chain agrega atributos `@nombre`, `#` y `->`.
//!
//! # Errores
//! Un carácter desconocido produce un error, pero el escaneo continúa
//! en el siguiente carácter. De esta forma se reportan todos los errores
//! léxicos de una sola vez, aunque ninguno permite avanzar a las demás
//! fases de la compilación.

use crate::{
    features::Features,
    source::{Located, Location, Position, Source},
};

use std::{
    fmt::{self, Display},
    iter::Peekable,
    rc::Rc,
    str::Chars,
};

use log::warn;
use thiserror::Error;

/// Error de escaneo.
#[non_exhaustive]
#[derive(Error, Debug, PartialEq, Eq)]
pub enum LexerError {
    /// Carácter desconocido o inesperado en el flujo de entrada.
    #[error("Bad character {0:?} in input stream")]
    BadChar(char),
}

/// Clase de un token.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    EndOfInput,
    Newline,

    Identifier,
    Number,
    Str,

    Let,
    Fn,
    If,
    Else,
    Return,
    Print,

    Program,
    Instruction,
    Account,
    State,
    Pubkey,
    Signer,
    Writable,
    Init,
    Seeds,
    Bump,
    Transfer,
    Require,
    Emit,

    /// `=`
    Assign,

    /// `==`
    Equal,

    /// `!=`
    NotEqual,

    /// `+`
    Plus,

    /// `-`
    Minus,

    /// `*`
    Star,

    /// `/`
    Slash,

    /// `<`
    Less,

    /// `>`
    Greater,

    /// `(`
    OpenParen,

    /// `)`
    CloseParen,

    /// `{`
    OpenCurly,

    /// `}`
    CloseCurly,

    /// `,`
    Comma,

    /// `;`
    Semicolon,

    /// `:`
    Colon,

    /// `@` sin nombre de atributo
    At,

    /// `#`
    Hash,

    /// `->`
    Arrow,
}

impl TokenKind {
    /// Determina si el token cierra una sentencia.
    pub fn is_terminator(self) -> bool {
        matches!(self, TokenKind::Newline | TokenKind::Semicolon)
    }
}

impl Display for TokenKind {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TokenKind::*;

        if let Some((name, _, _)) = KEYWORDS.iter().find(|(_, kind, _)| kind == self) {
            return write!(fmt, "keyword `{}`", name);
        }

        let string = match self {
            EndOfInput => "end of input",
            Newline => "newline",
            Identifier => "identifier",
            Number => "number",
            Str => "string",
            Assign => "`=`",
            Equal => "`==`",
            NotEqual => "`!=`",
            Plus => "`+`",
            Minus => "`-`",
            Star => "`*`",
            Slash => "`/`",
            Less => "`<`",
            Greater => "`>`",
            OpenParen => "`(`",
            CloseParen => "`)`",
            OpenCurly => "`{`",
            CloseCurly => "`}`",
            Comma => "`,`",
            Semicolon => "`;`",
            Colon => "`:`",
            At => "`@`",
            Hash => "`#`",
            Arrow => "`->`",
            _ => "keyword",
        };

        fmt.write_str(string)
    }
}

/// Objeto resultante del análisis léxico.
///
/// Los tokens son inmutables. El lexema de un literal de texto es su
/// contenido ya sin comillas ni escapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    kind: TokenKind,
    lexeme: String,
    start: Position,
    end: Position,
}

impl Token {
    /// Marcador de fin de entrada en una posición dada.
    pub(crate) fn end_of_input(at: Position) -> Self {
        Token {
            kind: TokenKind::EndOfInput,
            lexeme: String::new(),
            start: at,
            end: at,
        }
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    pub fn lexeme(&self) -> &str {
        &self.lexeme
    }

    pub fn line(&self) -> u32 {
        self.start.line()
    }

    pub fn column(&self) -> u32 {
        self.start.column()
    }

    pub fn start(&self) -> Position {
        self.start
    }

    pub fn end(&self) -> Position {
        self.end
    }
}

impl Display for Token {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Identifier => write!(fmt, "identifier `{}`", self.lexeme),
            TokenKind::Number => write!(fmt, "literal `{}`", self.lexeme),
            TokenKind::Str => write!(fmt, "string {:?}", self.lexeme),
            kind => kind.fmt(fmt),
        }
    }
}

/// Palabras clave, con las características que las habilitan.
const KEYWORDS: &[(&str, TokenKind, Features)] = &[
    ("let",         TokenKind::Let,         Features::empty()),
    ("fn",          TokenKind::Fn,          Features::FUNCTIONS),
    ("if",          TokenKind::If,          Features::empty()),
    ("else",        TokenKind::Else,        Features::empty()),
    ("return",      TokenKind::Return,      Features::empty()),
    ("print",       TokenKind::Print,       Features::empty()),
    ("program",     TokenKind::Program,     Features::CHAIN),
    ("instruction", TokenKind::Instruction, Features::CHAIN),
    ("account",     TokenKind::Account,     Features::CHAIN),
    ("state",       TokenKind::State,       Features::CHAIN),
    ("pubkey",      TokenKind::Pubkey,      Features::CHAIN),
    ("signer",      TokenKind::Signer,      Features::CHAIN),
    ("writable",    TokenKind::Writable,    Features::CHAIN),
    ("init",        TokenKind::Init,        Features::CHAIN),
    ("seeds",       TokenKind::Seeds,       Features::CHAIN),
    ("bump",        TokenKind::Bump,        Features::CHAIN),
    ("transfer",    TokenKind::Transfer,    Features::CHAIN),
    ("require",     TokenKind::Require,     Features::CHAIN),
    ("emit",        TokenKind::Emit,        Features::CHAIN),
];

/// Nombres de atributo `@nombre` con significado propio.
const ATTRIBUTES: &[(&str, TokenKind)] = &[
    ("program",     TokenKind::Program),
    ("instruction", TokenKind::Instruction),
    ("account",     TokenKind::Account),
    ("signer",      TokenKind::Signer),
    ("writable",    TokenKind::Writable),
    ("init",        TokenKind::Init),
    ("seeds",       TokenKind::Seeds),
    ("bump",        TokenKind::Bump),
];

fn keyword(word: &str, features: Features) -> Option<TokenKind> {
    KEYWORDS
        .iter()
        .find(|&&(name, _, required)| name == word && features.contains(required))
        .map(|&(_, kind, _)| kind)
}

fn attribute(name: &str) -> Option<TokenKind> {
    ATTRIBUTES
        .iter()
        .find(|&&(attribute, _)| attribute == name)
        .map(|&(_, kind)| kind)
}

/// Puntuación de un solo carácter.
fn punctuation(c: char, features: Features) -> Option<TokenKind> {
    use TokenKind::*;

    let kind = match c {
        '+' => Plus,
        '*' => Star,
        '<' => Less,
        '>' => Greater,
        '(' => OpenParen,
        ')' => CloseParen,
        '{' => OpenCurly,
        '}' => CloseCurly,
        ',' => Comma,
        ';' => Semicolon,
        ':' => Colon,
        '#' if features.contains(Features::CHAIN) => Hash,
        _ => return None,
    };

    Some(kind)
}

/// Máquina de estados para análisis léxico.
///
/// La salida del lexer, así como su siguiente estado, se define
/// a partir de tanto su estado actual como el siguiente carácter
/// encontrado en la entrada.
pub struct Lexer<'a> {
    source: Rc<Source>,
    chars: Peekable<Chars<'a>>,
    features: Features,
    state: State,
    start: Position,
    next: Position,
    finished: bool,
}

/// Posibles estados del lexer.
enum State {
    /// Estado que ocurre antes de encontrar el inicio de un token.
    Start,

    /// Estado de completitud; siempre emite el token incluido
    /// y pasa a [`State::Start`].
    Complete(TokenKind, String),

    /// Se consumió un carácter que no inicia ningún token.
    Rejected(char),

    /// Se encontró `=`, que puede continuar como `==`.
    Equals,

    /// Se encontró `!`, que solo es válido como `!=`.
    Bang,

    /// Se encontró `-`, que puede continuar como `->`.
    Dash,

    /// Se encontró `/`, que puede iniciar un comentario.
    Solidus,

    /// Comentario de línea.
    ///
    /// Este estado vuelve a [`State::Start`] sin consumir el `'\n'`,
    /// ya que el salto de línea es un token por sí mismo.
    Comment,

    /// Literal numérico, a lo sumo con un punto.
    Numeral { lexeme: String, dot: bool },

    /// Término que puede ser un identificador o una palabra clave.
    Word(String),

    /// Nombre de atributo tras `@`.
    Attribute(String),

    /// Contenido de un literal de texto.
    Text(String),

    /// Se encontró `\` dentro de un literal de texto.
    Escape(String),
}

impl<'a> Lexer<'a> {
    /// Crea un lexer en estado inicial sobre un origen.
    pub fn new(source: &'a Rc<Source>, features: Features) -> Self {
        Lexer {
            source: Rc::clone(source),
            chars: source.text().chars().peekable(),
            features,
            state: State::Start,
            start: Position::default(),
            next: Position::default(),
            finished: false,
        }
    }

    /// Reduce la entrada a sea una secuencia completa de tokens
    /// o una secuencia de errores.
    ///
    /// En caso de que ocurra al menos un error, el lexer dejará
    /// de acumular tokens y continuará escaneando solamente para
    /// recolectar los errores restantes.
    pub fn try_exhaustive(mut self) -> Result<Vec<Token>, Vec<Located<LexerError>>> {
        let mut tokens = Vec::new();

        while let Some(result) = self.next() {
            match result {
                Ok(token) => tokens.push(token),
                Err(error) => {
                    drop(tokens);

                    let mut errors = vec![error];
                    errors.extend(self.filter_map(Result::err));

                    return Err(errors);
                }
            }
        }

        Ok(tokens)
    }

    /// Intenta construir un siguiente token.
    fn lex(&mut self) -> Result<Option<(TokenKind, String)>, LexerError> {
        use {self::State::*, TokenKind::*};

        let chain = self.features.contains(Features::CHAIN);
        let comments = self.features.contains(Features::COMMENTS);
        let escapes = self.features.contains(Features::ESCAPES);

        let token = loop {
            let next_char = self.chars.peek().copied();

            // La posición de origen se mueve junto a la posición
            // siguiente siempre que no se haya encontrado una
            // frontera de token
            if let Start = self.state {
                self.start = self.next;
            }

            match (&mut self.state, next_char) {
                (Start, None) => return Ok(None),

                // El salto de línea separa sentencias, el resto de
                // espacios en blanco se descarta
                (Start, Some('\n')) => self.state = Complete(Newline, String::from("\n")),
                (Start, Some(c)) if c.is_whitespace() => (),

                (Start, Some('"')) => self.state = Text(String::new()),
                (Start, Some('=')) => self.state = Equals,
                (Start, Some('!')) => self.state = Bang,
                (Start, Some('-')) => self.state = Dash,
                (Start, Some('/')) => self.state = Solidus,
                (Start, Some('@')) if chain => self.state = Attribute(String::new()),

                // No se consume el dígito, el estado de literal
                // numérico se encarga de acumularlo
                (Start, Some(c)) if c.is_ascii_digit() => {
                    self.state = Numeral {
                        lexeme: String::new(),
                        dot: false,
                    };

                    continue;
                }

                (Start, Some(c)) if c.is_ascii_alphabetic() || c == '_' => {
                    self.state = Word(c.to_string())
                }

                (Start, Some(c)) => {
                    self.state = match punctuation(c, self.features) {
                        Some(kind) => Complete(kind, c.to_string()),
                        None => Rejected(c),
                    }
                }

                // Emisión retardada de tokens y errores
                (Complete(kind, lexeme), _) => break Ok((*kind, std::mem::take(lexeme))),
                (Rejected(c), _) => break Err(LexerError::BadChar(*c)),

                (Equals, Some('=')) => self.state = Complete(Equal, String::from("==")),
                (Equals, _) => break Ok((Assign, String::from("="))),

                (Bang, Some('=')) => self.state = Complete(NotEqual, String::from("!=")),
                (Bang, _) => break Err(LexerError::BadChar('!')),

                (Dash, Some('>')) if chain => self.state = Complete(Arrow, String::from("->")),
                (Dash, _) => break Ok((Minus, String::from("-"))),

                (Solidus, Some('/')) if comments => self.state = Comment,
                (Solidus, _) => break Ok((Slash, String::from("/"))),

                (Comment, Some('\n')) | (Comment, None) => {
                    self.state = Start;
                    continue;
                }

                (Comment, Some(_)) => (),

                (Numeral { lexeme, .. }, Some(digit)) if digit.is_ascii_digit() => {
                    lexeme.push(digit)
                }

                (Numeral { lexeme, dot }, Some('.')) if !*dot => {
                    *dot = true;
                    lexeme.push('.');
                }

                (Numeral { lexeme, .. }, _) => break Ok((Number, std::mem::take(lexeme))),

                (Word(word), Some(c)) if is_word_char(c) => word.push(c),
                (Word(word), _) => {
                    let kind = keyword(word, self.features).unwrap_or(Identifier);
                    break Ok((kind, std::mem::take(word)));
                }

                (Attribute(name), Some(c)) if is_word_char(c) => name.push(c),
                (Attribute(name), _) if name.is_empty() => break Ok((At, String::from("@"))),
                (Attribute(name), _) => {
                    let kind = attribute(name).unwrap_or(Identifier);
                    break Ok((kind, std::mem::take(name)));
                }

                (Text(text), Some('"')) => self.state = Complete(Str, std::mem::take(text)),
                (Text(text), Some('\\')) if escapes => self.state = Escape(std::mem::take(text)),
                (Text(text), Some(c)) => text.push(c),

                (Escape(text), Some(c)) => {
                    text.push(unescape(c));
                    self.state = Text(std::mem::take(text));
                }

                // Política permisiva: un literal sin cerrar se emite con
                // lo que se haya escaneado hasta el final de la entrada
                (Text(text), None) | (Escape(text), None) => {
                    warn!(
                        "{}:{}: unterminated string literal",
                        self.source.name(),
                        self.start
                    );

                    break Ok((Str, std::mem::take(text)));
                }
            }

            // Si no hubo `continue`, aquí se consume el carácter que
            // se observó con lookahead anteriormente
            if let Some(c) = self.chars.next() {
                self.next = self.next.after(c);
            }
        };

        token.map(Some)
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, Located<LexerError>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let result = self.lex();
        self.state = State::Start;

        match result {
            Ok(Some((kind, lexeme))) => Some(Ok(Token {
                kind,
                lexeme,
                start: self.start,
                end: self.next,
            })),

            Ok(None) => {
                self.finished = true;
                Some(Ok(Token::end_of_input(self.next)))
            }

            Err(error) => {
                let location = Location::new(&self.source, self.start, self.next);
                Some(Err(Located::at(error, location)))
            }
        }
    }
}

/// Escanea un origen completo.
pub fn tokenize(
    source: &Rc<Source>,
    features: Features,
) -> Result<Vec<Token>, Vec<Located<LexerError>>> {
    Lexer::new(source, features).try_exhaustive()
}

/// Determina si un carácter puede pertenecer a un término.
fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Resuelve el carácter que sigue a `\` en un literal de texto.
fn unescape(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        other => other,
    }
}
