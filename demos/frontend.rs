use solc::{
    classify, error::Diagnostics, features::Features, lex::Lexer, parse, source::Source,
};

use std::io::Read;

fn main() {
    let mut text = String::new();
    if let Err(error) = std::io::stdin().read_to_string(&mut text) {
        eprintln!("Failed to read from stdin: {}", error);
        return;
    }

    let source = Source::new("<stdin>", text);
    let features = Features::default();

    let diagnostics = match Lexer::new(&source, features).try_exhaustive() {
        Err(errors) => Diagnostics::from(errors).kind("Lexical error"),

        Ok(tokens) => {
            print!("Tokens: {:#?}\n\n", tokens);

            match parse::parse(&source, &tokens, features) {
                Err(error) => Diagnostics::from(error).kind("Syntax error"),

                Ok(ast) => {
                    print!("Ast: {:#?}\n\n", ast);
                    println!("Unit: {}", classify::classify(&ast));

                    Diagnostics::default()
                }
            }
        }
    };

    if !diagnostics.is_empty() {
        eprint!("{}", diagnostics);
    }
}
