use std::fs;

use indoc::indoc;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use solc::{
    classify::UnitKind,
    codegen::{EmitError, Target},
    features::Features,
    identity::{KeypairDirectory, NoKeys},
    pipeline::{compile, Compilation, CompileError, Options},
    source::Source,
};

fn compile_with(text: &str, options: &Options) -> Result<Compilation, CompileError> {
    let source = Source::new("unit.so", text);
    compile(&source, options, &NoKeys)
}

fn compile_for(text: &str, target: Option<Target>) -> Compilation {
    let options = Options {
        target,
        ..Options::default()
    };

    compile_with(text, &options).expect("compilation failed")
}

const SCENARIO_A: &str = "let x = 42\nprint(x)";
const SCENARIO_C: &str = "program Foo { instruction bar() { print(\"hi\") } }";

#[test]
fn scenario_a_native_c() {
    let compilation = compile_for(SCENARIO_A, None);

    assert_eq!(compilation.target, Target::NativeC);
    assert_eq!(compilation.unit, UnitKind::Generic);
    assert!(compilation.text.contains("int x = 42;"));
    assert_eq!(compilation.text.matches("printf(").count(), 1);
    assert!(compilation.text.contains("printf(\"%d\\n\", x);"));
}

#[test]
fn scenario_b_native_rust() {
    let compilation = compile_for(SCENARIO_A, Some(Target::NativeRust));

    assert_eq!(
        compilation.text,
        indoc! {r#"
            fn main() {
                let x = 42;
                println!("{}", x);
            }
        "#}
    );
}

#[test]
fn scenario_c_defaults_to_raw_dispatch() {
    let compilation = compile_for(SCENARIO_C, None);

    assert_eq!(compilation.unit, UnitKind::ChainProgram);
    assert_eq!(compilation.target, Target::ChainRaw);
    assert_eq!(compilation.program_name.as_deref(), Some("Foo"));

    let text = &compilation.text;
    assert_eq!(text.matches(" => {").count(), 1);

    let arm = text.find("0 => {").expect("no arm for opcode 0");
    let end = text[arm..].find("Ok(())").expect("unterminated arm") + arm;
    assert!(text[arm..end].contains("msg!(\"{}\", \"hi\");"));
}

#[test]
fn scenario_d_framework_module() {
    let compilation = compile_for(SCENARIO_C, Some(Target::ChainFramework));

    assert!(compilation.text.contains("pub mod Foo {"));
    assert!(compilation
        .text
        .contains("pub fn bar(ctx: Context<barContext>) -> Result<()> {"));
    assert!(compilation.text.contains("pub struct barContext {}"));
}

#[test]
fn scenario_e_require_per_sub_target() {
    let source = "program P { instruction check() { require(x > 0, \"must be positive\") } }";

    let framework = compile_for(source, Some(Target::ChainFramework)).text;
    assert!(framework.contains("require!(x > 0, ErrorCode::MustBePositive);"));
    assert!(framework.contains("#[msg(\"must be positive\")]"));

    let raw = compile_for(source, Some(Target::ChainRaw)).text;
    assert!(raw.contains("if !(x > 0) {"));
    assert!(raw.contains("return Err(ProgramError::InvalidArgument);"));
    assert!(!raw.contains("must be positive"));
}

#[test]
fn emission_is_idempotent() {
    let source = indoc! {r#"
        fn fee() { return 2 }
        program Market {
            state Book { owner: pubkey, size: u64 }
            instruction sell(@signer seller, account book(writable): Book) {
                let price = fee() * 10
                require(price > 0, "no price")
                transfer(seller, book, price)
                emit Sold(price, by: "seller")
            }
        }
    "#};

    for target in [Target::ChainFramework, Target::ChainRaw] {
        let first = compile_for(source, Some(target)).text;
        let second = compile_for(source, Some(target)).text;
        assert_eq!(first, second);
    }
}

#[test]
fn context_fields_follow_parameter_order() {
    let source = indoc! {"
        program Order {
            instruction run(account zeta, account alpha(writable), @signer mid, account omega(init)) { }
        }
    "};

    let text = compile_for(source, Some(Target::ChainFramework)).text;
    let positions: Vec<_> = ["pub zeta:", "pub alpha:", "pub mid:", "pub omega:", "pub system_program:"]
        .iter()
        .map(|field| text.find(field).expect("missing field"))
        .collect();

    let mut sorted = positions.clone();
    sorted.sort_unstable();
    assert_eq!(positions, sorted);
}

#[test]
fn chain_programs_are_never_emitted_as_c() {
    let compilation = compile_for(SCENARIO_C, Some(Target::NativeC));
    assert_eq!(compilation.target, Target::ChainRaw);

    let compilation = compile_for(SCENARIO_C, Some(Target::NativeRust));
    assert_eq!(compilation.target, Target::ChainRaw);
}

#[test]
fn chain_target_needs_a_chain_unit() {
    let options = Options {
        target: Some(Target::ChainFramework),
        ..Options::default()
    };

    let error = compile_with(SCENARIO_A, &options).unwrap_err();
    assert!(matches!(
        error,
        CompileError::Target(EmitError::ChainTargetForGenericUnit(Target::ChainFramework))
    ));

    let options = Options {
        force_chain: true,
        ..options
    };

    let compilation = compile_with(SCENARIO_A, &options).unwrap();
    assert_eq!(compilation.unit, UnitKind::ChainProgram);
    assert_eq!(compilation.program_name, None);
    assert!(compilation.text.contains("pub mod program {"));
    assert!(compilation.text.contains("pub fn execute("));
}

#[test]
fn lexical_errors_are_reported_together() {
    let error = compile_with("let a = $\nlet b = ?\nprint(a)", &Options::default()).unwrap_err();

    match &error {
        CompileError::Lexical(errors) => assert_eq!(errors.len(), 2),
        other => panic!("unexpected {:?}", other),
    }

    let rendered = error.into_diagnostics().unwrap().to_string();
    assert!(rendered.contains("Lexical error: Bad character '$' in input stream"));
    assert!(rendered.contains("Lexical error: Bad character '?' in input stream"));
    assert!(rendered.ends_with("Build failed with 2 errors\n"));
}

#[test]
fn syntax_and_emission_diagnostics() {
    let error = compile_with("let = 3", &Options::default()).unwrap_err();
    let rendered = error.into_diagnostics().unwrap().to_string();
    assert!(rendered.starts_with("Syntax error: Expected a name after keyword `let`"));
    assert!(rendered.contains("1 | let = 3"));

    let error = compile_with("fn f() {\n  fn g() { }\n}", &Options::default()).unwrap_err();
    let rendered = error.into_diagnostics().unwrap().to_string();
    assert!(rendered.starts_with("Emission error: Functions can only be declared at the top level"));
    assert!(rendered.contains("2 |   fn g() { }"));
}

#[test]
fn legacy_expressions_allow_one_operator() {
    let options = Options {
        features: Features::all() - Features::PRECEDENCE,
        ..Options::default()
    };

    assert!(compile_with("let a = 1 + 2", &options).is_ok());
    assert!(matches!(
        compile_with("let a = 1 + 2 * 3", &options),
        Err(CompileError::Syntax(_))
    ));
}

#[test]
fn program_id_sources() {
    let dir = TempDir::new().unwrap();
    let keypair: Vec<&str> = (0..64).map(|byte| if byte < 32 { "9" } else { "0" }).collect();
    fs::write(dir.path().join("Foo-keypair.json"), format!("[{}]", keypair.join(", "))).unwrap();

    let keys = KeypairDirectory::new(dir.path());
    let source = Source::new("unit.so", SCENARIO_C);

    let compilation = compile(&source, &Options::default(), &keys).unwrap();
    assert!(compilation
        .text
        .contains("solana_program::declare_id!(\"11111111111111111111111111111111\");"));

    let options = Options {
        program_id: Some(String::from("Fg6PaFpoGXkYsidMpWTK6W2BeZ7FEfcYkg476zPFsLnS")),
        ..Options::default()
    };

    let compilation = compile(&source, &options, &keys).unwrap();
    assert!(compilation
        .text
        .contains("declare_id!(\"Fg6PaFpoGXkYsidMpWTK6W2BeZ7FEfcYkg476zPFsLnS\");"));

    let literal = Source::new("unit.so", "program Foo(\"Literal1111111111111111111111111111\") { }");
    let compilation = compile(&literal, &options, &keys).unwrap();
    assert!(compilation.text.contains("Literal1111111111111111111111111111"));
    assert!(!compilation.text.contains("Fg6PaFpo"));

    let generic = compile(&Source::new("unit.so", SCENARIO_A), &options, &keys).unwrap();
    assert!(!generic.text.contains("declare_id"));
}

#[test]
fn malformed_keypairs_fail_the_compilation() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("Foo-keypair.json"), "not json").unwrap();

    let keys = KeypairDirectory::new(dir.path());
    let source = Source::new("unit.so", SCENARIO_C);

    let error = compile(&source, &Options::default(), &keys).unwrap_err();
    assert!(matches!(error, CompileError::Identity(_)));
    assert!(error.into_diagnostics().is_err());
}

#[test]
fn compilations_are_independent() {
    let handles: Vec<_> = (0..4)
        .map(|_| {
            std::thread::spawn(|| {
                let source = Source::new("unit.so", SCENARIO_C);
                compile(&source, &Options::default(), &NoKeys).map(|compilation| compilation.text).ok()
            })
        })
        .collect();

    let outputs: Vec<_> = handles.into_iter().map(|handle| handle.join().unwrap()).collect();
    assert!(outputs.iter().all(|output| output.is_some() && *output == outputs[0]));
}
