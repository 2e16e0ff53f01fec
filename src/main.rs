//! Punto de entrada ("driver").
//!
//! Este módulo interpreta la línea de comandos, lee la unidad de
//! entrada, invoca la compilación y escribe el resultado.

use anyhow::{self, bail, Context};
use clap::{self, crate_version, Arg, ArgGroup, ArgMatches, Command};
use log::{info, LevelFilter};

use solc::{
    codegen::Target,
    features::Features,
    identity::KeypairDirectory,
    pipeline::{self, Options},
    source::Source,
};

use std::{
    fs,
    io::{self, Read, Write},
    process,
};

fn main() -> anyhow::Result<()> {
    let args = cli().get_matches();

    init_logging(args.occurrences_of("verbose"));

    let options = options(&args)?;
    let input = args.value_of("input").unwrap_or("-");
    let text = read_input(input)?;

    let name = if input == "-" { "<stdin>" } else { input };
    let source = Source::new(name, text);
    let keys = KeypairDirectory::new(args.value_of("keypairs").unwrap_or("keypairs"));

    let compilation = match pipeline::compile(&source, &options, &keys) {
        Ok(compilation) => compilation,
        Err(error) => match error.into_diagnostics() {
            Ok(diagnostics) => {
                eprint!("{}", diagnostics);
                process::exit(1);
            }

            Err(error) => bail!("{}", error),
        },
    };

    let output = output_path(&args, compilation.target);
    if output == "-" {
        io::stdout()
            .write_all(compilation.text.as_bytes())
            .context("Failed to write to stdout")?;
    } else {
        fs::write(output, &compilation.text)
            .with_context(|| format!("Failed to write output file: {}", output))?;
    }

    match &compilation.program_name {
        Some(program) => info!(
            "Generated {} for program `{}` ({})",
            output, program, compilation.target
        ),
        None => info!("Generated {} ({})", output, compilation.target),
    }

    Ok(())
}

fn cli() -> Command<'static> {
    let dialects: Vec<_> = Features::dialect_names().collect();

    Command::new("So compiler")
        .version(crate_version!())
        .arg(
            Arg::new("input")
                .value_name("INPUT")
                .required(true)
                .help("Source file ('-' for stdin)"),
        )
        .arg(Arg::new("rust").long("rust").help("Emit Rust instead of C"))
        .arg(
            Arg::new("solana")
                .long("solana")
                .help("Compile as an on-chain program with a raw entrypoint"),
        )
        .arg(
            Arg::new("anchor")
                .long("anchor")
                .help("Compile as an on-chain program for the Anchor framework"),
        )
        .arg(
            Arg::new("native-solana")
                .long("native-solana")
                .help("Same as --solana"),
        )
        .group(ArgGroup::new("chain").args(&["solana", "anchor", "native-solana"]))
        .arg(
            Arg::new("target")
                .short('t')
                .long("target")
                .takes_value(true)
                .value_name("TARGET")
                .conflicts_with_all(&["rust", "chain"])
                .help("Target by name: c, rust, anchor or native-solana"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .takes_value(true)
                .value_name("FILE")
                .help("Output file ('-' for stdout)"),
        )
        .arg(
            Arg::new("bootstrap")
                .long("bootstrap")
                .help("Use the self-hosting output file names"),
        )
        .arg(
            Arg::new("program-id")
                .long("program-id")
                .takes_value(true)
                .value_name("ID")
                .help("Program id for programs that do not declare one"),
        )
        .arg(
            Arg::new("keypairs")
                .long("keypairs")
                .takes_value(true)
                .value_name("DIR")
                .default_value("keypairs")
                .help("Directory of <program>-keypair.json files"),
        )
        .arg(
            Arg::new("dialect")
                .long("dialect")
                .takes_value(true)
                .value_name("DIALECT")
                .default_value("full")
                .possible_values(dialects)
                .help("Language dialect"),
        )
        .arg(
            Arg::new("legacy-expressions")
                .long("legacy-expressions")
                .help("Allow at most one binary operator per expression"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .multiple_occurrences(true)
                .help("Log more details (repeatable)"),
        )
}

fn init_logging(verbosity: u64) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    // RUST_LOG tiene prioridad sobre -v
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn options(args: &ArgMatches) -> anyhow::Result<Options> {
    let dialect = args.value_of("dialect").unwrap_or("full");
    let mut features = match Features::dialect(dialect) {
        Some(features) => features,
        None => bail!("Unknown dialect: {}", dialect),
    };

    if args.is_present("legacy-expressions") {
        features.remove(Features::PRECEDENCE);
    }

    let target = if args.is_present("anchor") {
        Some(Target::ChainFramework)
    } else if args.is_present("solana") || args.is_present("native-solana") {
        Some(Target::ChainRaw)
    } else if args.is_present("rust") {
        Some(Target::NativeRust)
    } else if let Some(name) = args.value_of("target") {
        Some(name.parse::<Target>()?)
    } else {
        None
    };

    Ok(Options {
        features,
        target,
        force_chain: args.is_present("chain") || target.map_or(false, Target::is_chain),
        program_id: args.value_of("program-id").map(str::to_owned),
        ..Options::default()
    })
}

fn output_path(args: &ArgMatches, target: Target) -> &str {
    match args.value_of("output") {
        Some(output) => output,
        None => target.default_output(args.is_present("bootstrap")),
    }
}

fn read_input(path: &str) -> anyhow::Result<String> {
    if path == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read from stdin")?;

        Ok(text)
    } else {
        fs::read_to_string(path).with_context(|| format!("Failed to read input file: {}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ArgMatches {
        cli()
            .try_get_matches_from(args)
            .expect("rejected command line")
    }

    #[test]
    fn chain_flags_force_classification() {
        for flag in ["--solana", "--native-solana"] {
            let parsed = options(&parse(&["solc", "in.so", flag])).unwrap();
            assert_eq!(parsed.target, Some(Target::ChainRaw));
            assert!(parsed.force_chain);
        }

        let parsed = options(&parse(&["solc", "in.so", "--anchor", "--rust"])).unwrap();
        assert_eq!(parsed.target, Some(Target::ChainFramework));
        assert!(parsed.force_chain);

        let parsed = options(&parse(&["solc", "in.so", "-t", "native-solana"])).unwrap();
        assert_eq!(parsed.target, Some(Target::ChainRaw));
        assert!(parsed.force_chain);

        let parsed = options(&parse(&["solc", "in.so", "--rust"])).unwrap();
        assert_eq!(parsed.target, Some(Target::NativeRust));
        assert!(!parsed.force_chain);
    }

    #[test]
    fn conflicting_target_flags_are_rejected() {
        assert!(cli()
            .try_get_matches_from(["solc", "in.so", "--solana", "--anchor"])
            .is_err());

        assert!(cli()
            .try_get_matches_from(["solc", "in.so", "--rust", "-t", "c"])
            .is_err());
    }

    #[test]
    fn dialects_and_legacy_expressions() {
        let parsed = options(&parse(&["solc", "in.so", "--legacy-expressions"])).unwrap();
        assert!(!parsed.features.contains(Features::PRECEDENCE));
        assert!(parsed.features.contains(Features::CHAIN));

        let parsed = options(&parse(&["solc", "in.so", "--dialect", "stage0"])).unwrap();
        assert_eq!(parsed.features, Features::STAGE0);

        assert!(cli()
            .try_get_matches_from(["solc", "in.so", "--dialect", "cobol"])
            .is_err());
    }

    #[test]
    fn output_names() {
        let args = parse(&["solc", "in.so"]);
        assert_eq!(output_path(&args, Target::NativeC), "output.c");
        assert_eq!(output_path(&args, Target::ChainRaw), "program.rs");

        let args = parse(&["solc", "in.so", "--bootstrap"]);
        assert_eq!(output_path(&args, Target::NativeC), "solang_self_hosted.c");
        assert_eq!(output_path(&args, Target::NativeRust), "solang_self_hosted.rs");
        assert_eq!(output_path(&args, Target::ChainFramework), "lib.rs");

        let args = parse(&["solc", "in.so", "--bootstrap", "-o", "-"]);
        assert_eq!(output_path(&args, Target::NativeC), "-");
    }
}
