use std::{
    fs,
    io::{self, BufRead, BufWriter, Read, Write},
    path::PathBuf,
    process::ExitCode,
};

use anyhow::{Context, Result};
use clap::Parser;
use pl0::{
    backend::{
        interp::{self, Interpreter},
        text::TextBackend,
        Backend,
    },
    driver::{self, Diagnostics},
    lexer,
    util::{fmt::tree, intern::Interner},
};

/// Compiles PL/0 programs.
#[derive(Parser)]
#[command(version)]
struct Args {
    /// The source file. Read from standard input if omitted.
    input: Option<PathBuf>,

    /// What to do with the program.
    #[arg(long, value_enum, default_value_t = Emit::Run)]
    emit: Emit,

    /// Maximum procedure call depth when running.
    #[arg(long, default_value_t = interp::Config::default().max_call_depth)]
    max_call_depth: usize,
}

#[derive(Copy, Clone, PartialEq, Eq, clap::ValueEnum)]
#[clap(rename_all = "snake_case")]
enum Emit {
    Tokens,
    Ast,
    Ir,
    Run,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // When both come from stdin, the program ends at its `.` and the rest is
    // its input.
    let (src, program_input) = if let Some(path) = &args.input {
        let src =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        (src, None)
    } else {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("reading stdin")?;
        if args.emit == Emit::Run {
            let (program, input) = driver::split_program(&buf);
            (program.to_owned(), Some(input.to_owned()))
        } else {
            (buf, None)
        }
    };

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let i = &mut Interner::with_capacity(128);

    let result: Result<(), Diagnostics> = match args.emit {
        Emit::Tokens => {
            for token in lexer::lex_in_new(&src) {
                writeln!(out, "{token:?} {:?}", token.lexeme(&src))?;
            }
            Ok(())
        }
        Emit::Ast => match driver::parse(&src, i) {
            Ok(program) => {
                tree::print_program(&mut out, i, &program)?;
                Ok(())
            }
            Err(diags) => Err(diags),
        },
        Emit::Ir => match driver::compile(&src, i) {
            Ok(unit) => {
                let mut text = TextBackend::new(&mut out);
                text.consume(&unit)
                    .with_context(|| format!("{} backend failed", text.name()))?;
                Ok(())
            }
            Err(diags) => Err(diags),
        },
        Emit::Run => match driver::compile(&src, i) {
            Ok(unit) => {
                let config = interp::Config {
                    max_call_depth: args.max_call_depth,
                };
                let input: Box<dyn BufRead> = match program_input {
                    Some(input) => Box::new(io::Cursor::new(input)),
                    None => Box::new(io::stdin().lock()),
                };
                let mut interp = Interpreter::with_config(input, &mut out, config);
                interp
                    .consume(&unit)
                    .with_context(|| format!("{} backend failed", interp.name()))?;
                Ok(())
            }
            Err(diags) => Err(diags),
        },
    };
    out.flush()?;

    if let Err(diags) = result {
        report(&diags, i);
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn report(diags: &Diagnostics, i: &Interner<str>) {
    for message in diags.render(i) {
        eprintln!("{message}");
    }
    eprintln!(
        "compilation failed with {} error{}",
        diags.len(),
        if diags.len() == 1 { "" } else { "s" }
    );
}
