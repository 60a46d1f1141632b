use std::{fs, path::PathBuf, process::ExitCode, sync::Once};

use clap::{Parser, Subcommand};

use sprig::{Interpreter, InterpreterConfig, Repl, SprigError, Value};

static TRACING_INIT: Once = Once::new();

/// Installs a stderr subscriber when `SPRIG_LOG` or `RUST_LOG` is set.
fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        let directives = std::env::var("SPRIG_LOG").or_else(|_| std::env::var("RUST_LOG"));
        if let Ok(directives) = directives {
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_level(true),
                )
                .with(EnvFilter::new(directives))
                .init();
        }
    });
}

#[derive(Parser)]
#[command(author, version, about = "Sprig scripting language interpreter")]
struct Args {
    /// Maximum nesting of function calls before evaluation is aborted
    #[arg(long, global = true)]
    max_call_depth: Option<usize>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a script file
    Run { script: PathBuf },
    /// Start an interactive REPL session
    Repl,
    /// Evaluate a snippet of source text
    Eval { source: String },
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();
    let mut config = InterpreterConfig::from_env();
    if let Some(depth) = args.max_call_depth {
        config = config.with_max_call_depth(depth);
    }
    let result = match args.command.unwrap_or(Command::Repl) {
        Command::Run { script } => run_script(script, config),
        Command::Repl => Repl::with_config(config).run(),
        Command::Eval { source } => evaluate(&source, config),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run_script(path: PathBuf, config: InterpreterConfig) -> Result<(), SprigError> {
    let source = fs::read_to_string(&path)?;
    evaluate(&source, config)
}

fn evaluate(source: &str, config: InterpreterConfig) -> Result<(), SprigError> {
    let interpreter = Interpreter::with_config(config);
    let value = interpreter.eval_source(source)?;
    if value != Value::Void {
        println!("{value}");
    }
    Ok(())
}
