use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use sexpeval::ast::Value;
use sexpeval::reader::{paren_depth, tokenize};
use sexpeval::{
    DEFAULT_MAX_EVAL_DEPTH, EvalConfig, Environment, ScopingMode, create_global_env,
    evaluate_with_config, parse_program,
};
use std::panic;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

const USAGE: &str = "\
Usage: sexpeval [OPTIONS] [FILE]

Evaluates every expression in FILE, or starts an interactive session.

Options:
  --scoping=MODE    how function calls bind parameters: caller (default), dynamic, lexical
  --max-depth=N     evaluation depth limit (default: 10000)
  -h, --help        print this help";

const HELP: &str = "\
Commands:
  :help      - Show this help message
  :quit      - Exit the interpreter
  :exit      - Exit the interpreter
  Ctrl+D     - Exit the interpreter

Input may span several lines; it runs once its parentheses balance.

Examples:
  (+ 21 21)
  (sin (/ pi 2))
  (defun fact (n) (if (<= n 1) 1 (* n (fact (- n 1)))))
  (fact 10)
  (format t \"fact of 5 is ~D~%\" (fact 5))";

struct Options {
    config: EvalConfig,
    file: Option<PathBuf>,
}

/// Parse command-line arguments. `Ok(None)` means help was requested.
fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Option<Options>, String> {
    let mut config = EvalConfig::default();
    let mut file = None;

    for arg in args {
        if arg == "-h" || arg == "--help" {
            return Ok(None);
        } else if let Some(mode) = arg.strip_prefix("--scoping=") {
            config.scoping = match mode {
                "caller" => ScopingMode::Caller,
                "dynamic" => ScopingMode::Dynamic,
                "lexical" => ScopingMode::Lexical,
                other => return Err(format!("unknown scoping mode '{other}'")),
            };
        } else if let Some(depth) = arg.strip_prefix("--max-depth=") {
            config.max_depth = match depth.parse::<usize>() {
                Ok(0) | Err(_) => return Err(format!("invalid --max-depth '{depth}'")),
                Ok(n) => n,
            };
        } else if arg.starts_with('-') {
            return Err(format!("unknown option '{arg}'"));
        } else if file.is_none() {
            file = Some(PathBuf::from(arg));
        } else {
            return Err(format!("unexpected argument '{arg}'"));
        }
    }

    Ok(Some(Options { config, file }))
}

/// Log to stderr, but only when RUST_LOG asks for it
fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn main() -> ExitCode {
    init_tracing();

    let options = match parse_args(std::env::args().skip(1)) {
        Ok(Some(options)) => options,
        Ok(None) => {
            println!("{USAGE}");
            return ExitCode::SUCCESS;
        }
        Err(msg) => {
            eprintln!("sexpeval: {msg}\n\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    let result = panic::catch_unwind(|| match &options.file {
        Some(path) => run_file(path, &options.config),
        None => run_repl(&options.config),
    });

    match result {
        Ok(code) => code,
        Err(panic_info) => {
            eprintln!("The interpreter encountered an unexpected error and must exit.");

            if let Some(msg) = panic_info.downcast_ref::<&str>() {
                eprintln!("Error: {msg}");
            } else if let Some(msg) = panic_info.downcast_ref::<String>() {
                eprintln!("Error: {msg}");
            } else {
                eprintln!("Error: Unknown panic occurred");
            }

            ExitCode::FAILURE
        }
    }
}

/// Print a result the way the session shows it. Functions are not printed.
fn print_result(result: &Value) {
    match result {
        Value::Function(_) => {}
        // `format` output may already end in a newline
        Value::Str(text) if text.ends_with('\n') => print!("{text}"),
        other => println!("{other}"),
    }
}

/// Evaluate every form in `source` in order, stopping at the first error
fn run_source(source: &str, env: &Environment, config: &EvalConfig) -> Result<(), sexpeval::Error> {
    for expr in parse_program(source)? {
        let result = evaluate_with_config(&expr, env, config)?;
        print_result(&result);
    }
    Ok(())
}

fn run_file(path: &Path, config: &EvalConfig) -> ExitCode {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Error: cannot read {}: {err}", path.display());
            return ExitCode::FAILURE;
        }
    };

    // A file with no forms in it has nothing to do
    if tokenize(&source).is_empty() {
        return ExitCode::SUCCESS;
    }

    let env = create_global_env();
    match run_source(&source, &env, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run_repl(config: &EvalConfig) -> ExitCode {
    println!("sexpeval: a small S-expression interpreter");
    println!("Enter expressions like: (+ 1 2)");
    println!("Type :help for more commands, or Ctrl+D to exit.");
    if config.scoping != ScopingMode::Caller || config.max_depth != DEFAULT_MAX_EVAL_DEPTH {
        println!(
            "Scoping: {:?}, max depth: {}",
            config.scoping, config.max_depth
        );
    }
    println!();

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(err) => {
            eprintln!("Could not initialize REPL: {err}");
            return ExitCode::FAILURE;
        }
    };
    let env = create_global_env();

    // Also reachable from expressions as (help)
    env.register_builtin_operation::<_, ()>("help", || HELP);

    let mut buffer = String::new();

    loop {
        let prompt = if buffer.is_empty() { "sexpeval> " } else { "     ...> " };
        match rl.readline(prompt) {
            Ok(line) => {
                let line = line.trim();

                if buffer.is_empty() {
                    if line.is_empty() {
                        continue;
                    }
                    match line {
                        ":help" => {
                            let _ = rl.add_history_entry(line);
                            println!("{HELP}");
                            continue;
                        }
                        ":quit" | ":exit" => {
                            println!("Goodbye!");
                            break;
                        }
                        _ => {}
                    }
                } else {
                    buffer.push('\n');
                }
                buffer.push_str(line);

                // Keep reading while parentheses are still open
                if paren_depth(&tokenize(&buffer)) > 0 {
                    continue;
                }

                let _ = rl.add_history_entry(buffer.as_str());
                if let Err(err) = run_source(&buffer, &env, config) {
                    println!("Error: {err}");
                }
                buffer.clear();
            }

            Err(ReadlineError::Interrupted) if !buffer.is_empty() => {
                // Ctrl+C abandons an unfinished expression
                buffer.clear();
            }
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}
