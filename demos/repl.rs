use minischeme::evaluator::{EvalConfig, Interpreter};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::panic;
use std::process;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const PROMPT: &str = ">>> ";

fn main() {
    init_tracing();

    let result = panic::catch_unwind(run_repl);

    if let Err(panic_info) = result {
        eprintln!("The REPL encountered an unexpected error and must exit.");

        if let Some(msg) = panic_info.downcast_ref::<&str>() {
            eprintln!("Error: {msg}");
        } else if let Some(msg) = panic_info.downcast_ref::<String>() {
            eprintln!("Error: {msg}");
        } else {
            eprintln!("Error: Unknown panic occurred");
        }

        process::exit(1);
    }
}

/// Install a subscriber only when RUST_LOG asks for one
fn init_tracing() {
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_level(true),
            )
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn run_repl() {
    println!(" :: minischeme REPL {} ", env!("CARGO_PKG_VERSION"));
    println!("Type .help for commands, .q to exit.");
    println!();

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(err) => {
            eprintln!("Could not initialize REPL: {err}");
            process::exit(1);
        }
    };

    let mut strict = false;
    let mut interp = Interpreter::new();

    loop {
        match rl.readline(PROMPT) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                match line {
                    ".q" => process::exit(0),
                    ".help" => {
                        print_help();
                        continue;
                    }
                    ".env" => {
                        print_environment(&interp);
                        continue;
                    }
                    ".strict" => {
                        strict = !strict;
                        let config = if strict {
                            EvalConfig::strict()
                        } else {
                            EvalConfig::baseline()
                        };
                        interp = Interpreter::with_config(config);
                        println!(
                            "{} mode, session reset",
                            if strict { "Strict" } else { "Baseline" }
                        );
                        continue;
                    }
                    _ => {}
                }

                match interp.eval_expr(line) {
                    Ok(value) => println!("{PROMPT}{value}"),
                    Err(e) => println!("Error: {e}"),
                }
            }

            Err(ReadlineError::Eof | ReadlineError::Interrupted) => break,
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }
}

fn print_help() {
    println!("Commands:");
    println!("  .help    - Show this help message");
    println!("  .env     - Show the symbol and function tables");
    println!("  .strict  - Toggle strict evaluation (starts a new session)");
    println!("  .q       - Exit the interpreter");
    println!("  Ctrl+C   - Exit the interpreter");
    println!();
    println!("Values print as i:<integer>, f:<float>, s:<symbol> and λ:<function>.");
    println!();
    println!("Examples:");
    println!("  (+ 1 2 3)");
    println!("  (define sq (lambda (x) (* x x)))");
    println!("  (let ((a 10) (b 20)) (+ a b))");
    println!("  (quote (+ 1 2))");
    println!("  (if t 1 2)");
    println!();
}

fn print_environment(interp: &Interpreter) {
    let functions = interp.function_bindings();
    let symbols = interp.symbol_bindings();

    println!("Functions ({}):", functions.len());
    let mut col = 0;
    for (name, _) in &functions {
        print!("  {name:<12}");
        col += 1;
        if col % 4 == 0 {
            println!();
        }
    }
    if col % 4 != 0 {
        println!();
    }
    println!();

    if symbols.is_empty() {
        println!("No symbols bound.");
        return;
    }

    println!("Symbols ({}):", symbols.len());
    for (name, value) in symbols {
        println!("  {name} = {value}");
    }
}
