// ABOUTME: CLI entry point: script mode and interactive REPL

mod builtins;
mod call;
mod config;
mod error;
mod expr;
mod functions;
mod highlighter;
mod interp;
mod lexer;
mod scope;
mod stmt;
mod token;
mod value;

use clap::Parser;
use config::{HISTORY_FILE, PROMPT, WELCOME_FOOTER, WELCOME_MESSAGE, WELCOME_SUBTITLE};
use highlighter::StarlingHelper;
use interp::Interpreter;
use rustyline::error::ReadlineError;
use rustyline::{Config, Editor};
use std::path::PathBuf;
use std::process::ExitCode;

/// Interpreter for the Starling language
#[derive(Parser, Debug)]
#[command(name = "starling")]
#[command(version = config::VERSION)]
#[command(about = "A small statically-typed language interpreter")]
#[command(long_about = "Runs a Starling source file, or starts a REPL when no file is given")]
struct CliArgs {
    /// Source file to execute (optional - if not provided, starts the REPL)
    #[arg(value_name = "FILE")]
    script: Option<PathBuf>,

    /// Evaluate a code snippet and exit
    #[arg(short = 'e', long = "eval", value_name = "CODE", conflicts_with = "script")]
    eval: Option<String>,
}

fn main() -> ExitCode {
    let args = CliArgs::parse();
    let mut interp = Interpreter::new();

    if let Some(code) = args.eval {
        if let Err(diag) = interp.run_source("<eval>", &code) {
            eprintln!("{}", diag);
            return ExitCode::FAILURE;
        }
        return ExitCode::SUCCESS;
    }

    if let Some(script) = args.script {
        if let Err(diag) = interp.run_file(&script) {
            eprintln!("{}", diag);
            return ExitCode::FAILURE;
        }
        return ExitCode::SUCCESS;
    }

    match run_repl(interp) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Interactive loop: each line runs against the persistent interpreter, so
/// variables and functions accumulate across lines.
fn run_repl(mut interp: Interpreter) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::builder().auto_add_history(true).build();
    let mut rl = Editor::with_config(config)?;
    rl.set_helper(Some(StarlingHelper::new()));
    let _ = rl.load_history(HISTORY_FILE);

    println!("{}", WELCOME_MESSAGE);
    println!("{}", WELCOME_SUBTITLE);
    println!("{}", WELCOME_FOOTER);

    loop {
        match rl.readline(PROMPT) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match trimmed {
                    "exit" | "quit" => {
                        println!("Goodbye!");
                        break;
                    }
                    "clear" => {
                        print!("\x1B[2J\x1B[H"); // ANSI clear screen
                        continue;
                    }
                    _ => {}
                }
                if let Err(diag) = interp.eval_line(&line) {
                    eprintln!("{}", diag);
                    interp.recover();
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                break;
            }
        }
    }

    let _ = rl.save_history(HISTORY_FILE);
    Ok(())
}
