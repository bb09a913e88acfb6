/// CLI tool for the ModelScript interpreter
use modelscript_interpreter::{diagnostic, Interpreter, ModelEvent};
use std::env;
use std::fs;
use std::io::{self, BufRead, Write};
use std::process;

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  modelscript <file> [seed]         Interpret a model script with optional seed");
    eprintln!("  modelscript -                     Read statements interactively from stdin");
    eprintln!("  modelscript --help                Show this help message");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  <file>      Path to a model script");
    eprintln!("  [seed]      Optional seed for deterministic sampling (default: random)");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  modelscript model.ms              # Random sampling");
    eprintln!("  modelscript model.ms 42           # Deterministic sampling with seed 42");
    eprintln!("  modelscript -                     # Interactive session");
}

fn session_with_seed(seed: Option<&str>) -> Interpreter {
    match seed {
        Some(text) => {
            let seed = text.parse::<u64>().unwrap_or_else(|e| {
                eprintln!("Error parsing seed '{}': {}", text, e);
                process::exit(1);
            });
            Interpreter::with_seed(seed)
        }
        None => Interpreter::new(),
    }
}

fn print_dictionary(session: &Interpreter) {
    for (id, value) in session.dictionary() {
        let value = value.borrow();
        let kind = if value.is_random() {
            "~"
        } else if value.generator().is_some() {
            "="
        } else {
            "#"
        };
        println!("  {} {} = {}", kind, id, value.data());
    }
}

fn run_file(path: &str, seed: Option<&str>) {
    let source = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading file '{}': {}", path, e);
        process::exit(1);
    });

    let mut session = session_with_seed(seed);
    let (outcome, errors) = session.parse_lines(source.lines());
    for (line, error) in &errors {
        eprintln!("error on line {}:", line);
        eprint!("{}", diagnostic::report_interpreter_error(path, &source, error));
    }
    for warning in &outcome.warnings {
        eprintln!("warning: {}", warning);
    }
    for event in &outcome.events {
        if let ModelEvent::ValueSelected(value) = event {
            println!("{} = {}", value.borrow().label(), value.borrow().data());
        }
    }
    print_dictionary(&session);
    if !errors.is_empty() {
        process::exit(1);
    }
}

fn run_repl(seed: Option<&str>) {
    let mut session = session_with_seed(seed);
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    print!("> ");
    let _ = stdout.flush();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };
        let trimmed = line.trim();
        if trimmed == "quit" || trimmed == "exit" {
            break;
        }
        if !trimmed.is_empty() {
            match session.parse(&line) {
                Ok(outcome) => {
                    for warning in &outcome.warnings {
                        eprintln!("warning: {}", warning);
                    }
                    match outcome.selected() {
                        Some(value) => {
                            println!("{} = {}", value.borrow().label(), value.borrow().data())
                        }
                        None => print_dictionary(&session),
                    }
                }
                Err(e) => {
                    eprint!("{}", diagnostic::report_interpreter_error("<stdin>", &line, &e));
                }
            }
        }
        print!("> ");
        let _ = stdout.flush();
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    if args[1] == "--help" || args[1] == "-h" {
        print_usage();
        process::exit(0);
    }

    let seed = args.get(2).map(String::as_str);
    if args[1] == "-" {
        run_repl(seed);
    } else {
        run_file(&args[1], seed);
    }
}
