/// Diagnostic reporting using ariadne for formatted error messages
use crate::error::{EvalError, InterpreterError, ParseError};
use crate::span::{self, Span};
use ariadne::{Color, Label, Report, ReportKind, Source};
use std::ops::Range;

fn span_to_range(span: Span) -> Range<usize> {
    span.range()
}

/// Best-effort location of `needle` inside the source, for errors that
/// carry text rather than a position.
fn locate(source: &str, needle: &str) -> Range<usize> {
    match source.find(needle) {
        Some(start) if !needle.is_empty() => start..start + needle.len(),
        _ => 0..source.len().min(1),
    }
}

/// Report a parse error with formatted output
pub fn report_parse_error(source_name: &str, source: &str, error: &ParseError) -> String {
    let mut output = Vec::new();

    let report = match error {
        ParseError::UnexpectedEof => {
            Report::build(ReportKind::Error, source_name, source.len().saturating_sub(1))
                .with_message("Unexpected end of input")
                .with_label(
                    Label::new((source_name, source.len().saturating_sub(1)..source.len()))
                        .with_message("the input ended in the middle of a statement")
                        .with_color(Color::Red),
                )
                .finish()
        }
        ParseError::Statement { line, text } => {
            let range = span::line_range(source, *line);
            Report::build(ReportKind::Error, source_name, range.start)
                .with_message(format!("Cannot interpret statement: '{}'", text))
                .with_label(
                    Label::new((source_name, range))
                        .with_message("this statement matches no known form")
                        .with_color(Color::Red),
                )
                .with_note("Statements are 'id ~ Distribution(...)', 'id = function(...)', 'id = literal', a command, or a bare identifier")
                .finish()
        }
        ParseError::LiteralParse { text } => {
            Report::build(ReportKind::Error, source_name, locate(source, text).start)
                .with_message(format!("Cannot parse literal: '{}'", text))
                .with_label(
                    Label::new((source_name, locate(source, text)))
                        .with_message("this is not an integer, real, boolean, string or list")
                        .with_color(Color::Red),
                )
                .finish()
        }
        ParseError::UnbalancedArguments { text } => {
            Report::build(ReportKind::Error, source_name, locate(source, text).start)
                .with_message("Unbalanced brackets or quotes")
                .with_label(
                    Label::new((source_name, locate(source, text)))
                        .with_message("a '(', '[' or '\"' here is never closed")
                        .with_color(Color::Red),
                )
                .with_help("Close every parenthesis, bracket and quote before the statement ends")
                .finish()
        }
        ParseError::InvalidSyntax { message, span } => {
            Report::build(ReportKind::Error, source_name, span.start)
                .with_message(format!("Syntax error: {}", message))
                .with_label(
                    Label::new((source_name, span_to_range(*span)))
                        .with_message(message)
                        .with_color(Color::Red),
                )
                .finish()
        }
        ParseError::UnterminatedString { span } => {
            Report::build(ReportKind::Error, source_name, span.start)
                .with_message("Unterminated string")
                .with_label(
                    Label::new((source_name, span_to_range(*span)))
                        .with_message("this string is missing a closing '\"'")
                        .with_color(Color::Red),
                )
                .with_help("Add a closing '\"' to complete the string")
                .finish()
        }
        ParseError::UnterminatedCall { span } => {
            Report::build(ReportKind::Error, source_name, span.start)
                .with_message("Unterminated argument list")
                .with_label(
                    Label::new((source_name, span_to_range(*span)))
                        .with_message("this call is missing a closing ')'")
                        .with_color(Color::Red),
                )
                .with_help("Add a closing ')' to complete the call")
                .finish()
        }
    };

    report
        .write((source_name, Source::from(source)), &mut output)
        .expect("Failed to write diagnostic");

    String::from_utf8(output).expect("Invalid UTF-8 in diagnostic output")
}

/// Report an evaluation error with formatted output
pub fn report_eval_error(source_name: &str, source: &str, error: &EvalError) -> String {
    let mut output = Vec::new();

    let report = match error {
        EvalError::UnknownGenerator { name } => {
            Report::build(ReportKind::Error, source_name, locate(source, name).start)
                .with_message(format!("Unknown generator: '{}'", name))
                .with_label(
                    Label::new((source_name, locate(source, name)))
                        .with_message(format!("no distribution named '{}' is registered", name))
                        .with_color(Color::Red),
                )
                .with_help("Check the spelling, or register the distribution before use")
                .finish()
        }
        EvalError::UnknownFunction { name } => {
            Report::build(ReportKind::Error, source_name, locate(source, name).start)
                .with_message(format!("Unknown function: '{}'", name))
                .with_label(
                    Label::new((source_name, locate(source, name)))
                        .with_message(format!("no function named '{}' is registered", name))
                        .with_color(Color::Red),
                )
                .with_help("Check the spelling, or register the function before use")
                .finish()
        }
        EvalError::UndefinedIdentifier { name } => {
            Report::build(ReportKind::Error, source_name, locate(source, name).start)
                .with_message(format!("Undefined identifier: '{}'", name))
                .with_label(
                    Label::new((source_name, locate(source, name)))
                        .with_message(format!("'{}' is not bound in the dictionary", name))
                        .with_color(Color::Red),
                )
                .with_help(format!("Declare '{}' before using it", name))
                .finish()
        }
        EvalError::NoMatchingSignature { name, arguments } => {
            Report::build(ReportKind::Error, source_name, locate(source, name).start)
                .with_message(format!("No matching signature for '{}'", name))
                .with_label(
                    Label::new((source_name, locate(source, name)))
                        .with_message(format!(
                            "no registered signature of '{}' accepts arguments ({})",
                            name,
                            arguments.join(", ")
                        ))
                        .with_color(Color::Red),
                )
                .with_note("Every required parameter must be supplied and no extra names are allowed")
                .finish()
        }
        EvalError::AmbiguousMatch { name, count } => {
            Report::build(ReportKind::Error, source_name, locate(source, name).start)
                .with_message(format!("Ambiguous call to '{}'", name))
                .with_label(
                    Label::new((source_name, locate(source, name)))
                        .with_message(format!("{} signatures match this argument set", count))
                        .with_color(Color::Red),
                )
                .with_help("Name the arguments to disambiguate the signature")
                .finish()
        }
        EvalError::MissingRequiredArgument { name, parameter } => {
            Report::build(ReportKind::Error, source_name, locate(source, name).start)
                .with_message(format!(
                    "Missing required argument '{}' for '{}'",
                    parameter, name
                ))
                .with_label(
                    Label::new((source_name, locate(source, name)))
                        .with_message(format!("'{}' was not supplied", parameter))
                        .with_color(Color::Red),
                )
                .finish()
        }
        EvalError::UnknownParameter { name, parameter } => {
            Report::build(ReportKind::Error, source_name, locate(source, parameter).start)
                .with_message(format!("Unknown parameter '{}' on '{}'", parameter, name))
                .with_label(
                    Label::new((source_name, locate(source, parameter)))
                        .with_message(format!("'{}' has no parameter of this name", name))
                        .with_color(Color::Red),
                )
                .finish()
        }
        EvalError::TypeMismatch { message } => {
            Report::build(ReportKind::Error, source_name, 0)
                .with_message("Type mismatch")
                .with_label(
                    Label::new((source_name, 0..source.len().min(1)))
                        .with_message(message)
                        .with_color(Color::Red),
                )
                .finish()
        }
        EvalError::CyclicGraph { depth } => {
            Report::build(ReportKind::Error, source_name, 0)
                .with_message("Cyclic graph detected")
                .with_label(
                    Label::new((source_name, 0..source.len().min(1)))
                        .with_message(format!(
                            "graph traversal exceeded {} levels, which indicates a cycle",
                            depth
                        ))
                        .with_color(Color::Red),
                )
                .finish()
        }
        EvalError::Command { message } => {
            Report::build(ReportKind::Error, source_name, 0)
                .with_message("Command failed")
                .with_label(
                    Label::new((source_name, 0..source.len().min(1)))
                        .with_message(message)
                        .with_color(Color::Red),
                )
                .finish()
        }
    };

    report
        .write((source_name, Source::from(source)), &mut output)
        .expect("Failed to write diagnostic");

    String::from_utf8(output).expect("Invalid UTF-8 in diagnostic output")
}

/// Combined error reporting for any interpreter error
pub fn report_interpreter_error(
    source_name: &str,
    source: &str,
    error: &InterpreterError,
) -> String {
    match error {
        InterpreterError::Parse(e) => report_parse_error(source_name, source, e),
        InterpreterError::Eval(e) => report_eval_error(source_name, source, e),
    }
}
