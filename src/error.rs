/// Error taxonomy for the interpreter
use crate::span::Span;

/// Errors raised while recognising statement or expression structure.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Statement matched no recognised form
    Statement { line: usize, text: String },
    /// Text matched no literal form
    LiteralParse { text: String },
    /// An argument list with unbalanced parens/brackets/quotes
    UnbalancedArguments { text: String },
    UnexpectedEof,
    InvalidSyntax { message: String, span: Span },
    UnterminatedString { span: Span },
    UnterminatedCall { span: Span },
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Statement { line, text } => {
                write!(f, "Parse error on line {}: {}", line, text)
            }
            ParseError::LiteralParse { text } => {
                write!(f, "'{}' is not a valid literal", text)
            }
            ParseError::UnbalancedArguments { text } => {
                write!(f, "Unbalanced delimiters in argument list: {}", text)
            }
            ParseError::UnexpectedEof => write!(f, "Unexpected end of input"),
            ParseError::InvalidSyntax { message, span } => {
                write!(f, "{} at position {}", message, span.start)
            }
            ParseError::UnterminatedString { span } => {
                write!(f, "Unterminated string at position {}", span.start)
            }
            ParseError::UnterminatedCall { span } => {
                write!(f, "Unterminated call at position {}", span.start)
            }
        }
    }
}

impl std::error::Error for ParseError {}

impl ParseError {
    /// Span of the error within its statement, where one is known
    pub fn span(&self) -> Option<Span> {
        match self {
            ParseError::InvalidSyntax { span, .. }
            | ParseError::UnterminatedString { span }
            | ParseError::UnterminatedCall { span } => Some(*span),
            _ => None,
        }
    }
}

/// Errors raised while resolving calls or producing graph values.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    UnknownGenerator { name: String },
    UnknownFunction { name: String },
    UndefinedIdentifier { name: String },
    NoMatchingSignature { name: String, arguments: Vec<String> },
    AmbiguousMatch { name: String, count: usize },
    /// Safety net: unreachable if signature matching is correct
    MissingRequiredArgument { name: String, parameter: String },
    UnknownParameter { name: String, parameter: String },
    TypeMismatch { message: String },
    CyclicGraph { depth: usize },
    Command { message: String },
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvalError::UnknownGenerator { name } => {
                write!(f, "No implementation found for distribution '{}'", name)
            }
            EvalError::UnknownFunction { name } => {
                write!(f, "No implementation found for function '{}'", name)
            }
            EvalError::UndefinedIdentifier { name } => {
                write!(f, "Undefined identifier '{}'", name)
            }
            EvalError::NoMatchingSignature { name, arguments } => write!(
                f,
                "No signature of '{}' matches arguments [{}]",
                name,
                arguments.join(", ")
            ),
            EvalError::AmbiguousMatch { name, count } => write!(
                f,
                "{} signatures of '{}' match the supplied arguments",
                count, name
            ),
            EvalError::MissingRequiredArgument { name, parameter } => write!(
                f,
                "Required argument '{}' of '{}' not found",
                parameter, name
            ),
            EvalError::UnknownParameter { name, parameter } => {
                write!(f, "Unrecognised parameter '{}' of '{}'", parameter, name)
            }
            EvalError::TypeMismatch { message } => write!(f, "Type mismatch: {}", message),
            EvalError::CyclicGraph { depth } => write!(
                f,
                "Graph traversal exceeded depth {}; the model graph may be cyclic",
                depth
            ),
            EvalError::Command { message } => write!(f, "Command error: {}", message),
        }
    }
}

impl std::error::Error for EvalError {}

/// Combined error type for the interpreter
#[derive(Debug, Clone, PartialEq)]
pub enum InterpreterError {
    Parse(ParseError),
    Eval(EvalError),
}

impl std::fmt::Display for InterpreterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InterpreterError::Parse(e) => write!(f, "Parse error: {}", e),
            InterpreterError::Eval(e) => write!(f, "Evaluation error: {}", e),
        }
    }
}

impl std::error::Error for InterpreterError {}

impl From<ParseError> for InterpreterError {
    fn from(e: ParseError) -> Self {
        InterpreterError::Parse(e)
    }
}

impl From<EvalError> for InterpreterError {
    fn from(e: EvalError) -> Self {
        InterpreterError::Eval(e)
    }
}
