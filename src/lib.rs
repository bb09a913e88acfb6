/// ModelScript Interpreter - a statistical-model description language
///
/// This library parses model statements such as `x ~ Normal(0.0, sd);`
/// or `y = jukesCantor(rate);` into a directed acyclic graph of typed
/// value and generator nodes, supporting incremental re-evaluation,
/// an expression sub-language, and registry-based overload resolution.
///
/// # Example
///
/// ```
/// use modelscript_interpreter::Interpreter;
///
/// let mut session = Interpreter::with_seed(42);
/// session.parse("p = 0.5; x ~ Bernoulli(p=p);").unwrap();
/// let x = session.get("x").unwrap();
/// assert!(x.borrow().is_random());
/// ```
pub mod ast;
pub mod builtins;
pub mod commands;
pub mod diagnostic;
pub mod error;
pub mod eval;
pub mod expression;
pub mod generator;
pub mod grammar;
pub mod interpreter;
pub mod literals;
pub mod matcher;
pub mod registry;
pub mod span;
pub mod value;

/// Re-export main types for convenience
pub use commands::Command;
pub use error::{EvalError, InterpreterError, ParseError};
pub use expression::{ExprOp, MathFn};
pub use generator::{GeneratorKind, GeneratorNode, GeneratorRef, GeneratorSpec, ParamSpec};
pub use interpreter::{Interpreter, ModelEvent, StatementOutcome};
pub use matcher::MatchMode;
pub use registry::Registry;
pub use span::Span;
pub use value::{Dictionary, ValueData, ValueNode, ValueRef};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_to_end_line_front_end() {
        let mut session = Interpreter::with_seed(42);
        session.parse("mu = 0.0; x ~ Normal(mean=mu, sd=1.0);").unwrap();
        assert!(session.get("x").unwrap().borrow().is_random());
    }

    #[test]
    fn test_deterministic_sampling() {
        let script = "x ~ Normal(mean=0.0, sd=1.0);";
        let mut first = Interpreter::with_seed(7);
        first.parse(script).unwrap();
        let mut second = Interpreter::with_seed(7);
        second.parse(script).unwrap();
        assert_eq!(
            first.get("x").unwrap().borrow().data(),
            second.get("x").unwrap().borrow().data()
        );
    }

    #[test]
    fn test_front_ends_agree() {
        let script = "n = 5; v = rep(1.0, times=n);";
        let mut lines = Interpreter::with_seed(1);
        lines.parse(script).unwrap();
        let mut grammar = Interpreter::with_seed(1);
        grammar.evaluate(script).unwrap();
        assert_eq!(
            lines.get("v").unwrap().borrow().data(),
            grammar.get("v").unwrap().borrow().data()
        );
    }
}
