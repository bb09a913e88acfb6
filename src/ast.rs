/// Abstract syntax tree for the grammar front-end.
use crate::expression::ExprOp;
use crate::span::Span;
use crate::value::ValueData;

#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `id = expr;`
    Deterministic { id: String, value: Expr, span: Span },
    /// `id ~ Distribution(...);`
    Stochastic { id: String, distribution: Call, span: Span },
    /// bare `id;`
    Selection { id: String, span: Span },
}

impl Statement {
    pub fn span(&self) -> Span {
        match self {
            Statement::Deterministic { span, .. }
            | Statement::Stochastic { span, .. }
            | Statement::Selection { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub name: String,
    pub args: Vec<Argument>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    /// `None` for a positional argument.
    pub name: Option<String>,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(ValueData),
    Identifier(String),
    /// `!x`, or a unary math function call folded by the evaluator.
    Unary { op: ExprOp, operand: Box<Expr> },
    Binary {
        op: ExprOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `base[index]`
    Index { base: Box<Expr>, index: Box<Expr> },
    /// `[e, e, ...]`
    Array { elements: Vec<Expr> },
    Call(Call),
}

/// Source-level symbol of an operation, used to name expression nodes.
pub fn symbol(op: ExprOp) -> &'static str {
    match op {
        ExprOp::Add => "+",
        ExprOp::Sub => "-",
        ExprOp::Mul => "*",
        ExprOp::Div => "/",
        ExprOp::Pow => "**",
        ExprOp::Mod => "%",
        ExprOp::And => "&&",
        ExprOp::Or => "||",
        ExprOp::BitAnd => "&",
        ExprOp::BitOr => "|",
        ExprOp::Lt => "<",
        ExprOp::Le => "<=",
        ExprOp::Gt => ">",
        ExprOp::Ge => ">=",
        ExprOp::Eq => "==",
        ExprOp::Ne => "!=",
        ExprOp::Not => "!",
        ExprOp::Range => ":",
        ExprOp::Index => "[]",
        ExprOp::Math(_) => "",
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Literal(data) => write!(f, "{}", data),
            Expr::Identifier(id) => write!(f, "{}", id),
            Expr::Unary { op, operand } => match op {
                ExprOp::Math(fun) => write!(f, "{}({})", fun.name(), operand),
                _ => write!(f, "{}{}", symbol(*op), operand),
            },
            Expr::Binary { op, left, right } => {
                write!(f, "{}{}{}", left, symbol(*op), right)
            }
            Expr::Index { base, index } => write!(f, "{}[{}]", base, index),
            Expr::Array { elements } => {
                write!(f, "[")?;
                for (i, e) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, "]")
            }
            Expr::Call(call) => {
                write!(f, "{}(", call.name)?;
                for (i, arg) in call.args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match &arg.name {
                        Some(name) => write!(f, "{}={}", name, arg.value)?,
                        None => write!(f, "{}", arg.value)?,
                    }
                }
                write!(f, ")")
            }
        }
    }
}
