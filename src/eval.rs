/// Bottom-up evaluation of the grammar front-end's AST.
///
/// Every call resolution goes through the same registry/matcher path as
/// the line front-end, so both produce graph-equivalent results for the
/// statement forms they share.
use crate::ast::{Argument, Call, Expr, Statement};
use crate::error::{EvalError, InterpreterError};
use crate::expression::{self, ExprOp, MathFn};
use crate::generator::{self, GeneratorBody, GeneratorKind, GeneratorNode, GeneratorRef};
use crate::grammar;
use crate::interpreter::{Interpreter, ModelEvent, StatementOutcome};
use crate::matcher;
use crate::value::{ValueData, ValueNode, ValueRef};

/// What visiting one expression produced. Callers disambiguate by
/// capability, not by syntax.
pub enum Evaluated {
    /// A resolved value.
    Value(ValueRef),
    /// A deterministic function still awaiting `apply`.
    Function(GeneratorRef),
}

pub fn evaluate_source(
    session: &mut Interpreter,
    source: &str,
) -> Result<StatementOutcome, InterpreterError> {
    let script = grammar::parse(source)?;
    let mut outcome = StatementOutcome::default();
    for statement in &script.statements {
        eval_statement(session, statement, &mut outcome)?;
    }
    Ok(outcome)
}

fn eval_statement(
    session: &mut Interpreter,
    statement: &Statement,
    outcome: &mut StatementOutcome,
) -> Result<(), InterpreterError> {
    match statement {
        Statement::Deterministic { id, value, .. } => {
            let bound = match eval_expr(session, value, outcome)? {
                Evaluated::Value(v) => {
                    if v.borrow().is_anonymous() {
                        v
                    } else {
                        // `x = y;` copies the payload rather than stealing
                        // the identifier from the existing value
                        let data = v.borrow().data().clone();
                        ValueNode::constant(None, data)
                    }
                }
                Evaluated::Function(node) => {
                    let node = if matches!(node.borrow().body, GeneratorBody::Expression { .. }) {
                        expression::wrap_expression(&node)?
                    } else {
                        node
                    };
                    generator::apply(&node, session.rng_mut())?
                }
            };
            session.bind(id, bound);
            outcome.events.push(ModelEvent::GraphChanged);
        }
        Statement::Stochastic {
            id, distribution, ..
        } => {
            let args = eval_arguments(session, &distribution.args, outcome)?;
            let candidates = session.registry().lookup_distribution(&distribution.name)?;
            let (node, warning) =
                matcher::resolve_call(&distribution.name, candidates, &args, session.match_mode())?;
            outcome.warnings.extend(warning);
            let variable = generator::sample(&node, id, session.rng_mut())?;
            session.bind(id, variable);
            outcome.events.push(ModelEvent::GraphChanged);
        }
        Statement::Selection { id, .. } => {
            let value = session.get(id).ok_or_else(|| EvalError::UndefinedIdentifier {
                name: id.clone(),
            })?;
            outcome.events.push(ModelEvent::ValueSelected(value));
        }
    }
    Ok(())
}

fn eval_expr(
    session: &mut Interpreter,
    expr: &Expr,
    outcome: &mut StatementOutcome,
) -> Result<Evaluated, InterpreterError> {
    match expr {
        Expr::Literal(data) => Ok(Evaluated::Value(ValueNode::constant(None, data.clone()))),
        Expr::Identifier(id) => session
            .get(id)
            .map(Evaluated::Value)
            .ok_or_else(|| EvalError::UndefinedIdentifier { name: id.clone() }.into()),
        Expr::Unary { op, operand } => {
            let value = eval_value(session, operand, outcome)?;
            Ok(Evaluated::Function(expression::expression1(
                &expr.to_string(),
                *op,
                value,
            )))
        }
        Expr::Binary { op, left, right } => {
            let left = eval_value(session, left, outcome)?;
            let right = eval_value(session, right, outcome)?;
            Ok(Evaluated::Function(expression::expression2(
                &expr.to_string(),
                *op,
                left,
                right,
            )))
        }
        Expr::Index { base, index } => {
            let base = eval_value(session, base, outcome)?;
            let index = eval_value(session, index, outcome)?;
            Ok(Evaluated::Function(expression::expression2(
                &expr.to_string(),
                ExprOp::Index,
                base,
                index,
            )))
        }
        Expr::Array { elements } => {
            let mut values = Vec::with_capacity(elements.len());
            for element in elements {
                values.push(eval_value(session, element, outcome)?);
            }
            if values.iter().all(|v| v.borrow().is_constant()) {
                let data: Vec<ValueData> =
                    values.iter().map(|v| v.borrow().data().clone()).collect();
                let array = generator::build_array(&data)?;
                Ok(Evaluated::Value(ValueNode::constant(None, array)))
            } else {
                // an element is random or derived; keep the structure live
                // so re-application propagates
                let node = GeneratorNode::new(
                    &expr.to_string(),
                    GeneratorKind::Deterministic,
                    GeneratorBody::ArrayBuilder {
                        elements: values.clone(),
                    },
                );
                for value in &values {
                    value.borrow_mut().add_output(&node);
                }
                Ok(Evaluated::Function(node))
            }
        }
        Expr::Call(call) => eval_call(session, call, outcome),
    }
}

fn eval_call(
    session: &mut Interpreter,
    call: &Call,
    outcome: &mut StatementOutcome,
) -> Result<Evaluated, InterpreterError> {
    // a single positional argument to a known math name is a unary math
    // expression, unless a registered function shadows the name
    if call.args.len() == 1
        && call.args[0].name.is_none()
        && !session.registry().is_function(&call.name)
    {
        if let Some(fun) = MathFn::from_name(&call.name) {
            let value = eval_value(session, &call.args[0].value, outcome)?;
            let text = Expr::Call(call.clone()).to_string();
            return Ok(Evaluated::Function(expression::expression1(
                &text,
                ExprOp::Math(fun),
                value,
            )));
        }
    }
    let args = eval_arguments(session, &call.args, outcome)?;
    let candidates = session.registry().lookup_function(&call.name)?;
    let (node, warning) =
        matcher::resolve_call(&call.name, candidates, &args, session.match_mode())?;
    outcome.warnings.extend(warning);
    Ok(Evaluated::Function(node))
}

fn eval_arguments(
    session: &mut Interpreter,
    args: &[Argument],
    outcome: &mut StatementOutcome,
) -> Result<Vec<(String, ValueRef)>, InterpreterError> {
    let mut out = Vec::with_capacity(args.len());
    for (position, arg) in args.iter().enumerate() {
        let key = arg.name.clone().unwrap_or_else(|| position.to_string());
        let value = eval_value(session, &arg.value, outcome)?;
        out.push((key, value));
    }
    Ok(out)
}

/// Force an evaluation result down to a value, applying a pending
/// function. The produced value keeps its generator back-reference, so
/// expression trees stay connected for flattening.
fn eval_value(
    session: &mut Interpreter,
    expr: &Expr,
    outcome: &mut StatementOutcome,
) -> Result<ValueRef, InterpreterError> {
    match eval_expr(session, expr, outcome)? {
        Evaluated::Value(v) => Ok(v),
        Evaluated::Function(node) => Ok(generator::apply(&node, session.rng_mut())?),
    }
}
