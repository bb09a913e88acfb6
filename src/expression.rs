/// Expression nodes and flattening.
///
/// While the grammar front-end evaluates a compound expression it builds a
/// tree of anonymous intermediate expression nodes, one per operator or
/// unary-function application. `wrap_expression` collapses such a tree into
/// a single composite function whose externally visible parameters are
/// exactly the named leaf values of the tree.
use crate::error::EvalError;
use crate::generator::{
    generate_data_bounded, GeneratorBody, GeneratorKind, GeneratorNode, GeneratorRef,
};
use crate::value::{ValueData, ValueRef, MAX_GRAPH_DEPTH};
use rand::RngCore;
use std::rc::Rc;

/// One pure operation of the expression sub-language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Mod,
    And,
    Or,
    BitAnd,
    BitOr,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    Not,
    Range,
    Index,
    Math(MathFn),
}

/// Unary math functions available as calls like `sqrt(x)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathFn {
    Abs,
    Acos,
    Asin,
    Atan,
    Cbrt,
    Ceil,
    Cos,
    Cosh,
    Exp,
    Expm1,
    Floor,
    Log,
    Log10,
    Log1p,
    Round,
    Signum,
    Sin,
    Sinh,
    Sqrt,
    Tan,
    Tanh,
}

impl MathFn {
    pub fn from_name(name: &str) -> Option<MathFn> {
        Some(match name {
            "abs" => MathFn::Abs,
            "acos" => MathFn::Acos,
            "asin" => MathFn::Asin,
            "atan" => MathFn::Atan,
            "cbrt" => MathFn::Cbrt,
            "ceil" => MathFn::Ceil,
            "cos" => MathFn::Cos,
            "cosh" => MathFn::Cosh,
            "exp" => MathFn::Exp,
            "expm1" => MathFn::Expm1,
            "floor" => MathFn::Floor,
            "log" => MathFn::Log,
            "log10" => MathFn::Log10,
            "log1p" => MathFn::Log1p,
            "round" => MathFn::Round,
            "signum" => MathFn::Signum,
            "sin" => MathFn::Sin,
            "sinh" => MathFn::Sinh,
            "sqrt" => MathFn::Sqrt,
            "tan" => MathFn::Tan,
            "tanh" => MathFn::Tanh,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            MathFn::Abs => "abs",
            MathFn::Acos => "acos",
            MathFn::Asin => "asin",
            MathFn::Atan => "atan",
            MathFn::Cbrt => "cbrt",
            MathFn::Ceil => "ceil",
            MathFn::Cos => "cos",
            MathFn::Cosh => "cosh",
            MathFn::Exp => "exp",
            MathFn::Expm1 => "expm1",
            MathFn::Floor => "floor",
            MathFn::Log => "log",
            MathFn::Log10 => "log10",
            MathFn::Log1p => "log1p",
            MathFn::Round => "round",
            MathFn::Signum => "signum",
            MathFn::Sin => "sin",
            MathFn::Sinh => "sinh",
            MathFn::Sqrt => "sqrt",
            MathFn::Tan => "tan",
            MathFn::Tanh => "tanh",
        }
    }

    pub const NAMES: &'static [&'static str] = &[
        "abs", "acos", "asin", "atan", "cbrt", "ceil", "cos", "cosh", "exp", "expm1", "floor",
        "log", "log10", "log1p", "round", "signum", "sin", "sinh", "sqrt", "tan", "tanh",
    ];

    fn eval(&self, x: f64) -> f64 {
        match self {
            MathFn::Abs => x.abs(),
            MathFn::Acos => x.acos(),
            MathFn::Asin => x.asin(),
            MathFn::Atan => x.atan(),
            MathFn::Cbrt => x.cbrt(),
            MathFn::Ceil => x.ceil(),
            MathFn::Cos => x.cos(),
            MathFn::Cosh => x.cosh(),
            MathFn::Exp => x.exp(),
            MathFn::Expm1 => x.exp_m1(),
            MathFn::Floor => x.floor(),
            MathFn::Log => x.ln(),
            MathFn::Log10 => x.log10(),
            MathFn::Log1p => x.ln_1p(),
            MathFn::Round => x.round(),
            MathFn::Signum => x.signum(),
            MathFn::Sin => x.sin(),
            MathFn::Sinh => x.sinh(),
            MathFn::Sqrt => x.sqrt(),
            MathFn::Tan => x.tan(),
            MathFn::Tanh => x.tanh(),
        }
    }
}

impl ExprOp {
    pub fn arity(&self) -> usize {
        match self {
            ExprOp::Not | ExprOp::Math(_) => 1,
            _ => 2,
        }
    }

    /// Compute the operation over operand payloads. Integer operands stay
    /// integer where the operation is closed over integers.
    pub fn apply(&self, args: &[ValueData]) -> Result<ValueData, EvalError> {
        if args.len() != self.arity() {
            return Err(EvalError::TypeMismatch {
                message: format!(
                    "operator {:?} expects {} operand(s), found {}",
                    self,
                    self.arity(),
                    args.len()
                ),
            });
        }
        match self {
            ExprOp::Add => int_closed("+", &args[0], &args[1], i64::checked_add, |a, b| a + b),
            ExprOp::Sub => int_closed("-", &args[0], &args[1], i64::checked_sub, |a, b| a - b),
            ExprOp::Mul => int_closed("*", &args[0], &args[1], i64::checked_mul, |a, b| a * b),
            ExprOp::Mod => int_closed("%", &args[0], &args[1], i64::checked_rem, |a, b| a % b),
            ExprOp::Div => {
                let (a, b) = reals(&args[0], &args[1])?;
                Ok(ValueData::Real(a / b))
            }
            ExprOp::Pow => {
                let (a, b) = reals(&args[0], &args[1])?;
                Ok(ValueData::Real(a.powf(b)))
            }
            ExprOp::Lt => compare(&args[0], &args[1], |o| o == std::cmp::Ordering::Less),
            ExprOp::Le => compare(&args[0], &args[1], |o| o != std::cmp::Ordering::Greater),
            ExprOp::Gt => compare(&args[0], &args[1], |o| o == std::cmp::Ordering::Greater),
            ExprOp::Ge => compare(&args[0], &args[1], |o| o != std::cmp::Ordering::Less),
            ExprOp::Eq => equality(&args[0], &args[1]).map(ValueData::Boolean),
            ExprOp::Ne => equality(&args[0], &args[1]).map(|e| ValueData::Boolean(!e)),
            ExprOp::And => {
                let (a, b) = booleans(&args[0], &args[1])?;
                Ok(ValueData::Boolean(a && b))
            }
            ExprOp::Or => {
                let (a, b) = booleans(&args[0], &args[1])?;
                Ok(ValueData::Boolean(a || b))
            }
            ExprOp::BitAnd => match (&args[0], &args[1]) {
                (ValueData::Integer(a), ValueData::Integer(b)) => Ok(ValueData::Integer(a & b)),
                (ValueData::Boolean(a), ValueData::Boolean(b)) => Ok(ValueData::Boolean(a & b)),
                (a, b) => Err(type_error("&", a, b)),
            },
            ExprOp::BitOr => match (&args[0], &args[1]) {
                (ValueData::Integer(a), ValueData::Integer(b)) => Ok(ValueData::Integer(a | b)),
                (ValueData::Boolean(a), ValueData::Boolean(b)) => Ok(ValueData::Boolean(a | b)),
                (a, b) => Err(type_error("|", a, b)),
            },
            ExprOp::Not => match &args[0] {
                ValueData::Boolean(b) => Ok(ValueData::Boolean(!b)),
                other => Err(EvalError::TypeMismatch {
                    message: format!("operator ! expects Boolean, found {}", other.type_name()),
                }),
            },
            ExprOp::Range => match (&args[0], &args[1]) {
                (ValueData::Integer(a), ValueData::Integer(b)) => {
                    let xs = if a <= b {
                        (*a..=*b).collect()
                    } else {
                        (*b..=*a).rev().collect()
                    };
                    Ok(ValueData::IntegerArray(xs))
                }
                (a, b) => Err(type_error(":", a, b)),
            },
            ExprOp::Index => index(&args[0], &args[1]),
            ExprOp::Math(fun) => match &args[0] {
                ValueData::Integer(i) if *fun == MathFn::Abs => Ok(ValueData::Integer(i.abs())),
                other => {
                    let x = other.as_real().ok_or_else(|| EvalError::TypeMismatch {
                        message: format!(
                            "math function expects a numeric operand, found {}",
                            other.type_name()
                        ),
                    })?;
                    Ok(ValueData::Real(fun.eval(x)))
                }
            },
        }
    }
}

fn int_closed(
    op: &str,
    a: &ValueData,
    b: &ValueData,
    fi: fn(i64, i64) -> Option<i64>,
    fr: fn(f64, f64) -> f64,
) -> Result<ValueData, EvalError> {
    match (a, b) {
        (ValueData::Integer(a), ValueData::Integer(b)) => {
            fi(*a, *b)
                .map(ValueData::Integer)
                .ok_or_else(|| EvalError::TypeMismatch {
                    message: format!("cannot compute {} {} {} in Integer", a, op, b),
                })
        }
        _ => {
            let (a, b) = reals(a, b)?;
            Ok(ValueData::Real(fr(a, b)))
        }
    }
}

fn reals(a: &ValueData, b: &ValueData) -> Result<(f64, f64), EvalError> {
    match (a.as_real(), b.as_real()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(type_error("numeric operator", a, b)),
    }
}

fn booleans(a: &ValueData, b: &ValueData) -> Result<(bool, bool), EvalError> {
    match (a.as_boolean(), b.as_boolean()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(type_error("logical operator", a, b)),
    }
}

fn compare(
    a: &ValueData,
    b: &ValueData,
    accept: fn(std::cmp::Ordering) -> bool,
) -> Result<ValueData, EvalError> {
    let (a, b) = reals(a, b)?;
    let ordering = a.partial_cmp(&b).ok_or_else(|| EvalError::TypeMismatch {
        message: "comparison with NaN".to_string(),
    })?;
    Ok(ValueData::Boolean(accept(ordering)))
}

fn equality(a: &ValueData, b: &ValueData) -> Result<bool, EvalError> {
    if let (Some(a), Some(b)) = (a.as_real(), b.as_real()) {
        return Ok(a == b);
    }
    Ok(a == b)
}

fn index(base: &ValueData, idx: &ValueData) -> Result<ValueData, EvalError> {
    let i = idx.as_integer().ok_or_else(|| EvalError::TypeMismatch {
        message: format!("array index must be Integer, found {}", idx.type_name()),
    })?;
    let i = usize::try_from(i).map_err(|_| EvalError::TypeMismatch {
        message: format!("array index {} is negative", i),
    })?;
    let out_of_bounds = || EvalError::TypeMismatch {
        message: format!("index {} out of bounds", i),
    };
    match base {
        ValueData::IntegerArray(xs) => xs.get(i).copied().map(ValueData::Integer).ok_or_else(out_of_bounds),
        ValueData::RealArray(xs) => xs.get(i).copied().map(ValueData::Real).ok_or_else(out_of_bounds),
        ValueData::BooleanArray(xs) => xs.get(i).copied().map(ValueData::Boolean).ok_or_else(out_of_bounds),
        ValueData::IntegerMatrix(rows) => rows
            .get(i)
            .cloned()
            .map(ValueData::IntegerArray)
            .ok_or_else(out_of_bounds),
        ValueData::RealMatrix(rows) => rows
            .get(i)
            .cloned()
            .map(ValueData::RealArray)
            .ok_or_else(out_of_bounds),
        other => Err(EvalError::TypeMismatch {
            message: format!("{} is not indexable", other.type_name()),
        }),
    }
}

fn type_error(op: &str, a: &ValueData, b: &ValueData) -> EvalError {
    EvalError::TypeMismatch {
        message: format!(
            "{} cannot combine {} and {}",
            op,
            a.type_name(),
            b.type_name()
        ),
    }
}

/// Build a one-operand expression node and wire the operand's output edge.
pub fn expression1(text: &str, op: ExprOp, a: ValueRef) -> GeneratorRef {
    let node = GeneratorNode::new(
        text,
        GeneratorKind::Deterministic,
        GeneratorBody::Expression {
            op,
            inputs: vec![a.clone()],
        },
    );
    a.borrow_mut().add_output(&node);
    node
}

/// Build a two-operand expression node and wire both output edges.
pub fn expression2(text: &str, op: ExprOp, a: ValueRef, b: ValueRef) -> GeneratorRef {
    let node = GeneratorNode::new(
        text,
        GeneratorKind::Deterministic,
        GeneratorBody::Expression {
            op,
            inputs: vec![a.clone(), b.clone()],
        },
    );
    a.borrow_mut().add_output(&node);
    b.borrow_mut().add_output(&node);
    node
}

fn is_expression_node(generator: &GeneratorRef) -> bool {
    matches!(generator.borrow().body, GeneratorBody::Expression { .. })
}

/// Collapse a tree of expression nodes rooted at `root` into one composite
/// function. Only named leaf values appear in the composite's parameter
/// map; every intermediate node except the root is marked anonymous, and
/// all leaf output edges are rewired to point at the composite.
pub fn wrap_expression(root: &GeneratorRef) -> Result<GeneratorRef, EvalError> {
    let name = root.borrow().name.clone();
    let wrapper = GeneratorNode::new(
        &name,
        GeneratorKind::Deterministic,
        GeneratorBody::Composite {
            root: root.clone(),
            params: Vec::new(),
        },
    );
    let mut params: Vec<(String, ValueRef)> = Vec::new();
    extract_all_params(root, &mut params, 0)?;
    rewire_outputs(root, &wrapper, false, 0)?;
    if let GeneratorBody::Composite {
        params: slot,
        ..
    } = &mut wrapper.borrow_mut().body
    {
        *slot = params;
    }
    Ok(wrapper)
}

fn extract_all_params(
    node: &GeneratorRef,
    out: &mut Vec<(String, ValueRef)>,
    depth: usize,
) -> Result<(), EvalError> {
    if depth > MAX_GRAPH_DEPTH {
        return Err(EvalError::CyclicGraph {
            depth: MAX_GRAPH_DEPTH,
        });
    }
    let inputs = node.borrow().inputs();
    for input in &inputs {
        let producer = input.borrow().generator().cloned();
        if let Some(producer) = producer {
            if is_expression_node(&producer) {
                extract_all_params(&producer, out, depth + 1)?;
            }
        }
    }
    for input in &inputs {
        let id = input.borrow().id().map(str::to_string);
        if let Some(id) = id {
            if !id.is_empty() && !out.iter().any(|(n, _)| n == &id) {
                out.push((id, input.clone()));
            }
        }
    }
    Ok(())
}

fn rewire_outputs(
    node: &GeneratorRef,
    wrapper: &GeneratorRef,
    make_anonymous: bool,
    depth: usize,
) -> Result<(), EvalError> {
    if depth > MAX_GRAPH_DEPTH {
        return Err(EvalError::CyclicGraph {
            depth: MAX_GRAPH_DEPTH,
        });
    }
    let inputs = node.borrow().inputs();
    for input in &inputs {
        let producer = input.borrow().generator().cloned();
        if let Some(producer) = producer {
            if is_expression_node(&producer) {
                rewire_outputs(&producer, wrapper, true, depth + 1)?;
            }
        }
    }
    for input in &inputs {
        let mut value = input.borrow_mut();
        value.remove_output(node);
        value.add_output(wrapper);
    }
    if make_anonymous {
        node.borrow_mut().anonymous = true;
    }
    Ok(())
}

/// Recompute a flattened expression bottom-up. Any input owned by a
/// deterministic function is refreshed in place first, so a re-sampled
/// upstream variable propagates through the frozen expression shape
/// without re-parsing.
pub(crate) fn apply_composite(
    root: &GeneratorRef,
    rng: &mut dyn RngCore,
    depth: usize,
) -> Result<ValueData, EvalError> {
    if depth > MAX_GRAPH_DEPTH {
        return Err(EvalError::CyclicGraph {
            depth: MAX_GRAPH_DEPTH,
        });
    }
    let inputs = root.borrow().inputs();
    for input in &inputs {
        let producer = input.borrow().generator().cloned();
        if let Some(producer) = producer {
            if producer.borrow().kind == GeneratorKind::Deterministic {
                let fresh = if is_expression_node(&producer) {
                    apply_composite(&producer, rng, depth + 1)?
                } else {
                    generate_data_bounded(&producer, rng, depth + 1)?
                };
                input.borrow_mut().set_data(fresh);
            }
        }
    }
    let plan = {
        let node = root.borrow();
        match &node.body {
            GeneratorBody::Expression { op, inputs } => Some((*op, inputs.clone())),
            _ => None,
        }
    };
    match plan {
        Some((op, inputs)) => {
            let data: Vec<ValueData> = inputs.iter().map(|v| v.borrow().data().clone()).collect();
            op.apply(&data)
        }
        None => generate_data_bounded(root, rng, depth + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator;
    use crate::value::ValueNode;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn real(id: Option<&str>, x: f64) -> ValueRef {
        ValueNode::constant(id, ValueData::Real(x))
    }

    #[test]
    fn test_op_integer_preservation() {
        let sum = ExprOp::Add
            .apply(&[ValueData::Integer(2), ValueData::Integer(3)])
            .unwrap();
        assert_eq!(sum, ValueData::Integer(5));
        let quotient = ExprOp::Div
            .apply(&[ValueData::Integer(3), ValueData::Integer(2)])
            .unwrap();
        assert_eq!(quotient, ValueData::Real(1.5));
    }

    #[test]
    fn test_op_zero_divisor_and_overflow_are_errors() {
        let err = ExprOp::Mod
            .apply(&[ValueData::Integer(5), ValueData::Integer(0)])
            .unwrap_err();
        assert!(matches!(err, EvalError::TypeMismatch { .. }));

        let err = ExprOp::Add
            .apply(&[ValueData::Integer(i64::MAX), ValueData::Integer(1)])
            .unwrap_err();
        assert!(matches!(err, EvalError::TypeMismatch { .. }));

        let err = ExprOp::Mul
            .apply(&[ValueData::Integer(i64::MIN), ValueData::Integer(-1)])
            .unwrap_err();
        assert!(matches!(err, EvalError::TypeMismatch { .. }));
    }

    #[test]
    fn test_range_op() {
        let range = ExprOp::Range
            .apply(&[ValueData::Integer(2), ValueData::Integer(5)])
            .unwrap();
        assert_eq!(range, ValueData::IntegerArray(vec![2, 3, 4, 5]));
    }

    #[test]
    fn test_index_op() {
        let array = ValueData::RealArray(vec![1.0, 2.0, 3.0]);
        let element = ExprOp::Index.apply(&[array, ValueData::Integer(1)]).unwrap();
        assert_eq!(element, ValueData::Real(2.0));
    }

    #[test]
    fn test_flatten_parameter_surface() {
        // a + b * c: the composite exposes exactly {a, b, c}
        let a = real(Some("a"), 2.0);
        let b = real(Some("b"), 3.0);
        let c = real(Some("c"), 4.0);
        let mut rng = StdRng::seed_from_u64(1);

        let product = expression2("b*c", ExprOp::Mul, b.clone(), c.clone());
        let product_value = generator::apply(&product, &mut rng).unwrap();
        let sum = expression2("a+b*c", ExprOp::Add, a.clone(), product_value);

        let wrapper = wrap_expression(&sum).unwrap();
        let mut names: Vec<String> = wrapper
            .borrow()
            .params()
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        names.sort();
        assert_eq!(names, vec!["a", "b", "c"]);

        let result = generator::generate_data(&wrapper, &mut rng).unwrap();
        assert_eq!(result, ValueData::Real(14.0));

        // intermediates are hidden; the leaves now feed the wrapper
        assert!(product.borrow().anonymous);
        assert!(!sum.borrow().anonymous);
        assert!(b.borrow().outputs().iter().any(|g| Rc::ptr_eq(g, &wrapper)));
        assert!(!b.borrow().outputs().iter().any(|g| Rc::ptr_eq(g, &product)));
    }

    #[test]
    fn test_composite_refresh_propagates_set_data() {
        let a = real(Some("a"), 1.0);
        let b = real(Some("b"), 2.0);
        let sum = expression2("a+b", ExprOp::Add, a.clone(), b.clone());
        let wrapper = wrap_expression(&sum).unwrap();

        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(
            generator::generate_data(&wrapper, &mut rng).unwrap(),
            ValueData::Real(3.0)
        );
        a.borrow_mut().set_data(ValueData::Real(10.0));
        assert_eq!(
            generator::generate_data(&wrapper, &mut rng).unwrap(),
            ValueData::Real(12.0)
        );
    }
}
