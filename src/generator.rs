/// Generator nodes: the producing side of the model graph.
///
/// A generator consumes named input values and produces one output value,
/// either by sampling (stochastic) or by pure computation (deterministic).
/// Concrete implementations are opaque to the core: each is described by a
/// static `GeneratorSpec` signature table plus a `generate` function.
use crate::error::EvalError;
use crate::expression::{self, ExprOp};
use crate::value::{tracks_randomness, ValueData, ValueNode, ValueRef, MAX_GRAPH_DEPTH};
use rand::RngCore;
use std::cell::RefCell;
use std::rc::Rc;

pub type GeneratorRef = Rc<RefCell<GeneratorNode>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorKind {
    /// A generative distribution; produces a random variable via `sample`.
    Stochastic,
    /// A deterministic function; produces its output via `apply`.
    Deterministic,
}

/// One declared constructor-style parameter of a generator implementation.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub optional: bool,
}

/// Produces the output payload from resolved positional inputs. Absent
/// optional parameters arrive as `None`.
pub type GenerateFn =
    fn(inputs: &[Option<ValueRef>], rng: &mut dyn RngCore) -> Result<ValueData, EvalError>;

/// Statically-declared signature of one generator implementation.
/// Several specs may share a display name; the argument matcher picks
/// among them by required/optional parameter matching.
pub struct GeneratorSpec {
    pub name: &'static str,
    pub kind: GeneratorKind,
    pub params: &'static [ParamSpec],
    pub generate: GenerateFn,
}

impl std::fmt::Debug for GeneratorSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorSpec")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("params", &self.params)
            .finish()
    }
}

#[derive(Debug)]
pub enum GeneratorBody {
    /// A registered implementation with positionally resolved inputs.
    Builtin {
        spec: &'static GeneratorSpec,
        inputs: Vec<Option<ValueRef>>,
    },
    /// One operator/function application inside a compound expression.
    Expression { op: ExprOp, inputs: Vec<ValueRef> },
    /// A flattened compound expression; see `expression::wrap_expression`.
    Composite {
        root: GeneratorRef,
        params: Vec<(String, ValueRef)>,
    },
    /// Array-of-values function used for non-constant array literals, so
    /// re-evaluation propagates if an element is itself random.
    ArrayBuilder { elements: Vec<ValueRef> },
}

#[derive(Debug)]
pub struct GeneratorNode {
    pub name: String,
    pub kind: GeneratorKind,
    pub body: GeneratorBody,
    /// Anonymous generators are hidden intermediates of a flattened
    /// expression; external traversals that filter by named identity
    /// skip them.
    pub anonymous: bool,
}

impl GeneratorNode {
    pub fn new(name: &str, kind: GeneratorKind, body: GeneratorBody) -> GeneratorRef {
        Rc::new(RefCell::new(GeneratorNode {
            name: name.to_string(),
            kind,
            body,
            anonymous: false,
        }))
    }

    /// The named parameter map: parameter name -> current input value.
    /// Declared order for builtins; operand order for expression nodes.
    pub fn params(&self) -> Vec<(String, ValueRef)> {
        match &self.body {
            GeneratorBody::Builtin { spec, inputs } => spec
                .params
                .iter()
                .zip(inputs.iter())
                .filter_map(|(p, v)| v.as_ref().map(|v| (p.name.to_string(), v.clone())))
                .collect(),
            GeneratorBody::Expression { inputs, .. } => inputs
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    let key = match v.borrow().id() {
                        Some(id) if !id.is_empty() => id.to_string(),
                        _ => format!("arg{}", i),
                    };
                    (key, v.clone())
                })
                .collect(),
            GeneratorBody::Composite { params, .. } => params.clone(),
            GeneratorBody::ArrayBuilder { elements } => elements
                .iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v.clone()))
                .collect(),
        }
    }

    /// All current input values, in declaration/operand order.
    pub fn inputs(&self) -> Vec<ValueRef> {
        match &self.body {
            GeneratorBody::Builtin { inputs, .. } => {
                inputs.iter().flatten().cloned().collect()
            }
            GeneratorBody::Expression { inputs, .. } => inputs.clone(),
            GeneratorBody::Composite { root, .. } => root.borrow().inputs(),
            GeneratorBody::ArrayBuilder { elements } => elements.clone(),
        }
    }

    /// The parameter name under which `value` is consumed, if any.
    pub fn param_name_of(&self, value: &ValueRef) -> Option<String> {
        self.params()
            .into_iter()
            .find(|(_, v)| Rc::ptr_eq(v, value))
            .map(|(name, _)| name)
    }
}

/// Rebind one named parameter. For composites the rebinding recurses into
/// whichever intermediate node consumes that name.
pub fn set_param(generator: &GeneratorRef, name: &str, value: ValueRef) -> Result<(), EvalError> {
    let mut node = generator.borrow_mut();
    let display = node.name.clone();
    match &mut node.body {
        GeneratorBody::Builtin { spec, inputs } => {
            let index = spec
                .params
                .iter()
                .position(|p| p.name == name)
                .ok_or_else(|| EvalError::UnknownParameter {
                    name: display,
                    parameter: name.to_string(),
                })?;
            inputs[index] = Some(value);
            Ok(())
        }
        GeneratorBody::Expression { inputs, .. } => {
            for slot in inputs.iter_mut() {
                let matches = slot.borrow().id() == Some(name);
                if matches {
                    *slot = value;
                    return Ok(());
                }
            }
            Err(EvalError::UnknownParameter {
                name: display,
                parameter: name.to_string(),
            })
        }
        GeneratorBody::Composite { root, params } => {
            if let Some(entry) = params.iter_mut().find(|(n, _)| n == name) {
                entry.1 = value.clone();
            }
            let root = root.clone();
            drop(node);
            set_param_recursively(&root, name, value, 0)
        }
        GeneratorBody::ArrayBuilder { .. } => Err(EvalError::UnknownParameter {
            name: display,
            parameter: name.to_string(),
        }),
    }
}

fn set_param_recursively(
    node: &GeneratorRef,
    name: &str,
    value: ValueRef,
    depth: usize,
) -> Result<(), EvalError> {
    if depth > MAX_GRAPH_DEPTH {
        return Err(EvalError::CyclicGraph {
            depth: MAX_GRAPH_DEPTH,
        });
    }
    let consumes = node
        .borrow()
        .params()
        .iter()
        .any(|(n, _)| n == name);
    if consumes {
        return set_param(node, name, value);
    }
    let inputs = node.borrow().inputs();
    for input in inputs {
        let producer = input.borrow().generator().cloned();
        if let Some(producer) = producer {
            if matches!(producer.borrow().body, GeneratorBody::Expression { .. }) {
                set_param_recursively(&producer, name, value.clone(), depth + 1)?;
            }
        }
    }
    Ok(())
}

/// Produce the generator's output payload from its current inputs.
pub fn generate_data(
    generator: &GeneratorRef,
    rng: &mut dyn RngCore,
) -> Result<ValueData, EvalError> {
    generate_data_bounded(generator, rng, 0)
}

pub(crate) fn generate_data_bounded(
    generator: &GeneratorRef,
    rng: &mut dyn RngCore,
    depth: usize,
) -> Result<ValueData, EvalError> {
    if depth > MAX_GRAPH_DEPTH {
        return Err(EvalError::CyclicGraph {
            depth: MAX_GRAPH_DEPTH,
        });
    }
    enum Plan {
        Builtin(GenerateFn, Vec<Option<ValueRef>>),
        Expression(ExprOp, Vec<ValueRef>),
        Composite(GeneratorRef),
        Array(Vec<ValueRef>),
    }
    let plan = {
        let node = generator.borrow();
        match &node.body {
            GeneratorBody::Builtin { spec, inputs } => Plan::Builtin(spec.generate, inputs.clone()),
            GeneratorBody::Expression { op, inputs } => Plan::Expression(*op, inputs.clone()),
            GeneratorBody::Composite { root, .. } => Plan::Composite(root.clone()),
            GeneratorBody::ArrayBuilder { elements } => Plan::Array(elements.clone()),
        }
    };
    match plan {
        Plan::Builtin(generate, inputs) => generate(&inputs, rng),
        Plan::Expression(op, inputs) => {
            let data: Vec<ValueData> = inputs.iter().map(|v| v.borrow().data().clone()).collect();
            op.apply(&data)
        }
        Plan::Composite(root) => expression::apply_composite(&root, rng, depth),
        Plan::Array(elements) => {
            let data: Vec<ValueData> = elements.iter().map(|v| v.borrow().data().clone()).collect();
            build_array(&data)
        }
    }
}

/// Apply a deterministic generator, producing an anonymous output value
/// with its producer back-reference set.
pub fn apply(generator: &GeneratorRef, rng: &mut dyn RngCore) -> Result<ValueRef, EvalError> {
    let data = generate_data(generator, rng)?;
    let is_random = tracks_randomness(&generator.borrow().inputs());
    Ok(ValueNode::produced(None, data, generator.clone(), is_random))
}

/// Sample a stochastic generator, producing a random variable bound to `id`.
pub fn sample(
    generator: &GeneratorRef,
    id: &str,
    rng: &mut dyn RngCore,
) -> Result<ValueRef, EvalError> {
    let data = generate_data(generator, rng)?;
    Ok(ValueNode::produced(Some(id), data, generator.clone(), true))
}

/// Element type for an array literal is decided by the first element and
/// applied uniformly to the whole array.
pub fn build_array(elements: &[ValueData]) -> Result<ValueData, EvalError> {
    let first = elements.first().ok_or_else(|| EvalError::TypeMismatch {
        message: "empty array literal".to_string(),
    })?;
    match first {
        ValueData::Integer(_) => {
            let mut xs = Vec::with_capacity(elements.len());
            for e in elements {
                xs.push(e.as_integer().ok_or_else(|| EvalError::TypeMismatch {
                    message: format!("expected Integer array element, found {}", e.type_name()),
                })?);
            }
            Ok(ValueData::IntegerArray(xs))
        }
        ValueData::Real(_) => {
            let mut xs = Vec::with_capacity(elements.len());
            for e in elements {
                xs.push(e.as_real().ok_or_else(|| EvalError::TypeMismatch {
                    message: format!("expected Real array element, found {}", e.type_name()),
                })?);
            }
            Ok(ValueData::RealArray(xs))
        }
        ValueData::Boolean(_) => {
            let mut xs = Vec::with_capacity(elements.len());
            for e in elements {
                xs.push(e.as_boolean().ok_or_else(|| EvalError::TypeMismatch {
                    message: format!("expected Boolean array element, found {}", e.type_name()),
                })?);
            }
            Ok(ValueData::BooleanArray(xs))
        }
        ValueData::IntegerArray(_) => {
            let mut rows = Vec::with_capacity(elements.len());
            for e in elements {
                match e {
                    ValueData::IntegerArray(r) => rows.push(r.clone()),
                    other => {
                        return Err(EvalError::TypeMismatch {
                            message: format!(
                                "expected Integer[] matrix row, found {}",
                                other.type_name()
                            ),
                        })
                    }
                }
            }
            Ok(ValueData::IntegerMatrix(rows))
        }
        ValueData::RealArray(_) => {
            let mut rows = Vec::with_capacity(elements.len());
            for e in elements {
                match e {
                    ValueData::RealArray(r) => rows.push(r.clone()),
                    other => {
                        return Err(EvalError::TypeMismatch {
                            message: format!(
                                "expected Real[] matrix row, found {}",
                                other.type_name()
                            ),
                        })
                    }
                }
            }
            Ok(ValueData::RealMatrix(rows))
        }
        other => Err(EvalError::TypeMismatch {
            message: format!("cannot build an array of {}", other.type_name()),
        }),
    }
}
