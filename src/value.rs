/// The value side of the model graph: typed payloads and shared value nodes.
use crate::error::EvalError;
use crate::generator::{GeneratorNode, GeneratorRef};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

/// Identifier -> current value binding table, the interpreter's primary
/// mutable state. Sorted by key.
pub type Dictionary = BTreeMap<String, ValueRef>;

pub type ValueRef = Rc<RefCell<ValueNode>>;

/// Suffix appended to a value's identifier when a re-declaration shadows it.
pub const SHADOW_SUFFIX: &str = ".old";

/// Traversal depth bound; exceeding it reports a cyclic-graph defect
/// instead of overflowing the stack.
pub const MAX_GRAPH_DEPTH: usize = 512;

/// Payload of a value node, tagged by semantic type.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueData {
    Integer(i64),
    Real(f64),
    Boolean(bool),
    Str(String),
    IntegerArray(Vec<i64>),
    RealArray(Vec<f64>),
    BooleanArray(Vec<bool>),
    IntegerMatrix(Vec<Vec<i64>>),
    RealMatrix(Vec<Vec<f64>>),
}

impl ValueData {
    pub fn type_name(&self) -> &'static str {
        match self {
            ValueData::Integer(_) => "Integer",
            ValueData::Real(_) => "Real",
            ValueData::Boolean(_) => "Boolean",
            ValueData::Str(_) => "String",
            ValueData::IntegerArray(_) => "Integer[]",
            ValueData::RealArray(_) => "Real[]",
            ValueData::BooleanArray(_) => "Boolean[]",
            ValueData::IntegerMatrix(_) => "Integer[][]",
            ValueData::RealMatrix(_) => "Real[][]",
        }
    }

    /// Numeric view; integers widen to reals.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            ValueData::Integer(i) => Some(*i as f64),
            ValueData::Real(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ValueData::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            ValueData::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            ValueData::Integer(_) | ValueData::Real(_) | ValueData::Boolean(_) | ValueData::Str(_)
        )
    }
}

impl std::fmt::Display for ValueData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn row<T: std::fmt::Display>(f: &mut std::fmt::Formatter<'_>, xs: &[T]) -> std::fmt::Result {
            write!(f, "[")?;
            for (i, x) in xs.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", x)?;
            }
            write!(f, "]")
        }
        match self {
            ValueData::Integer(i) => write!(f, "{}", i),
            ValueData::Real(r) => write!(f, "{}", r),
            ValueData::Boolean(b) => write!(f, "{}", b),
            ValueData::Str(s) => write!(f, "\"{}\"", s),
            ValueData::IntegerArray(xs) => row(f, xs),
            ValueData::RealArray(xs) => row(f, xs),
            ValueData::BooleanArray(xs) => row(f, xs),
            ValueData::IntegerMatrix(rows) => {
                write!(f, "[")?;
                for (i, r) in rows.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    row(f, r)?;
                }
                write!(f, "]")
            }
            ValueData::RealMatrix(rows) => {
                write!(f, "[")?;
                for (i, r) in rows.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    row(f, r)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// A node in the model graph holding one value.
///
/// Output edges to consuming generators are weak: the strong direction of
/// the graph runs consumer -> input value -> producing generator, so a
/// strong back edge here would leak the whole subgraph.
#[derive(Debug)]
pub struct ValueNode {
    id: Option<String>,
    data: ValueData,
    generator: Option<GeneratorRef>,
    outputs: Vec<Weak<RefCell<GeneratorNode>>>,
    is_random: bool,
    version: u64,
}

impl ValueNode {
    /// A literal/input value with no producer.
    pub fn constant(id: Option<&str>, data: ValueData) -> ValueRef {
        Rc::new(RefCell::new(ValueNode {
            id: id.map(str::to_string),
            data,
            generator: None,
            outputs: Vec::new(),
            is_random: false,
            version: 0,
        }))
    }

    /// A value produced by a generator. `is_random` marks a sampled
    /// variable, or the output of a function over one.
    pub fn produced(
        id: Option<&str>,
        data: ValueData,
        generator: GeneratorRef,
        is_random: bool,
    ) -> ValueRef {
        Rc::new(RefCell::new(ValueNode {
            id: id.map(str::to_string),
            data,
            generator: Some(generator),
            outputs: Vec::new(),
            is_random,
            version: 0,
        }))
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id(&mut self, id: &str) {
        self.id = Some(id.to_string());
    }

    /// Rename with the reserved shadow marker; called when a
    /// re-declaration takes over this node's identifier.
    pub fn shadow(&mut self) {
        if let Some(id) = &self.id {
            self.id = Some(format!("{}{}", id, SHADOW_SUFFIX));
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.id.as_deref().map_or(true, str::is_empty)
    }

    pub fn data(&self) -> &ValueData {
        &self.data
    }

    /// The explicit "set value" operation; bumps the version counter so
    /// consumers can observe that a refresh happened.
    pub fn set_data(&mut self, data: ValueData) {
        self.data = data;
        self.version += 1;
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn generator(&self) -> Option<&GeneratorRef> {
        self.generator.as_ref()
    }

    pub fn set_generator(&mut self, generator: GeneratorRef) {
        self.generator = Some(generator);
    }

    pub fn is_random(&self) -> bool {
        self.is_random
    }

    /// True for a literal/input value: not sampled and not produced.
    pub fn is_constant(&self) -> bool {
        !self.is_random && self.generator.is_none()
    }

    pub fn add_output(&mut self, consumer: &GeneratorRef) {
        let already = self
            .outputs
            .iter()
            .any(|w| w.upgrade().map_or(false, |g| Rc::ptr_eq(&g, consumer)));
        if !already {
            self.outputs.push(Rc::downgrade(consumer));
        }
    }

    pub fn remove_output(&mut self, consumer: &GeneratorRef) {
        self.outputs
            .retain(|w| w.upgrade().map_or(false, |g| !Rc::ptr_eq(&g, consumer)));
    }

    /// Live consuming generators.
    pub fn outputs(&self) -> Vec<GeneratorRef> {
        self.outputs.iter().filter_map(Weak::upgrade).collect()
    }

    pub fn label(&self) -> String {
        match &self.id {
            Some(id) if !id.is_empty() => id.clone(),
            _ => "[anonymous]".to_string(),
        }
    }
}

impl std::fmt::Display for ValueNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_anonymous() {
            write!(f, "{}", self.data)
        } else {
            let op = if self.is_random { "~" } else { "=" };
            write!(f, "{} {} {}", self.label(), op, self.data)
        }
    }
}

/// Collect every value reachable from `root` through producing generators,
/// depth-first, deduplicated by node identity.
pub fn collect_values(root: &ValueRef) -> Result<Vec<ValueRef>, EvalError> {
    let mut out: Vec<ValueRef> = Vec::new();
    collect_from(root, &mut out, 0)?;
    Ok(out)
}

fn collect_from(value: &ValueRef, out: &mut Vec<ValueRef>, depth: usize) -> Result<(), EvalError> {
    if depth > MAX_GRAPH_DEPTH {
        return Err(EvalError::CyclicGraph {
            depth: MAX_GRAPH_DEPTH,
        });
    }
    if out.iter().any(|v| Rc::ptr_eq(v, value)) {
        return Ok(());
    }
    out.push(value.clone());
    let generator = value.borrow().generator().cloned();
    if let Some(generator) = generator {
        for (_, input) in generator.borrow().params() {
            collect_from(&input, out, depth + 1)?;
        }
    }
    Ok(())
}

/// True if the value is a random variable, or downstream of one.
pub fn tracks_randomness(inputs: &[ValueRef]) -> bool {
    inputs.iter().any(|v| v.borrow().is_random())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shadow_rename() {
        let v = ValueNode::constant(Some("x"), ValueData::Integer(1));
        v.borrow_mut().shadow();
        assert_eq!(v.borrow().id(), Some("x.old"));
    }

    #[test]
    fn test_constant_flags() {
        let v = ValueNode::constant(Some("p"), ValueData::Real(0.5));
        assert!(v.borrow().is_constant());
        assert!(!v.borrow().is_random());
        assert!(!v.borrow().is_anonymous());
    }

    #[test]
    fn test_set_data_bumps_version() {
        let v = ValueNode::constant(None, ValueData::Integer(5));
        assert_eq!(v.borrow().version(), 0);
        v.borrow_mut().set_data(ValueData::Integer(8));
        assert_eq!(v.borrow().version(), 1);
        assert_eq!(v.borrow().data(), &ValueData::Integer(8));
    }

    #[test]
    fn test_collect_values_walks_producers() {
        use crate::generator::{GeneratorBody, GeneratorKind, GeneratorNode};

        let a = ValueNode::constant(Some("a"), ValueData::Real(1.0));
        let g = GeneratorNode::new(
            "f",
            GeneratorKind::Deterministic,
            GeneratorBody::ArrayBuilder {
                elements: vec![a.clone()],
            },
        );
        let out = ValueNode::produced(
            Some("v"),
            ValueData::RealArray(vec![1.0]),
            g,
            false,
        );
        let reached = collect_values(&out).unwrap();
        assert_eq!(reached.len(), 2);
        assert!(reached.iter().any(|v| Rc::ptr_eq(v, &a)));
    }

    #[test]
    fn test_display() {
        let v = ValueNode::constant(Some("x"), ValueData::RealArray(vec![1.0, 2.5]));
        assert_eq!(v.borrow().to_string(), "x = [1, 2.5]");
    }
}
