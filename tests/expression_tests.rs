/// Integration tests for the grammar front-end and expression flattening
use modelscript_interpreter::{Interpreter, InterpreterError, ValueData};

fn real(session: &Interpreter, id: &str) -> f64 {
    match session.get(id).unwrap().borrow().data() {
        ValueData::Real(value) => *value,
        other => panic!("expected {} to be real, got {}", id, other.type_name()),
    }
}

#[test]
fn test_arithmetic_precedence() {
    let mut session = Interpreter::with_seed(0);
    session
        .evaluate("a = 2.0; b = 3.0; c = 4.0; d = a + b * c;")
        .unwrap();
    assert_eq!(real(&session, "d"), 14.0);
}

#[test]
fn test_expression_flattens_to_named_leaves() {
    let mut session = Interpreter::with_seed(0);
    session
        .evaluate("a = 2.0; b = 3.0; c = 4.0; d = a + b * c;")
        .unwrap();

    // The wrapper generator exposes the named leaves directly; the
    // intermediate product node stays anonymous and unbound.
    let d = session.get("d").unwrap();
    let d = d.borrow();
    let params = d.generator().unwrap().borrow().params();
    let mut names: Vec<String> = params.into_iter().map(|(name, _)| name).collect();
    names.sort();
    assert_eq!(names, vec!["a", "b", "c"]);
    assert!(session.get("b*c").is_none());
}

#[test]
fn test_integer_arithmetic_stays_integer() {
    let mut session = Interpreter::with_seed(0);
    session.evaluate("n = 3 + 4 * 2;").unwrap();
    assert_eq!(*session.get("n").unwrap().borrow().data(), ValueData::Integer(11));
}

#[test]
fn test_division_promotes_to_real() {
    let mut session = Interpreter::with_seed(0);
    session.evaluate("q = 7 / 2;").unwrap();
    assert_eq!(*session.get("q").unwrap().borrow().data(), ValueData::Real(3.5));
}

#[test]
fn test_power_is_right_associative() {
    let mut session = Interpreter::with_seed(0);
    session.evaluate("p = 2.0 ** 3.0 ** 2.0;").unwrap();
    assert_eq!(real(&session, "p"), 512.0);
}

#[test]
fn test_comparison_and_boolean_operators() {
    let mut session = Interpreter::with_seed(0);
    session.evaluate("t = 1.0 < 2.0 && !(3 == 4);").unwrap();
    assert_eq!(*session.get("t").unwrap().borrow().data(), ValueData::Boolean(true));
}

#[test]
fn test_math_function_call() {
    let mut session = Interpreter::with_seed(0);
    session.evaluate("r = sqrt(16.0);").unwrap();
    assert_eq!(real(&session, "r"), 4.0);
}

#[test]
fn test_range_and_index() {
    let mut session = Interpreter::with_seed(0);
    session.evaluate("v = 2:5; x = v[1];").unwrap();
    assert_eq!(
        *session.get("v").unwrap().borrow().data(),
        ValueData::IntegerArray(vec![2, 3, 4, 5])
    );
    assert_eq!(*session.get("x").unwrap().borrow().data(), ValueData::Integer(3));
}

#[test]
fn test_array_of_expressions_tracks_inputs() {
    let mut session = Interpreter::with_seed(42);
    session
        .evaluate("u ~ Uniform(lower=0.0, upper=1.0); v = [u, 1.0];")
        .unwrap();
    let v = session.get("v").unwrap();
    let v = v.borrow();
    assert!(v.generator().is_some());
    if let ValueData::RealArray(values) = v.data() {
        assert_eq!(values.len(), 2);
        assert_eq!(values[1], 1.0);
    } else {
        panic!("expected a real array");
    }
}

#[test]
fn test_constant_array_has_no_generator() {
    let mut session = Interpreter::with_seed(0);
    session.evaluate("v = [1.0, 2.0];").unwrap();
    assert!(session.get("v").unwrap().borrow().is_constant());
}

#[test]
fn test_stochastic_statement_with_named_arguments() {
    let mut session = Interpreter::with_seed(11);
    session
        .evaluate("mu = 1.0; x ~ Normal(mean=mu, sd=0.5);")
        .unwrap();
    let x = session.get("x").unwrap();
    assert!(x.borrow().is_random());
}

#[test]
fn test_expression_as_distribution_argument() {
    let mut session = Interpreter::with_seed(11);
    session
        .evaluate("a = 1.0; x ~ Normal(mean=a + 1.0, sd=1.0);")
        .unwrap();
    assert!(session.get("x").unwrap().borrow().is_random());
}

#[test]
fn test_alias_copies_rather_than_renames() {
    let mut session = Interpreter::with_seed(0);
    session.evaluate("y = 5.0; x = y;").unwrap();
    assert_eq!(real(&session, "x"), 5.0);
    // y keeps its own identity.
    assert_eq!(session.get("y").unwrap().borrow().id(), Some("y"));
}

#[test]
fn test_integer_zero_divisor_is_an_error() {
    let mut session = Interpreter::with_seed(0);
    let result = session.evaluate("x = 5 % 0;");
    assert!(matches!(result, Err(InterpreterError::Eval(_))));
    assert!(session.get("x").is_none());
}

#[test]
fn test_integer_overflow_is_an_error() {
    let mut session = Interpreter::with_seed(0);
    let result = session.evaluate("x = 9223372036854775807 + 1;");
    assert!(matches!(result, Err(InterpreterError::Eval(_))));
    assert!(session.get("x").is_none());
}

#[test]
fn test_undefined_identifier_reports_eval_error() {
    let mut session = Interpreter::with_seed(0);
    let result = session.evaluate("x = missing + 1.0;");
    assert!(matches!(result, Err(InterpreterError::Eval(_))));
    assert!(session.get("x").is_none());
}

#[test]
fn test_missing_semicolon_is_a_parse_error() {
    let mut session = Interpreter::with_seed(0);
    let result = session.evaluate("x = 1.0");
    assert!(matches!(result, Err(InterpreterError::Parse(_))));
}

#[test]
fn test_front_ends_agree() {
    let source = "n = 4; v = rep(0.5, times=n);";

    let mut line_session = Interpreter::with_seed(77);
    line_session.parse(source).unwrap();

    let mut grammar_session = Interpreter::with_seed(77);
    grammar_session.evaluate(source).unwrap();

    assert_eq!(
        *line_session.get("v").unwrap().borrow().data(),
        *grammar_session.get("v").unwrap().borrow().data()
    );
}

#[test]
fn test_composite_recomputes_after_input_change() {
    let mut session = Interpreter::with_seed(0);
    session.evaluate("a = 2.0; b = 3.0; s = a + b;").unwrap();
    assert_eq!(real(&session, "s"), 5.0);

    session.evaluate("a = 10.0;").unwrap();
    // Rebinding shadows the old node; the composite still reads the
    // captured leaf, which keeps its original payload.
    assert_eq!(real(&session, "s"), 5.0);
    assert!(session.get("a.old").is_some());
}

#[test]
fn test_negative_literals() {
    let mut session = Interpreter::with_seed(0);
    session.evaluate("x = -2.5; n = -3;").unwrap();
    assert_eq!(real(&session, "x"), -2.5);
    assert_eq!(*session.get("n").unwrap().borrow().data(), ValueData::Integer(-3));
}
