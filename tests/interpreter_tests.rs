/// Integration tests for the line-based interpreter front-end
use modelscript_interpreter::{
    generator, EvalError, GeneratorKind, GeneratorSpec, Interpreter, InterpreterError, MatchMode,
    ParamSpec, ValueData,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::rc::Rc;

// A second Exp parameterization, used to provoke overload ambiguity.
static EXP_RATE: GeneratorSpec = GeneratorSpec {
    name: "Exp",
    kind: GeneratorKind::Stochastic,
    params: &[ParamSpec {
        name: "rate",
        description: "the rate parameter",
        optional: false,
    }],
    generate: |_, _| Ok(ValueData::Real(1.0)),
};

#[test]
fn test_stochastic_declaration_binds_random_variable() {
    let mut session = Interpreter::with_seed(42);
    let outcome = session.parse("x ~ Normal(mean=0.0, sd=1.0);").unwrap();
    assert!(outcome.graph_changed());

    let x = session.get("x").unwrap();
    assert!(x.borrow().is_random());
    assert!(matches!(x.borrow().data(), ValueData::Real(_)));
}

#[test]
fn test_parameter_map_shares_value_nodes() {
    let mut session = Interpreter::with_seed(7);
    session.parse("p = 0.5; x ~ Bernoulli(p=p);").unwrap();

    let p = session.get("p").unwrap();
    let x = session.get("x").unwrap();
    let x = x.borrow();
    let generator = x.generator().unwrap();
    let params = generator.borrow().params();
    let (name, value) = &params[0];
    assert_eq!(name, "p");
    assert!(Rc::ptr_eq(value, &p));
}

#[test]
fn test_function_call_shares_argument_nodes() {
    let mut session = Interpreter::with_seed(0);
    session.parse("n = 3; v = rep(1.0, times=n);").unwrap();

    let n = session.get("n").unwrap();
    let v = session.get("v").unwrap();
    let v = v.borrow();
    let generator = v.generator().unwrap();
    let params = generator.borrow().params();
    let times = params
        .iter()
        .find(|(name, _)| name == "times")
        .map(|(_, value)| value.clone())
        .unwrap();
    assert!(Rc::ptr_eq(&times, &n));
    assert_eq!(*v.data(), ValueData::RealArray(vec![1.0, 1.0, 1.0]));
}

#[test]
fn test_redeclaration_shadows_old_binding() {
    let mut session = Interpreter::with_seed(9);
    session.parse("x = 1.0;").unwrap();
    session.parse("y ~ Normal(mean=x, sd=1.0);").unwrap();
    session.parse("x = 2.0;").unwrap();

    let old = session.get("x.old").unwrap();
    assert_eq!(*old.borrow().data(), ValueData::Real(1.0));
    assert_eq!(*session.get("x").unwrap().borrow().data(), ValueData::Real(2.0));

    // The sampled variable still references the shadowed node.
    let y = session.get("y").unwrap();
    let y = y.borrow();
    let params = y.generator().unwrap().borrow().params();
    let mean = params
        .iter()
        .find(|(name, _)| name == "mean")
        .map(|(_, value)| value.clone())
        .unwrap();
    assert!(Rc::ptr_eq(&mean, &old));
}

#[test]
fn test_integer_literal_is_constant() {
    let mut session = Interpreter::with_seed(0);
    session.parse("n = 10;").unwrap();
    let n = session.get("n").unwrap();
    assert!(n.borrow().is_constant());
    assert_eq!(*n.borrow().data(), ValueData::Integer(10));
}

#[test]
fn test_array_and_matrix_literals() {
    let mut session = Interpreter::with_seed(0);
    session
        .parse("v = [1.0, 2.5, 3.0]; m = [[1, 2], [3, 4]];")
        .unwrap();
    assert_eq!(
        *session.get("v").unwrap().borrow().data(),
        ValueData::RealArray(vec![1.0, 2.5, 3.0])
    );
    assert_eq!(
        *session.get("m").unwrap().borrow().data(),
        ValueData::IntegerMatrix(vec![vec![1, 2], vec![3, 4]])
    );
}

#[test]
fn test_unknown_generator_leaves_dictionary_untouched() {
    let mut session = Interpreter::with_seed(1);
    session.parse("a = 1.0;").unwrap();
    let result = session.parse("x ~ Nonexistent(mean=a);");
    assert!(matches!(result, Err(InterpreterError::Eval(_))));
    assert!(session.get("x").is_none());
    assert_eq!(session.dictionary().len(), 1);
}

#[test]
fn test_empty_assignment_is_a_parse_error() {
    let mut session = Interpreter::with_seed(1);
    let result = session.parse("y = ;");
    assert!(matches!(result, Err(InterpreterError::Parse(_))));
    assert!(session.get("y").is_none());
}

#[test]
fn test_missing_required_argument() {
    let mut session = Interpreter::with_seed(1);
    let result = session.parse("x ~ Normal(mean=0.0);");
    assert!(matches!(result, Err(InterpreterError::Eval(_))));
}

#[test]
fn test_positional_arguments_resolve_by_index() {
    let mut session = Interpreter::with_seed(5);
    session.parse("x ~ Normal(0.0, 1.0);").unwrap();
    let x = session.get("x").unwrap();
    let x = x.borrow();
    let params = x.generator().unwrap().borrow().params();
    let names: Vec<&str> = params.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["mean", "sd"]);
}

#[test]
fn test_overload_selects_by_arity() {
    let mut session = Interpreter::with_seed(5);
    session.parse("u ~ Uniform(10.0);").unwrap();
    let u = session.get("u").unwrap();
    if let ValueData::Real(value) = u.borrow().data() {
        assert!(*value >= 0.0 && *value < 10.0);
    } else {
        panic!("expected a real sample");
    };
}

#[test]
fn test_strict_mode_reports_ambiguity() {
    let mut session = Interpreter::with_seed(5);
    session.register_generator(&EXP_RATE);
    session.set_match_mode(MatchMode::Strict);
    let result = session.parse("t ~ Exp(1.0);");
    assert!(matches!(
        result,
        Err(InterpreterError::Eval(EvalError::AmbiguousMatch { .. }))
    ));
}

#[test]
fn test_first_wins_mode_warns_on_ambiguity() {
    let mut session = Interpreter::with_seed(5);
    session.register_generator(&EXP_RATE);
    let outcome = session.parse("t ~ Exp(1.0);").unwrap();
    assert_eq!(outcome.warnings.len(), 1);
    assert!(session.get("t").is_some());
}

#[test]
fn test_selection_produces_event_without_graph_change() {
    let mut session = Interpreter::with_seed(2);
    session.parse("x = 4.0;").unwrap();
    let outcome = session.parse("x;").unwrap();
    assert!(!outcome.graph_changed());
    let selected = outcome.selected().unwrap();
    assert_eq!(*selected.borrow().data(), ValueData::Real(4.0));
}

#[test]
fn test_remove_command() {
    let mut session = Interpreter::with_seed(2);
    session.parse("x = 4.0; y = 5.0;").unwrap();
    session.parse("remove(x);").unwrap();
    assert!(session.get("x").is_none());
    assert!(session.get("y").is_some());
}

#[test]
fn test_comments_and_blank_statements_are_ignored() {
    let mut session = Interpreter::with_seed(2);
    session
        .parse("// model parameters\nx = 1.0; // inline note\n\n")
        .unwrap();
    assert_eq!(*session.get("x").unwrap().borrow().data(), ValueData::Real(1.0));
}

#[test]
fn test_nested_call_arguments_split_correctly() {
    let mut session = Interpreter::with_seed(2);
    session.parse("v = rep(sum([1.0, 2.0]), times=2);").unwrap();
    assert_eq!(
        *session.get("v").unwrap().borrow().data(),
        ValueData::RealArray(vec![3.0, 3.0])
    );
}

#[test]
fn test_parse_lines_handles_multi_line_statements() {
    let mut session = Interpreter::with_seed(4);
    let source = "x ~ Normal(\n  mean=0.0, sd=1.0);";
    let (outcome, errors) = session.parse_lines(source.lines());
    assert!(errors.is_empty());
    assert!(outcome.graph_changed());
    assert!(session.get("x").unwrap().borrow().is_random());
}

#[test]
fn test_rep_reapplies_after_times_change() {
    let mut session = Interpreter::with_seed(0);
    session.parse("n = 2; v = rep(1.0, times=n);").unwrap();
    let v = session.get("v").unwrap();
    assert_eq!(*v.borrow().data(), ValueData::RealArray(vec![1.0, 1.0]));

    session
        .get("n")
        .unwrap()
        .borrow_mut()
        .set_data(ValueData::Integer(3));
    let generator = v.borrow().generator().cloned().unwrap();
    let mut rng = StdRng::seed_from_u64(0);
    let data = generator::generate_data(&generator, &mut rng).unwrap();
    assert_eq!(data, ValueData::RealArray(vec![1.0, 1.0, 1.0]));
}

#[test]
fn test_parse_lines_continues_past_failures() {
    let mut session = Interpreter::with_seed(2);
    let lines = ["a = 1.0;", "b ~ Nonexistent();", "c = 2.0;"];
    let (_, errors) = session.parse_lines(lines);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, 2);
    assert!(session.get("a").is_some());
    assert!(session.get("c").is_some());
}

#[test]
fn test_deterministic_same_seed() {
    let run = |seed: u64| {
        let mut session = Interpreter::with_seed(seed);
        session.parse("x ~ Normal(mean=0.0, sd=1.0);").unwrap();
        match session.get("x").unwrap().borrow().data() {
            ValueData::Real(value) => *value,
            _ => panic!("expected a real sample"),
        }
    };
    assert_eq!(run(12345), run(12345));
}

#[test]
fn test_random_variables_lists_only_sampled_nodes() {
    let mut session = Interpreter::with_seed(6);
    session
        .parse("a = 1.0; x ~ Normal(mean=a, sd=1.0); q = jukesCantor(1.0);")
        .unwrap();
    let variables = session.random_variables();
    assert_eq!(variables.len(), 1);
    assert_eq!(variables[0].borrow().id(), Some("x"));
}

#[test]
fn test_jukes_cantor_rate_matrix() {
    let mut session = Interpreter::with_seed(6);
    session.parse("q = jukesCantor(3.0);").unwrap();
    let q = session.get("q").unwrap();
    if let ValueData::RealMatrix(rows) = q.borrow().data() {
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0][0], -3.0);
        assert_eq!(rows[0][1], 1.0);
    } else {
        panic!("expected a rate matrix");
    };
}

#[test]
fn test_keywords_include_generators_and_parameters() {
    let session = Interpreter::with_seed(0);
    let keywords = session.keywords();
    assert!(keywords.contains(&"Normal"));
    assert!(keywords.contains(&"jukesCantor"));
    assert!(keywords.contains(&"mean"));
}

#[test]
fn test_clear_resets_dictionary_and_history() {
    let mut session = Interpreter::with_seed(0);
    session.parse("x = 1.0;").unwrap();
    assert!(!session.history().is_empty());
    session.clear();
    assert!(session.dictionary().is_empty());
    assert!(session.history().is_empty());
}
