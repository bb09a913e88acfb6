/// Built-in generator implementations: the distributions and deterministic
/// functions registered at start-up. Each is one static `GeneratorSpec`;
/// the core treats them as opaque beyond their signature table.
use crate::error::EvalError;
use crate::generator::{GeneratorKind, GeneratorSpec, ParamSpec};
use crate::value::{ValueData, ValueRef};
use rand::RngCore;
use rand_distr::{
    Bernoulli, Beta, Dirichlet, Distribution, Exp, Gamma, Geometric, LogNormal, Normal, Uniform,
};

const fn required(name: &'static str, description: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        description,
        optional: false,
    }
}

const fn optional(name: &'static str, description: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        description,
        optional: true,
    }
}

pub static DISTRIBUTIONS: &[&GeneratorSpec] = &[
    &NORMAL,
    &LOG_NORMAL,
    &GAMMA,
    &BETA,
    &EXP,
    &DIRICHLET,
    &BERNOULLI,
    &GEOMETRIC,
    &UNIFORM_RANGE,
    &UNIFORM_UNIT,
];

pub static FUNCTIONS: &[&GeneratorSpec] = &[
    &REP,
    &JUKES_CANTOR,
    &BINARY_RATE_MATRIX,
    &LENGTH,
    &SUM,
];

static NORMAL: GeneratorSpec = GeneratorSpec {
    name: "Normal",
    kind: GeneratorKind::Stochastic,
    params: &[
        required("mean", "the mean of the distribution"),
        required("sd", "the standard deviation of the distribution"),
    ],
    generate: |inputs, rng| {
        let mean = real_arg(inputs, 0, "Normal", "mean")?;
        let sd = real_arg(inputs, 1, "Normal", "sd")?;
        let dist = Normal::new(mean, sd).map_err(|e| bad_param("Normal", e))?;
        Ok(ValueData::Real(dist.sample(rng)))
    },
};

static LOG_NORMAL: GeneratorSpec = GeneratorSpec {
    name: "LogNormal",
    kind: GeneratorKind::Stochastic,
    params: &[
        required("meanlog", "the mean of the distribution on the log scale"),
        required("sdlog", "the standard deviation on the log scale"),
    ],
    generate: |inputs, rng| {
        let meanlog = real_arg(inputs, 0, "LogNormal", "meanlog")?;
        let sdlog = real_arg(inputs, 1, "LogNormal", "sdlog")?;
        let dist = LogNormal::new(meanlog, sdlog).map_err(|e| bad_param("LogNormal", e))?;
        Ok(ValueData::Real(dist.sample(rng)))
    },
};

static GAMMA: GeneratorSpec = GeneratorSpec {
    name: "Gamma",
    kind: GeneratorKind::Stochastic,
    params: &[
        required("shape", "the shape of the distribution"),
        required("scale", "the scale of the distribution"),
    ],
    generate: |inputs, rng| {
        let shape = real_arg(inputs, 0, "Gamma", "shape")?;
        let scale = real_arg(inputs, 1, "Gamma", "scale")?;
        let dist = Gamma::new(shape, scale).map_err(|e| bad_param("Gamma", e))?;
        Ok(ValueData::Real(dist.sample(rng)))
    },
};

static BETA: GeneratorSpec = GeneratorSpec {
    name: "Beta",
    kind: GeneratorKind::Stochastic,
    params: &[
        required("alpha", "the first shape parameter"),
        required("beta", "the second shape parameter"),
    ],
    generate: |inputs, rng| {
        let alpha = real_arg(inputs, 0, "Beta", "alpha")?;
        let beta = real_arg(inputs, 1, "Beta", "beta")?;
        let dist = Beta::new(alpha, beta).map_err(|e| bad_param("Beta", e))?;
        Ok(ValueData::Real(dist.sample(rng)))
    },
};

static EXP: GeneratorSpec = GeneratorSpec {
    name: "Exp",
    kind: GeneratorKind::Stochastic,
    params: &[required("mean", "the mean of the distribution")],
    generate: |inputs, rng| {
        let mean = real_arg(inputs, 0, "Exp", "mean")?;
        let dist = Exp::new(1.0 / mean).map_err(|e| bad_param("Exp", e))?;
        Ok(ValueData::Real(dist.sample(rng)))
    },
};

static DIRICHLET: GeneratorSpec = GeneratorSpec {
    name: "Dirichlet",
    kind: GeneratorKind::Stochastic,
    params: &[required("conc", "the concentration parameters")],
    generate: |inputs, rng| {
        let conc = real_array_arg(inputs, 0, "Dirichlet", "conc")?;
        let dist = Dirichlet::new(&conc).map_err(|e| bad_param("Dirichlet", e))?;
        Ok(ValueData::RealArray(dist.sample(rng)))
    },
};

static BERNOULLI: GeneratorSpec = GeneratorSpec {
    name: "Bernoulli",
    kind: GeneratorKind::Stochastic,
    params: &[required("p", "the probability of success")],
    generate: |inputs, rng| {
        let p = real_arg(inputs, 0, "Bernoulli", "p")?;
        let dist = Bernoulli::new(p).map_err(|e| bad_param("Bernoulli", e))?;
        Ok(ValueData::Boolean(dist.sample(rng)))
    },
};

static GEOMETRIC: GeneratorSpec = GeneratorSpec {
    name: "Geometric",
    kind: GeneratorKind::Stochastic,
    params: &[required("p", "the probability of success per trial")],
    generate: |inputs, rng| {
        let p = real_arg(inputs, 0, "Geometric", "p")?;
        let dist = Geometric::new(p).map_err(|e| bad_param("Geometric", e))?;
        Ok(ValueData::Integer(dist.sample(rng) as i64))
    },
};

static UNIFORM_RANGE: GeneratorSpec = GeneratorSpec {
    name: "Uniform",
    kind: GeneratorKind::Stochastic,
    params: &[
        required("lower", "the lower bound"),
        required("upper", "the upper bound"),
    ],
    generate: |inputs, rng| {
        let lower = real_arg(inputs, 0, "Uniform", "lower")?;
        let upper = real_arg(inputs, 1, "Uniform", "upper")?;
        if !(lower < upper) {
            return Err(EvalError::TypeMismatch {
                message: format!("Uniform: lower {} must be below upper {}", lower, upper),
            });
        }
        Ok(ValueData::Real(Uniform::new(lower, upper).sample(rng)))
    },
};

/// One-argument overload over [0, upper); resolves by arity.
static UNIFORM_UNIT: GeneratorSpec = GeneratorSpec {
    name: "Uniform",
    kind: GeneratorKind::Stochastic,
    params: &[required("upper", "the upper bound, from an implicit lower bound of zero")],
    generate: |inputs, rng| {
        let upper = real_arg(inputs, 0, "Uniform", "upper")?;
        if !(upper > 0.0) {
            return Err(EvalError::TypeMismatch {
                message: format!("Uniform: upper {} must be positive", upper),
            });
        }
        Ok(ValueData::Real(Uniform::new(0.0, upper).sample(rng)))
    },
};

static REP: GeneratorSpec = GeneratorSpec {
    name: "rep",
    kind: GeneratorKind::Deterministic,
    params: &[
        required("element", "the element to replicate"),
        required("times", "the number of copies"),
    ],
    generate: |inputs, _| {
        let element = data_arg(inputs, 0, "rep", "element")?;
        let times = integer_arg(inputs, 1, "rep", "times")?;
        let times = usize::try_from(times).map_err(|_| EvalError::TypeMismatch {
            message: format!("rep: times {} must be non-negative", times),
        })?;
        match element {
            ValueData::Integer(x) => Ok(ValueData::IntegerArray(vec![x; times])),
            ValueData::Real(x) => Ok(ValueData::RealArray(vec![x; times])),
            ValueData::Boolean(x) => Ok(ValueData::BooleanArray(vec![x; times])),
            other => Err(EvalError::TypeMismatch {
                message: format!("rep: cannot replicate {}", other.type_name()),
            }),
        }
    },
};

/// Jukes-Cantor rate matrix, normalized to one expected substitution per
/// unit time at rate 1.
static JUKES_CANTOR: GeneratorSpec = GeneratorSpec {
    name: "jukesCantor",
    kind: GeneratorKind::Deterministic,
    params: &[optional("rate", "the total substitution rate, default 1.0")],
    generate: |inputs, _| {
        let rate = opt_real_arg(inputs, 0, "jukesCantor", "rate")?.unwrap_or(1.0);
        let mut q = vec![vec![rate / 3.0; 4]; 4];
        for (i, row) in q.iter_mut().enumerate() {
            row[i] = -rate;
        }
        Ok(ValueData::RealMatrix(q))
    },
};

/// Two-state rate matrix with relative rate `lambda` for the 1 -> 0
/// transition, normalized to unit mean rate at equal frequencies.
static BINARY_RATE_MATRIX: GeneratorSpec = GeneratorSpec {
    name: "binaryRateMatrix",
    kind: GeneratorKind::Deterministic,
    params: &[required("lambda", "the relative rate of the second state")],
    generate: |inputs, _| {
        let lambda = real_arg(inputs, 0, "binaryRateMatrix", "lambda")?;
        if !(lambda > 0.0) {
            return Err(EvalError::TypeMismatch {
                message: format!("binaryRateMatrix: lambda {} must be positive", lambda),
            });
        }
        let norm = (1.0 + lambda) / 2.0;
        let q = vec![
            vec![-1.0 / norm, 1.0 / norm],
            vec![lambda / norm, -lambda / norm],
        ];
        Ok(ValueData::RealMatrix(q))
    },
};

static LENGTH: GeneratorSpec = GeneratorSpec {
    name: "length",
    kind: GeneratorKind::Deterministic,
    params: &[required("arg", "the array to measure")],
    generate: |inputs, _| {
        let arg = data_arg(inputs, 0, "length", "arg")?;
        let len = match &arg {
            ValueData::IntegerArray(xs) => xs.len(),
            ValueData::RealArray(xs) => xs.len(),
            ValueData::BooleanArray(xs) => xs.len(),
            ValueData::IntegerMatrix(rows) => rows.len(),
            ValueData::RealMatrix(rows) => rows.len(),
            ValueData::Str(s) => s.chars().count(),
            other => {
                return Err(EvalError::TypeMismatch {
                    message: format!("length: {} has no length", other.type_name()),
                })
            }
        };
        Ok(ValueData::Integer(len as i64))
    },
};

static SUM: GeneratorSpec = GeneratorSpec {
    name: "sum",
    kind: GeneratorKind::Deterministic,
    params: &[required("arg", "the array to sum")],
    generate: |inputs, _| {
        let arg = data_arg(inputs, 0, "sum", "arg")?;
        match &arg {
            ValueData::IntegerArray(xs) => Ok(ValueData::Integer(xs.iter().sum())),
            ValueData::RealArray(xs) => Ok(ValueData::Real(xs.iter().sum())),
            other => Err(EvalError::TypeMismatch {
                message: format!("sum: cannot sum {}", other.type_name()),
            }),
        }
    },
};

fn data_arg(
    inputs: &[Option<ValueRef>],
    index: usize,
    generator: &str,
    parameter: &str,
) -> Result<ValueData, EvalError> {
    inputs
        .get(index)
        .and_then(|v| v.as_ref())
        .map(|v| v.borrow().data().clone())
        .ok_or_else(|| EvalError::MissingRequiredArgument {
            name: generator.to_string(),
            parameter: parameter.to_string(),
        })
}

fn real_arg(
    inputs: &[Option<ValueRef>],
    index: usize,
    generator: &str,
    parameter: &str,
) -> Result<f64, EvalError> {
    let data = data_arg(inputs, index, generator, parameter)?;
    data.as_real().ok_or_else(|| EvalError::TypeMismatch {
        message: format!(
            "{}: {} must be numeric, found {}",
            generator,
            parameter,
            data.type_name()
        ),
    })
}

fn opt_real_arg(
    inputs: &[Option<ValueRef>],
    index: usize,
    generator: &str,
    parameter: &str,
) -> Result<Option<f64>, EvalError> {
    match inputs.get(index).and_then(|v| v.as_ref()) {
        None => Ok(None),
        Some(_) => real_arg(inputs, index, generator, parameter).map(Some),
    }
}

fn integer_arg(
    inputs: &[Option<ValueRef>],
    index: usize,
    generator: &str,
    parameter: &str,
) -> Result<i64, EvalError> {
    let data = data_arg(inputs, index, generator, parameter)?;
    data.as_integer().ok_or_else(|| EvalError::TypeMismatch {
        message: format!(
            "{}: {} must be an integer, found {}",
            generator,
            parameter,
            data.type_name()
        ),
    })
}

fn real_array_arg(
    inputs: &[Option<ValueRef>],
    index: usize,
    generator: &str,
    parameter: &str,
) -> Result<Vec<f64>, EvalError> {
    let data = data_arg(inputs, index, generator, parameter)?;
    match data {
        ValueData::RealArray(xs) => Ok(xs),
        ValueData::IntegerArray(xs) => Ok(xs.into_iter().map(|x| x as f64).collect()),
        other => Err(EvalError::TypeMismatch {
            message: format!(
                "{}: {} must be a numeric array, found {}",
                generator,
                parameter,
                other.type_name()
            ),
        }),
    }
}

fn bad_param(generator: &str, error: impl std::fmt::Display) -> EvalError {
    EvalError::TypeMismatch {
        message: format!("{}: {}", generator, error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueNode;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn input(data: ValueData) -> Option<ValueRef> {
        Some(ValueNode::constant(None, data))
    }

    #[test]
    fn test_rep_builds_real_array() {
        let mut rng = StdRng::seed_from_u64(0);
        let out = (REP.generate)(
            &[input(ValueData::Real(1.0)), input(ValueData::Integer(5))],
            &mut rng,
        )
        .unwrap();
        assert_eq!(out, ValueData::RealArray(vec![1.0; 5]));
    }

    #[test]
    fn test_jukes_cantor_default_rate() {
        let mut rng = StdRng::seed_from_u64(0);
        let out = (JUKES_CANTOR.generate)(&[None], &mut rng).unwrap();
        match out {
            ValueData::RealMatrix(q) => {
                assert_eq!(q.len(), 4);
                for (i, row) in q.iter().enumerate() {
                    let total: f64 = row.iter().sum();
                    approx::assert_abs_diff_eq!(total, 0.0, epsilon = 1e-12);
                    approx::assert_abs_diff_eq!(row[i], -1.0, epsilon = 1e-12);
                }
            }
            other => panic!("expected a matrix, found {:?}", other),
        }
    }

    #[test]
    fn test_bernoulli_extremes() {
        let mut rng = StdRng::seed_from_u64(0);
        let always = (BERNOULLI.generate)(&[input(ValueData::Real(1.0))], &mut rng).unwrap();
        assert_eq!(always, ValueData::Boolean(true));
        let never = (BERNOULLI.generate)(&[input(ValueData::Real(0.0))], &mut rng).unwrap();
        assert_eq!(never, ValueData::Boolean(false));
    }

    #[test]
    fn test_uniform_range_rejects_inverted_bounds() {
        let mut rng = StdRng::seed_from_u64(0);
        let err = (UNIFORM_RANGE.generate)(
            &[input(ValueData::Real(2.0)), input(ValueData::Real(1.0))],
            &mut rng,
        )
        .unwrap_err();
        assert!(matches!(err, EvalError::TypeMismatch { .. }));
    }

    #[test]
    fn test_sum_preserves_integer_type() {
        let mut rng = StdRng::seed_from_u64(0);
        let out = (SUM.generate)(&[input(ValueData::IntegerArray(vec![1, 2, 3]))], &mut rng)
            .unwrap();
        assert_eq!(out, ValueData::Integer(6));
    }
}
