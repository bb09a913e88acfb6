/// Overload resolution: picking one implementation signature for a bag of
/// named arguments.
use crate::error::EvalError;
use crate::generator::{GeneratorBody, GeneratorNode, GeneratorRef, GeneratorSpec};
use crate::value::ValueRef;

/// How to treat an argument set that matches more than one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Use the first matching candidate in registration order and carry a
    /// warning on the outcome.
    #[default]
    FirstWins,
    /// Refuse to pick.
    Strict,
}

/// A resolved call: the chosen signature plus inputs in declared order.
/// Unsupplied optional parameters stay `None`.
#[derive(Debug)]
pub struct ResolvedCall {
    pub spec: &'static GeneratorSpec,
    pub inputs: Vec<Option<ValueRef>>,
    pub warning: Option<String>,
}

/// Select the candidate whose required/optional parameter partition is
/// consistent with `args`: every required name supplied, no unrecognized
/// extras. Positional arguments arrive under their stringified 0-based
/// index and are renamed to the candidate's parameter at that position
/// before set-matching.
pub fn resolve(
    name: &str,
    candidates: &[&'static GeneratorSpec],
    args: &[(String, ValueRef)],
    mode: MatchMode,
) -> Result<ResolvedCall, EvalError> {
    let mut matches: Vec<(&'static GeneratorSpec, Vec<(String, ValueRef)>)> = Vec::new();
    for candidate in candidates {
        if let Some(named) = normalize_positions(candidate, args) {
            if signature_matches(candidate, &named) {
                matches.push((candidate, named));
            }
        }
    }
    let count = matches.len();
    if count == 0 {
        return Err(EvalError::NoMatchingSignature {
            name: name.to_string(),
            arguments: args.iter().map(|(n, _)| n.clone()).collect(),
        });
    }
    if count > 1 && mode == MatchMode::Strict {
        return Err(EvalError::AmbiguousMatch {
            name: name.to_string(),
            count,
        });
    }
    let (spec, named) = matches.swap_remove(0);
    let warning = (count > 1).then(|| {
        format!(
            "{} argument set matches {} signatures, using the first registered",
            name, count
        )
    });

    let mut inputs = Vec::with_capacity(spec.params.len());
    for param in spec.params {
        let supplied = named
            .iter()
            .find(|(n, _)| n == param.name)
            .map(|(_, v)| v.clone());
        if supplied.is_none() && !param.optional {
            // unreachable when signature_matches held
            return Err(EvalError::MissingRequiredArgument {
                name: name.to_string(),
                parameter: param.name.to_string(),
            });
        }
        inputs.push(supplied);
    }
    Ok(ResolvedCall {
        spec,
        inputs,
        warning,
    })
}

/// Resolve and instantiate in one step: pick a signature, build the
/// generator node, and record the node as a consumer on every resolved
/// input. Both statement front-ends funnel every call through here.
pub fn resolve_call(
    name: &str,
    candidates: &[&'static GeneratorSpec],
    args: &[(String, ValueRef)],
    mode: MatchMode,
) -> Result<(GeneratorRef, Option<String>), EvalError> {
    let resolved = resolve(name, candidates, args, mode)?;
    let node = GeneratorNode::new(
        resolved.spec.name,
        resolved.spec.kind,
        GeneratorBody::Builtin {
            spec: resolved.spec,
            inputs: resolved.inputs.clone(),
        },
    );
    for input in resolved.inputs.iter().flatten() {
        input.borrow_mut().add_output(&node);
    }
    Ok((node, resolved.warning))
}

/// Rewrite stringified-index argument names to the candidate's parameter
/// name at that position. Out-of-range positions disqualify the candidate.
fn normalize_positions(
    candidate: &GeneratorSpec,
    args: &[(String, ValueRef)],
) -> Option<Vec<(String, ValueRef)>> {
    let mut named = Vec::with_capacity(args.len());
    for (key, value) in args {
        let key = match key.parse::<usize>() {
            Ok(index) => candidate.params.get(index)?.name.to_string(),
            Err(_) => key.clone(),
        };
        named.push((key, value.clone()));
    }
    Some(named)
}

fn signature_matches(candidate: &GeneratorSpec, named: &[(String, ValueRef)]) -> bool {
    let required_present = candidate
        .params
        .iter()
        .filter(|p| !p.optional)
        .all(|p| named.iter().any(|(n, _)| n == p.name));
    let no_extras = named
        .iter()
        .all(|(n, _)| candidate.params.iter().any(|p| p.name == n));
    required_present && no_extras
}
