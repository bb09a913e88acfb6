/// The interpreter session and the line-oriented statement front-end.
///
/// One `Interpreter` owns all mutable state: the dictionary, the
/// registry, the command list and the RNG. Statements are classified by
/// structural cues on the raw text; every call resolution funnels through
/// `matcher::resolve_call` so both front-ends build identical graphs.
use crate::commands::{self, Command};
use crate::error::{EvalError, InterpreterError, ParseError};
use crate::eval;
use crate::generator::{self, GeneratorKind, GeneratorSpec};
use crate::literals;
use crate::matcher::{self, MatchMode};
use crate::registry::Registry;
use crate::value::{Dictionary, ValueNode, ValueRef};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::rc::Rc;

/// A change notification produced by one statement. Returned to the
/// caller instead of being pushed through registered listeners, so the
/// caller consumes notifications synchronously in statement order.
#[derive(Debug, Clone)]
pub enum ModelEvent {
    /// The graph or dictionary changed.
    GraphChanged,
    /// A bare-identifier statement selected an existing value.
    ValueSelected(ValueRef),
}

/// Everything a successful statement (or batch) reports back.
#[derive(Debug, Clone, Default)]
pub struct StatementOutcome {
    pub events: Vec<ModelEvent>,
    pub warnings: Vec<String>,
}

impl StatementOutcome {
    pub fn graph_changed(&self) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, ModelEvent::GraphChanged))
    }

    pub fn selected(&self) -> Option<&ValueRef> {
        self.events.iter().find_map(|e| match e {
            ModelEvent::ValueSelected(v) => Some(v),
            _ => None,
        })
    }

    fn merge(&mut self, other: StatementOutcome) {
        self.events.extend(other.events);
        self.warnings.extend(other.warnings);
    }
}

pub struct Interpreter {
    dictionary: Dictionary,
    registry: Registry,
    commands: Vec<Box<dyn Command>>,
    rng: StdRng,
    match_mode: MatchMode,
    history: Vec<String>,
}

impl Interpreter {
    pub fn new() -> Interpreter {
        Interpreter::from_rng(StdRng::from_entropy())
    }

    /// A session whose sampling is reproducible from `seed`.
    pub fn with_seed(seed: u64) -> Interpreter {
        Interpreter::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Interpreter {
        Interpreter {
            dictionary: Dictionary::new(),
            registry: Registry::standard(),
            commands: commands::standard_commands(),
            rng,
            match_mode: MatchMode::default(),
            history: Vec::new(),
        }
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    pub fn get(&self, id: &str) -> Option<ValueRef> {
        self.dictionary.get(id).cloned()
    }

    /// Every dictionary value that is a sampled random variable.
    pub fn random_variables(&self) -> Vec<ValueRef> {
        self.dictionary
            .values()
            .filter(|v| {
                let v = v.borrow();
                v.is_random()
                    && v.generator()
                        .map_or(false, |g| g.borrow().kind == GeneratorKind::Stochastic)
            })
            .cloned()
            .collect()
    }

    /// Successfully interpreted statements, in order.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn clear(&mut self) {
        self.dictionary.clear();
        self.history.clear();
    }

    pub fn set_match_mode(&mut self, mode: MatchMode) {
        self.match_mode = mode;
    }

    pub fn match_mode(&self) -> MatchMode {
        self.match_mode
    }

    pub fn register_generator(&mut self, spec: &'static GeneratorSpec) {
        self.registry.register(spec);
    }

    pub fn register_command(&mut self, command: Box<dyn Command>) {
        self.commands.push(command);
    }

    /// Generator, function, command and parameter names, for editor
    /// integration.
    pub fn keywords(&self) -> Vec<&'static str> {
        let mut keywords = self.registry.keywords();
        keywords.extend(self.commands.iter().map(|c| c.name()));
        keywords.sort_unstable();
        keywords.dedup();
        keywords
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Interpret a whole source text through the line front-end. Stops at
    /// the first failing statement; the dictionary keeps the state
    /// committed by the statements before it.
    pub fn parse(&mut self, source: &str) -> Result<StatementOutcome, InterpreterError> {
        let mut outcome = StatementOutcome::default();
        for (line, statement) in split_statements(source)? {
            outcome.merge(self.interpret_statement(&statement, line)?);
        }
        Ok(outcome)
    }

    /// Interpret one statement; a trailing `;` is optional here.
    pub fn parse_statement(&mut self, text: &str) -> Result<StatementOutcome, InterpreterError> {
        let text = text.trim().trim_end_matches(';');
        self.interpret_statement(text, 1)
    }

    /// Interpret a multi-line source, continuing past failed statements.
    /// The whole text is split into statements first, so a statement may
    /// span lines; failed statements leave no trace in the dictionary and
    /// their errors come back alongside the combined outcome, keyed by
    /// the line the statement started on.
    pub fn parse_lines<'a>(
        &mut self,
        lines: impl IntoIterator<Item = &'a str>,
    ) -> (StatementOutcome, Vec<(usize, InterpreterError)>) {
        let source: String = lines.into_iter().collect::<Vec<_>>().join("\n");
        let mut outcome = StatementOutcome::default();
        let mut errors = Vec::new();
        match split_statements(&source) {
            Ok(statements) => {
                for (line, statement) in statements {
                    match self.interpret_statement(&statement, line) {
                        Ok(o) => outcome.merge(o),
                        Err(e) => errors.push((line, e)),
                    }
                }
            }
            Err(e) => errors.push((1, e.into())),
        }
        (outcome, errors)
    }

    /// Interpret a source text through the grammar front-end. Both
    /// front-ends produce graph-equivalent results for the statement
    /// forms they share.
    pub fn evaluate(&mut self, source: &str) -> Result<StatementOutcome, InterpreterError> {
        eval::evaluate_source(self, source)
    }

    fn interpret_statement(
        &mut self,
        text: &str,
        line: usize,
    ) -> Result<StatementOutcome, InterpreterError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(StatementOutcome::default());
        }
        let mut outcome = StatementOutcome::default();

        if let Some(pos) = find_top_level(text, '~') {
            self.stochastic_declaration(text, pos, line, &mut outcome)?;
        } else if let Some(pos) = find_top_level(text, '=') {
            self.assignment(text, pos, line, &mut outcome)?;
        } else if let Some(index) = self.match_command(text) {
            self.command_invocation(text, index, line, &mut outcome)?;
        } else if let Some(value) = self.dictionary.get(text) {
            outcome.events.push(ModelEvent::ValueSelected(value.clone()));
        } else {
            return Err(ParseError::Statement {
                line,
                text: text.to_string(),
            }
            .into());
        }
        self.history.push(text.to_string());
        Ok(outcome)
    }

    /// `id ~ Generator(...)`: resolve, sample, bind.
    fn stochastic_declaration(
        &mut self,
        text: &str,
        tilde: usize,
        line: usize,
        outcome: &mut StatementOutcome,
    ) -> Result<(), InterpreterError> {
        let id = identifier(&text[..tilde], line)?;
        let call = text[tilde + 1..].trim();
        let (name, args) = self.parse_call(call, line, outcome)?;
        let candidates = self.registry.lookup_distribution(&name)?;
        let (node, warning) = matcher::resolve_call(&name, candidates, &args, self.match_mode)?;
        outcome.warnings.extend(warning);
        let variable = generator::sample(&node, &id, &mut self.rng)?;
        self.bind(&id, variable);
        outcome.events.push(ModelEvent::GraphChanged);
        Ok(())
    }

    /// `id = ...`: a function call if the right-hand side is a registered
    /// function in call form, otherwise a literal.
    fn assignment(
        &mut self,
        text: &str,
        equals: usize,
        line: usize,
        outcome: &mut StatementOutcome,
    ) -> Result<(), InterpreterError> {
        let id = identifier(&text[..equals], line)?;
        let rhs = text[equals + 1..].trim();
        let value = if self.is_function_call(rhs) {
            let (name, args) = self.parse_call(rhs, line, outcome)?;
            let candidates = self.registry.lookup_function(&name)?;
            let (node, warning) = matcher::resolve_call(&name, candidates, &args, self.match_mode)?;
            outcome.warnings.extend(warning);
            generator::apply(&node, &mut self.rng)?
        } else {
            literals::parse_literal(None, rhs)?
        };
        self.bind(&id, value);
        outcome.events.push(ModelEvent::GraphChanged);
        Ok(())
    }

    fn command_invocation(
        &mut self,
        text: &str,
        index: usize,
        line: usize,
        outcome: &mut StatementOutcome,
    ) -> Result<(), InterpreterError> {
        let (_, args) = self.parse_call(text, line, outcome)?;
        self.commands[index].execute(&args, &mut self.dictionary)?;
        outcome.events.push(ModelEvent::GraphChanged);
        Ok(())
    }

    fn match_command(&self, text: &str) -> Option<usize> {
        self.commands.iter().position(|c| {
            text.strip_prefix(c.name())
                .map_or(false, |rest| rest.trim_start().starts_with('('))
        })
    }

    fn is_function_call(&self, text: &str) -> bool {
        match text.find('(') {
            Some(open) if text.ends_with(')') => self.registry.is_function(text[..open].trim()),
            _ => false,
        }
    }

    /// Split `name(arg, key=arg, ...)` into the name and resolved
    /// arguments. Positional arguments take their stringified 0-based
    /// position as the key.
    fn parse_call(
        &mut self,
        text: &str,
        line: usize,
        outcome: &mut StatementOutcome,
    ) -> Result<(String, Vec<(String, ValueRef)>), InterpreterError> {
        let open = text.find('(').ok_or_else(|| ParseError::Statement {
            line,
            text: text.to_string(),
        })?;
        if !text.ends_with(')') {
            return Err(ParseError::UnbalancedArguments {
                text: text.to_string(),
            }
            .into());
        }
        let name = text[..open].trim().to_string();
        let inner = &text[open + 1..text.len() - 1];
        let mut args = Vec::new();
        if !inner.trim().is_empty() {
            for (position, piece) in literals::split_top_level(inner)?.iter().enumerate() {
                let piece = piece.trim();
                let (key, expr) = match find_top_level(piece, '=') {
                    Some(eq) if is_identifier(piece[..eq].trim()) => {
                        (piece[..eq].trim().to_string(), piece[eq + 1..].trim())
                    }
                    _ => (position.to_string(), piece),
                };
                let value = self.resolve_expression(expr, line, outcome)?;
                args.push((key, value));
            }
        }
        Ok((name, args))
    }

    /// An argument expression is an existing identifier, a literal, or a
    /// nested function call.
    fn resolve_expression(
        &mut self,
        text: &str,
        line: usize,
        outcome: &mut StatementOutcome,
    ) -> Result<ValueRef, InterpreterError> {
        if let Some(value) = self.dictionary.get(text) {
            return Ok(value.clone());
        }
        if let Ok(data) = literals::parse_literal_data(text) {
            return Ok(ValueNode::constant(None, data));
        }
        if text.contains('(') && text.ends_with(')') {
            let (name, args) = self.parse_call(text, line, outcome)?;
            let candidates = self.registry.lookup_function(&name)?;
            let (node, warning) = matcher::resolve_call(&name, candidates, &args, self.match_mode)?;
            outcome.warnings.extend(warning);
            return Ok(generator::apply(&node, &mut self.rng)?);
        }
        Err(ParseError::Statement {
            line,
            text: text.to_string(),
        }
        .into())
    }

    /// Install `id -> value`. An existing binding is shadowed first: the
    /// old value keeps living under its renamed identifier so generators
    /// that captured it stay wired.
    pub(crate) fn bind(&mut self, id: &str, value: ValueRef) {
        if let Some(old) = self.dictionary.get(id).cloned() {
            if !Rc::ptr_eq(&old, &value) {
                old.borrow_mut().shadow();
                let shadow_id = old.borrow().id().map(str::to_string);
                if let Some(shadow_id) = shadow_id {
                    self.dictionary.insert(shadow_id, old);
                }
            }
        }
        value.borrow_mut().set_id(id);
        self.dictionary.insert(id.to_string(), value);
    }
}

impl Default for Interpreter {
    fn default() -> Interpreter {
        Interpreter::new()
    }
}

fn identifier(text: &str, line: usize) -> Result<String, ParseError> {
    let text = text.trim();
    if is_identifier(text) {
        Ok(text.to_string())
    } else {
        Err(ParseError::Statement {
            line,
            text: text.to_string(),
        })
    }
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '.')
}

/// Position of the first `target` not nested in parens, brackets or a
/// quoted string.
fn find_top_level(text: &str, target: char) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_string = false;
    for (i, c) in text.char_indices() {
        match c {
            '"' => in_string = !in_string,
            '(' | '[' if !in_string => depth += 1,
            ')' | ']' if !in_string => depth -= 1,
            c if c == target && !in_string && depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

/// Split a source text into `(line, statement)` pairs on top-level `;`,
/// stripping `//` comments. A trailing statement without `;` counts.
fn split_statements(source: &str) -> Result<Vec<(usize, String)>, ParseError> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut statement_line = 1;
    let mut line = 1;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\n' => {
                line += 1;
                current.push(' ');
            }
            '"' => {
                in_string = !in_string;
                current.push(c);
            }
            '/' if !in_string && chars.peek() == Some(&'/') => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        line += 1;
                        current.push(' ');
                        break;
                    }
                }
            }
            '(' | '[' if !in_string => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' if !in_string => {
                depth -= 1;
                current.push(c);
            }
            ';' if !in_string && depth == 0 => {
                if !current.trim().is_empty() {
                    statements.push((statement_line, current.trim().to_string()));
                }
                current.clear();
                statement_line = line;
            }
            _ => {
                if current.trim().is_empty() && !c.is_whitespace() {
                    statement_line = line;
                }
                current.push(c);
            }
        }
    }
    if in_string || depth != 0 {
        return Err(ParseError::UnbalancedArguments {
            text: current.trim().to_string(),
        });
    }
    if !current.trim().is_empty() {
        statements.push((statement_line, current.trim().to_string()));
    }
    Ok(statements)
}
