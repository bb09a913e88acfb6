/// Commands: imperative statements operating on the dictionary rather
/// than the graph, e.g. `remove(x);`.
use crate::error::EvalError;
use crate::value::{Dictionary, ValueRef};

pub trait Command {
    fn name(&self) -> &'static str;
    fn execute(
        &self,
        args: &[(String, ValueRef)],
        dictionary: &mut Dictionary,
    ) -> Result<(), EvalError>;
}

/// Drop the bindings for every named argument value. Unlike redeclaration
/// shadowing this really unbinds; the value stays alive only through any
/// generators that captured it.
pub struct RemoveCommand;

impl Command for RemoveCommand {
    fn name(&self) -> &'static str {
        "remove"
    }

    fn execute(
        &self,
        args: &[(String, ValueRef)],
        dictionary: &mut Dictionary,
    ) -> Result<(), EvalError> {
        if args.is_empty() {
            return Err(EvalError::Command {
                message: "remove expects at least one value".to_string(),
            });
        }
        for (_, value) in args {
            let id = value.borrow().id().map(str::to_string);
            match id {
                Some(id) => {
                    dictionary.remove(&id);
                }
                None => {
                    return Err(EvalError::Command {
                        message: "remove expects a named value".to_string(),
                    })
                }
            }
        }
        Ok(())
    }
}

/// Drop every binding.
pub struct ClearCommand;

impl Command for ClearCommand {
    fn name(&self) -> &'static str {
        "clear"
    }

    fn execute(
        &self,
        args: &[(String, ValueRef)],
        dictionary: &mut Dictionary,
    ) -> Result<(), EvalError> {
        if !args.is_empty() {
            return Err(EvalError::Command {
                message: "clear takes no arguments".to_string(),
            });
        }
        dictionary.clear();
        Ok(())
    }
}

pub fn standard_commands() -> Vec<Box<dyn Command>> {
    vec![Box::new(RemoveCommand), Box::new(ClearCommand)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{ValueData, ValueNode};

    #[test]
    fn test_remove_unbinds() {
        let mut dictionary = Dictionary::new();
        let x = ValueNode::constant(Some("x"), ValueData::Integer(1));
        dictionary.insert("x".to_string(), x.clone());

        RemoveCommand
            .execute(&[("0".to_string(), x)], &mut dictionary)
            .unwrap();
        assert!(dictionary.is_empty());
    }

    #[test]
    fn test_remove_rejects_anonymous() {
        let mut dictionary = Dictionary::new();
        let v = ValueNode::constant(None, ValueData::Integer(1));
        let err = RemoveCommand
            .execute(&[("0".to_string(), v)], &mut dictionary)
            .unwrap_err();
        assert!(matches!(err, EvalError::Command { .. }));
    }

    #[test]
    fn test_clear() {
        let mut dictionary = Dictionary::new();
        dictionary.insert(
            "x".to_string(),
            ValueNode::constant(Some("x"), ValueData::Integer(1)),
        );
        ClearCommand.execute(&[], &mut dictionary).unwrap();
        assert!(dictionary.is_empty());
    }
}
