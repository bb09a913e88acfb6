/// Literal and list parsing shared by both statement front-ends.
use crate::error::ParseError;
use crate::value::{ValueData, ValueNode, ValueRef};

/// Parse a literal into a constant value bound to `id`.
pub fn parse_literal(id: Option<&str>, text: &str) -> Result<ValueRef, ParseError> {
    parse_literal_data(text).map(|data| ValueNode::constant(id, data))
}

/// Recognizes, in order: a double-quoted string, a bracketed list, an
/// integer, a real, and an exact `true`/`false`. Anything else is a
/// literal parse failure.
pub fn parse_literal_data(text: &str) -> Result<ValueData, ParseError> {
    let text = text.trim();
    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        return Ok(ValueData::Str(text[1..text.len() - 1].to_string()));
    }
    if text.starts_with('[') && text.ends_with(']') {
        return parse_list(text);
    }
    if let Ok(i) = text.parse::<i64>() {
        return Ok(ValueData::Integer(i));
    }
    if let Ok(x) = text.parse::<f64>() {
        return Ok(ValueData::Real(x));
    }
    match text {
        "true" => Ok(ValueData::Boolean(true)),
        "false" => Ok(ValueData::Boolean(false)),
        _ => Err(ParseError::LiteralParse {
            text: text.to_string(),
        }),
    }
}

/// Parse a 1-D or 2-D bracketed list. The element type is decided from
/// the first element of the first row and applied to the whole array.
pub fn parse_list(text: &str) -> Result<ValueData, ParseError> {
    let text = text.trim();
    let inner = text
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .ok_or_else(|| ParseError::LiteralParse {
            text: text.to_string(),
        })?
        .trim();
    if inner.starts_with('[') {
        let rows = split_top_level(inner)?;
        let mut parsed: Vec<Vec<&str>> = Vec::with_capacity(rows.len());
        for row in rows {
            let row = row.trim();
            let row_inner = row
                .strip_prefix('[')
                .and_then(|t| t.strip_suffix(']'))
                .ok_or_else(|| ParseError::LiteralParse {
                    text: row.to_string(),
                })?;
            parsed.push(split_top_level(row_inner)?);
        }
        let first = parsed
            .first()
            .and_then(|row| row.first())
            .ok_or_else(|| ParseError::LiteralParse {
                text: text.to_string(),
            })?;
        if first.trim().parse::<i64>().is_ok() {
            let mut matrix = Vec::with_capacity(parsed.len());
            for row in &parsed {
                matrix.push(parse_elements(row, |t| t.parse::<i64>().ok())?);
            }
            Ok(ValueData::IntegerMatrix(matrix))
        } else {
            let mut matrix = Vec::with_capacity(parsed.len());
            for row in &parsed {
                matrix.push(parse_elements(row, |t| t.parse::<f64>().ok())?);
            }
            Ok(ValueData::RealMatrix(matrix))
        }
    } else {
        let elements = split_top_level(inner)?;
        let first = elements.first().ok_or_else(|| ParseError::LiteralParse {
            text: text.to_string(),
        })?;
        let first = first.trim();
        if first.parse::<i64>().is_ok() {
            Ok(ValueData::IntegerArray(parse_elements(&elements, |t| {
                t.parse::<i64>().ok()
            })?))
        } else if first == "true" || first == "false" {
            Ok(ValueData::BooleanArray(parse_elements(&elements, |t| {
                match t {
                    "true" => Some(true),
                    "false" => Some(false),
                    _ => None,
                }
            })?))
        } else {
            Ok(ValueData::RealArray(parse_elements(&elements, |t| {
                t.parse::<f64>().ok()
            })?))
        }
    }
}

fn parse_elements<T>(
    elements: &[&str],
    parse: fn(&str) -> Option<T>,
) -> Result<Vec<T>, ParseError> {
    elements
        .iter()
        .map(|e| {
            let e = e.trim();
            parse(e).ok_or_else(|| ParseError::LiteralParse {
                text: e.to_string(),
            })
        })
        .collect()
}

/// Split on top-level commas only: commas nested inside `(`, `[`, or a
/// quoted string do not separate. An empty input yields no pieces.
pub fn split_top_level(text: &str) -> Result<Vec<&str>, ParseError> {
    let mut pieces = Vec::new();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '"' => in_string = !in_string,
            '(' | '[' if !in_string => depth += 1,
            ')' | ']' if !in_string => depth -= 1,
            ',' if !in_string && depth == 0 => {
                pieces.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 || in_string {
        return Err(ParseError::UnbalancedArguments {
            text: text.to_string(),
        });
    }
    if start < text.len() || !pieces.is_empty() {
        pieces.push(&text[start..]);
    }
    Ok(pieces)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_literals() {
        assert_eq!(parse_literal_data("42").unwrap(), ValueData::Integer(42));
        assert_eq!(parse_literal_data("-7").unwrap(), ValueData::Integer(-7));
        assert_eq!(parse_literal_data("0.5").unwrap(), ValueData::Real(0.5));
        assert_eq!(parse_literal_data("1e-3").unwrap(), ValueData::Real(1e-3));
        assert_eq!(
            parse_literal_data("true").unwrap(),
            ValueData::Boolean(true)
        );
        assert_eq!(
            parse_literal_data("\"a, b\"").unwrap(),
            ValueData::Str("a, b".to_string())
        );
    }

    #[test]
    fn test_boolean_is_exact_match_only() {
        assert!(parse_literal_data("True").is_err());
        assert!(parse_literal_data("TRUE").is_err());
        assert!(parse_literal_data("truex").is_err());
    }

    #[test]
    fn test_lists() {
        assert_eq!(
            parse_literal_data("[1, 2, 3]").unwrap(),
            ValueData::IntegerArray(vec![1, 2, 3])
        );
        // first element decides the type for the whole array
        assert_eq!(
            parse_literal_data("[0.5, 1, 2]").unwrap(),
            ValueData::RealArray(vec![0.5, 1.0, 2.0])
        );
        assert_eq!(
            parse_literal_data("[[1,2],[3,4]]").unwrap(),
            ValueData::IntegerMatrix(vec![vec![1, 2], vec![3, 4]])
        );
        assert_eq!(
            parse_literal_data("[true, false]").unwrap(),
            ValueData::BooleanArray(vec![true, false])
        );
    }

    #[test]
    fn test_split_respects_nesting() {
        let pieces = split_top_level("a=[1,2,3], b=\"x,y\", c=g(1,2)").unwrap();
        assert_eq!(pieces, vec!["a=[1,2,3]", " b=\"x,y\"", " c=g(1,2)"]);
    }

    #[test]
    fn test_split_unbalanced() {
        assert!(split_top_level("f(1, 2").is_err());
        assert!(split_top_level("\"open").is_err());
    }

    #[test]
    fn test_literal_value_is_constant() {
        let v = parse_literal(Some("n"), "5").unwrap();
        assert!(v.borrow().is_constant());
        assert!(v.borrow().generator().is_none());
        assert_eq!(v.borrow().id(), Some("n"));
    }
}
