use sqlparser::tokenizer::Token;

use crate::core::{Result, StoreError, Value};

/// Rewrites every bare `?` into an explicit `?N`, numbered by textual position.
///
/// Numbering follows SQLite: a bare `?` takes the number after the largest
/// one assigned so far, and `?N` binds the N-th parameter explicitly. Returns
/// the rewritten tokens and the highest parameter number referenced.
pub(crate) fn number_placeholders(tokens: Vec<Token>) -> Result<(Vec<Token>, usize)> {
    let mut highest = 0usize;

    let tokens = tokens
        .into_iter()
        .map(|token| match token {
            Token::Placeholder(raw) if raw == "?" => {
                highest += 1;
                Ok(Token::Placeholder(format!("?{}", highest)))
            }
            Token::Placeholder(raw) => {
                let index = explicit_index(&raw)?;
                highest = highest.max(index);
                Ok(Token::Placeholder(raw))
            }
            other => Ok(other),
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((tokens, highest))
}

fn explicit_index(raw: &str) -> Result<usize> {
    raw.strip_prefix('?')
        .and_then(|digits| digits.parse::<usize>().ok())
        .filter(|index| *index >= 1)
        .ok_or_else(|| {
            StoreError::ParseError(format!(
                "Unsupported placeholder '{}': use '?' or '?N'",
                raw
            ))
        })
}

/// Positional parameters, addressed by the numbers assigned in [`number_placeholders`].
pub(crate) struct Params<'a> {
    values: &'a [Value],
}

impl<'a> Params<'a> {
    pub(crate) fn new(values: &'a [Value]) -> Self {
        Self { values }
    }

    pub(crate) fn resolve(&self, raw: &str) -> Result<Value> {
        let index = explicit_index(raw)?;
        self.values.get(index - 1).cloned().ok_or_else(|| {
            StoreError::ParameterMismatch(format!(
                "placeholder {} has no value ({} supplied)",
                raw,
                self.values.len()
            ))
        })
    }
}
