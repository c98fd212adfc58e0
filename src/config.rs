//! `KEY VALUE` configuration scanning.
//!
//! Config files are UTF-8 text, one `KEY VALUE...` pair per line. Keys are
//! case-insensitive; `#` starts a comment; blank lines are skipped. The
//! scanner only tokenizes — each consumer matches the keys it knows and
//! warns on the rest.

use crate::error::AtollError;

/// One scanned line: upper-cased key plus its value tokens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pair {
    pub key: String,
    pub values: Vec<String>,
}

/// Scan config text into key/value pairs.
pub fn scan(text: &str) -> Vec<Pair> {
    let mut pairs = Vec::new();
    for line in text.lines() {
        let line = match line.find('#') {
            Some(pos) => &line[..pos],
            None => line,
        };
        let mut tokens = line.split_whitespace();
        let Some(key) = tokens.next() else { continue };
        pairs.push(Pair {
            key: key.to_uppercase(),
            values: tokens.map(|t| t.to_string()).collect(),
        });
    }
    pairs
}

/// Parse the sole value of a pair as an integer.
pub fn int_value(pair: &Pair) -> Result<i64, AtollError> {
    single(pair)?.parse().map_err(|_| AtollError::Parse {
        field: pair.key.clone(),
        value: pair.values.join(" "),
    })
}

/// Parse the sole value of a pair as a float.
pub fn float_value(pair: &Pair) -> Result<f64, AtollError> {
    single(pair)?.parse().map_err(|_| AtollError::Parse {
        field: pair.key.clone(),
        value: pair.values.join(" "),
    })
}

fn single(pair: &Pair) -> Result<&str, AtollError> {
    match pair.values.as_slice() {
        [v] => Ok(v),
        _ => Err(AtollError::Parse {
            field: pair.key.clone(),
            value: pair.values.join(" "),
        }),
    }
}
