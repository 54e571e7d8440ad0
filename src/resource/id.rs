//! Composite identifiers: `<scope>-<name>`
//!
//! The scope (a project ID or path) is everything before the first `-`;
//! the name is the rest and may itself contain dashes. Dashes and percent
//! signs inside the scope are percent-escaped (`-` as `%2D`, `%` as `%25`),
//! so `my-group/my-project` + `main` encodes as `my%2Dgroup/my%2Dproject-main`.

use gitlab_client::Error;

const SEPARATOR: char = '-';

fn escape_scope(scope: &str) -> String {
    let mut out = String::with_capacity(scope.len());
    for c in scope.chars() {
        match c {
            '%' => out.push_str("%25"),
            SEPARATOR => out.push_str("%2D"),
            c => out.push(c),
        }
    }
    out
}

/// Reverse [`escape_scope`]; other `%xx` sequences are kept verbatim
fn unescape_scope(scope: &str) -> String {
    let mut out = String::with_capacity(scope.len());
    let mut rest = scope;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        let code = tail.get(1..3).map(str::to_ascii_uppercase);
        match code.as_deref() {
            Some("2D") => out.push(SEPARATOR),
            Some("25") => out.push('%'),
            _ => {
                out.push('%');
                rest = &tail[1..];
                continue;
            }
        }
        rest = &tail[3..];
    }
    out.push_str(rest);
    out
}

/// Build the identifier for `name` inside `scope`
pub fn encode(scope: &str, name: &str) -> Result<String, Error> {
    if scope.is_empty() || name.is_empty() {
        return Err(Error::malformed_id(
            format!("{scope}{SEPARATOR}{name}"),
            "scope and name must both be non-empty",
        ));
    }
    Ok(format!("{}{SEPARATOR}{name}", escape_scope(scope)))
}

/// Split an identifier into `(scope, name)`
///
/// Fails with [`Error::MalformedId`] before any remote call is made.
pub fn decode(id: &str) -> Result<(String, String), Error> {
    match id.split_once(SEPARATOR) {
        Some((scope, name)) if !scope.is_empty() && !name.is_empty() => {
            Ok((unescape_scope(scope), name.to_string()))
        }
        Some(_) => Err(Error::malformed_id(
            id,
            "scope and name must both be non-empty",
        )),
        None => Err(Error::malformed_id(
            id,
            format!("expected <project>{SEPARATOR}<name>"),
        )),
    }
}
