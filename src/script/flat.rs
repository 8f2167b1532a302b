//! The classic flat dialect: one `CONFIG_<NAME>=<value>` statement per line.
//!
//! This is also the parser for kernel `.config` files, since the syntax is
//! identical: comments and blank lines are ignored, except that the kernel's
//! `# CONFIG_<NAME> is not set` comment form counts as an assignment to `n`.
//! No conditionals, no loops.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::bridge::Bridge;
use crate::journal::Origin;
use crate::validate::{self, Reported, Request};

/// One parsed assignment line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub symbol: String,
    pub value: String,
    pub line: u32,
}

/// Parse flat-dialect source. Fails on the first malformed line.
pub fn parse(content: &str) -> Result<Vec<Statement>> {
    let mut statements = Vec::new();
    for (index, raw) in content.lines().enumerate() {
        let line = index as u32 + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(comment) = trimmed.strip_prefix('#') {
            // `# CONFIG_FOO is not set` assigns n; everything else is noise.
            let comment = comment.trim();
            if let Some(rest) = comment.strip_suffix(" is not set") {
                if let Some(name) = rest.strip_prefix("CONFIG_") {
                    statements.push(Statement {
                        symbol: name.to_string(),
                        value: "n".to_string(),
                        line,
                    });
                }
            }
            continue;
        }

        let Some((key, value)) = trimmed.split_once('=') else {
            bail!("line {line}: expected CONFIG_<NAME>=<value>, got {trimmed:?}");
        };
        let symbol = key.trim().trim_start_matches("CONFIG_");
        if symbol.is_empty() {
            bail!("line {line}: missing symbol name");
        }
        statements.push(Statement {
            symbol: symbol.to_string(),
            value: unquote(value.trim()),
            line,
        });
    }
    Ok(statements)
}

/// Strip surrounding double quotes and resolve the two escapes `.config`
/// files use inside them.
fn unquote(value: &str) -> String {
    let Some(inner) = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
    else {
        return value.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Parse a config file into name → value, for comparisons. Later lines win,
/// like the kernel's own loader.
pub fn parse_values(content: &str) -> Result<BTreeMap<String, String>> {
    Ok(parse(content)?
        .into_iter()
        .map(|statement| (statement.symbol, statement.value))
        .collect())
}

/// Execute a flat program from a file.
pub fn run(bridge: &Bridge, path: &Path) -> Result<()> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("could not read {}", path.display()))?;
    apply_content(bridge, &path.display().to_string(), &content)
}

/// Execute already-loaded flat statements, attributing them to `file`.
pub fn apply_content(bridge: &Bridge, file: &str, content: &str) -> Result<()> {
    for statement in parse(content)? {
        let origin = Origin::new(file, statement.line);
        if let Err(error) = validate::assign(
            bridge,
            &statement.symbol,
            Request::Auto(statement.value),
            origin.clone(),
        ) {
            validate::report(&error, Some(&origin));
            return Err(Reported(error.kind()).into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_assignments_and_comments() {
        let statements = parse(
            "# a comment\n\
             CONFIG_NET=y\n\
             \n\
             # CONFIG_WLAN is not set\n\
             CONFIG_CMDLINE=\"root=/dev/sda1 \\\"quoted\\\"\"\n",
        )
        .unwrap();

        assert_eq!(statements.len(), 3);
        assert_eq!(statements[0], Statement {
            symbol: "NET".into(),
            value: "y".into(),
            line: 2,
        });
        assert_eq!(statements[1], Statement {
            symbol: "WLAN".into(),
            value: "n".into(),
            line: 4,
        });
        assert_eq!(statements[2].symbol, "CMDLINE");
        assert_eq!(statements[2].value, "root=/dev/sda1 \"quoted\"");
    }

    #[test]
    fn parse_accepts_bare_names() {
        let statements = parse("NET=m\n").unwrap();
        assert_eq!(statements[0].symbol, "NET");
        assert_eq!(statements[0].value, "m");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse("CONFIG_NET\n").is_err());
        assert!(parse("=y\n").is_err());
    }

    #[test]
    fn parse_values_keeps_last_assignment() {
        let values = parse_values("CONFIG_NET=m\nCONFIG_NET=y\n").unwrap();
        assert_eq!(values["NET"], "y");
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn unquote_passthrough_for_unquoted() {
        assert_eq!(unquote("0x1F"), "0x1F");
        assert_eq!(unquote("\"a b\""), "a b");
    }
}
