//! Normalization of raw shader lines into logical lines.
//!
//! A logical line is either a whole preprocessor directive, a single `{` or `}`, or a
//! statement fragment ending at a top-level `;` or at the end of its physical line.
//! Comments are removed and backslash continuations joined.

use std::sync::OnceLock;

use regex::Regex;

use crate::ParseError;

/// The normalized lines of one file.
#[derive(Debug, Default, Clone)]
pub struct NormalizedFile {
    /// The logical lines.
    pub lines: Vec<String>,
    /// Property names referenced by `#ifex` conditions in this file.
    pub ifex_parameters: Vec<String>,
}

fn ifex_term_regex() -> &'static Regex {
    static IFEX_TERM_REGEX: OnceLock<Regex> = OnceLock::new();
    IFEX_TERM_REGEX.get_or_init(|| {
        Regex::new(r"([A-Za-z_][A-Za-z0-9_]*)\s*(?:==|!=|<=|>=|<|>)").expect("Invalid ifex regex")
    })
}

/// Extract the property names referenced by an `#ifex` condition.
pub fn ifex_condition_parameters(condition: &str) -> impl Iterator<Item = &str> {
    ifex_term_regex()
        .captures_iter(condition)
        .filter_map(|captures| captures.get(1))
        .map(|name| name.as_str())
}

/// Normalize the raw lines of `file`.
pub fn normalize_lines(
    file: &str,
    raw_lines: impl IntoIterator<Item = impl AsRef<str>>,
) -> Result<NormalizedFile, ParseError> {
    let mut normalized = NormalizedFile::default();
    let mut in_block_comment = false;

    for (index, physical) in join_continuations(raw_lines).into_iter().enumerate() {
        let line = match in_block_comment {
            true => physical.as_str(),
            false => physical.trim_start(),
        };

        let promoted;
        let line = if !in_block_comment && line.starts_with("//ifex") {
            promoted = format!("#ifex{}", &line["//ifex".len()..]);
            promoted.as_str()
        } else if !in_block_comment && line.starts_with("//endex") {
            "#endex"
        } else {
            line
        };

        let stripped = strip_comments(line, &mut in_block_comment).ok_or_else(|| {
            ParseError::UnterminatedString {
                file: file.to_string(),
                line: index + 1,
            }
        })?;

        let stripped = stripped.trim();
        if stripped.is_empty() {
            continue;
        }

        if stripped.starts_with('#') {
            if let Some(condition) = stripped.strip_prefix("#ifex") {
                normalized.ifex_parameters.extend(
                    ifex_condition_parameters(condition).map(String::from),
                );
            }
            normalized.lines.push(stripped.to_string());
            continue;
        }

        split_statements(stripped, &mut normalized.lines);
    }

    if in_block_comment {
        return Err(ParseError::UnterminatedComment {
            file: file.to_string(),
        });
    }

    Ok(normalized)
}

/// Join lines ending with a backslash to their successor.
fn join_continuations(raw_lines: impl IntoIterator<Item = impl AsRef<str>>) -> Vec<String> {
    let mut lines = Vec::new();
    let mut pending = String::new();

    for raw in raw_lines {
        let raw = raw.as_ref().trim_end_matches(['\r', '\n']);
        match raw.trim_end().strip_suffix('\\') {
            Some(head) => pending.push_str(head),
            None => {
                pending.push_str(raw);
                lines.push(std::mem::take(&mut pending));
            }
        }
    }

    if !pending.is_empty() {
        lines.push(pending);
    }

    lines
}

/// Remove `//` and `/* */` comments from one physical line.
///
/// Returns [`None`] if a string literal is not closed on this line.
fn strip_comments(line: &str, in_block_comment: &mut bool) -> Option<String> {
    let mut output = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if *in_block_comment {
            if c == '*' && chars.peek() == Some(&'/') {
                chars.next();
                *in_block_comment = false;
                output.push(' ');
            }
            continue;
        }

        if in_string {
            output.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        output.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match (c, chars.peek()) {
            ('/', Some('/')) => break,
            ('/', Some('*')) => {
                chars.next();
                *in_block_comment = true;
            }
            ('"', _) => {
                in_string = true;
                output.push(c);
            }
            _ => output.push(c),
        }
    }

    match in_string {
        true => None,
        false => Some(output),
    }
}

/// Split a comment-free line at top-level `;`, `{` and `}`.
fn split_statements(line: &str, output: &mut Vec<String>) {
    let mut current = String::new();
    let mut paren_depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    fn flush(current: &mut String, output: &mut Vec<String>) {
        let trimmed = current.trim();
        if !trimmed.is_empty() {
            output.push(trimmed.to_string());
        }
        current.clear();
    }

    for c in line.chars() {
        if in_string {
            current.push(c);
            match (escaped, c) {
                (true, _) => escaped = false,
                (false, '\\') => escaped = true,
                (false, '"') => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                current.push(c);
            }
            '(' => {
                paren_depth += 1;
                current.push(c);
            }
            ')' => {
                paren_depth -= 1;
                current.push(c);
            }
            ';' if paren_depth <= 0 => {
                if current.trim().is_empty() && output.last().is_some_and(|last| last == "}") {
                    if let Some(last) = output.last_mut() {
                        last.push(';');
                    }
                    current.clear();
                    continue;
                }
                current.push(';');
                flush(&mut current, output);
            }
            '{' | '}' if paren_depth <= 0 => {
                flush(&mut current, output);
                output.push(c.to_string());
            }
            _ => current.push(c),
        }
    }

    flush(&mut current, output);
}
