//! Function signature parsing, shared by the model builder and the rewriter.

use std::sync::OnceLock;

use regex::Regex;

use crate::{Function, Parameter};

/// Words that never name a function.
const CONTROL_FLOW: &[&str] = &["if", "for", "while", "switch", "return", "do", "else"];

/// Words that look like a return type but are not.
const RESERVED_RETURN_TYPES: &[&str] = &[
    "return", "else", "new", "delete", "case", "typedef", "struct", "using", "goto", "define",
    "cbuffer", "tbuffer", "sizeof",
];

/// Parameter modifier keywords.
pub const PARAMETER_MODIFIERS: &[&str] = &[
    "in",
    "out",
    "inout",
    "point",
    "line",
    "triangle",
    "lineadj",
    "triangleadj",
    "precise",
    "const",
    "uniform",
    "centroid",
    "linear",
    "sample",
    "nointerpolation",
    "noperspective",
];

fn header_regex() -> &'static Regex {
    static HEADER_REGEX: OnceLock<Regex> = OnceLock::new();
    HEADER_REGEX.get_or_init(|| {
        Regex::new(
            r"^(?:\[[^\]]*\]\s*)*(?:(?:inline|static|precise)\s+)*([A-Za-z_][A-Za-z0-9_]*(?:<[^>]*>)?)\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(",
        )
        .expect("Invalid function header regex")
    })
}

/// The start of a function signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionHeader<'a> {
    pub return_type: &'a str,
    pub name: &'a str,
    /// Byte range of the return type in the line.
    pub return_type_range: (usize, usize),
    /// Byte offset just after the opening parenthesis.
    pub open_paren_end: usize,
}

/// Match the start of a function signature.
pub fn function_header(line: &str) -> Option<FunctionHeader<'_>> {
    let captures = header_regex().captures(line)?;
    let return_type = captures.get(1)?;
    let name = captures.get(2)?;
    let whole = captures.get(0)?;

    if RESERVED_RETURN_TYPES.contains(&return_type.as_str())
        || CONTROL_FLOW.contains(&name.as_str())
        || CONTROL_FLOW.contains(&return_type.as_str())
    {
        return None;
    }

    Some(FunctionHeader {
        return_type: return_type.as_str(),
        name: name.as_str(),
        return_type_range: (return_type.start(), return_type.end()),
        open_paren_end: whole.end(),
    })
}

/// Get the net parenthesis depth change of a line.
pub fn paren_balance(line: &str) -> i32 {
    line.chars().fold(0, |depth, c| match c {
        '(' => depth + 1,
        ')' => depth - 1,
        _ => depth,
    })
}

/// Split at `separator` outside of parentheses, brackets and angle brackets.
pub fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;

    for (index, c) in text.char_indices() {
        match c {
            '(' | '[' | '<' => depth += 1,
            ')' | ']' | '>' => depth -= 1,
            c if c == separator && depth == 0 => {
                parts.push(&text[start..index]);
                start = index + c.len_utf8();
            }
            _ => {}
        }
    }

    parts.push(&text[start..]);
    parts
}

/// Find the top-level position of `needle`, outside parentheses and brackets.
fn find_top_level(text: &str, needle: char) -> Option<usize> {
    let mut depth = 0i32;
    text.char_indices().find_map(|(index, c)| {
        match c {
            '(' | '[' | '<' => depth += 1,
            ')' | ']' | '>' => depth -= 1,
            c if c == needle && depth == 0 => return Some(index),
            _ => {}
        }
        None
    })
}

/// Find the parenthesis closing the one ending just before `start`.
pub fn matching_paren(text: &str, start: usize) -> Option<usize> {
    let mut depth = 1i32;
    text[start..].char_indices().find_map(|(index, c)| {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + index);
                }
            }
            _ => {}
        }
        None
    })
}

/// Parse a complete signature, from the return type up to but excluding the body.
///
/// Returns [`None`] if the signature is malformed.
pub fn parse_function(signature: &str, raw_parameters: Vec<String>) -> Option<Function> {
    let header = function_header(signature)?;
    let close = matching_paren(signature, header.open_paren_end)?;

    let return_semantic = signature[close + 1..]
        .trim()
        .trim_end_matches(';')
        .trim()
        .strip_prefix(':')
        .map(|semantic| semantic.trim().to_string())
        .filter(|semantic| !semantic.is_empty());

    let mut parameters = vec![Parameter {
        ty: header.return_type.to_string(),
        semantic: return_semantic,
        is_output: true,
        ..Default::default()
    }];

    let arguments = signature[header.open_paren_end..close].trim();
    if !arguments.is_empty() && arguments != "void" {
        for argument in split_top_level(arguments, ',') {
            parameters.push(parse_parameter(argument)?);
        }
    }

    Some(Function {
        name: header.name.to_string(),
        parameters,
        raw_parameters,
    })
}

/// Parse one parameter declaration.
pub fn parse_parameter(text: &str) -> Option<Parameter> {
    let (declaration, default_value) = match find_top_level(text, '=') {
        Some(index) => (&text[..index], Some(text[index + 1..].trim().to_string())),
        None => (text, None),
    };

    let (declaration, semantic) = match find_top_level(declaration, ':') {
        Some(index) => (
            &declaration[..index],
            Some(declaration[index + 1..].trim().to_string()),
        ),
        None => (declaration, None),
    };

    let mut modifiers = Vec::new();
    let mut words = declaration.split_whitespace().peekable();
    while let Some(word) = words.next_if(|word| PARAMETER_MODIFIERS.contains(word)) {
        modifiers.push(word.to_string());
    }

    let mut rest = words.collect::<Vec<_>>();
    let name = rest.pop()?;
    if rest.is_empty() {
        return None;
    }
    let ty = rest.join(" ");

    let (name, array_size) = match name.split_once('[') {
        Some((name, size)) => (name, Some(size.trim_end_matches(']').trim().to_string())),
        None => (name, None),
    };
    if name.is_empty() {
        return None;
    }

    let is_output = modifiers
        .iter()
        .any(|modifier| modifier == "out" || modifier == "inout");
    let is_input = !modifiers.iter().any(|modifier| modifier == "out");

    Some(Parameter {
        ty,
        name: name.to_string(),
        semantic,
        array_size,
        is_input,
        is_output,
        modifiers,
        default_value,
    })
}
