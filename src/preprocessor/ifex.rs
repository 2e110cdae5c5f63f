use std::sync::OnceLock;

use regex::Regex;
use rustc_hash::FxHashMap;

use crate::preprocessor::{Feed, directive};

fn term_regex() -> &'static Regex {
    static TERM_REGEX: OnceLock<Regex> = OnceLock::new();
    TERM_REGEX.get_or_init(|| {
        Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*(==|!=|<=|>=|<|>)\s*([-+]?(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][-+]?[0-9]+)?)[fF]?\s*$")
            .expect("Invalid ifex term regex")
    })
}

/// The outcome of an `#ifex` condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IfexOutcome {
    /// Every term holds, the region is kept.
    Keep,
    /// A term fails, the region is dropped.
    Drop,
    /// The condition cannot be decided, the directive has no effect.
    NoOp,
}

/// Evaluate an `#ifex` condition against concrete property values.
///
/// Only conjunctions of `name op literal` terms are supported. A failing term wins
/// over an unresolvable one.
pub fn evaluate_ifex(condition: &str, values: &FxHashMap<String, f32>) -> IfexOutcome {
    if condition.contains("||") {
        return IfexOutcome::NoOp;
    }

    let mut undecided = false;
    for term in condition.split("&&") {
        let Some(captures) = term_regex().captures(term) else {
            undecided = true;
            continue;
        };

        let (Some(value), Ok(literal)) = (
            values.get(&captures[1]).copied(),
            captures[3].parse::<f32>(),
        ) else {
            undecided = true;
            continue;
        };

        let holds = match &captures[2] {
            "==" => value == literal,
            "!=" => value != literal,
            "<" => value < literal,
            "<=" => value <= literal,
            ">" => value > literal,
            ">=" => value >= literal,
            _ => unreachable!("operator alternatives are fixed by the regex"),
        };

        if !holds {
            return IfexOutcome::Drop;
        }
    }

    match undecided {
        true => IfexOutcome::NoOp,
        false => IfexOutcome::Keep,
    }
}

/// Eager evaluator of `#ifex <condition>` ... `#endex` regions.
///
/// Every `#ifex`/`#endex` directive is removed. A region whose condition fails is
/// dropped up to its matching `#endex`, nested regions included.
#[derive(Debug)]
pub struct IfexEvaluator {
    values: FxHashMap<String, f32>,
    /// Nesting depth and line count inside a dropped region.
    dropping: Option<(usize, usize)>,
    dropped_lines: usize,
    diagnostics: Vec<String>,
}

impl IfexEvaluator {
    /// Create a new evaluator over known property values.
    pub fn new(values: FxHashMap<String, f32>) -> Self {
        Self {
            values,
            dropping: None,
            dropped_lines: 0,
            diagnostics: Vec::new(),
        }
    }

    /// Get the conditions which could not be decided.
    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    /// Get the total number of lines dropped.
    pub fn dropped_lines(&self) -> usize {
        self.dropped_lines
    }

    /// Whether the evaluator is inside a dropped region.
    pub fn is_dropping(&self) -> bool {
        self.dropping.is_some()
    }

    /// Feed one line, writing trace comments to `out`.
    pub fn feed(&mut self, line: &str, out: &mut Vec<String>) -> Feed {
        let keyword = directive(line);

        if let Some((depth, region_lines)) = self.dropping.as_mut() {
            match keyword {
                Some(("ifex", _)) => *depth += 1,
                Some(("endex", _)) if *depth == 0 => {
                    out.push(format!("// #ifex dropped {region_lines} lines"));
                    self.dropped_lines += *region_lines;
                    self.dropping = None;
                    return Feed::Consumed;
                }
                Some(("endex", _)) => *depth -= 1,
                _ => {}
            }
            *region_lines += 1;
            return Feed::Consumed;
        }

        match keyword {
            Some(("ifex", condition)) => {
                match evaluate_ifex(condition, &self.values) {
                    IfexOutcome::Keep => {}
                    IfexOutcome::Drop => self.dropping = Some((0, 0)),
                    IfexOutcome::NoOp => {
                        log::warn!("Cannot evaluate #ifex {}", condition.trim());
                        self.diagnostics
                            .push(format!("Ignored #ifex {}", condition.trim()));
                    }
                }
                Feed::Consumed
            }
            Some(("endex", _)) => Feed::Consumed,
            _ => Feed::Live,
        }
    }
}
