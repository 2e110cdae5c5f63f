//! A constrained preprocessor evaluator.
//!
//! Neither evaluator expands macros. [`ConditionalEvaluator`] decides `#if` groups
//! from which names are known to be defined, [`IfexEvaluator`] decides `#ifex` regions
//! from concrete property values.

mod conditional;
mod expr;
mod ifex;
mod scope;

pub use conditional::*;
pub use expr::*;
pub use ifex::*;
pub use scope::*;

/// The result of feeding a line to an evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    /// The line is live and left to the caller.
    Live,
    /// The line was handled by the evaluator.
    Consumed,
}

/// The define marking the shader as processed by the optimizer.
pub const OPTIMIZER_ENABLED: &str = "OPTIMIZER_ENABLED";

/// Light mode tags and the define the engine sets for a pass with that tag.
pub const LIGHT_MODE_DEFINES: &[(&str, &str)] = &[
    ("ForwardBase", "UNITY_PASS_FORWARDBASE"),
    ("ForwardAdd", "UNITY_PASS_FORWARDADD"),
    ("ShadowCaster", "UNITY_PASS_SHADOWCASTER"),
    ("Deferred", "UNITY_PASS_DEFERRED"),
    ("Meta", "UNITY_PASS_META"),
];

/// Split a directive line into its keyword and the rest.
///
/// Returns [`None`] if the line is not a directive.
pub fn directive(line: &str) -> Option<(&str, &str)> {
    let body = line.strip_prefix('#')?.trim_start();
    let end = body
        .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .unwrap_or(body.len());
    Some((&body[..end], &body[end..]))
}

/// Get the known defines for a pass light mode.
///
/// A pass with a recognized light mode knows all light mode defines, one of them
/// defined. Any other pass knows none of them.
pub fn light_mode_defines(light_mode: Option<&str>) -> Vec<(String, bool)> {
    let Some(light_mode) = light_mode else {
        return Vec::new();
    };

    match LIGHT_MODE_DEFINES
        .iter()
        .any(|(mode, _)| mode.eq_ignore_ascii_case(light_mode))
    {
        true => LIGHT_MODE_DEFINES
            .iter()
            .map(|(mode, define)| (define.to_string(), mode.eq_ignore_ascii_case(light_mode)))
            .collect(),
        false => Vec::new(),
    }
}
