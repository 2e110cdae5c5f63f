use thiserror::Error;

use crate::Stage;

/// A construct the optimizer recognizes but refuses to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsupportedConstruct {
    /// `#pragma surface`.
    SurfaceShader,
    /// `UNITY_INSTANCING_BUFFER_START` and friends.
    InstancingBuffer,
    /// lilToon pass files.
    LilToon,
}

impl std::fmt::Display for UnsupportedConstruct {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SurfaceShader => write!(f, "surface shaders are not supported"),
            Self::InstancingBuffer => write!(f, "instancing buffers are not supported"),
            Self::LilToon => write!(f, "lilToon shaders are not supported"),
        }
    }
}

/// The error type for [`ParsedShader::parse`](crate::ParsedShader::parse).
///
/// The parse entry point never returns this directly, it is rendered into
/// [`ParsedShader::error_message`](crate::ParsedShader::error_message).
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read shader {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unterminated string literal in {file} on line {line}")]
    UnterminatedString { file: String, line: usize },
    #[error("unterminated block comment in {file}")]
    UnterminatedComment { file: String },
    #[error("malformed property declaration: {line}")]
    MalformedProperty { line: String },
    #[error("malformed function declaration: {line}")]
    MalformedFunction { line: String },
    #[error("unbalanced curly braces at end of shader (depth {depth})")]
    UnbalancedBraces { depth: i32 },
    #[error("pass {pass} has no {stage} entry point")]
    MissingEntryPoint { pass: usize, stage: Stage },
    #[error("pass {pass} binds {stage} function {name} which is never defined")]
    UndefinedEntryPoint {
        pass: usize,
        stage: Stage,
        name: String,
    },
    #[error("{0}")]
    Unsupported(UnsupportedConstruct),
}

/// The error type for [`ShaderRewriter::rewrite`](crate::ShaderRewriter::rewrite).
#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("shader {name} was not parsed correctly: {message}")]
    NotParsed { name: String, message: String },
    #[error(
        "per-material value count mismatch for {property}: {count} != {expected_count}"
    )]
    MaterialCountMismatch {
        property: String,
        count: usize,
        expected_count: usize,
    },
    #[error("too many source materials: {count} > {max}")]
    TooManyMaterials { count: usize, max: usize },
    #[error("empty per-material value list for {property}")]
    EmptyValues { property: String },
    #[error("unknown property {0}")]
    UnknownProperty(String),
    #[error("property {property} of type {ty:?} cannot be animated")]
    UnsupportedAnimatedType {
        property: String,
        ty: crate::PropertyType,
    },
    #[error("property {property} of type {ty:?} cannot be merged into a texture array")]
    UnsupportedTextureType {
        property: String,
        ty: crate::PropertyType,
    },
    #[error("texture merging is disabled for shader {0}: custom texture declaration macros")]
    TextureMergeUnsupported(String),
    #[error("shader {0} uses tessellation, which cannot carry the packed ID")]
    UnsupportedTessellation(String),
    #[error("unbalanced curly braces at the end of program block {pass} (depth {depth})")]
    UnbalancedBraces { pass: usize, depth: i32 },
    #[error("program block {pass} has no resolvable {stage} entry point")]
    UnresolvedEntryPoint { pass: usize, stage: Stage },
    #[error("cannot rewrite {stage} entry point {name}: {reason}")]
    UnsupportedStageSignature {
        stage: Stage,
        name: String,
        reason: &'static str,
    },
    #[error("{0}")]
    MalformedFunction(String),
}
