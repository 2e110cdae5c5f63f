pub mod given;

use shaderlab_optimizer::{GeneratedFile, MemoryResolver, ParsedShader};

/// Parse a shader served from memory.
pub fn parse(resolver: &MemoryResolver, path: &str) -> ParsedShader {
    ParsedShader::parse(path, resolver)
}

/// Whether a generated file contains `line` exactly.
pub fn has_line(file: &GeneratedFile, line: &str) -> bool {
    file.lines.iter().any(|l| l == line)
}

/// Whether a generated file has a line containing `needle`.
pub fn has_line_containing(file: &GeneratedFile, needle: &str) -> bool {
    file.lines.iter().any(|l| l.contains(needle))
}

/// Whether a generated file has a line starting with `prefix` after trimming.
pub fn has_line_starting_with(file: &GeneratedFile, prefix: &str) -> bool {
    file.lines.iter().any(|l| l.trim_start().starts_with(prefix))
}
