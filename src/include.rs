//! Include resolution.
//!
//! [`ShaderSources::load`] tokenizes the top-level shader and every file it transitively
//! includes exactly once, using a work-list instead of recursion. [`IncludeWalker`] then
//! walks the already tokenized files as one flat stream, expanding includes with an
//! explicit stack and de-duplicating them per program block.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{ParseError, SourceResolver, UnsupportedConstruct, tokenizer};

/// Engine provided includes which are never expanded.
pub const BUILTIN_INCLUDES: &[&str] = &[
    "AutoLight.cginc",
    "HLSLSupport.cginc",
    "Lighting.cginc",
    "TerrainEngine.cginc",
    "Tessellation.cginc",
    "UnityCG.cginc",
    "UnityDeferredLibrary.cginc",
    "UnityGlobalIllumination.cginc",
    "UnityImageBasedLighting.cginc",
    "UnityInstancing.cginc",
    "UnityMetaPass.cginc",
    "UnityPBSLighting.cginc",
    "UnityShaderUtilities.cginc",
    "UnityShaderVariables.cginc",
    "UnityShadowLibrary.cginc",
    "UnitySprites.cginc",
    "UnityStandardBRDF.cginc",
    "UnityStandardConfig.cginc",
    "UnityStandardCore.cginc",
    "UnityStandardInput.cginc",
    "UnityStandardUtils.cginc",
    "UnityUI.cginc",
];

/// The engine include whose content is always synthesized.
pub const SYNTHESIZED_INCLUDE: &str = "UnityLightingCommon.cginc";

/// The normalized content of [`SYNTHESIZED_INCLUDE`].
///
/// Rewriting depends on `_LightColor0` and `_SpecColor` being visible declarations.
pub const SYNTHESIZED_INCLUDE_LINES: &[&str] = &[
    "#ifndef UNITY_LIGHTING_COMMON_INCLUDED",
    "#define UNITY_LIGHTING_COMMON_INCLUDED",
    "fixed4 _LightColor0;",
    "fixed4 _SpecColor;",
    "struct UnityLight",
    "{",
    "half3 color;",
    "half3 dir;",
    "half ndotl;",
    "};",
    "struct UnityIndirect",
    "{",
    "half3 diffuse;",
    "half3 specular;",
    "};",
    "struct UnityGI",
    "{",
    "UnityLight light;",
    "UnityIndirect indirect;",
    "};",
    "#endif",
];

/// Builtin includes which pull in [`SYNTHESIZED_INCLUDE`] themselves.
pub const SYNTHESIZED_INCLUDE_DEPENDENTS: &[&str] = &[
    "Lighting.cginc",
    "UnityGlobalIllumination.cginc",
    "UnityPBSLighting.cginc",
    "UnityStandardBRDF.cginc",
    "UnityStandardCore.cginc",
];

/// Path prefixes resolved from the project root instead of the including file.
pub const ASSET_ROOT_MARKERS: &[&str] = &["Assets/", "Packages/"];

fn include_regex() -> &'static Regex {
    static INCLUDE_REGEX: OnceLock<Regex> = OnceLock::new();
    INCLUDE_REGEX.get_or_init(|| {
        Regex::new(r#"^#\s*include(?:_with_pragmas)?\s*[<"]([^>"]+)[>"]"#)
            .expect("Invalid include regex")
    })
}

/// Get the path named by an `#include` directive.
pub fn include_target(line: &str) -> Option<&str> {
    include_regex()
        .captures(line)
        .and_then(|captures| captures.get(1))
        .map(|path| path.as_str())
}

/// Get the file name component of a path.
pub fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Resolve an include path against the file including it.
///
/// Returns [`None`] if the path escapes the project root.
pub fn resolve_include_path(including_file: &str, include: &str) -> Option<String> {
    let include = include.replace('\\', "/");

    let joined = match ASSET_ROOT_MARKERS
        .iter()
        .any(|marker| include.starts_with(marker))
    {
        true => include,
        false => match including_file.rfind('/') {
            Some(index) => format!("{}/{include}", &including_file[..index]),
            None => include,
        },
    };

    let mut components = Vec::new();
    for component in joined.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                components.pop()?;
            }
            component => components.push(component),
        }
    }

    Some(components.join("/"))
}

/// Is the line the start of a program block.
pub fn is_program_start(line: &str) -> bool {
    matches!(line, "CGPROGRAM" | "HLSLPROGRAM")
}

/// Is the line the start of a shared include block.
pub fn is_include_block_start(line: &str) -> bool {
    matches!(line, "CGINCLUDE" | "HLSLINCLUDE")
}

/// Is the line the end of a program or include block.
pub fn is_block_end(line: &str) -> bool {
    matches!(line, "ENDCG" | "ENDHLSL")
}

/// The tokenized files of one shader.
#[derive(Debug, Default, Clone)]
pub struct ShaderSources {
    /// The path of the top-level shader file.
    pub main: String,
    /// Normalized lines keyed by file path.
    ///
    /// Expanded `#include` directives are rewritten to name their resolved path, so
    /// every expandable directive targets a key of this map.
    pub files: FxHashMap<String, Vec<String>>,
    /// Property names referenced by `#ifex` in any file.
    pub ifex_parameters: BTreeSet<String>,
    /// Includes that could not be resolved or read, left unexpanded.
    pub unresolved_includes: Vec<String>,
}

impl ShaderSources {
    /// Load and tokenize the shader at `path` and everything it includes.
    pub fn load(path: &str, resolver: &dyn SourceResolver) -> Result<Self, ParseError> {
        let raw = resolver
            .read_lines(path)
            .map_err(|source| ParseError::Io {
                path: path.to_string(),
                source,
            })?;

        let mut sources = Self {
            main: path.to_string(),
            ..Default::default()
        };

        let mut work_list = vec![(path.to_string(), raw)];
        let mut queued = FxHashSet::default();
        queued.insert(path.to_string());

        while let Some((file, raw)) = work_list.pop() {
            log::debug!("Tokenizing {file}");
            let normalized = tokenizer::normalize_lines(&file, raw)?;
            sources
                .ifex_parameters
                .extend(normalized.ifex_parameters);

            let mut lines = Vec::with_capacity(normalized.lines.len());
            for line in normalized.lines {
                check_supported(&line)?;

                let Some(target) = include_target(&line) else {
                    lines.push(line);
                    continue;
                };

                let name = file_name(target);
                if name.starts_with("lil_") {
                    return Err(ParseError::Unsupported(UnsupportedConstruct::LilToon));
                }

                if name == SYNTHESIZED_INCLUDE {
                    lines.push(format!("#include \"{SYNTHESIZED_INCLUDE}\""));
                    continue;
                }

                if BUILTIN_INCLUDES.contains(&name) {
                    if SYNTHESIZED_INCLUDE_DEPENDENTS.contains(&name) {
                        lines.push(format!("#include \"{SYNTHESIZED_INCLUDE}\""));
                    }
                    lines.push(line);
                    continue;
                }

                let Some(resolved) = resolve_include_path(&file, target) else {
                    log::warn!("Cannot resolve directory of include {target} in {file}");
                    sources.unresolved_includes.push(target.to_string());
                    lines.push(line);
                    continue;
                };

                if !queued.contains(&resolved) {
                    match resolver.read_lines(&resolved) {
                        Ok(raw) => {
                            queued.insert(resolved.clone());
                            work_list.push((resolved.clone(), raw));
                        }
                        Err(e) => {
                            log::warn!("Missing include {resolved} in {file}: {e}");
                            sources.unresolved_includes.push(resolved);
                            lines.push(line);
                            continue;
                        }
                    }
                }

                lines.push(format!("#include \"{resolved}\""));
            }

            sources.files.insert(file, lines);
        }

        if sources
            .files
            .values()
            .flatten()
            .any(|line| include_target(line) == Some(SYNTHESIZED_INCLUDE))
        {
            sources.files.insert(
                SYNTHESIZED_INCLUDE.to_string(),
                SYNTHESIZED_INCLUDE_LINES
                    .iter()
                    .map(|line| line.to_string())
                    .collect(),
            );
        }

        Ok(sources)
    }

    /// Get the normalized lines of the top-level file.
    pub fn main_lines(&self) -> &[String] {
        self.files
            .get(&self.main)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Walk the sources.
    pub fn walk(&self) -> IncludeWalker<'_> {
        IncludeWalker::new(self)
    }

    /// Flatten the sources into one line sequence, expanding every include.
    ///
    /// Each expanded include body is followed by its original directive.
    pub fn flatten(&self) -> (Vec<&str>, usize) {
        let mut walker = self.walk();
        let mut lines = Vec::new();

        while let Some(event) = walker.next() {
            match event {
                SourceEvent::Line { text, .. } => lines.push(text),
                SourceEvent::Include { target, directive, .. } => {
                    if target.is_none() || !walker.descend() {
                        lines.push(directive);
                    }
                }
                SourceEvent::IncludeEnd { directive, .. } => lines.push(directive),
            }
        }

        (lines, walker.multi_include_count())
    }
}

fn check_supported(line: &str) -> Result<(), ParseError> {
    if line.starts_with("#pragma") && line.split_whitespace().nth(1) == Some("surface") {
        return Err(ParseError::Unsupported(UnsupportedConstruct::SurfaceShader));
    }

    if line.contains("UNITY_INSTANCING_BUFFER_START") {
        return Err(ParseError::Unsupported(
            UnsupportedConstruct::InstancingBuffer,
        ));
    }

    Ok(())
}

/// One step of an [`IncludeWalker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEvent<'a> {
    /// A normalized line.
    Line { file: &'a str, text: &'a str },
    /// An `#include` directive.
    ///
    /// `target` is [`Some`] when the included file is available. Call
    /// [`IncludeWalker::descend`] before the next step to expand it.
    Include {
        file: &'a str,
        directive: &'a str,
        target: Option<&'a str>,
    },
    /// The end of an expanded include body.
    IncludeEnd { directive: &'a str, target: &'a str },
}

#[derive(Debug)]
struct Frame<'a> {
    file: &'a str,
    lines: &'a [String],
    position: usize,
    directive: Option<&'a str>,
}

/// A flat walk over [`ShaderSources`].
///
/// `CGINCLUDE`/`HLSLINCLUDE` blocks are swallowed where they appear and replayed at the
/// start of every later program block.
#[derive(Debug)]
pub struct IncludeWalker<'a> {
    sources: &'a ShaderSources,
    stack: Vec<Frame<'a>>,
    pending: Option<(&'a str, &'a str)>,
    shared_blocks: Vec<&'a [String]>,
    block_includes: FxHashSet<&'a str>,
    multi_include_count: usize,
}

impl<'a> IncludeWalker<'a> {
    /// Create a new walker starting at the top-level file.
    pub fn new(sources: &'a ShaderSources) -> Self {
        Self {
            sources,
            stack: vec![Frame {
                file: &sources.main,
                lines: sources.main_lines(),
                position: 0,
                directive: None,
            }],
            pending: None,
            shared_blocks: Vec::new(),
            block_includes: FxHashSet::default(),
            multi_include_count: 0,
        }
    }

    /// Expand the include announced by the last [`SourceEvent::Include`].
    ///
    /// Returns `false` if it was already included in the current program block, which
    /// counts as a repeat.
    pub fn descend(&mut self) -> bool {
        let Some((target, directive)) = self.pending.take() else {
            return false;
        };

        if !self.block_includes.insert(target)
            || self.stack.iter().any(|frame| frame.file == target)
        {
            log::debug!("Skipping repeated include {target}");
            self.multi_include_count += 1;
            return false;
        }

        let Some(lines) = self.sources.files.get(target) else {
            return false;
        };

        self.stack.push(Frame {
            file: target,
            lines,
            position: 0,
            directive: Some(directive),
        });

        true
    }

    /// Get the number of includes skipped as repeats so far.
    pub fn multi_include_count(&self) -> usize {
        self.multi_include_count
    }

    /// Get the file currently being walked.
    pub fn current_file(&self) -> Option<&'a str> {
        self.stack.last().map(|frame| frame.file)
    }

    /// Skip the rest of a shared include block, returning its lines.
    fn capture_shared_block(frame: &mut Frame<'a>) -> &'a [String] {
        let start = frame.position;
        let end = frame.lines[start..]
            .iter()
            .position(|line| is_block_end(line))
            .map(|offset| start + offset)
            .unwrap_or(frame.lines.len());

        frame.position = (end + 1).min(frame.lines.len());
        &frame.lines[start..end]
    }
}

impl<'a> Iterator for IncludeWalker<'a> {
    type Item = SourceEvent<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.pending = None;

        loop {
            let frame = self.stack.last_mut()?;

            let Some(text) = frame.lines.get(frame.position) else {
                let frame = self.stack.pop()?;
                match frame.directive {
                    Some(directive) => {
                        return Some(SourceEvent::IncludeEnd {
                            directive,
                            target: frame.file,
                        });
                    }
                    None => continue,
                }
            };
            frame.position += 1;
            let file = frame.file;

            if is_include_block_start(text) {
                let block = Self::capture_shared_block(frame);
                self.shared_blocks.push(block);
                continue;
            }

            if is_program_start(text) {
                self.block_includes.clear();
                let main = &self.sources.main;
                for block in self.shared_blocks.iter().rev() {
                    self.stack.push(Frame {
                        file: main,
                        lines: block,
                        position: 0,
                        directive: None,
                    });
                }
                return Some(SourceEvent::Line { file, text });
            }

            if is_block_end(text) {
                self.block_includes.clear();
                return Some(SourceEvent::Line { file, text });
            }

            if let Some(target) = include_target(text) {
                let target = self
                    .sources
                    .files
                    .get_key_value(target)
                    .map(|(key, _)| key.as_str());
                if let Some(target) = target {
                    self.pending = Some((target, text));
                }
                return Some(SourceEvent::Include {
                    file,
                    directive: text,
                    target,
                });
            }

            return Some(SourceEvent::Line { file, text });
        }
    }
}
