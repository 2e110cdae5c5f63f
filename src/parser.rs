//! The model builder, a single pass state machine over normalized lines.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use glam::Vec4;
use regex::Regex;
use rustc_hash::FxHashMap;

use crate::{
    Function, ParseError, ParsedShader, Pass, Property, PropertyType, SourceResolver, Stage,
    function,
    include::{self, IncludeWalker, ShaderSources, SourceEvent},
    preprocessor::{self, ConditionalEvaluator, Feed},
    value::{format_float, format_float4},
};

fn property_regex() -> &'static Regex {
    static PROPERTY_REGEX: OnceLock<Regex> = OnceLock::new();
    PROPERTY_REGEX.get_or_init(|| {
        Regex::new(
            r#"^([A-Za-z_][A-Za-z0-9_]*)\s*\(\s*"((?:[^"\\]|\\.)*)"\s*,\s*([A-Za-z0-9]+)\s*(?:\(([^)]*)\))?\s*\)\s*=\s*(.*)$"#,
        )
        .expect("Invalid property regex")
    })
}

fn tag_regex() -> &'static Regex {
    static TAG_REGEX: OnceLock<Regex> = OnceLock::new();
    TAG_REGEX.get_or_init(|| {
        Regex::new(r"^\[((?:[^\[\]]|\[[^\]]*\])*)\]\s*").expect("Invalid property tag regex")
    })
}

fn shaderlab_tag_regex() -> &'static Regex {
    static SHADERLAB_TAG_REGEX: OnceLock<Regex> = OnceLock::new();
    SHADERLAB_TAG_REGEX.get_or_init(|| {
        Regex::new(r#""([^"]+)"\s*=\s*"([^"]*)""#).expect("Invalid ShaderLab tag regex")
    })
}

fn usage_site_regex() -> &'static Regex {
    static USAGE_SITE_REGEX: OnceLock<Regex> = OnceLock::new();
    USAGE_SITE_REGEX.get_or_init(|| {
        Regex::new(r"\[([A-Za-z_][A-Za-z0-9_]*)\]").expect("Invalid usage site regex")
    })
}

fn texture_declaration_regex() -> &'static Regex {
    static TEXTURE_DECLARATION_REGEX: OnceLock<Regex> = OnceLock::new();
    TEXTURE_DECLARATION_REGEX.get_or_init(|| {
        Regex::new(
            r"\b(?:UNITY_DECLARE_TEX2D\w*|UNITY_DECLARE_TEXCUBE\w*|TEXTURE2D\w*|Texture2D\w*|sampler2D|SAMPLER)\b",
        )
        .expect("Invalid texture declaration regex")
    })
}

/// Build the model of the shader at `path`.
pub(crate) fn build(path: &str, resolver: &dyn SourceResolver) -> Result<ParsedShader, ParseError> {
    let sources = ShaderSources::load(path, resolver)?;

    let mut builder = ModelBuilder::default();
    let mut walker = sources.walk();
    while let Some(event) = walker.next() {
        builder.event(event, &mut walker)?;
    }
    let multi_include_count = walker.multi_include_count();

    builder.finish(path, sources, multi_include_count)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum State {
    #[default]
    Init,
    PropertyBlock,
    TopLevel,
    TagsBlock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Properties,
    Tags,
}

/// A signature being accumulated over several logical lines.
#[derive(Debug)]
struct Signature {
    text: String,
    raw: Vec<String>,
    paren_depth: i32,
}

/// The state of the program block being read.
#[derive(Debug)]
struct ProgramBlock {
    pass: Pass,
    evaluator: ConditionalEvaluator,
    bindings: [Option<String>; 5],
    brace_depth: i32,
    signature: Option<Signature>,
    /// A complete signature waiting for its body.
    completed: Option<Signature>,
}

impl ProgramBlock {
    fn new(light_mode: Option<String>) -> Self {
        let evaluator =
            ConditionalEvaluator::new(preprocessor::light_mode_defines(light_mode.as_deref()));

        Self {
            pass: Pass {
                light_mode,
                ..Default::default()
            },
            evaluator,
            bindings: Default::default(),
            brace_depth: 0,
            signature: None,
            completed: None,
        }
    }
}

#[derive(Debug, Default)]
struct ModelBuilder {
    state: State,
    pending_block: Option<Block>,
    depth: i32,
    block_depth: i32,
    name: Option<String>,
    properties: Vec<Property>,
    pending_tags: Vec<String>,
    usage_sites: Vec<(String, String)>,
    light_mode: Option<String>,
    program: Option<ProgramBlock>,
    passes: Vec<Pass>,
    functions: FxHashMap<String, Function>,
    shader_feature_keywords: BTreeSet<String>,
    has_tessellation: bool,
    has_disable_batching_tag: bool,
    has_custom_texture_declarations: bool,
    mismatched_curly_braces: bool,
}

impl ModelBuilder {
    fn event(
        &mut self,
        event: SourceEvent<'_>,
        walker: &mut IncludeWalker<'_>,
    ) -> Result<(), ParseError> {
        match event {
            SourceEvent::Line { text, .. } => match self.program.is_some() {
                true => self.program_line(text),
                false => self.shaderlab_line(text),
            },
            SourceEvent::Include {
                directive, target, ..
            } => {
                if let Some(program) = self.program.as_mut() {
                    let mut scratch = Vec::new();
                    if program.evaluator.feed(directive, &mut scratch) == Feed::Live
                        && target.is_some()
                    {
                        walker.descend();
                    }
                }
                Ok(())
            }
            SourceEvent::IncludeEnd { .. } => Ok(()),
        }
    }

    fn shaderlab_line(&mut self, line: &str) -> Result<(), ParseError> {
        if include::is_program_start(line) {
            log::debug!("Reading program block {}", self.passes.len());
            self.program = Some(ProgramBlock::new(self.light_mode.clone()));
            return Ok(());
        }

        // `#ifex` regions around properties are decided per variant.
        if line.starts_with('#') {
            return Ok(());
        }

        match line {
            "{" => {
                self.depth += 1;
                if let Some(block) = self.pending_block.take() {
                    self.state = match block {
                        Block::Properties => State::PropertyBlock,
                        Block::Tags => State::TagsBlock,
                    };
                    self.block_depth = self.depth;
                }
                return Ok(());
            }
            "}" | "};" => {
                if matches!(self.state, State::PropertyBlock | State::TagsBlock)
                    && self.depth == self.block_depth
                {
                    self.state = State::TopLevel;
                }
                self.depth -= 1;
                return Ok(());
            }
            _ => self.pending_block = None,
        }

        match self.state {
            State::Init => {
                if let Some(rest) = line.strip_prefix("Shader") {
                    self.name = Some(rest.trim().trim_matches('"').to_string());
                    self.state = State::TopLevel;
                }
            }
            State::PropertyBlock => self.property_line(line)?,
            State::TagsBlock => self.tags_line(line),
            State::TopLevel => match line {
                "Properties" => self.pending_block = Some(Block::Properties),
                "Tags" => self.pending_block = Some(Block::Tags),
                "Pass" => self.light_mode = None,
                _ => {
                    let site = line.split_whitespace().next().unwrap_or_default();
                    for captures in usage_site_regex().captures_iter(line) {
                        self.usage_sites
                            .push((captures[1].to_string(), site.to_string()));
                    }
                }
            },
        }

        Ok(())
    }

    fn tags_line(&mut self, line: &str) {
        for captures in shaderlab_tag_regex().captures_iter(line) {
            let (key, value) = (&captures[1], &captures[2]);
            if key.eq_ignore_ascii_case("DisableBatching") && value.eq_ignore_ascii_case("true") {
                self.has_disable_batching_tag = true;
            } else if key.eq_ignore_ascii_case("LightMode") {
                self.light_mode = Some(value.to_string());
            }
        }
    }

    fn property_line(&mut self, line: &str) -> Result<(), ParseError> {
        let mut rest = line;
        while let Some(captures) = tag_regex().captures(rest) {
            let tag = captures[1].trim();
            if tag.len() <= 5 {
                self.pending_tags.push(tag.to_ascii_lowercase());
            }
            rest = &rest[captures[0].len()..];
        }

        if rest.is_empty() {
            return Ok(());
        }

        let malformed = || ParseError::MalformedProperty {
            line: line.to_string(),
        };
        let captures = property_regex().captures(rest).ok_or_else(malformed)?;

        let tags = std::mem::take(&mut self.pending_tags);
        let name = captures[1].to_string();
        let (ty, default_value) =
            parse_default(&captures[3], &captures[5], tags.iter().any(|tag| tag == "hdr"))
                .ok_or_else(malformed)?;

        self.properties.push(Property {
            display_name: captures[2].to_string(),
            has_gamma_tag: tags.iter().any(|tag| tag == "gamma"),
            ..Property::new(name.clone(), ty, default_value)
        });

        if ty.is_texture() {
            self.properties.push(Property::new(
                format!("{name}_ST"),
                PropertyType::Vector,
                "float4(1, 1, 0, 0)",
            ));
        }

        Ok(())
    }

    fn program_line(&mut self, line: &str) -> Result<(), ParseError> {
        if include::is_block_end(line) {
            return self.end_program();
        }

        // Region directives have no values to be decided against while building.
        if matches!(preprocessor::directive(line), Some(("ifex" | "endex", _))) {
            return Ok(());
        }

        let Some(program) = self.program.as_mut() else {
            return Ok(());
        };

        let mut scratch = Vec::new();
        if program.evaluator.feed(line, &mut scratch) == Feed::Consumed {
            if line.starts_with('#')
                && let Some(signature) = program
                    .signature
                    .as_mut()
                    .or(program.completed.as_mut())
            {
                signature.raw.push(line.to_string());
            }
            return Ok(());
        }

        if line.starts_with('#') {
            if let Some(signature) = program.signature.as_mut() {
                signature.raw.push(line.to_string());
            }
            self.directive_line(line);
            return Ok(());
        }

        if let Some(signature) = program.signature.as_mut() {
            signature.text.push(' ');
            signature.text.push_str(line);
            signature.raw.push(line.to_string());
            signature.paren_depth += function::paren_balance(line);
            if signature.paren_depth <= 0 {
                program.completed = program.signature.take();
            }
            return Ok(());
        }

        if let Some(mut signature) = program.completed.take() {
            match line {
                "{" => {
                    let parsed = function::parse_function(&signature.text, signature.raw)
                        .ok_or_else(|| ParseError::MalformedFunction {
                            line: signature.text.clone(),
                        })?;
                    log::debug!("Found function {}", parsed.name);
                    self.functions.insert(parsed.name.clone(), parsed);
                    program.brace_depth += 1;
                    return Ok(());
                }
                line if line.starts_with(':') => {
                    signature.text.push(' ');
                    signature.text.push_str(line);
                    signature.raw.push(line.to_string());
                    program.completed = Some(signature);
                    return Ok(());
                }
                // A prototype or something that only looked like a signature.
                _ => {}
            }
        }

        match line {
            "{" => program.brace_depth += 1,
            "}" | "};" => program.brace_depth -= 1,
            _ if program.brace_depth == 0 => {
                if function::function_header(line).is_some() && !line.ends_with(';') {
                    let signature = Signature {
                        text: line.to_string(),
                        raw: vec![line.to_string()],
                        paren_depth: function::paren_balance(line),
                    };
                    match signature.paren_depth <= 0 {
                        true => program.completed = Some(signature),
                        false => program.signature = Some(signature),
                    }
                }
            }
            _ => {}
        }

        Ok(())
    }

    fn directive_line(&mut self, line: &str) {
        let Some(program) = self.program.as_mut() else {
            return;
        };

        match preprocessor::directive(line) {
            Some(("pragma", rest)) => {
                let words = rest.split_whitespace().collect::<Vec<_>>();
                let Some(first) = words.first() else {
                    return;
                };

                if let Some(stage) = Stage::from_pragma(first) {
                    if let Some(name) = words.get(1) {
                        program.bindings[stage.index()] = Some(name.to_string());
                    }
                    if matches!(stage, Stage::Hull | Stage::Domain) {
                        self.has_tessellation = true;
                    }
                } else if first.starts_with("shader_feature") {
                    for keyword in words[1..].iter().filter(|keyword| **keyword != "_") {
                        program
                            .pass
                            .shader_feature_keywords
                            .insert(keyword.to_string());
                        self.shader_feature_keywords.insert(keyword.to_string());
                    }
                }
            }
            Some(("define", rest)) => {
                if texture_declaration_regex().is_match(rest) {
                    log::debug!("Custom texture declaration macro: {line}");
                    self.has_custom_texture_declarations = true;
                }
            }
            _ => {}
        }
    }

    fn end_program(&mut self) -> Result<(), ParseError> {
        let Some(program) = self.program.take() else {
            return Ok(());
        };
        let index = self.passes.len();

        if program.brace_depth != 0 {
            log::warn!(
                "Mismatched curly braces in program block {index} (depth {})",
                program.brace_depth
            );
            self.mismatched_curly_braces = true;
        }

        let mut pass = program.pass;
        for stage in Stage::ALL {
            let Some(name) = &program.bindings[stage.index()] else {
                continue;
            };
            let function = self.functions.get(name).cloned().ok_or_else(|| {
                ParseError::UndefinedEntryPoint {
                    pass: index,
                    stage,
                    name: name.clone(),
                }
            })?;
            *pass.stage_mut(stage) = Some(function);
        }

        for stage in [Stage::Vertex, Stage::Fragment] {
            if pass.stage(stage).is_none() {
                return Err(ParseError::MissingEntryPoint { pass: index, stage });
            }
        }

        self.passes.push(pass);
        Ok(())
    }

    fn finish(
        mut self,
        path: &str,
        sources: ShaderSources,
        multi_include_count: usize,
    ) -> Result<ParsedShader, ParseError> {
        if self.program.is_some() {
            self.end_program()?;
        }

        if self.depth != 0 {
            return Err(ParseError::UnbalancedBraces { depth: self.depth });
        }

        let mut shader = ParsedShader {
            name: self.name.take().unwrap_or_default(),
            file_path: path.to_string(),
            parsed_correctly: true,
            ifex_parameters: sources.ifex_parameters.clone(),
            unresolved_includes: sources.unresolved_includes.clone(),
            sources,
            passes: self.passes,
            functions: self.functions,
            shader_feature_keywords: self.shader_feature_keywords,
            has_tessellation: self.has_tessellation,
            has_disable_batching_tag: self.has_disable_batching_tag,
            has_custom_texture_declarations: self.has_custom_texture_declarations,
            mismatched_curly_braces: self.mismatched_curly_braces,
            multi_include_count,
            ..Default::default()
        };

        if shader.name.is_empty() {
            shader.name = crate::model::file_stem(path).to_string();
        }

        for property in self.properties {
            shader.insert_property(property);
        }

        for (name, site) in self.usage_sites {
            if let Some(index) = shader.property_table.get(&name) {
                shader.properties[*index].shaderlab_sites.insert(site);
            }
        }

        Ok(shader)
    }
}

/// Map a type word and default text to the property type and HLSL default.
fn parse_default(type_word: &str, default: &str, hdr: bool) -> Option<(PropertyType, String)> {
    let default = default.trim();
    let is_tuple = default.starts_with('(');

    match type_word.to_ascii_lowercase().as_str() {
        "float" | "range" | "int" | "integer" if is_tuple => {
            Some((PropertyType::Vector, format_float4(parse_tuple(default)?)))
        }
        "float" | "range" => Some((
            PropertyType::Float,
            format_float(default.parse::<f32>().ok()?),
        )),
        "int" | "integer" => Some((
            PropertyType::Int,
            (default.parse::<f32>().ok()? as i32).to_string(),
        )),
        "color" => Some((
            match hdr {
                true => PropertyType::ColorHDR,
                false => PropertyType::Color,
            },
            format_float4(parse_tuple(default)?),
        )),
        "vector" => Some((PropertyType::Vector, format_float4(parse_tuple(default)?))),
        texture => {
            let ty = match texture {
                "2d" => PropertyType::Texture2D,
                "2darray" => PropertyType::Texture2DArray,
                "3d" => PropertyType::Texture3D,
                "cube" => PropertyType::TextureCube,
                "cubearray" => PropertyType::TextureCubeArray,
                _ => return Some((PropertyType::Unknown, default.to_string())),
            };
            Some((ty, format_float4(texture_default(default))))
        }
    }
}

/// Parse `(x, y, z, w)`, missing components being zero.
fn parse_tuple(text: &str) -> Option<Vec4> {
    let inner = text.trim().strip_prefix('(')?.strip_suffix(')')?;
    let mut components = [0.0f32; 4];
    for (index, component) in inner.split(',').enumerate() {
        *components.get_mut(index)? = component.trim().parse().ok()?;
    }
    Some(Vec4::from_array(components))
}

/// Map a texture placeholder name to its color.
fn texture_default(text: &str) -> Vec4 {
    let placeholder = text
        .trim()
        .trim_matches('"')
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();

    match placeholder.as_str() {
        "white" => Vec4::ONE,
        "black" => Vec4::ZERO,
        "bump" => Vec4::new(0.5, 0.5, 1.0, 1.0),
        "red" => Vec4::new(1.0, 0.0, 0.0, 0.0),
        _ => Vec4::splat(0.5),
    }
}
