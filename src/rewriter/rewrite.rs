use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, OnceLock};

use itertools::Itertools;
use rayon::prelude::*;
use regex::{Captures, Regex};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    AnimatedLayout, ArrayInitializer, GeneratedFile, MergedTexture, OptimizedShader,
    ParsedShader, Pass, PropertyDeclaration, PropertyKind, PropertyType, PropertyValue,
    RewriteError, RewriteOptions, Stage, StagePlan, chunk_name, content_hash,
    dummy_usage_function, function, hidden_float,
    include::{self, IncludeWalker, SourceEvent},
    model::file_stem,
    preprocessor::{self, ConditionalEvaluator, Feed, IfexEvaluator, OPTIMIZER_ENABLED},
    rewrite_entry, sanitize_file_name,
};

fn uniform_declaration_regex() -> &'static Regex {
    static UNIFORM_DECLARATION_REGEX: OnceLock<Regex> = OnceLock::new();
    UNIFORM_DECLARATION_REGEX.get_or_init(|| {
        Regex::new(r"^(?:uniform\s+)?([A-Za-z_][A-Za-z0-9_]*)\s+([A-Za-z_][A-Za-z0-9_]*)\s*;$")
            .expect("Invalid uniform declaration regex")
    })
}

fn cbuffer_regex() -> &'static Regex {
    static CBUFFER_REGEX: OnceLock<Regex> = OnceLock::new();
    CBUFFER_REGEX.get_or_init(|| {
        Regex::new(r"^cbuffer\s+[A-Za-z_][A-Za-z0-9_]*").expect("Invalid cbuffer regex")
    })
}

fn usage_site_regex() -> &'static Regex {
    static USAGE_SITE_REGEX: OnceLock<Regex> = OnceLock::new();
    USAGE_SITE_REGEX.get_or_init(|| {
        Regex::new(r"\[([A-Za-z_][A-Za-z0-9_]*)\]").expect("Invalid usage site regex")
    })
}

/// Rewriter of one shader variant.
#[derive(Debug, Clone)]
pub struct ShaderRewriter {
    shader: Arc<ParsedShader>,
    options: RewriteOptions,
}

impl ShaderRewriter {
    /// Create a new rewriter.
    pub fn new(shader: Arc<ParsedShader>, options: RewriteOptions) -> Self {
        Self { shader, options }
    }

    /// Get the shader being rewritten.
    pub fn shader(&self) -> &Arc<ParsedShader> {
        &self.shader
    }

    /// Get the options.
    pub fn options(&self) -> &RewriteOptions {
        &self.options
    }

    /// Generate the variant.
    ///
    /// Either the complete variant is returned or an error, never a partial shader.
    pub fn rewrite(&self) -> Result<OptimizedShader, RewriteError> {
        let substitutions = Substitutions::new(&self.shader, &self.options)?;

        let mut emitter = Emitter::new(&self.shader, &self.options, &substitutions);
        let mut walker = self.shader.sources.walk();
        while let Some(event) = walker.next() {
            emitter.event(event, &mut walker)?;
        }

        let optimized = emitter.finish(Arc::clone(&self.shader), substitutions.animated.clone())?;
        log::info!(
            "Generated {} from {} ({} files)",
            optimized.name,
            self.shader.file_path,
            optimized.files.len(),
        );
        Ok(optimized)
    }
}

/// Rewrite many variants in parallel.
///
/// Each variant is rewritten sequentially, the results keep the order of `rewriters`.
pub fn rewrite_all(rewriters: &[ShaderRewriter]) -> Vec<Result<OptimizedShader, RewriteError>> {
    rewriters.par_iter().map(ShaderRewriter::rewrite).collect()
}

/// The resolved substitutions of one variant.
///
/// A property animated on any mesh is never also array backed, and an array backed
/// property is never also static.
#[derive(Debug)]
struct Substitutions {
    statics: FxHashMap<String, PropertyValue>,
    arrays: BTreeMap<String, ArrayInitializer>,
    textures: Vec<MergedTexture>,
    animated: AnimatedLayout,
    ifex_values: FxHashMap<String, f32>,
}

impl Substitutions {
    fn new(shader: &ParsedShader, options: &RewriteOptions) -> Result<Self, RewriteError> {
        if !shader.parsed_correctly {
            return Err(RewriteError::NotParsed {
                name: shader.name.clone(),
                message: shader.error_message.clone().unwrap_or_default(),
            });
        }

        options.material_count()?;

        if !options.merged_textures.is_empty() && shader.has_custom_texture_declarations {
            return Err(RewriteError::TextureMergeUnsupported(shader.name.clone()));
        }

        if let Some(name) = options
            .static_properties
            .keys()
            .chain(options.array_properties.keys())
            .chain(options.merged_textures.keys())
            .find(|name| shader.property(name).is_none())
        {
            return Err(RewriteError::UnknownProperty(name.clone()));
        }

        if let Some(property) = options
            .merged_textures
            .keys()
            .filter_map(|name| shader.property(name))
            .find(|property| property.ty != PropertyType::Texture2D)
        {
            return Err(RewriteError::UnsupportedTextureType {
                property: property.name.clone(),
                ty: property.ty,
            });
        }

        let animated = AnimatedLayout::new(
            shader,
            &options.animated_properties,
            options.merged_meshes.clone(),
        )?;

        let arrays = options
            .array_properties
            .iter()
            .filter(|(name, _)| !animated.slots.contains_key(*name))
            .filter_map(|(name, values)| Some((name.clone(), ArrayInitializer::new(values)?)))
            .collect::<BTreeMap<_, _>>();

        let statics = options
            .static_properties
            .iter()
            .filter(|(name, _)| !animated.slots.contains_key(*name) && !arrays.contains_key(*name))
            .map(|(name, value)| (name.clone(), *value))
            .collect::<FxHashMap<_, _>>();

        let textures = options
            .merged_textures
            .iter()
            .sorted_by_key(|(name, _)| *name)
            .map(|(name, slices)| {
                let default = shader
                    .property(name)
                    .map(|property| property.default_value.as_str())
                    .unwrap_or("float4(0.5, 0.5, 0.5, 1.0)");
                MergedTexture::new(name, default, slices).ok_or_else(|| RewriteError::EmptyValues {
                    property: name.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let ifex_values = statics
            .iter()
            .filter_map(|(name, value)| Some((name.clone(), value.as_scalar()?)))
            .chain(arrays.iter().filter_map(|(name, initializer)| match initializer {
                ArrayInitializer::Uniform(value) => Some((name.clone(), value.as_scalar()?)),
                _ => None,
            }))
            .collect();

        Ok(Self {
            statics,
            arrays,
            textures,
            animated,
            ifex_values,
        })
    }

    fn is_texture_declaration(&self, line: &str) -> bool {
        self.textures
            .iter()
            .any(|texture| texture.is_declaration(line))
    }

    fn texture(&self, name: &str) -> Option<&MergedTexture> {
        self.textures.iter().find(|texture| texture.name == name)
    }
}

/// Format a static value for a ShaderLab command, e.g. `Cull [_CullMode]`.
fn shaderlab_literal(value: &PropertyValue) -> Option<String> {
    match value {
        PropertyValue::Float(value) => Some(value.to_string()),
        PropertyValue::Int(value) => Some(value.to_string()),
        PropertyValue::Vector(..) => None,
    }
}

/// Properties written into the output `Properties` block, by storage kind.
#[derive(Debug, Default)]
struct PropertyLists {
    float: Vec<String>,
    int: Vec<String>,
    vector: Vec<String>,
    texture: Vec<String>,
    texture_array: Vec<String>,
}

impl PropertyLists {
    fn push(&mut self, kind: PropertyKind, name: impl Into<String>) {
        let list = match kind {
            PropertyKind::Float => &mut self.float,
            PropertyKind::Int => &mut self.int,
            PropertyKind::Vector => &mut self.vector,
            PropertyKind::Texture => &mut self.texture,
            PropertyKind::TextureArray => &mut self.texture_array,
        };
        list.push(name.into());
    }
}

#[derive(Debug, Default)]
struct ShaderLabState {
    depth: i32,
    /// Index of the `Shader "..."` line in the main buffer.
    shader_line: Option<usize>,
    /// Index in the main buffer just after the opening brace of the shader.
    shader_body: Option<usize>,
    properties_pending: bool,
    properties_depth: Option<i32>,
    has_properties: bool,
}

/// An entry point signature being captured.
#[derive(Debug)]
struct PendingEntry {
    stage: Stage,
    lines: Vec<String>,
    paren_depth: i32,
}

/// The state of the program block being rewritten.
#[derive(Debug)]
struct ProgramState {
    index: usize,
    evaluator: ConditionalEvaluator,
    plan: StagePlan,
    /// Rewritten entry points by function name.
    entries: FxHashMap<String, Stage>,
    found: BTreeSet<Stage>,
    brace_depth: i32,
    /// The brace depth of declarations inside the open constant buffer.
    cbuffer: Option<i32>,
    cbuffer_pending: bool,
    /// Rewritten declarations moved out of the constant buffer.
    deferred: Vec<String>,
    pending: Option<PendingEntry>,
    /// The body rewrite and the brace depth the body started at.
    body: Option<(crate::BodyRewrite, i32)>,
    /// Properties redeclared as static globals assigned in every entry point.
    declared: Vec<String>,
    emitted_carriers: FxHashSet<&'static str>,
}

impl ProgramState {
    fn at_declaration_depth(&self) -> bool {
        self.body.is_none()
            && match self.cbuffer {
                Some(depth) => self.brace_depth == depth,
                None => self.brace_depth == 0,
            }
    }
}

struct Emitter<'a> {
    shader: &'a ParsedShader,
    options: &'a RewriteOptions,
    substitutions: &'a Substitutions,
    ifex: IfexEvaluator,
    main: Vec<String>,
    /// Buffers of the include bodies being expanded, innermost last.
    includes: Vec<Vec<String>>,
    chunks: Vec<GeneratedFile>,
    shaderlab: ShaderLabState,
    program: Option<ProgramState>,
    program_count: usize,
    lists: PropertyLists,
    diagnostics: Vec<String>,
}

impl<'a> Emitter<'a> {
    fn new(
        shader: &'a ParsedShader,
        options: &'a RewriteOptions,
        substitutions: &'a Substitutions,
    ) -> Self {
        Self {
            shader,
            options,
            substitutions,
            ifex: IfexEvaluator::new(substitutions.ifex_values.clone()),
            main: Vec::new(),
            includes: Vec::new(),
            chunks: Vec::new(),
            shaderlab: ShaderLabState::default(),
            program: None,
            program_count: 0,
            lists: PropertyLists::default(),
            diagnostics: Vec::new(),
        }
    }

    fn buffer(&mut self) -> &mut Vec<String> {
        self.includes.last_mut().unwrap_or(&mut self.main)
    }

    /// Write a line, into the captured signature if one is pending.
    fn emit(&mut self, line: String) {
        if let Some(pending) = self
            .program
            .as_mut()
            .and_then(|program| program.pending.as_mut())
        {
            pending.lines.push(line);
            return;
        }
        self.buffer().push(line);
    }

    /// Write a line while `program` is taken out of the emitter.
    fn emit_program(&mut self, program: &mut ProgramState, line: String) {
        match program.pending.as_mut() {
            Some(pending) => pending.lines.push(line),
            None => self.buffer().push(line),
        }
    }

    fn event(
        &mut self,
        event: SourceEvent<'_>,
        walker: &mut IncludeWalker<'_>,
    ) -> Result<(), RewriteError> {
        match event {
            SourceEvent::Line { text, .. } => self.line(text),
            SourceEvent::Include {
                directive, target, ..
            } => {
                self.include(directive, target, walker);
                Ok(())
            }
            SourceEvent::IncludeEnd { target, .. } => {
                self.include_end(target);
                Ok(())
            }
        }
    }

    fn feed_ifex(&mut self, line: &str) -> Feed {
        let mut out = Vec::new();
        let feed = self.ifex.feed(line, &mut out);
        for line in out {
            self.emit(line);
        }
        feed
    }

    fn line(&mut self, text: &str) -> Result<(), RewriteError> {
        if self.feed_ifex(text) == Feed::Consumed {
            return Ok(());
        }

        match self.program.is_some() {
            true => self.program_line(text),
            false => self.shaderlab_line(text),
        }
    }

    fn include(&mut self, directive: &str, target: Option<&str>, walker: &mut IncludeWalker<'_>) {
        if self.feed_ifex(directive) == Feed::Consumed {
            return;
        }

        let mut out = Vec::new();
        let feed = self
            .program
            .as_mut()
            .map(|program| program.evaluator.feed(directive, &mut out));
        for line in out {
            self.emit(line);
        }

        match (feed, target) {
            (Some(Feed::Consumed), _) => {}
            (Some(Feed::Live), Some(..)) => {
                // A repeat inside the same program block is dropped with its directive.
                if walker.descend() {
                    self.includes.push(Vec::new());
                }
            }
            _ => self.emit(directive.to_string()),
        }
    }

    fn include_end(&mut self, target: &str) {
        let Some(lines) = self.includes.pop() else {
            return;
        };

        let name = chunk_name(file_stem(target), content_hash(&lines));
        if !self.chunks.iter().any(|chunk| chunk.name == name) {
            log::debug!("Generated include chunk {name}");
            self.chunks.push(GeneratedFile {
                name: name.clone(),
                lines,
            });
        }
        self.emit(format!("#include \"{name}\""));
    }

    fn shaderlab_line(&mut self, text: &str) -> Result<(), RewriteError> {
        if include::is_program_start(text) {
            return self.start_program(text);
        }

        match text {
            "{" => {
                let state = &mut self.shaderlab;
                state.depth += 1;
                if state.properties_pending {
                    state.properties_pending = false;
                    state.properties_depth = Some(state.depth);
                    state.has_properties = true;
                }
                self.emit(text.to_string());
                if self.shaderlab.depth == 1 && self.shaderlab.shader_body.is_none() {
                    self.shaderlab.shader_body = Some(self.main.len());
                }
            }
            "}" | "};" => {
                if self.shaderlab.properties_depth == Some(self.shaderlab.depth) {
                    self.shaderlab.properties_depth = None;
                    for (name, kind, line) in self.added_properties() {
                        self.lists.push(kind, name);
                        self.emit(line);
                    }
                }
                self.shaderlab.depth -= 1;
                self.emit(text.to_string());
            }
            _ => {
                let state = &mut self.shaderlab;
                state.properties_pending = state.depth == 1 && text == "Properties";
                if state.shader_line.is_none() && state.depth == 0 && is_shader_line(text) {
                    state.shader_line = Some(self.main.len());
                }

                let line = match self.shaderlab.properties_depth == Some(self.shaderlab.depth) {
                    true => self.property_line(text),
                    false => self.substitute_usage_sites(text),
                };
                self.emit(line);
            }
        }

        Ok(())
    }

    fn property_line(&mut self, text: &str) -> String {
        let Some(declaration) = PropertyDeclaration::parse(text) else {
            return text.to_string();
        };

        if let Some(texture) = self.substitutions.texture(declaration.name) {
            self.lists
                .push(PropertyKind::TextureArray, texture.array_name());
            return declaration.to_texture_array();
        }

        if let Some(kind) = declaration.kind() {
            self.lists.push(kind, declaration.name);
        }
        text.to_string()
    }

    fn substitute_usage_sites(&self, text: &str) -> String {
        usage_site_regex()
            .replace_all(text, |captures: &Captures| {
                self.substitutions
                    .statics
                    .get(&captures[1])
                    .and_then(shaderlab_literal)
                    .unwrap_or_else(|| captures[0].to_string())
            })
            .into_owned()
    }

    /// Get the properties the variant adds, as (name, kind, declaration).
    fn added_properties(&self) -> Vec<(String, PropertyKind, String)> {
        let mut properties = Vec::new();

        if self.options.mesh_count() > 1 {
            properties.extend(self.options.merged_meshes.clone().map(|mesh| {
                let name = format!("_IsActiveMesh{mesh}");
                let line = hidden_float(&name, &format!("Is Active Mesh {mesh}"), 1.0);
                (name, PropertyKind::Float, line)
            }));
        }

        if !self.substitutions.textures.is_empty() {
            properties.push((
                "_OptimizerZero".to_string(),
                PropertyKind::Float,
                hidden_float("_OptimizerZero", "Optimizer Zero", 0.0),
            ));
        }

        properties.extend(
            self.substitutions
                .animated
                .property_lines()
                .into_iter()
                .map(|(name, line)| (name, PropertyKind::Vector, line)),
        );

        properties
    }

    fn start_program(&mut self, text: &str) -> Result<(), RewriteError> {
        let index = self.program_count;
        self.program_count += 1;
        log::debug!("Rewriting program block {index} of {}", self.shader.name);

        let pass = self.shader.passes.get(index).cloned().unwrap_or_default();
        let plan = StagePlan::new(&self.shader.name, &pass, self.options)?;

        let mut seed = preprocessor::light_mode_defines(pass.light_mode.as_deref());
        seed.push((OPTIMIZER_ENABLED.to_string(), true));
        seed.extend(self.options.pass_defines(index));
        let evaluator =
            ConditionalEvaluator::new(seed).with_texture_usage(&self.options.texture_usage);

        let entries = Stage::ALL
            .into_iter()
            .filter(|stage| plan.rewrites(*stage))
            .filter_map(|stage| Some((pass.stage(stage)?.name.clone(), stage)))
            .collect();

        self.emit(text.to_string());
        for line in self.prelude(&plan, &pass) {
            self.emit(line);
        }

        self.program = Some(ProgramState {
            index,
            evaluator,
            plan,
            entries,
            found: BTreeSet::new(),
            brace_depth: 0,
            cbuffer: None,
            cbuffer_pending: false,
            deferred: Vec::new(),
            pending: None,
            body: None,
            declared: Vec::new(),
            emitted_carriers: FxHashSet::default(),
        });

        Ok(())
    }

    /// Get the declarations placed at the start of a program block.
    fn prelude(&self, plan: &StagePlan, pass: &Pass) -> Vec<String> {
        let mut lines = vec![format!("#define {OPTIMIZER_ENABLED}")];

        if plan.decode {
            lines.extend(
                [
                    "static uint optimizerPackedID;",
                    "static uint materialID;",
                    "static uint meshID;",
                ]
                .map(String::from),
            );
        }

        if let Some(meshes) = &plan.toggled_meshes {
            lines.extend(meshes.clone().map(|mesh| format!("float _IsActiveMesh{mesh};")));
        }

        lines.extend(self.substitutions.animated.uniform_declarations());

        let textures = &self.substitutions.textures;
        if !textures.is_empty() {
            lines.push("float _OptimizerZero;".to_string());
            for texture in textures {
                lines.extend(texture.declarations());
                lines.extend(texture.slice_declaration());
            }
            if pass.fragment.is_some() {
                lines.extend(dummy_usage_function(textures));
            }
        }

        lines.extend(
            self.substitutions
                .arrays
                .iter()
                .filter_map(|(name, initializer)| initializer.declaration(name)),
        );

        lines
    }

    fn program_line(&mut self, text: &str) -> Result<(), RewriteError> {
        let Some(mut program) = self.program.take() else {
            return Ok(());
        };

        if include::is_block_end(text) {
            return self.end_program(program, Some(text));
        }

        let result = self.program_statement(&mut program, text);
        self.program = Some(program);
        result
    }

    fn program_statement(
        &mut self,
        program: &mut ProgramState,
        text: &str,
    ) -> Result<(), RewriteError> {
        let mut out = Vec::new();
        let feed = program.evaluator.feed(text, &mut out);
        for line in out {
            self.emit_program(program, line);
        }
        if feed == Feed::Consumed {
            return Ok(());
        }

        if text.starts_with('#') {
            self.emit_program(program, text.to_string());
            return Ok(());
        }

        if program.pending.is_some() {
            return self.signature_line(program, text);
        }

        match text {
            "{" => {
                program.brace_depth += 1;
                if program.cbuffer_pending {
                    program.cbuffer_pending = false;
                    program.cbuffer = Some(program.brace_depth);
                }
                self.buffer().push(text.to_string());
            }
            "}" | "};" => {
                program.brace_depth -= 1;
                if program
                    .body
                    .as_ref()
                    .is_some_and(|(_, depth)| program.brace_depth <= *depth)
                {
                    program.body = None;
                }
                self.buffer().push(text.to_string());
                if program.cbuffer == Some(program.brace_depth + 1) {
                    self.close_cbuffer(program);
                }
            }
            _ => self.statement(program, text),
        }

        Ok(())
    }

    fn statement(&mut self, program: &mut ProgramState, text: &str) {
        if let Some((body, _)) = &program.body {
            let line = body.apply(text);
            self.buffer().push(line);
            return;
        }

        if program.brace_depth == 0
            && !text.ends_with(';')
            && let Some(header) = function::function_header(text)
            && let Some(stage) = program.entries.get(header.name).copied()
        {
            program.pending = Some(PendingEntry {
                stage,
                lines: vec![text.to_string()],
                paren_depth: function::paren_balance(text),
            });
            return;
        }

        if text.starts_with("CBUFFER_START") {
            program.cbuffer = Some(program.brace_depth);
            self.buffer().push(text.to_string());
            return;
        }

        if text.starts_with("CBUFFER_END") {
            self.buffer().push(text.to_string());
            self.close_cbuffer(program);
            return;
        }

        if program.brace_depth == 0 && cbuffer_regex().is_match(text) {
            program.cbuffer_pending = true;
        }

        if program.at_declaration_depth() {
            if self.substitutions.is_texture_declaration(text) {
                return;
            }

            if let Some(line) = self.rewrite_declaration(program, text) {
                match program.cbuffer {
                    Some(..) => program.deferred.push(line),
                    None => self.buffer().push(line),
                }
                return;
            }
        }

        self.buffer().push(text.to_string());
    }

    /// Rewrite the declaration of a substituted property.
    fn rewrite_declaration(&self, program: &mut ProgramState, text: &str) -> Option<String> {
        let captures = uniform_declaration_regex().captures(text)?;
        let (ty, name) = (&captures[1], &captures[2]);

        if let Some(value) = self.substitutions.statics.get(name) {
            return Some(format!("static const {ty} {name} = {};", value.to_hlsl()));
        }

        if self.substitutions.arrays.contains_key(name)
            || self.substitutions.animated.slots.contains_key(name)
        {
            program.declared.push(name.to_string());
            return Some(format!("static {ty} {name};"));
        }

        None
    }

    fn close_cbuffer(&mut self, program: &mut ProgramState) {
        program.cbuffer = None;
        let deferred = std::mem::take(&mut program.deferred);
        self.buffer().extend(deferred);
    }

    fn signature_line(
        &mut self,
        program: &mut ProgramState,
        text: &str,
    ) -> Result<(), RewriteError> {
        let Some(pending) = program.pending.as_mut() else {
            return Ok(());
        };

        if pending.paren_depth > 0 {
            pending.paren_depth += function::paren_balance(text);
            pending.lines.push(text.to_string());
            return Ok(());
        }

        match text {
            "{" => {
                let Some(pending) = program.pending.take() else {
                    return Ok(());
                };
                let stage = pending.stage;
                let rewrite = rewrite_entry(stage, pending.lines, &program.plan)?;
                log::debug!("Rewrote {stage} entry point of program block {}", program.index);
                program.found.insert(stage);

                for carrier in &rewrite.carriers {
                    if program.emitted_carriers.insert(carrier.name) {
                        self.buffer().extend(carrier.definition());
                    }
                }

                let assignments = self.static_assignments(program);
                let buffer = self.buffer();
                buffer.extend(rewrite.signature);
                buffer.push(text.to_string());
                buffer.extend(rewrite.prologue);
                buffer.extend(assignments);

                program.body = Some((rewrite.body, program.brace_depth));
                program.brace_depth += 1;
            }
            // A prototype, not a definition.
            text if text.ends_with(';') => {
                let Some(pending) = program.pending.take() else {
                    return Ok(());
                };
                let buffer = self.buffer();
                buffer.extend(pending.lines);
                buffer.push(text.to_string());
            }
            text => pending.lines.push(text.to_string()),
        }

        Ok(())
    }

    /// Get the assignments of the static globals at the start of an entry point.
    fn static_assignments(&self, program: &ProgramState) -> Vec<String> {
        let substitutions = self.substitutions;
        let mut lines = Vec::new();

        if program
            .declared
            .iter()
            .any(|name| substitutions.animated.slots.contains_key(name))
        {
            lines.extend(substitutions.animated.prologue("meshID"));
        }

        for name in &program.declared {
            if let Some(expression) = substitutions.animated.value_expression(name) {
                lines.push(format!("{name} = {expression};"));
            } else if let Some(initializer) = substitutions.arrays.get(name) {
                lines.push(format!(
                    "{name} = {};",
                    initializer.expression(name, "materialID")
                ));
            }
        }

        lines.extend(
            substitutions
                .textures
                .iter()
                .map(|texture| texture.slice_assignment("materialID")),
        );

        lines
    }

    fn end_program(
        &mut self,
        mut program: ProgramState,
        text: Option<&str>,
    ) -> Result<(), RewriteError> {
        if let Some(pending) = program.pending.take() {
            self.buffer().extend(pending.lines);
        }

        if program.brace_depth != 0 {
            return Err(RewriteError::UnbalancedBraces {
                pass: program.index,
                depth: program.brace_depth,
            });
        }

        if let Some(stage) = Stage::ALL.into_iter().find(|stage| {
            program.entries.values().any(|entry| entry == stage) && !program.found.contains(stage)
        }) {
            return Err(RewriteError::UnresolvedEntryPoint {
                pass: program.index,
                stage,
            });
        }

        self.diagnostics.extend(
            program
                .evaluator
                .diagnostics()
                .iter()
                .map(|diagnostic| format!("Program block {}: {diagnostic}", program.index)),
        );
        if program.evaluator.skipped_lines() > 0 {
            self.diagnostics.push(format!(
                "Program block {}: skipped {} lines in dead conditional arms",
                program.index,
                program.evaluator.skipped_lines()
            ));
        }

        if let Some(text) = text {
            self.buffer().push(text.to_string());
        }
        Ok(())
    }

    fn finish(
        mut self,
        source: Arc<ParsedShader>,
        animated_layout: AnimatedLayout,
    ) -> Result<OptimizedShader, RewriteError> {
        if let Some(program) = self.program.take() {
            self.end_program(program, None)?;
        }

        if !self.shaderlab.has_properties
            && let Some(index) = self.shaderlab.shader_body
        {
            let added = self.added_properties();
            if !added.is_empty() {
                let mut block = vec!["Properties".to_string(), "{".to_string()];
                for (name, kind, line) in added {
                    self.lists.push(kind, name);
                    block.push(line);
                }
                block.push("}".to_string());
                self.main.splice(index..index, block);
            }
        }

        let hash = content_hash(&self.main);
        let name = format!("Hidden/Optimized/{}/{hash:016x}", source.name);
        if let Some(index) = self.shaderlab.shader_line {
            self.main[index] = format!("Shader \"{name}\"");
        }

        self.diagnostics.extend(self.ifex.diagnostics().iter().cloned());
        if self.ifex.dropped_lines() > 0 {
            self.diagnostics.push(format!(
                "Dropped {} lines in #ifex regions",
                self.ifex.dropped_lines()
            ));
        }

        let mut files = vec![GeneratedFile {
            name: format!("{}_{hash:016x}.shader", sanitize_file_name(&source.name)),
            lines: self.main,
        }];
        files.extend(self.chunks);

        Ok(OptimizedShader {
            name,
            content_hash: hash,
            files,
            float_properties: self.lists.float,
            int_properties: self.lists.int,
            vector_properties: self.lists.vector,
            texture_properties: self.lists.texture,
            texture_array_properties: self.lists.texture_array,
            animated_layout,
            diagnostics: self.diagnostics,
            source,
        })
    }
}

fn is_shader_line(line: &str) -> bool {
    line.strip_prefix("Shader")
        .is_some_and(|rest| rest.starts_with(|c: char| c.is_whitespace() || c == '"'))
}
