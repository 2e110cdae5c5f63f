//! Rewriting of stage entry points to decode the packed material and mesh ID.

use std::ops::Range;
use std::sync::OnceLock;

use itertools::Itertools;
use regex::Regex;

use crate::{Function, Pass, RewriteError, RewriteOptions, Stage, function};

/// The semantic carrying the packed ID between stages.
pub const PACKED_ID_SEMANTIC: &str = "OPTIMIZER_PACKED_ID";

const VERTEX_CARRIER: &str = "OptimizerVertexOutput";
const GEOMETRY_CARRIER: &str = "OptimizerGeometryOutput";

fn return_regex() -> &'static Regex {
    static RETURN_REGEX: OnceLock<Regex> = OnceLock::new();
    RETURN_REGEX.get_or_init(|| Regex::new(r"^(.*?\breturn\s+)(.+);$").expect("Invalid return regex"))
}

fn void_parameters_regex() -> &'static Regex {
    static VOID_PARAMETERS_REGEX: OnceLock<Regex> = OnceLock::new();
    VOID_PARAMETERS_REGEX
        .get_or_init(|| Regex::new(r"\(\s*void\s*\)").expect("Invalid void parameters regex"))
}

fn stream_type_regex() -> &'static Regex {
    static STREAM_TYPE_REGEX: OnceLock<Regex> = OnceLock::new();
    STREAM_TYPE_REGEX.get_or_init(|| {
        Regex::new(r"^(?:Point|Line|Triangle)Stream\s*<\s*([A-Za-z_][A-Za-z0-9_]*)\s*>$")
            .expect("Invalid stream type regex")
    })
}

/// The ID lines shared by every prologue once `optimizerPackedID` is known.
fn decode_lines() -> [String; 2] {
    [
        "materialID = optimizerPackedID & 0xFFF;".to_string(),
        "meshID = optimizerPackedID >> 12;".to_string(),
    ]
}

/// A synthetic struct carrying a stage output together with the packed ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Carrier {
    pub name: &'static str,
    pub payload: String,
    pub semantic: Option<String>,
}

impl Carrier {
    fn wrap_function(&self) -> String {
        format!("optimizerWrap{}", self.name.trim_start_matches("Optimizer"))
    }

    /// Get the struct and wrapping function definitions.
    pub fn definition(&self) -> Vec<String> {
        let semantic = self
            .semantic
            .as_ref()
            .map(|semantic| format!(" : {semantic}"))
            .unwrap_or_default();

        vec![
            format!("struct {}", self.name),
            "{".to_string(),
            format!("{} payload{semantic};", self.payload),
            format!("nointerpolation uint optimizerPackedID : {PACKED_ID_SEMANTIC};"),
            "};".to_string(),
            format!(
                "{name} {wrap}({payload} payload, uint id) {{ {name} output; output.payload = payload; output.optimizerPackedID = id; return output; }}",
                name = self.name,
                wrap = self.wrap_function(),
                payload = self.payload,
            ),
        ]
    }
}

/// How the ID reaches each stage of one pass.
#[derive(Debug, Clone)]
pub struct StagePlan {
    /// Whether the vertex stage decodes the packed ID.
    pub decode: bool,
    /// Whether stages after the vertex stage need the ID.
    pub carry: bool,
    pub texcoord: u32,
    /// Meshes with an activity toggle, when more than one is merged.
    pub toggled_meshes: Option<Range<u32>>,
    pub vertex_carrier: Option<Carrier>,
    pub geometry_carrier: Option<Carrier>,
    pub has_textures: bool,
}

impl StagePlan {
    /// Plan the rewrite of a pass.
    pub fn new(shader_name: &str, pass: &Pass, options: &RewriteOptions) -> Result<Self, RewriteError> {
        let carry = options.needs_id_in_later_stages();
        let decode = options.needs_packed_id();

        if carry && pass.has_tessellation() {
            return Err(RewriteError::UnsupportedTessellation(shader_name.to_string()));
        }

        let vertex = pass.vertex.as_ref();
        let vertex_return = vertex
            .and_then(Function::return_parameter)
            .filter(|parameter| parameter.ty != "void");

        let vertex_carrier = vertex_return.filter(|_| carry).map(|parameter| Carrier {
            name: VERTEX_CARRIER,
            payload: parameter.ty.clone(),
            semantic: parameter.semantic.clone(),
        });

        let geometry_payload = pass
            .geometry
            .as_ref()
            .and_then(|geometry| stream_parameter(geometry).map(|(_, payload)| payload));

        if carry && let Some(geometry) = &pass.geometry {
            if vertex_carrier.is_none() {
                return Err(RewriteError::UnsupportedStageSignature {
                    stage: Stage::Vertex,
                    name: vertex.map(|vertex| vertex.name.clone()).unwrap_or_default(),
                    reason: "a void vertex stage cannot feed a geometry stage the packed ID",
                });
            }
            if geometry_payload.is_none() {
                return Err(RewriteError::UnsupportedStageSignature {
                    stage: Stage::Geometry,
                    name: geometry.name.clone(),
                    reason: "no output stream parameter",
                });
            }
        }

        let geometry_carrier = geometry_payload
            .as_ref()
            .filter(|_| carry)
            .map(|payload| Carrier {
                name: GEOMETRY_CARRIER,
                payload: payload.clone(),
                semantic: None,
            });

        Ok(Self {
            decode,
            carry,
            texcoord: options.packed_id_texcoord,
            toggled_meshes: (options.mesh_count() > 1).then(|| options.merged_meshes.clone()),
            vertex_carrier,
            geometry_carrier,
            has_textures: !options.merged_textures.is_empty(),
        })
    }

    /// Whether the entry point of a stage is rewritten.
    pub fn rewrites(&self, stage: Stage) -> bool {
        match stage {
            Stage::Vertex => self.decode,
            Stage::Geometry | Stage::Fragment => self.carry,
            Stage::Hull | Stage::Domain => false,
        }
    }

    /// Get the carrier the fragment stage input arrives in.
    fn fragment_carrier(&self) -> Option<&Carrier> {
        self.geometry_carrier.as_ref().or(self.vertex_carrier.as_ref())
    }
}

/// Find the output stream parameter of a geometry function, with its payload type.
fn stream_parameter(function: &Function) -> Option<(String, String)> {
    function.arguments().iter().find_map(|parameter| {
        stream_type_regex()
            .captures(&parameter.ty)
            .map(|captures| (parameter.name.clone(), captures[1].to_string()))
    })
}

/// How the body of a rewritten entry point is changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyRewrite {
    None,
    /// Every `return x;` wraps `x` in the vertex carrier.
    WrapReturn,
    /// Every `<stream>.Append(x)` wraps `x` in the geometry carrier.
    WrapAppend { stream: String },
}

impl BodyRewrite {
    /// Rewrite one body line.
    pub fn apply(&self, line: &str) -> String {
        match self {
            Self::None => line.to_string(),
            Self::WrapReturn => match return_regex().captures(line) {
                Some(captures) => format!(
                    "{}optimizerWrapVertexOutput({}, optimizerPackedID);",
                    &captures[1], &captures[2]
                ),
                None => line.to_string(),
            },
            Self::WrapAppend { stream } => wrap_append(line, stream),
        }
    }
}

fn wrap_append(line: &str, stream: &str) -> String {
    let call = format!("{stream}.Append(");
    let Some(start) = line.find(&call) else {
        return line.to_string();
    };
    let argument_start = start + call.len();
    let Some(close) = function::matching_paren(line, argument_start) else {
        return line.to_string();
    };

    format!(
        "{}optimizerWrapGeometryOutput({}, optimizerPackedID){}",
        &line[..argument_start],
        &line[argument_start..close],
        &line[close..]
    )
}

/// The rewrite of one entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRewrite {
    /// Carriers the signature refers to.
    pub carriers: Vec<Carrier>,
    pub signature: Vec<String>,
    /// Lines to insert at the start of the body.
    pub prologue: Vec<String>,
    pub body: BodyRewrite,
}

/// Rewrite the signature of the entry point of `stage`.
///
/// `signature` holds the logical lines from the return type up to but excluding the
/// opening brace of the body, possibly with preprocessor lines between parameters.
pub fn rewrite_entry(
    stage: Stage,
    signature: Vec<String>,
    plan: &StagePlan,
) -> Result<EntryRewrite, RewriteError> {
    let code = signature
        .iter()
        .filter(|line| !line.starts_with('#'))
        .join(" ");
    let function = function::parse_function(&code, signature.clone())
        .ok_or_else(|| RewriteError::MalformedFunction(code.clone()))?;

    let mut rewrite = EntryRewrite {
        carriers: Vec::new(),
        signature,
        prologue: Vec::new(),
        body: BodyRewrite::None,
    };

    if let Some(first) = rewrite.signature.first_mut() {
        *first = void_parameters_regex().replace(first, "()").into_owned();
    }

    match stage {
        Stage::Vertex => rewrite_vertex(&function, plan, &mut rewrite)?,
        Stage::Geometry => rewrite_geometry(&function, plan, &mut rewrite)?,
        Stage::Fragment => rewrite_fragment(&function, plan, &mut rewrite)?,
        Stage::Hull | Stage::Domain => {}
    }

    Ok(rewrite)
}

fn rewrite_vertex(
    function: &Function,
    plan: &StagePlan,
    rewrite: &mut EntryRewrite,
) -> Result<(), RewriteError> {
    let has_arguments = !function.arguments().is_empty();
    let mut return_type = function.return_type().to_string();

    if plan.carry {
        match &plan.vertex_carrier {
            Some(carrier) => {
                remove_return_semantic(&mut rewrite.signature);
                replace_return_type(&mut rewrite.signature, carrier.name);
                return_type = carrier.name.to_string();
                rewrite.carriers.push(carrier.clone());
                rewrite.body = BodyRewrite::WrapReturn;
            }
            None => append_parameter(
                &mut rewrite.signature,
                &format!("out nointerpolation uint optimizerPackedIDOut : {PACKED_ID_SEMANTIC}"),
                true,
            ),
        }
    }

    prepend_parameter(
        &mut rewrite.signature,
        &format!("float4 optimizerPackedUV : TEXCOORD{}", plan.texcoord),
        has_arguments,
    )
    .ok_or_else(|| RewriteError::MalformedFunction(function.name.clone()))?;

    rewrite
        .prologue
        .push("optimizerPackedID = (uint)optimizerPackedUV.x;".to_string());
    if plan.carry && plan.vertex_carrier.is_none() {
        rewrite
            .prologue
            .push("optimizerPackedIDOut = optimizerPackedID;".to_string());
    }
    rewrite.prologue.extend(decode_lines());

    if let Some(meshes) = &plan.toggled_meshes {
        rewrite.prologue.push(format!(
            "float optimizerMeshActive[{}] = {{ {} }};",
            meshes.len(),
            meshes.clone().map(|mesh| format!("_IsActiveMesh{mesh}")).join(", ")
        ));
        rewrite.prologue.push(format!(
            "if (optimizerMeshActive[meshID - {}] < 0.5)",
            meshes.start
        ));
        rewrite.prologue.push("{".to_string());
        match return_type.as_str() {
            "void" => {
                rewrite.prologue.extend(
                    function
                        .arguments()
                        .iter()
                        .filter(|parameter| {
                            parameter.modifiers.iter().any(|modifier| modifier == "out")
                                && parameter.array_size.is_none()
                        })
                        .map(|parameter| format!("{} = ({})0;", parameter.name, parameter.ty)),
                );
                rewrite.prologue.push("return;".to_string());
            }
            ty => rewrite.prologue.push(format!("return ({ty})0;")),
        }
        rewrite.prologue.push("}".to_string());
    }

    Ok(())
}

fn rewrite_geometry(
    function: &Function,
    plan: &StagePlan,
    rewrite: &mut EntryRewrite,
) -> Result<(), RewriteError> {
    let unsupported = |reason| RewriteError::UnsupportedStageSignature {
        stage: Stage::Geometry,
        name: function.name.clone(),
        reason,
    };

    let (Some(vertex_carrier), Some(geometry_carrier)) =
        (&plan.vertex_carrier, &plan.geometry_carrier)
    else {
        return Err(unsupported("no carrier for the packed ID"));
    };

    let input = function
        .arguments()
        .iter()
        .find(|parameter| parameter.array_size.is_some() && parameter.ty == vertex_carrier.payload)
        .ok_or_else(|| unsupported("no input array of the vertex output type"))?;
    let size = input.array_size.clone().unwrap_or_default();

    let (stream, payload) =
        stream_parameter(function).ok_or_else(|| unsupported("no output stream parameter"))?;

    replace_parameter(
        &mut rewrite.signature,
        &input.ty,
        &input.name,
        &format!("{} optimizerGeometryInput", vertex_carrier.name),
    )
    .ok_or_else(|| unsupported("cannot locate the input array"))?;
    replace_stream_payload(&mut rewrite.signature, &payload, geometry_carrier.name)
        .ok_or_else(|| unsupported("cannot locate the output stream"))?;

    rewrite.carriers.push(vertex_carrier.clone());
    rewrite.carriers.push(geometry_carrier.clone());
    rewrite.body = BodyRewrite::WrapAppend { stream };

    rewrite.prologue.extend([
        format!("{} {}[{size}];", input.ty, input.name),
        format!(
            "for (uint optimizerIndex = 0; optimizerIndex < {size}; optimizerIndex++) {}[optimizerIndex] = optimizerGeometryInput[optimizerIndex].payload;",
            input.name
        ),
        "optimizerPackedID = optimizerGeometryInput[0].optimizerPackedID;".to_string(),
    ]);
    rewrite.prologue.extend(decode_lines());

    Ok(())
}

fn rewrite_fragment(
    function: &Function,
    plan: &StagePlan,
    rewrite: &mut EntryRewrite,
) -> Result<(), RewriteError> {
    let input = plan.fragment_carrier().and_then(|carrier| {
        function
            .arguments()
            .iter()
            .find(|parameter| {
                parameter.ty == carrier.payload
                    && parameter.semantic.is_none()
                    && parameter.array_size.is_none()
                    && !parameter.is_output
            })
            .map(|parameter| (carrier, parameter))
    });

    let unwrapped = input.and_then(|(carrier, parameter)| {
        replace_parameter(
            &mut rewrite.signature,
            &parameter.ty,
            &parameter.name,
            &format!("{} optimizerInput", carrier.name),
        )?;
        Some((carrier, parameter))
    });

    match unwrapped {
        Some((carrier, parameter)) => {
            rewrite.carriers.push(carrier.clone());
            rewrite.prologue.extend([
                format!("{} {} = optimizerInput.payload;", parameter.ty, parameter.name),
                "optimizerPackedID = optimizerInput.optimizerPackedID;".to_string(),
            ]);
        }
        None => {
            append_parameter(
                &mut rewrite.signature,
                &format!("nointerpolation uint optimizerPackedIDIn : {PACKED_ID_SEMANTIC}"),
                !function.arguments().is_empty(),
            );
            rewrite
                .prologue
                .push("optimizerPackedID = optimizerPackedIDIn;".to_string());
        }
    }

    rewrite.prologue.extend(decode_lines());
    if plan.has_textures {
        rewrite
            .prologue
            .push(super::texture::DUMMY_USAGE_BRANCH.to_string());
    }

    Ok(())
}

/// Locate the parenthesis closing the parameter list as (line, byte offset).
fn close_paren(lines: &[String]) -> Option<(usize, usize)> {
    let header = function::function_header(lines.first()?)?;
    let mut depth = 1i32;

    for (index, line) in lines.iter().enumerate() {
        if line.starts_with('#') {
            continue;
        }
        let start = if index == 0 { header.open_paren_end } else { 0 };
        for (offset, c) in line[start..].char_indices() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some((index, start + offset));
                    }
                }
                _ => {}
            }
        }
    }

    None
}

fn prepend_parameter(lines: &mut [String], parameter: &str, has_arguments: bool) -> Option<()> {
    let header = function::function_header(lines.first()?)?;
    let position = header.open_paren_end;
    let text = match has_arguments {
        true => format!("{parameter}, "),
        false => parameter.to_string(),
    };
    lines.first_mut()?.insert_str(position, &text);
    Some(())
}

fn append_parameter(lines: &mut [String], parameter: &str, has_arguments: bool) {
    let Some((index, position)) = close_paren(lines) else {
        return;
    };
    let text = match has_arguments {
        true => format!(", {parameter}"),
        false => parameter.to_string(),
    };
    lines[index].insert_str(position, &text);
}

fn remove_return_semantic(lines: &mut Vec<String>) {
    let Some((index, position)) = close_paren(lines) else {
        return;
    };

    if lines[index][position + 1..].trim_start().starts_with(':') {
        lines[index].truncate(position + 1);
    } else if lines
        .get(index + 1)
        .is_some_and(|next| next.trim_start().starts_with(':'))
    {
        lines.remove(index + 1);
    }
}

fn replace_return_type(lines: &mut [String], return_type: &str) {
    let Some(first) = lines.first_mut() else {
        return;
    };
    let Some((start, end)) =
        function::function_header(first).map(|header| header.return_type_range)
    else {
        return;
    };
    first.replace_range(start..end, return_type);
}

fn replace_parameter(lines: &mut [String], ty: &str, name: &str, replacement: &str) -> Option<()> {
    let pattern = Regex::new(&format!(
        r"\b{}\s+{}\b",
        regex::escape(ty),
        regex::escape(name)
    ))
    .ok()?;
    replace_first(lines, &pattern, replacement)
}

fn replace_stream_payload(lines: &mut [String], payload: &str, replacement: &str) -> Option<()> {
    let pattern = Regex::new(&format!(
        r"(Stream\s*<\s*){}(\s*>)",
        regex::escape(payload)
    ))
    .ok()?;
    replace_first(lines, &pattern, &format!("${{1}}{replacement}${{2}}"))
}

fn replace_first(lines: &mut [String], pattern: &Regex, replacement: &str) -> Option<()> {
    let line = lines
        .iter_mut()
        .filter(|line| !line.starts_with('#'))
        .find(|line| pattern.is_match(line))?;
    *line = pattern.replace(line, replacement).into_owned();
    Some(())
}
