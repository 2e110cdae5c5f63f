use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use glam::Vec4;
use itertools::Itertools;

use crate::{ParsedShader, PropertyType, RewriteError};

/// Where an animated property lives in the packed registers of a mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimatedSlot {
    pub register: u32,
    /// The component for scalars, [`None`] for vectors using the whole register.
    pub component: Option<u32>,
}

impl AnimatedSlot {
    /// Get the swizzle selecting the slot from its register.
    pub fn swizzle(&self) -> &'static str {
        match self.component {
            Some(0) => ".x",
            Some(1) => ".y",
            Some(2) => ".z",
            Some(3) => ".w",
            _ => "",
        }
    }
}

/// The layout of animated properties in `float4` registers.
///
/// Every merged mesh gets the same registers, so a property lands at the same offset
/// in each mesh whichever mesh animates it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimatedLayout {
    pub meshes: Range<u32>,
    pub registers_per_mesh: u32,
    pub slots: BTreeMap<String, AnimatedSlot>,
    /// Default register contents, from the property defaults.
    pub defaults: Vec<Vec4>,
}

impl AnimatedLayout {
    /// Allocate the registers for the animated properties.
    pub fn new(
        shader: &ParsedShader,
        animated: &BTreeMap<u32, BTreeSet<String>>,
        meshes: Range<u32>,
    ) -> Result<Self, RewriteError> {
        let mut layout = Self {
            meshes,
            ..Default::default()
        };
        let mut scalar_register: Option<(u32, u32)> = None;

        for name in animated.values().flatten() {
            if layout.slots.contains_key(name) {
                continue;
            }

            let property = shader
                .property(name)
                .ok_or_else(|| RewriteError::UnknownProperty(name.clone()))?;
            let default = parse_default(&property.default_value);

            let slot = match property.ty {
                PropertyType::Float | PropertyType::Int => {
                    let (register, component) = match scalar_register {
                        Some((register, component)) if component < 4 => (register, component),
                        _ => (layout.claim_register(), 0),
                    };
                    scalar_register = Some((register, component + 1));
                    layout.defaults[register as usize][component as usize] = default.x;
                    AnimatedSlot {
                        register,
                        component: Some(component),
                    }
                }
                PropertyType::Color | PropertyType::ColorHDR | PropertyType::Vector => {
                    let register = layout.claim_register();
                    layout.defaults[register as usize] = default;
                    AnimatedSlot {
                        register,
                        component: None,
                    }
                }
                ty => {
                    return Err(RewriteError::UnsupportedAnimatedType {
                        property: name.clone(),
                        ty,
                    });
                }
            };

            layout.slots.insert(name.clone(), slot);
        }

        Ok(layout)
    }

    fn claim_register(&mut self) -> u32 {
        self.defaults.push(Vec4::ZERO);
        self.registers_per_mesh += 1;
        self.registers_per_mesh - 1
    }

    /// Whether no property is animated.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Get the uniform name of a register of a mesh.
    pub fn register_name(mesh: u32, register: u32) -> String {
        format!("_OptimizerAnimated{mesh}_{register}")
    }

    /// Get every register uniform name in mesh major order.
    pub fn register_names(&self) -> impl Iterator<Item = String> + '_ {
        self.meshes.clone().flat_map(move |mesh| {
            (0..self.registers_per_mesh).map(move |register| Self::register_name(mesh, register))
        })
    }

    /// Get the register uniform declarations.
    pub fn uniform_declarations(&self) -> Vec<String> {
        self.register_names()
            .map(|name| format!("float4 {name};"))
            .collect()
    }

    /// Get the `Properties` block entries of the registers.
    pub fn property_lines(&self) -> Vec<(String, String)> {
        self.meshes
            .clone()
            .flat_map(|mesh| (0..self.registers_per_mesh).map(move |register| (mesh, register)))
            .map(|(mesh, register)| {
                let name = Self::register_name(mesh, register);
                let default = self.defaults[register as usize];
                let line = format!(
                    "[HideInInspector] {name} (\"Optimizer Animated {mesh} {register}\", Vector) = ({}, {}, {}, {})",
                    default.x, default.y, default.z, default.w
                );
                (name, line)
            })
            .collect()
    }

    /// Get the lines loading the registers of the current mesh into a local array.
    pub fn prologue(&self, mesh_id: &str) -> Vec<String> {
        if self.is_empty() {
            return Vec::new();
        }

        vec![
            format!(
                "float4 optimizerAnimatedRegisters[{}] = {{ {} }};",
                self.meshes.len() * self.registers_per_mesh as usize,
                self.register_names().join(", "),
            ),
            format!(
                "uint optimizerAnimatedBase = ({mesh_id} - {}) * {};",
                self.meshes.start, self.registers_per_mesh
            ),
        ]
    }

    /// Get the expression reading an animated property of the current mesh.
    pub fn value_expression(&self, name: &str) -> Option<String> {
        self.slots.get(name).map(|slot| {
            format!(
                "optimizerAnimatedRegisters[optimizerAnimatedBase + {}]{}",
                slot.register,
                slot.swizzle()
            )
        })
    }
}

/// Parse a property default, `0.5` or `float4(1, 1, 1, 1)`.
fn parse_default(text: &str) -> Vec4 {
    let inner = text
        .trim()
        .strip_prefix("float4(")
        .and_then(|text| text.strip_suffix(')'));

    match inner {
        Some(inner) => {
            let mut components = [0.0; 4];
            for (component, text) in components.iter_mut().zip(inner.split(',')) {
                *component = text.trim().parse().unwrap_or_default();
            }
            Vec4::from_array(components)
        }
        None => Vec4::splat(text.trim().parse().unwrap_or_default()),
    }
}
