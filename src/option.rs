use crate::utils::err::Warning;

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    TessControl,
    TessEvaluation,
    Geometry,
    Fragment,
    Compute,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::TessControl => "tessellation-control",
            ShaderStage::TessEvaluation => "tessellation-evaluation",
            ShaderStage::Geometry => "geometry",
            ShaderStage::Fragment => "fragment",
            ShaderStage::Compute => "compute",
        };
        write!(f, "{s}")
    }
}

// Input dialect selection. The extended dialect admits a few grammar relaxations of newer
// compiler releases; the strict dialect does not.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InputDialect {
    #[default] Strict,
    Extended,
}

#[derive(Clone, Debug)]
pub struct CompileOptions {
    ///////////////////
    // FRONT-END     //
    ///////////////////

    // Name of the entry-point function.
    pub entry: String,

    // Optional secondary entry point (the patch-constant function of a tessellation-control
    // shader). When absent, the converter falls back to the entry point's
    // "patchconstantfunc" attribute.
    pub secondary_entry: Option<String>,

    // The pipeline stage the source is compiled for.
    pub stage: ShaderStage,

    // Input language dialect.
    pub dialect: InputDialect,

    ///////////////////
    // CODEGEN       //
    ///////////////////

    // Requested output version (110, 120, ..., 460). Features above this version are either
    // covered by an extension directive or rejected.
    pub version: u32,

    // Number of spaces per indentation level in the generated code.
    pub indent: usize,

    // Prefix for generated interface variable names (e.g. "v_" turns the POSITION0 input into
    // "v_POSITION0").
    pub prefix: String,

    // Emit "#line" directives in front of top-level declarations.
    pub line_markers: bool,

    // Print intermediate representations to standard output after each pass.
    pub debug_print: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            entry: "main".to_string(),
            secondary_entry: None,
            stage: ShaderStage::Vertex,
            dialect: InputDialect::default(),
            version: 330,
            indent: 4,
            prefix: "v_".to_string(),
            line_markers: false,
            debug_print: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Binding {
    pub name: String,
    pub slot: usize,
}

// Reflection summary populated during conversion: where uniform buffers and textures were bound
// and which interface variables received explicit locations.
#[derive(Clone, Debug, Default)]
pub struct Statistics {
    pub uniform_bindings: Vec<Binding>,
    pub texture_bindings: Vec<Binding>,
    pub interface_locations: Vec<Binding>,
}

#[derive(Clone, Debug)]
pub struct CompileOutput {
    pub code: String,
    pub stats: Statistics,
    pub warnings: Vec<Warning>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_options() {
        let o = CompileOptions::default();
        assert_eq!(o.entry, "main");
        assert_eq!(o.version, 330);
        assert_eq!(o.stage, ShaderStage::Vertex);
        assert_eq!(o.prefix, "v_");
    }
}
