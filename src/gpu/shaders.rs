/// WGSL shader code for the skin preview
///
/// One pipeline draws every cuboid of the player model. Overlay layers share
/// the pipeline; their transparent texels are discarded so the base layer
/// shows through.

/// Textured, depth-tested cuboids with alpha-cutout
pub const SKIN_SHADER: &str = r#"
// ========== Vertex Shader ==========

struct CameraUniform {
    view_proj: mat4x4<f32>,
}

@group(0) @binding(0)
var<uniform> camera: CameraUniform;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) uv: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var output: VertexOutput;
    output.clip_position = camera.view_proj * vec4<f32>(input.position, 1.0);
    output.uv = input.uv;
    return output;
}

// ========== Fragment Shader ==========

@group(1) @binding(0)
var skin_texture: texture_2d<f32>;
@group(1) @binding(1)
var skin_sampler: sampler;

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let color = textureSample(skin_texture, skin_sampler, input.uv);

    // Skins are cut-out art: texels are either opaque or absent
    if (color.a < 0.5) {
        discard;
    }

    return vec4<f32>(color.rgb, 1.0);
}
"#;

/// Get the shader source code for the skin pipeline
pub fn get_shader() -> &'static str {
    SKIN_SHADER
}
