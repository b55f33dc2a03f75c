/// Player model geometry
///
/// The model is built from textured cuboids, one unit per skin pixel, feet on
/// the origin and facing +Z. Texture regions follow the standard skin layout:
/// for a box at texture offset (u, v) with size (w, h, d) the faces are
///
/// ```text
///            u+d      u+d+w    u+2d+w   u+2d+2w
///   v        |  top   | bottom |
///   v+d   right | front | left | back |
///   v+d+h
/// ```
///
/// Legacy 64x32 skins have no left limbs and no overlays apart from the hat;
/// their left arm and leg reuse the right ones, mirrored.

use iced_wgpu::wgpu;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// One box of the model
#[derive(Debug, Clone, Copy)]
struct Part {
    /// Top-left of the box's texture region, in texels
    texture: [f32; 2],
    /// Width, height, depth in texels (= model units)
    size: [f32; 3],
    /// Minimum corner in model space
    origin: [f32; 3],
}

const fn part(u: f32, v: f32, size: [f32; 3], origin: [f32; 3]) -> Part {
    Part {
        texture: [u, v],
        size,
        origin,
    }
}

const HEAD: [f32; 3] = [8.0, 8.0, 8.0];
const BODY: [f32; 3] = [8.0, 12.0, 4.0];
const LIMB: [f32; 3] = [4.0, 12.0, 4.0];

const HEAD_AT: [f32; 3] = [-4.0, 24.0, -4.0];
const BODY_AT: [f32; 3] = [-4.0, 12.0, -2.0];
// "Right" is the character's right, which is -X when facing +Z
const RIGHT_ARM_AT: [f32; 3] = [-8.0, 12.0, -2.0];
const LEFT_ARM_AT: [f32; 3] = [4.0, 12.0, -2.0];
const RIGHT_LEG_AT: [f32; 3] = [-4.0, 0.0, -2.0];
const LEFT_LEG_AT: [f32; 3] = [0.0, 0.0, -2.0];

/// Parts present in every skin
const BASE: [Part; 4] = [
    part(0.0, 0.0, HEAD, HEAD_AT),
    part(16.0, 16.0, BODY, BODY_AT),
    part(40.0, 16.0, LIMB, RIGHT_ARM_AT),
    part(0.0, 16.0, LIMB, RIGHT_LEG_AT),
];

const HAT: Part = part(32.0, 0.0, HEAD, HEAD_AT);
const HAT_INFLATE: f32 = 0.5;

const MODERN_LIMBS: [Part; 2] = [
    part(32.0, 48.0, LIMB, LEFT_ARM_AT),
    part(16.0, 48.0, LIMB, LEFT_LEG_AT),
];

const LAYER_INFLATE: f32 = 0.25;

/// Jacket, sleeves and pants
const MODERN_LAYERS: [Part; 5] = [
    part(16.0, 32.0, BODY, BODY_AT),
    part(40.0, 32.0, LIMB, RIGHT_ARM_AT),
    part(48.0, 48.0, LIMB, LEFT_ARM_AT),
    part(0.0, 32.0, LIMB, RIGHT_LEG_AT),
    part(0.0, 48.0, LIMB, LEFT_LEG_AT),
];

/// Right arm and right leg, drawn again mirrored for legacy skins
const LEGACY_MIRRORED: [Part; 2] = [BASE[2], BASE[3]];

pub const VERTICES_PER_CUBOID: usize = 36;

/// Triangle list for the whole model
pub fn build(legacy: bool) -> Vec<Vertex> {
    let texture_height = if legacy { 32.0 } else { 64.0 };
    let mut vertices = Vec::with_capacity(12 * VERTICES_PER_CUBOID);
    let mut push = |part: &Part, inflate: f32, mirrored: bool| {
        push_cuboid(&mut vertices, part, inflate, texture_height, mirrored)
    };

    for base in &BASE {
        push(base, 0.0, false);
    }
    push(&HAT, HAT_INFLATE, false);

    if legacy {
        for limb in &LEGACY_MIRRORED {
            push(limb, 0.0, true);
        }
    } else {
        for limb in &MODERN_LIMBS {
            push(limb, 0.0, false);
        }
        for layer in &MODERN_LAYERS {
            push(layer, LAYER_INFLATE, false);
        }
    }

    vertices
}

fn push_cuboid(
    out: &mut Vec<Vertex>,
    part: &Part,
    inflate: f32,
    texture_height: f32,
    mirrored: bool,
) {
    let [w, h, d] = part.size;
    let [u, v] = part.texture;
    let [x0, y0, z0] = part.origin.map(|c| c - inflate);
    let (x1, y1, z1) = (
        part.origin[0] + w + inflate,
        part.origin[1] + h + inflate,
        part.origin[2] + d + inflate,
    );

    // Corners listed top-left, top-right, bottom-right, bottom-left as seen
    // from outside the box, paired with texture regions (u, v, width, height)
    let faces: [([[f32; 3]; 4], [f32; 4]); 6] = [
        // front (+Z)
        (
            [[x0, y1, z1], [x1, y1, z1], [x1, y0, z1], [x0, y0, z1]],
            [u + d, v + d, w, h],
        ),
        // back (-Z)
        (
            [[x1, y1, z0], [x0, y1, z0], [x0, y0, z0], [x1, y0, z0]],
            [u + 2.0 * d + w, v + d, w, h],
        ),
        // right (-X)
        (
            [[x0, y1, z0], [x0, y1, z1], [x0, y0, z1], [x0, y0, z0]],
            [u, v + d, d, h],
        ),
        // left (+X)
        (
            [[x1, y1, z1], [x1, y1, z0], [x1, y0, z0], [x1, y0, z1]],
            [u + d + w, v + d, d, h],
        ),
        // top (+Y), front edge at the bottom of the region
        (
            [[x0, y1, z0], [x1, y1, z0], [x1, y1, z1], [x0, y1, z1]],
            [u + d, v, w, d],
        ),
        // bottom (-Y)
        (
            [[x0, y0, z1], [x1, y0, z1], [x1, y0, z0], [x0, y0, z0]],
            [u + d + w, v, w, d],
        ),
    ];

    for (corners, [ru, rv, rw, rh]) in faces {
        let uv = [
            [ru, rv],
            [ru + rw, rv],
            [ru + rw, rv + rh],
            [ru, rv + rh],
        ]
        .map(|[tu, tv]| [tu / 64.0, tv / texture_height]);

        for index in [0, 1, 2, 0, 2, 3] {
            let mut position = corners[index];
            if mirrored {
                position[0] = -position[0];
            }
            out.push(Vertex {
                position,
                uv: uv[index],
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_counts() {
        // 6 base parts + 6 overlays
        assert_eq!(build(false).len(), 12 * VERTICES_PER_CUBOID);
        // 4 base parts + hat + 2 mirrored limbs
        assert_eq!(build(true).len(), 7 * VERTICES_PER_CUBOID);
    }

    #[test]
    fn test_uvs_stay_inside_texture() {
        for legacy in [false, true] {
            for vertex in build(legacy) {
                let [u, v] = vertex.uv;
                assert!((0.0..=1.0).contains(&u), "u = {}", u);
                assert!((0.0..=1.0).contains(&v), "v = {}", v);
            }
        }
    }

    #[test]
    fn test_legacy_left_limbs_are_mirrored() {
        let vertices = build(true);
        let mirrored = &vertices[5 * VERTICES_PER_CUBOID..];
        assert!(mirrored.iter().all(|v| v.position[0] >= 0.0));

        let right_arm = &vertices[2 * VERTICES_PER_CUBOID..3 * VERTICES_PER_CUBOID];
        let left_arm = &mirrored[..VERTICES_PER_CUBOID];
        for (right, left) in right_arm.iter().zip(left_arm) {
            assert_eq!(left.position[0], -right.position[0]);
            assert_eq!(left.uv, right.uv);
        }
    }

    #[test]
    fn test_model_is_32_units_tall() {
        let vertices = build(false);
        let base = &vertices[..4 * VERTICES_PER_CUBOID];
        let top = base.iter().map(|v| v.position[1]).fold(f32::MIN, f32::max);
        let bottom = base.iter().map(|v| v.position[1]).fold(f32::MAX, f32::min);
        assert_eq!((bottom, top), (0.0, 32.0));
    }
}
