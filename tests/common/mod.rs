//! Shared fixtures for the end-to-end tests: hand-assembled GLB assets.

use glbopt::codec::assemble;
use glbopt::document::*;
use glbopt::primitive::POSITION;

pub struct AssetBuilder {
    pub document: Document,
    pub bin: Vec<u8>,
}

impl AssetBuilder {
    pub fn new() -> Self {
        Self {
            document: Document {
                asset: AssetInfo::default(),
                scene: Some(0),
                scenes: vec![Scene {
                    name: None,
                    nodes: vec![0],
                }],
                nodes: vec![Node {
                    mesh: Some(0),
                    ..Default::default()
                }],
                buffers: vec![Buffer {
                    byte_length: 0,
                    uri: None,
                    name: None,
                }],
                ..Default::default()
            },
            bin: Vec::new(),
        }
    }

    fn align(&mut self) {
        while self.bin.len() % 4 != 0 {
            self.bin.push(0);
        }
    }

    /// Append raw bytes as a buffer view; returns the view index.
    pub fn push_view(&mut self, bytes: &[u8]) -> usize {
        self.align();
        let offset = self.bin.len();
        self.bin.extend_from_slice(bytes);
        self.document.buffer_views.push(BufferView {
            buffer: 0,
            byte_offset: offset,
            byte_length: bytes.len(),
            ..Default::default()
        });
        self.document.buffer_views.len() - 1
    }

    pub fn push_f32_accessor(&mut self, data: &[f32], element_type: &str) -> usize {
        let comps = match element_type {
            "SCALAR" => 1,
            "VEC2" => 2,
            "VEC3" => 3,
            "VEC4" => 4,
            "MAT4" => 16,
            other => panic!("unsupported element type {other}"),
        };
        let bytes: Vec<u8> = data.iter().flat_map(|f| f.to_le_bytes()).collect();
        let view = self.push_view(&bytes);
        self.document.accessors.push(Accessor {
            buffer_view: Some(view),
            byte_offset: 0,
            component_type: 5126,
            count: data.len() / comps,
            element_type: element_type.to_string(),
            normalized: false,
            min: None,
            max: None,
            name: None,
        });
        self.document.accessors.len() - 1
    }

    pub fn push_index_accessor(&mut self, indices: &[u32]) -> usize {
        let bytes: Vec<u8> = indices.iter().flat_map(|i| i.to_le_bytes()).collect();
        let view = self.push_view(&bytes);
        self.document.accessors.push(Accessor {
            buffer_view: Some(view),
            byte_offset: 0,
            component_type: 5125,
            count: indices.len(),
            element_type: "SCALAR".to_string(),
            normalized: false,
            min: None,
            max: None,
            name: None,
        });
        self.document.accessors.len() - 1
    }

    pub fn push_mesh(
        &mut self,
        positions: usize,
        indices: Option<usize>,
        material: Option<usize>,
    ) -> usize {
        let mut prim = Primitive::default();
        prim.attributes.insert(POSITION.to_string(), positions);
        prim.indices = indices;
        prim.material = material;
        self.document.meshes.push(Mesh {
            name: None,
            primitives: vec![prim],
            weights: None,
        });
        self.document.meshes.len() - 1
    }

    pub fn build(mut self) -> Vec<u8> {
        self.align();
        self.document.buffers[0].byte_length = self.bin.len();
        let json = serde_json::to_vec(&self.document).expect("document serializes");
        assemble(&json, Some(&self.bin))
    }
}

/// One triangle at (0,0,0), (1,0,0), (0,1,0).
pub fn triangle_glb() -> Vec<u8> {
    let mut builder = AssetBuilder::new();
    let positions = builder.push_f32_accessor(
        &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
        "VEC3",
    );
    let indices = builder.push_index_accessor(&[0, 1, 2]);
    builder.push_mesh(positions, Some(indices), None);
    builder.build()
}

/// A flat grid plane with `(size-1)^2 * 2` triangles.
pub fn plane_glb(size: usize) -> Vec<u8> {
    let (positions, indices) = plane_arrays(size);
    let mut builder = AssetBuilder::new();
    let pos = builder.push_f32_accessor(&positions, "VEC3");
    let idx = builder.push_index_accessor(&indices);
    builder.push_mesh(pos, Some(idx), None);
    builder.build()
}

pub fn plane_arrays(size: usize) -> (Vec<f32>, Vec<u32>) {
    let mut positions = Vec::new();
    for y in 0..size {
        for x in 0..size {
            positions.extend_from_slice(&[x as f32, y as f32, 0.0]);
        }
    }
    let mut indices = Vec::new();
    for y in 0..size - 1 {
        for x in 0..size - 1 {
            let tl = (y * size + x) as u32;
            let tr = tl + 1;
            let bl = tl + size as u32;
            let br = bl + 1;
            indices.extend_from_slice(&[tl, bl, tr, tr, bl, br]);
        }
    }
    (positions, indices)
}

/// Unit-cube geometry with per-face UVs: 24 vertices over 8 positions, 12
/// triangles. Every vertex is a UV seam.
pub fn cube_arrays() -> (Vec<f32>, Vec<f32>, Vec<u32>) {
    let faces: [[[f32; 3]; 4]; 6] = [
        // +X
        [[1., 0., 0.], [1., 1., 0.], [1., 1., 1.], [1., 0., 1.]],
        // -X
        [[0., 0., 1.], [0., 1., 1.], [0., 1., 0.], [0., 0., 0.]],
        // +Y
        [[0., 1., 0.], [0., 1., 1.], [1., 1., 1.], [1., 1., 0.]],
        // -Y
        [[0., 0., 1.], [0., 0., 0.], [1., 0., 0.], [1., 0., 1.]],
        // +Z
        [[0., 0., 1.], [1., 0., 1.], [1., 1., 1.], [0., 1., 1.]],
        // -Z
        [[1., 0., 0.], [0., 0., 0.], [0., 1., 0.], [1., 1., 0.]],
    ];

    let mut positions = Vec::new();
    let mut uvs = Vec::new();
    let mut indices = Vec::new();
    for (f, corners) in faces.iter().enumerate() {
        let base = (f * 4) as u32;
        for (c, p) in corners.iter().enumerate() {
            positions.extend_from_slice(p);
            let (u, v) = match c {
                0 => (0.0, 0.0),
                1 => (1.0, 0.0),
                2 => (1.0, 1.0),
                _ => (0.0, 1.0),
            };
            uvs.extend_from_slice(&[u, v]);
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    (positions, uvs, indices)
}

/// PNG bytes of a fine checkerboard (strong edges everywhere).
pub fn checker_png(size: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_fn(size, size, |x, y| {
        if (x + y) % 2 == 0 {
            image::Rgba([255, 255, 255, 255])
        } else {
            image::Rgba([0, 0, 0, 255])
        }
    });
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// Cube asset with a checkerboard base-color texture bound.
pub fn textured_cube_glb() -> Vec<u8> {
    let (positions, uvs, indices) = cube_arrays();
    let mut builder = AssetBuilder::new();
    let pos = builder.push_f32_accessor(&positions, "VEC3");
    let uv = builder.push_f32_accessor(&uvs, "VEC2");
    let idx = builder.push_index_accessor(&indices);

    let png = checker_png(64);
    let image_view = builder.push_view(&png);
    builder.document.images.push(Image {
        uri: None,
        mime_type: Some("image/png".to_string()),
        buffer_view: Some(image_view),
        name: None,
    });
    builder.document.textures.push(Texture {
        sampler: None,
        source: Some(0),
        name: None,
    });
    builder.document.materials.push(Material {
        pbr_metallic_roughness: Some(PbrMetallicRoughness {
            base_color_texture: Some(TextureInfo {
                index: 0,
                tex_coord: 0,
                extensions: None,
            }),
            ..Default::default()
        }),
        ..Default::default()
    });

    let mesh = builder.push_mesh(pos, Some(idx), Some(0));
    builder.document.meshes[mesh].primitives[0]
        .attributes
        .insert("TEXCOORD_0".to_string(), uv);
    builder.build()
}

/// Plane asset with one animation channel and one skin.
pub fn animated_plane_glb() -> Vec<u8> {
    let (positions, indices) = plane_arrays(3);
    let mut builder = AssetBuilder::new();
    let pos = builder.push_f32_accessor(&positions, "VEC3");
    let idx = builder.push_index_accessor(&indices);
    builder.push_mesh(pos, Some(idx), None);

    let times = builder.push_f32_accessor(&[0.0, 1.0], "SCALAR");
    let values = builder.push_f32_accessor(&[0.0, 0.0, 0.0, 0.0, 2.0, 0.0], "VEC3");
    builder.document.animations.push(Animation {
        name: Some("hover".to_string()),
        channels: vec![AnimationChannel {
            sampler: 0,
            target: AnimationTarget {
                node: Some(0),
                path: "translation".to_string(),
            },
        }],
        samplers: vec![AnimationSampler {
            input: times,
            output: values,
            interpolation: Some("LINEAR".to_string()),
        }],
    });

    let mut ibm = [0.0f32; 16];
    ibm[0] = 1.0;
    ibm[5] = 1.0;
    ibm[10] = 1.0;
    ibm[15] = 1.0;
    let ibm_accessor = builder.push_f32_accessor(&ibm, "MAT4");
    builder.document.skins.push(Skin {
        name: None,
        inverse_bind_matrices: Some(ibm_accessor),
        skeleton: None,
        joints: vec![0],
    });

    builder.build()
}
