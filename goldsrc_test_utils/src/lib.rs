//! Writer for synthetic v10 studio models.
//!
//! Everything is laid out after the header in a fixed order: bones, texture infos, texture
//! pixels and palettes, the skin table, body parts, and then per body part its sub-models
//! followed by their meshes, vertex tables and triangle commands.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

const HEADER_SIZE: usize = 244;
const NAME_SIZE: usize = 64;
const BONE_NAME_SIZE: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub struct BoneSpec {
    pub name: String,
    pub parent: i32,
    pub position: [f32; 3],
    pub angles: [f32; 3],
}

impl BoneSpec {
    pub fn new(name: &str, parent: i32, position: [f32; 3], angles: [f32; 3]) -> Self {
        Self {
            name: name.to_owned(),
            parent,
            position,
            angles,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureSpec {
    pub name: String,
    pub flags: u32,
    pub width: i32,
    pub height: i32,
    /// Palette indices, written as is.
    pub pixels: Vec<u8>,
    /// 768 bytes of RGB.
    pub palette: Vec<u8>,
}

impl TextureSpec {
    /// A texture whose pixel `i` uses palette index `i % 256`, with a grayscale palette.
    pub fn new(name: &str, width: i32, height: i32) -> Self {
        let pixel_count = (width.max(0) * height.max(0)) as usize;
        Self {
            name: name.to_owned(),
            flags: 0,
            width,
            height,
            pixels: (0..pixel_count).map(|i| (i % 256) as u8).collect(),
            palette: (0..=255_u8).flat_map(|i| [i, i, i]).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TriVert {
    pub vertex: i16,
    pub normal: i16,
    pub s: i16,
    pub t: i16,
}

impl TriVert {
    pub fn new(vertex: i16, s: i16, t: i16) -> Self {
        Self {
            vertex,
            normal: 0,
            s,
            t,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunSpec {
    Strip(Vec<TriVert>),
    Fan(Vec<TriVert>),
}

impl RunSpec {
    fn vertices(&self) -> &[TriVert] {
        match self {
            Self::Strip(vertices) | Self::Fan(vertices) => vertices,
        }
    }

    fn command(&self) -> i16 {
        let count = self.vertices().len() as i16;
        match self {
            Self::Strip(_) => count,
            Self::Fan(_) => -count,
        }
    }

    fn triangle_count(&self) -> usize {
        self.vertices().len().saturating_sub(2)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MeshSpec {
    pub skin_ref: i32,
    pub runs: Vec<RunSpec>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SubModelSpec {
    pub name: String,
    pub vertices: Vec<[f32; 3]>,
    /// Missing entries are written as bone 0.
    pub bone_indices: Vec<u8>,
    pub meshes: Vec<MeshSpec>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BodyPartSpec {
    pub name: String,
    pub sub_models: Vec<SubModelSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MdlBuilder {
    ident: [u8; 4],
    version: i32,
    name: String,
    flags: u32,
    bones: Vec<BoneSpec>,
    textures: Vec<TextureSpec>,
    skin_table: Option<Vec<i16>>,
    skin_counts: Option<(i32, i32)>,
    body_parts: Vec<BodyPartSpec>,
    patches: Vec<(usize, i32)>,
}

impl Default for MdlBuilder {
    fn default() -> Self {
        Self {
            ident: *b"IDST",
            version: 10,
            name: "test.mdl".to_owned(),
            flags: 0,
            bones: Vec::new(),
            textures: Vec::new(),
            skin_table: None,
            skin_counts: None,
            body_parts: Vec::new(),
            patches: Vec::new(),
        }
    }
}

impl MdlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ident(mut self, ident: [u8; 4]) -> Self {
        self.ident = ident;
        self
    }

    pub fn version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_owned();
        self
    }

    pub fn flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    pub fn bone(mut self, bone: BoneSpec) -> Self {
        self.bones.push(bone);
        self
    }

    pub fn texture(mut self, texture: TextureSpec) -> Self {
        self.textures.push(texture);
        self
    }

    /// Texture index per skin reference. Defaults to one reference per texture, in order.
    pub fn skin_table(mut self, table: Vec<i16>) -> Self {
        self.skin_table = Some(table);
        self
    }

    /// Overrides the skin reference and skin family counts written to the header.
    pub fn skin_counts(mut self, references: i32, families: i32) -> Self {
        self.skin_counts = Some((references, families));
        self
    }

    pub fn body_part(mut self, body_part: BodyPartSpec) -> Self {
        self.body_parts.push(body_part);
        self
    }

    /// Overwrites the `i32` at `offset` after the model is written.
    pub fn patch_i32(mut self, offset: usize, value: i32) -> Self {
        self.patches.push((offset, value));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut buf = vec![0; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.ident);
        LittleEndian::write_i32(&mut buf[4..8], self.version);
        write_name_at(&mut buf, 8, &self.name, NAME_SIZE);
        LittleEndian::write_u32(&mut buf[136..140], self.flags);

        self.write_bones(&mut buf);
        self.write_textures(&mut buf);
        self.write_skin_table(&mut buf);
        self.write_body_parts(&mut buf);

        for &(offset, value) in &self.patches {
            patch_i32(&mut buf, offset, value);
        }

        buf
    }

    fn write_bones(&self, buf: &mut Vec<u8>) {
        patch_i32(buf, 140, self.bones.len() as i32);
        point_here(buf, 144);

        for bone in &self.bones {
            write_name(buf, &bone.name, BONE_NAME_SIZE);
            put_i32(buf, bone.parent);
            put_i32(buf, 0);
            for _ in 0..6 {
                put_i32(buf, -1);
            }
            for value in bone.position.iter().chain(&bone.angles) {
                put_f32(buf, *value);
            }
            for _ in 0..6 {
                put_f32(buf, 1.0);
            }
        }
    }

    fn write_textures(&self, buf: &mut Vec<u8>) {
        patch_i32(buf, 180, self.textures.len() as i32);
        point_here(buf, 184);

        let mut pixel_offsets = Vec::with_capacity(self.textures.len());
        for texture in &self.textures {
            write_name(buf, &texture.name, NAME_SIZE);
            buf.write_u32::<LittleEndian>(texture.flags).unwrap();
            put_i32(buf, texture.width);
            put_i32(buf, texture.height);
            pixel_offsets.push(buf.len());
            put_i32(buf, 0);
        }

        for (texture, offset) in self.textures.iter().zip(pixel_offsets) {
            point_here(buf, offset);
            buf.extend_from_slice(&texture.pixels);
            buf.extend_from_slice(&texture.palette);
        }
    }

    fn write_skin_table(&self, buf: &mut Vec<u8>) {
        let table = self
            .skin_table
            .clone()
            .unwrap_or_else(|| (0..self.textures.len() as i16).collect());
        let (references, families) = self
            .skin_counts
            .unwrap_or((table.len() as i32, i32::from(!table.is_empty())));

        patch_i32(buf, 192, references);
        patch_i32(buf, 196, families);
        point_here(buf, 200);

        for index in table {
            buf.write_i16::<LittleEndian>(index).unwrap();
        }
    }

    fn write_body_parts(&self, buf: &mut Vec<u8>) {
        patch_i32(buf, 204, self.body_parts.len() as i32);
        point_here(buf, 208);

        let mut model_offsets = Vec::with_capacity(self.body_parts.len());
        for body_part in &self.body_parts {
            write_name(buf, &body_part.name, NAME_SIZE);
            put_i32(buf, body_part.sub_models.len() as i32);
            put_i32(buf, 1);
            model_offsets.push(buf.len());
            put_i32(buf, 0);
        }

        for (body_part, offset) in self.body_parts.iter().zip(model_offsets) {
            point_here(buf, offset);
            write_sub_models(buf, &body_part.sub_models);
        }
    }
}

struct SubModelOffsets {
    mesh: usize,
    vertex_info: usize,
    vertex: usize,
}

fn write_sub_models(buf: &mut Vec<u8>, sub_models: &[SubModelSpec]) {
    let mut offsets = Vec::with_capacity(sub_models.len());

    for sub_model in sub_models {
        write_name(buf, &sub_model.name, NAME_SIZE);
        put_i32(buf, 0);
        put_f32(buf, 0.0);

        put_i32(buf, sub_model.meshes.len() as i32);
        let mesh = buf.len();
        put_i32(buf, 0);

        put_i32(buf, sub_model.vertices.len() as i32);
        let vertex_info = buf.len();
        put_i32(buf, 0);
        let vertex = buf.len();
        put_i32(buf, 0);

        // normals and groups
        for _ in 0..5 {
            put_i32(buf, 0);
        }

        offsets.push(SubModelOffsets {
            mesh,
            vertex_info,
            vertex,
        });
    }

    for (sub_model, offsets) in sub_models.iter().zip(offsets) {
        point_here(buf, offsets.mesh);
        let mut triangle_offsets = Vec::with_capacity(sub_model.meshes.len());
        for mesh in &sub_model.meshes {
            let triangle_count: usize = mesh.runs.iter().map(RunSpec::triangle_count).sum();
            put_i32(buf, triangle_count as i32);
            triangle_offsets.push(buf.len());
            put_i32(buf, 0);
            put_i32(buf, mesh.skin_ref);
            put_i32(buf, 0);
            put_i32(buf, 0);
        }

        point_here(buf, offsets.vertex_info);
        for i in 0..sub_model.vertices.len() {
            buf.push(sub_model.bone_indices.get(i).copied().unwrap_or(0));
        }

        point_here(buf, offsets.vertex);
        for vertex in &sub_model.vertices {
            for &component in vertex {
                put_f32(buf, component);
            }
        }

        for (mesh, offset) in sub_model.meshes.iter().zip(triangle_offsets) {
            point_here(buf, offset);
            for run in &mesh.runs {
                put_i16(buf, run.command());
                for vertex in run.vertices() {
                    put_i16(buf, vertex.vertex);
                    put_i16(buf, vertex.normal);
                    put_i16(buf, vertex.s);
                    put_i16(buf, vertex.t);
                }
            }
            put_i16(buf, 0);
        }
    }
}

fn put_i16(buf: &mut Vec<u8>, value: i16) {
    buf.write_i16::<LittleEndian>(value).unwrap();
}

fn put_i32(buf: &mut Vec<u8>, value: i32) {
    buf.write_i32::<LittleEndian>(value).unwrap();
}

fn put_f32(buf: &mut Vec<u8>, value: f32) {
    buf.write_f32::<LittleEndian>(value).unwrap();
}

fn patch_i32(buf: &mut [u8], offset: usize, value: i32) {
    LittleEndian::write_i32(&mut buf[offset..offset + 4], value);
}

/// Points the offset field at `offset` to the end of `buf`.
fn point_here(buf: &mut Vec<u8>, offset: usize) {
    let end = buf.len() as i32;
    patch_i32(buf, offset, end);
}

fn write_name(buf: &mut Vec<u8>, name: &str, size: usize) {
    let start = buf.len();
    buf.resize(start + size, 0);
    write_name_at(buf, start, name, size);
}

fn write_name_at(buf: &mut [u8], offset: usize, name: &str, size: usize) {
    assert!(name.len() < size, "name `{}` is too long", name);
    buf[offset..offset + name.len()].copy_from_slice(name.as_bytes());
}
