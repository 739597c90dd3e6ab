//! On-disk layout of v10 studio models.
//!
//! Header fields are read at fixed offsets, everything else is a fixed-size
//! record located through an absolute offset stored in the header or in a
//! parent record.

use std::{borrow::Cow, mem::size_of};

use bitflags::bitflags;
use glam::Vec3;
use zerocopy::{
    byteorder::{LittleEndian, F32, I16, I32, U32},
    FromBytes, FromZeroes, Unaligned,
};

use crate::{binary_utils::fixed_str, Error, Result};

type LE = LittleEndian;

/// `IDST` read as a little-endian `i32`.
pub const IDENT: i32 = i32::from_le_bytes(*b"IDST");
pub const VERSION: i32 = 10;

pub const HEADER_SIZE: usize = 244;
pub const HEADER_NAME_OFFSET: usize = 8;
pub const HEADER_FLAGS_OFFSET: usize = 136;
pub const HEADER_BONE_COUNT_OFFSET: usize = 140;
pub const HEADER_BONE_OFFSET: usize = HEADER_BONE_COUNT_OFFSET + size_of::<i32>();
pub const HEADER_TEXTURE_COUNT_OFFSET: usize = 180;
pub const HEADER_TEXTURE_INFO_OFFSET: usize = HEADER_TEXTURE_COUNT_OFFSET + size_of::<i32>();
pub const HEADER_SKIN_REFERENCE_COUNT_OFFSET: usize = 192;
pub const HEADER_SKIN_OFFSET: usize = HEADER_SKIN_REFERENCE_COUNT_OFFSET + 2 * size_of::<i32>();
pub const HEADER_BODY_PART_COUNT_OFFSET: usize = 204;
pub const HEADER_BODY_PART_OFFSET: usize = HEADER_BODY_PART_COUNT_OFFSET + size_of::<i32>();

pub const NAME_SIZE: usize = 64;
pub const BONE_NAME_SIZE: usize = 32;

pub const TEXTURE_INFO_SIZE: usize = NAME_SIZE + 4 * size_of::<i32>();
pub const SKIN_REFERENCE_SIZE: usize = size_of::<i16>();
pub const PALETTE_SIZE: usize = 768;
pub const BODY_PART_SIZE: usize = NAME_SIZE + 3 * size_of::<i32>();
pub const SUB_MODEL_SIZE: usize = NAME_SIZE + 11 * size_of::<i32>() + size_of::<f32>();
pub const MESH_SIZE: usize = 5 * size_of::<i32>();
pub const BONE_SIZE: usize = BONE_NAME_SIZE + 8 * size_of::<i32>() + 12 * size_of::<f32>();
pub const TRIANGLE_VERTEX_SIZE: usize = 4 * size_of::<i16>();

/// Sub-models with this name are placeholders without geometry.
pub const BLANK_SUB_MODEL: &str = "blank";

const _: () = assert!(size_of::<TextureInfo>() == TEXTURE_INFO_SIZE);
const _: () = assert!(size_of::<BodyPart>() == BODY_PART_SIZE);
const _: () = assert!(size_of::<SubModel>() == SUB_MODEL_SIZE);
const _: () = assert!(size_of::<Mesh>() == MESH_SIZE);
const _: () = assert!(size_of::<Bone>() == BONE_SIZE);
const _: () = assert!(size_of::<TriangleVertex>() == TRIANGLE_VERTEX_SIZE);

fn to_size(value: i32, error: &'static str) -> Result<usize> {
    value.try_into().map_err(|_| Error::Corrupted(error))
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ModelFlags: u32 {
        const ROCKET = 1 << 0;
        const GRENADE = 1 << 1;
        const GIB = 1 << 2;
        const ROTATE = 1 << 3;
        const TRACER = 1 << 4;
        const ZOMBIE_GIB = 1 << 5;
        const TRACER_2 = 1 << 6;
        const TRACER_3 = 1 << 7;
        const NO_SHADE_LIGHT = 1 << 8;
        const HITBOX_COLLISIONS = 1 << 9;
        const FORCE_SKY_LIGHT = 1 << 10;
        const NO_EMBEDDED_TEXTURES = 1 << 11;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureFlags: u32 {
        const FLAT_SHADE = 1 << 0;
        const CHROME = 1 << 1;
        const FULLBRIGHT = 1 << 2;
        const NO_MIPS = 1 << 3;
        const ALPHA = 1 << 4;
        const ADDITIVE = 1 << 5;
        /// Palette index 255 is transparent.
        const MASKED = 1 << 6;
        const UV_COORDS = 1 << 31;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, FromZeroes, FromBytes, Unaligned)]
#[repr(C)]
pub struct TextureInfo {
    name: [u8; NAME_SIZE],
    flags: U32<LE>,
    width: I32<LE>,
    height: I32<LE>,
    offset: I32<LE>,
}

impl TextureInfo {
    #[must_use]
    pub fn name(&self) -> Cow<str> {
        fixed_str(&self.name)
    }

    #[must_use]
    pub fn flags(&self) -> TextureFlags {
        TextureFlags::from_bits_retain(self.flags.get())
    }

    #[must_use]
    pub fn width(&self) -> i32 {
        self.width.get()
    }

    #[must_use]
    pub fn height(&self) -> i32 {
        self.height.get()
    }

    /// Width and height as sizes.
    ///
    /// # Errors
    ///
    /// Returns `Err` if either dimension is zero or negative.
    pub fn dimensions(&self) -> Result<(usize, usize)> {
        match (self.width(), self.height()) {
            (width, height) if width > 0 && height > 0 => Ok((width as usize, height as usize)),
            _ => Err(Error::Corrupted("texture has non-positive dimensions")),
        }
    }

    /// Absolute offset of the palette-indexed pixel data.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the offset is negative.
    pub fn pixel_offset(&self) -> Result<usize> {
        to_size(self.offset.get(), "texture pixel offset is negative")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, FromZeroes, FromBytes, Unaligned)]
#[repr(C)]
pub struct BodyPart {
    name: [u8; NAME_SIZE],
    model_count: I32<LE>,
    base: I32<LE>,
    model_offset: I32<LE>,
}

impl BodyPart {
    #[must_use]
    pub fn name(&self) -> Cow<str> {
        fixed_str(&self.name)
    }

    /// # Errors
    ///
    /// Returns `Err` if the count is negative.
    pub fn model_count(&self) -> Result<usize> {
        to_size(self.model_count.get(), "body part model count is negative")
    }

    /// # Errors
    ///
    /// Returns `Err` if the offset is negative.
    pub fn model_offset(&self) -> Result<usize> {
        to_size(self.model_offset.get(), "body part model offset is negative")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, FromZeroes, FromBytes, Unaligned)]
#[repr(C)]
pub struct SubModel {
    name: [u8; NAME_SIZE],
    kind: I32<LE>,
    bounding_radius: F32<LE>,

    mesh_count: I32<LE>,
    mesh_offset: I32<LE>,

    vertex_count: I32<LE>,
    vertex_info_offset: I32<LE>,
    vertex_offset: I32<LE>,

    normal_count: I32<LE>,
    normal_info_offset: I32<LE>,
    normal_offset: I32<LE>,

    group_count: I32<LE>,
    group_offset: I32<LE>,
}

impl SubModel {
    #[must_use]
    pub fn name(&self) -> Cow<str> {
        fixed_str(&self.name)
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.name() == BLANK_SUB_MODEL
    }

    /// # Errors
    ///
    /// Returns `Err` if the count is negative.
    pub fn mesh_count(&self) -> Result<usize> {
        to_size(self.mesh_count.get(), "sub-model mesh count is negative")
    }

    /// # Errors
    ///
    /// Returns `Err` if the offset is negative.
    pub fn mesh_offset(&self) -> Result<usize> {
        to_size(self.mesh_offset.get(), "sub-model mesh offset is negative")
    }

    /// # Errors
    ///
    /// Returns `Err` if the count is negative.
    pub fn vertex_count(&self) -> Result<usize> {
        to_size(self.vertex_count.get(), "sub-model vertex count is negative")
    }

    /// Offset of the per-vertex bone index table.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the offset is negative.
    pub fn vertex_info_offset(&self) -> Result<usize> {
        to_size(
            self.vertex_info_offset.get(),
            "sub-model vertex info offset is negative",
        )
    }

    /// Offset of the per-vertex position table.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the offset is negative.
    pub fn vertex_offset(&self) -> Result<usize> {
        to_size(self.vertex_offset.get(), "sub-model vertex offset is negative")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, FromZeroes, FromBytes, Unaligned)]
#[repr(C)]
pub struct Mesh {
    triangle_count: I32<LE>,
    triangle_offset: I32<LE>,
    skin_ref: I32<LE>,
    normal_count: I32<LE>,
    normal_offset: I32<LE>,
}

impl Mesh {
    /// Informational only, the command stream decides how many triangles are decoded.
    #[must_use]
    pub fn triangle_count(&self) -> i32 {
        self.triangle_count.get()
    }

    /// Offset of the triangle command stream.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the offset is negative.
    pub fn triangle_offset(&self) -> Result<usize> {
        to_size(self.triangle_offset.get(), "mesh triangle offset is negative")
    }

    /// # Errors
    ///
    /// Returns `Err` if the skin reference is negative.
    pub fn skin_ref(&self) -> Result<usize> {
        to_size(self.skin_ref.get(), "mesh skin reference is negative")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, FromZeroes, FromBytes, Unaligned)]
#[repr(C)]
pub struct Bone {
    name: [u8; BONE_NAME_SIZE],
    parent: I32<LE>,
    flags: I32<LE>,
    bone_controllers: [I32<LE>; 6],
    value: [F32<LE>; 6],
    scale: [F32<LE>; 6],
}

impl Bone {
    #[must_use]
    pub fn name(&self) -> Cow<str> {
        fixed_str(&self.name)
    }

    /// Raw parent index, negative for root bones.
    #[must_use]
    pub fn parent(&self) -> i32 {
        self.parent.get()
    }

    #[must_use]
    pub fn position(&self) -> Vec3 {
        Vec3::new(self.value[0].get(), self.value[1].get(), self.value[2].get())
    }

    /// Pitch, yaw and roll in radians.
    #[must_use]
    pub fn angles(&self) -> Vec3 {
        Vec3::new(self.value[3].get(), self.value[4].get(), self.value[5].get())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromZeroes, FromBytes, Unaligned)]
#[repr(C)]
pub struct TriangleVertex {
    vertex_index: I16<LE>,
    normal_index: I16<LE>,
    s: I16<LE>,
    t: I16<LE>,
}

impl TriangleVertex {
    /// # Errors
    ///
    /// Returns `Err` if the index is negative.
    pub fn vertex_index(&self) -> Result<usize> {
        self.vertex_index
            .get()
            .try_into()
            .map_err(|_| Error::Corrupted("triangle vertex index is negative"))
    }

    #[must_use]
    pub fn s(&self) -> i16 {
        self.s.get()
    }

    #[must_use]
    pub fn t(&self) -> i16 {
        self.t.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ident_matches_packed_ascii() {
        let packed = (i32::from(b'T') << 24)
            + (i32::from(b'S') << 16)
            + (i32::from(b'D') << 8)
            + i32::from(b'I');
        assert_eq!(IDENT, packed);
    }

    #[test]
    fn header_offsets() {
        assert_eq!(HEADER_BONE_OFFSET, 144);
        assert_eq!(HEADER_TEXTURE_INFO_OFFSET, 184);
        assert_eq!(HEADER_SKIN_OFFSET, 200);
        assert_eq!(HEADER_BODY_PART_OFFSET, 208);
    }

    #[test]
    fn flags_keep_unknown_bits() {
        let flags = TextureFlags::from_bits_retain(0x40 | 0x100);
        assert!(flags.contains(TextureFlags::MASKED));
        assert_eq!(flags.bits(), 0x140);
    }
}
