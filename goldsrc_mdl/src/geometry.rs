use glam::{Vec2, Vec3};
use tracing::trace;

use crate::{
    binary_utils::Cursor,
    components::Component,
    layout::{Mesh, TriangleVertex},
    model::{Bounds, ModelVertex},
    skeleton::Skeleton,
    Error, Result,
};

/// Kind of a run in a mesh's triangle command stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Run {
    Strip,
    Fan,
}

impl Run {
    /// Splits a command into its run kind and vertex count, `None` for the terminator.
    #[must_use]
    pub fn from_command(command: i16) -> Option<(Self, usize)> {
        match command {
            0 => None,
            n if n > 0 => Some((Self::Strip, usize::from(n.unsigned_abs()))),
            n => Some((Self::Fan, usize::from(n.unsigned_abs()))),
        }
    }
}

/// Turns the vertices of one run into triangles, passed to `emit` in order.
///
/// Both kinds start with `(v0, v2, v1)`. Runs of fewer than three vertices emit nothing.
///
/// # Errors
///
/// Returns the first error returned by `emit`.
pub fn assemble_run<T, F>(run: Run, vertices: &[T], mut emit: F) -> Result<()>
where
    T: Copy,
    F: FnMut([T; 3]) -> Result<()>,
{
    let (first, second, third, rest) = match vertices {
        [first, second, third, rest @ ..] => (*first, *second, *third, rest),
        _ => return Ok(()),
    };

    let mut slots = [first, third, second];
    emit(slots)?;

    for (offset, &vertex) in rest.iter().enumerate() {
        match run {
            Run::Strip if (offset + 3) % 2 == 1 => {
                slots[0] = slots[2];
                slots[2] = vertex;
            }
            Run::Strip => {
                slots[0] = slots[1];
                slots[1] = vertex;
            }
            // the first vertex stays the pivot
            Run::Fan => {
                slots[2] = slots[1];
                slots[1] = vertex;
            }
        }
        emit(slots)?;
    }

    Ok(())
}

/// Texture coordinates of a triangle vertex, `t` is flipped.
#[must_use]
pub fn texture_coords(s: i16, t: i16, width: usize, height: usize) -> Vec2 {
    let u = (f32::from(s) + 1.0) * (1.0 / width as f32);
    let v = 1.0 - f32::from(t) * (1.0 / height as f32);
    Vec2::new(u, v)
}

/// Transformed, textured triangle list of one mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedMesh {
    pub vertices: Vec<ModelVertex>,
    /// `None` if the mesh has no triangles.
    pub bounds: Option<Bounds>,
}

impl DecodedMesh {
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.vertices.len() / 3
    }

    /// Sequential indices for the unindexed vertex list.
    #[must_use]
    pub fn indices(&self) -> Vec<u32> {
        (0..self.vertices.len() as u32).collect()
    }
}

/// Vertex positions and bone indices of the sub-model currently being decoded.
///
/// Consecutive meshes of one body part share the tables, so they're only read again when the
/// body part changes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometryCache {
    positions: Vec<Vec3>,
    bone_indices: Vec<u8>,
    owner: Option<usize>,
}

impl GeometryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a cache holding the tables of `component`'s sub-model.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the tables need to be read and can't be.
    pub fn for_component(self, mut cursor: Cursor, component: &Component) -> Result<Self> {
        if self.owner == Some(component.body_part_index) {
            return Ok(self);
        }

        let sub_model = &component.sub_model;
        let vertex_count = sub_model.vertex_count()?;

        cursor.seek(sub_model.vertex_info_offset()?)?;
        let bone_indices = cursor.read_bytes(vertex_count)?.to_vec();

        cursor.seek(sub_model.vertex_offset()?)?;
        let positions = (0..vertex_count)
            .map(|_| cursor.read_vec3().map(Vec3::from))
            .collect::<Result<Vec<_>>>()?;

        trace!(
            "cached {} vertices of body part {}",
            vertex_count,
            component.body_part_index
        );

        Ok(Self {
            positions,
            bone_indices,
            owner: Some(component.body_part_index),
        })
    }

    #[must_use]
    pub fn owner(&self) -> Option<usize> {
        self.owner
    }

    #[must_use]
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    fn model_vertex(
        &self,
        vertex: &TriangleVertex,
        skeleton: &Skeleton,
        texture_size: (usize, usize),
    ) -> Result<ModelVertex> {
        let index = vertex.vertex_index()?;

        let position = *self
            .positions
            .get(index)
            .ok_or(Error::Corrupted("triangle vertex index out of range"))?;
        let bone = *self
            .bone_indices
            .get(index)
            .ok_or(Error::Corrupted("triangle vertex index out of range"))?;
        let transform = skeleton
            .transform(usize::from(bone))
            .ok_or(Error::Corrupted("vertex bone index out of range"))?;

        Ok(ModelVertex {
            position: transform.transform_point(position),
            tex_coords: texture_coords(vertex.s(), vertex.t(), texture_size.0, texture_size.1),
        })
    }

    /// Decodes the triangle command stream of `mesh`.
    ///
    /// `texture_size` is the size of the mesh's skin, used to normalize texture coordinates.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the stream can't be read or references a missing vertex or bone.
    pub fn decode_mesh(
        &self,
        mut cursor: Cursor,
        mesh: &Mesh,
        skeleton: &Skeleton,
        texture_size: (usize, usize),
    ) -> Result<DecodedMesh> {
        let mut decoded = DecodedMesh::default();

        cursor.seek(mesh.triangle_offset()?)?;

        while let Some((run, count)) = Run::from_command(cursor.read_i16()?) {
            let vertices = cursor.read_slice::<TriangleVertex>(count)?;

            assemble_run(run, vertices, |triangle| {
                for vertex in &triangle {
                    let vertex = self.model_vertex(vertex, skeleton, texture_size)?;
                    Bounds::extend(&mut decoded.bounds, vertex.position);
                    decoded.vertices.push(vertex);
                }
                Ok(())
            })?;
        }

        Ok(decoded)
    }
}
