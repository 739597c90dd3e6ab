//! The decoded model and the sink trait the parser writes into.

use std::collections::BTreeMap;

use glam::{Vec2, Vec3};

use crate::{texture::Texture, Error, Result};

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    #[must_use]
    pub fn from_point(point: Vec3) -> Self {
        Self {
            min: point,
            max: point,
        }
    }

    pub fn add_point(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    #[must_use]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Grows `bounds` to include `point`, starting a new box if there is none yet.
    pub fn extend(bounds: &mut Option<Self>, point: Vec3) {
        match bounds {
            Some(bounds) => bounds.add_point(point),
            None => *bounds = Some(Self::from_point(point)),
        }
    }

    /// Union of two optional boxes.
    #[must_use]
    pub fn merge(a: Option<Self>, b: Option<Self>) -> Option<Self> {
        match (a, b) {
            (Some(a), Some(b)) => Some(a.union(&b)),
            (a, None) => a,
            (None, b) => b,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelVertex {
    pub position: Vec3,
    pub tex_coords: Vec2,
}

/// How a renderer should interpret the pitch of an entity using this model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PitchType {
    Normal,
    /// Studio models have their pitch inverted compared to other entities.
    MdlInverted,
}

/// Triangle list of one surface in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameMesh {
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
}

impl FrameMesh {
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub index: usize,
    pub name: String,
    /// `None` if the frame has no vertices.
    pub bounds: Option<Bounds>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    pub name: String,
    pub skins: Vec<Texture>,
    meshes: BTreeMap<usize, FrameMesh>,
}

impl Surface {
    #[must_use]
    pub fn new(name: String) -> Self {
        Self {
            name,
            skins: Vec::new(),
            meshes: BTreeMap::new(),
        }
    }

    /// The mesh of the frame stored at `frame`.
    #[must_use]
    pub fn mesh(&self, frame: usize) -> Option<&FrameMesh> {
        self.meshes.get(&frame)
    }

    pub fn meshes(&self) -> impl Iterator<Item = (usize, &FrameMesh)> {
        self.meshes.iter().map(|(&frame, mesh)| (frame, mesh))
    }
}

/// Receives the output of [`MdlParser`](crate::MdlParser).
///
/// Surfaces and frames are addressed by the index returned when they were created.
pub trait ModelSink {
    fn add_surface(&mut self, name: String) -> usize;

    fn surface_count(&self) -> usize;

    /// # Errors
    ///
    /// Returns `Err` if the surface doesn't exist.
    fn set_skins(&mut self, surface: usize, skins: Vec<Texture>) -> Result<()>;

    /// Creates or replaces the frame with the given frame index and returns its slot.
    fn load_frame(&mut self, frame_index: usize, name: &str, bounds: Option<Bounds>) -> usize;

    /// # Errors
    ///
    /// Returns `Err` if the surface or frame doesn't exist.
    fn add_indexed_mesh(
        &mut self,
        surface: usize,
        frame: usize,
        vertices: Vec<ModelVertex>,
        indices: Vec<u32>,
    ) -> Result<()>;
}

/// An in-memory decoded model.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityModel {
    pub name: String,
    pub pitch_type: PitchType,
    surfaces: Vec<Surface>,
    frames: Vec<Frame>,
}

impl EntityModel {
    #[must_use]
    pub fn new(name: String, pitch_type: PitchType) -> Self {
        Self {
            name,
            pitch_type,
            surfaces: Vec::new(),
            frames: Vec::new(),
        }
    }

    #[must_use]
    pub fn surfaces(&self) -> &[Surface] {
        &self.surfaces
    }

    #[must_use]
    pub fn surface(&self, index: usize) -> Option<&Surface> {
        self.surfaces.get(index)
    }

    #[must_use]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Finds a loaded frame by its frame index.
    #[must_use]
    pub fn frame(&self, frame_index: usize) -> Option<&Frame> {
        self.frames.iter().find(|f| f.index == frame_index)
    }
}

impl ModelSink for EntityModel {
    fn add_surface(&mut self, name: String) -> usize {
        self.surfaces.push(Surface::new(name));
        self.surfaces.len() - 1
    }

    fn surface_count(&self) -> usize {
        self.surfaces.len()
    }

    fn set_skins(&mut self, surface: usize, skins: Vec<Texture>) -> Result<()> {
        self.surfaces
            .get_mut(surface)
            .ok_or(Error::Corrupted("surface index out of range"))?
            .skins = skins;
        Ok(())
    }

    fn load_frame(&mut self, frame_index: usize, name: &str, bounds: Option<Bounds>) -> usize {
        let frame = Frame {
            index: frame_index,
            name: name.to_owned(),
            bounds,
        };

        if let Some(slot) = self.frames.iter().position(|f| f.index == frame_index) {
            self.frames[slot] = frame;
            slot
        } else {
            self.frames.push(frame);
            self.frames.len() - 1
        }
    }

    fn add_indexed_mesh(
        &mut self,
        surface: usize,
        frame: usize,
        vertices: Vec<ModelVertex>,
        indices: Vec<u32>,
    ) -> Result<()> {
        if frame >= self.frames.len() {
            return Err(Error::Corrupted("frame index out of range"));
        }

        self.surfaces
            .get_mut(surface)
            .ok_or(Error::Corrupted("surface index out of range"))?
            .meshes
            .insert(frame, FrameMesh { vertices, indices });
        Ok(())
    }
}
