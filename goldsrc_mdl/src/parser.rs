use std::{
    borrow::Cow,
    collections::{hash_map::Entry, HashMap},
};

use tracing::{debug, debug_span, trace};

use crate::{
    binary_utils::Cursor,
    check_header,
    components::Components,
    geometry::GeometryCache,
    layout::{TextureInfo, HEADER_NAME_OFFSET, NAME_SIZE},
    model::{Bounds, EntityModel, ModelSink, PitchType},
    skeleton::Skeleton,
    skin::SkinLoader,
    texture::{Texture, TextureTables},
    Error, Result,
};


const FRAME_NAME: &str = "frame_0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MdlConfig {
    /// Load each referenced texture once and clone it for every mesh using it.
    pub dedup_textures: bool,
    /// Directory external skins are loaded from, relative to the skin loader's root.
    pub texture_directory: &'static str,
}

impl Default for MdlConfig {
    fn default() -> Self {
        Self {
            dedup_textures: false,
            texture_directory: "textures",
        }
    }
}

impl MdlConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn dedup_textures(mut self, dedup_textures: bool) -> Self {
        self.dedup_textures = dedup_textures;
        self
    }

    #[must_use]
    pub fn texture_directory(mut self, texture_directory: &'static str) -> Self {
        self.texture_directory = texture_directory;
        self
    }
}

/// Decodes a v10 studio model into a [`ModelSink`] in two phases.
///
/// [`initialize_model`](Self::initialize_model) creates the surfaces and their skins,
/// [`load_frame`](Self::load_frame) then fills in the geometry of the single frame.
#[derive(Debug, Clone)]
pub struct MdlParser<'a> {
    name: String,
    bytes: &'a [u8],
    config: MdlConfig,
    texture_infos: Option<Vec<TextureInfo>>,
    skeleton: Option<Skeleton>,
}

impl<'a> MdlParser<'a> {
    #[must_use]
    pub fn new(name: impl Into<String>, bytes: &'a [u8]) -> Self {
        Self::with_config(name, bytes, MdlConfig::default())
    }

    #[must_use]
    pub fn with_config(name: impl Into<String>, bytes: &'a [u8], config: MdlConfig) -> Self {
        Self {
            name: name.into(),
            bytes,
            config,
            texture_infos: None,
            skeleton: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn config(&self) -> MdlConfig {
        self.config
    }

    /// The skeleton built by the last successful [`load_frame`](Self::load_frame).
    #[must_use]
    pub fn skeleton(&self) -> Option<&Skeleton> {
        self.skeleton.as_ref()
    }

    /// An empty model to initialize.
    #[must_use]
    pub fn create_model(&self) -> EntityModel {
        EntityModel::new(self.name.clone(), PitchType::MdlInverted)
    }

    fn cursor(&self) -> Cursor<'a> {
        Cursor::new(self.bytes)
    }

    /// The name stored in the model header, usually the path it was compiled to.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the header is invalid.
    pub fn model_name(&self) -> Result<Cow<'a, str>> {
        check_header(self.bytes)?;
        let mut cursor = self.cursor();
        cursor.seek(HEADER_NAME_OFFSET)?;
        cursor.read_string(NAME_SIZE)
    }

    /// Adds one surface per mesh to `sink` and sets its skin.
    ///
    /// Nothing is added to `sink` unless every surface and texture resolves.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the header is invalid, textures are stored in a separate file, a
    /// texture can't be resolved, or the model is corrupted.
    pub fn initialize_model<S>(&mut self, sink: &mut S, skin_loader: &impl SkinLoader) -> Result<()>
    where
        S: ModelSink + ?Sized,
    {
        let _span = debug_span!("initialize_model", name = %self.name).entered();

        self.texture_infos = None;

        check_header(self.bytes)?;
        let cursor = self.cursor();
        let tables = TextureTables::read(cursor)?;
        debug!("textures are {:?}", tables.source);

        let mut loaded: HashMap<usize, Texture> = HashMap::new();
        let mut surfaces = Vec::new();
        let mut texture_infos = Vec::new();

        for component in Components::new(cursor)? {
            let component = component?;

            let texture_index = tables.texture_index(cursor, component.mesh.skin_ref()?)?;
            let info = tables.texture_info(cursor, texture_index)?;

            let texture = if self.config.dedup_textures {
                match loaded.entry(texture_index) {
                    Entry::Occupied(entry) => entry.get().clone(),
                    Entry::Vacant(entry) => entry
                        .insert(tables.load_texture(
                            cursor,
                            &info,
                            self.config.texture_directory,
                            skin_loader,
                        )?)
                        .clone(),
                }
            } else {
                tables.load_texture(cursor, &info, self.config.texture_directory, skin_loader)?
            };

            surfaces.push((component.surface_name(), texture));
            texture_infos.push(info);
        }

        for (name, texture) in surfaces {
            let surface = sink.add_surface(name);
            sink.set_skins(surface, vec![texture])?;
        }

        debug!("created {} surfaces", texture_infos.len());
        self.texture_infos = Some(texture_infos);

        Ok(())
    }

    /// Decodes the geometry of frame `frame_index` into the surfaces created by
    /// [`initialize_model`](Self::initialize_model).
    ///
    /// # Errors
    ///
    /// Returns `Err` if the frame index is not 0, the model hasn't been initialized, `sink`
    /// has a different amount of surfaces than the model has meshes, or the model is
    /// corrupted.
    pub fn load_frame<S>(&mut self, frame_index: usize, sink: &mut S) -> Result<()>
    where
        S: ModelSink + ?Sized,
    {
        let _span = debug_span!("load_frame", name = %self.name, frame_index).entered();

        check_header(self.bytes)?;

        if frame_index != 0 {
            return Err(Error::UnsupportedFrame(frame_index));
        }

        let texture_infos = self.texture_infos.as_ref().ok_or(Error::NotInitialized)?;

        let cursor = self.cursor();
        self.skeleton = None;
        let skeleton = Skeleton::read(cursor)?;

        let mut cache = GeometryCache::new();
        let mut meshes = Vec::with_capacity(texture_infos.len());

        for component in Components::new(cursor)? {
            let component = component?;
            let info = texture_infos
                .get(component.index)
                .ok_or(Error::Corrupted("mesh count changed after initialization"))?;

            cache = cache.for_component(cursor, &component)?;
            let mesh = cache.decode_mesh(cursor, &component.mesh, &skeleton, info.dimensions()?)?;

            trace!(
                "mesh {}: {} triangles",
                component.index,
                mesh.triangle_count()
            );
            meshes.push(mesh);
        }

        if meshes.len() != texture_infos.len() || sink.surface_count() != meshes.len() {
            return Err(Error::Corrupted("model surface count does not match the mdl"));
        }

        let bounds = meshes
            .iter()
            .fold(None, |bounds, mesh| Bounds::merge(bounds, mesh.bounds));
        let frame = sink.load_frame(frame_index, FRAME_NAME, bounds);

        let mut vertex_count = 0;
        for (surface, mesh) in meshes.into_iter().enumerate() {
            let indices = mesh.indices();
            vertex_count += mesh.vertices.len();
            sink.add_indexed_mesh(surface, frame, mesh.vertices, indices)?;
        }

        debug!("loaded {} bones, {} vertices", skeleton.len(), vertex_count);
        self.skeleton = Some(skeleton);

        Ok(())
    }
}

/// Decodes a whole model into a new [`EntityModel`] using the default config.
///
/// # Errors
///
/// Returns `Err` if either phase fails.
pub fn load_model(name: &str, bytes: &[u8], skin_loader: &impl SkinLoader) -> Result<EntityModel> {
    let mut parser = MdlParser::new(name, bytes);
    let mut model = parser.create_model();

    parser.initialize_model(&mut model, skin_loader)?;
    parser.load_frame(0, &mut model)?;

    Ok(model)
}
