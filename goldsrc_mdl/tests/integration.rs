use std::{
    env, fs,
    path::{Path, PathBuf},
};

use approx::assert_relative_eq;
use glam::Vec3;

use goldsrc_mdl::{
    check_header, layout::ModelFlags, load_model, Bounds, DirectorySkinLoader, EntityModel, Error,
    MdlConfig, MdlParser, ModelSink, ModelVertex, Result, Texture,
};
use goldsrc_test_utils::{
    BodyPartSpec, BoneSpec, MdlBuilder, MeshSpec, RunSpec, SubModelSpec, TextureSpec, TriVert,
};

fn no_skins(path: &Path) -> Result<Texture> {
    panic!("unexpected skin load of {}", path.display())
}

fn scientist() -> MdlBuilder {
    MdlBuilder::new()
        .name("scientist.mdl")
        .bone(BoneSpec::new("Bip01", -1, [0.0, 0.0, 36.0], [0.0; 3]))
        .bone(BoneSpec::new(
            "Bip01 Spine",
            0,
            [0.0, 0.0, 4.0],
            [0.0, 0.0, std::f32::consts::FRAC_PI_2],
        ))
        .texture(TextureSpec::new("face.bmp", 64, 64))
        .texture(TextureSpec::new("shirt.bmp", 32, 32))
        .body_part(BodyPartSpec {
            name: "body".to_owned(),
            sub_models: vec![SubModelSpec {
                name: "scientist_body".to_owned(),
                vertices: vec![
                    [0.0, 0.0, 0.0],
                    [1.0, 0.0, 0.0],
                    [0.0, 1.0, 0.0],
                    [1.0, 1.0, 0.0],
                    [2.0, 0.0, 0.0],
                ],
                bone_indices: vec![0, 0, 1, 1, 1],
                meshes: vec![
                    MeshSpec {
                        skin_ref: 1,
                        runs: vec![
                            RunSpec::Strip(vec![
                                TriVert::new(0, 0, 0),
                                TriVert::new(1, 31, 0),
                                TriVert::new(2, 0, 31),
                                TriVert::new(3, 31, 31),
                            ]),
                            RunSpec::Fan(vec![
                                TriVert::new(1, 0, 0),
                                TriVert::new(3, 0, 0),
                                TriVert::new(4, 0, 0),
                            ]),
                        ],
                    },
                    MeshSpec {
                        skin_ref: 0,
                        runs: vec![RunSpec::Fan(vec![
                            TriVert::new(0, 0, 0),
                            TriVert::new(1, 0, 0),
                            TriVert::new(2, 0, 0),
                        ])],
                    },
                ],
            }],
        })
        .body_part(BodyPartSpec {
            name: "heads".to_owned(),
            sub_models: vec![SubModelSpec {
                name: "blank".to_owned(),
                ..SubModelSpec::default()
            }],
        })
}

#[test]
fn decodes_synthetic_model() {
    let bytes = scientist().build();
    check_header(&bytes).unwrap();

    let model = load_model("scientist", &bytes, &no_skins).unwrap();

    assert_eq!(model.surfaces().len(), 2);
    assert_eq!(model.surfaces()[0].name, "body_scientist_body_0");
    assert_eq!(model.surfaces()[1].name, "body_scientist_body_1");
    assert_eq!(model.surfaces()[0].skins[0].name, "shirt.bmp");
    assert_eq!(model.surfaces()[1].skins[0].name, "face.bmp");
    assert_eq!(model.surfaces()[0].skins[0].width(), 32);

    let mesh = model.surfaces()[0].mesh(0).unwrap();
    assert_eq!(mesh.triangle_count(), 3);

    // vertex 2 is bound to the spine, rotated 90 degrees around z
    assert_relative_eq!(
        mesh.vertices[1].position,
        Vec3::new(-1.0, 0.0, 40.0),
        epsilon = 1e-5
    );

    let bounds = model.frame(0).unwrap().bounds.unwrap();
    assert_relative_eq!(bounds.min, Vec3::new(-1.0, 0.0, 36.0), epsilon = 1e-5);
    assert_relative_eq!(bounds.max, Vec3::new(1.0, 2.0, 40.0), epsilon = 1e-5);
}

/// A sink that only counts what it receives.
#[derive(Default)]
struct CountingSink {
    surfaces: usize,
    skins: usize,
    frames: usize,
    vertices: usize,
}

impl ModelSink for CountingSink {
    fn add_surface(&mut self, _name: String) -> usize {
        self.surfaces += 1;
        self.surfaces - 1
    }

    fn surface_count(&self) -> usize {
        self.surfaces
    }

    fn set_skins(&mut self, _surface: usize, skins: Vec<Texture>) -> Result<()> {
        self.skins += skins.len();
        Ok(())
    }

    fn load_frame(&mut self, _frame_index: usize, _name: &str, _bounds: Option<Bounds>) -> usize {
        self.frames += 1;
        0
    }

    fn add_indexed_mesh(
        &mut self,
        _surface: usize,
        _frame: usize,
        vertices: Vec<ModelVertex>,
        indices: Vec<u32>,
    ) -> Result<()> {
        assert_eq!(vertices.len(), indices.len());
        self.vertices += vertices.len();
        Ok(())
    }
}

#[test]
fn custom_sinks() {
    let bytes = scientist().build();
    let mut parser = MdlParser::new("scientist", &bytes);
    let mut sink = CountingSink::default();

    parser.initialize_model(&mut sink, &no_skins).unwrap();
    parser.load_frame(0, &mut sink).unwrap();

    assert_eq!(sink.surfaces, 2);
    assert_eq!(sink.skins, 2);
    assert_eq!(sink.frames, 1);
    assert_eq!(sink.vertices, 12);
}

#[test]
fn external_skins_fall_back_to_placeholders() {
    let bytes = scientist()
        .flags(ModelFlags::NO_EMBEDDED_TEXTURES.bits())
        .build();

    let loader = DirectorySkinLoader::new(env::temp_dir().join("goldsrc_mdl_missing_skins"));
    let config = MdlConfig::new().dedup_textures(true);
    let mut parser = MdlParser::with_config("scientist", &bytes, config);
    let mut model = parser.create_model();

    parser.initialize_model(&mut model, &loader).unwrap();
    parser.load_frame(0, &mut model).unwrap();

    assert_eq!(model.surfaces()[0].skins[0].name, "shirt.bmp");
    assert_eq!(model.surfaces()[0].skins[0].width(), 1);
}

#[test]
fn truncated_models_fail() {
    let bytes = scientist().build();

    for len in [0, 4, 100, 243, bytes.len() / 2, bytes.len() - 1] {
        let result = load_model("truncated", &bytes[..len], &no_skins);
        assert!(result.is_err(), "length {} decoded", len);
    }

    assert!(matches!(
        load_model("truncated", &bytes[..200], &no_skins),
        Err(Error::Eof { .. })
    ));
}

/// Set `GOLDSRC_MODEL_DIR` to a directory of models to run.
#[test]
#[ignore]
fn read_models() {
    let root = PathBuf::from(env::var("GOLDSRC_MODEL_DIR").unwrap());
    recurse(&root);
}

fn recurse(path: &Path) {
    for entry in fs::read_dir(path).unwrap().map(std::result::Result::unwrap) {
        let path = entry.path();
        if entry.file_type().unwrap().is_dir() {
            recurse(&path);
        } else if is_mdl_file(&path) {
            if let Err(err) = read_mdl(&path) {
                // ignore errors, probably not our fault
                eprintln!("failed: {:?}", err);
            }
        }
    }
}

fn read_mdl(path: &Path) -> Result<EntityModel> {
    eprintln!("reading `{}`", path.display());
    let bytes = fs::read(path).unwrap();
    let loader = DirectorySkinLoader::new(path.parent().unwrap());

    let model = load_model(&path.display().to_string(), &bytes, &loader)?;

    for surface in model.surfaces() {
        let mesh = surface.mesh(0).unwrap();
        assert_eq!(mesh.vertices.len() % 3, 0);
    }

    Ok(model)
}

fn is_mdl_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("mdl"))
        == Some(true)
}
