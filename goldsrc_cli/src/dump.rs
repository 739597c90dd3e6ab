use std::{fs, path::PathBuf};

use clap::Parser;
use tracing::info;

use goldsrc_mdl::{DirectorySkinLoader, MdlConfig, MdlParser};

#[derive(Parser)]
pub struct Dump {
    #[clap(short, long)]
    path: PathBuf,
    /// Root directory of external skins, defaults to the directory of the model
    #[clap(short, long)]
    textures: Option<PathBuf>,
    #[clap(short, long)]
    bones: bool,
    /// Load each texture only once
    #[clap(short, long)]
    dedup: bool,
}

pub fn dump(opts: Dump) {
    let bytes = fs::read(&opts.path).unwrap();
    let name = opts
        .path
        .file_stem()
        .map_or_else(String::new, |s| s.to_string_lossy().into_owned());

    let root = opts
        .textures
        .or_else(|| opts.path.parent().map(PathBuf::from))
        .unwrap_or_default();
    let loader = DirectorySkinLoader::new(root);

    let config = MdlConfig::new().dedup_textures(opts.dedup);
    let mut parser = MdlParser::with_config(name, &bytes, config);
    let mut model = parser.create_model();

    parser.initialize_model(&mut model, &loader).unwrap();
    parser.load_frame(0, &mut model).unwrap();

    info!(
        "model `{}` (`{}`): {} surfaces",
        model.name,
        parser.model_name().unwrap(),
        model.surfaces().len()
    );

    for surface in model.surfaces() {
        eprintln!("surface `{}`", surface.name);

        for skin in &surface.skins {
            eprintln!(
                "  skin `{}` {}x{} {:?}",
                skin.name,
                skin.width(),
                skin.height(),
                skin.kind
            );
        }

        for (frame, mesh) in surface.meshes() {
            eprintln!(
                "  frame {}: {} vertices, {} triangles",
                frame,
                mesh.vertices.len(),
                mesh.triangle_count()
            );
        }
    }

    for frame in model.frames() {
        match frame.bounds {
            Some(bounds) => eprintln!(
                "frame `{}`: bounds {} .. {}, size {}",
                frame.name,
                bounds.min,
                bounds.max,
                bounds.size()
            ),
            None => eprintln!("frame `{}`: empty", frame.name),
        }
    }

    if opts.bones {
        if let Some(skeleton) = parser.skeleton() {
            for (index, (bone, transform)) in skeleton
                .bones()
                .iter()
                .zip(skeleton.transforms())
                .enumerate()
            {
                eprintln!(
                    "bone {} `{}`: parent {}, translation {}",
                    index,
                    bone.name(),
                    bone.parent(),
                    transform.translation
                );
            }
        }
    }
}
