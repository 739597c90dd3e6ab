#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

mod binary_utils;
mod components;
mod geometry;
mod palette;
mod parser;
mod skeleton;
mod skin;
mod texture;

pub mod layout;
pub mod model;

use std::{io, result};

use thiserror::Error;

pub use binary_utils::Cursor;
pub use components::{Component, Components};
pub use geometry::{assemble_run, texture_coords, DecodedMesh, GeometryCache, Run};
pub use model::{Bounds, EntityModel, Frame, FrameMesh, ModelSink, ModelVertex, PitchType, Surface};
pub use palette::{Palette, PaletteTransparency};
pub use parser::{load_model, MdlConfig, MdlParser};
pub use skeleton::{angles_to_quat, BoneTransform, Skeleton};
pub use skin::{DirectorySkinLoader, SkinLoader};
pub use texture::{Texture, TextureKind, TextureSource};

#[derive(Debug, Clone, Error, Hash, PartialEq, Eq)]
pub enum Error {
    #[error("io error reading `{path}`: {error}")]
    Io { path: String, error: String },
    #[error("not an mdl file: unknown ident {0}")]
    InvalidIdent(i32),
    #[error("unsupported mdl version {0}")]
    UnsupportedVersion(i32),
    #[error("mdls with textures in a separate \"t\" file are not supported")]
    ExternalTextureFile,
    #[error("bone {bone} was encountered before its parent {parent}")]
    BoneOrder { bone: usize, parent: i32 },
    #[error("frame {0} requested, v10 mdls only support one frame")]
    UnsupportedFrame(usize),
    #[error("mdl corrupted: {0}")]
    Corrupted(&'static str),
    #[error("mdl corrupted: eof reading {size} bytes at offset {offset}")]
    Eof { offset: usize, size: usize },
    #[error("frame requested before the model was initialized")]
    NotInitialized,
    #[error("error loading skin `{path}`: {error}")]
    Skin { path: String, error: String },
}

pub type Result<T> = result::Result<T, Error>;

impl Error {
    fn from_io(err: &io::Error, path: &impl ToString) -> Self {
        Self::Io {
            path: path.to_string(),
            error: err.to_string(),
        }
    }
}

/// Checks the ident and version at the start of `bytes`.
///
/// Nothing past the first 8 bytes is read.
///
/// # Errors
///
/// Returns `Err` if the buffer is too short, the ident is not `IDST` or the version is not 10.
pub fn check_header(bytes: &[u8]) -> Result<()> {
    let mut cursor = Cursor::new(bytes);

    let ident = cursor.read_i32()?;
    if ident != layout::IDENT {
        return Err(Error::InvalidIdent(ident));
    }

    let version = cursor.read_i32()?;
    if version != layout::VERSION {
        return Err(Error::UnsupportedVersion(version));
    }

    Ok(())
}
