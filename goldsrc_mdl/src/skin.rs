use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::warn;

use crate::{
    texture::{Texture, TextureKind},
    Error, Result,
};

/// Loads skins of models whose textures are not embedded.
pub trait SkinLoader {
    /// Loads the skin at `path`, relative to whatever root the loader uses.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the loader has no fallback for a missing or unreadable skin.
    fn load_skin(&self, path: &Path) -> Result<Texture>;
}

impl<F> SkinLoader for F
where
    F: Fn(&Path) -> Result<Texture>,
{
    fn load_skin(&self, path: &Path) -> Result<Texture> {
        self(path)
    }
}

/// Loads skins from image files below a root directory.
///
/// Missing or undecodable files are replaced with [`Texture::placeholder`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DirectorySkinLoader {
    root: PathBuf,
}

impl DirectorySkinLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read_skin(&self, path: &Path) -> Result<Texture> {
        let full_path = self.root.join(path);

        let bytes = fs::read(&full_path).map_err(|err| Error::from_io(&err, &full_path.display()))?;

        let data = image::load_from_memory(&bytes)
            .map_err(|err| Error::Skin {
                path: full_path.display().to_string(),
                error: err.to_string(),
            })?
            .to_rgba8();

        Ok(Texture::new(skin_name(path), data, TextureKind::Opaque))
    }
}

impl SkinLoader for DirectorySkinLoader {
    fn load_skin(&self, path: &Path) -> Result<Texture> {
        match self.read_skin(path) {
            Ok(texture) => Ok(texture),
            Err(err) => {
                warn!("using placeholder for skin `{}`: {}", path.display(), err);
                Ok(Texture::placeholder(skin_name(path)))
            }
        }
    }
}

fn skin_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use std::env;

    use image::{ImageFormat, Rgba, RgbaImage};

    use super::*;

    #[test]
    fn missing_skin_is_a_placeholder() {
        let loader = DirectorySkinLoader::new(env::temp_dir().join("goldsrc_mdl_no_such_dir"));

        let texture = loader.load_skin(Path::new("textures/missing.bmp")).unwrap();

        assert_eq!(texture.name, "missing.bmp");
        assert_eq!((texture.width(), texture.height()), (1, 1));
    }

    #[test]
    fn loads_png_skins() {
        let root = env::temp_dir().join(format!("goldsrc_mdl_skins_{}", std::process::id()));
        fs::create_dir_all(root.join("textures")).unwrap();

        let image = RgbaImage::from_pixel(4, 2, Rgba([10, 20, 30, 255]));
        image
            .save_with_format(root.join("textures/wall.png"), ImageFormat::Png)
            .unwrap();

        let loader = DirectorySkinLoader::new(&root);
        let texture = loader.load_skin(Path::new("textures/wall.png")).unwrap();

        assert_eq!(texture.name, "wall.png");
        assert_eq!((texture.width(), texture.height()), (4, 2));
        assert_eq!(texture.data.get_pixel(3, 1), &Rgba([10, 20, 30, 255]));

        fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn closures_are_loaders() {
        let loader = |path: &Path| -> Result<Texture> {
            Err(Error::Skin {
                path: path.display().to_string(),
                error: "unavailable".to_owned(),
            })
        };

        assert_eq!(
            loader.load_skin(Path::new("a.bmp")),
            Err(Error::Skin {
                path: "a.bmp".to_owned(),
                error: "unavailable".to_owned(),
            })
        );
    }
}
