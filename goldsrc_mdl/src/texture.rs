use std::path::Path;

use image::{Rgba, RgbaImage};
use tracing::trace;

use crate::{
    binary_utils::Cursor,
    layout::{
        ModelFlags, TextureFlags, TextureInfo, HEADER_FLAGS_OFFSET,
        HEADER_SKIN_REFERENCE_COUNT_OFFSET, HEADER_TEXTURE_COUNT_OFFSET, PALETTE_SIZE,
        SKIN_REFERENCE_SIZE, TEXTURE_INFO_SIZE,
    },
    palette::{Palette, PaletteTransparency},
    skin::SkinLoader,
    Error, Result,
};

/// Normalized mean of RGBA8 pixels, transparent black if there are none.
pub(crate) fn average_color(rgba: &[u8]) -> Rgba<f32> {
    let mut sum = [0_u64; 4];
    for pixel in rgba.chunks_exact(4) {
        for (total, &channel) in sum.iter_mut().zip(pixel) {
            *total += u64::from(channel);
        }
    }

    let pixel_count = rgba.len() / 4;
    if pixel_count == 0 {
        return Rgba([0.0; 4]);
    }

    let divisor = (pixel_count * 0xff) as f32;
    Rgba(sum.map(|total| total as f32 / divisor))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    Opaque,
    Masked,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub name: String,
    pub data: RgbaImage,
    pub average_color: Rgba<f32>,
    pub kind: TextureKind,
}

impl Texture {
    #[must_use]
    pub fn new(name: String, data: RgbaImage, kind: TextureKind) -> Self {
        let average_color = average_color(data.as_raw());
        Self {
            name,
            data,
            average_color,
            kind,
        }
    }

    /// A magenta 1x1 texture used in place of skins that failed to load.
    #[must_use]
    pub fn placeholder(name: String) -> Self {
        Self::new(
            name,
            RgbaImage::from_pixel(1, 1, Rgba([0xff, 0, 0xff, 0xff])),
            TextureKind::Opaque,
        )
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.data.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.data.height()
    }
}

/// Where the pixels of a model's skins come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSource {
    /// Palette-indexed pixels stored in the model.
    Embedded,
    /// Loaded by a [`SkinLoader`] from `<texture directory>/<name>`.
    External,
}

impl TextureSource {
    #[must_use]
    pub fn from_flags(flags: ModelFlags) -> Self {
        if flags.contains(ModelFlags::NO_EMBEDDED_TEXTURES) {
            Self::External
        } else {
            Self::Embedded
        }
    }
}

/// Skin and texture info tables of a model.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TextureTables {
    pub source: TextureSource,
    texture_count: usize,
    texture_info_offset: usize,
    skin_reference_count: usize,
    skin_offset: usize,
}

impl TextureTables {
    pub fn read(mut cursor: Cursor) -> Result<Self> {
        cursor.seek(HEADER_SKIN_REFERENCE_COUNT_OFFSET)?;
        let skin_reference_count = cursor.read_i32()?;
        let skin_family_count = cursor.read_i32()?;
        let skin_offset = cursor.read_i32()?;

        if skin_reference_count < 1 || skin_family_count < 1 || skin_offset < 1 {
            return Err(Error::ExternalTextureFile);
        }

        cursor.seek(HEADER_FLAGS_OFFSET)?;
        let flags = ModelFlags::from_bits_retain(cursor.read_u32()?);

        cursor.seek(HEADER_TEXTURE_COUNT_OFFSET)?;
        let texture_count = cursor.read_size("texture count is negative")?;
        let texture_info_offset = cursor.read_i32()?;

        if texture_info_offset < 1 {
            return Err(Error::Corrupted("texture info offset is below one"));
        }

        Ok(Self {
            source: TextureSource::from_flags(flags),
            texture_count,
            texture_info_offset: texture_info_offset as usize,
            skin_reference_count: skin_reference_count as usize,
            skin_offset: skin_offset as usize,
        })
    }

    /// Looks up the texture index of a skin reference in the default skin family.
    pub fn texture_index(&self, mut cursor: Cursor, skin_ref: usize) -> Result<usize> {
        if skin_ref >= self.skin_reference_count {
            return Err(Error::Corrupted("mesh skin reference out of range"));
        }

        cursor.seek(self.skin_offset + skin_ref * SKIN_REFERENCE_SIZE)?;
        let index: usize = cursor
            .read_i16()?
            .try_into()
            .map_err(|_| Error::Corrupted("skin texture index is negative"))?;

        if index >= self.texture_count {
            return Err(Error::Corrupted("skin texture index out of range"));
        }

        Ok(index)
    }

    pub fn texture_info(&self, mut cursor: Cursor, texture_index: usize) -> Result<TextureInfo> {
        cursor.seek(self.texture_info_offset + texture_index * TEXTURE_INFO_SIZE)?;
        cursor.read()
    }

    /// Resolves one texture, either from the embedded pixels or through `skin_loader`.
    pub fn load_texture(
        &self,
        cursor: Cursor,
        info: &TextureInfo,
        texture_directory: &str,
        skin_loader: &impl SkinLoader,
    ) -> Result<Texture> {
        match self.source {
            TextureSource::Embedded => read_embedded_texture(cursor, info),
            TextureSource::External => {
                let path = Path::new(texture_directory).join(&*info.name());
                trace!("loading external skin `{}`", path.display());
                skin_loader.load_skin(&path)
            }
        }
    }
}

fn read_embedded_texture(mut cursor: Cursor, info: &TextureInfo) -> Result<Texture> {
    let (width, height) = info.dimensions()?;
    let pixel_count = width
        .checked_mul(height)
        .ok_or(Error::Corrupted("texture is too large"))?;

    // the palette directly follows the pixels
    cursor.seek(info.pixel_offset()?)?;
    let indices = cursor.read_bytes(pixel_count)?;
    let palette = Palette::new(cursor.read_bytes(PALETTE_SIZE)?)?;

    let (transparency, kind) = if info.flags().contains(TextureFlags::MASKED) {
        (PaletteTransparency::Index255Transparent, TextureKind::Masked)
    } else {
        (PaletteTransparency::Opaque, TextureKind::Opaque)
    };

    let (rgba, average_color) = palette.indexed_to_rgba(indices, transparency);
    let data = RgbaImage::from_raw(width as u32, height as u32, rgba)
        .ok_or(Error::Corrupted("texture is too large"))?;

    Ok(Texture {
        name: info.name().into_owned(),
        data,
        average_color,
        kind,
    })
}

#[cfg(test)]
mod tests {
    use goldsrc_test_utils::{MdlBuilder, TextureSpec};

    use super::*;

    fn palette_bytes() -> Vec<u8> {
        (0..=255_u8).flat_map(|i| [i, 255 - i, 7]).collect()
    }

    fn texture_spec(flags: u32) -> TextureSpec {
        TextureSpec {
            name: "skin.bmp".to_owned(),
            flags,
            width: 2,
            height: 2,
            pixels: vec![0, 1, 255, 3],
            palette: palette_bytes(),
        }
    }

    fn unused_loader(path: &Path) -> Result<Texture> {
        panic!("unexpected skin load of {}", path.display())
    }

    #[test]
    fn external_texture_file_is_unsupported() {
        let bytes = MdlBuilder::new()
            .texture(texture_spec(0))
            .skin_counts(0, 1)
            .build();

        assert_eq!(
            TextureTables::read(Cursor::new(&bytes)).unwrap_err(),
            Error::ExternalTextureFile
        );
    }

    #[test]
    fn embedded_opaque_texture() {
        let bytes = MdlBuilder::new().texture(texture_spec(0)).build();
        let cursor = Cursor::new(&bytes);
        let tables = TextureTables::read(cursor).unwrap();
        assert_eq!(tables.source, TextureSource::Embedded);

        let index = tables.texture_index(cursor, 0).unwrap();
        let info = tables.texture_info(cursor, index).unwrap();
        assert_eq!(info.name(), "skin.bmp");

        let texture = tables
            .load_texture(cursor, &info, "textures", &unused_loader)
            .unwrap();

        assert_eq!((texture.width(), texture.height()), (2, 2));
        assert_eq!(texture.kind, TextureKind::Opaque);
        assert_eq!(texture.data.get_pixel(1, 0), &Rgba([1, 254, 7, 255]));
        assert_eq!(texture.data.get_pixel(0, 1), &Rgba([255, 0, 7, 255]));
    }

    #[test]
    fn embedded_masked_texture() {
        let bytes = MdlBuilder::new()
            .texture(texture_spec(TextureFlags::MASKED.bits()))
            .build();
        let cursor = Cursor::new(&bytes);
        let tables = TextureTables::read(cursor).unwrap();
        let info = tables.texture_info(cursor, 0).unwrap();

        let texture = tables
            .load_texture(cursor, &info, "textures", &unused_loader)
            .unwrap();

        assert_eq!(texture.kind, TextureKind::Masked);
        assert_eq!(texture.data.get_pixel(0, 1), &Rgba([0, 0, 0, 0]));
        assert_eq!(texture.data.get_pixel(1, 1), &Rgba([3, 252, 7, 255]));
    }

    #[test]
    fn external_textures_use_the_skin_loader() {
        let bytes = MdlBuilder::new()
            .flags(ModelFlags::NO_EMBEDDED_TEXTURES.bits())
            .texture(texture_spec(0))
            .build();
        let cursor = Cursor::new(&bytes);
        let tables = TextureTables::read(cursor).unwrap();
        assert_eq!(tables.source, TextureSource::External);

        let info = tables.texture_info(cursor, 0).unwrap();
        let loader = |path: &Path| -> Result<Texture> {
            assert_eq!(path, Path::new("textures").join("skin.bmp"));
            Ok(Texture::placeholder(path.display().to_string()))
        };

        let texture = tables
            .load_texture(cursor, &info, "textures", &loader)
            .unwrap();
        assert_eq!((texture.width(), texture.height()), (1, 1));
    }

    #[test]
    fn skin_reference_out_of_range() {
        let bytes = MdlBuilder::new().texture(texture_spec(0)).build();
        let cursor = Cursor::new(&bytes);
        let tables = TextureTables::read(cursor).unwrap();

        assert_eq!(
            tables.texture_index(cursor, 1).unwrap_err(),
            Error::Corrupted("mesh skin reference out of range")
        );
    }

    #[test]
    fn zero_sized_texture_is_corrupted() {
        let mut spec = texture_spec(0);
        spec.width = 0;
        spec.pixels.clear();
        let bytes = MdlBuilder::new().texture(spec).build();
        let cursor = Cursor::new(&bytes);
        let tables = TextureTables::read(cursor).unwrap();
        let info = tables.texture_info(cursor, 0).unwrap();

        assert_eq!(
            tables
                .load_texture(cursor, &info, "textures", &unused_loader)
                .unwrap_err(),
            Error::Corrupted("texture has non-positive dimensions")
        );
    }

    #[test]
    fn average_of_nothing_is_transparent() {
        assert_eq!(average_color(&[]), Rgba([0.0; 4]));
    }
}
