use glam::{Mat3, Quat, Vec3};
use tracing::debug;

use crate::{
    binary_utils::Cursor,
    layout::{Bone, HEADER_BONE_COUNT_OFFSET},
    Error, Result,
};

/// Converts pitch, yaw and roll in radians to a quaternion.
///
/// This is the half-angle composition studiomdl uses, which differs from glam's euler
/// conventions; don't replace it with `Quat::from_euler`.
#[must_use]
pub fn angles_to_quat(angles: Vec3) -> Quat {
    let (sin_pitch, cos_pitch) = (angles.x * 0.5).sin_cos();
    let (sin_yaw, cos_yaw) = (angles.y * 0.5).sin_cos();
    let (sin_roll, cos_roll) = (angles.z * 0.5).sin_cos();

    let x = sin_pitch * cos_yaw * cos_roll - cos_pitch * sin_yaw * sin_roll;
    let y = cos_pitch * sin_yaw * cos_roll + sin_pitch * cos_yaw * sin_roll;
    let z = cos_pitch * cos_yaw * sin_roll - sin_pitch * sin_yaw * cos_roll;
    let w = cos_pitch * cos_yaw * cos_roll - sin_pitch * sin_yaw * sin_roll;

    Quat::from_xyzw(x, y, z, w)
}

/// A 3x4 model-space bone matrix: rotation columns plus translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneTransform {
    pub rotation: Mat3,
    pub translation: Vec3,
}

impl BoneTransform {
    pub const IDENTITY: Self = Self {
        rotation: Mat3::IDENTITY,
        translation: Vec3::ZERO,
    };

    #[must_use]
    pub fn from_quat_translation(rotation: Quat, translation: Vec3) -> Self {
        Self {
            rotation: Mat3::from_quat(rotation),
            translation,
        }
    }

    /// Applies `local` first, then `self`.
    #[must_use]
    pub fn concat(&self, local: &Self) -> Self {
        Self {
            rotation: self.rotation * local.rotation,
            translation: self.rotation * local.translation + self.translation,
        }
    }

    #[must_use]
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation * point + self.translation
    }
}

/// Bones of a model and their model-space transforms, indexed by bone position.
#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    bones: Vec<Bone>,
    transforms: Vec<BoneTransform>,
}

impl Skeleton {
    /// Reads the bone table and composes every bone with its parent.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the bone table can't be read or a bone is stored before its parent.
    pub fn read(mut cursor: Cursor) -> Result<Self> {
        cursor.seek(HEADER_BONE_COUNT_OFFSET)?;
        let bone_count = cursor.read_size("bone count is negative")?;
        let bone_offset = cursor.read_size("bone offset is negative")?;

        cursor.seek(bone_offset)?;
        let bones = cursor.read_slice::<Bone>(bone_count)?.to_vec();

        let mut transforms: Vec<BoneTransform> = Vec::with_capacity(bones.len());

        for (index, bone) in bones.iter().enumerate() {
            let local = BoneTransform::from_quat_translation(
                angles_to_quat(bone.angles()),
                bone.position(),
            );

            let transform = match usize::try_from(bone.parent()) {
                // negative parent, root bone
                Err(_) => local,
                Ok(parent) if parent < index => transforms[parent].concat(&local),
                Ok(_) => {
                    return Err(Error::BoneOrder {
                        bone: index,
                        parent: bone.parent(),
                    })
                }
            };

            transforms.push(transform);
        }

        debug!("read {} bones", bones.len());

        Ok(Self { bones, transforms })
    }

    #[must_use]
    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    #[must_use]
    pub fn transforms(&self) -> &[BoneTransform] {
        &self.transforms
    }

    #[must_use]
    pub fn transform(&self, bone: usize) -> Option<&BoneTransform> {
        self.transforms.get(bone)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }
}
