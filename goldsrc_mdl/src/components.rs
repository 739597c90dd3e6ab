use crate::{
    binary_utils::Cursor,
    layout::{BodyPart, Mesh, SubModel, BODY_PART_SIZE, HEADER_BODY_PART_COUNT_OFFSET, MESH_SIZE},
    Error, Result,
};

/// One mesh of the first sub-model of a body part.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Component {
    /// Position of this mesh across the whole model, used as the surface index.
    pub index: usize,
    pub body_part_index: usize,
    pub body_part: BodyPart,
    pub sub_model: SubModel,
    pub mesh_index: usize,
    pub mesh: Mesh,
}

impl Component {
    /// `<body part>_<sub-model>_<mesh index>`
    #[must_use]
    pub fn surface_name(&self) -> String {
        format!(
            "{}_{}_{}",
            self.body_part.name(),
            self.sub_model.name(),
            self.mesh_index
        )
    }
}

#[derive(Debug, Clone, Copy)]
struct CurrentBodyPart {
    index: usize,
    body_part: BodyPart,
    sub_model: SubModel,
    mesh_count: usize,
    mesh_offset: usize,
    next_mesh: usize,
}

/// Iterates the meshes of every body part's first sub-model in file order.
///
/// Body parts whose first sub-model is named `blank` are skipped. The iterator stops after
/// yielding the first error.
#[derive(Debug, Clone)]
pub struct Components<'a> {
    cursor: Cursor<'a>,
    body_part_count: usize,
    body_part_offset: usize,
    next_body_part: usize,
    current: Option<CurrentBodyPart>,
    next_index: usize,
    failed: bool,
}

impl<'a> Components<'a> {
    /// Reads the body part table location; the cursor position does not matter.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the body part count or offset can't be read.
    pub fn new(mut cursor: Cursor<'a>) -> Result<Self> {
        cursor.seek(HEADER_BODY_PART_COUNT_OFFSET)?;
        let body_part_count = cursor.read_size("body part count is negative")?;
        let body_part_offset = cursor.read_size("body part offset is negative")?;

        Ok(Self {
            cursor,
            body_part_count,
            body_part_offset,
            next_body_part: 0,
            current: None,
            next_index: 0,
            failed: false,
        })
    }

    fn read_body_part(&mut self, index: usize) -> Result<Option<CurrentBodyPart>> {
        let offset = index
            .checked_mul(BODY_PART_SIZE)
            .and_then(|o| o.checked_add(self.body_part_offset))
            .ok_or(Error::Corrupted("body part offset out of range"))?;
        self.cursor.seek(offset)?;
        let body_part: BodyPart = self.cursor.read()?;

        // only the first sub-model is decoded, the others are alternative bodies
        if body_part.model_count()? == 0 {
            return Err(Error::Corrupted("body part has no sub-models"));
        }
        self.cursor.seek(body_part.model_offset()?)?;
        let sub_model: SubModel = self.cursor.read()?;

        if sub_model.is_blank() {
            return Ok(None);
        }

        Ok(Some(CurrentBodyPart {
            index,
            body_part,
            sub_model,
            mesh_count: sub_model.mesh_count()?,
            mesh_offset: sub_model.mesh_offset()?,
            next_mesh: 0,
        }))
    }

    fn next_component(&mut self) -> Result<Option<Component>> {
        loop {
            if let Some(current) = &mut self.current {
                if current.next_mesh < current.mesh_count {
                    let mesh_index = current.next_mesh;
                    current.next_mesh += 1;
                    let current = *current;

                    let offset = mesh_index
                        .checked_mul(MESH_SIZE)
                        .and_then(|o| o.checked_add(current.mesh_offset))
                        .ok_or(Error::Corrupted("mesh offset out of range"))?;
                    self.cursor.seek(offset)?;
                    let mesh: Mesh = self.cursor.read()?;

                    let index = self.next_index;
                    self.next_index += 1;

                    return Ok(Some(Component {
                        index,
                        body_part_index: current.index,
                        body_part: current.body_part,
                        sub_model: current.sub_model,
                        mesh_index,
                        mesh,
                    }));
                }
                self.current = None;
            }

            if self.next_body_part >= self.body_part_count {
                return Ok(None);
            }

            let index = self.next_body_part;
            self.next_body_part += 1;
            self.current = self.read_body_part(index)?;
        }
    }
}

impl<'a> Iterator for Components<'a> {
    type Item = Result<Component>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        match self.next_component() {
            Ok(component) => component.map(Ok),
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use goldsrc_test_utils::{BodyPartSpec, MdlBuilder, MeshSpec, SubModelSpec};
    use itertools::Itertools;

    use super::*;

    fn sub_model(name: &str, mesh_count: usize) -> SubModelSpec {
        SubModelSpec {
            name: name.to_owned(),
            meshes: (0..mesh_count).map(|_| MeshSpec::default()).collect(),
            ..SubModelSpec::default()
        }
    }

    fn body_part(name: &str, sub_models: Vec<SubModelSpec>) -> BodyPartSpec {
        BodyPartSpec {
            name: name.to_owned(),
            sub_models,
        }
    }

    fn components(bytes: &[u8]) -> Vec<Component> {
        Components::new(Cursor::new(bytes))
            .unwrap()
            .try_collect()
            .unwrap()
    }

    #[test]
    fn enumerates_meshes_across_body_parts() {
        let bytes = MdlBuilder::new()
            .body_part(body_part("head", vec![sub_model("head_ref", 2)]))
            .body_part(body_part("body", vec![sub_model("body_ref", 3)]))
            .build();

        let components = components(&bytes);

        assert_eq!(components.len(), 5);
        assert_eq!(
            components.iter().map(|c| c.index).collect_vec(),
            vec![0, 1, 2, 3, 4]
        );
        assert_eq!(
            components
                .iter()
                .map(|c| (c.body_part_index, c.mesh_index))
                .collect_vec(),
            vec![(0, 0), (0, 1), (1, 0), (1, 1), (1, 2)]
        );
        assert_eq!(components[3].surface_name(), "body_body_ref_1");
    }

    #[test]
    fn only_first_sub_model_is_visited() {
        let bytes = MdlBuilder::new()
            .body_part(body_part(
                "heads",
                vec![sub_model("first", 1), sub_model("second", 4)],
            ))
            .build();

        let components = components(&bytes);

        assert_eq!(components.len(), 1);
        assert_eq!(components[0].sub_model.name(), "first");
    }

    #[test]
    fn blank_sub_models_are_skipped() {
        let bytes = MdlBuilder::new()
            .body_part(body_part("gun", vec![sub_model("blank", 2)]))
            .body_part(body_part("body", vec![sub_model("body_ref", 1)]))
            .build();

        let components = components(&bytes);

        assert_eq!(components.len(), 1);
        assert_eq!(components[0].index, 0);
        assert_eq!(components[0].body_part_index, 1);
    }

    #[test]
    fn iteration_is_repeatable() {
        let bytes = MdlBuilder::new()
            .body_part(body_part("a", vec![sub_model("a_ref", 2)]))
            .body_part(body_part("b", vec![sub_model("blank", 1)]))
            .body_part(body_part("c", vec![sub_model("c_ref", 1)]))
            .build();

        assert_eq!(components(&bytes), components(&bytes));
    }

    #[test]
    fn body_part_without_sub_models_is_corrupted() {
        let bytes = MdlBuilder::new()
            .body_part(body_part("empty", Vec::new()))
            .build();

        let mut components = Components::new(Cursor::new(&bytes)).unwrap();

        assert_eq!(
            components.next(),
            Some(Err(Error::Corrupted("body part has no sub-models")))
        );
        assert_eq!(components.next(), None);
    }
}
