//! Scene description parsing.
//!
//! A scene file is a stream of whitespace-separated records of eleven
//! tokens:
//!
//! ```text
//! Name  lx ly lz  rx ry rz  sx sy sz  path/to/model.obj
//! ```
//!
//! Location, rotation in degrees (pitch, yaw, roll) and scale. Records
//! normally sit one per line but line breaks carry no meaning.

use std::path::{Path, PathBuf};

use cgmath::Vector3;

use crate::error::{LoadError, Result};
use crate::gfx::transform::Transform;

const FIELDS: usize = 11;

#[derive(Debug, Clone, PartialEq)]
pub struct SceneEntry {
    pub name: String,
    pub location: Vector3<f32>,
    pub rotation_degrees: Vector3<f32>,
    pub scale: Vector3<f32>,
    pub model_path: PathBuf,
}

impl SceneEntry {
    pub fn transform(&self) -> Transform {
        Transform::from_euler_degrees(self.location, self.rotation_degrees, self.scale)
    }
}

pub fn read_scene_file(path: &Path) -> Result<Vec<SceneEntry>> {
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_scene(&text)
}

pub fn parse_scene(text: &str) -> Result<Vec<SceneEntry>> {
    let tokens: Vec<(usize, &str)> = text
        .lines()
        .enumerate()
        .flat_map(|(i, line)| line.split_whitespace().map(move |t| (i + 1, t)))
        .collect();

    tokens
        .chunks(FIELDS)
        .map(parse_record)
        .collect()
}

fn parse_record(record: &[(usize, &str)]) -> Result<SceneEntry> {
    let (line, name) = record[0];
    if record.len() < FIELDS {
        return Err(LoadError::MalformedScene {
            line,
            message: format!(
                "object '{}' has {} of {} fields",
                name,
                record.len(),
                FIELDS
            ),
        });
    }

    let number = |index: usize| -> Result<f32> {
        let (line, token) = record[index];
        token.parse::<f32>().map_err(|_| LoadError::MalformedScene {
            line,
            message: format!("object '{}': '{}' is not a number", name, token),
        })
    };
    let vector = |first: usize| -> Result<Vector3<f32>> {
        Ok(Vector3::new(number(first)?, number(first + 1)?, number(first + 2)?))
    };

    Ok(SceneEntry {
        name: name.to_string(),
        location: vector(1)?,
        rotation_degrees: vector(4)?,
        scale: vector(7)?,
        model_path: PathBuf::from(record[10].1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_records() {
        let text = "\
House_01 1 0 2  0 90 0  1 1 1  resources/models/house.obj
Revolver 0 0 0  0 0 0  0.5 0.5 0.5  resources/models/revolver.obj
";
        let entries = parse_scene(text).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "House_01");
        assert_eq!(entries[0].location, Vector3::new(1.0, 0.0, 2.0));
        assert_eq!(entries[0].rotation_degrees, Vector3::new(0.0, 90.0, 0.0));
        assert_eq!(entries[1].scale, Vector3::new(0.5, 0.5, 0.5));
        assert_eq!(
            entries[1].model_path,
            PathBuf::from("resources/models/revolver.obj")
        );
    }

    #[test]
    fn test_records_may_span_lines() {
        let text = "Water 0 0 0\n0 0 0\n1 1 1 water.obj\n";
        let entries = parse_scene(text).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].model_path, PathBuf::from("water.obj"));
    }

    #[test]
    fn test_empty_scene() {
        assert!(parse_scene("\n  \n").unwrap().is_empty());
    }

    #[test]
    fn test_truncated_record() {
        let text = "House 1 2 3 0 0 0 1 1 1 house.obj\nChurch 1 2 3\n";
        match parse_scene(text) {
            Err(LoadError::MalformedScene { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected malformed scene, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_number() {
        let text = "House 1 two 3 0 0 0 1 1 1 house.obj";
        assert!(matches!(
            parse_scene(text),
            Err(LoadError::MalformedScene { line: 1, .. })
        ));
    }

    #[test]
    fn test_entry_transform() {
        let entries = parse_scene("Box 1 2 3 0 0 0 2 2 2 box.obj").unwrap();
        let t = entries[0].transform();
        assert_eq!(t.location, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(t.scale, Vector3::new(2.0, 2.0, 2.0));
    }
}
