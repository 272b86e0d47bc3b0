//! Schema validation for scene metadata
//!
//! Request bodies arrive as untyped JSON. They are checked here once,
//! producing either a typed value or every field-level error found.

use crate::error::{Result, SceneStoreError};
use scene_protocol::{FieldError, Mesh, Meshes, SceneMetadata, ScenePatch, Settings};
use serde_json::{Map, Value};
use std::collections::HashSet;
use uuid::Uuid;

pub const NAME_MAX_LEN: usize = 256;
pub const DESCRIPTION_MAX_LEN: usize = 4096;
pub const MESH_ID_MAX_LEN: usize = 256;

/// Parse the metadata sent with `POST /scenes`
pub fn parse_metadata(value: &Value) -> Result<SceneMetadata> {
    let obj = object(value)?;
    let mut errors = Vec::new();

    let name = string_at(obj, "name", &mut errors);
    if name.is_none() && !errors.iter().any(|e| e.path == "name") {
        errors.push(FieldError::new("name", "is required"));
    }
    let metadata = SceneMetadata {
        name: name.unwrap_or_default(),
        description: string_at(obj, "description", &mut errors),
        meshes: meshes_at(obj, &mut errors),
    };

    finish(errors)?;
    check_metadata(&metadata)?;
    Ok(metadata)
}

/// Parse a metadata patch. Read-only fields (`id`, `hash`, timestamps) are ignored.
pub fn parse_patch(value: &Value) -> Result<ScenePatch> {
    let obj = object(value)?;
    let mut errors = Vec::new();

    let patch = ScenePatch {
        name: string_at(obj, "name", &mut errors),
        description: string_at(obj, "description", &mut errors),
        meshes: meshes_at(obj, &mut errors),
    };

    finish(errors)?;
    check_patch(&patch)?;
    Ok(patch)
}

/// Parse the body of `PUT /config`
pub fn parse_settings(value: &Value) -> Result<Settings> {
    let obj = object(value)?;
    let default_scene_id = match obj.get("defaultSceneId") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(
            Uuid::parse_str(s)
                .map_err(|_| SceneStoreError::field("defaultSceneId", "expected a UUID"))?,
        ),
        Some(_) => return Err(SceneStoreError::field("defaultSceneId", "expected a UUID")),
    };
    Ok(Settings { default_scene_id })
}

/// Semantic checks on typed create metadata
pub fn check_metadata(metadata: &SceneMetadata) -> Result<()> {
    let mut errors = Vec::new();
    check_name(&metadata.name, &mut errors);
    if let Some(description) = &metadata.description {
        check_description(description, &mut errors);
    }
    if let Some(meshes) = &metadata.meshes {
        check_meshes(meshes, &mut errors);
    }
    finish(errors)
}

/// Semantic checks on a typed patch
pub fn check_patch(patch: &ScenePatch) -> Result<()> {
    let mut errors = Vec::new();
    if let Some(name) = &patch.name {
        check_name(name, &mut errors);
    }
    if let Some(description) = &patch.description {
        check_description(description, &mut errors);
    }
    if let Some(meshes) = &patch.meshes {
        check_meshes(meshes, &mut errors);
    }
    finish(errors)
}

fn finish(errors: Vec<FieldError>) -> Result<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(SceneStoreError::Validation(errors))
    }
}

fn object(value: &Value) -> Result<&Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| SceneStoreError::field("", "expected a JSON object"))
}

fn string_at(obj: &Map<String, Value>, key: &str, errors: &mut Vec<FieldError>) -> Option<String> {
    match obj.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            errors.push(FieldError::new(key, "expected a string"));
            None
        }
    }
}

fn meshes_at(obj: &Map<String, Value>, errors: &mut Vec<FieldError>) -> Option<Meshes> {
    let value = match obj.get("meshes") {
        None | Some(Value::Null) => return None,
        Some(value) => value,
    };
    let Some(map) = value.as_object() else {
        errors.push(FieldError::new("meshes", "expected an object"));
        return None;
    };

    let mut meshes = Meshes::new();
    for (mesh_id, mesh) in map {
        let path = format!("meshes.{}", mesh_id);
        let Some(mesh) = mesh.as_object() else {
            errors.push(FieldError::new(path, "expected an object"));
            continue;
        };

        // Older clients repeat the key inside the mesh
        if let Some(id) = mesh.get("id") {
            if id.as_str() != Some(mesh_id.as_str()) {
                errors.push(FieldError::new(
                    format!("{}.id", path),
                    format!("does not match key \"{}\"", mesh_id),
                ));
            }
        }

        let entity_ids = match mesh.get("entityIds") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => {
                let mut ids = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    match item.as_str() {
                        Some(s) => ids.push(s.to_string()),
                        None => errors.push(FieldError::new(
                            format!("{}.entityIds[{}]", path, i),
                            "expected a string",
                        )),
                    }
                }
                ids
            }
            Some(_) => {
                errors.push(FieldError::new(
                    format!("{}.entityIds", path),
                    "expected an array",
                ));
                continue;
            }
        };

        meshes.insert(mesh_id.clone(), Mesh { entity_ids });
    }
    Some(meshes)
}

fn check_name(name: &str, errors: &mut Vec<FieldError>) {
    if name.trim().is_empty() {
        errors.push(FieldError::new("name", "must not be empty"));
    } else if name.chars().count() > NAME_MAX_LEN {
        errors.push(FieldError::new(
            "name",
            format!("must be at most {} characters", NAME_MAX_LEN),
        ));
    }
}

fn check_description(description: &str, errors: &mut Vec<FieldError>) {
    if description.chars().count() > DESCRIPTION_MAX_LEN {
        errors.push(FieldError::new(
            "description",
            format!("must be at most {} characters", DESCRIPTION_MAX_LEN),
        ));
    }
}

/// Entity ids may repeat across meshes, but not within one
fn check_meshes(meshes: &Meshes, errors: &mut Vec<FieldError>) {
    for (mesh_id, mesh) in meshes {
        let path = format!("meshes.{}", mesh_id);
        if mesh_id.trim().is_empty() {
            errors.push(FieldError::new("meshes", "mesh id must not be empty"));
        } else if mesh_id.chars().count() > MESH_ID_MAX_LEN {
            errors.push(FieldError::new(
                path.clone(),
                format!("mesh id must be at most {} characters", MESH_ID_MAX_LEN),
            ));
        }

        let mut seen = HashSet::new();
        for (i, entity_id) in mesh.entity_ids.iter().enumerate() {
            let entry = format!("{}.entityIds[{}]", path, i);
            if entity_id.trim().is_empty() {
                errors.push(FieldError::new(entry, "must not be empty"));
            } else if !seen.insert(entity_id.as_str()) {
                errors.push(FieldError::new(
                    entry,
                    format!("duplicate entity id \"{}\"", entity_id),
                ));
            }
        }
    }
}
