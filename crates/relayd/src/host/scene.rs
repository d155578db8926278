//! In-memory object graph used by the headless host.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{HostError, TransformUpdate};

/// Typed component property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum PropertyValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    String(String),
    /// Path of the referenced object, if any.
    Reference(Option<String>),
}

impl PropertyValue {
    /// Assigns `value` if it fits this property's type. Numeric and boolean
    /// properties also accept their textual spelling.
    fn assign(&mut self, value: &Value) -> bool {
        match (self, value) {
            (Self::Float(slot), Value::Number(number)) => number.as_f64().map(|v| *slot = v).is_some(),
            (Self::Float(slot), Value::String(text)) => {
                text.trim().parse().map(|v| *slot = v).is_ok()
            }
            (Self::Int(slot), Value::Number(number)) => number.as_i64().map(|v| *slot = v).is_some(),
            (Self::Int(slot), Value::String(text)) => {
                text.trim().parse().map(|v| *slot = v).is_ok()
            }
            (Self::Bool(slot), Value::Bool(flag)) => {
                *slot = *flag;
                true
            }
            (Self::Bool(slot), Value::String(text)) => {
                text.trim().to_ascii_lowercase().parse().map(|v| *slot = v).is_ok()
            }
            (Self::String(slot), Value::String(text)) => {
                text.clone_into(slot);
                true
            }
            (Self::String(slot), Value::Number(number)) => {
                *slot = number.to_string();
                true
            }
            (Self::String(slot), Value::Bool(flag)) => {
                *slot = flag.to_string();
                true
            }
            _ => false,
        }
    }
}

pub(crate) type Properties = BTreeMap<String, PropertyValue>;

/// Component types every headless host knows about, with default values.
pub(crate) fn builtin_component_types() -> BTreeMap<String, Properties> {
    let mut types = BTreeMap::new();
    let mut add = |name: &str, props: Vec<(&str, PropertyValue)>| {
        types.insert(
            name.to_owned(),
            props
                .into_iter()
                .map(|(key, value)| (key.to_owned(), value))
                .collect(),
        );
    };
    add(
        "Rigidbody",
        vec![
            ("mass", PropertyValue::Float(1.0)),
            ("useGravity", PropertyValue::Bool(true)),
            ("isKinematic", PropertyValue::Bool(false)),
        ],
    );
    add(
        "BoxCollider",
        vec![("isTrigger", PropertyValue::Bool(false))],
    );
    add(
        "Camera",
        vec![
            ("fieldOfView", PropertyValue::Float(60.0)),
            ("orthographic", PropertyValue::Bool(false)),
            ("target", PropertyValue::Reference(None)),
        ],
    );
    add(
        "Light",
        vec![
            ("intensity", PropertyValue::Float(1.0)),
            ("range", PropertyValue::Float(10.0)),
            ("color", PropertyValue::String(String::from("#FFFFFF"))),
        ],
    );
    add(
        "AudioSource",
        vec![
            ("volume", PropertyValue::Float(1.0)),
            ("loop", PropertyValue::Bool(false)),
            ("priority", PropertyValue::Int(128)),
        ],
    );
    types
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Transform {
    pub(crate) position: [f64; 3],
    pub(crate) rotation: [f64; 3],
    pub(crate) scale: [f64; 3],
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            rotation: [0.0; 3],
            scale: [1.0; 3],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct SceneObject {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) parent: Option<String>,
    #[serde(default)]
    pub(crate) transform: Transform,
    #[serde(default)]
    pub(crate) components: BTreeMap<String, Properties>,
}

/// Objects keyed by absolute path (`/Parent/Child`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct SceneGraph {
    objects: BTreeMap<String, SceneObject>,
}

const TRANSFORM: &str = "Transform";

/// Fails unless `name` is a component type the host knows about.
fn require_type(types: &BTreeMap<String, Properties>, name: &str) -> Result<(), HostError> {
    if name == TRANSFORM || types.contains_key(name) {
        Ok(())
    } else {
        Err(HostError::type_not_found(name))
    }
}

impl SceneGraph {
    /// Resolves an absolute path, or a bare name to the first object with
    /// that name.
    pub(crate) fn find(&self, path: &str) -> Option<String> {
        if path.starts_with('/') {
            return self.objects.contains_key(path).then(|| path.to_owned());
        }
        self.objects
            .iter()
            .find(|(_, object)| object.name == path)
            .map(|(key, _)| key.clone())
    }

    pub(crate) fn get(&self, path: &str) -> Option<&SceneObject> {
        self.find(path).and_then(|key| self.objects.get(&key))
    }

    fn object_mut(&mut self, path: &str) -> Result<&mut SceneObject, HostError> {
        let key = self.find(path).ok_or_else(|| HostError::gameobject(path))?;
        self.objects
            .get_mut(&key)
            .ok_or_else(|| HostError::gameobject(path))
    }

    pub(crate) fn create(&mut self, name: &str, parent: Option<&str>) -> Result<String, HostError> {
        let name = name.trim();
        if name.is_empty() || name.contains('/') {
            return Err(HostError::Invalid(format!("invalid object name: '{name}'")));
        }
        let parent_key = match parent.map(str::trim).filter(|p| !p.is_empty()) {
            Some(parent) => Some(self.find(parent).ok_or_else(|| HostError::gameobject(parent))?),
            None => None,
        };
        let prefix = parent_key.as_deref().unwrap_or("");
        let mut unique = name.to_owned();
        let mut suffix = 1_u32;
        while self.objects.contains_key(&format!("{prefix}/{unique}")) {
            unique = format!("{name} ({suffix})");
            suffix += 1;
        }
        let key = format!("{prefix}/{unique}");
        self.objects.insert(
            key.clone(),
            SceneObject {
                name: unique,
                parent: parent_key,
                transform: Transform::default(),
                components: BTreeMap::new(),
            },
        );
        Ok(key)
    }

    pub(crate) fn add_component(
        &mut self,
        path: &str,
        type_name: &str,
        schema: Option<&Properties>,
    ) -> Result<String, HostError> {
        let object = self.object_mut(path)?;
        if type_name == TRANSFORM {
            return Ok(type_name.to_owned());
        }
        let schema = schema.ok_or_else(|| HostError::type_not_found(type_name))?;
        object
            .components
            .entry(type_name.to_owned())
            .or_insert_with(|| schema.clone());
        Ok(type_name.to_owned())
    }

    pub(crate) fn set_property(
        &mut self,
        types: &BTreeMap<String, Properties>,
        path: &str,
        component: &str,
        property: &str,
        value: &Value,
    ) -> Result<(), HostError> {
        let object = self.object_mut(path)?;
        require_type(types, component)?;
        let slot = object
            .components
            .get_mut(component)
            .ok_or_else(|| HostError::component_missing(component))?
            .get_mut(property)
            .ok_or_else(|| HostError::property_not_found(property))?;
        if slot.assign(value) {
            Ok(())
        } else {
            Err(HostError::unsupported_property(property))
        }
    }

    pub(crate) fn set_transform(
        &mut self,
        path: &str,
        update: &TransformUpdate,
    ) -> Result<(), HostError> {
        let transform = &mut self.object_mut(path)?.transform;
        if let Some(position) = update.position {
            transform.position = position;
        }
        if let Some(rotation) = update.rotation {
            transform.rotation = rotation;
        }
        if let Some(scale) = update.scale {
            transform.scale = scale;
        }
        Ok(())
    }

    pub(crate) fn link_reference(
        &mut self,
        types: &BTreeMap<String, Properties>,
        target: &str,
        component: &str,
        property: &str,
        source: &str,
    ) -> Result<(), HostError> {
        let source_key = self
            .find(source)
            .ok_or_else(|| HostError::NotFound(String::from("source not found")))?;
        let target_key = self
            .find(target)
            .ok_or_else(|| HostError::NotFound(String::from("target not found")))?;
        require_type(types, component)?;
        let slot = self
            .objects
            .get_mut(&target_key)
            .and_then(|object| object.components.get_mut(component))
            .ok_or_else(|| HostError::component_missing(component))?
            .get_mut(property)
            .ok_or_else(|| HostError::property_not_found(property))?;
        match slot {
            PropertyValue::Reference(reference) => {
                *reference = Some(source_key);
                Ok(())
            }
            _ => Err(HostError::Invalid(format!(
                "property '{property}' is not an object reference"
            ))),
        }
    }

    /// The object at `path` and its descendants, keyed relative to its parent.
    pub(crate) fn subtree(&self, path: &str) -> Result<BTreeMap<String, SceneObject>, HostError> {
        let key = self.find(path).ok_or_else(|| HostError::gameobject(path))?;
        let base_len = key.rfind('/').unwrap_or(0);
        let nested = format!("{key}/");
        Ok(self
            .objects
            .iter()
            .filter(|(candidate, _)| **candidate == key || candidate.starts_with(&nested))
            .map(|(candidate, object)| {
                let relative = candidate.get(base_len..).unwrap_or(candidate.as_str());
                (relative.to_owned(), object.clone())
            })
            .collect())
    }

    pub(crate) fn len(&self) -> usize {
        self.objects.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn graph_with_player() -> SceneGraph {
        let mut graph = SceneGraph::default();
        graph.create("Player", None).expect("create player");
        graph
            .add_component(
                "/Player",
                "Rigidbody",
                builtin_component_types().get("Rigidbody"),
            )
            .expect("add rigidbody");
        graph
    }

    #[test]
    fn children_get_nested_paths_and_duplicates_are_renamed() {
        let mut graph = graph_with_player();
        assert_eq!(graph.create("Gun", Some("Player")).expect("child"), "/Player/Gun");
        assert_eq!(
            graph.create("Gun", Some("/Player")).expect("dup"),
            "/Player/Gun (1)"
        );
        let error = graph.create("Hat", Some("/Nobody")).expect_err("no parent");
        assert_eq!(error.to_string(), "gameobject not found: /Nobody");
    }

    #[test]
    fn set_property_checks_each_level_in_turn() {
        let types = builtin_component_types();
        let mut graph = graph_with_player();
        graph
            .set_property(&types, "/Player", "Rigidbody", "mass", &json!("2.5"))
            .expect("numeric text");
        let mass = graph
            .get("/Player")
            .and_then(|o| o.components.get("Rigidbody"))
            .and_then(|c| c.get("mass"))
            .cloned();
        assert_eq!(mass, Some(PropertyValue::Float(2.5)));

        let messages: Vec<String> = [
            graph.set_property(&types, "/Ghost", "Rigidbody", "mass", &json!(1)),
            graph.set_property(&types, "/Player", "Hinge", "angle", &json!(1)),
            graph.set_property(&types, "/Player", "Light", "range", &json!(1)),
            graph.set_property(&types, "/Player", "Rigidbody", "drag", &json!(1)),
            graph.set_property(&types, "/Player", "Rigidbody", "useGravity", &json!([1])),
        ]
        .into_iter()
        .map(|r| r.expect_err("should fail").to_string())
        .collect();
        assert_eq!(
            messages,
            vec![
                "gameobject not found: /Ghost",
                "type not found: Hinge",
                "component missing: Light",
                "property not found: drag",
                "unsupported property type for 'useGravity'",
            ]
        );
    }

    #[test]
    fn link_reference_requires_reference_property() {
        let types = builtin_component_types();
        let mut graph = graph_with_player();
        graph.create("Cam", None).expect("cam");
        graph
            .add_component("/Cam", "Camera", builtin_component_types().get("Camera"))
            .expect("camera");
        graph
            .link_reference(&types, "/Cam", "Camera", "target", "Player")
            .expect("link");
        let unknown = graph
            .link_reference(&types, "/Cam", "Tripod", "target", "Player")
            .expect_err("unregistered type");
        assert_eq!(unknown.to_string(), "type not found: Tripod");
        let error = graph
            .link_reference(&types, "/Cam", "Camera", "fieldOfView", "/Player")
            .expect_err("not a reference");
        assert_eq!(
            error.to_string(),
            "property 'fieldOfView' is not an object reference"
        );
    }

    #[test]
    fn subtree_is_relative_to_the_root_object() {
        let mut graph = graph_with_player();
        graph.create("Gun", Some("/Player")).expect("child");
        graph.create("Other", None).expect("sibling");
        let keys: Vec<_> = graph.subtree("/Player").expect("subtree").into_keys().collect();
        assert_eq!(keys, vec!["/Player", "/Player/Gun"]);
    }
}
