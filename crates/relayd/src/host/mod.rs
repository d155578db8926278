//! Boundary to the host application.
//!
//! The server never touches host state directly; it calls these collaborator
//! traits on the execution thread. [`headless`] provides an in-memory host
//! used by the standalone daemon and the test suites.

use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::console::LogSource;
use crate::dispatch::RouteEntry;
use crate::test_bridge::TestRunner;

mod git;
pub mod headless;
mod scene;

pub use self::git::{AutoCommit, CommitError, GitAutoCommit};
pub use self::scene::PropertyValue;

/// Errors reported by host collaborators.
///
/// Messages are shown to clients verbatim.
#[derive(Debug, Error)]
pub enum HostError {
    /// A referenced object, type, scene or menu does not exist.
    #[error("{0}")]
    NotFound(String),
    /// The request cannot be applied to the addressed object.
    #[error("{0}")]
    Invalid(String),
    /// The host attempted the operation and it failed.
    #[error("{0}")]
    Failed(String),
    /// Filesystem failure inside the host.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl HostError {
    pub(crate) fn gameobject(path: &str) -> Self {
        Self::NotFound(format!("gameobject not found: {path}"))
    }

    pub(crate) fn type_not_found(type_name: &str) -> Self {
        Self::NotFound(format!("type not found: {type_name}"))
    }

    pub(crate) fn component_missing(component: &str) -> Self {
        Self::NotFound(format!("component missing: {component}"))
    }

    pub(crate) fn property_not_found(property: &str) -> Self {
        Self::NotFound(format!("property not found: {property}"))
    }

    pub(crate) fn unsupported_property(property: &str) -> Self {
        Self::Invalid(format!("unsupported property type for '{property}'"))
    }
}

/// Partial transform update; absent fields are left untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformUpdate {
    #[serde(default)]
    pub position: Option<[f64; 3]>,
    #[serde(default)]
    pub rotation: Option<[f64; 3]>,
    #[serde(default)]
    pub scale: Option<[f64; 3]>,
}

/// Saved prefab asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrefabInfo {
    pub path: String,
    pub guid: String,
}

/// Snapshot of the project's scenes and assets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectIndex {
    pub generated_at: String,
    pub scenes: Vec<String>,
    pub assets: Vec<String>,
}

/// Player build parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRequest {
    pub target: String,
    pub output_path: String,
}

/// Result of a completed player build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildReport {
    pub target: String,
    pub output_path: String,
    pub scenes: Vec<String>,
}

/// Object-graph, scene and editor operations.
pub trait SceneHost {
    /// Creates an object, optionally under `parent`, and returns its path.
    fn create_object(&mut self, name: &str, parent: Option<&str>) -> Result<String, HostError>;

    /// Ensures a component of `type_name` exists on the object.
    fn add_component(&mut self, path: &str, type_name: &str) -> Result<String, HostError>;

    /// Assigns a scalar property on a component.
    fn set_property(
        &mut self,
        path: &str,
        component: &str,
        property: &str,
        value: &Value,
    ) -> Result<(), HostError>;

    /// Applies a partial transform update.
    fn set_transform(&mut self, path: &str, update: &TransformUpdate) -> Result<(), HostError>;

    /// Points an object-reference property at `source`.
    fn link_reference(
        &mut self,
        target: &str,
        component: &str,
        property: &str,
        source: &str,
    ) -> Result<(), HostError>;

    /// Loads a scene by project-relative path.
    fn open_scene(&mut self, path: &str) -> Result<String, HostError>;

    /// Saves the active scene and returns its path.
    fn save_scene(&mut self) -> Result<String, HostError>;

    /// Saves the object at `from` as a prefab at project-relative `to`.
    fn create_prefab(&mut self, from: &str, to: &str) -> Result<PrefabInfo, HostError>;

    /// Runs an editor menu item.
    fn execute_menu_item(&mut self, menu: &str) -> Result<(), HostError>;

    /// Lists the project's scenes and assets.
    fn index_project(&self) -> Result<ProjectIndex, HostError>;
}

/// Build settings and player builds.
pub trait BuildPipeline {
    /// Replaces the scene list used by builds; returns how many were set.
    fn set_build_scenes(&mut self, scenes: &[String]) -> Result<usize, HostError>;

    /// Builds a player.
    fn build_player(&mut self, request: &BuildRequest) -> Result<BuildReport, HostError>;
}

/// Result of picking up freshly compiled code.
#[derive(Clone, Default)]
pub struct ReloadOutcome {
    pub success: bool,
    /// Every handler declared by the loaded code, replacing any earlier list.
    pub routes: Vec<RouteEntry>,
}

impl ReloadOutcome {
    /// Successful reload declaring `routes`.
    #[must_use]
    pub fn loaded(routes: Vec<RouteEntry>) -> Self {
        Self {
            success: true,
            routes,
        }
    }

    /// Failed reload; the previous handler list stays in force.
    #[must_use]
    pub fn failed() -> Self {
        Self::default()
    }
}

/// Compiler and hot-reload subsystem.
pub trait Compiler {
    /// True while a compilation is in progress.
    fn is_compiling(&self) -> bool;

    /// Registers a newly written file with the host's asset pipeline.
    fn import(&mut self, path: &Path) -> Result<(), HostError>;

    /// Loads the most recent compilation output.
    fn reload(&mut self) -> ReloadOutcome;
}

/// Every collaborator the server needs from its host.
pub struct HostBindings {
    pub scene: Box<dyn SceneHost>,
    pub build: Box<dyn BuildPipeline>,
    pub compiler: Box<dyn Compiler>,
    pub tests: Box<dyn TestRunner>,
    pub console: Box<dyn LogSource>,
    /// Present when auto-commit is enabled.
    pub committer: Option<Box<dyn AutoCommit>>,
}
