//! In-memory host for running the server without an engine attached.
//!
//! Scenes and prefabs are JSON documents under the project root. Nothing
//! compiles and no tests are registered, but every command has a working
//! implementation so the daemon can be driven end to end.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::scene::{Properties, SceneGraph, builtin_component_types};
use super::{
    BuildPipeline, BuildReport, BuildRequest, Compiler, HostBindings, HostError, PrefabInfo,
    ProjectIndex, PropertyValue, ReloadOutcome, SceneHost, TransformUpdate,
};
use crate::console::ConsoleHandle;
use crate::dispatch::RouteEntry;
use crate::test_bridge::{TestEventSink, TestMode, TestRunner};

/// Scene that is active before any `open-scene`.
pub const DEFAULT_SCENE: &str = "Assets/Scenes/Main.scene.json";
const MANIFEST_FILE: &str = "build_manifest.json";
const SCENE_SUFFIXES: [&str; 2] = [".scene.json", ".unity"];
const SKIPPED_DIRS: [&str; 3] = ["Library", "Temp", "target"];

/// Builds a complete set of headless collaborators rooted at `project_root`.
pub fn bindings(project_root: impl Into<PathBuf>, console: ConsoleHandle) -> HostBindings {
    let root = project_root.into();
    HostBindings {
        scene: Box::new(HeadlessHost::new(&root)),
        build: Box::new(HeadlessBuild::new(&root)),
        compiler: Box::new(HeadlessCompiler::default()),
        tests: Box::new(IdleTestRunner),
        console: Box::new(console),
        committer: None,
    }
}

/// Object graph, scenes and menus held in memory.
#[derive(Debug)]
pub struct HeadlessHost {
    root: PathBuf,
    graph: SceneGraph,
    active_scene: Option<String>,
    component_types: BTreeMap<String, Properties>,
}

impl HeadlessHost {
    /// Host for the project at `root`, with [`DEFAULT_SCENE`] active.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            graph: SceneGraph::default(),
            active_scene: Some(DEFAULT_SCENE.to_owned()),
            component_types: builtin_component_types(),
        }
    }

    /// Makes a component type available to `add-component`.
    pub fn register_component_type<I, K>(&mut self, name: impl Into<String>, properties: I)
    where
        I: IntoIterator<Item = (K, PropertyValue)>,
        K: Into<String>,
    {
        self.component_types.insert(
            name.into(),
            properties
                .into_iter()
                .map(|(key, value)| (key.into(), value))
                .collect(),
        );
    }

    /// Number of objects in the open scene.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.graph.len()
    }

    /// Current value of a component property.
    #[must_use]
    pub fn property(&self, path: &str, component: &str, property: &str) -> Option<PropertyValue> {
        self.graph
            .get(path)?
            .components
            .get(component)?
            .get(property)
            .cloned()
    }

    fn new_scene(&mut self) {
        self.graph = SceneGraph::default();
        self.active_scene = None;
    }
}

impl SceneHost for HeadlessHost {
    fn create_object(&mut self, name: &str, parent: Option<&str>) -> Result<String, HostError> {
        self.graph.create(name, parent)
    }

    fn add_component(&mut self, path: &str, type_name: &str) -> Result<String, HostError> {
        let schema = self.component_types.get(type_name);
        self.graph.add_component(path, type_name, schema)
    }

    fn set_property(
        &mut self,
        path: &str,
        component: &str,
        property: &str,
        value: &Value,
    ) -> Result<(), HostError> {
        self.graph
            .set_property(&self.component_types, path, component, property, value)
    }

    fn set_transform(&mut self, path: &str, update: &TransformUpdate) -> Result<(), HostError> {
        self.graph.set_transform(path, update)
    }

    fn link_reference(
        &mut self,
        target: &str,
        component: &str,
        property: &str,
        source: &str,
    ) -> Result<(), HostError> {
        self.graph
            .link_reference(&self.component_types, target, component, property, source)
    }

    fn open_scene(&mut self, path: &str) -> Result<String, HostError> {
        let missing = || HostError::NotFound(format!("scene not found: {path}"));
        let file = project_path(&self.root, path).ok_or_else(missing)?;
        let raw = match fs::read_to_string(&file) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Err(missing()),
            Err(error) => return Err(HostError::Io(error)),
        };
        self.graph = serde_json::from_str(&raw)
            .map_err(|error| HostError::Failed(format!("failed to load scene {path}: {error}")))?;
        self.active_scene = Some(path.to_owned());
        Ok(path.to_owned())
    }

    fn save_scene(&mut self) -> Result<String, HostError> {
        let Some(active) = self.active_scene.clone() else {
            return Err(HostError::Invalid(String::from("no active scene")));
        };
        let file = project_path(&self.root, &active)
            .ok_or_else(|| HostError::Invalid(format!("scene path escapes project: {active}")))?;
        write_json(&file, &self.graph)?;
        Ok(active)
    }

    fn create_prefab(&mut self, from: &str, to: &str) -> Result<PrefabInfo, HostError> {
        let objects = self.graph.subtree(from)?;
        let file = project_path(&self.root, to)
            .ok_or_else(|| HostError::Invalid(format!("prefab path escapes project: {to}")))?;
        write_json(&file, &objects)?;
        Ok(PrefabInfo {
            path: to.to_owned(),
            guid: asset_guid(to),
        })
    }

    fn execute_menu_item(&mut self, menu: &str) -> Result<(), HostError> {
        match menu {
            "File/Save" => self.save_scene().map(|_| ()),
            "File/New Scene" => {
                self.new_scene();
                Ok(())
            }
            "Assets/Refresh" => Ok(()),
            _ => Err(HostError::Failed(format!("menu failed: {menu}"))),
        }
    }

    fn index_project(&self) -> Result<ProjectIndex, HostError> {
        let mut files = Vec::new();
        collect_files(&self.root, &self.root, &mut files)?;
        files.sort();
        let (scenes, assets): (Vec<_>, Vec<_>) = files
            .into_iter()
            .filter(|file| file.starts_with("Assets/"))
            .partition(|file| SCENE_SUFFIXES.iter().any(|suffix| file.ends_with(suffix)));
        Ok(ProjectIndex {
            generated_at: timestamp()?,
            scenes,
            assets,
        })
    }
}

/// Build settings and a manifest-writing player build.
#[derive(Debug)]
pub struct HeadlessBuild {
    root: PathBuf,
    scenes: Vec<String>,
}

impl HeadlessBuild {
    /// Build pipeline for the project at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            scenes: Vec::new(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BuildManifest<'a> {
    target: &'a str,
    scenes: &'a [String],
    built_at: String,
}

impl BuildPipeline for HeadlessBuild {
    fn set_build_scenes(&mut self, scenes: &[String]) -> Result<usize, HostError> {
        if let Some(blank) = scenes.iter().find(|scene| scene.trim().is_empty()) {
            return Err(HostError::Invalid(format!("invalid scene path: '{blank}'")));
        }
        self.scenes = scenes.to_vec();
        Ok(self.scenes.len())
    }

    fn build_player(&mut self, request: &BuildRequest) -> Result<BuildReport, HostError> {
        if request.target.trim().is_empty() {
            return Err(HostError::Invalid(String::from("build target is required")));
        }
        if self.scenes.is_empty() {
            return Err(HostError::Invalid(String::from(
                "no scenes in build settings",
            )));
        }
        let output = project_path(&self.root, &request.output_path).ok_or_else(|| {
            HostError::Invalid(format!(
                "output path escapes project: {}",
                request.output_path
            ))
        })?;
        let manifest = BuildManifest {
            target: &request.target,
            scenes: &self.scenes,
            built_at: timestamp()?,
        };
        write_json(&output.join(MANIFEST_FILE), &manifest)?;
        Ok(BuildReport {
            target: request.target.clone(),
            output_path: request.output_path.clone(),
            scenes: self.scenes.clone(),
        })
    }
}

/// Compiler that is never busy and reloads a fixed handler list.
#[derive(Default)]
pub struct HeadlessCompiler {
    routes: Vec<RouteEntry>,
    imported: Vec<PathBuf>,
}

impl HeadlessCompiler {
    /// Compiler whose reloads declare `routes`.
    #[must_use]
    pub fn with_routes(routes: Vec<RouteEntry>) -> Self {
        Self {
            routes,
            imported: Vec::new(),
        }
    }

    /// Files passed to [`Compiler::import`] so far.
    #[must_use]
    pub fn imported(&self) -> &[PathBuf] {
        &self.imported
    }
}

impl Compiler for HeadlessCompiler {
    fn is_compiling(&self) -> bool {
        false
    }

    fn import(&mut self, path: &Path) -> Result<(), HostError> {
        self.imported.push(path.to_path_buf());
        Ok(())
    }

    fn reload(&mut self) -> ReloadOutcome {
        ReloadOutcome::loaded(self.routes.clone())
    }
}

/// Runner with no tests; every run finishes immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdleTestRunner;

impl TestRunner for IdleTestRunner {
    fn start(&mut self, _mode: TestMode, sink: TestEventSink) -> Result<(), HostError> {
        sink.run_finished();
        Ok(())
    }
}

/// Joins a project-relative path, refusing anything that could leave `root`.
fn project_path(root: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative);
    let plain = relative
        .components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
    (plain && !relative.as_os_str().is_empty()).then(|| root.join(relative))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), HostError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let rendered = serde_json::to_vec_pretty(value)
        .map_err(|error| HostError::Failed(format!("failed to serialise asset: {error}")))?;
    fs::write(path, rendered)?;
    Ok(())
}

fn asset_guid(path: &str) -> String {
    Sha256::digest(path.as_bytes())
        .iter()
        .take(16)
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

fn timestamp() -> Result<String, HostError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|error| HostError::Failed(format!("failed to format timestamp: {error}")))
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<String>) -> Result<(), HostError> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') {
            continue;
        }
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            if !SKIPPED_DIRS.contains(&&*name) {
                collect_files(root, &path, out)?;
            }
        } else if file_type.is_file()
            && let Ok(relative) = path.strip_prefix(root)
        {
            let rendered: Vec<_> = relative
                .components()
                .map(|component| component.as_os_str().to_string_lossy().into_owned())
                .collect();
            out.push(rendered.join("/"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::{fixture, rstest};
    use serde_json::json;
    use tempfile::TempDir;

    #[fixture]
    fn project() -> (TempDir, HeadlessHost) {
        let dir = tempfile::tempdir().expect("temp dir");
        let host = HeadlessHost::new(dir.path());
        (dir, host)
    }

    #[rstest]
    fn save_then_open_restores_the_scene(project: (TempDir, HeadlessHost)) {
        let (dir, mut host) = project;
        host.create_object("Player", None).expect("create");
        let saved = host.save_scene().expect("save");
        assert_eq!(saved, DEFAULT_SCENE);
        assert!(dir.path().join(DEFAULT_SCENE).is_file());

        host.execute_menu_item("File/New Scene").expect("new scene");
        assert_eq!(host.object_count(), 0);
        assert_eq!(
            host.save_scene().expect_err("nothing active").to_string(),
            "no active scene"
        );

        host.open_scene(DEFAULT_SCENE).expect("open");
        assert_eq!(host.object_count(), 1);
    }

    #[rstest]
    fn open_scene_reports_missing_files(project: (TempDir, HeadlessHost)) {
        let (_dir, mut host) = project;
        for path in ["Assets/Scenes/Nope.scene.json", "../outside.json", "/etc/passwd"] {
            let error = host.open_scene(path).expect_err("missing");
            assert_eq!(error.to_string(), format!("scene not found: {path}"));
        }
    }

    #[rstest]
    fn prefab_export_writes_subtree(project: (TempDir, HeadlessHost)) {
        let (dir, mut host) = project;
        host.create_object("Enemy", None).expect("create");
        host.create_object("Eye", Some("/Enemy")).expect("child");
        let info = host
            .create_prefab("/Enemy", "Assets/Prefabs/Enemy.prefab")
            .expect("prefab");
        assert_eq!(info.guid.len(), 32);
        let raw = fs::read_to_string(dir.path().join("Assets/Prefabs/Enemy.prefab"))
            .expect("read prefab");
        let parsed: Value = serde_json::from_str(&raw).expect("prefab json");
        assert!(parsed.get("/Enemy/Eye").is_some());
    }

    #[rstest]
    fn unknown_menu_fails(project: (TempDir, HeadlessHost)) {
        let (_dir, mut host) = project;
        let error = host.execute_menu_item("Window/Nope").expect_err("unknown");
        assert_eq!(error.to_string(), "menu failed: Window/Nope");
    }

    #[rstest]
    fn registered_component_types_become_available(project: (TempDir, HeadlessHost)) {
        let (_dir, mut host) = project;
        host.create_object("Door", None).expect("create");
        let error = host.add_component("/Door", "Hinge").expect_err("unknown type");
        assert_eq!(error.to_string(), "type not found: Hinge");
        host.register_component_type("Hinge", [("angle", PropertyValue::Float(0.0))]);
        host.add_component("/Door", "Hinge").expect("add");
        host.set_property("/Door", "Hinge", "angle", &json!(90))
            .expect("set");
        assert_eq!(
            host.property("/Door", "Hinge", "angle"),
            Some(PropertyValue::Float(90.0))
        );
    }

    #[test]
    fn index_separates_scenes_from_assets() {
        let dir = tempfile::tempdir().expect("temp dir");
        let assets = dir.path().join("Assets");
        fs::create_dir_all(assets.join("Scenes")).expect("mkdir");
        fs::create_dir_all(dir.path().join(".relay")).expect("mkdir");
        fs::write(assets.join("Scenes/Main.scene.json"), "{}").expect("write");
        fs::write(assets.join("Player.cs"), "").expect("write");
        fs::write(dir.path().join(".relay/kv.json"), "{}").expect("write");

        let index = HeadlessHost::new(dir.path()).index_project().expect("index");
        assert_eq!(index.scenes, vec!["Assets/Scenes/Main.scene.json"]);
        assert_eq!(index.assets, vec!["Assets/Player.cs"]);
    }

    #[test]
    fn build_requires_scenes_and_writes_manifest() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut build = HeadlessBuild::new(dir.path());
        let request = BuildRequest {
            target: String::from("StandaloneLinux64"),
            output_path: String::from("Builds/Linux"),
        };
        let error = build.build_player(&request).expect_err("no scenes");
        assert_eq!(error.to_string(), "no scenes in build settings");

        build
            .set_build_scenes(&[String::from(DEFAULT_SCENE)])
            .expect("set scenes");
        let report = build.build_player(&request).expect("build");
        assert_eq!(report.scenes, vec![DEFAULT_SCENE]);
        assert!(dir.path().join("Builds/Linux/build_manifest.json").is_file());
    }
}
