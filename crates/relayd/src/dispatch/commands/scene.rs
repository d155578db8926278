use serde::Deserialize;
use serde_json::{Value, json};

use crate::context::CommandContext;
use crate::dispatch::CommandError;
use crate::host::TransformUpdate;

#[derive(Debug, Deserialize)]
pub(super) struct CreateObject {
    name: String,
    #[serde(default)]
    parent: Option<String>,
}

pub(super) fn create_object(
    ctx: &mut CommandContext<'_>,
    args: CreateObject,
) -> Result<Value, CommandError> {
    let path = ctx
        .scene()
        .create_object(&args.name, args.parent.as_deref())?;
    Ok(json!({ "path": path }))
}

#[derive(Debug, Deserialize)]
pub(super) struct AddComponent {
    path: String,
    #[serde(rename = "type")]
    type_name: String,
}

pub(super) fn add_component(
    ctx: &mut CommandContext<'_>,
    args: AddComponent,
) -> Result<Value, CommandError> {
    let component = ctx.scene().add_component(&args.path, &args.type_name)?;
    Ok(json!({ "path": args.path, "component": component }))
}

#[derive(Debug, Deserialize)]
pub(super) struct SetProperty {
    path: String,
    component: String,
    property: String,
    value: Value,
}

pub(super) fn set_property(
    ctx: &mut CommandContext<'_>,
    args: SetProperty,
) -> Result<Value, CommandError> {
    ctx.scene()
        .set_property(&args.path, &args.component, &args.property, &args.value)?;
    Ok(json!({ "path": args.path, "component": args.component, "property": args.property }))
}

#[derive(Debug, Deserialize)]
pub(super) struct SetTransform {
    path: String,
    #[serde(flatten)]
    update: TransformUpdate,
}

pub(super) fn set_transform(
    ctx: &mut CommandContext<'_>,
    args: SetTransform,
) -> Result<Value, CommandError> {
    ctx.scene().set_transform(&args.path, &args.update)?;
    Ok(json!({ "path": args.path }))
}

#[derive(Debug, Deserialize)]
pub(super) struct LinkReference {
    target: String,
    component: String,
    property: String,
    source: String,
}

pub(super) fn link_reference(
    ctx: &mut CommandContext<'_>,
    args: LinkReference,
) -> Result<Value, CommandError> {
    ctx.scene().link_reference(
        &args.target,
        &args.component,
        &args.property,
        &args.source,
    )?;
    Ok(json!({ "target": args.target, "source": args.source }))
}

#[derive(Debug, Deserialize)]
pub(super) struct ScenePath {
    path: String,
}

pub(super) fn open_scene(
    ctx: &mut CommandContext<'_>,
    args: ScenePath,
) -> Result<Value, CommandError> {
    let scene = ctx.scene().open_scene(&args.path)?;
    Ok(json!({ "scene": scene }))
}

pub(super) fn save_scene(ctx: &mut CommandContext<'_>, _body: &[u8]) -> Result<Value, CommandError> {
    let scene = ctx.scene().save_scene()?;
    Ok(json!({ "scene": scene }))
}

#[derive(Debug, Deserialize)]
pub(super) struct CreatePrefab {
    from: String,
    to: String,
}

pub(super) fn create_prefab(
    ctx: &mut CommandContext<'_>,
    args: CreatePrefab,
) -> Result<Value, CommandError> {
    let prefab = ctx.scene().create_prefab(&args.from, &args.to)?;
    Ok(json!({ "path": prefab.path, "guid": prefab.guid }))
}

#[derive(Debug, Deserialize)]
pub(super) struct MenuItem {
    menu: String,
}

pub(super) fn execute_menu_item(
    ctx: &mut CommandContext<'_>,
    args: MenuItem,
) -> Result<Value, CommandError> {
    ctx.scene().execute_menu_item(&args.menu)?;
    Ok(json!({ "menu": args.menu }))
}
