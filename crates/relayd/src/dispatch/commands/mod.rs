//! The standard command set, registered explicitly.

mod build;
mod console;
mod files;
mod memory;
mod scene;
mod testing;

use super::registry::RouteEntry;

/// Registration list for every host command.
#[must_use]
pub fn standard_routes() -> Vec<RouteEntry> {
    vec![
        RouteEntry::typed("create-object", true, scene::create_object),
        RouteEntry::typed("add-component", true, scene::add_component),
        RouteEntry::typed("set-property", true, scene::set_property),
        RouteEntry::typed("set-transform", true, scene::set_transform),
        RouteEntry::typed("link-reference", true, scene::link_reference),
        RouteEntry::typed("open-scene", true, scene::open_scene),
        RouteEntry::new("save-scene", true, scene::save_scene),
        RouteEntry::typed("create-prefab", true, scene::create_prefab),
        RouteEntry::typed("execute-menu-item", true, scene::execute_menu_item),
        RouteEntry::typed("write-file", true, files::write_file),
        RouteEntry::typed("mem-append", true, memory::append),
        RouteEntry::typed("mem-read", false, memory::read),
        RouteEntry::typed("kv-set", true, memory::kv_set),
        RouteEntry::typed("kv-get", true, memory::kv_get),
        RouteEntry::typed("console-read", true, console::read),
        RouteEntry::typed("run-tests", true, testing::run_tests),
        RouteEntry::typed("set-build-scenes", true, build::set_build_scenes),
        RouteEntry::typed("build-player", true, build::build_player),
    ]
}
