//! `write-file`: lets a driver add code to the host under a whitelisted root.

use std::fs;
use std::path::{Component, Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::context::CommandContext;
use crate::dispatch::CommandError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct WriteFile {
    rel_path: String,
    #[serde(default)]
    contents: Option<String>,
    #[serde(default)]
    contents_base64: Option<String>,
}

impl WriteFile {
    fn into_bytes(self) -> Result<(String, Vec<u8>), CommandError> {
        let bytes = match (self.contents, self.contents_base64) {
            (Some(_), Some(_)) => {
                return Err(CommandError::validation(
                    "provide either contents or contentsBase64, not both",
                ));
            }
            (Some(text), None) => text.into_bytes(),
            (None, Some(encoded)) => STANDARD.decode(encoded.trim()).map_err(|error| {
                CommandError::validation(format!("invalid contentsBase64: {error}"))
            })?,
            (None, None) => Vec::new(),
        };
        Ok((self.rel_path, bytes))
    }
}

pub(super) fn write_file(
    ctx: &mut CommandContext<'_>,
    args: WriteFile,
) -> Result<Value, CommandError> {
    let (rel_path, bytes) = args.into_bytes()?;
    let target = resolve_generated_path(ctx.generated_dir(), &rel_path)?;
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&target, &bytes)?;
    ctx.compiler().import(&target)?;
    Ok(json!({
        "path": target.display().to_string(),
        "bytes": bytes.len(),
    }))
}

/// Resolves `relative` beneath `root`, rejecting anything that escapes it.
///
/// Two checks apply. Lexically, the path must be relative and its `..`
/// segments must never climb above `root`. Physically, the deepest ancestor
/// that already exists is canonicalised and must still lie inside the
/// canonical `root`, which catches symlinks pointing elsewhere. `root` is
/// created if missing.
///
/// # Errors
///
/// Returns [`CommandError::PathOutsideRoot`] on escape and
/// [`CommandError::Io`] when the filesystem cannot be inspected.
pub(super) fn resolve_generated_path(root: &Path, relative: &str) -> Result<PathBuf, CommandError> {
    if relative.trim().is_empty() {
        return Err(CommandError::validation("relPath is required"));
    }
    let mut normalised = PathBuf::new();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(segment) => normalised.push(segment),
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalised.pop() {
                    return Err(CommandError::PathOutsideRoot);
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(CommandError::PathOutsideRoot);
            }
        }
    }
    if normalised.as_os_str().is_empty() {
        return Err(CommandError::PathOutsideRoot);
    }

    fs::create_dir_all(root)?;
    let canonical_root = root.canonicalize()?;
    let candidate = canonical_root.join(&normalised);
    let (existing, remainder) = deepest_existing(&candidate);
    let resolved = existing.canonicalize()?.join(remainder);
    if resolved.starts_with(&canonical_root) && resolved != canonical_root {
        Ok(resolved)
    } else {
        Err(CommandError::PathOutsideRoot)
    }
}

fn deepest_existing(path: &Path) -> (&Path, &Path) {
    for ancestor in path.ancestors() {
        if ancestor.exists() {
            let remainder = path.strip_prefix(ancestor).unwrap_or(Path::new(""));
            return (ancestor, remainder);
        }
    }
    (path, Path::new(""))
}
