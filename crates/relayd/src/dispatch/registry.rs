//! Command name to handler table.
//!
//! Built-in commands live in a fixed table that is consulted first and can
//! never be shadowed. Everything else sits in a dynamic table rebuilt
//! wholesale on every reindex from two lists: the explicit registration list
//! supplied at construction and the handler list from the most recent
//! successful reload.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::errors::CommandError;
use super::request::{command_name, parse_body};
use super::router::DISPATCH_TARGET;
use crate::context::CommandContext;
use crate::host::ReloadOutcome;

/// Signature shared by every dynamic handler.
pub type Handler =
    dyn Fn(&mut CommandContext<'_>, &[u8]) -> Result<Value, CommandError> + Send + Sync;

/// A named dynamic handler.
#[derive(Clone)]
pub struct RouteEntry {
    name: String,
    mutating: bool,
    handler: Arc<Handler>,
}

impl RouteEntry {
    /// Handler receiving the raw body bytes. The name is normalised the same
    /// way request paths are.
    pub fn new<F>(name: &str, mutating: bool, handler: F) -> Self
    where
        F: Fn(&mut CommandContext<'_>, &[u8]) -> Result<Value, CommandError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: command_name(name),
            mutating,
            handler: Arc::new(handler),
        }
    }

    /// Handler whose body is parsed into `T` before it runs.
    pub fn typed<T, F>(name: &str, mutating: bool, handler: F) -> Self
    where
        T: DeserializeOwned,
        F: Fn(&mut CommandContext<'_>, T) -> Result<Value, CommandError> + Send + Sync + 'static,
    {
        Self::new(name, mutating, move |ctx, body| handler(ctx, parse_body(body)?))
    }

    /// Normalised command name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether success should trigger an auto-commit.
    #[must_use]
    pub const fn is_mutating(&self) -> bool {
        self.mutating
    }

    /// Runs the handler.
    ///
    /// # Errors
    ///
    /// Returns whatever the handler reports.
    pub fn invoke(&self, ctx: &mut CommandContext<'_>, body: &[u8]) -> Result<Value, CommandError> {
        (self.handler)(ctx, body)
    }
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RouteEntry")
            .field("name", &self.name)
            .field("mutating", &self.mutating)
            .finish_non_exhaustive()
    }
}

/// Commands handled by the server itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Ping,
    Reindex,
    GetState,
    WaitForCompile,
    PanicOn,
    PanicOff,
    IndexProject,
}

impl Builtin {
    /// Every built-in name, aliases included.
    pub const NAMES: &'static [&'static str] = &[
        "ping",
        "reindex",
        "reindex-routes",
        "get-state",
        "wait-for-compile",
        "panic-on",
        "panic-off",
        "index-project",
    ];

    /// Looks up a normalised command name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "ping" => Some(Self::Ping),
            "reindex" | "reindex-routes" => Some(Self::Reindex),
            "get-state" => Some(Self::GetState),
            "wait-for-compile" => Some(Self::WaitForCompile),
            "panic-on" => Some(Self::PanicOn),
            "panic-off" => Some(Self::PanicOff),
            "index-project" => Some(Self::IndexProject),
            _ => None,
        }
    }
}

/// Outcome of [`RouteRegistry::resolve`].
#[derive(Debug, Clone)]
pub enum Resolved {
    Builtin(Builtin),
    Route(RouteEntry),
}

/// Built-in and dynamic command tables.
#[derive(Debug)]
pub struct RouteRegistry {
    registrations: Vec<RouteEntry>,
    reloaded: Vec<RouteEntry>,
    table: HashMap<String, RouteEntry>,
}

impl RouteRegistry {
    /// Registry seeded from `registrations` and indexed once.
    #[must_use]
    pub fn new(registrations: Vec<RouteEntry>) -> Self {
        let mut registry = Self {
            registrations,
            reloaded: Vec::new(),
            table: HashMap::new(),
        };
        registry.reindex();
        registry
    }

    /// Rebuilds the dynamic table and returns its size.
    ///
    /// Later entries replace earlier ones with the same name; reloaded
    /// handlers therefore override registrations. Names claimed by built-ins
    /// are skipped.
    pub fn reindex(&mut self) -> usize {
        let mut table = HashMap::with_capacity(self.registrations.len() + self.reloaded.len());
        for entry in self.registrations.iter().chain(&self.reloaded) {
            if Builtin::parse(entry.name()).is_some() {
                warn!(
                    target: DISPATCH_TARGET,
                    route = entry.name(),
                    "ignoring handler that collides with a built-in command"
                );
                continue;
            }
            table.insert(entry.name().to_owned(), entry.clone());
        }
        self.table = table;
        debug!(
            target: DISPATCH_TARGET,
            routes = self.table.len(),
            "route table rebuilt"
        );
        self.table.len()
    }

    /// Adopts the handler list from a reload, then reindexes.
    ///
    /// A failed reload keeps the previous list.
    pub fn apply_reload(&mut self, outcome: ReloadOutcome) -> usize {
        if outcome.success {
            self.reloaded = outcome.routes;
        } else {
            warn!(
                target: DISPATCH_TARGET,
                "reload failed; keeping previously loaded handlers"
            );
        }
        self.reindex()
    }

    /// Resolves a normalised command name.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::UnknownRoute`] when nothing matches.
    pub fn resolve(&self, name: &str) -> Result<Resolved, CommandError> {
        if let Some(builtin) = Builtin::parse(name) {
            return Ok(Resolved::Builtin(builtin));
        }
        self.table
            .get(name)
            .cloned()
            .map(Resolved::Route)
            .ok_or_else(|| CommandError::unknown_route(name))
    }

    /// Number of dynamic routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// True when no dynamic routes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Sorted dynamic route names.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.table.keys().cloned().collect();
        names.sort();
        names
    }
}
