//! Lua behaviour scripts attached to entities.
//!
//! A script file evaluates to a table of callbacks:
//!
//! ```lua
//! local M = {}
//! function M.on_update(self, dt) self.x = self.x + 10 * dt end
//! return M
//! ```
//!
//! Every scene owns one [`ScriptHost`] (a single Lua state). Compiled modules
//! are cached by path and recompiled only when the file on disk is newer than
//! the cached copy, so entities sharing a script share one module table.
//!
//! Each [`ScriptInstance`] keeps a per-entity `self` table. Before a callback
//! runs the entity's position, rotation and flags are written into it, and
//! after the call the writable fields are read back. Lua never holds a
//! reference to the Rust entity.
//!
//! Scripts talk to the rest of the scene through the `engine` global:
//!
//! ```text
//!   engine.post(target, payload) -- queue a message; target nil = everyone
//!   engine.log(msg)              -- info-level log line
//!   engine._outbox               -- internal queue drained by Rust after each call
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use mlua::prelude::*;

use crate::entity::Entity;
use crate::error::ScriptError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Callback {
    Ready,
    Update,
    Render,
    Pause,
    Message,
    Collision,
    Remove,
}

impl Callback {
    pub const ALL: [Callback; 7] = [
        Callback::Ready,
        Callback::Update,
        Callback::Render,
        Callback::Pause,
        Callback::Message,
        Callback::Collision,
        Callback::Remove,
    ];

    pub fn lua_name(self) -> &'static str {
        match self {
            Self::Ready => "on_ready",
            Self::Update => "on_update",
            Self::Render => "on_render",
            Self::Pause => "on_pause",
            Self::Message => "on_message",
            Self::Collision => "on_collision",
            Self::Remove => "on_remove",
        }
    }
}

/// A message a script queued through `engine.post`.
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    /// `None` broadcasts to every scripted entity but the sender.
    pub target: Option<String>,
    pub payload: LuaValue,
}

struct CachedModule {
    module: LuaTable,
    modified: Option<SystemTime>,
}

pub struct ScriptHost {
    lua: Lua,
    cache: HashMap<PathBuf, CachedModule>,
}

fn file_modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

impl ScriptHost {
    pub fn new() -> Result<Self, ScriptError> {
        let host = Self {
            lua: Lua::new(),
            cache: HashMap::new(),
        };
        host.setup_engine_api()?;
        Ok(host)
    }

    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    pub fn cached_modules(&self) -> usize {
        self.cache.len()
    }

    fn setup_engine_api(&self) -> LuaResult<()> {
        let lua = &self.lua;
        let engine = lua.create_table()?;
        engine.set("_outbox", lua.create_table()?)?;

        let post = lua.create_function(|lua_ctx, (target, payload): (Option<String>, LuaValue)| {
            let engine: LuaTable = lua_ctx.globals().get("engine")?;
            let outbox: LuaTable = engine.get("_outbox")?;
            let entry = lua_ctx.create_table()?;
            entry.set("target", target)?;
            entry.set("payload", payload)?;
            outbox.push(entry)?;
            Ok(())
        })?;
        engine.set("post", post)?;

        let log_fn = lua.create_function(|_, msg: String| {
            log::info!("[lua] {msg}");
            Ok(())
        })?;
        engine.set("log", log_fn)?;

        lua.globals().set("engine", engine)?;
        Ok(())
    }

    /// Module table for `path`, compiled on first use or when the file is
    /// newer than the cached copy.
    pub fn load_module(&mut self, path: &Path, force: bool) -> Result<LuaTable, ScriptError> {
        let modified = file_modified(path);
        if !force {
            if let Some(cached) = self.cache.get(path) {
                if modified <= cached.modified {
                    return Ok(cached.module.clone());
                }
            }
        }

        let source = std::fs::read_to_string(path).map_err(|source| ScriptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let value: LuaValue = self
            .lua
            .load(&source)
            .set_name(path.to_string_lossy())
            .eval()?;
        let LuaValue::Table(module) = value else {
            return Err(ScriptError::NotATable(path.to_path_buf()));
        };

        log::debug!("Compiled script {}", path.display());
        self.cache.insert(
            path.to_path_buf(),
            CachedModule {
                module: module.clone(),
                modified,
            },
        );
        Ok(module)
    }

    /// Bind `path` to a fresh instance. Load failures leave the instance in
    /// the panic state; only a broken Lua state is an error.
    pub fn attach(&mut self, path: &Path) -> Result<ScriptInstance, ScriptError> {
        let mut instance = ScriptInstance {
            path: path.to_path_buf(),
            self_table: self.lua.create_table()?,
            callbacks: HashMap::new(),
            ready_done: false,
            panic: false,
            loaded_at: None,
            last_error: None,
        };
        instance.bind(self, false);
        Ok(instance)
    }

    /// Messages posted since the last drain.
    pub fn drain_outbox(&self) -> Vec<OutgoingMessage> {
        match self.drain_outbox_inner() {
            Ok(messages) => messages,
            Err(err) => {
                log::error!("Failed to read script outbox: {err}");
                Vec::new()
            }
        }
    }

    fn drain_outbox_inner(&self) -> LuaResult<Vec<OutgoingMessage>> {
        let engine: LuaTable = self.lua.globals().get("engine")?;
        let outbox: LuaTable = engine.get("_outbox")?;
        let mut messages = Vec::new();
        for entry in outbox.sequence_values::<LuaTable>() {
            let entry = entry?;
            messages.push(OutgoingMessage {
                target: entry.get("target")?,
                payload: entry.get("payload")?,
            });
        }
        if !messages.is_empty() {
            engine.set("_outbox", self.lua.create_table()?)?;
        }
        Ok(messages)
    }

    pub fn string_value(&self, text: &str) -> LuaValue {
        match self.lua.create_string(text) {
            Ok(s) => LuaValue::String(s),
            Err(_) => LuaValue::Nil,
        }
    }

    pub fn collect_garbage(&self) {
        if let Err(err) = self.lua.gc_collect() {
            log::error!("Lua garbage collection failed: {err}");
        }
    }
}

pub struct ScriptInstance {
    path: PathBuf,
    self_table: LuaTable,
    callbacks: HashMap<Callback, LuaFunction>,
    ready_done: bool,
    panic: bool,
    loaded_at: Option<SystemTime>,
    last_error: Option<String>,
}

impl std::fmt::Debug for ScriptInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptInstance")
            .field("path", &self.path)
            .field("ready_done", &self.ready_done)
            .field("panic", &self.panic)
            .finish()
    }
}

impl ScriptInstance {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_panicked(&self) -> bool {
        self.panic
    }

    pub fn is_ready(&self) -> bool {
        self.ready_done
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn has_callback(&self, callback: Callback) -> bool {
        self.callbacks.contains_key(&callback)
    }

    /// The per-entity `self` table, handed to other scripts as a reference to
    /// this entity.
    pub fn handle(&self) -> LuaTable {
        self.self_table.clone()
    }

    fn bind(&mut self, host: &mut ScriptHost, force: bool) -> bool {
        match host.load_module(&self.path, force) {
            Ok(module) => {
                self.callbacks = Callback::ALL
                    .iter()
                    .filter_map(|cb| {
                        module
                            .get::<Option<LuaFunction>>(cb.lua_name())
                            .ok()
                            .flatten()
                            .map(|f| (*cb, f))
                    })
                    .collect();
                self.loaded_at = file_modified(&self.path);
                self.panic = false;
                self.last_error = None;
                true
            }
            Err(err) => {
                log::error!("Failed to load script {}: {err}", self.path.display());
                self.callbacks.clear();
                self.loaded_at = file_modified(&self.path);
                self.panic = true;
                self.last_error = Some(err.to_string());
                false
            }
        }
    }

    /// Swap in a newer copy of the file if it changed on disk.
    pub fn reload_if_changed(&mut self, host: &mut ScriptHost) -> bool {
        let modified = file_modified(&self.path);
        if modified.is_none() || modified <= self.loaded_at {
            return false;
        }
        // Another instance may already have recompiled the shared module.
        self.reload(host, false)
    }

    pub fn force_reload(&mut self, host: &mut ScriptHost) -> bool {
        self.reload(host, true)
    }

    fn reload(&mut self, host: &mut ScriptHost, force: bool) -> bool {
        let ok = self.bind(host, force);
        if ok {
            log::info!("Reloaded script {}", self.path.display());
        }
        ok
    }

    fn push_state(&self, entity: &Entity) -> LuaResult<()> {
        let t = &self.self_table;
        t.set("id", entity.serial)?;
        t.set("name", entity.name.as_str())?;
        t.set("x", entity.transform.position.x)?;
        t.set("y", entity.transform.position.y)?;
        t.set("rotation", entity.transform.rotation)?;
        t.set("alive", entity.alive)?;
        t.set("visible", entity.visible)?;
        t.set("layer", entity.layer)?;
        Ok(())
    }

    fn pull_state(&self, entity: &mut Entity) -> LuaResult<()> {
        let t = &self.self_table;
        entity.transform.position.x = t.get("x")?;
        entity.transform.position.y = t.get("y")?;
        entity.transform.rotation = t.get("rotation")?;
        entity.alive = t.get("alive")?;
        entity.visible = t.get("visible")?;
        Ok(())
    }

    fn invoke(
        &self,
        entity: &mut Entity,
        function: &LuaFunction,
        args: impl IntoLuaMulti,
    ) -> LuaResult<()> {
        self.push_state(entity)?;
        function.call::<()>((self.self_table.clone(), args))?;
        self.pull_state(entity)
    }

    /// Run `on_ready` once. A script without it is ready immediately.
    pub(crate) fn ready(&mut self, entity: &mut Entity) {
        if self.ready_done || self.panic {
            return;
        }
        let Some(function) = self.callbacks.get(&Callback::Ready).cloned() else {
            // Other scripts may receive this table before any callback runs.
            if let Err(err) = self.push_state(entity) {
                log::error!("Script {}: failed to publish state: {err}", self.path.display());
            }
            self.ready_done = true;
            return;
        };
        match self.invoke(entity, &function, ()) {
            Ok(()) => self.ready_done = true,
            Err(err) => {
                self.fail(Callback::Ready, &err);
                self.ready_done = false;
            }
        }
    }

    /// Invoke `callback` if registered, ready and not panicked. Errors put
    /// the instance into panic, except collision errors which are only
    /// logged.
    pub(crate) fn call(
        &mut self,
        entity: &mut Entity,
        callback: Callback,
        args: impl IntoLuaMulti,
    ) -> bool {
        if self.panic || !self.ready_done {
            return false;
        }
        let Some(function) = self.callbacks.get(&callback).cloned() else {
            return false;
        };
        match self.invoke(entity, &function, args) {
            Ok(()) => true,
            Err(err) if callback == Callback::Collision => {
                log::error!(
                    "Script {} failed in {}: {err}",
                    self.path.display(),
                    callback.lua_name()
                );
                false
            }
            Err(err) => {
                self.fail(callback, &err);
                false
            }
        }
    }

    fn fail(&mut self, callback: Callback, err: &LuaError) {
        log::error!(
            "Script {} failed in {}, suspending callbacks: {err}",
            self.path.display(),
            callback.lua_name()
        );
        self.panic = true;
        self.last_error = Some(err.to_string());
    }
}

impl Entity {
    /// Run a script callback with the script temporarily detached so it can
    /// mutate the entity.
    pub(crate) fn call_script(&mut self, callback: Callback, args: impl IntoLuaMulti) -> bool {
        let Some(mut script) = self.script.take() else {
            return false;
        };
        let called = script.call(self, callback, args);
        self.script = Some(script);
        called
    }

    pub(crate) fn ready_script(&mut self) {
        if let Some(mut script) = self.script.take() {
            script.ready(self);
            self.script = Some(script);
        }
    }

    pub(crate) fn script_ready(&self) -> bool {
        self.script.as_ref().is_some_and(|s| s.is_ready())
    }

    pub(crate) fn script_handle(&self) -> Option<LuaTable> {
        self.script.as_ref().map(|s| s.handle())
    }
}
