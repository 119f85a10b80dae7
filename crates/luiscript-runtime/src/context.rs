use std::cell::{Cell, RefCell};
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use mlua::{Function, Lua, LuaOptions, MultiValue, StdLib};
use tracing::{debug, info};

use crate::api;
use crate::bridge::{to_host, to_script};
use crate::error::{BridgeError, ContextError};
use crate::events::{Event, EventHandler};
use crate::runtime::Runtime;
use crate::scheduler::Scheduler;
use crate::value::HostValue;

/// Identifier of a script context, unique per engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub(crate) u64);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a context executes on construction
#[derive(Debug, Clone)]
pub enum ScriptSource {
    /// A package directory, `entry` is the script run first (without `.lua`)
    Package { root: PathBuf, entry: String },
    /// A source blob, `name` shows up in diagnostics
    Code { name: String, source: String },
}

impl ScriptSource {
    pub fn package(root: impl Into<PathBuf>) -> Self {
        Self::Package {
            root: root.into(),
            entry: "__init__".to_string(),
        }
    }

    pub fn code(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self::Code {
            name: name.into(),
            source: source.into(),
        }
    }

    /// Short label used in logs and error reports
    pub fn label(&self) -> String {
        match self {
            Self::Package { root, .. } => root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| root.display().to_string()),
            Self::Code { name, .. } => name.clone(),
        }
    }
}

/// Per-context state reachable from the script API through Lua app data
pub(crate) struct ContextLocals {
    pub id: ContextId,
    pub label: String,
    pub folder: Option<PathBuf>,
    pub scheduler: RefCell<Scheduler<Function>>,
    pub events: RefCell<EventHandler<Function>>,
    /// Scripts already run by `include`, in load order
    pub loaded: RefCell<Vec<String>>,
}

/// Fetch the runtime a script heap belongs to
pub(crate) fn runtime_of(lua: &Lua) -> mlua::Result<Rc<Runtime>> {
    lua.app_data_ref::<Rc<Runtime>>()
        .map(|runtime| Rc::clone(&runtime))
        .ok_or_else(|| mlua::Error::RuntimeError("script runtime is not attached".to_string()))
}

/// Fetch the per-context state of a script heap
pub(crate) fn locals_of(lua: &Lua) -> mlua::Result<Rc<ContextLocals>> {
    lua.app_data_ref::<Rc<ContextLocals>>()
        .map(|locals| Rc::clone(&locals))
        .ok_or_else(|| mlua::Error::RuntimeError("script context is not attached".to_string()))
}

pub(crate) fn current_context(lua: &Lua) -> Option<ContextId> {
    lua.app_data_ref::<Rc<ContextLocals>>().map(|locals| locals.id)
}

/// One isolated script heap with its scheduler and listeners
pub struct Context {
    inner: Rc<ContextInner>,
}

pub(crate) struct ContextInner {
    locals: Rc<ContextLocals>,
    runtime: Rc<Runtime>,
    torn_down: Cell<bool>,
    lua: Lua,
}

impl Context {
    /// Build a context and run its source
    ///
    /// The context joins the broadcast list only once its source ran
    /// without error.
    pub(crate) fn new(runtime: Rc<Runtime>, source: ScriptSource) -> Result<Self, ContextError> {
        let id = runtime.next_context_id();
        let label = source.label();

        let lua = Lua::new_with(
            StdLib::IO | StdLib::OS | StdLib::PACKAGE | StdLib::STRING | StdLib::MATH | StdLib::TABLE,
            LuaOptions::default(),
        )?;

        let folder = match &source {
            ScriptSource::Package { root, .. } => Some(root.clone()),
            ScriptSource::Code { .. } => None,
        };

        let locals = Rc::new(ContextLocals {
            id,
            label,
            folder,
            scheduler: RefCell::new(Scheduler::new()),
            events: RefCell::new(EventHandler::new()),
            loaded: RefCell::new(Vec::new()),
        });

        lua.set_app_data(Rc::clone(&runtime));
        lua.set_app_data(Rc::clone(&locals));

        let inner = Rc::new(ContextInner {
            locals,
            runtime: Rc::clone(&runtime),
            torn_down: Cell::new(false),
            lua,
        });

        api::install(&inner.lua)?;

        match source {
            ScriptSource::Package { root, entry } => {
                let entry_path = root.join(format!("{entry}.lua"));
                match std::fs::metadata(&entry_path) {
                    Ok(meta) if meta.is_file() => {}
                    Ok(_) => return Err(ContextError::MissingEntry(root)),
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                        return Err(ContextError::MissingEntry(root));
                    }
                    Err(source) => {
                        return Err(ContextError::Io {
                            path: entry_path,
                            source,
                        });
                    }
                }
                install_package_loaders(&inner.lua, &root)?;

                info!(target: "scripting", "Loading ui script '{}'", root.display());
                load_script(&inner.lua, &entry)?;
            }
            ScriptSource::Code { name, source } => {
                debug!(target: "scripting", "Running script blob '{}'", name);
                inner.lua.load(source).set_name(format!("={name}")).exec()?;
            }
        }

        runtime.register(id, Rc::downgrade(&inner));
        Ok(Self { inner })
    }

    pub fn id(&self) -> ContextId {
        self.inner.locals.id
    }

    pub fn label(&self) -> &str {
        &self.inner.locals.label
    }

    /// Run due tasks, then step the collector
    pub fn run_frame(&self) {
        self.inner.run_frame();
    }

    pub fn notify(&self, event: &Event) {
        self.inner.notify(event);
    }

    /// Number of queued scheduler tasks
    pub fn task_count(&self) -> usize {
        self.inner.locals.scheduler.borrow().len()
    }

    /// Number of registered event listeners
    pub fn listener_count(&self) -> usize {
        self.inner.locals.events.borrow().len()
    }

    /// Scripts pulled in through `include`, in load order
    pub fn loaded_scripts(&self) -> Vec<String> {
        self.inner.locals.loaded.borrow().clone()
    }

    /// Evaluate a chunk inside this context
    pub fn eval(&self, source: &str) -> Result<Vec<HostValue>, BridgeError> {
        let values: MultiValue = self
            .inner
            .lua
            .load(source)
            .set_name(format!("={}", self.inner.locals.label))
            .eval()?;
        values.iter().map(|v| to_host(&self.inner.lua, v)).collect()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.inner.locals.id)
            .field("label", &self.inner.locals.label)
            .finish()
    }
}

impl ContextInner {
    fn report(&self, err: &dyn fmt::Display) {
        self.runtime.report(&self.locals.label, err);
    }

    fn run_frame(&self) {
        let now = self.runtime.clock.now();
        let due = self.locals.scheduler.borrow().due(now);

        for id in due {
            // Take the callback first so the task can touch the scheduler
            let callback = self.locals.scheduler.borrow_mut().begin(id, now);
            if let Some(callback) = callback {
                if let Err(err) = callback.call::<()>(()) {
                    self.report(&err);
                }
            }
        }

        if let Err(err) = self.lua.gc_step() {
            self.report(&err);
        }
    }

    pub(crate) fn notify(&self, event: &Event) {
        self.locals.scheduler.borrow_mut().dispatch(event);

        let listeners = self.locals.events.borrow().matching(event);
        if listeners.is_empty() {
            return;
        }

        let arguments: MultiValue = match event
            .arguments
            .iter()
            .map(|arg| to_script(&self.lua, arg))
            .collect()
        {
            Ok(arguments) => arguments,
            Err(err) => {
                self.report(&err);
                return;
            }
        };

        for id in listeners {
            let callback = self.locals.events.borrow_mut().begin(id);
            if let Some(callback) = callback {
                if let Err(err) = callback.call::<()>(arguments.clone()) {
                    self.report(&err);
                }
            }
        }
    }

    /// Call a script function of this context with host arguments
    pub(crate) fn call_function(
        &self,
        function: &Function,
        args: &[HostValue],
    ) -> Result<Vec<HostValue>, BridgeError> {
        let args: MultiValue = args
            .iter()
            .map(|arg| to_script(&self.lua, arg))
            .collect::<mlua::Result<_>>()?;
        let results: MultiValue = function.call(args)?;
        results.iter().map(|v| to_host(&self.lua, v)).collect()
    }

    fn teardown(&self) {
        if self.torn_down.replace(true) {
            return;
        }

        debug!(target: "scripting", "Tearing down context {} ({})", self.locals.id, self.locals.label);

        if let Err(err) = self.lua.gc_collect() {
            self.report(&err);
        }
        if let Ok(mut scheduler) = self.locals.scheduler.try_borrow_mut() {
            scheduler.clear();
        }
        if let Ok(mut events) = self.locals.events.try_borrow_mut() {
            events.clear();
        }
        if let Ok(mut converted) = self.runtime.converted.try_borrow_mut() {
            converted.purge_context(self.locals.id);
        }
        self.runtime.unregister(self.locals.id);
    }
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Run `<package>/<name>.lua` unless this context already ran it
fn load_script(lua: &Lua, name: &str) -> mlua::Result<()> {
    let locals = locals_of(lua)?;
    let Some(folder) = locals.folder.as_deref() else {
        return Err(mlua::Error::RuntimeError(
            "include is only available to script packages".to_string(),
        ));
    };

    {
        let mut loaded = locals.loaded.borrow_mut();
        if loaded.iter().any(|s| s == name) {
            return Ok(());
        }
        loaded.push(name.to_string());
    }

    let path = folder.join(format!("{name}.lua"));
    let source = std::fs::read_to_string(&path).map_err(|err| {
        mlua::Error::RuntimeError(format!("failed to read script {}: {}", path.display(), err))
    })?;

    lua.load(source)
        .set_name(format!("@{}", path.display()))
        .exec()
}

/// `include`, `scriptdir` and a namespaced `require`
fn install_package_loaders(lua: &Lua, root: &Path) -> mlua::Result<()> {
    let globals = lua.globals();

    globals.set(
        "include",
        lua.create_function(|lua, name: String| load_script(lua, &name))?,
    )?;

    let dir = root.display().to_string();
    globals.set(
        "scriptdir",
        lua.create_function(move |_, ()| Ok(dir.clone()))?,
    )?;

    // Modules resolve as `<package>.<module>` from the parent of the package,
    // so two packages can each ship a `utils` module
    let package: mlua::Table = globals.get("package")?;
    if let Some(parent) = root.parent() {
        let search_root = parent.display().to_string();
        let path: String = package.get("path")?;
        package.set(
            "path",
            format!("{search_root}/?.lua;{search_root}/?/init.lua;{path}"),
        )?;
    }

    let prefix = root
        .file_name()
        .map(|n| format!("{}.", n.to_string_lossy()))
        .unwrap_or_default();
    let old_require: Function = globals.get("require")?;
    globals.set(
        "require",
        lua.create_function(move |_, module: String| {
            old_require.call::<MultiValue>(format!("{prefix}{module}"))
        })?,
    )?;

    Ok(())
}
