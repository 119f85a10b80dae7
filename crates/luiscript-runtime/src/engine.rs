//! The collection of live script contexts and the host lifecycle around it

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::async_task::{AsyncRunner, HttpClient, TaskMode, UreqClient};
use crate::config::RuntimeConfig;
use crate::context::{Context, ContextId, ScriptSource};
use crate::error::{BridgeError, ContextError};
use crate::events::{EntityRef, Event, InputEvent};
use crate::host::Host;
use crate::object_model::{ElementId, ObjectModel};
use crate::package_scanner::PackageScanner;
use crate::runtime::{Clock, Runtime, ScriptError, SystemClock};
use crate::value::{HostRef, HostValue};

/// Packages compiled into the runtime, loaded before user packages
const BUILTINS: &[(&str, &str)] = &[("common", include_str!("../builtin/common.lua"))];

/// Owns every script context and drives them from the host frame loop
pub struct Engine {
    config: RuntimeConfig,
    host: Rc<dyn Host>,
    clock: Rc<dyn Clock>,
    http: Arc<dyn HttpClient>,
    task_mode: TaskMode,
    runtime: Rc<Runtime>,
    contexts: Vec<Context>,
    scanner: Option<PackageScanner>,
    /// Element under the pointer when a button went down
    pressed: Cell<Option<ElementId>>,
}

impl Engine {
    pub fn new(host: Rc<dyn Host>, config: RuntimeConfig) -> Self {
        let clock: Rc<dyn Clock> = Rc::new(SystemClock);
        let http: Arc<dyn HttpClient> = Arc::new(UreqClient::new());
        let task_mode = TaskMode::default();
        let runtime = Self::build_runtime(&host, &clock, &http, &task_mode);

        Self {
            config,
            host,
            clock,
            http,
            task_mode,
            runtime,
            contexts: Vec::new(),
            scanner: None,
            pressed: Cell::new(None),
        }
    }

    pub fn with_clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = clock;
        self.rebuild();
        self
    }

    pub fn with_http(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = http;
        self.rebuild();
        self
    }

    pub fn with_task_mode(mut self, task_mode: TaskMode) -> Self {
        self.task_mode = task_mode;
        self.rebuild();
        self
    }

    /// Run background jobs on the blocking pool of this tokio runtime
    pub fn with_runtime_handle(self, handle: Handle) -> Self {
        self.with_task_mode(TaskMode::Tokio(handle))
    }

    fn build_runtime(
        host: &Rc<dyn Host>,
        clock: &Rc<dyn Clock>,
        http: &Arc<dyn HttpClient>,
        task_mode: &TaskMode,
    ) -> Rc<Runtime> {
        let tasks = AsyncRunner::new(task_mode.clone(), Arc::clone(http));
        Rc::new(Runtime::new(Rc::clone(host), Rc::clone(clock), tasks))
    }

    fn rebuild(&mut self) {
        self.contexts.clear();
        self.runtime = Self::build_runtime(&self.host, &self.clock, &self.http, &self.task_mode);
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    // ===== Lifecycle =====

    /// Drop every context and load the built-in and user packages afresh
    pub fn start(&mut self) {
        self.stop();

        if !self.config.enabled {
            info!(target: "scripting", "UI scripting is disabled");
            return;
        }

        if self.config.load_builtins {
            for (name, source) in BUILTINS {
                // Failures are already in the error log
                let _ = self.load(ScriptSource::code(*name, *source));
            }
        }

        let roots = self.config.package_roots();
        for root in &roots {
            self.load_packages_in(root);
        }

        if self.config.hot_reload {
            let interval = Duration::from_millis(self.config.hot_reload_interval_ms);
            let scanner = PackageScanner::with_interval(roots, interval);
            debug!(
                target: "scripting",
                "Watching {} script(s) every {:?}",
                scanner.watched(),
                scanner.scan_interval()
            );
            self.scanner = Some(scanner);
        }

        info!(target: "scripting", "Started {} script context(s)", self.contexts.len());
    }

    /// Tear down every context and clear the shared UI state
    pub fn stop(&mut self) {
        if !self.contexts.is_empty() {
            debug!(target: "scripting", "Stopping {} script context(s)", self.contexts.len());
        }

        self.contexts.clear();
        self.runtime.reset();
        self.scanner = None;
        self.pressed.set(None);
    }

    /// Stop, then start again from the same configuration
    pub fn restart(&mut self) {
        info!(target: "scripting", "Restarting UI scripts");
        self.start();
    }

    fn load_packages_in(&mut self, dir: &Path) {
        if !dir.is_dir() {
            debug!(target: "scripting", "No package directory at {}", dir.display());
            return;
        }

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    target: "scripting",
                    "Failed to read package directory {}: {}",
                    dir.display(),
                    e
                );
                return;
            }
        };

        let mut packages: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        packages.sort();

        for package in packages {
            let name = package
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            if !self.config.is_package_enabled(&name) {
                info!(target: "scripting", "Skipping disabled package '{}'", name);
                continue;
            }
            if !package.join(format!("{}.lua", self.config.entry_script)).is_file() {
                warn!(
                    target: "scripting",
                    "Skipping '{}', no {}.lua entry script",
                    package.display(),
                    self.config.entry_script
                );
                continue;
            }

            let _ = self.load_package(&package);
        }
    }

    /// Load one package directory as a new context
    pub fn load_package(&mut self, path: &Path) -> Result<ContextId, ContextError> {
        self.load(ScriptSource::Package {
            root: path.to_path_buf(),
            entry: self.config.entry_script.clone(),
        })
    }

    /// Run a source blob as a new context
    pub fn load_code(&mut self, name: &str, source: &str) -> Result<ContextId, ContextError> {
        self.load(ScriptSource::code(name, source))
    }

    /// Construct a context, keeping it only when its source ran cleanly
    pub fn load(&mut self, source: ScriptSource) -> Result<ContextId, ContextError> {
        let label = source.label();
        match Context::new(Rc::clone(&self.runtime), source) {
            Ok(context) => {
                let id = context.id();
                debug!(target: "scripting", "Context {} ({}) is live", id, label);
                self.contexts.push(context);
                Ok(id)
            }
            Err(err) => {
                self.runtime.report(&label, &err);
                Err(err)
            }
        }
    }

    // ===== Frame =====

    /// Deliver finished background work, step every context, then check for
    /// package changes
    pub fn run_frame(&mut self) {
        for event in self.runtime.tasks.drain() {
            self.runtime.notify_all(&event);
        }

        for context in &self.contexts {
            context.run_frame();
        }

        let changed = match self.scanner.as_mut() {
            Some(scanner) if scanner.should_scan() => scanner.scan_changes().has_changes(),
            _ => false,
        };
        if changed {
            info!(target: "scripting", "Script packages changed on disk");
            self.restart();
        }
    }

    /// Broadcast a host event to every live context
    pub fn notify(&self, event: &Event) {
        self.runtime.notify_all(event);
    }

    /// Translate raw input into script events
    pub fn handle_input(&self, input: InputEvent) {
        match input {
            InputEvent::KeyDown { key } => {
                self.notify(&Event::game("keydown").with_arguments(vec![key.into()]))
            }
            InputEvent::KeyUp { key } => {
                self.notify(&Event::game("keyup").with_arguments(vec![key.into()]))
            }
            InputEvent::Char { text } => {
                self.notify(&Event::game("char").with_arguments(vec![text.into()]))
            }
            InputEvent::MouseMove { x, y } => self.mouse_move(x, y),
            InputEvent::MouseDown { button } => self.mouse_button(button, true),
            InputEvent::MouseUp { button } => self.mouse_button(button, false),
        }
    }

    fn hit_test(&self) -> Option<ElementId> {
        let (x, y) = self.runtime.mouse.get();
        self.runtime
            .objects
            .borrow()
            .hit_test(x as f32, y as f32, self.host.as_ref())
    }

    fn mouse_move(&self, x: i32, y: i32) {
        self.runtime.mouse.set((x, y));
        let hit = self.hit_test();

        let mut events = Vec::new();
        {
            let mut objects = self.runtime.objects.borrow_mut();
            for id in objects.element_ids() {
                let Some(element) = objects.element_mut(id) else {
                    continue;
                };
                let inside = Some(id) == hit;
                if element.hovered != inside {
                    element.hovered = inside;
                    let name = if inside { "mouseenter" } else { "mouseleave" };
                    events.push(Event::new(EntityRef::Element(id), name));
                }
            }
        }

        // Leave before enter
        events.sort_by_key(|event| event.name != "mouseleave");

        self.notify(&Event::game("mousemove").with_arguments(vec![x.into(), y.into()]));
        for event in &events {
            self.notify(event);
        }
    }

    fn mouse_button(&self, button: i32, down: bool) {
        let name = if down { "mousedown" } else { "mouseup" };
        self.notify(&Event::game(name).with_arguments(vec![button.into()]));

        let hit = self.hit_test();
        if let Some(id) = hit {
            self.notify(
                &Event::new(EntityRef::Element(id), name).with_arguments(vec![button.into()]),
            );
        }

        if down {
            self.pressed.set(hit);
        } else if let Some(id) = self.pressed.take() {
            if hit == Some(id) {
                self.notify(
                    &Event::new(EntityRef::Element(id), "click").with_arguments(vec![button.into()]),
                );
            }
        }
    }

    // ===== Host callbacks =====

    /// Call the script function registered under a host closure key
    pub fn invoke_converted(
        &self,
        key: HostRef,
        args: &[HostValue],
    ) -> Result<Vec<HostValue>, BridgeError> {
        let entry = self
            .runtime
            .converted
            .borrow()
            .get(key)
            .ok_or(BridgeError::UnknownFunction(key))?;
        let context = self
            .runtime
            .context(entry.context)
            .ok_or(BridgeError::ContextGone(entry.context))?;

        context.call_function(&entry.function, args)
    }

    /// The host released or reused the memory behind `key`
    pub fn on_host_free(&self, key: HostRef) -> bool {
        let removed = self.runtime.converted.borrow_mut().remove(key);
        if removed {
            debug!(target: "scripting", "Purged converted function {:?}", key);
        }
        removed
    }

    // ===== Inspection =====

    pub fn contexts(&self) -> &[Context] {
        &self.contexts
    }

    pub fn context(&self, id: ContextId) -> Option<&Context> {
        self.contexts.iter().find(|c| c.id() == id)
    }

    pub fn context_count(&self) -> usize {
        self.contexts.len()
    }

    /// Whether `id` receives broadcast events
    pub fn is_active(&self, id: ContextId) -> bool {
        self.runtime.is_registered(id)
    }

    /// Script faults reported so far, newest last
    pub fn errors(&self) -> Vec<ScriptError> {
        self.runtime.errors()
    }

    /// Background jobs still running
    pub fn pending_tasks(&self) -> usize {
        self.runtime.tasks.pending()
    }

    pub fn converted_count(&self) -> usize {
        self.runtime.converted.borrow().len()
    }

    pub fn mouse_position(&self) -> (i32, i32) {
        self.runtime.mouse.get()
    }

    /// Read access to the element list and menus
    pub fn with_objects<R>(&self, f: impl FnOnce(&ObjectModel) -> R) -> R {
        f(&self.runtime.objects.borrow())
    }

    /// Value of a key in the cross-context shared table
    pub fn shared_get(&self, key: &str) -> Option<String> {
        self.runtime
            .shared
            .lock()
            .ok()
            .and_then(|shared| shared.get(key).cloned())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop();
    }
}
