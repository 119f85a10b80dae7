//! State shared by the engine and every context it owns

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::{Rc, Weak};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::error;

use crate::async_task::AsyncRunner;
use crate::bridge::converted::ConvertedFunctions;
use crate::context::{ContextId, ContextInner};
use crate::events::Event;
use crate::host::Host;
use crate::object_model::ObjectModel;

const MAX_SCRIPT_ERRORS: usize = 100;

/// Source of "now" for the schedulers
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Cell<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Cell::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset.set(self.offset.get() + by);
    }

    /// Time elapsed since the clock was created
    pub fn elapsed(&self) -> Duration {
        self.offset.get()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.offset.get()
    }
}

/// A script fault kept for later inspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptError {
    /// Package name or chunk name of the failing context
    pub source: String,
    pub message: String,
}

/// Bounded log of script faults, newest last
#[derive(Debug, Default)]
pub struct ErrorLog {
    entries: VecDeque<ScriptError>,
}

impl ErrorLog {
    pub fn push(&mut self, entry: ScriptError) {
        self.entries.push_back(entry);
        while self.entries.len() > MAX_SCRIPT_ERRORS {
            self.entries.pop_front();
        }
    }

    pub fn entries(&self) -> Vec<ScriptError> {
        self.entries.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Cross-context key/value scratch table behind `game:sharedset`
pub type SharedTable = Arc<Mutex<HashMap<String, String>>>;

/// Everything the script API reaches outside its own heap
pub(crate) struct Runtime {
    pub host: Rc<dyn Host>,
    pub clock: Rc<dyn Clock>,
    pub objects: RefCell<ObjectModel>,
    pub converted: RefCell<ConvertedFunctions>,
    pub shared: SharedTable,
    pub mouse: Cell<(i32, i32)>,
    pub tasks: AsyncRunner,
    contexts: RefCell<Vec<(ContextId, Weak<ContextInner>)>>,
    errors: RefCell<ErrorLog>,
    next_context: Cell<u64>,
    next_request: Cell<u64>,
}

impl Runtime {
    pub fn new(host: Rc<dyn Host>, clock: Rc<dyn Clock>, tasks: AsyncRunner) -> Self {
        Self {
            host,
            clock,
            objects: RefCell::new(ObjectModel::new()),
            converted: RefCell::new(ConvertedFunctions::new()),
            shared: Arc::new(Mutex::new(HashMap::new())),
            mouse: Cell::new((0, 0)),
            tasks,
            contexts: RefCell::new(Vec::new()),
            errors: RefCell::new(ErrorLog::default()),
            next_context: Cell::new(0),
            next_request: Cell::new(0),
        }
    }

    pub fn next_context_id(&self) -> ContextId {
        let id = self.next_context.get();
        self.next_context.set(id + 1);
        ContextId(id)
    }

    pub fn next_request_id(&self) -> u64 {
        let id = self.next_request.get();
        self.next_request.set(id + 1);
        id
    }

    // ===== Broadcast list =====

    pub fn register(&self, id: ContextId, context: Weak<ContextInner>) {
        self.contexts.borrow_mut().push((id, context));
    }

    pub fn unregister(&self, id: ContextId) {
        if let Ok(mut contexts) = self.contexts.try_borrow_mut() {
            contexts.retain(|(cid, _)| *cid != id);
        }
    }

    pub fn is_registered(&self, id: ContextId) -> bool {
        self.contexts.borrow().iter().any(|(cid, _)| *cid == id)
    }

    pub fn context(&self, id: ContextId) -> Option<Rc<ContextInner>> {
        self.contexts
            .borrow()
            .iter()
            .find(|(cid, _)| *cid == id)
            .and_then(|(_, context)| context.upgrade())
    }

    /// Deliver `event` to every live context, synchronously
    pub fn notify_all(&self, event: &Event) {
        let live: Vec<Rc<ContextInner>> = self
            .contexts
            .borrow()
            .iter()
            .filter_map(|(_, context)| context.upgrade())
            .collect();

        for context in live {
            context.notify(event);
        }
    }

    // ===== Diagnostics =====

    /// Report a script fault from `source`
    pub fn report(&self, source: &str, err: &dyn std::fmt::Display) {
        let message = err.to_string();
        error!(target: "scripting", "Script error in {}: {}", source, message);
        self.host.report_error(&message);
        self.errors.borrow_mut().push(ScriptError {
            source: source.to_string(),
            message,
        });
    }

    pub fn errors(&self) -> Vec<ScriptError> {
        self.errors.borrow().entries()
    }

    /// Drop the shared UI state, used at engine start/stop
    pub fn reset(&self) {
        self.converted.borrow_mut().clear();
        self.objects.borrow_mut().clear();
        self.mouse.set((0, 0));
    }
}
