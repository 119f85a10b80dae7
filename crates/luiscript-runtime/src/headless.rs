//! In-memory [`Host`] used by the command-line runner and the tests

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use tracing::debug;

use crate::error::HostError;
use crate::host::Host;
use crate::value::{HostRef, HostValue};

/// Native function installed into the headless host
pub type HostFn = Rc<dyn Fn(&[HostValue]) -> Result<Vec<HostValue>, HostError>>;

/// Native method installed into the headless host, receives its target
pub type HostMethod = Rc<dyn Fn(HostRef, &[HostValue]) -> Result<Vec<HostValue>, HostError>>;

/// Host implementation with no game behind it
///
/// Tables, functions and closures live in plain maps keyed by [`HostRef`].
/// Every service call is recorded so tests can observe what scripts did.
pub struct HeadlessHost {
    next_ref: Cell<u64>,
    globals: HostRef,
    tables: RefCell<HashMap<HostRef, HashMap<String, HostValue>>>,
    functions: RefCell<HashMap<HostRef, HostFn>>,
    closures: RefCell<HashSet<HostRef>>,
    named: RefCell<HashMap<String, HostFn>>,
    methods: RefCell<HashMap<String, HostMethod>>,
    dvars: RefCell<HashMap<String, String>>,
    open_menus: RefCell<HashSet<String>>,
    lui_opened: RefCell<Vec<String>>,
    commands: RefCell<Vec<String>>,
    in_game: Cell<bool>,
    window: Cell<(u32, u32)>,
    assets: RefCell<HashMap<String, Vec<(String, bool)>>>,
    player_notifies: RefCell<Vec<(String, Vec<HostValue>)>>,
    errors: RefCell<Vec<String>>,
    loaded_mod: RefCell<String>,
}

impl HeadlessHost {
    pub fn new() -> Self {
        let globals = HostRef(1);
        let mut tables = HashMap::new();
        tables.insert(globals, HashMap::new());

        Self {
            next_ref: Cell::new(2),
            globals,
            tables: RefCell::new(tables),
            functions: RefCell::new(HashMap::new()),
            closures: RefCell::new(HashSet::new()),
            named: RefCell::new(HashMap::new()),
            methods: RefCell::new(HashMap::new()),
            dvars: RefCell::new(HashMap::new()),
            open_menus: RefCell::new(HashSet::new()),
            lui_opened: RefCell::new(Vec::new()),
            commands: RefCell::new(Vec::new()),
            in_game: Cell::new(false),
            window: Cell::new((1920, 1080)),
            assets: RefCell::new(HashMap::new()),
            player_notifies: RefCell::new(Vec::new()),
            errors: RefCell::new(Vec::new()),
            loaded_mod: RefCell::new(String::new()),
        }
    }

    fn alloc(&self) -> HostRef {
        let id = self.next_ref.get();
        self.next_ref.set(id + 1);
        HostRef(id)
    }

    // ===== Heap setup =====

    /// Allocate a host table with the given fields
    pub fn add_table(&self, fields: impl IntoIterator<Item = (String, HostValue)>) -> HostRef {
        let id = self.alloc();
        self.tables
            .borrow_mut()
            .insert(id, fields.into_iter().collect());
        id
    }

    /// Allocate a host function
    pub fn add_function(
        &self,
        f: impl Fn(&[HostValue]) -> Result<Vec<HostValue>, HostError> + 'static,
    ) -> HostRef {
        let id = self.alloc();
        self.functions.borrow_mut().insert(id, Rc::new(f));
        id
    }

    /// Set a field on the host global table
    pub fn set_global(&self, key: &str, value: HostValue) {
        if let Some(table) = self.tables.borrow_mut().get_mut(&self.globals) {
            table.insert(key.to_string(), value);
        }
    }

    /// Register a function reachable through `game:call(name, ...)`
    pub fn register_function(
        &self,
        name: &str,
        f: impl Fn(&[HostValue]) -> Result<Vec<HostValue>, HostError> + 'static,
    ) {
        self.named.borrow_mut().insert(name.to_string(), Rc::new(f));
    }

    /// Register a native method callable on any host userdata
    pub fn register_method(
        &self,
        name: &str,
        f: impl Fn(HostRef, &[HostValue]) -> Result<Vec<HostValue>, HostError> + 'static,
    ) {
        self.methods.borrow_mut().insert(name.to_string(), Rc::new(f));
    }

    /// Drop a heap entry, as the host allocator would
    pub fn free(&self, target: HostRef) {
        self.tables.borrow_mut().remove(&target);
        self.functions.borrow_mut().remove(&target);
        self.closures.borrow_mut().remove(&target);
    }

    pub fn table_field(&self, target: HostRef, key: &str) -> Option<HostValue> {
        self.tables
            .borrow()
            .get(&target)
            .and_then(|t| t.get(key).cloned())
    }

    pub fn is_closure(&self, target: HostRef) -> bool {
        self.closures.borrow().contains(&target)
    }

    // ===== Service state =====

    pub fn set_menu_open(&self, name: &str, open: bool) {
        if open {
            self.open_menus.borrow_mut().insert(name.to_string());
        } else {
            self.open_menus.borrow_mut().remove(name);
        }
    }

    pub fn set_in_game(&self, in_game: bool) {
        self.in_game.set(in_game);
    }

    pub fn set_window_size(&self, width: u32, height: u32) {
        self.window.set((width, height));
    }

    pub fn set_loaded_mod(&self, name: &str) {
        *self.loaded_mod.borrow_mut() = name.to_string();
    }

    /// Register assets of a type; `present` marks assets physically loaded
    pub fn add_assets(&self, asset_type: &str, names: &[(&str, bool)]) {
        self.assets.borrow_mut().entry(asset_type.to_string()).or_default().extend(
            names
                .iter()
                .map(|(name, present)| (name.to_string(), *present)),
        );
    }

    pub fn dvar(&self, name: &str) -> Option<String> {
        self.dvars.borrow().get(name).cloned()
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.borrow().clone()
    }

    pub fn opened_lui_menus(&self) -> Vec<String> {
        self.lui_opened.borrow().clone()
    }

    pub fn player_notifies(&self) -> Vec<(String, Vec<HostValue>)> {
        self.player_notifies.borrow().clone()
    }

    pub fn reported_errors(&self) -> Vec<String> {
        self.errors.borrow().clone()
    }
}

impl Default for HeadlessHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for HeadlessHost {
    fn get_field(&self, target: HostRef, key: &str) -> Result<HostValue, HostError> {
        let tables = self.tables.borrow();
        let table = tables
            .get(&target)
            .ok_or(HostError::InvalidReference(target))?;
        Ok(table.get(key).cloned().unwrap_or_default())
    }

    fn set_field(&self, target: HostRef, key: &str, value: HostValue) -> Result<(), HostError> {
        let mut tables = self.tables.borrow_mut();
        let table = tables
            .get_mut(&target)
            .ok_or(HostError::InvalidReference(target))?;
        if value.is_nil() {
            table.remove(key);
        } else {
            table.insert(key.to_string(), value);
        }
        Ok(())
    }

    fn has_method(&self, _target: HostRef, name: &str) -> bool {
        self.methods.borrow().contains_key(name)
    }

    fn call_method(
        &self,
        target: HostRef,
        name: &str,
        args: &[HostValue],
    ) -> Result<Vec<HostValue>, HostError> {
        let method = self
            .methods
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| HostError::UnknownFunction(name.to_string()))?;
        method(target, args)
    }

    fn call_function(
        &self,
        function: HostRef,
        args: &[HostValue],
    ) -> Result<Vec<HostValue>, HostError> {
        let f = self
            .functions
            .borrow()
            .get(&function)
            .cloned()
            .ok_or(HostError::InvalidReference(function))?;
        f(args)
    }

    fn create_closure(&self) -> Result<HostRef, HostError> {
        let id = self.alloc();
        self.closures.borrow_mut().insert(id);
        Ok(id)
    }

    fn globals(&self) -> Option<HostRef> {
        Some(self.globals)
    }

    fn call(&self, name: &str, args: &[HostValue]) -> Result<Vec<HostValue>, HostError> {
        let f = self
            .named
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| HostError::UnknownFunction(name.to_string()))?;
        f(args)
    }

    fn find_dvar(&self, name: &str) -> Option<String> {
        self.dvars.borrow().get(name).cloned()
    }

    fn set_dvar(&self, name: &str, value: &str) -> Result<(), HostError> {
        debug!(target: "scripting", "setdvar {} \"{}\"", name, value);
        self.dvars
            .borrow_mut()
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn is_menu_open(&self, name: &str) -> bool {
        self.open_menus.borrow().contains(name)
    }

    fn open_lui_menu(&self, name: &str) {
        self.lui_opened.borrow_mut().push(name.to_string());
        self.set_menu_open(name, true);
    }

    fn execute_command(&self, command: &str) {
        self.commands.borrow_mut().push(command.to_string());
    }

    fn is_in_game(&self) -> bool {
        self.in_game.get()
    }

    fn window_size(&self) -> (u32, u32) {
        self.window.get()
    }

    fn asset_names(
        &self,
        asset_type: &str,
        include_referenced: bool,
    ) -> Result<Vec<String>, HostError> {
        let assets = self.assets.borrow();
        let entries = assets
            .get(asset_type)
            .ok_or_else(|| HostError::UnknownAssetType(asset_type.to_string()))?;
        Ok(entries
            .iter()
            .filter(|(_, present)| include_referenced || *present)
            .map(|(name, _)| name.clone())
            .collect())
    }

    fn notify_player(&self, event: &str, args: &[HostValue]) -> Result<(), HostError> {
        if !self.in_game.get() {
            return Err(HostError::NotInGame);
        }
        self.player_notifies
            .borrow_mut()
            .push((event.to_string(), args.to_vec()));
        Ok(())
    }

    fn loaded_mod(&self) -> String {
        self.loaded_mod.borrow().clone()
    }

    fn report_error(&self, message: &str) {
        self.errors.borrow_mut().push(message.to_string());
    }
}
