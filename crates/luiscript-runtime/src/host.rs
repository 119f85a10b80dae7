//! Collaborator interface the runtime consumes from the embedding application
//!
//! Everything outside the scripting core (the native LUI heap, dvars, the
//! asset database, menus drawn by the game itself) is reached through [`Host`].
//! The runtime holds it as `Rc<dyn Host>` and only calls it from the frame
//! thread.

use crate::error::HostError;
use crate::value::{HostRef, HostValue};

/// The embedding application, as seen by the scripting runtime
pub trait Host {
    // ===== Host heap proxies =====

    /// Read a named field of a host table or userdata
    fn get_field(&self, target: HostRef, key: &str) -> Result<HostValue, HostError>;

    /// Write a named field of a host table or userdata
    fn set_field(&self, target: HostRef, key: &str, value: HostValue) -> Result<(), HostError>;

    /// Whether `name` is a native method callable on a host userdata
    fn has_method(&self, _target: HostRef, _name: &str) -> bool {
        false
    }

    /// Call a native method on a host userdata
    fn call_method(
        &self,
        target: HostRef,
        name: &str,
        args: &[HostValue],
    ) -> Result<Vec<HostValue>, HostError>;

    /// Call a host function reference
    fn call_function(&self, function: HostRef, args: &[HostValue])
        -> Result<Vec<HostValue>, HostError>;

    /// Allocate a native closure whose invocation the host routes back into
    /// `Engine::invoke_converted`
    fn create_closure(&self) -> Result<HostRef, HostError>;

    /// The host's global table, if it exposes one
    fn globals(&self) -> Option<HostRef> {
        None
    }

    // ===== Host services =====

    /// Call a named host function (`game:call(name, ...)`)
    fn call(&self, name: &str, args: &[HostValue]) -> Result<Vec<HostValue>, HostError>;

    /// Look up a dvar and render its current value as text
    fn find_dvar(&self, name: &str) -> Option<String>;

    /// Set a dvar, registering it if needed
    fn set_dvar(&self, name: &str, value: &str) -> Result<(), HostError>;

    /// Whether a host-native menu is currently open and visible
    fn is_menu_open(&self, name: &str) -> bool;

    /// Open a host-native LUI menu
    fn open_lui_menu(&self, name: &str);

    /// Queue a console command
    fn execute_command(&self, command: &str);

    fn is_in_game(&self) -> bool;

    fn window_size(&self) -> (u32, u32);

    /// Names of every asset of `asset_type`; referenced-only assets are
    /// included when `include_referenced` is set
    fn asset_names(
        &self,
        asset_type: &str,
        include_referenced: bool,
    ) -> Result<Vec<String>, HostError>;

    /// Forward a notify to the local player entity of the game simulation
    fn notify_player(&self, event: &str, args: &[HostValue]) -> Result<(), HostError>;

    /// Name of the currently loaded mod folder
    fn loaded_mod(&self) -> String {
        String::new()
    }

    // ===== Diagnostics =====

    /// Diagnostic surface for script faults
    fn report_error(&self, message: &str) {
        tracing::error!(target: "scripting", "{}", message);
    }
}
