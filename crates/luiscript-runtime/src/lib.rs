/// Embedded Lua runtime for scripting host UI
///
/// The host implements [`Host`] and drives an [`Engine`] once per frame.
/// Every script package runs in its own [`Context`] with a private heap,
/// scheduler and listener set; menus and elements live in a shared object
/// model owned by the engine.
pub mod api;
pub mod async_task;
pub mod bridge;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod events;
pub mod headless;
pub mod host;
pub mod object_model;
pub mod package_scanner;
pub mod scheduler;
pub mod value;

mod runtime;

// Re-export commonly used types for embedding hosts
pub use async_task::{HttpClient, HttpError, TaskMode, UreqClient};
pub use config::{ConfigLoadError, PackageConfig, RuntimeConfig};
pub use context::{Context, ContextId, ScriptSource};
pub use engine::Engine;
pub use error::{BridgeError, ContextError, HostError};
pub use events::{EntityRef, Event, InputEvent};
pub use headless::HeadlessHost;
pub use host::Host;
pub use object_model::{Element, ElementId, Menu, ObjectModel};
pub use runtime::{Clock, ManualClock, ScriptError, SystemClock};
pub use value::{HostRef, HostValue, Vector};
