// Session state management

pub mod config;
pub mod controller;
pub mod events;
pub mod queue;
pub mod refresh;
pub mod session_state;
pub mod settings;

pub use config::{ConfigManager, MAX_RECENT_CONNECTIONS};
pub use controller::{ControllerContext, OperationResult, SaveRecentFn, SessionController};
pub use events::{ErrorContext, ErrorInfo, EventBus, SessionEvent};
pub use queue::{OperationOutcome, OperationQueue, QueueHandle};
pub use refresh::AutoRefreshTimer;
pub use session_state::{DEFAULT_REFRESH_INTERVAL, LoadRequest, SessionState};
pub use settings::{AppConfig, ConfigOverrides, DatabaseConfig, LoggingConfig, QueryConfig};
