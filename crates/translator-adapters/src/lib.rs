//! Live implementations of the translator ports: identity and document
//! REST services, a JSON settings file, file-backed recording and scratch
//! file playback, plus the startup wiring that ties them together.

pub mod config;
pub mod context;
pub mod firebase;
pub mod playback;
pub mod recorder;
pub mod settings_file;

pub use config::AppConfig;
pub use context::{AppContext, LiveOrchestrator};
pub use firebase::{AuthEndpoints, FirebaseAuth, FirestoreCredentials};
pub use playback::ScratchPlayer;
pub use recorder::FileRecorder;
pub use settings_file::JsonFileSettings;
