//! Preferences and persisted view state for the places tree.
//! 檔案總管的偏好設定與視圖狀態保存。

pub mod preferences;
pub mod state;

pub use preferences::{ExplorerPreferences, Preferences, PreferencesError, PreferencesStore};
pub use state::{JsonStateStore, KeyValueStore, MemoryStateStore, StateStoreError};
