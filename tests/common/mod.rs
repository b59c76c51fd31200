#![allow(dead_code)]

use std::sync::Arc;

use auth_service::{AppState, KeyMaterial, MemoryStore, Settings};

pub fn test_settings() -> Settings {
    Settings::new_for_test().expect("Failed to load test config")
}

pub fn test_keys() -> Arc<KeyMaterial> {
    Arc::new(KeyMaterial::load(&test_settings().auth).expect("Failed to load fixture keys"))
}

/// App state over an in-memory store and the fixture keys.
pub fn memory_state() -> AppState {
    let store = Arc::new(MemoryStore::new());
    AppState::with_stores(test_settings(), test_keys(), store.clone(), store)
}
