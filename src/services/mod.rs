pub mod credential_service;
pub mod display;
pub mod rotation_engine;
pub mod selection_service;
pub mod settings_service;
