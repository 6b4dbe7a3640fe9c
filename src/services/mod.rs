pub mod event_manager;
