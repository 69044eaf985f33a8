//! Long-running tasks spawned by the server next to the HTTP listener.

pub mod import_poller;
