// handlers/mod.rs - HTTP handlers
//
// Public: banner and health. Routine dispatch: /api/procedure/:name and
// /api/function/:name, guarded per routine by the privilege table. Session:
// /api/me and /api/logout, driven by the identity cookie or header.

pub mod health;
pub mod hooks;
pub mod me;
pub mod rpc;
