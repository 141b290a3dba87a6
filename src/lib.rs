// Library root
// -----------
// This crate exposes the building blocks of the journal CLI. The binary
// (`main.rs`) wires them together and hands control to `ui`.
//
// Module responsibilities:
// - `args` / `config`: command-line flags, environment and `.env` files,
//   validated into a `Config`.
// - `auth`: client-credentials token cache shared by every API call.
// - `api`: authenticated HTTP gateway (bearer token, 401 retry, error
//   mapping).
// - `subscriptions`, `snapshots`, `journal`: one client per REST resource.
// - `stream`: the polling loop that follows the journal as it grows.
// - `render` / `ui`: terminal output and the interactive menus.
pub mod api;
pub mod args;
pub mod auth;
pub mod config;
pub mod error;
pub mod journal;
pub mod models;
pub mod render;
pub mod snapshots;
pub mod stream;
pub mod subscriptions;
pub mod ui;

pub use error::{Error, Result};
