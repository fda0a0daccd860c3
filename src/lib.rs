//! travelsketch — collaborative travel canvas core.
//!
//! A canvas is a free-form board of text, photo, receipt and video boxes
//! kept in a remote document store, with media bytes in a remote object
//! store. [`session::CanvasSession`] is the entry point: it mirrors one
//! canvas locally, places new boxes optimistically, and keeps a bitmap cache
//! warm for rendering.

pub mod bitmap;
pub mod classify;
pub mod config;
pub mod export;
pub mod layout;
pub mod model;
pub mod placement;
pub mod session;
pub mod source;
pub mod store;

pub use model::{BoxType, CanvasBox};
pub use session::{CanvasSession, SessionDeps, SessionError};
