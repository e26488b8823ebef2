//! Presentation-state layer: body classes, column accessibility, and the
//! focus-release routine.
//!
//! Downstream code imports layout types from here while the implementation
//! details live in the private `core` module. The runtime decides *when*
//! these apply; this module only knows *how* to mark the document.

mod core;
pub mod focus;

pub use core::{
    BODY_MAIN_VISIBLE_CLASS, BODY_MOBILE_CLASS, LayoutState, ShellColumns, disable_column,
    enable_column,
};
pub use focus::release_focus_within;
