//! Named-slot multiplexer: independent features register a view for a slot,
//! activate or deactivate it, with exactly one active view per slot and
//! deterministic cleanup.
//!
//! Downstream code imports slot types from here while the implementation
//! details live in the private `core` module.

mod core;

pub use core::{
    ActivateFn, Cleanup, DeactivateFn, RenderFn, RenderResult, SlotContext, SlotRegistry,
    ViewHandle, ViewSpec,
};
