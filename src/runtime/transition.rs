//! Pure responsive state machine.
//!
//! The enumerated state plus `(state, input) -> (state, effects)` keeps the
//! four documented transitions testable without a document; the runtime's
//! imperative layer executes the effects in order.

/// Explicit shell presentation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellState {
    Desktop,
    Mobile { main_visible: bool },
}

impl ShellState {
    pub fn is_mobile(&self) -> bool {
        matches!(self, ShellState::Mobile { .. })
    }

    pub fn main_visible(&self) -> bool {
        matches!(self, ShellState::Mobile { main_visible: true })
    }
}

/// Transition triggers: media boundary crossings and main-pane requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellInput {
    EnterMobile,
    LeaveMobile,
    ShowMain,
    HideMain,
}

/// Document mutations the imperative layer performs for a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellEffect {
    /// Create/reveal the overlay hosts and move the columns into them.
    MountOverlay,
    /// Hide the desktop wrapper and set the mobile body class.
    ApplyMobileChrome,
    /// Sidebar in front, content column inert.
    ConcealMain,
    /// Content column in front, sidebar inert.
    RevealMain,
    /// Clear accessibility attributes on both columns.
    ResetColumns,
    /// Move the columns back under the wrapper and hide the overlay.
    UnmountOverlay,
    /// Restore wrapper visibility and clear the mobile body classes.
    ClearMobileChrome,
}

/// Inputs that already hold in `state` produce no effects; repeated
/// mount/unmount/show/hide is always safe.
pub fn transition(state: ShellState, input: ShellInput) -> (ShellState, Vec<ShellEffect>) {
    use ShellEffect::*;
    match (state, input) {
        (ShellState::Desktop, ShellInput::EnterMobile) => (
            // The mobile default view is the sidebar, not content.
            ShellState::Mobile { main_visible: false },
            vec![MountOverlay, ApplyMobileChrome, ConcealMain],
        ),
        (ShellState::Mobile { .. }, ShellInput::LeaveMobile) => (
            ShellState::Desktop,
            vec![ResetColumns, UnmountOverlay, ClearMobileChrome],
        ),
        (ShellState::Mobile { main_visible: false }, ShellInput::ShowMain) => {
            (ShellState::Mobile { main_visible: true }, vec![RevealMain])
        }
        (ShellState::Mobile { main_visible: true }, ShellInput::HideMain) => {
            (ShellState::Mobile { main_visible: false }, vec![ConcealMain])
        }
        (state, _) => (state, Vec::new()),
    }
}
