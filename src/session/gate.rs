//! Protected-route gate

use super::store::AuthState;

pub const LOGIN_PATH: &str = "/login";

/// What a protected page should render
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Session still resolving
    Loading,
    /// No session: go to the given path
    Redirect(&'static str),
    Render,
}

pub fn decide(state: &AuthState) -> GateDecision {
    if !state.initialized || state.loading {
        GateDecision::Loading
    } else if state.user.is_none() {
        GateDecision::Redirect(LOGIN_PATH)
    } else {
        GateDecision::Render
    }
}
