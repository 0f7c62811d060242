//! Render-time failure boundary.
//!
//! An [`ErrorBoundary`] wraps a view producer. When the producer fails or
//! panics, the boundary switches to `Failed` and renders a static
//! [`FallbackView`] until the user explicitly resets it. It never retries a
//! failed render by itself.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::session::Navigator;

/// Build mode of the embedding application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// Error details are shown in the fallback.
    Development,
    /// Error details are hidden.
    #[default]
    Production,
}

/// The failure that moved a boundary to `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderFailure {
    pub message: String,
    /// True if the producer panicked rather than returning an error.
    pub panicked: bool,
}

impl fmt::Display for RenderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// State of an error boundary.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BoundaryState {
    /// Children are rendered.
    #[default]
    Normal,
    /// A render failed; the fallback is shown.
    Failed(RenderFailure),
}

/// The two ways out of the fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Reset the boundary and render the children again.
    TryAgain,
    /// Full reload at the home location.
    GoHome,
}

impl RecoveryAction {
    pub fn label(self) -> &'static str {
        match self {
            RecoveryAction::TryAgain => "Try again",
            RecoveryAction::GoHome => "Go home",
        }
    }
}

/// What the boundary shows while `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackView {
    pub title: String,
    pub apology: String,
    /// Raw error detail; only present in development builds.
    pub detail: Option<String>,
    pub actions: [RecoveryAction; 2],
}

impl FallbackView {
    fn for_failure(failure: &RenderFailure, mode: BuildMode) -> Self {
        Self {
            title: "Something went wrong".to_string(),
            apology: "We're sorry, but this page ran into an unexpected problem. \
                      You can try again or return to the home page."
                .to_string(),
            detail: match mode {
                BuildMode::Development => Some(failure.message.clone()),
                BuildMode::Production => None,
            },
            actions: [RecoveryAction::TryAgain, RecoveryAction::GoHome],
        }
    }
}

impl fmt::Display for FallbackView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        writeln!(f, "{}", self.apology)?;
        if let Some(detail) = &self.detail {
            writeln!(f, "Error: {}", detail)?;
        }
        let labels: Vec<String> = self
            .actions
            .iter()
            .map(|a| format!("[{}]", a.label()))
            .collect();
        write!(f, "{}", labels.join(" "))
    }
}

/// Result of rendering through a boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered<V> {
    View(V),
    Fallback(FallbackView),
}

impl<V> Rendered<V> {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Rendered::Fallback(_))
    }

    pub fn into_view(self) -> Option<V> {
        match self {
            Rendered::View(view) => Some(view),
            Rendered::Fallback(_) => None,
        }
    }
}

/// Catches render failures and offers a bounded recovery.
#[derive(Debug, Clone)]
pub struct ErrorBoundary {
    state: BoundaryState,
    mode: BuildMode,
    home_path: String,
}

impl Default for ErrorBoundary {
    fn default() -> Self {
        Self::new(BuildMode::default())
    }
}

impl ErrorBoundary {
    /// Creates a boundary in the `Normal` state with `/` as home.
    pub fn new(mode: BuildMode) -> Self {
        Self {
            state: BoundaryState::Normal,
            mode,
            home_path: "/".to_string(),
        }
    }

    /// Sets the known-good location used by "go home".
    pub fn with_home_path(mut self, home_path: impl Into<String>) -> Self {
        self.home_path = home_path.into();
        self
    }

    pub fn state(&self) -> &BoundaryState {
        &self.state
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, BoundaryState::Failed(_))
    }

    pub fn home_path(&self) -> &str {
        &self.home_path
    }

    /// Renders the children, or the fallback if the boundary has failed.
    ///
    /// In `Normal`, `produce` is called; an `Err` or a panic moves the boundary
    /// to `Failed`. In `Failed`, `produce` is not called.
    pub fn render<V, E, F>(&mut self, produce: F) -> Rendered<V>
    where
        E: fmt::Display,
        F: FnOnce() -> Result<V, E>,
    {
        if let BoundaryState::Failed(failure) = &self.state {
            return Rendered::Fallback(FallbackView::for_failure(failure, self.mode));
        }

        let failure = match panic::catch_unwind(AssertUnwindSafe(produce)) {
            Ok(Ok(view)) => return Rendered::View(view),
            Ok(Err(e)) => RenderFailure {
                message: e.to_string(),
                panicked: false,
            },
            Err(payload) => RenderFailure {
                message: panic_message(payload.as_ref()),
                panicked: true,
            },
        };

        error!(error = %failure.message, panicked = failure.panicked, "render failed");
        let fallback = FallbackView::for_failure(&failure, self.mode);
        self.state = BoundaryState::Failed(failure);
        Rendered::Fallback(fallback)
    }

    /// Returns to `Normal`. Returns false if the boundary was not `Failed`.
    pub fn reset(&mut self) -> bool {
        if self.is_failed() {
            info!("error boundary reset");
            self.state = BoundaryState::Normal;
            true
        } else {
            false
        }
    }

    /// Full reload at the home location. Does not touch the boundary state.
    pub fn go_home(&self, navigator: &dyn Navigator) {
        info!(to = %self.home_path, "leaving failed view");
        navigator.reload(&self.home_path);
    }

    /// Performs a recovery action chosen from the fallback.
    pub fn recover(&mut self, action: RecoveryAction, navigator: &dyn Navigator) {
        match action {
            RecoveryAction::TryAgain => {
                self.reset();
            }
            RecoveryAction::GoHome => self.go_home(navigator),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "view panicked".to_string()
    }
}
