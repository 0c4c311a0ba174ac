//! Passage Login Flows
//!
//! Interactive logins run outside the process: a redirect, a popup or a hidden
//! frame. The [`LoginCoordinator`] keeps at most one flow per provider and
//! presentation mode, and correlates the provider's completion callback with
//! the flow that started it by an opaque state token.

mod coordinator;
mod error;
mod handle;
mod request;
mod surface;

pub use coordinator::LoginCoordinator;
pub use error::{CorrelationFailure, LoginError};
pub use handle::LoginHandle;
pub use request::{AuthorizationRequest, CompletionParams, LoginMode, LoginRequest, Presentation};
pub use surface::{HeadlessSurface, LoginSurface, SurfaceHandle};

pub type Result<T> = std::result::Result<T, LoginError>;
