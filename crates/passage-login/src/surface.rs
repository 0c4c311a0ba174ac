//! Login UI presentation contract

use url::Url;

use crate::request::Presentation;
use crate::Result;

/// Something that can show the provider's login UI.
///
/// Redirects leave the current view, so they usually return no handle.
pub trait LoginSurface: Send + Sync {
    fn open(&self, presentation: Presentation, url: &Url)
        -> Result<Option<Box<dyn SurfaceHandle>>>;
}

/// An open popup or frame
pub trait SurfaceHandle: Send {
    fn close(&mut self);
}

/// Surface for hosts that present login UI themselves and only report the
/// completion back. Opening is a logged no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessSurface;

impl LoginSurface for HeadlessSurface {
    fn open(
        &self,
        presentation: Presentation,
        url: &Url,
    ) -> Result<Option<Box<dyn SurfaceHandle>>> {
        tracing::debug!(presentation = ?presentation, url = %url, "Login surface left to host");
        Ok(None)
    }
}
