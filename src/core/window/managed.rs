//! Binds a registered window to a drawable surface.

use std::path::Path;

use crate::core::traits::{DecorationRenderer, SurfaceProvider};
use crate::core::window::record::{PropertyKey, WindowProperty};
use crate::core::window::registry::{WindowHandle, WindowRegistry};
use crate::prelude::*;
use crate::util::logging::WINDOW;

/// A window plus the surface the drawing library renders decorations into.
/// Holds only the handle; the record itself stays in the registry.
#[derive(Debug)]
pub struct ManagedWindow<S> {
    handle: WindowHandle,
    surface: Option<S>,
}

impl<S> ManagedWindow<S> {
    /// Wrap a registered window, building a surface if a buffer is attached.
    pub fn bind<P>(registry: &WindowRegistry, handle: WindowHandle, provider: &mut P) -> Result<Self, WindowError>
    where
        P: SurfaceProvider<Surface = S>,
    {
        let record = registry
            .lookup(handle)
            .ok_or(WindowError::UnknownWindow(handle))?;
        let surface = record.buffer().and_then(|b| provider.create_surface(b));
        Ok(Self { handle, surface })
    }

    pub fn handle(&self) -> WindowHandle {
        self.handle
    }

    pub fn surface(&self) -> Option<&S> {
        self.surface.as_ref()
    }

    /// Move to `geometry` backed by a new client buffer. The old surface is
    /// dropped and a new one built; the window waits in `BufferAttached`
    /// until the client marks the new buffer ready. If the geometry is
    /// rejected or the attach fails nothing changes.
    pub fn resize<P>(
        &mut self,
        registry: &mut WindowRegistry,
        provider: &mut P,
        geometry: Rect,
        path: &Path,
        size: usize,
    ) -> Result<()>
    where
        P: SurfaceProvider<Surface = S>,
    {
        registry
            .lookup(self.handle)
            .ok_or(WindowError::UnknownWindow(self.handle))?
            .frame_for(geometry)?;
        registry.attach_buffer(self.handle, path, size)?;
        let record = registry
            .lookup_mut(self.handle)
            .ok_or(WindowError::UnknownWindow(self.handle))?;
        record.set_geometry(geometry)?;

        self.surface = None;
        self.surface = record.buffer().and_then(|b| provider.create_surface(b));
        if self.surface.is_none() {
            tracing::warn!(target: WINDOW, "Window {}: no surface for resized buffer", self.handle);
        }
        tracing::debug!(target: WINDOW, "Window {} resized to {:?}", self.handle, geometry);
        Ok(())
    }

    /// Paint the frame of a decorated window. Returns false if there was
    /// nothing to draw.
    pub fn draw_decorations<R>(
        &self,
        registry: &WindowRegistry,
        renderer: &mut R,
        context: &mut R::Context,
        pointer: Point,
    ) -> bool
    where
        R: DecorationRenderer,
    {
        match registry.lookup(self.handle) {
            Some(record) if !record.is_destroyed() && !record.style_mask().is_borderless() => {
                renderer.draw_frame(context, record, pointer);
                true
            }
            _ => false,
        }
    }

    pub fn property(&self, registry: &WindowRegistry, key: PropertyKey) -> Option<WindowProperty> {
        registry.lookup(self.handle).map(|r| r.property(key))
    }

    pub fn set_property(&self, registry: &mut WindowRegistry, property: WindowProperty) -> Result<(), WindowError> {
        registry
            .lookup_mut(self.handle)
            .ok_or(WindowError::UnknownWindow(self.handle))?
            .set_property(property)
    }
}
