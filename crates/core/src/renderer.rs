//! Common renderer trait for the board video outputs.
//!
//! Every board composes its layers into a pen-indexed
//! [`Bitmap`](crate::video::surface::Bitmap) and then resolves the pens
//! through its palette into an ARGB [`Frame`]:
//!
//! ```text
//! Compositor (pens) -> Screen (palette lookup) -> Renderer::get_frame
//! ```

use crate::types::Frame;

/// Common renderer trait for emulated video outputs
pub trait Renderer {
    /// Get the current framebuffer (read-only)
    fn get_frame(&self) -> &Frame;

    /// Get mutable access to the framebuffer
    fn get_frame_mut(&mut self) -> &mut Frame;

    /// Clear the framebuffer with a solid color
    ///
    /// # Arguments
    /// * `color` - ARGB8888 color value (0xAARRGGBB)
    fn clear(&mut self, color: u32);

    /// Reset the renderer to its initial state
    fn reset(&mut self);

    /// Get the name of this renderer (for debugging)
    fn name(&self) -> &str;

    /// Resize the renderer to new dimensions
    fn resize(&mut self, width: u32, height: u32);
}
