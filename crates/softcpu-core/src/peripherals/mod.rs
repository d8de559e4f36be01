//! Optional capabilities the engine drives: pixel display and console.

/// Headless in-memory framebuffer.
pub mod framebuffer;

pub use framebuffer::{FrameBuffer, DEFAULT_HEIGHT, DEFAULT_WIDTH};

use std::cell::RefCell;
use std::rc::Rc;

use crate::state::Word;

/// Pixel display driven by `DSP`, `CLS`, `BFR`, `SB` and `COL`.
pub trait Display {
    /// Plots one pixel in the current drawing target.
    fn set_pixel(&mut self, x: Word, y: Word, color: Word);

    /// Clears the visible image only.
    fn clear_image(&mut self);

    /// Clears the visible image and the back buffer.
    fn clear(&mut self);

    /// Exchanges the visible image with the back buffer.
    fn swap_buffer(&mut self);

    /// Selects the back buffer (`true`) or the visible image as drawing target.
    fn set_drawing_target(&mut self, to_buffer: bool);

    /// Records the current drawing colour.
    fn set_color(&mut self, color: Word);

    /// Returns `true` when pixels changed since the last [`Display::update`].
    fn needs_update(&self) -> bool;

    /// Presents pending changes.
    fn update(&mut self);
}

/// Sink for `PRT` output.
pub trait Console {
    /// Emits one printed value.
    fn print(&mut self, value: Word);
}

/// Prints one value per line on standard output.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutConsole;

impl Console for StdoutConsole {
    #[allow(clippy::print_stdout)]
    fn print(&mut self, value: Word) {
        println!("{value}");
    }
}

/// Collects printed values in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferConsole {
    /// Values in print order.
    pub values: Vec<Word>,
}

impl Console for BufferConsole {
    fn print(&mut self, value: Word) {
        self.values.push(value);
    }
}

/// Shared handle, so the host keeps access to a display the engine drives.
impl<D: Display + ?Sized> Display for Rc<RefCell<D>> {
    fn set_pixel(&mut self, x: Word, y: Word, color: Word) {
        self.borrow_mut().set_pixel(x, y, color);
    }

    fn clear_image(&mut self) {
        self.borrow_mut().clear_image();
    }

    fn clear(&mut self) {
        self.borrow_mut().clear();
    }

    fn swap_buffer(&mut self) {
        self.borrow_mut().swap_buffer();
    }

    fn set_drawing_target(&mut self, to_buffer: bool) {
        self.borrow_mut().set_drawing_target(to_buffer);
    }

    fn set_color(&mut self, color: Word) {
        self.borrow_mut().set_color(color);
    }

    fn needs_update(&self) -> bool {
        self.borrow().needs_update()
    }

    fn update(&mut self) {
        self.borrow_mut().update();
    }
}

impl<C: Console + ?Sized> Console for Rc<RefCell<C>> {
    fn print(&mut self, value: Word) {
        self.borrow_mut().print(value);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::{BufferConsole, Console};

    #[test]
    fn shared_console_handle_sees_prints() {
        let console = Rc::new(RefCell::new(BufferConsole::default()));
        let mut handle = Rc::clone(&console);
        handle.print(4);
        handle.print(-2);
        assert_eq!(console.borrow().values, vec![4, -2]);
    }
}
