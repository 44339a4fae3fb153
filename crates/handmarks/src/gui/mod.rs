//! A minimal window for showing frames and reading key presses.
//!
//! Everything runs on the calling thread: [`Display::poll_key`] pumps the window system's events
//! for a bounded amount of time, which is also when the last shown frame is presented.

mod renderer;

use std::{
    rc::Rc,
    time::{Duration, Instant},
};

use winit::{
    event::{ElementState, Event, KeyboardInput, VirtualKeyCode, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    platform::run_return::EventLoopExtRunReturn,
};

use crate::image::Image;

use self::renderer::{Gpu, Renderer, Window};

/// A key press reported by a [`Display`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    Char(char),
    /// A key that produces no character.
    Other,
}

impl Key {
    /// Maps a typed character to a key, recognizing the ASCII escape character.
    pub fn from_char(c: char) -> Self {
        match c {
            '\u{1b}' => Key::Escape,
            c => Key::Char(c),
        }
    }

    /// Merges a newly observed key into the pending one.
    ///
    /// Escape always wins, and a character replaces a pending [`Key::Other`] (winit reports the
    /// physical key before the character it produces).
    fn merge(pending: &mut Option<Key>, key: Key) {
        match (*pending, key) {
            (Some(Key::Escape), _) => {}
            (_, Key::Escape) | (None, _) | (Some(Key::Other), Key::Char(_)) => *pending = Some(key),
            _ => {}
        }
    }
}

/// A collaborator that presents frames and reports key presses.
pub trait Display {
    /// Shows `image`, replacing the previously shown one.
    fn show(&mut self, image: &Image) -> anyhow::Result<()>;

    /// Waits up to `timeout` for a key press.
    ///
    /// Returns the first key pressed, or [`None`] if the timeout elapsed without one.
    fn poll_key(&mut self, timeout: Duration) -> anyhow::Result<Option<Key>>;
}

impl<D: Display + ?Sized> Display for Box<D> {
    fn show(&mut self, image: &Image) -> anyhow::Result<()> {
        (**self).show(image)
    }

    fn poll_key(&mut self, timeout: Duration) -> anyhow::Result<Option<Key>> {
        (**self).poll_key(timeout)
    }
}

/// A window presenting frames through the GPU.
///
/// The window is created when the first frame is shown, at that frame's size. Dropping the [`Gui`]
/// closes it.
pub struct Gui {
    title: String,
    /// Declared before `event_loop` so that the window is destroyed first.
    renderer: Option<Renderer>,
    gpu: Rc<Gpu>,
    event_loop: EventLoop<()>,
    pending_key: Option<Key>,
}

impl Gui {
    /// Connects to the display server and opens the GPU.
    ///
    /// This has to be called on the main thread.
    pub fn new(title: impl Into<String>) -> anyhow::Result<Self> {
        let event_loop = EventLoop::new();
        let gpu = pollster::block_on(Gpu::open())?;
        Ok(Self {
            title: title.into(),
            renderer: None,
            gpu: Rc::new(gpu),
            event_loop,
            pending_key: None,
        })
    }
}

impl Display for Gui {
    fn show(&mut self, image: &Image) -> anyhow::Result<()> {
        let res = image.resolution();
        if self.renderer.is_none() {
            log::debug!("creating window '{}' at {res}", self.title);
            let window = Window::open(&self.event_loop, &self.title, res)?;
            self.renderer = Some(Renderer::new(window, self.gpu.clone())?);
        }

        if let Some(renderer) = &mut self.renderer {
            if renderer.window().resolution() != res {
                log::warn!(
                    "frame resolution changed from {} to {res}",
                    renderer.window().resolution(),
                );
            }
            renderer.update_texture(res, image.data());
            renderer.request_redraw();
        }
        Ok(())
    }

    fn poll_key(&mut self, timeout: Duration) -> anyhow::Result<Option<Key>> {
        let deadline = Instant::now() + timeout;
        let Self {
            renderer,
            event_loop,
            pending_key,
            ..
        } = self;
        let mut error = None;

        event_loop.run_return(|event, _target, flow| {
            match event {
                Event::WindowEvent { event, .. } => match event {
                    WindowEvent::CloseRequested => Key::merge(pending_key, Key::Escape),
                    WindowEvent::ReceivedCharacter(c) => {
                        Key::merge(pending_key, Key::from_char(c))
                    }
                    WindowEvent::KeyboardInput {
                        input:
                            KeyboardInput {
                                state: ElementState::Pressed,
                                virtual_keycode,
                                ..
                            },
                        ..
                    } => {
                        let key = match virtual_keycode {
                            Some(VirtualKeyCode::Escape) => Key::Escape,
                            _ => Key::Other,
                        };
                        Key::merge(pending_key, key);
                    }
                    _ => {}
                },
                Event::RedrawRequested(id) => {
                    if let Some(renderer) = renderer.as_mut() {
                        if renderer.window_id() == id {
                            if let Err(e) = renderer.redraw() {
                                error = Some(e);
                            }
                        }
                    }
                }
                Event::RedrawEventsCleared => {
                    if error.is_some() || pending_key.is_some() || Instant::now() >= deadline {
                        *flow = ControlFlow::Exit;
                        return;
                    }
                }
                _ => {}
            }
            *flow = ControlFlow::WaitUntil(deadline);
        });

        match error {
            Some(e) => Err(e),
            None => Ok(pending_key.take()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_character() {
        assert_eq!(Key::from_char('\u{1b}'), Key::Escape);
        assert_eq!(Key::from_char('q'), Key::Char('q'));
    }

    #[test]
    fn merge_keys() {
        let mut pending = None;
        Key::merge(&mut pending, Key::Other);
        assert_eq!(pending, Some(Key::Other));
        Key::merge(&mut pending, Key::Char('a'));
        assert_eq!(pending, Some(Key::Char('a')));
        Key::merge(&mut pending, Key::Char('b'));
        assert_eq!(pending, Some(Key::Char('a')));
        Key::merge(&mut pending, Key::Escape);
        assert_eq!(pending, Some(Key::Escape));
        Key::merge(&mut pending, Key::Char('c'));
        assert_eq!(pending, Some(Key::Escape));
    }
}
