//! On-screen display of annotated frames.
//!
//! Everything here runs on the calling thread: [`Display`] owns the winit event loop and only
//! pumps it while [`FrameSink::poll_key`] is waiting for input.

mod renderer;

use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use winit::{
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    platform::run_return::EventLoopExtRunReturn,
};

use crate::image::{Frame, Resolution};

use self::renderer::{Gpu, Renderer, Window};

/// A destination for annotated frames that also delivers keyboard input.
pub trait FrameSink {
    /// Shows `frame`, replacing the previously shown frame.
    fn show(&mut self, frame: &Frame) -> anyhow::Result<()>;

    /// Waits up to `timeout` for a key press and returns the typed character, if any.
    ///
    /// Keys typed in quick succession are returned by successive calls, in the order they were
    /// typed.
    fn poll_key(&mut self, timeout: Duration) -> anyhow::Result<Option<char>>;
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn show(&mut self, frame: &Frame) -> anyhow::Result<()> {
        (**self).show(frame)
    }

    fn poll_key(&mut self, timeout: Duration) -> anyhow::Result<Option<char>> {
        (**self).poll_key(timeout)
    }
}

/// A window with a fixed title that displays [`Frame`]s.
///
/// The window is opened by [`Display::open`] at [`Display::DEFAULT_RESOLUTION`] and follows the
/// resolution of the frames shown in it. It is closed when the [`Display`] is dropped. Closing it
/// via the window manager has no effect.
pub struct Display {
    /// Window must be destroyed before the event loop.
    renderer: Renderer,
    event_loop: EventLoop<()>,
    title: String,
    keys: VecDeque<char>,
}

impl Display {
    /// Window size used until the first frame is shown.
    pub const DEFAULT_RESOLUTION: Resolution = Resolution::RES_VGA;

    /// Connects to the display server, opens a GPU and creates the window.
    ///
    /// Must be called on the main thread.
    pub fn open(title: impl Into<String>) -> anyhow::Result<Self> {
        let title = title.into();
        let event_loop = EventLoop::new();
        let gpu = pollster::block_on(Gpu::open())?;

        log::debug!("creating window '{}' at {}", title, Self::DEFAULT_RESOLUTION);
        let window = Window::open(&*event_loop, &title, Self::DEFAULT_RESOLUTION)?;
        let renderer = Renderer::new(window, gpu)?;
        Ok(Self {
            event_loop,
            title,
            renderer,
            keys: VecDeque::new(),
        })
    }
}

/// Handles a window event, queueing typed characters in `keys`.
fn handle_window_event(event: &WindowEvent<'_>, keys: &mut VecDeque<char>) {
    match event {
        WindowEvent::ReceivedCharacter(c) => {
            log::trace!("key pressed: {c:?}");
            keys.push_back(*c);
        }
        WindowEvent::CloseRequested => {
            log::info!("ignoring window close request, press 'q' to quit");
        }
        _ => {}
    }
}

impl FrameSink for Display {
    fn show(&mut self, frame: &Frame) -> anyhow::Result<()> {
        if self.renderer.resolution() != frame.resolution() {
            self.renderer.resize(frame.resolution());
        }
        self.renderer.update_texture(frame.resolution(), &frame.to_rgba8());
        self.renderer.redraw()
    }

    fn poll_key(&mut self, timeout: Duration) -> anyhow::Result<Option<char>> {
        if let Some(key) = self.keys.pop_front() {
            return Ok(Some(key));
        }

        let deadline = Instant::now() + timeout;
        let renderer = &mut self.renderer;
        let keys = &mut self.keys;
        let mut result = Ok(());

        self.event_loop.run_return(|event, _target, flow| match event {
            Event::WindowEvent { event, .. } => handle_window_event(&event, keys),
            Event::RedrawRequested(_) => {
                if let Err(e) = renderer.redraw() {
                    result = Err(e);
                    *flow = ControlFlow::Exit;
                }
            }
            Event::MainEventsCleared => {
                if !keys.is_empty() || Instant::now() >= deadline {
                    *flow = ControlFlow::Exit;
                } else {
                    *flow = ControlFlow::WaitUntil(deadline);
                }
            }
            _ => {}
        });

        result.map(|()| self.keys.pop_front())
    }
}

impl Drop for Display {
    fn drop(&mut self) {
        log::debug!("closing window '{}'", self.title);
    }
}
