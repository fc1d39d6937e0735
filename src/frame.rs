// ── Frame driver ──────────────────────────────────────────────────────────────
//
// The per-frame loop: reload check, input drain, one render, present.  The
// OS side is behind `HostEnvironment` so the loop itself carries no platform
// code.

use log::{debug, warn};

use crate::{
    error::Result,
    reload::{context::HostContext, symbols::ModuleLoader},
};

/// Pointer input in client coordinates (top-left origin), as reported by the
/// OS.  Flipped to a bottom-left origin before it reaches the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct InputEvent {
    pub(crate) x: i32,
    pub(crate) y: i32,
    pub(crate) buttons: u32,
}

/// Client-area size for this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FrameRequest {
    pub(crate) width: i32,
    pub(crate) height: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pump {
    Continue,
    Quit,
}

/// The window and graphics context the loop runs against.
pub(crate) trait HostEnvironment {
    /// Drain every pending OS notification, appending pointer input to
    /// `events`.  Reports `Pump::Quit` once termination was requested.
    ///
    /// When the OS asks for a repaint while notifications are dispatched,
    /// the environment calls `repaint` with the current viewport and
    /// presents the result if it returns `true`.  This keeps the window
    /// drawn while a modal move or size loop holds the thread.
    fn pump(
        &mut self,
        events: &mut Vec<InputEvent>,
        repaint: &mut dyn FnMut(FrameRequest) -> bool,
    ) -> Result<Pump>;

    fn viewport(&self) -> FrameRequest;

    /// Show the frame just rendered.
    fn present(&mut self) -> Result<()>;
}

pub(crate) struct FrameDriver<L: ModuleLoader, E> {
    context: HostContext<L>,
    env: E,
    events: Vec<InputEvent>,
    frames: u64,
}

impl<L: ModuleLoader, E: HostEnvironment> FrameDriver<L, E> {
    pub(crate) fn new(context: HostContext<L>, env: E) -> Self {
        Self {
            context,
            env,
            events: Vec::new(),
            frames: 0,
        }
    }

    #[cfg(test)]
    pub(crate) fn context(&self) -> &HostContext<L> {
        &self.context
    }

    /// Run a reload cycle outside the loop, e.g. before the window is shown.
    pub(crate) fn prime(&mut self) -> Result<()> {
        self.reload_step()
    }

    /// Loop until the environment requests termination.
    ///
    /// The opaque state is deliberately not released on exit; process
    /// teardown reclaims it.
    pub(crate) fn run(&mut self) -> Result<()> {
        while self.frame()? == Pump::Continue {}
        debug!("quit after {} frames", self.frames);
        Ok(())
    }

    /// One iteration.  A quit request still completes the current frame.
    pub(crate) fn frame(&mut self) -> Result<Pump> {
        self.reload_step()?;

        let context = &self.context;
        let pump = self
            .env
            .pump(&mut self.events, &mut |viewport: FrameRequest| context.render(viewport))?;
        let viewport = self.env.viewport();

        for event in self.events.drain(..) {
            self.context.mouse(InputEvent {
                y: viewport.height - event.y - 1,
                ..event
            });
        }

        if !self.context.render(viewport) && self.frames == 0 {
            debug!("no module loaded yet; waiting for the first build");
        }
        self.env.present()?;

        self.frames += 1;
        Ok(pump)
    }

    fn reload_step(&mut self) -> Result<()> {
        match self.context.hot_reload() {
            Ok(_) => Ok(()),
            Err(e) if !e.is_fatal() => {
                warn!("{e}; keeping the current module");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
