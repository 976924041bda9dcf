//! # mediafx-py: Python render clients
//!
//! Exposes [`ClientState`] as the `MediaFX` class of the `mediafx._mediafx`
//! extension module. Frames cross the boundary through the buffer
//! protocol, so any writable `bytearray`, `memoryview` or numpy array of
//! `frame_bytecount` bytes works.

use pyo3::buffer::PyBuffer;
use pyo3::exceptions::{PyRuntimeError, PySystemExit};
use pyo3::prelude::*;
use pyo3::types::PySequence;
use tracing_subscriber::EnvFilter;

use mediafx_core::state::check_frame_len;
use mediafx_core::{ClientState, MediaFxError, RenderFrame};

// ── Errors ───────────────────────────────────────────────────────

/// Failure inside a binding call.
///
/// Python errors raised while touching caller buffers pass through
/// unchanged; everything else becomes `RuntimeError`.
#[derive(Debug, thiserror::Error)]
enum BindingError {
    #[error(transparent)]
    MediaFx(#[from] MediaFxError),

    #[error(transparent)]
    Python(#[from] PyErr),
}

impl From<BindingError> for PyErr {
    fn from(err: BindingError) -> Self {
        match err {
            BindingError::MediaFx(MediaFxError::Terminated) => PySystemExit::new_err(0),
            BindingError::MediaFx(e) => PyRuntimeError::new_err(e.to_string()),
            BindingError::Python(e) => e,
        }
    }
}

type RenderTuple = (f64, f64, f64, f64);

// ── MediaFX ──────────────────────────────────────────────────────

/// A render client attached to the host that started this interpreter.
#[pyclass(unsendable)]
struct MediaFX {
    state: ClientState,
}

#[pymethods]
impl MediaFX {
    #[new]
    fn new() -> PyResult<Self> {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();

        let state = ClientState::new().map_err(BindingError::from)?;
        tracing::debug!(size = ?state.frame_size(), "python client attached");
        Ok(MediaFX { state })
    }

    #[getter]
    fn config(&self) -> &str {
        self.state.config()
    }

    #[getter]
    fn frame_size(&self) -> (u32, u32) {
        self.state.frame_size()
    }

    #[getter]
    fn frame_count(&self) -> usize {
        self.state.frame_count()
    }

    #[getter]
    fn frame_bytecount(&self) -> usize {
        self.state.frame_bytecount()
    }

    /// Wait for the next request; copy source frames into `frames` if given.
    ///
    /// Returns `(time, param1, param2, param3)`.
    #[pyo3(signature = (frames=None))]
    fn render_frame(
        &mut self,
        py: Python<'_>,
        frames: Option<&Bound<'_, PySequence>>,
    ) -> PyResult<RenderTuple> {
        let data = self
            .state
            .render_frame(frames, |render_frame, frames| copy_sources(py, render_frame, frames))?;
        Ok(data.as_tuple())
    }

    #[pyo3(signature = (frames=None))]
    fn render_begin(
        &mut self,
        py: Python<'_>,
        frames: Option<&Bound<'_, PySequence>>,
    ) -> PyResult<RenderTuple> {
        self.render_frame(py, frames)
    }

    /// Older spelling of `render_frame` with mandatory frames.
    fn render(&mut self, py: Python<'_>, frames: &Bound<'_, PySequence>) -> PyResult<RenderTuple> {
        self.render_frame(py, Some(frames))
    }

    /// Copy `frame` into the rendered frame and hand it to the host.
    fn render_commit(&mut self, py: Python<'_>, frame: PyBuffer<u8>) -> PyResult<()> {
        self.state
            .render_commit(frame, |frame, rendered| -> Result<(), BindingError> {
                check_frame_len(rendered.len(), frame.item_count())?;
                frame.copy_to_slice(py, rendered)?;
                Ok(())
            })?;
        Ok(())
    }

    fn render_finish(&mut self, py: Python<'_>, frame: PyBuffer<u8>) -> PyResult<()> {
        self.render_commit(py, frame)
    }

    fn __repr__(&self) -> String {
        let (width, height) = self.state.frame_size();
        format!(
            "MediaFX(frame_size=({width}, {height}), frame_count={}, rendering={})",
            self.state.frame_count(),
            if self.state.is_rendering() { "True" } else { "False" }
        )
    }
}

/// Copy source frame `i` into the `i`th writable buffer of `frames`.
fn copy_sources(
    py: Python<'_>,
    render_frame: &RenderFrame,
    frames: &Bound<'_, PySequence>,
) -> Result<(), BindingError> {
    for (index, item) in frames.try_iter()?.enumerate() {
        let buffer: PyBuffer<u8> = PyBuffer::get(&item?)?;
        let source = render_frame.source_frame(index)?;
        check_frame_len(source.len(), buffer.item_count())?;
        buffer.copy_from_slice(py, source)?;
    }
    Ok(())
}

#[pymodule]
fn _mediafx(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<MediaFX>()?;
    Ok(())
}

// ── Tests ────────────────────────────────────────────────────────
