//! Client state machine behind the scripting bindings.
//!
//! Scripting languages cannot hold on to the typestate pair from
//! [`crate::client`], so [`ClientState`] keeps whichever half is current
//! and exposes plain `&mut self` calls:
//!
//! ```text
//!            render_frame / render_begin
//!   ┌──────┐ ─────────────────────────────► ┌───────────┐
//!   │ Idle │                                │ Rendering │ ◄─┐ render_frame (again)
//!   └──────┘ ◄───────────────────────────── └───────────┘ ──┘
//!            render_commit / render_finish
//! ```
//!
//! A failed transition always puts the previous half back, so the
//! client is never lost.

use tracing::debug;

use crate::client::{MediaFxClient, RenderFrame};
use crate::context::RenderSize;
use crate::error::MediaFxError;
use crate::message::RenderData;

enum Phase {
    Idle(MediaFxClient),
    Rendering(RenderFrame),
}

/// Owns a render client across binding calls.
pub struct ClientState {
    /// `None` only while a transition is running.
    phase: Option<Phase>,
    size: RenderSize,
    config: String,
}

impl std::fmt::Debug for ClientState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientState")
            .field("size", &self.size)
            .field("rendering", &self.is_rendering())
            .finish()
    }
}

impl ClientState {
    /// Attach to the host that spawned this process.
    pub fn new() -> Result<Self, MediaFxError> {
        Ok(Self::from_client(MediaFxClient::new()?))
    }

    pub fn from_client(client: MediaFxClient) -> Self {
        Self {
            size: client.render_size(),
            config: client.config().to_string(),
            phase: Some(Phase::Idle(client)),
        }
    }

    pub fn config(&self) -> &str {
        &self.config
    }

    pub fn frame_size(&self) -> (u32, u32) {
        (self.size.width(), self.size.height())
    }

    pub fn frame_count(&self) -> usize {
        self.size.count()
    }

    pub fn frame_bytecount(&self) -> usize {
        self.size.frame_bytecount()
    }

    /// Whether a request is in flight.
    pub fn is_rendering(&self) -> bool {
        matches!(self.phase, Some(Phase::Rendering(_)))
    }

    /// Wait for (or reuse) the current request and optionally copy its
    /// source frames out through `copy_frames`.
    ///
    /// Calling this again before committing reuses the in-flight
    /// request, so a retry after a failed copy is harmless.
    pub fn render_frame<F, C, E>(
        &mut self,
        frames: Option<F>,
        copy_frames: C,
    ) -> Result<RenderData, E>
    where
        C: FnOnce(&RenderFrame, F) -> Result<(), E>,
        E: From<MediaFxError>,
    {
        self.transition(|phase| {
            let render_frame = match phase {
                Phase::Idle(client) => match client.render_frame() {
                    Ok(render_frame) => render_frame,
                    Err((client, e)) => return Err((Phase::Idle(client), e.into())),
                },
                Phase::Rendering(render_frame) => render_frame,
            };
            let render_data = *render_frame.render_data();

            if let Some(frames) = frames {
                if let Err(e) = copy_frames(&render_frame, frames) {
                    return Err((Phase::Rendering(render_frame), e));
                }
            }
            Ok((Phase::Rendering(render_frame), render_data))
        })
    }

    /// Alias of [`render_frame`](Self::render_frame).
    pub fn render_begin<F, C, E>(
        &mut self,
        frames: Option<F>,
        copy_frames: C,
    ) -> Result<RenderData, E>
    where
        C: FnOnce(&RenderFrame, F) -> Result<(), E>,
        E: From<MediaFxError>,
    {
        self.render_frame(frames, copy_frames)
    }

    /// Copy the caller's frame into the rendered slot with `copy_frame`
    /// and commit the in-flight request.
    pub fn render_commit<F, C, E>(&mut self, frame: F, copy_frame: C) -> Result<(), E>
    where
        C: FnOnce(F, &mut [u8]) -> Result<(), E>,
        E: From<MediaFxError>,
    {
        self.transition(|phase| match phase {
            Phase::Rendering(mut render_frame) => {
                if let Err(e) = copy_frame(frame, render_frame.rendered_frame_mut()) {
                    return Err((Phase::Rendering(render_frame), e));
                }
                match render_frame.commit() {
                    Ok(client) => Ok((Phase::Idle(client), ())),
                    Err((render_frame, e)) => Err((Phase::Rendering(render_frame), e.into())),
                }
            }
            Phase::Idle(client) => Err((
                Phase::Idle(client),
                MediaFxError::InvalidState("cannot commit before a frame was requested").into(),
            )),
        })
    }

    /// Alias of [`render_commit`](Self::render_commit).
    pub fn render_finish<F, C, E>(&mut self, frame: F, copy_frame: C) -> Result<(), E>
    where
        C: FnOnce(F, &mut [u8]) -> Result<(), E>,
        E: From<MediaFxError>,
    {
        self.render_commit(frame, copy_frame)
    }

    // ── Internal ─────────────────────────────────────────────────

    fn transition<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(Phase) -> Result<(Phase, T), (Phase, E)>,
        E: From<MediaFxError>,
    {
        let phase = self
            .phase
            .take()
            .ok_or(MediaFxError::InvalidState("client lost in an earlier transition"))?;
        match f(phase) {
            Ok((phase, result)) => {
                self.phase = Some(phase);
                Ok(result)
            }
            Err((phase, e)) => {
                debug!(rendering = matches!(phase, Phase::Rendering(_)), "transition failed");
                self.phase = Some(phase);
                Err(e)
            }
        }
    }
}

/// Fail unless a caller buffer is exactly one frame long.
pub fn check_frame_len(expected: usize, actual: usize) -> Result<(), MediaFxError> {
    if expected != actual {
        return Err(MediaFxError::FrameLength { expected, actual });
    }
    Ok(())
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::FakeHost;

    fn copy_sources(
        render_frame: &RenderFrame,
        frames: &mut [Vec<u8>],
    ) -> Result<(), MediaFxError> {
        for (index, frame) in frames.iter_mut().enumerate() {
            let source = render_frame.source_frame(index)?;
            check_frame_len(source.len(), frame.len())?;
            frame.copy_from_slice(source);
        }
        Ok(())
    }

    fn copy_rendered(frame: &[u8], rendered: &mut [u8]) -> Result<(), MediaFxError> {
        check_frame_len(rendered.len(), frame.len())?;
        rendered.copy_from_slice(frame);
        Ok(())
    }

    #[test]
    fn getters_work_in_both_phases() {
        let host = FakeHost::new(3, 2, 1, "cfg").request(RenderData::default());
        let (client, _) = host.attach();
        let mut state = ClientState::from_client(client);

        assert_eq!(state.frame_size(), (3, 2));
        assert_eq!(state.frame_count(), 1);
        assert_eq!(state.frame_bytecount(), 24);
        assert_eq!(state.config(), "cfg");

        state
            .render_frame(None::<()>, |_, _| Ok::<(), MediaFxError>(()))
            .unwrap();
        assert!(state.is_rendering());
        assert_eq!(state.frame_size(), (3, 2));
    }

    #[test]
    fn frame_then_commit_round_trip() {
        let mut host = FakeHost::new(2, 1, 1, "").request(RenderData::new(7.0, 0.1, 0.2, 0.3));
        host.fill_source(0, 5);
        let (client, out) = host.attach();
        let mut state = ClientState::from_client(client);

        let mut frames = vec![vec![0u8; 8]];
        let data = state
            .render_frame(Some(frames.as_mut_slice()), copy_sources)
            .unwrap();
        assert_eq!(data.time, 7.0);
        assert_eq!(frames[0], vec![5; 8]);

        state.render_commit(&[9u8; 8][..], copy_rendered).unwrap();
        assert!(!state.is_rendering());
        assert_eq!(host.rendered(), vec![9; 8]);
        assert_eq!(out.acks().len(), 2);
    }

    #[test]
    fn commit_while_idle_is_invalid() {
        let host = FakeHost::new(2, 1, 0, "");
        let (client, _) = host.attach();
        let mut state = ClientState::from_client(client);

        let err = state.render_commit(&[0u8; 8][..], copy_rendered).unwrap_err();
        assert!(matches!(err, MediaFxError::InvalidState(_)));
        assert!(!state.is_rendering());
    }

    #[test]
    fn failed_copy_keeps_request_in_flight() {
        let host = FakeHost::new(2, 1, 1, "").request(RenderData::new(1.0, 0.0, 0.0, 0.0));
        let (client, out) = host.attach();
        let mut state = ClientState::from_client(client);

        let mut short = vec![vec![0u8; 3]];
        let err = state
            .render_frame(Some(short.as_mut_slice()), copy_sources)
            .unwrap_err();
        assert!(matches!(err, MediaFxError::FrameLength { expected: 8, actual: 3 }));
        assert!(state.is_rendering());

        // Retrying reuses the same request instead of reading a new one.
        let mut frames = vec![vec![0u8; 8]];
        let data = state
            .render_frame(Some(frames.as_mut_slice()), copy_sources)
            .unwrap();
        assert_eq!(data.time, 1.0);

        let err = state.render_commit(&[1u8; 4][..], copy_rendered).unwrap_err();
        assert!(matches!(err, MediaFxError::FrameLength { .. }));
        assert!(state.is_rendering());
        state.render_finish(&[1u8; 8][..], copy_rendered).unwrap();
        assert_eq!(out.acks().len(), 2);
    }

    #[test]
    fn terminate_surfaces_and_stays_idle() {
        let host = FakeHost::new(2, 1, 0, "").terminate();
        let (client, _) = host.attach();
        let mut state = ClientState::from_client(client);

        let err = state
            .render_begin(None::<()>, |_, _| Ok::<(), MediaFxError>(()))
            .unwrap_err();
        assert!(err.is_terminated());
        assert!(!state.is_rendering());
    }

    #[test]
    fn out_of_range_source_copy() {
        let host = FakeHost::new(1, 1, 1, "").request(RenderData::default());
        let (client, _) = host.attach();
        let mut state = ClientState::from_client(client);

        let mut frames = vec![vec![0u8; 4], vec![0u8; 4]];
        let err = state
            .render_frame(Some(frames.as_mut_slice()), copy_sources)
            .unwrap_err();
        assert!(matches!(err, MediaFxError::FrameOutOfRange { index: 1, count: 1 }));
    }
}
