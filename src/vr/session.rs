use crate::vr::runtime::{EventQueue, SessionControl};
use crate::vr::{DisplayTime, XrResult};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum SessionState {
    #[default]
    Unknown,
    Idle,
    Ready,
    Synchronized,
    Visible,
    Focused,
    Stopping,
    LossPending,
    Exiting,
}

impl SessionState {
    /// Whether the runtime accepts frame submission in this state.
    pub fn accepts_frames(self) -> bool {
        matches!(
            self,
            SessionState::Synchronized | SessionState::Visible | SessionState::Focused
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionState::Unknown => "UNKNOWN",
            SessionState::Idle => "IDLE",
            SessionState::Ready => "READY",
            SessionState::Synchronized => "SYNCHRONIZED",
            SessionState::Visible => "VISIBLE",
            SessionState::Focused => "FOCUSED",
            SessionState::Stopping => "STOPPING",
            SessionState::LossPending => "LOSS_PENDING",
            SessionState::Exiting => "EXITING",
        };
        f.write_str(label)
    }
}

/// Raw runtime session handle; zero is the null handle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct SessionHandle(pub u64);

impl SessionHandle {
    pub const NULL: SessionHandle = SessionHandle(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    SessionStateChanged {
        session: SessionHandle,
        state: SessionState,
        time: DisplayTime,
    },
    InstanceLossPending {
        loss_time: DisplayTime,
    },
    InteractionProfileChanged {
        session: SessionHandle,
    },
    EventsLost {
        count: u32,
    },
    ReferenceSpaceChangePending,
    Unrecognized {
        type_code: i32,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollOutcome {
    pub exit_render_loop: bool,
    pub request_restart: bool,
    pub interaction_profile_changed: bool,
}

/// Tracks the runtime's lifecycle and decides whether frames may be rendered.
pub struct SessionStateMachine {
    state: SessionState,
    running: bool,
}

impl SessionStateMachine {
    pub fn new() -> Self {
        Self {
            state: SessionState::Unknown,
            running: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_focused(&self) -> bool {
        self.state == SessionState::Focused
    }

    /// Drains every pending event. Instance loss stops the drain early since
    /// nothing after it can be acted upon.
    pub fn poll_events<R>(&mut self, runtime: &mut R) -> XrResult<PollOutcome>
    where
        R: EventQueue + SessionControl + ?Sized,
    {
        let mut outcome = PollOutcome::default();

        while let Some(event) = runtime.poll_event()? {
            match event {
                LifecycleEvent::InstanceLossPending { loss_time } => {
                    log::warn!("[session] instance loss pending at {loss_time}");
                    outcome.exit_render_loop = true;
                    outcome.request_restart = true;
                    return Ok(outcome);
                }
                LifecycleEvent::SessionStateChanged {
                    session,
                    state,
                    time,
                } => {
                    self.handle_state_changed(runtime, session, state, time, &mut outcome)?;
                }
                LifecycleEvent::InteractionProfileChanged { session } => {
                    let owned = runtime.session_handle();
                    if !session.is_null() && session != owned {
                        log::error!("[session] interaction profile change for unknown session");
                        continue;
                    }
                    log::info!("[session] interaction profile changed");
                    outcome.interaction_profile_changed = true;
                }
                LifecycleEvent::EventsLost { count } => {
                    log::warn!("[session] {count} events lost");
                }
                LifecycleEvent::ReferenceSpaceChangePending => {
                    log::info!("[session] ignoring reference space change");
                }
                LifecycleEvent::Unrecognized { type_code } => {
                    log::info!("[session] ignoring event type {type_code}");
                }
            }
        }

        Ok(outcome)
    }

    fn handle_state_changed<R>(
        &mut self,
        runtime: &mut R,
        session: SessionHandle,
        state: SessionState,
        time: DisplayTime,
        outcome: &mut PollOutcome,
    ) -> XrResult<()>
    where
        R: SessionControl + ?Sized,
    {
        let owned = runtime.session_handle();
        if !session.is_null() && session != owned {
            log::error!(
                "[session] state change to {state} for unknown session {:#x}",
                session.0
            );
            return Ok(());
        }

        log::info!(
            "[session] state {} -> {} session={:#x} time={}",
            self.state,
            state,
            owned.0,
            time
        );
        self.state = state;

        match state {
            SessionState::Ready => {
                runtime.begin_session()?;
                self.running = true;
            }
            SessionState::Stopping => {
                self.running = false;
                runtime.end_session()?;
            }
            SessionState::Exiting => {
                // user closed the session; do not come back
                outcome.exit_render_loop = true;
                outcome.request_restart = false;
            }
            SessionState::LossPending => {
                outcome.exit_render_loop = true;
                outcome.request_restart = true;
            }
            _ => {}
        }

        Ok(())
    }
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vr::XrError;
    use std::collections::VecDeque;

    const OWNED: SessionHandle = SessionHandle(0x51);

    #[derive(Default)]
    struct ScriptedEvents {
        events: VecDeque<LifecycleEvent>,
        begins: u32,
        ends: u32,
        fail_begin: bool,
    }

    impl ScriptedEvents {
        fn with(events: Vec<LifecycleEvent>) -> Self {
            Self {
                events: events.into(),
                ..Self::default()
            }
        }
    }

    impl EventQueue for ScriptedEvents {
        fn poll_event(&mut self) -> XrResult<Option<LifecycleEvent>> {
            Ok(self.events.pop_front())
        }
    }

    impl SessionControl for ScriptedEvents {
        fn session_handle(&self) -> SessionHandle {
            OWNED
        }

        fn begin_session(&mut self) -> XrResult<()> {
            if self.fail_begin {
                return Err(XrError::runtime("xrBeginSession", -25));
            }
            self.begins += 1;
            Ok(())
        }

        fn end_session(&mut self) -> XrResult<()> {
            self.ends += 1;
            Ok(())
        }

        fn request_exit_session(&mut self) -> XrResult<()> {
            Ok(())
        }
    }

    fn changed(state: SessionState) -> LifecycleEvent {
        LifecycleEvent::SessionStateChanged {
            session: OWNED,
            state,
            time: DisplayTime(0),
        }
    }

    #[test]
    fn ready_begins_and_stopping_ends_the_session() {
        let mut machine = SessionStateMachine::new();
        let mut runtime = ScriptedEvents::with(vec![
            changed(SessionState::Idle),
            changed(SessionState::Ready),
            changed(SessionState::Synchronized),
        ]);

        let outcome = machine.poll_events(&mut runtime).expect("poll");
        assert_eq!(outcome, PollOutcome::default());
        assert!(machine.is_running());
        assert_eq!(machine.state(), SessionState::Synchronized);
        assert!(machine.state().accepts_frames());
        assert_eq!(runtime.begins, 1);

        runtime.events.push_back(changed(SessionState::Stopping));
        machine.poll_events(&mut runtime).expect("poll");
        assert!(!machine.is_running());
        assert!(!machine.state().accepts_frames());
        assert_eq!(runtime.ends, 1);
    }

    #[test]
    fn exiting_requests_exit_without_restart() {
        let mut machine = SessionStateMachine::new();
        let mut runtime = ScriptedEvents::with(vec![changed(SessionState::Exiting)]);
        let outcome = machine.poll_events(&mut runtime).expect("poll");
        assert!(outcome.exit_render_loop);
        assert!(!outcome.request_restart);
        assert_eq!(machine.state(), SessionState::Exiting);
    }

    #[test]
    fn loss_pending_requests_restart() {
        let mut machine = SessionStateMachine::new();
        let mut runtime = ScriptedEvents::with(vec![changed(SessionState::LossPending)]);
        let outcome = machine.poll_events(&mut runtime).expect("poll");
        assert!(outcome.exit_render_loop);
        assert!(outcome.request_restart);
        assert_eq!(machine.state(), SessionState::LossPending);
    }

    #[test]
    fn instance_loss_stops_draining_and_keeps_state() {
        let mut machine = SessionStateMachine::new();
        let mut runtime = ScriptedEvents::with(vec![
            changed(SessionState::Idle),
            LifecycleEvent::InstanceLossPending {
                loss_time: DisplayTime(10),
            },
            changed(SessionState::Ready),
        ]);

        let outcome = machine.poll_events(&mut runtime).expect("poll");
        assert!(outcome.exit_render_loop);
        assert!(outcome.request_restart);
        assert_eq!(machine.state(), SessionState::Idle);
        assert_eq!(runtime.events.len(), 1);
        assert_eq!(runtime.begins, 0);
    }

    #[test]
    fn foreign_session_events_are_ignored() {
        let mut machine = SessionStateMachine::new();
        let mut runtime = ScriptedEvents::with(vec![LifecycleEvent::SessionStateChanged {
            session: SessionHandle(0x99),
            state: SessionState::Ready,
            time: DisplayTime(0),
        }]);

        let outcome = machine.poll_events(&mut runtime).expect("poll");
        assert_eq!(outcome, PollOutcome::default());
        assert_eq!(machine.state(), SessionState::Unknown);
        assert_eq!(runtime.begins, 0);
    }

    #[test]
    fn null_session_handle_counts_as_ours() {
        let mut machine = SessionStateMachine::new();
        let mut runtime = ScriptedEvents::with(vec![LifecycleEvent::SessionStateChanged {
            session: SessionHandle::NULL,
            state: SessionState::Ready,
            time: DisplayTime(0),
        }]);
        machine.poll_events(&mut runtime).expect("poll");
        assert!(machine.is_running());
    }

    #[test]
    fn unrecognized_and_lost_events_are_not_fatal() {
        let mut machine = SessionStateMachine::new();
        let mut runtime = ScriptedEvents::with(vec![
            LifecycleEvent::Unrecognized { type_code: 1_000_123 },
            LifecycleEvent::EventsLost { count: 3 },
            LifecycleEvent::ReferenceSpaceChangePending,
            LifecycleEvent::InteractionProfileChanged { session: OWNED },
        ]);
        let outcome = machine.poll_events(&mut runtime).expect("poll");
        assert!(!outcome.exit_render_loop);
        assert!(outcome.interaction_profile_changed);
        assert!(runtime.events.is_empty());
    }

    #[test]
    fn begin_failure_propagates() {
        let mut machine = SessionStateMachine::new();
        let mut runtime = ScriptedEvents::with(vec![changed(SessionState::Ready)]);
        runtime.fail_begin = true;
        let err = machine.poll_events(&mut runtime).unwrap_err();
        assert!(matches!(
            err,
            XrError::Runtime {
                operation: "xrBeginSession",
                ..
            }
        ));
        assert!(!machine.is_running());
    }
}
