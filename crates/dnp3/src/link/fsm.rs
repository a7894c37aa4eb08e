//! RESET/UNRESET primary/secondary state machine.
//!
//! The original stack runs two FSM implementations, one per role; here a
//! single [`LinkFsm`] is parameterized by [`Role`] instead, since a master
//! and an outstation endpoint differ only in which side of the
//! `PRM`/`FCB` exchange they occupy.

use crate::link::frame::{Control, Frame, FunctionCode, LinkError};

/// Which side of the primary/secondary exchange this endpoint occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Sends `RESET_LINK_STATES`/`CONFIRMED_USER_DATA`/`REQUEST_LINK_STATUS`.
    Primary,
    /// Replies with `ACK`/`NACK`/`LINK_STATUS` to primary traffic.
    Secondary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResetState {
    Unreset,
    Reset,
}

/// Listener events the FSM raises that don't map to delivered user data;
/// mirrors the [`dnp3_transport::LinkListener`] callback names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkListenerEvent {
    UnknownDestination(u16),
    KeepAliveInitiated,
    KeepAliveSuccess,
    KeepAliveFailure,
}

/// Outcome of feeding one frame to the secondary-side FSM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkAction {
    /// Send this frame back to the primary; no user data delivered.
    Reply(Frame),
    /// Deliver this user data upward; no reply needed (unconfirmed data).
    Accept(Vec<u8>),
    /// Deliver this user data upward and reply (confirmed data ACK).
    AcceptAndReply(Vec<u8>, Frame),
    /// Frame addressed elsewhere; counted, not delivered.
    UnknownDestination(u16),
    /// Frame addressed here but otherwise not actionable (e.g. an ACK
    /// arriving at a secondary endpoint).
    Discard,
}

/// Outcome of the primary side processing a secondary's reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryOutcome {
    /// The secondary ACKed: the in-flight FCB toggles for the next send.
    Accepted,
    /// The secondary NACKed: resend with the same FCB.
    Rejected,
    /// `LINK_STATUS` received (response to `REQUEST_LINK_STATUS`).
    LinkStatus,
    /// `NOT_SUPPORTED` received.
    NotSupported,
    /// A frame not relevant to the outstanding request (discarded).
    Unrelated,
}

/// Per-endpoint link-layer state machine.
pub struct LinkFsm {
    role: Role,
    local_addr: u16,
    reset_state: ResetState,
    /// Secondary side: the FCB value the *next* confirmed frame must carry.
    next_fcb: bool,
    /// Primary side: the FCB the endpoint will use on the next confirmed send.
    send_fcb: bool,
    /// Primary side: whether a `RESET_LINK_STATES` handshake is still owed
    /// before the first `CONFIRMED_USER_DATA` frame can be sent.
    needs_reset: bool,
}

impl LinkFsm {
    pub fn new(role: Role, local_addr: u16) -> Self {
        Self {
            role,
            local_addr,
            reset_state: ResetState::Unreset,
            next_fcb: true,
            send_fcb: true,
            needs_reset: true,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_reset(&self) -> bool {
        self.reset_state == ResetState::Reset
    }

    /// Secondary-side frame processing. Only meaningful for
    /// [`Role::Secondary`] endpoints, or a primary loopback test harness.
    pub fn on_frame(&mut self, frame: &Frame) -> LinkAction {
        if frame.dest != self.local_addr {
            return LinkAction::UnknownDestination(frame.dest);
        }
        if !frame.control.prm {
            // A reply frame arriving on the secondary side: nothing to do.
            return LinkAction::Discard;
        }

        match frame.control.function {
            FunctionCode::ResetLinkStates => {
                self.reset_state = ResetState::Reset;
                self.next_fcb = true;
                LinkAction::Reply(self.ack(frame))
            }
            FunctionCode::TestLinkStates => LinkAction::Reply(self.ack(frame)),
            FunctionCode::ConfirmedUserData => {
                if self.reset_state == ResetState::Reset && frame.control.fcb == self.next_fcb {
                    self.next_fcb = !self.next_fcb;
                    LinkAction::AcceptAndReply(frame.data.clone(), self.ack(frame))
                } else {
                    log::warn!(
                        "nacking confirmed user data from {}: reset={:?} fcb={}",
                        frame.src,
                        self.reset_state,
                        frame.control.fcb
                    );
                    LinkAction::Reply(self.nack(frame))
                }
            }
            FunctionCode::UnconfirmedUserData => LinkAction::Accept(frame.data.clone()),
            FunctionCode::RequestLinkStatus => LinkAction::Reply(self.link_status(frame)),
            _ => LinkAction::Discard,
        }
    }

    fn ack(&self, request: &Frame) -> Frame {
        Frame {
            control: Control {
                dir: true,
                prm: false,
                fcb: false,
                fcv: false,
                function: FunctionCode::Ack,
            },
            dest: request.src,
            src: self.local_addr,
            data: Vec::new(),
        }
    }

    fn nack(&self, request: &Frame) -> Frame {
        Frame {
            control: Control {
                dir: true,
                prm: false,
                fcb: false,
                fcv: false,
                function: FunctionCode::Nack,
            },
            dest: request.src,
            src: self.local_addr,
            data: Vec::new(),
        }
    }

    fn link_status(&self, request: &Frame) -> Frame {
        Frame {
            control: Control {
                dir: true,
                prm: false,
                fcb: false,
                fcv: false,
                function: FunctionCode::LinkStatus,
            },
            dest: request.src,
            src: self.local_addr,
            data: Vec::new(),
        }
    }

    /// Builds the next `RESET_LINK_STATES` frame a primary sends before its
    /// first confirmed-data frame.
    pub fn build_reset(&self, remote_addr: u16) -> Frame {
        Frame {
            control: Control {
                dir: true,
                prm: true,
                fcb: false,
                fcv: false,
                function: FunctionCode::ResetLinkStates,
            },
            dest: remote_addr,
            src: self.local_addr,
            data: Vec::new(),
        }
    }

    /// Builds a `CONFIRMED_USER_DATA` frame carrying `data`, tagged with
    /// the FCB the primary currently owes.
    pub fn build_confirmed_data(&self, remote_addr: u16, data: Vec<u8>) -> Result<Frame, LinkError> {
        if self.needs_reset {
            return Err(LinkError::BadFCB);
        }
        Ok(Frame {
            control: Control {
                dir: true,
                prm: true,
                fcb: self.send_fcb,
                fcv: true,
                function: FunctionCode::ConfirmedUserData,
            },
            dest: remote_addr,
            src: self.local_addr,
            data,
        })
    }

    pub fn build_unconfirmed_data(&self, remote_addr: u16, data: Vec<u8>) -> Frame {
        Frame {
            control: Control {
                dir: true,
                prm: true,
                fcb: false,
                fcv: false,
                function: FunctionCode::UnconfirmedUserData,
            },
            dest: remote_addr,
            src: self.local_addr,
            data,
        }
    }

    pub fn build_keep_alive(&self, remote_addr: u16) -> Frame {
        Frame {
            control: Control {
                dir: true,
                prm: true,
                fcb: false,
                fcv: false,
                function: FunctionCode::RequestLinkStatus,
            },
            dest: remote_addr,
            src: self.local_addr,
            data: Vec::new(),
        }
    }

    /// Primary-side processing of a secondary's reply to a prior send.
    pub fn on_primary_reply(&mut self, frame: &Frame) -> PrimaryOutcome {
        if frame.control.prm {
            return PrimaryOutcome::Unrelated;
        }
        match frame.control.function {
            FunctionCode::Ack => {
                self.needs_reset = false;
                self.send_fcb = !self.send_fcb;
                PrimaryOutcome::Accepted
            }
            FunctionCode::Nack => {
                log::debug!("secondary {} nacked, will resend with the same fcb", frame.src);
                PrimaryOutcome::Rejected
            }
            FunctionCode::LinkStatus => PrimaryOutcome::LinkStatus,
            FunctionCode::NotSupported => {
                log::warn!("secondary {} does not support the last request", frame.src);
                PrimaryOutcome::NotSupported
            }
            _ => PrimaryOutcome::Unrelated,
        }
    }

    /// Marks the reset handshake as complete after sending `RESET_LINK_STATES`
    /// and receiving its ACK (`on_primary_reply` already clears `needs_reset`,
    /// this exists for callers that model the handshake explicitly).
    pub fn confirm_reset(&mut self) {
        self.needs_reset = false;
        self.send_fcb = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primary_frame(local: u16, remote: u16, function: FunctionCode, fcb: bool) -> Frame {
        Frame {
            control: Control {
                dir: true,
                prm: true,
                fcb,
                fcv: function == FunctionCode::ConfirmedUserData,
                function,
            },
            dest: local,
            src: remote,
            data: vec![1, 2, 3],
        }
    }

    #[test]
    fn reset_link_states_acks_and_sets_next_fcb() {
        let mut fsm = LinkFsm::new(Role::Secondary, 1);
        let action = fsm.on_frame(&primary_frame(1, 10, FunctionCode::ResetLinkStates, false));
        assert!(matches!(action, LinkAction::Reply(_)));
        assert!(fsm.is_reset());
    }

    #[test]
    fn confirmed_data_matching_fcb_is_accepted() {
        let mut fsm = LinkFsm::new(Role::Secondary, 1);
        fsm.on_frame(&primary_frame(1, 10, FunctionCode::ResetLinkStates, false));
        let action = fsm.on_frame(&primary_frame(1, 10, FunctionCode::ConfirmedUserData, true));
        match action {
            LinkAction::AcceptAndReply(data, reply) => {
                assert_eq!(data, vec![1, 2, 3]);
                assert_eq!(reply.control.function, FunctionCode::Ack);
            }
            other => panic!("expected AcceptAndReply, got {other:?}"),
        }
        assert!(!fsm.next_fcb);
    }

    #[test]
    fn confirmed_data_mismatched_fcb_is_nacked() {
        let mut fsm = LinkFsm::new(Role::Secondary, 1);
        fsm.on_frame(&primary_frame(1, 10, FunctionCode::ResetLinkStates, false));
        // FCB should be true first; send false instead.
        let action = fsm.on_frame(&primary_frame(1, 10, FunctionCode::ConfirmedUserData, false));
        match action {
            LinkAction::Reply(reply) => assert_eq!(reply.control.function, FunctionCode::Nack),
            other => panic!("expected Reply(NACK), got {other:?}"),
        }
    }

    #[test]
    fn unconfirmed_data_is_accepted_without_reset() {
        let mut fsm = LinkFsm::new(Role::Secondary, 1);
        let action = fsm.on_frame(&primary_frame(1, 10, FunctionCode::UnconfirmedUserData, false));
        assert!(matches!(action, LinkAction::Accept(_)));
    }

    #[test]
    fn unknown_destination_is_reported() {
        let mut fsm = LinkFsm::new(Role::Secondary, 1);
        let action = fsm.on_frame(&primary_frame(2, 10, FunctionCode::UnconfirmedUserData, false));
        assert_eq!(action, LinkAction::UnknownDestination(2));
    }

    #[test]
    fn primary_side_toggles_fcb_on_ack() {
        let mut fsm = LinkFsm::new(Role::Primary, 10);
        let ack = Frame {
            control: Control {
                dir: true,
                prm: false,
                fcb: false,
                fcv: false,
                function: FunctionCode::Ack,
            },
            dest: 10,
            src: 1,
            data: vec![],
        };
        assert!(fsm.build_confirmed_data(1, vec![]).is_err());
        fsm.confirm_reset();
        let before = fsm.send_fcb;
        assert_eq!(fsm.on_primary_reply(&ack), PrimaryOutcome::Accepted);
        assert_ne!(fsm.send_fcb, before);
    }
}
