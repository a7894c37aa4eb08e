//! Link layer: frame codec, CRC framing, and the RESET/UNRESET
//! primary/secondary state machine.

mod fsm;
mod frame;

pub use fsm::{LinkAction, LinkFsm, LinkListenerEvent, PrimaryOutcome, Role};
pub use frame::{Control, Frame, FunctionCode, LinkError, HEADER_LEN, MAX_FRAME_LEN};
