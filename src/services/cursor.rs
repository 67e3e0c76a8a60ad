//! Cursor service — ephemeral cursor position relay.
//!
//! DESIGN
//! ======
//! Cursor positions are purely ephemeral: relayed to room peers and
//! immediately forgotten. They never touch the drawing log and are not
//! acknowledged.

use crate::frame::{EV_CURSOR_MOVE, Frame};
use crate::protocol::{CursorMove, CursorMoved};
use crate::services::room::UserInfo;

/// Build the peer-facing cursor frame, stamped with the mover's identity.
#[must_use]
pub fn cursor_frame(user: &UserInfo, pos: CursorMove) -> Frame {
    let moved = CursorMoved { user_id: &user.id, x: pos.x, y: pos.y, color: &user.color, name: &user.name };
    Frame::from_payload(EV_CURSOR_MOVE, &moved)
}
