//! Wire encoding for the structure-save instruction
//!
//! The save packet goes straight onto the connection, not through the
//! textual command channel. The layout is fixed: 27 bytes of framing plus
//! the length-prefixed structure name, everything big-endian.

use std::time::Duration;

use crate::error::{CaptureError, Result};
use crate::net::codec::PacketEncoderExt;

use super::command::namespaced;
use super::queue::Transport;
use super::structure::StructureSaveRequest;
use super::{BlockPos, Dimensions};

/// Packet kind tag for a structure-block update
pub const SAVE_PACKET_ID: u8 = 0x31;
/// Packet size before the name bytes
pub const SAVE_PACKET_BASE_LEN: usize = 27;
/// Time given to the server to process the save before any further traffic
pub const SAVE_SETTLE_DELAY_MS: u64 = 1000;

const ACTION_SAVE: u8 = 0x01;
const ACTION_DATA: u8 = 0x00;
const INTEGRITY: f32 = 1.0;
const FLAGS_NO_SHOW_AIR: u8 = 0x00;
const FLAGS_SHOW_BOUNDING_BOX: u8 = 0x04;
const NAME_MAX_BYTES: usize = u8::MAX as usize;

/// Pack a block position into one 64-bit integer: 26 bits of x, 26 of z,
/// 12 of y. Widening to i64 first makes the masks a true two's-complement
/// low-bits extraction for negative coordinates.
pub fn packed_position(pos: BlockPos) -> i64 {
    ((pos.x as i64 & 0x3FF_FFFF) << 38) | ((pos.z as i64 & 0x3FF_FFFF) << 12) | (pos.y as i64 & 0xFFF)
}

/// Serialize a save request into the exact packet byte layout
pub fn encode_save_instruction(request: &StructureSaveRequest) -> Result<Vec<u8>> {
    let Dimensions { width, height, depth } = request.dimensions;
    if width < 1 || height < 1 || depth < 1 {
        return Err(CaptureError::InvalidSaveRequest("dimensions must be positive"));
    }
    if request.name.is_empty() {
        return Err(CaptureError::InvalidSaveRequest("structure name must not be empty"));
    }

    let name = namespaced(&request.name);
    if name.len() > NAME_MAX_BYTES {
        return Err(CaptureError::NameTooLong {
            len: name.len(),
            max: NAME_MAX_BYTES,
        });
    }

    let mut buf = Vec::with_capacity(SAVE_PACKET_BASE_LEN + name.len());
    buf.write_unsigned_byte(SAVE_PACKET_ID);
    buf.write_long(packed_position(request.anchor_pos));
    buf.write_unsigned_byte(ACTION_SAVE);
    buf.write_unsigned_byte(ACTION_DATA);

    buf.write_unsigned_byte(name.len() as u8);
    buf.write_bytes(name.as_bytes());

    buf.write_unsigned_byte(request.offset.x as u8);
    buf.write_unsigned_byte(request.offset.y as u8);
    buf.write_unsigned_byte(request.offset.z as u8);

    buf.write_unsigned_byte(width as u8);
    buf.write_unsigned_byte(height as u8);
    buf.write_unsigned_byte(depth as u8);

    buf.write_bytes(&[0x00, 0x00, 0x00]);
    buf.write_float(INTEGRITY);
    buf.write_unsigned_byte(FLAGS_NO_SHOW_AIR);
    buf.write_unsigned_byte(FLAGS_SHOW_BOUNDING_BOX);

    Ok(buf)
}

/// Encode and write the save packet, then give the server time to act on it
pub async fn dispatch_save<T: Transport>(
    transport: &T,
    request: &StructureSaveRequest,
) -> Result<()> {
    let packet = encode_save_instruction(request)?;
    tracing::info!(name = %request.name, bytes = packet.len(), "sending structure save packet");
    transport.send_raw(&packet).await?;
    tokio::time::sleep(Duration::from_millis(SAVE_SETTLE_DELAY_MS)).await;
    Ok(())
}
