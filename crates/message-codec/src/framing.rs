//! Confluent wire framing.
//!
//! Schema-encoded payloads are laid out as:
//!
//! ```text
//! [0x00][schema id: 4 bytes big-endian][body]
//! ```
//!
//! Protobuf bodies additionally start with the message-index list that
//! locates the message type inside the `.proto` file.

use protobuf::{CodedInputStream, CodedOutputStream};

pub const MAGIC_BYTE: u8 = 0x00;
pub const HEADER_LEN: usize = 5;

/// Prefixes `body` with the magic byte and the schema id.
pub fn frame(schema_id: i32, body: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(HEADER_LEN + body.len());
    framed.push(MAGIC_BYTE);
    framed.extend_from_slice(&schema_id.to_be_bytes());
    framed.extend_from_slice(body);
    framed
}

/// Splits a framed payload into its schema id and body.
pub fn unframe(payload: &[u8]) -> Result<(i32, &[u8]), String> {
    if payload.len() < HEADER_LEN {
        return Err(format!(
            "payload of {} bytes is too short for the {HEADER_LEN}-byte schema header",
            payload.len()
        ));
    }
    if payload[0] != MAGIC_BYTE {
        return Err(format!(
            "unknown magic byte 0x{:02x}, expected 0x{MAGIC_BYTE:02x}",
            payload[0]
        ));
    }
    let id = i32::from_be_bytes([payload[1], payload[2], payload[3], payload[4]]);
    Ok((id, &payload[HEADER_LEN..]))
}

/// Writes a Confluent message-index list.
///
/// `[0]` is written as a single zero byte; anything else as a zig-zag count
/// followed by zig-zag indexes.
pub fn write_message_indexes(indexes: &[usize], out: &mut Vec<u8>) -> Result<(), String> {
    if indexes == [0] {
        out.push(0);
        return Ok(());
    }
    let mut stream = CodedOutputStream::vec(out);
    stream
        .write_sint32_no_tag(indexes.len() as i32)
        .map_err(|e| e.to_string())?;
    for index in indexes {
        stream
            .write_sint32_no_tag(*index as i32)
            .map_err(|e| e.to_string())?;
    }
    stream.flush().map_err(|e| e.to_string())
}

/// Reads a Confluent message-index list and returns it with the remaining body.
pub fn read_message_indexes(body: &[u8]) -> Result<(Vec<usize>, &[u8]), String> {
    let mut stream = CodedInputStream::from_bytes(body);
    let count = stream
        .read_sint32()
        .map_err(|e| format!("invalid message index count: {e}"))?;

    let indexes = if count == 0 {
        vec![0]
    } else {
        if count < 0 {
            return Err(format!("negative message index count {count}"));
        }
        let mut indexes = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let index = stream
                .read_sint32()
                .map_err(|e| format!("invalid message index: {e}"))?;
            if index < 0 {
                return Err(format!("negative message index {index}"));
            }
            indexes.push(index as usize);
        }
        indexes
    };

    let consumed = stream.pos() as usize;
    Ok((indexes, &body[consumed..]))
}
