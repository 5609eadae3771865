//! Server-sent event framing.

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

pub const DATA_PREFIX: &[u8] = b"data: ";
pub const FRAME_SUFFIX: &[u8] = b"\n\n";
/// Comment frame; clients ignore it but it keeps idle connections alive.
pub const HEARTBEAT_FRAME: &[u8] = b": heartbeat\n\n";
pub const DONE_FRAME: &[u8] = b"data: [DONE]\n\n";

/// Encode `payload` as `data: <json>\n\n`, reusing `buf`'s allocation.
pub fn encode_data<T: Serialize + ?Sized>(
    buf: &mut BytesMut,
    payload: &T,
) -> serde_json::Result<Bytes> {
    buf.clear();
    buf.put_slice(DATA_PREFIX);
    serde_json::to_writer((&mut *buf).writer(), payload)?;
    buf.put_slice(FRAME_SUFFIX);
    Ok(buf.split().freeze())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_frame_is_bit_exact() {
        let mut buf = BytesMut::new();
        let frame = encode_data(&mut buf, &serde_json::json!({"a": 1})).unwrap();
        assert_eq!(&frame[..], b"data: {\"a\":1}\n\n");
        let frame = encode_data(&mut buf, "x").unwrap();
        assert_eq!(&frame[..], b"data: \"x\"\n\n");
    }
}
