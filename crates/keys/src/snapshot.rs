//! Precomputed public key set document.
//!
//! The store rebuilds the snapshot inside its write critical section on every
//! mutation, so the document always matches the records exactly. Rendering
//! splices each record's cached JWK bytes rather than re-encoding keys.

use bytes::{BufMut, Bytes, BytesMut};

use crate::record::KeyRecord;

const PREFIX: &[u8] = br#"{"keys":["#;
const SUFFIX: &[u8] = b"]}";

/// Renders `{"keys":[...]}` from the records in iteration order.
pub(crate) fn render<'a>(records: impl IntoIterator<Item = &'a KeyRecord>) -> Bytes {
    let mut buf = BytesMut::with_capacity(256);
    buf.put_slice(PREFIX);
    for (i, record) in records.into_iter().enumerate() {
        if i > 0 {
            buf.put_u8(b',');
        }
        buf.put_slice(&record.public_jwk_json());
    }
    buf.put_slice(SUFFIX);
    buf.freeze()
}
