//! Fuzz target: `decode_frame` / `decode_ack`
//!
//! Drives arbitrary byte sequences into both decoders and asserts that
//! they never panic, never return a payload outside the input, and that
//! every accepted frame without reserved selector bits re-encodes to the
//! same bytes.
//!
//! cargo fuzz run fuzz_frame_decoder

#![no_main]

use handset::link::codec::{decode_ack, decode_frame, encode_frame, MAX_PAYLOAD_LEN};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(view) = decode_frame(data) {
        assert!(view.payload.len() <= MAX_PAYLOAD_LEN, "payload exceeds frame limit");

        if data[2] & 0x70 != 0 {
            return;
        }
        let frame = encode_frame(view.selector, view.packet_id, view.payload)
            .expect("accepted frame must re-encode");
        assert_eq!(frame.as_bytes(), &data[..frame.len()]);
    }

    let _ = decode_ack(data);
});
