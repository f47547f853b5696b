#![no_main]

use libfuzzer_sys::fuzz_target;
use inspector_protocol::Attachment;

fuzz_target!(|data: &[u8]| {
    // Envelope parsing must reject, never panic
    let _ = Attachment::from_bytes(data);
});
