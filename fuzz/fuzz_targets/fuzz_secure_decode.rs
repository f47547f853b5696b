#![no_main]

use inspector_protocol::core::serialization::{AllowList, DecodeLimits, SecureDecoder};
use inspector_protocol::PayloadKind;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&kind, payload)) = data.split_first() else {
        return;
    };
    let kind = PayloadKind::from_byte(kind).unwrap_or(PayloadKind::Unknown(kind));
    for allow in [AllowList::target(), AllowList::client()] {
        let _ = SecureDecoder::new(allow, DecodeLimits::default()).decode(kind, payload);
    }
});
