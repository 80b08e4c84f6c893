#![no_main]

use libfuzzer_sys::fuzz_target;
use timestat::device::{FRAME_MAGIC, MIN_STOPPED_FRAME_LEN, TimerState, crc16, decode_frame};

// Fuzz frame validation with arbitrary bytes
//
// Decoding never panics, and anything accepted carries a valid magic byte,
// a matching checksum and a time exactly when stopped.
fuzz_target!(|data: &[u8]| {
    let Ok(event) = decode_frame(data) else {
        return;
    };

    assert_eq!(data[0], FRAME_MAGIC);
    let crc_at = data.len() - 2;
    assert_eq!(
        crc16(&data[2..crc_at]),
        u16::from_le_bytes([data[crc_at], data[crc_at + 1]])
    );
    assert_eq!(event.recorded_time.is_some(), event.state == TimerState::Stopped);
    if event.state == TimerState::Stopped {
        assert!(data.len() >= MIN_STOPPED_FRAME_LEN);
    }
});
