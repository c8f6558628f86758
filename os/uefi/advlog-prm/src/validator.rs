//! Structural validation of an Advanced Logger information block.

use advlog_abi::memory::MemoryReader;
use advlog_abi::{ADVANCED_LOGGER_SIGNATURE, LoggerInfo, MemoryAddress};

/// Checks that the information block at `info` describes a log stored right
/// behind it.
///
/// The block is accepted iff, in this order:
///
/// 1. `info` is not null,
/// 2. its signature is `'ALOG'`,
/// 3. `log_buffer` points directly past the 32-byte header,
/// 4. `log_buffer <= log_current <= log_buffer + log_buffer_size`.
///
/// Fields are only read once the preceding checks hold. Any read that the
/// `memory` view cannot satisfy, and any address arithmetic that overflows,
/// rejects the block. The function has no side effects and does not log, so it
/// can run in any caller context.
#[must_use]
pub fn validate_logger_info<M: MemoryReader + ?Sized>(memory: &M, info: MemoryAddress) -> bool {
    if info.is_null() {
        return false;
    }

    match memory.read_u32_at(info, LoggerInfo::OFFSET_SIGNATURE) {
        Ok(ADVANCED_LOGGER_SIGNATURE) => {}
        _ => return false,
    }

    let Some(log_start) = info.checked_add(LoggerInfo::SIZE as u64) else {
        return false;
    };
    let Ok(log_buffer) = memory.read_u64_at(info, LoggerInfo::OFFSET_LOG_BUFFER) else {
        return false;
    };
    if log_buffer != log_start.as_u64() {
        return false;
    }

    let Ok(log_buffer_size) = memory.read_u32_at(info, LoggerInfo::OFFSET_LOG_BUFFER_SIZE) else {
        return false;
    };
    let Ok(log_current) = memory.read_u64_at(info, LoggerInfo::OFFSET_LOG_CURRENT) else {
        return false;
    };
    let Some(log_end) = log_start.checked_add(u64::from(log_buffer_size)) else {
        return false;
    };

    (log_buffer..=log_end.as_u64()).contains(&log_current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use advlog_abi::memory::SliceMemory;

    const AT: MemoryAddress = MemoryAddress::new(0x7E00_0000);
    const CAPACITY: u32 = 0x100;

    fn image(info: &LoggerInfo) -> Vec<u8> {
        let mut bytes = info.to_le_bytes().to_vec();
        bytes.resize(LoggerInfo::SIZE + CAPACITY as usize, 0);
        bytes
    }

    fn well_formed(used: u32) -> LoggerInfo {
        LoggerInfo::adjacent_to(AT, CAPACITY, used).unwrap()
    }

    fn check(info: &LoggerInfo) -> bool {
        let bytes = image(info);
        validate_logger_info(&SliceMemory::new(AT, &bytes), AT)
    }

    #[test]
    fn null_is_invalid() {
        let bytes = image(&well_formed(0));
        let memory = SliceMemory::new(AT, &bytes);
        assert!(!validate_logger_info(&memory, MemoryAddress::NULL));
    }

    #[test]
    fn well_formed_block_is_valid() {
        assert!(check(&well_formed(0)));
        assert!(check(&well_formed(0x42)));
    }

    #[test]
    fn any_signature_mutation_is_invalid() {
        for byte in 0..4 {
            for bit in 0..8 {
                let mut info = well_formed(0x10);
                info.signature ^= 1 << (byte * 8 + bit);
                assert!(!check(&info), "flipped bit {bit} of byte {byte}");
            }
        }
        let mut info = well_formed(0x10);
        info.signature = 0;
        assert!(!check(&info));
    }

    #[test]
    fn log_buffer_must_follow_the_header() {
        let expected = AT.as_u64() + LoggerInfo::SIZE as u64;
        for log_buffer in [0, expected - 8, expected - 1, expected + 1, expected + 8, u64::MAX] {
            let mut info = well_formed(0);
            info.log_buffer = log_buffer;
            info.log_current = log_buffer;
            assert!(!check(&info), "log_buffer = {log_buffer:#x}");
        }
    }

    #[test]
    fn cursor_must_stay_within_the_log() {
        let start = AT.as_u64() + LoggerInfo::SIZE as u64;
        let end = start + u64::from(CAPACITY);

        for cursor in [start, start + 1, start + u64::from(CAPACITY / 2), end - 1, end] {
            let mut info = well_formed(0);
            info.log_current = cursor;
            assert!(check(&info), "cursor {cursor:#x} should be accepted");
        }

        for cursor in [0, start - 1, end + 1, u64::MAX] {
            let mut info = well_formed(0);
            info.log_current = cursor;
            assert!(!check(&info), "cursor {cursor:#x} should be rejected");
        }
    }

    #[test]
    fn empty_log_only_accepts_a_cursor_at_the_start() {
        let mut info = LoggerInfo::adjacent_to(AT, 0, 0).unwrap();
        assert!(check(&info));
        info.log_current += 1;
        assert!(!check(&info));
    }

    #[test]
    fn signature_is_checked_before_any_other_field() {
        // Only the signature is mapped; a wrong signature must not need more.
        let mut info = well_formed(0);
        info.signature = u32::from_le_bytes(*b"GOLA");
        let header = info.to_le_bytes();
        let memory = SliceMemory::new(AT, &header[..4]);
        assert!(!validate_logger_info(&memory, AT));

        // With the right signature the truncated window is reported as invalid.
        let header = well_formed(0).to_le_bytes();
        let memory = SliceMemory::new(AT, &header[..4]);
        assert!(!validate_logger_info(&memory, AT));
    }

    #[test]
    fn unreadable_or_overflowing_blocks_are_invalid() {
        let bytes = image(&well_formed(0));
        let memory = SliceMemory::new(AT, &bytes);

        // Outside the readable window.
        assert!(!validate_logger_info(&memory, MemoryAddress::new(0x1000)));

        // A log ending past the top of the address space.
        let top = MemoryAddress::new(u64::MAX - 0xC0);
        let mut info = well_formed(0);
        info.log_buffer = top.as_u64() + LoggerInfo::SIZE as u64;
        info.log_current = info.log_buffer;
        let header = info.to_le_bytes();
        let memory = SliceMemory::new(top, &header);
        assert!(!validate_logger_info(&memory, top));
    }

    #[test]
    fn validation_is_repeatable() {
        let good = image(&well_formed(0x20));
        let mut bad_info = well_formed(0x20);
        bad_info.log_buffer_size = 0;
        let bad = image(&bad_info);

        let good = SliceMemory::new(AT, &good);
        let bad = SliceMemory::new(AT, &bad);
        for _ in 0..3 {
            assert!(validate_logger_info(&good, AT));
            assert!(!validate_logger_info(&bad, AT));
        }
    }
}
