//! # Polling-Loop Frames
//!
//! Low-level reader polls observed by the controller before a full
//! protocol exchange.

use serde::{Deserialize, Serialize};

/// Frame type reported by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PollingFrameType {
    /// NFC-A poll (REQA/WUPA).
    A,
    /// NFC-B poll (REQB/WUPB).
    B,
    /// NFC-F poll (SENSF_REQ).
    F,
    /// Field turned on.
    On,
    /// Field turned off.
    Off,
    /// Vendor or reader specific frame, matched against service filters.
    Unknown,
}

/// One observed polling-loop frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingFrame {
    pub frame_type: PollingFrameType,
    /// Raw frame payload.
    #[serde(default)]
    pub data: Vec<u8>,
    /// Receiver gain reported by the controller, if any.
    #[serde(default)]
    pub gain: Option<u8>,
    /// Controller timestamp in microseconds.
    #[serde(default)]
    pub timestamp_us: u64,
    /// Set when this frame caused observe mode to be disabled.
    #[serde(default)]
    pub triggered_autotransact: bool,
}

impl PollingFrame {
    pub fn new(frame_type: PollingFrameType, data: Vec<u8>) -> Self {
        Self {
            frame_type,
            data,
            gain: None,
            timestamp_us: 0,
            triggered_autotransact: false,
        }
    }

    /// Uppercase hex of the payload, as matched by service filters.
    pub fn data_hex(&self) -> String {
        hex::encode_upper(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_hex_is_uppercase() {
        let frame = PollingFrame::new(PollingFrameType::Unknown, vec![0xab, 0x01]);
        assert_eq!(frame.data_hex(), "AB01");
    }
}
