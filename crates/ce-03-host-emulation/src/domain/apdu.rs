//! Command APDU parsing and canned replies

use tracing::debug;

/// SELECT instruction byte.
pub const INS_SELECT: u8 = 0xA4;
/// P1 value for select-by-AID.
pub const P1_SELECT_BY_AID: u8 = 0x04;
/// CLA, INS, P1, P2, Lc.
pub const SELECT_HEADER_LEN: usize = 5;
/// Shortest AID accepted in a SELECT, in bytes.
pub const MIN_AID_LEN: usize = 5;

/// "File or application not found".
pub const AID_NOT_FOUND: [u8; 2] = [0x6A, 0x82];
/// "No precise diagnosis".
pub const UNKNOWN_ERROR: [u8; 2] = [0x6F, 0x00];

/// Platform discovery AID answered without a lookup.
pub const PLATFORM_HCE_AID: &str = "A000000476416E64726F6964484345";
/// Canned reply to [`PLATFORM_HCE_AID`].
pub const PLATFORM_HCE_RESPONSE: [u8; 6] = [0x14, 0x81, 0x00, 0x00, 0x90, 0x00];

/// NDEF tag application, mapping version 1.
pub const NDEF_V1_AID: &str = "D2760000850100";
/// NDEF tag application, mapping version 2.
pub const NDEF_V2_AID: &str = "D2760000850101";

/// AID of a SELECT-by-AID command, as uppercase hex.
///
/// Returns `None` for anything else, including a SELECT whose Lc runs past
/// the end of the buffer.
pub fn find_select_aid(apdu: &[u8]) -> Option<String> {
    if apdu.len() < SELECT_HEADER_LEN + MIN_AID_LEN {
        debug!(len = apdu.len(), "Data size too small for SELECT APDU");
        return None;
    }
    if apdu[0] != 0x00 || apdu[1] != INS_SELECT || apdu[2] != P1_SELECT_BY_AID {
        return None;
    }
    if apdu[3] != 0x00 {
        debug!(p2 = apdu[3], "Selecting next, last or previous occurrence is not supported");
    }
    let aid_len = apdu[4] as usize;
    let aid = apdu.get(SELECT_HEADER_LEN..SELECT_HEADER_LEN + aid_len)?;
    Some(hex::encode_upper(aid))
}

/// NDEF tag AIDs get "not found" without an unroutable report.
pub fn is_ndef_aid(aid: &str) -> bool {
    aid == NDEF_V1_AID || aid == NDEF_V2_AID
}

/// Build a SELECT-by-AID command for `aid_hex`.
///
/// Used by adapters and tests that need to inject SELECTs.
pub fn select_apdu(aid_hex: &str) -> Option<Vec<u8>> {
    let aid = hex::decode(aid_hex).ok()?;
    let lc = u8::try_from(aid.len()).ok()?;
    let mut apdu = vec![0x00, INS_SELECT, P1_SELECT_BY_AID, 0x00, lc];
    apdu.extend_from_slice(&aid);
    apdu.push(0x00);
    Some(apdu)
}
