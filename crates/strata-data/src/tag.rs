//! Tag bytes identifying each encoded value type

/// Nil value
pub const NIL: u8 = 0x00;
/// Signed 64-bit integer, VLC encoded
pub const LONG: u8 = 0x09;
/// Hash reference to a non-embedded cell
pub const REF: u8 = 0x20;
/// Byte string
pub const BLOB: u8 = 0x31;
/// Persistent vector node
pub const VECTOR: u8 = 0x80;
/// Blob-keyed radix map node
pub const BLOBMAP: u8 = 0x82;
/// Boolean false
pub const FALSE: u8 = 0xB0;
/// Boolean true
pub const TRUE: u8 = 0xB1;

/// First tag reserved for record types
pub const RECORD_MIN: u8 = 0xA0;
/// Last tag reserved for record types
pub const RECORD_MAX: u8 = 0xAF;

/// Global ledger state
pub const STATE: u8 = 0xA0;
/// Account status record
pub const ACCOUNT_STATUS: u8 = 0xA1;
/// Peer status record
pub const PEER_STATUS: u8 = 0xA2;
/// Block record
pub const BLOCK: u8 = 0xA3;
/// Transaction record
pub const TRANSACTION: u8 = 0xA4;
/// Signed transaction record
pub const SIGNED: u8 = 0xA5;
/// Transaction result record
pub const RESULT: u8 = 0xA6;
/// Block result record
pub const BLOCK_RESULT: u8 = 0xA7;
/// Transaction action record (transfer, stake, schedule, ...)
pub const ACTION: u8 = 0xA8;

/// True if `tag` falls in the record range
pub fn is_record(tag: u8) -> bool {
    (RECORD_MIN..=RECORD_MAX).contains(&tag)
}
