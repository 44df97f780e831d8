//! Protocol constants for the Sphero API v2.
//!
//! <https://sdk.sphero.com/docs/api_spec/general_api>

use uuid::Uuid;

pub const START_BYTE: u8 = 0x8D;
pub const END_BYTE: u8 = 0xD8;

pub const FLAG_IS_RESPONSE: u8 = 0x01;
pub const FLAG_REQUESTS_RESPONSE: u8 = 0x02;
pub const FLAG_REQUESTS_ONLY_ERROR_RESPONSE: u8 = 0x04;
pub const FLAG_RESETS_INACTIVITY_TIMEOUT: u8 = 0x08;

pub const DEVICE_POWER_INFO: u8 = 0x13;
pub const DEVICE_DRIVING: u8 = 0x16;
pub const DEVICE_USER_IO: u8 = 0x1A;

pub const POWER_DEEP_SLEEP: u8 = 0x00;
pub const POWER_SLEEP: u8 = 0x01;
pub const POWER_BATTERY_VOLTAGE: u8 = 0x03;
pub const POWER_WAKE: u8 = 0x0D;

pub const USER_IO_ALL_LEDS: u8 = 0x0E;

pub const DRIVING_WITH_HEADING: u8 = 0x07;

/// LED channel masks for the first two bytes of an all-LEDs payload.
pub const LED_BODY_MASK: u8 = 0x0E;
pub const LED_BACKLIGHT_MASK: u8 = 0x01;

/// Primary command channel; requests are written here and responses arrive
/// as notifications.
pub const CHAR_API_V2: Uuid = Uuid::from_u128(0x00010002_574f_4f20_5370_6865726f2121);
/// Anti-denial-of-sleep channel; holds the device awake once the keep-awake
/// token has been written.
pub const CHAR_ANTI_DOS: Uuid = Uuid::from_u128(0x00020005_574f_4f20_5370_6865726f2121);
pub const CHAR_DFU: Uuid = Uuid::from_u128(0x00020002_574f_4f20_5370_6865726f2121);
pub const CHAR_DFU2: Uuid = Uuid::from_u128(0x00020004_574f_4f20_5370_6865726f2121);

pub const REQUIRED_CHARACTERISTICS: [Uuid; 4] = [CHAR_API_V2, CHAR_ANTI_DOS, CHAR_DFU, CHAR_DFU2];

/// Fixed token the firmware requires on the anti-DOS channel to suppress its
/// own 10 second inactivity sleep.
pub const ANTI_DOS_TOKEN: &[u8] = b"usetheforce...band";
