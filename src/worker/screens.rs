//! Screen regions and texts the trade flow looks for, in 1920x1080 capture
//! coordinates.

use crate::script::Region;

/// Chip trade item list header.
pub const CHIP_SORT_HEADER: Region = Region::new(1054, 205, 162, 48);
pub const CHIP_SORT_TEXT: &str = "Sort : ID";

/// First row of the program trade list; read without inversion.
pub const PART_FIRST_ROW: Region = Region::new(1080, 270, 200, 60);
pub const PART_FIRST_TEXT: &str = "SuprArmr";

pub const ROOM_CODE_TEXT: Region = Region::new(1242, 89, 365, 54);
/// Wider crop published to the requester.
pub const ROOM_CODE_IMAGE: Region = Region::new(1242, 89, 400, 80);
pub const ROOM_CODE_PREFIX: &str = "Room Code: ";

pub const COMMUNICATION_ERROR: Region = Region::new(660, 440, 620, 50);
pub const COMMUNICATION_ERROR_TEXT: &str = "A communication error occurred.";

pub const LOBBY_COUNT: Region = Region::new(785, 123, 160, 60);
pub const LOBBY_JOINED_TEXT: &str = "1/15";

pub const TRADE_COMPLETE: Region = Region::new(815, 440, 310, 55);
pub const TRADE_COMPLETE_TEXT: &str = "Trade complete!";

pub const MAIN_MENU: Region = Region::new(55, 65, 225, 50);
pub const MAIN_MENU_TEXT: &str = "NETWORK";

pub const PAIRING_PROMPT: Region = Region::new(1000, 1000, 460, 460);
pub const PAIRING_PROMPT_TEXT: &str = "Controller Not Connecting";
