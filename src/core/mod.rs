//! Core value types shared by the engine
//!
//! This module contains:
//! - Account addresses and wallet identities
//! - The clock collaborator used for deadline checks
//! - Ether unit and remaining-time formatting
//! - Hex encoding of call data

pub mod address;
pub mod clock;
pub mod encoding;
pub mod units;

pub use address::{Address, AddressError, WalletId, ADDRESS_LEN};
pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use encoding::{format_call_data, parse_call_data};
pub use units::{
    format_ether, format_time_interval, parse_ether, UnitsError, ETHER_DECIMALS, WEI_PER_ETHER,
};
