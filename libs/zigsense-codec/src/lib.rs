//! Zigsense wire codecs
//!
//! Everything in this crate is pure: byte slices in, typed records out.
//!
//! - [`dp`]: the vendor datapoint TLV records `[id][type][len:2 BE][payload]`
//! - [`tuya`]: the cluster `0xEF00` command envelope around those records
//! - [`zcl`]: ZCL headers, attribute reports, IAS Zone and button commands

pub mod dp;
pub mod error;
mod reader;
pub mod tuya;
pub mod zcl;

pub use dp::{decode, encode, encode_all, Datapoint, DpType, DpValue};
pub use error::{DecodeError, Result};
pub use tuya::{TuyaCommand, TuyaMessage};
pub use zcl::{cluster, ZclHeader};
