//! Object identifiers polled on ZTE C300/C600 OLTs

// MIB-2 system group
pub const SYS_DESCR: &str = "1.3.6.1.2.1.1.1.0";
pub const SYS_UPTIME: &str = "1.3.6.1.2.1.1.3.0";
pub const SYS_NAME: &str = "1.3.6.1.2.1.1.5.0";

// Card table (one row per installed card)
pub const CARD_CPU_USAGE: &str = "1.3.6.1.4.1.3902.1015.2.1.1.3.1.9.1.1";
pub const CARD_TEMPERATURE: &str = "1.3.6.1.4.1.3902.1015.2.1.1.3.1.8.1.1";
pub const CARD_MEMORY_USAGE: &str = "1.3.6.1.4.1.3902.1015.2.1.1.3.1.11.1.1";
/// Megabytes
pub const CARD_MEMORY_TOTAL: &str = "1.3.6.1.4.1.3902.1015.2.1.1.3.1.19.1.1";

// PON port tables
pub const PON_ADMIN_STATUS: &str = "1.3.6.1.4.1.3902.1015.3.1.2.1.3";
pub const PON_OPER_STATUS: &str = "1.3.6.1.4.1.3902.1015.3.1.2.1.4";
/// 0.1 dBm
pub const PON_TX_POWER: &str = "1.3.6.1.4.1.3902.1015.3.1.3.1.12";
/// 0.1 dBm
pub const PON_RX_POWER: &str = "1.3.6.1.4.1.3902.1015.3.1.3.1.10";
pub const PON_ONT_COUNT: &str = "1.3.6.1.4.1.3902.1015.3.1.3.1.13";

// ONT table, rows keyed by the packed ONT index
pub const ONT_SERIAL_NUMBER: &str = "1.3.6.1.4.1.3902.1015.3.1.13.1.1";
pub const ONT_OPER_STATUS: &str = "1.3.6.1.4.1.3902.1015.3.1.13.1.3";
pub const ONT_DISTANCE: &str = "1.3.6.1.4.1.3902.1015.3.1.13.1.4";
/// 0.1 dBm
pub const ONT_RX_POWER: &str = "1.3.6.1.4.1.3902.1015.3.1.13.1.5";
/// 0.1 dBm
pub const ONT_TX_POWER: &str = "1.3.6.1.4.1.3902.1015.3.1.13.1.6";
