//! Field catalog: nickname ⇄ internal column name lookup.
//!
//! Pure, stateless tables. Unknown names map to themselves.

use std::collections::HashMap;
use std::sync::LazyLock;

/// `(nickname, internal name)` pairs for the commonly queried event fields.
const FIELD_NAMES: &[(&str, &str)] = &[
    ("ASNGeoDst", "Alert.ASNGeoDst"),
    ("ASNGeoSrc", "Alert.ASNGeoSrc"),
    ("Action", "Alert.Action"),
    ("AlertID", "Alert.AlertID"),
    ("AppID", "Alert.BIN(1)"),
    ("AvgSeverity", "Alert.AvgSeverity"),
    ("CommandID", "Alert.BIN(2)"),
    ("DSIDSigID", "Alert.DSIDSigID"),
    ("DstIP", "Alert.DstIP"),
    ("DstMac", "Alert.DstMac"),
    ("DstPort", "Alert.DstPort"),
    ("EventCount", "Alert.EventCount"),
    ("FirstTime", "Alert.FirstTime"),
    ("HostID", "Alert.BIN(4)"),
    ("IPSID", "Alert.IPSID"),
    ("IPSIDAlertID", "Alert.IPSIDAlertID"),
    ("LastTime", "Alert.LastTime"),
    ("Protocol", "Alert.Protocol"),
    ("Rule.msg", "Rule.msg"),
    ("Severity", "Alert.Severity"),
    ("SigID", "Alert.SigID"),
    ("SrcIP", "Alert.SrcIP"),
    ("SrcMac", "Alert.SrcMac"),
    ("SrcPort", "Alert.SrcPort"),
    ("UserIDDst", "Alert.BIN(6)"),
    ("UserIDSrc", "Alert.BIN(7)"),
    ("Web_Domain", "Alert.65613"),
    ("WriteTime", "Alert.WriteTime"),
    ("ZoneDst", "Alert.ZoneDst"),
    ("ZoneSrc", "Alert.ZoneSrc"),
    // Grouped query aggregates.
    ("Count", "COUNT(*)"),
    ("TotalEventCount", "SUM(Alert.EventCount)"),
];

/// Tables tried, in order, as a `<table>.<key>` prefix when a key is not found directly.
pub const FIELD_TABLES: &[&str] = &[
    "Alert",
    "Rule",
    "ADGroup",
    "Action",
    "Asset",
    "AssetGroup",
    "AssetThreat",
    "CaseMgt",
    "CaseOrg",
    "CaseStatus",
    "Class",
    "Connection",
    "DataEnrichment",
    "GeoLoc_ASNGeoDst",
    "GeoLoc_ASNGeoSrc",
    "IOC",
    "IPS",
    "IPSCheck",
    "OS",
    "Tag",
    "ThirdPartyType",
    "Threat",
    "ThreatVendor",
    "TriggeredAlarm",
    "Users",
    "Vulnerability",
    "Zone_ZoneDst",
    "Zone_ZoneSrc",
];

/// Fields every event query projects regardless of the caller's selection.
pub const MANDATORY_FIELDS: &[&str] = &["Rule.msg", "LastTime", "IPSIDAlertID"];

static NICKNAME_TO_INTERNAL: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| FIELD_NAMES.iter().copied().collect());

static INTERNAL_TO_NICKNAME: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| FIELD_NAMES.iter().map(|&(nick, name)| (name, nick)).collect());

/// Translate a nickname to its internal column name (identity if unknown).
pub fn to_internal_name(nickname: &str) -> &str {
    NICKNAME_TO_INTERNAL.get(nickname).copied().unwrap_or(nickname)
}

/// Translate an internal column name to its nickname (identity if unknown).
pub fn to_nickname(name: &str) -> &str {
    INTERNAL_TO_NICKNAME.get(name).copied().unwrap_or(name)
}

/// Find which of the present keys answers `key`: exact match, then the
/// nickname mapping, then a `<table>.<key>` scan.
pub fn resolve_key<F>(key: &str, mut contains: F) -> Option<String>
where
    F: FnMut(&str) -> bool,
{
    if contains(key) {
        return Some(key.to_string());
    }

    let internal = to_internal_name(key);
    if internal != key && contains(internal) {
        return Some(internal.to_string());
    }

    FIELD_TABLES
        .iter()
        .map(|table| format!("{table}.{key}"))
        .find(|candidate| contains(candidate))
}
