//! Version snapshot naming.
//!
//! Snapshots are named `<key>_<yyyyMMddHHmmss>.<ext>`. The timestamp has
//! second granularity, so two snapshots of one key taken within the same
//! second share a name and the later one replaces the earlier.
//!
//! Parsing is strict: a file belongs to `key` only if its name is exactly
//! `key`, an underscore, fourteen digits forming a valid timestamp, and the
//! extension. A bare prefix test would let `delete_versions("a")` remove the
//! snapshots of `"ab"` or `"a_b"`.

use chrono::NaiveDateTime;

/// Directory (under the base path) holding snapshots.
pub const VERSIONS_DIR: &str = "versions";

/// `chrono` format of the snapshot timestamp.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

const TIMESTAMP_LEN: usize = 14;

/// Builds the snapshot file name for `key` taken at `at`.
#[must_use]
pub fn version_file_name(key: &str, at: NaiveDateTime, extension: &str) -> String {
    format!("{key}_{}.{extension}", at.format(TIMESTAMP_FORMAT))
}

/// Splits a snapshot file name into its key and timestamp.
///
/// Returns `None` for names that are not snapshots with the given extension.
#[must_use]
pub fn parse_version_file_name<'a>(
    name: &'a str,
    extension: &str,
) -> Option<(&'a str, NaiveDateTime)> {
    let stem = name.strip_suffix(extension)?.strip_suffix('.')?;
    let split = stem.len().checked_sub(TIMESTAMP_LEN)?;
    if !stem.is_char_boundary(split) {
        return None;
    }
    let (head, stamp) = stem.split_at(split);
    let key = head.strip_suffix('_')?;
    if key.is_empty() || !stamp.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let at = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()?;
    Some((key, at))
}

/// Whether `name` is a snapshot of exactly `key`.
#[must_use]
pub fn is_version_of(name: &str, key: &str, extension: &str) -> bool {
    parse_version_file_name(name, extension).is_some_and(|(owner, _)| owner == key)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use proptest::prelude::*;

    use super::*;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn formats_second_granularity_timestamp() {
        assert_eq!(
            version_file_name("player", at(7, 5, 3), "json"),
            "player_20240309070503.json"
        );
    }

    #[test]
    fn parses_back_key_and_timestamp() {
        let (key, ts) = parse_version_file_name("player_20240309070503.json", "json").unwrap();
        assert_eq!(key, "player");
        assert_eq!(ts, at(7, 5, 3));
    }

    #[test]
    fn keys_may_contain_underscores_and_digits() {
        let name = version_file_name("a_20240101000000", at(1, 2, 3), "json");
        let (key, _) = parse_version_file_name(&name, "json").unwrap();
        assert_eq!(key, "a_20240101000000");
        assert!(!is_version_of(&name, "a", "json"));
    }

    #[test]
    fn rejects_non_snapshot_names() {
        for name in [
            "player.json",
            "player_2024.json",
            "player_20241309070503.json",
            "player_2024030907050x.json",
            "_20240309070503.json",
            "player_20240309070503.msgpack",
            "player_20240309070503",
            "abfile_.json",
        ] {
            assert!(parse_version_file_name(name, "json").is_none(), "{name}");
        }
    }

    #[test]
    fn sibling_prefixes_do_not_match() {
        assert!(is_version_of("a_20240309070503.json", "a", "json"));
        assert!(!is_version_of("ab_20240309070503.json", "a", "json"));
        assert!(!is_version_of("abfile_20240309070503.json", "a", "json"));
        assert!(!is_version_of("a_b_20240309070503.json", "a", "json"));
    }

    #[test]
    fn multibyte_names_do_not_panic() {
        assert!(parse_version_file_name("ключ_é.json", "json").is_none());
        assert!(is_version_of("ключ_20240309070503.json", "ключ", "json"));
    }

    proptest! {
        #[test]
        fn snapshot_names_match_only_their_own_key(
            key in "[a-z0-9_]{1,12}",
            other in "[a-z0-9_]{1,12}",
            secs in 0u32..86_400,
        ) {
            let ts = at(secs / 3600, (secs / 60) % 60, secs % 60);
            let name = version_file_name(&other, ts, "json");
            prop_assert!(is_version_of(&name, &other, "json"));
            prop_assert_eq!(is_version_of(&name, &key, "json"), key == other);
        }
    }
}
