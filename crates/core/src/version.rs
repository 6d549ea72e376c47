//! Version string normalisation.
//!
//! Lockfiles and package manager output carry versions in several dialects:
//! declared ranges (`^1.2.0`, `>=1.0.0 <2.0.0`), pnpm peer suffixes
//! (`5.2.2(react@19.1.1)`), npm aliases (`npm:string-width@4.2.3`) and local
//! protocols (`link:../shared`). These helpers reduce them to a single clean
//! semantic version where possible.

/// Protocol prefixes that point at local packages instead of a registry.
pub const LOCAL_PROTOCOLS: &[&str] = &["workspace:", "link:", "file:"];

const RANGE_OPERATORS: &[&str] = &[">=", "<=", "^", "~", ">", "<", "=", "v"];

/// Strip a pnpm peer-dependency suffix: `5.2.2(react@19.1.1)` becomes `5.2.2`.
#[must_use]
pub fn strip_peer_suffix(version: &str) -> &str {
    version.split_once('(').map_or(version, |(base, _)| base)
}

/// Reduce a declared range or resolved version string to a clean version.
///
/// Local protocol versions (`link:`, `file:`, `workspace:`) are returned as
/// written because they do not name a registry version.
#[must_use]
pub fn clean_version(raw: &str) -> String {
    let trimmed = raw.trim();
    if is_local_protocol(trimmed) {
        return trimmed.to_string();
    }

    let mut version = strip_peer_suffix(trimmed);

    // npm aliases: "npm:string-width@4.2.3"
    if let Some(alias) = version.strip_prefix("npm:") {
        version = alias
            .rsplit_once('@')
            .map_or(alias, |(_, aliased_version)| aliased_version);
    }

    // Ranges like ">=1.0.0 <2.0.0" or "1.x || 2.x": keep the first comparator.
    let mut cleaned = version.split("||").next().unwrap_or(version).trim_start();
    loop {
        let before = cleaned;
        for operator in RANGE_OPERATORS {
            cleaned = cleaned.trim_start_matches(operator);
        }
        cleaned = cleaned.trim_start();
        if cleaned == before {
            break;
        }
    }

    cleaned.split_whitespace().next().unwrap_or("").to_string()
}

/// Whether the version names a local package via a protocol prefix.
#[must_use]
pub fn is_local_protocol(version: &str) -> bool {
    LOCAL_PROTOCOLS
        .iter()
        .any(|protocol| version.starts_with(protocol))
}

/// Whether a version reported by a package manager is an unresolved
/// placeholder rather than an installed version.
///
/// Anything that is neither a valid semantic version nor a local protocol
/// reference counts as unresolved (empty strings, bare ranges, `latest`).
#[must_use]
pub fn is_unresolved(version: &str) -> bool {
    let version = version.trim();
    if version.is_empty() {
        return true;
    }
    if is_local_protocol(version) {
        return false;
    }
    semver::Version::parse(strip_peer_suffix(version)).is_err()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_strip_peer_suffix() {
        assert_eq!(strip_peer_suffix("5.2.2(react@19.1.1)"), "5.2.2");
        assert_eq!(
            strip_peer_suffix("1.0.0(@types/node@20.0.0)(typescript@5.0.0)"),
            "1.0.0"
        );
        assert_eq!(strip_peer_suffix("1.0.0"), "1.0.0");
    }

    #[test]
    fn test_clean_version_ranges() {
        assert_eq!(clean_version("^1.2.3"), "1.2.3");
        assert_eq!(clean_version("~0.4.1"), "0.4.1");
        assert_eq!(clean_version(">=1.0.0 <2.0.0"), "1.0.0");
        assert_eq!(clean_version(">= 2.1.0"), "2.1.0");
        assert_eq!(clean_version("=3.0.0"), "3.0.0");
        assert_eq!(clean_version("v4.0.0"), "4.0.0");
        assert_eq!(clean_version("1.x || 2.x"), "1.x");
    }

    #[test]
    fn test_clean_version_pnpm_and_aliases() {
        assert_eq!(clean_version("5.2.2(react@19.1.1)"), "5.2.2");
        assert_eq!(clean_version("npm:string-width@4.2.3"), "4.2.3");
        assert_eq!(clean_version("npm:@scope/pkg@^1.0.0"), "1.0.0");
    }

    #[test]
    fn test_clean_version_keeps_local_protocols() {
        assert_eq!(clean_version("workspace:*"), "workspace:*");
        assert_eq!(clean_version("link:../shared"), "link:../shared");
        assert_eq!(clean_version("file:./vendor/pkg"), "file:./vendor/pkg");
    }

    #[test]
    fn test_is_unresolved() {
        assert!(is_unresolved(""));
        assert!(is_unresolved("^1.0.0"));
        assert!(is_unresolved("latest"));
        assert!(!is_unresolved("1.2.3"));
        assert!(!is_unresolved("1.2.3-beta.1"));
        assert!(!is_unresolved("5.2.2(react@19.1.1)"));
        assert!(!is_unresolved("link:../b"));
    }

    proptest! {
        #[test]
        fn clean_version_is_idempotent(raw in "[\\^~<>=v ]{0,3}[0-9]{1,3}\\.[0-9]{1,3}\\.[0-9]{1,3}") {
            let once = clean_version(&raw);
            prop_assert_eq!(clean_version(&once), once);
        }

        #[test]
        fn clean_semver_is_unchanged(major in 0u32..100, minor in 0u32..100, patch in 0u32..100) {
            let version = format!("{major}.{minor}.{patch}");
            prop_assert_eq!(clean_version(&version), version.clone());
            prop_assert!(!is_unresolved(&version));
        }
    }
}
