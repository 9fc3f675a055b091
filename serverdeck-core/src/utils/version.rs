//! Server version parsing.

use semver::Version;

/// Parses a server-reported version.
///
/// Servers report strings such as `9.5.1`, `7.8.0.7866214.abc` or `v6.3`; anything after
/// the first three numeric components is ignored and missing components count as zero.
pub fn parse_server_version(raw: &str) -> Option<Version> {
    let trimmed = raw.trim().trim_start_matches(['v', 'V']);
    if let Ok(version) = Version::parse(trimmed) {
        return Some(version);
    }

    let mut parts = trimmed.split('.').take(3).map(str::parse::<u64>);
    let major = parts.next()?.ok()?;
    let minor = parts.next().transpose().ok()?.unwrap_or(0);
    let patch = parts.next().transpose().ok()?.unwrap_or(0);
    Some(Version::new(major, minor, patch))
}

/// Whether `raw` parses and is at least `minimum`.
pub fn is_at_least(raw: Option<&str>, minimum: &Version) -> bool {
    raw.and_then(parse_server_version)
        .is_some_and(|version| version >= *minimum)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_server_version_formats() {
        assert_eq!(parse_server_version("9.5.1"), Some(Version::new(9, 5, 1)));
        assert_eq!(
            parse_server_version("7.8.0.7866214.abc"),
            Some(Version::new(7, 8, 0))
        );
        assert_eq!(parse_server_version("v6.3"), Some(Version::new(6, 3, 0)));
        assert_eq!(parse_server_version("six"), None);
        assert_eq!(parse_server_version(""), None);
    }

    #[test]
    fn at_least_compares_parsed_versions() {
        let minimum = Version::new(6, 0, 0);
        assert!(is_at_least(Some("6.0.0"), &minimum));
        assert!(is_at_least(Some("10.1.2"), &minimum));
        assert!(!is_at_least(Some("5.37.9"), &minimum));
        assert!(!is_at_least(None, &minimum));
    }
}
