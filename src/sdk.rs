//! Effective min/target SDK computation against a running platform.

use crate::error::ParseResult;

/// Platform API levels referenced by the parser's compatibility rules.
pub mod version_codes {
    pub const BASE: i32 = 1;
    pub const DONUT: i32 = 4;
    pub const FROYO: i32 = 8;
    pub const GINGERBREAD: i32 = 9;
    pub const ICE_CREAM_SANDWICH: i32 = 14;
    pub const JELLY_BEAN: i32 = 16;
    pub const JELLY_BEAN_MR1: i32 = 17;
    pub const M: i32 = 23;
    pub const N: i32 = 24;
    pub const O: i32 = 26;
    pub const O_MR1: i32 = 27;
    pub const P: i32 = 28;
    pub const Q: i32 = 29;
    /// Sentinel for "targets the in-development platform".
    pub const CUR_DEVELOPMENT: i32 = 10000;
}

/// A codename matches when it, or its prefix before the first `.`, is one of
/// the platform's pre-release codenames (`Q.fingerprint` counts as `Q`).
fn matches_codename(codenames: &[String], code: &str) -> bool {
    let name = code.split_once('.').map_or(code, |(head, _)| head);
    codenames.iter().any(|c| c == name)
}

fn development_platform_error(code: &str, codenames: &[String]) -> crate::error::ParseError {
    if codenames.is_empty() {
        err!(
            OlderSdk,
            "Requires development platform {} but this is a release platform.",
            code
        )
    } else {
        err!(
            OlderSdk,
            "Requires development platform {} (current platform is any of [{}])",
            code,
            codenames.join(", ")
        )
    }
}

/// Computes the effective target SDK.
pub fn compute_target_sdk(
    target_version: i32,
    target_code: Option<&str>,
    platform_codenames: &[String],
) -> ParseResult<i32> {
    let code = match target_code {
        None => return Ok(target_version),
        Some(code) => code,
    };
    if matches_codename(platform_codenames, code) {
        return Ok(version_codes::CUR_DEVELOPMENT);
    }
    Err(development_platform_error(code, platform_codenames))
}

/// Computes the effective min SDK, failing if the platform is too old.
pub fn compute_min_sdk(
    min_version: i32,
    min_code: Option<&str>,
    platform_version: i32,
    platform_codenames: &[String],
) -> ParseResult<i32> {
    let code = match min_code {
        None => {
            if min_version <= platform_version {
                return Ok(min_version);
            }
            fail!(
                OlderSdk,
                "Requires newer sdk version #{} (current version is #{})",
                min_version,
                platform_version
            );
        }
        Some(code) => code,
    };
    if matches_codename(platform_codenames, code) {
        return Ok(version_codes::CUR_DEVELOPMENT);
    }
    Err(development_platform_error(code, platform_codenames))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseErrorCode;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn min_sdk_against_release_platform() {
        let err = compute_min_sdk(5, None, 4, &[]).unwrap_err();
        assert_eq!(err.code(), ParseErrorCode::OlderSdk);
        assert_eq!(
            err.message(),
            "Requires newer sdk version #5 (current version is #4)"
        );
        assert_eq!(compute_min_sdk(5, None, 5, &[]).unwrap(), 5);
    }

    #[test]
    fn target_codename_resolves_to_development() {
        assert_eq!(
            compute_target_sdk(0, Some("R"), &names(&["R"])).unwrap(),
            version_codes::CUR_DEVELOPMENT
        );
        assert_eq!(compute_target_sdk(28, None, &names(&["R"])).unwrap(), 28);
    }

    #[test]
    fn two_part_codename_matches_prefix() {
        assert_eq!(
            compute_min_sdk(1, Some("R.a1b2c3"), 29, &names(&["R"])).unwrap(),
            version_codes::CUR_DEVELOPMENT
        );
        assert!(compute_target_sdk(0, Some("S.x"), &names(&["R"])).is_err());
    }

    #[test]
    fn mismatch_message_depends_on_platform() {
        let release = compute_target_sdk(0, Some("R"), &[]).unwrap_err();
        assert!(release.message().contains("this is a release platform"));
        let preview = compute_target_sdk(0, Some("S"), &names(&["Q", "R"])).unwrap_err();
        assert!(preview.message().contains("current platform is any of [Q, R]"));
    }
}
