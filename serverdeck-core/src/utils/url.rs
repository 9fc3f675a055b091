//! URL classification helpers.
//!
//! Every predicate takes a server base URL and a candidate URL. Paths are compared in
//! their formatted form (lower-cased, with a trailing `/`), so `/Team` and `/team/`
//! are the same location.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use url::Url;

use crate::types::Server;

/// Top-level path segments that are never team/workspace pages.
const NON_TEAM_URL_PATHS: [&str; 8] = [
    "plugins",
    "signup",
    "login",
    "admin",
    "channel",
    "post",
    "oauth",
    "admin_console",
];

const CHANNEL_EXPORT_PATH: &str = "plugins/com.mattermost.plugin-channel-export/api/v1/export";

const CUSTOM_LOGIN_PATTERNS: [&str; 10] = [
    r"^/oauth/authorize$",
    r"^/oauth/deauthorize$",
    r"^/oauth/access_token$",
    r"^/oauth/[A-Za-z0-9]+/complete$",
    r"^/oauth/[A-Za-z0-9]+/login$",
    r"^/oauth/[A-Za-z0-9]+/signup$",
    r"^/api/v3/oauth/[A-Za-z0-9]+/complete$",
    r"^/signup/[A-Za-z0-9]+/complete$",
    r"^/login/[A-Za-z0-9]+/complete$",
    r"^/login/sso/saml$",
];

static CUSTOM_LOGIN_REGEXES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    CUSTOM_LOGIN_PATTERNS
        .iter()
        .filter_map(|pattern| {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .ok()
        })
        .collect()
});

static PUBLIC_FILES_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(api/v[3-4]/public/)?files/").ok());

/// Parses a URL, collapsing runs of `/` inside the path.
pub fn parse_url(input: &str) -> Option<Url> {
    let mut url = Url::parse(input.trim()).ok()?;
    if !url.cannot_be_a_base() && url.path().contains("//") {
        let mut collapsed = String::with_capacity(url.path().len());
        let mut previous_slash = false;
        for c in url.path().chars() {
            if c == '/' && previous_slash {
                continue;
            }
            previous_slash = c == '/';
            collapsed.push(c);
        }
        url.set_path(&collapsed);
    }
    Some(url)
}

/// Lower-cases a path and guarantees a trailing `/`.
pub fn formatted_path(path: &str) -> String {
    let mut formatted = path.to_lowercase();
    if !formatted.ends_with('/') {
        formatted.push('/');
    }
    formatted
}

/// Formatted subpath of a server URL (`/` when the server has none).
pub fn server_subpath(server_url: &Url) -> String {
    formatted_path(server_url.path())
}

fn host_with_port(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host,
    })
}

/// Same origin, optionally comparing only host and explicit port.
pub fn equal_urls_ignoring_subpath(a: &Url, b: &Url, ignore_scheme: bool) -> bool {
    if ignore_scheme {
        return match (host_with_port(a), host_with_port(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        };
    }
    a.origin().is_tuple() && a.origin() == b.origin()
}

/// Same origin, and `url` lies under the path of `base`.
pub fn equal_urls_with_subpath(base: &Url, url: &Url, ignore_scheme: bool) -> bool {
    equal_urls_ignoring_subpath(base, url, ignore_scheme)
        && formatted_path(url.path()).starts_with(&formatted_path(base.path()))
}

/// Whether `url` is a `<url_type>/` page of the server, with or without the server subpath.
pub fn is_url_type(url_type: &str, server_url: &Url, url: &Url) -> bool {
    if !equal_urls_ignoring_subpath(server_url, url, false) {
        return false;
    }
    let path = formatted_path(url.path());
    let subpath = server_subpath(server_url);
    path.starts_with(&format!("{subpath}{url_type}/")) || path.starts_with(&format!("/{url_type}/"))
}

pub fn is_admin_url(server_url: &Url, url: &Url) -> bool {
    is_url_type("admin_console", server_url, url)
}

pub fn is_plugin_url(server_url: &Url, url: &Url) -> bool {
    is_url_type("plugins", server_url, url)
}

pub fn is_login_url(server_url: &Url, url: &Url) -> bool {
    is_url_type("login", server_url, url)
}

pub fn is_channel_export_url(server_url: &Url, url: &Url) -> bool {
    is_url_type(CHANNEL_EXPORT_PATH, server_url, url)
}

pub fn is_help_url(server_url: &Url, url: &Url) -> bool {
    is_url_type("help", server_url, url)
}

pub fn is_image_proxy_url(server_url: &Url, url: &Url) -> bool {
    is_url_type("api/v4/image", server_url, url)
}

pub fn is_managed_resource(server_url: &Url, url: &Url, managed_resources: &[String]) -> bool {
    managed_resources
        .iter()
        .any(|resource| is_url_type(resource, server_url, url))
}

/// Public file downloads (`files/`, optionally under `api/v3|v4/public/`).
pub fn is_public_files_url(server_url: &Url, url: &Url) -> bool {
    if !equal_urls_ignoring_subpath(server_url, url, false) {
        return false;
    }
    let Some(regex) = PUBLIC_FILES_REGEX.as_ref() else {
        return false;
    };
    let path = formatted_path(url.path());
    let relative = path
        .strip_prefix(&server_subpath(server_url))
        .or_else(|| path.strip_prefix('/'))
        .unwrap_or(&path);
    regex.is_match(relative)
}

/// Any same-origin page that is not under a non-team segment.
pub fn is_team_url(server_url: &Url, url: &Url, with_api: bool, managed_resources: &[String]) -> bool {
    if !equal_urls_ignoring_subpath(server_url, url, false) {
        return false;
    }
    let api = with_api.then_some("api");
    !NON_TEAM_URL_PATHS
        .iter()
        .copied()
        .chain(api)
        .chain(managed_resources.iter().map(String::as_str))
        .any(|segment| is_url_type(segment, server_url, url))
}

/// A server with a subpath trusts only URLs under it, otherwise the whole origin.
pub fn is_trusted_url(url: &Url, root_url: &Url) -> bool {
    if server_subpath(root_url) == "/" {
        equal_urls_ignoring_subpath(root_url, url, false)
    } else {
        equal_urls_with_subpath(root_url, url, false)
    }
}

/// OAuth/SAML flow pages of a trusted server.
pub fn is_custom_login_url(url: &Url, server_url: &Url) -> bool {
    if !is_trusted_url(url, server_url) {
        return false;
    }
    let subpath = server_url.path();
    let replacement = if subpath.ends_with('/') { "/" } else { "" };
    let relative = url.path().replacen(subpath, replacement, 1);
    CUSTOM_LOGIN_REGEXES
        .iter()
        .any(|regex| regex.is_match(&relative))
}

/// Whether `target` stays inside the page currently shown at `current`.
pub fn is_internal_url(target: &Url, current: &Url) -> bool {
    if host_with_port(target) != host_with_port(current) {
        return false;
    }
    equal_urls_with_subpath(current, target, false) || target.path().starts_with(current.path())
}

/// Loose URI syntax check used before handing a URL to the OS.
pub fn is_valid_uri(input: &str) -> bool {
    if input.is_empty() || input.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return false;
    }
    let Some((scheme, _)) = input.split_once(':') else {
        return false;
    };
    let mut scheme_chars = scheme.chars();
    let scheme_ok = scheme_chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
        && scheme_chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if !scheme_ok {
        return false;
    }
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes
                .get(i + 1..i + 3)
                .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
            if !valid {
                return false;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    true
}

/// Finds the configured server a URL belongs to, preferring the longest matching subpath.
pub fn find_server_for_url<'a>(
    servers: impl IntoIterator<Item = &'a Server>,
    url: &Url,
    ignore_scheme: bool,
) -> Option<&'a Server> {
    servers
        .into_iter()
        .filter(|server| equal_urls_with_subpath(&server.url, url, ignore_scheme))
        .max_by_key(|server| server_subpath(&server.url).len())
}

/// Path of `url` relative to the server subpath, always starting with `/`.
pub fn strip_server_subpath(server_url: &Url, path: &str) -> String {
    let base = server_url.path().trim_end_matches('/');
    if base.is_empty() {
        return path.to_string();
    }
    match path.strip_prefix(base) {
        Some(rest) if rest.is_empty() => "/".to_string(),
        Some(rest) if rest.starts_with('/') => rest.to_string(),
        _ => path.to_string(),
    }
}
