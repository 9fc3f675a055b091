//! Navigation policy decisions.
//!
//! The free functions are pure over a snapshot of the configured servers. The only state
//! the policy needs, custom-login progress and host-registered trusted windows, lives in
//! `NavigationGuard`, keyed by content id.

use std::collections::{HashMap, HashSet};

use url::Url;

use crate::types::{ContentId, NavigationDecision, NewWindowVerdict, Server, ShellSettings};
use crate::utils::url::{
    find_server_for_url, is_admin_url, is_channel_export_url, is_custom_login_url,
    is_help_url, is_image_proxy_url, is_login_url, is_managed_resource, is_plugin_url,
    is_public_files_url, is_team_url, is_trusted_url, is_valid_uri, parse_url,
};

/// Snapshot the policy decides against.
pub struct NavigationContext<'a> {
    pub servers: &'a [Server],
    /// Server of the view the event originated from
    pub source_server: Option<&'a Server>,
    pub settings: &'a ShellSettings,
}

/// In-place navigation inside a view. Strict allow-list.
pub fn will_navigate(
    ctx: &NavigationContext<'_>,
    url: &str,
    trusted_window: bool,
    custom_login_in_progress: bool,
) -> NavigationDecision {
    let Some(parsed) = parse_url(url) else {
        return NavigationDecision::Deny;
    };
    let managed = &ctx.settings.managed_resources;

    if let Some(server) = ctx.source_server {
        if is_team_url(&server.url, &parsed, false, managed)
            || is_admin_url(&server.url, &parsed)
            || is_login_url(&server.url, &parsed)
            || is_custom_login_url(&parsed, &server.url)
            || is_channel_export_url(&server.url, &parsed)
        {
            return NavigationDecision::Allow;
        }
    }
    if trusted_window || parsed.scheme() == "mailto" || custom_login_in_progress {
        return NavigationDecision::Allow;
    }
    NavigationDecision::Deny
}

/// New custom-login flag after a navigation started in a view of `source_server`.
///
/// URLs the server does not trust leave the flag untouched, so an external identity
/// provider page keeps an in-progress flow alive.
pub fn custom_login_after_navigation(
    source_server: Option<&Server>,
    url: &str,
    in_progress: bool,
) -> bool {
    let (Some(server), Some(parsed)) = (source_server, parse_url(url)) else {
        return in_progress;
    };
    if !is_trusted_url(&parsed, &server.url) {
        return in_progress;
    }
    is_custom_login_url(&parsed, &server.url)
}

/// Side effect for a new-window request. The primitive itself is always told to deny,
/// except for devtools and contained `about:blank` children.
pub fn new_window(ctx: &NavigationContext<'_>, url: &str) -> NewWindowVerdict {
    let Some(parsed) = parse_url(url) else {
        log::warn!("Ignoring new window request for unparseable URL: {url}");
        return NewWindowVerdict::Ignore;
    };

    if parsed.scheme() == "devtools" {
        return NewWindowVerdict::AllowDevTools;
    }

    if parsed.scheme() == "about" {
        if url == "about:blank" && ctx.source_server.is_some() {
            return NewWindowVerdict::AllowBlankPopup;
        }
        log::info!("Ignoring {url} window request without a known parent view");
        return NewWindowVerdict::Ignore;
    }

    if !is_valid_uri(url) {
        return NewWindowVerdict::OpenExternal;
    }

    if parsed.scheme() == ctx.settings.deep_link_scheme {
        return NewWindowVerdict::DeepLink;
    }

    if !matches!(parsed.scheme(), "http" | "https") {
        return NewWindowVerdict::PromptProtocol {
            scheme: parsed.scheme().to_string(),
        };
    }

    let Some(server) = find_server_for_url(ctx.servers, &parsed, false) else {
        return NewWindowVerdict::OpenExternal;
    };

    if is_public_files_url(&server.url, &parsed)
        || is_help_url(&server.url, &parsed)
        || is_image_proxy_url(&server.url, &parsed)
    {
        return NewWindowVerdict::OpenExternal;
    }

    let managed = &ctx.settings.managed_resources;
    let same_server = ctx.source_server.is_some_and(|source| source.id == server.id);

    if is_team_url(&server.url, &parsed, true, managed) {
        return if same_server {
            NewWindowVerdict::ShowInMainWindow
        } else {
            NewWindowVerdict::DeepLink
        };
    }

    if is_admin_url(&server.url, &parsed) {
        log::info!("Denying admin console window request: {url}");
        return NewWindowVerdict::DenyAdminConsole;
    }

    if is_plugin_url(&server.url, &parsed) || is_managed_resource(&server.url, &parsed, managed)
    {
        return NewWindowVerdict::OpenPopup;
    }

    NewWindowVerdict::OpenExternal
}

/// Navigation inside a popup: only back to the URL it was created with.
pub fn popup_will_navigate(initial_url: &str, url: &str) -> NavigationDecision {
    let same = match (parse_url(initial_url), parse_url(url)) {
        (Some(a), Some(b)) => a == b,
        _ => initial_url == url,
    };
    if same {
        NavigationDecision::Allow
    } else {
        NavigationDecision::Deny
    }
}

/// Mutable per-surface policy state.
#[derive(Debug, Default)]
pub struct NavigationGuard {
    custom_logins: HashSet<ContentId>,
    trusted_windows: HashMap<ContentId, Url>,
}

impl NavigationGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn custom_login_in_progress(&self, content_id: ContentId) -> bool {
        self.custom_logins.contains(&content_id)
    }

    /// Track a started navigation for custom-login flows.
    pub fn did_start_navigation(
        &mut self,
        content_id: ContentId,
        source_server: Option<&Server>,
        url: &str,
    ) {
        let before = self.custom_login_in_progress(content_id);
        let after = custom_login_after_navigation(source_server, url, before);
        if after == before {
            return;
        }
        if after {
            log::info!("Custom login flow started in content {content_id}");
            self.custom_logins.insert(content_id);
        } else {
            log::info!("Custom login flow finished in content {content_id}");
            self.custom_logins.remove(&content_id);
        }
    }

    /// Mark an auxiliary host window bound to a server as trusted.
    pub fn register_trusted_window(&mut self, content_id: ContentId, server_url: Url) {
        self.trusted_windows.insert(content_id, server_url);
    }

    pub fn is_trusted_window(&self, content_id: ContentId) -> bool {
        self.trusted_windows.contains_key(&content_id)
    }

    pub fn trusted_window_server(&self, content_id: ContentId) -> Option<&Url> {
        self.trusted_windows.get(&content_id)
    }

    /// Drop all state for a surface whose listeners are gone.
    pub fn forget(&mut self, content_id: ContentId) {
        self.custom_logins.remove(&content_id);
        self.trusted_windows.remove(&content_id);
    }

    pub fn clear(&mut self) {
        self.custom_logins.clear();
        self.trusted_windows.clear();
    }
}
