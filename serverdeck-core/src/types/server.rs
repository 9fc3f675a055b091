//! 服务器与视图描述类型

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CoreError, CoreResult};

/// A configured remote backend.
///
/// Administrative edits are modeled as delete + recreate, so the URL is the identity
/// used when recycling live views across configuration reloads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Server {
    /// Server ID
    pub id: String,
    /// Display name
    pub name: String,
    /// Base URL (origin + optional subpath)
    pub url: Url,
    /// Ordering index in the server list
    pub order: usize,
}

impl Server {
    /// Creates a server, rejecting URLs that are not `http`/`https`.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        url: &str,
        order: usize,
    ) -> CoreResult<Self> {
        let url = Url::parse(url).map_err(|e| CoreError::InvalidUrl(format!("{url}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(CoreError::ValidationError(format!(
                "Server URL must use http or https: {url}"
            )));
        }
        Ok(Self {
            id: id.into(),
            name: name.into(),
            url,
            order,
        })
    }
}

/// Closed set of view kinds a server can host.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViewType {
    /// Primary messaging view, rooted at the server URL
    Messaging,
    /// Boards plugin view
    Boards,
    /// Playbooks plugin view
    Playbooks,
}

impl ViewType {
    /// All view types in display order.
    pub const ALL: [Self; 3] = [Self::Messaging, Self::Boards, Self::Playbooks];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Messaging => "MESSAGING",
            Self::Boards => "BOARDS",
            Self::Playbooks => "PLAYBOOKS",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Messaging => "Channels",
            Self::Boards => "Boards",
            Self::Playbooks => "Playbooks",
        }
    }

    /// Path segment appended to the server URL, `None` for the messaging view.
    pub fn path_segment(self) -> Option<&'static str> {
        match self {
            Self::Messaging => None,
            Self::Boards => Some("boards"),
            Self::Playbooks => Some("playbooks"),
        }
    }

    /// The messaging view can never be closed.
    pub fn can_close(self) -> bool {
        !matches!(self, Self::Messaging)
    }

    /// Root URL of a view of this type on the given server.
    pub fn root_url(self, server_url: &Url) -> Url {
        let Some(segment) = self.path_segment() else {
            return server_url.clone();
        };
        let mut url = server_url.clone();
        let base = server_url.path();
        let path = if base.ends_with('/') {
            format!("{base}{segment}")
        } else {
            format!("{base}/{segment}")
        };
        url.set_path(&path);
        url.set_query(None);
        url.set_fragment(None);
        url
    }
}

/// Configuration-level identity of one view slot within a server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViewDescriptor {
    /// View ID (server scoped)
    pub id: String,
    /// Owning server ID
    #[serde(rename = "serverId")]
    pub server_id: String,
    /// View type
    #[serde(rename = "type")]
    pub view_type: ViewType,
    /// Whether the view is materialized (open) or only configured (closed)
    #[serde(rename = "isOpen")]
    pub is_open: bool,
    /// Display order within the server
    pub order: usize,
}

impl ViewDescriptor {
    /// Creates a descriptor with the conventional `<server name>___<TYPE>` id.
    pub fn new(server: &Server, view_type: ViewType, is_open: bool, order: usize) -> Self {
        Self {
            id: format!("{}___{}", server.name, view_type.as_str()),
            server_id: server.id.clone(),
            view_type,
            is_open,
            order,
        }
    }

    pub fn root_url(&self, server: &Server) -> Url {
        self.view_type.root_url(&server.url)
    }
}

/// One server together with its view descriptors, as supplied by configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerSnapshot {
    pub server: Server,
    pub views: Vec<ViewDescriptor>,
}

impl ServerSnapshot {
    /// Snapshot with every view type present and open.
    pub fn with_default_views(server: Server) -> Self {
        let views = ViewType::ALL
            .iter()
            .enumerate()
            .map(|(order, view_type)| ViewDescriptor::new(&server, *view_type, true, order))
            .collect();
        Self { server, views }
    }
}
