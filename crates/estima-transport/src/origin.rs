//! Browser origin allow-list checked during the WebSocket upgrade.

/// Which `Origin` header values may open a connection.
///
/// An empty allow-list accepts every origin. Requests without an
/// `Origin` header come from non-browser clients and are always accepted;
/// the header only exists to stop other sites from driving a user's
/// browser against this server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OriginPolicy {
    allowed: Vec<String>,
}

impl OriginPolicy {
    /// Accepts any origin.
    pub fn any() -> Self {
        Self::default()
    }

    /// Accepts only the given origins (exact, case-insensitive match,
    /// trailing `/` ignored).
    pub fn allow<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: origins
                .into_iter()
                .map(|o| normalize(&o.into()))
                .filter(|o| !o.is_empty())
                .collect(),
        }
    }

    /// Returns `true` if a request carrying `origin` may connect.
    pub fn permits(&self, origin: Option<&str>) -> bool {
        if self.allowed.is_empty() {
            return true;
        }
        match origin {
            None => true,
            Some(origin) => {
                let origin = normalize(origin);
                self.allowed.iter().any(|a| *a == origin)
            }
        }
    }

    /// Returns `true` if no restriction is configured.
    pub fn is_open(&self) -> bool {
        self.allowed.is_empty()
    }
}

fn normalize(origin: &str) -> String {
    origin.trim().trim_end_matches('/').to_ascii_lowercase()
}
