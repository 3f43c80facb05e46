/// Cookie carrying the signed-in user's id
pub const USER_ID_COOKIE: &str = "user_id";

/// Where session variants connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEndpoint {
    server_url: String,
    user_id: Option<String>,
}

impl SessionEndpoint {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            user_id: None,
        }
    }

    pub fn with_user_id(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id.filter(|id| !id.is_empty());
        self
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// `<server><path>[?user_id=<id>]`
    pub fn url_for(&self, path: &str) -> String {
        let mut url = self.server_url.trim_end_matches('/').to_string();
        if !path.starts_with('/') {
            url.push('/');
        }
        url.push_str(path);

        if let Some(user_id) = &self.user_id {
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(USER_ID_COOKIE);
            url.push('=');
            url.push_str(&percent_encode(user_id));
        }
        url
    }

    /// Pull the user id out of a `Cookie` header value
    pub fn user_id_from_cookie(header: &str) -> Option<String> {
        header.split(';').find_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            (name.trim() == USER_ID_COOKIE)
                .then(|| value.trim().trim_matches('"').to_string())
                .filter(|value| !value.is_empty())
        })
    }
}

fn percent_encode(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}
