pub mod network {
    pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
    pub const TIMEOUT_CEILING_MS: u64 = 30_000;
    pub const TIMEOUT_CONNECTION_MS: u64 = 10_000;
    pub const MAX_REDIRECTS: usize = 10;
}

pub mod headers {
    pub const AUTHORIZATION: &str = "Authorization";
    pub const CONTENT_TYPE: &str = "Content-Type";
    pub const USER_AGENT: &str = "User-Agent";
    pub const ACCEPT: &str = "Accept";
    pub const JSON_CONTENT_TYPE: &str = "application/json";
    pub const DEFAULT_ACCEPT: &str = "application/json, text/plain, */*";

    pub fn user_agent() -> String {
        format!(
            "{}/{} (API Testing Tool)",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        )
    }
}

pub mod history {
    pub const DEFAULT_LIMIT: usize = 20;
    pub const MAX_LIMIT: usize = 500;
}

pub mod limits {
    pub const LOG_STRING_LENGTH: usize = 500;
}

pub mod protocols {
    pub const ALLOWED_HTTP: &[&str] = &["http:", "https:"];
}
