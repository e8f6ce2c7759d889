use crate::constants::headers::{
    user_agent, ACCEPT, CONTENT_TYPE, DEFAULT_ACCEPT, JSON_CONTENT_TYPE, USER_AGENT,
};
use crate::engine::spec::RequestSpec;

/// Fills in Content-Type (payload methods only), User-Agent and Accept for
/// keys the caller did not set. Existing keys of any casing are left alone.
pub fn resolve_headers(spec: RequestSpec) -> RequestSpec {
    let mut headers = spec.headers.clone();
    if spec.method.sends_payload() {
        headers = headers.with_default(CONTENT_TYPE, JSON_CONTENT_TYPE);
    }
    headers = headers
        .with_default(USER_AGENT, &user_agent())
        .with_default(ACCEPT, DEFAULT_ACCEPT);
    spec.with_headers(headers)
}
