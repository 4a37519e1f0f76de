use llmfanout_core::chat::NormalizedRequest;
use reqwest::header::{ACCEPT, CONTENT_TYPE};

/// POSTs the normalized payload with the credential as bearer token. The
/// payload never carries `stream`, so the upstream is asked for one complete
/// JSON object.
pub(super) async fn send_upstream_request(
    client: &reqwest::Client,
    target_url: &str,
    credential: &str,
    request: &NormalizedRequest,
) -> Result<reqwest::Response, reqwest::Error> {
    client
        .post(target_url)
        .bearer_auth(credential)
        .header(CONTENT_TYPE, "application/json")
        .header(ACCEPT, "application/json")
        .json(request.payload())
        .send()
        .await
}

/// Reads the full body as text; bodies are always small JSON or SSE text.
pub(super) async fn read_upstream_body(
    response: reqwest::Response,
) -> Result<(u16, String), reqwest::Error> {
    let status = response.status().as_u16();
    let body = response.text().await?;
    Ok((status, body))
}

pub(super) fn summarize_body(body: &str, limit: usize) -> String {
    let compact = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if compact.chars().count() <= limit {
        return compact;
    }
    let mut out = compact.chars().take(limit).collect::<String>();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::summarize_body;

    #[test]
    fn summarize_body_collapses_whitespace_and_truncates() {
        assert_eq!(summarize_body("{\n  \"error\": 1\n}", 64), "{ \"error\": 1 }");
        assert_eq!(summarize_body("abcdef", 3), "abc...");
    }
}
