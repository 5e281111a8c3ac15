//! HTTP collaborator
//!
//! Redirects are followed manually rather than by the client so every hop
//! can be recorded on the link and so redirect targets can be registered
//! as already-checked pages during a crawl.

use crate::config::CheckOptions;
use crate::link::{HttpFailure, RedirectHop, SimpleResponse};
use crate::{PageError, ScourError};
use reqwest::redirect::Policy;
use reqwest::{Client, Method, Response};
use std::collections::HashSet;
use std::time::Duration;
use tracing::trace;
use url::Url;

/// Outcome of one HTTP transaction, as stored in the response cache
pub type HttpResult = Result<SimpleResponse, HttpFailure>;

/// Builds the shared HTTP client from the options
pub fn build_client(options: &CheckOptions) -> Result<Client, ScourError> {
    let client = Client::builder()
        .user_agent(options.user_agent.clone())
        .timeout(Duration::from_secs(options.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::none())
        .danger_accept_invalid_certs(options.accept_invalid_certs)
        .gzip(true)
        .brotli(true)
        .build()?;
    Ok(client)
}

/// Follows redirects manually and returns the final live response together
/// with the URL it came from and the hops taken to reach it.
async fn send(
    client: &Client,
    method: Method,
    url: &Url,
    options: &CheckOptions,
) -> Result<(Response, Url, Vec<RedirectHop>), HttpFailure> {
    let mut current = url.clone();
    let mut hops: Vec<RedirectHop> = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();

    loop {
        if !visited.insert(current.to_string()) {
            return Err(HttpFailure {
                code: Some("ELOOP".to_string()),
                message: format!("redirect loop at {}", current),
            });
        }
        if hops.len() > options.max_redirects {
            return Err(HttpFailure {
                code: None,
                message: format!("exceeded {} redirects", options.max_redirects),
            });
        }

        trace!(method = %method, url = %current, "sending request");
        let mut request = client.request(method.clone(), current.clone());
        if let Some(username) = &options.username {
            request = request.basic_auth(username, options.password.as_deref());
        }

        let response = request.send().await.map_err(|err| classify_error(&err))?;
        let status = response.status();

        if status.is_redirection() {
            let location = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| current.join(value).ok());
            if let Some(next) = location {
                hops.push(RedirectHop {
                    status: status.as_u16(),
                    url: current,
                });
                current = next;
                continue;
            }
            // a redirect status with no usable Location is terminal
        }

        return Ok((response, current, hops));
    }
}

/// Performs one link check transaction and reduces it to a record
pub async fn request(
    client: &Client,
    method: Method,
    url: &Url,
    options: &CheckOptions,
) -> HttpResult {
    let (response, final_url, hops) = send(client, method, url, options).await?;
    Ok(simplify(response, final_url, hops))
}

/// Fetches a URL as an HTML document, returning the response record and
/// the decoded body
pub async fn fetch_document(
    client: &Client,
    url: &Url,
    options: &CheckOptions,
) -> Result<(SimpleResponse, String), PageError> {
    let (response, final_url, hops) = send(client, Method::GET, url, options)
        .await
        .map_err(|failure| PageError::Connection(failure.message))?;

    let status = response.status();
    if !status.is_success() {
        return Err(PageError::Http(status.as_u16()));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).to_string());
    let is_html = content_type
        .as_deref()
        .map(|value| value.to_ascii_lowercase().contains("text/html"))
        .unwrap_or(false);
    if !is_html {
        return Err(PageError::ContentType(content_type));
    }

    let simplified_parts = (
        status.as_u16(),
        status.canonical_reason().map(String::from),
        collect_headers(&response),
    );
    let body = response
        .text()
        .await
        .map_err(|err| PageError::Connection(err.to_string()))?;

    let simple = SimpleResponse {
        status: simplified_parts.0,
        status_text: simplified_parts.1,
        headers: simplified_parts.2,
        url: final_url,
        redirects: hops,
    };
    Ok((simple, body))
}

fn simplify(response: Response, final_url: Url, hops: Vec<RedirectHop>) -> SimpleResponse {
    let status = response.status();
    SimpleResponse {
        status: status.as_u16(),
        status_text: status.canonical_reason().map(String::from),
        headers: collect_headers(&response),
        url: final_url,
        redirects: hops,
    }
}

fn collect_headers(response: &Response) -> Vec<(String, String)> {
    response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).to_string(),
            )
        })
        .collect()
}

/// Maps a transport error to a record with an errno-style code when one
/// can be determined; unclassifiable failures keep a `None` code and are
/// reported as `BLC_UNKNOWN`.
pub(crate) fn classify_error(err: &reqwest::Error) -> HttpFailure {
    HttpFailure {
        code: errno_code(err),
        message: err.to_string(),
    }
}

fn errno_code(err: &reqwest::Error) -> Option<String> {
    if err.is_timeout() {
        return Some("ETIMEDOUT".to_string());
    }

    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            use std::io::ErrorKind;
            let code = match io.kind() {
                ErrorKind::ConnectionRefused => Some("ECONNREFUSED"),
                ErrorKind::ConnectionReset => Some("ECONNRESET"),
                ErrorKind::ConnectionAborted => Some("ECONNABORTED"),
                ErrorKind::NotConnected => Some("ENOTCONN"),
                ErrorKind::AddrNotAvailable => Some("EADDRNOTAVAIL"),
                ErrorKind::BrokenPipe => Some("EPIPE"),
                ErrorKind::TimedOut => Some("ETIMEDOUT"),
                _ => None,
            };
            if let Some(code) = code {
                return Some(code.to_string());
            }
        }
        source = cause.source();
    }

    if err.is_connect() {
        let message = err.to_string();
        if message.contains("dns") || message.contains("resolve") {
            return Some("ENOTFOUND".to_string());
        }
        return Some("ECONNREFUSED".to_string());
    }

    None
}
