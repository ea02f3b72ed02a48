use std::collections::HashSet;

use http::{HeaderMap, HeaderName, header};

/// Headers scoped to a single hop; a proxy must not relay them.
static HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// =======================================================
/// OUTBOUND HEADERS (client -> target)
/// =======================================================
///
/// Copies every inbound header except:
/// - the auth header (the secret never leaves this service)
/// - `Host` and `Content-Length` (the HTTP client derives them from
///   the target URL and body)
/// - hop-by-hop headers, plus any header named in `Connection`
pub fn outbound_headers(inbound: &HeaderMap, auth_header: &HeaderName) -> HeaderMap {
    let dropped = connection_tokens(inbound);
    let mut out = HeaderMap::with_capacity(inbound.len());

    for (name, value) in inbound {
        if name == auth_header
            || name == header::HOST
            || name == header::CONTENT_LENGTH
            || is_hop_by_hop(name)
            || dropped.contains(name.as_str())
        {
            continue;
        }
        out.append(name.clone(), value.clone());
    }

    out
}

/// =======================================================
/// CLIENT HEADERS (target -> client)
/// =======================================================
///
/// The full upstream header set minus hop-by-hop headers; the listener
/// re-frames the buffered body for the client connection.
pub fn client_headers(upstream: &HeaderMap) -> HeaderMap {
    let dropped = connection_tokens(upstream);
    let mut out = HeaderMap::with_capacity(upstream.len());

    for (name, value) in upstream {
        if is_hop_by_hop(name) || dropped.contains(name.as_str()) {
            continue;
        }
        out.append(name.clone(), value.clone());
    }

    out
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.iter().any(|h| h == name)
}

fn connection_tokens(headers: &HeaderMap) -> HashSet<String> {
    headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(split_header_tokens)
        .collect()
}

fn split_header_tokens(value: &str) -> impl Iterator<Item = String> + '_ {
    value.split(',').filter_map(|token| {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(
                trimmed
                    .trim_matches(|c| c == '"' || c == '\'')
                    .to_ascii_lowercase(),
            )
        }
    })
}
