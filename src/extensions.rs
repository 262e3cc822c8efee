use crate::error::Error;

const PERMESSAGE_DEFLATE: &str = "permessage-deflate";
const CLIENT_NO_CONTEXT_TAKEOVER: &str = "client_no_context_takeover";
const SERVER_NO_CONTEXT_TAKEOVER: &str = "server_no_context_takeover";
const CLIENT_MAX_WINDOW_BITS: &str = "client_max_window_bits";
const SERVER_MAX_WINDOW_BITS: &str = "server_max_window_bits";

const KNOWN_PARAMETERS: [&str; 4] = [
    CLIENT_NO_CONTEXT_TAKEOVER,
    SERVER_NO_CONTEXT_TAKEOVER,
    CLIENT_MAX_WINDOW_BITS,
    SERVER_MAX_WINDOW_BITS,
];

/// It's important to enhance that some compression extensions,
/// in some cases affects compression and
/// decompression(client_no_context_takeover, server_no_context_takeover),
/// while another one affects only compression(client_max_window_bits, server_max_window_bits).
/// Keeping the context between compression and decompression,
/// improves performance but adds more overhead, consuming more memory.
/// Larger window sizes (closer to 15)
/// result in better compression ratios but are slower and use more memory.
/// Smaller window sizes (closer to 8) offer faster performance but with worse compression.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extensions {
    /// Dictates if compression is enabled
    pub permessage_deflate: bool,
    /// Asks that the client should reset its compression context after compressing a message.
    pub client_no_context_takeover: Option<bool>,
    /// Asks that the server should reset its compression context after compressing a message.
    pub server_no_context_takeover: Option<bool>,
    /// Asks that the client sets its compression window to a specific number.
    pub client_max_window_bits: Option<u8>,
    /// Asks that the server sets its compression window to a specific number.
    pub server_max_window_bits: Option<u8>,
}

fn valid_window_bits(bits: u8) -> bool {
    (8..=15).contains(&bits)
}

/// Lenient parse, used when accepting whatever a peer offers. Unknown
/// parameters and out-of-range window bits are silently ignored; callers that
/// must enforce the opening-handshake contract should use
/// [`validate_negotiated_extensions`] instead.
pub fn parse_extensions(extensions_header_value: String) -> Option<Extensions> {
    let extensions_str = extensions_header_value.split(';');
    let mut extensions = Extensions::default();

    for extension_str in extensions_str {
        if extension_str.trim() == PERMESSAGE_DEFLATE {
            extensions.permessage_deflate = true;
        } else if extension_str.trim().starts_with(CLIENT_NO_CONTEXT_TAKEOVER) {
            extensions.client_no_context_takeover = Some(true);
        } else if extension_str.trim().starts_with(SERVER_NO_CONTEXT_TAKEOVER) {
            extensions.server_no_context_takeover = Some(true);
        } else if extension_str.trim().starts_with(CLIENT_MAX_WINDOW_BITS) {
            if !extension_str.contains('=') {
                extensions.client_max_window_bits = Some(15);
            } else {
                extensions.client_max_window_bits =
                    extension_str.trim().split('=').last()?.trim().parse::<u8>().ok();
            }
        } else if extension_str.trim().starts_with(SERVER_MAX_WINDOW_BITS) {
            if !extension_str.contains('=') {
                extensions.server_max_window_bits = Some(15);
            } else {
                extensions.server_max_window_bits =
                    extension_str.trim().split('=').last()?.trim().parse::<u8>().ok();
            }
        }
    }
    if !extensions.permessage_deflate {
        return None;
    }

    Some(extensions)
}

/// Strict parse of the server's `Sec-WebSocket-Extensions` response header,
/// used by the opening handshake on the client side. Rejects unknown
/// parameters and out-of-range `max_window_bits` values rather than ignoring
/// them, and refuses to accept an extension the client never offered.
pub fn validate_negotiated_extensions(
    header_value: &str,
    offered: Option<&Extensions>,
) -> Result<Option<Extensions>, Error> {
    let mut saw_permessage_deflate = false;
    let mut negotiated = Extensions::default();

    for extension in header_value.split(',') {
        for param in extension.split(';') {
            let param = param.trim();
            if param.is_empty() {
                continue;
            }
            if param == PERMESSAGE_DEFLATE {
                saw_permessage_deflate = true;
                negotiated.permessage_deflate = true;
                continue;
            }
            if !saw_permessage_deflate {
                return Err(Error::UnsupportedExtension(extension.trim().to_string()));
            }

            let (name, value) = match param.split_once('=') {
                Some((n, v)) => (n.trim(), Some(v.trim().trim_matches('"'))),
                None => (param, None),
            };

            if !KNOWN_PARAMETERS.contains(&name) {
                return Err(Error::PermessageDeflateUnsupportedParameter(
                    name.to_string(),
                ));
            }

            match name {
                CLIENT_NO_CONTEXT_TAKEOVER => negotiated.client_no_context_takeover = Some(true),
                SERVER_NO_CONTEXT_TAKEOVER => negotiated.server_no_context_takeover = Some(true),
                CLIENT_MAX_WINDOW_BITS | SERVER_MAX_WINDOW_BITS => {
                    let bits: u8 = match value {
                        Some(v) => v.parse().map_err(|_| {
                            Error::PermessageDeflateInvalidMaxWindowBits(0)
                        })?,
                        None => 15,
                    };
                    if !valid_window_bits(bits) {
                        return Err(Error::PermessageDeflateInvalidMaxWindowBits(bits));
                    }
                    if name == CLIENT_MAX_WINDOW_BITS {
                        negotiated.client_max_window_bits = Some(bits);
                    } else {
                        negotiated.server_max_window_bits = Some(bits);
                    }
                }
                _ => unreachable!(),
            }
        }
    }

    if !saw_permessage_deflate {
        return Ok(None);
    }

    if offered.map(|o| !o.permessage_deflate).unwrap_or(true) {
        return Err(Error::UnsupportedExtension(PERMESSAGE_DEFLATE.to_string()));
    }

    Ok(Some(negotiated))
}

pub fn merge_extensions(
    server_extensions: Option<Extensions>,
    client_extensions: Option<Extensions>,
) -> Option<Extensions> {
    let server_ext = server_extensions?;
    let client_ext = client_extensions?;
    let merged_extensions = Extensions {
        permessage_deflate: client_ext.permessage_deflate && server_ext.permessage_deflate,
        client_no_context_takeover: server_ext
            .client_no_context_takeover
            .and(client_ext.client_no_context_takeover),
        server_no_context_takeover: server_ext
            .server_no_context_takeover
            .and(client_ext.server_no_context_takeover),
        client_max_window_bits: match (
            server_ext.client_max_window_bits,
            client_ext.client_max_window_bits,
        ) {
            (Some(server_bits), Some(client_bits)) => Some(std::cmp::min(server_bits, client_bits)),
            (Some(server_bits), None) => Some(server_bits),
            (None, Some(client_bits)) => Some(client_bits),
            (None, None) => None,
        },
        server_max_window_bits: match (
            server_ext.server_max_window_bits,
            client_ext.server_max_window_bits,
        ) {
            (Some(server_bits), Some(client_bits)) => Some(std::cmp::min(server_bits, client_bits)),
            (Some(server_bits), None) => Some(server_bits),
            (None, Some(client_bits)) => Some(client_bits),
            (None, None) => None,
        },
    };
    Some(merged_extensions)
}

pub fn add_extension_headers(request: &mut String, extensions: Option<&Extensions>) {
    match extensions {
        None => {
            request.push_str("\r\n");
        }
        Some(extensions) => {
            if extensions.permessage_deflate {
                request.push_str(&format!("Sec-WebSocket-Extensions: {}", PERMESSAGE_DEFLATE));
                if let Some(true) = extensions.client_no_context_takeover {
                    request.push_str(&format!("; {}", CLIENT_NO_CONTEXT_TAKEOVER))
                }
                if let Some(true) = extensions.server_no_context_takeover {
                    request.push_str(&format!("; {}", SERVER_NO_CONTEXT_TAKEOVER))
                }
                if let Some(bits) = extensions.client_max_window_bits {
                    request.push_str(&format!("; {}={}", CLIENT_MAX_WINDOW_BITS, bits))
                }
                if let Some(bits) = extensions.server_max_window_bits {
                    request.push_str(&format!("; {}={}", SERVER_MAX_WINDOW_BITS, bits))
                }
            }
            request.push_str("\r\n");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_basic_offer() {
        let ext = parse_extensions("permessage-deflate; client_max_window_bits=10".to_string())
            .unwrap();
        assert!(ext.permessage_deflate);
        assert_eq!(ext.client_max_window_bits, Some(10));
    }

    #[test]
    fn validate_rejects_unknown_parameter() {
        let offered = Extensions {
            permessage_deflate: true,
            ..Default::default()
        };
        let err = validate_negotiated_extensions(
            "permessage-deflate; not_a_real_param",
            Some(&offered),
        )
        .unwrap_err();
        assert!(matches!(err, Error::PermessageDeflateUnsupportedParameter(_)));
    }

    #[test]
    fn validate_rejects_out_of_range_window_bits() {
        let offered = Extensions {
            permessage_deflate: true,
            ..Default::default()
        };
        let err = validate_negotiated_extensions(
            "permessage-deflate; client_max_window_bits=20",
            Some(&offered),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::PermessageDeflateInvalidMaxWindowBits(20)
        ));
    }

    #[test]
    fn validate_rejects_extension_never_offered() {
        let err = validate_negotiated_extensions("permessage-deflate", None).unwrap_err();
        assert!(matches!(err, Error::UnsupportedExtension(_)));
    }

    #[test]
    fn validate_accepts_matching_offer() {
        let offered = Extensions {
            permessage_deflate: true,
            client_no_context_takeover: Some(true),
            ..Default::default()
        };
        let negotiated =
            validate_negotiated_extensions("permessage-deflate; client_no_context_takeover", Some(&offered))
                .unwrap()
                .unwrap();
        assert!(negotiated.permessage_deflate);
        assert_eq!(negotiated.client_no_context_takeover, Some(true));
    }
}
