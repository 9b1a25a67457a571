// SIP URI helpers for <Sip> nouns
//
// Standalone parsing of the "sip:user:password@host;params" form carried as
// the text of a <Sip> element.

/// Components of a SIP URI. Borrowed from the source string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SipUri<'a> {
    pub scheme: Option<&'a str>,
    pub user: Option<&'a str>,
    pub password: Option<&'a str>,
    /// Host (and port), without parameters or headers
    pub host: &'a str,
}

impl<'a> SipUri<'a> {
    /// Parse a SIP URI. Angle brackets and surrounding whitespace are ignored.
    /// Returns `None` for an empty host.
    pub fn parse(raw: &'a str) -> Option<Self> {
        let uri = raw.trim();
        let uri = match (uri.find('<'), uri.find('>')) {
            (Some(start), Some(end)) if start < end => &uri[start + 1..end],
            _ => uri,
        };

        let (scheme, rest) = match uri.split_once(':') {
            Some((s, rest)) if s.eq_ignore_ascii_case("sip") || s.eq_ignore_ascii_case("sips") => {
                (Some(s), rest)
            }
            _ => (None, uri),
        };

        let (userinfo, address) = match rest.rfind('@') {
            Some(at) => (Some(&rest[..at]), &rest[at + 1..]),
            None => (None, rest),
        };

        let (user, password) = match userinfo {
            Some(info) => match info.split_once(':') {
                Some((u, p)) => (Some(u), Some(p)),
                None => (Some(info), None),
            },
            None => (None, None),
        };

        let host = address
            .split(|c: char| c == ';' || c == '?')
            .next()
            .unwrap_or(address);
        if host.is_empty() {
            return None;
        }

        Some(SipUri {
            scheme,
            user,
            password,
            host,
        })
    }
}
