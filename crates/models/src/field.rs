//! Key namespace: one colon-delimited store key per leaf of [`Record`](crate::Record).
//!
//! | Field path          | Key                    | Kind   |
//! |---------------------|------------------------|--------|
//! | domain.value        | `domain`               | scalar |
//! | domain.ipv4         | `domain:ipv4`          | scalar |
//! | domain.ipv6         | `domain:ipv6`          | scalar |
//! | domain.subdomains   | `domain:subdomains`    | list   |
//! | whois.tld           | `domain:whois:tld`     | scalar |
//! | whois.status        | `domain:whois:status`  | flag   |
//! | whois.created       | `domain:whois:created` | scalar |
//! | whois.changed       | `domain:whois:changed` | scalar |
//! | whois.phones        | `domain:whois:phones`  | list   |
//! | whois.emails        | `domain:whois:emails`  | list   |
//! | web.url             | `domain:web:url`       | scalar |
//! | web.server          | `domain:web:server`    | scalar |
//! | web.rating          | `domain:web:rating`    | scalar |
//! | web.redirects       | `domain:web:redirects` | list   |
//! | web.links           | `domain:web:links`     | list   |
//! | web.js              | `domain:web:js`        | list   |

use serde::{Deserialize, Serialize};

/// How a field is laid out in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    /// Plain string value.
    Scalar,
    /// Boolean persisted as the literal `"true"` / `"false"`.
    Flag,
    /// Ordered list, grown by tail appends.
    List,
}

/// Every leaf field of the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    DomainValue,
    DomainIpv4,
    DomainIpv6,
    DomainSubdomains,
    WhoisTld,
    WhoisStatus,
    WhoisCreated,
    WhoisChanged,
    WhoisPhones,
    WhoisEmails,
    WebUrl,
    WebServer,
    WebRating,
    WebRedirects,
    WebLinks,
    WebJs,
}

impl Field {
    /// All fields, in namespace table order.
    pub const ALL: [Field; 16] = [
        Field::DomainValue,
        Field::DomainIpv4,
        Field::DomainIpv6,
        Field::DomainSubdomains,
        Field::WhoisTld,
        Field::WhoisStatus,
        Field::WhoisCreated,
        Field::WhoisChanged,
        Field::WhoisPhones,
        Field::WhoisEmails,
        Field::WebUrl,
        Field::WebServer,
        Field::WebRating,
        Field::WebRedirects,
        Field::WebLinks,
        Field::WebJs,
    ];

    /// Store key for this field. This string is the wire contract.
    pub fn key(self) -> &'static str {
        match self {
            Field::DomainValue => "domain",
            Field::DomainIpv4 => "domain:ipv4",
            Field::DomainIpv6 => "domain:ipv6",
            Field::DomainSubdomains => "domain:subdomains",
            Field::WhoisTld => "domain:whois:tld",
            Field::WhoisStatus => "domain:whois:status",
            Field::WhoisCreated => "domain:whois:created",
            Field::WhoisChanged => "domain:whois:changed",
            Field::WhoisPhones => "domain:whois:phones",
            Field::WhoisEmails => "domain:whois:emails",
            Field::WebUrl => "domain:web:url",
            Field::WebServer => "domain:web:server",
            Field::WebRating => "domain:web:rating",
            Field::WebRedirects => "domain:web:redirects",
            Field::WebLinks => "domain:web:links",
            Field::WebJs => "domain:web:js",
        }
    }

    pub fn kind(self) -> StorageKind {
        match self {
            Field::WhoisStatus => StorageKind::Flag,
            Field::DomainSubdomains
            | Field::WhoisPhones
            | Field::WhoisEmails
            | Field::WebRedirects
            | Field::WebLinks
            | Field::WebJs => StorageKind::List,
            _ => StorageKind::Scalar,
        }
    }

    /// Dotted position inside the record, used in log events.
    pub fn path(self) -> &'static str {
        match self {
            Field::DomainValue => "domain.value",
            Field::DomainIpv4 => "domain.ipv4",
            Field::DomainIpv6 => "domain.ipv6",
            Field::DomainSubdomains => "domain.subdomains",
            Field::WhoisTld => "domain.whois.tld",
            Field::WhoisStatus => "domain.whois.status",
            Field::WhoisCreated => "domain.whois.created",
            Field::WhoisChanged => "domain.whois.changed",
            Field::WhoisPhones => "domain.whois.phones",
            Field::WhoisEmails => "domain.whois.emails",
            Field::WebUrl => "domain.web.url",
            Field::WebServer => "domain.web.server",
            Field::WebRating => "domain.web.rating",
            Field::WebRedirects => "domain.web.redirects",
            Field::WebLinks => "domain.web.links",
            Field::WebJs => "domain.web.js",
        }
    }

    /// Inverse of [`Field::key`]. Returns None for keys outside the namespace.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.key() == key)
    }
}

/// Store representation of a boolean field.
#[inline]
pub fn encode_flag(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

/// Only the exact string `"true"` decodes to true; anything else is false.
#[inline]
pub fn decode_flag(raw: &str) -> bool {
    raw == "true"
}
