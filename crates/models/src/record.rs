use serde::{Deserialize, Serialize};

/// Last-known state of one reconnaissance profile.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub domain: Domain,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub value: String,
    pub ipv4: String,
    pub ipv6: String,
    pub subdomains: Vec<String>,
    pub whois: Whois,
    pub web: Web,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Whois {
    pub tld: String,
    pub status: bool,
    /// Free-form, whatever the registry returned.
    pub created: String,
    pub changed: String,
    pub phones: Vec<String>,
    pub emails: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Web {
    pub url: String,
    pub server: String,
    pub rating: String,
    pub redirects: Vec<String>,
    pub links: Vec<String>,
    pub js: Vec<String>,
}

impl Record {
    /// True when every field still holds its zero value.
    pub fn is_empty(&self) -> bool {
        *self == Record::default()
    }
}
