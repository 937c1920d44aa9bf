use std::collections::HashMap;

pub type Metadata = HashMap<String, String>;

/// Metadata grouped by domain name; the default domain is `""`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetadataDomains {
    domains: HashMap<String, Metadata>,
}

impl MetadataDomains {
    pub const DEFAULT: &'static str = "";
    pub const GEOLOCATION: &'static str = "GEOLOCATION";
    pub const SUBDATASETS: &'static str = "SUBDATASETS";

    pub fn insert(&mut self, domain: &str, key: impl Into<String>, value: impl Into<String>) {
        self.domains
            .entry(domain.to_string())
            .or_default()
            .insert(key.into(), value.into());
    }

    pub fn extend(
        &mut self,
        domain: &str,
        items: impl IntoIterator<Item = (String, String)>,
    ) {
        self.domains
            .entry(domain.to_string())
            .or_default()
            .extend(items);
    }

    pub fn domain(&self, domain: &str) -> Option<&Metadata> {
        self.domains.get(domain)
    }

    pub fn item(&self, key: &str, domain: &str) -> Option<&str> {
        self.domains
            .get(domain)
            .and_then(|metadata| metadata.get(key))
            .map(String::as_str)
    }

    pub fn domain_names(&self) -> impl Iterator<Item = &str> {
        self.domains.keys().map(String::as_str)
    }
}
