//! `_links` / `_embedded` shaping shared by every resource representation.

use std::collections::BTreeMap;

use serde::Serialize;

pub const API_PREFIX: &str = "api/v1/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Href {
    pub href: String,
}

/// Named links to related resources, serialized under `_links`.
pub type Links = BTreeMap<&'static str, Href>;

/// `{"image": {"_links": {"self": "<url>"}}}`, serialized under `_embedded`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Embedded {
    pub image: EmbeddedImage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbeddedImage {
    #[serde(rename = "_links")]
    pub links: SelfLink,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelfLink {
    #[serde(rename = "self")]
    pub href: String,
}

/// Builds absolute links from the public base URL.
#[derive(Debug, Clone, Copy)]
pub struct LinkBuilder<'a> {
    base: &'a str,
}

impl<'a> LinkBuilder<'a> {
    /// `base` must end with `/`.
    pub fn new(base: &'a str) -> Self {
        Self { base }
    }

    /// Link to an API resource; `segments` are percent-encoded individually.
    pub fn api(&self, segments: &[&str]) -> Href {
        let path = segments
            .iter()
            .map(|s| urlencoding::encode(s))
            .collect::<Vec<_>>()
            .join("/");
        Href {
            href: format!("{}{}{}", self.base, API_PREFIX, path),
        }
    }

    /// Absolute URL of a stored image; storage URLs pass through unchanged.
    pub fn asset(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}{}", self.base, path.trim_start_matches('/'))
    }

    pub fn embedded_image(&self, path: &str) -> Embedded {
        Embedded {
            image: EmbeddedImage {
                links: SelfLink {
                    href: self.asset(path),
                },
            },
        }
    }
}
