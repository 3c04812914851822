//! PROPFIND multistatus parsing
//!
//! Only the handful of DAV properties the sync engine reads are extracted.
//! Namespace prefixes are ignored; elements are matched on their local name.

use chrono::DateTime;
use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::{Result, WebDavError};

/// Request body asking for every live property.
pub const PROPFIND_ALLPROP: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<D:propfind xmlns:D="DAV:"><D:allprop/></D:propfind>"#;

/// One `<response>` element of a multistatus document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DavResource {
    pub href: String,
    pub display_name: Option<String>,
    pub content_length: Option<u64>,
    /// Epoch milliseconds.
    pub last_modified: Option<i64>,
    pub content_type: Option<String>,
    pub is_collection: bool,
}

impl DavResource {
    /// URL-decoded last segment of the href, falling back to the display name.
    pub fn name(&self) -> String {
        let segment = self
            .href
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default();

        if segment.is_empty() {
            return self.display_name.clone().unwrap_or_default();
        }

        urlencoding::decode(segment)
            .map(|decoded| decoded.into_owned())
            .unwrap_or_else(|_| segment.to_string())
    }
}

/// Parse an HTTP date (`Mon, 12 Jan 1998 09:25:56 GMT`) to epoch milliseconds.
pub fn parse_http_date(value: &str) -> Option<i64> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|dt| dt.timestamp_millis())
}

/// Parse a `207 Multi-Status` body into resources, in document order.
///
/// # Errors
///
/// Returns [`WebDavError::Xml`] if the document is not well formed.
pub fn parse_multistatus(xml: &str) -> Result<Vec<DavResource>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut resources = Vec::new();
    let mut current: Option<DavResource> = None;
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut text = String::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| WebDavError::Xml(e.to_string()))?;

        match event {
            Event::Start(e) => {
                let name = e.local_name().as_ref().to_vec();
                if name == b"response" {
                    current = Some(DavResource::default());
                }
                mark_collection(&mut current, &stack, &name);
                stack.push(name);
                text.clear();
            }
            Event::Empty(e) => {
                let name = e.local_name();
                mark_collection(&mut current, &stack, name.as_ref());
            }
            Event::Text(e) => {
                let unescaped = e.unescape().map_err(|e| WebDavError::Xml(e.to_string()))?;
                text.push_str(&unescaped);
            }
            Event::CData(e) => {
                text.push_str(&String::from_utf8_lossy(&e.into_inner()));
            }
            Event::End(_) => {
                let Some(name) = stack.pop() else {
                    return Err(WebDavError::Xml("unbalanced end tag".to_string()));
                };

                if name == b"response" {
                    if let Some(resource) = current.take() {
                        resources.push(resource);
                    }
                } else if let Some(resource) = current.as_mut() {
                    assign_property(resource, &name, text.trim());
                }
                text.clear();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(resources)
}

fn mark_collection(current: &mut Option<DavResource>, stack: &[Vec<u8>], name: &[u8]) {
    let in_resourcetype = stack.last().is_some_and(|parent| parent == b"resourcetype");
    if name == b"collection" && in_resourcetype {
        if let Some(resource) = current.as_mut() {
            resource.is_collection = true;
        }
    }
}

fn assign_property(resource: &mut DavResource, name: &[u8], value: &str) {
    if value.is_empty() {
        return;
    }

    match name {
        b"href" if resource.href.is_empty() => resource.href = value.to_string(),
        b"displayname" => resource.display_name = Some(value.to_string()),
        b"getcontentlength" => resource.content_length = value.parse().ok(),
        b"getlastmodified" => resource.last_modified = parse_http_date(value),
        b"getcontenttype" => resource.content_type = Some(value.to_string()),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:multistatus xmlns:d="DAV:">
  <d:response>
    <d:href>/dav/Music/</d:href>
    <d:propstat>
      <d:prop>
        <d:displayname>Music</d:displayname>
        <d:resourcetype><d:collection/></d:resourcetype>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
  <d:response>
    <d:href>/dav/Music/Daft%20Punk%20-%20One%20More%20Time.mp3</d:href>
    <d:propstat>
      <d:prop>
        <d:getcontentlength>5120</d:getcontentlength>
        <d:getlastmodified>Tue, 02 Jan 2024 10:00:00 GMT</d:getlastmodified>
        <d:getcontenttype>audio/mpeg</d:getcontenttype>
        <d:resourcetype/>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
  <d:response>
    <d:href>/dav/Music/Discovery/</d:href>
    <d:propstat>
      <d:prop>
        <d:resourcetype>
          <d:collection></d:collection>
        </d:resourcetype>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#;

    #[test]
    fn test_parse_listing() {
        let resources = parse_multistatus(LISTING).unwrap();
        assert_eq!(resources.len(), 3);

        assert!(resources[0].is_collection);
        assert_eq!(resources[0].display_name.as_deref(), Some("Music"));

        let song = &resources[1];
        assert!(!song.is_collection);
        assert_eq!(song.name(), "Daft Punk - One More Time.mp3");
        assert_eq!(song.content_length, Some(5120));
        assert_eq!(song.content_type.as_deref(), Some("audio/mpeg"));
        assert_eq!(song.last_modified, Some(1_704_189_600_000));

        assert!(resources[2].is_collection);
        assert_eq!(resources[2].name(), "Discovery");
    }

    #[test]
    fn test_missing_properties_stay_empty() {
        let xml = r#"<multistatus xmlns="DAV:"><response><href>/a.flac</href>
            <propstat><prop><getcontentlength/></prop><status>HTTP/1.1 404 Not Found</status></propstat>
            </response></multistatus>"#;

        let resources = parse_multistatus(xml).unwrap();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].content_length, None);
        assert_eq!(resources[0].last_modified, None);
        assert!(!resources[0].is_collection);
    }

    #[test]
    fn test_entities_are_unescaped() {
        let xml = r#"<multistatus xmlns="DAV:"><response><href>/Rock%20&amp;%20Roll/</href>
            <propstat><prop><resourcetype><collection/></resourcetype></prop></propstat>
            </response></multistatus>"#;

        let resources = parse_multistatus(xml).unwrap();
        assert_eq!(resources[0].name(), "Rock & Roll");
    }

    #[test]
    fn test_root_href_falls_back_to_display_name() {
        let resource = DavResource {
            href: "/".to_string(),
            display_name: Some("root".to_string()),
            ..Default::default()
        };
        assert_eq!(resource.name(), "root");
    }

    #[test]
    fn test_malformed_document_is_an_error() {
        let result = parse_multistatus("<multistatus><response></multistatus>");
        assert!(matches!(result, Err(WebDavError::Xml(_))));
    }

    #[test]
    fn test_parse_http_date() {
        assert_eq!(
            parse_http_date("Mon, 01 Jan 2024 00:00:00 GMT"),
            Some(1_704_067_200_000)
        );
        assert_eq!(parse_http_date("yesterday"), None);
    }
}
