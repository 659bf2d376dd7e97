//! Writing S3 response documents.
//!
//! Follows the AWS RestXml conventions: namespace
//! `http://s3.amazonaws.com/doc/2006-03-01/`, an XML declaration, RFC 3339
//! timestamps in UTC. Error documents are written without a namespace, the
//! way S3 emits them.

use std::io::{self, Write};

use chrono::SecondsFormat;
use quick_xml::Writer;
use quick_xml::events::{BytesText, Event};
use silo_s3_model::types::{CopyObjectResult, ErrorResponse, Tagging};

use crate::error::XmlError;

/// The S3 XML namespace.
pub const S3_NAMESPACE: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

/// Trait for serializing S3 types to XML.
///
/// Implementors write their content as child elements inside the current
/// element; the root element and namespace are handled by [`to_xml`].
///
/// Uses `io::Result` because `quick_xml::Writer` closures require
/// `io::Result<()>`.
pub trait S3Serialize {
    /// Serialize this value as XML child elements into the given writer.
    ///
    /// # Errors
    ///
    /// Returns `io::Error` if writing to the underlying writer fails.
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()>;
}

/// Serialize a value as a namespaced S3 XML document.
///
/// # Errors
///
/// Returns `XmlError` if serialization fails.
pub fn to_xml<T: S3Serialize>(root_element: &str, value: &T) -> Result<Vec<u8>, XmlError> {
    write_document(root_element, Some(S3_NAMESPACE), value)
}

/// Serialize a value as an S3 XML document without a namespace attribute.
///
/// Error documents are emitted this way.
///
/// # Errors
///
/// Returns `XmlError` if serialization fails.
pub fn to_xml_plain<T: S3Serialize>(root_element: &str, value: &T) -> Result<Vec<u8>, XmlError> {
    write_document(root_element, None, value)
}

fn write_document<T: S3Serialize>(
    root_element: &str,
    namespace: Option<&str>,
    value: &T,
) -> Result<Vec<u8>, XmlError> {
    let mut buf = Vec::with_capacity(256);
    let mut writer = Writer::new(&mut buf);

    writer.write_event(Event::Decl(quick_xml::events::BytesDecl::new(
        "1.0",
        Some("UTF-8"),
        None,
    )))?;

    let element = writer.create_element(root_element);
    let element = match namespace {
        Some(ns) => element.with_attribute(("xmlns", ns)),
        None => element,
    };
    element.write_inner_content(|w| value.serialize_xml(w))?;

    Ok(buf)
}

/// Write a simple `<tag>text</tag>` element.
fn write_text_element<W: Write>(writer: &mut Writer<W>, tag: &str, text: &str) -> io::Result<()> {
    writer
        .create_element(tag)
        .write_text_content(BytesText::new(text))?;
    Ok(())
}

/// Format a timestamp the way S3 response bodies expect it.
fn format_timestamp(ts: &chrono::DateTime<chrono::Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl S3Serialize for CopyObjectResult {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "LastModified", &format_timestamp(&self.last_modified))?;
        write_text_element(writer, "ETag", &self.e_tag)?;
        Ok(())
    }
}

impl S3Serialize for ErrorResponse {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "Code", &self.code)?;
        write_text_element(writer, "Message", &self.message)?;
        write_text_element(writer, "Resource", &self.resource)?;
        write_text_element(writer, "RequestId", &self.request_id)?;
        Ok(())
    }
}

impl S3Serialize for Tagging {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        writer.create_element("TagSet").write_inner_content(|w| {
            for tag in &self.tag_set {
                w.create_element("Tag").write_inner_content(|w| {
                    write_text_element(w, "Key", &tag.key)?;
                    write_text_element(w, "Value", &tag.value)?;
                    Ok(())
                })?;
            }
            Ok(())
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use silo_s3_model::types::Tag;

    #[test]
    fn test_should_serialize_copy_object_result() {
        let result = CopyObjectResult {
            last_modified: chrono::Utc
                .with_ymd_and_hms(2024, 3, 1, 12, 30, 0)
                .single()
                .expect("valid timestamp"),
            e_tag: "d41d8cd98f00b204e9800998ecf8427e".to_owned(),
        };

        let xml = to_xml("CopyObjectResult", &result).expect("serialize");
        let xml = String::from_utf8(xml).expect("utf-8");

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains(
            "<CopyObjectResult xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">"
        ));
        assert!(xml.contains("<LastModified>2024-03-01T12:30:00Z</LastModified>"));
        assert!(xml.contains("<ETag>d41d8cd98f00b204e9800998ecf8427e</ETag>"));
    }

    #[test]
    fn test_should_serialize_error_response_without_namespace() {
        let err = ErrorResponse {
            code: "NoSuchKey".to_owned(),
            message: "The specified key does not exist.".to_owned(),
            resource: "/bucket/key".to_owned(),
            request_id: "req-42".to_owned(),
        };

        let xml = to_xml_plain("Error", &err).expect("serialize");
        let xml = String::from_utf8(xml).expect("utf-8");

        assert!(xml.contains("<Error>"));
        assert!(!xml.contains("xmlns"));
        assert!(xml.contains("<Code>NoSuchKey</Code>"));
        assert!(xml.contains("<Resource>/bucket/key</Resource>"));
        assert!(xml.contains("<RequestId>req-42</RequestId>"));
    }

    #[test]
    fn test_should_escape_error_message_text() {
        let err = ErrorResponse {
            code: "InternalError".to_owned(),
            message: "size < expected".to_owned(),
            resource: "/b/o".to_owned(),
            request_id: "req-1".to_owned(),
        };

        let xml = to_xml_plain("Error", &err).expect("serialize");
        let xml = String::from_utf8(xml).expect("utf-8");
        assert!(xml.contains("size &lt; expected"));
    }

    #[test]
    fn test_should_serialize_tagging_document() {
        let doc = Tagging {
            tag_set: vec![
                Tag {
                    key: "env".to_owned(),
                    value: "prod".to_owned(),
                },
                Tag {
                    key: "team".to_owned(),
                    value: "storage".to_owned(),
                },
            ],
        };

        let xml = to_xml("Tagging", &doc).expect("serialize");
        let xml = String::from_utf8(xml).expect("utf-8");

        assert!(xml.contains("<TagSet><Tag><Key>env</Key><Value>prod</Value></Tag>"));
        assert!(xml.contains("<Tag><Key>team</Key><Value>storage</Value></Tag></TagSet>"));
    }
}
