//! Parsing S3 request documents.
//!
//! The reader is event-driven: [`from_xml`] finds the root element and hands
//! off to the type's [`S3Deserialize`] implementation, which consumes child
//! events until the matching end tag. Unknown elements are skipped, matching
//! how S3 tolerates schema extensions.

use quick_xml::Reader;
use quick_xml::events::Event;
use silo_s3_model::types::{CreateBucketConfiguration, Tag, Tagging};

use crate::error::XmlError;

/// Trait for deserializing S3 types from XML.
pub trait S3Deserialize: Sized {
    /// Deserialize an instance from the given XML reader.
    ///
    /// The reader is positioned just after the opening tag of this element;
    /// the implementation reads through the matching end tag.
    ///
    /// # Errors
    ///
    /// Returns `XmlError` if the XML is malformed or required fields are
    /// missing.
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError>;
}

/// Deserialize an S3 XML document into a typed value.
///
/// # Errors
///
/// Returns `XmlError` if the XML is malformed or deserialization fails.
pub fn from_xml<T: S3Deserialize>(xml: &[u8]) -> Result<T, XmlError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event()? {
            Event::Start(_) => {
                return T::deserialize_xml(&mut reader);
            }
            Event::Eof => {
                return Err(XmlError::MissingElement("root element".to_owned()));
            }
            _ => {}
        }
    }
}

/// Read the text content of the current element and consume its end tag.
fn read_text_content(reader: &mut Reader<&[u8]>) -> Result<String, XmlError> {
    let mut text = String::new();
    loop {
        match reader.read_event()? {
            Event::Text(e) => {
                let unescaped = e
                    .unescape()
                    .map_err(|err| XmlError::ParseError(err.to_string()))?;
                text.push_str(&unescaped);
            }
            Event::End(_) => return Ok(text),
            Event::Eof => {
                return Err(XmlError::UnexpectedElement(
                    "unexpected EOF while reading text content".to_owned(),
                ));
            }
            _ => {}
        }
    }
}

/// Skip over an element and all its children.
fn skip_element(reader: &mut Reader<&[u8]>) -> Result<(), XmlError> {
    let mut depth: u32 = 1;
    loop {
        match reader.read_event()? {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
            Event::Eof => {
                return Err(XmlError::UnexpectedElement(
                    "unexpected EOF while skipping element".to_owned(),
                ));
            }
            _ => {}
        }
    }
}

impl S3Deserialize for CreateBucketConfiguration {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut config = Self::default();
        loop {
            match reader.read_event()? {
                Event::Start(e) => match e.local_name().as_ref() {
                    b"LocationConstraint" => {
                        config.location_constraint = read_text_content(reader)?;
                    }
                    _ => skip_element(reader)?,
                },
                Event::End(_) => return Ok(config),
                Event::Eof => {
                    return Err(XmlError::UnexpectedElement(
                        "unexpected EOF in CreateBucketConfiguration".to_owned(),
                    ));
                }
                _ => {}
            }
        }
    }
}

impl S3Deserialize for Tagging {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut tagging = Self::default();
        loop {
            match reader.read_event()? {
                Event::Start(e) => match e.local_name().as_ref() {
                    b"TagSet" => read_tag_set(reader, &mut tagging.tag_set)?,
                    _ => skip_element(reader)?,
                },
                Event::End(_) => return Ok(tagging),
                Event::Eof => {
                    return Err(XmlError::UnexpectedElement(
                        "unexpected EOF in Tagging".to_owned(),
                    ));
                }
                _ => {}
            }
        }
    }
}

/// Read `<Tag>` children of a `<TagSet>` element.
fn read_tag_set(reader: &mut Reader<&[u8]>, tags: &mut Vec<Tag>) -> Result<(), XmlError> {
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"Tag" => tags.push(read_tag(reader)?),
                _ => skip_element(reader)?,
            },
            Event::End(_) => return Ok(()),
            Event::Eof => {
                return Err(XmlError::UnexpectedElement(
                    "unexpected EOF in TagSet".to_owned(),
                ));
            }
            _ => {}
        }
    }
}

/// Read one `<Tag><Key/><Value/></Tag>` element.
fn read_tag(reader: &mut Reader<&[u8]>) -> Result<Tag, XmlError> {
    let mut key = None;
    let mut value = None;
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"Key" => key = Some(read_text_content(reader)?),
                b"Value" => value = Some(read_text_content(reader)?),
                _ => skip_element(reader)?,
            },
            Event::End(_) => {
                return Ok(Tag {
                    key: key.ok_or_else(|| XmlError::MissingElement("Tag/Key".to_owned()))?,
                    value: value.unwrap_or_default(),
                });
            }
            Event::Eof => {
                return Err(XmlError::UnexpectedElement(
                    "unexpected EOF in Tag".to_owned(),
                ));
            }
            _ => {}
        }
    }
}
