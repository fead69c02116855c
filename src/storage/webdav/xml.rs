use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::reader::Reader;
use std::str;

use crate::errors::{Result, StorageError};
use crate::models::FileMetadata;

/// Parses a PROPFIND multistatus body into one [`FileMetadata`] per
/// `<response>` entry. Collections are reported like any other resource,
/// with `is_collection` set. A multistatus with zero responses yields an
/// empty vector.
pub(crate) fn parse_multistatus(xml_text: &str) -> Result<Vec<FileMetadata>> {
    let mut reader = Reader::from_str(xml_text);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut current: Option<FileMetadata> = None;
    let mut current_element = String::new();
    let mut saw_multistatus = false;
    let mut in_propstat = false;
    let mut in_resourcetype = false;
    let mut in_privilege = false;

    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = local_name(&e)?;

                match name.as_str() {
                    "multistatus" => saw_multistatus = true,
                    "response" => current = Some(FileMetadata::default()),
                    "propstat" => in_propstat = true,
                    "resourcetype" => in_resourcetype = true,
                    "privilege" => in_privilege = true,
                    "collection" if in_resourcetype => {
                        if let Some(ref mut entry) = current {
                            entry.is_collection = true;
                        }
                    }
                    _ if in_privilege => {
                        if let Some(ref mut entry) = current {
                            entry.privileges.push(name);
                        }
                    }
                    _ => current_element = name,
                }
            }
            Ok(Event::Empty(e)) => {
                let name = local_name(&e)?;

                // Self-closing elements never get an End event, so container
                // flags must not be set here.
                match name.as_str() {
                    "multistatus" => saw_multistatus = true,
                    "response" => entries.push(FileMetadata::default()),
                    "collection" if in_resourcetype => {
                        if let Some(ref mut entry) = current {
                            entry.is_collection = true;
                        }
                    }
                    _ if in_privilege => {
                        // Servers commonly express privileges as empty nested
                        // elements, e.g. <privilege><read/></privilege>.
                        if let Some(ref mut entry) = current {
                            entry.privileges.push(name);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|err| StorageError::Protocol(err.to_string()))?
                    .trim()
                    .to_string();
                if text.is_empty() {
                    buf.clear();
                    continue;
                }

                if let Some(ref mut entry) = current {
                    if in_privilege {
                        entry.privileges.push(text);
                    } else {
                        match current_element.as_str() {
                            "href" => entry.href = text,
                            "displayname" => entry.name = text,
                            "owner" => entry.owner = text,
                            "getcontenttype" => entry.content_type = text,
                            "getcontentlength" => {
                                entry.content_length = text.parse().unwrap_or_default();
                            }
                            "getlastmodified" => entry.last_modified = text,
                            "status" if in_propstat => entry.status = text,
                            _ => {}
                        }
                    }
                }
            }
            Ok(Event::End(e)) => {
                let name = local_name_from_end(&e)?;

                match name.as_str() {
                    "response" => {
                        if let Some(entry) = current.take() {
                            entries.push(entry);
                        }
                    }
                    "propstat" => in_propstat = false,
                    "resourcetype" => in_resourcetype = false,
                    "privilege" => in_privilege = false,
                    _ => {}
                }

                current_element.clear();
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(StorageError::Protocol(err.to_string())),
            _ => {}
        }

        buf.clear();
    }

    if !saw_multistatus {
        return Err(StorageError::Protocol(
            "missing multistatus root element".to_string(),
        ));
    }

    Ok(entries)
}

fn local_name(e: &BytesStart) -> Result<String> {
    let qname = e.name();
    let local = qname.local_name();
    let name = str::from_utf8(local.as_ref())
        .map_err(|err| StorageError::Protocol(format!("invalid element name: {}", err)))?;
    Ok(name.to_string())
}

fn local_name_from_end(e: &BytesEnd) -> Result<String> {
    let qname = e.name();
    let local = qname.local_name();
    let name = str::from_utf8(local.as_ref())
        .map_err(|err| StorageError::Protocol(format!("invalid element name: {}", err)))?;
    Ok(name.to_string())
}
