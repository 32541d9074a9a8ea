//! Decoding of the "name" custom section.
//!
//! The section body is a sequence of `(id, size, payload)` subsections. The
//! enumeration is lazy-friendly: [`read_name_section`] only frames the
//! subsections; per-id decoders pull names out of an individual payload, so
//! a disassembler can decode just the ids it cares about.

use super::encoding;
use super::reader::Cursor;
use crate::error::Error;
use crate::location::Span;

/// One framed subsection of the "name" section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameSubsection {
    pub id: u8,
    pub span: Span,
    pub data: Vec<u8>,
}

/// A parsed "name" custom section.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct NameSection {
    pub subsections: Vec<NameSubsection>,
}

impl NameSection {
    /// The first subsection with this id, if any.
    #[must_use]
    pub fn subsection(&self, id: u8) -> Option<&NameSubsection> {
        self.subsections.iter().find(|s| s.id == id)
    }
}

/// Frame the subsections of a "name" custom section payload. `base` is the
/// payload's offset within the whole module, for error attribution.
pub fn read_name_section(data: &[u8], base: usize) -> Result<NameSection, Error> {
    let mut cursor = Cursor::with_base(data, base);
    let mut subsections = Vec::new();
    while !cursor.is_at_end() {
        let start = cursor.pos();
        let id = cursor.read_u8()?;
        let size = cursor.read_u32_leb()? as usize;
        let payload = cursor.read_bytes(size)?;
        subsections.push(NameSubsection {
            id,
            span: cursor.span_from(start),
            data: payload.to_vec(),
        });
    }
    Ok(NameSection { subsections })
}

fn utf8(cursor: &mut Cursor) -> Result<String, Error> {
    let span = cursor.here();
    let bytes = cursor.read_string()?;
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|_| Error {
            span,
            message: "Invalid UTF-8 encoding".to_string(),
            context: Vec::new(),
        })
}

fn read_name_map(cursor: &mut Cursor) -> Result<Vec<(u32, String)>, Error> {
    let count = cursor.read_count()?;
    let mut names = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let index = cursor.read_u32_leb()?;
        names.push((index, utf8(cursor)?));
    }
    Ok(names)
}

/// Decode a module-name subsection (id 0).
pub fn module_name(subsection: &NameSubsection) -> Result<String, Error> {
    debug_assert_eq!(subsection.id, encoding::NAME_MODULE);
    let mut cursor = Cursor::with_base(&subsection.data, subsection.span.start);
    utf8(&mut cursor)
}

/// Decode a function-names subsection (id 1): `index -> name`.
pub fn function_names(subsection: &NameSubsection) -> Result<Vec<(u32, String)>, Error> {
    debug_assert_eq!(subsection.id, encoding::NAME_FUNCTION);
    let mut cursor = Cursor::with_base(&subsection.data, subsection.span.start);
    read_name_map(&mut cursor)
}

/// Decode a local-names subsection (id 2): `func -> index -> name`.
#[allow(clippy::type_complexity)]
pub fn local_names(
    subsection: &NameSubsection,
) -> Result<Vec<(u32, Vec<(u32, String)>)>, Error> {
    debug_assert_eq!(subsection.id, encoding::NAME_LOCAL);
    let mut cursor = Cursor::with_base(&subsection.data, subsection.span.start);
    let count = cursor.read_count()?;
    let mut functions = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let func = cursor.read_u32_leb()?;
        functions.push((func, read_name_map(&mut cursor)?));
    }
    Ok(functions)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a subsection: id, size, payload.
    fn subsection(id: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![id, payload.len() as u8];
        out.extend_from_slice(payload);
        out
    }

    fn name(s: &str) -> Vec<u8> {
        let mut out = vec![s.len() as u8];
        out.extend_from_slice(s.as_bytes());
        out
    }

    #[test]
    fn frames_subsections() {
        let mut data = subsection(0, &name("mod"));
        data.extend(subsection(1, &[0x00]));
        let section = read_name_section(&data, 100).unwrap();
        assert_eq!(section.subsections.len(), 2);
        assert_eq!(section.subsections[0].id, 0);
        assert_eq!(section.subsections[1].id, 1);
        assert_eq!(section.subsections[0].span.start, 100);
        assert!(section.subsection(2).is_none());
    }

    #[test]
    fn decodes_module_name() {
        let data = subsection(0, &name("my_module"));
        let section = read_name_section(&data, 0).unwrap();
        let sub = section.subsection(0).unwrap();
        assert_eq!(module_name(sub).unwrap(), "my_module");
    }

    #[test]
    fn decodes_function_names() {
        // count=2, (0, "f"), (3, "g")
        let mut payload = vec![0x02, 0x00];
        payload.extend(name("f"));
        payload.push(0x03);
        payload.extend(name("g"));
        let data = subsection(1, &payload);
        let section = read_name_section(&data, 0).unwrap();
        let names = function_names(section.subsection(1).unwrap()).unwrap();
        assert_eq!(
            names,
            vec![(0, "f".to_string()), (3, "g".to_string())]
        );
    }

    #[test]
    fn decodes_local_names() {
        // count=1, func=0, count=2, (0, "x"), (1, "y")
        let mut payload = vec![0x01, 0x00, 0x02, 0x00];
        payload.extend(name("x"));
        payload.push(0x01);
        payload.extend(name("y"));
        let data = subsection(2, &payload);
        let section = read_name_section(&data, 0).unwrap();
        let names = local_names(section.subsection(2).unwrap()).unwrap();
        assert_eq!(names.len(), 1);
        assert_eq!(names[0].0, 0);
        assert_eq!(names[0].1[1], (1, "y".to_string()));
    }

    #[test]
    fn truncated_subsection_is_an_error() {
        let data = [0x01, 0x05, 0x00]; // claims 5 payload bytes, has 1
        assert!(read_name_section(&data, 0).is_err());
    }
}
