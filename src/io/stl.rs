// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! STL codec, ASCII and binary.
//!
//! # Binary layout
//!
//! ```text
//! UINT8[80]    header, ignored on read
//! UINT32       triangle count
//! foreach triangle
//!     T[3]     normal
//!     T[9]     three vertices
//!     UINT16   external id
//! ```
//!
//! `T` is the scalar type of the loading system, so `f64` systems read and
//! write 8-byte coordinates. Files are written in host byte order; on read the
//! triangle count is tried little-endian first, then big-endian, against the
//! file length.

use super::MeshFormat;
use crate::error::{Error, Result};
use crate::geometry::{format_significant, Facet, Real, TriangleId};
use nalgebra::{Point3, Vector3};
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Binary header size in bytes.
const HEADER_SIZE: usize = 80;

/// Written into the binary header, NUL padded.
const HEADER_TEXT: &[u8] = b"meshgroup binary stl";

/// Solid name used by the ASCII writer.
const SOLID_NAME: &str = "model1";

type Parse<V> = std::result::Result<V, String>;

const ID_SPACE_EXHAUSTED: &str = "triangle id space exhausted";

/// Mesh-local id of the `offset`-th triangle read after `id_base`.
fn facet_id(id_base: TriangleId, offset: usize) -> Parse<TriangleId> {
    u32::try_from(offset)
        .ok()
        .and_then(|offset| id_base.checked_add(offset))
        .ok_or_else(|| ID_SPACE_EXHAUSTED.to_string())
}

/// Bytes per triangle record for scalar type `T`.
pub fn record_size<T: Real>() -> usize {
    12 * T::BYTES + 2
}

/// Load one file in the given dialect.
///
/// Triangles receive mesh-local ids `id_base, id_base + 1, ...` and every
/// coordinate is multiplied by `scale`.
pub fn load_stl<T: Real>(
    path: &Path,
    format: MeshFormat,
    id_base: TriangleId,
    scale: T,
) -> Result<Vec<Facet<T>>> {
    let mut file = File::open(path).map_err(|source| Error::FileOpen {
        path: path.to_path_buf(),
        source,
    })?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;

    let facets = match format {
        MeshFormat::StlBinary => decode_binary(&bytes, id_base, scale),
        MeshFormat::StlAscii => decode_ascii(&String::from_utf8_lossy(&bytes), id_base, scale),
    }
    .map_err(|reason| {
        if reason == ID_SPACE_EXHAUSTED {
            Error::InvalidArgument(reason)
        } else {
            Error::malformed(path, reason)
        }
    })?;

    info!(
        path = %path.display(),
        format = %format,
        triangles = facets.len(),
        "Loaded mesh file"
    );
    Ok(facets)
}

/// Load several files back to back, continuing the id sequence across files.
pub fn load_files<T: Real>(
    paths: &[PathBuf],
    id_base: TriangleId,
    scale: T,
) -> Result<Vec<Facet<T>>> {
    let mut facets = Vec::new();
    for path in paths {
        let format = MeshFormat::from_path(path)?;
        let base = u32::try_from(facets.len())
            .ok()
            .and_then(|loaded| id_base.checked_add(loaded))
            .ok_or_else(|| Error::InvalidArgument(ID_SPACE_EXHAUSTED.into()))?;
        facets.extend(load_stl(path, format, base, scale)?);
    }
    Ok(facets)
}

/// Decode a binary image.
pub fn decode_binary<T: Real>(bytes: &[u8], id_base: TriangleId, scale: T) -> Parse<Vec<Facet<T>>> {
    if bytes.len() < HEADER_SIZE + 4 {
        return Err(format!(
            "{} bytes is shorter than the {}-byte header",
            bytes.len(),
            HEADER_SIZE + 4
        ));
    }

    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[HEADER_SIZE..HEADER_SIZE + 4]);
    let record = record_size::<T>() as u64;
    let body = (bytes.len() - HEADER_SIZE - 4) as u64;

    let count_le = u32::from_le_bytes(raw);
    let count_be = u32::from_be_bytes(raw);
    let (count, big_endian) = if u64::from(count_le) * record == body {
        (count_le, false)
    } else if u64::from(count_be) * record == body {
        (count_be, true)
    } else if u64::from(count_le) * record < body {
        warn!(
            trailing = body - u64::from(count_le) * record,
            "Ignoring trailing bytes after last triangle record"
        );
        (count_le, false)
    } else {
        return Err(format!(
            "header announces {} triangles but only {} bytes of records follow",
            count_le, body
        ));
    };

    let record = record as usize;
    let scalar = |chunk: &[u8], i: usize| T::decode(&chunk[i * T::BYTES..], big_endian);
    let mut facets = Vec::with_capacity(count as usize);
    for (i, chunk) in bytes[HEADER_SIZE + 4..]
        .chunks_exact(record)
        .take(count as usize)
        .enumerate()
    {
        let normal = Vector3::new(scalar(chunk, 0), scalar(chunk, 1), scalar(chunk, 2));
        let corner = |k: usize| {
            Point3::new(
                scalar(chunk, 3 + 3 * k),
                scalar(chunk, 4 + 3 * k),
                scalar(chunk, 5 + 3 * k),
            ) * scale
        };
        let tag = [chunk[record - 2], chunk[record - 1]];
        let external_id = if big_endian {
            u16::from_be_bytes(tag)
        } else {
            u16::from_le_bytes(tag)
        };

        let id = facet_id(id_base, i)?;
        let facet = Facet::with_normal([corner(0), corner(1), corner(2)], normal, id)
            .with_external_id(i32::from(external_id));
        facets.push(facet);
    }
    Ok(facets)
}

fn expect_token<'a, I>(tokens: &mut I, word: &str) -> Parse<()>
where
    I: Iterator<Item = &'a str>,
{
    match tokens.next() {
        Some(token) if token.eq_ignore_ascii_case(word) => Ok(()),
        Some(token) => Err(format!("expected `{}`, found `{}`", word, token)),
        None => Err(format!("expected `{}`, found end of file", word)),
    }
}

fn parse_triple<'a, I>(tokens: &mut I, what: &str) -> Parse<[f64; 3]>
where
    I: Iterator<Item = &'a str>,
{
    let mut values = [0.0; 3];
    for value in &mut values {
        let token = tokens
            .next()
            .ok_or_else(|| format!("{} truncated at end of file", what))?;
        *value = token
            .parse::<f64>()
            .map_err(|e| format!("invalid {} component `{}`: {}", what, token, e))?;
    }
    Ok(values)
}

/// Decode ASCII text. Several `solid` blocks may follow each other.
pub fn decode_ascii<T: Real>(text: &str, id_base: TriangleId, scale: T) -> Parse<Vec<Facet<T>>> {
    let mut tokens = text.split_whitespace().peekable();
    let mut facets = Vec::new();

    while let Some(token) = tokens.next() {
        match token.to_ascii_lowercase().as_str() {
            "solid" | "endsolid" => {
                // Skip the optional (possibly multi-word) solid name
                while let Some(next) = tokens.peek() {
                    let next = next.to_ascii_lowercase();
                    if next == "facet" || next == "solid" || next == "endsolid" {
                        break;
                    }
                    tokens.next();
                }
            }
            "facet" => {
                expect_token(&mut tokens, "normal")?;
                let n = parse_triple(&mut tokens, "normal")?;
                expect_token(&mut tokens, "outer")?;
                expect_token(&mut tokens, "loop")?;
                let mut corners = [Point3::origin(); 3];
                for corner in &mut corners {
                    expect_token(&mut tokens, "vertex")?;
                    let v = parse_triple(&mut tokens, "vertex")?;
                    *corner = Point3::new(T::narrow(v[0]), T::narrow(v[1]), T::narrow(v[2])) * scale;
                }
                expect_token(&mut tokens, "endloop")?;
                expect_token(&mut tokens, "endfacet")?;

                let normal = Vector3::new(T::narrow(n[0]), T::narrow(n[1]), T::narrow(n[2]));
                let id = facet_id(id_base, facets.len())?;
                facets.push(Facet::with_normal(corners, normal, id));
            }
            other => return Err(format!("unexpected token `{}`", other)),
        }
    }
    Ok(facets)
}

/// Encode facets as a binary image in host byte order.
pub fn encode_binary<T: Real>(facets: &[Facet<T>]) -> Result<Vec<u8>> {
    // Validate every tag before producing any output
    let tags = facets
        .iter()
        .map(|facet| {
            let external_id = facet.external_id.unwrap_or(0);
            u16::try_from(external_id).map_err(|_| Error::ExternalIdOutOfRange {
                triangle: facet.id,
                external_id,
            })
        })
        .collect::<Result<Vec<u16>>>()?;
    let count = u32::try_from(facets.len())
        .map_err(|_| Error::InvalidArgument("too many triangles for one file".into()))?;

    let mut out = Vec::with_capacity(HEADER_SIZE + 4 + facets.len() * record_size::<T>());
    out.extend_from_slice(HEADER_TEXT);
    out.resize(HEADER_SIZE, 0);
    out.extend_from_slice(&count.to_ne_bytes());
    for (facet, tag) in facets.iter().zip(tags) {
        for value in facet.normal.iter() {
            value.encode(&mut out);
        }
        for corner in &facet.vertices {
            for value in corner.coords.iter() {
                value.encode(&mut out);
            }
        }
        out.extend_from_slice(&tag.to_ne_bytes());
    }
    Ok(out)
}

/// Encode facets as ASCII with six significant digits.
pub fn encode_ascii<T: Real>(facets: &[Facet<T>]) -> String {
    let triple = |a: T, b: T, c: T| {
        format!(
            "{} {} {}",
            format_significant(a.widen()),
            format_significant(b.widen()),
            format_significant(c.widen())
        )
    };

    let mut out = String::new();
    let _ = writeln!(out, "solid {}", SOLID_NAME);
    for facet in facets {
        let n = facet.normal;
        let _ = writeln!(out, "  facet normal {}", triple(n.x, n.y, n.z));
        out.push_str("    outer loop\n");
        for v in &facet.vertices {
            let _ = writeln!(out, "      vertex {}", triple(v.x, v.y, v.z));
        }
        out.push_str("    endloop\n");
        out.push_str("  endfacet\n");
    }
    let _ = writeln!(out, "endsolid {}", SOLID_NAME);
    out
}

/// Write facets to `path` in the given dialect, in sequence order.
///
/// Nothing is created when encoding fails.
pub fn save_stl<T: Real>(path: &Path, format: MeshFormat, facets: &[Facet<T>]) -> Result<()> {
    let bytes = match format {
        MeshFormat::StlBinary => encode_binary(facets)?,
        MeshFormat::StlAscii => encode_ascii(facets).into_bytes(),
    };

    let file = File::create(path).map_err(|source| Error::FileOpen {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    writer.write_all(&bytes)?;
    writer.flush()?;

    info!(
        path = %path.display(),
        format = %format,
        triangles = facets.len(),
        "Saved mesh file"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn facets() -> Vec<Facet<f64>> {
        vec![
            Facet::new(
                [
                    Point3::new(0.0, 0.0, 0.0),
                    Point3::new(1.0, 0.0, 0.0),
                    Point3::new(0.0, 1.0, 0.0),
                ],
                0,
            )
            .with_external_id(3),
            Facet::new(
                [
                    Point3::new(0.0, 0.0, 1.0),
                    Point3::new(0.0, 1.0, 1.0),
                    Point3::new(1.0, 0.0, 1.0),
                ],
                1,
            ),
        ]
    }

    #[test]
    fn test_binary_layout() {
        let bytes = encode_binary(&facets()).unwrap();
        assert_eq!(bytes.len(), 84 + 2 * record_size::<f64>());
        assert_eq!(record_size::<f32>(), 50);
        assert!(bytes.starts_with(HEADER_TEXT));
        assert_eq!(bytes[HEADER_TEXT.len()], 0);
    }

    #[test]
    fn test_binary_decode_with_id_base_and_scale() {
        let bytes = encode_binary(&facets()).unwrap();
        let decoded: Vec<Facet<f64>> = decode_binary(&bytes, 100, 2.0).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].id, 100);
        assert_eq!(decoded[1].id, 101);
        assert_eq!(decoded[0].external_id, Some(3));
        assert_eq!(decoded[1].external_id, Some(0));
        assert_eq!(decoded[1].vertices[2], Point3::new(2.0, 0.0, 2.0));
    }

    #[test]
    fn test_binary_big_endian_detected() {
        let mut bytes = vec![0u8; HEADER_SIZE];
        bytes.extend_from_slice(&1u32.to_be_bytes());
        for value in [0.0f32, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
            bytes.extend_from_slice(&value.to_be_bytes());
        }
        bytes.extend_from_slice(&7u16.to_be_bytes());

        let decoded: Vec<Facet<f32>> = decode_binary(&bytes, 0, 1.0).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].vertices[1], Point3::new(1.0, 0.0, 0.0));
        assert_eq!(decoded[0].external_id, Some(7));
    }

    #[test]
    fn test_binary_truncated_is_rejected() {
        let mut bytes = encode_binary(&facets()).unwrap();
        bytes.truncate(bytes.len() - 10);
        assert!(decode_binary::<f64>(&bytes, 0, 1.0).is_err());
        assert!(decode_binary::<f64>(&bytes[..20], 0, 1.0).is_err());
    }

    #[test]
    fn test_id_base_near_limit_is_rejected() {
        let bytes = encode_binary(&facets()).unwrap();
        let err = decode_binary::<f64>(&bytes, u32::MAX, 1.0).unwrap_err();
        assert_eq!(err, ID_SPACE_EXHAUSTED);
        assert_eq!(decode_binary::<f64>(&bytes, u32::MAX - 1, 1.0).unwrap()[1].id, u32::MAX);

        let text = encode_ascii(&facets());
        assert!(decode_ascii::<f64>(&text, u32::MAX, 1.0).is_err());
        assert_eq!(decode_ascii::<f64>(&text, u32::MAX - 1, 1.0).unwrap().len(), 2);
    }

    #[test]
    fn test_external_id_out_of_range() {
        let mut input = facets();
        input[1].external_id = Some(70_000);
        let err = encode_binary(&input).unwrap_err();
        assert!(matches!(
            err,
            Error::ExternalIdOutOfRange {
                triangle: 1,
                external_id: 70_000
            }
        ));
        input[1].external_id = Some(-1);
        assert!(encode_binary(&input).is_err());
    }

    #[test]
    fn test_ascii_round_trip() {
        let text = encode_ascii(&facets());
        assert!(text.starts_with("solid model1\n"));
        assert!(text.trim_end().ends_with("endsolid model1"));
        assert!(text.contains("facet normal 0 0 1"));

        let decoded: Vec<Facet<f64>> = decode_ascii(&text, 5, 1.0).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].id, 5);
        assert_eq!(decoded[0].external_id, None);
        assert_relative_eq!(decoded[1].vertices[1], Point3::new(0.0, 1.0, 1.0));
    }

    #[test]
    fn test_ascii_normalises_normal_and_tolerates_names() {
        let text = "solid my part\n facet normal 0 0 4\n outer loop\n vertex 0 0 0\n \
                    vertex 1 0 0\n vertex 0 1 0\n endloop\n endfacet\nendsolid my part\n";
        let decoded: Vec<Facet<f64>> = decode_ascii(text, 0, 1.0).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_relative_eq!(decoded[0].normal, Vector3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_ascii_malformed() {
        let text = "solid x\n facet normal 0 0 1\n outer loop\n vertex 0 0\n";
        assert!(decode_ascii::<f64>(text, 0, 1.0).is_err());
        let text = "solid x\n facet normal 0 0 1\n inner loop\n";
        let err = decode_ascii::<f64>(text, 0, 1.0).unwrap_err();
        assert!(err.contains("outer"));
    }
}
