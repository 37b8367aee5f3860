// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Mesh file dialect detection

use crate::error::{Error, Result};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// Bytes inspected when sniffing a `.stl` file.
const SNIFF_LEN: usize = 256;

/// Persisted mesh dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshFormat {
    StlAscii,
    StlBinary,
}

impl MeshFormat {
    /// Dialect for `path` from its extension; plain `.stl` is sniffed.
    ///
    /// `.stla` is ASCII and `.stlb` binary regardless of content.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("stla") => Ok(Self::StlAscii),
            Some("stlb") => Ok(Self::StlBinary),
            Some("stl") => Self::sniff(path),
            _ => Err(Error::UnknownFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Dialect for a path that may not exist yet: `.stl` is taken as binary.
    pub fn for_output(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("stla") => Ok(Self::StlAscii),
            Some(ext) if ext.eq_ignore_ascii_case("stlb") || ext.eq_ignore_ascii_case("stl") => {
                Ok(Self::StlBinary)
            }
            _ => Err(Error::UnknownFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Read the head of the file and decide between the two dialects.
    pub fn sniff(path: &Path) -> Result<Self> {
        let mut file = File::open(path).map_err(|source| Error::FileOpen {
            path: path.to_path_buf(),
            source,
        })?;
        let mut head = Vec::with_capacity(SNIFF_LEN);
        file.by_ref().take(SNIFF_LEN as u64).read_to_end(&mut head)?;
        Ok(Self::sniff_bytes(&head))
    }

    /// ASCII when the leading token is `solid` and the head is free of NUL
    /// bytes; binary otherwise.
    pub fn sniff_bytes(head: &[u8]) -> Self {
        let text = String::from_utf8_lossy(head);
        let leading_solid = text
            .split_whitespace()
            .next()
            .is_some_and(|token| token == "solid");
        if leading_solid && !head.contains(&0) {
            Self::StlAscii
        } else {
            Self::StlBinary
        }
    }

    /// File extension used when saving.
    pub fn extension(&self) -> &'static str {
        "stl"
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::StlAscii => "stl_a",
            Self::StlBinary => "stl_b",
        }
    }
}

impl fmt::Display for MeshFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MeshFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "stl_a" | "stla" | "ascii" => Ok(Self::StlAscii),
            "stl_b" | "stlb" | "binary" => Ok(Self::StlBinary),
            other => Err(Error::InvalidArgument(format!(
                "unknown mesh format `{}` (expected stl_a or stl_b)",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_extension_mapping() {
        assert_eq!(
            MeshFormat::from_path(Path::new("part.stla")).unwrap(),
            MeshFormat::StlAscii
        );
        assert_eq!(
            MeshFormat::from_path(Path::new("PART.STLB")).unwrap(),
            MeshFormat::StlBinary
        );
        assert!(matches!(
            MeshFormat::from_path(Path::new("part.obj")),
            Err(Error::UnknownFormat { .. })
        ));
    }

    #[test]
    fn test_sniff_bytes() {
        assert_eq!(
            MeshFormat::sniff_bytes(b"  solid cube\n facet normal 0 0 1"),
            MeshFormat::StlAscii
        );
        let mut header = b"solid but binary".to_vec();
        header.resize(84, 0);
        assert_eq!(MeshFormat::sniff_bytes(&header), MeshFormat::StlBinary);
        assert_eq!(MeshFormat::sniff_bytes(b"binary header"), MeshFormat::StlBinary);
    }

    #[test]
    fn test_sniff_file() {
        let mut file = NamedTempFile::with_suffix(".stl").unwrap();
        writeln!(file, "solid model1").unwrap();
        writeln!(file, "endsolid model1").unwrap();
        assert_eq!(MeshFormat::from_path(file.path()).unwrap(), MeshFormat::StlAscii);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("stl_a".parse::<MeshFormat>().unwrap(), MeshFormat::StlAscii);
        assert_eq!("BINARY".parse::<MeshFormat>().unwrap(), MeshFormat::StlBinary);
        assert!("obj".parse::<MeshFormat>().is_err());
    }
}
