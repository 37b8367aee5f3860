// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Scalar abstraction over single and double precision.
//!
//! One system instance picks one scalar type; the binary codec writes
//! coordinates with the width of that type.

use nalgebra::RealField;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

/// Floating-point scalar usable for coordinates.
pub trait Real:
    RealField + Copy + Default + fmt::Display + Serialize + DeserializeOwned + Send + Sync
{
    /// Encoded width in the binary mesh dialect.
    const BYTES: usize;

    /// Converts an `f64` literal or parsed value into this scalar.
    fn narrow(value: f64) -> Self;

    /// Converts this scalar to `f64`.
    fn widen(self) -> f64;

    fn infinity() -> Self;

    fn neg_infinity() -> Self;

    /// Decodes one scalar from exactly [`Real::BYTES`] bytes.
    fn decode(bytes: &[u8], big_endian: bool) -> Self;

    /// Appends this scalar in host-native byte order.
    fn encode(self, out: &mut Vec<u8>);

    /// Absolute value without going through the overlapping `abs` methods of
    /// the numeric supertraits.
    fn magnitude(self) -> Self {
        if self < Self::narrow(0.0) {
            -self
        } else {
            self
        }
    }
}

impl Real for f32 {
    const BYTES: usize = 4;

    fn narrow(value: f64) -> Self {
        value as f32
    }

    fn widen(self) -> f64 {
        self as f64
    }

    fn infinity() -> Self {
        f32::INFINITY
    }

    fn neg_infinity() -> Self {
        f32::NEG_INFINITY
    }

    fn decode(bytes: &[u8], big_endian: bool) -> Self {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&bytes[..4]);
        if big_endian {
            f32::from_be_bytes(raw)
        } else {
            f32::from_le_bytes(raw)
        }
    }

    fn encode(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_ne_bytes());
    }
}

impl Real for f64 {
    const BYTES: usize = 8;

    fn narrow(value: f64) -> Self {
        value
    }

    fn widen(self) -> f64 {
        self
    }

    fn infinity() -> Self {
        f64::INFINITY
    }

    fn neg_infinity() -> Self {
        f64::NEG_INFINITY
    }

    fn decode(bytes: &[u8], big_endian: bool) -> Self {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes[..8]);
        if big_endian {
            f64::from_be_bytes(raw)
        } else {
            f64::from_le_bytes(raw)
        }
    }

    fn encode(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_ne_bytes());
    }
}

/// Formats a value with six significant digits, switching to exponent
/// notation for very large or very small magnitudes.
pub fn format_significant(value: f64) -> String {
    const DIGITS: i32 = 6;

    if value == 0.0 || !value.is_finite() {
        return if value == 0.0 {
            "0".to_string()
        } else {
            value.to_string()
        };
    }

    let exponent = value.abs().log10().floor() as i32;
    if exponent < -5 || exponent >= DIGITS {
        let text = format!("{:.*e}", (DIGITS - 1) as usize, value);
        let (mantissa, exp) = match text.split_once('e') {
            Some(parts) => parts,
            None => return text,
        };
        let exp: i32 = exp.parse().unwrap_or(0);
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_fraction(mantissa), sign, exp.abs())
    } else {
        let decimals = (DIGITS - 1 - exponent).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}
