//! CIGAR and MPEG-G extended CIGAR (ECIGAR) transcoding.
//!
//! ECIGAR is the alignment description carried by MPEG-G records. Relative to SAM
//! CIGAR it uses different operation symbols and wraps clips in brackets:
//!
//! | CIGAR      | ECIGAR      |
//! |------------|-------------|
//! | `M`, `=`, `X` | `=`      |
//! | `I`        | `+`         |
//! | `D`        | `-`         |
//! | `N`        | `*`         |
//! | `nS`       | `(n)`       |
//! | `nH`       | `[n]`       |
//!
//! ECIGAR may additionally carry inline substituted bases (`10=A5=`) and the splice
//! variants `%` and `/`; when converting back, inline bases count towards the
//! surrounding `M` run and both splice variants become `N`.
//!
//! For CIGARs over `{M, I, D, N, S, H}` the two conversions are inverse to each other,
//! including runs of adjacent `M` operations.

use crate::errors::{Result, TranscodeError};

/// Marker in [`CIGAR_TO_ECIGAR`] for operations that are not representable.
const INVALID: u8 = 0;

const fn build_cigar_to_ecigar() -> [u8; 256] {
    let mut table = [INVALID; 256];
    table[b'M' as usize] = b'=';
    table[b'=' as usize] = b'=';
    table[b'X' as usize] = b'=';
    table[b'I' as usize] = b'+';
    table[b'D' as usize] = b'-';
    table[b'N' as usize] = b'*';
    table[b'S' as usize] = b')';
    table[b'H' as usize] = b']';
    table
}

const fn build_ecigar_to_cigar() -> [u8; 256] {
    let mut table = [INVALID; 256];
    table[b'=' as usize] = b'M';
    table[b'+' as usize] = b'I';
    table[b'-' as usize] = b'D';
    table[b'*' as usize] = b'N';
    table[b'%' as usize] = b'N';
    table[b'/' as usize] = b'N';
    table[b')' as usize] = b'S';
    table[b']' as usize] = b'H';
    table
}

/// CIGAR operation byte to ECIGAR operation byte.
static CIGAR_TO_ECIGAR: [u8; 256] = build_cigar_to_ecigar();

/// ECIGAR operation byte to CIGAR operation byte.
static ECIGAR_TO_CIGAR: [u8; 256] = build_ecigar_to_cigar();

fn invalid(token: u8, cigar: &str) -> TranscodeError {
    TranscodeError::InvalidCigarToken { token: char::from(token), cigar: cigar.to_string() }
}

/// Convert a SAM CIGAR string to ECIGAR.
///
/// A `"*"` CIGAR is passed through unchanged.
///
/// # Errors
///
/// Returns [`TranscodeError::InvalidCigarToken`] for any operation outside
/// `M = X I D N S H` (including `P`) and for an operation without a length.
///
/// # Examples
///
/// ```
/// use mgtranscode_lib::cigar::cigar_to_ecigar;
///
/// assert_eq!(cigar_to_ecigar("5S10M2I3D").unwrap(), "(5)10=2+3-");
/// assert!(cigar_to_ecigar("5M1P5M").is_err());
/// ```
pub fn cigar_to_ecigar(cigar: &str) -> Result<String> {
    if cigar == "*" {
        return Ok(cigar.to_string());
    }

    let mut ecigar = String::with_capacity(cigar.len() + 4);
    let mut run_start = 0;
    for (i, &byte) in cigar.as_bytes().iter().enumerate() {
        if byte.is_ascii_digit() {
            continue;
        }
        let op = CIGAR_TO_ECIGAR[byte as usize];
        if op == INVALID || run_start == i {
            return Err(invalid(byte, cigar));
        }
        let count = &cigar[run_start..i];
        match op {
            b')' => ecigar.push('('),
            b']' => ecigar.push('['),
            _ => {}
        }
        ecigar.push_str(count);
        ecigar.push(char::from(op));
        run_start = i + 1;
    }

    if run_start != cigar.len() {
        return Err(TranscodeError::InvalidCigarToken {
            token: cigar.chars().last().unwrap_or('?'),
            cigar: cigar.to_string(),
        });
    }
    Ok(ecigar)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Token {
    Start,
    Match,
    Base,
    Other,
}

/// Convert an ECIGAR string back to a SAM CIGAR.
///
/// Inline substitution bases are folded into the enclosing `M` run. Two `=` runs that
/// are directly adjacent are kept as separate `M` operations.
///
/// # Errors
///
/// Returns [`TranscodeError::InvalidCigarToken`] for an unknown operation byte.
///
/// # Examples
///
/// ```
/// use mgtranscode_lib::cigar::ecigar_to_cigar;
///
/// assert_eq!(ecigar_to_cigar("(5)10=2+3-").unwrap(), "5S10M2I3D");
/// assert_eq!(ecigar_to_cigar("10=A5=").unwrap(), "16M");
/// ```
pub fn ecigar_to_cigar(ecigar: &str) -> Result<String> {
    if ecigar == "*" {
        return Ok(ecigar.to_string());
    }

    let mut cigar = String::with_capacity(ecigar.len());
    let mut count: u64 = 0;
    let mut matches: u64 = 0;
    let mut last = Token::Start;

    let flush = |cigar: &mut String, matches: &mut u64| {
        if *matches > 0 {
            cigar.push_str(&matches.to_string());
            cigar.push('M');
            *matches = 0;
        }
    };

    for &byte in ecigar.as_bytes() {
        match byte {
            b'0'..=b'9' => count = count * 10 + u64::from(byte - b'0'),
            b'(' | b'[' => {}
            b'=' => {
                if last == Token::Match {
                    flush(&mut cigar, &mut matches);
                }
                matches += count;
                count = 0;
                last = Token::Match;
            }
            b'A' | b'C' | b'G' | b'T' | b'N' => {
                matches += 1;
                last = Token::Base;
            }
            _ => {
                let op = ECIGAR_TO_CIGAR[byte as usize];
                if op == INVALID {
                    return Err(invalid(byte, ecigar));
                }
                flush(&mut cigar, &mut matches);
                cigar.push_str(&count.to_string());
                cigar.push(char::from(op));
                count = 0;
                last = Token::Other;
            }
        }
    }
    flush(&mut cigar, &mut matches);
    Ok(cigar)
}

/// Number of reference bases consumed by a CIGAR (`M`, `=`, `X`, `D`, `N`).
///
/// Returns 0 for `"*"`. Operations that do not consume the reference are skipped.
///
/// ```
/// use mgtranscode_lib::cigar::mapped_length;
///
/// assert_eq!(mapped_length("5S10M2I3D4N"), 17);
/// assert_eq!(mapped_length("*"), 0);
/// ```
#[must_use]
pub fn mapped_length(cigar: &str) -> u64 {
    let mut total = 0;
    let mut count: u64 = 0;
    for &byte in cigar.as_bytes() {
        if byte.is_ascii_digit() {
            count = count * 10 + u64::from(byte - b'0');
            continue;
        }
        if matches!(byte, b'M' | b'=' | b'X' | b'D' | b'N') {
            total += count;
        }
        count = 0;
    }
    total
}
