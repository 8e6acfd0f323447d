//! Manuscript identifiers and the DOI transform.
//!
//! Articles are identified by a positive integer manuscript id (msid).
//! The DOI is a deterministic, reversible transform of the msid.

use crate::errors::{AppError, Result};

/// Canonical integer identifier for an article.
pub type Msid = i64;

const DOI_PREFIX: &str = "10.7554/eLife.";

/// Derive the DOI for a manuscript id.
///
/// Ids shorter than five digits are left-padded with zeroes, matching
/// the upstream production pipeline.
pub fn msid_to_doi(msid: Msid) -> Result<String> {
    if msid <= 0 {
        return Err(AppError::BadRequest {
            message: format!("manuscript id must be a positive integer, got {}", msid),
        });
    }
    Ok(format!("{}{:05}", DOI_PREFIX, msid))
}

/// Recover the manuscript id from a DOI.
pub fn doi_to_msid(doi: &str) -> Result<Msid> {
    let suffix = doi.strip_prefix(DOI_PREFIX).ok_or_else(|| AppError::BadRequest {
        message: format!("not an article DOI: {}", doi),
    })?;
    let digits = suffix.trim_start_matches('0');
    digits
        .parse::<Msid>()
        .ok()
        .filter(|msid| *msid > 0)
        .ok_or_else(|| AppError::BadRequest {
            message: format!("DOI suffix is not a manuscript id: {}", doi),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msid_to_doi_pads_short_ids() {
        assert_eq!(msid_to_doi(3).unwrap(), "10.7554/eLife.00003");
        assert_eq!(msid_to_doi(9560).unwrap(), "10.7554/eLife.09560");
    }

    #[test]
    fn test_msid_to_doi_long_ids_unpadded() {
        assert_eq!(msid_to_doi(1234567).unwrap(), "10.7554/eLife.1234567");
    }

    #[test]
    fn test_doi_round_trip() {
        for msid in [1, 3, 9560, 10627, 1234567] {
            let doi = msid_to_doi(msid).unwrap();
            assert_eq!(doi_to_msid(&doi).unwrap(), msid);
        }
    }

    #[test]
    fn test_rejects_non_positive() {
        assert!(msid_to_doi(0).is_err());
        assert!(msid_to_doi(-3).is_err());
    }

    #[test]
    fn test_rejects_foreign_doi() {
        assert!(doi_to_msid("10.1234/other.00003").is_err());
        assert!(doi_to_msid("10.7554/eLife.garbage").is_err());
        assert!(doi_to_msid("10.7554/eLife.00000").is_err());
    }
}
