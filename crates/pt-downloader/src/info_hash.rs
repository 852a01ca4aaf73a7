//! Info-hash computation for `.torrent` metainfo files (§4.D step 7).

use bendy::decoding::{FromBencode as _, ResultExt as _};
use sha1::{Digest as _, Sha1};

use crate::error::{DownloaderError, Result};

/// Compute the SHA-1 info hash of a bencoded `.torrent` file.
///
/// Walks the top-level dictionary for the `info` key, re-serializes just
/// that sub-dictionary in its original byte range, and hashes it — the
/// standard BitTorrent info-hash derivation.
///
/// # Errors
///
/// Returns [`DownloaderError::OperationFailed`] if `bytes` is not a valid
/// bencoded dictionary or has no `info` key.
pub fn compute_info_hash(bytes: &[u8]) -> Result<String> {
    compute(bytes).map_err(|source| DownloaderError::OperationFailed {
        operation: "compute_info_hash",
        downloader_name: "local".to_string(),
        source: Box::new(source),
    })
}

fn compute(bytes: &[u8]) -> std::result::Result<String, bendy::decoding::Error> {
    let mut decoder = bendy::decoding::Decoder::new(bytes);
    let Some(object) = decoder.next_object().context("next_object")? else {
        return Err(bendy::decoding::Error::missing_field("torrent"));
    };

    let mut dict = object.try_into_dictionary().context("torrent dictionary")?;
    while let Some(pair) = dict.next_pair().context("dict pair")? {
        if let (b"info", value) = pair {
            let info_dict = value.try_into_dictionary().context("info dictionary")?;
            let info_bytes = info_dict.into_raw().context("info dictionary bytes")?;
            let mut hasher = Sha1::new();
            hasher.update(info_bytes);
            return Ok(format!("{:x}", hasher.finalize()));
        }
    }

    Err(bendy::decoding::Error::missing_field("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bencode_string(value: &str) -> Vec<u8> {
        format!("{}:{value}", value.len()).into_bytes()
    }

    fn bencode_dict(pairs: &[(&str, &str)]) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(b'd');
        for (key, value) in pairs {
            out.extend(bencode_string(key));
            out.extend(bencode_string(value));
        }
        out.push(b'e');
        out
    }

    #[test]
    fn computes_hash_for_minimal_torrent() {
        let info = bencode_dict(&[("name", "movie.mkv"), ("length", "1")]);
        let mut torrent = Vec::new();
        torrent.push(b'd');
        torrent.extend(b"4:info");
        torrent.extend(&info);
        torrent.push(b'e');

        let hash = compute_info_hash(&torrent).unwrap();
        assert_eq!(hash.len(), 40);
    }

    #[test]
    fn missing_info_key_is_rejected() {
        let torrent = bencode_dict(&[("announce", "https://example.invalid")]);
        assert!(compute_info_hash(&torrent).is_err());
    }

    #[test]
    fn same_info_dict_hashes_identically() {
        let info = bencode_dict(&[("name", "a"), ("length", "1")]);
        let mut first = Vec::new();
        first.push(b'd');
        first.extend(b"4:info");
        first.extend(&info);
        first.extend(bencode_string("announce"));
        first.extend(bencode_string("https://example.test/"));
        first.push(b'e');

        let mut second = Vec::new();
        second.push(b'd');
        second.extend(b"4:info");
        second.extend(&info);
        second.push(b'e');

        assert_eq!(compute_info_hash(&first).unwrap(), compute_info_hash(&second).unwrap());
    }
}
