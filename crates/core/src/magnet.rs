//! Magnet URI parsing, merging and synthesis.

/// Trackers attached to magnets synthesized from a bare info-hash.
pub const DEFAULT_TRACKERS: &[&str] = &[
    "udp://tracker.opentrackr.org:1337/announce",
    "udp://open.stealth.si:80/announce",
    "udp://tracker.torrent.eu.org:451/announce",
    "udp://exodus.desync.com:6969/announce",
    "udp://tracker.openbittorrent.com:6969/announce",
];

/// The components of a magnet URI this engine cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagnetParts {
    /// Exact topic, e.g. `urn:btih:<hash>`.
    pub xt: String,
    /// Display name.
    pub dn: Option<String>,
    /// Tracker URLs in first-seen order, without duplicates.
    pub trackers: Vec<String>,
}

impl MagnetParts {
    /// Render back into a magnet URI.
    pub fn to_uri(&self) -> String {
        let mut uri = format!("magnet:?xt={}", self.xt);
        if let Some(dn) = self.dn.as_deref().filter(|d| !d.is_empty()) {
            uri.push_str("&dn=");
            uri.push_str(&urlencoding::encode(dn));
        }
        for tr in &self.trackers {
            uri.push_str("&tr=");
            uri.push_str(&urlencoding::encode(tr));
        }
        uri
    }

    /// Lowercase hex info-hash of a `urn:btih:` topic.
    pub fn info_hash(&self) -> Option<String> {
        let lower = self.xt.to_ascii_lowercase();
        let hash = lower.strip_prefix("urn:btih:")?;
        normalize_info_hash(hash)
    }
}

/// Parse a magnet URI. Returns `None` when there is no `xt` parameter.
pub fn parse(magnet: &str) -> Option<MagnetParts> {
    let magnet = magnet.trim();
    let prefix = magnet.get(..8)?;
    if !prefix.eq_ignore_ascii_case("magnet:?") {
        return None;
    }
    let query = &magnet[8..];

    let mut xt = None;
    let mut dn = None;
    let mut trackers: Vec<String> = Vec::new();

    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        let key = key.to_ascii_lowercase();
        if key == "xt" || key.starts_with("xt.") {
            if xt.is_none() && !value.is_empty() {
                xt = Some(value.into_owned());
            }
        } else if key == "dn" {
            if dn.is_none() && !value.is_empty() {
                dn = Some(value.into_owned());
            }
        } else if (key == "tr" || key.starts_with("tr.")) && !value.is_empty() {
            let value = value.into_owned();
            if !trackers.contains(&value) {
                trackers.push(value);
            }
        }
    }

    Some(MagnetParts {
        xt: xt?,
        dn,
        trackers,
    })
}

/// Merge magnets that point at the same content into one with the union
/// of their trackers.
///
/// The first `xt` wins, as does the first non-empty `dn`. Inputs that do not
/// parse are skipped; `None` if none parse.
pub fn combine<S: AsRef<str>>(magnets: &[S]) -> Option<String> {
    let mut merged: Option<MagnetParts> = None;

    for parts in magnets.iter().filter_map(|m| parse(m.as_ref())) {
        match merged.as_mut() {
            None => merged = Some(parts),
            Some(acc) => {
                if acc.dn.is_none() {
                    acc.dn = parts.dn;
                }
                for tr in parts.trackers {
                    if !acc.trackers.contains(&tr) {
                        acc.trackers.push(tr);
                    }
                }
            }
        }
    }

    merged.map(|m| m.to_uri())
}

/// Build a magnet from a bare 40-hex info-hash plus the default trackers.
pub fn derive_from_info_hash(hash: &str, display_name: Option<&str>) -> Option<String> {
    let hash = hash.trim();
    if hash.len() != 40 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let parts = MagnetParts {
        xt: format!("urn:btih:{}", hash.to_ascii_lowercase()),
        dn: display_name.map(str::to_string),
        trackers: DEFAULT_TRACKERS.iter().map(|t| t.to_string()).collect(),
    };
    Some(parts.to_uri())
}

/// Lowercase hex info-hash of a magnet URI.
pub fn info_hash(magnet: &str) -> Option<String> {
    parse(magnet)?.info_hash()
}

/// A bare 40-hex run embedded in a URL (e.g. `/torrent/<hash>/name`).
pub fn hash_in_url(url: &str) -> Option<String> {
    url.split(|c: char| !c.is_ascii_hexdigit())
        .find(|token| token.len() == 40)
        .map(|token| token.to_ascii_lowercase())
}

/// Accept a 40-char hex hash or a 32-char base32 hash; emit lowercase hex.
fn normalize_info_hash(hash: &str) -> Option<String> {
    if hash.len() == 40 && hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Some(hash.to_ascii_lowercase());
    }
    if hash.len() == 32 {
        return base32_to_hex(hash);
    }
    None
}

fn base32_to_hex(input: &str) -> Option<String> {
    let mut bits: u64 = 0;
    let mut bit_count = 0u32;
    let mut out = String::with_capacity(40);

    for c in input.chars() {
        let value = match c.to_ascii_uppercase() {
            c @ 'A'..='Z' => c as u64 - 'A' as u64,
            c @ '2'..='7' => c as u64 - '2' as u64 + 26,
            _ => return None,
        };
        bits = (bits << 5) | value;
        bit_count += 5;
        if bit_count >= 8 {
            bit_count -= 8;
            let byte = (bits >> bit_count) & 0xff;
            out.push_str(&format!("{:02x}", byte));
        }
    }

    (out.len() == 40).then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "c9e15763f722f23e98a29decdfae341b98d53056";

    #[test]
    fn test_parse_full_magnet() {
        let m = format!(
            "magnet:?xt=urn:btih:{}&dn=Abbey+Road%20FLAC&tr=udp%3A%2F%2Fa.example%3A80&tr=udp://b.example:80",
            HASH.to_uppercase()
        );
        let parts = parse(&m).unwrap();
        assert_eq!(parts.xt, format!("urn:btih:{}", HASH.to_uppercase()));
        assert_eq!(parts.dn.as_deref(), Some("Abbey Road FLAC"));
        assert_eq!(
            parts.trackers,
            vec!["udp://a.example:80", "udp://b.example:80"]
        );
        assert_eq!(parts.info_hash().as_deref(), Some(HASH));
    }

    #[test]
    fn test_parse_without_xt_is_none() {
        assert!(parse("magnet:?dn=nothing&tr=udp://a.example:80").is_none());
        assert!(parse("https://example.org/?xt=urn:btih:abc").is_none());
        assert!(parse("").is_none());
    }

    #[test]
    fn test_parse_dedups_trackers() {
        let m = format!("magnet:?xt=urn:btih:{}&tr=udp://a:1&tr=udp://a:1", HASH);
        assert_eq!(parse(&m).unwrap().trackers.len(), 1);
    }

    #[test]
    fn test_combine_unions_trackers_and_keeps_xt() {
        let m1 = format!("magnet:?xt=urn:btih:{}&tr=udp://a:1&tr=udp://b:2", HASH);
        let m2 = format!("magnet:?xt=urn:btih:{}&dn=Album&tr=udp://b:2&tr=udp://c:3", HASH);

        let combined = combine(&[m1.as_str(), m2.as_str()]).unwrap();
        let parts = parse(&combined).unwrap();

        assert_eq!(parts.xt, parse(&m1).unwrap().xt);
        assert_eq!(parts.xt, parse(&m2).unwrap().xt);
        assert_eq!(parts.dn.as_deref(), Some("Album"));
        assert_eq!(parts.trackers, vec!["udp://a:1", "udp://b:2", "udp://c:3"]);
    }

    #[test]
    fn test_combine_skips_garbage() {
        let m = format!("magnet:?xt=urn:btih:{}", HASH);
        assert!(combine(&["not a magnet", m.as_str()]).is_some());
        assert!(combine(&["not a magnet"]).is_none());
        assert!(combine::<&str>(&[]).is_none());
    }

    #[test]
    fn test_derive_from_info_hash() {
        let magnet = derive_from_info_hash(&HASH.to_uppercase(), Some("Abbey Road")).unwrap();
        let parts = parse(&magnet).unwrap();
        assert_eq!(parts.xt, format!("urn:btih:{}", HASH));
        assert_eq!(parts.dn.as_deref(), Some("Abbey Road"));
        assert_eq!(parts.trackers.len(), DEFAULT_TRACKERS.len());
    }

    #[test]
    fn test_derive_rejects_bad_hash() {
        assert!(derive_from_info_hash("abc", None).is_none());
        assert!(derive_from_info_hash(&"z".repeat(40), None).is_none());
    }

    #[test]
    fn test_info_hash_from_base32() {
        // base32 of the 20 bytes 0x00..0x13
        let b32 = "AAAQEAYEAUDAOCAJBIFQYDIOB4IBCEQT";
        let m = format!("magnet:?xt=urn:btih:{}", b32);
        assert_eq!(
            info_hash(&m).as_deref(),
            Some("000102030405060708090a0b0c0d0e0f10111213")
        );
    }

    #[test]
    fn test_hash_in_url() {
        let url = format!("https://site.example/torrent/{}/abbey-road", HASH.to_uppercase());
        assert_eq!(hash_in_url(&url).as_deref(), Some(HASH));
        assert!(hash_in_url("https://site.example/torrent/12345/abbey-road").is_none());
        // 41 hex chars is not a hash
        let long = format!("https://site.example/{}a", HASH);
        assert!(hash_in_url(&long).is_none());
    }
}
