//! `SHA256SUMS` checksum manifest.
//!
//! Pure parsing and lookup: the acquirer downloads the file and hands the
//! text in.

/// One `(hash, filename)` line of a checksum manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Lowercase hex SHA-256.
    pub sha256: String,
    pub filename: String,
}

/// Ordered checksum entries parsed from a `sha256sum`-style file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChecksumManifest {
    entries: Vec<ManifestEntry>,
}

impl ChecksumManifest {
    /// Parse `<hex>  <name>` and `<hex> *<name>` lines.
    ///
    /// Lines whose first field is not a 64-digit hex string are skipped, so
    /// comments, blank lines and signature armour never produce entries.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let entries = text
            .lines()
            .filter_map(|line| {
                let line = line.trim();
                let (hash, rest) = line.split_once(char::is_whitespace)?;
                if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
                    return None;
                }
                let name = rest.trim_start();
                let name = name.strip_prefix('*').unwrap_or(name);
                if name.is_empty() {
                    return None;
                }
                Some(ManifestEntry {
                    sha256: hash.to_ascii_lowercase(),
                    filename: name.to_string(),
                })
            })
            .collect();
        Self { entries }
    }

    /// Expected hash for `filename`, matched exactly. The first entry wins
    /// when a name appears more than once.
    #[must_use]
    pub fn lookup(&self, filename: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.filename == filename)
            .map(|e| e.sha256.as_str())
    }

    #[must_use]
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Lowercase hex encoding, the form `SHA256SUMS` uses.
#[must_use]
pub fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(char::from(HEX[(b >> 4) as usize]));
        out.push(char::from(HEX[(b & 0xf) as usize]));
    }
    out
}
