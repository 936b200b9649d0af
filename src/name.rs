use core::fmt;

/// The on-disk 8.3 name: 8 name bytes then 3 extension bytes, space padded.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct ShortName(pub [u8; 11]);

impl ShortName {
    pub const LEN: usize = 11;
    pub const BASE_LEN: usize = 8;
    pub const EXTENSION_LEN: usize = 3;

    pub const DOT: Self = Self(*b".          ");
    pub const DOT_DOT: Self = Self(*b"..         ");

    pub fn new(base: [u8; 8], extension: [u8; 3]) -> Self {
        let mut raw = [b' '; Self::LEN];
        raw[..Self::BASE_LEN].copy_from_slice(&base);
        raw[Self::BASE_LEN..].copy_from_slice(&extension);
        Self(raw)
    }

    /// Converts one path segment to its on-disk form.
    ///
    /// An 11-byte segment without a dot is already in on-disk form (for
    /// example `"file1   txt"`) and is used verbatim. Anything else is read as
    /// `NAME.EXT` and padded or truncated to 8+3.
    pub fn from_segment(segment: &str) -> Self {
        match segment {
            "." => return Self::DOT,
            ".." => return Self::DOT_DOT,
            _ => {}
        }

        let bytes = segment.as_bytes();
        if bytes.len() == Self::LEN && !bytes.contains(&b'.') {
            let mut raw = [0; Self::LEN];
            raw.copy_from_slice(bytes);
            return Self(raw);
        }

        let (base, extension) = match bytes.iter().rposition(|&b| b == b'.') {
            Some(dot) => (&bytes[..dot], &bytes[dot + 1..]),
            None => (bytes, &[][..]),
        };
        let mut raw = [b' '; Self::LEN];
        let base_len = base.len().min(Self::BASE_LEN);
        raw[..base_len].copy_from_slice(&base[..base_len]);
        let extension_len = extension.len().min(Self::EXTENSION_LEN);
        raw[Self::BASE_LEN..Self::BASE_LEN + extension_len]
            .copy_from_slice(&extension[..extension_len]);
        Self(raw)
    }

    pub fn base(&self) -> &[u8] {
        &self.0[..Self::BASE_LEN]
    }

    pub fn extension(&self) -> &[u8] {
        &self.0[Self::BASE_LEN..]
    }

    /// Exact match over all 11 bytes, folding ASCII letters only.
    pub fn matches(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl From<&str> for ShortName {
    fn from(segment: &str) -> Self {
        Self::from_segment(segment)
    }
}

impl fmt::Display for ShortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_padded(f, self.base())?;
        let extension = trim_padding(self.extension());
        if !extension.is_empty() {
            f.write_str(".")?;
            write_padded(f, extension)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ShortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShortName(\"")?;
        for &b in &self.0 {
            write!(f, "{}", char::from(b))?;
        }
        write!(f, "\")")
    }
}

fn write_padded(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    for &b in trim_padding(bytes) {
        write!(f, "{}", char::from(b))?;
    }
    Ok(())
}

/// Strips trailing space (and NUL) padding.
pub fn trim_padding(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|&b| b != b' ' && b != 0)
        .map_or(0, |i| i + 1);
    &bytes[..end]
}
