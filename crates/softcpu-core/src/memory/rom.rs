/// Immutable program image.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Rom {
    bytes: Box<[u8]>,
}

impl Rom {
    /// Wraps an assembled byte stream.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: bytes.into_boxed_slice(),
        }
    }

    /// Image size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` for an empty image.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Byte at `addr`, if inside the image.
    #[must_use]
    pub fn read(&self, addr: usize) -> Option<u8> {
        self.bytes.get(addr).copied()
    }

    /// `len` bytes starting at `start`, if entirely inside the image.
    #[must_use]
    pub fn read_slice(&self, start: usize, len: usize) -> Option<&[u8]> {
        let end = start.checked_add(len)?;
        self.bytes.get(start..end)
    }

    /// The whole image.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl From<Vec<u8>> for Rom {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&[u8]> for Rom {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes.to_vec())
    }
}
