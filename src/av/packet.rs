use bytes::Bytes;

/// Result of reading one access unit into a caller buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessUnit {
    /// Bytes written at the start of the buffer
    pub size: usize,
    /// Normalized timestamp in microseconds, `None` when the container gave none
    pub dts: Option<u64>,
}

/// An owned access unit.
#[derive(Debug, Clone)]
pub struct Packet {
    pub data: Bytes,
    pub dts: Option<u64>,
}

impl Packet {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            dts: None,
        }
    }

    pub fn with_dts(mut self, dts: Option<u64>) -> Self {
        self.dts = dts;
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
