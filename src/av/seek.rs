use super::timestamp::wrap_count_at;
use thiserror::Error;

/// One random access point of an audio track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekPoint {
    /// Byte offset into the track's byte stream
    pub position: u64,
    /// Normalized timestamp in microseconds, `None` when unknown
    pub timestamp: Option<u64>,
    /// Cumulative decoded payload size at this point
    pub size: u32,
}

/// Where to restart reading after a seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resync {
    /// Byte offset to hand to the demuxer
    pub position: u64,
    /// Rollover count to restore, `None` to keep the current one
    pub wrap_count: Option<u32>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SeekError {
    #[error("seek index is empty")]
    Empty,
}

/// Append-only time to byte offset table.
///
/// Callers push points in position order; nothing is validated, out of
/// order pushes only make later lookups inaccurate.
#[derive(Debug, Clone, Default)]
pub struct SeekIndex {
    points: Vec<SeekPoint>,
}

impl SeekIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, position: u64, timestamp: Option<u64>, size: u32) {
        self.points.push(SeekPoint {
            position,
            timestamp,
            size,
        });
    }

    pub fn points(&self) -> &[SeekPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Decoded payload size seen so far.
    pub fn total_size(&self) -> u32 {
        self.points.last().map_or(0, |p| p.size)
    }

    /// Most recent known timestamp, or 0.
    pub fn duration_us(&self) -> u64 {
        self.points
            .iter()
            .rev()
            .find_map(|p| p.timestamp)
            .unwrap_or(0)
    }

    /// Resolves `target_us` to the last point known to lie at or before it.
    ///
    /// Targets past the last timestamp clamp to the last point.
    pub fn seek(&self, target_us: u64) -> Result<Resync, SeekError> {
        let first = self.points.first().ok_or(SeekError::Empty)?;

        if first.timestamp.map_or(true, |ts| target_us < ts) {
            return Ok(Resync {
                position: first.position,
                wrap_count: Some(0),
            });
        }

        // Positions within the skipped iterator are already the predecessor's
        // index; unknown timestamps stop the scan as well
        let next = self
            .points
            .iter()
            .skip(1)
            .position(|p| p.timestamp.map_or(true, |ts| ts >= target_us));
        let anchor = match next {
            Some(i) => &self.points[i],
            None => &self.points[self.points.len() - 1],
        };

        Ok(Resync {
            position: anchor.position,
            wrap_count: anchor.timestamp.map(wrap_count_at),
        })
    }
}
