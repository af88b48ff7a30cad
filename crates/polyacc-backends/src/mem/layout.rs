//! Pitched memory layout
//!
//! The pitch of axis `k` is the byte distance between consecutive indices
//! along `k`. The last axis is always dense; the row pitch (axis `N - 2`) may
//! be padded to an alignment; outer axes stack whole planes:
//!
//! ```text
//! extent (3, 5) of f32, alignment 32
//!
//!   pitch[1] = 4             (element)
//!   pitch[0] = 32            (20 row bytes rounded up to 32)
//!
//!   row 0: [e e e e e . . .]
//!   row 1: [e e e e e . . .]
//!   row 2: [e e e e e . . .]   size = 3 * 32 = 96 bytes
//! ```

use polyacc_core::Vector;

use crate::error::{AllocationError, BackendError, Result};

/// Extent and per-axis byte pitch of an N-dimensional region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PitchedLayout<const N: usize> {
    extent: Vector<usize, N>,
    pitch: Vector<usize, N>,
}

impl<const N: usize> PitchedLayout<N> {
    /// Dense layout with no row padding
    pub fn contiguous(extent: Vector<usize, N>, elem_size: usize) -> Result<Self> {
        Self::pitched(extent, elem_size, 1)
    }

    /// Layout whose row pitch is rounded up to `alignment` bytes
    pub fn pitched(extent: Vector<usize, N>, elem_size: usize, alignment: usize) -> Result<Self> {
        const { assert!(N >= 1, "layouts need at least one axis") };

        let row_bytes = extent[N - 1]
            .checked_mul(elem_size)
            .ok_or_else(|| overflow(extent, elem_size))?;
        let row_pitch = row_bytes
            .checked_next_multiple_of(alignment.max(1))
            .ok_or_else(|| overflow(extent, elem_size))?;
        Self::with_row_pitch(extent, elem_size, row_pitch)
    }

    /// Layout with an explicit row pitch, as used by wrapped external memory
    pub fn with_row_pitch(extent: Vector<usize, N>, elem_size: usize, row_pitch: usize) -> Result<Self> {
        const { assert!(N >= 1, "layouts need at least one axis") };

        let row_bytes = extent[N - 1]
            .checked_mul(elem_size)
            .ok_or_else(|| overflow(extent, elem_size))?;
        if N >= 2 && (row_pitch < row_bytes || row_pitch % elem_size != 0) {
            return Err(BackendError::Config(polyacc_core::ConfigError::invalid_value(
                "row_pitch",
                format!("{row_pitch} bytes cannot hold rows of {row_bytes} bytes of {elem_size}-byte elements"),
            )));
        }

        let mut pitch = Vector::all(elem_size);
        if N >= 2 {
            pitch[N - 2] = row_pitch;
            for axis in (0..N - 2).rev() {
                pitch[axis] = pitch[axis + 1]
                    .checked_mul(extent[axis + 1])
                    .ok_or_else(|| overflow(extent, elem_size))?;
            }
        }

        pitch[0]
            .checked_mul(extent[0])
            .ok_or_else(|| overflow(extent, elem_size))?;
        Ok(Self { extent, pitch })
    }

    /// Elements per axis
    pub fn extent(&self) -> Vector<usize, N> {
        self.extent
    }

    /// Byte pitch per axis
    pub fn pitch_bytes(&self) -> Vector<usize, N> {
        self.pitch
    }

    /// Size of one element
    pub fn elem_size(&self) -> usize {
        self.pitch[N - 1]
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.extent.prod()
    }

    /// Whether any axis has zero extent
    pub fn is_empty(&self) -> bool {
        self.extent.iter().any(|&e| e == 0)
    }

    /// Total bytes spanned, padding included
    pub fn size_bytes(&self) -> usize {
        self.pitch[0] * self.extent[0]
    }

    /// Bytes of payload in one row
    pub fn row_bytes(&self) -> usize {
        self.extent[N - 1] * self.elem_size()
    }

    /// Number of rows (product of all but the last extent)
    pub fn row_count(&self) -> usize {
        if self.extent[N - 1] == 0 {
            0
        } else {
            self.len() / self.extent[N - 1]
        }
    }

    /// Whether rows follow each other without padding
    pub fn is_contiguous(&self) -> bool {
        N < 2 || self.pitch[N - 2] == self.row_bytes()
    }

    /// Byte offset of `index`; the caller checks bounds
    pub fn byte_offset(&self, index: &Vector<usize, N>) -> usize {
        index.iter().zip(self.pitch.iter()).map(|(i, p)| i * p).sum()
    }

    /// Byte offset of `index`, or `IndexOutOfBounds`
    pub fn checked_byte_offset(&self, index: &Vector<usize, N>) -> Result<usize> {
        if index.is_within(&self.extent) {
            Ok(self.byte_offset(index))
        } else {
            Err(BackendError::index_out_of_bounds(index, self.extent))
        }
    }

    /// Byte offset of the first element of every row, in row-major order
    pub fn row_offsets(&self) -> impl Iterator<Item = usize> + '_ {
        let row_len = self.extent[N - 1];
        (0..self.row_count()).map(move |row| self.byte_offset(&Vector::delinearize(row * row_len, &self.extent)))
    }
}

fn overflow<const N: usize>(extent: Vector<usize, N>, elem_size: usize) -> BackendError {
    AllocationError::LayoutOverflow(format!("extent {extent} of {elem_size}-byte elements")).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_contiguous_layout() {
        let layout = PitchedLayout::contiguous(Vector::new([2usize, 3, 4]), 4).unwrap();
        assert_eq!(layout.pitch_bytes(), Vector::new([48, 16, 4]));
        assert_eq!(layout.size_bytes(), 96);
        assert_eq!(layout.row_count(), 6);
        assert!(layout.is_contiguous());
        assert_eq!(layout.byte_offset(&Vector::new([1, 2, 3])), 48 + 32 + 12);
    }

    #[test]
    fn test_pitched_layout_pads_rows() {
        let layout = PitchedLayout::pitched(Vector::new([3usize, 5]), 4, 32).unwrap();
        assert_eq!(layout.pitch_bytes(), Vector::new([32, 4]));
        assert_eq!(layout.size_bytes(), 96);
        assert_eq!(layout.row_bytes(), 20);
        assert!(!layout.is_contiguous());
        assert_eq!(layout.row_offsets().collect::<Vec<_>>(), vec![0, 32, 64]);
    }

    #[test]
    fn test_one_dimensional_layout() {
        let layout = PitchedLayout::pitched(Vector::new([10usize]), 8, 256).unwrap();
        assert_eq!(layout.pitch_bytes(), Vector::new([8]));
        assert_eq!(layout.size_bytes(), 80);
        assert_eq!(layout.row_offsets().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_bounds_and_overflow() {
        let layout = PitchedLayout::contiguous(Vector::new([4usize, 8]), 4).unwrap();
        assert!(layout.checked_byte_offset(&Vector::new([3, 7])).is_ok());
        assert!(matches!(
            layout.checked_byte_offset(&Vector::new([4, 0])),
            Err(BackendError::IndexOutOfBounds { .. })
        ));
        assert!(matches!(
            PitchedLayout::contiguous(Vector::new([usize::MAX, 2]), 4),
            Err(BackendError::Allocation(AllocationError::LayoutOverflow(_)))
        ));
    }

    #[test]
    fn test_explicit_row_pitch_validation() {
        assert!(PitchedLayout::with_row_pitch(Vector::new([2usize, 4]), 4, 12).is_err());
        assert!(PitchedLayout::with_row_pitch(Vector::new([2usize, 4]), 4, 18).is_err());
        let layout = PitchedLayout::with_row_pitch(Vector::new([2usize, 4]), 4, 20).unwrap();
        assert_eq!(layout.size_bytes(), 40);
    }

    proptest! {
        #[test]
        fn test_offsets_stay_inside_allocation(
            extent in prop::array::uniform3(1usize..6),
            elem_shift in 0u32..4,
            align_shift in 0u32..9,
        ) {
            let elem_size = 1usize << elem_shift;
            let layout = PitchedLayout::pitched(Vector::new(extent), elem_size, 1 << align_shift).unwrap();
            let mut offsets = Vec::new();
            for i in 0..layout.len() {
                let idx = Vector::delinearize(i, &layout.extent());
                let offset = layout.byte_offset(&idx);
                prop_assert!(offset + elem_size <= layout.size_bytes());
                prop_assert_eq!(offset % elem_size, 0);
                offsets.push(offset);
            }
            offsets.dedup();
            prop_assert_eq!(offsets.len(), layout.len());
        }
    }
}
