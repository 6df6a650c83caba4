use std::mem;

pub const VISIBLE: i32 = 1;
pub const HIDDEN: i32 = 0;

/// Destination of a full mask copy, usually a mapped device buffer.
pub trait MaskSink {
    fn write_mask(&mut self, flags: &[i32]);
}

/// One 32-bit flag per node, addressed by node index. Zero hides the node.
///
/// The length is fixed at creation. Every mutation goes through
/// [`VisibilityMask::synchronize`], which copies the whole mask and
/// raises a rebuild request for recorded command buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibilityMask {
    flags: Vec<i32>,
    rebuild_requested: bool,
}

impl VisibilityMask {
    /// All nodes start visible.
    pub fn new(node_count: usize) -> Self {
        Self {
            flags: vec![VISIBLE; node_count],
            rebuild_requested: false,
        }
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn flags(&self) -> &[i32] {
        &self.flags
    }

    pub fn size_in_bytes(&self) -> usize {
        self.flags.len() * mem::size_of::<i32>()
    }

    /// Offset of a node's flag inside the device copy of the mask.
    pub fn byte_offset(index: usize) -> u64 {
        (mem::size_of::<i32>() * index) as u64
    }

    pub fn is_visible(&self, index: usize) -> bool {
        self.flags.get(index).map_or(false, |flag| *flag != HIDDEN)
    }

    pub fn show_all(&mut self) {
        self.fill(VISIBLE);
    }

    pub fn hide_all(&mut self) {
        self.fill(HIDDEN);
    }

    /// Returns false when the index is outside the mask.
    pub fn set_visible(&mut self, index: usize, visible: bool) -> bool {
        match self.flags.get_mut(index) {
            Some(flag) => {
                *flag = if visible { VISIBLE } else { HIDDEN };
                true
            }
            None => false,
        }
    }

    pub fn toggle(&mut self, index: usize) -> bool {
        let visible = self.is_visible(index);
        self.set_visible(index, !visible)
    }

    pub fn synchronize<S: MaskSink>(&mut self, sink: &mut S) {
        sink.write_mask(&self.flags);
        self.rebuild_requested = true;
    }

    pub fn rebuild_requested(&self) -> bool {
        self.rebuild_requested
    }

    pub fn take_rebuild_request(&mut self) -> bool {
        mem::replace(&mut self.rebuild_requested, false)
    }

    fn fill(&mut self, value: i32) {
        for flag in self.flags.iter_mut() {
            *flag = value;
        }
    }
}

impl MaskSink for Vec<i32> {
    fn write_mask(&mut self, flags: &[i32]) {
        self.clear();
        self.extend_from_slice(flags);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingSink {
        writes: Vec<Vec<i32>>,
    }

    impl MaskSink for CountingSink {
        fn write_mask(&mut self, flags: &[i32]) {
            self.writes.push(flags.to_vec());
        }
    }

    #[test]
    fn starts_fully_visible() {
        let mask = VisibilityMask::new(4);
        assert_eq!(mask.flags(), &[1, 1, 1, 1]);
        assert_eq!(mask.size_in_bytes(), 16);
        assert!(!mask.rebuild_requested());
    }

    #[test]
    fn toggling_one_flag_leaves_the_others_untouched() {
        for index in 0..6 {
            let mut mask = VisibilityMask::new(6);
            mask.set_visible((index + 2) % 6, false);
            let before = mask.flags().to_vec();

            let mut device = Vec::new();
            assert!(mask.toggle(index));
            mask.synchronize(&mut device);

            for other in (0..6).filter(|other| *other != index) {
                assert_eq!(device[other], before[other]);
            }
            assert_ne!(device[index], before[index]);
        }
    }

    #[test]
    fn bulk_actions_set_every_flag_and_keep_length() {
        let mut mask = VisibilityMask::new(5);
        mask.hide_all();
        assert!(mask.flags().iter().all(|flag| *flag == HIDDEN));
        assert_eq!(mask.len(), 5);

        mask.set_visible(3, true);
        mask.show_all();
        assert!(mask.flags().iter().all(|flag| *flag == VISIBLE));
        assert_eq!(mask.len(), 5);
    }

    #[test]
    fn out_of_range_indices_are_rejected() {
        let mut mask = VisibilityMask::new(2);
        assert!(!mask.set_visible(2, false));
        assert!(!mask.toggle(7));
        assert!(!mask.is_visible(9));
        assert_eq!(mask.len(), 2);
    }

    #[test]
    fn synchronize_copies_the_whole_mask_and_requests_a_rebuild() {
        let mut mask = VisibilityMask::new(3);
        let mut sink = CountingSink::default();

        mask.set_visible(1, false);
        mask.synchronize(&mut sink);

        assert_eq!(sink.writes, vec![vec![1, 0, 1]]);
        assert!(mask.take_rebuild_request());
        assert!(!mask.take_rebuild_request());
    }

    #[test]
    fn byte_offsets_step_by_flag_size() {
        assert_eq!(VisibilityMask::byte_offset(0), 0);
        assert_eq!(VisibilityMask::byte_offset(1), 4);
        assert_eq!(VisibilityMask::byte_offset(10), 40);
    }
}
