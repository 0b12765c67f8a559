/// Annotate one frame, then pass `n` frames through untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameSkip {
    n: u32,
}

impl FrameSkip {
    pub fn new(n: u32) -> Self {
        Self { n }
    }

    #[inline]
    pub fn should_annotate(&self, frame_idx: u64) -> bool {
        self.n == 0 || frame_idx % (self.n as u64 + 1) == 0
    }
}
