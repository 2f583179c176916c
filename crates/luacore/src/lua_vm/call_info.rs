use crate::object_pool::ClosureId;

/// One active native call.
/// Arguments occupy `stack[base..base + nargs]`; everything the function
/// pushes lands above them.
#[derive(Debug, Clone, Copy)]
pub struct CallInfo {
    pub func: ClosureId,
    pub base: usize,
    pub nargs: usize,
}

impl CallInfo {
    pub fn new(func: ClosureId, base: usize, nargs: usize) -> Self {
        Self { func, base, nargs }
    }

    /// Stack index of the 1-based argument `index`, if it was passed.
    #[inline(always)]
    pub fn arg_slot(&self, index: usize) -> Option<usize> {
        if index == 0 || index > self.nargs {
            None
        } else {
            Some(self.base + index - 1)
        }
    }
}
