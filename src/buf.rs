//! Zero-copy views over byte buffers.

use core::fmt;

/// The bytes `src[off..lim]` of a caller-owned buffer.
#[derive(Copy, Clone)]
pub struct BufView<'a> {
    src: &'a [u8],
    off: usize,
    lim: usize,
}

impl<'a> BufView<'a> {
    /// View `src[off..lim]`.
    ///
    /// # Panics
    /// If `off > lim` or `lim > src.len()`.
    pub fn new(src: &'a [u8], off: usize, lim: usize) -> Self {
        assert!(
            off <= lim && lim <= src.len(),
            "invalid buffer range {off}..{lim} for buffer of length {}",
            src.len()
        );
        Self { src, off, lim }
    }

    pub fn whole(src: &'a [u8]) -> Self {
        Self {
            src,
            off: 0,
            lim: src.len(),
        }
    }

    pub fn source(&self) -> &'a [u8] {
        self.src
    }

    pub fn offset(&self) -> usize {
        self.off
    }

    pub fn limit(&self) -> usize {
        self.lim
    }

    #[inline]
    pub fn as_bytes(&self) -> &'a [u8] {
        &self.src[self.off..self.lim]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.lim - self.off
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.off == self.lim
    }

    /// Byte-exact comparison of the two ranges; lengths are checked first.
    #[inline]
    pub fn eq_range(&self, other: &BufView<'_>) -> bool {
        self.len() == other.len() && self.as_bytes() == other.as_bytes()
    }
}

impl PartialEq for BufView<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.eq_range(other)
    }
}

impl Eq for BufView<'_> {}

impl<'a> From<&'a [u8]> for BufView<'a> {
    fn from(src: &'a [u8]) -> Self {
        Self::whole(src)
    }
}

impl<'a> From<&'a str> for BufView<'a> {
    fn from(s: &'a str) -> Self {
        Self::whole(s.as_bytes())
    }
}

impl fmt::Debug for BufView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BufView({}..{} {:?})",
            self.off,
            self.lim,
            String::from_utf8_lossy(self.as_bytes())
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn views_compare_by_range_contents() {
        let a = b"xxabcxx";
        let b = b"abc";
        let va = BufView::new(a, 2, 5);
        let vb = BufView::whole(b);
        assert_eq!(va.as_bytes(), b"abc");
        assert!(va.eq_range(&vb));
        assert_eq!(va, vb);
        assert_ne!(va, BufView::new(a, 2, 4));
        assert_ne!(BufView::new(a, 0, 3), BufView::new(a, 1, 4));
    }

    #[test]
    fn empty_views_are_equal() {
        let v = BufView::new(b"abc", 2, 2);
        assert!(v.is_empty());
        assert_eq!(v, BufView::whole(b""));
    }

    #[test]
    #[should_panic(expected = "invalid buffer range")]
    fn out_of_range_view_panics() {
        let _ = BufView::new(b"abc", 1, 4);
    }
}
