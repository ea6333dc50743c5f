use crate::sizes::KB;

// Page size is 4KB. This is a property of x86 processors.
pub const PAGE_FRAME_SIZE: usize = 4 * KB;

// Any virtual address at or above OFFSET is a kernel address.
pub const OFFSET: usize = 0x80000000;

#[inline]
pub const fn page_round_down(addr: usize) -> usize {
    addr & !(PAGE_FRAME_SIZE - 1)
}

#[inline]
pub const fn is_page_aligned(addr: usize) -> bool {
    addr % PAGE_FRAME_SIZE == 0
}

#[inline]
pub const fn is_user_address(addr: usize) -> bool {
    addr < OFFSET
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding() {
        assert_eq!(page_round_down(0x1fff), 0x1000);
        assert_eq!(page_round_down(0x2000), 0x2000);
        assert!(is_page_aligned(0x3000));
        assert!(!is_page_aligned(0x3004));
    }

    #[test]
    fn kernel_split() {
        assert!(is_user_address(0x0804_8000));
        assert!(!is_user_address(OFFSET));
        assert!(!is_user_address(OFFSET + PAGE_FRAME_SIZE));
    }
}
