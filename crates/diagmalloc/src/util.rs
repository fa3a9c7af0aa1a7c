/// Machine word size. Headers, footers, and metadata slots are all one word.
pub const WORD: usize = core::mem::size_of::<usize>();

/// Payload alignment for every allocation (matches max_align_t on 64-bit).
pub const ALIGNMENT: usize = 16;

/// Smallest payload a block can carry; requests below this round up.
pub const MIN_PAYLOAD: usize = 2 * WORD;

/// Per-block metadata envelope for allocated blocks: header, footer, two
/// list links, self-address, call-site slot, requested-size/line word, and
/// the 8-byte guard allowance.
pub const ALLOC_META: usize = 8 * WORD;

/// Smallest block the placement engine may produce. Every block must be
/// able to carry the full allocated envelope.
pub const MIN_BLOCK: usize = ALLOC_META + MIN_PAYLOAD;

/// Total size of the backing arena.
pub const ARENA_SIZE: usize = 8 << 20; // 8 MiB

/// Align `value` up to the next multiple of `align`.
/// `align` must be a power of two.
#[inline(always)]
pub const fn align_up(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}

/// Check if `value` is aligned to `align`.
/// `align` must be a power of two.
#[inline(always)]
pub const fn is_aligned(value: usize, align: usize) -> bool {
    value & (align - 1) == 0
}

/// Block size needed to satisfy a request for `sz` payload bytes:
/// the payload plus the allocated envelope, rounded to the alignment,
/// never below `MIN_BLOCK`.
#[inline]
pub fn adjusted_size(sz: usize) -> usize {
    let asize = if sz <= MIN_PAYLOAD {
        MIN_BLOCK
    } else {
        align_up(sz + ALLOC_META, ALIGNMENT)
    };
    debug_assert!(is_aligned(asize, ALIGNMENT));
    asize
}
