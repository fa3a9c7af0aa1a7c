#![no_main]

use diagmalloc::heap::Heap;
use diagmalloc::self_check;
use libfuzzer_sys::fuzz_target;

/// Fuzz target that interprets a byte slice as a sequence of allocator
/// operations over one private heap.
///
/// Each operation is encoded as:
///   byte 0: opcode (0=malloc, 1=free, 2=realloc, 3=calloc)
///   byte 1-2: size (little-endian u16)
///   byte 3: slot index (which tracked pointer to operate on)
///
/// We track up to 64 live pointers, fill every live allocation with a
/// slot-specific pattern, and verify the pattern before releasing it, so
/// any placement or coalescing bug that lets blocks overlap shows up as a
/// mismatch. The run ends with a full integrity scan.
const MAX_SLOTS: usize = 64;

fuzz_target!(|data: &[u8]| {
    let mut heap = match Heap::new() {
        Some(heap) => heap,
        None => return,
    };
    let mut slots: [*mut u8; MAX_SLOTS] = [std::ptr::null_mut(); MAX_SLOTS];
    let mut sizes: [usize; MAX_SLOTS] = [0; MAX_SLOTS];

    let fill = |ptr: *mut u8, size: usize, slot: usize| {
        if !ptr.is_null() && size > 0 {
            unsafe { std::ptr::write_bytes(ptr, slot as u8, size.min(256)) };
        }
    };
    let check = |ptr: *mut u8, size: usize, slot: usize| {
        if !ptr.is_null() && size > 0 {
            let slice = unsafe { std::slice::from_raw_parts(ptr, size.min(256)) };
            assert!(
                slice.iter().all(|&b| b == slot as u8),
                "slot {} payload corrupted",
                slot
            );
        }
    };

    let mut i = 0;
    while i + 4 <= data.len() {
        let opcode = data[i] & 0x03;
        let size = u16::from_le_bytes([data[i + 1], data[i + 2]]) as usize;
        let slot = (data[i + 3] as usize) % MAX_SLOTS;
        i += 4;

        match opcode {
            0 => {
                if !slots[slot].is_null() {
                    check(slots[slot], sizes[slot], slot);
                    unsafe { heap.free(slots[slot]) };
                }
                let ptr = heap.malloc(size);
                fill(ptr, size, slot);
                slots[slot] = ptr;
                sizes[slot] = size;
            }
            1 => {
                if !slots[slot].is_null() {
                    check(slots[slot], sizes[slot], slot);
                    unsafe { heap.free(slots[slot]) };
                    slots[slot] = std::ptr::null_mut();
                    sizes[slot] = 0;
                }
            }
            2 => {
                if !slots[slot].is_null() {
                    let old_checked = sizes[slot].min(256).min(size);
                    let ptr = unsafe { heap.realloc(slots[slot], size) };
                    if !ptr.is_null() {
                        // The surviving prefix keeps its pattern.
                        let slice = unsafe { std::slice::from_raw_parts(ptr, old_checked) };
                        assert!(slice.iter().all(|&b| b == slot as u8));
                        fill(ptr, size, slot);
                        slots[slot] = ptr;
                        sizes[slot] = size;
                    }
                    // realloc(_, 0) and failures leave the original live.
                } else {
                    let ptr = unsafe { heap.realloc(std::ptr::null_mut(), size) };
                    fill(ptr, size, slot);
                    slots[slot] = ptr;
                    sizes[slot] = size;
                }
            }
            3 => {
                if !slots[slot].is_null() {
                    check(slots[slot], sizes[slot], slot);
                    unsafe { heap.free(slots[slot]) };
                }
                let nmemb = (size >> 8).max(1);
                let elem_size = (size & 0xFF).max(1);
                let ptr = heap.calloc(nmemb, elem_size);
                let total = nmemb * elem_size;
                if !ptr.is_null() {
                    let check_len = total.min(256);
                    let slice = unsafe { std::slice::from_raw_parts(ptr, check_len) };
                    assert!(
                        slice.iter().all(|&b| b == 0),
                        "calloc memory not zeroed"
                    );
                }
                fill(ptr, total, slot);
                slots[slot] = ptr;
                sizes[slot] = total;
            }
            _ => unreachable!(),
        }
    }

    let report = self_check::check_heap(&heap);
    assert!(report.is_ok(), "integrity scan failed: {:?}", report);

    for slot in 0..MAX_SLOTS {
        if !slots[slot].is_null() {
            check(slots[slot], sizes[slot], slot);
            unsafe { heap.free(slots[slot]) };
            slots[slot] = std::ptr::null_mut();
        }
    }

    let report = self_check::check_heap(&heap);
    assert!(report.is_ok(), "post-drain integrity scan failed: {:?}", report);
});
