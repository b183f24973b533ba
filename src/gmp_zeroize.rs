// Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Erases GMP buffers when they are released.
//!
//! Sub-shares, PRSS draws and partial products over the integers are all
//! [`BigNumber`](libpaillier::unknown_order::BigNumber)s, which keep their
//! limbs in GMP-managed heap buffers. GMP copies and reallocates those
//! buffers internally, out of sight of [`Zeroize`]. GMP lets the application
//! replace its memory functions, so we install wrappers that wipe every
//! buffer before handing it back to the original allocator.

use gmp_mpfr_sys::gmp::{
    allocate_function, free_function, get_memory_functions, reallocate_function,
    set_memory_functions,
};
use std::{
    ffi::c_void,
    slice,
    sync::{Once, OnceLock},
};
use tracing::{error, info};
use zeroize::Zeroize;

type AllocFn = unsafe extern "C" fn(usize) -> *mut c_void;
type FreeFn = unsafe extern "C" fn(*mut c_void, usize);

/// The allocator GMP was using before the wrappers went in.
struct GmpAllocator {
    alloc: AllocFn,
    free: FreeFn,
}

static ORIGINAL: OnceLock<GmpAllocator> = OnceLock::new();
static INSTALL: Once = Once::new();

/// Enable zeroization of GMP memory allocations.
///
/// Call this once on startup, before any share is created. Later calls are
/// no-ops.
pub fn enable_zeroize() {
    INSTALL.call_once(install);
}

/// Whether the wrappers are active.
pub fn zeroize_enabled() -> bool {
    INSTALL.is_completed() && ORIGINAL.get().is_some()
}

fn install() {
    let mut alloc: allocate_function = None;
    let mut realloc: reallocate_function = None;
    let mut free: free_function = None;
    // SAFETY: Calling a C API documented here: https://gmplib.org/manual/Custom-Allocation
    unsafe { get_memory_functions(&mut alloc, &mut realloc, &mut free) };

    let (Some(alloc), Some(_), Some(free)) = (alloc, realloc, free) else {
        error!("GMP did not report its memory functions, buffers will not be erased");
        return;
    };
    // The originals must be readable before the first wrapper call.
    if ORIGINAL.set(GmpAllocator { alloc, free }).is_err() {
        error!("GMP memory functions were already saved");
        return;
    }

    // SAFETY: The wrappers keep GMP's calling conventions. `alloc` is
    // unchanged, so every buffer they see came from the saved allocator.
    unsafe {
        set_memory_functions(None, Some(realloc_and_zeroize), Some(free_and_zeroize));
    }
    info!("GMP buffers are now erased on release.");
}

fn original() -> &'static GmpAllocator {
    match ORIGINAL.get() {
        Some(allocator) => allocator,
        // The wrappers are only installed once the originals are saved.
        None => std::process::abort(),
    }
}

extern "C" fn realloc_and_zeroize(
    old_ptr: *mut c_void,
    old_size: usize,
    new_size: usize,
) -> *mut c_void {
    // A plain realloc would release the old buffer before we can wipe it, so
    // allocate, copy and free by hand.
    let allocator = original();
    unsafe {
        // SAFETY: `alloc` is GMP's own allocation function.
        let new_ptr = (allocator.alloc)(new_size);

        // SAFETY: Per GMP doc, "ptr is never NULL, it’s always a previously allocated
        // block."
        let len = old_size.min(new_size);
        let old_data = slice::from_raw_parts(old_ptr as *const u8, len);
        let new_data = slice::from_raw_parts_mut(new_ptr as *mut u8, len);
        new_data.copy_from_slice(old_data);

        free_and_zeroize(old_ptr, old_size);
        new_ptr
    }
}

extern "C" fn free_and_zeroize(ptr: *mut c_void, size: usize) {
    let allocator = original();
    unsafe {
        // SAFETY: Per GMP doc, "ptr is never NULL, it’s always a previously allocated
        // block of size bytes."
        slice::from_raw_parts_mut(ptr as *mut u8, size).zeroize();
        (allocator.free)(ptr, size);
    }
}
