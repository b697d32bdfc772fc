//! Checked-in-debug slice access for the report encoders
//!
//! Encoders size their buffer before writing, so every index they produce is
//! in bounds by construction. Debug builds keep the bounds check (and panic
//! with a useful message if a layout formula is wrong); release builds skip it.
//!
//! Usage:
//! ```rust
//! use particula_physics_worker::fast;
//!
//! let mut report = vec![0.0f32; 16];
//! fast!(report, [2] = 1.5);
//! assert_eq!(*fast!(report, [2]), 1.5);
//! ```

/// Slice read/write that is bounds-checked only with `debug_assertions`
#[macro_export]
macro_rules! fast {
    // Read: fast!(slice, [index])
    ($slice:expr, [$index:expr]) => {{
        #[cfg(debug_assertions)]
        {
            &$slice[$index]
        }
        #[cfg(not(debug_assertions))]
        {
            unsafe { $slice.get_unchecked($index) }
        }
    }};

    // Write: fast!(slice, [index] = value)
    ($slice:expr, [$index:expr] = $val:expr) => {{
        #[cfg(debug_assertions)]
        {
            $slice[$index] = $val;
        }
        #[cfg(not(debug_assertions))]
        {
            unsafe { *$slice.get_unchecked_mut($index) = $val; }
        }
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn fast_read_and_write() {
        let mut report = vec![0.0f32; 4];
        fast!(report, [3] = 7.0);
        assert_eq!(*fast!(report, [3]), 7.0);
    }

    #[test]
    #[should_panic]
    #[cfg(debug_assertions)]
    fn fast_write_out_of_layout_panics_in_debug() {
        let mut report = vec![0.0f32; 2];
        fast!(report, [9] = 1.0);
    }
}
