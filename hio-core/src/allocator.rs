//! Stripe reservation allocator (`spec.md` §4.F). Serves OPTIMIZED-mode
//! writes: turns a requested byte count into a stripe-aligned physical
//! offset inside the node's shared data file, using the node-local atomic
//! counters in `SharedControl`.

use crate::shared::SharedControl;

/// Per-rank remainder cache (`dataset.reserved_offset`/`reserved_remaining`
//  in `spec.md` §3); process-local, not shared.
#[derive(Default)]
pub struct Reservation {
    pub offset: u64,
    pub remaining: u64,
}

/// `my_stripe` is this rank's stripe assignment, `stripe_count` is the
/// dataset's configured stripe count. The multi-stripe branch of step 2
/// (`*requested := block_size` when `stripe_count > 1 && space > block_size`)
/// is gated on `stripe_count > 1`, per the Open Question in `spec.md` §9:
/// the source bakes in `stripe_count = 1` and disables stripe exclusivity,
/// so with the default configuration this allocator behaves identically to
/// that baked-in form, and only takes the general multi-stripe path when a
/// caller explicitly configures more than one stripe.
pub fn reserve(
    reservation: &mut Reservation,
    shared: &SharedControl,
    my_stripe: usize,
    stripe_count: u64,
    block_size: u64,
    requested: &mut u64,
) -> u64 {
    if reservation.remaining > 0 {
        let served = (*requested).min(reservation.remaining);
        let offset = reservation.offset;
        reservation.offset += served;
        reservation.remaining -= served;
        *requested = served;
        return offset;
    }

    let mut space = requested.div_ceil(block_size) * block_size;
    if stripe_count > 1 && space > block_size {
        // General multi-stripe form, reachable only when stripe exclusivity
        // is re-enabled via configuration (see doc comment above).
        space = block_size;
        *requested = block_size.min(*requested);
    }
    let nstripes = space / block_size;

    let s_index = shared.fetch_add_stripe(my_stripe, nstripes);
    let new_offset = s_index * stripe_count * block_size + (my_stripe as u64) * block_size;

    reservation.offset = new_offset + *requested;
    reservation.remaining = space - *requested;
    new_offset
}
