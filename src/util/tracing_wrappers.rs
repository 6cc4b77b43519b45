// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

#[cfg(feature = "tracing")]
#[allow(unused_imports)]
pub use tracing::{debug, error, info, trace, warn};

// Without tracing, every level expands to nothing. A single macro is
// exported under each level's name; defining one called `warn` directly
// would collide with the built-in `#[warn]` attribute.
#[cfg(not(feature = "tracing"))]
macro_rules! discard_event {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
#[allow(unused_imports)]
pub(crate) use {
    discard_event as debug, discard_event as error, discard_event as info,
    discard_event as trace, discard_event as warn,
};

#[cfg(all(test, not(feature = "tracing")))]
mod test {
    use super::*;
    use test_log::test;

    #[test]
    fn disabled_levels_accept_event_syntax() {
        let value = 3;
        warn!("{value}");
        debug!(?value, "decoded");
        info!(value, "done");
        trace!("{}", value + 1);
        error!(%value);
        assert_eq!(value, 3);
    }
}
