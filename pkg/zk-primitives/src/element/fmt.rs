use std::fmt::{Debug, Display, LowerHex, UpperHex};

use crate::Element;
use ethnum::U256;

macro_rules! prefixed_hex_impl {
    ($t:ident) => {
        impl $t for Element {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str("0x")?;
                <U256 as LowerHex>::fmt(&self.0, f)
            }
        }
    };
}

prefixed_hex_impl!(Display);
prefixed_hex_impl!(Debug);

impl LowerHex for Element {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        <U256 as LowerHex>::fmt(&self.0, f)
    }
}

impl UpperHex for Element {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        <U256 as UpperHex>::fmt(&self.0, f)
    }
}
