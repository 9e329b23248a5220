//! Equality used to decide whether a write is a change.
//!
//! Semantics follow `Object.is`: floats compare by value except that every
//! NaN equals every other NaN and `0.0` differs from `-0.0`; `Rc` compares
//! by pointer identity; everything else falls back to `PartialEq`.

use std::rc::Rc;

/// Equality check applied by signals before notifying subscribers.
///
/// Types with a meaningful `PartialEq` can opt in with an empty impl:
///
/// ```rust
/// use trellis_core::reactive::SameValue;
///
/// #[derive(Clone, PartialEq)]
/// struct Row { id: u32, label: String }
///
/// impl SameValue for Row {}
/// ```
pub trait SameValue: PartialEq {
    fn same_value(&self, other: &Self) -> bool {
        self == other
    }
}

macro_rules! same_value_by_eq {
    ($($ty:ty),* $(,)?) => {
        $(impl SameValue for $ty {})*
    };
}

same_value_by_eq!(
    (), bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, String, str,
);

impl SameValue for &str {}

impl SameValue for f32 {
    fn same_value(&self, other: &Self) -> bool {
        self.to_bits() == other.to_bits() || (self.is_nan() && other.is_nan())
    }
}

impl SameValue for f64 {
    fn same_value(&self, other: &Self) -> bool {
        self.to_bits() == other.to_bits() || (self.is_nan() && other.is_nan())
    }
}

impl<T: SameValue + ?Sized> SameValue for Rc<T> {
    fn same_value(&self, other: &Self) -> bool {
        Rc::ptr_eq(self, other)
    }
}

impl<T: SameValue> SameValue for Option<T> {
    fn same_value(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.same_value(b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: SameValue> SameValue for Vec<T> {
    fn same_value(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other).all(|(a, b)| a.same_value(b))
    }
}

macro_rules! same_value_tuple {
    ($($name:ident $idx:tt),+) => {
        impl<$($name: SameValue),+> SameValue for ($($name,)+) {
            fn same_value(&self, other: &Self) -> bool {
                $(self.$idx.same_value(&other.$idx))&&+
            }
        }
    };
}

same_value_tuple!(A 0);
same_value_tuple!(A 0, B 1);
same_value_tuple!(A 0, B 1, C 2);
same_value_tuple!(A 0, B 1, C 2, D 3);
