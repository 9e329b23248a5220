//! Child descriptors.
//!
//! A producer hands the reconciler a [`View`]: nothing, a text value, an
//! element, a raw host node, or an ordered list of those. Lists nest freely
//! and are flattened in order before matching.

use std::fmt;
use std::num::TryFromIntError;
use std::rc::Rc;

use super::element::Element;
use super::host::Host;

/// Identity key used to match children across renders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Int(i64),
    Str(Rc<str>),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(value) => write!(f, "{value}"),
            Key::Str(value) => write!(f, "{value:?}"),
        }
    }
}

macro_rules! key_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Key {
                fn from(value: $ty) -> Self {
                    Key::Int(i64::from(value))
                }
            }
        )*
    };
}

key_from_int!(i8, i16, i32, i64, u8, u16, u32);

/// Integers wider than `i64` on some inputs. Values out of range are
/// rejected instead of wrapping onto another key.
macro_rules! key_try_from_int {
    ($($ty:ty),*) => {
        $(
            impl TryFrom<$ty> for Key {
                type Error = TryFromIntError;

                fn try_from(value: $ty) -> Result<Self, Self::Error> {
                    i64::try_from(value).map(Key::Int)
                }
            }
        )*
    };
}

key_try_from_int!(u64, usize, isize);

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Str(Rc::from(value))
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Str(Rc::from(value))
    }
}

impl From<Rc<str>> for Key {
    fn from(value: Rc<str>) -> Self {
        Key::Str(value)
    }
}

/// What a dynamic child producer returns.
pub enum View<H: Host> {
    Empty,
    Text(String),
    Element(Element<H>),
    /// A node created outside the builder. Matched by identity only.
    Node(H::Node),
    List(Vec<View<H>>),
}

impl<H: Host> View<H> {
    /// Flatten nested lists into a single ordered sequence of leaves.
    pub(crate) fn flatten(self) -> Vec<View<H>> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into(self, out: &mut Vec<View<H>>) {
        match self {
            View::Empty => {}
            View::List(items) => {
                for item in items {
                    item.flatten_into(out);
                }
            }
            leaf => out.push(leaf),
        }
    }
}

impl<H: Host> Default for View<H> {
    fn default() -> Self {
        View::Empty
    }
}

impl<H: Host> fmt::Debug for View<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            View::Empty => f.write_str("Empty"),
            View::Text(text) => f.debug_tuple("Text").field(text).finish(),
            View::Element(element) => f.debug_tuple("Element").field(element).finish(),
            View::Node(node) => f.debug_tuple("Node").field(node).finish(),
            View::List(items) => f.debug_list().entries(items).finish(),
        }
    }
}

impl<H: Host> From<()> for View<H> {
    fn from(_: ()) -> Self {
        View::Empty
    }
}

impl<H: Host> From<String> for View<H> {
    fn from(value: String) -> Self {
        View::Text(value)
    }
}

impl<H: Host> From<&str> for View<H> {
    fn from(value: &str) -> Self {
        View::Text(value.to_string())
    }
}

impl<H: Host> From<Rc<str>> for View<H> {
    fn from(value: Rc<str>) -> Self {
        View::Text(value.to_string())
    }
}

macro_rules! view_from_display {
    ($($ty:ty),*) => {
        $(
            impl<H: Host> From<$ty> for View<H> {
                fn from(value: $ty) -> Self {
                    View::Text(value.to_string())
                }
            }
        )*
    };
}

view_from_display!(bool, char, i8, i16, i32, i64, u8, u16, u32, u64, usize, isize, f32, f64);

impl<H: Host> From<Element<H>> for View<H> {
    fn from(element: Element<H>) -> Self {
        View::Element(element)
    }
}

impl<H: Host, T: Into<View<H>>> From<Vec<T>> for View<H> {
    fn from(items: Vec<T>) -> Self {
        View::List(items.into_iter().map(Into::into).collect())
    }
}

impl<H: Host, T: Into<View<H>>> From<Option<T>> for View<H> {
    fn from(value: Option<T>) -> Self {
        value.map_or(View::Empty, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::MemoryHost;

    #[test]
    fn keys_from_ints_and_strings() {
        assert_eq!(Key::from(3u8), Key::Int(3));
        assert_eq!(Key::from(u32::MAX), Key::Int(4_294_967_295));
        assert_eq!(Key::try_from(3usize), Ok(Key::from(3i32)));
        assert!(Key::try_from(usize::MAX).is_err());
        assert!(Key::try_from(u64::MAX).is_err());
        assert_eq!(Key::from("a"), Key::from("a".to_string()));
        assert_ne!(Key::from("1"), Key::from(1));
        assert_eq!(Key::from("row").to_string(), "\"row\"");
    }

    #[test]
    fn flatten_drops_empties_and_keeps_order() {
        let view = View::<MemoryHost>::List(vec![
            View::from("a"),
            View::from(None::<&str>),
            View::from(vec![1, 2]),
            View::List(vec![View::List(vec![]), View::from('z')]),
        ]);

        let texts: Vec<String> = view
            .flatten()
            .into_iter()
            .map(|leaf| match leaf {
                View::Text(text) => text,
                other => panic!("unexpected leaf {other:?}"),
            })
            .collect();
        assert_eq!(texts, vec!["a", "1", "2", "z"]);
    }

    #[test]
    fn numbers_render_with_display() {
        let view: View<MemoryHost> = 2.5f64.into();
        assert!(matches!(view, View::Text(ref text) if text == "2.5"));
    }
}
