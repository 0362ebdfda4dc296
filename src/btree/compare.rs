//! Ordering strategies for tree keys
//!
//! Every comparison the tree makes goes through a [`Compare`] value, including
//! equality checks: two keys are equal when neither is less than the other.

use std::cmp::Ordering;

/// Strict weak ordering over `T`
pub trait Compare<T: ?Sized> {
    /// Returns true if `a` sorts before `b`
    fn less(&self, a: &T, b: &T) -> bool;

    /// Total ordering derived from [`Compare::less`]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        if self.less(a, b) {
            Ordering::Less
        } else if self.less(b, a) {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }
}

/// Orders keys by their `Ord` implementation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Natural;

impl<T: Ord + ?Sized> Compare<T> for Natural {
    fn less(&self, a: &T, b: &T) -> bool {
        a < b
    }

    fn compare(&self, a: &T, b: &T) -> Ordering {
        a.cmp(b)
    }
}

/// Reverses another ordering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reverse<C>(pub C);

impl<T: ?Sized, C: Compare<T>> Compare<T> for Reverse<C> {
    fn less(&self, a: &T, b: &T) -> bool {
        self.0.less(b, a)
    }
}

impl<T: ?Sized, F> Compare<T> for F
where
    F: Fn(&T, &T) -> bool,
{
    fn less(&self, a: &T, b: &T) -> bool {
        self(a, b)
    }
}
