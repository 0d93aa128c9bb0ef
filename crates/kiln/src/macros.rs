macro_rules! set {
    (
        $(#[$attrs:meta])*
        pub struct $name:ident(IndexSet<$ty:ty, DefaultHashBuilder>);
    ) => {
        $(#[$attrs])*
        pub struct $name(IndexSet<$ty, DefaultHashBuilder>);

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl $name {
            #[doc = concat!("Creates an empty [`", stringify!($name), "`].")]
            #[must_use]
            #[inline]
            pub fn new() -> Self {
                Self(IndexSet::with_hasher(DefaultHashBuilder::default()))
            }

            #[doc = concat!("Inserts an element into [`", stringify!($name), "`], returning it.")]
            #[must_use]
            #[inline]
            pub fn insert(mut self, element: $ty) -> Self {
                let _ = self.0.insert(element);
                self
            }

            #[doc = concat!("Adds an element to [`", stringify!($name), "`].")]
            #[inline]
            pub fn add(&mut self, element: $ty) {
                let _ = self.0.insert(element);
            }

            #[doc = concat!("Checks whether [`", stringify!($name), "`] contains the given element.")]
            #[must_use]
            #[inline]
            pub fn contains(&self, element: &$ty) -> bool {
                self.0.contains(element)
            }

            #[doc = concat!("Checks whether [`", stringify!($name), "`] contains every element of `other`.")]
            #[must_use]
            #[inline]
            pub fn is_superset(&self, other: &Self) -> bool {
                other.0.iter().all(|element| self.0.contains(element))
            }

            #[doc = concat!("Returns the elements of `other` missing from [`", stringify!($name), "`].")]
            #[must_use]
            pub fn missing(&self, other: &Self) -> Self {
                let mut missing = Self::new();
                for element in other.iter() {
                    if !self.contains(element) {
                        missing.add(*element);
                    }
                }
                missing
            }

            #[doc = concat!("Checks whether [`", stringify!($name), "`] is empty.")]
            #[must_use]
            #[inline]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            #[doc = concat!("Returns the number of elements in [`", stringify!($name), "`].")]
            #[must_use]
            #[inline]
            pub fn len(&self) -> usize {
                self.0.len()
            }

            #[doc = concat!("Returns an iterator over [`", stringify!($name), "`].")]
            #[inline]
            pub fn iter(&self) -> Iter<'_, $ty> {
                self.0.iter()
            }
        }

        impl IntoIterator for $name {
            type Item = $ty;
            type IntoIter = IntoIter<$ty>;

            fn into_iter(self) -> Self::IntoIter {
                self.0.into_iter()
            }
        }

        impl<'a> IntoIterator for &'a $name {
            type Item = &'a $ty;
            type IntoIter = Iter<'a, $ty>;

            fn into_iter(self) -> Self::IntoIter {
                self.0.iter()
            }
        }
    };
}

// Generates a unit-bearing scalar validator returning its canonical value.
macro_rules! unit_validator {
    (
        $(#[$attrs:meta])*
        $fn_name:ident, $quantity:literal, $unit:expr, [$(($suffix:literal, $factor:expr)),+ $(,)?]
    ) => {
        $(#[$attrs])*
        #[must_use]
        pub fn $fn_name() -> Validator {
            Validator::from_fn(|value, _cx| {
                if let Value::Quantity(quantity) = &value {
                    if quantity.unit == $unit {
                        return Ok(value);
                    }
                    return Err(Invalid::new(format!(
                        "Expected {}, got a value measured in {}",
                        $quantity,
                        quantity.unit.symbol()
                    )));
                }
                let number = crate::units::parse_with_suffixes($quantity, &value, &[$(($suffix, $factor)),+])?;
                Ok(Value::Quantity(Quantity::new(number, $unit)))
            })
        }
    };
}

pub(crate) use set;
pub(crate) use unit_validator;
