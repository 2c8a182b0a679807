//! Record types stored in a hold
//!
//! A record names its bucket, exposes its fields by name, and lists the fields
//! that carry a secondary index. [`impl_record!`](crate::impl_record) generates
//! the implementation for plain structs.

use crate::value::Value;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Named-field accessor for a stored record type
pub trait Record: Serialize + DeserializeOwned {
    /// Bucket holding every record of this type
    fn bucket() -> &'static str;

    /// Value of the field called `name`, or `None` when the type has no such field
    fn field(&self, name: &str) -> Option<Value>;

    /// Fields with a secondary index
    fn indexes() -> &'static [&'static str] {
        &[]
    }
}

/// Implement [`Record`] for a struct
///
/// ```ignore
/// impl_record!(Person, bucket = "Person",
///     fields { "Name" => name, "Age" => age },
///     indexes ["Name"]);
/// ```
#[macro_export]
macro_rules! impl_record {
    (
        $ty:ty, bucket = $bucket:expr,
        fields { $($name:literal => $field:ident),* $(,)? }
        $(, indexes [$($index:literal),* $(,)?])?
        $(,)?
    ) => {
        impl $crate::record::Record for $ty {
            fn bucket() -> &'static str {
                $bucket
            }

            fn field(&self, name: &str) -> Option<$crate::value::Value> {
                match name {
                    $($name => Some($crate::value::Value::from(self.$field.clone())),)*
                    _ => None,
                }
            }

            $(
                fn indexes() -> &'static [&'static str] {
                    &[$($index),*]
                }
            )?
        }
    };
}
