// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Field access contract for editable models.
//!
//! Models expose an explicit, statically known set of writable fields. The
//! [`field_accessible!`](crate::field_accessible) macro generates the
//! accessors from a `"Name" => member` list so no per-field lookup happens at
//! runtime beyond a `match` on the name.

use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Dynamically typed field value. Compared structurally.
pub type FieldValue = serde_json::Value;

/// Field name to value map. Ordering is by name and carries no meaning.
pub type FieldSnapshot = BTreeMap<String, FieldValue>;

/// Error type for field reads/writes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    /// The model does not declare a field with this name.
    #[error("unknown field `{0}`")]
    UnknownField(String),
    /// The value could not be converted to the field's type.
    #[error("field `{field}` rejected value: {reason}")]
    TypeMismatch {
        /// Field that rejected the value.
        field: String,
        /// Conversion failure detail.
        reason: String,
    },
}

/// Uniform get/set access to a model's writable fields.
pub trait FieldAccessible {
    /// Names of every writable field, in declaration order.
    fn field_names(&self) -> &'static [&'static str];

    /// Read a field as a [`FieldValue`]. `None` when the name is not declared.
    fn get_field(&self, name: &str) -> Option<FieldValue>;

    /// Write a field from a [`FieldValue`].
    fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), FieldError>;

    /// Capture every declared field into a snapshot.
    fn snapshot(&self) -> FieldSnapshot {
        self.field_names()
            .iter()
            .filter_map(|name| self.get_field(name).map(|v| ((*name).to_owned(), v)))
            .collect()
    }
}

/// Convert a field to its dynamic form. Used by `field_accessible!`.
pub fn to_field_value<T: Serialize>(value: &T) -> Option<FieldValue> {
    serde_json::to_value(value).ok()
}

/// Convert a dynamic value back to a field's type. Used by `field_accessible!`.
pub fn from_field_value<T: DeserializeOwned>(field: &str, value: FieldValue) -> Result<T, FieldError> {
    serde_json::from_value(value).map_err(|e| FieldError::TypeMismatch {
        field: field.to_owned(),
        reason: e.to_string(),
    })
}

/// Implements [`FieldAccessible`] for a struct from a `"Name" => member` list.
///
/// ```
/// use formstate_core::field::FieldAccessible;
///
/// #[derive(Default)]
/// struct Contact {
///     name: String,
///     age: u32,
/// }
///
/// formstate_core::field_accessible!(Contact {
///     "Name" => name,
///     "Age" => age,
/// });
///
/// let mut c = Contact::default();
/// c.set_field("Age", serde_json::json!(41)).unwrap();
/// assert_eq!(c.age, 41);
/// assert_eq!(c.field_names(), &["Name", "Age"]);
/// ```
#[macro_export]
macro_rules! field_accessible {
    ($ty:ty { $($name:literal => $member:ident),+ $(,)? }) => {
        impl $crate::field::FieldAccessible for $ty {
            fn field_names(&self) -> &'static [&'static str] {
                &[$($name),+]
            }

            fn get_field(&self, name: &str) -> ::core::option::Option<$crate::field::FieldValue> {
                match name {
                    $($name => $crate::field::to_field_value(&self.$member),)+
                    _ => ::core::option::Option::None,
                }
            }

            fn set_field(
                &mut self,
                name: &str,
                value: $crate::field::FieldValue,
            ) -> ::core::result::Result<(), $crate::field::FieldError> {
                match name {
                    $($name => {
                        self.$member = $crate::field::from_field_value(name, value)?;
                        ::core::result::Result::Ok(())
                    })+
                    _ => ::core::result::Result::Err(
                        $crate::field::FieldError::UnknownField(name.to_owned()),
                    ),
                }
            }
        }
    };
}
