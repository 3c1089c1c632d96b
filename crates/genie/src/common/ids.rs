/// Create a newtype around an identifier string.
macro_rules! define_id_type {
    ($name: ident) => {
        #[derive(
            ::std::clone::Clone,
            ::std::fmt::Debug,
            ::std::hash::Hash,
            ::serde::Serialize,
            ::serde::Deserialize,
            ::std::cmp::Ord,
            ::std::cmp::PartialOrd,
            ::std::cmp::Eq,
            ::std::cmp::PartialEq,
        )]
        #[serde(transparent)]
        #[repr(transparent)]
        pub struct $name(String);

        impl $name {
            #[inline]
            pub fn new<S: Into<String>>(value: S) -> Self {
                Self(value.into())
            }

            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl ::std::convert::From<&str> for $name {
            #[inline]
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl ::std::convert::From<String> for $name {
            #[inline]
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl ::std::fmt::Display for $name {
            #[inline]
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl ::std::convert::AsRef<str> for $name {
            #[inline]
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id_type!(JobId);
define_id_type!(ClusterId);
define_id_type!(CommandId);
define_id_type!(ApplicationId);

impl JobId {
    /// Random identifier for requests that did not bring their own id.
    pub fn generate() -> Self {
        let value: u128 = rand::random();
        let hex = format!("{value:032x}");
        Self(format!(
            "{}-{}-{}-{}-{}",
            &hex[0..8],
            &hex[8..12],
            &hex[12..16],
            &hex[16..20],
            &hex[20..32]
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::JobId;

    #[test]
    fn test_generated_ids_differ() {
        let a = JobId::generate();
        let b = JobId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
        assert_eq!(a.as_str().matches('-').count(), 4);
    }

    #[test]
    fn test_id_serializes_as_string() {
        let id = JobId::new("job1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"job1\"");
    }
}
