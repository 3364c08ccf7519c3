//! Integer newtypes for catalog identifiers.
//!
//! An observation id and a delete-request id are both `bigint` in the
//! catalog; distinct types keep one from being bound where the other is
//! expected. With the `sqlx` feature each type encodes and decodes as
//! `INT8` for PostgreSQL.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Return the raw integer value.
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<i64>().map(Self)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> i64 {
                id.0
            }
        }

        #[cfg(feature = "sqlx")]
        impl sqlx::Type<sqlx::Postgres> for $name {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <i64 as sqlx::Type<sqlx::Postgres>>::type_info()
            }
        }

        #[cfg(feature = "sqlx")]
        impl sqlx::postgres::PgHasArrayType for $name {
            fn array_type_info() -> sqlx::postgres::PgTypeInfo {
                <i64 as sqlx::postgres::PgHasArrayType>::array_type_info()
            }
        }

        #[cfg(feature = "sqlx")]
        impl<'q> sqlx::Encode<'q, sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut <sqlx::Postgres as sqlx::Database>::ArgumentBuffer<'q>,
            ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
                <i64 as sqlx::Encode<'q, sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }

        #[cfg(feature = "sqlx")]
        impl<'r> sqlx::Decode<'r, sqlx::Postgres> for $name {
            fn decode(
                value: <sqlx::Postgres as sqlx::Database>::ValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                <i64 as sqlx::Decode<'r, sqlx::Postgres>>::decode(value).map(Self)
            }
        }
    };
}

define_id!(
    /// Observation id. Also the observation's GPS start time in seconds.
    ObsId
);

define_id!(
    /// Delete request id.
    DeleteRequestId
);

/// Width of the GPS-seconds prefix on every archived filename.
pub const OBS_ID_PREFIX_LEN: usize = 10;

impl ObsId {
    /// Extract the observation id from an archived filename such as
    /// `1234567890_20190101000000_gpubox01_00.fits`.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let prefix = filename.get(..OBS_ID_PREFIX_LEN)?;
        if !prefix.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        prefix.parse().ok()
    }
}

/// Parse a comma-separated list of delete request ids (`"12,13, 20"`).
pub fn parse_request_ids(raw: &str) -> Result<Vec<DeleteRequestId>, ParseIntError> {
    raw.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(DeleteRequestId::from_str)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn obs_id_from_filename() {
        assert_eq!(
            ObsId::from_filename("1234567890_20190101000000_gpubox01_00.fits"),
            Some(ObsId(1234567890))
        );
        assert_eq!(ObsId::from_filename("123"), None);
        assert_eq!(ObsId::from_filename("abcdefghij_metafits.fits"), None);
    }

    #[test]
    fn request_id_list_parsing() {
        let ids = parse_request_ids("3, 7,11").unwrap();
        assert_eq!(ids, vec![DeleteRequestId(3), DeleteRequestId(7), DeleteRequestId(11)]);
        assert!(parse_request_ids("3,x").is_err());
        assert!(parse_request_ids("").unwrap().is_empty());
    }

    #[test]
    fn serde_is_transparent() {
        let json = serde_json::to_string(&ObsId(1100000000)).unwrap();
        assert_eq!(json, "1100000000");
    }
}
