use bincode::Options;
use juniper::{GraphQLObject, GraphQLScalar, InputValue, ScalarValue};
use serde::{Deserialize, Serialize};

use crate::api::err::{self, ApiResult};


/// Opaque cursor for pagination. Serializes as string.
///
/// The actual cursor is a base64 encoded string. The encoded bytes are the
/// serialization format from `bincode`, a compact binary serializer. Of
/// course we could also have serialized the data as JSON and base64 encoded
/// it then, but that would be a waste of network bandwidth.
#[derive(Debug, Clone, GraphQLScalar)]
#[graphql(
    name = "Cursor",
    description = "An opaque cursor used for pagination",
    parse_token(String),
)]
pub(crate) struct Cursor(String);

impl Cursor {
    pub(crate) fn new(data: impl Serialize) -> Self {
        use base64::Engine as _;

        let bytes = bincode::DefaultOptions::new().serialize(&data)
            .unwrap_or_else(|e| unreachable!("bincode serialize failed without size limit: {}", e));
        Self(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    pub(crate) fn deserialize<T>(&self) -> ApiResult<T>
    where
        for<'de> T: Deserialize<'de>,
    {
        use base64::Engine as _;

        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(&self.0)
            .map_err(|e| err::invalid_input!("given cursor is invalid: {}", e))?;
        bincode::DefaultOptions::new()
            .deserialize(&bytes)
            .map_err(|e| err::invalid_input!("given cursor is invalid: {}", e))
    }

    fn to_output<S: ScalarValue>(&self) -> juniper::Value<S> {
        juniper::Value::scalar(self.0.clone())
    }

    fn from_input<S: ScalarValue>(input: &InputValue<S>) -> Result<Self, String> {
        input.as_string_value()
            .map(|s| Self(s.into()))
            .ok_or_else(|| "expected string".into())
    }
}


#[derive(Debug, Clone, GraphQLObject)]
pub(crate) struct PageInfo {
    pub(crate) has_next_page: bool,
    pub(crate) has_previous_page: bool,

    // The connection spec says these shouldn't be optional, but a cursor for
    // an empty page simply does not exist.
    pub(crate) start_cursor: Option<Cursor>,
    pub(crate) end_cursor: Option<Cursor>,
}

#[cfg(test)]
mod tests {
    use crate::db::types::Key;
    use super::Cursor;

    #[test]
    fn roundtrip() {
        for key in [0, 1, 62, 12345678, u64::MAX] {
            let cursor = Cursor::new(Key(key));
            assert_eq!(cursor.deserialize::<Key>().unwrap(), Key(key));
        }
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(Cursor("not base64 !!".into()).deserialize::<Key>().is_err());
    }
}
