//! JSON <-> protobuf conversion for dynamic calls.

use prost_reflect::{DeserializeOptions, DynamicMessage, MessageDescriptor, SerializeOptions};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::rpc::RpcError;

/// How results are rendered as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonOptions {
    /// Use the field names from the .proto file instead of lowerCamelCase
    pub keep_case: bool,
    /// Emit fields that hold their default value
    pub defaults: bool,
    /// Render enums as numbers instead of value names
    pub enums_as_numbers: bool,
    /// Render 64-bit integers as strings
    pub longs_as_strings: bool,
}

impl Default for JsonOptions {
    fn default() -> Self {
        Self {
            keep_case: false,
            defaults: false,
            enums_as_numbers: false,
            longs_as_strings: true,
        }
    }
}

impl JsonOptions {
    /// Decode request arguments into an input message.
    ///
    /// Missing arguments produce an empty message and unknown fields are ignored.
    pub fn decode(&self, desc: MessageDescriptor, args: Value) -> Result<DynamicMessage, RpcError> {
        let args = match args {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        let name = desc.full_name().to_string();
        let options = DeserializeOptions::new().deny_unknown_fields(false);

        DynamicMessage::deserialize_with_options(desc, args, &options)
            .map_err(|e| RpcError::invalid_argument(format!("Invalid args for {}: {}", name, e)))
    }

    /// Encode a reply message as JSON.
    pub fn encode(&self, message: &DynamicMessage) -> Result<Value, RpcError> {
        let options = SerializeOptions::new()
            .use_proto_field_name(self.keep_case)
            .skip_default_fields(!self.defaults)
            .use_enum_numbers(self.enums_as_numbers)
            .stringify_64_bit_integers(self.longs_as_strings);

        message
            .serialize_with_options(serde_json::value::Serializer, &options)
            .map_err(|e| RpcError::internal(format!("Failed to encode result: {}", e)))
    }
}
