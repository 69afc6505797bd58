//! Decoders for single-value leaves.

use super::{DecodedValue, Decoder, DecoderContext, DecoderRegistry, TypeCapture};
use crate::config::EngineSettings;
use crate::error::ValidationError;
use crate::node::ConfigNode;
use crate::tags::Tags;
use crate::validated::Validated;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::str::FromStr;

/// The raw text of a leaf, or the diagnostic explaining why there is none.
pub fn leaf_value<'a>(
    path: &str,
    node: Option<&'a ConfigNode>,
    type_name: &str,
    settings: &EngineSettings,
) -> Validated<&'a str> {
    match node {
        None => Validated::from_error(ValidationError::missing_value(path)),
        Some(ConfigNode::Leaf { value: Some(value), .. })
            if !(value.is_empty() && settings.treat_empty_string_as_absent) =>
        {
            Validated::ok(value.as_str())
        }
        Some(ConfigNode::Leaf { .. }) => {
            Validated::from_error(ValidationError::leaf_missing_value(path, type_name))
        }
        Some(other) => Validated::from_error(ValidationError::expected_leaf(path, other.node_type())),
    }
}

/// Any `FromStr` type, parsed from the trimmed leaf text.
pub struct FromStrDecoder<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T: FromStr + Send + 'static> FromStrDecoder<T> {
    pub fn new() -> Self {
        Self {
            name: std::any::type_name::<T>(),
            _marker: PhantomData,
        }
    }
}

impl<T: FromStr + Send + 'static> Default for FromStrDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: FromStr + Send + 'static> Decoder for FromStrDecoder<T> {
    fn name(&self) -> &str {
        self.name
    }

    fn matches(&self, target: &TypeCapture) -> bool {
        target.is::<T>()
    }

    fn decode(
        &self,
        path: &str,
        _tags: &Tags,
        node: Option<&ConfigNode>,
        target: &TypeCapture,
        ctx: &DecoderContext<'_>,
    ) -> Validated<DecodedValue> {
        leaf_value(path, node, target.name(), ctx.settings).and_then(|raw| match raw.trim().parse::<T>() {
            Ok(value) => Validated::ok(Box::new(value) as DecodedValue),
            Err(_) => Validated::from_error(ValidationError::parse_failure(path, target.name(), raw)),
        })
    }
}

/// Leaf text as written, surrounding whitespace included.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringDecoder;

impl Decoder for StringDecoder {
    fn name(&self) -> &str {
        "string"
    }

    fn matches(&self, target: &TypeCapture) -> bool {
        target.is::<String>()
    }

    fn decode(
        &self,
        path: &str,
        _tags: &Tags,
        node: Option<&ConfigNode>,
        target: &TypeCapture,
        ctx: &DecoderContext<'_>,
    ) -> Validated<DecodedValue> {
        leaf_value(path, node, target.name(), ctx.settings).map(|raw| Box::new(raw.to_string()) as DecodedValue)
    }
}

/// `true/false`, `yes/no`, `on/off`, `1/0`, case-insensitive.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoolDecoder;

impl Decoder for BoolDecoder {
    fn name(&self) -> &str {
        "bool"
    }

    fn matches(&self, target: &TypeCapture) -> bool {
        target.is::<bool>()
    }

    fn decode(
        &self,
        path: &str,
        _tags: &Tags,
        node: Option<&ConfigNode>,
        target: &TypeCapture,
        ctx: &DecoderContext<'_>,
    ) -> Validated<DecodedValue> {
        leaf_value(path, node, target.name(), ctx.settings).and_then(|raw| {
            let parsed = match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Some(true),
                "false" | "no" | "off" | "0" => Some(false),
                _ => None,
            };
            match parsed {
                Some(b) => Validated::ok(Box::new(b) as DecodedValue),
                None => Validated::from_error(ValidationError::parse_failure(path, target.name(), raw)),
            }
        })
    }
}

/// Register the built-in leaf decoders.
pub fn register_defaults(registry: &mut DecoderRegistry) {
    registry
        .register(StringDecoder)
        .register(BoolDecoder)
        .register(FromStrDecoder::<i8>::new())
        .register(FromStrDecoder::<i16>::new())
        .register(FromStrDecoder::<i32>::new())
        .register(FromStrDecoder::<i64>::new())
        .register(FromStrDecoder::<i128>::new())
        .register(FromStrDecoder::<isize>::new())
        .register(FromStrDecoder::<u8>::new())
        .register(FromStrDecoder::<u16>::new())
        .register(FromStrDecoder::<u32>::new())
        .register(FromStrDecoder::<u64>::new())
        .register(FromStrDecoder::<u128>::new())
        .register(FromStrDecoder::<usize>::new())
        .register(FromStrDecoder::<f32>::new())
        .register(FromStrDecoder::<f64>::new())
        .register(FromStrDecoder::<char>::new())
        .register(FromStrDecoder::<PathBuf>::new());
}
